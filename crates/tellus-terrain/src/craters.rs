//! Cratered-sphere height field: boolean carving against a fixed crater set.

use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::height_field::HeightField;
use crate::seed::{det_acos, det_cos, det_sin};

/// One crater cavity: a sphere centered on the base surface.
#[derive(Clone, Copy, Debug)]
pub struct Crater {
    /// Unit direction from the formation center to the crater center.
    pub direction: DVec3,
    /// Radius of the cavity sphere in meters.
    pub radius: f64,
}

/// A sphere with a fixed set of non-overlapping spherical craters carved out.
///
/// The crater set is generated once at construction from the formation seed;
/// evaluation then subtracts each cavity from the radius along the ray from
/// the formation center through the sampled direction. Craters never overlap,
/// so at most one cavity applies to any direction.
#[derive(Clone, Debug)]
pub struct CrateredField {
    radius: f64,
    craters: Vec<Crater>,
}

/// Smallest crater radius, as a fraction of the formation radius.
const MIN_CRATER_FRACTION: f64 = 0.02;
/// Largest crater radius, as a fraction of the formation radius.
const MAX_CRATER_FRACTION: f64 = 0.10;
/// Placement attempts per requested crater before giving up.
const ATTEMPTS_PER_CRATER: usize = 64;

impl CrateredField {
    /// Create a cratered sphere of the given radius.
    ///
    /// Attempts to place `crater_count` non-overlapping craters; if the
    /// surface fills up first the set is simply smaller. The same
    /// `(radius, seed, crater_count)` triple always produces the same set.
    ///
    /// # Panics
    ///
    /// Panics if `radius` is not positive.
    pub fn new(radius: f64, seed: u64, crater_count: usize) -> Self {
        assert!(radius > 0.0, "field radius must be positive, got {radius}");
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut craters: Vec<Crater> = Vec::with_capacity(crater_count);
        let mut attempts = 0usize;

        while craters.len() < crater_count && attempts < crater_count * ATTEMPTS_PER_CRATER {
            attempts += 1;

            // Uniform direction on the sphere.
            let z: f64 = rng.random_range(-1.0..=1.0);
            let theta: f64 = rng.random_range(0.0..std::f64::consts::TAU);
            let planar = (1.0 - z * z).max(0.0).sqrt();
            let direction = DVec3::new(planar * det_cos(theta), planar * det_sin(theta), z);

            let crater_radius = radius * rng.random_range(MIN_CRATER_FRACTION..=MAX_CRATER_FRACTION);

            let overlaps = craters.iter().any(|existing| {
                let angle = det_acos(existing.direction.dot(direction).clamp(-1.0, 1.0));
                angle * radius < existing.radius + crater_radius
            });
            if !overlaps {
                craters.push(Crater {
                    direction,
                    radius: crater_radius,
                });
            }
        }

        if craters.len() < crater_count {
            debug!(
                placed = craters.len(),
                requested = crater_count,
                "crater placement saturated before reaching requested count"
            );
        }

        Self { radius, craters }
    }

    /// The fixed crater set of this formation.
    pub fn craters(&self) -> &[Crater] {
        &self.craters
    }
}

impl HeightField for CrateredField {
    fn base_radius(&self) -> f64 {
        self.radius
    }

    fn surface_point(&self, dir: DVec3) -> DVec3 {
        let mut r = self.radius;
        for crater in &self.craters {
            // Intersect the center ray with the cavity sphere. The cavity is
            // centered on the base surface, so |center| == base radius.
            let center = crater.direction * self.radius;
            let m = dir.dot(center);
            let disc = m * m - self.radius * self.radius + crater.radius * crater.radius;
            if disc <= 0.0 {
                continue;
            }
            let root = disc.sqrt();
            let near = m - root;
            let far = m + root;
            // Carve only where the current surface lies inside the cavity.
            if near < r && r < far {
                r = near;
            }
        }
        dir * r
    }
}

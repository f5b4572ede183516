//! The height-field strategy trait and the plain-sphere implementation.

use glam::DVec3;

/// Directions of the four root tetrahedron vertices (normalized).
///
/// The initial shell of every formation is the regular tetrahedron spanned by
/// these directions; its four faces form the first quaterna of the node tree.
pub const ROOT_DIRECTIONS: [DVec3; 4] = [
    DVec3::new(
        0.577_350_269_189_625_8,
        0.577_350_269_189_625_8,
        0.577_350_269_189_625_8,
    ),
    DVec3::new(
        0.577_350_269_189_625_8,
        -0.577_350_269_189_625_8,
        -0.577_350_269_189_625_8,
    ),
    DVec3::new(
        -0.577_350_269_189_625_8,
        0.577_350_269_189_625_8,
        -0.577_350_269_189_625_8,
    ),
    DVec3::new(
        -0.577_350_269_189_625_8,
        -0.577_350_269_189_625_8,
        0.577_350_269_189_625_8,
    ),
];

/// Pluggable height-field evaluation for one formation.
///
/// Implementations map a direction from the formation center to the surface
/// position along that direction. Each formation owns exactly one instance
/// for its lifetime, so implementations may precompute whatever per-formation
/// data they need (e.g., a crater set) at construction.
pub trait HeightField: Send + Sync + std::fmt::Debug {
    /// Radius of the undisturbed base sphere in meters.
    fn base_radius(&self) -> f64;

    /// Surface position along the (unit) direction `dir`.
    fn surface_point(&self, dir: DVec3) -> DVec3;

    /// Position of the new midpoint between two neighboring corner points.
    ///
    /// `seed` is the subdividing patch's seed; strategies may use it to vary
    /// their sampling per patch. The default samples the surface along the
    /// normalized mid-direction of the edge.
    fn midpoint(&self, a: DVec3, b: DVec3, seed: u64) -> DVec3 {
        let _ = seed;
        self.surface_point(((a + b) * 0.5).normalize())
    }

    /// Corner positions of the root shell tetrahedron.
    fn root_points(&self) -> [DVec3; 4] {
        ROOT_DIRECTIONS.map(|d| self.surface_point(d))
    }
}

/// The identity height field: an undisturbed sphere.
#[derive(Clone, Debug)]
pub struct FlatField {
    radius: f64,
}

impl FlatField {
    /// Create a flat sphere of the given radius.
    ///
    /// # Panics
    ///
    /// Panics if `radius` is not positive.
    pub fn new(radius: f64) -> Self {
        assert!(radius > 0.0, "field radius must be positive, got {radius}");
        Self { radius }
    }
}

impl HeightField for FlatField {
    fn base_radius(&self) -> f64 {
        self.radius
    }

    fn surface_point(&self, dir: DVec3) -> DVec3 {
        dir * self.radius
    }
}

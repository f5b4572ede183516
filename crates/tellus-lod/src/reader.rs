//! Read-only access to the tree for the concurrent physics thread.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use glam::DVec3;
use tellus_math::{intersect_ray_triangle, triangle_normal};

use crate::node::NodeIndex;
use crate::tree::TreeCore;

/// Result of a successful ray probe against the leaf surface.
#[derive(Clone, Copy, Debug)]
pub struct ProbeHit {
    /// Distance from the ray origin to the hit point.
    pub distance: f64,
    /// World-space hit position.
    pub position: DVec3,
    /// Unit normal of the hit leaf triangle.
    pub normal: DVec3,
    /// The leaf node that was hit.
    pub node: NodeIndex,
}

/// Cloneable handle for read-only ray/shape queries against the node tree.
///
/// Queries take the shared read lock, so they never observe a half-updated
/// child/cousin set; the writer holds the matching write lock only around
/// the narrow structural mutation moments.
pub struct TreeReader {
    core: Arc<RwLock<TreeCore>>,
}

impl TreeReader {
    pub(crate) fn new(core: Arc<RwLock<TreeCore>>) -> Self {
        Self { core }
    }

    /// Acquire the shared read guard for custom traversals.
    #[must_use]
    pub fn read(&self) -> RwLockReadGuard<'_, TreeCore> {
        self.core.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Nearest intersection of a ray with the current leaf surface.
    ///
    /// `direction` need not be normalized; the returned distance is in units
    /// of its length. This is the reference read-side query; a real physics
    /// consumer would run its own traversals through [`Self::read`].
    #[must_use]
    pub fn probe(&self, origin: DVec3, direction: DVec3) -> Option<ProbeHit> {
        let core = self.read();
        let mut best: Option<ProbeHit> = None;

        for i in 0..core.used_nodes() {
            let index = NodeIndex(i as u32);
            if !core.node(index).is_leaf() {
                continue;
            }
            let [a, b, c] = core.corner_positions(index);
            let Some(hit) = intersect_ray_triangle(origin, direction, a, b, c) else {
                continue;
            };
            if best.is_none_or(|prev| hit.t < prev.distance) {
                let Some(normal) = triangle_normal(a, b, c) else {
                    continue;
                };
                best = Some(ProbeHit {
                    distance: hit.t,
                    position: origin + direction * hit.t,
                    normal,
                    node: index,
                });
            }
        }
        best
    }
}

impl Clone for TreeReader {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tellus_math::CameraRay;
    use tellus_terrain::FlatField;

    use super::*;
    use crate::buffer::NodeBuffer;
    use crate::tuning::LodTuning;

    fn small_buffer() -> NodeBuffer {
        NodeBuffer::new(
            Arc::new(FlatField::new(100.0)),
            42,
            64,
            16,
            LodTuning::default(),
        )
    }

    fn eye() -> CameraRay {
        CameraRay::new(DVec3::new(0.0, 0.0, 250.0), -DVec3::Z)
    }

    /// A ray from outside toward the center hits the surface near the radius.
    #[test]
    fn test_probe_hits_surface() {
        let mut buffer = small_buffer();
        for _ in 0..8 {
            buffer.tick(eye());
        }
        let reader = buffer.reader();
        let hit = reader
            .probe(DVec3::new(0.0, 0.0, 300.0), -DVec3::Z)
            .expect("ray toward the center should hit");
        // The shell is a tetrahedron refined toward the sphere; the hit sits
        // between the inscribed radius and the circumscribed one.
        assert!(hit.position.length() > 30.0 && hit.position.length() <= 100.0 + 1e-9);
        assert!(hit.distance > 0.0);
        assert!((hit.normal.length() - 1.0).abs() < 1e-9);
    }

    /// A ray pointing away from the formation misses.
    #[test]
    fn test_probe_miss() {
        let mut buffer = small_buffer();
        buffer.tick(eye());
        let reader = buffer.reader();
        assert!(reader.probe(DVec3::new(0.0, 0.0, 300.0), DVec3::Z).is_none());
    }

    /// Probes race the tick loop without ever observing a broken structure.
    #[test]
    fn test_concurrent_probes_during_ticks() {
        let mut buffer = small_buffer();
        buffer.tick(eye());

        let reader = buffer.reader();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_worker = Arc::clone(&stop);

        let probe_thread = std::thread::spawn(move || {
            let mut hits = 0u32;
            while !stop_worker.load(Ordering::Relaxed) {
                if reader.probe(DVec3::new(0.0, 0.0, 300.0), -DVec3::Z).is_some() {
                    hits += 1;
                }
            }
            hits
        });

        for i in 0..50 {
            let angle = i as f64 * 0.05;
            let position = DVec3::new(angle.sin(), 0.3, angle.cos()) * 250.0;
            buffer.tick(CameraRay::new(position, -position));
            if i == 25 {
                buffer.set_target_quaterna(4);
            }
        }
        stop.store(true, Ordering::Relaxed);

        let hits = probe_thread.join().expect("probe thread panicked");
        assert!(hits > 0, "reader should have completed at least one probe");
        assert_eq!(buffer.audit(), Ok(()));
    }
}

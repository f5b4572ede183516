//! The per-scene formation instance: definition + height field + node buffer.

use std::sync::Arc;

use tellus_math::CameraRay;
use tellus_terrain::{FormationDef, HeightField};

use crate::buffer::{NodeBuffer, TickStats};
use crate::reader::TreeReader;
use crate::tuning::LodTuning;

/// One formation instance in a scene: the root of one node tree.
///
/// Owns the formation's single [`HeightField`] instance and the
/// [`NodeBuffer`] built over it. This is the surface the outside world talks
/// to: a camera ray and a target budget in, telemetry and read handles out.
pub struct Polyhedron {
    def: FormationDef,
    buffer: NodeBuffer,
}

impl Polyhedron {
    /// Instantiate a formation with fixed quaterna capacity.
    pub fn new(
        def: FormationDef,
        field: Arc<dyn HeightField>,
        max_quaterna: usize,
        target_quaterna: usize,
        tuning: LodTuning,
    ) -> Self {
        debug_assert!(
            (field.base_radius() - def.radius).abs() < def.radius * 1e-9,
            "height field radius disagrees with the formation definition"
        );
        let buffer = NodeBuffer::new(field, def.seed, max_quaterna, target_quaterna, tuning);
        Self { def, buffer }
    }

    /// The immutable formation definition.
    #[must_use]
    pub fn def(&self) -> &FormationDef {
        &self.def
    }

    /// The underlying node buffer.
    #[must_use]
    pub fn buffer(&self) -> &NodeBuffer {
        &self.buffer
    }

    /// Mutable access for the tick-owning thread.
    pub fn buffer_mut(&mut self) -> &mut NodeBuffer {
        &mut self.buffer
    }

    /// Advance one tick with the given camera ray.
    pub fn tick(&mut self, ray: CameraRay) -> TickStats {
        self.buffer.tick(ray)
    }

    /// Forward a new budget from the external regulator.
    pub fn set_target_quaterna(&mut self, target: usize) {
        self.buffer.set_target_quaterna(target);
    }

    /// A read handle for the physics thread.
    #[must_use]
    pub fn reader(&self) -> TreeReader {
        self.buffer.reader()
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;
    use tellus_terrain::{CrateredField, FlatField};

    use super::*;

    fn ray() -> CameraRay {
        CameraRay::new(DVec3::new(0.0, 0.0, 3000.0), -DVec3::Z)
    }

    #[test]
    fn test_polyhedron_builds_and_ticks() {
        let def = FormationDef::new("Test", 1000.0, 7);
        let field = Arc::new(FlatField::new(1000.0));
        let mut poly = Polyhedron::new(def, field, 32, 8, LodTuning::default());

        let stats = poly.tick(ray());
        assert!(stats.rescored);
        assert_eq!(poly.buffer().used_quaterna_count(), 1);
        assert_eq!(poly.buffer().used_node_count(), 4);
    }

    #[test]
    fn test_polyhedron_with_cratered_field() {
        let def = FormationDef::new("Pocked", 1000.0, 11);
        let field = Arc::new(CrateredField::new(1000.0, def.seed, 10));
        let mut poly = Polyhedron::new(def, field, 64, 16, LodTuning::default());

        for _ in 0..6 {
            poly.tick(ray());
        }
        assert!(poly.buffer().used_quaterna_count() > 1);
        assert_eq!(poly.buffer().audit(), Ok(()));
    }

    #[test]
    fn test_target_forwarding() {
        let def = FormationDef::new("Test", 500.0, 3);
        let field = Arc::new(FlatField::new(500.0));
        let mut poly = Polyhedron::new(def, field, 16, 4, LodTuning::default());
        poly.set_target_quaterna(9);
        assert_eq!(poly.buffer().target_quaterna_count(), 9);
    }
}

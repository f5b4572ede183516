//! The render vertex format and the triangle-soup mesh container.

use bytemuck::{Pod, Zeroable};
use glam::DVec3;

/// One vertex of the extracted terrain mesh: position plus face normal,
/// ready for GPU upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    /// Position in formation-local coordinates.
    pub position: [f32; 3],
    /// Unit face normal of the emitting triangle.
    pub normal: [f32; 3],
}

// Stride must stay in sync with any vertex layout built over this type.
static_assertions::const_assert_eq!(std::mem::size_of::<TerrainVertex>(), 24);
static_assertions::const_assert_eq!(std::mem::align_of::<TerrainVertex>(), 4);

/// The mesh snapshot produced by extraction: a flat triangle soup, three
/// vertices per leaf triangle.
#[derive(Debug, Default)]
pub struct TerrainMesh {
    /// Vertex buffer; length is always a multiple of 3.
    pub vertices: Vec<TerrainVertex>,
}

impl TerrainMesh {
    /// Create an empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all triangles, keeping the allocation.
    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    /// Number of triangles in the mesh.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Whether the mesh holds no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Append one triangle, deriving its face normal from the winding.
    ///
    /// Degenerate triangles get a zero normal rather than NaN.
    pub fn push_triangle(&mut self, a: DVec3, b: DVec3, c: DVec3) {
        let normal = (b - a).cross(c - a);
        let normal = if normal.length_squared() > f64::EPSILON {
            normal.normalize()
        } else {
            DVec3::ZERO
        };
        let normal = [normal.x as f32, normal.y as f32, normal.z as f32];
        for p in [a, b, c] {
            self.vertices.push(TerrainVertex {
                position: [p.x as f32, p.y as f32, p.z as f32],
                normal,
            });
        }
    }

    /// The raw vertex bytes, for buffer upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

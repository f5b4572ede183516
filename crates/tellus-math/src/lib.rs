//! Shared geometry primitives: camera rays, triangle measures, and ray/triangle
//! intersection used by the LOD scorer and the physics read-side probe.

mod ray;
mod triangle;

pub use ray::CameraRay;
pub use triangle::{
    RayTriangleHit, intersect_ray_triangle, triangle_area, triangle_centroid, triangle_normal,
};

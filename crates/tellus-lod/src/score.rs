//! Visual-importance scoring of nodes against the camera ray.

use glam::DVec3;
use tellus_math::{CameraRay, triangle_area, triangle_centroid, triangle_normal};

use crate::tuning::LodTuning;

/// Weight applied regardless of orientation, so back-facing and horizon
/// patches keep a small positive score.
const BASE_WEIGHT: f64 = 0.2;
/// Weight of the patch-faces-the-eye term.
const FACING_WEIGHT: f64 = 1.0;
/// Weight of the patch-is-ahead-of-the-camera term.
const FORWARD_WEIGHT: f64 = 0.5;
/// Clamp on the squared eye distance, to keep scores finite at the surface.
const MIN_DISTANCE_SQUARED: f64 = 1e-12;

/// Compute the visual importance of a patch with the given corner positions.
///
/// Importance grows with patch area, proximity to the eye, how squarely the
/// patch faces the eye, and how close it sits to the view direction. The
/// result is strictly positive for any non-degenerate triangle, which is what
/// makes a scored node eligible for expansion.
#[must_use]
pub fn score_node(corners: [DVec3; 3], ray: &CameraRay) -> f32 {
    let [a, b, c] = corners;
    let area = triangle_area(a, b, c);
    let Some(normal) = triangle_normal(a, b, c) else {
        return f32::MIN_POSITIVE;
    };

    let centroid = triangle_centroid(a, b, c);
    let to_eye = ray.position - centroid;
    let distance_sq = to_eye.length_squared().max(MIN_DISTANCE_SQUARED);
    let to_eye_dir = to_eye / distance_sq.sqrt();

    // Both terms map [-1, 1] dot products into [0, 1].
    let facing = (1.0 + normal.dot(to_eye_dir)) * 0.5;
    let forward = (1.0 + ray.direction.dot(-to_eye_dir)) * 0.5;

    let weight = BASE_WEIGHT + FACING_WEIGHT * facing + FORWARD_WEIGHT * forward;
    let score = (area * weight / distance_sq) as f32;
    score.max(f32::MIN_POSITIVE)
}

/// Whether the camera moved enough since the last scoring pass to justify
/// re-scoring every used node.
#[must_use]
pub fn ray_moved_significantly(last: Option<&CameraRay>, ray: &CameraRay, tuning: &LodTuning) -> bool {
    match last {
        None => true,
        Some(prev) => prev.differs_significantly(
            ray,
            tuning.ray_position_epsilon,
            tuning.ray_direction_epsilon,
        ),
    }
}

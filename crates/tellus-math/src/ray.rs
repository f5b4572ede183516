//! The per-tick camera ray: a position plus a normalized forward direction.

use glam::DVec3;

/// A camera ray supplied once per tick: eye position and forward direction.
///
/// The direction is normalized on construction. Two rays can be compared for
/// "significant" movement, which is what gates the per-tick re-scoring pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraRay {
    /// Eye position in formation-local coordinates.
    pub position: DVec3,
    /// Normalized view direction.
    pub direction: DVec3,
}

impl CameraRay {
    /// Construct a ray, normalizing the direction.
    ///
    /// # Panics
    ///
    /// Panics if `direction` has (near-)zero length.
    pub fn new(position: DVec3, direction: DVec3) -> Self {
        let len_sq = direction.length_squared();
        assert!(len_sq > 0.0, "camera ray direction must be non-zero");
        Self {
            position,
            direction: direction / len_sq.sqrt(),
        }
    }

    /// Whether this ray differs from `other` by more than the given thresholds.
    ///
    /// `position_epsilon` is an absolute world-space distance; `direction_epsilon`
    /// is `1 - dot(a, b)` of the two normalized directions, so `0.0` means any
    /// rotation counts and larger values tolerate larger swings.
    #[must_use]
    pub fn differs_significantly(
        &self,
        other: &CameraRay,
        position_epsilon: f64,
        direction_epsilon: f64,
    ) -> bool {
        if (self.position - other.position).length_squared() > position_epsilon * position_epsilon {
            return true;
        }
        1.0 - self.direction.dot(other.direction) > direction_epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Direction is normalized by the constructor.
    #[test]
    fn test_direction_normalized() {
        let ray = CameraRay::new(DVec3::ZERO, DVec3::new(0.0, 0.0, 10.0));
        assert!((ray.direction.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_zero_direction_panics() {
        CameraRay::new(DVec3::ZERO, DVec3::ZERO);
    }

    /// A pure translation below the position epsilon is not significant.
    #[test]
    fn test_small_translation_insignificant() {
        let a = CameraRay::new(DVec3::ZERO, DVec3::X);
        let b = CameraRay::new(DVec3::new(0.01, 0.0, 0.0), DVec3::X);
        assert!(!a.differs_significantly(&b, 0.05, 1e-3));
        assert!(a.differs_significantly(&b, 0.001, 1e-3));
    }

    /// A rotation below the direction epsilon is not significant.
    #[test]
    fn test_small_rotation_insignificant() {
        let a = CameraRay::new(DVec3::ZERO, DVec3::X);
        // ~0.57 degrees off axis: 1 - cos ~ 5e-5, under the default 1e-3.
        let b = CameraRay::new(DVec3::ZERO, DVec3::new(1.0, 0.01, 0.0));
        assert!(!a.differs_significantly(&b, 0.05, 1e-3));
        // A quarter turn is always significant.
        let c = CameraRay::new(DVec3::ZERO, DVec3::Y);
        assert!(a.differs_significantly(&c, 0.05, 1e-3));
    }
}

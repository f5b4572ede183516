//! Triangle measures and ray/triangle intersection (Möller–Trumbore).

use glam::DVec3;

/// Area of the triangle `(a, b, c)`.
#[must_use]
pub fn triangle_area(a: DVec3, b: DVec3, c: DVec3) -> f64 {
    (b - a).cross(c - a).length() * 0.5
}

/// Unit normal of the triangle `(a, b, c)`, using counter-clockwise winding.
///
/// Returns `None` if the triangle is degenerate (collinear corners).
#[must_use]
pub fn triangle_normal(a: DVec3, b: DVec3, c: DVec3) -> Option<DVec3> {
    let n = (b - a).cross(c - a);
    let len_sq = n.length_squared();
    if len_sq <= f64::EPSILON {
        return None;
    }
    Some(n / len_sq.sqrt())
}

/// Centroid of the triangle `(a, b, c)`.
#[must_use]
pub fn triangle_centroid(a: DVec3, b: DVec3, c: DVec3) -> DVec3 {
    (a + b + c) / 3.0
}

/// Result of a successful ray/triangle intersection.
#[derive(Clone, Copy, Debug)]
pub struct RayTriangleHit {
    /// Parametric distance along the ray direction (`origin + t * dir`).
    pub t: f64,
    /// Barycentric u coordinate of the hit.
    pub u: f64,
    /// Barycentric v coordinate of the hit.
    pub v: f64,
}

/// Möller–Trumbore ray/triangle intersection.
///
/// `dir` need not be normalized; `t` is expressed in units of `dir`'s length.
/// Hits behind the origin (`t < 0`) and rays parallel to the triangle plane
/// return `None`. Both winding orders are accepted.
#[must_use]
pub fn intersect_ray_triangle(
    origin: DVec3,
    dir: DVec3,
    a: DVec3,
    b: DVec3,
    c: DVec3,
) -> Option<RayTriangleHit> {
    const PARALLEL_EPSILON: f64 = 1e-12;

    let edge1 = b - a;
    let edge2 = c - a;
    let pvec = dir.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = origin - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let v = dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    if t < 0.0 {
        return None;
    }
    Some(RayTriangleHit { t, u, v })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_tri() -> (DVec3, DVec3, DVec3) {
        (
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn test_area_of_unit_right_triangle() {
        let (a, b, c) = unit_tri();
        assert!((triangle_area(a, b, c) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_normal_of_ccw_triangle_points_up() {
        let (a, b, c) = unit_tri();
        let n = triangle_normal(a, b, c).unwrap();
        assert!((n - DVec3::Z).length() < 1e-12);
    }

    #[test]
    fn test_degenerate_triangle_has_no_normal() {
        let a = DVec3::ZERO;
        let b = DVec3::new(1.0, 1.0, 1.0);
        let c = DVec3::new(2.0, 2.0, 2.0);
        assert!(triangle_normal(a, b, c).is_none());
    }

    /// A ray straight down onto the triangle interior hits at the right distance.
    #[test]
    fn test_ray_hits_triangle_interior() {
        let (a, b, c) = unit_tri();
        let hit = intersect_ray_triangle(
            DVec3::new(0.25, 0.25, 5.0),
            DVec3::new(0.0, 0.0, -1.0),
            a,
            b,
            c,
        )
        .expect("should hit");
        assert!((hit.t - 5.0).abs() < 1e-12);
        assert!((hit.u - 0.25).abs() < 1e-12);
        assert!((hit.v - 0.25).abs() < 1e-12);
    }

    /// A ray passing outside the triangle misses.
    #[test]
    fn test_ray_misses_outside() {
        let (a, b, c) = unit_tri();
        let hit = intersect_ray_triangle(
            DVec3::new(0.9, 0.9, 5.0),
            DVec3::new(0.0, 0.0, -1.0),
            a,
            b,
            c,
        );
        assert!(hit.is_none());
    }

    /// Hits behind the ray origin are rejected.
    #[test]
    fn test_hit_behind_origin_rejected() {
        let (a, b, c) = unit_tri();
        let hit = intersect_ray_triangle(
            DVec3::new(0.25, 0.25, -5.0),
            DVec3::new(0.0, 0.0, -1.0),
            a,
            b,
            c,
        );
        assert!(hit.is_none());
    }

    /// Rays parallel to the triangle plane are rejected.
    #[test]
    fn test_parallel_ray_rejected() {
        let (a, b, c) = unit_tri();
        let hit = intersect_ray_triangle(DVec3::new(0.0, 0.0, 1.0), DVec3::X, a, b, c);
        assert!(hit.is_none());
    }

    /// The centroid is the average of the corners.
    #[test]
    fn test_centroid() {
        let (a, b, c) = unit_tri();
        let m = triangle_centroid(a, b, c);
        assert!((m - DVec3::new(1.0 / 3.0, 1.0 / 3.0, 0.0)).length() < 1e-12);
    }
}

//! Math types for Earshot
//!
//! Vector arithmetic (subtraction, scaling, length, normalization, cross and
//! dot products) comes from [`glam::Vec3`]. This module adds the few helpers
//! positional audio needs on top of it.

pub use glam::Vec3;

/// World up axis used to tell left from right around the listener.
pub const WORLD_UP: Vec3 = Vec3::Y;

/// Angle between two vectors in degrees, in `[0, 180]`.
///
/// Returns `0.0` when either vector has zero length, since no direction can be
/// derived from it.
pub fn angle_between_degrees(lhs: Vec3, rhs: Vec3) -> f32 {
    let (Some(a), Some(b)) = (lhs.try_normalize(), rhs.try_normalize()) else {
        return 0.0;
    };
    // Rounding can push the cosine slightly outside [-1, 1].
    let cos_angle = a.dot(b).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Normalizes `v`, or returns `fallback` when `v` has no usable direction.
pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn angle_of_parallel_and_opposite_vectors() {
        assert!(approx_eq(angle_between_degrees(Vec3::X, Vec3::X * 5.0), 0.0));
        assert!(approx_eq(angle_between_degrees(Vec3::Z, -Vec3::Z), 180.0));
    }

    #[test]
    fn angle_of_perpendicular_vectors() {
        assert!(approx_eq(
            angle_between_degrees(Vec3::new(0.0, 0.0, -1.0), Vec3::new(3.0, 0.0, 0.0)),
            90.0
        ));
    }

    #[test]
    fn angle_is_independent_of_length() {
        let a = Vec3::new(1.0, 1.0, 0.0);
        assert!(approx_eq(angle_between_degrees(a, Vec3::X), 45.0));
        assert!(approx_eq(angle_between_degrees(a * 100.0, Vec3::X * 0.01), 45.0));
    }

    #[test]
    fn zero_vector_has_no_angle() {
        assert_eq!(angle_between_degrees(Vec3::ZERO, Vec3::X), 0.0);
        assert_eq!(angle_between_degrees(Vec3::X, Vec3::ZERO), 0.0);
    }

    #[test]
    fn normalize_or_falls_back_on_zero() {
        assert_eq!(normalize_or(Vec3::ZERO, -Vec3::Z), -Vec3::Z);
        assert_eq!(normalize_or(Vec3::new(0.0, 0.0, -4.0), Vec3::X), -Vec3::Z);
    }

    #[test]
    fn cross_product_sign_tells_sides_apart() {
        let forward = Vec3::new(0.0, 0.0, -1.0);
        let right = Vec3::new(10.0, 0.0, 0.0).cross(forward).dot(WORLD_UP);
        let left = Vec3::new(-10.0, 0.0, 0.0).cross(forward).dot(WORLD_UP);
        assert!(right > 0.0);
        assert!(left < 0.0);
    }
}

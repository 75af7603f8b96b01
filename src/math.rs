//! Vector helpers on top of `glam::Vec2`
//!
//! The simulation stores no derived magnitude/angle anywhere: both are
//! always computed from the components, and the setters here rescale or
//! rotate while preserving the other quantity.

use glam::Vec2;

/// Pinball-flavored extensions to `glam::Vec2`.
///
/// Pure variants return a new vector; `*_in_place` variants mutate.
/// Normalizing or re-scaling a zero vector yields zero (the angle is
/// undefined, so there is nothing to preserve).
pub trait Vec2Ext {
    /// Angle of the vector in radians, in (-π, π]
    fn angle(self) -> f32;
    /// Rotate by `angle` radians (counter-clockwise)
    fn rotated(self, angle: f32) -> Vec2;
    /// Same magnitude, new direction
    fn with_angle(self, angle: f32) -> Vec2;
    /// Same direction, new magnitude
    fn with_magnitude(self, magnitude: f32) -> Vec2;
    /// In-place rotation
    fn rotate_in_place(&mut self, angle: f32);
    /// In-place rescale preserving direction
    fn set_magnitude(&mut self, magnitude: f32);
}

impl Vec2Ext for Vec2 {
    #[inline]
    fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    #[inline]
    fn rotated(self, angle: f32) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    #[inline]
    fn with_angle(self, angle: f32) -> Vec2 {
        let len = self.length();
        Vec2::new(len * angle.cos(), len * angle.sin())
    }

    #[inline]
    fn with_magnitude(self, magnitude: f32) -> Vec2 {
        self.normalize_or_zero() * magnitude
    }

    #[inline]
    fn rotate_in_place(&mut self, angle: f32) {
        *self = self.rotated(angle);
    }

    #[inline]
    fn set_magnitude(&mut self, magnitude: f32) {
        *self = self.with_magnitude(magnitude);
    }
}

/// Cross product of two 2D vectors (z component of the 3D cross)
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Cross a scalar angular velocity with a vector: ω × r
#[inline]
pub fn cross_scalar(w: f32, r: Vec2) -> Vec2 {
    Vec2::new(-w * r.y, w * r.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_rotated_quarter_turn() {
        let v = Vec2::new(1.0, 0.0).rotated(FRAC_PI_2);
        assert!(v.x.abs() < 1e-6);
        assert!((v.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_with_angle_preserves_magnitude() {
        let v = Vec2::new(3.0, 4.0).with_angle(PI);
        assert!((v.length() - 5.0).abs() < 1e-5);
        assert!((v.angle() - PI).abs() < 1e-5 || (v.angle() + PI).abs() < 1e-5);
    }

    #[test]
    fn test_with_magnitude_preserves_angle() {
        let v = Vec2::new(3.0, 4.0);
        let scaled = v.with_magnitude(10.0);
        assert!((scaled.length() - 10.0).abs() < 1e-5);
        assert!((scaled.angle() - v.angle()).abs() < 1e-6);
    }

    #[test]
    fn test_with_magnitude_zero_vector() {
        // Angle is undefined for a zero vector; result stays zero
        assert_eq!(Vec2::ZERO.with_magnitude(5.0), Vec2::ZERO);
    }

    #[test]
    fn test_in_place_matches_pure() {
        let mut a = Vec2::new(2.0, -1.0);
        let b = a.rotated(0.7);
        a.rotate_in_place(0.7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_cross() {
        assert_eq!(cross(Vec2::X, Vec2::Y), 1.0);
        assert_eq!(cross(Vec2::Y, Vec2::X), -1.0);
        let r = cross_scalar(2.0, Vec2::new(1.0, 0.0));
        assert_eq!(r, Vec2::new(0.0, 2.0));
    }
}

use crate::{Interval, Vec3};

/// A query ray with origin, direction and a valid parameter range.
///
/// A point `origin + t * direction` is only considered by intersection
/// queries when `tnear <= t <= tfar`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub tnear: f32,
    pub tfar: f32,
}

impl Ray {
    /// Create an unbounded ray (`tnear = 0`, `tfar = inf`).
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self::with_extent(origin, direction, 0.0, f32::INFINITY)
    }

    /// Create a ray restricted to `[tnear, tfar]`.
    pub fn with_extent(origin: Vec3, direction: Vec3, tnear: f32, tfar: f32) -> Self {
        Self {
            origin,
            direction,
            tnear,
            tfar,
        }
    }

    /// The valid parameter range as an [`Interval`].
    #[inline]
    pub fn extent(&self) -> Interval {
        Interval::new(self.tnear, self.tfar)
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::NEG_Z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);

        assert_eq!(ray.at(0.0), Vec3::ZERO);
        assert_eq!(ray.at(2.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(ray.at(-1.0), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_ray_extent() {
        let unbounded = Ray::new(Vec3::ZERO, Vec3::Y);
        assert_eq!(unbounded.extent(), Interval::new(0.0, f32::INFINITY));

        let bounded = Ray::with_extent(Vec3::ZERO, Vec3::Y, 0.5, 100.0);
        assert!(bounded.extent().contains(50.0));
        assert!(!bounded.extent().contains(0.25));
    }
}

use crate::error::{GeometryError, Result};

use super::{Point3, Vector3, TOLERANCE};

/// A picking ray with a unit-length direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    origin: Point3,
    direction: Vector3,
}

impl Ray {
    /// Creates a ray, normalizing `direction`.
    ///
    /// # Errors
    ///
    /// Returns an error if `direction` has zero length.
    pub fn new(origin: Point3, direction: Vector3) -> Result<Self> {
        let len = direction.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(Self {
            origin,
            direction: direction / len,
        })
    }

    /// Returns the ray origin.
    #[must_use]
    pub fn origin(&self) -> &Point3 {
        &self.origin
    }

    /// Returns the unit direction.
    #[must_use]
    pub fn direction(&self) -> &Vector3 {
        &self.direction
    }

    /// Returns the point at parameter `t` along the ray.
    #[must_use]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + self.direction * t
    }

    /// Discriminant of the ray/sphere quadratic.
    ///
    /// With `dst = origin - center`, `B = dst . dir` and
    /// `C = dst . dst - r^2`, the discriminant is `B^2 - C`.
    #[must_use]
    pub fn sphere_discriminant(&self, center: &Point3, radius: f64) -> f64 {
        let dst = self.origin - center;
        let b = dst.dot(&self.direction);
        let c = dst.dot(&dst) - radius * radius;
        b * b - c
    }

    /// Returns `true` iff the ray's line crosses the sphere.
    ///
    /// A tangent ray (discriminant exactly zero) does not count as a hit.
    #[must_use]
    pub fn intersects_sphere(&self, center: &Point3, radius: f64) -> bool {
        self.sphere_discriminant(center, radius) > 0.0
    }

    /// Distance along the ray to the first crossing of the sphere, if any.
    #[must_use]
    pub fn sphere_distance(&self, center: &Point3, radius: f64) -> Option<f64> {
        let d = self.sphere_discriminant(center, radius);
        if d <= 0.0 {
            return None;
        }
        let b = (self.origin - center).dot(&self.direction);
        Some(-b - d.sqrt())
    }
}

pub mod ray;
pub mod triangle;

pub use ray::Ray;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Unit quaternion used for body orientations.
pub type UnitQuaternion = nalgebra::UnitQuaternion<f64>;

/// Rigid transform (rotation + translation) of a body.
pub type Isometry3 = nalgebra::Isometry3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Returns the centroid of a set of points, or `None` if the set is empty.
#[must_use]
pub fn centroid(points: &[Point3]) -> Option<Point3> {
    if points.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_square() {
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let c = centroid(&pts);
        assert_eq!(c, Some(Point3::new(0.5, 0.0, 0.5)));
    }

    #[test]
    fn centroid_of_nothing() {
        assert!(centroid(&[]).is_none());
    }
}

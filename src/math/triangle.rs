use super::{Point3, Ray, Vector3, TOLERANCE};

/// Unit normal of triangle `(a, b, c)` from the cross product of its edges.
///
/// Counter-clockwise winding (seen from the normal side) is positive.
/// Degenerate triangles yield the zero vector.
#[must_use]
pub fn triangle_normal(a: &Point3, b: &Point3, c: &Point3) -> Vector3 {
    let n = (b - a).cross(&(c - a));
    n.try_normalize(TOLERANCE).unwrap_or_else(Vector3::zeros)
}

/// Ray/triangle intersection (Moller-Trumbore).
///
/// Returns the ray parameter of the hit, counting both faces.
#[must_use]
pub fn ray_triangle(ray: &Ray, tri: &[Point3; 3]) -> Option<f64> {
    let e1 = tri[1] - tri[0];
    let e2 = tri[2] - tri[0];
    let pvec = ray.direction().cross(&e2);
    let det = e1.dot(&pvec);
    if det.abs() < TOLERANCE {
        return None;
    }
    let inv = 1.0 / det;
    let tvec = ray.origin() - tri[0];
    let u = tvec.dot(&pvec) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(&e1);
    let v = ray.direction().dot(&qvec) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&qvec) * inv;
    (t > TOLERANCE).then_some(t)
}

use std::f64::consts::PI;

use nalgebra::Unit;

use crate::error::{OperationError, Result};
use crate::math::{Point3, UnitQuaternion, Vector3, TOLERANCE};

use super::TriangleMesh;

/// Generates an open "bag": a half circle revolved half a turn about the
/// line joining its end points.
///
/// The end points of every revolved copy lie on the axis, so the raw mesh
/// carries one duplicate vertex per copy at each end. Run it through
/// [`Deduplicate`](super::Deduplicate) before building a deformable body.
pub struct BagMesh {
    center: Point3,
    radius: f64,
    line_res: usize,
    rot_res: usize,
}

impl BagMesh {
    /// Creates a new `BagMesh` generator with 80 x 80 resolution.
    #[must_use]
    pub fn new(center: Point3, radius: f64) -> Self {
        Self {
            center,
            radius,
            line_res: 80,
            rot_res: 80,
        }
    }

    /// Sets the points per half circle and the number of revolved copies.
    #[must_use]
    pub fn with_resolution(mut self, line_res: usize, rot_res: usize) -> Self {
        self.line_res = line_res;
        self.rot_res = rot_res;
        self
    }

    /// Builds the mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is near zero or either resolution is
    /// below 2.
    pub fn execute(&self) -> Result<TriangleMesh> {
        if self.radius < TOLERANCE {
            return Err(OperationError::InvalidInput("bag radius must be positive".into()).into());
        }
        if self.line_res < 2 || self.rot_res < 2 {
            return Err(
                OperationError::InvalidInput("bag resolution must be at least 2".into()).into(),
            );
        }

        let base = half_circle(self.radius, self.line_res);
        let axis = Unit::new_normalize(base[self.line_res - 1] - base[0]);

        let mut mesh = TriangleMesh::new();
        for i in 0..self.rot_res {
            let theta = lerp(i, self.rot_res, PI, 2.0 * PI);
            let rotation = UnitQuaternion::from_axis_angle(&axis, theta);
            for point in &base {
                mesh.append_vertex(Point3::from(rotation * point.coords + self.center.coords));
            }
        }

        let index = |i: usize, j: usize| u32::try_from(i * self.line_res + j).unwrap_or(u32::MAX);
        for i in 1..self.rot_res {
            for j in 1..self.line_res {
                let a = index(i - 1, j - 1);
                let b = index(i - 1, j);
                let c = index(i, j - 1);
                let d = index(i, j);
                mesh.append_triangle(a, b, d);
                mesh.append_triangle(a, d, c);
            }
        }

        Ok(mesh)
    }
}

/// Half circle of `res` points in the XZ plane, from `+X` through `+Z` to `-X`.
fn half_circle(radius: f64, res: usize) -> Vec<Point3> {
    (0..res)
        .map(|i| {
            // Pin the far end on the axis; sin(pi) is not exactly zero.
            if i == res - 1 {
                return Point3::new(-radius, 0.0, 0.0);
            }
            let theta = lerp(i, res, 0.0, PI);
            Point3::new(theta.cos() * radius, 0.0, theta.sin() * radius)
        })
        .collect()
}

/// Maps step `i` of `n` onto `[from, to]`, end points included.
#[allow(clippy::cast_precision_loss)]
fn lerp(i: usize, n: usize, from: f64, to: f64) -> f64 {
    from + (to - from) * (i as f64) / ((n - 1) as f64)
}

/// Closed latitude/longitude ellipsoid with outward winding.
///
/// `resolution` approximates the node count, matching the way deformable
/// spheres are requested from the engine.
pub struct Ellipsoid {
    center: Point3,
    radii: Vector3,
    resolution: usize,
}

impl Ellipsoid {
    /// Creates a new `Ellipsoid` generator.
    #[must_use]
    pub fn new(center: Point3, radii: Vector3, resolution: usize) -> Self {
        Self {
            center,
            radii,
            resolution,
        }
    }

    /// Builds the mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if any radius is near zero.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn execute(&self) -> Result<TriangleMesh> {
        if self.radii.iter().any(|r| *r < TOLERANCE) {
            return Err(
                OperationError::InvalidInput("ellipsoid radii must be positive".into()).into(),
            );
        }

        let segments = ((2.0 * self.resolution as f64).sqrt().round() as usize).max(4);
        let rings = (segments / 2).max(2);

        let c = self.center;
        let r = self.radii;
        let mut mesh = TriangleMesh::new();

        let north = mesh.append_vertex(Point3::new(c.x, c.y + r.y, c.z));
        for ring in 1..=rings {
            let phi = PI * ring as f64 / (rings + 1) as f64;
            for s in 0..segments {
                let theta = 2.0 * PI * s as f64 / segments as f64;
                mesh.append_vertex(Point3::new(
                    c.x + r.x * phi.sin() * theta.cos(),
                    c.y + r.y * phi.cos(),
                    c.z + r.z * phi.sin() * theta.sin(),
                ));
            }
        }
        let south = mesh.append_vertex(Point3::new(c.x, c.y - r.y, c.z));

        let at = |ring: usize, s: usize| {
            u32::try_from(1 + ring * segments + s % segments).unwrap_or(u32::MAX)
        };

        for s in 0..segments {
            mesh.append_triangle(north, at(0, s + 1), at(0, s));
        }
        for ring in 0..rings - 1 {
            for s in 0..segments {
                let a = at(ring, s);
                let b = at(ring, s + 1);
                let lc = at(ring + 1, s);
                let ld = at(ring + 1, s + 1);
                mesh.append_triangle(a, b, ld);
                mesh.append_triangle(a, ld, lc);
            }
        }
        for s in 0..segments {
            mesh.append_triangle(at(rings - 1, s), at(rings - 1, s + 1), south);
        }

        Ok(mesh)
    }
}

use crate::engine::{EngineResult, PhysicsWorld};
use crate::export::Exporter;
use crate::math::triangle::triangle_normal;
use crate::math::{centroid, Point3, Vector3};

use super::joint::Joint;

/// One quadrilateral patch of a link mesh.
///
/// The four corners are the midpoints of the joints around the patch:
///
/// ```text
///  depth =>
///
///  solid_1 ---- joints[0] ---- solid_2
///     |       /     |     \       |
///  joints[3]  --- center ---  joints[1]
///     |       \     |     /       |
///  solid_4 ---- joints[2] ---- solid_3
///
///  width
///   ||
///   \/
/// ```
///
/// Triangles and normals are recomputed every tick from the live joint
/// positions.
#[derive(Debug, Clone, PartialEq)]
pub struct JointCell {
    joints: [usize; 4],
    triangles: [[Point3; 3]; 6],
    normals: [Vector3; 6],
}

impl JointCell {
    /// Creates a cell over the joints at these indices, in corner order.
    #[must_use]
    pub fn new(joints: [usize; 4]) -> Self {
        Self {
            joints,
            triangles: [[Point3::origin(); 3]; 6],
            normals: [Vector3::zeros(); 6],
        }
    }

    /// Indices of the corner joints.
    #[must_use]
    pub fn joints(&self) -> &[usize; 4] {
        &self.joints
    }

    #[must_use]
    pub fn triangles(&self) -> &[[Point3; 3]; 6] {
        &self.triangles
    }

    #[must_use]
    pub fn normals(&self) -> &[Vector3; 6] {
        &self.normals
    }

    /// Recomputes the geometry from the joints' current midpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if a corner joint's constraint is gone.
    pub fn update(&mut self, joints: &[Joint], world: &dyn PhysicsWorld) -> EngineResult<()> {
        let mut corners = [Point3::origin(); 4];
        for (corner, &index) in corners.iter_mut().zip(&self.joints) {
            if let Some(joint) = joints.get(index) {
                *corner = joint.midpoint(world)?;
            }
        }
        self.calculate_triangles(&corners);
        Ok(())
    }

    /// Rebuilds the six triangles from four corners given in cyclic order.
    ///
    /// The first four fan around the corners' centroid; the last two split
    /// the quad along the `corners[0]`-`corners[2]` diagonal. All six keep
    /// the corners' winding. Degenerate triangles get a zero normal.
    pub fn calculate_triangles(&mut self, corners: &[Point3; 4]) {
        let center = centroid(corners).unwrap_or_else(Point3::origin);
        let [p0, p1, p2, p3] = *corners;
        self.triangles = [
            [center, p0, p1],
            [center, p1, p2],
            [center, p2, p3],
            [center, p3, p0],
            [p0, p1, p2],
            [p0, p2, p3],
        ];
        for (normal, [a, b, c]) in self.normals.iter_mut().zip(&self.triangles) {
            *normal = triangle_normal(a, b, c);
        }
    }

    pub fn save(&self, exporter: &mut dyn Exporter) {
        for triangle in &self.triangles {
            exporter.triangle(triangle);
        }
    }
}

use crate::color::Color;
use crate::engine::PhysicsWorld;
use crate::math::triangle::triangle_normal;
use crate::math::{Isometry3, Point3, Vector3};
use crate::mesh::TriangleMesh;

use super::{Canvas, Visual};

/// Sphere drawn at the body pose.
///
/// Declares its own radius for picking: the engine reports the sphere
/// around the body's AABB, which is looser than the sphere itself.
#[derive(Debug, Clone)]
pub struct SphereVisual {
    radius: f64,
    color: Color,
}

impl SphereVisual {
    #[must_use]
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            color: Color::WHITE,
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

impl Visual for SphereVisual {
    fn draw(&self, pose: &Isometry3, _world: &dyn PhysicsWorld, canvas: &mut dyn Canvas) {
        canvas.sphere(pose, self.radius, self.color);
    }

    fn alternate_bounding_radius(&self) -> Option<f64> {
        Some(self.radius)
    }
}

/// Box drawn at the body pose.
#[derive(Debug, Clone)]
pub struct BoxVisual {
    half_extents: Vector3,
}

impl BoxVisual {
    /// Creates a box visual from full edge lengths.
    #[must_use]
    pub fn new(dimensions: &Vector3) -> Self {
        Self {
            half_extents: dimensions / 2.0,
        }
    }
}

impl Visual for BoxVisual {
    fn draw(&self, pose: &Isometry3, _world: &dyn PhysicsWorld, canvas: &mut dyn Canvas) {
        canvas.cuboid(pose, &self.half_extents, Color::WHITE);
    }
}

/// Flat rectangle drawn at the body pose.
#[derive(Debug, Clone)]
pub struct PlaneVisual {
    dimensions: Vector3,
}

impl PlaneVisual {
    #[must_use]
    pub fn new(dimensions: Vector3) -> Self {
        Self { dimensions }
    }
}

impl Visual for PlaneVisual {
    fn draw(&self, pose: &Isometry3, _world: &dyn PhysicsWorld, canvas: &mut dyn Canvas) {
        canvas.plane(pose, &self.dimensions, Color::WHITE);
    }
}

/// Scaled triangle mesh drawn at the body pose.
#[derive(Debug, Clone)]
pub struct MeshVisual {
    mesh: TriangleMesh,
}

impl MeshVisual {
    /// Scales `mesh` component-wise once, up front.
    #[must_use]
    pub fn new(mesh: &TriangleMesh, scale: &Vector3) -> Self {
        Self {
            mesh: mesh.scaled(scale),
        }
    }

    /// World-space triangles at `pose`.
    fn world_triangles(&self, pose: &Isometry3) -> Vec<[Point3; 3]> {
        self.mesh
            .triangles()
            .map(|[a, b, c]| [pose * a, pose * b, pose * c])
            .collect()
    }
}

impl Visual for MeshVisual {
    fn draw(&self, pose: &Isometry3, _world: &dyn PhysicsWorld, canvas: &mut dyn Canvas) {
        let triangles = self.world_triangles(pose);
        let normals: Vec<Vector3> = triangles
            .iter()
            .map(|[a, b, c]| triangle_normal(a, b, c))
            .collect();
        canvas.triangles(&triangles, &normals, Color::WHITE);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::SimpleWorld;
    use crate::visual::testing::RecordingCanvas;

    #[test]
    fn sphere_declares_radius() {
        let visual = SphereVisual::new(2.5);
        assert_eq!(visual.alternate_bounding_radius(), Some(2.5));
    }

    #[test]
    fn box_takes_full_dimensions() {
        let visual = BoxVisual::new(&Vector3::new(2.0, 4.0, 6.0));
        assert_eq!(visual.half_extents, Vector3::new(1.0, 2.0, 3.0));
        assert!(visual.alternate_bounding_radius().is_none());
    }

    #[test]
    fn mesh_visual_places_scaled_triangles() {
        let mut mesh = TriangleMesh::new();
        mesh.append_vertex(Point3::new(0.0, 0.0, 0.0));
        mesh.append_vertex(Point3::new(1.0, 0.0, 0.0));
        mesh.append_vertex(Point3::new(0.0, 1.0, 0.0));
        mesh.append_triangle(0, 1, 2);
        let visual = MeshVisual::new(&mesh, &Vector3::repeat(2.0));

        let world = SimpleWorld::default();
        let mut canvas = RecordingCanvas::default();
        visual.draw(&Isometry3::translation(0.0, 0.0, 5.0), &world, &mut canvas);

        assert_eq!(canvas.triangles[0][1], Point3::new(2.0, 0.0, 5.0));
        assert_eq!(canvas.normals, vec![Vector3::z()]);
    }
}

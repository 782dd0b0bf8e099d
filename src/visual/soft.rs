use crate::color::Color;
use crate::engine::{BodyHandle, PhysicsWorld};
use crate::export::Exporter;
use crate::math::triangle::{ray_triangle, triangle_normal};
use crate::math::{Isometry3, Point3, Ray, Vector3};

use super::{Canvas, Visual};

/// Draws the live faces of a deformable body.
///
/// Holds only the body handle; the owning solid keeps the body alive.
#[derive(Debug, Clone)]
pub struct SoftBodyVisual {
    body: BodyHandle,
    color: Color,
}

impl SoftBodyVisual {
    #[must_use]
    pub fn new(body: BodyHandle, color: Color) -> Self {
        Self { body, color }
    }

    fn faces(&self, world: &dyn PhysicsWorld) -> Vec<[Point3; 3]> {
        world.soft_faces(self.body).unwrap_or_default()
    }
}

impl Visual for SoftBodyVisual {
    fn draw(&self, _pose: &Isometry3, world: &dyn PhysicsWorld, canvas: &mut dyn Canvas) {
        let faces = self.faces(world);
        let normals: Vec<Vector3> = faces
            .iter()
            .map(|[a, b, c]| triangle_normal(a, b, c))
            .collect();
        canvas.triangles(&faces, &normals, self.color);
    }

    fn intersects_ray(&self, ray: &Ray, world: &dyn PhysicsWorld) -> Option<bool> {
        Some(
            self.faces(world)
                .iter()
                .any(|face| ray_triangle(ray, face).is_some()),
        )
    }

    fn save(&self, world: &dyn PhysicsWorld, exporter: &mut dyn Exporter) {
        for face in &self.faces(world) {
            exporter.triangle(face);
        }
    }
}

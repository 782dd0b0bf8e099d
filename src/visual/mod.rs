//! Drawable representations owned by solids.

mod rigid;
mod soft;

pub use rigid::{BoxVisual, MeshVisual, PlaneVisual, SphereVisual};
pub use soft::SoftBodyVisual;

use crate::color::Color;
use crate::engine::PhysicsWorld;
use crate::export::Exporter;
use crate::math::{Isometry3, Point3, Ray, Vector3};

/// Receives draw calls. Implemented by the rendering layer.
pub trait Canvas {
    /// Draws a sphere centered at the pose origin.
    fn sphere(&mut self, pose: &Isometry3, radius: f64, color: Color);

    /// Draws a box centered at the pose origin.
    fn cuboid(&mut self, pose: &Isometry3, half_extents: &Vector3, color: Color);

    /// Draws a flat rectangle of `dimensions` (x by z) centered at the pose origin.
    fn plane(&mut self, pose: &Isometry3, dimensions: &Vector3, color: Color);

    /// Draws world-space triangles with one normal per triangle.
    fn triangles(&mut self, triangles: &[[Point3; 3]], normals: &[Vector3], color: Color);
}

/// Drawable owned by a [`Solid`](crate::solid::Solid).
///
/// A visual never owns engine state. Soft-body visuals refer back to their
/// body through its handle only, for queries.
pub trait Visual {
    /// Draws the visual at `pose`.
    fn draw(&self, pose: &Isometry3, world: &dyn PhysicsWorld, canvas: &mut dyn Canvas);

    /// Radius to use for picking instead of the engine's bounding sphere.
    fn alternate_bounding_radius(&self) -> Option<f64> {
        None
    }

    /// Fine-grained ray test. `None` means the visual has no such test.
    fn intersects_ray(&self, _ray: &Ray, _world: &dyn PhysicsWorld) -> Option<bool> {
        None
    }

    /// Hands exportable geometry to `exporter`.
    fn save(&self, _world: &dyn PhysicsWorld, _exporter: &mut dyn Exporter) {}
}

use std::f64::consts::{FRAC_PI_2, PI};
use std::rc::Rc;

use tracing::debug;

use crate::color::Color;
use crate::engine::{BodyHandle, CollisionShape, RigidBodyDesc, SoftBodyDesc, SoftShape};
use crate::error::Result;
use crate::math::{Point3, UnitQuaternion, Vector3};
use crate::mesh::TriangleMesh;
use crate::solid::Solid;
use crate::visual::{BoxVisual, MeshVisual, PlaneVisual, SoftBodyVisual, SphereVisual};

use super::StructureFactory;

impl StructureFactory {
    /// Creates a dynamic rigid sphere with density 1 and the current gravity.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the body.
    pub fn create_rigid_sphere(&mut self, position: Point3, radius: f64) -> Result<Solid> {
        let body = self.rigid_sphere_body(position, radius)?;
        Ok(Solid::rigid(
            Rc::clone(&self.world),
            body,
            Some(Box::new(SphereVisual::new(radius))),
        ))
    }

    /// Creates a pressurized deformable sphere with the sphere material.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the body.
    pub fn create_soft_sphere(&mut self, position: Point3, radius: f64) -> Result<Solid> {
        let body = self.soft_sphere_body(position, radius, self.config.soft_sphere_resolution)?;
        Ok(self.soft_sphere_solid(body))
    }

    /// Creates a dynamic box of unit mass. `dimensions` are full edge lengths.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the body.
    pub fn create_solid_box(&mut self, dimensions: Vector3, position: Point3) -> Result<Solid> {
        let body = self.world.borrow_mut().add_rigid_body(RigidBodyDesc::new(
            CollisionShape::Cuboid {
                half_extents: dimensions / 2.0,
            },
            position,
            1.0,
        ))?;
        debug!(?body, ?dimensions, "solid box created");
        Ok(Solid::rigid(
            Rc::clone(&self.world),
            body,
            Some(Box::new(BoxVisual::new(&dimensions))),
        ))
    }

    /// Creates an immovable, invisible box.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the body.
    pub fn create_static_box(&mut self, dimensions: Vector3, position: Point3) -> Result<Solid> {
        let body = self.world.borrow_mut().add_rigid_body(RigidBodyDesc::new(
            CollisionShape::Cuboid {
                half_extents: dimensions / 2.0,
            },
            position,
            0.0,
        ))?;
        debug!(?body, ?dimensions, "static box created");
        Ok(Solid::rigid(Rc::clone(&self.world), body, None))
    }

    /// Creates an immovable ground plane facing up whose surface passes
    /// through `position`. `dimensions` only size the drawn rectangle.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the body.
    pub fn create_plane(&mut self, dimensions: Vector3, position: Point3) -> Result<Solid> {
        let body = self.world.borrow_mut().add_rigid_body(RigidBodyDesc::new(
            CollisionShape::StaticPlane {
                normal: Vector3::y(),
                offset: 1.0,
            },
            position - Vector3::y(),
            0.0,
        ))?;
        debug!(?body, "ground plane created");
        Ok(Solid::rigid(
            Rc::clone(&self.world),
            body,
            Some(Box::new(PlaneVisual::new(dimensions))),
        ))
    }

    /// Creates a rigid body from the convex hull of `mesh`, turned a quarter
    /// turn about X.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the body.
    pub fn create_rigid_mesh(
        &mut self,
        mesh: &TriangleMesh,
        position: Point3,
        scale: Vector3,
        mass: f64,
    ) -> Result<Solid> {
        let desc = RigidBodyDesc::new(
            CollisionShape::ConvexHull {
                points: mesh.vertices.clone(),
                scale,
            },
            position,
            mass,
        )
        .with_rotation(rotation_x(FRAC_PI_2));
        let body = self.world.borrow_mut().add_rigid_body(desc)?;
        debug!(?body, vertices = mesh.num_vertices(), "rigid mesh created");
        let visual = MeshVisual::new(mesh, &scale);
        Ok(Solid::rigid(
            Rc::clone(&self.world),
            body,
            Some(Box::new(visual)),
        ))
    }

    /// Adds a rigid sphere body of density 1 carrying the current gravity.
    pub(super) fn rigid_sphere_body(&mut self, position: Point3, radius: f64) -> Result<BodyHandle> {
        let mass = 4.0 / 3.0 * PI * radius.powi(3);
        let desc = RigidBodyDesc::new(CollisionShape::Sphere { radius }, position, mass)
            .with_gravity(Vector3::new(0.0, self.config.gravity, 0.0));
        let body = self.world.borrow_mut().add_rigid_body(desc)?;
        debug!(?body, radius, mass, "rigid sphere created");
        Ok(body)
    }

    /// Adds a deformable sphere body with the sphere material.
    pub(super) fn soft_sphere_body(
        &mut self,
        position: Point3,
        radius: f64,
        resolution: usize,
    ) -> Result<BodyHandle> {
        let desc = SoftBodyDesc {
            shape: SoftShape::Ellipsoid {
                center: position,
                radii: Vector3::repeat(radius),
                resolution,
            },
            material: self.config.sphere_material,
            total_mass: Some(self.config.sphere_total_mass),
            clusters: self.config.sphere_clusters,
            self_collision: true,
        };
        let body = self.world.borrow_mut().add_soft_body(desc)?;
        debug!(?body, radius, resolution, "soft sphere created");
        Ok(body)
    }

    pub(super) fn soft_sphere_solid(&self, body: BodyHandle) -> Solid {
        let visual = SoftBodyVisual::new(body, Color::SPHERE);
        Solid::soft(Rc::clone(&self.world), body, Some(Box::new(visual)))
    }
}

/// Rotation about the X axis.
pub(super) fn rotation_x(angle: f64) -> UnitQuaternion {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angle)
}

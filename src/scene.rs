//! Per-frame context tying the factory, the solids and the link meshes
//! together.

use tracing::{debug, info};

use crate::engine::{DebugDraw, SharedWorld};
use crate::error::Result;
use crate::export::{export_scene, Exporter};
use crate::factory::{FactoryConfig, StructureFactory};
use crate::link_mesh::LinkMesh;
use crate::math::Ray;
use crate::registry::{ForcePanel, SolidId, SolidRegistry};
use crate::solid::{SelectionChange, Solid};
use crate::visual::Canvas;

/// Owns everything living in one physics world.
///
/// Teardown runs link meshes first (their joints, then their bodies), then
/// any remaining constraints, then registered solids in registry order,
/// and finally the factory, which shuts the world down.
#[derive(Debug)]
pub struct Scene {
    link_meshes: Vec<LinkMesh>,
    registry: SolidRegistry,
    factory: StructureFactory,
}

impl Scene {
    #[must_use]
    pub fn new(world: SharedWorld, config: FactoryConfig) -> Self {
        Self::with_factory(StructureFactory::new(world, config))
    }

    #[must_use]
    pub fn with_factory(factory: StructureFactory) -> Self {
        Self {
            link_meshes: Vec::new(),
            registry: SolidRegistry::new(),
            factory,
        }
    }

    #[must_use]
    pub fn factory(&self) -> &StructureFactory {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut StructureFactory {
        &mut self.factory
    }

    #[must_use]
    pub fn registry(&self) -> &SolidRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SolidRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn link_meshes(&self) -> &[LinkMesh] {
        &self.link_meshes
    }

    pub fn add_solid(&mut self, solid: Solid) -> SolidId {
        self.registry.add(solid)
    }

    pub fn add_solids(&mut self, solids: Vec<Solid>) -> Vec<SolidId> {
        self.registry.extend(solids)
    }

    pub fn add_link_mesh(&mut self, mesh: LinkMesh) {
        self.link_meshes.push(mesh);
    }

    /// Runs one tick.
    ///
    /// A changed gravity reaches the world, every registered solid and
    /// every link mesh before the world is stepped. Forces are re-applied
    /// before the step as well; cell geometry is recomputed after it.
    /// Returns the number of internal steps taken.
    ///
    /// # Errors
    ///
    /// Returns an error if a body or joint has gone missing from the world.
    pub fn update(&mut self) -> Result<usize> {
        if let Some(gravity) = self.factory.pending_gravity() {
            self.registry.set_gravity_all(gravity)?;
            for mesh in &self.link_meshes {
                mesh.set_gravity(gravity)?;
            }
            self.factory.commit_gravity(gravity);
            info!(gravity, solids = self.registry.len(), "gravity changed");
        }
        self.registry.update()?;
        let steps = self.factory.step();
        for mesh in &mut self.link_meshes {
            mesh.update()?;
        }
        Ok(steps)
    }

    /// Draws solids and link meshes, then forwards engine debug lines.
    pub fn draw(&self, canvas: &mut dyn Canvas, debug: &mut dyn DebugDraw) {
        self.registry.draw(canvas);
        for mesh in &self.link_meshes {
            mesh.draw(canvas);
        }
        self.factory.draw(debug);
    }

    /// Exports every solid, then every link mesh, one layer each.
    pub fn export(&self, exporter: &mut dyn Exporter) {
        export_scene(&self.registry, exporter);
        for mesh in &self.link_meshes {
            mesh.save(exporter);
        }
    }

    /// The nearest registered solid hit by `ray`.
    #[must_use]
    pub fn pick(&self, ray: &Ray) -> Option<SolidId> {
        self.registry.pick(ray)
    }

    /// Toggles selection of `id` under the factory's interaction settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no solid has this ID.
    pub fn select(&mut self, id: SolidId, panel: &mut dyn ForcePanel) -> Result<SelectionChange> {
        let settings = *self.factory.interaction();
        self.registry.select(id, &settings, panel)
    }

    /// Removes a registered solid along with every constraint on its body.
    ///
    /// # Errors
    ///
    /// Returns an error if no solid has this ID or a constraint cannot be
    /// removed.
    pub fn remove_solid(&mut self, id: SolidId) -> Result<()> {
        let body = self.registry.get(id)?.body();
        {
            let world = self.factory.world();
            let mut world = world.borrow_mut();
            for constraint in world.constraints_on(body) {
                world.remove_constraint(constraint)?;
            }
        }
        drop(self.registry.remove(id));
        debug!(?body, "solid removed");
        Ok(())
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        self.link_meshes.clear();
        self.factory.delete_constraints();
        self.registry.clear();
    }
}

//! Creation of solids and linked structures, and the per-tick driver.

mod config;
mod container;
mod lattice;
mod mesh_body;
mod primitives;

pub use config::{ContainerConfig, FactoryConfig, InteractionSettings};
pub use lattice::{LatticeDims, NeighborLinks};

use std::rc::Rc;

use tracing::{debug, error, info};

use crate::engine::{DebugDraw, SharedWorld};
use crate::error::{OperationError, Result};
use crate::math::Vector3;
use crate::mesh::TriangleMesh;
use crate::registry::SolidRegistry;

/// Callback run when a material coefficient changes.
pub type RebuildHook = Box<dyn FnMut()>;

/// Builds solids into a shared physics world and drives it once per tick.
///
/// Holds the process-wide configuration every creation call reads. On
/// drop the world's allocators are released, then the triangle meshes
/// kept alive for collision shapes are freed.
pub struct StructureFactory {
    world: SharedWorld,
    config: FactoryConfig,
    last_gravity: f64,
    retained_meshes: Vec<Rc<TriangleMesh>>,
    rebuild_hook: Option<RebuildHook>,
}

impl std::fmt::Debug for StructureFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructureFactory")
            .field("config", &self.config)
            .field("last_gravity", &self.last_gravity)
            .field("retained_meshes", &self.retained_meshes.len())
            .field("has_rebuild_hook", &self.rebuild_hook.is_some())
            .finish_non_exhaustive()
    }
}

impl StructureFactory {
    /// Creates a factory over `world` and applies the configured gravity.
    #[must_use]
    pub fn new(world: SharedWorld, config: FactoryConfig) -> Self {
        world
            .borrow_mut()
            .set_gravity(Vector3::new(0.0, config.gravity, 0.0));
        info!(gravity = config.gravity, "structure factory ready");
        Self {
            world,
            last_gravity: config.gravity,
            config,
            retained_meshes: Vec::new(),
            rebuild_hook: None,
        }
    }

    /// The shared physics world.
    #[must_use]
    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    #[must_use]
    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Mutable access for settings that take effect on the next creation
    /// call (orientation, interaction switches, resolutions).
    pub fn config_mut(&mut self) -> &mut FactoryConfig {
        &mut self.config
    }

    #[must_use]
    pub fn interaction(&self) -> &InteractionSettings {
        &self.config.interaction
    }

    #[must_use]
    pub fn gravity(&self) -> f64 {
        self.config.gravity
    }

    /// Stores a new gravity value. It reaches the world and the solids on
    /// the next [`update`](Self::update).
    ///
    /// # Errors
    ///
    /// Returns an error if `gravity` is not finite. The stored value is kept.
    pub fn set_gravity(&mut self, gravity: f64) -> Result<()> {
        if !gravity.is_finite() {
            return Err(OperationError::InvalidInput(format!(
                "gravity must be finite, got {gravity}"
            ))
            .into());
        }
        self.config.gravity = gravity;
        Ok(())
    }

    /// Runs one tick for the solids in `registry`.
    ///
    /// A gravity value changed since the last tick is pushed to every
    /// solid and then to the world. Then sustained forces are re-applied
    /// and the world is stepped. Returns the number of internal steps
    /// taken.
    ///
    /// If a solid rejects the new gravity the change stays pending and the
    /// whole push is repeated on the next tick.
    ///
    /// # Errors
    ///
    /// Returns an error if a solid's body has gone missing from the world.
    pub fn update(&mut self, registry: &SolidRegistry) -> Result<usize> {
        if let Some(gravity) = self.pending_gravity() {
            registry.set_gravity_all(gravity)?;
            self.commit_gravity(gravity);
            info!(gravity, solids = registry.len(), "gravity changed");
        }
        registry.update()?;
        Ok(self.step())
    }

    /// The gravity value changed since the last commit, or `None`.
    #[must_use]
    pub fn pending_gravity(&self) -> Option<f64> {
        let gravity = self.config.gravity;
        (gravity.to_bits() != self.last_gravity.to_bits()).then_some(gravity)
    }

    /// Pushes `gravity` to the world and closes the change gate.
    ///
    /// Call it only once every solid has received the value.
    pub fn commit_gravity(&mut self, gravity: f64) {
        self.last_gravity = gravity;
        self.world
            .borrow_mut()
            .set_gravity(Vector3::new(0.0, gravity, 0.0));
    }

    /// Advances the world by the configured time step.
    pub fn step(&mut self) -> usize {
        self.world
            .borrow_mut()
            .step(self.config.time_step, self.config.max_substeps)
    }

    /// Forwards the engine's debug lines to `drawer` when debug drawing is on.
    pub fn draw(&self, drawer: &mut dyn DebugDraw) {
        if self.config.debug_draw {
            self.world.borrow().debug_draw(drawer);
        }
    }

    /// Removes every constraint from the world. Returns how many were removed.
    pub fn delete_constraints(&mut self) -> usize {
        let mut world = self.world.borrow_mut();
        let mut removed = 0;
        for constraint in world.constraints() {
            match world.remove_constraint(constraint) {
                Ok(()) => removed += 1,
                Err(err) => error!(?constraint, %err, "failed to remove constraint"),
            }
        }
        debug!(removed, "constraints deleted");
        removed
    }

    /// Registers the callback run by [`physics_param_changed`](Self::physics_param_changed).
    pub fn set_rebuild_hook(&mut self, hook: impl FnMut() + 'static) {
        self.rebuild_hook = Some(Box::new(hook));
    }

    pub fn adjust_dynamic_friction(&mut self, value: f64) {
        self.config.mesh_material.dynamic_friction = value;
        self.physics_param_changed();
    }

    pub fn adjust_damping(&mut self, value: f64) {
        self.config.mesh_material.damping = value;
        self.physics_param_changed();
    }

    pub fn adjust_drag(&mut self, value: f64) {
        self.config.mesh_material.drag = value;
        self.physics_param_changed();
    }

    pub fn adjust_pressure(&mut self, value: f64) {
        self.config.mesh_material.pressure = value;
        self.physics_param_changed();
    }

    pub fn adjust_pose_matching(&mut self, value: f64) {
        self.config.mesh_material.pose_matching = value;
        self.physics_param_changed();
    }

    /// Notifies the rebuild hook that the mesh material changed.
    ///
    /// Bodies already created keep their coefficients; only bodies built
    /// afterwards see the new values.
    pub fn physics_param_changed(&mut self) {
        debug!(material = ?self.config.mesh_material, "physics parameters changed");
        if let Some(hook) = self.rebuild_hook.as_mut() {
            hook();
        }
    }

    /// Keeps `mesh` alive until the world is torn down.
    fn retain_mesh(&mut self, mesh: TriangleMesh) -> Rc<TriangleMesh> {
        let mesh = Rc::new(mesh);
        self.retained_meshes.push(Rc::clone(&mesh));
        mesh
    }
}

impl Drop for StructureFactory {
    fn drop(&mut self) {
        match self.world.try_borrow_mut() {
            Ok(mut world) => world.shutdown(),
            Err(_) => error!("physics world busy; allocators not released"),
        }
        let meshes = self.retained_meshes.len();
        self.retained_meshes.clear();
        info!(meshes, "structure factory torn down");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::engine::{PhysicsWorld, SimpleWorld, TEARDOWN_ORDER};
    use crate::math::Point3;

    pub(crate) fn factory() -> (Rc<RefCell<SimpleWorld>>, StructureFactory) {
        let world = Rc::new(RefCell::new(SimpleWorld::default()));
        let shared: SharedWorld = world.clone();
        (world, StructureFactory::new(shared, FactoryConfig::default()))
    }

    #[test]
    fn new_applies_gravity() {
        let (world, _factory) = factory();
        assert_eq!(world.borrow().gravity(), Vector3::new(0.0, -9.8, 0.0));
    }

    #[test]
    fn gravity_push_happens_once_per_change() {
        let (world, mut factory) = factory();
        let mut registry = SolidRegistry::new();
        registry.add(factory.create_rigid_sphere(Point3::origin(), 1.0).unwrap());
        registry.add(factory.create_rigid_sphere(Point3::new(3.0, 0.0, 0.0), 1.0).unwrap());

        for _ in 0..5 {
            factory.update(&registry).unwrap();
        }
        assert_eq!(world.borrow().stats().body_gravity_calls, 0);

        factory.set_gravity(-1.0).unwrap();
        for _ in 0..5 {
            factory.update(&registry).unwrap();
        }
        assert_eq!(world.borrow().stats().body_gravity_calls, 2);
        assert_eq!(world.borrow().gravity(), Vector3::new(0.0, -1.0, 0.0));
        assert_eq!(world.borrow().stats().steps, 10);
    }

    #[test]
    fn gravity_reaches_world_before_step() {
        let (world, mut factory) = factory();
        let mut registry = SolidRegistry::new();
        let solid = factory.create_rigid_sphere(Point3::origin(), 1.0).unwrap();
        let body = solid.body();
        registry.add(solid);

        factory.set_gravity(5.0).unwrap();
        factory.update(&registry).unwrap();
        assert!(world.borrow().body_position(body).unwrap().y > 0.0);
    }

    #[test]
    fn gravity_change_is_retried_until_every_solid_has_it() {
        let (world, mut factory) = factory();
        let mut registry = SolidRegistry::new();
        let stale = factory.create_rigid_sphere(Point3::origin(), 1.0).unwrap();
        let stale_body = stale.body();
        let stale = registry.add(stale);
        let live = factory
            .create_rigid_sphere(Point3::new(3.0, 0.0, 0.0), 1.0)
            .unwrap();
        let live_body = live.body();
        registry.add(live);
        world.borrow_mut().remove_body(stale_body).unwrap();

        factory.set_gravity(-1.0).unwrap();
        assert!(factory.update(&registry).is_err());
        // Solids after the failing one still got the value.
        assert_eq!(
            world.borrow().body_gravity(live_body),
            Some(Vector3::new(0.0, -1.0, 0.0))
        );
        assert_eq!(factory.pending_gravity(), Some(-1.0));
        assert_eq!(world.borrow().gravity(), Vector3::new(0.0, -9.8, 0.0));

        drop(registry.remove(stale));
        factory.update(&registry).unwrap();
        factory.update(&registry).unwrap();
        assert_eq!(factory.pending_gravity(), None);
        assert_eq!(world.borrow().gravity(), Vector3::new(0.0, -1.0, 0.0));
        // Stale and live on the failed tick, live again on the retry.
        assert_eq!(world.borrow().stats().body_gravity_calls, 3);
    }

    #[test]
    fn non_finite_gravity_is_rejected() {
        let (_world, mut factory) = factory();
        assert!(factory.set_gravity(f64::NAN).is_err());
        assert!(factory.set_gravity(f64::NEG_INFINITY).is_err());
        assert_eq!(factory.gravity(), -9.8);
        assert_eq!(factory.pending_gravity(), None);
    }

    #[test]
    fn adjusters_notify_hook() {
        let (_world, mut factory) = factory();
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        factory.set_rebuild_hook(move || seen.set(seen.get() + 1));

        factory.adjust_dynamic_friction(0.5);
        factory.adjust_damping(0.2);
        factory.adjust_drag(0.3);
        factory.adjust_pressure(10.0);
        factory.adjust_pose_matching(0.9);

        assert_eq!(calls.get(), 5);
        let material = factory.config().mesh_material;
        assert_eq!(material.dynamic_friction, 0.5);
        assert_eq!(material.pose_matching, 0.9);
    }

    #[test]
    fn adjusting_leaves_existing_bodies_alone() {
        let (world, mut factory) = factory();
        let mesh = crate::mesh::BagMesh::new(Point3::origin(), 1.0)
            .with_resolution(6, 6)
            .execute()
            .unwrap();
        let solid = factory
            .create_mesh_body(&mesh, Vector3::repeat(1.0), false)
            .unwrap();
        factory.adjust_damping(0.25);
        let material = world.borrow().soft_material(solid.body()).unwrap();
        assert_eq!(material.damping, 1.0);
    }

    #[derive(Default)]
    struct Lines(usize);

    impl DebugDraw for Lines {
        fn line(&mut self, _from: &Point3, _to: &Point3, _color: crate::color::Color) {
            self.0 += 1;
        }
    }

    #[test]
    fn debug_draw_is_toggled() {
        let (_world, mut factory) = factory();
        let _pair = factory
            .create_linked_spheres(Point3::new(0.0, 10.0, 0.0), 1.0)
            .unwrap();
        let mut lines = Lines::default();
        factory.draw(&mut lines);
        assert_eq!(lines.0, 0);

        factory.config_mut().debug_draw = true;
        factory.draw(&mut lines);
        assert!(lines.0 > 0);
        factory.delete_constraints();
    }

    #[test]
    fn delete_constraints_empties_world() {
        let (world, mut factory) = factory();
        let _pair = factory
            .create_linked_spheres(Point3::new(0.0, 10.0, 0.0), 1.0)
            .unwrap();
        assert_eq!(world.borrow().constraints().len(), 1);
        assert_eq!(factory.delete_constraints(), 1);
        assert!(world.borrow().constraints().is_empty());
    }

    #[test]
    fn drop_shuts_world_down_in_order() {
        let (world, factory) = factory();
        drop(factory);
        assert_eq!(world.borrow().released_allocators(), &TEARDOWN_ORDER);
    }
}

//! Physics solids: one engine body plus an optional visual.

use tracing::{debug, error};

use crate::engine::{BodyHandle, PhysicsWorld, SharedWorld};
use crate::error::Result;
use crate::export::Exporter;
use crate::factory::InteractionSettings;
use crate::math::{Point3, Ray, Vector3};
use crate::mesh::TriangleMesh;
use crate::visual::{Canvas, Visual};

/// The kind of engine body a solid wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolidKind {
    /// Single-transform body. Takes a per-body gravity override, ignores forces.
    Rigid,
    /// Node-based deformable body. Follows world gravity, takes sustained forces.
    Soft,
}

/// Side effect requested by a selection change.
///
/// The force panel lives in the UI; the solid only reports what the panel
/// should do and the caller carries it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    /// Selection state did not change.
    Unchanged,
    /// The solid became selected.
    Selected { attach_force_panel: bool },
    /// The solid stopped being selected.
    Deselected { detach_force_panel: bool },
}

/// One engine body plus its optional visual.
///
/// Dropping a `Solid` removes its body from the world before the visual
/// is released. Constraints referencing the body must be removed first;
/// otherwise the world refuses the removal and the failure is logged.
pub struct Solid {
    kind: SolidKind,
    world: SharedWorld,
    body: BodyHandle,
    visual: Option<Box<dyn Visual>>,
    selected: bool,
    has_force: bool,
    force: Vector3,
    visible: bool,
}

impl std::fmt::Debug for Solid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solid")
            .field("kind", &self.kind)
            .field("body", &self.body)
            .field("has_visual", &self.visual.is_some())
            .field("selected", &self.selected)
            .field("has_force", &self.has_force)
            .field("force", &self.force)
            .field("visible", &self.visible)
            .finish()
    }
}

impl Solid {
    /// Wraps a rigid body already added to `world`.
    #[must_use]
    pub fn rigid(world: SharedWorld, body: BodyHandle, visual: Option<Box<dyn Visual>>) -> Self {
        Self::new(SolidKind::Rigid, world, body, visual)
    }

    /// Wraps a deformable body already added to `world`.
    #[must_use]
    pub fn soft(world: SharedWorld, body: BodyHandle, visual: Option<Box<dyn Visual>>) -> Self {
        Self::new(SolidKind::Soft, world, body, visual)
    }

    fn new(
        kind: SolidKind,
        world: SharedWorld,
        body: BodyHandle,
        visual: Option<Box<dyn Visual>>,
    ) -> Self {
        Self {
            kind,
            world,
            body,
            visual,
            selected: false,
            has_force: false,
            force: Vector3::zeros(),
            visible: true,
        }
    }

    #[must_use]
    pub fn kind(&self) -> SolidKind {
        self.kind
    }

    /// The engine handle of this solid's body.
    #[must_use]
    pub fn body(&self) -> BodyHandle {
        self.body
    }

    #[must_use]
    pub fn has_visual(&self) -> bool {
        self.visual.is_some()
    }

    #[must_use]
    pub fn selected(&self) -> bool {
        self.selected
    }

    #[must_use]
    pub fn has_force(&self) -> bool {
        self.has_force
    }

    #[must_use]
    pub fn force(&self) -> Vector3 {
        self.force
    }

    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Applies the global gravity scalar `g` along Y.
    ///
    /// Rigid solids receive the vector `(0, g, 0)` as their own gravity and
    /// are woken. Deformable solids are only woken: their gravity comes
    /// from the world and no per-body vector is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is no longer in the world.
    pub fn set_gravity(&self, g: f64) -> Result<()> {
        let mut world = self.world.borrow_mut();
        if self.kind == SolidKind::Rigid {
            world.set_body_gravity(self.body, Vector3::new(0.0, g, 0.0))?;
        }
        world.activate(self.body)?;
        Ok(())
    }

    /// Wakes the body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is no longer in the world.
    pub fn activate(&self) -> Result<()> {
        self.world.borrow_mut().activate(self.body)?;
        Ok(())
    }

    /// Bounding sphere used for picking: the engine's, with the radius
    /// replaced by the visual's when it declares one.
    fn picking_sphere(&self, world: &dyn PhysicsWorld) -> Option<(Point3, f64)> {
        let (center, radius) = world.bounding_sphere(self.body).ok()?;
        let radius = self
            .visual
            .as_ref()
            .and_then(|v| v.alternate_bounding_radius())
            .unwrap_or(radius);
        Some((center, radius))
    }

    /// Returns `true` if `ray` hits this solid.
    ///
    /// Deformable solids use their visual's per-triangle test when the
    /// visual offers one. Everything else tests the picking sphere, where a
    /// ray merely touching the sphere does not count as a hit.
    #[must_use]
    pub fn detect_selection(&self, ray: &Ray) -> bool {
        let world = self.world.borrow();
        if self.kind == SolidKind::Soft {
            if let Some(hit) = self
                .visual
                .as_ref()
                .and_then(|v| v.intersects_ray(ray, &*world))
            {
                return hit;
            }
        }
        self.picking_sphere(&*world)
            .is_some_and(|(center, radius)| ray.intersects_sphere(&center, radius))
    }

    /// Distance along `ray` to where it enters the picking sphere, if this
    /// solid is hit at all.
    #[must_use]
    pub fn hit_distance(&self, ray: &Ray) -> Option<f64> {
        if !self.detect_selection(ray) {
            return None;
        }
        let world = self.world.borrow();
        let (center, radius) = self.picking_sphere(&*world)?;
        ray.sphere_distance(&center, radius)
    }

    /// Toggles selection.
    ///
    /// Rigid solids always toggle. Deformable solids toggle only while
    /// `settings.allow_selection` is on; entering selection asks for the
    /// force panel when `settings.allow_forces` is also on, and leaving it
    /// always asks for the panel to be detached.
    pub fn select(&mut self, settings: &InteractionSettings) -> SelectionChange {
        match self.kind {
            SolidKind::Rigid => {
                self.selected = !self.selected;
                if self.selected {
                    SelectionChange::Selected {
                        attach_force_panel: false,
                    }
                } else {
                    SelectionChange::Deselected {
                        detach_force_panel: false,
                    }
                }
            }
            SolidKind::Soft => {
                if !settings.allow_selection {
                    return SelectionChange::Unchanged;
                }
                self.selected = !self.selected;
                if self.selected {
                    SelectionChange::Selected {
                        attach_force_panel: settings.allow_forces,
                    }
                } else {
                    SelectionChange::Deselected {
                        detach_force_panel: true,
                    }
                }
            }
        }
    }

    /// Sets the selection state.
    ///
    /// Deformable solids enter selection through [`select`](Self::select),
    /// so the same gating and panel requests apply; requesting selection of
    /// an already selected deformable solid changes nothing. Leaving
    /// selection is a plain state change for both kinds.
    pub fn set_selected(
        &mut self,
        selected: bool,
        settings: &InteractionSettings,
    ) -> SelectionChange {
        if self.kind == SolidKind::Soft && selected {
            if self.selected {
                return SelectionChange::Unchanged;
            }
            return self.select(settings);
        }
        if self.selected == selected {
            return SelectionChange::Unchanged;
        }
        self.selected = selected;
        if selected {
            SelectionChange::Selected {
                attach_force_panel: false,
            }
        } else {
            SelectionChange::Deselected {
                detach_force_panel: false,
            }
        }
    }

    /// Stores a velocity to hold the body at on every tick.
    ///
    /// Only deformable solids take forces; on rigid solids this is a no-op.
    pub fn set_force(&mut self, velocity: Vector3) {
        if self.kind == SolidKind::Rigid {
            debug!(body = ?self.body, "rigid solids ignore forces");
            return;
        }
        self.has_force = true;
        self.force = velocity;
    }

    /// Stops re-applying the stored velocity.
    pub fn remove_force(&mut self) {
        self.has_force = false;
    }

    /// Per-tick update: re-applies the stored velocity while a force is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is no longer in the world.
    pub fn update(&self) -> Result<()> {
        if self.kind == SolidKind::Soft && self.has_force {
            self.world
                .borrow_mut()
                .set_soft_velocity(self.body, self.force)?;
        }
        Ok(())
    }

    /// World-space position of the body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is no longer in the world.
    pub fn position(&self) -> Result<Point3> {
        Ok(self.world.borrow().body_position(self.body)?)
    }

    /// Snapshot of a deformable body's faces, three unshared vertices per face.
    ///
    /// # Errors
    ///
    /// Returns an error if the solid is rigid or its body is gone.
    pub fn get_mesh(&self) -> Result<TriangleMesh> {
        let faces = self.world.borrow().soft_faces(self.body)?;
        let mut mesh = TriangleMesh::new();
        for [a, b, c] in faces {
            let i = mesh.append_vertex(a);
            mesh.append_vertex(b);
            mesh.append_vertex(c);
            mesh.append_triangle(i, i + 1, i + 2);
        }
        Ok(mesh)
    }

    /// Draws the visual at the body's pose, if visible.
    pub fn draw(&self, canvas: &mut dyn Canvas) {
        if !self.visible {
            return;
        }
        let Some(visual) = &self.visual else {
            return;
        };
        let world = self.world.borrow();
        match world.body_pose(self.body) {
            Ok(pose) => visual.draw(&pose, &*world, canvas),
            Err(err) => debug!(body = ?self.body, %err, "skipping draw"),
        }
    }

    /// Exports this solid's geometry. Rigid solids export nothing.
    pub fn save(&self, exporter: &mut dyn Exporter) {
        if self.kind == SolidKind::Rigid {
            return;
        }
        if let Some(visual) = &self.visual {
            visual.save(&*self.world.borrow(), exporter);
        }
    }
}

impl Drop for Solid {
    fn drop(&mut self) {
        let Ok(mut world) = self.world.try_borrow_mut() else {
            error!(body = ?self.body, "physics world busy; body not removed");
            return;
        };
        if let Err(err) = world.remove_body(self.body) {
            error!(body = ?self.body, %err, "failed to remove body from the physics world");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::color::Color;
    use crate::engine::{
        CollisionShape, ConstraintDesc, RigidBodyDesc, SimpleWorld, SoftBodyDesc, SoftMaterial,
        SoftShape,
    };
    use crate::visual::{SoftBodyVisual, SphereVisual};

    pub(crate) fn world() -> (Rc<RefCell<SimpleWorld>>, SharedWorld) {
        let world = Rc::new(RefCell::new(SimpleWorld::default()));
        let shared: SharedWorld = world.clone();
        (world, shared)
    }

    pub(crate) fn rigid_ball(shared: &SharedWorld, at: Point3, radius: f64) -> Solid {
        let body = shared
            .borrow_mut()
            .add_rigid_body(RigidBodyDesc::new(
                CollisionShape::Sphere { radius },
                at,
                1.0,
            ))
            .unwrap();
        Solid::rigid(shared.clone(), body, Some(Box::new(SphereVisual::new(radius))))
    }

    pub(crate) fn soft_ball(shared: &SharedWorld, at: Point3) -> Solid {
        let body = shared
            .borrow_mut()
            .add_soft_body(SoftBodyDesc {
                shape: SoftShape::Ellipsoid {
                    center: at,
                    radii: Vector3::repeat(1.0),
                    resolution: 50,
                },
                material: SoftMaterial::default(),
                total_mass: Some(10.0),
                clusters: 0,
                self_collision: false,
            })
            .unwrap();
        let visual = SoftBodyVisual::new(body, Color::SPHERE);
        Solid::soft(shared.clone(), body, Some(Box::new(visual)))
    }

    fn open() -> InteractionSettings {
        InteractionSettings {
            allow_selection: true,
            allow_forces: true,
        }
    }

    #[test]
    fn rigid_gravity_sets_vector_and_wakes() {
        let (world, shared) = world();
        let solid = rigid_ball(&shared, Point3::origin(), 1.0);
        solid.set_gravity(-3.0).unwrap();
        let w = world.borrow();
        assert_eq!(w.body_gravity(solid.body()), Some(Vector3::new(0.0, -3.0, 0.0)));
        assert_eq!(w.stats().body_gravity_calls, 1);
        assert_eq!(w.stats().activations, 1);
    }

    #[test]
    fn soft_gravity_only_wakes() {
        let (world, shared) = world();
        let solid = soft_ball(&shared, Point3::origin());
        solid.set_gravity(-3.0).unwrap();
        let w = world.borrow();
        assert_eq!(w.stats().body_gravity_calls, 0);
        assert_eq!(w.stats().activations, 1);
    }

    #[test]
    fn rigid_picking_uses_declared_radius() {
        let (_world, shared) = world();
        let solid = rigid_ball(&shared, Point3::origin(), 1.0);
        // Inside the AABB sphere (radius sqrt 3) but outside the ball.
        let near_miss = Ray::new(Point3::new(1.2, 0.0, 5.0), -Vector3::z()).unwrap();
        let hit = Ray::new(Point3::new(0.5, 0.0, 5.0), -Vector3::z()).unwrap();
        assert!(!solid.detect_selection(&near_miss));
        assert!(solid.detect_selection(&hit));
    }

    #[test]
    fn tangent_ray_is_not_a_hit() {
        let (_world, shared) = world();
        let solid = rigid_ball(&shared, Point3::origin(), 1.0);
        let tangent = Ray::new(Point3::new(1.0, 0.0, 5.0), -Vector3::z()).unwrap();
        assert!(!solid.detect_selection(&tangent));
    }

    #[test]
    fn soft_picking_uses_faces() {
        let (_world, shared) = world();
        let solid = soft_ball(&shared, Point3::origin());
        let hit = Ray::new(Point3::new(0.1, 0.2, 5.0), -Vector3::z()).unwrap();
        let miss = Ray::new(Point3::new(1.5, 0.0, 5.0), -Vector3::z()).unwrap();
        assert!(solid.detect_selection(&hit));
        assert!(!solid.detect_selection(&miss));
        assert!(solid.hit_distance(&hit).unwrap() > 0.0);
    }

    #[test]
    fn rigid_select_toggles() {
        let (_world, shared) = world();
        let mut solid = rigid_ball(&shared, Point3::origin(), 1.0);
        let closed = InteractionSettings::default();
        assert!(matches!(solid.select(&closed), SelectionChange::Selected { .. }));
        assert!(solid.selected());
        assert!(matches!(solid.select(&closed), SelectionChange::Deselected { .. }));
        assert!(!solid.selected());
    }

    #[test]
    fn soft_selection_is_gated() {
        let (_world, shared) = world();
        let mut solid = soft_ball(&shared, Point3::origin());
        let closed = InteractionSettings::default();
        assert_eq!(solid.set_selected(true, &closed), SelectionChange::Unchanged);
        assert!(!solid.selected());
        assert_eq!(solid.select(&closed), SelectionChange::Unchanged);
        assert!(!solid.selected());
    }

    #[test]
    fn soft_select_flips_each_call() {
        let (_world, shared) = world();
        let mut solid = soft_ball(&shared, Point3::origin());
        let settings = open();
        assert_eq!(
            solid.select(&settings),
            SelectionChange::Selected {
                attach_force_panel: true
            }
        );
        assert_eq!(
            solid.select(&settings),
            SelectionChange::Deselected {
                detach_force_panel: true
            }
        );
        assert!(matches!(solid.select(&settings), SelectionChange::Selected { .. }));
        assert!(solid.selected());
    }

    #[test]
    fn soft_panel_needs_forces_enabled() {
        let (_world, shared) = world();
        let mut solid = soft_ball(&shared, Point3::origin());
        let settings = InteractionSettings {
            allow_selection: true,
            allow_forces: false,
        };
        assert_eq!(
            solid.set_selected(true, &settings),
            SelectionChange::Selected {
                attach_force_panel: false
            }
        );
        assert_eq!(solid.set_selected(true, &settings), SelectionChange::Unchanged);
        assert!(solid.selected());
        assert!(matches!(
            solid.set_selected(false, &settings),
            SelectionChange::Deselected { .. }
        ));
    }

    #[test]
    fn force_is_sustained_on_soft_only() {
        let (world, shared) = world();
        let mut soft = soft_ball(&shared, Point3::origin());
        let mut rigid = rigid_ball(&shared, Point3::new(5.0, 0.0, 0.0), 1.0);

        rigid.set_force(Vector3::x());
        assert!(!rigid.has_force());

        soft.set_force(Vector3::new(0.0, 0.0, 2.0));
        assert!(soft.has_force());
        let start = world.borrow().body_position(soft.body()).unwrap();
        for _ in 0..5 {
            soft.update().unwrap();
            world.borrow_mut().step(1.0 / 60.0, 1);
        }
        let moved = world.borrow().body_position(soft.body()).unwrap();
        assert!(moved.z - start.z > 0.1);

        soft.remove_force();
        assert!(!soft.has_force());
    }

    #[test]
    fn get_mesh_unshares_vertices() {
        let (world, shared) = world();
        let solid = soft_ball(&shared, Point3::origin());
        let mesh = solid.get_mesh().unwrap();
        let faces = world.borrow().soft_faces(solid.body()).unwrap().len();
        assert_eq!(mesh.num_triangles(), faces);
        assert_eq!(mesh.num_vertices(), 3 * faces);
        assert_eq!(mesh.indices[1], [3, 4, 5]);
    }

    #[test]
    fn rigid_get_mesh_fails() {
        let (_world, shared) = world();
        let solid = rigid_ball(&shared, Point3::origin(), 1.0);
        assert!(solid.get_mesh().is_err());
        assert_eq!(solid.position().unwrap(), Point3::origin());
    }

    #[test]
    fn drop_removes_body() {
        let (world, shared) = world();
        let solid = rigid_ball(&shared, Point3::origin(), 1.0);
        let body = solid.body();
        drop(solid);
        assert!(!world.borrow().contains_body(body));
    }

    #[test]
    fn constrained_body_survives_drop() {
        let (world, shared) = world();
        let a = rigid_ball(&shared, Point3::origin(), 1.0);
        let b = rigid_ball(&shared, Point3::new(0.0, 2.0, 0.0), 1.0);
        let body = a.body();
        world
            .borrow_mut()
            .add_constraint(ConstraintDesc::Socket {
                a: a.body(),
                b: b.body(),
                pivot: Point3::new(0.0, 1.0, 0.0),
            })
            .unwrap();
        drop(a);
        assert!(world.borrow().contains_body(body));
    }
}

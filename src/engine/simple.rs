use nalgebra::Translation3;
use slotmap::SlotMap;
use tracing::{debug, info};

use crate::color::Color;
use crate::error::EngineError;
use crate::math::{centroid, Isometry3, Point3, Vector3};
use crate::mesh::{ConvexHull, Ellipsoid, TriangleMesh};

use super::{
    BodyHandle, BodyKind, CollisionShape, ConstraintAnchors, ConstraintDesc, ConstraintHandle,
    DebugDraw, EngineResult, PhysicsWorld, RigidBodyDesc, SoftBodyDesc, SoftMaterial, SoftShape,
};

/// Half-extent reported for infinite planes.
const PLANE_EXTENT: f64 = 1e18;

/// Engine allocator objects, released in [`TEARDOWN_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorKind {
    World,
    Solver,
    Dispatcher,
    Broadphase,
    CollisionConfiguration,
}

/// Each allocator is released only after everything that uses it.
pub const TEARDOWN_ORDER: [AllocatorKind; 5] = [
    AllocatorKind::World,
    AllocatorKind::Solver,
    AllocatorKind::Dispatcher,
    AllocatorKind::Broadphase,
    AllocatorKind::CollisionConfiguration,
];

/// Construction settings of a [`SimpleWorld`].
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSettings {
    /// Lower corner of the broadphase volume.
    pub aabb_min: Point3,
    /// Upper corner of the broadphase volume.
    pub aabb_max: Point3,
    /// Maximum number of broadphase proxies (bodies).
    pub max_proxies: usize,
    /// Maximum number of live constraints.
    pub max_constraints: usize,
    /// Length of one internal simulation step in seconds.
    pub fixed_step: f64,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            aabb_min: Point3::new(-300.0, -300.0, -300.0),
            aabb_max: Point3::new(300.0, 300.0, 300.0),
            max_proxies: 32766,
            max_constraints: 65535,
            fixed_step: 1.0 / 60.0,
        }
    }
}

/// Call counters, for observing how the world is driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Calls to [`PhysicsWorld::set_body_gravity`].
    pub body_gravity_calls: usize,
    /// Calls to [`PhysicsWorld::activate`].
    pub activations: usize,
    /// Calls to [`PhysicsWorld::step`].
    pub steps: usize,
    /// Internal fixed steps taken across all calls.
    pub substeps: usize,
}

#[derive(Debug)]
struct RigidBody {
    shape: CollisionShape,
    pose: Isometry3,
    velocity: Vector3,
    mass: f64,
    gravity: Vector3,
}

#[derive(Debug)]
struct SoftBody {
    nodes: Vec<Point3>,
    velocities: Vec<Vector3>,
    masses: Vec<f64>,
    triangles: Vec<[u32; 3]>,
    material: SoftMaterial,
    clusters: usize,
    self_collision: bool,
}

#[derive(Debug)]
enum Body {
    Rigid(RigidBody),
    Soft(SoftBody),
}

#[derive(Debug)]
struct Constraint {
    desc: ConstraintDesc,
    local_a: Point3,
    local_b: Point3,
}

/// Minimal in-process physics world.
///
/// Integrates gravity and velocity of non-zero-mass rigid bodies and soft
/// nodes with semi-implicit Euler at a fixed step. There is no contact
/// handling and constraints are bookkeeping only. Bounding volumes are
/// reported the way a broadphase sees them: the sphere around a body's
/// world-space AABB.
#[derive(Debug)]
pub struct SimpleWorld {
    settings: WorldSettings,
    gravity: Vector3,
    bodies: SlotMap<BodyHandle, Body>,
    constraints: SlotMap<ConstraintHandle, Constraint>,
    time_accumulator: f64,
    stats: WorldStats,
    released: Vec<AllocatorKind>,
}

impl Default for SimpleWorld {
    fn default() -> Self {
        Self::new(WorldSettings::default())
    }
}

impl SimpleWorld {
    /// Creates an empty world.
    #[must_use]
    pub fn new(settings: WorldSettings) -> Self {
        Self {
            settings,
            gravity: Vector3::new(0.0, -10.0, 0.0),
            bodies: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            time_accumulator: 0.0,
            stats: WorldStats::default(),
            released: Vec::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    #[must_use]
    pub fn stats(&self) -> WorldStats {
        self.stats
    }

    /// Allocators released so far, in release order.
    #[must_use]
    pub fn released_allocators(&self) -> &[AllocatorKind] {
        &self.released
    }

    /// Number of live bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// The descriptor a constraint was created from.
    #[must_use]
    pub fn constraint_desc(&self, constraint: ConstraintHandle) -> Option<&ConstraintDesc> {
        self.constraints.get(constraint).map(|c| &c.desc)
    }

    /// Gravity applied to a rigid body.
    #[must_use]
    pub fn body_gravity(&self, body: BodyHandle) -> Option<Vector3> {
        match self.bodies.get(body)? {
            Body::Rigid(rigid) => Some(rigid.gravity),
            Body::Soft(_) => None,
        }
    }

    /// Mass of a rigid body.
    #[must_use]
    pub fn rigid_mass(&self, body: BodyHandle) -> Option<f64> {
        match self.bodies.get(body)? {
            Body::Rigid(rigid) => Some(rigid.mass),
            Body::Soft(_) => None,
        }
    }

    /// Collision shape of a rigid body.
    #[must_use]
    pub fn rigid_shape(&self, body: BodyHandle) -> Option<&CollisionShape> {
        match self.bodies.get(body)? {
            Body::Rigid(rigid) => Some(&rigid.shape),
            Body::Soft(_) => None,
        }
    }

    /// Material of a deformable body.
    #[must_use]
    pub fn soft_material(&self, body: BodyHandle) -> Option<SoftMaterial> {
        match self.bodies.get(body)? {
            Body::Soft(soft) => Some(soft.material),
            Body::Rigid(_) => None,
        }
    }

    /// Cluster count and self-collision flag of a deformable body.
    #[must_use]
    pub fn soft_collision(&self, body: BodyHandle) -> Option<(usize, bool)> {
        match self.bodies.get(body)? {
            Body::Soft(soft) => Some((soft.clusters, soft.self_collision)),
            Body::Rigid(_) => None,
        }
    }

    /// Current node positions of a deformable body.
    #[must_use]
    pub fn node_positions(&self, body: BodyHandle) -> Option<&[Point3]> {
        match self.bodies.get(body)? {
            Body::Soft(soft) => Some(&soft.nodes),
            Body::Rigid(_) => None,
        }
    }

    fn ensure_live(&self) -> EngineResult<()> {
        if self.released.is_empty() {
            Ok(())
        } else {
            Err(EngineError::WorldShutDown)
        }
    }

    fn body(&self, body: BodyHandle) -> EngineResult<&Body> {
        self.bodies.get(body).ok_or(EngineError::BodyNotFound)
    }

    fn soft(&self, body: BodyHandle) -> EngineResult<&SoftBody> {
        match self.body(body)? {
            Body::Soft(soft) => Ok(soft),
            Body::Rigid(_) => Err(EngineError::WrongBodyKind { expected: "soft" }),
        }
    }

    fn soft_mut(&mut self, body: BodyHandle) -> EngineResult<&mut SoftBody> {
        match self.bodies.get_mut(body) {
            Some(Body::Soft(soft)) => Ok(soft),
            Some(Body::Rigid(_)) => Err(EngineError::WrongBodyKind { expected: "soft" }),
            None => Err(EngineError::BodyNotFound),
        }
    }

    fn insert(&mut self, body: Body) -> EngineResult<BodyHandle> {
        if self.bodies.len() >= self.settings.max_proxies {
            return Err(EngineError::OutOfBounds);
        }
        let (center, _) = bounding_sphere_of(&body);
        let (lo, hi) = (&self.settings.aabb_min, &self.settings.aabb_max);
        let inside = (0..3).all(|i| center[i] >= lo[i] && center[i] <= hi[i]);
        if !inside {
            return Err(EngineError::OutOfBounds);
        }
        Ok(self.bodies.insert(body))
    }

    /// The point constraint offsets are measured from.
    fn reference_pose(&self, body: BodyHandle) -> EngineResult<Isometry3> {
        self.body_pose(body)
    }

    fn substep(&mut self, h: f64) {
        let world_gravity = self.gravity;
        for body in self.bodies.values_mut() {
            match body {
                Body::Rigid(rigid) => {
                    if rigid.mass <= 0.0 {
                        continue;
                    }
                    rigid.velocity += rigid.gravity * h;
                    rigid.pose.translation.vector += rigid.velocity * h;
                }
                Body::Soft(soft) => {
                    let keep = (1.0 - soft.material.damping * h).clamp(0.0, 1.0);
                    for ((node, velocity), mass) in soft
                        .nodes
                        .iter_mut()
                        .zip(&mut soft.velocities)
                        .zip(&soft.masses)
                    {
                        if *mass <= 0.0 {
                            continue;
                        }
                        *velocity = (*velocity + world_gravity * h) * keep;
                        *node += *velocity * h;
                    }
                }
            }
        }
    }
}

impl PhysicsWorld for SimpleWorld {
    fn add_rigid_body(&mut self, desc: RigidBodyDesc) -> EngineResult<BodyHandle> {
        self.ensure_live()?;
        let pose = Isometry3::from_parts(Translation3::from(desc.position.coords), desc.rotation);
        let body = Body::Rigid(RigidBody {
            gravity: desc.gravity.unwrap_or(self.gravity),
            shape: desc.shape,
            pose,
            velocity: Vector3::zeros(),
            mass: desc.mass,
        });
        let handle = self.insert(body)?;
        debug!(?handle, mass = desc.mass, "rigid body added");
        Ok(handle)
    }

    fn add_soft_body(&mut self, desc: SoftBodyDesc) -> EngineResult<BodyHandle> {
        self.ensure_live()?;
        let mesh = match desc.shape {
            SoftShape::Ellipsoid {
                center,
                radii,
                resolution,
            } => Ellipsoid::new(center, radii, resolution)
                .execute()
                .map_err(|e| EngineError::InvalidMesh(e.to_string()))?,
            SoftShape::TriMesh {
                vertices,
                triangles,
            } => mesh_from_flat(&vertices, &triangles)?,
            SoftShape::ConvexHull { points } => ConvexHull::new(&points)
                .execute()
                .map_err(|e| EngineError::InvalidMesh(e.to_string()))?,
        };

        let count = mesh.num_vertices();
        #[allow(clippy::cast_precision_loss)]
        let node_mass = desc.total_mass.map_or(1.0, |total| total / count as f64);
        let body = Body::Soft(SoftBody {
            velocities: vec![Vector3::zeros(); count],
            masses: vec![node_mass; count],
            nodes: mesh.vertices,
            triangles: mesh.indices,
            material: desc.material,
            clusters: desc.clusters,
            self_collision: desc.self_collision,
        });
        let handle = self.insert(body)?;
        debug!(?handle, nodes = count, "soft body added");
        Ok(handle)
    }

    fn remove_body(&mut self, body: BodyHandle) -> EngineResult<()> {
        self.ensure_live()?;
        if !self.bodies.contains_key(body) {
            return Err(EngineError::BodyNotFound);
        }
        let constraints = self.constraints_on(body).len();
        if constraints > 0 {
            return Err(EngineError::BodyConstrained { constraints });
        }
        self.bodies.remove(body);
        debug!(?body, "body removed");
        Ok(())
    }

    fn contains_body(&self, body: BodyHandle) -> bool {
        self.bodies.contains_key(body)
    }

    fn body_kind(&self, body: BodyHandle) -> EngineResult<BodyKind> {
        Ok(match self.body(body)? {
            Body::Rigid(_) => BodyKind::Rigid,
            Body::Soft(_) => BodyKind::Soft,
        })
    }

    fn add_constraint(&mut self, desc: ConstraintDesc) -> EngineResult<ConstraintHandle> {
        self.ensure_live()?;
        let limit = self.settings.max_constraints;
        if self.constraints.len() >= limit {
            return Err(EngineError::ConstraintLimit { limit });
        }
        let (a, b) = desc.bodies();
        let pose_a = self.reference_pose(a)?;
        let pose_b = self.reference_pose(b)?;

        let (world_a, world_b) = match &desc {
            ConstraintDesc::Socket { pivot, .. } | ConstraintDesc::Hinge { pivot, .. } => {
                (*pivot, *pivot)
            }
            ConstraintDesc::Spring6Dof(spring) => {
                if self.body_kind(a)? != BodyKind::Rigid || self.body_kind(b)? != BodyKind::Rigid {
                    return Err(EngineError::WrongBodyKind { expected: "rigid" });
                }
                (
                    pose_a * Point3::from(spring.frame_in_a),
                    Point3::from(pose_b.translation.vector),
                )
            }
        };

        let handle = self.constraints.insert(Constraint {
            local_a: pose_a.inverse_transform_point(&world_a),
            local_b: pose_b.inverse_transform_point(&world_b),
            desc,
        });
        debug!(?handle, "constraint added");
        Ok(handle)
    }

    fn remove_constraint(&mut self, constraint: ConstraintHandle) -> EngineResult<()> {
        self.ensure_live()?;
        self.constraints
            .remove(constraint)
            .map(|_| ())
            .ok_or(EngineError::ConstraintNotFound)
    }

    fn constraints(&self) -> Vec<ConstraintHandle> {
        self.constraints.keys().collect()
    }

    fn constraints_on(&self, body: BodyHandle) -> Vec<ConstraintHandle> {
        self.constraints
            .iter()
            .filter(|(_, c)| {
                let (a, b) = c.desc.bodies();
                a == body || b == body
            })
            .map(|(h, _)| h)
            .collect()
    }

    fn constraint_anchors(&self, constraint: ConstraintHandle) -> EngineResult<ConstraintAnchors> {
        let c = self
            .constraints
            .get(constraint)
            .ok_or(EngineError::ConstraintNotFound)?;
        let (a, b) = c.desc.bodies();
        Ok(ConstraintAnchors {
            position_a: self.reference_pose(a)? * c.local_a,
            position_b: self.reference_pose(b)? * c.local_b,
        })
    }

    fn gravity(&self) -> Vector3 {
        self.gravity
    }

    fn set_gravity(&mut self, gravity: Vector3) {
        self.gravity = gravity;
    }

    fn set_body_gravity(&mut self, body: BodyHandle, gravity: Vector3) -> EngineResult<()> {
        self.stats.body_gravity_calls += 1;
        match self.bodies.get_mut(body) {
            Some(Body::Rigid(rigid)) => {
                rigid.gravity = gravity;
                Ok(())
            }
            Some(Body::Soft(_)) => Err(EngineError::WrongBodyKind { expected: "rigid" }),
            None => Err(EngineError::BodyNotFound),
        }
    }

    fn activate(&mut self, body: BodyHandle) -> EngineResult<()> {
        self.body(body)?;
        self.stats.activations += 1;
        Ok(())
    }

    fn set_soft_velocity(&mut self, body: BodyHandle, velocity: Vector3) -> EngineResult<()> {
        let soft = self.soft_mut(body)?;
        soft.velocities.fill(velocity);
        Ok(())
    }

    fn scale_soft_body(&mut self, body: BodyHandle, scale: &Vector3) -> EngineResult<()> {
        let soft = self.soft_mut(body)?;
        for node in &mut soft.nodes {
            node.coords.component_mul_assign(scale);
        }
        Ok(())
    }

    fn node_count(&self, body: BodyHandle) -> EngineResult<usize> {
        Ok(self.soft(body)?.nodes.len())
    }

    fn node_mass(&self, body: BodyHandle, node: usize) -> EngineResult<f64> {
        self.soft(body)?
            .masses
            .get(node)
            .copied()
            .ok_or(EngineError::OutOfBounds)
    }

    fn set_node_mass(&mut self, body: BodyHandle, node: usize, mass: f64) -> EngineResult<()> {
        let slot = self
            .soft_mut(body)?
            .masses
            .get_mut(node)
            .ok_or(EngineError::OutOfBounds)?;
        *slot = mass;
        Ok(())
    }

    fn body_pose(&self, body: BodyHandle) -> EngineResult<Isometry3> {
        Ok(match self.body(body)? {
            Body::Rigid(rigid) => rigid.pose,
            Body::Soft(soft) => {
                let center = centroid(&soft.nodes).unwrap_or_else(Point3::origin);
                Isometry3::translation(center.x, center.y, center.z)
            }
        })
    }

    fn bounding_sphere(&self, body: BodyHandle) -> EngineResult<(Point3, f64)> {
        Ok(bounding_sphere_of(self.body(body)?))
    }

    fn soft_faces(&self, body: BodyHandle) -> EngineResult<Vec<[Point3; 3]>> {
        let soft = self.soft(body)?;
        Ok(soft
            .triangles
            .iter()
            .filter_map(|[a, b, c]| {
                Some([
                    *soft.nodes.get(*a as usize)?,
                    *soft.nodes.get(*b as usize)?,
                    *soft.nodes.get(*c as usize)?,
                ])
            })
            .collect())
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn step(&mut self, dt: f64, max_substeps: usize) -> usize {
        if self.ensure_live().is_err() {
            return 0;
        }
        self.stats.steps += 1;

        let fixed = self.settings.fixed_step;
        let taken = if max_substeps == 0 {
            self.substep(dt);
            1
        } else {
            self.time_accumulator += dt;
            let due = (self.time_accumulator / fixed).floor().max(0.0) as usize;
            self.time_accumulator -= due as f64 * fixed;
            // Time beyond the substep budget is dropped, not carried over.
            let taken = due.min(max_substeps);
            for _ in 0..taken {
                self.substep(fixed);
            }
            taken
        };

        self.stats.substeps += taken;
        taken
    }

    fn debug_draw(&self, drawer: &mut dyn DebugDraw) {
        for c in self.constraints.keys() {
            if let Ok(anchors) = self.constraint_anchors(c) {
                drawer.line(&anchors.position_a, &anchors.position_b, Color::CONSTRAINT);
            }
        }
        for (handle, body) in &self.bodies {
            if let Body::Soft(_) = body {
                for [a, b, c] in self.soft_faces(handle).unwrap_or_default() {
                    drawer.line(&a, &b, Color::WHITE);
                    drawer.line(&b, &c, Color::WHITE);
                    drawer.line(&c, &a, Color::WHITE);
                }
            }
        }
    }

    fn shutdown(&mut self) {
        if !self.released.is_empty() {
            return;
        }
        for kind in TEARDOWN_ORDER {
            debug!(?kind, "releasing engine allocator");
            self.released.push(kind);
        }
        info!(
            bodies = self.bodies.len(),
            constraints = self.constraints.len(),
            "physics world shut down"
        );
    }

    fn is_shut_down(&self) -> bool {
        !self.released.is_empty()
    }
}

fn mesh_from_flat(vertices: &[f64], triangles: &[u32]) -> EngineResult<TriangleMesh> {
    if vertices.is_empty() || vertices.len() % 3 != 0 {
        return Err(EngineError::InvalidMesh(format!(
            "{} vertex coordinates is not a positive multiple of 3",
            vertices.len()
        )));
    }
    if triangles.len() % 3 != 0 {
        return Err(EngineError::InvalidMesh(format!(
            "{} triangle indices is not a multiple of 3",
            triangles.len()
        )));
    }

    let mut mesh = TriangleMesh::new();
    for v in vertices.chunks_exact(3) {
        mesh.append_vertex(Point3::new(v[0], v[1], v[2]));
    }
    let count = mesh.num_vertices();
    for t in triangles.chunks_exact(3) {
        if t.iter().any(|&i| i as usize >= count) {
            return Err(EngineError::InvalidMesh(format!(
                "triangle {t:?} references a missing vertex"
            )));
        }
        mesh.append_triangle(t[0], t[1], t[2]);
    }
    Ok(mesh)
}

/// Sphere around the world-space AABB of a body.
fn bounding_sphere_of(body: &Body) -> (Point3, f64) {
    match body {
        Body::Rigid(rigid) => {
            let pose = &rigid.pose;
            let center = Point3::from(pose.translation.vector);
            match &rigid.shape {
                CollisionShape::Sphere { radius } => aabb_sphere(
                    &(center - Vector3::repeat(*radius)),
                    &(center + Vector3::repeat(*radius)),
                ),
                CollisionShape::Cuboid { half_extents } => {
                    let corners = box_corners(half_extents).map(|c| pose * c);
                    aabb_of(corners.iter())
                }
                CollisionShape::StaticPlane { .. } => (center, PLANE_EXTENT),
                CollisionShape::ConvexHull { points, scale } => {
                    let world: Vec<Point3> = points
                        .iter()
                        .map(|p| pose * Point3::from(p.coords.component_mul(scale)))
                        .collect();
                    aabb_of(world.iter())
                }
                CollisionShape::TriangleMesh {
                    mesh,
                    scale,
                    margin,
                } => {
                    let world: Vec<Point3> = mesh
                        .vertices
                        .iter()
                        .map(|p| pose * Point3::from(p.coords.component_mul(scale)))
                        .collect();
                    let (c, r) = aabb_of(world.iter());
                    (c, r + margin)
                }
            }
        }
        Body::Soft(soft) => aabb_of(soft.nodes.iter()),
    }
}

fn aabb_of<'a>(points: impl Iterator<Item = &'a Point3>) -> (Point3, f64) {
    let mut lo = Point3::from(Vector3::repeat(f64::INFINITY));
    let mut hi = Point3::from(Vector3::repeat(f64::NEG_INFINITY));
    let mut any = false;
    for p in points {
        any = true;
        lo = lo.inf(p);
        hi = hi.sup(p);
    }
    if !any {
        return (Point3::origin(), 0.0);
    }
    aabb_sphere(&lo, &hi)
}

fn aabb_sphere(lo: &Point3, hi: &Point3) -> (Point3, f64) {
    (nalgebra::center(lo, hi), (hi - lo).norm() / 2.0)
}

fn box_corners(h: &Vector3) -> [Point3; 8] {
    let mut corners = [Point3::origin(); 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        let sign = |bit: usize| if i & bit == 0 { -1.0 } else { 1.0 };
        *corner = Point3::new(sign(1) * h.x, sign(2) * h.y, sign(4) * h.z);
    }
    corners
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::SpringDesc;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn sphere(world: &mut SimpleWorld, at: Point3, mass: f64) -> BodyHandle {
        world
            .add_rigid_body(RigidBodyDesc::new(
                CollisionShape::Sphere { radius: 1.0 },
                at,
                mass,
            ))
            .unwrap()
    }

    fn tetra(world: &mut SimpleWorld) -> BodyHandle {
        world
            .add_soft_body(SoftBodyDesc {
                shape: SoftShape::TriMesh {
                    vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
                    triangles: vec![0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3],
                },
                material: SoftMaterial::default(),
                total_mass: Some(4.0),
                clusters: 0,
                self_collision: false,
            })
            .unwrap()
    }

    #[test]
    fn sphere_bounds_cover_its_aabb() {
        let mut world = SimpleWorld::default();
        let body = sphere(&mut world, p(1.0, 2.0, 3.0), 1.0);
        let (center, radius) = world.bounding_sphere(body).unwrap();
        assert_eq!(center, p(1.0, 2.0, 3.0));
        assert_relative_eq!(radius, 3.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn insertion_outside_bounds_fails() {
        let mut world = SimpleWorld::default();
        let result = world.add_rigid_body(RigidBodyDesc::new(
            CollisionShape::Sphere { radius: 1.0 },
            p(0.0, 1000.0, 0.0),
            1.0,
        ));
        assert!(matches!(result, Err(EngineError::OutOfBounds)));
    }

    #[test]
    fn rigid_body_inherits_world_gravity() {
        let mut world = SimpleWorld::default();
        world.set_gravity(Vector3::new(0.0, -2.0, 0.0));
        let body = sphere(&mut world, Point3::origin(), 1.0);
        assert_eq!(world.body_gravity(body), Some(Vector3::new(0.0, -2.0, 0.0)));
    }

    #[test]
    fn step_integrates_dynamic_bodies_only() {
        let mut world = SimpleWorld::default();
        let dynamic = sphere(&mut world, Point3::origin(), 1.0);
        let fixed = sphere(&mut world, p(5.0, 0.0, 0.0), 0.0);
        let taken = world.step(1.0, 10);
        assert_eq!(taken, 10);
        assert!(world.body_position(dynamic).unwrap().y < 0.0);
        assert_eq!(world.body_position(fixed).unwrap(), p(5.0, 0.0, 0.0));
        assert_eq!(world.stats().substeps, 10);
    }

    #[test]
    fn zero_mass_nodes_stay_pinned() {
        let mut world = SimpleWorld::default();
        let body = tetra(&mut world);
        assert_relative_eq!(world.node_mass(body, 0).unwrap(), 1.0);
        world.set_node_mass(body, 1, 0.0).unwrap();
        world.step(0.5, 10);
        let nodes = world.node_positions(body).unwrap();
        assert_eq!(nodes[1], p(1.0, 0.0, 0.0));
        assert!(nodes[0].y < 0.0);
    }

    #[test]
    fn node_mass_out_of_range() {
        let mut world = SimpleWorld::default();
        let body = tetra(&mut world);
        assert!(matches!(world.node_mass(body, 9), Err(EngineError::OutOfBounds)));
    }

    #[test]
    fn soft_body_rejects_bad_indices() {
        let mut world = SimpleWorld::default();
        let result = world.add_soft_body(SoftBodyDesc {
            shape: SoftShape::TriMesh {
                vertices: vec![0.0, 0.0, 0.0],
                triangles: vec![0, 1, 2],
            },
            material: SoftMaterial::default(),
            total_mass: None,
            clusters: 0,
            self_collision: false,
        });
        assert!(matches!(result, Err(EngineError::InvalidMesh(_))));
    }

    #[test]
    fn soft_hull_rejects_flat_points() {
        let mut world = SimpleWorld::default();
        let result = world.add_soft_body(SoftBodyDesc {
            shape: SoftShape::ConvexHull {
                points: vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 0.0, 1.0), p(1.0, 0.0, 1.0)],
            },
            material: SoftMaterial::default(),
            total_mass: None,
            clusters: 0,
            self_collision: false,
        });
        assert!(matches!(result, Err(EngineError::InvalidMesh(_))));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn constrained_body_cannot_be_removed() {
        let mut world = SimpleWorld::default();
        let a = sphere(&mut world, Point3::origin(), 1.0);
        let b = sphere(&mut world, p(0.0, 2.0, 0.0), 1.0);
        let c = world
            .add_constraint(ConstraintDesc::Socket {
                a,
                b,
                pivot: p(0.0, 1.0, 0.0),
            })
            .unwrap();
        assert!(matches!(
            world.remove_body(a),
            Err(EngineError::BodyConstrained { constraints: 1 })
        ));
        world.remove_constraint(c).unwrap();
        world.remove_body(a).unwrap();
        assert!(!world.contains_body(a));
    }

    #[test]
    fn socket_anchors_follow_bodies() {
        let mut world = SimpleWorld::default();
        let a = sphere(&mut world, Point3::origin(), 1.0);
        let b = sphere(&mut world, p(0.0, 2.0, 0.0), 0.0);
        let c = world
            .add_constraint(ConstraintDesc::Socket {
                a,
                b,
                pivot: p(0.0, 1.0, 0.0),
            })
            .unwrap();
        let before = world.constraint_anchors(c).unwrap();
        assert_eq!(before.position_a, before.position_b);
        world.step(0.5, 30);
        let after = world.constraint_anchors(c).unwrap();
        assert!(after.position_a.y < 1.0);
        assert_eq!(after.position_b, p(0.0, 1.0, 0.0));
    }

    #[test]
    fn spring_requires_rigid_bodies() {
        let mut world = SimpleWorld::default();
        let a = sphere(&mut world, Point3::origin(), 1.0);
        let b = tetra(&mut world);
        let result = world.add_constraint(ConstraintDesc::Spring6Dof(SpringDesc {
            a,
            b,
            frame_in_a: Vector3::x(),
            linear_lower: Vector3::zeros(),
            linear_upper: Vector3::zeros(),
            angular_lower: Vector3::zeros(),
            angular_upper: Vector3::zeros(),
            enabled: [true; 6],
            stiffness: [1.0; 6],
            damping: [1.0; 6],
        }));
        assert!(matches!(result, Err(EngineError::WrongBodyKind { .. })));
    }

    #[test]
    fn shutdown_releases_in_dependency_order() {
        let mut world = SimpleWorld::default();
        world.shutdown();
        world.shutdown();
        assert_eq!(world.released_allocators(), &TEARDOWN_ORDER);
        assert!(world.is_shut_down());
        assert_eq!(world.step(1.0, 10), 0);
        let result = world.add_rigid_body(RigidBodyDesc::new(
            CollisionShape::Sphere { radius: 1.0 },
            Point3::origin(),
            1.0,
        ));
        assert!(matches!(result, Err(EngineError::WorldShutDown)));
    }

    #[test]
    fn constraint_limit_is_enforced() {
        let mut world = SimpleWorld::new(WorldSettings {
            max_constraints: 1,
            ..WorldSettings::default()
        });
        let a = sphere(&mut world, Point3::origin(), 1.0);
        let b = sphere(&mut world, p(2.0, 0.0, 0.0), 1.0);
        let socket = |pivot| ConstraintDesc::Socket { a, b, pivot };
        let first = world.add_constraint(socket(p(1.0, 0.0, 0.0))).unwrap();
        assert!(matches!(
            world.add_constraint(socket(p(1.0, 1.0, 0.0))),
            Err(EngineError::ConstraintLimit { limit: 1 })
        ));
        world.remove_constraint(first).unwrap();
        assert!(world.add_constraint(socket(p(1.0, 1.0, 0.0))).is_ok());
    }

    #[test]
    fn constraints_stay_after_shutdown() {
        let mut world = SimpleWorld::default();
        let a = sphere(&mut world, Point3::origin(), 1.0);
        let b = sphere(&mut world, p(2.0, 0.0, 0.0), 1.0);
        let socket = world
            .add_constraint(ConstraintDesc::Socket {
                a,
                b,
                pivot: p(1.0, 0.0, 0.0),
            })
            .unwrap();
        world.shutdown();
        assert!(matches!(
            world.remove_constraint(socket),
            Err(EngineError::WorldShutDown)
        ));
        assert_eq!(world.constraints(), vec![socket]);
    }

    #[test]
    fn soft_scale_is_about_origin() {
        let mut world = SimpleWorld::default();
        let body = tetra(&mut world);
        world
            .scale_soft_body(body, &Vector3::new(2.0, 3.0, 4.0))
            .unwrap();
        assert_eq!(world.node_positions(body).unwrap()[3], p(0.0, 0.0, 4.0));
    }

    #[derive(Default)]
    struct Lines(usize);

    impl DebugDraw for Lines {
        fn line(&mut self, _from: &Point3, _to: &Point3, _color: Color) {
            self.0 += 1;
        }
    }

    #[test]
    fn debug_draw_emits_constraints_and_soft_edges() {
        let mut world = SimpleWorld::default();
        let a = sphere(&mut world, Point3::origin(), 1.0);
        let b = sphere(&mut world, p(0.0, 2.0, 0.0), 1.0);
        world
            .add_constraint(ConstraintDesc::Socket {
                a,
                b,
                pivot: p(0.0, 1.0, 0.0),
            })
            .unwrap();
        tetra(&mut world);
        let mut lines = Lines::default();
        world.debug_draw(&mut lines);
        assert_eq!(lines.0, 1 + 4 * 3);
    }
}

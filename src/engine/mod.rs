//! Boundary to the physics engine.
//!
//! Contact solving, constraint resolution and integration belong to the
//! engine behind [`PhysicsWorld`]. This crate only creates, queries and
//! destroys engine objects through it. [`SimpleWorld`] is a small
//! reference backend used by the tests and the demo.

mod simple;

pub use simple::{AllocatorKind, SimpleWorld, WorldSettings, WorldStats, TEARDOWN_ORDER};

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::color::Color;
use crate::error::EngineError;
use crate::math::{Isometry3, Point3, UnitQuaternion, Vector3};
use crate::mesh::TriangleMesh;

slotmap::new_key_type! {
    /// Handle to a rigid or deformable body inside the physics world.
    pub struct BodyHandle;
}

slotmap::new_key_type! {
    /// Handle to a constraint inside the physics world.
    pub struct ConstraintHandle;
}

/// Result type for engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// The physics world shared by the factory and every solid.
///
/// The engine is single-threaded; all calls come from the frame thread.
pub type SharedWorld = Rc<RefCell<dyn PhysicsWorld>>;

/// Which kind of engine object a body is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Rigid,
    Soft,
}

/// Collision shape of a rigid body.
#[derive(Debug, Clone)]
pub enum CollisionShape {
    Sphere {
        radius: f64,
    },
    Cuboid {
        half_extents: Vector3,
    },
    /// Infinite plane `normal . x = offset` in body space.
    StaticPlane {
        normal: Vector3,
        offset: f64,
    },
    ConvexHull {
        points: Vec<Point3>,
        scale: Vector3,
    },
    /// Concave triangle mesh. The mesh buffer is shared with its creator,
    /// which keeps it alive for as long as the world exists.
    TriangleMesh {
        mesh: Rc<TriangleMesh>,
        scale: Vector3,
        margin: f64,
    },
}

/// Construction parameters of a rigid body.
#[derive(Debug, Clone)]
pub struct RigidBodyDesc {
    pub shape: CollisionShape,
    pub position: Point3,
    pub rotation: UnitQuaternion,
    /// Zero mass makes the body immovable.
    pub mass: f64,
    /// Per-body gravity; `None` inherits the world gravity.
    pub gravity: Option<Vector3>,
}

impl RigidBodyDesc {
    /// A body with identity rotation and world gravity.
    #[must_use]
    pub fn new(shape: CollisionShape, position: Point3, mass: f64) -> Self {
        Self {
            shape,
            position,
            rotation: UnitQuaternion::identity(),
            mass,
            gravity: None,
        }
    }

    /// Sets the initial rotation.
    #[must_use]
    pub fn with_rotation(mut self, rotation: UnitQuaternion) -> Self {
        self.rotation = rotation;
        self
    }

    /// Overrides the gravity applied to this body.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vector3) -> Self {
        self.gravity = Some(gravity);
        self
    }
}

/// Node layout of a deformable body.
#[derive(Debug, Clone)]
pub enum SoftShape {
    Ellipsoid {
        center: Point3,
        radii: Vector3,
        /// Approximate node count.
        resolution: usize,
    },
    /// Flat arrays: `[x, y, z, ...]` positions and `[a, b, c, ...]` triangles.
    TriMesh {
        vertices: Vec<f64>,
        triangles: Vec<u32>,
    },
    /// Surface of the convex hull of the points; one node per hull vertex.
    ConvexHull { points: Vec<Point3> },
}

/// Material and solver coefficients of a deformable body.
///
/// Values are handed to the engine unvalidated. The fractions
/// (stiffness, friction, damping, pose matching) are meaningful in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftMaterial {
    /// Linear stiffness.
    pub linear_stiffness: f64,
    /// Volume stiffness.
    pub volume_stiffness: f64,
    /// Dynamic friction.
    pub dynamic_friction: f64,
    /// Velocity damping.
    pub damping: f64,
    /// Drag.
    pub drag: f64,
    /// Internal pressure.
    pub pressure: f64,
    /// Pose matching (shape rigidity).
    pub pose_matching: f64,
}

impl Default for SoftMaterial {
    fn default() -> Self {
        Self {
            linear_stiffness: 1.0,
            volume_stiffness: 1.0,
            dynamic_friction: 0.2,
            damping: 0.0,
            drag: 0.0,
            pressure: 0.0,
            pose_matching: 0.0,
        }
    }
}

/// Construction parameters of a deformable body.
#[derive(Debug, Clone)]
pub struct SoftBodyDesc {
    pub shape: SoftShape,
    pub material: SoftMaterial,
    /// Total mass spread evenly over the nodes; `None` leaves node masses at 1.
    pub total_mass: Option<f64>,
    /// Collision clusters to generate (0 = none).
    pub clusters: usize,
    /// Vertex/face collisions against other deformable bodies.
    pub self_collision: bool,
}

/// Six-degree-of-freedom spring linking two rigid bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct SpringDesc {
    pub a: BodyHandle,
    pub b: BodyHandle,
    /// Origin of the constraint frame in `a`'s space; `b`'s frame sits at its origin.
    pub frame_in_a: Vector3,
    pub linear_lower: Vector3,
    pub linear_upper: Vector3,
    pub angular_lower: Vector3,
    pub angular_upper: Vector3,
    /// Spring enabled per degree of freedom (3 linear, then 3 angular).
    pub enabled: [bool; 6],
    pub stiffness: [f64; 6],
    /// 0..1 where 1 means no damping.
    pub damping: [f64; 6],
}

/// Construction parameters of a constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintDesc {
    /// Point-to-point constraint pinning both bodies at `pivot`.
    Socket {
        a: BodyHandle,
        b: BodyHandle,
        pivot: Point3,
    },
    /// Single-axis rotational constraint through `pivot`.
    Hinge {
        a: BodyHandle,
        b: BodyHandle,
        pivot: Point3,
        axis: Vector3,
    },
    Spring6Dof(SpringDesc),
}

impl ConstraintDesc {
    /// The two bodies joined by this constraint.
    #[must_use]
    pub fn bodies(&self) -> (BodyHandle, BodyHandle) {
        match self {
            Self::Socket { a, b, .. } | Self::Hinge { a, b, .. } => (*a, *b),
            Self::Spring6Dof(spring) => (spring.a, spring.b),
        }
    }
}

/// World-space anchor points of a constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintAnchors {
    /// Anchor as carried by body A.
    pub position_a: Point3,
    /// Anchor as carried by body B.
    pub position_b: Point3,
}

impl ConstraintAnchors {
    /// Midpoint of the two anchors.
    #[must_use]
    pub fn midpoint(&self) -> Point3 {
        nalgebra::center(&self.position_a, &self.position_b)
    }
}

/// Receives debug geometry from the engine.
///
/// Lines are rendered as-is; the drawer has no say over simulation state.
pub trait DebugDraw {
    /// Draws a colored line segment.
    fn line(&mut self, from: &Point3, to: &Point3, color: Color);

    /// Receives a warning emitted by the engine.
    fn report_warning(&mut self, text: &str) {
        warn!(target: "solidforge::engine", "{text}");
    }
}

/// Operations this crate needs from a physics engine.
pub trait PhysicsWorld {
    /// Creates a rigid body and adds it to the world.
    ///
    /// # Errors
    ///
    /// Returns an error if the world is shut down or the body is invalid.
    fn add_rigid_body(&mut self, desc: RigidBodyDesc) -> EngineResult<BodyHandle>;

    /// Creates a deformable body and adds it to the world.
    ///
    /// # Errors
    ///
    /// Returns an error if the world is shut down or the node layout is invalid.
    fn add_soft_body(&mut self, desc: SoftBodyDesc) -> EngineResult<BodyHandle>;

    /// Detaches a body from the world, then frees its engine-side state
    /// (motion state, collision shape).
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown or still constrained.
    fn remove_body(&mut self, body: BodyHandle) -> EngineResult<()>;

    /// Returns `true` if the body is live in this world.
    fn contains_body(&self, body: BodyHandle) -> bool;

    /// Returns the kind of a body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown.
    fn body_kind(&self, body: BodyHandle) -> EngineResult<BodyKind>;

    /// Creates a constraint between two live bodies.
    ///
    /// # Errors
    ///
    /// Returns an error if either body is unknown or the kinds do not fit.
    fn add_constraint(&mut self, desc: ConstraintDesc) -> EngineResult<ConstraintHandle>;

    /// Removes and frees a constraint.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraint is unknown.
    fn remove_constraint(&mut self, constraint: ConstraintHandle) -> EngineResult<()>;

    /// All live constraints.
    fn constraints(&self) -> Vec<ConstraintHandle>;

    /// Live constraints that reference `body`.
    fn constraints_on(&self, body: BodyHandle) -> Vec<ConstraintHandle>;

    /// Current world-space anchors of a constraint.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraint is unknown.
    fn constraint_anchors(&self, constraint: ConstraintHandle) -> EngineResult<ConstraintAnchors>;

    /// World gravity.
    fn gravity(&self) -> Vector3;

    /// Sets the world gravity (rigid bodies added later, deformable bodies).
    fn set_gravity(&mut self, gravity: Vector3);

    /// Sets the gravity of a single rigid body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown or deformable.
    fn set_body_gravity(&mut self, body: BodyHandle, gravity: Vector3) -> EngineResult<()>;

    /// Wakes a body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown.
    fn activate(&mut self, body: BodyHandle) -> EngineResult<()>;

    /// Sets the velocity of every node of a deformable body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown or rigid.
    fn set_soft_velocity(&mut self, body: BodyHandle, velocity: Vector3) -> EngineResult<()>;

    /// Scales every node of a deformable body component-wise about the origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown or rigid.
    fn scale_soft_body(&mut self, body: BodyHandle, scale: &Vector3) -> EngineResult<()>;

    /// Number of nodes of a deformable body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown or rigid.
    fn node_count(&self, body: BodyHandle) -> EngineResult<usize>;

    /// Mass of one node of a deformable body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown, rigid, or the node is out of range.
    fn node_mass(&self, body: BodyHandle, node: usize) -> EngineResult<f64>;

    /// Sets the mass of one node; zero pins the node in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown, rigid, or the node is out of range.
    fn set_node_mass(&mut self, body: BodyHandle, node: usize, mass: f64) -> EngineResult<()>;

    /// World transform of a body (deformable bodies report their node centroid).
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown.
    fn body_pose(&self, body: BodyHandle) -> EngineResult<Isometry3>;

    /// World-space bounding sphere `(center, radius)` of a body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown.
    fn bounding_sphere(&self, body: BodyHandle) -> EngineResult<(Point3, f64)>;

    /// Current triangles of a deformable body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown or rigid.
    fn soft_faces(&self, body: BodyHandle) -> EngineResult<Vec<[Point3; 3]>>;

    /// Advances the simulation by `dt`, taking at most `max_substeps`
    /// fixed internal steps. Returns the number of steps taken.
    fn step(&mut self, dt: f64, max_substeps: usize) -> usize;

    /// Emits debug geometry for the whole world.
    fn debug_draw(&self, drawer: &mut dyn DebugDraw);

    /// Releases the engine allocator objects. Further calls fail with
    /// [`EngineError::WorldShutDown`].
    fn shutdown(&mut self);

    /// Returns `true` once [`shutdown`](Self::shutdown) has run.
    fn is_shut_down(&self) -> bool;

    /// World-space position of a body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown.
    fn body_position(&self, body: BodyHandle) -> EngineResult<Point3> {
        self.body_pose(body)
            .map(|pose| Point3::from(pose.translation.vector))
    }
}

use crate::engine::{ConstraintHandle, EngineResult, PhysicsWorld};
use crate::math::{Point3, Vector3};

/// Single-axis rotational joint.
#[derive(Debug, Clone, PartialEq)]
pub struct HingeJoint {
    constraint: ConstraintHandle,
    axis: Vector3,
}

impl HingeJoint {
    #[must_use]
    pub fn new(constraint: ConstraintHandle, axis: Vector3) -> Self {
        Self { constraint, axis }
    }

    #[must_use]
    pub fn constraint(&self) -> ConstraintHandle {
        self.constraint
    }

    /// World-space hinge axis as given at creation.
    #[must_use]
    pub fn axis(&self) -> &Vector3 {
        &self.axis
    }
}

/// Point-to-point joint.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketJoint {
    constraint: ConstraintHandle,
}

impl SocketJoint {
    #[must_use]
    pub fn new(constraint: ConstraintHandle) -> Self {
        Self { constraint }
    }

    #[must_use]
    pub fn constraint(&self) -> ConstraintHandle {
        self.constraint
    }
}

/// A joint between two grid neighbours.
///
/// Positions are read live from the world, so they follow the bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum Joint {
    Hinge(HingeJoint),
    Socket(SocketJoint),
}

impl Joint {
    /// The engine constraint behind this joint.
    #[must_use]
    pub fn constraint(&self) -> ConstraintHandle {
        match self {
            Self::Hinge(hinge) => hinge.constraint(),
            Self::Socket(socket) => socket.constraint(),
        }
    }

    /// The hinge axis, for hinge joints.
    #[must_use]
    pub fn hinge_axis(&self) -> Option<&Vector3> {
        match self {
            Self::Hinge(hinge) => Some(hinge.axis()),
            Self::Socket(_) => None,
        }
    }

    #[must_use]
    pub fn as_hinge(&self) -> Option<&HingeJoint> {
        match self {
            Self::Hinge(hinge) => Some(hinge),
            Self::Socket(_) => None,
        }
    }

    /// Anchor carried by the first body.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraint is gone from the world.
    pub fn position_a(&self, world: &dyn PhysicsWorld) -> EngineResult<Point3> {
        Ok(world.constraint_anchors(self.constraint())?.position_a)
    }

    /// Anchor carried by the second body.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraint is gone from the world.
    pub fn position_b(&self, world: &dyn PhysicsWorld) -> EngineResult<Point3> {
        Ok(world.constraint_anchors(self.constraint())?.position_b)
    }

    /// Midpoint of the two anchors. This is where the joint is drawn.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraint is gone from the world.
    pub fn midpoint(&self, world: &dyn PhysicsWorld) -> EngineResult<Point3> {
        Ok(world.constraint_anchors(self.constraint())?.midpoint())
    }
}

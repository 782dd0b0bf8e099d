//! Grids of rigid solids joined by hinges or sockets, skinned by cells.

mod cell;
mod joint;

pub use cell::JointCell;
pub use joint::{HingeJoint, Joint, SocketJoint};

use tracing::{debug, error, info};

use crate::color::Color;
use crate::engine::{ConstraintDesc, SharedWorld};
use crate::error::{OperationError, Result};
use crate::export::Exporter;
use crate::factory::StructureFactory;
use crate::math::{Point3, Vector3};
use crate::solid::{Solid, SolidKind};
use crate::visual::Canvas;

/// Kind of joint placed between grid neighbours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkType {
    /// Hinges sharing one axis.
    #[default]
    Hinge,
    /// Point-to-point sockets.
    Socket,
}

/// Parameters of [`LinkMesh::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkParams {
    /// Solids along X.
    pub w: usize,
    /// Solids along Z.
    pub d: usize,
    pub radius: f64,
    /// Center spacing as a multiple of the diameter.
    pub spacing_scale: f64,
    pub link_type: LinkType,
    /// Axis of every hinge when `link_type` is [`LinkType::Hinge`].
    pub hinge_axis: Vector3,
    /// Center of the first solid.
    pub origin: Point3,
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            w: 10,
            d: 10,
            radius: 1.0,
            spacing_scale: 1.1,
            link_type: LinkType::Hinge,
            hinge_axis: Vector3::z(),
            origin: Point3::new(0.0, 40.0, 0.0),
        }
    }
}

/// Per-edge hinge axes for [`LinkMesh::from_solids`].
///
/// `axis_w[i][k]` orients the joint between solids `(i, k)` and
/// `(i + 1, k)`; `axis_d[i][k]` the joint between `(i, k)` and
/// `(i, k + 1)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HingeAxes {
    pub axis_w: Vec<Vec<Vector3>>,
    pub axis_d: Vec<Vec<Vector3>>,
}

impl HingeAxes {
    /// The same axis on every edge of a `w x d` grid.
    #[must_use]
    pub fn uniform(w: usize, d: usize, axis: Vector3) -> Self {
        Self {
            axis_w: vec![vec![axis; d]; w.saturating_sub(1)],
            axis_d: vec![vec![axis; d.saturating_sub(1)]; w],
        }
    }

    fn width_axis(&self, i: usize, k: usize) -> Option<Vector3> {
        self.axis_w.get(i).and_then(|row| row.get(k)).copied()
    }

    fn depth_axis(&self, i: usize, k: usize) -> Option<Vector3> {
        self.axis_d.get(i).and_then(|row| row.get(k)).copied()
    }
}

/// A `w x d` grid of rigid solids with a joint between every pair of
/// axis-adjacent solids and a [`JointCell`] over every grid square.
///
/// Solid `(i, k)` sits at index `i * d + k`, with `i` along X (width) and
/// `k` along Z (depth). The mesh owns its solids; dropping it removes its
/// constraints first, then the bodies.
pub struct LinkMesh {
    world: SharedWorld,
    w: usize,
    d: usize,
    solids: Vec<Solid>,
    joints: Vec<Joint>,
    cells: Vec<JointCell>,
    hinge_joints: Vec<usize>,
    color: Color,
}

impl std::fmt::Debug for LinkMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkMesh")
            .field("w", &self.w)
            .field("d", &self.d)
            .field("solids", &self.solids.len())
            .field("joints", &self.joints.len())
            .field("cells", &self.cells.len())
            .field("hinge_joints", &self.hinge_joints.len())
            .finish_non_exhaustive()
    }
}

/// Joint indices laid out on the grid while linking.
struct JointGrid {
    width: Vec<Option<usize>>,
    depth: Vec<Option<usize>>,
}

impl LinkMesh {
    /// Builds a grid of rigid spheres from `factory` and links it.
    ///
    /// # Errors
    ///
    /// Returns an error if the grid is empty or the engine rejects a body
    /// or joint.
    pub fn create(factory: &mut StructureFactory, params: &LinkParams) -> Result<Self> {
        if params.w == 0 || params.d == 0 {
            return Err(OperationError::InvalidInput(format!(
                "link mesh must be at least 1x1, got {}x{}",
                params.w, params.d
            ))
            .into());
        }
        let spacing = 2.0 * params.radius * params.spacing_scale;

        let mut solids = Vec::with_capacity(params.w * params.d);
        for i in 0..params.w {
            for k in 0..params.d {
                #[allow(clippy::cast_precision_loss)]
                let offset = Vector3::new(spacing * i as f64, 0.0, spacing * k as f64);
                solids.push(factory.create_rigid_sphere(params.origin + offset, params.radius)?);
            }
        }

        let axes = match params.link_type {
            LinkType::Hinge => Some(HingeAxes::uniform(params.w, params.d, params.hinge_axis)),
            LinkType::Socket => None,
        };
        Self::from_solids(factory.world().clone(), solids, params.w, params.d, axes.as_ref())
    }

    /// Links caller-provided rigid solids laid out as a `w x d` grid.
    ///
    /// Each joint sits halfway between its two bodies. Edges with an axis
    /// in `axes` get a hinge about it; all others get a socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the solid count does not match the grid, a solid
    /// is not rigid, or the engine rejects a joint.
    pub fn from_solids(
        world: SharedWorld,
        solids: Vec<Solid>,
        w: usize,
        d: usize,
        axes: Option<&HingeAxes>,
    ) -> Result<Self> {
        if w == 0 || d == 0 || solids.len() != w * d {
            return Err(OperationError::InvalidInput(format!(
                "{} solids do not form a {w}x{d} grid",
                solids.len()
            ))
            .into());
        }
        if solids.iter().any(|s| s.kind() != SolidKind::Rigid) {
            return Err(OperationError::InvalidInput("link meshes take rigid solids only".into()).into());
        }

        let mut mesh = Self {
            world,
            w,
            d,
            solids,
            joints: Vec::new(),
            cells: Vec::new(),
            hinge_joints: Vec::new(),
            color: Color::CELL,
        };
        // On error the partially built mesh drops, removing what was linked.
        let grid = mesh.link(axes)?;
        mesh.build_cells(&grid);
        mesh.isolate_hinges();
        mesh.update()?;

        info!(
            w,
            d,
            joints = mesh.joints.len(),
            hinges = mesh.hinge_joints.len(),
            cells = mesh.cells.len(),
            "link mesh created"
        );
        Ok(mesh)
    }

    fn index(&self, i: usize, k: usize) -> usize {
        i * self.d + k
    }

    fn link(&mut self, axes: Option<&HingeAxes>) -> Result<JointGrid> {
        let mut grid = JointGrid {
            width: vec![None; self.w * self.d],
            depth: vec![None; self.w * self.d],
        };
        for i in 0..self.w {
            for k in 0..self.d {
                let here = self.index(i, k);
                if k + 1 < self.d {
                    let axis = axes.and_then(|a| a.depth_axis(i, k));
                    grid.depth[here] = Some(self.join(here, self.index(i, k + 1), axis)?);
                }
                if i + 1 < self.w {
                    let axis = axes.and_then(|a| a.width_axis(i, k));
                    grid.width[here] = Some(self.join(here, self.index(i + 1, k), axis)?);
                }
            }
        }
        Ok(grid)
    }

    fn join(&mut self, a: usize, b: usize, axis: Option<Vector3>) -> Result<usize> {
        let (body_a, body_b) = (self.solids[a].body(), self.solids[b].body());
        let mut world = self.world.borrow_mut();
        let pivot = nalgebra::center(
            &world.body_position(body_a)?,
            &world.body_position(body_b)?,
        );
        let joint = match axis {
            Some(axis) => {
                let constraint = world.add_constraint(ConstraintDesc::Hinge {
                    a: body_a,
                    b: body_b,
                    pivot,
                    axis,
                })?;
                Joint::Hinge(HingeJoint::new(constraint, axis))
            }
            None => {
                let constraint = world.add_constraint(ConstraintDesc::Socket {
                    a: body_a,
                    b: body_b,
                    pivot,
                })?;
                Joint::Socket(SocketJoint::new(constraint))
            }
        };
        self.joints.push(joint);
        Ok(self.joints.len() - 1)
    }

    fn build_cells(&mut self, grid: &JointGrid) {
        for i in 0..self.w.saturating_sub(1) {
            for k in 0..self.d.saturating_sub(1) {
                let corners = [
                    grid.depth[self.index(i, k)],
                    grid.width[self.index(i, k + 1)],
                    grid.depth[self.index(i + 1, k)],
                    grid.width[self.index(i, k)],
                ];
                if let [Some(j0), Some(j1), Some(j2), Some(j3)] = corners {
                    self.cells.push(JointCell::new([j0, j1, j2, j3]));
                }
            }
        }
    }

    /// Collects the hinge subset of the joints, in grid order.
    pub fn isolate_hinges(&mut self) {
        self.hinge_joints = self
            .joints
            .iter()
            .enumerate()
            .filter(|(_, joint)| matches!(joint, Joint::Hinge(_)))
            .map(|(index, _)| index)
            .collect();
    }

    /// The hinges found by [`isolate_hinges`](Self::isolate_hinges).
    pub fn hinge_joints(&self) -> impl Iterator<Item = &HingeJoint> + '_ {
        self.hinge_joints
            .iter()
            .filter_map(|&index| self.joints.get(index).and_then(Joint::as_hinge))
    }

    /// Every joint, in grid order.
    #[must_use]
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    #[must_use]
    pub fn cells(&self) -> &[JointCell] {
        &self.cells
    }

    #[must_use]
    pub fn solids(&self) -> &[Solid] {
        &self.solids
    }

    /// Grid size as `(w, d)`.
    #[must_use]
    pub fn dims(&self) -> (usize, usize) {
        (self.w, self.d)
    }

    /// Recomputes every cell from the current joint positions.
    ///
    /// # Errors
    ///
    /// Returns an error if a joint's constraint is gone from the world.
    pub fn update(&mut self) -> Result<()> {
        let world = self.world.borrow();
        for cell in &mut self.cells {
            cell.update(&self.joints, &*world)?;
        }
        Ok(())
    }

    /// Pushes `g` to every solid of the mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if a body is gone from the world.
    pub fn set_gravity(&self, g: f64) -> Result<()> {
        for solid in &self.solids {
            solid.set_gravity(g)?;
        }
        Ok(())
    }

    /// Wakes every solid.
    ///
    /// # Errors
    ///
    /// Returns an error if a body is gone from the world.
    pub fn activate(&self) -> Result<()> {
        for solid in &self.solids {
            solid.activate()?;
        }
        Ok(())
    }

    /// Draws the solids, then the cell skin.
    pub fn draw(&self, canvas: &mut dyn Canvas) {
        for solid in &self.solids {
            solid.draw(canvas);
        }
        let triangles: Vec<[Point3; 3]> = self
            .cells
            .iter()
            .flat_map(|c| c.triangles().iter().copied())
            .collect();
        let normals: Vec<Vector3> = self
            .cells
            .iter()
            .flat_map(|c| c.normals().iter().copied())
            .collect();
        canvas.triangles(&triangles, &normals, self.color);
    }

    /// Exports the cell skin and every hinge, then closes the layer.
    pub fn save(&self, exporter: &mut dyn Exporter) {
        for cell in &self.cells {
            cell.save(exporter);
        }
        let world = self.world.borrow();
        for hinge in self.hinge_joints() {
            match world.constraint_anchors(hinge.constraint()) {
                Ok(anchors) => exporter.hinge(&anchors.midpoint(), hinge.axis()),
                Err(err) => debug!(%err, "skipping hinge export"),
            }
        }
        exporter.add_layer();
    }
}

impl Drop for LinkMesh {
    fn drop(&mut self) {
        let Ok(mut world) = self.world.try_borrow_mut() else {
            error!("physics world busy; link mesh constraints not removed");
            return;
        };
        for joint in &self.joints {
            if let Err(err) = world.remove_constraint(joint.constraint()) {
                error!(%err, "failed to remove link mesh joint");
            }
        }
        debug!(joints = self.joints.len(), "link mesh joints removed");
    }
}

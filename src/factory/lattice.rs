use tracing::{debug, error};

use crate::engine::{BodyHandle, ConstraintDesc, ConstraintHandle, SpringDesc};
use crate::error::{OperationError, Result};
use crate::math::{Point3, Vector3};
use crate::solid::Solid;

use super::StructureFactory;

/// Offset of each linked sphere from the pair's center, in radii.
const LINKED_OFFSET: f64 = 1.1;
/// Gap between neighbouring deformable spheres, in radii.
const SOFT_GAP: f64 = 0.4;
/// Gap between neighbouring rigid spheres, in radii.
const RIGID_GAP: f64 = 0.3;
/// Angular limit about Z of lattice springs, in radians.
const SPRING_TWIST: f64 = 1.5;
const SPRING_STIFFNESS: f64 = 20.0;
/// 0..1, where 1 means no damping.
const SPRING_DAMPING: f64 = 0.1;

/// Cell counts of a 3D lattice along width (X), height (Y) and depth (Z).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatticeDims {
    pub w: usize,
    pub h: usize,
    pub d: usize,
}

impl LatticeDims {
    #[must_use]
    pub fn new(w: usize, h: usize, d: usize) -> Self {
        Self { w, h, d }
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.w * self.h * self.d
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of cell `(i, j, k)` in creation order.
    #[must_use]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.h + j) * self.d + k
    }

    /// Cells in creation order: `i` outermost, `k` innermost.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        (0..self.w).flat_map(move |i| {
            (0..self.h).flat_map(move |j| (0..self.d).map(move |k| (i, j, k)))
        })
    }

    /// Every pair of axis-adjacent cells as `(earlier, later)` indices.
    ///
    /// For each cell, its neighbours at `i - 1`, `j - 1` and `k - 1` are
    /// listed in that order.
    #[must_use]
    pub fn adjacent_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::with_capacity(self.link_count());
        for (i, j, k) in self.cells() {
            let here = self.index(i, j, k);
            if i > 0 {
                pairs.push((self.index(i - 1, j, k), here));
            }
            if j > 0 {
                pairs.push((self.index(i, j - 1, k), here));
            }
            if k > 0 {
                pairs.push((self.index(i, j, k - 1), here));
            }
        }
        pairs
    }

    /// `(w-1)hd + w(h-1)d + wh(d-1)`, or zero for an empty lattice.
    #[must_use]
    pub fn link_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let (w, h, d) = (self.w, self.h, self.d);
        (w - 1) * h * d + w * (h - 1) * d + w * h * (d - 1)
    }
}

/// Whether lattice neighbours are joined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NeighborLinks {
    /// Bodies are independent.
    #[default]
    None,
    /// Every axis-adjacent pair is joined: deformable spheres by a socket at
    /// the midpoint, rigid spheres by a six-axis spring.
    Linked,
}

impl StructureFactory {
    /// Creates two deformable spheres above and below `position`, joined by
    /// a socket at `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects a body or the joint.
    pub fn create_linked_spheres(&mut self, position: Point3, radius: f64) -> Result<Vec<Solid>> {
        let offset = Vector3::new(0.0, radius * LINKED_OFFSET, 0.0);
        let (p1, p2) = (position + offset, position - offset);
        let resolution = self.config.soft_sphere_resolution;

        let a = self.soft_sphere_body(p1, radius, resolution)?;
        let first = self.soft_sphere_solid(a);
        let b = self.soft_sphere_body(p2, radius, resolution)?;
        let second = self.soft_sphere_solid(b);

        self.socket_link(a, b, &p1, &p2)?;
        Ok(vec![first, second])
    }

    /// Creates a `w x h x d` lattice of deformable spheres.
    ///
    /// Centers advance by `2r + 0.4r` per step; the Y step is negated when
    /// the mesh is pointed up. Solids are returned in
    /// [`LatticeDims::cells`] order.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects a body or joint.
    pub fn create_sphere_matrix(
        &mut self,
        position: Point3,
        radius: f64,
        dims: LatticeDims,
        links: NeighborLinks,
    ) -> Result<Vec<Solid>> {
        let positions = self.lattice_positions(position, radius, SOFT_GAP, dims)?;
        let resolution = self.config.soft_matrix_resolution;

        let mut bodies = Vec::with_capacity(positions.len());
        let mut solids = Vec::with_capacity(positions.len());
        for p in &positions {
            let body = self.soft_sphere_body(*p, radius, resolution)?;
            bodies.push(body);
            solids.push(self.soft_sphere_solid(body));
        }

        if links == NeighborLinks::Linked {
            self.link_pairs(&dims.adjacent_pairs(), |factory, a, b| {
                factory.socket_link(bodies[a], bodies[b], &positions[a], &positions[b])
            })?;
        }

        debug!(?dims, ?links, "soft sphere matrix created");
        Ok(solids)
    }

    /// Creates a `w x h x d` lattice of rigid spheres.
    ///
    /// Centers advance by `2r + 0.3r` per step; the Y step is negated when
    /// the mesh is pointed up. With [`NeighborLinks::Linked`] every
    /// axis-adjacent pair is joined by a six-axis spring whose linear
    /// limits are half the center distance either way and whose angular
    /// limits allow only a twist of 1.5 rad about Z.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects a body or spring.
    pub fn create_rigid_sphere_matrix(
        &mut self,
        position: Point3,
        radius: f64,
        dims: LatticeDims,
        links: NeighborLinks,
    ) -> Result<Vec<Solid>> {
        let positions = self.lattice_positions(position, radius, RIGID_GAP, dims)?;

        let mut solids = Vec::with_capacity(positions.len());
        for p in &positions {
            solids.push(self.create_rigid_sphere(*p, radius)?);
        }

        if links == NeighborLinks::Linked {
            self.link_pairs(&dims.adjacent_pairs(), |factory, a, b| {
                factory.spring_link(
                    solids[a].body(),
                    solids[b].body(),
                    &positions[a],
                    &positions[b],
                )
            })?;
        }

        debug!(?dims, ?links, "rigid sphere matrix created");
        Ok(solids)
    }

    fn lattice_positions(
        &self,
        origin: Point3,
        radius: f64,
        gap: f64,
        dims: LatticeDims,
    ) -> Result<Vec<Point3>> {
        if dims.is_empty() {
            return Err(OperationError::InvalidInput(format!(
                "lattice dimensions must be positive, got {dims:?}"
            ))
            .into());
        }
        let step = 2.0 * radius + gap * radius;
        let y_step = if self.config.pointed_up { -step } else { step };

        #[allow(clippy::cast_precision_loss)]
        let positions = dims
            .cells()
            .map(|(i, j, k)| {
                origin + Vector3::new(step * i as f64, y_step * j as f64, step * k as f64)
            })
            .collect();
        Ok(positions)
    }

    /// Joins every pair with `link`. If one link fails, the links made so
    /// far are removed again so the bodies can be dropped.
    fn link_pairs(
        &mut self,
        pairs: &[(usize, usize)],
        mut link: impl FnMut(&mut Self, usize, usize) -> Result<ConstraintHandle>,
    ) -> Result<Vec<ConstraintHandle>> {
        let mut added = Vec::with_capacity(pairs.len());
        for &(a, b) in pairs {
            match link(self, a, b) {
                Ok(constraint) => added.push(constraint),
                Err(err) => {
                    let mut world = self.world.borrow_mut();
                    for constraint in added {
                        if let Err(remove_err) = world.remove_constraint(constraint) {
                            error!(?constraint, %remove_err, "failed to roll back lattice link");
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(added)
    }

    fn socket_link(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        pa: &Point3,
        pb: &Point3,
    ) -> Result<ConstraintHandle> {
        let pivot = nalgebra::center(pa, pb);
        Ok(self
            .world
            .borrow_mut()
            .add_constraint(ConstraintDesc::Socket { a, b, pivot })?)
    }

    fn spring_link(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        pa: &Point3,
        pb: &Point3,
    ) -> Result<ConstraintHandle> {
        let dist = pb - pa;
        let twist = Vector3::new(0.0, 0.0, SPRING_TWIST);
        let spring = SpringDesc {
            a,
            b,
            frame_in_a: dist,
            linear_lower: -dist / 2.0,
            linear_upper: dist / 2.0,
            angular_lower: -twist,
            angular_upper: twist,
            enabled: [true; 6],
            stiffness: [SPRING_STIFFNESS; 6],
            damping: [SPRING_DAMPING; 6],
        };
        Ok(self
            .world
            .borrow_mut()
            .add_constraint(ConstraintDesc::Spring6Dof(spring))?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::engine::{PhysicsWorld, SharedWorld, SimpleWorld, WorldSettings};
    use crate::factory::tests::factory;
    use crate::factory::FactoryConfig;

    fn limited_factory(max_constraints: usize) -> (Rc<RefCell<SimpleWorld>>, StructureFactory) {
        let world = Rc::new(RefCell::new(SimpleWorld::new(WorldSettings {
            max_constraints,
            ..WorldSettings::default()
        })));
        let shared: SharedWorld = world.clone();
        (world, StructureFactory::new(shared, FactoryConfig::default()))
    }

    fn clear(world: &std::cell::RefCell<SimpleWorld>) {
        let mut w = world.borrow_mut();
        for c in w.constraints() {
            w.remove_constraint(c).unwrap();
        }
    }

    #[test]
    fn link_count_formula() {
        assert_eq!(LatticeDims::new(2, 1, 2).link_count(), 4);
        assert_eq!(LatticeDims::new(3, 3, 3).link_count(), 54);
        assert_eq!(LatticeDims::new(1, 1, 1).link_count(), 0);
        assert_eq!(LatticeDims::new(0, 4, 4).link_count(), 0);
        for (w, h, d) in [(2, 3, 4), (5, 1, 1), (1, 2, 7)] {
            let dims = LatticeDims::new(w, h, d);
            assert_eq!(dims.adjacent_pairs().len(), dims.link_count());
        }
    }

    #[test]
    fn failed_rigid_linking_leaves_nothing_behind() {
        let (world, mut factory) = limited_factory(2);
        let result = factory.create_rigid_sphere_matrix(
            Point3::new(0.0, 10.0, 0.0),
            1.0,
            LatticeDims::new(2, 1, 2),
            NeighborLinks::Linked,
        );
        assert!(result.is_err());
        let w = world.borrow();
        assert!(w.constraints().is_empty());
        assert_eq!(w.body_count(), 0);
    }

    #[test]
    fn failed_soft_linking_leaves_nothing_behind() {
        let (world, mut factory) = limited_factory(3);
        let result = factory.create_sphere_matrix(
            Point3::new(0.0, 10.0, 0.0),
            1.0,
            LatticeDims::new(2, 2, 1),
            NeighborLinks::Linked,
        );
        assert!(result.is_err());
        let w = world.borrow();
        assert!(w.constraints().is_empty());
        assert_eq!(w.body_count(), 0);
    }

    #[test]
    fn adjacent_pairs_of_two_by_one_by_two() {
        let pairs = LatticeDims::new(2, 1, 2).adjacent_pairs();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn rigid_matrix_springs_every_neighbor_pair() {
        let (world, mut factory) = factory();
        let solids = factory
            .create_rigid_sphere_matrix(
                Point3::new(0.0, 10.0, 0.0),
                1.0,
                LatticeDims::new(2, 1, 2),
                NeighborLinks::Linked,
            )
            .unwrap();
        assert_eq!(solids.len(), 4);

        let w = world.borrow();
        let constraints = w.constraints();
        assert_eq!(constraints.len(), 4);
        for c in &constraints {
            let Some(ConstraintDesc::Spring6Dof(spring)) = w.constraint_desc(*c) else {
                panic!("expected a spring");
            };
            assert_relative_eq!(spring.frame_in_a.norm(), 2.3);
            assert_eq!(spring.linear_upper, spring.frame_in_a / 2.0);
            assert_eq!(spring.angular_upper, Vector3::new(0.0, 0.0, 1.5));
            assert_eq!(spring.stiffness, [20.0; 6]);
            assert_eq!(spring.damping, [0.1; 6]);
            assert!(spring.enabled.iter().all(|e| *e));
        }
        drop(w);
        clear(&world);
    }

    #[test]
    fn unlinked_matrices_have_no_constraints() {
        let (world, mut factory) = factory();
        let dims = LatticeDims::new(2, 2, 2);
        let rigid = factory
            .create_rigid_sphere_matrix(Point3::origin(), 1.0, dims, NeighborLinks::None)
            .unwrap();
        let soft = factory
            .create_sphere_matrix(Point3::new(20.0, 0.0, 0.0), 1.0, dims, NeighborLinks::default())
            .unwrap();
        assert_eq!(rigid.len() + soft.len(), 16);
        assert!(world.borrow().constraints().is_empty());
    }

    #[test]
    fn soft_matrix_can_socket_link() {
        let (world, mut factory) = factory();
        let dims = LatticeDims::new(3, 2, 1);
        let solids = factory
            .create_sphere_matrix(Point3::origin(), 1.0, dims, NeighborLinks::Linked)
            .unwrap();
        assert_eq!(solids.len(), 6);
        assert_eq!(world.borrow().constraints().len(), dims.link_count());
        let expected = crate::mesh::Ellipsoid::new(Point3::origin(), Vector3::repeat(1.0), 50)
            .execute()
            .unwrap()
            .num_vertices();
        assert_eq!(world.borrow().node_count(solids[0].body()).unwrap(), expected);
        clear(&world);
    }

    #[test]
    fn matrix_spacing_and_orientation() {
        let (world, mut factory) = factory();
        let dims = LatticeDims::new(1, 2, 1);
        let down = factory
            .create_rigid_sphere_matrix(Point3::origin(), 1.0, dims, NeighborLinks::None)
            .unwrap();
        factory.config_mut().pointed_up = true;
        let up = factory
            .create_rigid_sphere_matrix(Point3::new(10.0, 0.0, 0.0), 1.0, dims, NeighborLinks::None)
            .unwrap();

        let w = world.borrow();
        assert_relative_eq!(w.body_position(down[1].body()).unwrap().y, 2.3);
        assert_relative_eq!(w.body_position(up[1].body()).unwrap().y, -2.3);
    }

    #[test]
    fn empty_lattice_is_rejected() {
        let (_world, mut factory) = factory();
        let result = factory.create_rigid_sphere_matrix(
            Point3::origin(),
            1.0,
            LatticeDims::new(0, 1, 1),
            NeighborLinks::Linked,
        );
        assert!(result.is_err());
    }

    #[test]
    fn linked_spheres_share_a_midpoint_socket() {
        let (world, mut factory) = factory();
        let pair = factory
            .create_linked_spheres(Point3::new(0.0, 10.0, 0.0), 2.0)
            .unwrap();
        assert_eq!(pair.len(), 2);

        let w = world.borrow();
        let constraints = w.constraints();
        assert_eq!(constraints.len(), 1);
        let Some(ConstraintDesc::Socket { pivot, .. }) = w.constraint_desc(constraints[0]) else {
            panic!("expected a socket");
        };
        assert_eq!(*pivot, Point3::new(0.0, 10.0, 0.0));
        let top = w.body_position(pair[0].body()).unwrap();
        assert_relative_eq!(top.y, 12.2, epsilon = 1e-9);
        drop(w);
        clear(&world);
    }
}

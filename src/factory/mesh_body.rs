use std::f64::consts::TAU;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::color::Color;
use crate::engine::{SoftBodyDesc, SoftShape};
use crate::error::{GeometryError, OperationError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};
use crate::mesh::{AnchorVertices, BagMesh, DedupMode, Deduplicate, TriangleMesh};
use crate::solid::Solid;
use crate::visual::SoftBodyVisual;

use super::StructureFactory;

impl StructureFactory {
    /// Builds a deformable body from an arbitrary triangle mesh.
    ///
    /// Duplicate vertices are merged first so the body's nodes are shared
    /// between faces. The body gets the mesh material, is scaled about the
    /// origin and receives a uniform node mass. With `lock_base`, the nodes
    /// in the anchor band (see [`AnchorVertices`]) are then given zero mass,
    /// pinning them in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the mesh.
    pub fn create_mesh_body(
        &mut self,
        mesh: &TriangleMesh,
        scale: Vector3,
        lock_base: bool,
    ) -> Result<Solid> {
        let prepared = Deduplicate::new(DedupMode::Exact).execute(mesh);
        if !prepared.is_clean() {
            warn!(
                orphaned = prepared.orphaned_triangles.len(),
                "mesh body built from a mesh with unmatched triangle corners"
            );
        }
        let mesh = prepared.mesh;

        let desc = SoftBodyDesc {
            shape: SoftShape::TriMesh {
                vertices: mesh.flat_vertices(),
                triangles: mesh.flat_indices(),
            },
            material: self.config.mesh_material,
            total_mass: None,
            clusters: 0,
            self_collision: true,
        };

        let body = {
            let mut world = self.world.borrow_mut();
            let body = world.add_soft_body(desc)?;
            world.scale_soft_body(body, &scale)?;

            let nodes = world.node_count(body)?;
            for node in 0..nodes {
                world.set_node_mass(body, node, self.config.mesh_node_mass)?;
            }

            if lock_base {
                let anchors = AnchorVertices::new(self.config.pointed_up).execute(&mesh);
                for &node in &anchors {
                    world.set_node_mass(body, node, 0.0)?;
                }
                debug!(?body, anchors = anchors.len(), "mesh body base locked");
            }
            body
        };

        debug!(
            ?body,
            vertices = mesh.num_vertices(),
            triangles = mesh.num_triangles(),
            "mesh body created"
        );
        let visual = SoftBodyVisual::new(body, Color::CONTAINER);
        Ok(Solid::soft(Rc::clone(&self.world), body, Some(Box::new(visual))))
    }

    /// Builds an open bag (see [`BagMesh`]) as a deformable mesh body.
    ///
    /// # Errors
    ///
    /// Returns an error if the bag cannot be generated or the engine
    /// rejects it.
    pub fn create_bag(&mut self, center: Point3, radius: f64, lock_base: bool) -> Result<Solid> {
        let mesh = BagMesh::new(center, radius).execute()?;
        self.create_mesh_body(&mesh, Vector3::repeat(1.0), lock_base)
    }

    /// Builds a deformable body over the convex hull of `points`.
    ///
    /// Only hull vertices become nodes; points inside the hull are
    /// ignored. The body gets the mesh material and a uniform node mass.
    ///
    /// # Errors
    ///
    /// Returns an error if the points do not span a volume or the engine
    /// rejects the body.
    pub fn create_soft_from_convex_hull(&mut self, points: &[Point3]) -> Result<Solid> {
        let desc = SoftBodyDesc {
            shape: SoftShape::ConvexHull {
                points: points.to_vec(),
            },
            material: self.config.mesh_material,
            total_mass: None,
            clusters: 0,
            self_collision: false,
        };

        let body = {
            let mut world = self.world.borrow_mut();
            let body = world.add_soft_body(desc)?;
            let nodes = world.node_count(body)?;
            for node in 0..nodes {
                world.set_node_mass(body, node, self.config.mesh_node_mass)?;
            }
            debug!(?body, points = points.len(), nodes, "soft hull created");
            body
        };

        let visual = SoftBodyVisual::new(body, Color::CONTAINER);
        Ok(Solid::soft(Rc::clone(&self.world), body, Some(Box::new(visual))))
    }

    /// Builds a closed deformable cylinder between two disc centers, as the
    /// hull of both rims with `segments` points each.
    ///
    /// # Errors
    ///
    /// Returns an error if the centers coincide, the radius is near zero,
    /// `segments` is below 3, or the engine rejects the body.
    pub fn create_soft_cylinder(
        &mut self,
        start: Point3,
        end: Point3,
        radius: f64,
        segments: usize,
    ) -> Result<Solid> {
        if radius < TOLERANCE {
            return Err(
                OperationError::InvalidInput("cylinder radius must be positive".into()).into(),
            );
        }
        if segments < 3 {
            return Err(OperationError::InvalidInput(
                "cylinder needs at least 3 segments".into(),
            )
            .into());
        }
        let axis = (end - start)
            .try_normalize(TOLERANCE)
            .ok_or(GeometryError::ZeroVector)?;
        let alt = if axis.cross(&Vector3::y()).norm() < TOLERANCE {
            Vector3::z()
        } else {
            Vector3::y()
        };
        let u = axis.cross(&alt).normalize();
        let v = axis.cross(&u);

        #[allow(clippy::cast_precision_loss)]
        let points: Vec<Point3> = [start, end]
            .iter()
            .flat_map(|center| {
                (0..segments).map(move |s| {
                    let angle = TAU * s as f64 / segments as f64;
                    center + (u * angle.cos() + v * angle.sin()) * radius
                })
            })
            .collect();
        self.create_soft_from_convex_hull(&points)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::engine::PhysicsWorld;
    use crate::factory::tests::factory;

    /// Column of 11 rings stacked at heights 0..=10, as a triangle soup.
    fn tower() -> TriangleMesh {
        let mut mesh = TriangleMesh::new();
        for h in 0..10 {
            let y0 = f64::from(h);
            let y1 = y0 + 1.0;
            let a = mesh.append_vertex(Point3::new(0.0, y0, 0.0));
            let b = mesh.append_vertex(Point3::new(1.0, y0, 0.0));
            let c = mesh.append_vertex(Point3::new(1.0, y1, 0.0));
            mesh.append_triangle(a, b, c);
            let d = mesh.append_vertex(Point3::new(0.0, y0, 0.0));
            let e = mesh.append_vertex(Point3::new(1.0, y1, 0.0));
            let f = mesh.append_vertex(Point3::new(0.0, y1, 0.0));
            mesh.append_triangle(d, e, f);
        }
        mesh
    }

    #[test]
    fn nodes_are_deduplicated() {
        let (world, mut factory) = factory();
        let solid = factory
            .create_mesh_body(&tower(), Vector3::repeat(1.0), false)
            .unwrap();
        assert_eq!(world.borrow().node_count(solid.body()).unwrap(), 22);
    }

    #[test]
    fn base_lock_zeroes_anchor_masses_only() {
        let (world, mut factory) = factory();
        let solid = factory
            .create_mesh_body(&tower(), Vector3::repeat(1.0), true)
            .unwrap();
        let w = world.borrow();
        let positions = w.node_positions(solid.body()).unwrap();
        for (node, p) in positions.iter().enumerate() {
            let mass = w.node_mass(solid.body(), node).unwrap();
            if p.y >= 9.0 {
                assert_relative_eq!(mass, 0.0);
            } else {
                assert_relative_eq!(mass, 1.0);
            }
        }
    }

    #[test]
    fn pointed_up_locks_the_bottom() {
        let (world, mut factory) = factory();
        factory.config_mut().pointed_up = true;
        let solid = factory
            .create_mesh_body(&tower(), Vector3::repeat(1.0), true)
            .unwrap();
        let w = world.borrow();
        let positions = w.node_positions(solid.body()).unwrap();
        for (node, p) in positions.iter().enumerate() {
            let pinned = w.node_mass(solid.body(), node).unwrap() == 0.0;
            assert_eq!(pinned, p.y <= 1.0);
        }
    }

    #[test]
    fn scale_is_applied() {
        let (world, mut factory) = factory();
        let solid = factory
            .create_mesh_body(&tower(), Vector3::new(2.0, 0.5, 1.0), false)
            .unwrap();
        let w = world.borrow();
        let top = w
            .node_positions(solid.body())
            .unwrap()
            .iter()
            .fold(f64::MIN, |acc, p| acc.max(p.y));
        assert_relative_eq!(top, 5.0);
    }

    #[test]
    fn mesh_body_uses_mesh_material() {
        let (world, mut factory) = factory();
        let solid = factory
            .create_mesh_body(&tower(), Vector3::repeat(1.0), false)
            .unwrap();
        assert_eq!(
            world.borrow().soft_material(solid.body()),
            Some(factory.config().mesh_material)
        );
    }

    #[test]
    fn hull_body_keeps_hull_vertices_only() {
        let (world, mut factory) = factory();
        let mut points = Vec::new();
        for x in [0.0, 2.0] {
            for y in [10.0, 12.0] {
                for z in [0.0, 2.0] {
                    points.push(Point3::new(x, y, z));
                }
            }
        }
        points.push(Point3::new(1.0, 11.0, 1.0));

        let solid = factory.create_soft_from_convex_hull(&points).unwrap();
        let w = world.borrow();
        assert_eq!(w.node_count(solid.body()).unwrap(), 8);
        assert_eq!(w.soft_faces(solid.body()).unwrap().len(), 12);
        assert_eq!(
            w.soft_material(solid.body()),
            Some(factory.config().mesh_material)
        );
        for node in 0..8 {
            assert_relative_eq!(w.node_mass(solid.body(), node).unwrap(), 1.0);
        }
    }

    #[test]
    fn flat_hull_is_rejected() {
        let (world, mut factory) = factory();
        let square = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        assert!(factory.create_soft_from_convex_hull(&square).is_err());
        assert_eq!(world.borrow().body_count(), 0);
    }

    #[test]
    fn cylinder_nodes_lie_on_both_rims() {
        let (world, mut factory) = factory();
        let (start, end) = (Point3::new(0.0, 10.0, 0.0), Point3::new(0.0, 14.0, 0.0));
        let solid = factory.create_soft_cylinder(start, end, 1.5, 8).unwrap();

        let w = world.borrow();
        let nodes = w.node_positions(solid.body()).unwrap();
        assert_eq!(nodes.len(), 16);
        assert_eq!(w.soft_faces(solid.body()).unwrap().len(), 2 * 16 - 4);
        for p in nodes {
            assert_relative_eq!(p.x.hypot(p.z), 1.5, epsilon = 1e-9);
            assert!((p.y - 10.0).abs() < 1e-9 || (p.y - 14.0).abs() < 1e-9);
        }
    }

    #[test]
    fn cylinder_rejects_bad_input() {
        let (_world, mut factory) = factory();
        let a = Point3::new(0.0, 10.0, 0.0);
        let b = Point3::new(3.0, 10.0, 0.0);
        assert!(factory.create_soft_cylinder(a, a, 1.0, 8).is_err());
        assert!(factory.create_soft_cylinder(a, b, 0.0, 8).is_err());
        assert!(factory.create_soft_cylinder(a, b, 1.0, 2).is_err());
        assert!(factory.create_soft_cylinder(a, b, 1.0, 3).is_ok());
    }

    #[test]
    fn bag_body() {
        let (world, mut factory) = factory();
        let solid = factory
            .create_bag(Point3::new(0.0, 20.0, 0.0), 5.0, true)
            .unwrap();
        let w = world.borrow();
        let nodes = w.node_count(solid.body()).unwrap();
        assert!(nodes < 80 * 80);
        let pinned = (0..nodes)
            .filter(|&n| w.node_mass(solid.body(), n).unwrap() == 0.0)
            .count();
        assert!(pinned > 0);
    }
}

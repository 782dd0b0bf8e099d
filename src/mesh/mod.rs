mod anchors;
mod dedup;
mod generate;
mod hull;
mod obj;

pub use anchors::AnchorVertices;
pub use dedup::{DedupMode, Deduplicate, Deduplicated};
pub use generate::{BagMesh, Ellipsoid};
pub use hull::ConvexHull;
pub use obj::{load_obj, parse_obj};

use crate::math::triangle::triangle_normal;
use crate::math::{Point3, Vector3};

/// An indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Triangle indices (each triple defines a triangle).
    pub indices: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Creates an empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a vertex and returns its index.
    pub fn append_vertex(&mut self, point: Point3) -> u32 {
        self.vertices.push(point);
        u32::try_from(self.vertices.len() - 1).unwrap_or(u32::MAX)
    }

    /// Appends a triangle by vertex indices.
    pub fn append_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.push([a, b, c]);
    }

    /// Number of vertices.
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if the mesh has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns the corner positions of triangle `index`, or `None` if the
    /// triangle or any of its vertices is out of range.
    #[must_use]
    pub fn triangle(&self, index: usize) -> Option<[Point3; 3]> {
        let [a, b, c] = *self.indices.get(index)?;
        Some([
            *self.vertices.get(a as usize)?,
            *self.vertices.get(b as usize)?,
            *self.vertices.get(c as usize)?,
        ])
    }

    /// Iterates over all triangles with in-range indices.
    pub fn triangles(&self) -> impl Iterator<Item = [Point3; 3]> + '_ {
        (0..self.indices.len()).filter_map(|i| self.triangle(i))
    }

    /// Per-triangle unit normals (zero for degenerate triangles).
    #[must_use]
    pub fn face_normals(&self) -> Vec<Vector3> {
        self.triangles()
            .map(|[a, b, c]| triangle_normal(&a, &b, &c))
            .collect()
    }

    /// Vertex positions flattened to `[x0, y0, z0, x1, ...]`.
    #[must_use]
    pub fn flat_vertices(&self) -> Vec<f64> {
        self.vertices.iter().flat_map(|p| [p.x, p.y, p.z]).collect()
    }

    /// Triangle indices flattened to `[a0, b0, c0, a1, ...]`.
    #[must_use]
    pub fn flat_indices(&self) -> Vec<u32> {
        self.indices.iter().flatten().copied().collect()
    }

    /// Returns a copy with every vertex scaled component-wise about the origin.
    #[must_use]
    pub fn scaled(&self, scale: &Vector3) -> Self {
        Self {
            vertices: self
                .vertices
                .iter()
                .map(|p| Point3::from(p.coords.component_mul(scale)))
                .collect(),
            indices: self.indices.clone(),
        }
    }
}

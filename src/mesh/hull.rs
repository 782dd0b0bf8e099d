use std::collections::HashSet;

use crate::error::{OperationError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

use super::TriangleMesh;

/// Triangulated surface of the convex hull of a point set.
///
/// Points strictly inside the hull, or lying on one of its faces, are not
/// part of the output. Vertices keep the relative order of the input and
/// every triangle winds counter-clockwise seen from outside.
pub struct ConvexHull {
    points: Vec<Point3>,
}

struct Face {
    v: [usize; 3],
    normal: Vector3,
    offset: f64,
    alive: bool,
}

impl Face {
    fn new(points: &[Point3], v: [usize; 3]) -> Self {
        let [a, b, c] = v.map(|i| points[i]);
        let normal = (b - a)
            .cross(&(c - a))
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::zeros);
        Self {
            v,
            normal,
            offset: normal.dot(&a.coords),
            alive: true,
        }
    }

    fn distance(&self, p: &Point3) -> f64 {
        self.normal.dot(&p.coords) - self.offset
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.v;
        [(a, b), (b, c), (c, a)]
    }
}

impl ConvexHull {
    #[must_use]
    pub fn new(points: &[Point3]) -> Self {
        Self {
            points: points.to_vec(),
        }
    }

    /// Builds the hull surface.
    ///
    /// # Errors
    ///
    /// Returns an error if the points do not span a volume: fewer than
    /// four of them, or all on one plane.
    pub fn execute(&self) -> Result<TriangleMesh> {
        let points = &self.points;
        let eps = self.tolerance();
        let seed = self.seed(eps).ok_or_else(|| {
            OperationError::InvalidInput(
                "convex hull needs four points that are not coplanar".into(),
            )
        })?;

        let mut faces = Vec::new();
        for (i, &opposite) in seed.iter().enumerate() {
            let mut v = [0; 3];
            let mut n = 0;
            for (j, &corner) in seed.iter().enumerate() {
                if j != i {
                    v[n] = corner;
                    n += 1;
                }
            }
            let mut face = Face::new(points, v);
            if face.distance(&points[opposite]) > 0.0 {
                face = Face::new(points, [v[0], v[2], v[1]]);
            }
            faces.push(face);
        }

        for p in 0..points.len() {
            if seed.contains(&p) {
                continue;
            }
            let visible: Vec<usize> = faces
                .iter()
                .enumerate()
                .filter(|(_, f)| f.alive && f.distance(&points[p]) > eps)
                .map(|(i, _)| i)
                .collect();
            if visible.is_empty() {
                continue;
            }

            let edges: HashSet<(usize, usize)> = visible
                .iter()
                .flat_map(|&i| faces[i].edges())
                .collect();
            let horizon: Vec<(usize, usize)> = visible
                .iter()
                .flat_map(|&i| faces[i].edges())
                .filter(|&(a, b)| !edges.contains(&(b, a)))
                .collect();

            for &i in &visible {
                faces[i].alive = false;
            }
            for (a, b) in horizon {
                faces.push(Face::new(points, [a, b, p]));
            }
        }

        Ok(Self::collect(points, &faces))
    }

    /// Distance below which a point counts as lying on a face, scaled to
    /// the extent of the input.
    fn tolerance(&self) -> f64 {
        let Some(first) = self.points.first() else {
            return TOLERANCE;
        };
        let (lo, hi) = self
            .points
            .iter()
            .fold((first.coords, first.coords), |(lo, hi), p| {
                (lo.inf(&p.coords), hi.sup(&p.coords))
            });
        TOLERANCE.max((hi - lo).norm() * 1e-9)
    }

    /// Four points spanning a tetrahedron: the lowest X, the point farthest
    /// from it, the point farthest from their line and the point farthest
    /// from their plane.
    fn seed(&self, eps: f64) -> Option<[usize; 4]> {
        let points = &self.points;
        if points.len() < 4 {
            return None;
        }
        let (a, _) = farthest(points, |p| -p.x)?;
        let (b, ab) = farthest(points, |p| (p - points[a]).norm())?;
        if ab <= eps {
            return None;
        }
        let line = (points[b] - points[a]) / ab;
        let (c, off_line) = farthest(points, |p| (p - points[a]).cross(&line).norm())?;
        if off_line <= eps {
            return None;
        }
        let normal = (points[b] - points[a])
            .cross(&(points[c] - points[a]))
            .normalize();
        let (d, off_plane) = farthest(points, |p| normal.dot(&(p - points[a])).abs())?;
        if off_plane <= eps {
            return None;
        }
        Some([a, b, c, d])
    }

    fn collect(points: &[Point3], faces: &[Face]) -> TriangleMesh {
        let alive: Vec<&Face> = faces.iter().filter(|f| f.alive).collect();
        let mut used: Vec<usize> = alive.iter().flat_map(|f| f.v).collect();
        used.sort_unstable();
        used.dedup();

        let mut remap = vec![0u32; points.len()];
        let mut mesh = TriangleMesh::new();
        for &i in &used {
            remap[i] = mesh.append_vertex(points[i]);
        }
        for face in alive {
            let [a, b, c] = face.v.map(|i| remap[i]);
            mesh.append_triangle(a, b, c);
        }
        mesh
    }
}

/// Index and score of the highest-scoring point.
fn farthest(points: &[Point3], score: impl Fn(&Point3) -> f64) -> Option<(usize, f64)> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, score(p)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

use std::collections::HashMap;

use tracing::warn;

use crate::math::Point3;

use super::TriangleMesh;

/// How two vertices are judged to be the same position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DedupMode {
    /// Vertices merge only when all three coordinates compare equal.
    #[default]
    Exact,
    /// Vertices merge when closer than the given distance.
    ///
    /// Unreliable: the first vertex within range wins regardless of how many
    /// other kept vertices are also within range, so chains of nearby
    /// vertices collapse onto arbitrary representatives and far more
    /// vertices are removed than expected. Kept only as an explicit opt-in;
    /// every run logs a warning.
    Threshold(f64),
}

/// Result of [`Deduplicate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicated {
    /// The mesh with duplicate vertices merged and triangles re-indexed.
    pub mesh: TriangleMesh,
    /// Input triangles that had at least one vertex with no match in the
    /// reduced vertex list. Those corners were re-indexed to vertex 0.
    pub orphaned_triangles: Vec<usize>,
}

impl Deduplicated {
    /// Returns `true` if every triangle was re-indexed faithfully.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.orphaned_triangles.is_empty()
    }
}

/// Merges duplicate vertex positions of a triangle mesh.
///
/// Input vertices are scanned in order and the first occurrence of each
/// distinct position is kept. Every triangle is then re-indexed against
/// the reduced list, so the triangle count never changes and the vertex
/// count never grows.
///
/// A corner whose position cannot be found in the reduced list (a NaN
/// coordinate, or an index past the end of the vertex list) degrades to
/// index 0 instead of failing. Such triangles are reported in
/// [`Deduplicated::orphaned_triangles`] and logged; callers decide whether
/// the mesh is still usable.
pub struct Deduplicate {
    mode: DedupMode,
}

impl Deduplicate {
    /// Creates a new `Deduplicate` operation.
    #[must_use]
    pub fn new(mode: DedupMode) -> Self {
        Self { mode }
    }

    /// Executes the operation on `mesh`.
    #[must_use]
    pub fn execute(&self, mesh: &TriangleMesh) -> Deduplicated {
        match self.mode {
            DedupMode::Exact => Self::exact(mesh),
            DedupMode::Threshold(threshold) => {
                warn!(
                    threshold,
                    "distance-threshold deduplication is unreliable and may drop distinct vertices"
                );
                Self::threshold(mesh, threshold)
            }
        }
    }

    fn exact(mesh: &TriangleMesh) -> Deduplicated {
        let mut reduced = TriangleMesh::new();
        let mut lookup: HashMap<[u64; 3], u32> = HashMap::new();

        for point in &mesh.vertices {
            match position_key(point) {
                Some(key) => {
                    if !lookup.contains_key(&key) {
                        let index = reduced.append_vertex(*point);
                        lookup.insert(key, index);
                    }
                }
                // NaN never equals itself: keep the vertex, it can never be matched.
                None => {
                    reduced.append_vertex(*point);
                }
            }
        }

        let find = |point: &Point3| position_key(point).and_then(|key| lookup.get(&key).copied());
        Self::reindex(mesh, reduced, find)
    }

    fn threshold(mesh: &TriangleMesh, threshold: f64) -> Deduplicated {
        let mut reduced = TriangleMesh::new();
        let mut removed: HashMap<[u64; 3], u32> = HashMap::new();

        for point in &mesh.vertices {
            let near = reduced
                .vertices
                .iter()
                .position(|kept| (kept - point).norm() < threshold);
            match near {
                Some(i) => {
                    if let Some(key) = position_key(point) {
                        removed.insert(key, u32::try_from(i).unwrap_or(0));
                    }
                }
                None => {
                    reduced.append_vertex(*point);
                }
            }
        }

        let kept = reduced.vertices.clone();
        let find = |point: &Point3| {
            position_key(point)
                .and_then(|key| removed.get(&key).copied())
                .or_else(|| {
                    kept.iter()
                        .position(|v| v == point)
                        .and_then(|i| u32::try_from(i).ok())
                })
        };
        Self::reindex(mesh, reduced, find)
    }

    fn reindex<F>(mesh: &TriangleMesh, mut reduced: TriangleMesh, find: F) -> Deduplicated
    where
        F: Fn(&Point3) -> Option<u32>,
    {
        let mut orphaned_triangles = Vec::new();

        for (t, tri) in mesh.indices.iter().enumerate() {
            let mut orphaned = false;
            let mut out = [0u32; 3];
            for (slot, &index) in out.iter_mut().zip(tri) {
                match mesh.vertices.get(index as usize).and_then(&find) {
                    Some(i) => *slot = i,
                    None => orphaned = true,
                }
            }
            if orphaned {
                orphaned_triangles.push(t);
            }
            reduced.append_triangle(out[0], out[1], out[2]);
        }

        if !orphaned_triangles.is_empty() {
            warn!(
                count = orphaned_triangles.len(),
                "deduplication could not match some triangle corners; they now point at vertex 0"
            );
        }

        Deduplicated {
            mesh: reduced,
            orphaned_triangles,
        }
    }
}

/// Bit-exact hash key for a position; `-0.0` and `0.0` share a key, NaN has none.
fn position_key(point: &Point3) -> Option<[u64; 3]> {
    if point.iter().any(|c| c.is_nan()) {
        return None;
    }
    let bits = |c: f64| if c == 0.0 { 0.0f64.to_bits() } else { c.to_bits() };
    Some([bits(point.x), bits(point.y), bits(point.z)])
}

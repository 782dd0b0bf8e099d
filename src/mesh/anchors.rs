use super::TriangleMesh;

/// Fraction of the mesh's vertical extent used as the anchor band height.
const BAND_FRACTION: f64 = 10.0;

/// Selects the vertices to pin when a deformable mesh is locked in place.
///
/// The band is `(top - bottom) / 10` tall and measured from the bottom of
/// the mesh when it is pointed up, from the top otherwise. Heights are
/// compared on the Y axis and both band edges are inclusive.
pub struct AnchorVertices {
    pointed_up: bool,
}

impl AnchorVertices {
    /// Creates a new `AnchorVertices` query.
    #[must_use]
    pub fn new(pointed_up: bool) -> Self {
        Self { pointed_up }
    }

    /// Returns the indices of anchor vertices in ascending order.
    ///
    /// An empty mesh has no anchors.
    #[must_use]
    pub fn execute(&self, mesh: &TriangleMesh) -> Vec<usize> {
        let Some(first) = mesh.vertices.first() else {
            return Vec::new();
        };

        let (bottom, top) = mesh
            .vertices
            .iter()
            .fold((first.y, first.y), |(lo, hi), v| (lo.min(v.y), hi.max(v.y)));

        let spread = (top - bottom) / BAND_FRACTION;
        let (low, high) = if self.pointed_up {
            (bottom, bottom + spread)
        } else {
            (top - spread, top)
        };

        mesh.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.y >= low && v.y <= high)
            .map(|(i, _)| i)
            .collect()
    }
}

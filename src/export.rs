//! Geometry export boundary.

use crate::math::{Point3, Vector3};
use crate::registry::SolidRegistry;

/// Receives exported geometry.
///
/// Geometry arrives fully computed: a solid or cell never hands over a
/// partially updated triangle.
pub trait Exporter {
    /// Receives one triangle.
    fn triangle(&mut self, triangle: &[Point3; 3]);

    /// Closes the current layer and opens the next one.
    fn add_layer(&mut self);

    /// Receives a hinge joint's position and axis.
    fn hinge(&mut self, _position: &Point3, _axis: &Vector3) {}
}

/// In-memory exporter collecting triangles per layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredTriangles {
    /// Triangles per layer. The last layer is the open one.
    pub layers: Vec<Vec<[Point3; 3]>>,
    /// Exported hinges as `(position, axis)`.
    pub hinges: Vec<(Point3, Vector3)>,
}

impl Default for LayeredTriangles {
    fn default() -> Self {
        Self {
            layers: vec![Vec::new()],
            hinges: Vec::new(),
        }
    }
}

impl LayeredTriangles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of triangles across all layers.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }
}

impl Exporter for LayeredTriangles {
    fn triangle(&mut self, triangle: &[Point3; 3]) {
        if let Some(layer) = self.layers.last_mut() {
            layer.push(*triangle);
        }
    }

    fn add_layer(&mut self) {
        self.layers.push(Vec::new());
    }

    fn hinge(&mut self, position: &Point3, axis: &Vector3) {
        self.hinges.push((*position, *axis));
    }
}

/// Exports every solid in registry order, closing a layer after each.
pub fn export_scene(registry: &SolidRegistry, exporter: &mut dyn Exporter) {
    for (_, solid) in registry.iter() {
        solid.save(exporter);
        exporter.add_layer();
    }
}

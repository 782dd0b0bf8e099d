/// Linear RGBA color handed to draw and debug-draw collaborators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Translucent blue used for deformable spheres.
    pub const SPHERE: Self = Self::new(0.0, 0.4549, 0.6275, 0.45);
    /// Translucent white used for deformable mesh bodies.
    pub const CONTAINER: Self = Self::new(1.0, 1.0, 1.0, 0.45);
    /// Light grey used for link-mesh cells.
    pub const CELL: Self = Self::new(0.9, 0.9, 0.9, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Debug color for constraints.
    pub const CONSTRAINT: Self = Self::new(1.0, 1.0, 0.0, 0.9);

    /// Creates a color from its components.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

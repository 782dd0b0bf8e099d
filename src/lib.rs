pub mod color;
pub mod engine;
pub mod error;
pub mod export;
pub mod factory;
pub mod link_mesh;
pub mod math;
pub mod mesh;
pub mod registry;
pub mod scene;
pub mod solid;
pub mod visual;

pub use error::{Result, SolidForgeError};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::SoftMaterial;
use crate::error::{ConfigError, Result};
use crate::math::{Point3, Vector3};

/// Process-wide settings read by every creation call.
///
/// Coefficients are passed to the engine as given; keeping them in range
/// is the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Gravity along Y, applied to the world and every solid.
    pub gravity: f64,
    /// Time passed to the world each tick.
    pub time_step: f64,
    /// Maximum internal steps per tick.
    pub max_substeps: usize,
    /// Coefficients for deformable mesh bodies.
    pub mesh_material: SoftMaterial,
    /// Coefficients for deformable spheres.
    pub sphere_material: SoftMaterial,
    /// Total mass of each deformable sphere.
    pub sphere_total_mass: f64,
    /// Per-node mass of deformable mesh bodies before anchoring.
    pub mesh_node_mass: f64,
    /// Node count requested for single and linked deformable spheres.
    pub soft_sphere_resolution: usize,
    /// Node count requested for deformable spheres in a matrix.
    pub soft_matrix_resolution: usize,
    /// Collision clusters generated for deformable spheres.
    pub sphere_clusters: usize,
    /// Mesh orientation. Anchors come from the bottom of a mesh and
    /// matrices grow downward when set.
    pub pointed_up: bool,
    /// Forward engine debug lines in [`StructureFactory::draw`](super::StructureFactory::draw).
    pub debug_draw: bool,
    pub container: ContainerConfig,
    pub interaction: InteractionSettings,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            gravity: -9.8,
            time_step: 1.0,
            max_substeps: 10,
            mesh_material: SoftMaterial {
                linear_stiffness: 0.1,
                volume_stiffness: 1.0,
                dynamic_friction: 1.0,
                damping: 1.0,
                drag: 1.0,
                pressure: 0.0,
                pose_matching: 0.75,
            },
            sphere_material: SoftMaterial {
                linear_stiffness: 0.1,
                volume_stiffness: 0.1,
                dynamic_friction: 1.0,
                damping: 0.001,
                drag: 0.0,
                pressure: 2500.0,
                pose_matching: 0.0,
            },
            sphere_total_mass: 1000.0,
            mesh_node_mass: 1.0,
            soft_sphere_resolution: 100,
            soft_matrix_resolution: 50,
            sphere_clusters: 20,
            pointed_up: false,
            debug_draw: false,
            container: ContainerConfig::default(),
            interaction: InteractionSettings::default(),
        }
    }
}

impl FactoryConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration JSON.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text).map_err(ConfigError::from)?)
    }

    /// Loads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::from)?;
        Self::from_json_str(&text)
    }

    /// Serializes the configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self).map_err(ConfigError::from)?)
    }
}

/// The immovable vessel built by
/// [`StructureFactory::create_sphere_container`](super::StructureFactory::create_sphere_container).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// OBJ asset holding the vessel mesh.
    pub asset: PathBuf,
    pub scale: f64,
    pub position: Point3,
    /// Rotation about X, in radians.
    pub rotation_x: f64,
    /// Collision margin of the triangle-mesh shape.
    pub margin: f64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            asset: PathBuf::from("assets/container.obj"),
            scale: 10.0,
            position: Point3::new(0.0, 5.0, 0.0),
            rotation_x: -std::f64::consts::FRAC_PI_2,
            margin: 0.05,
        }
    }
}

impl ContainerConfig {
    #[must_use]
    pub fn scale_vector(&self) -> Vector3 {
        Vector3::repeat(self.scale)
    }
}

/// Global switches for interactive selection of deformable solids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    /// Deformable solids can be selected.
    pub allow_selection: bool,
    /// Selecting a deformable solid opens the force panel.
    pub allow_forces: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FactoryConfig::default();
        assert_eq!(config.gravity, -9.8);
        assert_eq!(config.mesh_material.pose_matching, 0.75);
        assert_eq!(config.sphere_material.pressure, 2500.0);
        assert!(!config.interaction.allow_selection);
        assert!(!config.interaction.allow_forces);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = FactoryConfig::from_json_str(
            r#"{ "gravity": 1.1, "interaction": { "allow_selection": true } }"#,
        )
        .unwrap();
        assert_eq!(config.gravity, 1.1);
        assert!(config.interaction.allow_selection);
        assert!(!config.interaction.allow_forces);
        assert_eq!(config.sphere_total_mass, 1000.0);
    }

    #[test]
    fn json_round_trip() {
        let mut config = FactoryConfig::default();
        config.pointed_up = true;
        config.mesh_material.drag = 0.5;
        let text = config.to_json_string().unwrap();
        assert_eq!(FactoryConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn bad_json_is_a_config_error() {
        let err = FactoryConfig::from_json_str("{ gravity: }").unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        assert!(FactoryConfig::load("/nonexistent/solidforge.json").is_err());
    }
}

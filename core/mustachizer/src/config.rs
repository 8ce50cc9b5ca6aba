//! YAML configuration for the mustachizer front ends.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::decal::{builtin_specs, DecalCatalog, DecalSpec};
use crate::error::MustacheError;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the mustache images.
    pub assets_dir: PathBuf,

    /// Path to the SeetaFace frontal detection model.
    pub detector_model: PathBuf,

    /// JPEG output quality (1-100).
    pub jpeg_quality: u8,

    /// Delay used for animation frames that do not specify one, in ms.
    pub default_frame_delay_ms: u32,

    /// Draw face boxes and decal outlines over the output.
    pub debug: bool,

    /// Replaces the bundled mustache table when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decals: Option<Vec<DecalSpec>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets/mustaches"),
            detector_model: PathBuf::from("model/seeta_fd_frontal_v1.0.bin"),
            jpeg_quality: 90,
            default_frame_delay_ms: 100,
            debug: false,
            decals: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MustacheError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text. Missing keys take their defaults.
    pub fn from_yaml(content: &str) -> Result<Self, MustacheError> {
        serde_yaml::from_str(content)
            .map_err(|e| MustacheError::Config(format!("failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), MustacheError> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| MustacheError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Mustache calibration table in effect.
    pub fn decal_specs(&self) -> Vec<DecalSpec> {
        self.decals.clone().unwrap_or_else(builtin_specs)
    }

    /// Load the mustache catalog described by this configuration.
    pub fn load_catalog(&self) -> Result<DecalCatalog, MustacheError> {
        DecalCatalog::load(&self.assets_dir, &self.decal_specs())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), MustacheError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(MustacheError::Config(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if self.default_frame_delay_ms == 0 {
            return Err(MustacheError::Config(
                "Default frame delay must be greater than 0".to_string(),
            ));
        }

        if let Some(decals) = &self.decals {
            if decals.is_empty() {
                return Err(MustacheError::Config(
                    "Mustache table must not be empty".to_string(),
                ));
            }
            let mut names = HashSet::new();
            for spec in decals {
                if !names.insert(spec.name.to_uppercase()) {
                    return Err(MustacheError::Config(format!(
                        "Duplicate mustache name: {}",
                        spec.name
                    )));
                }
                if !(spec.width > 0.0) {
                    return Err(MustacheError::Config(format!(
                        "Mustache {} width must be positive",
                        spec.name
                    )));
                }
                if !(spec.max_size >= 1.0) {
                    return Err(MustacheError::Config(format!(
                        "Mustache {} max_size must be at least 1.0",
                        spec.name
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Mustachizer configuration

# Mustache images
assets_dir: "assets/mustaches"

# SeetaFace frontal face detection model
detector_model: "model/seeta_fd_frontal_v1.0.bin"

# Output
jpeg_quality: 90
default_frame_delay_ms: 100

# Draw face boxes and mustache outlines
debug: false

# Uncomment to replace the bundled mustache table
# decals:
#   - name: "BAMBINO"
#     file: "Bambino.png"
#     width: 0.6
#     anchor: [0.0, -70.0, -50.0]
#     max_size: 2.0
"#;

//! Engine configuration.
//!
//! The configuration is a JSON document. Every field has a default, so a partial
//! file (or no file at all) is valid:
//!
//! ```json
//! {
//!   "viewport": { "width": 1280, "height": 720 },
//!   "render": { "path": "forward", "category": "environment_map" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::mode::{BufferView, RenderCategory, RenderPath};

/// Size of the visible framebuffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Initial render mode selection and pass parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub path: RenderPath,
    pub category: RenderCategory,
    pub buffer_view: BufferView,
    /// Parallax scale used by relief-mapped entities.
    pub relief_strength: f32,
    /// Contrast applied to the depth view in the composition pass.
    pub depth_intensity: f32,
    /// Number of color attachments in the offscreen target.
    pub gbuffer_attachments: u32,
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            path: RenderPath::default(),
            category: RenderCategory::default(),
            buffer_view: BufferView::default(),
            relief_strength: 0.05,
            depth_intensity: 1.0,
            gbuffer_attachments: 4,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Where assets are read from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding the `.glsl` programs.
    pub shader_dir: PathBuf,
    /// Optional glTF model placed in the demo scene.
    pub model: Option<PathBuf>,
    /// Optional directory with the six skybox faces.
    pub skybox_dir: Option<PathBuf>,
    /// Optional height map assigned to relief-mapped materials.
    pub height_map: Option<PathBuf>,
}

/// Limits reported by the headless device.
///
/// A GL device reports its own limits and ignores these.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceLimitsConfig {
    pub max_color_attachments: u32,
    pub max_uniform_block_size: u32,
    pub uniform_buffer_offset_alignment: u32,
}

impl Default for DeviceLimitsConfig {
    fn default() -> Self {
        Self {
            max_color_attachments: 8,
            max_uniform_block_size: 16 * 1024,
            uniform_buffer_offset_alignment: 256,
        }
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub viewport: ViewportConfig,
    pub render: RenderConfig,
    pub assets: AssetConfig,
    pub limits: DeviceLimitsConfig,
    /// Number of frames the headless driver renders before exiting.
    pub frames: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            viewport: ViewportConfig::default(),
            render: RenderConfig::default(),
            assets: AssetConfig {
                shader_dir: PathBuf::from("assets/shaders"),
                ..AssetConfig::default()
            },
            limits: DeviceLimitsConfig::default(),
            frames: 120,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON string and validate it.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or holds
    /// values the renderer cannot use.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading engine config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Load a configuration file, falling back to defaults when it does not exist.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Check values that would otherwise fail deep inside the renderer.
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::Config(format!(
                "viewport must be non-zero, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        if self.render.gbuffer_attachments == 0 {
            return Err(Error::Config(
                "gbuffer_attachments must be at least 1".to_string(),
            ));
        }
        if !self.limits.uniform_buffer_offset_alignment.is_power_of_two() {
            return Err(Error::Config(format!(
                "uniform_buffer_offset_alignment must be a power of two, got {}",
                self.limits.uniform_buffer_offset_alignment
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.render.gbuffer_attachments, 4);
        assert_eq!(config.limits.uniform_buffer_offset_alignment, 256);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = EngineConfig::from_json(
            r#"{ "render": { "path": "forward", "category": "environment_map" } }"#,
        )
        .unwrap();

        assert_eq!(config.render.path, RenderPath::Forward);
        assert_eq!(config.render.category, RenderCategory::EnvironmentMap);
        assert_eq!(config.viewport, ViewportConfig::default());
        assert_eq!(config.render.relief_strength, 0.05);
    }

    #[test]
    fn test_zero_viewport_rejected() {
        let result = EngineConfig::from_json(r#"{ "viewport": { "width": 0 } }"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_alignment_rejected() {
        let result = EngineConfig::from_json(
            r#"{ "limits": { "uniform_buffer_offset_alignment": 100 } }"#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = EngineConfig::from_json("{ not json");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_or_default(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "frames": 3, "viewport": {{ "width": 640, "height": 480 }} }}"#)
            .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.frames, 3);
        assert_eq!(config.viewport.width, 640);
        assert_eq!(config.viewport.height, 480);
    }
}

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::render::Viewport;

fn default_zoom_step() -> f32 {
    1.1
}

fn default_zoom_min() -> f32 {
    0.1
}

fn default_zoom_max() -> f32 {
    10.0
}

fn default_viewport_width() -> u32 {
    1400
}

fn default_viewport_height() -> u32 {
    800
}

/// Startup configuration, passed explicitly into [`crate::viewer::Viewer`].
///
/// Zoom requests that would leave `[zoom_min, zoom_max]` are rejected as
/// no-ops rather than clamped to the bound, mirroring how out-of-range page
/// navigation behaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f32,
    #[serde(default = "default_zoom_min")]
    pub zoom_min: f32,
    #[serde(default = "default_zoom_max")]
    pub zoom_max: f32,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            zoom_step: default_zoom_step(),
            zoom_min: default_zoom_min(),
            zoom_max: default_zoom_max(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    pub fn initial_viewport(&self) -> Viewport {
        Viewport::new(self.viewport_width, self.viewport_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_match_the_viewer_contract() {
        let config = ViewerConfig::default();
        assert_eq!(config.zoom_step, 1.1);
        assert_eq!(config.zoom_min, 0.1);
        assert_eq!(config.zoom_max, 10.0);
        assert_eq!(config.initial_viewport(), Viewport::new(1400, 800));
    }

    #[test]
    fn partial_config_files_fill_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"zoom_step": 1.25}}"#).unwrap();

        let config = ViewerConfig::load(file.path()).unwrap();
        assert_eq!(config.zoom_step, 1.25);
        assert_eq!(config.zoom_max, 10.0);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(ViewerConfig::load(Path::new("/nonexistent/pdfdeck.json")).is_err());
    }
}

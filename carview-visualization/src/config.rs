//! Viewer configuration

use crate::camera::{MainCameraConfig, OrbitConfig};
use carview_core::{Error, Result};
use carview_gpu::RenderConfig;
use carview_io::AssetUrls;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Background of the main view
pub const CLEAR_COLOR: u32 = 0x141852;

/// Window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "carview".to_string(),
            width: 1600,
            height: 900,
        }
    }
}

/// Everything a viewer session can be tuned with.
///
/// Every field has a default, so a config file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub urls: AssetUrls,
    /// Initial state of every label-type toggle
    pub labels_visible: bool,
    /// Screen-space size of lidar points in pixels
    pub point_size: f32,
    /// Clear colour as `0xRRGGBB`
    pub clear_color: u32,
    pub camera: MainCameraConfig,
    pub orbit: OrbitConfig,
    pub window: WindowConfig,
    pub render: RenderConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            urls: AssetUrls::default(),
            labels_visible: true,
            point_size: 1.5,
            clear_color: CLEAR_COLOR,
            camera: MainCameraConfig::default(),
            orbit: OrbitConfig::default(),
            window: WindowConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Load a JSON config file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.point_size > 0.0) {
            return Err(Error::InvalidData(format!("point_size must be positive, got {}", self.point_size)));
        }
        if !(self.camera.near > 0.0 && self.camera.far > self.camera.near) {
            return Err(Error::InvalidData(format!(
                "camera clip planes must satisfy 0 < near < far, got {} and {}",
                self.camera.near, self.camera.far
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ViewerConfig::from_json_str(r#"{ "labels_visible": false, "urls": { "image_extension": "jpg" } }"#)
            .unwrap();
        assert!(!config.labels_visible);
        assert_eq!(config.urls.image_extension, "jpg");
        assert_eq!(config.urls.descriptor, "frame.json");
        assert_eq!(config.camera.fov, 55.0);
        assert_eq!(config.clear_color, CLEAR_COLOR);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(ViewerConfig::from_json_str(r#"{ "point_size": 0.0 }"#).is_err());
        assert!(ViewerConfig::from_json_str(r#"{ "camera": { "near": 10.0, "far": 5.0 } }"#).is_err());
        assert!(matches!(ViewerConfig::from_json_str("not json"), Err(Error::Json(_))));
    }

    #[test]
    fn test_default_round_trips_through_json() {
        let text = serde_json::to_string(&ViewerConfig::default()).unwrap();
        assert_eq!(ViewerConfig::from_json_str(&text).unwrap(), ViewerConfig::default());
    }
}

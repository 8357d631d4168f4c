// SPDX-License-Identifier: MPL-2.0

//! Viewer configuration.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! clear_color = [0.1, 0.1, 0.1]
//! model = "assets/backpack/backpack.obj"
//! gamma_correction = true
//!
//! [window]
//! title = "Backpack"
//! width = 1280
//! height = 720
//!
//! [camera]
//! position = [0.0, 0.0, 3.0]
//! speed = 5.0
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use glam::Vec3;
use serde::Deserialize;
use thiserror::Error;

use crate::camera::{self, Camera};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub clear_color: [f32; 3],
    /// The model to display, if any.
    pub model: Option<PathBuf>,
    /// Whether diffuse textures hold sRGB-encoded colour.
    pub gamma_correction: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            clear_color: [0.1, 0.1, 0.1],
            model: None,
            gamma_correction: false,
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;

        // Model paths are relative to the config file.
        if let (Some(model), Some(parent)) = (config.model.as_mut(), path.parent()) {
            if model.is_relative() {
                *model = parent.join(&*model);
            }
        }

        Ok(config)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Genix".into(),
            width: 1920,
            height: 1080,
        }
    }
}

/// The initial state of the camera. Angles are in degrees.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub yaw: f32,
    pub pitch: f32,
    pub speed: f32,
    pub sensitivity: f32,
    pub zoom: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 3.0],
            yaw: camera::YAW,
            pitch: camera::PITCH,
            speed: camera::SPEED,
            sensitivity: camera::SENSITIVITY,
            zoom: camera::ZOOM,
        }
    }
}

impl CameraConfig {
    pub fn build(&self) -> Camera {
        let pitch = self.pitch.clamp(-camera::PITCH_LIMIT, camera::PITCH_LIMIT);
        let mut camera = Camera::new(Vec3::from(self.position), Vec3::Y, self.yaw, pitch);
        camera.movement_speed = self.speed;
        camera.mouse_sensitivity = self.sensitivity;
        camera.set_zoom(self.zoom);

        camera
    }
}

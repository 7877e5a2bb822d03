//! Demo configuration (window, rendering, camera, assets). Loaded from config.ron at startup.

use renderer::{CompositionMode, RenderSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Demo settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Window width in logical pixels.
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    /// Window height in logical pixels.
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_true")]
    pub vsync: bool,
    /// Fraction of the orbit distance covered per scroll notch.
    #[serde(default = "default_zoom_speed_multiplier")]
    pub zoom_speed_multiplier: f32,
    /// Orbit radians per pixel of mouse drag.
    #[serde(default = "default_orbit_sensitivity")]
    pub orbit_sensitivity: f32,
    #[serde(default)]
    pub composition: CompositionMode,
    /// Show the depth attachment in `DebugBlit` mode. Experimental.
    #[serde(default)]
    pub debug_depth_blit: bool,
    #[serde(default)]
    pub reallocate_gbuffer_on_resize: bool,
    #[serde(default = "default_helicopter_model")]
    pub helicopter_model: PathBuf,
    #[serde(default = "default_ground_model")]
    pub ground_model: PathBuf,
    #[serde(default = "default_screenshot_path")]
    pub screenshot_path: PathBuf,
}

fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    720
}
fn default_true() -> bool {
    true
}
fn default_zoom_speed_multiplier() -> f32 {
    0.05
}
fn default_orbit_sensitivity() -> f32 {
    0.01
}
fn default_helicopter_model() -> PathBuf {
    PathBuf::from("assets/heli_low_poly/helicopter.obj")
}
fn default_ground_model() -> PathBuf {
    PathBuf::from("assets/ground/ground.obj")
}
fn default_screenshot_path() -> PathBuf {
    PathBuf::from("screenshot.png")
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            vsync: default_true(),
            zoom_speed_multiplier: default_zoom_speed_multiplier(),
            orbit_sensitivity: default_orbit_sensitivity(),
            composition: CompositionMode::default(),
            debug_depth_blit: false,
            reallocate_gbuffer_on_resize: false,
            helicopter_model: default_helicopter_model(),
            ground_model: default_ground_model(),
            screenshot_path: default_screenshot_path(),
        }
    }
}

impl GameConfig {
    /// Load config from `config.ron`. If the file is missing or invalid, returns default config.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => Self::parse(&data).unwrap_or_else(|e| {
                log::warn!("Invalid config at {:?}: {}, using defaults", path, e);
                Self::default()
            }),
            Err(_) => {
                log::info!("No config at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    pub fn parse(data: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(data)
    }

    /// Renderer options derived from this config.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            composition: self.composition,
            debug_depth_blit: self.debug_depth_blit,
            vsync: self.vsync,
            reallocate_gbuffer_on_resize: self.reallocate_gbuffer_on_resize,
        }
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join("config.ron")
}

// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every section falls back to defaults, so a missing or partial file is fine.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::backend::swapchain::SwapchainConfig;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub shaders: ShaderConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Swapchain Renderer".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Presentation policy. The swapchain is created with exactly this mode.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PresentMode {
    /// Queue images behind vertical sync (FIFO). Always supported.
    #[default]
    #[serde(alias = "fifo")]
    Vsync,
    /// Present as soon as possible; may tear.
    Immediate,
}

impl PresentMode {
    pub fn to_vk(self) -> vk::PresentModeKHR {
        match self {
            PresentMode::Vsync => vk::PresentModeKHR::FIFO,
            PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: PresentMode,
    pub clear_color: [f32; 4],
    pub max_frames_in_flight: usize,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: PresentMode::Vsync,
            clear_color: [0.0, 0.0, 0.0, 0.0],
            max_frames_in_flight: 2,
        }
    }
}

/// Precompiled SPIR-V for the fixed pipeline, relative to the working directory
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/triangle.vert.spv"),
            fragment: PathBuf::from("shaders/triangle.frag.spv"),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_to_file: bool,
    pub log_file: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_to_file: false,
            log_file: "vulkan_debug.log".to_string(),
            show_fps: true,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Size of the fence ring; never zero.
    pub fn frames_in_flight(&self) -> usize {
        self.graphics.max_frames_in_flight.max(1)
    }

    pub fn swapchain(&self) -> SwapchainConfig {
        SwapchainConfig {
            present_mode: self.graphics.present_mode,
        }
    }

    /// Validation is only ever enabled in debug builds.
    pub fn validation_enabled(&self) -> bool {
        cfg!(debug_assertions) && self.debug.validation_layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.graphics.present_mode, PresentMode::Vsync);
        assert_eq!(config.graphics.max_frames_in_flight, 2);
        assert_eq!(config.shaders.vertex, PathBuf::from("shaders/triangle.vert.spv"));
        assert_eq!(config.window.width, 1280);
    }

    #[test]
    fn present_mode_accepts_names_and_alias() {
        let immediate: Config = toml::from_str("[graphics]\npresent_mode = \"immediate\"").unwrap();
        assert_eq!(immediate.graphics.present_mode, PresentMode::Immediate);
        assert_eq!(immediate.swapchain().present_mode.to_vk(), vk::PresentModeKHR::IMMEDIATE);

        let fifo: Config = toml::from_str("[graphics]\npresent_mode = \"fifo\"").unwrap();
        assert_eq!(fifo.graphics.present_mode, PresentMode::Vsync);
        assert_eq!(fifo.graphics.present_mode.to_vk(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn unknown_present_mode_is_rejected() {
        let parsed: Result<Config, _> = toml::from_str("[graphics]\npresent_mode = \"mailbox\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            "[graphics]\nclear_color = [0.1, 0.2, 0.3, 1.0]\n[shaders]\nvertex = \"a.spv\"",
        )
        .unwrap();
        assert_eq!(config.graphics.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(config.graphics.present_mode, PresentMode::Vsync);
        assert_eq!(config.shaders.vertex, PathBuf::from("a.spv"));
        assert_eq!(config.shaders.fragment, PathBuf::from("shaders/triangle.frag.spv"));
    }

    #[test]
    fn frames_in_flight_never_zero() {
        let config: Config = toml::from_str("[graphics]\nmax_frames_in_flight = 0").unwrap();
        assert_eq!(config.frames_in_flight(), 1);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("swapchain-renderer-missing-config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.window.title, "Swapchain Renderer");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = std::env::temp_dir().join("swapchain-renderer-malformed-config.toml");
        std::fs::write(&path, "[graphics\nclear_color = ").unwrap();
        let result = Config::load_from_path(&path);
        let _ = std::fs::remove_file(&path);
        assert!(result.is_err());
    }
}

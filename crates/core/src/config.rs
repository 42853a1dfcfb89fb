//! Configuration loading.
//!
//! The configuration is a TOML document with three optional tables:
//!
//! ```toml
//! [window]
//! title = "Presenter"
//! width = 1280
//! height = 720
//!
//! [presentation]
//! frames_in_flight = 2
//! present_mode = "low_latency"   # or "vsync"
//! rebuild_on_degraded = true
//! clear_color = [0.1, 0.1, 0.15, 1.0]
//!
//! [debug]
//! validation = true
//! log_filter = "info,presenter=debug"
//! ```
//!
//! Every field has a default, so a missing file or an empty document yields
//! [`Config::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Largest supported number of frames in flight.
pub const MAX_FRAMES_IN_FLIGHT: usize = 4;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "PRESENTER_CONFIG";

/// File looked up in the working directory when [`CONFIG_ENV_VAR`] is unset.
pub const DEFAULT_CONFIG_FILE: &str = "presenter.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Window settings.
    pub window: WindowConfig,
    /// Frame presentation settings.
    pub presentation: PresentationConfig,
    /// Debugging aids.
    pub debug: DebugConfig,
}

/// Initial window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    /// Window title (the frame-rate suffix is appended at runtime).
    pub title: String,
    /// Initial inner width in physical pixels.
    pub width: u32,
    /// Initial inner height in physical pixels.
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Presenter".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Preferred presentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentMode {
    /// Non-blocking low-latency mode (mailbox) when available, FIFO otherwise.
    #[default]
    LowLatency,
    /// Always FIFO (vsync).
    Vsync,
}

impl PresentMode {
    /// Returns true if the low-latency mode should be tried first.
    #[inline]
    pub fn prefers_low_latency(self) -> bool {
        matches!(self, PresentMode::LowLatency)
    }
}

/// Frame presentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresentationConfig {
    /// Pipelining depth: number of frame slots.
    pub frames_in_flight: usize,
    /// Presentation mode preference.
    pub present_mode: PresentMode,
    /// Rebuild the image chain before the next frame when the surface reports
    /// a degraded (suboptimal) but presentable result.
    pub rebuild_on_degraded: bool,
    /// Clear color used when the scene supplier does not override it.
    pub clear_color: [f32; 4],
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            present_mode: PresentMode::default(),
            rebuild_on_degraded: true,
            clear_color: [0.1, 0.1, 0.15, 1.0],
        }
    }
}

/// Debugging aids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebugConfig {
    /// Enable the Khronos validation layer when it is installed.
    pub validation: bool,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            log_filter: None,
        }
    }
}

impl Config {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document does not parse or fails
    /// [`validate`](Self::validate).
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if it is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads the configuration named by [`CONFIG_ENV_VAR`], falling back to
    /// [`DEFAULT_CONFIG_FILE`] if it exists, and to defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if a file was selected but could not be loaded.
    pub fn load_from_env() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }

        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.exists() {
            return Self::load(fallback);
        }

        debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let frames = self.presentation.frames_in_flight;
        if frames == 0 || frames > MAX_FRAMES_IN_FLIGHT {
            return Err(Error::Config(format!(
                "presentation.frames_in_flight must be in 1..={}, got {}",
                MAX_FRAMES_IN_FLIGHT, frames
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        Ok(())
    }
}

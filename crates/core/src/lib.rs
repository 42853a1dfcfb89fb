//! Core utilities for the presenter.
//!
//! This crate provides foundational types and utilities used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer and frame-rate utilities
//! - Configuration management

pub mod config;
mod error;
mod logging;
mod timer;

pub use config::{Config, PresentMode};
pub use error::{Error, Result};
pub use logging::{DEFAULT_LOG_FILTER, init_logging};
pub use timer::{FrameRate, FrameRateCounter, Timer};

//! Error types shared by the presenter crates.

use thiserror::Error;

/// Main error type for the host-facing layers (window, config, logging).
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors raised outside the RHI (e.g. surface creation)
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (parse failures and invalid values)
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using the presenter's Error type.
pub type Result<T> = std::result::Result<T, Error>;

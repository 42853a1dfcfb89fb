//! RHI error types.

use ash::vk;
use thiserror::Error;

/// Error raised by the Vulkan abstraction layer.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// No GPU can render and present to the surface
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// The surface offers no usable format or present mode
    #[error("Surface unsupported: {0}")]
    SurfaceUnsupported(String),

    /// The surface currently has zero area; retry once it is restored
    #[error("Surface extent is {width}x{height}")]
    DegenerateExtent { width: u32, height: u32 },

    /// Swapchain image or view setup failed
    #[error("Swapchain error: {0}")]
    Swapchain(String),

    /// A queue family the device was created without was requested
    #[error("Missing queue family: {0}")]
    MissingQueueFamily(&'static str),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

//! Thin Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate wraps the parts of `ash` the presenter needs:
//! - Instance, physical device and logical device creation
//! - Swapchain (image chain) construction and its sizing rules
//! - Command pool and command buffer recording
//! - Fences and semaphores

mod error;

pub mod command;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod sizing;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;

//! Frame presentation engine.
//!
//! This crate drives frames from recording to the screen:
//! - Frame slots bounding the number of frames in flight
//! - Command recording for one chain image per frame
//! - Image chain rebuild on resize, minimize and stale surfaces
//!
//! The engine is generic over [`PresentBackend`]; [`VulkanBackend`] is the
//! real implementation.

mod backend;
mod engine;
mod error;
pub mod frame_slots;
pub mod recorder;
mod vulkan;

pub use backend::{
    AcquireOutcome, ChainInfo, DeviceDrained, FrameContent, FrameTarget, PresentBackend,
    PresentOutcome,
};
pub use engine::{
    EngineOptions, EngineState, EngineStats, FrameStatus, PresentationEngine, ResizeSignal,
};
pub use error::{EngineError, EngineResult};
pub use vulkan::{VulkanBackend, VulkanSlot};

/// The engine over Vulkan.
pub type VulkanEngine = PresentationEngine<VulkanBackend>;

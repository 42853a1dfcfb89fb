//! Engine error types.
//!
//! Every variant is fatal. Stale and degraded surfaces are not errors; they
//! are reported through [`AcquireOutcome`](crate::AcquireOutcome) and
//! [`PresentOutcome`](crate::PresentOutcome) and absorbed by the engine.

use presenter_rhi::RhiError;
use thiserror::Error;

/// Fatal engine error, propagated to the host loop.
#[derive(Error, Debug)]
pub enum EngineError {
    /// No viable presentation configuration exists for the surface
    #[error("Surface unsupported: {0}")]
    SurfaceUnsupported(String),

    /// Command buffer begin/end failed, or the target image is unknown
    #[error("Command recording failed: {0}")]
    RecordingFailed(String),

    /// Queue submission failed (queue or device loss)
    #[error("Queue submission failed: {0}")]
    SubmitFailed(String),

    /// Image acquisition failed for a reason other than a stale surface
    #[error("Image acquisition failed: {0}")]
    AcquireFailed(String),

    /// Presentation failed for a reason other than a stale surface
    #[error("Presentation failed: {0}")]
    PresentFailed(String),

    /// Waiting for the device to go idle failed
    #[error("Device drain failed: {0}")]
    DrainFailed(String),

    /// Creating, waiting on or resetting a frame slot failed
    #[error("Frame slot failed: {0}")]
    SlotFailed(String),

    /// The engine was already shut down
    #[error("Engine has been shut down")]
    ShutDown,

    /// Window or surface bootstrap failed
    #[error(transparent)]
    Platform(#[from] presenter_core::Error),

    /// Vulkan bootstrap failed
    #[error(transparent)]
    Rhi(#[from] RhiError),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

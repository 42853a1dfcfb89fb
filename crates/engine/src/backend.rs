//! The seam between the presentation engine and the GPU.
//!
//! [`PresentBackend`] is everything the state machine needs from a device,
//! a surface and its image chain. The engine owns the ordering; a backend
//! only carries out single steps. [`VulkanBackend`](crate::VulkanBackend)
//! implements it over `presenter_rhi`.

use ash::vk;

use crate::error::EngineResult;

/// Proof that the device was drained.
///
/// Only the engine mints this, right after a successful
/// [`PresentBackend::drain`]. Backend calls that free GPU resources take a
/// reference to it.
#[derive(Debug)]
pub struct DeviceDrained {
    _private: (),
}

impl DeviceDrained {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Result of asking the image chain for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image `index` is ready to be rendered into.
    Acquired(u32),
    /// Image `index` is usable, but the chain no longer matches the surface.
    Degraded(u32),
    /// The chain is out of date; nothing was acquired.
    Stale,
}

/// Result of queueing an image for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The image was queued.
    Presented,
    /// The image was queued, but the chain no longer matches the surface.
    Degraded,
    /// The chain is out of date; the image was not shown.
    Stale,
}

/// Properties of a built image chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    /// Image format shared by every image.
    pub format: vk::Format,
    /// Color space of the images.
    pub color_space: vk::ColorSpaceKHR,
    /// Present mode in use.
    pub present_mode: vk::PresentModeKHR,
    /// Extent shared by every image.
    pub extent: vk::Extent2D,
    /// Number of images (M).
    pub image_count: u32,
    /// Increases by one with every build.
    pub generation: u64,
}

/// The image and slot a frame is recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTarget {
    /// Chain index returned by acquisition.
    pub image_index: u32,
    /// Frame slot the commands are recorded into.
    pub slot: usize,
    /// Chain extent; viewport and scissor cover it.
    pub extent: vk::Extent2D,
    /// Chain image format.
    pub format: vk::Format,
}

/// Supplier of per-frame draw commands and overlay draw data.
///
/// `C` is the backend's command sink; for Vulkan it is the slot's
/// [`CommandBuffer`](presenter_rhi::command::CommandBuffer).
pub trait FrameContent<C: ?Sized> {
    /// Color the target is cleared to before drawing.
    fn clear_color(&self) -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }

    /// Records the scene into `commands` inside the rendering scope.
    fn draw(&mut self, commands: &C, target: &FrameTarget);

    /// Records overlay draws after the scene.
    fn draw_overlay(&mut self, _commands: &C, _target: &FrameTarget) {}
}

/// GPU operations the presentation engine drives.
///
/// Calls arrive from one thread in the order the state machine dictates:
/// `wait_for_slot` before `acquire_image`, `reset_slot` only after a
/// successful acquire, `record`, `submit`, then `present`.
pub trait PresentBackend {
    /// Per-slot resources: a recording buffer, two binary signals, one gate.
    type Slot;
    /// Command sink handed to [`FrameContent`].
    type Commands: ?Sized;

    /// Current drawable size of the window in pixels.
    fn drawable_extent(&self) -> vk::Extent2D;

    /// Builds a new image chain. Any previous chain has been destroyed.
    ///
    /// Returns `None` when the surface reports a zero-area extent; the
    /// engine retries on a later frame.
    fn build_chain(&mut self) -> EngineResult<Option<ChainInfo>>;

    /// Destroys the current chain's views and the chain itself.
    fn destroy_chain(&mut self, drained: &DeviceDrained);

    /// Creates slot `index` with its gate already signaled.
    fn create_slot(&mut self, index: usize) -> EngineResult<Self::Slot>;

    /// Restores a slot's binary signals to a known state after a rebuild.
    fn refresh_slot(&mut self, _slot: &mut Self::Slot, _drained: &DeviceDrained) -> EngineResult<()> {
        Ok(())
    }

    /// Frees a slot's resources.
    fn destroy_slot(&mut self, slot: Self::Slot, drained: &DeviceDrained);

    /// Blocks until the slot's gate is signaled. No timeout.
    fn wait_for_slot(&mut self, slot: &Self::Slot) -> EngineResult<()>;

    /// Clears the slot's gate and resets its recording buffer.
    fn reset_slot(&mut self, slot: &mut Self::Slot) -> EngineResult<()>;

    /// Acquires the next image, signaling the slot's "image acquired" signal.
    fn acquire_image(&mut self, slot: &Self::Slot) -> EngineResult<AcquireOutcome>;

    /// Records the frame's commands into the slot's buffer.
    fn record(
        &mut self,
        slot: &mut Self::Slot,
        target: &FrameTarget,
        content: &mut dyn FrameContent<Self::Commands>,
    ) -> EngineResult<()>;

    /// Submits the slot's buffer: waits on "image acquired", signals
    /// "render complete" and the slot's gate.
    fn submit(&mut self, slot: &Self::Slot) -> EngineResult<()>;

    /// Presents `image_index` after "render complete".
    fn present(&mut self, slot: &Self::Slot, image_index: u32) -> EngineResult<PresentOutcome>;

    /// Blocks until the device has finished all submitted work.
    fn drain(&mut self) -> EngineResult<()>;
}

//! [`PresentBackend`] implementation over `presenter_rhi`.

use std::sync::Arc;

use ash::vk;
use presenter_core::Config;
use presenter_platform::{Surface, Window};
use presenter_rhi::RhiError;
use presenter_rhi::command::{CommandBuffer, CommandPool};
use presenter_rhi::device::Device;
use presenter_rhi::instance::Instance;
use presenter_rhi::physical_device::select_physical_device;
use presenter_rhi::swapchain::Swapchain;
use presenter_rhi::sync::{Fence, Semaphore};
use tracing::{debug, info};
use winit::window::Window as WinitWindow;

use crate::backend::{
    AcquireOutcome, ChainInfo, DeviceDrained, FrameContent, FrameTarget, PresentBackend,
    PresentOutcome,
};
use crate::error::{EngineError, EngineResult};
use crate::recorder;

/// Per-slot Vulkan resources.
pub struct VulkanSlot {
    command_buffer: CommandBuffer,
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
}

/// Vulkan device, surface and image chain for one window.
///
/// Field order is drop order: chain, pool, device, surface, instance, and
/// the window last.
pub struct VulkanBackend {
    swapchain: Option<Swapchain>,
    command_pool: CommandPool,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
    window: Arc<WinitWindow>,
    prefer_low_latency: bool,
    generation: u64,
}

impl VulkanBackend {
    /// Bootstraps Vulkan for `window`: instance, surface, GPU, device and
    /// the graphics command pool.
    pub fn new(window: &Window, config: &Config) -> EngineResult<Self> {
        let extensions = window.required_extensions()?;
        let instance = Instance::new(c"presenter", config.debug.validation, &extensions)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device)?;

        let graphics_family = device.queue_families().graphics()?;
        let command_pool = CommandPool::new(Arc::clone(&device), graphics_family)?;

        info!(
            "Vulkan backend ready on '{}' ({})",
            physical_device.device_name(),
            physical_device.device_type_name()
        );

        Ok(Self {
            swapchain: None,
            command_pool,
            device,
            surface,
            instance,
            window: window.inner_arc(),
            prefer_low_latency: config.presentation.present_mode.prefers_low_latency(),
            generation: 0,
        })
    }

    fn swapchain(&self) -> EngineResult<&Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| EngineError::AcquireFailed("no image chain".to_string()))
    }
}

impl PresentBackend for VulkanBackend {
    type Slot = VulkanSlot;
    type Commands = CommandBuffer;

    fn drawable_extent(&self) -> vk::Extent2D {
        presenter_platform::drawable_size(&self.window)
    }

    fn build_chain(&mut self) -> EngineResult<Option<ChainInfo>> {
        let result = Swapchain::new(
            &self.instance,
            Arc::clone(&self.device),
            self.surface.handle(),
            self.surface.loader(),
            self.drawable_extent(),
            self.prefer_low_latency,
        );

        let swapchain = match result {
            Ok(swapchain) => swapchain,
            Err(RhiError::DegenerateExtent { width, height }) => {
                debug!("Surface extent is {}x{}, not building a chain", width, height);
                return Ok(None);
            }
            Err(RhiError::SurfaceUnsupported(msg)) => {
                return Err(EngineError::SurfaceUnsupported(msg));
            }
            Err(e) => return Err(EngineError::Rhi(e)),
        };

        self.generation += 1;
        let info = ChainInfo {
            format: swapchain.format(),
            color_space: swapchain.color_space(),
            present_mode: swapchain.present_mode(),
            extent: swapchain.extent(),
            image_count: swapchain.image_count(),
            generation: self.generation,
        };
        self.swapchain = Some(swapchain);
        Ok(Some(info))
    }

    fn destroy_chain(&mut self, _drained: &DeviceDrained) {
        self.swapchain = None;
    }

    fn create_slot(&mut self, index: usize) -> EngineResult<VulkanSlot> {
        let slot_failed = |e: RhiError| EngineError::SlotFailed(format!("slot {}: {}", index, e));

        let slot = VulkanSlot {
            command_buffer: self.command_pool.allocate().map_err(slot_failed)?,
            image_available: Semaphore::new(Arc::clone(&self.device)).map_err(slot_failed)?,
            render_finished: Semaphore::new(Arc::clone(&self.device)).map_err(slot_failed)?,
            in_flight: Fence::new(Arc::clone(&self.device), true).map_err(slot_failed)?,
        };

        debug!("Created frame slot {}", index);
        Ok(slot)
    }

    fn refresh_slot(&mut self, slot: &mut VulkanSlot, _drained: &DeviceDrained) -> EngineResult<()> {
        let slot_failed = |e: RhiError| EngineError::SlotFailed(format!("refresh: {}", e));
        slot.image_available = Semaphore::new(Arc::clone(&self.device)).map_err(slot_failed)?;
        slot.render_finished = Semaphore::new(Arc::clone(&self.device)).map_err(slot_failed)?;
        Ok(())
    }

    fn destroy_slot(&mut self, slot: VulkanSlot, _drained: &DeviceDrained) {
        drop(slot);
    }

    fn wait_for_slot(&mut self, slot: &VulkanSlot) -> EngineResult<()> {
        slot.in_flight
            .wait(u64::MAX)
            .map_err(|e| EngineError::SlotFailed(format!("wait: {}", e)))
    }

    fn reset_slot(&mut self, slot: &mut VulkanSlot) -> EngineResult<()> {
        slot.in_flight
            .reset()
            .map_err(|e| EngineError::SlotFailed(format!("fence reset: {}", e)))?;
        slot.command_buffer
            .reset()
            .map_err(|e| EngineError::RecordingFailed(format!("reset: {}", e)))
    }

    fn acquire_image(&mut self, slot: &VulkanSlot) -> EngineResult<AcquireOutcome> {
        match self.swapchain()?.acquire_next_image(slot.image_available.handle()) {
            Ok((index, false)) => Ok(AcquireOutcome::Acquired(index)),
            Ok((index, true)) => Ok(AcquireOutcome::Degraded(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::Stale),
            Err(e) => Err(EngineError::AcquireFailed(e.to_string())),
        }
    }

    fn record(
        &mut self,
        slot: &mut VulkanSlot,
        target: &FrameTarget,
        content: &mut dyn FrameContent<CommandBuffer>,
    ) -> EngineResult<()> {
        let (image, view) = self.swapchain()?.target(target.image_index).ok_or_else(|| {
            EngineError::RecordingFailed(format!("no chain image {}", target.image_index))
        })?;
        recorder::record_frame(&slot.command_buffer, image, view, target, content)
    }

    fn submit(&mut self, slot: &VulkanSlot) -> EngineResult<()> {
        let wait_semaphores = [slot.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [slot.render_finished.handle()];
        let command_buffers = [slot.command_buffer.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: The buffer was recorded this frame and the fence was reset
        // after the slot's previous submission completed.
        let result = unsafe {
            self.device
                .submit_graphics(std::slice::from_ref(&submit_info), slot.in_flight.handle())
        };
        result.map_err(|e| EngineError::SubmitFailed(e.to_string()))
    }

    fn present(&mut self, slot: &VulkanSlot, image_index: u32) -> EngineResult<PresentOutcome> {
        let result = self.swapchain()?.present(
            self.device.present_queue(),
            image_index,
            slot.render_finished.handle(),
        );

        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(PresentOutcome::Degraded),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
            Err(e) => Err(EngineError::PresentFailed(e.to_string())),
        }
    }

    fn drain(&mut self) -> EngineResult<()> {
        self.device
            .wait_idle()
            .map_err(|e| EngineError::DrainFailed(e.to_string()))
    }
}

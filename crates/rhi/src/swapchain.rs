//! Swapchain (image chain) management.
//!
//! A [`Swapchain`] owns the `VkSwapchainKHR` and one color view per image.
//! With dynamic rendering the view is the render target, so there are no
//! framebuffers or render passes.
//!
//! A swapchain is never recreated in place. Replacing it means dropping the
//! old one on a drained device and building a new one with a null
//! `old_swapchain`, so no image of the old chain can survive into the new.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::sizing::{self, SurfaceBounds};

/// What the surface supports for swapchain creation.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Image count and extent bounds, current transform.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format and color space pairs.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries support for `surface` on `physical_device`.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        // SAFETY: surface and physical device belong to the same instance.
        let (capabilities, formats, present_modes) = unsafe {
            (
                surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?,
                surface_loader.get_physical_device_surface_formats(physical_device, surface)?,
                surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?,
            )
        };

        debug!(
            "Surface support: {} formats, {} present modes, image count {}..{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// True if at least one format and one present mode are reported.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Vulkan swapchain with its image views.
///
/// Not thread-safe; the engine drives it from one thread.
pub struct Swapchain {
    device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Builds a swapchain for `surface`.
    ///
    /// `drawable` is the window's current size in pixels and is only used
    /// when the surface leaves the extent to the swapchain.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceUnsupported`] if the surface reports no
    /// format or no present mode, [`RhiError::DegenerateExtent`] if the
    /// chosen extent has zero area, or the Vulkan error of a failed call.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        drawable: vk::Extent2D,
        prefer_low_latency: bool,
    ) -> RhiResult<Self> {
        let support = SwapchainSupportDetails::query(device.physical_device(), surface, surface_loader)?;

        if !support.is_adequate() {
            return Err(RhiError::SurfaceUnsupported(format!(
                "{} formats, {} present modes reported",
                support.formats.len(),
                support.present_modes.len()
            )));
        }

        let surface_format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes, prefer_low_latency);
        let bounds = SurfaceBounds::from(&support.capabilities);
        let extent = sizing::choose_extent(&bounds, drawable);
        if sizing::is_degenerate(extent) {
            return Err(RhiError::DegenerateExtent {
                width: extent.width,
                height: extent.height,
            });
        }
        let image_count = sizing::determine_image_count(&bounds);

        let queue_families = device.queue_families();
        let queue_family_indices = [queue_families.graphics()?, queue_families.present()?];
        let (sharing_mode, shared_families) = if queue_families.is_split() {
            (vk::SharingMode::CONCURRENT, &queue_family_indices[..])
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(shared_families)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        // SAFETY: The surface is not bound to any other live swapchain; the
        // previous chain was destroyed before this call.
        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };

        // Owns the handle from here on so early returns clean up.
        let mut chain = Self {
            device,
            swapchain_loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format: surface_format.format,
            color_space: surface_format.color_space,
            extent,
            present_mode,
        };

        // SAFETY: swapchain was just created from this loader.
        chain.images = unsafe { chain.swapchain_loader.get_swapchain_images(swapchain)? };
        chain.create_image_views()?;

        info!(
            "Swapchain created: {}x{}, {:?}/{:?}, {:?}, {} images (sharing {:?})",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            chain.images.len(),
            sharing_mode
        );

        Ok(chain)
    }

    /// Acquires the next image, signaling `semaphore` when it is ready.
    ///
    /// Returns `(index, suboptimal)`. `ERROR_OUT_OF_DATE_KHR` comes back as
    /// an error and means the chain must be rebuilt.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        // SAFETY: The semaphore is unsignaled with no pending wait; the
        // caller recreates semaphores after every rebuild.
        unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    /// Queues `image_index` for presentation after `wait_semaphore`.
    ///
    /// Returns `true` if the swapchain is suboptimal.
    pub fn present(&self, queue: vk::Queue, image_index: u32, wait_semaphore: vk::Semaphore) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: image_index was acquired from this swapchain and not yet presented.
        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the color space.
    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.color_space
    }

    /// Returns the image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Returns the number of images.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Returns the image and its view at `index`, if it exists.
    #[inline]
    pub fn target(&self, index: u32) -> Option<(vk::Image, vk::ImageView)> {
        let index = index as usize;
        Some((*self.images.get(index)?, *self.image_views.get(index)?))
    }

    fn create_image_views(&mut self) -> RhiResult<()> {
        self.image_views.reserve(self.images.len());

        for (i, &image) in self.images.iter().enumerate() {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );

            // SAFETY: image belongs to this swapchain.
            let view = unsafe { self.device.handle().create_image_view(&create_info, None) }
                .map_err(|e| RhiError::Swapchain(format!("Failed to create image view {}: {}", i, e)))?;

            self.image_views.push(view);
        }

        debug!("Created {} image views", self.image_views.len());
        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        // SAFETY: The owner drained the device, so no command buffer still
        // references these views and no present is pending.
        unsafe {
            for &view in &self.image_views {
                self.device.handle().destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }

        info!(
            "Swapchain destroyed (was {}x{}, {} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
    }
}

/// Picks the surface format: `B8G8R8A8_SRGB`, then `B8G8R8A8_UNORM` (both
/// with `SRGB_NONLINEAR`), then whatever comes first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RhiResult<vk::SurfaceFormatKHR> {
    const RANKED: [vk::Format; 2] = [vk::Format::B8G8R8A8_SRGB, vk::Format::B8G8R8A8_UNORM];

    for wanted in RANKED {
        if let Some(&format) = formats
            .iter()
            .find(|f| f.format == wanted && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        {
            return Ok(format);
        }
    }

    let first = formats
        .first()
        .copied()
        .ok_or_else(|| RhiError::SurfaceUnsupported("no surface formats".to_string()))?;
    warn!("Using first available surface format: {:?}", first.format);
    Ok(first)
}

/// Picks `MAILBOX` when low latency is preferred and available, otherwise
/// `FIFO`, which every surface supports.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR], prefer_low_latency: bool) -> vk::PresentModeKHR {
    if prefer_low_latency && present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        return vk::PresentModeKHR::MAILBOX;
    }
    vk::PresentModeKHR::FIFO
}

//! Surface sizing policy.
//!
//! Derives the image extent and image count for a new swapchain from the
//! surface's reported bounds and the window's drawable size. Kept free of
//! Vulkan calls so the rules can be tested without a device.

use ash::vk;
use tracing::debug;

/// Extent value a surface reports when the swapchain decides the size.
pub const UNDEFINED_EXTENT: u32 = u32::MAX;

/// Snapshot of the surface capability fields the sizing rules read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceBounds {
    /// Current surface extent, or `UNDEFINED_EXTENT` in both axes.
    pub current_extent: vk::Extent2D,
    /// Smallest supported extent.
    pub min_extent: vk::Extent2D,
    /// Largest supported extent.
    pub max_extent: vk::Extent2D,
    /// Minimum number of images.
    pub min_image_count: u32,
    /// Maximum number of images, 0 meaning unbounded.
    pub max_image_count: u32,
}

impl From<&vk::SurfaceCapabilitiesKHR> for SurfaceBounds {
    fn from(caps: &vk::SurfaceCapabilitiesKHR) -> Self {
        Self {
            current_extent: caps.current_extent,
            min_extent: caps.min_image_extent,
            max_extent: caps.max_image_extent,
            min_image_count: caps.min_image_count,
            max_image_count: caps.max_image_count,
        }
    }
}

impl SurfaceBounds {
    /// Returns true if the surface dictates its own extent.
    #[inline]
    pub fn has_fixed_extent(&self) -> bool {
        self.current_extent.width != UNDEFINED_EXTENT
    }
}

/// Chooses the swapchain extent.
///
/// Uses the surface's current extent when it is defined. Otherwise clamps
/// each axis of the drawable size into the supported range.
pub fn choose_extent(bounds: &SurfaceBounds, drawable: vk::Extent2D) -> vk::Extent2D {
    if bounds.has_fixed_extent() {
        return bounds.current_extent;
    }

    let extent = vk::Extent2D {
        width: drawable
            .width
            .clamp(bounds.min_extent.width, bounds.max_extent.width.max(bounds.min_extent.width)),
        height: drawable
            .height
            .clamp(bounds.min_extent.height, bounds.max_extent.height.max(bounds.min_extent.height)),
    };

    debug!(
        "Extent {}x{} from drawable {}x{} (min {}x{}, max {}x{})",
        extent.width,
        extent.height,
        drawable.width,
        drawable.height,
        bounds.min_extent.width,
        bounds.min_extent.height,
        bounds.max_extent.width,
        bounds.max_extent.height
    );

    extent
}

/// One image more than the minimum, capped by the maximum when bounded.
pub fn determine_image_count(bounds: &SurfaceBounds) -> u32 {
    let preferred = bounds.min_image_count.saturating_add(1);
    if bounds.max_image_count > 0 {
        preferred.min(bounds.max_image_count)
    } else {
        preferred
    }
}

/// True when either axis is zero, as happens while a window is minimized.
#[inline]
pub fn is_degenerate(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

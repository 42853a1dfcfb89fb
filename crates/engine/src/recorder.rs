//! Command recorder.
//!
//! Builds the command sequence for one chain image into one slot's command
//! buffer:
//!
//! ```text
//! begin
//! UNDEFINED -> COLOR_ATTACHMENT_OPTIMAL
//! begin_rendering (clear to content.clear_color())
//! viewport + scissor = target extent
//! content.draw, content.draw_overlay
//! end_rendering
//! COLOR_ATTACHMENT_OPTIMAL -> PRESENT_SRC_KHR
//! end
//! ```

use ash::vk;
use presenter_rhi::command::CommandBuffer;

use crate::backend::{FrameContent, FrameTarget};
use crate::error::{EngineError, EngineResult};

/// Viewport and scissor covering the whole extent.
pub fn full_render_area(extent: vk::Extent2D) -> (vk::Viewport, vk::Rect2D) {
    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };
    (viewport, scissor)
}

/// Records a complete frame targeting `image`/`view`.
///
/// # Errors
///
/// Returns [`EngineError::RecordingFailed`] if beginning or ending the
/// command buffer fails.
pub fn record_frame(
    cmd: &CommandBuffer,
    image: vk::Image,
    view: vk::ImageView,
    target: &FrameTarget,
    content: &mut dyn FrameContent<CommandBuffer>,
) -> EngineResult<()> {
    cmd.begin()
        .map_err(|e| EngineError::RecordingFailed(format!("begin: {}", e)))?;

    cmd.transition_color_image(
        image,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    let color_attachment = vk::RenderingAttachmentInfo::default()
        .image_view(view)
        .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .clear_value(vk::ClearValue {
            color: vk::ClearColorValue {
                float32: content.clear_color(),
            },
        });

    let (viewport, scissor) = full_render_area(target.extent);

    let rendering_info = vk::RenderingInfo::default()
        .render_area(scissor)
        .layer_count(1)
        .color_attachments(std::slice::from_ref(&color_attachment));

    cmd.begin_rendering(&rendering_info);
    cmd.set_viewport(&viewport);
    cmd.set_scissor(&scissor);

    content.draw(cmd, target);
    content.draw_overlay(cmd, target);

    cmd.end_rendering();

    cmd.transition_color_image(
        image,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        vk::ImageLayout::PRESENT_SRC_KHR,
    );

    cmd.end()
        .map_err(|e| EngineError::RecordingFailed(format!("end: {}", e)))?;

    Ok(())
}

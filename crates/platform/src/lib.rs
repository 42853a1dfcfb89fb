//! Platform layer for the presenter.
//!
//! This crate owns the window and the Vulkan surface bound to it:
//! - Window creation via winit
//! - The current drawable size, used to detect minimized windows
//! - Surface creation and the instance extensions it requires

mod window;

pub use window::{Surface, Window, drawable_size, required_surface_extensions};

// Re-export winit types the host needs
pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};

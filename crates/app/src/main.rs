//! Presenter - Main Entry Point
//!
//! Opens a window and drives the frame presentation engine from the winit
//! event loop, one frame per redraw.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use presenter_core::{Config, FrameRateCounter, Timer};
use presenter_engine::{
    EngineOptions, FrameContent, FrameStatus, FrameTarget, VulkanBackend, VulkanEngine,
};
use presenter_platform::Window;
use presenter_rhi::command::CommandBuffer;
use presenter_rhi::vk;

/// Seconds for one full trip around the color wheel.
const HUE_PERIOD_SECS: f32 = 6.0;

/// Clears to the configured color and draws a centered panel whose hue
/// cycles over time, plus a progress strip along the top edge.
struct HueCycle {
    clock: Timer,
    background: [f32; 4],
}

impl HueCycle {
    fn new(background: [f32; 4]) -> Self {
        Self {
            clock: Timer::new(),
            background,
        }
    }

    fn phase(&self) -> f32 {
        (self.clock.elapsed_secs() / HUE_PERIOD_SECS).fract()
    }
}

impl FrameContent<CommandBuffer> for HueCycle {
    fn clear_color(&self) -> [f32; 4] {
        self.background
    }

    fn draw(&mut self, commands: &CommandBuffer, target: &FrameTarget) {
        let vk::Extent2D { width, height } = target.extent;
        let panel = vk::Rect2D {
            offset: vk::Offset2D {
                x: (width / 4) as i32,
                y: (height / 4) as i32,
            },
            extent: vk::Extent2D {
                width: (width / 2).max(1),
                height: (height / 2).max(1),
            },
        };
        commands.clear_color_rect(hue_to_rgba(self.phase()), panel);
    }

    fn draw_overlay(&mut self, commands: &CommandBuffer, target: &FrameTarget) {
        let strip = progress_strip(target.extent, self.phase());
        commands.clear_color_rect([1.0, 1.0, 1.0, 1.0], strip);
    }
}

/// Strip along the top edge covering `progress` of the width. Never leaves
/// the render area.
fn progress_strip(extent: vk::Extent2D, progress: f32) -> vk::Rect2D {
    let width = (extent.width as f32 * progress.clamp(0.0, 1.0)) as u32;
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: vk::Extent2D {
            width: width.clamp(1, extent.width.max(1)),
            height: (extent.height / 64).max(2).min(extent.height.max(1)),
        },
    }
}

/// Fully saturated color at `hue` in `[0, 1)`.
fn hue_to_rgba(hue: f32) -> [f32; 4] {
    let h = hue * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    [r, g, b, 1.0]
}

struct App {
    config: Config,
    // Dropped before the window it presents to.
    engine: Option<VulkanEngine>,
    window: Option<Window>,
    content: HueCycle,
    frame_timer: Timer,
    frame_rate: FrameRateCounter,
}

impl App {
    fn new(config: Config) -> Self {
        let content = HueCycle::new(config.presentation.clear_color);
        Self {
            config,
            engine: None,
            window: None,
            content,
            frame_timer: Timer::new(),
            frame_rate: FrameRateCounter::new(Duration::from_secs(1)),
        }
    }

    fn init_graphics(&mut self, event_loop: &ActiveEventLoop) -> presenter_engine::EngineResult<()> {
        let window_config = &self.config.window;
        let window = Window::new(
            event_loop,
            window_config.width,
            window_config.height,
            &window_config.title,
        )?;

        let backend = VulkanBackend::new(&window, &self.config)?;
        let engine = VulkanEngine::new(backend, EngineOptions::from(&self.config.presentation))?;

        self.engine = Some(engine);
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self, event_loop: &ActiveEventLoop) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        match engine.render_one_frame(&mut self.content) {
            Ok(FrameStatus::Presented) => {
                let delta = self.frame_timer.tick();
                if let Some(rate) = self.frame_rate.record(delta)
                    && let Some(window) = &self.window
                {
                    window.set_title_suffix(&format!("FPS: {:.0} ({:.2}ms)", rate.fps, rate.frame_ms));
                }
            }
            Ok(FrameStatus::Discarded) => debug!("Frame discarded, image chain rebuilt"),
            Ok(FrameStatus::Skipped) => {}
            Err(e) => {
                error!("Fatal render error: {}", e);
                self.shutdown();
                event_loop.exit();
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut engine) = self.engine.take()
            && let Err(e) = engine.shutdown()
        {
            error!("Engine shutdown failed: {}", e);
        }
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.engine.is_some() {
            return;
        }

        match self.init_graphics(event_loop) {
            Ok(()) => info!("Initialization complete, entering main loop"),
            Err(e) => {
                error!("Failed to initialize graphics: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(engine) = &self.engine {
                    engine.notify_resized();
                }
            }
            WindowEvent::RedrawRequested => self.render(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

fn main() -> Result<()> {
    let config = Config::load_from_env();
    let log_filter = config
        .as_ref()
        .ok()
        .and_then(|config| config.debug.log_filter.as_deref());
    presenter_core::init_logging(log_filter);
    let config = config?;

    info!("Starting Presenter");
    if !presenter_rhi::instance::is_vulkan_available() {
        anyhow::bail!("No Vulkan loader found on this system");
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}

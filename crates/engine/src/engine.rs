//! The frame presentation engine.
//!
//! One call to [`PresentationEngine::render_one_frame`] drives one cycle:
//!
//! ```text
//! Idle -> Waiting -> Acquiring -> Recording -> Submitted -> Presenting -> Idle
//!   any ----------------------------------------------------> Invalidated -> Idle
//! ```
//!
//! Invalidation (stale surface, degraded surface when configured, or the
//! resize flag) drains the device and rebuilds the image chain. The frame
//! that hit it is discarded and the cursor stays where it was.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ash::vk;
use presenter_core::config::PresentationConfig;
use presenter_rhi::sizing;
use tracing::{debug, error, info, warn};

use crate::backend::{
    AcquireOutcome, ChainInfo, DeviceDrained, FrameContent, FrameTarget, PresentBackend,
    PresentOutcome,
};
use crate::error::{EngineError, EngineResult};
use crate::frame_slots::{FrameCursor, FrameSlots};

/// Resize flag shared with window-event callbacks.
///
/// Setting it from any thread makes the engine rebuild the image chain at
/// the start of its next frame.
#[derive(Debug, Clone, Default)]
pub struct ResizeSignal(Arc<AtomicBool>);

impl ResizeSignal {
    /// Creates an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag.
    pub fn notify(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns whether the flag is set without clearing it.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clears the flag and returns whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Engine tuning taken from `[presentation]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Number of frame slots (N).
    pub frames_in_flight: usize,
    /// Whether a degraded acquire or present schedules a rebuild.
    pub rebuild_on_degraded: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            rebuild_on_degraded: true,
        }
    }
}

impl From<&PresentationConfig> for EngineOptions {
    fn from(config: &PresentationConfig) -> Self {
        Self {
            frames_in_flight: config.frames_in_flight,
            rebuild_on_degraded: config.rebuild_on_degraded,
        }
    }
}

/// State-machine position, as of the last transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Between frames.
    Idle,
    /// Blocked on the active slot's gate.
    Waiting,
    /// Requesting the next image.
    Acquiring,
    /// Recording commands.
    Recording,
    /// Submitting the recorded commands.
    Submitted,
    /// Presentation requested.
    Presenting,
    /// A rebuild is pending (e.g. while minimized).
    Invalidated,
}

/// What a call to `render_one_frame` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was presented and the cursor advanced.
    Presented,
    /// The frame was dropped and the chain rebuilt; the cursor held.
    Discarded,
    /// The drawable has zero area; nothing was done.
    Skipped,
}

/// Running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Frames presented.
    pub presented: u64,
    /// Frames dropped by invalidation.
    pub discarded: u64,
    /// Calls skipped while minimized.
    pub skipped: u64,
    /// Image chain rebuilds.
    pub rebuilds: u64,
}

/// Frame presentation engine over a [`PresentBackend`].
pub struct PresentationEngine<B: PresentBackend> {
    // Slots are declared before the backend so they drop first.
    slots: FrameSlots<B::Slot>,
    backend: B,
    cursor: FrameCursor,
    chain: Option<ChainInfo>,
    resize: ResizeSignal,
    invalidated: bool,
    rebuild_on_degraded: bool,
    state: EngineState,
    stats: EngineStats,
    shut_down: bool,
}

impl<B: PresentBackend> PresentationEngine<B> {
    /// Builds the image chain and the frame slots.
    ///
    /// If the drawable has zero area the chain is not built yet; the first
    /// call to `render_one_frame` with a usable size builds it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SurfaceUnsupported`] if no chain can be built,
    /// or the error of a failed slot creation.
    pub fn new(mut backend: B, options: EngineOptions) -> EngineResult<Self> {
        let drawable = backend.drawable_extent();
        let chain = if sizing::is_degenerate(drawable) {
            debug!("Drawable is {}x{}, deferring chain build", drawable.width, drawable.height);
            None
        } else {
            backend.build_chain()?
        };

        let slots = match FrameSlots::init(&mut backend, options.frames_in_flight) {
            Ok(slots) => slots,
            Err(e) => {
                if chain.is_some() && backend.drain().is_ok() {
                    backend.destroy_chain(&DeviceDrained::new());
                }
                return Err(e);
            }
        };

        if let Some(chain) = &chain {
            log_chain(chain);
        }

        Ok(Self {
            backend,
            cursor: FrameCursor::new(slots.len()),
            slots,
            invalidated: chain.is_none(),
            chain,
            resize: ResizeSignal::new(),
            rebuild_on_degraded: options.rebuild_on_degraded,
            state: if chain.is_none() {
                EngineState::Invalidated
            } else {
                EngineState::Idle
            },
            stats: EngineStats::default(),
            shut_down: false,
        })
    }

    /// Drives one state-machine cycle.
    ///
    /// Stale and degraded surfaces are handled internally and reported as
    /// [`FrameStatus::Discarded`] or [`FrameStatus::Skipped`].
    ///
    /// # Errors
    ///
    /// Any returned error is fatal: the host should call
    /// [`shutdown`](Self::shutdown) and exit.
    pub fn render_one_frame(
        &mut self,
        content: &mut dyn FrameContent<B::Commands>,
    ) -> EngineResult<FrameStatus> {
        if self.shut_down {
            return Err(EngineError::ShutDown);
        }

        if self.resize.take() {
            debug!("Resize flag set, invalidating image chain");
            self.invalidated = true;
        }

        if self.invalidated {
            return self.handle_invalidated();
        }

        let Some(chain) = self.chain else {
            return self.handle_invalidated();
        };

        let index = self.cursor.index();

        self.state = EngineState::Waiting;
        self.slots.wait(&mut self.backend, index)?;

        self.state = EngineState::Acquiring;
        let image_index = match self.backend.acquire_image(self.slots.slot(index)?)? {
            AcquireOutcome::Acquired(image_index) => image_index,
            AcquireOutcome::Degraded(image_index) => {
                debug!("Acquire reported a degraded surface (image {})", image_index);
                if self.rebuild_on_degraded {
                    self.invalidated = true;
                }
                image_index
            }
            AcquireOutcome::Stale => {
                debug!("Acquire reported a stale surface on slot {}", index);
                self.invalidated = true;
                return self.handle_invalidated();
            }
        };

        self.slots.reset(&mut self.backend, index)?;

        self.state = EngineState::Recording;
        let target = FrameTarget {
            image_index,
            slot: index,
            extent: chain.extent,
            format: chain.format,
        };
        self.backend
            .record(self.slots.slot_mut(index)?, &target, content)?;

        self.state = EngineState::Submitted;
        self.backend.submit(self.slots.slot(index)?)?;

        self.state = EngineState::Presenting;
        match self.backend.present(self.slots.slot(index)?, image_index)? {
            PresentOutcome::Presented => {}
            PresentOutcome::Degraded => {
                debug!("Present reported a degraded surface (image {})", image_index);
                if self.rebuild_on_degraded {
                    self.invalidated = true;
                }
            }
            PresentOutcome::Stale => {
                debug!("Present reported a stale surface (image {})", image_index);
                self.invalidated = true;
                return self.handle_invalidated();
            }
        }

        self.cursor.advance();
        self.stats.presented += 1;
        self.state = if self.invalidated {
            EngineState::Invalidated
        } else {
            EngineState::Idle
        };

        Ok(FrameStatus::Presented)
    }

    /// Sets the resize flag; the next frame rebuilds the image chain.
    pub fn notify_resized(&self) {
        self.resize.notify();
    }

    /// A handle to the resize flag for callbacks on other threads.
    pub fn resize_signal(&self) -> ResizeSignal {
        self.resize.clone()
    }

    /// Drains the device, then tears down the frame slots and the image
    /// chain, in that order. A second call does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DrainFailed`] if the drain fails; nothing is
    /// freed in that case.
    pub fn shutdown(&mut self) -> EngineResult<()> {
        if self.shut_down {
            return Ok(());
        }

        let drained = self.drain()?;
        self.slots.teardown(&mut self.backend, &drained);
        if self.chain.take().is_some() {
            self.backend.destroy_chain(&drained);
        }

        self.shut_down = true;
        self.state = EngineState::Idle;
        info!(
            "Presentation engine shut down ({} presented, {} discarded, {} skipped, {} rebuilds)",
            self.stats.presented, self.stats.discarded, self.stats.skipped, self.stats.rebuilds
        );
        Ok(())
    }

    /// Last state-machine state.
    ///
    /// Between calls this is `Idle` or `Invalidated`. After a fatal error it
    /// is the step that failed.
    #[inline]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Index of the active frame slot.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor.index()
    }

    /// Number of frame slots (N).
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.cursor.depth()
    }

    /// The current image chain, if one is built.
    #[inline]
    pub fn chain(&self) -> Option<&ChainInfo> {
        self.chain.as_ref()
    }

    /// True while a chain rebuild is pending.
    #[inline]
    pub fn is_invalidated(&self) -> bool {
        self.invalidated || self.resize.is_set()
    }

    /// True once `shutdown` succeeded.
    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Running totals.
    #[inline]
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// The backend.
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn drain(&mut self) -> EngineResult<DeviceDrained> {
        self.backend.drain()?;
        Ok(DeviceDrained::new())
    }

    /// Invalidated transition: skip while minimized, otherwise drain and
    /// rebuild. The cursor never moves here.
    fn handle_invalidated(&mut self) -> EngineResult<FrameStatus> {
        self.state = EngineState::Invalidated;
        self.invalidated = true;

        let drawable = self.backend.drawable_extent();
        if sizing::is_degenerate(drawable) {
            debug!("Drawable is {}x{}, skipping frame", drawable.width, drawable.height);
            self.stats.skipped += 1;
            return Ok(FrameStatus::Skipped);
        }

        if !self.rebuild_chain()? {
            debug!("Surface has zero area, skipping frame");
            self.stats.skipped += 1;
            return Ok(FrameStatus::Skipped);
        }

        self.invalidated = false;
        self.state = EngineState::Idle;
        self.stats.discarded += 1;
        Ok(FrameStatus::Discarded)
    }

    /// Drains, destroys the current chain and builds a new one. Returns
    /// false if the surface had zero area and no chain was built.
    fn rebuild_chain(&mut self) -> EngineResult<bool> {
        debug!("Rebuilding image chain");

        let drained = self.drain()?;
        if self.chain.take().is_some() {
            self.backend.destroy_chain(&drained);
        }

        let Some(chain) = self.backend.build_chain()? else {
            return Ok(false);
        };
        self.slots.refresh_all(&mut self.backend, &drained)?;

        log_chain(&chain);
        self.chain = Some(chain);
        self.stats.rebuilds += 1;
        Ok(true)
    }
}

impl<B: PresentBackend> Drop for PresentationEngine<B> {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        warn!("Presentation engine dropped without shutdown, shutting down now");
        if let Err(e) = self.shutdown() {
            error!("Shutdown during drop failed: {}", e);
        }
    }
}

fn log_chain(chain: &ChainInfo) {
    let vk::Extent2D { width, height } = chain.extent;
    info!(
        "Image chain #{}: {}x{}, {:?}, {:?}, {} images",
        chain.generation, width, height, chain.format, chain.present_mode, chain.image_count
    );
}

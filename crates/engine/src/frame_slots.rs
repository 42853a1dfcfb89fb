//! Frame slots and the frame cursor.
//!
//! The slots form a fixed ring of N per-frame resource bundles. A slot may
//! be reused only after its previous submission's gate signaled, which is
//! what bounds the number of frames in flight to N.
//!
//! ```text
//! wait(i)   block on slot i's gate          (Wait step)
//! reset(i)  clear the gate, reset buffer    (after a successful Acquire)
//! ```

use tracing::{debug, error, info};

use crate::backend::{DeviceDrained, PresentBackend};
use crate::error::{EngineError, EngineResult};

/// Selects the active slot; advances once per presented frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    index: usize,
    depth: usize,
}

impl FrameCursor {
    /// Cursor over `depth` slots, starting at slot 0.
    pub fn new(depth: usize) -> Self {
        Self {
            index: 0,
            depth: depth.max(1),
        }
    }

    /// The active slot index.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of slots cycled through.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Moves to the next slot, wrapping at the depth.
    #[inline]
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.depth;
    }
}

/// The ring of frame slots.
pub struct FrameSlots<S> {
    slots: Vec<S>,
}

impl<S> FrameSlots<S> {
    /// Creates `count` slots with their gates pre-signaled.
    ///
    /// If a slot fails to create, the ones already made are released after
    /// a drain before the error is returned.
    pub fn init<B>(backend: &mut B, count: usize) -> EngineResult<Self>
    where
        B: PresentBackend<Slot = S>,
    {
        if count == 0 {
            return Err(EngineError::SlotFailed(
                "at least one frame slot is required".to_string(),
            ));
        }

        let mut slots = Self {
            slots: Vec::with_capacity(count),
        };

        for index in 0..count {
            match backend.create_slot(index) {
                Ok(slot) => slots.slots.push(slot),
                Err(e) => {
                    error!("Failed to create frame slot {}: {}", index, e);
                    if backend.drain().is_ok() {
                        slots.teardown(backend, &DeviceDrained::new());
                    }
                    return Err(e);
                }
            }
        }

        info!("Created {} frame slots", count);
        Ok(slots)
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True once the slots were torn down.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Blocks until slot `index`'s gate is signaled. The sole backpressure
    /// point of the engine.
    pub fn wait<B>(&self, backend: &mut B, index: usize) -> EngineResult<()>
    where
        B: PresentBackend<Slot = S>,
    {
        let slot = self.slot(index)?;
        backend.wait_for_slot(slot)
    }

    /// Clears slot `index`'s gate and resets its recording buffer.
    pub fn reset<B>(&mut self, backend: &mut B, index: usize) -> EngineResult<()>
    where
        B: PresentBackend<Slot = S>,
    {
        let slot = self.slot_mut(index)?;
        backend.reset_slot(slot)
    }

    /// Restores every slot's signals after a chain rebuild.
    pub fn refresh_all<B>(&mut self, backend: &mut B, drained: &DeviceDrained) -> EngineResult<()>
    where
        B: PresentBackend<Slot = S>,
    {
        for slot in &mut self.slots {
            backend.refresh_slot(slot, drained)?;
        }
        debug!("Refreshed {} frame slots", self.slots.len());
        Ok(())
    }

    /// Releases every slot. Requires a drained device.
    pub fn teardown<B>(&mut self, backend: &mut B, drained: &DeviceDrained)
    where
        B: PresentBackend<Slot = S>,
    {
        let count = self.slots.len();
        for slot in self.slots.drain(..) {
            backend.destroy_slot(slot, drained);
        }
        if count > 0 {
            debug!("Destroyed {} frame slots", count);
        }
    }

    pub(crate) fn slot(&self, index: usize) -> EngineResult<&S> {
        self.slots
            .get(index)
            .ok_or_else(|| EngineError::SlotFailed(format!("no frame slot {}", index)))
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> EngineResult<&mut S> {
        self.slots
            .get_mut(index)
            .ok_or_else(|| EngineError::SlotFailed(format!("no frame slot {}", index)))
    }
}

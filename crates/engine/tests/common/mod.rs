//! Scriptable GPU double for driving the engine without a device.
//!
//! Every slot gate, outstanding submission and chain image lives in one
//! shared [`GpuState`]. The backend asserts the ordering rules a real
//! driver would punish: no free while work is pending, no reset of an
//! unsignaled gate, no acquire without a chain.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use ash::vk;
use presenter_engine::{
    AcquireOutcome, ChainInfo, DeviceDrained, EngineError, EngineOptions, EngineResult,
    FrameContent, FrameTarget, PresentBackend, PresentOutcome, PresentationEngine,
};

/// Longest a slot wait may block before the double gives up.
pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub const CHAIN_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;

/// When submitted work completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// As soon as it is submitted.
    Immediate,
    /// When the next submission arrives, keeping one frame outstanding.
    Lagged,
    /// Only through [`MockGpu::complete_next`] or a drain.
    Manual,
}

/// Forced surface report for the next acquire or present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Stale,
    Degraded,
}

#[derive(Debug)]
pub struct GpuState {
    pub completion: Completion,
    pub drawable: vk::Extent2D,
    pub image_count: u32,
    pub surface_supported: bool,
    /// Surface-reported extent when it differs from the drawable.
    pub surface_extent: Option<vk::Extent2D>,
    pub fail_slot_at: Option<usize>,
    pub fail_submit: bool,
    pub fail_present: bool,

    pub gates: Vec<bool>,
    pub gate_signals: Vec<u32>,
    pub pending: VecDeque<usize>,
    pub blocked_on: Option<usize>,

    pub acquire_script: VecDeque<Scripted>,
    pub present_script: VecDeque<Scripted>,

    pub chain_images: Vec<u64>,
    pub next_image_id: u64,
    pub next_acquire: u32,
    pub acquired: Option<u32>,

    pub builds: u32,
    pub chain_destroys: u32,
    pub slots_alive: usize,
    pub slots_destroyed: usize,
    pub refreshes: u32,
    pub drains: u32,
    pub acquires: u32,
    pub submits: u32,
    pub presented_images: Vec<u64>,
}

impl GpuState {
    fn signal(&mut self, slot: usize) {
        self.gates[slot] = true;
        self.gate_signals[slot] += 1;
    }

    fn complete_all(&mut self) {
        while let Some(slot) = self.pending.pop_front() {
            self.signal(slot);
        }
    }
}

/// Test-side handle to the shared GPU state.
#[derive(Clone)]
pub struct MockGpu {
    shared: Arc<(Mutex<GpuState>, Condvar)>,
}

impl MockGpu {
    pub fn new(completion: Completion) -> Self {
        let state = GpuState {
            completion,
            drawable: vk::Extent2D {
                width: 800,
                height: 600,
            },
            image_count: 3,
            surface_supported: true,
            surface_extent: None,
            fail_slot_at: None,
            fail_submit: false,
            fail_present: false,
            gates: Vec::new(),
            gate_signals: Vec::new(),
            pending: VecDeque::new(),
            blocked_on: None,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            chain_images: Vec::new(),
            next_image_id: 0,
            next_acquire: 0,
            acquired: None,
            builds: 0,
            chain_destroys: 0,
            slots_alive: 0,
            slots_destroyed: 0,
            refreshes: 0,
            drains: 0,
            acquires: 0,
            submits: 0,
            presented_images: Vec::new(),
        };
        Self {
            shared: Arc::new((Mutex::new(state), Condvar::new())),
        }
    }

    pub fn backend(&self) -> MockBackend {
        MockBackend { gpu: self.clone() }
    }

    /// Snapshot access to the state.
    pub fn state(&self) -> MutexGuard<'_, GpuState> {
        self.shared.0.lock().unwrap()
    }

    /// Mutates the state and wakes any blocked wait.
    pub fn update<R>(&self, f: impl FnOnce(&mut GpuState) -> R) -> R {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();
        let result = f(&mut state);
        cvar.notify_all();
        result
    }

    pub fn set_drawable(&self, width: u32, height: u32) {
        self.update(|s| s.drawable = vk::Extent2D { width, height });
    }

    pub fn script_acquire(&self, report: Scripted) {
        self.update(|s| s.acquire_script.push_back(report));
    }

    pub fn script_present(&self, report: Scripted) {
        self.update(|s| s.present_script.push_back(report));
    }

    /// Completes the oldest outstanding submission, returning its slot.
    pub fn complete_next(&self) -> Option<usize> {
        self.update(|s| {
            let slot = s.pending.pop_front()?;
            s.signal(slot);
            Some(slot)
        })
    }

    /// Blocks until `condition` holds or `timeout` passes.
    pub fn wait_until(
        &self,
        timeout: Duration,
        condition: impl Fn(&GpuState) -> bool,
    ) -> bool {
        let (lock, cvar) = &*self.shared;
        let state = lock.lock().unwrap();
        let (_state, result) = cvar
            .wait_timeout_while(state, timeout, |s| !condition(s))
            .unwrap();
        !result.timed_out()
    }
}

pub struct MockSlot {
    pub index: usize,
}

/// What content sees as its command sink.
#[derive(Debug, Clone, Copy)]
pub struct MockCommands {
    pub slot: usize,
    pub image: u64,
}

pub struct MockBackend {
    gpu: MockGpu,
}

impl PresentBackend for MockBackend {
    type Slot = MockSlot;
    type Commands = MockCommands;

    fn drawable_extent(&self) -> vk::Extent2D {
        self.gpu.state().drawable
    }

    fn build_chain(&mut self) -> EngineResult<Option<ChainInfo>> {
        self.gpu.update(|s| {
            assert!(s.chain_images.is_empty(), "chain built while another is live");
            if !s.surface_supported {
                return Err(EngineError::SurfaceUnsupported(
                    "mock surface reports no formats".to_string(),
                ));
            }
            assert!(
                s.drawable.width > 0 && s.drawable.height > 0,
                "chain built for a zero-area drawable"
            );

            let extent = s.surface_extent.unwrap_or(s.drawable);
            if extent.width == 0 || extent.height == 0 {
                return Ok(None);
            }

            let mut images = Vec::with_capacity(s.image_count as usize);
            for _ in 0..s.image_count {
                s.next_image_id += 1;
                images.push(s.next_image_id);
            }
            s.chain_images = images;
            s.next_acquire = 0;
            s.acquired = None;
            s.builds += 1;

            Ok(Some(ChainInfo {
                format: CHAIN_FORMAT,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                present_mode: vk::PresentModeKHR::MAILBOX,
                extent,
                image_count: s.image_count,
                generation: u64::from(s.builds),
            }))
        })
    }

    fn destroy_chain(&mut self, _drained: &DeviceDrained) {
        self.gpu.update(|s| {
            assert!(
                s.pending.is_empty(),
                "chain freed with {} submissions outstanding",
                s.pending.len()
            );
            s.chain_images.clear();
            s.chain_destroys += 1;
        });
    }

    fn create_slot(&mut self, index: usize) -> EngineResult<MockSlot> {
        self.gpu.update(|s| {
            if s.fail_slot_at == Some(index) {
                return Err(EngineError::SlotFailed(format!("mock slot {}", index)));
            }
            if s.gates.len() <= index {
                s.gates.resize(index + 1, true);
                s.gate_signals.resize(index + 1, 0);
            }
            s.gates[index] = true;
            s.slots_alive += 1;
            Ok(MockSlot { index })
        })
    }

    fn refresh_slot(&mut self, slot: &mut MockSlot, _drained: &DeviceDrained) -> EngineResult<()> {
        self.gpu.update(|s| {
            assert!(
                !s.pending.contains(&slot.index),
                "slot {} refreshed with work outstanding",
                slot.index
            );
            s.refreshes += 1;
        });
        Ok(())
    }

    fn destroy_slot(&mut self, slot: MockSlot, _drained: &DeviceDrained) {
        self.gpu.update(|s| {
            // A gate left unsignaled by a rejected submit has nothing pending.
            assert!(
                !s.pending.contains(&slot.index),
                "slot {} freed with work outstanding",
                slot.index
            );
            s.slots_alive -= 1;
            s.slots_destroyed += 1;
        });
    }

    fn wait_for_slot(&mut self, slot: &MockSlot) -> EngineResult<()> {
        let (lock, cvar) = &*self.gpu.shared;
        let mut state = lock.lock().unwrap();
        state.blocked_on = Some(slot.index);
        cvar.notify_all();

        let (mut state, result) = cvar
            .wait_timeout_while(state, WAIT_LIMIT, |s| !s.gates[slot.index])
            .unwrap();
        state.blocked_on = None;
        cvar.notify_all();

        assert!(
            !result.timed_out(),
            "slot {} gate never signaled",
            slot.index
        );
        Ok(())
    }

    fn reset_slot(&mut self, slot: &mut MockSlot) -> EngineResult<()> {
        self.gpu.update(|s| {
            assert!(s.gates[slot.index], "slot {} reset before its gate signaled", slot.index);
            s.gates[slot.index] = false;
        });
        Ok(())
    }

    fn acquire_image(&mut self, _slot: &MockSlot) -> EngineResult<AcquireOutcome> {
        self.gpu.update(|s| {
            s.acquires += 1;
            assert!(!s.chain_images.is_empty(), "acquire without a chain");

            let report = s.acquire_script.pop_front();
            if report == Some(Scripted::Stale) {
                return Ok(AcquireOutcome::Stale);
            }

            let index = s.next_acquire;
            s.next_acquire = (index + 1) % s.image_count;
            s.acquired = Some(index);
            Ok(match report {
                Some(Scripted::Degraded) => AcquireOutcome::Degraded(index),
                _ => AcquireOutcome::Acquired(index),
            })
        })
    }

    fn record(
        &mut self,
        slot: &mut MockSlot,
        target: &FrameTarget,
        content: &mut dyn FrameContent<MockCommands>,
    ) -> EngineResult<()> {
        let image = {
            let s = self.gpu.state();
            assert!(!s.gates[slot.index], "recording into slot {} before reset", slot.index);
            assert_eq!(s.acquired, Some(target.image_index));
            s.chain_images[target.image_index as usize]
        };

        let commands = MockCommands {
            slot: slot.index,
            image,
        };
        let _ = content.clear_color();
        content.draw(&commands, target);
        content.draw_overlay(&commands, target);
        Ok(())
    }

    fn submit(&mut self, slot: &MockSlot) -> EngineResult<()> {
        self.gpu.update(|s| {
            if s.fail_submit {
                return Err(EngineError::SubmitFailed("mock device lost".to_string()));
            }
            s.submits += 1;
            if s.completion == Completion::Lagged {
                s.complete_all();
            }
            s.pending.push_back(slot.index);
            if s.completion == Completion::Immediate {
                s.complete_all();
            }
            Ok(())
        })
    }

    fn present(&mut self, _slot: &MockSlot, image_index: u32) -> EngineResult<PresentOutcome> {
        self.gpu.update(|s| {
            assert_eq!(s.acquired.take(), Some(image_index), "presenting an unacquired image");
            if s.fail_present {
                return Err(EngineError::PresentFailed("mock surface lost".to_string()));
            }

            let report = s.present_script.pop_front();
            if report == Some(Scripted::Stale) {
                return Ok(PresentOutcome::Stale);
            }

            let image = s.chain_images[image_index as usize];
            s.presented_images.push(image);
            Ok(match report {
                Some(Scripted::Degraded) => PresentOutcome::Degraded,
                _ => PresentOutcome::Presented,
            })
        })
    }

    fn drain(&mut self) -> EngineResult<()> {
        self.gpu.update(|s| {
            s.complete_all();
            s.drains += 1;
        });
        Ok(())
    }
}

/// Content that remembers which slot and image it drew into.
#[derive(Debug, Default)]
pub struct TestContent {
    pub drawn: Vec<(usize, u64)>,
    pub overlays: u32,
}

impl FrameContent<MockCommands> for TestContent {
    fn clear_color(&self) -> [f32; 4] {
        [0.2, 0.3, 0.4, 1.0]
    }

    fn draw(&mut self, commands: &MockCommands, target: &FrameTarget) {
        assert_eq!(commands.slot, target.slot);
        assert_eq!(target.format, CHAIN_FORMAT);
        self.drawn.push((commands.slot, commands.image));
    }

    fn draw_overlay(&mut self, _commands: &MockCommands, _target: &FrameTarget) {
        self.overlays += 1;
    }
}

pub fn options(frames_in_flight: usize) -> EngineOptions {
    EngineOptions {
        frames_in_flight,
        ..Default::default()
    }
}

pub fn engine(gpu: &MockGpu, frames_in_flight: usize) -> PresentationEngine<MockBackend> {
    init_tracing();
    PresentationEngine::new(gpu.backend(), options(frames_in_flight))
        .expect("Failed to create engine")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

//! Image chain invalidation, rebuild and teardown ordering.

mod common;

use ash::vk;
use common::{Completion, MockGpu, Scripted, TestContent};
use presenter_engine::{EngineError, EngineOptions, EngineState, FrameStatus, PresentationEngine};

#[test]
fn test_stale_acquire_keeps_cursor_and_gate() {
    let gpu = MockGpu::new(Completion::Manual);
    let mut engine = common::engine(&gpu, 2);
    let mut content = TestContent::default();

    gpu.script_acquire(Scripted::Stale);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Discarded);
    assert_eq!(engine.cursor(), 0);
    assert!(content.drawn.is_empty());

    // Slot 0 was never reset, so its next wait needs no completion.
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Presented);
    assert_eq!(engine.cursor(), 1);

    let state = gpu.state();
    assert_eq!(state.gate_signals[0], 0);
    assert_eq!(state.builds, 2);
    assert_eq!(state.submits, 1);
    drop(state);

    engine.shutdown().unwrap();
}

#[test]
fn test_stale_present_discards_frame() {
    let gpu = MockGpu::new(Completion::Manual);
    let mut engine = common::engine(&gpu, 2);
    let mut content = TestContent::default();

    gpu.script_present(Scripted::Stale);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Discarded);
    assert_eq!(engine.cursor(), 0);

    {
        let state = gpu.state();
        assert!(state.presented_images.is_empty());
        // The rebuild drain retired the discarded submission.
        assert!(state.pending.is_empty());
        assert!(state.gates[0]);
    }

    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Presented);
    assert_eq!(engine.cursor(), 1);
    assert_eq!(engine.stats().discarded, 1);
    assert_eq!(engine.stats().presented, 1);

    engine.shutdown().unwrap();
}

#[test]
fn test_back_to_back_rebuilds_use_fresh_images() {
    let gpu = MockGpu::new(Completion::Immediate);
    let mut engine = common::engine(&gpu, 2);
    let mut content = TestContent::default();

    engine.render_one_frame(&mut content).unwrap();
    let original = gpu.state().chain_images.clone();

    engine.notify_resized();
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Discarded);
    let first = *engine.chain().unwrap();
    let first_images = gpu.state().chain_images.clone();

    engine.notify_resized();
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Discarded);
    let second = *engine.chain().unwrap();
    let second_images = gpu.state().chain_images.clone();

    assert_eq!(first.format, second.format);
    assert!(first.extent.width > 0 && first.extent.height > 0);
    assert!(second.extent.width > 0 && second.extent.height > 0);
    assert_eq!(second.generation, first.generation + 1);
    assert!(second_images.iter().all(|image| !first_images.contains(image)));
    assert!(second_images.iter().all(|image| !original.contains(image)));

    engine.render_one_frame(&mut content).unwrap();
    let (_, image) = *content.drawn.last().unwrap();
    assert!(second_images.contains(&image));

    assert_eq!(engine.stats().rebuilds, 2);
    engine.shutdown().unwrap();
}

#[test]
fn test_minimized_window_skips_without_rebuild() {
    let gpu = MockGpu::new(Completion::Immediate);
    let mut engine = common::engine(&gpu, 2);
    let mut content = TestContent::default();

    engine.render_one_frame(&mut content).unwrap();

    gpu.set_drawable(0, 0);
    engine.notify_resized();

    let (builds, acquires) = {
        let state = gpu.state();
        (state.builds, state.acquires)
    };

    for _ in 0..5 {
        assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Skipped);
        assert_eq!(engine.state(), EngineState::Invalidated);
        assert!(engine.is_invalidated());
    }

    {
        let state = gpu.state();
        assert_eq!(state.builds, builds);
        assert_eq!(state.acquires, acquires);
    }
    assert_eq!(engine.stats().skipped, 5);
    assert_eq!(engine.cursor(), 1);

    gpu.set_drawable(1024, 768);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Discarded);
    let extent = engine.chain().unwrap().extent;
    assert_eq!((extent.width, extent.height), (1024, 768));
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Presented);

    engine.shutdown().unwrap();
}

#[test]
fn test_minimized_at_startup_defers_chain() {
    let gpu = MockGpu::new(Completion::Immediate);
    gpu.set_drawable(0, 0);

    let mut engine = common::engine(&gpu, 2);
    let mut content = TestContent::default();

    assert!(engine.chain().is_none());
    assert_eq!(engine.state(), EngineState::Invalidated);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Skipped);
    assert_eq!(gpu.state().builds, 0);

    gpu.set_drawable(640, 480);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Discarded);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Presented);
    assert_eq!(gpu.state().builds, 1);

    engine.shutdown().unwrap();
}

#[test]
fn test_zero_area_surface_skips_until_restored() {
    let gpu = MockGpu::new(Completion::Immediate);
    let mut engine = common::engine(&gpu, 2);
    let mut content = TestContent::default();

    engine.render_one_frame(&mut content).unwrap();

    // Minimized on a platform that reports 0x0 for the surface while the
    // window keeps its size.
    gpu.update(|s| {
        s.surface_extent = Some(vk::Extent2D {
            width: 0,
            height: 0,
        })
    });
    engine.notify_resized();

    for _ in 0..3 {
        assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Skipped);
        assert!(engine.is_invalidated());
        assert_eq!(engine.state(), EngineState::Invalidated);
        assert!(engine.chain().is_none());
    }
    {
        let state = gpu.state();
        assert_eq!(state.builds, 1);
        assert_eq!(state.chain_destroys, 1);
        assert!(state.chain_images.is_empty());
    }
    assert_eq!(engine.stats().skipped, 3);
    assert_eq!(engine.stats().rebuilds, 0);
    assert_eq!(engine.cursor(), 1);

    gpu.update(|s| s.surface_extent = None);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Discarded);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Presented);
    assert_eq!(gpu.state().builds, 2);
    assert_eq!(engine.cursor(), 0);

    engine.shutdown().unwrap();
}

#[test]
fn test_zero_area_surface_at_startup_defers_chain() {
    common::init_tracing();
    let gpu = MockGpu::new(Completion::Immediate);
    gpu.update(|s| {
        s.surface_extent = Some(vk::Extent2D {
            width: 0,
            height: 0,
        })
    });

    let mut engine = PresentationEngine::new(gpu.backend(), common::options(2)).unwrap();
    let mut content = TestContent::default();
    assert!(engine.chain().is_none());
    assert_eq!(engine.state(), EngineState::Invalidated);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Skipped);

    gpu.update(|s| s.surface_extent = None);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Discarded);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Presented);
    assert_eq!(gpu.state().builds, 1);

    engine.shutdown().unwrap();
}

#[test]
fn test_stale_present_then_minimize_holds_outstanding_work() {
    let gpu = MockGpu::new(Completion::Manual);
    let mut engine = common::engine(&gpu, 2);
    let mut content = TestContent::default();

    // The window is minimized mid-frame, before any resize event arrives.
    gpu.set_drawable(0, 0);
    gpu.script_present(Scripted::Stale);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Skipped);
    assert_eq!(engine.cursor(), 0);

    let (acquires, refreshes) = {
        let state = gpu.state();
        assert_eq!(state.pending.len(), 1);
        assert_eq!(state.submits, 1);
        (state.acquires, state.refreshes)
    };

    for _ in 0..3 {
        assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Skipped);
    }
    {
        let state = gpu.state();
        assert_eq!(state.pending.len(), 1);
        assert_eq!(state.acquires, acquires);
        assert_eq!(state.builds, 1);
    }

    gpu.set_drawable(800, 600);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Discarded);
    {
        let state = gpu.state();
        assert!(state.pending.is_empty());
        assert!(state.gates[0]);
        assert_eq!(state.refreshes, refreshes + 2);
        assert_eq!(state.builds, 2);
    }

    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Presented);
    assert_eq!(engine.cursor(), 1);
    assert_eq!(engine.stats().skipped, 4);

    engine.shutdown().unwrap();
}

#[test]
fn test_no_free_while_work_outstanding() {
    let gpu = MockGpu::new(Completion::Lagged);
    let mut engine = common::engine(&gpu, 2);
    let mut content = TestContent::default();

    for frame in 1..=20 {
        if frame == 5 || frame == 12 {
            engine.notify_resized();
        }
        if frame == 8 {
            gpu.script_present(Scripted::Stale);
        }
        engine.render_one_frame(&mut content).unwrap();
    }

    // One submission is always outstanding here; shutdown has to drain it.
    assert_eq!(gpu.state().pending.len(), 1);
    engine.shutdown().unwrap();

    let state = gpu.state();
    assert!(state.pending.is_empty());
    assert!(state.chain_images.is_empty());
    assert_eq!(state.slots_alive, 0);
    assert_eq!(state.slots_destroyed, 2);
    assert_eq!(state.builds, 4);
    assert_eq!(state.chain_destroys, 4);
}

#[test]
fn test_shutdown_is_idempotent() {
    let gpu = MockGpu::new(Completion::Manual);
    let mut engine = common::engine(&gpu, 3);
    let mut content = TestContent::default();

    engine.render_one_frame(&mut content).unwrap();
    engine.render_one_frame(&mut content).unwrap();

    engine.shutdown().unwrap();
    engine.shutdown().unwrap();
    assert!(engine.is_shut_down());

    let result = engine.render_one_frame(&mut content);
    assert!(matches!(result, Err(EngineError::ShutDown)));

    let state = gpu.state();
    assert_eq!(state.drains, 1);
    assert_eq!(state.slots_destroyed, 3);
    assert_eq!(state.chain_destroys, 1);
}

#[test]
fn test_drop_shuts_down() {
    let gpu = MockGpu::new(Completion::Manual);
    {
        let mut engine = common::engine(&gpu, 2);
        let mut content = TestContent::default();
        engine.render_one_frame(&mut content).unwrap();
    }

    let state = gpu.state();
    assert!(state.pending.is_empty());
    assert_eq!(state.slots_alive, 0);
    assert!(state.chain_images.is_empty());
}

#[test]
fn test_degraded_present_rebuilds_next_frame() {
    let gpu = MockGpu::new(Completion::Immediate);
    let mut engine = common::engine(&gpu, 2);
    let mut content = TestContent::default();

    gpu.script_present(Scripted::Degraded);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Presented);
    assert_eq!(engine.cursor(), 1);
    assert!(engine.is_invalidated());

    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Discarded);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Presented);
    assert_eq!(gpu.state().builds, 2);

    engine.shutdown().unwrap();
}

#[test]
fn test_degraded_acquire_rebuilds_next_frame() {
    let gpu = MockGpu::new(Completion::Immediate);
    let mut engine = common::engine(&gpu, 2);
    let mut content = TestContent::default();

    // The degraded image is still drawn and presented.
    gpu.script_acquire(Scripted::Degraded);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Presented);
    assert_eq!(engine.cursor(), 1);
    assert!(engine.is_invalidated());
    assert_eq!(engine.state(), EngineState::Invalidated);
    assert_eq!(gpu.state().presented_images.len(), 1);

    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Discarded);
    assert_eq!(engine.cursor(), 1);
    assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Presented);
    assert_eq!(engine.cursor(), 0);

    assert_eq!(gpu.state().builds, 2);
    assert_eq!(engine.stats().rebuilds, 1);
    engine.shutdown().unwrap();
}

#[test]
fn test_degraded_tolerated_when_rebuild_disabled() {
    common::init_tracing();
    let gpu = MockGpu::new(Completion::Immediate);
    let options = EngineOptions {
        frames_in_flight: 2,
        rebuild_on_degraded: false,
    };
    let mut engine = PresentationEngine::new(gpu.backend(), options).unwrap();
    let mut content = TestContent::default();

    gpu.script_acquire(Scripted::Degraded);
    gpu.script_present(Scripted::Degraded);
    for _ in 0..3 {
        assert_eq!(engine.render_one_frame(&mut content).unwrap(), FrameStatus::Presented);
    }
    assert!(!engine.is_invalidated());
    assert_eq!(gpu.state().builds, 1);

    engine.shutdown().unwrap();
}

#[test]
fn test_unsupported_surface_fails_creation() {
    common::init_tracing();
    let gpu = MockGpu::new(Completion::Immediate);
    gpu.update(|s| s.surface_supported = false);

    let result = PresentationEngine::new(gpu.backend(), common::options(2));
    assert!(matches!(result, Err(EngineError::SurfaceUnsupported(_))));
    assert_eq!(gpu.state().slots_alive, 0);
}

#[test]
fn test_slot_failure_releases_partial_setup() {
    common::init_tracing();
    let gpu = MockGpu::new(Completion::Immediate);
    gpu.update(|s| s.fail_slot_at = Some(1));

    let result = PresentationEngine::new(gpu.backend(), common::options(3));
    assert!(matches!(result, Err(EngineError::SlotFailed(_))));

    let state = gpu.state();
    assert_eq!(state.slots_alive, 0);
    assert_eq!(state.slots_destroyed, 1);
    assert!(state.chain_images.is_empty());
}

#[test]
fn test_failed_submit_reports_submitting_state() {
    let gpu = MockGpu::new(Completion::Immediate);
    let mut engine = common::engine(&gpu, 2);
    let mut content = TestContent::default();

    gpu.update(|s| s.fail_submit = true);
    let result = engine.render_one_frame(&mut content);
    assert!(matches!(result, Err(EngineError::SubmitFailed(_))));
    assert_eq!(engine.state(), EngineState::Submitted);
    assert!(gpu.state().presented_images.is_empty());

    engine.shutdown().unwrap();
    assert_eq!(gpu.state().slots_alive, 0);
}

#[test]
fn test_failed_present_reports_presenting_state() {
    let gpu = MockGpu::new(Completion::Immediate);
    let mut engine = common::engine(&gpu, 2);
    let mut content = TestContent::default();

    gpu.update(|s| s.fail_present = true);
    let result = engine.render_one_frame(&mut content);
    assert!(matches!(result, Err(EngineError::PresentFailed(_))));
    assert_eq!(engine.state(), EngineState::Presenting);
    assert_eq!(gpu.state().submits, 1);
    assert_eq!(engine.cursor(), 0);

    engine.shutdown().unwrap();
}

#[test]
fn test_zero_frames_in_flight_rejected() {
    common::init_tracing();
    let gpu = MockGpu::new(Completion::Immediate);
    let result = PresentationEngine::new(gpu.backend(), common::options(0));
    assert!(matches!(result, Err(EngineError::SlotFailed(_))));
}

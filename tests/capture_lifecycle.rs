use anyhow::Result;
use boresight::overlay::capture::{CaptureStreamController, WindowHandle};
use boresight::overlay::display::DisplayDescriptor;
use boresight::overlay::error::CaptureError;
use boresight::overlay::geometry::Rect;
use boresight::overlay::platform::headless::SyntheticCaptureBackend;
use std::sync::Arc;

fn display(id: u64, x: f64) -> DisplayDescriptor {
    DisplayDescriptor::new(id, Rect::new(x, 0.0, 320.0, 200.0), id == 1)
}

#[test]
fn repeated_start_stop_leaves_no_open_sessions() -> Result<()> {
    let backend = SyntheticCaptureBackend::new();
    let mut controller = CaptureStreamController::new(Arc::new(backend.clone()), Vec::new());

    for cycle in 0..50 {
        let target = display(1 + cycle % 2, f64::from(cycle as u32 % 2) * 320.0);
        let mut stream = controller.start(&target)?;
        assert!(backend.open_sessions() <= 1);
        if cycle % 5 == 0 {
            assert!(stream.next().is_some_and(|frame| frame.is_ok()));
        }
        controller.stop();
        assert_eq!(backend.open_sessions(), 0, "session leaked on cycle {cycle}");
    }

    controller.stop();
    assert_eq!(backend.open_sessions(), 0);
    assert_eq!(backend.opened_total(), 50);
    Ok(())
}

#[test]
fn dropping_controller_releases_session() -> Result<()> {
    let backend = SyntheticCaptureBackend::new();
    {
        let mut controller = CaptureStreamController::new(
            Arc::new(backend.clone()),
            vec![WindowHandle(42)],
        );
        controller.start(&display(1, 0.0))?;
        assert_eq!(backend.open_sessions(), 1);
        assert_eq!(backend.last_excluded(), vec![WindowHandle(42)]);
    }
    assert_eq!(backend.open_sessions(), 0);
    Ok(())
}

#[test]
fn open_failure_leaves_controller_idle() {
    let backend = SyntheticCaptureBackend::new();
    backend.fail_next_open(CaptureError::PermissionDenied);
    let mut controller = CaptureStreamController::new(Arc::new(backend.clone()), Vec::new());

    let result = controller.start(&display(1, 0.0));
    assert!(matches!(result, Err(CaptureError::PermissionDenied)));
    assert!(!controller.is_active());
    assert_eq!(controller.last_error(), Some(&CaptureError::PermissionDenied));
    assert_eq!(backend.open_sessions(), 0);
}

#[test]
fn stream_failure_surfaces_once_through_poll() -> Result<()> {
    let backend = SyntheticCaptureBackend::new();
    backend.fail_after_frames(Some(2));
    let mut controller = CaptureStreamController::new(Arc::new(backend.clone()), Vec::new());

    let stream = controller.start(&display(1, 0.0))?;
    let items: Vec<_> = stream.collect();
    assert!(items.iter().filter(|item| item.is_err()).count() == 1);
    assert!(matches!(items.last(), Some(Err(CaptureError::Backend(_)))));

    let poll = controller.poll();
    assert!(matches!(poll.failure, Some(CaptureError::Backend(_))));
    assert!(!controller.is_active());
    assert_eq!(backend.open_sessions(), 0);
    assert!(controller.poll().failure.is_none());
    Ok(())
}

use crate::overlay::messages::{ExitReason, MainToOverlay, OverlayCommand, OverlayToMain};
use crate::overlay::settings::OverlaySettings;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerLifecycle {
    Starting,
    Active,
    ExitRequested,
    Exited,
}

/// What the application asked the overlay thread to do.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeRequest {
    UpdateSettings(OverlaySettings),
    Command(OverlayCommand),
}

/// Overlay-thread end of the application channels.
pub struct OverlayController {
    main_to_overlay_rx: Receiver<MainToOverlay>,
    overlay_to_main_tx: Sender<OverlayToMain>,
    lifecycle: ControllerLifecycle,
    exit_reason: Option<ExitReason>,
}

impl OverlayController {
    pub fn new(
        main_to_overlay_rx: Receiver<MainToOverlay>,
        overlay_to_main_tx: Sender<OverlayToMain>,
    ) -> Self {
        Self {
            main_to_overlay_rx,
            overlay_to_main_tx,
            lifecycle: ControllerLifecycle::Starting,
            exit_reason: None,
        }
    }

    pub fn lifecycle(&self) -> ControllerLifecycle {
        self.lifecycle
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.exit_reason
    }

    pub fn exit_requested(&self) -> bool {
        matches!(
            self.lifecycle,
            ControllerLifecycle::ExitRequested | ControllerLifecycle::Exited
        )
    }

    pub fn send(&self, message: OverlayToMain) {
        let _ = self.overlay_to_main_tx.send(message);
    }

    /// Handles every message already queued, without blocking.
    pub fn pump_runtime_messages<F>(&mut self, mut on_request: F)
    where
        F: FnMut(RuntimeRequest),
    {
        while !self.exit_requested() {
            match self.main_to_overlay_rx.try_recv() {
                Ok(message) => self.handle(message, &mut on_request),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.request_exit(ExitReason::Disconnected);
                    break;
                }
            }
        }
    }

    /// Waits up to `timeout` for the next message, then drains the queue.
    pub fn wait_and_pump<F>(&mut self, timeout: Duration, mut on_request: F)
    where
        F: FnMut(RuntimeRequest),
    {
        if self.exit_requested() {
            return;
        }
        match self.main_to_overlay_rx.recv_timeout(timeout) {
            Ok(message) => {
                self.handle(message, &mut on_request);
                self.pump_runtime_messages(on_request);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                self.request_exit(ExitReason::Disconnected);
            }
        }
    }

    pub fn mark_exited(&mut self) {
        self.lifecycle = ControllerLifecycle::Exited;
    }

    fn request_exit(&mut self, reason: ExitReason) {
        self.lifecycle = ControllerLifecycle::ExitRequested;
        self.exit_reason.get_or_insert(reason);
    }

    fn handle<F>(&mut self, message: MainToOverlay, on_request: &mut F)
    where
        F: FnMut(RuntimeRequest),
    {
        match message {
            MainToOverlay::Start => {
                self.lifecycle = ControllerLifecycle::Active;
                self.send(OverlayToMain::Started);
            }
            MainToOverlay::UpdateSettings(settings) => {
                on_request(RuntimeRequest::UpdateSettings(*settings));
                self.send(OverlayToMain::SettingsApplied);
            }
            MainToOverlay::Command(command) => on_request(RuntimeRequest::Command(command)),
            MainToOverlay::Stop => self.request_exit(ExitReason::Stopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ControllerLifecycle, OverlayController, RuntimeRequest};
    use crate::overlay::messages::{ExitReason, MainToOverlay, OverlayCommand, OverlayToMain};
    use crate::overlay::settings::OverlaySettings;
    use std::time::Duration;

    #[test]
    fn start_message_activates_and_acknowledges() {
        let (main_tx, main_rx) = std::sync::mpsc::channel::<MainToOverlay>();
        let (overlay_tx, overlay_rx) = std::sync::mpsc::channel::<OverlayToMain>();
        let mut controller = OverlayController::new(main_rx, overlay_tx);

        main_tx.send(MainToOverlay::Start).expect("start send");
        controller.pump_runtime_messages(|_| {});

        assert_eq!(controller.lifecycle(), ControllerLifecycle::Active);
        assert_eq!(overlay_rx.recv().expect("start ack"), OverlayToMain::Started);
    }

    #[test]
    fn update_settings_message_invokes_request_path() {
        let (main_tx, main_rx) = std::sync::mpsc::channel::<MainToOverlay>();
        let (overlay_tx, overlay_rx) = std::sync::mpsc::channel::<OverlayToMain>();
        let mut controller = OverlayController::new(main_rx, overlay_tx);
        let mut settings = OverlaySettings::default();
        settings.show_gap = false;

        main_tx
            .send(MainToOverlay::UpdateSettings(Box::new(settings.clone())))
            .expect("update settings send");

        let mut seen = Vec::new();
        controller.pump_runtime_messages(|request| seen.push(request));

        assert_eq!(seen, vec![RuntimeRequest::UpdateSettings(settings)]);
        assert_eq!(
            overlay_rx.recv().expect("settings ack"),
            OverlayToMain::SettingsApplied
        );
    }

    #[test]
    fn stop_ends_pumping_and_leaves_later_messages_queued() {
        let (main_tx, main_rx) = std::sync::mpsc::channel::<MainToOverlay>();
        let (overlay_tx, _overlay_rx) = std::sync::mpsc::channel::<OverlayToMain>();
        let mut controller = OverlayController::new(main_rx, overlay_tx);

        main_tx
            .send(MainToOverlay::Command(OverlayCommand::ToggleLock))
            .expect("command send");
        main_tx.send(MainToOverlay::Stop).expect("stop send");
        main_tx
            .send(MainToOverlay::Command(OverlayCommand::Hide))
            .expect("command send");

        let mut seen = Vec::new();
        controller.wait_and_pump(Duration::from_millis(50), |request| seen.push(request));

        assert_eq!(
            seen,
            vec![RuntimeRequest::Command(OverlayCommand::ToggleLock)]
        );
        assert!(controller.exit_requested());
        assert_eq!(controller.exit_reason(), Some(ExitReason::Stopped));
    }

    #[test]
    fn dropped_application_channel_requests_exit() {
        let (main_tx, main_rx) = std::sync::mpsc::channel::<MainToOverlay>();
        let (overlay_tx, _overlay_rx) = std::sync::mpsc::channel::<OverlayToMain>();
        let mut controller = OverlayController::new(main_rx, overlay_tx);
        drop(main_tx);

        controller.wait_and_pump(Duration::from_millis(10), |_| {});
        assert_eq!(controller.lifecycle(), ControllerLifecycle::ExitRequested);
        assert_eq!(controller.exit_reason(), Some(ExitReason::Disconnected));
    }
}

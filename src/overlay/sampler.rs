use crate::overlay::controller::{OverlayController, RuntimeRequest};
use crate::overlay::engine::Overlay;
use crate::overlay::messages::{ExitReason, MainToOverlay, OverlayCommand, OverlayToMain};
use crate::overlay::platform::OverlayPlatform;
use crate::overlay::settings::{OverlaySettings, MAX_SAMPLE_RATE_HZ, MIN_SAMPLE_RATE_HZ};
use crate::overlay::state::{can_transition, OverlayLifecycle};
use anyhow::{anyhow, Result};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long `stop` waits before warning that the overlay thread is slow to exit.
pub const OVERLAY_JOIN_WARN_AFTER: Duration = Duration::from_secs(2);

pub fn interval_for_hz(hz: u32) -> Duration {
    let hz = hz.clamp(MIN_SAMPLE_RATE_HZ, MAX_SAMPLE_RATE_HZ);
    Duration::from_nanos(1_000_000_000 / u64::from(hz))
}

/// Fixed-rate deadline generator. A late tick skips the deadlines it missed
/// instead of firing them back to back.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    next_deadline: Instant,
}

impl FramePacer {
    pub fn new(hz: u32, now: Instant) -> Self {
        let interval = interval_for_hz(hz);
        Self {
            interval,
            next_deadline: now + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Time left until the next deadline, zero once it has passed.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_deadline.saturating_duration_since(now)
    }

    pub fn set_rate(&mut self, hz: u32) {
        let interval = interval_for_hz(hz);
        if interval != self.interval {
            tracing::debug!(hz, "sampling rate changed");
            self.next_deadline = self.next_deadline - self.interval + interval;
            self.interval = interval;
        }
    }

    /// Moves the deadline past `now` by whole intervals. Returns how many
    /// deadlines were skipped because the tick ran late.
    pub fn advance(&mut self, now: Instant) -> u32 {
        let mut skipped = 0;
        self.next_deadline += self.interval;
        while self.next_deadline <= now {
            self.next_deadline += self.interval;
            skipped += 1;
        }
        skipped
    }
}

/// Application-side handle to the overlay thread.
pub struct OverlayRuntime {
    main_to_overlay_tx: Sender<MainToOverlay>,
    overlay_to_main_rx: Receiver<OverlayToMain>,
    handle: Option<JoinHandle<()>>,
    lifecycle: OverlayLifecycle,
}

/// Starts the overlay thread. `factory` runs on that thread and builds the
/// platform, so window handles never cross threads.
pub fn spawn_overlay<F>(settings: OverlaySettings, factory: F) -> Result<OverlayRuntime>
where
    F: FnOnce() -> Result<OverlayPlatform> + Send + 'static,
{
    let (main_to_overlay_tx, main_to_overlay_rx) = channel::<MainToOverlay>();
    let (overlay_to_main_tx, overlay_to_main_rx) = channel::<OverlayToMain>();

    let handle = thread::Builder::new()
        .name("boresight-overlay".to_string())
        .spawn(move || run_overlay_thread(settings, factory, main_to_overlay_rx, overlay_to_main_tx))
        .map_err(|err| anyhow!("failed to spawn overlay thread: {err}"))?;

    let runtime = OverlayRuntime {
        main_to_overlay_tx,
        overlay_to_main_rx,
        handle: Some(handle),
        lifecycle: OverlayLifecycle::Starting,
    };
    // A platform failure surfaces as `Exited { StartFailure }` instead.
    let _ = runtime.main_to_overlay_tx.send(MainToOverlay::Start);
    Ok(runtime)
}

fn run_overlay_thread<F>(
    settings: OverlaySettings,
    factory: F,
    main_to_overlay_rx: Receiver<MainToOverlay>,
    overlay_to_main_tx: Sender<OverlayToMain>,
) where
    F: FnOnce() -> Result<OverlayPlatform>,
{
    let platform = match factory() {
        Ok(platform) => platform,
        Err(err) => {
            tracing::error!(error = ?err, "failed to create overlay platform");
            let _ = overlay_to_main_tx.send(OverlayToMain::Exited {
                reason: ExitReason::StartFailure,
            });
            return;
        }
    };

    let mut controller = OverlayController::new(main_to_overlay_rx, overlay_to_main_tx);
    let mut overlay = Overlay::new(settings, platform);
    let mut pacer = FramePacer::new(overlay.refresh_hz(), Instant::now());
    tracing::debug!(interval = ?pacer.interval(), "overlay sampling loop started");

    loop {
        let mut now = Instant::now();
        while !controller.exit_requested() && now < pacer.next_deadline() {
            controller.wait_and_pump(pacer.remaining(now), |request| match request {
                RuntimeRequest::UpdateSettings(settings) => overlay.apply_settings(settings),
                RuntimeRequest::Command(command) => overlay.handle_command(command),
            });
            forward_events(&mut overlay, &controller);
            now = Instant::now();
        }
        if controller.exit_requested() {
            break;
        }

        let skipped = pacer.advance(now);
        if skipped > 0 {
            tracing::trace!(skipped, "sampling tick ran late");
        }
        overlay.pump_surface();
        overlay.tick(now);
        forward_events(&mut overlay, &controller);
        pacer.set_rate(overlay.refresh_hz());
    }

    let reason = controller.exit_reason().unwrap_or(ExitReason::Stopped);
    drop(overlay);
    controller.mark_exited();
    tracing::debug!(?reason, "overlay sampling loop stopped");
    controller.send(OverlayToMain::Exited { reason });
}

fn forward_events(overlay: &mut Overlay, controller: &OverlayController) {
    for event in overlay.drain_events() {
        controller.send(event);
    }
}

impl OverlayRuntime {
    pub fn lifecycle(&self) -> OverlayLifecycle {
        self.lifecycle
    }

    pub fn send(&self, message: MainToOverlay) -> Result<()> {
        self.main_to_overlay_tx
            .send(message)
            .map_err(|_| anyhow!("overlay thread is not running"))
    }

    pub fn command(&self, command: OverlayCommand) -> Result<()> {
        self.send(MainToOverlay::Command(command))
    }

    pub fn update_settings(&self, settings: OverlaySettings) -> Result<()> {
        self.send(MainToOverlay::UpdateSettings(Box::new(settings)))
    }

    pub fn try_recv(&mut self) -> Option<OverlayToMain> {
        match self.overlay_to_main_rx.try_recv() {
            Ok(message) => {
                self.observe(&message);
                Some(message)
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<OverlayToMain> {
        match self.overlay_to_main_rx.recv_timeout(timeout) {
            Ok(message) => {
                self.observe(&message);
                Some(message)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Asks the overlay thread to stop and waits until it has exited, so no
    /// overlay or capture code runs after this returns. Safe to call more than
    /// once; later calls return immediately.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.transition(OverlayLifecycle::Stopping);
        let _ = self.main_to_overlay_tx.send(MainToOverlay::Stop);
        join_overlay_thread(handle);
        self.transition(OverlayLifecycle::Stopped);
    }

    fn observe(&mut self, message: &OverlayToMain) {
        match message {
            OverlayToMain::Started => self.transition(OverlayLifecycle::Running),
            OverlayToMain::Exited { reason } => {
                tracing::debug!(?reason, "overlay thread exited");
                self.transition(OverlayLifecycle::Stopped);
            }
            _ => {}
        }
    }

    fn transition(&mut self, next: OverlayLifecycle) {
        if can_transition(self.lifecycle, next) {
            self.lifecycle = next;
        } else {
            tracing::debug!(from = ?self.lifecycle, to = ?next, "ignored overlay lifecycle transition");
        }
    }
}

impl Drop for OverlayRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

fn join_overlay_thread(handle: JoinHandle<()>) {
    let started = Instant::now();
    let mut warned = false;
    while !handle.is_finished() {
        if !warned && started.elapsed() >= OVERLAY_JOIN_WARN_AFTER {
            tracing::warn!(after = ?OVERLAY_JOIN_WARN_AFTER, "overlay thread slow to stop, still waiting");
            warned = true;
        }
        thread::sleep(JOIN_POLL_INTERVAL);
    }
    if handle.join().is_err() {
        tracing::error!("overlay thread panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_waits_for_a_slow_overlay_thread() {
        let delay = OVERLAY_JOIN_WARN_AFTER + Duration::from_millis(200);
        let mut runtime = spawn_overlay(OverlaySettings::default(), move || {
            thread::sleep(delay);
            Err(anyhow!("platform unavailable"))
        })
        .expect("spawn overlay");

        let started = Instant::now();
        runtime.stop();
        assert!(started.elapsed() + Duration::from_millis(50) >= delay);
        assert_eq!(runtime.lifecycle(), OverlayLifecycle::Stopped);
        // The thread has fully exited, so its final message is already queued.
        assert_eq!(
            runtime.try_recv(),
            Some(OverlayToMain::Exited {
                reason: ExitReason::StartFailure
            })
        );
    }

    #[test]
    fn interval_is_derived_from_rate() {
        assert_eq!(interval_for_hz(50), Duration::from_millis(20));
        assert_eq!(interval_for_hz(0), interval_for_hz(MIN_SAMPLE_RATE_HZ));
    }

    #[test]
    fn on_time_ticks_advance_by_one_interval() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(50, start);
        assert_eq!(pacer.next_deadline(), start + Duration::from_millis(20));

        assert_eq!(pacer.advance(start + Duration::from_millis(20)), 0);
        assert_eq!(pacer.next_deadline(), start + Duration::from_millis(40));
    }

    #[test]
    fn late_tick_skips_missed_deadlines_without_burst() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(50, start);

        let late = start + Duration::from_millis(95);
        assert_eq!(pacer.advance(late), 3);
        assert_eq!(pacer.next_deadline(), start + Duration::from_millis(100));
        assert!(pacer.next_deadline() > late);
        assert_eq!(pacer.remaining(late), Duration::from_millis(5));
    }

    #[test]
    fn rate_change_keeps_phase_of_current_frame() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(50, start);
        pacer.set_rate(100);
        assert_eq!(pacer.interval(), Duration::from_millis(10));
        assert_eq!(pacer.next_deadline(), start + Duration::from_millis(10));
    }
}

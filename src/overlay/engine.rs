//! The overlay's per-tick step and command handling.
//!
//! [`Overlay`] owns every piece of overlay state and is driven from a single
//! thread: [`Overlay::tick`] once per sampling interval and
//! [`Overlay::handle_command`] / [`Overlay::apply_settings`] for application
//! requests in between. Messages for the application are queued and drained
//! with [`Overlay::drain_events`].

use crate::overlay::capture::CaptureStreamController;
use crate::overlay::display::{
    display_contains_point, DisplayDescriptor, DisplayRegistry, EDGE_TOLERANCE,
};
use crate::overlay::error::CaptureError;
use crate::overlay::geometry::{flip_y, Point, Size};
use crate::overlay::interaction::{InteractionEffects, InteractionState, PresenceChange};
use crate::overlay::layers::{LayerInputs, LayerStack};
use crate::overlay::magnifier::{self, MagnifierView};
use crate::overlay::messages::{OverlayCommand, OverlayStatus, OverlayToMain};
use crate::overlay::platform::{ClipboardSink, OverlayPlatform, OverlaySurface, PointerSource};
use crate::overlay::settings::OverlaySettings;
use crate::overlay::transform::{
    CoordinateReadout, DisplayChange, DisplaySelectionMode, TransformState,
};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The pointer position could not be read.
    NoPointer,
    Hidden,
    Locked,
    /// No display could host the overlay; the previous frame stays up.
    NoDisplay,
    Rendered(DisplayChange),
}

pub struct Overlay {
    settings: OverlaySettings,
    displays: Box<dyn DisplayRegistry>,
    pointer: Box<dyn PointerSource>,
    surface: Box<dyn OverlaySurface>,
    clipboard: Box<dyn ClipboardSink>,
    transform: TransformState,
    interaction: InteractionState,
    capture: CaptureStreamController,
    layers: LayerStack,
    display_buffer: Vec<DisplayDescriptor>,
    magnifier: Option<Arc<MagnifierView>>,
    readout: Option<CoordinateReadout>,
    opacity: f64,
    last_status: Option<OverlayStatus>,
    events: Vec<OverlayToMain>,
}

impl Overlay {
    pub fn new(mut settings: OverlaySettings, platform: OverlayPlatform) -> Self {
        settings.sanitize();
        let OverlayPlatform {
            displays,
            pointer,
            mut surface,
            capture,
            clipboard,
            mut excluded_windows,
        } = platform;

        if let Some(own) = surface.window_handle() {
            excluded_windows.push(own);
        }
        let transform = TransformState::new(settings.display_mode, settings.origin);
        let interaction =
            InteractionState::new(settings.overlay_flags(), settings.presence_policy());

        surface.set_click_through(true);
        surface.set_opacity(1.0);
        surface.show();

        let mut overlay = Self {
            capture: CaptureStreamController::new(capture, excluded_windows),
            settings,
            displays,
            pointer,
            surface,
            clipboard,
            transform,
            interaction,
            layers: LayerStack::new(),
            display_buffer: Vec::new(),
            magnifier: None,
            readout: None,
            opacity: 1.0,
            last_status: None,
            events: Vec::new(),
        };
        overlay.publish_status();
        overlay
    }

    pub fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn transform(&self) -> &TransformState {
        &self.transform
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn readout(&self) -> Option<CoordinateReadout> {
        self.readout
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_active()
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Sampling rate for the active display, falling back to the configured rate.
    pub fn refresh_hz(&self) -> u32 {
        self.transform
            .active_display()
            .and_then(|display| display.refresh_hz)
            .filter(|hz| *hz > 0)
            .unwrap_or(self.settings.sample_rate_hz)
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, OverlayToMain> {
        self.events.drain(..)
    }

    pub fn pump_surface(&mut self) {
        self.surface.pump();
    }

    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let Some(global) = self.pointer.current_global_pointer() else {
            return TickOutcome::NoPointer;
        };
        if !self.interaction.is_enabled() {
            return TickOutcome::Hidden;
        }
        if self.interaction.is_locked() {
            return TickOutcome::Locked;
        }

        self.displays.enumerate(&mut self.display_buffer);
        let axis = self.displays.y_axis();
        let update = match self.transform.sample(&self.display_buffer, axis, global) {
            Ok(update) => update,
            Err(err) => {
                tracing::debug!(error = %err, x = global.x, y = global.y, "skipping overlay frame");
                return TickOutcome::NoDisplay;
            }
        };
        let display = update.sample.active_display;

        if update.change != DisplayChange::Unchanged {
            let id = display.id;
            tracing::debug!(display = %id, change = ?update.change, "overlay moved to display");
            self.surface.resize(display.bounds);
            self.magnifier = None;
            if self.capture.is_active() {
                self.start_capture(&display);
            }
        }

        let target_opacity = match self.transform.mode() {
            DisplaySelectionMode::FixedDisplay(_)
                if !display_contains_point(&display, global, EDGE_TOLERANCE) =>
            {
                0.0
            }
            _ => 1.0,
        };
        if target_opacity != self.opacity {
            self.opacity = target_opacity;
            self.surface.set_opacity(target_opacity);
        }

        let local = update.sample.local_point;
        let screen = display.bounds.size();
        let mouse_down = self.pointer.primary_button_down();
        let origin_local = flip_y(self.transform.origin(), screen.height);
        let effects = self.interaction.update_pointer(local, origin_local, mouse_down);
        if effects.origin_moved {
            self.transform.place_origin_at_local(local);
        }
        self.apply_effects(effects, Some(&display));

        let flags = self.interaction.flags();
        self.readout = if flags.origin {
            self.transform.readout().map(CoordinateReadout::Relative)
        } else {
            Some(CoordinateReadout::Absolute(local))
        };

        let poll = self.capture.poll();
        if let Some(error) = poll.failure {
            self.report_capture_failure(error);
        }
        self.magnifier = if self.interaction.magnifier_visible() {
            Some(magnifier::refresh_view(
                self.magnifier.take(),
                poll.frame.as_deref(),
                flip_y(local, screen.height),
                screen,
                now,
            ))
        } else {
            None
        };

        self.render(local, screen);
        self.publish_status();
        TickOutcome::Rendered(update.change)
    }

    fn render(&mut self, local: Point, screen: Size) {
        let inputs = LayerInputs {
            screen,
            pointer_local: local,
            origin_view: self.transform.origin(),
            flags: self.interaction.flags(),
            readout: self.readout,
            appearance: &self.settings.appearance,
            magnifier: self.magnifier.as_ref(),
        };
        self.layers.rebuild(&inputs, self.surface.text_measure());
        self.surface.present(&self.layers);
    }

    /// Redraws at the last sampled pointer position. Used when state changes
    /// while ticks are not rendering, e.g. under the lock.
    fn render_last_sample(&mut self) {
        if let Some(sample) = self.transform.last_sample() {
            self.render(sample.local_point, sample.screen_size());
        }
    }

    pub fn handle_command(&mut self, command: OverlayCommand) {
        tracing::debug!(?command, "overlay command");
        match command {
            OverlayCommand::ToggleVisibility => {
                let (change, effects) = self.interaction.toggle_presence();
                self.apply_presence(change, effects);
            }
            OverlayCommand::Show => {
                let change = self.interaction.show();
                self.apply_presence(change, InteractionEffects::default());
            }
            OverlayCommand::Hide => {
                let (change, effects) = self.interaction.hide();
                self.apply_presence(change, effects);
            }
            OverlayCommand::ToggleLock => {
                let (locked, effects) = self.interaction.toggle_lock();
                self.apply_effects(effects, None);
                if effects.layers_changed || effects.drag_ended {
                    self.render_last_sample();
                }
                self.settings.locked = locked;
                self.notice(if locked {
                    "BoreSight locked"
                } else {
                    "BoreSight unlocked"
                });
                self.publish_preferences();
            }
            OverlayCommand::ToggleCrosshairs => {
                self.interaction.toggle_combined();
                self.settings
                    .set_layer_visibility(self.interaction.persistent_layers());
                self.publish_preferences();
            }
            OverlayCommand::ToggleCoordinateText => {
                self.settings.show_coordinate_text = self.interaction.toggle_coordinate_text();
                self.publish_preferences();
            }
            OverlayCommand::ToggleOrigin => {
                let effects = self.interaction.toggle_origin();
                self.apply_effects(effects, None);
                self.settings.show_origin = self.interaction.flags().origin;
                self.publish_preferences();
            }
            OverlayCommand::CopyReadout => self.copy_readout(),
            OverlayCommand::SetDisplayMode(mode) => {
                self.transform.set_mode(mode);
                self.settings.display_mode = mode;
                self.publish_preferences();
            }
            OverlayCommand::SetKeepLockedOnHide(keep) => {
                self.interaction.set_keep_locked_on_hide(keep);
                self.settings.keep_locked_on_hide = keep;
                self.settings.locked = self.interaction.is_locked();
                self.publish_preferences();
            }
            OverlayCommand::SetHideWhenSettingsOpen(hide) => {
                self.interaction.set_hide_when_settings_open(hide);
                self.settings.hide_when_settings_open = hide;
                self.publish_preferences();
            }
            OverlayCommand::SettingsOpened => {
                let (change, effects) = self.interaction.settings_opened();
                self.apply_presence(change, effects);
            }
            OverlayCommand::SettingsClosed => {
                let change = self.interaction.settings_closed();
                self.apply_presence(change, InteractionEffects::default());
            }
            OverlayCommand::ResetAppearance => {
                self.settings.reset_appearance();
                self.publish_preferences();
            }
        }
        self.publish_status();
    }

    /// Adopts settings pushed by the application. Nothing is echoed back as a
    /// preference change.
    pub fn apply_settings(&mut self, mut settings: OverlaySettings) {
        settings.sanitize();
        self.interaction.set_layers(settings.layer_visibility());
        self.interaction.set_coordinate_text(settings.show_coordinate_text);
        let effects = self.interaction.set_origin_shown(settings.show_origin);
        let lock_effects = self.interaction.set_locked(settings.locked);
        self.interaction
            .set_keep_locked_on_hide(settings.keep_locked_on_hide);
        self.interaction
            .set_hide_when_settings_open(settings.hide_when_settings_open);
        self.transform.set_mode(settings.display_mode);
        self.settings = settings;
        self.apply_effects(effects, None);
        self.apply_effects(lock_effects, None);
        self.publish_status();
    }

    fn apply_presence(&mut self, change: PresenceChange, effects: InteractionEffects) {
        match change {
            PresenceChange::Hidden => {
                self.capture.stop();
                self.magnifier = None;
                self.surface.hide();
                tracing::debug!("overlay hidden");
            }
            PresenceChange::Shown => {
                self.surface.show();
                tracing::debug!("overlay shown");
            }
            PresenceChange::Unchanged => {}
        }
        self.apply_effects(effects, None);
        if self.settings.locked != self.interaction.is_locked() {
            self.settings.locked = self.interaction.is_locked();
            self.publish_preferences();
        }
    }

    fn apply_effects(&mut self, effects: InteractionEffects, display: Option<&DisplayDescriptor>) {
        if let Some(visible) = effects.cursor_visible {
            self.surface.set_cursor_visible(visible);
        }
        if let Some(click_through) = effects.click_through {
            self.surface.set_click_through(click_through);
        }
        if effects.drag_started {
            if let Some(display) = display {
                let id = display.id;
                tracing::debug!(display = %id, "origin drag started");
                self.start_capture(display);
            }
        }
        if effects.drag_ended {
            self.capture.stop();
            self.magnifier = None;
            self.settings.origin = Some(self.transform.origin());
            tracing::debug!(origin = ?self.transform.origin(), "origin placed");
            self.publish_preferences();
        }
    }

    fn start_capture(&mut self, display: &DisplayDescriptor) {
        if let Err(error) = self.capture.start(display) {
            self.report_capture_failure(error);
        }
    }

    fn report_capture_failure(&mut self, error: CaptureError) {
        tracing::warn!(error = %error, "magnifier capture unavailable");
        self.notice(&format!("Screen capture unavailable: {error}"));
        self.events.push(OverlayToMain::CaptureFailed(error));
    }

    fn copy_readout(&mut self) {
        let Some(readout) = self.readout else {
            self.notice("No coordinates to copy yet");
            return;
        };
        let text = readout.clipboard_text();
        match self.clipboard.set_text(&text) {
            Ok(()) => {
                tracing::debug!(%text, "readout copied");
                self.notice("Coordinates copied to clipboard");
                self.events.push(OverlayToMain::ReadoutCopied(text));
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to copy readout");
                self.notice("Could not copy coordinates");
            }
        }
    }

    fn notice(&mut self, message: &str) {
        if self.settings.show_alerts {
            self.events.push(OverlayToMain::Notice(message.to_string()));
        }
    }

    fn publish_preferences(&mut self) {
        self.events
            .push(OverlayToMain::PreferencesChanged(Box::new(self.settings.clone())));
    }

    fn publish_status(&mut self) {
        let flags = self.interaction.flags();
        let status = OverlayStatus {
            visible: self.interaction.is_enabled(),
            locked: flags.locked,
            dragging: flags.dragging,
            display: self.transform.active_display().map(|display| display.id),
        };
        if self.last_status != Some(status) {
            self.last_status = Some(status);
            self.events.push(OverlayToMain::StatusChanged(status));
        }
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        self.capture.stop();
    }
}

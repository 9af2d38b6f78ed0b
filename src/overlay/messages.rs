use crate::overlay::display::DisplayId;
use crate::overlay::error::CaptureError;
use crate::overlay::settings::OverlaySettings;
use crate::overlay::transform::DisplaySelectionMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayCommand {
    ToggleVisibility,
    Show,
    Hide,
    ToggleLock,
    /// Combined hide/restore of crosshair, border and gap.
    ToggleCrosshairs,
    ToggleCoordinateText,
    ToggleOrigin,
    CopyReadout,
    SetDisplayMode(DisplaySelectionMode),
    SetKeepLockedOnHide(bool),
    SetHideWhenSettingsOpen(bool),
    SettingsOpened,
    SettingsClosed,
    ResetAppearance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `Stop` was received.
    Stopped,
    /// The application side of the channel went away.
    Disconnected,
    /// The platform could not be created on the overlay thread.
    StartFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MainToOverlay {
    Start,
    Command(OverlayCommand),
    UpdateSettings(Box<OverlaySettings>),
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlayStatus {
    pub visible: bool,
    pub locked: bool,
    pub dragging: bool,
    pub display: Option<DisplayId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayToMain {
    Started,
    SettingsApplied,
    StatusChanged(OverlayStatus),
    /// Preferences changed from the overlay side and should be persisted.
    PreferencesChanged(Box<OverlaySettings>),
    /// User-facing notice, only sent while alerts are enabled.
    Notice(String),
    ReadoutCopied(String),
    CaptureFailed(CaptureError),
    Exited { reason: ExitReason },
}

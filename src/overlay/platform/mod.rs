//! Seams between the overlay engine and the operating system.

use crate::overlay::capture::{CaptureBackend, WindowHandle};
use crate::overlay::display::DisplayRegistry;
use crate::overlay::geometry::{Point, Rect};
use crate::overlay::layers::{ApproximateTextMeasure, LayerStack, TextMeasure};
use anyhow::Result;
use std::sync::Arc;

pub mod headless;
#[cfg(windows)]
pub mod win32;

pub trait PointerSource {
    /// Pointer position in virtual-desktop coordinates. Must not block.
    fn current_global_pointer(&self) -> Option<Point>;

    fn primary_button_down(&self) -> bool;
}

/// The full-screen window the overlay is drawn into.
pub trait OverlaySurface {
    /// Moves and sizes the surface to exactly `bounds` (virtual-desktop space).
    fn resize(&mut self, bounds: Rect);

    fn set_opacity(&mut self, opacity: f64);

    fn show(&mut self);

    fn hide(&mut self);

    /// While click-through, pointer input reaches the windows underneath.
    fn set_click_through(&mut self, click_through: bool);

    fn set_cursor_visible(&mut self, visible: bool);

    /// Hands the current frame to the renderer.
    fn present(&mut self, layers: &LayerStack);

    /// Processes pending window-system events.
    fn pump(&mut self) {}

    /// Window to leave out of screen capture.
    fn window_handle(&self) -> Option<WindowHandle> {
        None
    }

    fn text_measure(&self) -> &dyn TextMeasure {
        &ApproximateTextMeasure
    }
}

pub trait ClipboardSink {
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// Everything the overlay needs from the host, built on the overlay thread.
pub struct OverlayPlatform {
    pub displays: Box<dyn DisplayRegistry>,
    pub pointer: Box<dyn PointerSource>,
    pub surface: Box<dyn OverlaySurface>,
    pub capture: Arc<dyn CaptureBackend>,
    pub clipboard: Box<dyn ClipboardSink>,
    /// Other application windows to leave out of capture.
    pub excluded_windows: Vec<WindowHandle>,
}

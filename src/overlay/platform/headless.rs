//! In-process platform with scripted input and recorded output.
//!
//! Every type here is a cheap handle over shared state, so a test can keep a
//! clone after the platform has moved onto the overlay thread and keep
//! driving or inspecting it from there.

use crate::overlay::capture::{CaptureBackend, CaptureSource, WindowHandle};
use crate::overlay::display::{DisplayDescriptor, DisplayRegistry, VerticalAxis};
use crate::overlay::error::CaptureError;
use crate::overlay::geometry::{Point, Rect};
use crate::overlay::layers::{LayerKind, LayerStack};
use crate::overlay::platform::{ClipboardSink, OverlayPlatform, OverlaySurface, PointerSource};
use anyhow::Result;
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

const SYNTHETIC_FRAME_INTERVAL: Duration = Duration::from_millis(16);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
pub struct StaticDisplays {
    displays: Arc<Mutex<Vec<DisplayDescriptor>>>,
    axis: VerticalAxis,
}

impl StaticDisplays {
    pub fn new(displays: Vec<DisplayDescriptor>) -> Self {
        Self {
            displays: Arc::new(Mutex::new(displays)),
            axis: VerticalAxis::Down,
        }
    }

    pub fn with_axis(mut self, axis: VerticalAxis) -> Self {
        self.axis = axis;
        self
    }

    /// Replaces the layout, as a monitor hot-plug or resolution change would.
    pub fn set_displays(&self, displays: Vec<DisplayDescriptor>) {
        *lock(&self.displays) = displays;
    }
}

impl DisplayRegistry for StaticDisplays {
    fn enumerate(&self, out: &mut Vec<DisplayDescriptor>) {
        out.clear();
        out.extend_from_slice(&lock(&self.displays));
    }

    fn y_axis(&self) -> VerticalAxis {
        self.axis
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PointerState {
    position: Option<Point>,
    button_down: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedPointer {
    state: Arc<Mutex<PointerState>>,
}

impl ScriptedPointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&self, x: f64, y: f64) {
        lock(&self.state).position = Some(Point::new(x, y));
    }

    pub fn press(&self) {
        lock(&self.state).button_down = true;
    }

    pub fn release(&self) {
        lock(&self.state).button_down = false;
    }

    /// Makes the pointer unavailable, as when the session is locked.
    pub fn clear(&self) {
        lock(&self.state).position = None;
    }
}

impl PointerSource for ScriptedPointer {
    fn current_global_pointer(&self) -> Option<Point> {
        lock(&self.state).position
    }

    fn primary_button_down(&self) -> bool {
        lock(&self.state).button_down
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceEvent {
    Resized(Rect),
    Opacity(f64),
    Shown,
    Hidden,
    ClickThrough(bool),
    CursorVisible(bool),
}

#[derive(Debug, Clone)]
pub struct SurfaceLog {
    pub events: Vec<SurfaceEvent>,
    pub bounds: Option<Rect>,
    pub opacity: f64,
    pub visible: bool,
    pub click_through: bool,
    pub cursor_visible: bool,
    pub presented: usize,
    pub last_frame: LayerStack,
}

impl Default for SurfaceLog {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            bounds: None,
            opacity: 1.0,
            visible: false,
            click_through: true,
            cursor_visible: true,
            presented: 0,
            last_frame: LayerStack::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    log: Arc<Mutex<SurfaceLog>>,
    handle: Option<WindowHandle>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window_handle(mut self, handle: WindowHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn snapshot(&self) -> SurfaceLog {
        lock(&self.log).clone()
    }

    pub fn last_kinds(&self) -> Vec<LayerKind> {
        lock(&self.log).last_frame.kinds()
    }

    pub fn take_events(&self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut lock(&self.log).events)
    }

    fn record(&self, event: SurfaceEvent) {
        lock(&self.log).events.push(event);
    }
}

impl OverlaySurface for RecordingSurface {
    fn resize(&mut self, bounds: Rect) {
        lock(&self.log).bounds = Some(bounds);
        self.record(SurfaceEvent::Resized(bounds));
    }

    fn set_opacity(&mut self, opacity: f64) {
        lock(&self.log).opacity = opacity;
        self.record(SurfaceEvent::Opacity(opacity));
    }

    fn show(&mut self) {
        lock(&self.log).visible = true;
        self.record(SurfaceEvent::Shown);
    }

    fn hide(&mut self) {
        lock(&self.log).visible = false;
        self.record(SurfaceEvent::Hidden);
    }

    fn set_click_through(&mut self, click_through: bool) {
        lock(&self.log).click_through = click_through;
        self.record(SurfaceEvent::ClickThrough(click_through));
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        lock(&self.log).cursor_visible = visible;
        self.record(SurfaceEvent::CursorVisible(visible));
    }

    fn present(&mut self, layers: &LayerStack) {
        let mut log = lock(&self.log);
        log.presented += 1;
        log.last_frame.clone_from(layers);
    }

    fn window_handle(&self) -> Option<WindowHandle> {
        self.handle
    }
}

#[derive(Debug, Default)]
struct CaptureScript {
    fail_next_open: Option<CaptureError>,
    fail_after_frames: Option<u32>,
    last_excluded: Vec<WindowHandle>,
    last_target: Option<DisplayDescriptor>,
}

/// Capture backend that produces a generated frame per display and counts
/// open sessions.
#[derive(Debug, Clone, Default)]
pub struct SyntheticCaptureBackend {
    open_sessions: Arc<AtomicUsize>,
    opened_total: Arc<AtomicUsize>,
    script: Arc<Mutex<CaptureScript>>,
}

impl SyntheticCaptureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions opened and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub fn opened_total(&self) -> usize {
        self.opened_total.load(Ordering::SeqCst)
    }

    pub fn fail_next_open(&self, error: CaptureError) {
        lock(&self.script).fail_next_open = Some(error);
    }

    /// Sessions opened from now on fail after delivering `frames` frames.
    pub fn fail_after_frames(&self, frames: Option<u32>) {
        lock(&self.script).fail_after_frames = frames;
    }

    pub fn last_excluded(&self) -> Vec<WindowHandle> {
        lock(&self.script).last_excluded.clone()
    }

    pub fn last_target(&self) -> Option<DisplayDescriptor> {
        lock(&self.script).last_target
    }
}

impl CaptureBackend for SyntheticCaptureBackend {
    fn open(
        &self,
        display: &DisplayDescriptor,
        excluding: &[WindowHandle],
    ) -> Result<Box<dyn CaptureSource>, CaptureError> {
        let fail_after = {
            let mut script = lock(&self.script);
            if let Some(error) = script.fail_next_open.take() {
                return Err(error);
            }
            script.last_excluded = excluding.to_vec();
            script.last_target = Some(*display);
            script.fail_after_frames
        };
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticSource {
            open_sessions: Arc::clone(&self.open_sessions),
            frame: checkerboard(display),
            delivered: 0,
            fail_after,
            closed: false,
        }))
    }
}

struct SyntheticSource {
    open_sessions: Arc<AtomicUsize>,
    frame: RgbaImage,
    delivered: u32,
    fail_after: Option<u32>,
    closed: bool,
}

impl CaptureSource for SyntheticSource {
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<RgbaImage>, CaptureError> {
        if self.fail_after.is_some_and(|limit| self.delivered >= limit) {
            return Err(CaptureError::backend("synthetic stream ended"));
        }
        thread::sleep(timeout.min(SYNTHETIC_FRAME_INTERVAL));
        self.delivered += 1;
        Ok(Some(self.frame.clone()))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

fn checkerboard(display: &DisplayDescriptor) -> RgbaImage {
    let width = display.bounds.width.max(1.0) as u32;
    let height = display.bounds.height.max(1.0) as u32;
    RgbaImage::from_fn(width, height, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgba([40, 40, 40, 255])
        } else {
            Rgba([220, 220, 220, 255])
        }
    })
}

#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Option<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        lock(&self.contents).clone()
    }
}

impl ClipboardSink for MemoryClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        *lock(&self.contents) = Some(text.to_string());
        Ok(())
    }
}

/// Handles onto a headless platform that stay usable after the platform
/// itself has been handed to the overlay.
#[derive(Debug, Clone)]
pub struct HeadlessHandles {
    pub displays: StaticDisplays,
    pub pointer: ScriptedPointer,
    pub surface: RecordingSurface,
    pub capture: SyntheticCaptureBackend,
    pub clipboard: MemoryClipboard,
}

impl HeadlessHandles {
    pub fn new(displays: Vec<DisplayDescriptor>) -> Self {
        Self {
            displays: StaticDisplays::new(displays),
            pointer: ScriptedPointer::new(),
            surface: RecordingSurface::new().with_window_handle(WindowHandle(1)),
            capture: SyntheticCaptureBackend::new(),
            clipboard: MemoryClipboard::new(),
        }
    }

    pub fn platform(&self) -> OverlayPlatform {
        OverlayPlatform {
            displays: Box::new(self.displays.clone()),
            pointer: Box::new(self.pointer.clone()),
            surface: Box::new(self.surface.clone()),
            capture: Arc::new(self.capture.clone()),
            clipboard: Box::new(self.clipboard.clone()),
            excluded_windows: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_sessions_are_counted_until_closed() {
        let backend = SyntheticCaptureBackend::new();
        let display = DisplayDescriptor::new(1, Rect::new(0.0, 0.0, 64.0, 32.0), true);

        let mut source = backend
            .open(&display, &[WindowHandle(9)])
            .expect("open synthetic session");
        assert_eq!(backend.open_sessions(), 1);
        assert_eq!(backend.last_excluded(), vec![WindowHandle(9)]);

        let frame = source
            .next_frame(Duration::from_millis(1))
            .expect("frame")
            .expect("frame present");
        assert_eq!(frame.dimensions(), (64, 32));

        source.close();
        source.close();
        assert_eq!(backend.open_sessions(), 0);
    }

    #[test]
    fn scripted_open_failure_is_returned_once() {
        let backend = SyntheticCaptureBackend::new();
        let display = DisplayDescriptor::new(1, Rect::new(0.0, 0.0, 64.0, 32.0), true);
        backend.fail_next_open(CaptureError::PermissionDenied);

        assert!(matches!(
            backend.open(&display, &[]),
            Err(CaptureError::PermissionDenied)
        ));
        assert!(backend.open(&display, &[]).is_ok());
    }

    #[test]
    fn displays_can_be_replaced_live() {
        let displays = StaticDisplays::new(vec![DisplayDescriptor::new(
            1,
            Rect::new(0.0, 0.0, 800.0, 600.0),
            true,
        )]);
        let handle = displays.clone();
        handle.set_displays(Vec::new());
        assert!(displays.list_displays().is_empty());
        assert_eq!(displays.primary_display(), None);
    }
}

use crate::overlay::geometry::{Point, Rect};
use std::fmt;

/// Extra margin, in virtual-desktop units, accepted around display bounds so
/// that a pointer resting on a shared edge still resolves to a display.
pub const EDGE_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayId(pub u64);

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "display#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayDescriptor {
    pub id: DisplayId,
    /// Bounds in the shared virtual-desktop space.
    pub bounds: Rect,
    pub is_primary: bool,
    /// Vertical refresh rate when the platform reports one.
    pub refresh_hz: Option<u32>,
}

impl DisplayDescriptor {
    pub fn new(id: u64, bounds: Rect, is_primary: bool) -> Self {
        Self {
            id: DisplayId(id),
            bounds,
            is_primary,
            refresh_hz: None,
        }
    }

    pub fn with_refresh_hz(mut self, hz: u32) -> Self {
        self.refresh_hz = Some(hz);
        self
    }
}

/// Direction of the Y axis in the virtual desktop space a registry reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalAxis {
    /// Origin at the top-left of the primary display (Windows, X11).
    #[default]
    Down,
    /// Origin at the bottom-left of the primary display (Cocoa).
    Up,
}

/// Source of the current display layout.
///
/// Implementations are queried every sampling tick, so `enumerate` must be
/// cheap and must not block.
pub trait DisplayRegistry {
    /// Replaces the contents of `out` with the current displays, in the
    /// platform's enumeration order.
    fn enumerate(&self, out: &mut Vec<DisplayDescriptor>);

    fn y_axis(&self) -> VerticalAxis {
        VerticalAxis::Down
    }

    fn list_displays(&self) -> Vec<DisplayDescriptor> {
        let mut displays = Vec::new();
        self.enumerate(&mut displays);
        displays
    }

    fn primary_display(&self) -> Option<DisplayDescriptor> {
        primary_of(&self.list_displays())
    }
}

pub fn display_contains_point(display: &DisplayDescriptor, point: Point, tolerance: f64) -> bool {
    display
        .bounds
        .inset_by(-tolerance, -tolerance)
        .contains(point)
}

/// First display, in enumeration order, whose bounds grown by `tolerance`
/// contain `point`.
pub fn select_display_for_point(
    displays: &[DisplayDescriptor],
    point: Point,
    tolerance: f64,
) -> Option<DisplayDescriptor> {
    displays
        .iter()
        .copied()
        .find(|display| display_contains_point(display, point, tolerance))
}

pub fn primary_of(displays: &[DisplayDescriptor]) -> Option<DisplayDescriptor> {
    displays.iter().copied().find(|display| display.is_primary)
}

/// Expresses a virtual-desktop point in the display's local space
/// (bottom-left origin, Y up).
pub fn global_to_local(display: &DisplayDescriptor, point: Point, axis: VerticalAxis) -> Point {
    let bounds = display.bounds;
    match axis {
        VerticalAxis::Down => Point::new(point.x - bounds.x, bounds.max_y() - point.y),
        VerticalAxis::Up => Point::new(point.x - bounds.x, point.y - bounds.y),
    }
}

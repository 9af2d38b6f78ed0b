use crate::overlay::display::{
    global_to_local, primary_of, select_display_for_point, DisplayDescriptor, VerticalAxis,
    EDGE_TOLERANCE,
};
use crate::overlay::error::TransformError;
use crate::overlay::geometry::{classify_quadrant, flip_y, polar_angle, Point, Quadrant, Rect, Size};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum DisplaySelectionMode {
    #[default]
    FollowCursor,
    FixedDisplay(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub active_display: DisplayDescriptor,
    /// Pointer position in the active display's local space (bottom-left, Y up).
    pub local_point: Point,
}

impl PointerSample {
    pub fn screen_size(&self) -> Size {
        self.active_display.bounds.size()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedReadout {
    pub dx: f64,
    pub dy: f64,
    /// Angle from the origin to the pointer in `[0, 2π)`.
    pub theta: f64,
    pub quadrant: Quadrant,
    /// Pointer and origin coincide; `theta` is reported as zero.
    pub degenerate: bool,
}

impl DerivedReadout {
    pub fn theta_degrees(&self) -> f64 {
        self.theta.to_degrees()
    }

    pub fn distance(&self) -> f64 {
        self.dx.hypot(self.dy)
    }
}

/// Relative polar readout of `sample` against `origin`.
///
/// `origin` is expressed in view space (top-left, Y down) of the same display,
/// which is where the marker is drawn and dragged.
pub fn compute_readout(sample: &PointerSample, origin: Point) -> DerivedReadout {
    let screen_height = sample.active_display.bounds.height;
    let local = sample.local_point;
    let dy = -(screen_height - origin.y - local.y);
    let dx = local.x - origin.x;
    let quadrant = classify_quadrant(local, flip_y(origin, screen_height));
    DerivedReadout {
        dx,
        dy,
        theta: polar_angle(dx, dy, quadrant),
        quadrant,
        degenerate: dx == 0.0 && dy == 0.0,
    }
}

/// What the coordinate text layer shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateReadout {
    Relative(DerivedReadout),
    Absolute(Point),
}

impl CoordinateReadout {
    pub fn clipboard_text(&self) -> String {
        match self {
            Self::Relative(readout) => format!(
                "(x: {:.2}, y: {:.2}, θ: {:.2})",
                readout.dx,
                readout.dy,
                readout.theta_degrees()
            ),
            Self::Absolute(point) => format!("(x: {:.2}, y: {:.2})", point.x, point.y),
        }
    }
}

impl fmt::Display for CoordinateReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relative(readout) => write!(
                f,
                "x: {:.0}  y: {:.0}\nθ: {:.2}",
                readout.dx.round(),
                readout.dy.round(),
                readout.theta_degrees()
            ),
            Self::Absolute(point) => write!(f, "x: {:.0}  y: {:.0}", point.x.round(), point.y.round()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayChange {
    Unchanged,
    /// A different display became active (or the first one was resolved).
    Switched,
    /// Same display, new bounds.
    Resized,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleUpdate {
    pub sample: PointerSample,
    pub change: DisplayChange,
}

#[derive(Debug, Clone)]
pub struct TransformState {
    mode: DisplaySelectionMode,
    active: Option<DisplayDescriptor>,
    last_sample: Option<PointerSample>,
    origin: Point,
    pending_origin: Option<Point>,
}

impl TransformState {
    /// `stored_origin` is the persisted origin; it is applied once the first
    /// display is known, and only if it lies on that display.
    pub fn new(mode: DisplaySelectionMode, stored_origin: Option<Point>) -> Self {
        Self {
            mode,
            active: None,
            last_sample: None,
            origin: Point::default(),
            pending_origin: stored_origin,
        }
    }

    pub fn mode(&self) -> DisplaySelectionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DisplaySelectionMode) {
        self.mode = mode;
    }

    pub fn active_display(&self) -> Option<DisplayDescriptor> {
        self.active
    }

    pub fn last_sample(&self) -> Option<PointerSample> {
        self.last_sample
    }

    pub fn screen_size(&self) -> Option<Size> {
        self.active.map(|display| display.bounds.size())
    }

    /// Origin in view space of the active display.
    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    /// Sets the origin from a point in local space, the way a drag does.
    pub fn place_origin_at_local(&mut self, local: Point) {
        if let Some(size) = self.screen_size() {
            self.origin = flip_y(local, size.height);
        }
    }

    pub fn reset_origin_to_center(&mut self) {
        if let Some(display) = self.active {
            self.origin = view_center(&display);
        }
    }

    pub fn readout(&self) -> Option<DerivedReadout> {
        self.last_sample
            .map(|sample| compute_readout(&sample, self.origin))
    }

    pub fn resolve_display(
        &self,
        displays: &[DisplayDescriptor],
        global: Point,
    ) -> Result<DisplayDescriptor, TransformError> {
        let selected = match self.mode {
            DisplaySelectionMode::FollowCursor => {
                select_display_for_point(displays, global, EDGE_TOLERANCE)
            }
            DisplaySelectionMode::FixedDisplay(index) => displays.get(index).copied(),
        };
        selected
            .or_else(|| primary_of(displays))
            .ok_or(TransformError::NoDisplayAvailable)
    }

    /// Resolves the active display for `global`, converts the pointer into its
    /// local space and updates the origin when the display changed.
    pub fn sample(
        &mut self,
        displays: &[DisplayDescriptor],
        axis: VerticalAxis,
        global: Point,
    ) -> Result<SampleUpdate, TransformError> {
        let display = self.resolve_display(displays, global)?;
        let change = match self.active {
            None => DisplayChange::Switched,
            Some(previous) if previous.id != display.id => DisplayChange::Switched,
            Some(previous) if previous.bounds != display.bounds => DisplayChange::Resized,
            Some(_) => DisplayChange::Unchanged,
        };

        match change {
            DisplayChange::Switched => {
                let center = view_center(&display);
                self.origin = match self.pending_origin.take() {
                    Some(stored) if is_on_screen(stored, display.bounds.size()) => stored,
                    _ => center,
                };
            }
            DisplayChange::Resized => {
                if !is_on_screen(self.origin, display.bounds.size()) {
                    self.origin = view_center(&display);
                }
            }
            DisplayChange::Unchanged => {}
        }
        self.active = Some(display);

        let local = clamp_to_tolerance(global_to_local(&display, global, axis), &display);
        let sample = PointerSample {
            active_display: display,
            local_point: local,
        };
        self.last_sample = Some(sample);
        Ok(SampleUpdate { sample, change })
    }
}

fn view_center(display: &DisplayDescriptor) -> Point {
    Point::new(display.bounds.width / 2.0, display.bounds.height / 2.0)
}

pub fn is_on_screen(point: Point, screen: Size) -> bool {
    point.x >= 0.0 && point.x <= screen.width && point.y >= 0.0 && point.y <= screen.height
}

fn clamp_to_tolerance(local: Point, display: &DisplayDescriptor) -> Point {
    Rect::new(0.0, 0.0, display.bounds.width, display.bounds.height)
        .inset_by(-EDGE_TOLERANCE, -EDGE_TOLERANCE)
        .clamp_point(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::display::DisplayId;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn square_display() -> DisplayDescriptor {
        DisplayDescriptor::new(1, Rect::new(0.0, 0.0, 1000.0, 1000.0), true)
    }

    fn sample_at(local: Point) -> PointerSample {
        PointerSample {
            active_display: square_display(),
            local_point: local,
        }
    }

    #[test]
    fn readout_matches_reference_scenario() {
        let readout = compute_readout(&sample_at(Point::new(600.0, 600.0)), Point::new(500.0, 500.0));
        assert_eq!(readout.dx, 100.0);
        assert_eq!(readout.dy, 100.0);
        assert_eq!(readout.quadrant, Quadrant::First);
        assert!((readout.theta - FRAC_PI_4).abs() < 1e-12);
        assert!((readout.theta_degrees() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn readout_angles_for_axis_aligned_pointers() {
        // Origin (500, 300) in view space sits at (500, 700) in local space.
        let origin = Point::new(500.0, 300.0);
        let above = compute_readout(&sample_at(Point::new(500.0, 900.0)), origin);
        let below = compute_readout(&sample_at(Point::new(500.0, 100.0)), origin);
        let right = compute_readout(&sample_at(Point::new(800.0, 700.0)), origin);
        let left = compute_readout(&sample_at(Point::new(100.0, 700.0)), origin);
        assert_eq!(above.theta, FRAC_PI_2);
        assert_eq!(below.theta, 3.0 * FRAC_PI_2);
        assert_eq!(right.theta, 0.0);
        assert_eq!(left.theta, PI);
        assert_eq!((above.dx, above.dy), (0.0, 200.0));
        assert_eq!((left.dx, left.dy), (-400.0, 0.0));
    }

    #[test]
    fn readout_reconstructs_offsets_in_every_quadrant() {
        let origin = Point::new(400.0, 400.0);
        let origin_local = flip_y(origin, 1000.0);
        for (px, py) in [(650.0, 900.0), (120.0, 870.0), (30.0, 10.0), (999.0, 2.0)] {
            let readout = compute_readout(&sample_at(Point::new(px, py)), origin);
            assert_eq!(readout.dx, px - origin_local.x);
            assert_eq!(readout.dy, py - origin_local.y);
            assert!(readout.theta >= 0.0 && readout.theta < std::f64::consts::TAU);
        }
    }

    #[test]
    fn coincident_pointer_is_degenerate_but_finite() {
        let readout = compute_readout(&sample_at(Point::new(500.0, 500.0)), Point::new(500.0, 500.0));
        assert!(readout.degenerate);
        assert_eq!(readout.theta, 0.0);
    }

    #[test]
    fn first_sample_applies_stored_origin_only_when_on_screen() {
        let displays = [square_display()];
        let mut kept = TransformState::new(
            DisplaySelectionMode::FollowCursor,
            Some(Point::new(120.0, 80.0)),
        );
        kept.sample(&displays, VerticalAxis::Down, Point::new(10.0, 10.0))
            .expect("sample");
        assert_eq!(kept.origin(), Point::new(120.0, 80.0));

        let mut reset = TransformState::new(
            DisplaySelectionMode::FollowCursor,
            Some(Point::new(4000.0, 80.0)),
        );
        reset
            .sample(&displays, VerticalAxis::Down, Point::new(10.0, 10.0))
            .expect("sample");
        assert_eq!(reset.origin(), Point::new(500.0, 500.0));
    }

    #[test]
    fn fixed_mode_falls_back_to_primary_for_missing_index() {
        let displays = [
            DisplayDescriptor::new(1, Rect::new(0.0, 0.0, 800.0, 600.0), false),
            DisplayDescriptor::new(2, Rect::new(800.0, 0.0, 800.0, 600.0), true),
        ];
        let state = TransformState::new(DisplaySelectionMode::FixedDisplay(5), None);
        let display = state
            .resolve_display(&displays, Point::new(10.0, 10.0))
            .expect("primary fallback");
        assert_eq!(display.id, DisplayId(2));
    }

    #[test]
    fn no_display_and_no_primary_is_reported() {
        let displays = [DisplayDescriptor::new(1, Rect::new(0.0, 0.0, 800.0, 600.0), false)];
        let mut state = TransformState::new(DisplaySelectionMode::FollowCursor, None);
        assert_eq!(
            state.sample(&displays, VerticalAxis::Down, Point::new(5000.0, 10.0)),
            Err(TransformError::NoDisplayAvailable)
        );
        assert_eq!(
            state.sample(&[], VerticalAxis::Down, Point::new(0.0, 0.0)),
            Err(TransformError::NoDisplayAvailable)
        );
    }

    #[test]
    fn resize_keeps_on_screen_origin_and_resets_off_screen_origin() {
        let mut state = TransformState::new(DisplaySelectionMode::FixedDisplay(0), None);
        let big = [DisplayDescriptor::new(1, Rect::new(0.0, 0.0, 2000.0, 1000.0), true)];
        state.sample(&big, VerticalAxis::Down, Point::new(1.0, 1.0)).expect("sample");
        state.set_origin(Point::new(300.0, 200.0));

        let smaller = [DisplayDescriptor::new(1, Rect::new(0.0, 0.0, 1600.0, 900.0), true)];
        let update = state
            .sample(&smaller, VerticalAxis::Down, Point::new(1.0, 1.0))
            .expect("sample");
        assert_eq!(update.change, DisplayChange::Resized);
        assert_eq!(state.origin(), Point::new(300.0, 200.0));

        state.set_origin(Point::new(1500.0, 850.0));
        let tiny = [DisplayDescriptor::new(1, Rect::new(0.0, 0.0, 1024.0, 768.0), true)];
        state.sample(&tiny, VerticalAxis::Down, Point::new(1.0, 1.0)).expect("sample");
        assert_eq!(state.origin(), Point::new(512.0, 384.0));
    }

    #[test]
    fn local_point_stays_within_tolerance_of_active_display() {
        let displays = [DisplayDescriptor::new(1, Rect::new(0.0, 0.0, 800.0, 600.0), true)];
        let mut state = TransformState::new(DisplaySelectionMode::FixedDisplay(0), None);
        let update = state
            .sample(&displays, VerticalAxis::Down, Point::new(4000.0, -300.0))
            .expect("sample");
        assert_eq!(update.sample.local_point, Point::new(801.0, 601.0));
    }

    #[test]
    fn readout_text_formats_match_overlay_and_clipboard() {
        let readout = compute_readout(&sample_at(Point::new(600.0, 600.0)), Point::new(500.0, 500.0));
        let relative = CoordinateReadout::Relative(readout);
        assert_eq!(relative.clipboard_text(), "(x: 100.00, y: 100.00, θ: 45.00)");
        assert_eq!(relative.to_string(), "x: 100  y: 100\nθ: 45.00");
        let absolute = CoordinateReadout::Absolute(Point::new(12.4, 7.5));
        assert_eq!(absolute.clipboard_text(), "(x: 12.40, y: 7.50)");
        assert_eq!(absolute.to_string(), "x: 12  y: 8");
    }
}

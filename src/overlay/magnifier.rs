//! Magnified crop of the captured display around the pointer.
//!
//! All positions are in view space (top-left origin, Y down) of the active
//! display. The captured frame may be larger than the display in points when
//! the display is HiDPI; the crop is taken in frame pixels and scaled back.

use crate::overlay::capture::Frame;
use crate::overlay::geometry::{Point, Rect, Size};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::sync::Arc;
use std::time::Instant;

pub const MAGNIFICATION: f64 = 3.0;
pub const MAGNIFIER_SIZE: Size = Size::new(120.0, 60.0);
/// Size of the placeholder shown while no usable frame exists.
pub const PLACEHOLDER_SIZE: Size = Size::new(120.0, 120.0);
/// Vertical distance between the pointer and the magnifier centre.
pub const MAGNIFIER_LIFT: f64 = 75.0;

#[derive(Debug, Clone, PartialEq)]
pub enum MagnifierContent {
    /// Magnified pixels, `MAGNIFICATION` times the source crop.
    Pixels(RgbaImage),
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MagnifierView {
    /// Pointer the view was built for, in view space.
    pub pointer: Point,
    /// Centre of the magnifier in view space.
    pub center: Point,
    pub size: Size,
    pub content: MagnifierContent,
    /// Sequence of the frame the pixels came from.
    pub frame_sequence: Option<u64>,
}

/// Size of the area, in display points, that fills the magnifier.
pub fn source_size() -> Size {
    Size::new(
        MAGNIFIER_SIZE.width / MAGNIFICATION,
        MAGNIFIER_SIZE.height / MAGNIFICATION,
    )
}

/// Centre of a magnifier of `size` shown above `pointer`, kept on screen.
pub fn magnifier_center(pointer: Point, screen: Size, size: Size) -> Point {
    Rect::new(0.0, 0.0, screen.width, screen.height)
        .clamp_box_center(pointer.offset(0.0, -MAGNIFIER_LIFT), size)
}

/// Crops the source area around `pointer` out of `frame` and scales it up.
///
/// Returns `None` when the frame is empty or the display has no area.
pub fn magnify(frame: &RgbaImage, pointer: Point, display: Size) -> Option<RgbaImage> {
    if frame.width() == 0 || frame.height() == 0 || display.width <= 0.0 || display.height <= 0.0
    {
        return None;
    }
    let scale_x = f64::from(frame.width()) / display.width;
    let scale_y = f64::from(frame.height()) / display.height;

    let source = source_size();
    let crop_w = ((source.width * scale_x).round() as u32).clamp(1, frame.width());
    let crop_h = ((source.height * scale_y).round() as u32).clamp(1, frame.height());

    let bounds = Rect::new(0.0, 0.0, f64::from(frame.width()), f64::from(frame.height()));
    let center = bounds.clamp_box_center(
        Point::new(pointer.x * scale_x, pointer.y * scale_y),
        Size::new(f64::from(crop_w), f64::from(crop_h)),
    );
    let left = (center.x - f64::from(crop_w) / 2.0).floor().max(0.0) as u32;
    let top = (center.y - f64::from(crop_h) / 2.0).floor().max(0.0) as u32;
    let left = left.min(frame.width() - crop_w);
    let top = top.min(frame.height() - crop_h);

    let crop = imageops::crop_imm(frame, left, top, crop_w, crop_h).to_image();
    let out_w = (f64::from(crop_w) * MAGNIFICATION).round() as u32;
    let out_h = (f64::from(crop_h) * MAGNIFICATION).round() as u32;
    Some(imageops::resize(&crop, out_w, out_h, FilterType::Nearest))
}

/// Builds the magnifier for this tick. Missing, stale or unusable frames
/// produce the placeholder.
pub fn build_view(
    frame: Option<&Frame>,
    pointer: Point,
    display: Size,
    now: Instant,
) -> MagnifierView {
    let pixels = frame
        .filter(|frame| !frame.is_stale(now))
        .and_then(|frame| magnify(&frame.image, pointer, display).map(|img| (img, frame.sequence)));

    match pixels {
        Some((image, sequence)) => MagnifierView {
            pointer,
            center: magnifier_center(pointer, display, MAGNIFIER_SIZE),
            size: MAGNIFIER_SIZE,
            content: MagnifierContent::Pixels(image),
            frame_sequence: Some(sequence),
        },
        None => MagnifierView {
            pointer,
            center: magnifier_center(pointer, display, PLACEHOLDER_SIZE),
            size: PLACEHOLDER_SIZE,
            content: MagnifierContent::Placeholder,
            frame_sequence: None,
        },
    }
}

impl MagnifierView {
    /// True when a rebuild for `pointer` and `frame` would produce this view.
    pub fn is_current(&self, frame: Option<&Frame>, pointer: Point, now: Instant) -> bool {
        let usable = frame
            .filter(|frame| !frame.is_stale(now))
            .map(|frame| frame.sequence);
        self.pointer == pointer && self.frame_sequence == usable
    }
}

/// Like [`build_view`], but hands back `previous` untouched while neither the
/// pointer nor the usable frame changed.
pub fn refresh_view(
    previous: Option<Arc<MagnifierView>>,
    frame: Option<&Frame>,
    pointer: Point,
    display: Size,
    now: Instant,
) -> Arc<MagnifierView> {
    match previous {
        Some(view) if view.is_current(frame, pointer, now) => view,
        _ => Arc::new(build_view(frame, pointer, display, now)),
    }
}

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle anchored at its minimum corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_center(center: Point, size: Size) -> Self {
        Self::new(
            center.x - size.width / 2.0,
            center.y - size.height / 2.0,
            size.width,
            size.height,
        )
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Half-open containment: the minimum edges are inside, the maximum edges are not.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.max_x() && point.y >= self.y && point.y < self.max_y()
    }

    /// Shrinks the rectangle by `dx`/`dy` on every side. Negative values grow it.
    pub fn inset_by(&self, dx: f64, dy: f64) -> Self {
        Self::new(
            self.x + dx,
            self.y + dy,
            (self.width - 2.0 * dx).max(0.0),
            (self.height - 2.0 * dy).max(0.0),
        )
    }

    pub fn clamp_point(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(self.x, self.max_x()),
            point.y.clamp(self.y, self.max_y()),
        )
    }

    /// Moves `center` so that a box of `size` centred on it stays inside `self`.
    ///
    /// Boxes larger than the rectangle are pinned to its minimum edge.
    pub fn clamp_box_center(&self, center: Point, size: Size) -> Point {
        Point::new(
            clamp_axis(center.x, size.width, self.x, self.max_x()),
            clamp_axis(center.y, size.height, self.y, self.max_y()),
        )
    }
}

fn clamp_axis(center: f64, extent: f64, min: f64, max: f64) -> f64 {
    let half = extent / 2.0;
    if center - half < min {
        min + half
    } else if center + half > max {
        max - half
    } else {
        center
    }
}

/// Converts between a top-left/Y-down point and a bottom-left/Y-up point inside
/// an area of the given height. The conversion is its own inverse.
pub fn flip_y(point: Point, height: f64) -> Point {
    Point::new(point.x, height - point.y)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    First,
    Second,
    Third,
    Fourth,
}

/// Classifies `point` relative to `base` in a Y-up space.
///
/// Points on either axis through `base` are reported as [`Quadrant::First`].
pub fn classify_quadrant(point: Point, base: Point) -> Quadrant {
    let above = point.y > base.y;
    let below = point.y < base.y;
    let right = point.x > base.x;
    let left = point.x < base.x;
    match (above, below, right, left) {
        (true, _, true, _) => Quadrant::First,
        (true, _, _, true) => Quadrant::Second,
        (_, true, _, true) => Quadrant::Third,
        (_, true, true, _) => Quadrant::Fourth,
        _ => Quadrant::First,
    }
}

/// Angle of the vector `(dx, dy)` in `[0, 2π)`, built from `atan(dy/dx)` and
/// the quadrant of the vector.
///
/// Axis-aligned vectors never divide by zero: straight up is `π/2`, straight
/// down `3π/2`, right `0` and left `π`. The zero vector yields `0`.
pub fn polar_angle(dx: f64, dy: f64, quadrant: Quadrant) -> f64 {
    let theta = if dx == 0.0 {
        if dy > 0.0 {
            FRAC_PI_2
        } else if dy < 0.0 {
            3.0 * FRAC_PI_2
        } else {
            0.0
        }
    } else if dy == 0.0 {
        if dx < 0.0 {
            PI
        } else {
            0.0
        }
    } else {
        let raw = (dy / dx).atan();
        match quadrant {
            Quadrant::First => raw,
            Quadrant::Second | Quadrant::Third => raw + PI,
            Quadrant::Fourth => raw + TAU,
        }
    };
    normalize_angle(theta)
}

pub fn normalize_angle(theta: f64) -> f64 {
    let wrapped = theta.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_is_half_open() {
        let rect = Rect::new(0.0, 0.0, 1920.0, 1080.0);
        assert!(rect.contains(Point::new(0.0, 0.0)));
        assert!(rect.contains(Point::new(1919.5, 1079.5)));
        assert!(!rect.contains(Point::new(1920.0, 10.0)));
        assert!(!rect.contains(Point::new(10.0, 1080.0)));
    }

    #[test]
    fn negative_inset_grows_by_one_unit_each_side() {
        let rect = Rect::new(1920.0, 0.0, 1280.0, 1024.0).inset_by(-1.0, -1.0);
        assert_eq!(rect, Rect::new(1919.0, -1.0, 1282.0, 1026.0));
        assert!(rect.contains(Point::new(1919.5, -0.5)));
    }

    #[test]
    fn box_center_is_pulled_back_inside_bounds() {
        let screen = Rect::new(0.0, 0.0, 1000.0, 800.0);
        let size = Size::new(120.0, 60.0);
        assert_eq!(
            screen.clamp_box_center(Point::new(10.0, 790.0), size),
            Point::new(60.0, 770.0)
        );
        assert_eq!(
            screen.clamp_box_center(Point::new(995.0, 5.0), size),
            Point::new(940.0, 30.0)
        );
        assert_eq!(
            screen.clamp_box_center(Point::new(500.0, 400.0), size),
            Point::new(500.0, 400.0)
        );
    }

    #[test]
    fn quadrants_follow_y_up_convention() {
        let base = Point::new(0.0, 0.0);
        assert_eq!(classify_quadrant(Point::new(1.0, 1.0), base), Quadrant::First);
        assert_eq!(classify_quadrant(Point::new(-1.0, 1.0), base), Quadrant::Second);
        assert_eq!(classify_quadrant(Point::new(-1.0, -1.0), base), Quadrant::Third);
        assert_eq!(classify_quadrant(Point::new(1.0, -1.0), base), Quadrant::Fourth);
        assert_eq!(classify_quadrant(Point::new(0.0, -5.0), base), Quadrant::First);
        assert_eq!(classify_quadrant(Point::new(-5.0, 0.0), base), Quadrant::First);
    }

    #[test]
    fn polar_angle_covers_every_quadrant() {
        let eps = 1e-12;
        let q = |dx: f64, dy: f64| {
            polar_angle(dx, dy, classify_quadrant(Point::new(dx, dy), Point::default()))
        };
        assert!((q(1.0, 1.0) - PI / 4.0).abs() < eps);
        assert!((q(-1.0, 1.0) - 3.0 * PI / 4.0).abs() < eps);
        assert!((q(-1.0, -1.0) - 5.0 * PI / 4.0).abs() < eps);
        assert!((q(1.0, -1.0) - 7.0 * PI / 4.0).abs() < eps);
    }

    #[test]
    fn polar_angle_never_divides_by_zero_on_axes() {
        assert_eq!(polar_angle(0.0, 3.0, Quadrant::First), FRAC_PI_2);
        assert_eq!(polar_angle(0.0, -3.0, Quadrant::First), 3.0 * FRAC_PI_2);
        assert_eq!(polar_angle(3.0, 0.0, Quadrant::First), 0.0);
        assert_eq!(polar_angle(-3.0, 0.0, Quadrant::First), PI);
        assert_eq!(polar_angle(0.0, 0.0, Quadrant::First), 0.0);
    }

    #[test]
    fn flip_y_is_an_involution() {
        let p = Point::new(12.0, 300.0);
        assert_eq!(flip_y(flip_y(p, 1080.0), 1080.0), p);
        assert_eq!(flip_y(p, 1080.0), Point::new(12.0, 780.0));
    }
}

use crate::overlay::geometry::Point;
use crate::overlay::interaction::{LayerVisibility, OverlayFlags, PresencePolicy};
use crate::overlay::transform::DisplaySelectionMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const MIN_SAMPLE_RATE_HZ: u32 = 1;
pub const MAX_SAMPLE_RATE_HZ: u32 = 240;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverlayColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl OverlayColor {
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);
    pub const RED: Self = Self::rgba(255, 0, 0, 255);
    pub const BLUE: Self = Self::rgba(0, 122, 255, 255);
    pub const GRAY: Self = Self::rgba(142, 142, 147, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Same colour with its alpha scaled by `opacity` in `[0, 1]`.
    pub fn with_opacity(self, opacity: f64) -> Self {
        let alpha = (f64::from(self.a) * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a: alpha, ..self }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GapShape {
    /// Plain cut-out with no outline.
    #[default]
    None,
    Square,
    Circle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextCorner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrosshairStyle {
    pub color: OverlayColor,
    pub width: f64,
    pub transparency: f64,
}

impl Default for CrosshairStyle {
    fn default() -> Self {
        Self {
            color: OverlayColor::RED,
            width: 2.0,
            transparency: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BorderStyle {
    pub color: OverlayColor,
    pub thickness: f64,
    pub transparency: f64,
}

impl Default for BorderStyle {
    fn default() -> Self {
        Self {
            color: OverlayColor::WHITE,
            thickness: 1.0,
            transparency: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GapStyle {
    pub shape: GapShape,
    pub size: f64,
    pub border_thickness: f64,
    pub border_color: OverlayColor,
    pub border_transparency: f64,
}

impl Default for GapStyle {
    fn default() -> Self {
        Self {
            shape: GapShape::None,
            size: 30.0,
            border_thickness: 1.0,
            border_color: OverlayColor::WHITE,
            border_transparency: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoordinateTextStyle {
    pub corner: TextCorner,
    pub offset: f64,
    /// Added to the base font size of 12.
    pub zoom: f64,
}

impl Default for CoordinateTextStyle {
    fn default() -> Self {
        Self {
            corner: TextCorner::BottomRight,
            offset: 0.0,
            zoom: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppearanceSettings {
    pub crosshair: CrosshairStyle,
    pub border: BorderStyle,
    pub gap: GapStyle,
    pub coordinate_text: CoordinateTextStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlaySettings {
    #[serde(default)]
    pub display_mode: DisplaySelectionMode,
    /// Last placed origin in view space of the display it was placed on.
    #[serde(default)]
    pub origin: Option<Point>,
    #[serde(default = "default_true")]
    pub show_crosshair: bool,
    #[serde(default = "default_true")]
    pub show_border: bool,
    #[serde(default = "default_true")]
    pub show_gap: bool,
    #[serde(default = "default_true")]
    pub show_coordinate_text: bool,
    #[serde(default = "default_true")]
    pub show_origin: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_true")]
    pub keep_locked_on_hide: bool,
    #[serde(default = "default_true")]
    pub hide_when_settings_open: bool,
    #[serde(default = "default_true")]
    pub show_alerts: bool,
    #[serde(default)]
    pub appearance: AppearanceSettings,
    /// Sampling rate used when the active display does not report a refresh rate.
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_sample_rate_hz() -> u32 {
    60
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            display_mode: DisplaySelectionMode::FollowCursor,
            origin: None,
            show_crosshair: true,
            show_border: true,
            show_gap: true,
            show_coordinate_text: true,
            show_origin: true,
            locked: false,
            keep_locked_on_hide: true,
            hide_when_settings_open: true,
            show_alerts: true,
            appearance: AppearanceSettings::default(),
            sample_rate_hz: default_sample_rate_hz(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl OverlaySettings {
    pub fn layer_visibility(&self) -> LayerVisibility {
        LayerVisibility {
            crosshair: self.show_crosshair,
            border: self.show_border,
            gap: self.show_gap,
        }
    }

    pub fn set_layer_visibility(&mut self, layers: LayerVisibility) {
        self.show_crosshair = layers.crosshair;
        self.show_border = layers.border;
        self.show_gap = layers.gap;
    }

    pub fn overlay_flags(&self) -> OverlayFlags {
        OverlayFlags {
            layers: self.layer_visibility(),
            coordinate_text: self.show_coordinate_text,
            origin: self.show_origin,
            locked: self.locked,
            ..OverlayFlags::default()
        }
    }

    pub fn presence_policy(&self) -> PresencePolicy {
        PresencePolicy {
            keep_locked_on_hide: self.keep_locked_on_hide,
            hide_when_settings_open: self.hide_when_settings_open,
        }
    }

    /// Restores every style to its default. Visibility flags and policies are kept.
    pub fn reset_appearance(&mut self) {
        self.appearance = AppearanceSettings::default();
    }

    /// Pulls out-of-range values back into range. Returns whether anything changed.
    pub fn sanitize(&mut self) -> bool {
        let before = self.clone();
        self.sample_rate_hz = self
            .sample_rate_hz
            .clamp(MIN_SAMPLE_RATE_HZ, MAX_SAMPLE_RATE_HZ);

        let appearance = &mut self.appearance;
        appearance.crosshair.width = non_negative(appearance.crosshair.width);
        appearance.crosshair.transparency = unit(appearance.crosshair.transparency);
        appearance.border.thickness = non_negative(appearance.border.thickness);
        appearance.border.transparency = unit(appearance.border.transparency);
        appearance.gap.size = non_negative(appearance.gap.size);
        appearance.gap.border_thickness = non_negative(appearance.gap.border_thickness);
        appearance.gap.border_transparency = unit(appearance.gap.border_transparency);
        appearance.coordinate_text.offset = non_negative(appearance.coordinate_text.offset);
        appearance.coordinate_text.zoom = non_negative(appearance.coordinate_text.zoom);

        if let Some(origin) = self.origin {
            if !(origin.x.is_finite() && origin.y.is_finite()) {
                self.origin = None;
            }
        }
        *self != before
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

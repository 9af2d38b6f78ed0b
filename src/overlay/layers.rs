//! Drawable description of one overlay frame.
//!
//! The engine rebuilds a [`LayerStack`] every tick; a renderer walks it in
//! order (first entry at the bottom). Every coordinate is in view space of the
//! active display: top-left origin, Y down.

use crate::overlay::display::DisplayDescriptor;
use crate::overlay::geometry::{flip_y, Point, Rect, Size};
use crate::overlay::interaction::{
    OverlayFlags, ORIGIN_MARKER_DIAMETER, ORIGIN_MARKER_HOVER_DIAMETER,
};
use crate::overlay::magnifier::MagnifierView;
use crate::overlay::settings::{
    AppearanceSettings, CoordinateTextStyle, GapShape, OverlayColor, TextCorner,
};
use crate::overlay::transform::{compute_readout, CoordinateReadout, PointerSample};
use std::fmt::Write;
use std::sync::Arc;

pub const BASE_FONT_SIZE: f64 = 12.0;
/// Padding between the readout text and its background, per side.
pub const TEXT_PADDING: Size = Size::new(15.0, 10.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: OverlayColor,
    pub width: f64,
    /// Edge length (square) or diameter (circle) the stroke is drawn at.
    pub extent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePair {
    pub vertical: Rect,
    pub horizontal: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    /// Outline around both crosshair lines. The inner `cutout_width` is left clear.
    Border {
        lines: LinePair,
        color: OverlayColor,
        cutout_width: f64,
    },
    Crosshair {
        lines: LinePair,
        color: OverlayColor,
    },
    /// Clears the area around the pointer out of the line layers.
    Gap {
        center: Point,
        shape: GapShape,
        cutout: f64,
        outline: Option<Stroke>,
        border_ring: Option<Stroke>,
    },
    CoordinateText {
        center: Point,
        text: String,
        font_size: f64,
        /// Measured size including padding.
        size: Size,
    },
    OriginMarker {
        center: Point,
        diameter: f64,
        hovered: bool,
        fill: OverlayColor,
        stroke: OverlayColor,
        stroke_width: f64,
    },
    Magnifier(Arc<MagnifierView>),
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Border { .. } => LayerKind::Border,
            Self::Crosshair { .. } => LayerKind::Crosshair,
            Self::Gap { .. } => LayerKind::Gap,
            Self::CoordinateText { .. } => LayerKind::CoordinateText,
            Self::OriginMarker { .. } => LayerKind::OriginMarker,
            Self::Magnifier(_) => LayerKind::Magnifier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Border,
    Crosshair,
    Gap,
    CoordinateText,
    OriginMarker,
    Magnifier,
}

/// Size the renderer will give a block of text at a font size, without padding.
pub trait TextMeasure {
    fn measure(&self, text: &str, font_size: f64) -> Size;
}

/// Monospace estimate used when no renderer is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateTextMeasure;

impl TextMeasure for ApproximateTextMeasure {
    fn measure(&self, text: &str, font_size: f64) -> Size {
        let widest = text.lines().map(|line| line.chars().count()).max().unwrap_or(0);
        let lines = text.lines().count().max(1);
        Size::new(
            widest as f64 * font_size * 0.6,
            lines as f64 * font_size * 1.2,
        )
    }
}

/// Everything one frame's layers depend on.
#[derive(Debug, Clone, Copy)]
pub struct LayerInputs<'a> {
    pub screen: Size,
    pub pointer_local: Point,
    pub origin_view: Point,
    pub flags: OverlayFlags,
    pub readout: Option<CoordinateReadout>,
    pub appearance: &'a AppearanceSettings,
    pub magnifier: Option<&'a Arc<MagnifierView>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn find(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.kind() == kind)
    }

    pub fn kinds(&self) -> Vec<LayerKind> {
        self.layers.iter().map(Layer::kind).collect()
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    /// Replaces the contents with the layers for `inputs`, reusing the allocation.
    pub fn rebuild(&mut self, inputs: &LayerInputs<'_>, measure: &dyn TextMeasure) {
        let text_buffer = self.take_text_buffer();
        self.layers.clear();
        let appearance = inputs.appearance;
        let screen = inputs.screen;
        let pointer_view = Point::new(
            inputs.pointer_local.x.round(),
            (screen.height - inputs.pointer_local.y).round(),
        );
        let layers = inputs.flags.layers;

        if layers.border {
            let border = appearance.border;
            let crosshair_width = appearance.crosshair.width;
            self.layers.push(Layer::Border {
                lines: line_pair(pointer_view, screen, crosshair_width + 2.0 * border.thickness),
                color: border.color.with_opacity(border.transparency),
                cutout_width: crosshair_width,
            });
        }

        if layers.crosshair {
            let crosshair = appearance.crosshair;
            self.layers.push(Layer::Crosshair {
                lines: line_pair(pointer_view, screen, crosshair.width),
                color: crosshair.color.with_opacity(crosshair.transparency),
            });
        }

        if layers.gap {
            self.layers
                .push(gap_layer(pointer_view, appearance, layers.border));
        }

        if inputs.flags.coordinate_text {
            if let Some(readout) = inputs.readout {
                self.layers.push(coordinate_text_layer(
                    text_buffer,
                    readout,
                    inputs.pointer_local,
                    screen,
                    &appearance.coordinate_text,
                    measure,
                ));
            }
        }

        if inputs.flags.origin {
            let hovered = inputs.flags.hovering;
            self.layers.push(Layer::OriginMarker {
                center: Point::new(inputs.origin_view.x.round(), inputs.origin_view.y.round()),
                diameter: if hovered {
                    ORIGIN_MARKER_HOVER_DIAMETER
                } else {
                    ORIGIN_MARKER_DIAMETER
                },
                hovered,
                fill: if hovered {
                    OverlayColor::BLUE
                } else {
                    OverlayColor::GRAY
                },
                stroke: OverlayColor::WHITE,
                stroke_width: if hovered { 10.0 } else { 5.0 },
            });
        }

        if let Some(view) = inputs.magnifier {
            self.layers.push(Layer::Magnifier(Arc::clone(view)));
        }
    }

    fn take_text_buffer(&mut self) -> String {
        self.layers
            .iter_mut()
            .find_map(|layer| match layer {
                Layer::CoordinateText { text, .. } => Some(std::mem::take(text)),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Settings-window thumbnail of `appearance` on a surface of `size`.
    pub fn preview(
        appearance: &AppearanceSettings,
        size: Size,
        measure: &dyn TextMeasure,
    ) -> Self {
        let display = DisplayDescriptor::new(0, Rect::new(0.0, 0.0, size.width, size.height), true);
        let pointer_local = Point::new(size.width * 0.6, size.height * 0.55);
        let origin_view = Point::new(size.width * 0.3, size.height * 0.7);
        let sample = PointerSample {
            active_display: display,
            local_point: pointer_local,
        };
        let readout = CoordinateReadout::Relative(compute_readout(&sample, origin_view));

        let mut stack = Self::new();
        stack.rebuild(
            &LayerInputs {
                screen: size,
                pointer_local,
                origin_view,
                flags: OverlayFlags::default(),
                readout: Some(readout),
                appearance,
                magnifier: None,
            },
            measure,
        );
        stack
    }
}

fn line_pair(pointer_view: Point, screen: Size, thickness: f64) -> LinePair {
    LinePair {
        vertical: Rect::new(
            pointer_view.x - thickness / 2.0,
            0.0,
            thickness,
            screen.height,
        ),
        horizontal: Rect::new(
            0.0,
            pointer_view.y - thickness / 2.0,
            screen.width,
            thickness,
        ),
    }
}

fn gap_layer(center: Point, appearance: &AppearanceSettings, border_shown: bool) -> Layer {
    let gap = appearance.gap;
    let border = appearance.border;
    let outline = Stroke {
        color: gap.border_color.with_opacity(gap.border_transparency),
        width: gap.border_thickness,
        extent: gap.size,
    };
    let border_ring = Stroke {
        color: border.color.with_opacity(border.transparency),
        width: border.thickness,
        extent: gap.size + gap.border_thickness + border.thickness,
    };
    match gap.shape {
        GapShape::None => Layer::Gap {
            center,
            shape: gap.shape,
            cutout: gap.size,
            outline: None,
            border_ring: None,
        },
        GapShape::Square | GapShape::Circle => Layer::Gap {
            center,
            shape: gap.shape,
            cutout: gap.size + gap.border_thickness,
            outline: Some(outline),
            border_ring: border_shown.then_some(border_ring),
        },
    }
}

/// Offset from the pointer to the text centre in local space (Y up).
pub fn text_offset(style: &CoordinateTextStyle) -> Size {
    let horizontal = 80.0 + style.offset + style.zoom * 3.2;
    let vertical = 30.0 + style.offset + style.zoom;
    match style.corner {
        TextCorner::TopLeft => Size::new(-horizontal, -vertical),
        TextCorner::TopRight => Size::new(horizontal, -vertical),
        TextCorner::BottomLeft => Size::new(-horizontal, vertical),
        TextCorner::BottomRight => Size::new(horizontal, vertical),
    }
}

fn coordinate_text_layer(
    mut text: String,
    readout: CoordinateReadout,
    pointer_local: Point,
    screen: Size,
    style: &CoordinateTextStyle,
    measure: &dyn TextMeasure,
) -> Layer {
    text.clear();
    let _ = write!(text, "{readout}");
    let font_size = BASE_FONT_SIZE + style.zoom;
    let measured = measure.measure(&text, font_size);
    let size = Size::new(
        measured.width + 2.0 * TEXT_PADDING.width,
        measured.height + 2.0 * TEXT_PADDING.height,
    );
    let offset = text_offset(style);
    let wanted = Point::new(pointer_local.x + offset.width, pointer_local.y - offset.height);
    let clamped = Rect::new(0.0, 0.0, screen.width, screen.height).clamp_box_center(wanted, size);
    Layer::CoordinateText {
        center: flip_y(clamped, screen.height),
        text,
        font_size,
        size,
    }
}

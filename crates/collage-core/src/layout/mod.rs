use crate::model::{Rect, Size, Template, TemplateType};
use serde::{Deserialize, Serialize};

pub mod fractional;
pub mod freeform;
pub mod grid;
pub mod polygon;
pub mod radial;

use fractional::FractionalLayout;
use freeform::FreeformLayout;
use grid::GridLayout;
use polygon::{DiamondLayout, TriangleLayout};
use radial::{HeartLayout, RadialLayout, RadialStyle, SpiralLayout};

/// Side of the fixed square cell used by the decorative shape layouts.
pub const SHAPE_CELL: f64 = 100.0;

/// A layout maps an image count onto placement rectangles for one canvas.
///
/// `count == 0` yields an empty sequence. Otherwise the result is non-empty, but it
/// may be shorter than `count` (static layouts, diamond); callers index with
/// `i % frames.len()`, see [`frame_for`].
pub trait Layout {
    fn frames(&self, count: usize, canvas: Size) -> Vec<Rect>;
}

/// Runtime parameters that are not part of a template definition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LayoutParams {
    /// Multiplier on the circle radius (`min(w,h)/3`).
    pub radius_scale: f64,
    /// Side of a freeform cell before the entry's zoom scale is applied.
    pub freeform_cell: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            radius_scale: 1.0,
            freeform_cell: freeform::FREEFORM_CELL,
        }
    }
}

/// Builds the algorithm matching `template`.
pub fn layout_for<'a>(template: &'a Template, params: &LayoutParams) -> Box<dyn Layout + 'a> {
    use crate::model::ShapeKind;

    match template.kind {
        TemplateType::Grid { columns, .. } => Box::new(GridLayout::new(columns)),
        TemplateType::Circle => Box::new(RadialLayout::new(RadialStyle::Circle {
            radius_scale: params.radius_scale,
        })),
        TemplateType::Mosaic => Box::new(FractionalLayout::new(&template.layout)),
        TemplateType::Freeform => Box::new(FreeformLayout::new(params.freeform_cell)),
        TemplateType::Shape { shape } => match shape {
            ShapeKind::Star | ShapeKind::Flower => Box::new(RadialLayout::new(RadialStyle::Fixed)),
            ShapeKind::Heart => Box::new(HeartLayout),
            ShapeKind::Spiral => Box::new(SpiralLayout),
            ShapeKind::Triangle => Box::new(TriangleLayout),
            ShapeKind::Diamond => Box::new(DiamondLayout),
        },
    }
}

/// Computes placement rectangles for `count` images of `template` on `canvas`.
pub fn compute_layout(
    template: &Template,
    params: &LayoutParams,
    count: usize,
    canvas: Size,
) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    layout_for(template, params).frames(count, canvas)
}

/// Frame for image `index`, wrapping cyclically. `None` only when `frames` is empty.
pub fn frame_for(frames: &[Rect], index: usize) -> Option<Rect> {
    if frames.is_empty() {
        None
    } else {
        Some(frames[index % frames.len()])
    }
}

/// Angle (radians) of slot `index` when `count` slots share a full turn.
pub(crate) fn slot_angle(index: usize, count: usize) -> f64 {
    index as f64 * (2.0 * std::f64::consts::PI / count as f64)
}

//! Layouts that place cells on a curve around the canvas center.
//!
//! Circle, star and flower share one algorithm: `count` points spaced evenly by
//! angle on a circle of radius `min(w,h)/3`. They differ only in cell sizing
//! (and in the cosmetic clip shape chosen by the template).

use super::{Layout, SHAPE_CELL, slot_angle};
use crate::model::{Point, Rect, Size};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RadialStyle {
    /// Radius scaled by `radius_scale`; square cells of side `radius / 3`.
    Circle { radius_scale: f64 },
    /// Unscaled radius; fixed 100x100 cells (star, flower).
    Fixed,
}

pub struct RadialLayout {
    style: RadialStyle,
}

impl RadialLayout {
    pub fn new(style: RadialStyle) -> Self {
        Self { style }
    }

    pub fn radius(&self, canvas: Size) -> f64 {
        let base = canvas.min_side() / 3.0;
        match self.style {
            RadialStyle::Circle { radius_scale } => base * radius_scale,
            RadialStyle::Fixed => base,
        }
    }
}

impl Layout for RadialLayout {
    fn frames(&self, count: usize, canvas: Size) -> Vec<Rect> {
        let center = canvas.center();
        let radius = self.radius(canvas);
        let side = match self.style {
            RadialStyle::Circle { .. } => radius / 3.0,
            RadialStyle::Fixed => SHAPE_CELL,
        };
        (0..count)
            .map(|i| {
                let angle = slot_angle(i, count);
                let p = Point::new(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                );
                Rect::centered(p, Size::new(side, side))
            })
            .collect()
    }
}

/// Heart outline traced by `x = r·sinθ·|sinθ|`, `y = -r·cosθ·|cosθ|`.
pub struct HeartLayout;

impl Layout for HeartLayout {
    fn frames(&self, count: usize, canvas: Size) -> Vec<Rect> {
        let center = canvas.center();
        let radius = canvas.min_side() / 3.0;
        (0..count)
            .map(|i| {
                let t = slot_angle(i, count);
                let p = Point::new(
                    center.x + radius * t.sin() * t.sin().abs(),
                    center.y - radius * t.cos() * t.cos().abs(),
                );
                Rect::centered(p, Size::new(SHAPE_CELL, SHAPE_CELL))
            })
            .collect()
    }
}

/// Archimedean spiral: radius grows by 10 points per slot from `min(w,h)/10`.
pub struct SpiralLayout;

pub const SPIRAL_STEP: f64 = 10.0;

impl Layout for SpiralLayout {
    fn frames(&self, count: usize, canvas: Size) -> Vec<Rect> {
        let center = canvas.center();
        let base = canvas.min_side() / 10.0;
        (0..count)
            .map(|i| {
                let angle = slot_angle(i, count);
                let radius = base + i as f64 * SPIRAL_STEP;
                let p = Point::new(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                );
                Rect::centered(p, Size::new(SHAPE_CELL, SHAPE_CELL))
            })
            .collect()
    }
}

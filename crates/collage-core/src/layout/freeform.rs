use super::Layout;
use crate::model::{Point, Rect, Size};

/// Side of a freeform cell at zoom scale 1.0.
pub const FREEFORM_CELL: f64 = 200.0;

/// Initial position of freeform image `index`: staggered down the diagonal.
pub fn default_position(index: usize) -> Point {
    let step = 50.0 * index as f64;
    Point::new(150.0 + step, 200.0 + step)
}

/// Cell drawn for a freeform image centered at `position` and zoomed by `scale`.
pub fn cell_at(position: Point, cell: f64, scale: f64) -> Rect {
    let side = cell * scale;
    Rect::centered(position, Size::new(side, side))
}

/// Freeform templates have no computed geometry; this reports where each image
/// starts before the user moves it.
pub struct FreeformLayout {
    cell: f64,
}

impl FreeformLayout {
    pub fn new(cell: f64) -> Self {
        Self { cell }
    }
}

impl Layout for FreeformLayout {
    fn frames(&self, count: usize, _canvas: Size) -> Vec<Rect> {
        (0..count)
            .map(|i| cell_at(default_position(i), self.cell, 1.0))
            .collect()
    }
}

use super::Layout;
use crate::model::{Rect, Size};

/// Fixed list of fractional rectangles scaled onto the canvas.
///
/// Returns at most one frame per stored rectangle; image `i` uses rectangle
/// `i % len`, so extra images stack onto earlier cells.
pub struct FractionalLayout<'a> {
    rects: &'a [Rect],
}

impl<'a> FractionalLayout<'a> {
    pub fn new(rects: &'a [Rect]) -> Self {
        Self { rects }
    }
}

impl Layout for FractionalLayout<'_> {
    fn frames(&self, count: usize, canvas: Size) -> Vec<Rect> {
        self.rects
            .iter()
            .take(count)
            .map(|r| r.denormalize(canvas))
            .collect()
    }
}

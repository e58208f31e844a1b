use super::{Layout, SHAPE_CELL};
use crate::model::{Rect, Size};

/// Two alternating rows (top quarter and bottom three-quarters of the canvas),
/// fanned out from the horizontal center in 100-point steps.
///
/// Cells are anchored by their top-left corner at the computed point.
pub struct TriangleLayout;

impl Layout for TriangleLayout {
    fn frames(&self, count: usize, canvas: Size) -> Vec<Rect> {
        let top_y = canvas.height * 0.25;
        let base_y = canvas.height * 0.75;
        let center_x = canvas.width / 2.0;
        let half = (count / 2) as f64;
        (0..count)
            .map(|i| {
                let x = center_x + (i as f64 - half) * SHAPE_CELL;
                let y = if i % 2 == 0 { top_y } else { base_y };
                Rect::new(x, y, SHAPE_CELL, SHAPE_CELL)
            })
            .collect()
    }
}

/// Rings around the center built along both diagonals.
///
/// The construction produces more candidates than needed for most counts; the
/// result is cut to `count`. For `count == 2` it yields a single cell, so the
/// result can be shorter than `count` and callers wrap with `i % len`.
pub struct DiamondLayout;

impl Layout for DiamondLayout {
    fn frames(&self, count: usize, canvas: Size) -> Vec<Rect> {
        let center = canvas.center();
        let side = canvas.min_side() / count.max(4) as f64;
        let rings = count.div_ceil(2);
        let cell = |dx: f64, dy: f64| {
            Rect::new(
                center.x + dx - side / 2.0,
                center.y + dy - side / 2.0,
                side,
                side,
            )
        };

        let mut frames = Vec::with_capacity(rings * 4);
        // upper half, including the center cell
        for i in 0..rings {
            let offset = i as f64 * side;
            frames.push(cell(-offset, -offset));
            if i > 0 {
                frames.push(cell(offset, -offset));
            }
        }
        // lower half
        for i in 1..rings {
            let offset = i as f64 * side;
            frames.push(cell(-offset, offset));
            frames.push(cell(offset, offset));
        }
        frames.truncate(count);
        frames
    }
}

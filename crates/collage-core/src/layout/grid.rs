use super::Layout;
use crate::model::{Rect, Size};

/// Uniform grid with a fixed column count.
///
/// The nominal row count of the template is ignored: only as many rows as the
/// images need (`ceil(count / columns)`) are laid out, and they share the full
/// canvas height.
pub struct GridLayout {
    columns: u32,
}

impl GridLayout {
    pub fn new(columns: u32) -> Self {
        Self {
            columns: columns.max(1),
        }
    }

    /// Rows actually used for `count` images (at least one).
    pub fn active_rows(&self, count: usize) -> usize {
        let columns = self.columns as usize;
        count.div_ceil(columns).max(1)
    }
}

impl Layout for GridLayout {
    fn frames(&self, count: usize, canvas: Size) -> Vec<Rect> {
        let columns = self.columns as usize;
        let cell_w = canvas.width / columns as f64;
        let cell_h = canvas.height / self.active_rows(count) as f64;
        (0..count)
            .map(|index| {
                let row = index / columns;
                let column = index % columns;
                Rect::new(
                    column as f64 * cell_w,
                    row as f64 * cell_h,
                    cell_w,
                    cell_h,
                )
            })
            .collect()
    }
}

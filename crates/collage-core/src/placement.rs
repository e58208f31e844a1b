use crate::layout::{self, LayoutParams, freeform};
use crate::model::{Offset, Point, Rect, Size, SourceImage, Template};
use tracing::debug;

/// Zoom bounds for freeform images.
pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 2.0;

/// Per-image editing state layered over the template geometry.
#[derive(Debug, Clone)]
pub struct PlacementEntry {
    pub image: SourceImage,
    /// Cell from the active template for this image's index.
    pub base: Rect,
    /// Pan applied to the overscanned image inside its cell.
    pub pan: Offset,
    /// Pan value at the end of the last finished gesture.
    pub committed_pan: Offset,
    /// Freeform only: center of the cell.
    pub position: Point,
    /// Freeform only: zoom in `[MIN_SCALE, MAX_SCALE]`.
    pub scale: f64,
}

impl PlacementEntry {
    fn new(index: usize, image: SourceImage) -> Self {
        Self {
            image,
            base: Rect::default(),
            pan: Offset::ZERO,
            committed_pan: Offset::ZERO,
            position: freeform::default_position(index),
            scale: 1.0,
        }
    }
}

/// Ordered placement entries, one per selected image.
///
/// Mutations are synchronous and meant to be driven from the UI thread.
#[derive(Debug, Clone)]
pub struct PlacementState {
    entries: Vec<PlacementEntry>,
    freeform: bool,
    freeform_cell: f64,
}

impl PlacementState {
    /// Fresh entries for `images`: zero pan, scale 1.0, staggered freeform positions.
    pub fn initialize(images: &[SourceImage]) -> Self {
        let entries = images
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, img)| PlacementEntry::new(i, img))
            .collect();
        Self {
            entries,
            freeform: false,
            freeform_cell: freeform::FREEFORM_CELL,
        }
    }

    pub fn entries(&self) -> &[PlacementEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&PlacementEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_freeform(&self) -> bool {
        self.freeform
    }

    /// Recomputes base rectangles for `template` on `canvas`, keeping user overrides.
    pub fn relayout(&mut self, template: &Template, params: &LayoutParams, canvas: Size) {
        self.freeform = template.kind.is_freeform();
        self.freeform_cell = params.freeform_cell;
        let frames = layout::compute_layout(template, params, self.entries.len(), canvas);
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.base = layout::frame_for(&frames, i).unwrap_or_default();
        }
        debug!(
            template = template.id,
            count = self.entries.len(),
            frames = frames.len(),
            "placements relaid out"
        );
    }

    /// Cell the image is drawn into: the base rect, or the user-placed square in freeform mode.
    pub fn cell(&self, index: usize) -> Option<Rect> {
        let e = self.entries.get(index)?;
        if self.freeform {
            Some(freeform::cell_at(e.position, self.freeform_cell, e.scale))
        } else {
            Some(e.base)
        }
    }

    /// Applies a drag translation measured from the start of the current gesture.
    ///
    /// The stored pan becomes `committed + translation`, so repeating the same
    /// event is harmless. Call [`commit_pan`](Self::commit_pan) when the gesture ends.
    pub fn update_pan(&mut self, index: usize, translation: Offset) -> bool {
        match self.entries.get_mut(index) {
            Some(e) => {
                e.pan = e.committed_pan + translation;
                true
            }
            None => false,
        }
    }

    /// Ends the current pan gesture, keeping the current offset.
    pub fn commit_pan(&mut self, index: usize) -> bool {
        match self.entries.get_mut(index) {
            Some(e) => {
                e.committed_pan = e.pan;
                true
            }
            None => false,
        }
    }

    /// Moves a freeform image. Ignored outside freeform mode.
    pub fn update_position(&mut self, index: usize, point: Point) -> bool {
        if !self.freeform {
            debug!(index, "position update ignored outside freeform");
            return false;
        }
        match self.entries.get_mut(index) {
            Some(e) => {
                e.position = point;
                true
            }
            None => false,
        }
    }

    /// Zooms a freeform image, clamped to `[MIN_SCALE, MAX_SCALE]`. Ignored outside freeform mode.
    pub fn update_scale(&mut self, index: usize, value: f64) -> bool {
        if !self.freeform || !value.is_finite() {
            return false;
        }
        match self.entries.get_mut(index) {
            Some(e) => {
                e.scale = value.clamp(MIN_SCALE, MAX_SCALE);
                true
            }
            None => false,
        }
    }

    /// Drops every user override, keeping images and base rectangles.
    pub fn reset(&mut self) {
        for (i, e) in self.entries.iter_mut().enumerate() {
            e.pan = Offset::ZERO;
            e.committed_pan = Offset::ZERO;
            e.position = freeform::default_position(i);
            e.scale = 1.0;
        }
    }
}

//! Scene description handed to a renderer.
//!
//! The core never draws pixels while editing: it describes what goes where, in
//! draw order (background, images, text overlays, watermark), and a
//! [`SceneRenderer`](crate::compositing::SceneRenderer) turns that into a raster.

use crate::model::{ClipShape, Point, Rect, Size, SourceImage, Template};
use crate::placement::PlacementState;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const BLACK: Color = Color([0, 0, 0, 255]);
    pub const GRAY: Color = Color([142, 142, 147, 255]);
    pub const BLUE: Color = Color([0, 122, 255, 255]);
    pub const PURPLE: Color = Color([175, 82, 222, 255]);
    pub const RED: Color = Color([255, 59, 48, 255]);
    pub const ORANGE: Color = Color([255, 149, 0, 255]);
    pub const GREEN: Color = Color([52, 199, 89, 255]);
    pub const YELLOW: Color = Color([255, 204, 0, 255]);
    pub const PINK: Color = Color([255, 45, 85, 255]);
    pub const INDIGO: Color = Color([88, 86, 214, 255]);
}

/// Solid colors offered by the background picker.
pub const SOLID_PALETTE: [Color; 6] = [
    Color::WHITE,
    Color::BLACK,
    Color::BLUE,
    Color::PINK,
    Color::YELLOW,
    Color::GRAY,
];

/// Number of built-in gradients (ids `0..GRADIENT_COUNT`).
pub const GRADIENT_COUNT: u8 = 4;

/// Two-stop linear gradient between unit-square anchor points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gradient {
    pub start: Color,
    pub end: Color,
    pub from: Point,
    pub to: Point,
}

/// Built-in gradient `id`. Unknown ids resolve to plain white.
pub fn gradient(id: u8) -> Gradient {
    let g = |start, end, from: (f64, f64), to: (f64, f64)| Gradient {
        start,
        end,
        from: Point::new(from.0, from.1),
        to: Point::new(to.0, to.1),
    };
    match id {
        0 => g(Color::BLUE, Color::PURPLE, (0.5, 0.0), (0.5, 1.0)),
        1 => g(Color::RED, Color::ORANGE, (0.0, 0.0), (1.0, 1.0)),
        2 => g(Color::GREEN, Color::YELLOW, (0.0, 0.5), (1.0, 0.5)),
        3 => g(Color::PINK, Color::INDIGO, (0.0, 1.0), (1.0, 0.0)),
        _ => g(Color::WHITE, Color::WHITE, (0.5, 0.0), (0.5, 1.0)),
    }
}

/// Canvas fill: a solid color or one of the built-in gradients, never both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Background {
    Solid { color: Color },
    Gradient { id: u8 },
}

impl Default for Background {
    fn default() -> Self {
        Background::Solid { color: Color::GRAY }
    }
}

/// Stable identity of a text overlay within a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(pub u64);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    #[default]
    Display,
    Editing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextOverlay {
    pub id: OverlayId,
    pub text: String,
    /// Center of the label on the canvas.
    pub position: Point,
    pub mode: TextMode,
}

pub const DEFAULT_OVERLAY_TEXT: &str = "New Text";
pub const DEFAULT_OVERLAY_POSITION: Point = Point { x: 100.0, y: 100.0 };

/// Text overlays in insertion order; later overlays draw on top.
#[derive(Debug, Clone, Default)]
pub struct TextOverlays {
    items: Vec<TextOverlay>,
    next_id: u64,
}

impl TextOverlays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, text: impl Into<String>, position: Point) -> OverlayId {
        let id = OverlayId(self.next_id);
        self.next_id += 1;
        self.items.push(TextOverlay {
            id,
            text: text.into(),
            position,
            mode: TextMode::Display,
        });
        id
    }

    pub fn remove(&mut self, id: OverlayId) -> bool {
        let before = self.items.len();
        self.items.retain(|o| o.id != id);
        self.items.len() != before
    }

    pub fn get(&self, id: OverlayId) -> Option<&TextOverlay> {
        self.items.iter().find(|o| o.id == id)
    }

    fn get_mut(&mut self, id: OverlayId) -> Option<&mut TextOverlay> {
        self.items.iter_mut().find(|o| o.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextOverlay> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn move_to(&mut self, id: OverlayId, position: Point) -> bool {
        match self.get_mut(id) {
            Some(o) => {
                o.position = position;
                true
            }
            None => false,
        }
    }

    pub fn set_mode(&mut self, id: OverlayId, mode: TextMode) -> bool {
        match self.get_mut(id) {
            Some(o) => {
                o.mode = mode;
                true
            }
            None => false,
        }
    }

    /// Replaces the text of an overlay that is being edited in place.
    pub fn set_text(&mut self, id: OverlayId, text: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(o) if o.mode == TextMode::Editing => {
                o.text = text.into();
                true
            }
            _ => false,
        }
    }

    /// Puts every overlay back in display mode.
    pub fn finish_editing(&mut self) {
        for o in &mut self.items {
            o.mode = TextMode::Display;
        }
    }
}

/// Colors and rounding of a label box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelStyle {
    pub foreground: Color,
    pub background: Color,
    pub corner_radius: f64,
    /// Estimated advance per character, in points.
    pub char_width: f64,
    pub line_height: f64,
    pub padding: f64,
}

impl LabelStyle {
    /// Headline text on a 70% black box.
    pub const OVERLAY: LabelStyle = LabelStyle {
        foreground: Color::WHITE,
        background: Color([0, 0, 0, 179]),
        corner_radius: 5.0,
        char_width: 9.0,
        line_height: 22.0,
        padding: 4.0,
    };

    /// Caption text on a 50% black box.
    pub const WATERMARK: LabelStyle = LabelStyle {
        foreground: Color([255, 255, 255, 179]),
        background: Color([0, 0, 0, 128]),
        corner_radius: 8.0,
        char_width: 7.0,
        line_height: 16.0,
        padding: 16.0,
    };

    /// Box size for `text` rendered in this style.
    pub fn measure(&self, text: &str) -> Size {
        let chars = text.chars().count() as f64;
        Size::new(
            chars * self.char_width + 2.0 * self.padding,
            self.line_height + 2.0 * self.padding,
        )
    }
}

/// Margin between the watermark box and the bottom-right canvas corner.
pub const WATERMARK_MARGIN: f64 = 10.0;

/// Watermark box anchored to the bottom-right corner, shrunk to fit small canvases.
pub fn watermark_rect(text: &str, canvas: Size) -> Rect {
    let size = LabelStyle::WATERMARK.measure(text);
    let w = size.width.min(canvas.width - 2.0 * WATERMARK_MARGIN).max(1.0);
    let h = size.height.min(canvas.height - 2.0 * WATERMARK_MARGIN).max(1.0);
    Rect::new(
        canvas.width - WATERMARK_MARGIN - w,
        canvas.height - WATERMARK_MARGIN - h,
        w,
        h,
    )
}

#[derive(Debug, Clone)]
pub enum SceneItem {
    /// A photo drawn into `draw`, visible only inside `cell`.
    Image {
        index: usize,
        image: SourceImage,
        cell: Rect,
        draw: Rect,
        clip: ClipShape,
    },
    Label {
        text: String,
        rect: Rect,
        style: LabelStyle,
    },
    Watermark {
        text: String,
        rect: Rect,
    },
}

impl SceneItem {
    /// Visible bounds of the item.
    pub fn bounds(&self) -> Rect {
        match self {
            SceneItem::Image { cell, .. } => *cell,
            SceneItem::Label { rect, .. } | SceneItem::Watermark { rect, .. } => *rect,
        }
    }
}

/// Everything a renderer needs for one frame. Self-contained: images are shared
/// handles, so a scene can outlive further edits to the session.
#[derive(Debug, Clone)]
pub struct Scene {
    pub size: Size,
    pub background: Background,
    /// Draw order, first to last.
    pub items: Vec<SceneItem>,
}

impl Scene {
    pub fn has_watermark(&self) -> bool {
        self.items
            .iter()
            .any(|i| matches!(i, SceneItem::Watermark { .. }))
    }

    pub fn image_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, SceneItem::Image { .. }))
            .count()
    }

    /// Union of photo cells and text labels, ignoring the watermark.
    pub fn content_bounds(&self) -> Option<Rect> {
        self.items
            .iter()
            .filter(|i| !matches!(i, SceneItem::Watermark { .. }))
            .map(SceneItem::bounds)
            .reduce(|a, b| a.union(&b))
    }
}

/// Knobs for [`compose_scene`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeOptions {
    pub overscan: f64,
    /// Watermark caption, or `None` when the user owns the premium entitlement.
    pub watermark: Option<String>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            overscan: 1.5,
            watermark: None,
        }
    }
}

/// Describes the collage in strict draw order: background, images, text, watermark.
///
/// `placements` must already be laid out for `template` and `canvas`.
#[instrument(skip_all, fields(template = template.id, images = placements.len()))]
pub fn compose_scene(
    template: &Template,
    placements: &PlacementState,
    overlays: &TextOverlays,
    background: &Background,
    canvas: Size,
    options: &ComposeOptions,
) -> Scene {
    let clip = template.kind.clip();
    let mut items = Vec::with_capacity(placements.len() + overlays.len() + 1);

    for (index, entry) in placements.entries().iter().enumerate() {
        let Some(cell) = placements.cell(index) else {
            continue;
        };
        if cell.w <= 0.0 || cell.h <= 0.0 {
            continue;
        }
        let draw = cell.scaled_about_center(options.overscan).translate(entry.pan);
        items.push(SceneItem::Image {
            index,
            image: entry.image.clone(),
            cell,
            draw,
            clip,
        });
    }

    for overlay in overlays.iter() {
        let style = LabelStyle::OVERLAY;
        let rect = Rect::centered(overlay.position, style.measure(&overlay.text));
        items.push(SceneItem::Label {
            text: overlay.text.clone(),
            rect,
            style,
        });
    }

    if let Some(text) = &options.watermark {
        items.push(SceneItem::Watermark {
            rect: watermark_rect(text, canvas),
            text: text.clone(),
        });
    }

    Scene {
        size: canvas,
        background: *background,
        items,
    }
}

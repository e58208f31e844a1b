use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// A point in canvas space (device points, origin top-left).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A translation, e.g. a drag gesture or a pan offset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

impl Offset {
    pub const ZERO: Offset = Offset { dx: 0.0, dy: 0.0 };

    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }
}

impl std::ops::Add for Offset {
    type Output = Offset;
    fn add(self, rhs: Offset) -> Offset {
        Offset::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

/// Canvas or cell size in device points.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
    /// Side length of the largest centered square.
    pub fn min_side(&self) -> f64 {
        self.width.min(self.height)
    }
    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
    /// True if both sides are finite and strictly positive.
    pub fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Axis-aligned rectangle in device points. `x,y` is top-left; `w,h` are sizes.
///
/// Template layouts store the same type with every component expressed as a
/// fraction of the canvas.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
    /// Rectangle of size `size` whose center is `center`.
    pub fn centered(center: Point, size: Size) -> Self {
        Self::new(
            center.x - size.width / 2.0,
            center.y - size.height / 2.0,
            size.width,
            size.height,
        )
    }
    pub fn max_x(&self) -> f64 {
        self.x + self.w
    }
    pub fn max_y(&self) -> f64 {
        self.y + self.h
    }
    pub fn mid_x(&self) -> f64 {
        self.x + self.w / 2.0
    }
    pub fn mid_y(&self) -> f64 {
        self.y + self.h / 2.0
    }
    pub fn center(&self) -> Point {
        Point::new(self.mid_x(), self.mid_y())
    }
    pub fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }
    pub fn area(&self) -> f64 {
        self.w * self.h
    }
    /// Maps a fractional rectangle onto a canvas of `size`.
    pub fn denormalize(&self, size: Size) -> Rect {
        Rect::new(
            self.x * size.width,
            self.y * size.height,
            self.w * size.width,
            self.h * size.height,
        )
    }
    pub fn translate(&self, offset: Offset) -> Rect {
        Rect::new(self.x + offset.dx, self.y + offset.dy, self.w, self.h)
    }
    /// Same center, sides multiplied by `factor`.
    pub fn scaled_about_center(&self, factor: f64) -> Rect {
        Rect::centered(self.center(), Size::new(self.w * factor, self.h * factor))
    }
    /// Returns true if `r` lies inside `self`, allowing `eps` of float slack.
    pub fn contains_rect(&self, r: &Rect, eps: f64) -> bool {
        r.x >= self.x - eps
            && r.y >= self.y - eps
            && r.max_x() <= self.max_x() + eps
            && r.max_y() <= self.max_y() + eps
    }
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.max_x().min(other.max_x());
        let y2 = self.max_y().min(other.max_y());
        if x2 > x1 && y2 > y1 {
            Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }
    pub fn union(&self, other: &Rect) -> Rect {
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.max_x().max(other.max_x());
        let y2 = self.max_y().max(other.max_y());
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }
}

/// Decorative shapes a template can arrange photos into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Star,
    Triangle,
    Diamond,
    Heart,
    Flower,
    Spiral,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 6] = [
        ShapeKind::Star,
        ShapeKind::Triangle,
        ShapeKind::Diamond,
        ShapeKind::Heart,
        ShapeKind::Flower,
        ShapeKind::Spiral,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Star => "Star",
            ShapeKind::Triangle => "Triangle",
            ShapeKind::Diamond => "Diamond",
            ShapeKind::Heart => "Heart",
            ShapeKind::Flower => "Flower",
            ShapeKind::Spiral => "Spiral",
        }
    }

    /// Mask applied to each photo cell. Purely cosmetic: geometry is decided by the layout.
    pub fn clip(&self) -> ClipShape {
        match self {
            ShapeKind::Flower | ShapeKind::Heart => ClipShape::Ellipse,
            _ => ClipShape::Rect,
        }
    }
}

impl FromStr for ShapeKind {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "star" => Ok(Self::Star),
            "triangle" => Ok(Self::Triangle),
            "diamond" => Ok(Self::Diamond),
            "heart" => Ok(Self::Heart),
            "flower" => Ok(Self::Flower),
            "spiral" => Ok(Self::Spiral),
            _ => Err(()),
        }
    }
}

/// Mask used when drawing a photo into its cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClipShape {
    #[default]
    Rect,
    Ellipse,
}

/// How a template arranges photos.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateType {
    Grid { rows: u32, columns: u32 },
    Circle,
    Mosaic,
    Freeform,
    Shape { shape: ShapeKind },
}

impl TemplateType {
    /// True when frames come from the template's stored fractional layout.
    pub fn uses_static_layout(&self) -> bool {
        matches!(self, TemplateType::Grid { .. } | TemplateType::Mosaic)
    }

    pub fn is_freeform(&self) -> bool {
        matches!(self, TemplateType::Freeform)
    }

    pub fn clip(&self) -> ClipShape {
        match self {
            TemplateType::Circle => ClipShape::Ellipse,
            TemplateType::Shape { shape } => shape.clip(),
            _ => ClipShape::Rect,
        }
    }
}

/// A named arrangement rule. Immutable once built by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub id: u32,
    pub name: String,
    pub kind: TemplateType,
    /// Fractional rectangles (each component in `[0,1]`); empty for computed kinds.
    pub layout: Vec<Rect>,
}

impl Template {
    pub fn new(id: u32, name: impl Into<String>, kind: TemplateType, layout: Vec<Rect>) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            layout,
        }
    }

    /// Checks the layout against the template kind.
    ///
    /// Static kinds (grid, mosaic) need a non-empty layout inside the unit square;
    /// computed kinds (circle, shapes, freeform) must not carry one.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::CollageError;

        let invalid = |reason: String| CollageError::InvalidTemplate {
            id: self.id,
            reason,
        };
        if let TemplateType::Grid { rows, columns } = self.kind {
            if rows == 0 || columns == 0 {
                return Err(invalid(format!("grid needs rows and columns, got {rows}x{columns}")));
            }
        }
        if self.kind.uses_static_layout() {
            if self.layout.is_empty() {
                return Err(invalid("static template without layout".into()));
            }
            let unit = Rect::new(0.0, 0.0, 1.0, 1.0);
            for (i, r) in self.layout.iter().enumerate() {
                let finite = [r.x, r.y, r.w, r.h].iter().all(|v| v.is_finite());
                if !finite || r.w <= 0.0 || r.h <= 0.0 || !unit.contains_rect(r, 1e-9) {
                    return Err(invalid(format!("layout rect {i} leaves the unit square: {r:?}")));
                }
            }
        } else if !self.layout.is_empty() {
            return Err(invalid("computed template must not carry a static layout".into()));
        }
        Ok(())
    }
}

/// A decoded photo supplied by the host, shared between the session and in-flight exports.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Caller-chosen key (e.g. file name or asset identifier).
    pub key: String,
    pub image: Arc<DynamicImage>,
}

impl SourceImage {
    pub fn new(key: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            key: key.into(),
            image: Arc::new(image),
        }
    }
}

use crate::error::{CollageError, Result};
use crate::model::{ClipShape, Rect, Size};
use crate::scene::{Background, Color, LabelStyle, Scene, SceneItem, gradient};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use tracing::{debug, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Turns a scene description into pixels.
///
/// `target` is the output size in pixels; scene coordinates are scaled
/// independently on each axis to fill it.
pub trait SceneRenderer: Send + Sync {
    fn render(&self, scene: &Scene, target: Size) -> Result<RgbaImage>;
}

/// CPU renderer on top of `image`.
///
/// Draws background fills, photos (aspect-filled into their overscanned rect,
/// clipped to the cell) and label boxes. Glyphs are not rasterized: labels and
/// the watermark are drawn as their colored boxes.
#[derive(Debug, Clone)]
pub struct RasterRenderer {
    filter: FilterType,
}

impl Default for RasterRenderer {
    fn default() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl RasterRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Pixel-space version of an image item, with the photo already scaled to its draw rect.
struct PreparedImage {
    pixels: RgbaImage,
    /// Top-left of `pixels` on the canvas (may be negative).
    origin: (i64, i64),
    clip: PixelRect,
    shape: ClipShape,
}

/// Half-open pixel rectangle `[x0,x1) x [y0,y1)`, already clamped to the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelRect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl PixelRect {
    fn from_rect(r: &Rect, sx: f64, sy: f64, width: u32, height: u32) -> Option<PixelRect> {
        let clamp = |v: f64, max: u32| v.round().clamp(0.0, max as f64) as u32;
        let p = PixelRect {
            x0: clamp(r.x * sx, width),
            y0: clamp(r.y * sy, height),
            x1: clamp(r.max_x() * sx, width),
            y1: clamp(r.max_y() * sy, height),
        };
        (p.x1 > p.x0 && p.y1 > p.y0).then_some(p)
    }
}

impl SceneRenderer for RasterRenderer {
    #[instrument(skip_all, fields(items = scene.items.len()))]
    fn render(&self, scene: &Scene, target: Size) -> Result<RgbaImage> {
        if !scene.size.is_drawable() {
            return Err(CollageError::RenderFailed(format!(
                "scene has no drawable area ({}x{})",
                scene.size.width, scene.size.height
            )));
        }
        let width = target.width.round() as u32;
        let height = target.height.round() as u32;
        if width == 0 || height == 0 || !target.is_drawable() {
            return Err(CollageError::RenderFailed(format!(
                "target size {}x{} is empty",
                target.width, target.height
            )));
        }
        let sx = width as f64 / scene.size.width;
        let sy = height as f64 / scene.size.height;

        let mut canvas = RgbaImage::new(width, height);
        fill_background(&mut canvas, &scene.background);

        let prepared = self.prepare_images(scene, sx, sy);
        debug!(prepared = prepared.len(), width, height, "drawing scene");

        let mut images = prepared.into_iter();
        for item in &scene.items {
            match item {
                SceneItem::Image { .. } => {
                    if let Some(Some(p)) = images.next() {
                        blit_clipped(&p, &mut canvas);
                    }
                }
                SceneItem::Label { rect, style, .. } => {
                    fill_label(&mut canvas, rect, style, sx, sy);
                }
                SceneItem::Watermark { rect, .. } => {
                    fill_label(&mut canvas, rect, &LabelStyle::WATERMARK, sx, sy);
                }
            }
        }
        Ok(canvas)
    }
}

impl RasterRenderer {
    /// One entry per image item, in scene order; `None` for items that end up off-canvas
    /// or whose source has no pixels.
    fn prepare_images(&self, scene: &Scene, sx: f64, sy: f64) -> Vec<Option<PreparedImage>> {
        let images: Vec<&SceneItem> = scene
            .items
            .iter()
            .filter(|i| matches!(i, SceneItem::Image { .. }))
            .collect();
        let (width, height) = (
            (scene.size.width * sx).round() as u32,
            (scene.size.height * sy).round() as u32,
        );

        #[cfg(feature = "parallel")]
        let iter = images.par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = images.iter();

        iter.map(|item| self.prepare_image(item, sx, sy, width, height))
            .collect()
    }

    fn prepare_image(
        &self,
        item: &SceneItem,
        sx: f64,
        sy: f64,
        width: u32,
        height: u32,
    ) -> Option<PreparedImage> {
        let SceneItem::Image {
            image, cell, draw, clip, ..
        } = item
        else {
            return None;
        };
        if image.image.width() == 0 || image.image.height() == 0 {
            warn!(key = %image.key, "skipping empty source image");
            return None;
        }
        let clip_px = PixelRect::from_rect(cell, sx, sy, width, height)?;
        let dw = (draw.w * sx).round().max(1.0) as u32;
        let dh = (draw.h * sy).round().max(1.0) as u32;
        let pixels = image.image.resize_to_fill(dw, dh, self.filter).to_rgba8();
        Some(PreparedImage {
            pixels,
            origin: ((draw.x * sx).round() as i64, (draw.y * sy).round() as i64),
            clip: clip_px,
            shape: *clip,
        })
    }
}

/// Fills the whole canvas with a solid color or a two-stop gradient.
pub fn fill_background(canvas: &mut RgbaImage, background: &Background) {
    match background {
        Background::Solid { color } => {
            let px = Rgba(color.0);
            for p in canvas.pixels_mut() {
                *p = px;
            }
        }
        Background::Gradient { id } => {
            let g = gradient(*id);
            let (w, h) = canvas.dimensions();
            let (fx, fy) = (g.from.x * w as f64, g.from.y * h as f64);
            let (dx, dy) = (g.to.x * w as f64 - fx, g.to.y * h as f64 - fy);
            let len2 = (dx * dx + dy * dy).max(f64::EPSILON);
            for (x, y, p) in canvas.enumerate_pixels_mut() {
                let px = x as f64 + 0.5 - fx;
                let py = y as f64 + 0.5 - fy;
                let t = ((px * dx + py * dy) / len2).clamp(0.0, 1.0);
                *p = Rgba(lerp_color(g.start, g.end, t));
            }
        }
    }
}

fn lerp_color(a: Color, b: Color, t: f64) -> [u8; 4] {
    let mut out = [0u8; 4];
    for (i, o) in out.iter_mut().enumerate() {
        let v = a.0[i] as f64 + (b.0[i] as f64 - a.0[i] as f64) * t;
        *o = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Source-over blend of a straight-alpha pixel onto `dst`.
pub fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    if sa >= 1.0 {
        *dst = src;
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Copies a prepared photo onto the canvas, visible only inside its clip.
fn blit_clipped(p: &PreparedImage, canvas: &mut RgbaImage) {
    let (pw, ph) = p.pixels.dimensions();
    let c = p.clip;
    let (cx, cy) = ((c.x0 + c.x1) as f64 / 2.0, (c.y0 + c.y1) as f64 / 2.0);
    let (rx, ry) = ((c.x1 - c.x0) as f64 / 2.0, (c.y1 - c.y0) as f64 / 2.0);

    for y in c.y0..c.y1 {
        let sy = y as i64 - p.origin.1;
        if sy < 0 || sy >= ph as i64 {
            continue;
        }
        for x in c.x0..c.x1 {
            let sx = x as i64 - p.origin.0;
            if sx < 0 || sx >= pw as i64 {
                continue;
            }
            if p.shape == ClipShape::Ellipse {
                let nx = (x as f64 + 0.5 - cx) / rx;
                let ny = (y as f64 + 0.5 - cy) / ry;
                if nx * nx + ny * ny > 1.0 {
                    continue;
                }
            }
            let src = *p.pixels.get_pixel(sx as u32, sy as u32);
            blend_over(canvas.get_pixel_mut(x, y), src);
        }
    }
}

/// Draws the rounded box of a label.
fn fill_label(canvas: &mut RgbaImage, rect: &Rect, style: &LabelStyle, sx: f64, sy: f64) {
    let (w, h) = canvas.dimensions();
    let Some(px) = PixelRect::from_rect(rect, sx, sy, w, h) else {
        return;
    };
    // corners are rounded in unscaled space, then mapped
    let radius = style
        .corner_radius
        .min(rect.w / 2.0)
        .min(rect.h / 2.0)
        .max(0.0);
    let color = Rgba(style.background.0);
    for y in px.y0..px.y1 {
        for x in px.x0..px.x1 {
            let lx = (x as f64 + 0.5) / sx;
            let ly = (y as f64 + 0.5) / sy;
            if !inside_rounded(rect, radius, lx, ly) {
                continue;
            }
            blend_over(canvas.get_pixel_mut(x, y), color);
        }
    }
}

fn inside_rounded(r: &Rect, radius: f64, x: f64, y: f64) -> bool {
    if radius <= 0.0 {
        return true;
    }
    let cx = x.clamp(r.x + radius, r.max_x() - radius);
    let cy = y.clamp(r.y + radius, r.max_y() - radius);
    let (dx, dy) = (x - cx, y - cy);
    dx * dx + dy * dy <= radius * radius
}

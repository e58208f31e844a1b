use crate::config::{ExportFormat, ExportSettings};
use crate::error::{CollageError, Result};
use crate::model::{Rect, Size, Template};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use serde_json::{Value, json};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// JPEG exports are written at maximum quality.
pub const JPEG_QUALITY: u8 = 100;

/// A finished export, ready to be persisted or shared.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    /// Format actually written (HEIC requests come out as JPEG).
    pub format: ExportFormat,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

/// Where finished exports go: a photo library, a share sheet, a directory.
///
/// Sinks are only called on the thread that owns the session.
pub trait ExportSink {
    fn deliver(&mut self, image: &EncodedImage) -> Result<()>;
}

/// Writes `collage.<ext>` into a directory, replacing any previous export.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far, oldest first.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ExportSink for DirectorySink {
    fn deliver(&mut self, image: &EncodedImage) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&image.file_name);
        std::fs::write(&path, &image.bytes)?;
        debug!(path = %path.display(), bytes = image.bytes.len(), "export written");
        self.written.push(path);
        Ok(())
    }
}

/// Pixel size to render `canvas` at so that its shorter side equals `side`.
pub fn render_target(canvas: Size, side: u32) -> Size {
    let k = side as f64 / canvas.min_side();
    Size::new((canvas.width * k).round(), (canvas.height * k).round())
}

/// Scales `img` to cover a `side x side` square and crops the center.
pub fn fit_square(img: &RgbaImage, side: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    if w == side && h == side {
        return img.clone();
    }
    let k = side as f64 / w.min(h).max(1) as f64;
    let nw = ((w as f64 * k).round() as u32).max(side);
    let nh = ((h as f64 * k).round() as u32).max(side);
    let scaled = if (nw, nh) == (w, h) {
        img.clone()
    } else {
        imageops::resize(img, nw, nh, FilterType::Lanczos3)
    };
    let x = (nw - side) / 2;
    let y = (nh - side) / 2;
    imageops::crop_imm(&scaled, x, y, side, side).to_image()
}

/// Encodes a raster in `format`. JPEG drops the alpha channel.
pub fn encode(img: &RgbaImage, format: ExportFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    match format.effective() {
        ExportFormat::Png => {
            img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        }
        _ => {
            let rgb = image::DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
                .encode(
                    &rgb,
                    rgb.width(),
                    rgb.height(),
                    image::ColorType::Rgb8.into(),
                )
                .map_err(|e| CollageError::Encode(format!("jpeg: {e}")))?;
        }
    }
    Ok(bytes)
}

/// Fits a rendered canvas to the export resolution and encodes it.
#[instrument(skip_all, fields(side = settings.resolution.side(), format = ?settings.format))]
pub fn finalize(rendered: &RgbaImage, settings: &ExportSettings) -> Result<EncodedImage> {
    let (w, h) = rendered.dimensions();
    if w == 0 || h == 0 {
        return Err(CollageError::RenderFailed("rendered canvas is empty".into()));
    }
    let side = settings.resolution.side();
    let fitted = fit_square(rendered, side);
    let bytes = encode(&fitted, settings.format)?;
    Ok(EncodedImage {
        bytes,
        format: settings.format.effective(),
        file_name: settings.format.file_name(),
        width: side,
        height: side,
    })
}

/// Describes a computed layout as `{ template, canvas, frames }`.
pub fn layout_to_json(template: &Template, canvas: Size, frames: &[Rect]) -> Value {
    let frames_val: Vec<Value> = frames
        .iter()
        .enumerate()
        .map(|(i, r)| json!({"index": i, "x": r.x, "y": r.y, "w": r.w, "h": r.h}))
        .collect();
    json!({
        "template": {
            "id": template.id,
            "name": template.name,
            "kind": &template.kind,
        },
        "canvas": {"w": canvas.width, "h": canvas.height},
        "frames": frames_val,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_target_matches_shorter_side() {
        let t = render_target(Size::new(400.0, 600.0), 720);
        assert_eq!((t.width, t.height), (720.0, 1080.0));
    }

    #[test]
    fn fit_square_crops_center() {
        let mut img = RgbaImage::new(20, 10);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = if x < 5 || x >= 15 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            };
        }
        let out = fit_square(&img, 10);
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(out.get_pixel(5, 5), &image::Rgba([0, 0, 255, 255]));
    }
}

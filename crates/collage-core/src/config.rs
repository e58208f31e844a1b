use crate::layout::{LayoutParams, freeform::FREEFORM_CELL};
use crate::model::Size;
use crate::scene::Background;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Export resolution tiers. Exports are square.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionTier {
    /// 720 x 720
    Low,
    /// 1080 x 1080
    Medium,
    /// 2160 x 2160
    #[default]
    High,
}

impl ResolutionTier {
    /// Side length of the exported square, in pixels.
    pub fn side(&self) -> u32 {
        match self {
            ResolutionTier::Low => 720,
            ResolutionTier::Medium => 1080,
            ResolutionTier::High => 2160,
        }
    }
}

impl FromStr for ResolutionTier {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "720" => Ok(Self::Low),
            "medium" | "1080" => Ok(Self::Medium),
            "high" | "2160" => Ok(Self::High),
            _ => Err(()),
        }
    }
}

/// Requested output format. HEIC is accepted but written as JPEG.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Jpeg,
    Png,
    Heic,
}

impl ExportFormat {
    /// Format actually encoded.
    pub fn effective(&self) -> ExportFormat {
        match self {
            ExportFormat::Heic => ExportFormat::Jpeg,
            other => *other,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self.effective() {
            ExportFormat::Png => "png",
            _ => "jpg",
        }
    }

    /// Output file name: `collage.<ext>`.
    pub fn file_name(&self) -> String {
        format!("collage.{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "heic" | "heif" => Ok(Self::Heic),
            _ => Err(()),
        }
    }
}

/// Session-scoped export choice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ExportSettings {
    pub resolution: ResolutionTier,
    pub format: ExportFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollageConfig {
    /// Canvas width in device points.
    pub canvas_width: f64,
    /// Canvas height in device points.
    pub canvas_height: f64,
    /// Circle template radius multiplier.
    #[serde(default = "default_radius_scale")]
    pub radius_scale: f64,
    /// Images are drawn this many times their cell size, then clipped, so panning never shows a gap.
    #[serde(default = "default_overscan")]
    pub overscan: f64,
    /// Freeform cell side at zoom 1.0.
    #[serde(default = "default_freeform_cell")]
    pub freeform_cell: f64,
    #[serde(default)]
    pub background: Background,
    #[serde(default)]
    pub export: ExportSettings,
    /// Caption stamped on exports without the premium entitlement.
    #[serde(default = "default_watermark_text")]
    pub watermark_text: String,
}

impl Default for CollageConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1080.0,
            canvas_height: 1080.0,
            radius_scale: default_radius_scale(),
            overscan: default_overscan(),
            freeform_cell: default_freeform_cell(),
            background: Background::default(),
            export: ExportSettings::default(),
            watermark_text: default_watermark_text(),
        }
    }
}

impl CollageConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - The canvas is empty, negative or not finite
    /// - The radius scale is not strictly positive
    /// - Overscan is below 1.0 (the image would not cover its cell)
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::CollageError;

        if !self.canvas_size().is_drawable() {
            return Err(CollageError::InvalidDimensions {
                width: self.canvas_width,
                height: self.canvas_height,
            });
        }
        if !(self.radius_scale.is_finite() && self.radius_scale > 0.0) {
            return Err(CollageError::InvalidConfig(format!(
                "radius_scale must be positive, got {}",
                self.radius_scale
            )));
        }
        if !(self.overscan.is_finite() && self.overscan >= 1.0) {
            return Err(CollageError::InvalidConfig(format!(
                "overscan must be >= 1.0, got {}",
                self.overscan
            )));
        }
        if !(self.freeform_cell.is_finite() && self.freeform_cell > 0.0) {
            return Err(CollageError::InvalidConfig(format!(
                "freeform_cell must be positive, got {}",
                self.freeform_cell
            )));
        }
        Ok(())
    }

    pub fn canvas_size(&self) -> Size {
        Size::new(self.canvas_width, self.canvas_height)
    }

    pub fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            radius_scale: self.radius_scale,
            freeform_cell: self.freeform_cell,
        }
    }
}

fn default_radius_scale() -> f64 {
    1.0
}
fn default_overscan() -> f64 {
    1.5
}
fn default_freeform_cell() -> f64 {
    FREEFORM_CELL
}
fn default_watermark_text() -> String {
    "Memory Collage - Free Version".into()
}

/// Builder for `CollageConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct CollageConfigBuilder {
    cfg: CollageConfig,
}

impl CollageConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: CollageConfig::default(),
        }
    }
    pub fn with_canvas(mut self, w: f64, h: f64) -> Self {
        self.cfg.canvas_width = w;
        self.cfg.canvas_height = h;
        self
    }
    pub fn radius_scale(mut self, v: f64) -> Self {
        self.cfg.radius_scale = v;
        self
    }
    pub fn overscan(mut self, v: f64) -> Self {
        self.cfg.overscan = v;
        self
    }
    pub fn freeform_cell(mut self, v: f64) -> Self {
        self.cfg.freeform_cell = v;
        self
    }
    pub fn background(mut self, v: Background) -> Self {
        self.cfg.background = v;
        self
    }
    pub fn resolution(mut self, v: ResolutionTier) -> Self {
        self.cfg.export.resolution = v;
        self
    }
    pub fn format(mut self, v: ExportFormat) -> Self {
        self.cfg.export.format = v;
        self
    }
    pub fn watermark_text(mut self, v: impl Into<String>) -> Self {
        self.cfg.watermark_text = v.into();
        self
    }
    pub fn build(self) -> CollageConfig {
        self.cfg
    }
}

impl CollageConfig {
    /// Create a fluent builder for `CollageConfig`.
    pub fn builder() -> CollageConfigBuilder {
        CollageConfigBuilder::new()
    }
}

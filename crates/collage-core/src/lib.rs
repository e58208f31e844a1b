//! Core library for laying out photo collages.
//!
//! - Layouts: grids, mosaics, circle/star/flower, heart, spiral, triangle, diamond and freeform
//! - Catalog: the ordered, immutable set of templates, looked up by id, position or name
//! - Placement: per-image pan, position and zoom layered over template cells
//! - Scene + compositing: draw-order description of a collage and a CPU renderer for it
//! - Session: the editing state machine with off-thread, watermark-aware export
//!
//! Quick example:
//! ```ignore
//! use collage_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let catalog = TemplateCatalog::builtin()?;
//! let grid = catalog.get(2).expect("2x2 grid");
//! let frames = compute_layout(grid, &LayoutParams::default(), 4, Size::new(1000.0, 1000.0));
//! assert_eq!(frames.len(), 4);
//! # Ok(()) }
//! ```

pub mod catalog;
pub mod compositing;
pub mod config;
pub mod entitlement;
pub mod error;
pub mod export;
pub mod layout;
pub mod model;
pub mod placement;
pub mod scene;
pub mod session;

pub use catalog::*;
pub use compositing::*;
pub use config::*;
pub use entitlement::*;
pub use error::*;
pub use export::*;
pub use layout::{Layout, LayoutParams, compute_layout, frame_for, layout_for};
pub use model::*;
pub use placement::*;
pub use scene::*;
pub use session::*;

/// Convenience prelude for common types and functions.
/// Importing `collage_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::catalog::TemplateCatalog;
    pub use crate::compositing::{RasterRenderer, SceneRenderer};
    pub use crate::config::{
        CollageConfig, CollageConfigBuilder, ExportFormat, ExportSettings, ResolutionTier,
    };
    pub use crate::entitlement::{Entitlement, SharedEntitlement, StaticEntitlement};
    pub use crate::export::{DirectorySink, EncodedImage, ExportSink};
    pub use crate::layout::{LayoutParams, compute_layout, frame_for};
    pub use crate::model::{Offset, Point, Rect, ShapeKind, Size, SourceImage, Template, TemplateType};
    pub use crate::placement::{PlacementEntry, PlacementState};
    pub use crate::scene::{Background, Color, OverlayId, Scene, SceneItem, TextOverlays};
    pub use crate::session::{EditingSession, EditorMode, ExportDispatch, ExportOutcome};
}

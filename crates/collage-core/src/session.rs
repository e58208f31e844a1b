//! Editing session: the state machine a host view drives.
//!
//! All mutations happen on the thread that owns the session. Exports render on a
//! worker thread; their completion comes back through an internal channel and is
//! handed to the [`ExportSink`] from [`EditingSession::poll_events`], so the sink
//! is only ever touched by the owning thread.

use crate::catalog::TemplateCatalog;
use crate::compositing::SceneRenderer;
use crate::config::{CollageConfig, ExportSettings};
use crate::entitlement::{Entitlement, resolve_watermark};
use crate::error::{CollageError, Result};
use crate::export::{self, EncodedImage, ExportSink};
use crate::model::{Offset, Point, Rect, Size, SourceImage, Template};
use crate::placement::PlacementState;
use crate::scene::{
    Background, ComposeOptions, DEFAULT_OVERLAY_POSITION, DEFAULT_OVERLAY_TEXT, OverlayId, Scene,
    TextMode, TextOverlays, compose_scene,
};
use rand::Rng;
use rand::seq::SliceRandom;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Footprint of a text overlay when computing the content bounding rect.
pub const TEXT_BOUNDS: Size = Size {
    width: 150.0,
    height: 50.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorMode {
    BrowsingTemplates,
    #[default]
    Editing,
    EditingText(OverlayId),
}

/// Identifies one export request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExportTicket(pub u64);

/// Immediate answer to [`EditingSession::request_export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDispatch {
    Started(ExportTicket),
    /// Nothing to export.
    NoImages,
    /// Another export is still rendering.
    Busy,
}

/// What happened to an export, reported once per ticket.
#[derive(Debug)]
pub enum ExportOutcome {
    Saved {
        ticket: ExportTicket,
        file_name: String,
        watermarked: bool,
    },
    Failed {
        ticket: ExportTicket,
        error: CollageError,
    },
}

impl ExportOutcome {
    pub fn ticket(&self) -> ExportTicket {
        match self {
            ExportOutcome::Saved { ticket, .. } | ExportOutcome::Failed { ticket, .. } => *ticket,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, ExportOutcome::Saved { .. })
    }
}

enum SessionEvent {
    ExportFinished {
        ticket: ExportTicket,
        watermarked: bool,
        result: Result<EncodedImage>,
    },
    PurchaseStateChanged,
}

/// Handle given to the purchase flow. Cheap to clone and usable from any thread.
#[derive(Clone)]
pub struct PurchaseNotifier {
    tx: Sender<SessionEvent>,
}

impl PurchaseNotifier {
    /// Signals that the entitlement changed. Returns `false` once the session is gone.
    pub fn notify(&self) -> bool {
        self.tx.send(SessionEvent::PurchaseStateChanged).is_ok()
    }
}

#[derive(Debug, Default)]
struct ExportState {
    in_flight: Option<ExportTicket>,
    next_ticket: u64,
    last_settings: Option<ExportSettings>,
    reexport_pending: bool,
}

/// A collage being edited, with at most one export in flight.
pub struct EditingSession {
    catalog: Arc<TemplateCatalog>,
    entitlement: Arc<dyn Entitlement>,
    renderer: Arc<dyn SceneRenderer>,
    sink: Box<dyn ExportSink>,
    config: CollageConfig,
    images: Vec<SourceImage>,
    template: Template,
    placements: PlacementState,
    overlays: TextOverlays,
    background: Background,
    mode: EditorMode,
    export: ExportState,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
}

impl EditingSession {
    /// Opens a session on the catalog's default template with no images.
    pub fn new(
        catalog: Arc<TemplateCatalog>,
        entitlement: Arc<dyn Entitlement>,
        renderer: Arc<dyn SceneRenderer>,
        sink: Box<dyn ExportSink>,
        config: CollageConfig,
    ) -> Result<Self> {
        config.validate()?;
        let template = catalog.default_template().clone();
        let (events_tx, events_rx) = mpsc::channel();
        Ok(Self {
            catalog,
            entitlement,
            renderer,
            sink,
            background: config.background,
            config,
            images: Vec::new(),
            template,
            placements: PlacementState::initialize(&[]),
            overlays: TextOverlays::new(),
            mode: EditorMode::Editing,
            export: ExportState::default(),
            events_tx,
            events_rx,
        })
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn images(&self) -> &[SourceImage] {
        &self.images
    }

    pub fn placements(&self) -> &PlacementState {
        &self.placements
    }

    pub fn overlays(&self) -> &TextOverlays {
        &self.overlays
    }

    pub fn background(&self) -> Background {
        self.background
    }

    pub fn canvas(&self) -> Size {
        self.config.canvas_size()
    }

    pub fn config(&self) -> &CollageConfig {
        &self.config
    }

    pub fn is_exporting(&self) -> bool {
        self.export.in_flight.is_some()
    }

    pub fn last_export_settings(&self) -> Option<ExportSettings> {
        self.export.last_settings
    }

    /// Replaces the selected photos, resetting every placement.
    pub fn set_images(&mut self, images: Vec<SourceImage>) {
        self.images = images;
        self.reinitialize_placements();
        debug!(count = self.images.len(), "images set");
    }

    pub fn open_template_browser(&mut self) {
        self.mode = EditorMode::BrowsingTemplates;
    }

    /// Applies template `id` and returns to editing.
    ///
    /// Base rectangles always follow the new template. User edits survive unless
    /// the switch enters or leaves freeform.
    pub fn select_template(&mut self, id: u32) -> Result<()> {
        let template = self
            .catalog
            .get(id)
            .cloned()
            .ok_or(CollageError::UnknownTemplate(id))?;
        let freeform_changed = template.kind.is_freeform() != self.template.kind.is_freeform();
        self.template = template;
        if freeform_changed {
            self.placements.reset();
        }
        self.relayout();
        self.mode = EditorMode::Editing;
        debug!(id, freeform_changed, "template selected");
        Ok(())
    }

    /// Host view reports its current size.
    pub fn set_canvas_size(&mut self, size: Size) -> Result<()> {
        if !size.is_drawable() {
            return Err(CollageError::InvalidDimensions {
                width: size.width,
                height: size.height,
            });
        }
        if size != self.canvas() {
            self.config.canvas_width = size.width;
            self.config.canvas_height = size.height;
            self.relayout();
        }
        Ok(())
    }

    pub fn set_radius_scale(&mut self, value: f64) -> Result<()> {
        if !(value.is_finite() && value > 0.0) {
            return Err(CollageError::InvalidConfig(format!(
                "radius_scale must be positive, got {value}"
            )));
        }
        self.config.radius_scale = value;
        self.relayout();
        Ok(())
    }

    /// Shuffles image order and starts every placement over.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.images.shuffle(rng);
        self.reinitialize_placements();
        debug!(count = self.images.len(), "images shuffled");
    }

    pub fn pan_image(&mut self, index: usize, translation: Offset) -> bool {
        self.placements.update_pan(index, translation)
    }

    pub fn end_pan(&mut self, index: usize) -> bool {
        self.placements.commit_pan(index)
    }

    pub fn move_image(&mut self, index: usize, point: Point) -> bool {
        self.placements.update_position(index, point)
    }

    pub fn scale_image(&mut self, index: usize, value: f64) -> bool {
        self.placements.update_scale(index, value)
    }

    pub fn select_background(&mut self, background: Background) {
        self.background = background;
    }

    /// Adds a "New Text" overlay at the default position.
    pub fn add_text(&mut self) -> OverlayId {
        self.overlays
            .add(DEFAULT_OVERLAY_TEXT, DEFAULT_OVERLAY_POSITION)
    }

    /// Starts editing an overlay in place.
    pub fn tap_text(&mut self, id: OverlayId) -> bool {
        if self.overlays.get(id).is_none() {
            return false;
        }
        self.overlays.finish_editing();
        self.overlays.set_mode(id, TextMode::Editing);
        self.mode = EditorMode::EditingText(id);
        true
    }

    /// Replaces the text of the overlay being edited.
    pub fn edit_text(&mut self, text: impl Into<String>) -> bool {
        match self.mode {
            EditorMode::EditingText(id) => self.overlays.set_text(id, text),
            _ => false,
        }
    }

    pub fn submit_text(&mut self) {
        self.overlays.finish_editing();
        if matches!(self.mode, EditorMode::EditingText(_)) {
            self.mode = EditorMode::Editing;
        }
    }

    pub fn drag_text(&mut self, id: OverlayId, position: Point) -> bool {
        self.overlays.move_to(id, position)
    }

    pub fn remove_text(&mut self, id: OverlayId) -> bool {
        if self.mode == EditorMode::EditingText(id) {
            self.mode = EditorMode::Editing;
        }
        self.overlays.remove(id)
    }

    /// Scene as shown while editing, without the watermark.
    pub fn scene(&self) -> Scene {
        self.compose(None)
    }

    /// Union of image cells and text boxes, for hosts that crop to content.
    ///
    /// Each text box extends [`TEXT_BOUNDS`] right and down from the overlay position.
    pub fn bounding_rect(&self) -> Option<Rect> {
        let cells = (0..self.placements.len()).filter_map(|i| self.placements.cell(i));
        let texts = self.overlays.iter().map(|o| {
            Rect::new(
                o.position.x,
                o.position.y,
                TEXT_BOUNDS.width,
                TEXT_BOUNDS.height,
            )
        });
        cells.chain(texts).reduce(|a, b| a.union(&b))
    }

    /// Snapshots the current composition and renders it off-thread.
    ///
    /// The entitlement is consulted here, once. Later edits do not affect the
    /// export. Only one export runs at a time.
    #[instrument(skip_all, fields(side = settings.resolution.side(), format = ?settings.format))]
    pub fn request_export(&mut self, settings: ExportSettings) -> ExportDispatch {
        if self.images.is_empty() {
            debug!("export ignored: no images");
            return ExportDispatch::NoImages;
        }
        if let Some(ticket) = self.export.in_flight {
            debug!(in_flight = ticket.0, "export rejected: busy");
            return ExportDispatch::Busy;
        }
        self.export.last_settings = Some(settings);

        let watermark = resolve_watermark(self.entitlement.as_ref(), &self.config.watermark_text);
        let watermarked = watermark.is_some();
        let scene = self.compose(watermark);

        let ticket = ExportTicket(self.export.next_ticket);
        self.export.next_ticket += 1;
        self.export.in_flight = Some(ticket);

        let renderer = Arc::clone(&self.renderer);
        let tx = self.events_tx.clone();
        std::thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                let target = export::render_target(scene.size, settings.resolution.side());
                renderer
                    .render(&scene, target)
                    .and_then(|img| export::finalize(&img, &settings))
            }))
            .unwrap_or_else(|payload| {
                Err(CollageError::RenderFailed(format!(
                    "renderer panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
            // receiver gone means the session was dropped
            let _ = tx.send(SessionEvent::ExportFinished {
                ticket,
                watermarked,
                result,
            });
        });
        info!(ticket = ticket.0, watermarked, "export started");
        ExportDispatch::Started(ticket)
    }

    pub fn purchase_notifier(&self) -> PurchaseNotifier {
        PurchaseNotifier {
            tx: self.events_tx.clone(),
        }
    }

    /// Processes pending events without blocking.
    pub fn poll_events(&mut self) -> Vec<ExportOutcome> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events_rx.try_recv() {
            self.handle_event(ev, &mut out);
        }
        out
    }

    /// Blocks until at least one event arrives (or `timeout` passes), then drains the queue.
    pub fn wait_events(&mut self, timeout: Duration) -> Vec<ExportOutcome> {
        let mut out = Vec::new();
        match self.events_rx.recv_timeout(timeout) {
            Ok(ev) => self.handle_event(ev, &mut out),
            Err(RecvTimeoutError::Timeout) => return out,
            Err(RecvTimeoutError::Disconnected) => return out,
        }
        out.extend(self.poll_events());
        out
    }

    /// Waits until no export is running and none is queued.
    pub fn wait_idle(&mut self, timeout: Duration) -> Vec<ExportOutcome> {
        let deadline = std::time::Instant::now() + timeout;
        let mut out = Vec::new();
        while self.is_exporting() || self.export.reexport_pending {
            let left = deadline.saturating_duration_since(std::time::Instant::now());
            if left.is_zero() {
                warn!("timed out waiting for export");
                break;
            }
            out.extend(self.wait_events(left));
        }
        out.extend(self.poll_events());
        out
    }

    fn handle_event(&mut self, ev: SessionEvent, out: &mut Vec<ExportOutcome>) {
        match ev {
            SessionEvent::ExportFinished {
                ticket,
                watermarked,
                result,
            } => {
                if self.export.in_flight == Some(ticket) {
                    self.export.in_flight = None;
                }
                let outcome = match result.and_then(|img| {
                    self.sink.deliver(&img)?;
                    Ok(img)
                }) {
                    Ok(img) => {
                        info!(ticket = ticket.0, file = %img.file_name, "export saved");
                        ExportOutcome::Saved {
                            ticket,
                            file_name: img.file_name,
                            watermarked,
                        }
                    }
                    Err(error) => {
                        warn!(ticket = ticket.0, error = %error, "export failed");
                        ExportOutcome::Failed { ticket, error }
                    }
                };
                out.push(outcome);
                if self.export.reexport_pending {
                    self.export.reexport_pending = false;
                    self.reexport();
                }
            }
            SessionEvent::PurchaseStateChanged => {
                if self.export.in_flight.is_some() {
                    self.export.reexport_pending = true;
                } else {
                    self.reexport();
                }
            }
        }
    }

    fn reexport(&mut self) {
        if let Some(settings) = self.export.last_settings {
            let dispatch = self.request_export(settings);
            debug!(?dispatch, "re-export after purchase change");
        }
    }

    fn compose(&self, watermark: Option<String>) -> Scene {
        let options = ComposeOptions {
            overscan: self.config.overscan,
            watermark,
        };
        compose_scene(
            &self.template,
            &self.placements,
            &self.overlays,
            &self.background,
            self.canvas(),
            &options,
        )
    }

    fn reinitialize_placements(&mut self) {
        self.placements = PlacementState::initialize(&self.images);
        self.relayout();
    }

    fn relayout(&mut self) {
        let params = self.config.layout_params();
        let canvas = self.canvas();
        self.placements.relayout(&self.template, &params, canvas);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

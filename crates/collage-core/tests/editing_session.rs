use collage_core::prelude::*;
use collage_core::{CollageError, UnavailableEntitlement, watermark_rect};
use image::{DynamicImage, Rgba, RgbaImage};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(30);

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<EncodedImage>>>);

impl ExportSink for SharedSink {
    fn deliver(&mut self, image: &EncodedImage) -> collage_core::Result<()> {
        self.0.lock().expect("sink lock").push(image.clone());
        Ok(())
    }
}

/// Single-threaded sink, as a UI-bound photo library would be.
#[derive(Clone, Default)]
struct LocalSink(Rc<RefCell<Vec<String>>>);

impl ExportSink for LocalSink {
    fn deliver(&mut self, image: &EncodedImage) -> collage_core::Result<()> {
        self.0.borrow_mut().push(image.file_name.clone());
        Ok(())
    }
}

struct FailingRenderer;

impl SceneRenderer for FailingRenderer {
    fn render(&self, _scene: &Scene, _target: Size) -> collage_core::Result<RgbaImage> {
        Err(CollageError::RenderFailed("snapshot produced nothing".into()))
    }
}

struct PanickingRenderer;

impl SceneRenderer for PanickingRenderer {
    fn render(&self, _scene: &Scene, _target: Size) -> collage_core::Result<RgbaImage> {
        panic!("renderer blew up");
    }
}

/// Blocks every render until the test releases it.
struct GateRenderer {
    gate: Mutex<Receiver<()>>,
    inner: RasterRenderer,
}

impl GateRenderer {
    fn new() -> (Self, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                gate: Mutex::new(rx),
                inner: RasterRenderer::new(),
            },
            tx,
        )
    }
}

impl SceneRenderer for GateRenderer {
    fn render(&self, scene: &Scene, target: Size) -> collage_core::Result<RgbaImage> {
        let _ = self.gate.lock().expect("gate lock").recv();
        self.inner.render(scene, target)
    }
}

fn images(n: usize) -> Vec<SourceImage> {
    (0..n)
        .map(|i| {
            let img = RgbaImage::from_pixel(16, 16, Rgba([(i * 40) as u8, 100, 100, 255]));
            SourceImage::new(format!("img{i}"), DynamicImage::ImageRgba8(img))
        })
        .collect()
}

fn config() -> CollageConfig {
    CollageConfig::builder()
        .with_canvas(300.0, 300.0)
        .background(Background::Solid {
            color: Color::WHITE,
        })
        .build()
}

fn png_low() -> ExportSettings {
    ExportSettings {
        resolution: ResolutionTier::Low,
        format: ExportFormat::Png,
    }
}

fn session_with(
    entitlement: Arc<dyn Entitlement>,
    renderer: Arc<dyn SceneRenderer>,
    sink: SharedSink,
) -> EditingSession {
    let catalog = Arc::new(TemplateCatalog::builtin().expect("catalog"));
    EditingSession::new(catalog, entitlement, renderer, Box::new(sink), config()).expect("session")
}

fn session(entitlement: Arc<dyn Entitlement>, sink: SharedSink) -> EditingSession {
    session_with(entitlement, Arc::new(RasterRenderer::new()), sink)
}

fn watermark_pixel(bytes: &[u8]) -> Rgba<u8> {
    let img = image::load_from_memory(bytes).expect("decode").to_rgba8();
    let band = watermark_rect("Memory Collage - Free Version", Size::new(300.0, 300.0));
    let k = img.width() as f64 / 300.0;
    *img.get_pixel((band.mid_x() * k) as u32, (band.mid_y() * k) as u32)
}

#[test]
fn starts_in_editing_on_default_template() {
    let s = session(Arc::new(StaticEntitlement(true)), SharedSink::default());
    assert_eq!(s.mode(), EditorMode::Editing);
    assert_eq!(s.template().id, 2);
    assert!(s.placements().is_empty());
}

#[test]
fn rejects_invalid_config() {
    let catalog = Arc::new(TemplateCatalog::builtin().expect("catalog"));
    let result = EditingSession::new(
        catalog,
        Arc::new(StaticEntitlement(true)),
        Arc::new(RasterRenderer::new()),
        Box::new(SharedSink::default()),
        CollageConfig::builder().with_canvas(-1.0, 10.0).build(),
    );
    assert!(matches!(result, Err(CollageError::InvalidDimensions { .. })));
}

#[test]
fn template_browser_round_trip() {
    let mut s = session(Arc::new(StaticEntitlement(true)), SharedSink::default());
    s.set_images(images(3));
    s.open_template_browser();
    assert_eq!(s.mode(), EditorMode::BrowsingTemplates);
    s.select_template(108).expect("circle");
    assert_eq!(s.mode(), EditorMode::Editing);
    assert_eq!(s.template().name, "Circle");
    assert!(matches!(
        s.select_template(4242),
        Err(CollageError::UnknownTemplate(4242))
    ));
    assert_eq!(s.template().id, 108);
}

#[test]
fn switching_between_grids_keeps_pan_but_freeform_resets() {
    let mut s = session(Arc::new(StaticEntitlement(true)), SharedSink::default());
    s.set_images(images(2));
    s.pan_image(0, Offset::new(12.0, 3.0));
    s.end_pan(0);

    s.select_template(3).expect("grid 3x3");
    assert_eq!(s.placements().get(0).map(|e| e.pan), Some(Offset::new(12.0, 3.0)));
    assert_eq!(s.placements().cell(0), Some(Rect::new(0.0, 0.0, 100.0, 300.0)));

    s.select_template(110).expect("freeform");
    assert_eq!(s.placements().get(0).map(|e| e.pan), Some(Offset::ZERO));
    assert!(s.move_image(1, Point::new(10.0, 20.0)));
    assert!(s.scale_image(1, 1.5));

    s.select_template(2).expect("grid 2x2");
    let e = s.placements().get(1).expect("entry");
    assert_eq!(e.position, Point::new(200.0, 250.0));
    assert_eq!(e.scale, 1.0);
    assert!(!s.move_image(1, Point::new(10.0, 20.0)));
}

#[test]
fn canvas_changes_relayout() {
    let mut s = session(Arc::new(StaticEntitlement(true)), SharedSink::default());
    s.set_images(images(4));
    s.set_canvas_size(Size::new(1000.0, 1000.0)).expect("canvas");
    assert_eq!(s.placements().cell(3), Some(Rect::new(500.0, 500.0, 500.0, 500.0)));
    assert!(s.set_canvas_size(Size::new(0.0, 10.0)).is_err());
    assert_eq!(s.canvas(), Size::new(1000.0, 1000.0));
}

#[test]
fn radius_scale_applies_to_circle() {
    let mut s = session(Arc::new(StaticEntitlement(true)), SharedSink::default());
    s.set_images(images(1));
    s.select_template(108).expect("circle");
    s.set_radius_scale(0.5).expect("scale");
    let c = s.placements().cell(0).expect("cell").center();
    assert!((c.x - 200.0).abs() < 1e-9 && (c.y - 150.0).abs() < 1e-9);
    assert!(s.set_radius_scale(0.0).is_err());
}

#[test]
fn shuffle_reorders_and_reinitializes() {
    let original: Vec<String> = images(6).into_iter().map(|i| i.key).collect();
    let mut changed = false;
    for seed in 0..8u64 {
        let mut s = session(Arc::new(StaticEntitlement(true)), SharedSink::default());
        s.set_images(images(6));
        s.select_template(110).expect("freeform");
        s.pan_image(2, Offset::new(5.0, 5.0));
        s.end_pan(2);
        s.move_image(3, Point::new(1.0, 1.0));
        s.scale_image(4, 2.0);

        let mut rng = StdRng::seed_from_u64(seed);
        s.shuffle(&mut rng);

        let keys: Vec<String> = s.images().iter().map(|i| i.key.clone()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(sorted, original);
        changed |= keys != original;

        for (i, e) in s.placements().entries().iter().enumerate() {
            assert_eq!(e.pan, Offset::ZERO);
            assert_eq!(e.scale, 1.0);
            assert_eq!(
                e.position,
                Point::new(150.0 + 50.0 * i as f64, 200.0 + 50.0 * i as f64)
            );
            assert_eq!(e.image.key, keys[i]);
        }
    }
    assert!(changed);
}

#[test]
fn shuffle_is_deterministic_for_a_seed() {
    let order = |seed: u64| {
        let mut s = session(Arc::new(StaticEntitlement(true)), SharedSink::default());
        s.set_images(images(5));
        s.shuffle(&mut StdRng::seed_from_u64(seed));
        s.images().iter().map(|i| i.key.clone()).collect::<Vec<_>>()
    };
    assert_eq!(order(7), order(7));
}

#[test]
fn text_editing_state_machine() {
    let mut s = session(Arc::new(StaticEntitlement(true)), SharedSink::default());
    let id = s.add_text();
    let overlay = s.overlays().get(id).expect("overlay");
    assert_eq!(overlay.text, "New Text");
    assert_eq!(overlay.position, Point::new(100.0, 100.0));

    assert!(!s.edit_text("ignored"));
    assert!(s.tap_text(id));
    assert_eq!(s.mode(), EditorMode::EditingText(id));
    assert!(s.edit_text("Summer 2024"));
    s.submit_text();
    assert_eq!(s.mode(), EditorMode::Editing);
    assert_eq!(s.overlays().get(id).map(|o| o.text.as_str()), Some("Summer 2024"));

    assert!(s.drag_text(id, Point::new(40.0, 60.0)));
    assert_eq!(s.overlays().get(id).map(|o| o.position), Some(Point::new(40.0, 60.0)));

    assert!(s.tap_text(id));
    assert!(s.remove_text(id));
    assert_eq!(s.mode(), EditorMode::Editing);
    assert!(s.overlays().is_empty());
    assert!(!s.tap_text(id));
}

#[test]
fn bounding_rect_covers_images_and_text() {
    let mut s = session(Arc::new(StaticEntitlement(true)), SharedSink::default());
    assert_eq!(s.bounding_rect(), None);
    s.set_images(images(2));
    s.select_template(110).expect("freeform");
    s.add_text();
    assert_eq!(s.bounding_rect(), Some(Rect::new(50.0, 100.0, 250.0, 250.0)));

    let id = s.add_text();
    s.drag_text(id, Point::new(300.0, 20.0));
    assert_eq!(s.bounding_rect(), Some(Rect::new(50.0, 20.0, 400.0, 330.0)));
}

#[test]
fn export_without_images_is_a_no_op() {
    let sink = SharedSink::default();
    let mut s = session(Arc::new(StaticEntitlement(false)), sink.clone());
    assert_eq!(s.request_export(png_low()), ExportDispatch::NoImages);
    assert!(!s.is_exporting());
    assert!(s.poll_events().is_empty());
    assert!(sink.0.lock().expect("lock").is_empty());
}

#[test]
fn unpurchased_export_carries_watermark() {
    let sink = SharedSink::default();
    let mut s = session(Arc::new(StaticEntitlement(false)), sink.clone());
    s.set_images(images(1));
    s.select_template(108).expect("circle");

    let dispatch = s.request_export(png_low());
    assert!(matches!(dispatch, ExportDispatch::Started(_)));
    let outcomes = s.wait_idle(WAIT);
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        ExportOutcome::Saved {
            file_name,
            watermarked,
            ..
        } => {
            assert_eq!(file_name, "collage.png");
            assert!(*watermarked);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let delivered = sink.0.lock().expect("lock");
    assert_eq!(delivered.len(), 1);
    assert_eq!((delivered[0].width, delivered[0].height), (720, 720));
    let p = watermark_pixel(&delivered[0].bytes);
    assert!(p[0] < 200, "expected watermark band, got {p:?}");
}

#[test]
fn purchased_export_is_clean() {
    let sink = SharedSink::default();
    let mut s = session(Arc::new(StaticEntitlement(true)), sink.clone());
    s.set_images(images(1));
    s.select_template(108).expect("circle");
    s.request_export(png_low());
    let outcomes = s.wait_idle(WAIT);
    assert!(matches!(
        outcomes.as_slice(),
        [ExportOutcome::Saved {
            watermarked: false,
            ..
        }]
    ));
    let delivered = sink.0.lock().expect("lock");
    assert_eq!(watermark_pixel(&delivered[0].bytes), Rgba([255, 255, 255, 255]));
}

#[test]
fn entitlement_failure_fails_closed() {
    let sink = SharedSink::default();
    let entitlement = UnavailableEntitlement {
        reason: "store unreachable".into(),
    };
    let mut s = session(Arc::new(entitlement), sink.clone());
    s.set_images(images(2));
    assert!(matches!(s.request_export(png_low()), ExportDispatch::Started(_)));
    let outcomes = s.wait_idle(WAIT);
    assert!(matches!(
        outcomes.as_slice(),
        [ExportOutcome::Saved {
            watermarked: true,
            ..
        }]
    ));
}

#[test]
fn render_failure_is_reported_not_retried() {
    let sink = SharedSink::default();
    let mut s = session_with(
        Arc::new(StaticEntitlement(true)),
        Arc::new(FailingRenderer),
        sink.clone(),
    );
    s.set_images(images(1));
    let ExportDispatch::Started(ticket) = s.request_export(png_low()) else {
        panic!("export should start");
    };
    let outcomes = s.wait_idle(WAIT);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].ticket(), ticket);
    assert!(matches!(
        &outcomes[0],
        ExportOutcome::Failed {
            error: CollageError::RenderFailed(_),
            ..
        }
    ));
    assert!(!s.is_exporting());
    assert!(sink.0.lock().expect("lock").is_empty());
}

#[test]
fn second_export_while_busy_is_rejected() {
    let sink = SharedSink::default();
    let (renderer, release) = GateRenderer::new();
    let mut s = session_with(Arc::new(StaticEntitlement(true)), Arc::new(renderer), sink.clone());
    s.set_images(images(2));

    let first = s.request_export(png_low());
    assert!(matches!(first, ExportDispatch::Started(_)));
    assert!(s.is_exporting());
    assert_eq!(s.request_export(png_low()), ExportDispatch::Busy);

    release.send(()).expect("release");
    let outcomes = s.wait_idle(WAIT);
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_saved());
    assert!(!s.is_exporting());
    assert!(matches!(s.request_export(png_low()), ExportDispatch::Started(_)));
    release.send(()).expect("release");
    s.wait_idle(WAIT);
    assert_eq!(sink.0.lock().expect("lock").len(), 2);
}

#[test]
fn export_uses_the_snapshot_taken_at_request() {
    let sink = SharedSink::default();
    let (renderer, release) = GateRenderer::new();
    let mut s = session_with(Arc::new(StaticEntitlement(true)), Arc::new(renderer), sink.clone());
    s.set_images(images(1));
    s.select_template(108).expect("circle");
    s.request_export(png_low());

    s.select_background(Background::Solid {
        color: Color::BLACK,
    });
    release.send(()).expect("release");
    s.wait_idle(WAIT);

    let delivered = sink.0.lock().expect("lock");
    let img = image::load_from_memory(&delivered[0].bytes)
        .expect("decode")
        .to_rgba8();
    assert_eq!(img.get_pixel(5, 5), &Rgba([255, 255, 255, 255]));
}

#[test]
fn purchase_change_triggers_reexport_with_last_settings() {
    let sink = SharedSink::default();
    let entitlement = SharedEntitlement::new(false);
    let mut s = session(Arc::new(entitlement.clone()), sink.clone());
    s.set_images(images(1));
    let notifier = s.purchase_notifier();

    // nothing exported yet: nothing to redo
    assert!(notifier.notify());
    assert!(s.poll_events().is_empty());
    assert!(!s.is_exporting());

    s.request_export(png_low());
    let first = s.wait_idle(WAIT);
    assert!(matches!(
        first.as_slice(),
        [ExportOutcome::Saved {
            watermarked: true,
            ..
        }]
    ));

    entitlement.set_purchased(true);
    assert!(notifier.notify());
    assert!(s.poll_events().is_empty());
    assert!(s.is_exporting());
    let second = s.wait_idle(WAIT);
    assert!(matches!(
        second.as_slice(),
        [ExportOutcome::Saved {
            watermarked: false,
            ..
        }]
    ));
    assert_eq!(s.last_export_settings(), Some(png_low()));
    assert_eq!(sink.0.lock().expect("lock").len(), 2);
}

#[test]
fn purchase_change_during_export_is_deferred() {
    let sink = SharedSink::default();
    let entitlement = SharedEntitlement::new(false);
    let (renderer, release) = GateRenderer::new();
    let mut s = session_with(Arc::new(entitlement.clone()), Arc::new(renderer), sink.clone());
    s.set_images(images(1));

    s.request_export(png_low());
    entitlement.set_purchased(true);
    s.purchase_notifier().notify();
    assert!(s.poll_events().is_empty());

    release.send(()).expect("release");
    release.send(()).expect("release");
    let outcomes = s.wait_idle(WAIT);
    let flags: Vec<bool> = outcomes
        .iter()
        .map(|o| match o {
            ExportOutcome::Saved { watermarked, .. } => *watermarked,
            ExportOutcome::Failed { error, .. } => panic!("export failed: {error}"),
        })
        .collect();
    assert_eq!(flags, vec![true, false]);
}

#[test]
fn renderer_panic_is_reported_and_session_recovers() {
    let sink = SharedSink::default();
    let mut s = session_with(
        Arc::new(StaticEntitlement(true)),
        Arc::new(PanickingRenderer),
        sink.clone(),
    );
    s.set_images(images(1));
    let ExportDispatch::Started(first) = s.request_export(png_low()) else {
        panic!("export should start");
    };
    let outcomes = s.wait_idle(WAIT);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].ticket(), first);
    assert!(matches!(
        &outcomes[0],
        ExportOutcome::Failed {
            error: CollageError::RenderFailed(msg),
            ..
        } if msg.contains("renderer blew up")
    ));
    assert!(!s.is_exporting());
    assert!(sink.0.lock().expect("lock").is_empty());

    let second = s.request_export(png_low());
    assert!(matches!(second, ExportDispatch::Started(t) if t != first));
    assert_eq!(s.wait_idle(WAIT).len(), 1);
}

#[test]
fn empty_source_image_is_skipped() {
    let sink = SharedSink::default();
    let mut s = session(Arc::new(StaticEntitlement(true)), sink.clone());
    let mut set = images(1);
    set.push(SourceImage::new(
        "empty",
        DynamicImage::ImageRgba8(RgbaImage::new(0, 0)),
    ));
    s.set_images(set);

    assert!(matches!(
        s.request_export(png_low()),
        ExportDispatch::Started(_)
    ));
    let outcomes = s.wait_idle(WAIT);
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_saved());
    assert!(!s.is_exporting());
    assert_eq!(sink.0.lock().expect("lock").len(), 1);
}

#[test]
fn sink_stays_on_the_owning_thread() {
    let sink = LocalSink::default();
    let catalog = Arc::new(TemplateCatalog::builtin().expect("catalog"));
    let mut s = EditingSession::new(
        catalog,
        Arc::new(StaticEntitlement(true)),
        Arc::new(RasterRenderer::new()),
        Box::new(sink.clone()),
        config(),
    )
    .expect("session");
    s.set_images(images(2));
    assert!(matches!(
        s.request_export(png_low()),
        ExportDispatch::Started(_)
    ));
    assert_eq!(s.wait_idle(WAIT).len(), 1);
    assert_eq!(*sink.0.borrow(), vec!["collage.png".to_string()]);
}

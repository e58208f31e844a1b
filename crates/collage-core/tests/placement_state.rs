use collage_core::prelude::*;
use collage_core::{MAX_SCALE, MIN_SCALE};
use image::{DynamicImage, Rgba, RgbaImage};

fn images(n: usize) -> Vec<SourceImage> {
    (0..n)
        .map(|i| {
            let img = RgbaImage::from_pixel(8, 8, Rgba([i as u8, 0, 0, 255]));
            SourceImage::new(format!("img{i}"), DynamicImage::ImageRgba8(img))
        })
        .collect()
}

fn catalog() -> TemplateCatalog {
    TemplateCatalog::builtin().expect("catalog")
}

#[test]
fn initialize_staggers_freeform_positions() {
    let state = PlacementState::initialize(&images(4));
    assert_eq!(state.len(), 4);
    for (i, e) in state.entries().iter().enumerate() {
        let step = 50.0 * i as f64;
        assert_eq!(e.position, Point::new(150.0 + step, 200.0 + step));
        assert_eq!(e.scale, 1.0);
        assert_eq!(e.pan, Offset::ZERO);
    }
}

#[test]
fn relayout_assigns_cells_with_wraparound() {
    let catalog = catalog();
    let cross = catalog.find_by_name("Cross").expect("cross");
    let mut state = PlacementState::initialize(&images(3));
    state.relayout(cross, &LayoutParams::default(), Size::new(100.0, 100.0));
    assert_eq!(state.cell(0), state.cell(2));
    assert_ne!(state.cell(0), state.cell(1));
    assert_eq!(state.cell(3), None);
}

#[test]
fn pan_is_relative_to_gesture_start() {
    let mut state = PlacementState::initialize(&images(1));
    assert!(state.update_pan(0, Offset::new(10.0, 5.0)));
    assert!(state.update_pan(0, Offset::new(20.0, 10.0)));
    // same event again changes nothing
    assert!(state.update_pan(0, Offset::new(20.0, 10.0)));
    assert_eq!(state.get(0).map(|e| e.pan), Some(Offset::new(20.0, 10.0)));

    assert!(state.commit_pan(0));
    state.update_pan(0, Offset::new(-5.0, 0.0));
    assert_eq!(state.get(0).map(|e| e.pan), Some(Offset::new(15.0, 10.0)));

    assert!(!state.update_pan(5, Offset::new(1.0, 1.0)));
    assert!(!state.commit_pan(5));
}

#[test]
fn position_and_scale_only_apply_in_freeform() {
    let catalog = catalog();
    let canvas = Size::new(600.0, 600.0);
    let mut state = PlacementState::initialize(&images(2));
    state.relayout(catalog.default_template(), &LayoutParams::default(), canvas);
    assert!(!state.is_freeform());
    assert!(!state.update_position(0, Point::new(1.0, 1.0)));
    assert!(!state.update_scale(0, 1.5));

    let freeform = catalog.find_by_name("Freeform").expect("freeform");
    state.relayout(freeform, &LayoutParams::default(), canvas);
    assert!(state.is_freeform());
    assert!(state.update_position(1, Point::new(300.0, 300.0)));
    assert!(state.update_scale(1, 1.5));
    assert_eq!(state.cell(1), Some(Rect::new(150.0, 150.0, 300.0, 300.0)));
}

#[test]
fn scale_is_clamped() {
    let catalog = catalog();
    let freeform = catalog.find_by_name("Freeform").expect("freeform");
    let mut state = PlacementState::initialize(&images(1));
    state.relayout(freeform, &LayoutParams::default(), Size::new(500.0, 500.0));

    state.update_scale(0, 10.0);
    assert_eq!(state.get(0).map(|e| e.scale), Some(MAX_SCALE));
    state.update_scale(0, 0.01);
    assert_eq!(state.get(0).map(|e| e.scale), Some(MIN_SCALE));
    assert!(!state.update_scale(0, f64::NAN));
    assert_eq!(state.get(0).map(|e| e.scale), Some(MIN_SCALE));
}

#[test]
fn reset_drops_every_override() {
    let catalog = catalog();
    let freeform = catalog.find_by_name("Freeform").expect("freeform");
    let mut state = PlacementState::initialize(&images(2));
    state.relayout(freeform, &LayoutParams::default(), Size::new(500.0, 500.0));
    state.update_pan(0, Offset::new(3.0, 4.0));
    state.commit_pan(0);
    state.update_position(1, Point::new(10.0, 10.0));
    state.update_scale(1, 2.0);

    state.reset();
    for (i, e) in state.entries().iter().enumerate() {
        assert_eq!(e.pan, Offset::ZERO);
        assert_eq!(e.committed_pan, Offset::ZERO);
        assert_eq!(e.scale, 1.0);
        assert_eq!(e.position, Point::new(150.0 + 50.0 * i as f64, 200.0 + 50.0 * i as f64));
    }
}

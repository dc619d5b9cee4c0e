//! End-to-end editor scenarios: intake → arrange → generate → export.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use slicegrid::canvas::{BackgroundConfig, GridConfig};
use slicegrid::export::{ExportPackager, archive_name};
use slicegrid::geometry::{Point, ViewportSize};
use slicegrid::gesture::{GestureController, GestureEvent, HitTarget};
use slicegrid::intake::{DecodeBatch, IntakePolicy, SourceFile, decode, ingest};
use slicegrid::raster::{Rasterizer, SliceFormat};
use slicegrid::store::LayerStore;

fn png_file(name: &str, w: u32, h: u32, color: [u8; 4]) -> SourceFile {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(color)))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    SourceFile::new(name, Some("image/png"), out.into_inner())
}

#[test]
fn covering_opaque_layer_gives_two_opaque_slices() {
    let mut store = LayerStore::new(
        GridConfig::default(),
        BackgroundConfig { is_transparent: false, color: "#ffffff".into() },
    );
    let report = ingest(&mut store, &[png_file("wide.png", 216, 108, [10, 120, 200, 255])], IntakePolicy::BestEffort);
    let id = report.added[0];
    // 216 × 10 = 2160, 108 × 10 = 1080: exactly the canvas. The slider caps
    // at 5×, so the scale goes straight into the store.
    store.update_layer(
        id,
        slicegrid::LayerPatch { x: Some(0.0), y: Some(0.0), scale: Some(10.0), ..Default::default() },
    );

    let master = Rasterizer::new(&store).compose_master().unwrap();
    assert_eq!(master.dimensions(), (2160, 1080));
    assert!(master.pixels().all(|p| p.0 == [10, 120, 200, 255]));

    let out = Rasterizer::new(&store).generate().unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out.format, SliceFormat::Jpeg);
    for slice in &out.slices {
        let img = image::load_from_memory(&slice.bytes).unwrap();
        assert_eq!((img.width(), img.height()), (1080, 1080));
        assert!(!img.color().has_alpha());
        let rgb = img.to_rgb8();
        for (x, y) in [(0, 0), (540, 540), (1079, 1079)] {
            let px = rgb.get_pixel(x, y).0;
            assert!(px[2] > 150 && px[0] < 60, "{:?} at {},{}", px, x, y);
        }
    }
}

#[test]
fn empty_transparent_single_cell_is_fully_transparent_png() {
    let mut store = LayerStore::default();
    store.update_grid(-1, 0);
    let out = Rasterizer::new(&store).generate().unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out.format, SliceFormat::Png);
    let img = image::load_from_memory_with_format(&out.slices[0].bytes, ImageFormat::Png)
        .unwrap()
        .to_rgba8();
    assert_eq!(img.dimensions(), (1080, 1080));
    assert!(img.pixels().all(|p| p[3] == 0));
}

#[test]
fn drag_near_left_edge_snaps_to_zero() {
    let viewport = ViewportSize::new(1400.0, 900.0);
    let mut store = LayerStore::default();
    let id = ingest(&mut store, &[png_file("a.png", 300, 300, [0, 0, 0, 255])], IntakePolicy::BestEffort).added[0];
    let mut gc = GestureController::new(viewport);

    let t = store.view_transform(viewport);
    let layer = store.layer(id).unwrap().clone();
    let grab = Point::new(layer.x + 20.0, layer.y + 20.0);
    gc.handle(&mut store, GestureEvent::PointerDown { contacts: vec![t.canvas_to_screen(grab)], target: HitTarget::Layer(id) });
    // Left edge ends up 10px from x = 0.
    let to = Point::new(10.0 + 20.0, layer.y + 20.0);
    gc.handle(&mut store, GestureEvent::PointerMove { contacts: vec![t.canvas_to_screen(to)] });

    assert_eq!(store.layer(id).unwrap().x, 0.0);
    assert_eq!(gc.snap_feedback().x, Some(0.0));
    gc.handle(&mut store, GestureEvent::PointerUp { remaining: 0 });
    assert!(!gc.snap_feedback().is_snapping());
    assert_eq!(store.layer(id).unwrap().x, 0.0);
}

#[test]
fn out_of_order_decodes_keep_input_order() {
    let files = [
        png_file("1.png", 50, 50, [255, 0, 0, 255]),
        png_file("2.png", 50, 50, [0, 255, 0, 255]),
        png_file("3.png", 50, 50, [0, 0, 255, 255]),
    ];
    let mut store = LayerStore::default();
    let mut batch = DecodeBatch::new(files.iter().map(|f| f.name.clone()).collect(), IntakePolicy::BestEffort);

    batch.complete(2, decode(&files[2]));
    batch.complete(0, decode(&files[0]));
    let mut batch = match batch.commit(&mut store) {
        Err(pending) => pending,
        Ok(_) => panic!("committed with a decode outstanding"),
    };
    assert!(store.layers().is_empty());
    batch.complete(1, decode(&files[1]));
    let report = batch.commit(&mut store).ok().unwrap();

    let layers: Vec<_> = report.added.iter().map(|id| store.layer(*id).unwrap()).collect();
    let names: Vec<_> = layers.iter().map(|l| l.source_name.as_str()).collect();
    assert_eq!(names, ["1.png", "2.png", "3.png"]);
    assert!(layers[0].z_index < layers[1].z_index && layers[1].z_index < layers[2].z_index);
    assert!(layers[0].x < layers[1].x && layers[1].x < layers[2].x);
    assert_eq!(store.active_layer_id(), Some(report.added[2]));
}

#[test]
fn generate_then_export_then_continue_editing() {
    let mut store = LayerStore::default();
    ingest(&mut store, &[png_file("trip.photo.png", 64, 64, [1, 2, 3, 255])], IntakePolicy::BestEffort);
    let out = Rasterizer::new(&store).generate().unwrap();
    let prefix = out.filename_prefix();
    assert!(prefix.starts_with("trip.photo_"));
    store.set_results(out);

    let dir = tempfile::tempdir().unwrap();
    let path = ExportPackager::new(&store).save_archive(dir.path()).unwrap();
    assert_eq!(path.file_name().unwrap().to_string_lossy(), archive_name(&prefix));

    let archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
    let members = archive.file_names().filter(|n| !n.ends_with('/')).count();
    assert_eq!(members, 2);

    store.clear_results();
    assert!(store.results().is_none());
    assert_eq!(store.layers().len(), 1);
    store.reset();
    assert!(store.layers().is_empty());
}

#[test]
fn pixels_are_shared_not_copied_on_update() {
    let mut store = LayerStore::default();
    let id = ingest(&mut store, &[png_file("a.png", 8, 8, [0, 0, 0, 255])], IntakePolicy::BestEffort).added[0];
    let before = Arc::clone(&store.layer(id).unwrap().pixels);
    store.update_layer(id, slicegrid::LayerPatch::position(1.0, 1.0));
    assert!(Arc::ptr_eq(&before, &store.layer(id).unwrap().pixels));
}

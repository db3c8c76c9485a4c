//! Integration tests for card export (card-render).
//!
//! Drives an editor session with the real decoder and exporter: imports,
//! thumbnails on save, template reloads and forced deselection on export.

use std::sync::Arc;

use card_core::{
    EditorConfig, EditorSession, ElementKind, EncodedImage, MemoryTemplateStore, Mutation,
    Point, TextEdit,
};
use card_render::export::{ExportConfig, ExportFormat, SceneExporter};
use card_render::image::encode_png;
use card_render::RasterDecoder;

/// Encode a solid-colour PNG.
fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> EncodedImage {
    let pixels = rgba.repeat((width * height) as usize);
    EncodedImage::new("image/png", encode_png(width, height, &pixels).expect("png"))
}

fn session() -> EditorSession {
    EditorSession::new(
        EditorConfig::default(),
        Arc::new(MemoryTemplateStore::new()),
        Arc::new(RasterDecoder::new()),
    )
}

/// Read the RGBA pixel at `(x, y)` of a PNG.
fn pixel_at(png: &[u8], x: u32, y: u32) -> [u8; 4] {
    let decoded = image::load_from_memory(png).expect("decode").to_rgba8();
    decoded.get_pixel(x, y).0
}

// ==========================================================================
// Session export
// ==========================================================================

#[tokio::test]
async fn test_export_deselects_and_renders_imported_image() {
    let mut session = session();
    let id = session
        .import_image(solid_png(20, 10, [0, 0, 255, 255]))
        .await
        .expect("import")
        .expect("added");
    assert!(session.scene().is_selected(ElementKind::Image, id));

    let exporter = SceneExporter::with_defaults();
    let png = session.export_raster(&exporter, 1.0).expect("export");
    assert!(session.scene().selection().is_none());

    // The image was fitted to 200x100 at (50, 50).
    assert_eq!(pixel_at(&png.bytes, 150, 100), [0, 0, 255, 255]);
    assert_eq!(pixel_at(&png.bytes, 10, 10), [255, 255, 255, 255]);
}

#[tokio::test]
async fn test_pdf_export_from_session() {
    let mut session = session();
    session.apply(Mutation::AddText).expect("add");
    let pdf = session
        .export_pdf(&SceneExporter::with_defaults())
        .expect("pdf");
    assert_eq!(&pdf[0..5], b"%PDF-");
    assert!(session.scene().selection().is_none());
}

#[tokio::test]
async fn test_background_colour_and_image_render() {
    let mut session = session();
    session
        .apply(Mutation::SetBackgroundColor("#00ff00".to_string()))
        .expect("colour");
    let png = session
        .export_raster(&SceneExporter::with_defaults(), 0.5)
        .expect("export");
    assert_eq!(pixel_at(&png.bytes, 5, 5), [0, 255, 0, 255]);

    assert!(session
        .import_background("red.png", solid_png(4, 4, [255, 0, 0, 255]))
        .await
        .expect("background"));
    let png = session
        .export_raster(&SceneExporter::with_defaults(), 0.5)
        .expect("export");
    assert_eq!(pixel_at(&png.bytes, 175, 100), [255, 0, 0, 255]);
}

// ==========================================================================
// Templates
// ==========================================================================

#[tokio::test]
async fn test_saved_template_carries_thumbnail_and_reloads() {
    let mut session = session();
    let text = match session.apply(Mutation::AddText).expect("add") {
        card_core::MutationOutcome::Created(sel) => sel.id,
        other => panic!("unexpected outcome {other:?}"),
    };
    session
        .apply(Mutation::EditText {
            id: text,
            edit: TextEdit::Content("Jane Doe".to_string()),
        })
        .expect("edit");
    session
        .apply(Mutation::Drag {
            kind: ElementKind::Text,
            id: text,
            to: Point::new(120.0, 80.0),
        })
        .expect("drag");
    session
        .import_image(solid_png(8, 8, [10, 20, 30, 255]))
        .await
        .expect("import");

    let exporter = SceneExporter::new(ExportConfig {
        thumbnail_max_size: 140,
        ..Default::default()
    });
    let id = session
        .save_template("Card A", Some(&exporter))
        .await
        .expect("save");

    let record = session
        .list_templates()
        .await
        .expect("list")
        .into_iter()
        .find(|r| r.id == id)
        .expect("record");
    let thumbnail = EncodedImage::from_data_uri(record.thumbnail.as_deref().expect("thumbnail"))
        .expect("data uri");
    let decoded = image::load_from_memory(&thumbnail.bytes).expect("decode");
    assert_eq!((decoded.width(), decoded.height()), (140, 80));

    session.new_card();
    session.load_template(id).await.expect("load");
    let restored = session.scene().text(text).expect("text");
    assert_eq!(restored.content, "Jane Doe");
    assert!((restored.x - 120.0).abs() < f32::EPSILON);
    assert_eq!(session.scene().images().len(), 1);
    assert_eq!(session.scene().images()[0].bitmap.width(), 8);
}

// ==========================================================================
// Formats
// ==========================================================================

#[test]
fn test_all_formats_for_default_canvas() {
    let scene = card_core::Scene::default();
    let exporter = SceneExporter::with_defaults();

    let png = exporter.export(&scene, ExportFormat::Png).expect("png");
    let decoded = image::load_from_memory(&png).expect("decode");
    assert_eq!((decoded.width(), decoded.height()), (700, 400));

    let jpeg = exporter.export(&scene, ExportFormat::Jpeg).expect("jpeg");
    assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);

    let svg = String::from_utf8(exporter.export(&scene, ExportFormat::Svg).expect("svg"))
        .expect("utf8");
    assert!(svg.contains("viewBox=\"0 0 700 400\""));

    let pdf = exporter.export(&scene, ExportFormat::Pdf).expect("pdf");
    assert_eq!(&pdf[0..5], b"%PDF-");
}

#[test]
fn test_rounded_corners_show_export_background_in_jpeg() {
    let mut scene = card_core::Scene::default();
    scene.set_background_color("#000000");
    scene.set_background_corner_radius(50.0);

    let exporter = SceneExporter::new(ExportConfig {
        background: [255, 255, 255, 255],
        jpeg_quality: 100,
        ..Default::default()
    });
    let jpeg = exporter.render_to_jpeg(&scene).expect("jpeg");
    let decoded = image::load_from_memory(&jpeg).expect("decode").to_rgb8();
    let corner = decoded.get_pixel(0, 0).0;
    let centre = decoded.get_pixel(350, 200).0;
    assert!(corner.iter().all(|&c| c > 240), "corner {corner:?}");
    assert!(centre.iter().all(|&c| c < 15), "centre {centre:?}");
}

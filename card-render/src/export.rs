//! Scene export to image/document formats.
//!
//! Renders a [`Scene`] to PNG, JPEG, SVG or PDF using an SVG intermediate
//! representation and the resvg/tiny-skia rasterization pipeline.
//!
//! Paint order matches the editor: card fill, background image, images in
//! z-order, then texts.

use std::fmt::Write;
use std::sync::Arc;

use card_core::{
    Background, CardResult, EncodedImage, ImageElement, Scene, SceneRenderer, TextElement,
};
use image::ImageEncoder;

use crate::error::{RenderError, RenderResult};
use crate::image::{embeddable_data_uri, generate_thumbnail};

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// PNG image.
    Png,
    /// JPEG image.
    Jpeg,
    /// SVG vector graphics (returns the SVG XML string as UTF-8 bytes).
    Svg,
    /// PDF document with embedded raster image.
    Pdf,
}

/// Configuration for scene export.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Logical width override (default: canvas width).
    pub width: Option<u32>,
    /// Logical height override (default: canvas height).
    pub height: Option<u32>,
    /// DPI used to size PDF pages (default: 96.0).
    pub dpi: f32,
    /// Colour behind transparent card corners, as RGBA bytes.
    pub background: [u8; 4],
    /// JPEG quality 1-100 (default: 85).
    pub jpeg_quality: u8,
    /// Pixel density (e.g. 2.0 for retina).
    pub scale: f32,
    /// Longer side of template thumbnails in pixels.
    pub thumbnail_max_size: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            dpi: 96.0,
            background: [255, 255, 255, 255],
            jpeg_quality: 85,
            scale: 1.0,
            thumbnail_max_size: 256,
        }
    }
}

/// Exports a [`Scene`] to various image and document formats.
pub struct SceneExporter {
    config: ExportConfig,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl SceneExporter {
    /// Create a new exporter with the given configuration.
    ///
    /// System fonts are loaded once so text renders in every raster format.
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        tracing::debug!("Loaded {} font faces for export", fontdb.len());
        Self {
            config,
            fontdb: Arc::new(fontdb),
        }
    }

    /// Create an exporter with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ExportConfig::default())
    }

    /// The export configuration.
    #[must_use]
    pub const fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export a scene to the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if the scene cannot be rendered or encoded.
    pub fn export(&self, scene: &Scene, format: ExportFormat) -> RenderResult<Vec<u8>> {
        match format {
            ExportFormat::Png => self.render_to_png(scene),
            ExportFormat::Jpeg => self.render_to_jpeg(scene),
            ExportFormat::Svg => {
                let svg = self.render_to_svg(scene)?;
                Ok(svg.into_bytes())
            }
            ExportFormat::Pdf => self.render_to_pdf_bytes(scene),
        }
    }

    /// Export the scene to PNG bytes at the configured density.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or encoding fails.
    pub fn render_to_png(&self, scene: &Scene) -> RenderResult<Vec<u8>> {
        self.render_to_raster_bytes(scene, self.config.scale)
    }

    /// Export the scene to PNG bytes at `pixel_density` device pixels per
    /// canvas unit.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Export`] for a non-positive density or if
    /// rendering fails.
    pub fn render_to_raster_bytes(
        &self,
        scene: &Scene,
        pixel_density: f32,
    ) -> RenderResult<Vec<u8>> {
        let pixmap = self.rasterize(scene, pixel_density)?;
        pixmap
            .encode_png()
            .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}")))
    }

    /// Export the scene to JPEG bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or encoding fails.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn render_to_jpeg(&self, scene: &Scene) -> RenderResult<Vec<u8>> {
        let pixmap = self.rasterize(scene, self.config.scale)?;

        let (width, height) = (pixmap.width(), pixmap.height());
        let bg = &self.config.background;
        let mut rgb_data = Vec::with_capacity((width * height * 3) as usize);
        // tiny-skia pixels are premultiplied, so compositing is an add.
        for pixel in pixmap.data().chunks_exact(4) {
            let inv = 1.0 - f32::from(pixel[3]) / 255.0;
            rgb_data.push(f32::from(bg[0]).mul_add(inv, f32::from(pixel[0])) as u8);
            rgb_data.push(f32::from(bg[1]).mul_add(inv, f32::from(pixel[1])) as u8);
            rgb_data.push(f32::from(bg[2]).mul_add(inv, f32::from(pixel[2])) as u8);
        }

        let mut buf = std::io::Cursor::new(Vec::new());
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, self.config.jpeg_quality);
        encoder
            .write_image(&rgb_data, width, height, image::ColorType::Rgb8.into())
            .map_err(|e| RenderError::Export(format!("JPEG encoding failed: {e}")))?;

        Ok(buf.into_inner())
    }

    /// Export the scene to an SVG string at the configured density.
    ///
    /// # Errors
    ///
    /// Returns an error if a bitmap cannot be embedded.
    pub fn render_to_svg(&self, scene: &Scene) -> RenderResult<String> {
        self.render_svg_at(scene, self.config.scale)
    }

    /// Export the scene to a single-page PDF sized to the canvas.
    ///
    /// The scene is rasterized at the configured density and embedded as one
    /// image covering the page.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or PDF generation fails.
    #[allow(clippy::cast_precision_loss)]
    pub fn render_to_pdf_bytes(&self, scene: &Scene) -> RenderResult<Vec<u8>> {
        let png_data = self.render_to_png(scene)?;
        let (view_w, view_h) = self.logical_dimensions(scene);

        // Convert canvas units to mm: units / dpi * 25.4
        let page_width_mm = view_w / self.config.dpi * 25.4;
        let page_height_mm = view_h / self.config.dpi * 25.4;

        let (doc, page1, layer1) = printpdf::PdfDocument::new(
            "Card Export",
            printpdf::Mm(page_width_mm),
            printpdf::Mm(page_height_mm),
            "Card",
        );

        let current_layer = doc.get_page(page1).get_layer(layer1);

        // Decode PNG using printpdf's bundled image crate for compatibility
        let dynamic_image = printpdf::image_crate::load_from_memory(&png_data)
            .map_err(|e| RenderError::Export(format!("Failed to decode PNG for PDF: {e}")))?;

        let pdf_image = printpdf::Image::from_dynamic_image(&dynamic_image);

        // At dpi * density the raster covers exactly one page.
        let transform = printpdf::ImageTransform {
            translate_x: Some(printpdf::Mm(0.0)),
            translate_y: Some(printpdf::Mm(0.0)),
            dpi: Some(self.config.dpi * self.config.scale),
            ..Default::default()
        };

        pdf_image.add_to_layer(current_layer, transform);

        doc.save_to_bytes()
            .map_err(|e| RenderError::Export(format!("PDF save failed: {e}")))
    }

    /// Logical (canvas unit) dimensions of the output.
    #[allow(clippy::cast_precision_loss)]
    fn logical_dimensions(&self, scene: &Scene) -> (f32, f32) {
        let canvas = scene.canvas_size();
        let width = self.config.width.map_or(canvas.width, |w| w as f32);
        let height = self.config.height.map_or(canvas.height, |h| h as f32);
        (width.max(1.0), height.max(1.0))
    }

    /// Output dimensions (width, height) in pixels at `pixel_density`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn output_dimensions(&self, scene: &Scene, pixel_density: f32) -> (u32, u32) {
        let (view_w, view_h) = self.logical_dimensions(scene);
        let out_w = (view_w * pixel_density).round() as u32;
        let out_h = (view_h * pixel_density).round() as u32;
        (out_w.max(1), out_h.max(1))
    }

    fn render_svg_at(&self, scene: &Scene, pixel_density: f32) -> RenderResult<String> {
        if !pixel_density.is_finite() || pixel_density <= 0.0 {
            return Err(RenderError::Export(format!("Invalid pixel density: {pixel_density}")));
        }
        let (out_w, out_h) = self.output_dimensions(scene, pixel_density);
        let (view_w, view_h) = self.logical_dimensions(scene);

        let mut svg = String::with_capacity(4096);
        let _ = write!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{out_w}\" height=\"{out_h}\" viewBox=\"0 0 {view_w} {view_h}\">",
        );

        render_background_svg(&mut svg, scene.background(), view_w, view_h)?;
        for image in scene.images() {
            render_image_svg(&mut svg, image)?;
        }
        for text in scene.texts() {
            render_text_svg(&mut svg, text);
        }

        svg.push_str("</svg>");
        Ok(svg)
    }

    /// Rasterize the scene to a tiny-skia Pixmap.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn rasterize(&self, scene: &Scene, pixel_density: f32) -> RenderResult<tiny_skia::Pixmap> {
        let svg_string = self.render_svg_at(scene, pixel_density)?;

        let mut opt = usvg::Options::default();
        opt.fontdb = Arc::clone(&self.fontdb);
        let tree = usvg::Tree::from_str(&svg_string, &opt)
            .map_err(|e| RenderError::Export(format!("SVG parsing failed: {e}")))?;

        let px_w = tree.size().width().round() as u32;
        let px_h = tree.size().height().round() as u32;

        let mut pixmap = tiny_skia::Pixmap::new(px_w.max(1), px_h.max(1))
            .ok_or_else(|| RenderError::Export("Failed to create pixmap".to_string()))?;

        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        Ok(pixmap)
    }
}

impl SceneRenderer for SceneExporter {
    fn render_raster(&self, scene: &Scene, pixel_density: f32) -> CardResult<EncodedImage> {
        let png = self.render_to_raster_bytes(scene, pixel_density)?;
        Ok(EncodedImage::new("image/png", png))
    }

    fn render_pdf(&self, scene: &Scene) -> CardResult<Vec<u8>> {
        Ok(self.render_to_pdf_bytes(scene)?)
    }

    fn thumbnail(&self, scene: &Scene, pixel_density: f32) -> CardResult<EncodedImage> {
        let png = self.render_to_raster_bytes(scene, pixel_density)?;
        Ok(generate_thumbnail(&png, self.config.thumbnail_max_size)?)
    }
}

/// Card fill, clipped to the rounded card, then the stretched background image.
fn render_background_svg(
    svg: &mut String,
    background: &Background,
    width: f32,
    height: f32,
) -> RenderResult<()> {
    let radius = background.corner_radius;
    let _ = write!(
        svg,
        "<defs><clipPath id=\"card\"><rect width=\"{width}\" height=\"{height}\" rx=\"{radius}\" ry=\"{radius}\"/></clipPath></defs>",
    );
    let _ = write!(
        svg,
        "<rect width=\"{width}\" height=\"{height}\" rx=\"{radius}\" ry=\"{radius}\" fill=\"{}\"/>",
        escape_xml(&background.fill_color),
    );

    if let Some(bitmap) = &background.image {
        let href = escape_xml(&embeddable_data_uri(bitmap)?);
        let _ = write!(
            svg,
            "<image width=\"{width}\" height=\"{height}\" preserveAspectRatio=\"none\" opacity=\"{}\" clip-path=\"url(#card)\" href=\"{href}\"/>",
            background.image_opacity,
        );
    }
    Ok(())
}

/// Render a single image element, rotated about its top-left corner.
fn render_image_svg(svg: &mut String, image: &ImageElement) -> RenderResult<()> {
    let bounds = image.bounds();
    let href = escape_xml(&embeddable_data_uri(&image.bitmap)?);
    let _ = write!(
        svg,
        "<image x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" preserveAspectRatio=\"none\" transform=\"rotate({} {} {})\" href=\"{href}\"/>",
        bounds.x, bounds.y, bounds.width, bounds.height, bounds.rotation, bounds.x, bounds.y,
    );
    Ok(())
}

/// Render a single text element. `y` is the top of the line box.
#[allow(clippy::cast_precision_loss)]
fn render_text_svg(svg: &mut String, text: &TextElement) {
    let font_size = text.font_size as f32;
    let text_y = text.y + font_size;
    let _ = write!(
        svg,
        "<text x=\"{}\" y=\"{text_y}\" font-size=\"{font_size}\" fill=\"{}\" font-family=\"{}\">{}</text>",
        text.x,
        escape_xml(&text.fill_color),
        escape_xml(text.font_family.name()),
        escape_xml(&text.content),
    );
}

/// Escape special XML characters.
fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

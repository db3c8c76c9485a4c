//! Persisted template records and their conversion to and from a [`Scene`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::asset::{EncodedImage, ImageDecoder};
use crate::config::EditorConfig;
use crate::element::{ElementId, ImageElement, TextElement};
use crate::geometry::{clamp_opacity, normalize_degrees, Point, Size};
use crate::scene::Scene;
use crate::store::current_timestamp_ms;
use crate::{CardError, CardResult};

/// Identifier of a persisted template. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(u64);

static LAST_TEMPLATE_ID: AtomicU64 = AtomicU64::new(0);

impl TemplateId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Derive a fresh id from the session clock.
    ///
    /// Ids handed out by one process are strictly increasing.
    #[must_use]
    pub fn generate() -> Self {
        let now = current_timestamp_ms();
        let mut last = LAST_TEMPLATE_ID.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match LAST_TEMPLATE_ID.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Self(next),
                Err(actual) => last = actual,
            }
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted background layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundRecord {
    /// Card fill colour.
    pub fill_color: String,
    /// Corner radius.
    pub corner_radius: f32,
    /// Background image as a data URI.
    #[serde(default)]
    pub image: Option<String>,
    /// Background image opacity.
    #[serde(default = "BackgroundRecord::default_opacity")]
    pub image_opacity: f32,
}

impl BackgroundRecord {
    const fn default_opacity() -> f32 {
        1.0
    }
}

/// Persisted image element: settled geometry plus its bitmap as a data URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Element identifier.
    pub id: ElementId,
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Rotation in degrees, normalized into `[0, 360)`.
    pub rotation: f32,
    /// Bitmap as a data URI.
    pub src: String,
}

/// A named, persisted snapshot of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    /// Template identifier.
    pub id: TemplateId,
    /// User-supplied name (never blank).
    pub name: String,
    /// Background snapshot.
    pub background: BackgroundRecord,
    /// Text elements, verbatim.
    #[serde(default)]
    pub texts: Vec<TextElement>,
    /// Image elements in paint order.
    #[serde(default)]
    pub images: Vec<ImageRecord>,
    /// Rendered preview as a data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Last save time in milliseconds since epoch.
    #[serde(default)]
    pub updated_at: u64,
}

impl TemplateRecord {
    /// Attach a rendered preview.
    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: &EncodedImage) -> Self {
        self.thumbnail = Some(thumbnail.to_data_uri());
        self
    }
}

/// Snapshot a scene into a template record.
///
/// A bound session reuses `bound_id`; otherwise a fresh id is generated.
///
/// # Errors
///
/// Returns [`CardError::Validation`] if `name` is blank.
pub fn serialize(
    scene: &Scene,
    name: &str,
    bound_id: Option<TemplateId>,
) -> CardResult<TemplateRecord> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CardError::Validation("Please enter a template name.".to_string()));
    }

    let background = scene.background();
    let images = scene
        .images()
        .iter()
        .map(|image| ImageRecord {
            id: image.id,
            x: image.x,
            y: image.y,
            width: image.width,
            height: image.height,
            rotation: normalize_degrees(image.rotation),
            src: image.bitmap.to_data_uri(),
        })
        .collect();

    Ok(TemplateRecord {
        id: bound_id.unwrap_or_else(TemplateId::generate),
        name: name.to_string(),
        background: BackgroundRecord {
            fill_color: background.fill_color.clone(),
            corner_radius: background.corner_radius,
            image: background.image.as_ref().map(crate::asset::Bitmap::to_data_uri),
            image_opacity: background.image_opacity,
        },
        texts: scene.texts().to_vec(),
        images,
        thumbnail: None,
        updated_at: current_timestamp_ms(),
    })
}

/// Rebuild a scene from a template record.
///
/// Every bitmap is decoded concurrently and the scene is only returned once
/// all of them succeed; a single failure fails the whole load.
///
/// # Errors
///
/// Returns [`CardError::DecodeFailure`] if any embedded image is malformed.
pub async fn deserialize(
    record: &TemplateRecord,
    decoder: &dyn ImageDecoder,
    config: EditorConfig,
) -> CardResult<Scene> {
    let background_source = record
        .background
        .image
        .as_deref()
        .map(EncodedImage::from_data_uri)
        .transpose()?;
    let image_sources = record
        .images
        .iter()
        .map(|image| EncodedImage::from_data_uri(&image.src))
        .collect::<CardResult<Vec<_>>>()?;

    let background_image = match background_source {
        Some(source) => Some(decoder.decode(source).await?),
        None => None,
    };
    let bitmaps =
        try_join_all(image_sources.into_iter().map(|source| decoder.decode(source))).await?;

    let mut scene = Scene::new(config);
    scene.set_background_color(record.background.fill_color.clone());
    scene.set_background_corner_radius(record.background.corner_radius);
    scene.background.image_opacity = clamp_opacity(record.background.image_opacity);
    scene.background.image = background_image;
    scene.texts.clone_from(&record.texts);

    let minimum = scene.config.min_element_size;
    for (image, bitmap) in record.images.iter().zip(bitmaps) {
        let size = Size::new(image.width, image.height).clamp_min(minimum);
        scene.images.push(ImageElement::new(
            image.id,
            bitmap,
            Point::new(image.x, image.y),
            size,
            image.rotation,
        ));
    }
    scene.last_image_id = scene.images.iter().map(|i| i.id.get()).max().unwrap_or(0);

    tracing::debug!(
        "Deserialized template {} with {} texts and {} images",
        record.id,
        scene.texts.len(),
        scene.images.len()
    );
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementKind, TextEdit};
    use crate::geometry::Scale;
    use crate::mutation::TransformReport;
    use crate::test_support::{test_bitmap, FailingDecoder, TestDecoder};

    fn sample_scene() -> Scene {
        let mut scene = Scene::default();
        scene.set_background_color("#abcdef");
        scene.set_background_corner_radius(12.0);
        scene.set_background_image_opacity(0.4);
        scene.set_background_image(test_bitmap(70, 40));

        let text = scene.add_text();
        scene
            .edit_text(text, TextEdit::Content("Jane Doe".to_string()))
            .expect("edit");
        scene
            .drag_element(ElementKind::Text, text, 120.0, 80.0)
            .expect("drag");

        let a = scene.add_image(test_bitmap(40, 20), 1_000);
        let b = scene.add_image(test_bitmap(10, 30), 2_000);
        scene.rotate_image(a, 45.0).expect("rotate");
        scene
            .complete_transform(
                b,
                TransformReport {
                    width: 100.0,
                    height: 200.0,
                    rotation: -30.0,
                    scale: Scale::new(2.0, 1.0),
                },
            )
            .expect("settle");
        scene
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let scene = Scene::default();
        for name in ["", "   ", "\t\n"] {
            assert!(matches!(
                serialize(&scene, name, None),
                Err(CardError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_bound_id_is_reused() {
        let scene = Scene::default();
        let record = serialize(&scene, "Card", Some(TemplateId::new(77))).expect("serialize");
        assert_eq!(record.id, TemplateId::new(77));
    }

    #[test]
    fn test_generated_ids_increase() {
        let a = TemplateId::generate();
        let b = TemplateId::generate();
        assert!(b > a);
    }

    #[test]
    fn test_rotation_normalized_for_persistence() {
        let scene = sample_scene();
        let record = serialize(&scene, "Card", None).expect("serialize");
        assert!((record.images[1].rotation - 330.0).abs() < 1e-3);
        assert!(record.images.iter().all(|i| i.src.starts_with("data:")));
    }

    #[tokio::test]
    async fn test_round_trip_preserves_scene() {
        let scene = sample_scene();
        let record = serialize(&scene, "Card A", None).expect("serialize");
        let json = serde_json::to_string(&record).expect("json");
        let record: TemplateRecord = serde_json::from_str(&json).expect("parse");

        let restored = deserialize(&record, &TestDecoder, EditorConfig::default())
            .await
            .expect("deserialize");

        let (bg, restored_bg) = (scene.background(), restored.background());
        assert_eq!(bg.fill_color, restored_bg.fill_color);
        assert!((bg.corner_radius - restored_bg.corner_radius).abs() < f32::EPSILON);
        assert!((bg.image_opacity - restored_bg.image_opacity).abs() < f32::EPSILON);
        assert_eq!(bg.image, restored_bg.image);
        assert_eq!(scene.texts(), restored.texts());

        assert_eq!(scene.images().len(), restored.images().len());
        for (before, after) in scene.images().iter().zip(restored.images()) {
            assert_eq!(before.id, after.id);
            assert_eq!(before.size(), after.size());
            assert!((before.x - after.x).abs() < f32::EPSILON);
            assert!((normalize_degrees(before.rotation) - after.rotation).abs() < 1e-3);
            assert!(after.scale().is_identity());
            assert_eq!(before.bitmap, after.bitmap);
        }
        assert!(restored.selection().is_none());
    }

    #[tokio::test]
    async fn test_any_decode_failure_fails_whole_load() {
        let scene = sample_scene();
        let record = serialize(&scene, "Card", None).expect("serialize");
        let result = deserialize(&record, &FailingDecoder, EditorConfig::default()).await;
        assert!(matches!(result, Err(CardError::DecodeFailure(_))));
    }

    #[tokio::test]
    async fn test_malformed_src_is_decode_failure() {
        let mut record = serialize(&sample_scene(), "Card", None).expect("serialize");
        record.images[0].src = "not a data uri".to_string();
        let result = deserialize(&record, &TestDecoder, EditorConfig::default()).await;
        assert!(matches!(result, Err(CardError::DecodeFailure(_))));
    }

    #[tokio::test]
    async fn test_new_images_after_load_get_fresh_ids() {
        let record = serialize(&sample_scene(), "Card", None).expect("serialize");
        let mut restored = deserialize(&record, &TestDecoder, EditorConfig::default())
            .await
            .expect("deserialize");
        let max = restored.images().iter().map(|i| i.id).max().expect("images");
        let added = restored.add_image(test_bitmap(5, 5), 0);
        assert!(added > max);
    }
}

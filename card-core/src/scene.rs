//! Scene model: the single source of truth for the card being edited.
//!
//! Read access is public; every write goes through the operations in
//! [`crate::mutation`] so the element invariants hold between operations.

use crate::asset::Bitmap;
use crate::config::EditorConfig;
use crate::element::{ElementId, ElementKind, ImageElement, TextElement};
use crate::geometry::{clamp_opacity, Size};
use crate::selection::Selection;
use crate::{CardError, CardResult};

/// The background layer of a card.
#[derive(Debug, PartialEq)]
pub struct Background {
    /// Fill colour as a hex/RGB string.
    pub fill_color: String,
    /// Corner radius applied to the card and its background image.
    pub corner_radius: f32,
    /// Optional background image, stretched to the canvas.
    pub image: Option<Bitmap>,
    /// Opacity of the background image in `[0, 1]`.
    pub image_opacity: f32,
}

impl Background {
    /// Background built from configured defaults.
    #[must_use]
    pub fn from_config(config: &EditorConfig) -> Self {
        let defaults = &config.background_defaults;
        Self {
            fill_color: defaults.fill_color.clone(),
            corner_radius: defaults.corner_radius.max(0.0),
            image: None,
            image_opacity: clamp_opacity(defaults.image_opacity),
        }
    }
}

/// Borrowed view of whichever element a selection resolves to.
#[derive(Debug, Clone, Copy)]
pub enum ElementRef<'a> {
    /// A text element.
    Text(&'a TextElement),
    /// An image element.
    Image(&'a ImageElement),
}

impl ElementRef<'_> {
    /// Identifier of the referenced element.
    #[must_use]
    pub const fn id(&self) -> ElementId {
        match self {
            Self::Text(text) => text.id,
            Self::Image(image) => image.id,
        }
    }

    /// Kind of the referenced element.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::Text(_) => ElementKind::Text,
            Self::Image(_) => ElementKind::Image,
        }
    }
}

/// A card scene: background, image z-order, texts and the current selection.
#[derive(Debug)]
pub struct Scene {
    pub(crate) config: EditorConfig,
    pub(crate) background: Background,
    pub(crate) texts: Vec<TextElement>,
    pub(crate) images: Vec<ImageElement>,
    pub(crate) selection: Option<Selection>,
    pub(crate) last_image_id: u64,
}

impl Scene {
    /// Create an empty scene using the given configuration.
    #[must_use]
    pub fn new(config: EditorConfig) -> Self {
        Self {
            background: Background::from_config(&config),
            config,
            texts: Vec::new(),
            images: Vec::new(),
            selection: None,
            last_image_id: 0,
        }
    }

    /// Configuration the scene was created with.
    #[must_use]
    pub const fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Logical canvas size.
    #[must_use]
    pub const fn canvas_size(&self) -> Size {
        Size::new(self.config.canvas_width, self.config.canvas_height)
    }

    /// The background layer.
    #[must_use]
    pub const fn background(&self) -> &Background {
        &self.background
    }

    /// Text elements in insertion order.
    #[must_use]
    pub fn texts(&self) -> &[TextElement] {
        &self.texts
    }

    /// Image elements in paint order (last is topmost).
    #[must_use]
    pub fn images(&self) -> &[ImageElement] {
        &self.images
    }

    /// Look up a text element.
    #[must_use]
    pub fn text(&self, id: ElementId) -> Option<&TextElement> {
        self.texts.iter().find(|t| t.id == id)
    }

    /// Look up an image element.
    #[must_use]
    pub fn image(&self, id: ElementId) -> Option<&ImageElement> {
        self.images.iter().find(|i| i.id == id)
    }

    pub(crate) fn text_mut(&mut self, id: ElementId) -> CardResult<&mut TextElement> {
        self.texts
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| CardError::NotFound(format!("text {id}")))
    }

    pub(crate) fn image_mut(&mut self, id: ElementId) -> CardResult<&mut ImageElement> {
        self.images
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| CardError::NotFound(format!("image {id}")))
    }

    /// Z-order index of an image.
    #[must_use]
    pub fn image_index(&self, id: ElementId) -> Option<usize> {
        self.images.iter().position(|i| i.id == id)
    }

    /// Whether an element of `kind` with `id` exists.
    #[must_use]
    pub fn contains(&self, kind: ElementKind, id: ElementId) -> bool {
        match kind {
            ElementKind::Text => self.text(id).is_some(),
            ElementKind::Image => self.image(id).is_some(),
        }
    }

    /// Resolve a reference to the element it names.
    #[must_use]
    pub fn resolve(&self, selection: Selection) -> Option<ElementRef<'_>> {
        match selection.kind {
            ElementKind::Text => self.text(selection.id).map(ElementRef::Text),
            ElementKind::Image => self.image(selection.id).map(ElementRef::Image),
        }
    }

    /// The current selection, or `None` if nothing is selected or the
    /// selected element no longer exists.
    #[must_use]
    pub fn selection(&self) -> Option<Selection> {
        self.selection.filter(|sel| self.contains(sel.kind, sel.id))
    }

    /// The currently selected element, if it still exists.
    #[must_use]
    pub fn selected_element(&self) -> Option<ElementRef<'_>> {
        self.selection.and_then(|sel| self.resolve(sel))
    }

    /// Whether the given element is the selected one.
    #[must_use]
    pub fn is_selected(&self, kind: ElementKind, id: ElementId) -> bool {
        self.selection() == Some(Selection::new(kind, id))
    }

    /// Select an element, replacing any prior selection.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] if the element does not exist; the
    /// prior selection is kept.
    pub fn select(&mut self, kind: ElementKind, id: ElementId) -> CardResult<()> {
        if !self.contains(kind, id) {
            return Err(CardError::NotFound(format!("{kind} {id}")));
        }
        self.selection = Some(Selection::new(kind, id));
        tracing::debug!("Selected {kind} {id}");
        Ok(())
    }

    /// Clear the selection.
    pub fn deselect(&mut self) {
        if self.selection.take().is_some() {
            tracing::debug!("Selection cleared");
        }
    }

    /// Find the element painted at the given canvas coordinates.
    ///
    /// Texts paint above every image, so they are tested first (latest
    /// first), then images from topmost down.
    #[must_use]
    pub fn element_at(&self, x: f32, y: f32) -> Option<Selection> {
        if let Some(text) = self.texts.iter().rev().find(|t| t.bounds().contains(x, y)) {
            return Some(Selection::new(ElementKind::Text, text.id));
        }
        self.images
            .iter()
            .rev()
            .find(|i| i.bounds().contains(x, y))
            .map(|i| Selection::new(ElementKind::Image, i.id))
    }

    /// Number of elements of both kinds.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.texts.len() + self.images.len()
    }

    /// Whether the scene holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty() && self.images.is_empty()
    }

    /// Allocate a fresh text id, strictly greater than any existing one.
    pub(crate) fn next_text_id(&self) -> ElementId {
        let max = self.texts.iter().map(|t| t.id.get()).max().unwrap_or(0);
        ElementId::new(max + 1)
    }

    /// Allocate a fresh image id from a millisecond clock reading.
    ///
    /// Ids are strictly increasing even when the clock stalls or goes back.
    pub(crate) fn next_image_id(&mut self, now_ms: u64) -> ElementId {
        let max_existing = self.images.iter().map(|i| i.id.get()).max().unwrap_or(0);
        let floor = self.last_image_id.max(max_existing) + 1;
        let id = now_ms.max(floor);
        self.last_image_id = id;
        ElementId::new(id)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::FontFamily;

    fn text(id: u64, x: f32, y: f32) -> TextElement {
        TextElement {
            id: ElementId::new(id),
            content: "Test".to_string(),
            x,
            y,
            font_size: 20,
            font_family: FontFamily::Arial,
            fill_color: "#000000".to_string(),
        }
    }

    #[test]
    fn test_new_scene_uses_background_defaults() {
        let scene = Scene::default();
        assert!(scene.is_empty());
        assert_eq!(scene.background().fill_color, "#ffffff");
        assert!(scene.background().image.is_none());
        assert!(scene.selection().is_none());
    }

    #[test]
    fn test_element_at_text() {
        let mut scene = Scene::default();
        scene.texts.push(text(1, 100.0, 100.0));

        assert_eq!(
            scene.element_at(110.0, 110.0),
            Some(Selection::new(ElementKind::Text, ElementId::new(1)))
        );
        assert!(scene.element_at(50.0, 50.0).is_none());
    }

    #[test]
    fn test_select_unknown_keeps_prior_selection() {
        let mut scene = Scene::default();
        scene.texts.push(text(1, 0.0, 0.0));
        scene.select(ElementKind::Text, ElementId::new(1)).expect("select");

        let result = scene.select(ElementKind::Image, ElementId::new(9));
        assert!(matches!(result, Err(CardError::NotFound(_))));
        assert!(scene.is_selected(ElementKind::Text, ElementId::new(1)));
    }

    #[test]
    fn test_stale_selection_resolves_to_none() {
        let mut scene = Scene::default();
        scene.selection = Some(Selection::new(ElementKind::Text, ElementId::new(42)));
        assert!(scene.selection().is_none());
        assert!(scene.selected_element().is_none());
    }

    #[test]
    fn test_image_ids_strictly_increase() {
        let mut scene = Scene::default();
        let a = scene.next_image_id(1_000);
        let b = scene.next_image_id(1_000);
        let c = scene.next_image_id(500);
        assert!(a < b && b < c);
    }
}

//! Mutation operations - the only way a [`Scene`] changes.
//!
//! Every operation is total: on a missing id or a rejected value it leaves the
//! scene exactly as it was and reports why.

use serde::{Deserialize, Serialize};

use crate::asset::Bitmap;
use crate::element::{ElementId, ElementKind, ImageElement, TextEdit, TextElement};
use crate::geometry::{clamp_opacity, Point, Scale, Size};
use crate::scene::Scene;
use crate::selection::Selection;
use crate::{CardError, CardResult};

/// Direction of a single z-order step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReorderDirection {
    /// One step toward the topmost end.
    Forward,
    /// One step toward the bottommost end.
    Backward,
}

/// Geometry reported by the rendering surface when a transform gesture ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformReport {
    /// Node width before scale.
    pub width: f32,
    /// Node height before scale.
    pub height: f32,
    /// Node rotation in degrees.
    pub rotation: f32,
    /// Node scale at the end of the gesture.
    pub scale: Scale,
}

/// A scene mutation as data, for dispatch from event handlers.
#[derive(Debug)]
pub enum Mutation {
    /// Append a default text element and select it.
    AddText,
    /// Edit one field of a text element.
    EditText {
        /// Target text.
        id: ElementId,
        /// Field and new value.
        edit: TextEdit,
    },
    /// Remove a text element.
    DeleteText {
        /// Target text.
        id: ElementId,
    },
    /// Move an element to a new top-left position.
    Drag {
        /// Target kind.
        kind: ElementKind,
        /// Target element.
        id: ElementId,
        /// New position.
        to: Point,
    },
    /// Append a decoded image as the topmost element and select it.
    AddImage {
        /// Decoded bitmap, moved into the new element.
        bitmap: Bitmap,
    },
    /// Resize an image, rejected below the minimum size.
    ResizeImage {
        /// Target image.
        id: ElementId,
        /// Requested size.
        size: Size,
    },
    /// Rotate an image.
    RotateImage {
        /// Target image.
        id: ElementId,
        /// New rotation in degrees.
        degrees: f32,
    },
    /// Report an in-flight transform gesture frame.
    LiveTransform {
        /// Target image.
        id: ElementId,
        /// Current gesture scale.
        scale: Scale,
        /// Current gesture rotation.
        rotation: f32,
    },
    /// Settle a transform gesture.
    CompleteTransform {
        /// Target image.
        id: ElementId,
        /// Final node geometry.
        report: TransformReport,
    },
    /// Move an image one z-order step.
    ReorderImage {
        /// Target image.
        id: ElementId,
        /// Step direction.
        direction: ReorderDirection,
    },
    /// Remove an image and release its bitmap.
    DeleteImage {
        /// Target image.
        id: ElementId,
    },
    /// Change the card fill colour.
    SetBackgroundColor(String),
    /// Change the card corner radius.
    SetBackgroundCornerRadius(f32),
    /// Replace the background image.
    SetBackgroundImage(Bitmap),
    /// Remove the background image.
    ClearBackgroundImage,
    /// Change the background image opacity.
    SetBackgroundImageOpacity(f32),
}

/// What a successfully applied mutation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The scene changed.
    Applied,
    /// A new element was created.
    Created(Selection),
    /// The request was valid but changed nothing (end of z-order, resize
    /// below the minimum).
    Unchanged,
}

impl Scene {
    /// Apply a mutation.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for stale element ids and
    /// [`CardError::Validation`] for rejected values. The scene is unchanged
    /// in both cases.
    pub fn apply(&mut self, mutation: Mutation) -> CardResult<MutationOutcome> {
        let changed = |c: bool| {
            if c {
                MutationOutcome::Applied
            } else {
                MutationOutcome::Unchanged
            }
        };
        match mutation {
            Mutation::AddText => Ok(MutationOutcome::Created(Selection::new(
                ElementKind::Text,
                self.add_text(),
            ))),
            Mutation::EditText { id, edit } => {
                self.edit_text(id, edit).map(|()| MutationOutcome::Applied)
            }
            Mutation::DeleteText { id } => self.delete_text(id).map(|_| MutationOutcome::Applied),
            Mutation::Drag { kind, id, to } => self
                .drag_element(kind, id, to.x, to.y)
                .map(|()| MutationOutcome::Applied),
            Mutation::AddImage { bitmap } => {
                let id = self.add_image(bitmap, crate::store::current_timestamp_ms());
                Ok(MutationOutcome::Created(Selection::new(ElementKind::Image, id)))
            }
            Mutation::ResizeImage { id, size } => self.resize_image(id, size).map(changed),
            Mutation::RotateImage { id, degrees } => self
                .rotate_image(id, degrees)
                .map(|()| MutationOutcome::Applied),
            Mutation::LiveTransform { id, scale, rotation } => self
                .update_transform(id, scale, rotation)
                .map(|()| MutationOutcome::Applied),
            Mutation::CompleteTransform { id, report } => self
                .complete_transform(id, report)
                .map(|()| MutationOutcome::Applied),
            Mutation::ReorderImage { id, direction } => {
                self.reorder_image(id, direction).map(changed)
            }
            Mutation::DeleteImage { id } => {
                self.delete_image(id).map(|()| MutationOutcome::Applied)
            }
            Mutation::SetBackgroundColor(color) => {
                self.set_background_color(color);
                Ok(MutationOutcome::Applied)
            }
            Mutation::SetBackgroundCornerRadius(radius) => {
                self.set_background_corner_radius(radius);
                Ok(MutationOutcome::Applied)
            }
            Mutation::SetBackgroundImage(bitmap) => {
                self.set_background_image(bitmap);
                Ok(MutationOutcome::Applied)
            }
            Mutation::ClearBackgroundImage => Ok(changed(self.clear_background_image())),
            Mutation::SetBackgroundImageOpacity(opacity) => {
                self.set_background_image_opacity(opacity);
                Ok(MutationOutcome::Applied)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Texts
    // -----------------------------------------------------------------------

    /// Append a text element with the configured defaults and select it.
    pub fn add_text(&mut self) -> ElementId {
        let id = self.next_text_id();
        let defaults = &self.config.text_defaults;
        self.texts.push(TextElement {
            id,
            content: defaults.content.clone(),
            x: defaults.x,
            y: defaults.y,
            font_size: defaults.font_size,
            font_family: defaults.font_family.clone(),
            fill_color: defaults.fill_color.clone(),
        });
        self.selection = Some(Selection::new(ElementKind::Text, id));
        tracing::debug!("Added text {id}");
        id
    }

    /// Update one field of a text element.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown id, or
    /// [`CardError::Validation`] for a zero font size.
    pub fn edit_text(&mut self, id: ElementId, edit: TextEdit) -> CardResult<()> {
        if edit == TextEdit::FontSize(0) {
            return Err(CardError::Validation("Font size must be positive".to_string()));
        }
        let text = self.text_mut(id)?;
        match edit {
            TextEdit::Content(content) => text.content = content,
            TextEdit::FontSize(size) => text.font_size = size,
            TextEdit::FontFamily(family) => text.font_family = family,
            TextEdit::FillColor(color) => text.fill_color = color,
        }
        Ok(())
    }

    /// Remove a text element, clearing the selection if it was selected.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown id.
    pub fn delete_text(&mut self, id: ElementId) -> CardResult<TextElement> {
        let index = self
            .texts
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| CardError::NotFound(format!("text {id}")))?;
        if self.selection == Some(Selection::new(ElementKind::Text, id)) {
            self.selection = None;
        }
        tracing::debug!("Deleted text {id}");
        Ok(self.texts.remove(index))
    }

    // -----------------------------------------------------------------------
    // Shared
    // -----------------------------------------------------------------------

    /// Move an element. Positions are not clamped to the canvas.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown id and
    /// [`CardError::Validation`] for a non-finite position.
    pub fn drag_element(
        &mut self,
        kind: ElementKind,
        id: ElementId,
        x: f32,
        y: f32,
    ) -> CardResult<()> {
        ensure_finite("position", &[x, y])?;
        match kind {
            ElementKind::Text => {
                let text = self.text_mut(id)?;
                text.x = x;
                text.y = y;
            }
            ElementKind::Image => {
                let image = self.image_mut(id)?;
                image.x = x;
                image.y = y;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Images
    // -----------------------------------------------------------------------

    /// Append an image as the topmost element and select it.
    ///
    /// The display size scales the bitmap so its longer side equals the
    /// configured maximum; the shorter side never drops below the minimum.
    pub fn add_image(&mut self, bitmap: Bitmap, now_ms: u64) -> ElementId {
        let id = self.next_image_id(now_ms);
        self.insert_image(id, bitmap);
        id
    }

    /// Place a bitmap under an id reserved earlier with `next_image_id`.
    pub(crate) fn insert_image(&mut self, id: ElementId, bitmap: Bitmap) {
        let size = bitmap
            .size()
            .fit_longer_side(self.config.max_image_dimension)
            .clamp_min(self.config.min_element_size);
        let origin = Point::new(self.config.text_defaults.x, self.config.text_defaults.y);
        self.images.push(ImageElement::new(id, bitmap, origin, size, 0.0));
        self.selection = Some(Selection::new(ElementKind::Image, id));
        tracing::debug!("Added image {id} at {}x{}", size.width, size.height);
    }

    /// Resize an image. Requests below the minimum keep the prior geometry
    /// and return `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown id and
    /// [`CardError::Validation`] for a non-finite size.
    pub fn resize_image(&mut self, id: ElementId, size: Size) -> CardResult<bool> {
        ensure_finite("size", &[size.width, size.height])?;
        let minimum = self.config.min_element_size;
        let image = self.image_mut(id)?;
        if !size.meets_minimum(minimum) {
            tracing::debug!("Rejected resize of image {id} below {minimum}");
            return Ok(false);
        }
        image.width = size.width;
        image.height = size.height;
        Ok(true)
    }

    /// Set an image's rotation verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown id and
    /// [`CardError::Validation`] for a non-finite angle.
    pub fn rotate_image(&mut self, id: ElementId, degrees: f32) -> CardResult<()> {
        ensure_finite("rotation", &[degrees])?;
        self.image_mut(id)?.rotation = degrees;
        Ok(())
    }

    /// Record one frame of an in-flight transform gesture.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown id and
    /// [`CardError::Validation`] for non-finite geometry.
    pub fn update_transform(
        &mut self,
        id: ElementId,
        scale: Scale,
        rotation: f32,
    ) -> CardResult<()> {
        ensure_finite("transform", &[scale.x, scale.y, rotation])?;
        let image = self.image_mut(id)?;
        image.scale = scale;
        image.rotation = rotation;
        Ok(())
    }

    /// Settle a transform gesture: fold the reported scale into width and
    /// height (clamped to the minimum), store the rotation and reset the
    /// scale to identity.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown id and
    /// [`CardError::Validation`] if the report or the folded size is not
    /// finite.
    pub fn complete_transform(
        &mut self,
        id: ElementId,
        report: TransformReport,
    ) -> CardResult<()> {
        let folded = Size::new(report.width * report.scale.x, report.height * report.scale.y);
        ensure_finite(
            "transform",
            &[
                report.width,
                report.height,
                report.rotation,
                report.scale.x,
                report.scale.y,
                folded.width,
                folded.height,
            ],
        )?;
        let minimum = self.config.min_element_size;
        let image = self.image_mut(id)?;
        let size = folded.clamp_min(minimum);
        image.width = size.width;
        image.height = size.height;
        image.rotation = report.rotation;
        image.scale = Scale::IDENTITY;
        tracing::debug!(
            "Settled image {id}: {}x{} rotated {}",
            size.width,
            size.height,
            report.rotation
        );
        Ok(())
    }

    /// Move an image one step in z-order. Returns `Ok(false)` at the ends.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown id.
    pub fn reorder_image(
        &mut self,
        id: ElementId,
        direction: ReorderDirection,
    ) -> CardResult<bool> {
        let index = self
            .image_index(id)
            .ok_or_else(|| CardError::NotFound(format!("image {id}")))?;
        let target = match direction {
            ReorderDirection::Forward if index + 1 < self.images.len() => index + 1,
            ReorderDirection::Backward if index > 0 => index - 1,
            _ => return Ok(false),
        };
        self.images.swap(index, target);
        tracing::debug!("Moved image {id} from {index} to {target}");
        Ok(true)
    }

    /// Remove an image, dropping its bitmap, and clear the selection if it
    /// was selected.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown id.
    pub fn delete_image(&mut self, id: ElementId) -> CardResult<()> {
        let index = self
            .image_index(id)
            .ok_or_else(|| CardError::NotFound(format!("image {id}")))?;
        if self.selection == Some(Selection::new(ElementKind::Image, id)) {
            self.selection = None;
        }
        drop(self.images.remove(index));
        tracing::debug!("Deleted image {id}");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Background
    // -----------------------------------------------------------------------

    /// Change the card fill colour.
    pub fn set_background_color(&mut self, color: impl Into<String>) {
        self.background.fill_color = color.into();
    }

    /// Change the corner radius; negative values clamp to zero.
    pub fn set_background_corner_radius(&mut self, radius: f32) {
        self.background.corner_radius = if radius.is_finite() { radius.max(0.0) } else { 0.0 };
    }

    /// Replace the background image, releasing the previous one.
    pub fn set_background_image(&mut self, bitmap: Bitmap) {
        drop(self.background.image.replace(bitmap));
    }

    /// Remove the background image. Returns whether one was present.
    pub fn clear_background_image(&mut self) -> bool {
        self.background.image.take().is_some()
    }

    /// Change the background image opacity, clamped to `[0, 1]`.
    pub fn set_background_image_opacity(&mut self, opacity: f32) {
        self.background.image_opacity = clamp_opacity(opacity);
    }
}

/// Reject NaN and infinite geometry before it reaches the scene.
fn ensure_finite(field: &str, values: &[f32]) -> CardResult<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        tracing::warn!("Rejected non-finite {field}: {values:?}");
        Err(CardError::Validation(format!("{field} must be finite")))
    }
}

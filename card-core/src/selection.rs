//! Selection and hit-routing.
//!
//! Every interaction is resolved by one ordered predicate chain:
//!
//! ```text
//! 1. hit an element (canvas hit, element click, panel pick) => select it
//! 2. hit a control surface owned by the active tab          => keep selection
//! 3. anything else                                          => deselect
//! ```
//!
//! Control-surface membership is checked before the deselect rule, so a
//! control that operates on the current selection never races with it.

use serde::{Deserialize, Serialize};

use crate::element::{ElementId, ElementKind};
use crate::geometry::Point;
use crate::scene::Scene;

/// A reference to the selected element. Not an owning pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    /// Which sequence the element lives in.
    pub kind: ElementKind,
    /// Element identifier within that sequence.
    pub id: ElementId,
}

impl Selection {
    /// Create a selection reference.
    #[must_use]
    pub const fn new(kind: ElementKind, id: ElementId) -> Self {
        Self { kind, id }
    }
}

/// Property panel tabs of the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorTab {
    /// Background colour, image, radius and opacity.
    #[default]
    Background,
    /// Text list and per-text properties.
    Text,
    /// Image upload, picker, reorder and delete.
    Image,
}

/// UI controls living outside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSurface {
    /// The tab buttons.
    TabBar,
    /// Background styling controls.
    BackgroundPanel,
    /// The expanded text property panel.
    TextPanel,
    /// The "add text" button.
    TextAddButton,
    /// The image file input.
    ImageUpload,
    /// The selected-image picker.
    ImagePicker,
    /// Bring-forward / send-backward buttons.
    ImageReorder,
    /// The remove-image button.
    ImageDelete,
    /// Export and save buttons under the canvas.
    Toolbar,
}

impl ControlSurface {
    /// The tab on which this control operates on the current selection.
    #[must_use]
    pub const fn selection_tab(self) -> Option<EditorTab> {
        match self {
            Self::TextPanel => Some(EditorTab::Text),
            Self::ImagePicker | Self::ImageReorder | Self::ImageDelete => Some(EditorTab::Image),
            Self::TabBar
            | Self::BackgroundPanel
            | Self::TextAddButton
            | Self::ImageUpload
            | Self::Toolbar => None,
        }
    }

    /// Whether a press on this control keeps the selection while `tab` is active.
    #[must_use]
    pub fn keeps_selection(self, tab: EditorTab) -> bool {
        self.selection_tab() == Some(tab)
    }
}

/// Where a pointer press landed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", content = "data", rename_all = "snake_case")]
pub enum PointerTarget {
    /// Inside the canvas, at canvas coordinates.
    Canvas(Point),
    /// On a UI control outside the canvas.
    Control(ControlSurface),
    /// Anywhere else on the page.
    Elsewhere,
}

/// A raw interaction to be routed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Interaction {
    /// A pointer press.
    Pointer(PointerTarget),
    /// The rendering surface reports a click on a specific element.
    ElementClick(Selection),
    /// An element chosen from a panel (text header, image picker).
    Pick(Selection),
    /// An explicit deselect signal.
    Deselect,
}

/// The selection transition an interaction resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Select this element, replacing any prior selection.
    Select(Selection),
    /// Leave the selection unchanged.
    Keep,
    /// Clear the selection.
    Deselect,
}

/// Resolve an interaction against the scene and active tab.
///
/// Clicks naming an element that no longer exists are ignored and the
/// selection is kept.
#[must_use]
pub fn route_interaction(
    scene: &Scene,
    tab: EditorTab,
    interaction: Interaction,
) -> RouteOutcome {
    match interaction {
        Interaction::ElementClick(target) | Interaction::Pick(target) => {
            if scene.contains(target.kind, target.id) {
                RouteOutcome::Select(target)
            } else {
                tracing::warn!("Ignoring click on missing {} {}", target.kind, target.id);
                RouteOutcome::Keep
            }
        }
        Interaction::Pointer(PointerTarget::Canvas(point)) => scene
            .element_at(point.x, point.y)
            .map_or(RouteOutcome::Deselect, RouteOutcome::Select),
        Interaction::Pointer(PointerTarget::Control(surface)) => {
            if surface.keeps_selection(tab) {
                RouteOutcome::Keep
            } else {
                RouteOutcome::Deselect
            }
        }
        Interaction::Pointer(PointerTarget::Elsewhere) | Interaction::Deselect => {
            RouteOutcome::Deselect
        }
    }
}

impl Scene {
    /// Route an interaction and apply the resulting transition.
    pub fn route(&mut self, tab: EditorTab, interaction: Interaction) -> RouteOutcome {
        let outcome = route_interaction(self, tab, interaction);
        match outcome {
            RouteOutcome::Select(sel) => {
                // Existence was checked while routing.
                self.selection = Some(sel);
                tracing::debug!("Selected {} {}", sel.kind, sel.id);
            }
            RouteOutcome::Deselect => self.deselect(),
            RouteOutcome::Keep => {}
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{FontFamily, TextElement};

    fn scene_with_text() -> (Scene, Selection) {
        let mut scene = Scene::default();
        scene.texts.push(TextElement {
            id: ElementId::new(1),
            content: "Hello".to_string(),
            x: 100.0,
            y: 100.0,
            font_size: 20,
            font_family: FontFamily::Arial,
            fill_color: "#000000".to_string(),
        });
        (scene, Selection::new(ElementKind::Text, ElementId::new(1)))
    }

    #[test]
    fn test_canvas_hit_selects() {
        let (mut scene, sel) = scene_with_text();
        let outcome = scene.route(
            EditorTab::Background,
            Interaction::Pointer(PointerTarget::Canvas(Point::new(105.0, 105.0))),
        );
        assert_eq!(outcome, RouteOutcome::Select(sel));
        assert_eq!(scene.selection(), Some(sel));
    }

    #[test]
    fn test_empty_canvas_deselects() {
        let (mut scene, sel) = scene_with_text();
        scene.select(sel.kind, sel.id).expect("select");
        scene.route(
            EditorTab::Text,
            Interaction::Pointer(PointerTarget::Canvas(Point::new(600.0, 350.0))),
        );
        assert!(scene.selection().is_none());
    }

    #[test]
    fn test_text_panel_keeps_selection_only_on_text_tab() {
        let (mut scene, sel) = scene_with_text();
        scene.select(sel.kind, sel.id).expect("select");

        let press = Interaction::Pointer(PointerTarget::Control(ControlSurface::TextPanel));
        assert_eq!(scene.route(EditorTab::Text, press), RouteOutcome::Keep);
        assert_eq!(scene.selection(), Some(sel));

        assert_eq!(scene.route(EditorTab::Image, press), RouteOutcome::Deselect);
        assert!(scene.selection().is_none());
    }

    #[test]
    fn test_image_controls_keep_selection_on_image_tab() {
        for surface in [
            ControlSurface::ImagePicker,
            ControlSurface::ImageReorder,
            ControlSurface::ImageDelete,
        ] {
            assert!(surface.keeps_selection(EditorTab::Image));
            assert!(!surface.keeps_selection(EditorTab::Text));
        }
        assert!(!ControlSurface::TabBar.keeps_selection(EditorTab::Image));
        assert!(!ControlSurface::Toolbar.keeps_selection(EditorTab::Text));
    }

    #[test]
    fn test_click_on_missing_element_is_ignored() {
        let (mut scene, sel) = scene_with_text();
        scene.select(sel.kind, sel.id).expect("select");
        let ghost = Selection::new(ElementKind::Image, ElementId::new(99));
        assert_eq!(
            scene.route(EditorTab::Image, Interaction::ElementClick(ghost)),
            RouteOutcome::Keep
        );
        assert_eq!(scene.selection(), Some(sel));
    }

    #[test]
    fn test_press_elsewhere_deselects_on_every_tab() {
        for tab in [EditorTab::Background, EditorTab::Text, EditorTab::Image] {
            let (mut scene, sel) = scene_with_text();
            scene.select(sel.kind, sel.id).expect("select");
            assert_eq!(
                scene.route(tab, Interaction::Pointer(PointerTarget::Elsewhere)),
                RouteOutcome::Deselect
            );
            assert!(scene.selection().is_none());
        }
    }

    #[test]
    fn test_explicit_deselect() {
        let (mut scene, sel) = scene_with_text();
        scene.select(sel.kind, sel.id).expect("select");
        scene.route(EditorTab::Text, Interaction::Deselect);
        assert!(scene.selection().is_none());
    }
}

//! Card elements - the text and image building blocks of a scene.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::asset::Bitmap;
use crate::geometry::{Point, Rect, Scale, Size};

/// Unique identifier for an element within its kind's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(u64);

impl ElementId {
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
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which element sequence an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A [`TextElement`].
    Text,
    /// An [`ImageElement`].
    Image,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Image => f.write_str("image"),
        }
    }
}

/// Font families offered by the text panel.
///
/// Unknown names round-trip through [`FontFamily::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FontFamily {
    /// Calibri.
    Calibri,
    /// Arial.
    Arial,
    /// Times New Roman.
    TimesNewRoman,
    /// Any other family name.
    Custom(String),
}

impl FontFamily {
    /// Families shown in the picker, in display order.
    pub const BUILT_IN: [Self; 3] = [Self::Calibri, Self::Arial, Self::TimesNewRoman];

    /// CSS/SVG family name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Calibri => "Calibri",
            Self::Arial => "Arial",
            Self::TimesNewRoman => "Times New Roman",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for FontFamily {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Calibri" => Self::Calibri,
            "Arial" => Self::Arial,
            "Times New Roman" => Self::TimesNewRoman,
            _ => Self::Custom(name),
        }
    }
}

impl From<FontFamily> for String {
    fn from(family: FontFamily) -> Self {
        match family {
            FontFamily::Custom(name) => name,
            other => other.name().to_string(),
        }
    }
}

impl fmt::Display for FontFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A draggable text label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    /// Unique identifier.
    pub id: ElementId,
    /// Text content (may be empty).
    pub content: String,
    /// Left anchor.
    pub x: f32,
    /// Top anchor.
    pub y: f32,
    /// Font size in points.
    pub font_size: u32,
    /// Font family.
    pub font_family: FontFamily,
    /// Fill colour.
    pub fill_color: String,
}

impl TextElement {
    /// Average glyph advance as a fraction of the font size.
    const GLYPH_ADVANCE: f32 = 0.6;

    /// Approximate bounding box used for hit testing.
    ///
    /// Empty text still gets a one-glyph box so it stays clickable.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bounds(&self) -> Rect {
        let size = self.font_size as f32;
        let glyphs = self.content.chars().count().max(1) as f32;
        Rect {
            x: self.x,
            y: self.y,
            width: glyphs * size * Self::GLYPH_ADVANCE,
            height: size,
            rotation: 0.0,
        }
    }

    /// Top-left anchor.
    #[must_use]
    pub const fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// One field edit applied to a [`TextElement`].
#[derive(Debug, Clone, PartialEq)]
pub enum TextEdit {
    /// Replace the content.
    Content(String),
    /// Change the font size; zero is rejected.
    FontSize(u32),
    /// Change the font family.
    FontFamily(FontFamily),
    /// Change the fill colour.
    FillColor(String),
}

/// A movable, resizable, rotatable image.
///
/// `scale` is only non-identity while a transform gesture is in flight.
#[derive(Debug, PartialEq)]
pub struct ImageElement {
    /// Unique identifier.
    pub id: ElementId,
    /// Owned decoded raster.
    pub bitmap: Bitmap,
    /// Left edge (rotation pivot).
    pub x: f32,
    /// Top edge (rotation pivot).
    pub y: f32,
    /// Display width.
    pub width: f32,
    /// Display height.
    pub height: f32,
    /// Clockwise rotation in degrees, stored verbatim.
    pub rotation: f32,
    pub(crate) scale: Scale,
}

impl ImageElement {
    /// Create a settled element with identity scale.
    #[must_use]
    pub fn new(id: ElementId, bitmap: Bitmap, origin: Point, size: Size, rotation: f32) -> Self {
        Self {
            id,
            bitmap,
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
            rotation,
            scale: Scale::IDENTITY,
        }
    }

    /// In-flight scale of an active transform gesture.
    #[must_use]
    pub const fn scale(&self) -> Scale {
        self.scale
    }

    /// Settled display size.
    #[must_use]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Bounds as currently drawn, including any in-flight scale.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: self.width * self.scale.x,
            height: self.height * self.scale.y,
            rotation: self.rotation,
        }
    }
}

//! Editor configuration.
//!
//! All fields have defaults matching the stock card editor, so a partial JSON
//! document only needs to name the values it overrides.

use serde::{Deserialize, Serialize};

use crate::element::FontFamily;
use crate::{CardError, CardResult};

/// Defaults applied to a freshly added text element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDefaults {
    /// Initial text content.
    pub content: String,
    /// Initial X position.
    pub x: f32,
    /// Initial Y position.
    pub y: f32,
    /// Initial font size in points.
    pub font_size: u32,
    /// Initial font family.
    pub font_family: FontFamily,
    /// Initial fill colour.
    pub fill_color: String,
}

impl Default for TextDefaults {
    fn default() -> Self {
        Self {
            content: "New Text".to_string(),
            x: 50.0,
            y: 50.0,
            font_size: 20,
            font_family: FontFamily::Arial,
            fill_color: "#000000".to_string(),
        }
    }
}

/// Defaults for the background layer of a new card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundDefaults {
    /// Card fill colour.
    pub fill_color: String,
    /// Corner radius of the card.
    pub corner_radius: f32,
    /// Opacity applied to a background image.
    pub image_opacity: f32,
}

impl Default for BackgroundDefaults {
    fn default() -> Self {
        Self {
            fill_color: "#ffffff".to_string(),
            corner_radius: 0.0,
            image_opacity: 1.0,
        }
    }
}

/// Configuration for an editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Logical canvas width.
    pub canvas_width: f32,
    /// Logical canvas height.
    pub canvas_height: f32,
    /// Smallest width/height an image may be transformed to.
    pub min_element_size: f32,
    /// Longer side of a newly imported image.
    pub max_image_dimension: f32,
    /// Maximum number of persisted templates.
    pub template_limit: usize,
    /// Pixel density used when rendering template thumbnails.
    pub thumbnail_density: f32,
    /// Defaults for new text elements.
    pub text_defaults: TextDefaults,
    /// Defaults for the background layer.
    pub background_defaults: BackgroundDefaults,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            canvas_width: 700.0,
            canvas_height: 400.0,
            min_element_size: 10.0,
            max_image_dimension: 200.0,
            template_limit: 5,
            thumbnail_density: 0.25,
            text_defaults: TextDefaults::default(),
            background_defaults: BackgroundDefaults::default(),
        }
    }
}

impl EditorConfig {
    /// Parse a configuration from JSON, defaulting missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the values are invalid.
    pub fn from_json(json: &str) -> CardResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every size in the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] naming the first offending field.
    pub fn validate(&self) -> CardResult<()> {
        let positive = [
            ("canvas_width", self.canvas_width),
            ("canvas_height", self.canvas_height),
            ("min_element_size", self.min_element_size),
            ("max_image_dimension", self.max_image_dimension),
            ("thumbnail_density", self.thumbnail_density),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(CardError::Validation(format!("{name} must be positive")));
            }
        }
        if self.max_image_dimension < self.min_element_size {
            return Err(CardError::Validation(
                "max_image_dimension must not be below min_element_size".to_string(),
            ));
        }
        if self.text_defaults.font_size == 0 {
            return Err(CardError::Validation(
                "text_defaults.font_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

//! Geometry and transform primitives shared by every placed element.

use serde::{Deserialize, Serialize};

/// A point in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X position (units from left).
    pub x: f32,
    /// Y position (units from top).
    pub y: f32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width in canvas units.
    pub width: f32,
    /// Height in canvas units.
    pub height: f32,
}

impl Size {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Whether both sides reach `minimum`.
    #[must_use]
    pub fn meets_minimum(&self, minimum: f32) -> bool {
        self.width >= minimum && self.height >= minimum
    }

    /// Clamp both sides up to `minimum`.
    #[must_use]
    pub fn clamp_min(self, minimum: f32) -> Self {
        Self {
            width: self.width.max(minimum),
            height: self.height.max(minimum),
        }
    }

    /// Scale so the longer side equals `max_side`, preserving aspect ratio.
    #[must_use]
    pub fn fit_longer_side(self, max_side: f32) -> Self {
        let longer = self.width.max(self.height);
        if longer <= 0.0 {
            return Self::new(max_side, max_side);
        }
        let ratio = max_side / longer;
        Self {
            width: self.width * ratio,
            height: self.height * ratio,
        }
    }
}

/// Per-axis scale factors reported during an active transform gesture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    /// Horizontal scale factor.
    pub x: f32,
    /// Vertical scale factor.
    pub y: f32,
}

impl Scale {
    /// The identity scale `(1, 1)`.
    pub const IDENTITY: Self = Self { x: 1.0, y: 1.0 };

    /// Create a new scale.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Whether this is exactly the identity.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_identity(&self) -> bool {
        self.x == 1.0 && self.y == 1.0
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// An axis-aligned rectangle, optionally rotated about its top-left corner.
///
/// Rotation follows the canvas convention: degrees, clockwise, pivoting on
/// `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge before rotation.
    pub x: f32,
    /// Top edge before rotation.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Clockwise rotation in degrees.
    pub rotation: f32,
}

impl Rect {
    /// Check if a point (in canvas coordinates) is within this rectangle.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn contains(&self, px: f32, py: f32) -> bool {
        let (lx, ly) = if self.rotation == 0.0 {
            (px - self.x, py - self.y)
        } else {
            // Undo the rotation around the pivot.
            let (sin, cos) = (-self.rotation).to_radians().sin_cos();
            let dx = px - self.x;
            let dy = py - self.y;
            (dx * cos - dy * sin, dx * sin + dy * cos)
        };
        lx >= 0.0 && lx <= self.width && ly >= 0.0 && ly <= self.height
    }
}

/// Normalize a rotation in degrees into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(degrees: f32) -> f32 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Clamp an opacity into `[0, 1]`; NaN becomes fully opaque.
#[must_use]
pub fn clamp_opacity(opacity: f32) -> f32 {
    if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}

//! # Card Canvas Renderer
//!
//! Export adapter and bitmap decoder for the card canvas editor.
//!
//! ## Export Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  Scene                      │
//! ├─────────────────────────────────────────────┤
//! │            SVG intermediate                 │
//! ├─────────────┬─────────────┬─────────────────┤
//! │ resvg PNG   │ JPEG        │ printpdf PDF    │
//! │ (density)   │ (flattened) │ (one page)      │
//! └─────────────┴─────────────┴─────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod export;
pub mod image;

pub use error::{RenderError, RenderResult};
pub use export::{ExportConfig, ExportFormat, SceneExporter};
pub use self::image::{ImageFormat, RasterDecoder};

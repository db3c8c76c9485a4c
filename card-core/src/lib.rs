//! # Card Canvas Core
//!
//! Scene model, selection routing, mutations and template persistence for a
//! single-card design editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               EditorSession                 │
//! ├─────────────────────────────────────────────┤
//! │  Scene           │  Selection routing       │
//! │  - Background    │  - Hit testing           │
//! │  - Images (z)    │  - Tab carve-outs        │
//! │  - Texts         │  - Deselect chain        │
//! ├─────────────────────────────────────────────┤
//! │  Templates       │  Boundaries (traits)     │
//! │  - Serialize     │  - TemplateStore         │
//! │  - Deserialize   │  - ImageDecoder          │
//! │                  │  - SceneRenderer         │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod asset;
pub mod config;
pub mod element;
pub mod error;
pub mod geometry;
pub mod mutation;
pub mod scene;
pub mod selection;
pub mod session;
pub mod store;
pub mod template;

#[cfg(test)]
mod test_support;

pub use asset::{Bitmap, EncodedImage, ImageDecoder};
pub use config::{BackgroundDefaults, EditorConfig, TextDefaults};
pub use element::{ElementId, ElementKind, FontFamily, ImageElement, TextEdit, TextElement};
pub use error::{CardError, CardResult};
pub use geometry::{Point, Rect, Scale, Size};
pub use mutation::{Mutation, MutationOutcome, ReorderDirection, TransformReport};
pub use scene::{Background, ElementRef, Scene};
pub use selection::{
    route_interaction, ControlSurface, EditorTab, Interaction, PointerTarget, RouteOutcome,
    Selection,
};
pub use session::{
    BackgroundImportTicket, EditorSession, FileInput, ImageImportTicket, LoadTicket, Persistence,
    SceneRenderer, TemplateLoader,
};
pub use store::{FileTemplateStore, MemoryTemplateStore, StoreError, TemplateStore};
pub use template::{BackgroundRecord, ImageRecord, TemplateId, TemplateRecord};

/// Card core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

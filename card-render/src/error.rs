//! Renderer error types.

use card_core::CardError;
use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur during rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Resource loading failed.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// Encoding the scene into an output format failed.
    #[error("Export failed: {0}")]
    Export(String),
}

impl From<RenderError> for CardError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Resource(msg) => Self::DecodeFailure(msg),
            RenderError::Export(msg) => Self::Render(msg),
        }
    }
}

//! Error types for card editing operations.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for card operations.
pub type CardResult<T> = Result<T, CardError>;

/// Errors that can occur while editing, saving or loading a card.
#[derive(Debug, Error)]
pub enum CardError {
    /// User input failed validation (for example a blank template name).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The saved-template cap has been reached.
    #[error("You have reached the maximum of {limit} saved templates. Delete one before saving a new template.")]
    LimitExceeded {
        /// Configured maximum number of templates.
        limit: usize,
    },

    /// A stale reference to an element or template that no longer exists.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The persistence collaborator failed to initialize.
    #[error("Template storage is unavailable: {0}")]
    PersistenceUnavailable(String),

    /// Image bytes could not be decoded.
    #[error("Failed to decode image: {0}")]
    DecodeFailure(String),

    /// The persistence collaborator rejected an operation.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Template serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The export boundary failed to render the scene.
    #[error("Rendering error: {0}")]
    Render(String),
}

impl CardError {
    /// Whether the user can recover from this error by acting on the message
    /// (fixing input, deleting a template, picking another file).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::LimitExceeded { .. }
                | Self::NotFound(_)
                | Self::DecodeFailure(_)
        )
    }
}

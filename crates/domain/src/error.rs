//! Engine-level error taxonomy

use thiserror::Error;

use crate::model::TagId;
use crate::policy::ValidationError;
use crate::ports::StoreError;

/// Errors surfaced by the tagging use cases
#[derive(Debug, Error)]
pub enum TagError {
    /// A field failed its constraints; nothing was written
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An explicitly addressed tag does not exist
    #[error("Tag not found: {0}")]
    NotFound(TagId),

    /// The unique slug is held by a record that could not be re-read
    #[error("Slug '{slug}' is already taken")]
    Conflict { slug: String },

    /// The subject type is not in the registry
    #[error("Unknown subject type: {0}")]
    UnknownSubjectType(String),

    /// Underlying persistence failure; the write was not applied
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

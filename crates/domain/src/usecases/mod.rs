//! Application use cases / business logic

pub mod resolve;
pub mod scope;
pub mod sync;
pub mod taggable;
pub mod tags;

#[cfg(test)]
pub(crate) mod fake_store;

pub use resolve::{Resolution, TagResolver};
pub use scope::ScopePredicate;
pub use sync::reconcile;
pub use taggable::Taggable;
pub use tags::TagService;

use crate::error::TagError;
use crate::ports::StoreTx;

/// Commit on success, roll back on failure
pub(crate) async fn finish<T>(
    tx: Box<dyn StoreTx>,
    result: Result<T, TagError>,
) -> Result<T, TagError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                tracing::warn!(error = %rollback_error, "Rollback failed");
            }
            Err(error)
        }
    }
}

//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the tagging engine and the
//! systems it relies on. Adapters implement them to connect to real storage
//! and notification transports.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::events::EventEnvelope;
use crate::model::{SubjectRef, Tag, TagDraft, TagId, TagPatch};
use crate::usecases::ScopePredicate;

/// Error type for tag store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Port for durable tag and association storage.
///
/// Every operation runs inside a unit of work obtained from [`TagStore::begin`];
/// nothing is visible to other callers until [`StoreTx::commit`].
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Open a new unit of work
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// A single transactional unit of work against the tag store.
///
/// Lookups ignore soft-deleted tags unless stated otherwise.
#[async_trait]
pub trait StoreTx: Send {
    /// Find a live tag by its unique slug
    async fn find_by_slug(&mut self, slug: &str) -> Result<Option<Tag>, StoreError>;

    /// Find the first live tag (by sort order) whose `name[locale]` equals `name`
    async fn find_by_name(
        &mut self,
        locale: &str,
        name: &str,
        group: Option<&str>,
    ) -> Result<Option<Tag>, StoreError>;

    /// Fetch the live tags among `ids`, in no particular order
    async fn find_by_ids(&mut self, ids: &[TagId]) -> Result<Vec<Tag>, StoreError>;

    /// Fetch a tag by id, including soft-deleted ones
    async fn get_tag(&mut self, id: TagId) -> Result<Option<Tag>, StoreError>;

    /// List live tags ordered by sort order, optionally within a group
    async fn list_tags(&mut self, group: Option<&str>) -> Result<Vec<Tag>, StoreError>;

    /// Insert a tag. Returns `UniqueViolation` when a live tag holds the slug.
    async fn insert_tag(&mut self, draft: &TagDraft) -> Result<Tag, StoreError>;

    /// Update a live tag; `None` when no live tag has that id
    async fn update_tag(
        &mut self,
        id: TagId,
        patch: &TagPatch,
    ) -> Result<Option<Tag>, StoreError>;

    /// Soft-delete a live tag and remove its associations
    async fn soft_delete_tag(&mut self, id: TagId) -> Result<Option<Tag>, StoreError>;

    /// Clear `deleted_at` on a soft-deleted tag. Returns `UniqueViolation`
    /// when a live tag has taken the slug in the meantime.
    async fn restore_tag(&mut self, id: TagId) -> Result<Option<Tag>, StoreError>;

    /// Tag ids associated with a subject, ordered by tag sort order
    async fn list_associations(&mut self, subject: &SubjectRef) -> Result<Vec<TagId>, StoreError>;

    /// Tags associated with a subject, ordered by sort order
    async fn list_subject_tags(&mut self, subject: &SubjectRef) -> Result<Vec<Tag>, StoreError>;

    /// Ids of the subjects of one type that carry a tag, in id order
    async fn list_entries(
        &mut self,
        tag_id: TagId,
        subject_type: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Insert association rows; existing rows are left untouched
    async fn attach(&mut self, subject: &SubjectRef, ids: &[TagId]) -> Result<(), StoreError>;

    /// Remove the given association rows
    async fn detach(&mut self, subject: &SubjectRef, ids: &[TagId]) -> Result<(), StoreError>;

    /// Remove every association row of a subject, returning the count
    async fn detach_all(&mut self, subject: &SubjectRef) -> Result<u64, StoreError>;

    /// Keep the candidate subject ids that satisfy the predicate, in input order
    async fn filter_subjects(
        &mut self,
        subject_type: &str,
        candidates: &[String],
        predicate: &ScopePredicate,
    ) -> Result<Vec<String>, StoreError>;

    /// Make all writes of this unit durable
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard all writes of this unit
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Error type for event delivery
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event rejected by sink: {0}")]
    Rejected(String),
    #[error("Event serialization failed: {0}")]
    Serialization(String),
}

/// Port for delivering lifecycle notifications
pub trait EventSink: Send + Sync {
    /// Deliver one event; called after the triggering write is committed
    fn emit(&self, event: &EventEnvelope) -> Result<(), EventError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

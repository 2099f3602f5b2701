//! taggable domain crate
//!
//! Core tagging logic following hexagonal architecture:
//! - `model`: Tags, subjects, associations and option types
//! - `parser`: Normalizes heterogeneous tag input into references
//! - `slug`: Slug derivation and group normalization
//! - `policy`: Field constraints
//! - `subjects`: Registry of taggable subject types
//! - `events`: Lifecycle notifications
//! - `ports`: Trait definitions for storage, event delivery and time
//! - `usecases`: Resolution, synchronization, query predicates and tag management

pub mod error;
pub mod events;
pub mod model;
pub mod parser;
pub mod policy;
pub mod ports;
pub mod slug;
pub mod subjects;
pub mod usecases;

pub use error::TagError;
pub use events::{EventEmitter, EventEnvelope, TagEvent};
pub use model::*;
pub use parser::{ParsedRefs, TagInput, TagRef, TagRefParser};
pub use policy::{FieldPolicy, PolicyConfig, ValidationError};
pub use ports::*;
pub use subjects::SubjectRegistry;
pub use usecases::{ScopePredicate, TagService, Taggable};

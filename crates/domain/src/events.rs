//! Lifecycle notifications
//!
//! Events are raised only after the triggering write has been committed and
//! carry owned snapshots. Delivery failures are logged and otherwise ignored:
//! the data layer and the notification layer fail independently.

use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::{SubjectRef, Tag, TagId};
use crate::ports::{Clock, EventSink};

/// A lifecycle notification with its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TagEvent {
    TagCreated { tag: Tag },
    TagUpdated { tag: Tag },
    TagDeleted { tag: Tag },
    TagRestored { tag: Tag },
    /// Attach completed; `tag_ids` lists what was newly attached
    SubjectTagged {
        subject: SubjectRef,
        tag_ids: Vec<TagId>,
    },
    /// Detach completed; `tag_ids` lists what was removed
    SubjectUntagged {
        subject: SubjectRef,
        tag_ids: Vec<TagId>,
    },
}

impl TagEvent {
    /// Stable dotted name, e.g. `tag.created`
    pub fn name(&self) -> &'static str {
        match self {
            TagEvent::TagCreated { .. } => "tag.created",
            TagEvent::TagUpdated { .. } => "tag.updated",
            TagEvent::TagDeleted { .. } => "tag.deleted",
            TagEvent::TagRestored { .. } => "tag.restored",
            TagEvent::SubjectTagged { .. } => "subject.tagged",
            TagEvent::SubjectUntagged { .. } => "subject.untagged",
        }
    }
}

/// Envelope delivered to sinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    pub event: TagEvent,
}

/// Wraps an [`EventSink`], stamping envelopes and swallowing delivery errors
#[derive(Clone)]
pub struct EventEmitter {
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl EventEmitter {
    pub fn new(sink: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }

    pub fn emit(&self, event: TagEvent) {
        let envelope = EventEnvelope {
            id: Uuid::new_v4(),
            occurred_at: self.clock.now(),
            event,
        };

        if let Err(error) = self.sink.emit(&envelope) {
            tracing::warn!(
                event = envelope.event.name(),
                event_id = %envelope.id,
                error = %error,
                "Event delivery failed"
            );
        }
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = TagEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{EventError, SystemClock};
    use std::sync::Mutex;

    struct FlakySink {
        delivered: Mutex<Vec<&'static str>>,
    }

    impl EventSink for FlakySink {
        fn emit(&self, event: &EventEnvelope) -> Result<(), EventError> {
            if matches!(event.event, TagEvent::SubjectTagged { .. }) {
                return Err(EventError::Rejected("subscriber failed".to_string()));
            }
            self.delivered.lock().unwrap().push(event.event.name());
            Ok(())
        }
    }

    #[test]
    fn test_failed_delivery_does_not_stop_later_events() {
        let sink = Arc::new(FlakySink {
            delivered: Mutex::new(Vec::new()),
        });
        let emitter = EventEmitter::new(sink.clone(), Arc::new(SystemClock));
        let subject = SubjectRef::new("posts", "1");

        emitter.emit_all(vec![
            TagEvent::SubjectTagged {
                subject: subject.clone(),
                tag_ids: vec![TagId(1)],
            },
            TagEvent::SubjectUntagged {
                subject,
                tag_ids: vec![TagId(2)],
            },
        ]);

        assert_eq!(*sink.delivered.lock().unwrap(), vec!["subject.untagged"]);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = TagEvent::SubjectUntagged {
            subject: SubjectRef::new("posts", "7"),
            tag_ids: vec![TagId(3)],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "subject_untagged");
        assert_eq!(json["subject"]["subject_id"], "7");
        assert_eq!(json["tag_ids"][0], 3);
    }
}

//! Event sink adapters

use std::sync::{Mutex, PoisonError};
use taggable_domain::{EventEnvelope, EventError, EventSink, TagEvent};

/// Logs every event as a JSON payload at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &EventEnvelope) -> Result<(), EventError> {
        let payload =
            serde_json::to_string(event).map_err(|e| EventError::Serialization(e.to_string()))?;
        tracing::info!(
            event = event.event.name(),
            event_id = %event.id,
            payload = %payload,
            "Tag event"
        );
        Ok(())
    }
}

/// Keeps delivered events in memory for later inspection
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Dotted names of delivered events, in delivery order
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.event.name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return everything recorded so far
    pub fn drain(&self) -> Vec<TagEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .map(|e| e.event)
            .collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &EventEnvelope) -> Result<(), EventError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: &EventEnvelope) -> Result<(), EventError> {
        Ok(())
    }
}

//! Event sinks.
//!
//! [`TracingSink`] is the production backend: it renders each event as a JSON
//! payload and forwards it through the `tracing` macros, so whatever
//! subscriber [`init_logging`](crate::init_logging) installed decides the
//! final format and destination. [`CaptureSink`] stores events in memory and
//! exists for tests and demos that need to assert on emitted entries.

use std::sync::Mutex;

use crate::event::{Event, EventSink, Level};

/// Sink that forwards events to the `tracing` ecosystem.
///
/// Each event is rendered once via [`Event::to_json`] and emitted as a single
/// `entry` field at the event's level under the `janus` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Creates a tracing-backed sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingSink {
    fn accept(&self, event: Event) {
        let entry = event.to_json();
        match event.level() {
            Level::Info => tracing::info!(target: "janus", entry = %entry),
            Level::Error => tracing::error!(target: "janus", entry = %entry),
        }
    }
}

/// Sink that records every event for later inspection.
///
/// Intended for tests; see the crate examples. Events are returned as clones
/// so assertions never hold the internal lock.
#[derive(Debug, Default)]
pub struct CaptureSink {
    events: Mutex<Vec<Event>>,
}

impl CaptureSink {
    /// Creates an empty capture sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every event accepted so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("capture sink poisoned").clone()
    }

    /// Number of events accepted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().expect("capture sink poisoned").len()
    }

    /// Returns true if no events were accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CaptureSink {
    fn accept(&self, event: Event) {
        self.events.lock().expect("capture sink poisoned").push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventLogger;

    #[test]
    fn test_capture_sink_records_in_order() {
        let sink = CaptureSink::new();
        assert!(sink.is_empty());

        sink.info().str("path", "/a").send();
        sink.error().str("path", "/b").send();

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level(), Level::Info);
        assert_eq!(events[0].field("path").unwrap().as_str(), Some("/a"));
        assert_eq!(events[1].level(), Level::Error);
    }

    #[test]
    fn test_tracing_sink_accepts_events() {
        // No subscriber installed; emission must still be a no-op, not a panic.
        let sink = TracingSink::new();
        sink.info().str("path", "/health").send();
        sink.error().int("status", 500).send();
    }

    #[test]
    fn test_dyn_sink_has_leveled_builders() {
        let sink = CaptureSink::new();
        let logger: &dyn EventSink = &sink;
        logger.info().int("status", 204).send();
        assert_eq!(sink.len(), 1);
    }
}

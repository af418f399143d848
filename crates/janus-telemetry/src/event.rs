//! Structured log events and the leveled entry builder.
//!
//! An [`Event`] is a flat list of typed key/value fields at a severity
//! [`Level`]. Events are assembled with an [`EventBuilder`] obtained from an
//! [`EventLogger`] and handed to an [`EventSink`] by the terminal
//! [`send`](EventBuilder::send) call. Formatting and transport are entirely
//! the sink's concern.
//!
//! # Example
//!
//! ```
//! use janus_telemetry::{CaptureSink, EventLogger};
//! use std::time::Duration;
//!
//! let sink = CaptureSink::new();
//! sink.info()
//!     .str("method", "GET")
//!     .int("status", 200)
//!     .dur("latency", Duration::from_millis(12))
//!     .send();
//!
//! assert_eq!(sink.events().len(), 1);
//! ```

use std::borrow::Cow;
use std::time::Duration;

use serde_json::Value;

use crate::stack;

/// Severity of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Normal request-lifecycle events.
    Info,
    /// Failures and recovered faults.
    Error,
}

impl Level {
    /// Returns the lowercase name of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// A typed field value attached to an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A text value.
    Str(String),
    /// An integer value.
    Int(i64),
    /// An elapsed duration.
    Duration(Duration),
    /// Raw bytes, rendered by sinks as embedded JSON when they parse as such.
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Returns the text value, if this field holds one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, if this field holds one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the duration value, if this field holds one.
    #[must_use]
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the raw bytes, if this field holds them.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// A single key/value attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    key: Cow<'static, str>,
    value: FieldValue,
}

impl Field {
    /// The field key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The field value.
    #[must_use]
    pub fn value(&self) -> &FieldValue {
        &self.value
    }
}

/// A finalized structured log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    level: Level,
    fields: Vec<Field>,
}

impl Event {
    fn new(level: Level) -> Self {
        Self { level, fields: Vec::new() }
    }

    /// The severity of this event.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// All fields in attachment order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up the first field with the given key.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key == key).map(Field::value)
    }

    /// Returns true if a field with the given key is present.
    #[must_use]
    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// Renders the event as a JSON object.
    ///
    /// Durations become fractional milliseconds. Byte fields that parse as
    /// JSON are embedded as-is; anything else is rendered lossily as text.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::with_capacity(self.fields.len() + 1);
        map.insert("level".to_owned(), Value::from(self.level.as_str()));
        for field in &self.fields {
            let value = match &field.value {
                FieldValue::Str(s) => Value::from(s.as_str()),
                FieldValue::Int(i) => Value::from(*i),
                FieldValue::Duration(d) => Value::from(d.as_secs_f64() * 1000.0),
                FieldValue::Bytes(b) => serde_json::from_slice(b)
                    .unwrap_or_else(|_| Value::from(String::from_utf8_lossy(b).into_owned())),
            };
            map.insert(field.key.clone().into_owned(), value);
        }
        Value::Object(map)
    }
}

/// Destination for finalized events.
///
/// Implement this once per backend; the leveled builder surface comes for
/// free through the blanket [`EventLogger`] implementation.
pub trait EventSink: Send + Sync {
    /// Accepts one finalized event.
    fn accept(&self, event: Event);
}

/// Begins leveled structured entries.
///
/// Implemented for every [`EventSink`], including `dyn EventSink`, so the
/// middleware can hold an `Arc<dyn EventSink>` and still write
/// `logger.info()...send()`.
pub trait EventLogger: Send + Sync {
    /// Begins an info-level entry.
    fn info(&self) -> EventBuilder<'_>;

    /// Begins an error-level entry.
    fn error(&self) -> EventBuilder<'_>;
}

impl<S: EventSink> EventLogger for S {
    fn info(&self) -> EventBuilder<'_> {
        EventBuilder::new(self, Level::Info)
    }

    fn error(&self) -> EventBuilder<'_> {
        EventBuilder::new(self, Level::Error)
    }
}

impl<'s> EventLogger for dyn EventSink + 's {
    fn info(&self) -> EventBuilder<'_> {
        EventBuilder::new(self, Level::Info)
    }

    fn error(&self) -> EventBuilder<'_> {
        EventBuilder::new(self, Level::Error)
    }
}

/// Builder for one [`Event`], bound to the sink that will receive it.
///
/// Field methods consume and return the builder; [`send`](Self::send)
/// finalizes the entry. Dropping a builder without sending discards it.
#[must_use = "an event builder does nothing until `send` is called"]
pub struct EventBuilder<'a> {
    sink: &'a dyn EventSink,
    event: Event,
}

impl<'a> EventBuilder<'a> {
    /// Starts an empty entry at `level` destined for `sink`.
    pub fn new(sink: &'a dyn EventSink, level: Level) -> Self {
        Self { sink, event: Event::new(level) }
    }

    fn push(mut self, key: impl Into<Cow<'static, str>>, value: FieldValue) -> Self {
        self.event.fields.push(Field { key: key.into(), value });
        self
    }

    /// Attaches a text field.
    pub fn str(self, key: impl Into<Cow<'static, str>>, value: impl Into<String>) -> Self {
        self.push(key, FieldValue::Str(value.into()))
    }

    /// Attaches an integer field.
    pub fn int(self, key: impl Into<Cow<'static, str>>, value: i64) -> Self {
        self.push(key, FieldValue::Int(value))
    }

    /// Attaches a duration field.
    pub fn dur(self, key: impl Into<Cow<'static, str>>, value: Duration) -> Self {
        self.push(key, FieldValue::Duration(value))
    }

    /// Attaches raw bytes (e.g. a captured request body).
    pub fn raw(self, key: impl Into<Cow<'static, str>>, value: impl Into<Vec<u8>>) -> Self {
        self.push(key, FieldValue::Bytes(value.into()))
    }

    /// Attaches an arbitrary value through its `Debug` rendering.
    pub fn any<T: std::fmt::Debug>(self, key: impl Into<Cow<'static, str>>, value: &T) -> Self {
        self.push(key, FieldValue::Str(format!("{value:?}")))
    }

    /// Attaches call-stack text under the `stack` key, rendered according to
    /// the process-wide [`StackFormat`](crate::StackFormat).
    pub fn stack(self, text: impl Into<String>) -> Self {
        let rendered = stack::render(&text.into());
        self.push("stack", FieldValue::Str(rendered))
    }

    /// Finalizes the entry and hands it to the sink.
    pub fn send(self) {
        self.sink.accept(self.event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CaptureSink;

    #[test]
    fn test_builder_attaches_typed_fields() {
        let sink = CaptureSink::new();
        sink.info()
            .str("method", "GET")
            .int("status", 200)
            .dur("latency", Duration::from_millis(5))
            .raw("request_body", b"{\"a\":1}".to_vec())
            .send();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.level(), Level::Info);
        assert_eq!(event.field("method").unwrap().as_str(), Some("GET"));
        assert_eq!(event.field("status").unwrap().as_int(), Some(200));
        assert_eq!(
            event.field("latency").unwrap().as_duration(),
            Some(Duration::from_millis(5))
        );
        assert_eq!(
            event.field("request_body").unwrap().as_bytes(),
            Some(b"{\"a\":1}".as_slice())
        );
    }

    #[test]
    fn test_any_uses_debug_rendering() {
        let sink = CaptureSink::new();
        sink.error().any("error", &vec![1, 2, 3]).send();

        let events = sink.events();
        assert_eq!(events[0].field("error").unwrap().as_str(), Some("[1, 2, 3]"));
    }

    #[test]
    fn test_dropped_builder_emits_nothing() {
        let sink = CaptureSink::new();
        let _ = sink.info().str("method", "GET");
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_to_json_renders_levels_and_durations() {
        let sink = CaptureSink::new();
        sink.error()
            .int("status", 500)
            .dur("latency", Duration::from_millis(250))
            .send();

        let json = sink.events()[0].to_json();
        assert_eq!(json["level"], "error");
        assert_eq!(json["status"], 500);
        assert!((json["latency"].as_f64().unwrap() - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_to_json_embeds_json_bytes() {
        let sink = CaptureSink::new();
        sink.info().raw("request_body", b"{\"id\":7}".to_vec()).send();
        let json = sink.events()[0].to_json();
        assert_eq!(json["request_body"]["id"], 7);
    }

    #[test]
    fn test_to_json_falls_back_to_lossy_text() {
        let sink = CaptureSink::new();
        sink.info().raw("request_body", b"not json".to_vec()).send();
        let json = sink.events()[0].to_json();
        assert_eq!(json["request_body"], "not json");
    }

    #[test]
    fn test_level_names() {
        assert_eq!(Level::Info.as_str(), "info");
        assert_eq!(Level::Error.as_str(), "error");
    }
}

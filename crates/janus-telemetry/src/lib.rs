//! # Janus Telemetry
//!
//! Structured event logging for the janus middleware stages.
//!
//! The middleware crate never formats or transports log output itself. It
//! speaks to a backend through two small traits defined here:
//!
//! - [`EventSink`] — accepts finalized [`Event`]s (one method; implement this
//!   per backend)
//! - [`EventLogger`] — begins `info`/`error` entries as [`EventBuilder`]s
//!   (blanket-implemented for every sink)
//!
//! Two sinks ship with the crate: [`TracingSink`] forwards JSON-rendered
//! events through the `tracing` ecosystem, and [`CaptureSink`] records them
//! in memory for assertions.
//!
//! ```text
//! stages ──EventBuilder──▶ EventSink ──┬─▶ TracingSink ─▶ tracing subscriber
//!                                      └─▶ CaptureSink ─▶ test assertions
//! ```
//!
//! [`init_logging`] installs the `tracing-subscriber` stack (JSON or pretty)
//! that `TracingSink` output flows through, and [`init_stack_format`] is the
//! one-time process-wide choice of stack-trace rendering.
//!
//! # Example
//!
//! ```
//! use janus_telemetry::{CaptureSink, EventLogger, Level};
//!
//! let sink = CaptureSink::new();
//! sink.error().str("error", "boom").int("status", 500).send();
//!
//! let events = sink.events();
//! assert_eq!(events[0].level(), Level::Error);
//! assert_eq!(events[0].field("status").unwrap().as_int(), Some(500));
//! ```

#![doc(html_root_url = "https://docs.rs/janus-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod event;
pub mod logging;
pub mod sink;
pub mod stack;

pub use error::TelemetryError;
pub use event::{Event, EventBuilder, EventLogger, EventSink, Field, FieldValue, Level};
pub use logging::{fields, init_logging, LogConfig};
pub use sink::{CaptureSink, TracingSink};
pub use stack::{init_stack_format, stack_format, StackFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

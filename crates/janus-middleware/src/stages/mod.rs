//! Built-in middleware stages.
//!
//! Two stages ship with the crate, designed to chain around the same
//! handler invocation:
//!
//! - [`access_log`] — structured per-request logging with optional body
//!   capture, correlation ids, and a skip-set
//! - [`recovery`] — the panic boundary that keeps the process serving
//!
//! Intended order: `AccessLog → Recovery → handler`.

pub mod access_log;
pub mod recovery;

pub use access_log::{
    uuid_v7_correlation, AccessLogConfig, AccessLogMiddleware, AccessLogOption, CorrelationIdFn,
    ExtraFieldsFn,
};
pub use recovery::{CaughtPanic, RecoveryHandler, RecoveryMiddleware};

//! # Janus Middleware
//!
//! Structured access logging and panic recovery for HTTP request pipelines.
//!
//! The crate provides two composable stages that wrap an opaque downstream
//! handler:
//!
//! ```text
//! Request → AccessLog → Recovery → Handler
//!                                     ↓
//! Response ←──────────────────────────┘
//! ```
//!
//! - The **access-log** stage records method, path, query, client address,
//!   user agent, status, and latency for every request, optionally capturing
//!   the body through a pooled buffer and tagging lines with a correlation
//!   id. Handler-reported errors each get their own error-level entry.
//! - The **recovery** stage catches panics from anything downstream,
//!   distinguishes client disconnects from genuine application failures, and
//!   converts the latter into a deterministic response so the listener keeps
//!   serving.
//!
//! Because the access-log stage sits outside the recovery stage, a recovered
//! panic still produces a latency-annotated access entry in addition to the
//! recovery record.
//!
//! Log output goes through the [`janus-telemetry`](janus_telemetry) sink
//! traits; the middleware never formats or transports entries itself.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use janus_middleware::stages::{AccessLogMiddleware, AccessLogOption, RecoveryMiddleware};
//! use janus_middleware::{full_body, Pipeline, RequestContext, Response, ResponseExt};
//! use janus_telemetry::{EventSink, TracingSink};
//!
//! #[tokio::main]
//! async fn main() {
//!     let logger: Arc<dyn EventSink> = Arc::new(TracingSink::new());
//!
//!     let pipeline = Pipeline::builder()
//!         .stage(AccessLogMiddleware::with_options(
//!             Arc::clone(&logger),
//!             [AccessLogOption::SkipPaths(vec!["/healthz".into()])],
//!         ))
//!         .stage(RecoveryMiddleware::new(logger, true))
//!         .build();
//!
//!     let request = http::Request::builder()
//!         .uri("/hello")
//!         .body(full_body(""))
//!         .unwrap();
//!
//!     let mut ctx = RequestContext::new();
//!     let response = pipeline
//!         .process(&mut ctx, request, |_ctx, _req| {
//!             Box::pin(async { Response::empty(http::StatusCode::OK) })
//!         })
//!         .await;
//!
//!     assert_eq!(response.status(), http::StatusCode::OK);
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/janus-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod pool;
pub mod stages;
pub mod types;

// Re-export main types at crate root
pub use context::RequestContext;
pub use middleware::{BoxFuture, FnMiddleware, Middleware, Next};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder};
pub use pool::{BufferPool, PooledBuf};
pub use types::{full_body, BoxError, Request, RequestBody, Response, ResponseExt};

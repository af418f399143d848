//! Panic-recovery middleware.
//!
//! Wraps the rest of the chain in an unwind boundary so one misbehaving
//! request cannot take the process down. A caught panic is classified first:
//!
//! - **Connection drop** — the payload's message contains, case-insensitively,
//!   "broken pipe" or "connection reset by peer". The peer is gone, so the
//!   stage logs a record without a stack (whatever the configuration says),
//!   records the failure on the context, and marks the context aborted; the
//!   recovery action is not invoked because there is nobody to answer.
//!   The substring match is a deliberate compatibility behavior: transport
//!   errors surface here without a stable typed taxonomy, so the text is the
//!   contract. Do not replace it with `io::ErrorKind` checks.
//! - **Application panic** — anything else. The stage logs a record carrying
//!   a dump of the request (method and headers, never the body) and, when
//!   enabled, the current backtrace, then produces the response through the
//!   configurable recovery action (default: empty `500`).
//!
//! The boundary itself never re-raises; the listener keeps serving.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use http::StatusCode;
use janus_telemetry::{fields, init_stack_format, EventLogger, EventSink, StackFormat};

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};

/// Produces the response for a recovered application panic.
pub type RecoveryHandler =
    Arc<dyn Fn(&mut RequestContext, &CaughtPanic) -> Response + Send + Sync>;

/// A panic caught at the recovery boundary.
#[derive(Debug, Clone)]
pub struct CaughtPanic {
    message: String,
    connection_drop: bool,
}

impl CaughtPanic {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(error) = payload.downcast_ref::<std::io::Error>() {
            error.to_string()
        } else {
            "<opaque panic payload>".to_owned()
        };
        let connection_drop = is_connection_drop(&message);
        Self {
            message,
            connection_drop,
        }
    }

    /// The panic payload rendered as text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if the panic was classified as a client disconnect.
    #[must_use]
    pub fn is_connection_drop(&self) -> bool {
        self.connection_drop
    }
}

/// Middleware that contains downstream panics.
pub struct RecoveryMiddleware {
    logger: Arc<dyn EventSink>,
    capture_stack: bool,
    on_recovered: RecoveryHandler,
}

impl RecoveryMiddleware {
    /// Creates the stage with the default recovery action (empty `500`).
    ///
    /// `capture_stack` controls whether application-panic records carry
    /// backtrace text.
    #[must_use]
    pub fn new(logger: Arc<dyn EventSink>, capture_stack: bool) -> Self {
        Self::with_handler(logger, capture_stack, Arc::new(default_on_recovered))
    }

    /// Creates the stage with a custom recovery action.
    #[must_use]
    pub fn with_handler(
        logger: Arc<dyn EventSink>,
        capture_stack: bool,
        on_recovered: RecoveryHandler,
    ) -> Self {
        // Process-wide, write-once; concurrent constructions agree.
        init_stack_format(StackFormat::Multiline);
        Self {
            logger,
            capture_stack,
            on_recovered,
        }
    }
}

impl Middleware for RecoveryMiddleware {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let path = request.uri().path().to_owned();
            let snapshot = RequestSnapshot::of(&request);

            match AssertUnwindSafe(next.run(ctx, request)).catch_unwind().await {
                Ok(response) => response,
                Err(payload) => {
                    let caught = CaughtPanic::from_payload(payload.as_ref());
                    let dump = snapshot.render();

                    if caught.connection_drop {
                        // The connection is dead; a stack trace adds nothing
                        // and the response cannot be delivered.
                        self.logger
                            .error()
                            .str(fields::PATH, path.as_str())
                            .str(fields::ERROR, caught.message.as_str())
                            .str(fields::REQUEST, dump)
                            .send();
                        ctx.record_error(&caught.message);
                        ctx.abort();
                        return Response::empty(StatusCode::INTERNAL_SERVER_ERROR);
                    }

                    let mut entry = self
                        .logger
                        .error()
                        .str(fields::PATH, path.as_str())
                        .str(fields::ERROR, "[Recovery from panic]")
                        .str(fields::PANIC, caught.message.as_str())
                        .str(fields::REQUEST, dump);
                    if self.capture_stack {
                        entry = entry.stack(Backtrace::force_capture().to_string());
                    }
                    entry.send();

                    (self.on_recovered)(ctx, &caught)
                }
            }
        })
    }
}

fn default_on_recovered(_ctx: &mut RequestContext, _panic: &CaughtPanic) -> Response {
    Response::empty(StatusCode::INTERNAL_SERVER_ERROR)
}

fn is_connection_drop(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("broken pipe") || message.contains("connection reset by peer")
}

/// Cheap clone of the request line and headers, rendered only on the
/// failure path. The body is deliberately never part of the dump.
struct RequestSnapshot {
    method: http::Method,
    uri: http::Uri,
    version: http::Version,
    headers: http::HeaderMap,
}

impl RequestSnapshot {
    fn of(request: &Request) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
        }
    }

    fn render(&self) -> String {
        use std::fmt::Write;

        let mut dump = String::new();
        let _ = write!(dump, "{} {} {:?}", self.method, self.uri, self.version);
        for (name, value) in &self.headers {
            let _ = write!(dump, "\r\n{name}: {}", value.to_str().unwrap_or("<binary>"));
        }
        dump
    }
}

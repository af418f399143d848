//! Access-log middleware.
//!
//! Wraps the rest of the chain and emits one structured entry per request:
//! method, path, query, client address, user agent, response status, and
//! latency. When the context accumulated handler errors, the stage emits one
//! error-level entry per error instead, each carrying the full field set.
//!
//! Optional behavior is switched on through [`AccessLogOption`] records:
//! a skip-set for health-check style paths, body capture through the shared
//! buffer pool, a per-line correlation identifier, a redundant textual
//! timestamp, and an extra-fields callback.
//!
//! # Ordering
//!
//! Place this stage *before* the recovery stage. Latency then covers the
//! whole downstream chain, and a recovered panic still produces exactly one
//! latency-annotated entry here in addition to the recovery record.
//!
//! # Example
//!
//! ```ignore
//! let access_log = AccessLogMiddleware::with_options(
//!     logger,
//!     [
//!         AccessLogOption::SkipPaths(vec!["/healthz".into()]),
//!         AccessLogOption::IncludeBody(true),
//!         AccessLogOption::CorrelationId(uuid_v7_correlation()),
//!     ],
//! );
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use chrono::{Local, Utc};
use http::StatusCode;
use http_body_util::BodyExt;
use janus_telemetry::{fields, EventBuilder, EventLogger, EventSink};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::pool;
use crate::types::{full_body, BoxError, Request, RequestBody, Response, ResponseExt};

/// Produces one correlation identifier per emitted log line.
pub type CorrelationIdFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Appends caller-defined fields to every emitted line.
pub type ExtraFieldsFn =
    Arc<dyn for<'a> Fn(&RequestContext, EventBuilder<'a>) -> EventBuilder<'a> + Send + Sync>;

/// A UUID v7 correlation generator (time-ordered, globally unique).
#[must_use]
pub fn uuid_v7_correlation() -> CorrelationIdFn {
    Arc::new(|| Uuid::now_v7().to_string())
}

/// One configuration mutation, applied in order over the defaults.
pub enum AccessLogOption {
    /// Exact request paths to exclude from logging. Appends to the set.
    SkipPaths(Vec<String>),
    /// chrono format string for a redundant textual `time` field; an empty
    /// string disables it.
    TimeFormat(String),
    /// Normalize the textual timestamp to UTC before formatting.
    UseUtc(bool),
    /// Attach a correlation identifier from this generator to every line.
    CorrelationId(CorrelationIdFn),
    /// Capture the request body, restore it for downstream, and log it.
    IncludeBody(bool),
    /// Callback that may append further fields to every line.
    ExtraFields(ExtraFieldsFn),
}

/// Resolved access-log configuration, immutable after construction.
#[derive(Default)]
pub struct AccessLogConfig {
    skip_paths: HashSet<String>,
    time_format: Option<String>,
    use_utc: bool,
    correlation_id: Option<CorrelationIdFn>,
    include_body: bool,
    extra_fields: Option<ExtraFieldsFn>,
}

impl AccessLogConfig {
    /// Builds a configuration by applying `options` in order over defaults.
    #[must_use]
    pub fn from_options(options: impl IntoIterator<Item = AccessLogOption>) -> Self {
        let mut config = Self::default();
        for option in options {
            config.apply(option);
        }
        config
    }

    fn apply(&mut self, option: AccessLogOption) {
        match option {
            AccessLogOption::SkipPaths(paths) => self.skip_paths.extend(paths),
            AccessLogOption::TimeFormat(format) => {
                self.time_format = if format.is_empty() { None } else { Some(format) };
            }
            AccessLogOption::UseUtc(use_utc) => self.use_utc = use_utc,
            AccessLogOption::CorrelationId(generate) => self.correlation_id = Some(generate),
            AccessLogOption::IncludeBody(include_body) => self.include_body = include_body,
            AccessLogOption::ExtraFields(extra) => self.extra_fields = Some(extra),
        }
    }

    /// Returns true if entries for `path` are suppressed.
    #[must_use]
    pub fn skips(&self, path: &str) -> bool {
        self.skip_paths.contains(path)
    }
}

/// Middleware that emits structured access-log entries.
pub struct AccessLogMiddleware {
    logger: Arc<dyn EventSink>,
    config: AccessLogConfig,
}

impl AccessLogMiddleware {
    /// Creates the stage with default configuration.
    #[must_use]
    pub fn new(logger: Arc<dyn EventSink>) -> Self {
        Self::with_config(logger, AccessLogConfig::default())
    }

    /// Creates the stage from a sequence of options.
    #[must_use]
    pub fn with_options(
        logger: Arc<dyn EventSink>,
        options: impl IntoIterator<Item = AccessLogOption>,
    ) -> Self {
        Self::with_config(logger, AccessLogConfig::from_options(options))
    }

    /// Creates the stage from a resolved configuration.
    #[must_use]
    pub fn with_config(logger: Arc<dyn EventSink>, config: AccessLogConfig) -> Self {
        Self { logger, config }
    }

    fn emit(&self, ctx: &RequestContext, entry: &EntryFields<'_>) {
        if ctx.has_errors() {
            for error in ctx.errors() {
                self.shared_fields(self.logger.error(), ctx, entry)
                    .str(fields::ERROR, error.as_str())
                    .send();
            }
        } else {
            self.shared_fields(self.logger.info(), ctx, entry).send();
        }
    }

    fn shared_fields<'s>(
        &self,
        builder: EventBuilder<'s>,
        ctx: &RequestContext,
        entry: &EntryFields<'_>,
    ) -> EventBuilder<'s> {
        let mut builder = builder
            .int(fields::STATUS, entry.status)
            .str(fields::METHOD, entry.method)
            .str(fields::PATH, entry.path)
            .str(fields::QUERY, entry.query)
            .str(fields::CLIENT_IP, entry.client_ip)
            .str(fields::USER_AGENT, entry.user_agent)
            .dur(fields::LATENCY, entry.latency);

        if let Some(body) = entry.body {
            builder = builder.raw(fields::REQUEST_BODY, body.to_vec());
        }

        if let Some(format) = &self.config.time_format {
            let time = if self.config.use_utc {
                Utc::now().format(format).to_string()
            } else {
                Local::now().format(format).to_string()
            };
            builder = builder.str(fields::TIME, time);
        }

        // One generator call per emitted line, not per request.
        if let Some(generate) = &self.config.correlation_id {
            builder = builder.str(fields::CORRELATION_ID, generate());
        }

        if let Some(extra) = &self.config.extra_fields {
            builder = extra(ctx, builder);
        }

        builder
    }
}

impl Middleware for AccessLogMiddleware {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            // Later stages may rebuild the request with a rewritten URI;
            // capture the observed values up front.
            let path = request.uri().path().to_owned();
            let query = request.uri().query().unwrap_or("").to_owned();
            let method = request.method().as_str().to_owned();
            let user_agent = request
                .headers()
                .get(http::header::USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("")
                .to_owned();
            let client_ip = client_ip(ctx, &request);

            let mut request = request;
            let mut captured = None;
            if self.config.include_body {
                let (parts, body) = request.into_parts();
                let mut buf = pool::shared().acquire();
                match copy_body(body, &mut buf).await {
                    Ok(()) => {
                        // Downstream gets a fresh, unconsumed view over the
                        // captured bytes.
                        let bytes = Bytes::copy_from_slice(&buf[..]);
                        request = http::Request::from_parts(parts, full_body(bytes));
                        captured = Some(buf);
                    }
                    Err(error) => {
                        self.logger
                            .error()
                            .str(fields::PATH, path.as_str())
                            .str(fields::ERROR, format!("failed to read request body: {error}"))
                            .send();
                        ctx.record_error(&error);
                        return Response::empty(StatusCode::BAD_REQUEST);
                    }
                }
            }

            let start = Instant::now();
            let response = next.run(ctx, request).await;
            let latency = start.elapsed();

            if !self.config.skips(&path) {
                let entry = EntryFields {
                    status: i64::from(response.status().as_u16()),
                    method: &method,
                    path: &path,
                    query: &query,
                    client_ip: &client_ip,
                    user_agent: &user_agent,
                    latency,
                    body: captured.as_deref().map(|buf| &buf[..]),
                };
                self.emit(ctx, &entry);
            }

            response
        })
    }
}

/// Field values shared by every line emitted for one request.
struct EntryFields<'r> {
    status: i64,
    method: &'r str,
    path: &'r str,
    query: &'r str,
    client_ip: &'r str,
    user_agent: &'r str,
    latency: Duration,
    body: Option<&'r [u8]>,
}

/// Streams the request body into `buf`, frame by frame.
async fn copy_body(mut body: RequestBody, buf: &mut BytesMut) -> Result<(), BoxError> {
    while let Some(frame) = body.frame().await {
        let frame = frame?;
        if let Some(data) = frame.data_ref() {
            buf.extend_from_slice(data);
        }
    }
    Ok(())
}

/// Resolves the client address: first `x-forwarded-for` element when
/// present, otherwise the connection's peer address.
fn client_ip(ctx: &RequestContext, request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());

    if let Some(first) = forwarded {
        return first.to_owned();
    }
    ctx.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default()
}

//! Demo gateway: the janus stages on a plain hyper server.
//!
//! Routes:
//!
//! - `GET /hello` — responds normally; excluded from logging via the skip-set
//! - `GET /greet` — responds normally and is logged
//! - `GET /flaky` — records a handler error, producing an error-level entry
//! - `GET /panic` — panics; the recovery stage converts it into a `500`
//!
//! Run with `cargo run -p gateway-demo`, then poke it:
//!
//! ```text
//! curl -i http://127.0.0.1:8002/greet
//! curl -i http://127.0.0.1:8002/panic
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use janus_middleware::stages::{
    uuid_v7_correlation, AccessLogMiddleware, AccessLogOption, RecoveryMiddleware,
};
use janus_middleware::{
    BoxError, BoxFuture, Pipeline, Request, RequestContext, Response, ResponseExt,
};
use janus_telemetry::{init_logging, EventSink, LogConfig, TracingSink};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&LogConfig::development())?;

    let logger: Arc<dyn EventSink> = Arc::new(TracingSink::new());
    let pipeline = Arc::new(
        Pipeline::builder()
            .stage(AccessLogMiddleware::with_options(
                Arc::clone(&logger),
                [
                    AccessLogOption::SkipPaths(vec!["/hello".to_owned()]),
                    AccessLogOption::IncludeBody(true),
                    AccessLogOption::CorrelationId(uuid_v7_correlation()),
                ],
            ))
            .stage(RecoveryMiddleware::new(logger, true))
            .build(),
    );

    let addr: SocketAddr = "127.0.0.1:8002".parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("gateway listening on {addr}");

    loop {
        let (stream, remote_addr) = listener.accept().await?;
        let pipeline = Arc::clone(&pipeline);

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req: http::Request<Incoming>| {
                let pipeline = Arc::clone(&pipeline);
                async move { serve(pipeline, req, remote_addr).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::error!("connection error from {remote_addr}: {e}");
            }
        });
    }
}

/// Runs one request through the pipeline and the demo router.
async fn serve(
    pipeline: Arc<Pipeline>,
    req: http::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<Response, Infallible> {
    let req: Request = req.map(|body| body.map_err(|e| Box::new(e) as BoxError).boxed());

    let mut ctx = RequestContext::with_peer_addr(remote_addr);
    let response = pipeline.process(&mut ctx, req, route).await;

    if ctx.is_aborted() {
        // The peer is gone; hand hyper an empty response for a connection
        // that will not accept it anyway.
        return Ok(Response::empty(StatusCode::INTERNAL_SERVER_ERROR));
    }
    Ok(response)
}

fn route(ctx: &mut RequestContext, req: Request) -> BoxFuture<'static, Response> {
    match (req.method().as_str(), req.uri().path()) {
        ("GET", "/hello") => Box::pin(async { Response::message(StatusCode::OK, "hello\n") }),
        ("GET", "/greet") => Box::pin(async { Response::message(StatusCode::OK, "well met\n") }),
        ("GET", "/panic") => panic!("panic msg."),
        ("GET", "/flaky") => {
            ctx.record_error("upstream quota exceeded");
            Box::pin(async { Response::empty(StatusCode::TOO_MANY_REQUESTS) })
        }
        _ => Box::pin(async { Response::empty(StatusCode::NOT_FOUND) }),
    }
}

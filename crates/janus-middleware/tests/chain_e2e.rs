//! End-to-end chain integration tests.
//!
//! These tests run the access-log and recovery stages together, the way a
//! host wires them: `AccessLog → Recovery → handler`. The interesting
//! properties are cross-stage — a recovered panic must still produce a
//! latency-annotated access entry, skip-sets must silence recovered requests
//! too, and concurrent failures must never bleed fields across requests.

use std::collections::HashSet;
use std::sync::Arc;

use http::StatusCode;
use janus_middleware::stages::{AccessLogMiddleware, AccessLogOption, RecoveryMiddleware};
use janus_middleware::{
    full_body, BoxFuture, FnMiddleware, Next, Pipeline, Request, RequestContext, Response,
    ResponseExt,
};
use janus_telemetry::{fields, CaptureSink, Event, EventSink, Level};

fn make_request(uri: &str) -> Request {
    http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(full_body(""))
        .unwrap()
}

fn build_pipeline(sink: &Arc<CaptureSink>, options: Vec<AccessLogOption>) -> Pipeline {
    let logger = Arc::clone(sink) as Arc<dyn EventSink>;
    Pipeline::builder()
        .stage(AccessLogMiddleware::with_options(Arc::clone(&logger), options))
        .stage(RecoveryMiddleware::new(logger, true))
        .build()
}

fn is_recovery_record(event: &Event) -> bool {
    event.field(fields::ERROR).and_then(|v| v.as_str()) == Some("[Recovery from panic]")
}

#[tokio::test]
async fn test_recovered_panic_still_gets_one_access_entry() {
    let sink = Arc::new(CaptureSink::new());
    let pipeline = build_pipeline(&sink, Vec::new());

    let mut ctx = RequestContext::new();
    let response = pipeline
        .process(&mut ctx, make_request("/explode"), |_ctx, _req| {
            panic!("boom")
        })
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let events = sink.events();
    assert_eq!(events.len(), 2);

    // The recovery record resolves the failure first; the access entry is
    // emitted after control returns to the outer stage.
    assert!(is_recovery_record(&events[0]));
    assert!(events[0].field(fields::STACK).is_some());

    let access = &events[1];
    assert_eq!(access.level(), Level::Info);
    assert_eq!(access.field(fields::STATUS).unwrap().as_int(), Some(500));
    assert_eq!(access.field(fields::PATH).unwrap().as_str(), Some("/explode"));
    assert!(access.field(fields::LATENCY).unwrap().as_duration().is_some());
}

#[tokio::test]
async fn test_connection_drop_flows_into_access_errors() {
    let sink = Arc::new(CaptureSink::new());
    let pipeline = build_pipeline(&sink, Vec::new());

    let mut ctx = RequestContext::new();
    let response = pipeline
        .process(&mut ctx, make_request("/stream"), |_ctx, _req| {
            panic!("write: broken pipe")
        })
        .await;

    // The host must discard the response for an aborted context.
    assert!(ctx.is_aborted());
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let events = sink.events();
    assert_eq!(events.len(), 2);

    // Drop record: no stack, even though capture is enabled.
    assert!(!events[0].has_field(fields::STACK));
    assert_eq!(
        events[0].field(fields::ERROR).unwrap().as_str(),
        Some("write: broken pipe")
    );

    // The recovery stage recorded the failure on the context, so the access
    // entry is error-level and repeats it.
    let access = &events[1];
    assert_eq!(access.level(), Level::Error);
    assert_eq!(
        access.field(fields::ERROR).unwrap().as_str(),
        Some("write: broken pipe")
    );
}

#[tokio::test]
async fn test_skip_paths_silence_recovered_requests() {
    let sink = Arc::new(CaptureSink::new());
    let pipeline = build_pipeline(
        &sink,
        vec![AccessLogOption::SkipPaths(vec!["/healthz".to_owned()])],
    );

    let mut ctx = RequestContext::new();
    pipeline
        .process(&mut ctx, make_request("/healthz"), |_ctx, _req| {
            panic!("probe exploded")
        })
        .await;

    // Only the recovery record survives; the access stage stays silent.
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert!(is_recovery_record(&events[0]));
}

#[tokio::test]
async fn test_body_capture_and_recovery_compose() {
    let sink = Arc::new(CaptureSink::new());
    let pipeline = build_pipeline(&sink, vec![AccessLogOption::IncludeBody(true)]);

    let request = http::Request::builder()
        .method("POST")
        .uri("/orders")
        .body(full_body(r#"{"card":"4111-1111"}"#))
        .unwrap();

    let mut ctx = RequestContext::new();
    pipeline
        .process(&mut ctx, request, |_ctx, _req| panic!("charge failed"))
        .await;

    let events = sink.events();
    assert_eq!(events.len(), 2);

    // The recovery dump carries method and headers only.
    let dump = events[0].field(fields::REQUEST).unwrap().as_str().unwrap();
    assert!(dump.starts_with("POST /orders"));
    assert!(!dump.contains("4111-1111"));

    // The access entry carries the captured body.
    assert_eq!(
        events[1].field(fields::REQUEST_BODY).unwrap().as_bytes(),
        Some(r#"{"card":"4111-1111"}"#.as_bytes())
    );
}

fn flagging<'a>(
    ctx: &'a mut RequestContext,
    request: Request,
    next: Next<'a>,
) -> BoxFuture<'a, Response> {
    Box::pin(async move {
        ctx.record_error("flagged by policy");
        next.run(ctx, request).await
    })
}

#[tokio::test]
async fn test_fn_stage_errors_surface_in_access_log() {
    let sink = Arc::new(CaptureSink::new());
    let logger = Arc::clone(&sink) as Arc<dyn EventSink>;

    let pipeline = Pipeline::builder()
        .stage(AccessLogMiddleware::new(Arc::clone(&logger)))
        .stage(FnMiddleware::new("policy", flagging))
        .stage(RecoveryMiddleware::new(logger, false))
        .build();

    assert_eq!(pipeline.stage_names(), ["access_log", "policy", "recovery"]);

    let mut ctx = RequestContext::new();
    let response = pipeline
        .process(&mut ctx, make_request("/flagged"), |_ctx, _req| {
            Box::pin(async { Response::empty(StatusCode::OK) })
        })
        .await;

    assert_eq!(response.status(), StatusCode::OK);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].level(), Level::Error);
    assert_eq!(
        events[0].field(fields::ERROR).unwrap().as_str(),
        Some("flagged by policy")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_panics_produce_isolated_records() {
    // Intentional panics in every task; silence the default hook so the test
    // output stays readable.
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));

    let sink = Arc::new(CaptureSink::new());
    let pipeline = Arc::new(build_pipeline(&sink, Vec::new()));

    let mut tasks = Vec::new();
    for i in 0..128_u32 {
        let pipeline = Arc::clone(&pipeline);
        tasks.push(tokio::spawn(async move {
            let mut ctx = RequestContext::new();
            let request = http::Request::builder()
                .method("GET")
                .uri(format!("/jobs/{i}"))
                .body(full_body(""))
                .unwrap();
            let response = pipeline
                .process(&mut ctx, request, move |_ctx, _req| {
                    panic!("job {i} exploded")
                })
                .await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    std::panic::set_hook(previous_hook);

    let events = sink.events();
    let recoveries: Vec<_> = events.iter().filter(|e| is_recovery_record(e)).collect();
    assert_eq!(recoveries.len(), 128);

    // Every job appears exactly once, and its path and panic fields belong
    // to the same request.
    let mut seen = HashSet::new();
    for record in &recoveries {
        let path = record.field(fields::PATH).unwrap().as_str().unwrap();
        let message = record.field(fields::PANIC).unwrap().as_str().unwrap();
        let id = path.strip_prefix("/jobs/").unwrap();
        assert_eq!(message, format!("job {id} exploded"));
        assert!(seen.insert(id.to_owned()), "duplicate record for {path}");
    }

    let access: Vec<_> = events.iter().filter(|e| e.has_field(fields::LATENCY)).collect();
    assert_eq!(access.len(), 128);
    for entry in access {
        assert_eq!(entry.field(fields::STATUS).unwrap().as_int(), Some(500));
    }
}

//! Common HTTP types used throughout the middleware chain.

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};

/// Boxed error type for request-body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The request body flowing through the chain.
///
/// Boxed and fallible on purpose: the access-log stage streams the body into
/// a capture buffer, and a real transport body can fail mid-read. Responses
/// stay infallible.
pub type RequestBody = BoxBody<Bytes, BoxError>;

/// The HTTP request type used in the middleware chain.
pub type Request = http::Request<RequestBody>;

/// The HTTP response type used in the middleware chain.
pub type Response = http::Response<Full<Bytes>>;

/// Wraps fully-buffered bytes as a [`RequestBody`].
///
/// Used to hand a downstream stage a fresh, unconsumed view over an already
/// captured body, and by tests to build requests.
pub fn full_body(bytes: impl Into<Bytes>) -> RequestBody {
    Full::new(bytes.into()).map_err(|never| match never {}).boxed()
}

/// Extension trait for building plain responses.
pub trait ResponseExt {
    /// Creates a response with the given status and no body.
    fn empty(status: http::StatusCode) -> Response;

    /// Creates a plain-text response with the given status and message.
    fn message(status: http::StatusCode, message: &str) -> Response;
}

impl ResponseExt for Response {
    fn empty(status: http::StatusCode) -> Response {
        http::Response::builder()
            .status(status)
            .body(Full::new(Bytes::new()))
            .expect("failed to build empty response")
    }

    fn message(status: http::StatusCode, message: &str) -> Response {
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Full::new(Bytes::from(message.to_owned())))
            .expect("failed to build message response")
    }
}

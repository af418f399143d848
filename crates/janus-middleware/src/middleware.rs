//! Core middleware trait and chain types.
//!
//! A middleware stage wraps the rest of the chain: it receives the mutable
//! [`RequestContext`], the request, and a [`Next`] continuation, and returns
//! the response. Stages compose around one downstream handler invocation, so
//! work placed after `next.run(..).await` runs strictly after every later
//! stage and the handler have returned control.
//!
//! # Example
//!
//! ```ignore
//! use janus_middleware::{BoxFuture, Middleware, Next, Request, RequestContext, Response};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let start = std::time::Instant::now();
//!             let response = next.run(ctx, request).await;
//!             if start.elapsed().as_secs() > 1 {
//!                 ctx.record_error("request exceeded the slow-call budget");
//!             }
//!             response
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use crate::context::RequestContext;
use crate::types::{Request, Response};

/// A boxed future that returns a response.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The core middleware trait.
///
/// # Invariants
///
/// - A stage calls `next.run()` at most once; not calling it short-circuits
///   the chain and the stage's own response is returned.
/// - A stage must be safe to run concurrently across requests; per-request
///   state belongs in the [`RequestContext`] or in locals.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this middleware stage.
    fn name(&self) -> &'static str;

    /// Processes the request through this stage.
    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// Continuation to the rest of the chain.
///
/// Passed to each stage; consumed by [`run`](Next::run), so it can only be
/// invoked once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    /// More stages to process.
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    /// End of chain: invoke the handler.
    Handler(HandlerFn<'a>),
}

type HandlerFn<'a> =
    Box<dyn FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + 'a>;

impl<'a> Next<'a> {
    /// Creates a `Next` that will invoke `middleware`, then `next`.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the handler.
    pub fn handler<F>(f: F) -> Self
    where
        F: FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(f)),
        }
    }

    /// Invokes the next stage or the handler.
    pub async fn run(self, ctx: &mut RequestContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                middleware.process(ctx, request, *next).await
            }
            NextInner::Handler(handler) => handler(ctx, request).await,
        }
    }
}

/// A middleware stage built from a function.
///
/// The function receives the borrowed context, the request, and the
/// continuation, and returns a boxed future tied to that borrow. Plain `fn`
/// items fit the higher-ranked bound directly.
///
/// # Example
///
/// ```ignore
/// fn passthrough<'a>(
///     ctx: &'a mut RequestContext,
///     request: Request,
///     next: Next<'a>,
/// ) -> BoxFuture<'a, Response> {
///     Box::pin(async move { next.run(ctx, request).await })
/// }
///
/// let stage = FnMiddleware::new("passthrough", passthrough);
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a new function-based middleware stage.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Request, Next<'a>) -> BoxFuture<'a, Response>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        (self.func)(ctx, request, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{full_body, ResponseExt};
    use http::StatusCode;

    struct Marking {
        name: &'static str,
    }

    impl Middleware for Marking {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut RequestContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                ctx.record_error(format!("visited:{}", self.name));
                next.run(ctx, request).await
            })
        }
    }

    fn make_request() -> Request {
        http::Request::builder()
            .uri("/test")
            .body(full_body(""))
            .unwrap()
    }

    #[test]
    fn test_middleware_name() {
        let mw = Marking { name: "marking" };
        assert_eq!(mw.name(), "marking");
    }

    #[tokio::test]
    async fn test_terminal_next_invokes_handler() {
        let mut ctx = RequestContext::new();

        let next = Next::handler(|_ctx, _req| {
            Box::pin(async { Response::empty(StatusCode::NO_CONTENT) })
        });

        let response = next.run(&mut ctx, make_request()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let first = Marking { name: "first" };
        let second = Marking { name: "second" };

        let handler = Next::handler(|_ctx, _req| {
            Box::pin(async { Response::empty(StatusCode::OK) })
        });
        let next = Next::new(&first, Next::new(&second, handler));

        let mut ctx = RequestContext::new();
        let response = next.run(&mut ctx, make_request()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.errors(), ["visited:first", "visited:second"]);
    }

    fn short_circuit<'a>(
        _ctx: &'a mut RequestContext,
        _request: Request,
        _next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async { Response::empty(StatusCode::FORBIDDEN) })
    }

    #[tokio::test]
    async fn test_fn_middleware_can_short_circuit() {
        let stage = FnMiddleware::new("gate", short_circuit);
        assert_eq!(stage.name(), "gate");

        let marked = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let marked_in_handler = std::sync::Arc::clone(&marked);

        let handler = Next::handler(move |_ctx, _req| {
            marked_in_handler.store(true, std::sync::atomic::Ordering::SeqCst);
            Box::pin(async { Response::empty(StatusCode::OK) })
        });
        let next = Next::new(&stage, handler);

        let mut ctx = RequestContext::new();
        let response = next.run(&mut ctx, make_request()).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!marked.load(std::sync::atomic::Ordering::SeqCst));
    }
}

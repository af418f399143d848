//! Ordered middleware pipeline.
//!
//! A [`Pipeline`] owns the stage list and runs each request through it in
//! insertion order, ending at the handler. For the logging/recovery pair the
//! intended order is access log first, recovery second, so the access-log
//! stage observes control returning even when the handler panicked and the
//! recovery stage already converted the panic into a response:
//!
//! ```text
//! Request → AccessLog → Recovery → Handler
//!                                     ↓
//! Response ←──────────────────────────┘
//! ```

use std::sync::Arc;

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// A type-erased middleware stage.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An immutable, ordered middleware chain.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::builder()
///     .stage(AccessLogMiddleware::new(logger.clone()))
///     .stage(RecoveryMiddleware::new(logger, true))
///     .build();
///
/// let response = pipeline.process(&mut ctx, request, handler).await;
/// ```
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { stages: Vec::new() }
    }

    /// Runs one request through every stage, then the handler.
    pub async fn process<H>(
        &self,
        ctx: &mut RequestContext,
        request: Request,
        handler: H,
    ) -> Response
    where
        H: FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let next = self.build_chain(handler);
        next.run(ctx, request).await
    }

    /// Builds the per-request chain, back to front.
    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::handler(handler);
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Builder for a [`Pipeline`].
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Appends a stage; stages run in insertion order.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline { stages: self.stages }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Pipeline::builder()
    }
}

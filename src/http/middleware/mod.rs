//! HTTP middleware.
//!
//! # Responsibilities
//! - Define the `Middleware` contract (handle + optional terminate hook)
//! - Adapt resolved middleware into pipeline stages
//! - Provide the built-in middleware (`substitute_bindings`, `request_id`)
//!
//! # Design Decisions
//! - Middleware receive the parameters parsed from their reference
//!   (`throttle:60,1` → `["60", "1"]`) on every call
//! - Errors propagate as `Err`; only the kernel renders them

pub mod request_id;
pub mod substitute_bindings;

pub use request_id::RequestIdMiddleware;
pub use substitute_bindings::SubstituteBindings;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::http::{Request, Response};
use crate::pipeline::{Next, Stage};
use crate::Result;

/// Continuation handed to HTTP middleware.
pub type HttpNext = Next<Request, Result<Response>>;

/// A request-processing stage.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Inspect or rewrite the request, then call `next.run(request)` or
    /// answer directly.
    async fn handle(&self, request: Request, next: HttpNext, parameters: &[String]) -> Result<Response>;

    /// Runs after the response has been sent.
    async fn terminate(&self, _request: &Request, _response: &Response) {}
}

/// A middleware instance paired with the parameters of the reference it
/// was resolved from.
#[derive(Clone)]
pub struct ResolvedMiddleware {
    id: String,
    parameters: Vec<String>,
    instance: Arc<dyn Middleware>,
}

impl ResolvedMiddleware {
    pub fn new(id: impl Into<String>, parameters: Vec<String>, instance: Arc<dyn Middleware>) -> Self {
        Self {
            id: id.into(),
            parameters,
            instance,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn instance(&self) -> &Arc<dyn Middleware> {
        &self.instance
    }

    pub async fn terminate(&self, request: &Request, response: &Response) {
        self.instance.terminate(request, response).await
    }
}

impl std::fmt::Debug for ResolvedMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedMiddleware")
            .field("id", &self.id)
            .field("parameters", &self.parameters)
            .finish()
    }
}

#[async_trait]
impl Stage<Request, Result<Response>> for ResolvedMiddleware {
    async fn handle(&self, request: Request, next: HttpNext) -> Result<Response> {
        let remaining = next.remaining();
        let response = self.instance.handle(request, next, &self.parameters).await;
        tracing::trace!(middleware = %self.id, remaining, "middleware finished");
        response
    }
}

/// Middleware backed by an async closure. Has no terminate hook.
pub struct FnMiddleware<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request, HttpNext, Vec<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    async fn handle(&self, request: Request, next: HttpNext, parameters: &[String]) -> Result<Response> {
        (self.f)(request, next, parameters.to_vec()).await
    }
}

/// Build a middleware from an async closure.
///
/// ```rust,ignore
/// let auth = middleware_fn(|request, next, _params| async move {
///     match request.header("authorization") {
///         Some(_) => next.run(request).await,
///         None => Err(Error::http(StatusCode::UNAUTHORIZED, "Unauthenticated.")),
///     }
/// });
/// ```
pub fn middleware_fn<F, Fut>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(Request, HttpNext, Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    Arc::new(FnMiddleware { f })
}

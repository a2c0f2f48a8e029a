//! HTTP kernel: the request lifecycle boundary.
//!
//! # Responsibilities
//! - Bootstrap the application once before the first request
//! - Run the global middleware stack, then hand the request to the router
//! - Catch every failure (errors and panics), report it, render it
//! - Run terminate hooks after the response has been sent
//!
//! # Design Decisions
//! - `handle` always returns a `Response`; nothing below it is caught
//!   earlier
//! - Global middleware run through the same `Pipeline` as route middleware
//! - Lifecycle state is stored on the request, not on the kernel, so one
//!   kernel serves concurrent requests

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use once_cell::sync::OnceCell;

use crate::error::{Error, Result};
use crate::events::{Event, EventDispatcher};
use crate::http::exception::{DefaultExceptionHandler, ExceptionHandler};
use crate::http::middleware::ResolvedMiddleware;
use crate::http::{Request, Response};
use crate::lifecycle::{bootstrapper_fn, Application, Bootstrapper};
use crate::observability::metrics;
use crate::pipeline::{BoxedStage, Pipeline};
use crate::routing::{MiddlewareRef, Router};

/// Where a request is in the kernel lifecycle.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KernelState {
    #[default]
    Idle = 0,
    Bootstrapped = 1,
    MiddlewareRunning = 2,
    RouteDispatching = 3,
    ResponseReady = 4,
    Terminated = 5,
}

impl From<u8> for KernelState {
    fn from(value: u8) -> Self {
        match value {
            1 => KernelState::Bootstrapped,
            2 => KernelState::MiddlewareRunning,
            3 => KernelState::RouteDispatching,
            4 => KernelState::ResponseReady,
            5 => KernelState::Terminated,
            _ => KernelState::Idle,
        }
    }
}

pub struct Kernel {
    app: Arc<dyn Application>,
    router: Arc<Router>,
    middleware: Vec<MiddlewareRef>,
    bootstrappers: Vec<Arc<dyn Bootstrapper>>,
    exceptions: Arc<dyn ExceptionHandler>,
    skip_middleware: bool,
    resolved: OnceCell<Vec<ResolvedMiddleware>>,
}

impl Kernel {
    /// A kernel with the default exception handler and the `request_id`
    /// global middleware.
    pub fn new(app: Arc<dyn Application>, router: Arc<Router>) -> Self {
        let skip_middleware = router.middleware_disabled();
        Self {
            app,
            router,
            middleware: vec![MiddlewareRef::from("request_id")],
            bootstrappers: Vec::new(),
            exceptions: Arc::new(DefaultExceptionHandler::default()),
            skip_middleware,
            resolved: OnceCell::new(),
        }
    }

    pub fn with_exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.exceptions = handler;
        self
    }

    /// Replace the global middleware stack.
    pub fn with_middleware<I, R>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<MiddlewareRef>,
    {
        self.middleware.clear();
        for reference in middleware {
            self.push_middleware(reference);
        }
        self
    }

    /// Append a bootstrapper; router validation always runs last.
    pub fn with_bootstrapper(mut self, bootstrapper: Arc<dyn Bootstrapper>) -> Self {
        self.bootstrappers.push(bootstrapper);
        self
    }

    pub fn skip_middleware(mut self, skip: bool) -> Self {
        self.skip_middleware = skip;
        self
    }

    /// Add a global middleware to the front of the stack unless present.
    pub fn prepend_middleware(&mut self, middleware: impl Into<MiddlewareRef>) -> &mut Self {
        let middleware = middleware.into();
        if !self.middleware.contains(&middleware) {
            self.middleware.insert(0, middleware);
            self.resolved = OnceCell::new();
        }
        self
    }

    /// Add a global middleware to the end of the stack unless present.
    pub fn push_middleware(&mut self, middleware: impl Into<MiddlewareRef>) -> &mut Self {
        let middleware = middleware.into();
        if !self.middleware.contains(&middleware) {
            self.middleware.push(middleware);
            self.resolved = OnceCell::new();
        }
        self
    }

    pub fn has_middleware(&self, middleware: &str) -> bool {
        self.middleware.iter().any(|m| m.to_string() == middleware || m.name() == middleware)
    }

    pub fn middleware(&self) -> &[MiddlewareRef] {
        &self.middleware
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn application(&self) -> &Arc<dyn Application> {
        &self.app
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        self.router.events()
    }

    /// Run the bootstrappers unless the application is already bootstrapped.
    pub fn bootstrap(&self) -> Result<()> {
        if self.app.has_been_bootstrapped() {
            return Ok(());
        }

        let router = self.router.clone();
        let mut steps = self.bootstrappers.clone();
        steps.push(bootstrapper_fn("validate_routes", move |_: &dyn Application| router.validate()));
        self.app.bootstrap_with(&steps)
    }

    /// Handle a request. Never fails: errors and panics become responses.
    pub async fn handle(&self, mut request: Request) -> Response {
        let start = Instant::now();
        request.enable_method_override();
        let snapshot = request.clone();

        let outcome = AssertUnwindSafe(self.send_request_through_router(request))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(Error::from_panic(payload)));

        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                self.exceptions.report(&err);
                self.exceptions.render(&snapshot, &err).prepare(&snapshot)
            }
        };
        snapshot.set_lifecycle(KernelState::ResponseReady);

        self.events().dispatch(&Event::RequestHandled {
            request: &snapshot,
            response: &response,
        });

        let route = snapshot
            .route()
            .map(|r| r.uri().to_string())
            .unwrap_or_else(|| "unmatched".to_string());
        metrics::record_request(snapshot.method().as_str(), response.status().as_u16(), &route, start);

        response
    }

    async fn send_request_through_router(&self, request: Request) -> Result<Response> {
        self.bootstrap()?;
        request.set_lifecycle(KernelState::Bootstrapped);

        let stages: Vec<BoxedStage<Request, Result<Response>>> = if self.skip_middleware {
            Vec::new()
        } else {
            self.global_middleware()?
                .iter()
                .cloned()
                .map(|m| Arc::new(m) as BoxedStage<Request, Result<Response>>)
                .collect()
        };
        request.set_lifecycle(KernelState::MiddlewareRunning);

        let router = self.router.clone();
        Pipeline::send(request)
            .through(stages)
            .then(move |request: Request| async move {
                request.set_lifecycle(KernelState::RouteDispatching);
                router.dispatch(request).await
            })
            .await
    }

    fn global_middleware(&self) -> Result<&[ResolvedMiddleware]> {
        self.resolved
            .get_or_try_init(|| self.router.middleware_table().gather_in_order(&self.middleware))
            .map(Vec::as_slice)
    }

    /// Run terminate hooks of the route middleware, then the global
    /// middleware, then end the request on the application.
    pub async fn terminate(&self, request: &Request, response: &Response) {
        if !self.skip_middleware {
            let mut middleware = Vec::new();
            if let Some(route) = request.route() {
                match self.router.gather_route_middleware(&route) {
                    Ok(resolved) => middleware.extend(resolved),
                    Err(e) => tracing::warn!(route = %route.uri(), error = %e, "skipping route terminate hooks"),
                }
            }
            match self.global_middleware() {
                Ok(resolved) => middleware.extend(resolved.iter().cloned()),
                Err(e) => tracing::warn!(error = %e, "skipping global terminate hooks"),
            }

            for m in &middleware {
                tracing::trace!(middleware = %m.id(), "terminating");
                m.terminate(request, response).await;
            }
        }

        self.app.terminate();
        request.set_lifecycle(KernelState::Terminated);
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("middleware", &self.middleware)
            .field("bootstrappers", &self.bootstrappers.len())
            .field("skip_middleware", &self.skip_middleware)
            .field("router", &self.router)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::{middleware_fn, HttpNext};
    use crate::lifecycle::DefaultApplication;
    use crate::routing::handler;
    use axum::http::{Method, StatusCode, Uri};

    fn kernel(router: Router) -> Kernel {
        Kernel::new(Arc::new(DefaultApplication::default()), Arc::new(router))
    }

    #[test]
    fn test_state_round_trips_through_u8() {
        for state in [
            KernelState::Idle,
            KernelState::Bootstrapped,
            KernelState::MiddlewareRunning,
            KernelState::RouteDispatching,
            KernelState::ResponseReady,
            KernelState::Terminated,
        ] {
            assert_eq!(KernelState::from(state as u8), state);
        }
        assert_eq!(KernelState::from(200), KernelState::Idle);
    }

    #[test]
    fn test_global_stack_has_no_duplicates() {
        let mut kernel = kernel(Router::new());
        kernel.push_middleware("request_id");
        kernel.push_middleware("cors");
        kernel.prepend_middleware("maintenance");
        kernel.prepend_middleware("cors");

        let names: Vec<_> = kernel.middleware().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["maintenance", "request_id", "cors"]);
        assert!(kernel.has_middleware("cors"));
        assert!(!kernel.has_middleware("auth"));
    }

    #[tokio::test]
    async fn test_global_middleware_runs_before_routing() {
        let mut router = Router::new();
        router.register_middleware(
            "maintenance",
            middleware_fn(|_request, _next: HttpNext, _| async move {
                Ok(Response::text(StatusCode::SERVICE_UNAVAILABLE, "down"))
            }),
        );
        router.get("/", handler(|_| async { Ok("up") }));

        let kernel = kernel(router).with_middleware(["maintenance"]);
        let request = Request::new(Method::GET, Uri::from_static("/"));
        let response = kernel.handle(request.clone()).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(request.route().is_none());
        assert_eq!(request.lifecycle(), KernelState::ResponseReady);
    }

    #[tokio::test]
    async fn test_unknown_global_middleware_renders_500() {
        let mut router = Router::new();
        router.get("/", handler(|_| async { Ok("up") }));

        let kernel = kernel(router).with_middleware(["missing"]);
        let response = kernel.handle(Request::new(Method::GET, Uri::from_static("/"))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_skip_middleware() {
        let mut router = Router::new();
        router.get("/", handler(|_| async { Ok("up") }));

        let kernel = kernel(router).with_middleware(["missing"]).skip_middleware(true);
        let response = kernel.handle(Request::new(Method::GET, Uri::from_static("/"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text_body(), "up");
    }
}

//! Crate-wide error type.
//!
//! # Design Decisions
//! - Everything below the kernel boundary propagates `Error` upward untouched
//! - Only `Kernel::handle` catches, reports and renders
//! - `status_code()` is the single place where failures map to HTTP statuses

use axum::http::{Method, StatusCode};
use thiserror::Error;

/// Boxed error produced by user handlers and middleware.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while registering, matching or dispatching routes.
#[derive(Debug, Error)]
pub enum Error {
    /// No registered route matches method, host and path.
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: Method, path: String },

    /// The path matches, but not for the requested verb.
    #[error("method {method} is not allowed for {path} (allowed: {})", join_methods(.allowed))]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    /// Lookup of a route name that was never registered.
    #[error("route [{0}] is not defined")]
    RouteNameUndefined(String),

    /// A route name registered more than once under the reject policy.
    #[error("route name [{0}] is registered more than once")]
    RouteNameConflict(String),

    /// A route registered with an empty method list.
    #[error("route [{0}] has no methods")]
    RouteWithoutMethods(String),

    /// A middleware identifier with no registered instance.
    #[error("middleware [{0}] could not be resolved")]
    MiddlewareResolution(String),

    /// A route parameter value with no matching bound object.
    #[error("no {key} matches route parameter value [{value}]")]
    Binding { key: String, value: String },

    /// A `Controller@method` reference with no registered handler.
    #[error("controller action [{0}] is not registered")]
    ControllerNotFound(String),

    /// A view route was dispatched but no renderer is installed.
    #[error("view [{0}] cannot be rendered: no view renderer installed")]
    ViewNotConfigured(String),

    /// An explicit HTTP failure raised by application code.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// A route definition file could not be read or parsed.
    #[error("failed to load routes from {path}: {message}")]
    RouteFile { path: String, message: String },

    /// An application bootstrapper failed.
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),

    /// A handler or middleware panicked.
    #[error("handler panicked: {0}")]
    Panic(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Any other failure raised by user code.
    #[error("{0}")]
    Handler(BoxError),
}

/// Result type used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Abort with an explicit status and message.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Wrap an arbitrary user error.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// Convert a caught panic payload into an error.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panic(message)
    }

    /// HTTP status this error renders as.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::RouteNotFound { .. } | Error::Binding { .. } => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Error::Http { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Methods to advertise in an `Allow` header, if any.
    pub fn allowed_methods(&self) -> Option<&[Method]> {
        match self {
            Error::MethodNotAllowed { allowed, .. } => Some(allowed),
            _ => None,
        }
    }

    /// Client errors are expected traffic and are not reported as failures.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

pub(crate) fn join_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

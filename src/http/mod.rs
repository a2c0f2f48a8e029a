//! HTTP request lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum fallback handler, body buffering, tower layers)
//!     → kernel.rs (bootstrap, global middleware pipeline)
//!     → routing::Router (match, route middleware, action)
//!     → reply.rs (normalize the action's return value)
//!     → response.rs (prepare for the request)
//!     → Send to client
//!     → kernel.rs terminate (terminable middleware, application hooks)
//! ```
//!
//! # Design Decisions
//! - Request and response bodies are fully buffered
//! - Failures surface as `Err` until the kernel, which renders them via
//!   exception.rs

pub mod exception;
pub mod kernel;
pub mod middleware;
pub mod reply;
pub mod request;
pub mod response;
pub mod server;

pub use exception::{DefaultExceptionHandler, ExceptionHandler};
pub use kernel::{Kernel, KernelState};
pub use middleware::{middleware_fn, HttpNext, Middleware};
pub use reply::{to_response, Reply, Responsable};
pub use request::{Request, X_REQUEST_ID};
pub use response::Response;
pub use server::HttpServer;

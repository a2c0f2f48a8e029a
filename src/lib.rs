//! Switchyard: an HTTP kernel with a group-aware router and middleware
//! pipeline.

pub mod config;
pub mod console;
pub mod error;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;

pub use config::KernelConfig;
pub use error::{Error, Result};
pub use http::{HttpServer, Kernel, Request, Response};
pub use lifecycle::Shutdown;
pub use routing::Router;

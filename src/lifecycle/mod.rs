//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Bootstrap (application.rs):
//!     first request / console run → bootstrappers in order → bootstrapped
//!
//! Request end (application.rs):
//!     Kernel::terminate → terminating callbacks
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     Ctrl+C or Shutdown::trigger → stop accepting → drain in-flight requests
//! ```
//!
//! # Design Decisions
//! - Bootstrappers run once per application, not per request
//! - Shutdown is a broadcast so every long-running task can observe it

pub mod application;
pub mod shutdown;
pub mod signals;

pub use application::{bootstrapper_fn, Application, Bootstrapper, DefaultApplication};
pub use shutdown::Shutdown;
pub use signals::shutdown_signal;

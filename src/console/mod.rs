//! Console application subsystem.
//!
//! # Data Flow
//! ```text
//! argv
//!     → application.rs (clap parser built from every Command::definition)
//!     → CommandStarting event, command lookup
//!     → Command::handle (ArgMatches in, writes to an Output)
//!     → CommandFinished event → exit code
//! ```
//!
//! # Design Decisions
//! - Commands are async and receive the console, so built-ins such as
//!   `list` can inspect the registry
//! - `call` runs a command into a `BufferedOutput` kept for `output()`

pub mod application;
pub mod command;
pub mod output;
pub mod route_list;

pub use application::{Application, StartingBootstrapper, DEFAULT_COMMAND};
pub use command::{Command, ListCommand};
pub use output::{BufferedOutput, ConsoleOutput, Output};
pub use route_list::{RouteListArgs, RouteListCommand};

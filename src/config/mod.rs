//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, resolve route file paths)
//!     → validation.rs (semantic checks)
//!     → KernelConfig (validated, immutable)
//!     → applied to Router, Kernel and HttpServer at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    KernelConfig, LimitsConfig, ListenerConfig, LogFormat, MiddlewareConfig, ObservabilityConfig,
    RoutingConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};

//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (startup, &mut Router):
//!     verb helpers / group() / resource() / route files
//!     → group stack merge (group.rs, action.rs)
//!     → Route (route.rs) added to RouteCollection (collection.rs)
//!
//! Dispatch (per request, &Router):
//!     Request
//!     → collection.rs (first matching route, 404 / 405 / OPTIONS)
//!     → compiler.rs (lazy compile, capture parameters)
//!     → middleware/ (resolve, sort, instantiate; cached per route)
//!     → Pipeline (route middleware, substitute_bindings via binding.rs)
//!     → action: handler / controller.rs / redirect / view
//!     → Reply normalized into Response
//! ```
//!
//! # Design Decisions
//! - First registered route wins; fallback routes are tried last
//! - Routes compile lazily on first match and are immutable while serving
//! - Middleware references are parsed at registration and resolved once

pub mod action;
pub mod binding;
pub mod collection;
pub mod compiler;
pub mod controller;
pub mod group;
pub mod loader;
pub mod middleware;
pub mod parameters;
pub mod registration;
pub mod resource;
pub mod route;
pub mod router;

pub use action::{handler, Action, HandlerFn, RouteAction};
pub use binding::{BindingRegistry, BindingResolver};
pub use collection::{NamePolicy, RouteCollection};
pub use compiler::CompiledRoute;
pub use controller::{ActionController, Controller, ControllerMiddleware, ControllerRegistry};
pub use group::GroupAttributes;
pub use middleware::{MiddlewareRef, MiddlewareTable};
pub use parameters::{Bound, Parameters};
pub use registration::{GroupRegistrar, RouteRegistration};
pub use resource::{ResourceOptions, ResourceVerbs};
pub use route::Route;
pub use router::{Router, ViewRenderer};

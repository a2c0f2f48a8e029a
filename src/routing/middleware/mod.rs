//! Route middleware tables.
//!
//! # Data Flow
//! ```text
//! route middleware refs (["web", "auth:api"])
//!     → resolver.rs (groups flattened, aliases mapped)
//!     → sorted.rs (priority order, duplicates dropped)
//!     → MiddlewareTable::instantiate (identifier → registered instance)
//!     → Vec<ResolvedMiddleware> (cached on the route)
//! ```
//!
//! # Design Decisions
//! - References are parsed into `MiddlewareRef` when routes are registered
//! - An identifier with no registered instance fails the request with
//!   `Error::MiddlewareResolution`

pub mod reference;
pub mod resolver;
pub mod sorted;

pub use reference::MiddlewareRef;
pub use resolver::MiddlewareNameResolver;
pub use sorted::sort_middleware;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::http::middleware::{Middleware, ResolvedMiddleware};

/// Priority applied when none is configured.
pub const DEFAULT_PRIORITY: [&str; 4] = [
    "start_session",
    "authenticate",
    "substitute_bindings",
    "authorize",
];

/// Aliases, groups, priority and registered instances.
#[derive(Clone)]
pub struct MiddlewareTable {
    aliases: HashMap<String, String>,
    groups: HashMap<String, Vec<MiddlewareRef>>,
    priority: Vec<String>,
    instances: HashMap<String, Arc<dyn Middleware>>,
}

impl Default for MiddlewareTable {
    fn default() -> Self {
        Self {
            aliases: HashMap::new(),
            groups: HashMap::new(),
            priority: DEFAULT_PRIORITY.iter().map(|s| s.to_string()).collect(),
            instances: HashMap::new(),
        }
    }
}

impl MiddlewareTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `alias` as a short name for `identifier`.
    pub fn alias(&mut self, alias: impl Into<String>, identifier: impl Into<String>) {
        self.aliases.insert(alias.into(), identifier.into());
    }

    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }

    /// Define (or replace) a middleware group.
    pub fn group<I, R>(&mut self, name: impl Into<String>, members: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<MiddlewareRef>,
    {
        self.groups
            .insert(name.into(), members.into_iter().map(Into::into).collect());
    }

    /// Add to the front of an existing group, unless already a member.
    pub fn prepend_to_group(&mut self, group: &str, middleware: impl Into<MiddlewareRef>) {
        let middleware = middleware.into();
        if let Some(members) = self.groups.get_mut(group) {
            if !members.contains(&middleware) {
                members.insert(0, middleware);
            }
        }
    }

    /// Add to the end of a group, creating it if needed, unless already a
    /// member.
    pub fn push_to_group(&mut self, group: &str, middleware: impl Into<MiddlewareRef>) {
        let middleware = middleware.into();
        let members = self.groups.entry(group.to_string()).or_default();
        if !members.contains(&middleware) {
            members.push(middleware);
        }
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn groups(&self) -> &HashMap<String, Vec<MiddlewareRef>> {
        &self.groups
    }

    pub fn set_priority<I, S>(&mut self, priority: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = priority.into_iter().map(Into::into).collect();
    }

    pub fn priority(&self) -> &[String] {
        &self.priority
    }

    /// Register the instance that serves `identifier`.
    pub fn register(&mut self, identifier: impl Into<String>, instance: Arc<dyn Middleware>) {
        self.instances.insert(identifier.into(), instance);
    }

    pub fn is_registered(&self, identifier: &str) -> bool {
        self.instances.contains_key(identifier)
    }

    /// Resolve aliases and groups, then apply priority ordering.
    pub fn resolve<'r, I>(&self, references: I) -> Vec<MiddlewareRef>
    where
        I: IntoIterator<Item = &'r MiddlewareRef>,
    {
        let resolver = MiddlewareNameResolver::new(&self.aliases, &self.groups);
        sort_middleware(&self.priority, resolver.resolve_all(references))
    }

    /// Look up the instance for each resolved reference.
    pub fn instantiate(&self, resolved: &[MiddlewareRef]) -> Result<Vec<ResolvedMiddleware>> {
        resolved
            .iter()
            .map(|reference| {
                let instance = self
                    .instances
                    .get(reference.name())
                    .cloned()
                    .ok_or_else(|| Error::MiddlewareResolution(reference.to_string()))?;
                Ok(ResolvedMiddleware::new(
                    reference.name(),
                    reference.parameters().to_vec(),
                    instance,
                ))
            })
            .collect()
    }

    /// Resolve, sort and instantiate in one step.
    pub fn gather<'r, I>(&self, references: I) -> Result<Vec<ResolvedMiddleware>>
    where
        I: IntoIterator<Item = &'r MiddlewareRef>,
    {
        self.instantiate(&self.resolve(references))
    }

    /// Resolve and instantiate without priority sorting (global stack).
    pub fn gather_in_order<'r, I>(&self, references: I) -> Result<Vec<ResolvedMiddleware>>
    where
        I: IntoIterator<Item = &'r MiddlewareRef>,
    {
        let resolver = MiddlewareNameResolver::new(&self.aliases, &self.groups);
        self.instantiate(&resolver.resolve_all(references))
    }
}

impl std::fmt::Debug for MiddlewareTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut instances: Vec<_> = self.instances.keys().collect();
        instances.sort();
        f.debug_struct("MiddlewareTable")
            .field("aliases", &self.aliases)
            .field("groups", &self.groups)
            .field("priority", &self.priority)
            .field("instances", &instances)
            .finish()
    }
}

//! Controllers and the registry that resolves `Controller@method`
//! references.
//!
//! # Responsibilities
//! - Define the `Controller` contract (actions plus controller middleware)
//! - Provide `ActionController`, a controller assembled from handlers
//! - Resolve route action strings to a registered controller and call it
//!
//! # Design Decisions
//! - A reference without `@` calls the controller's `invoke` action
//! - Controller middleware is filtered per action with `only` / `except`
//!   and appended after the route's own middleware

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::http::{Reply, Request};
use crate::routing::action::HandlerFn;
use crate::routing::middleware::MiddlewareRef;

/// Action called for references without an explicit method.
pub const INVOKE_ACTION: &str = "invoke";

/// Middleware declared by a controller, optionally limited to some actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerMiddleware {
    pub reference: MiddlewareRef,
    pub only: Vec<String>,
    pub except: Vec<String>,
}

impl ControllerMiddleware {
    pub fn new(reference: impl Into<MiddlewareRef>) -> Self {
        Self {
            reference: reference.into(),
            only: Vec::new(),
            except: Vec::new(),
        }
    }

    pub fn only<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn except<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn applies_to(&self, action: &str) -> bool {
        if !self.only.is_empty() && !self.only.iter().any(|a| a == action) {
            return false;
        }
        !self.except.iter().any(|a| a == action)
    }
}

#[async_trait]
pub trait Controller: Send + Sync {
    fn has_action(&self, action: &str) -> bool;

    async fn call_action(&self, action: &str, request: Request) -> Result<Reply>;

    fn middleware(&self) -> Vec<ControllerMiddleware> {
        Vec::new()
    }
}

/// Controller built from a table of named handlers.
#[derive(Clone, Default)]
pub struct ActionController {
    actions: HashMap<String, HandlerFn>,
    middleware: Vec<ControllerMiddleware>,
}

impl ActionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(mut self, name: impl Into<String>, handler: HandlerFn) -> Self {
        self.actions.insert(name.into(), handler);
        self
    }

    pub fn middleware(mut self, middleware: ControllerMiddleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

#[async_trait]
impl Controller for ActionController {
    fn has_action(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }

    async fn call_action(&self, action: &str, request: Request) -> Result<Reply> {
        let handler = self
            .actions
            .get(action)
            .cloned()
            .ok_or_else(|| Error::ControllerNotFound(action.to_string()))?;
        handler(request).await
    }

    fn middleware(&self) -> Vec<ControllerMiddleware> {
        self.middleware.clone()
    }
}

/// Split `Controller@method` into its parts.
pub fn parse_uses(uses: &str) -> (&str, &str) {
    match uses.rsplit_once('@') {
        Some((controller, action)) if !action.is_empty() => (controller, action),
        Some((controller, _)) => (controller, INVOKE_ACTION),
        None => (uses, INVOKE_ACTION),
    }
}

/// Registered controllers keyed by (possibly namespaced) name.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Arc<dyn Controller>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, controller: Arc<dyn Controller>) {
        self.controllers.insert(name.into(), controller);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Controller>> {
        self.controllers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    /// Resolve a reference to its controller and action name.
    pub fn resolve<'u>(&self, uses: &'u str) -> Result<(Arc<dyn Controller>, &'u str)> {
        let (name, action) = parse_uses(uses);
        match self.controllers.get(name) {
            Some(controller) if controller.has_action(action) => Ok((controller.clone(), action)),
            _ => Err(Error::ControllerNotFound(uses.to_string())),
        }
    }

    /// Controller middleware that applies to the referenced action.
    pub fn middleware_for(&self, uses: &str) -> Vec<MiddlewareRef> {
        let (name, action) = parse_uses(uses);
        self.controllers
            .get(name)
            .map(|controller| {
                controller
                    .middleware()
                    .into_iter()
                    .filter(|m| m.applies_to(action))
                    .map(|m| m.reference)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn dispatch(&self, uses: &str, request: Request) -> Result<Reply> {
        let (controller, action) = self.resolve(uses)?;
        tracing::trace!(controller = %uses, "calling controller action");
        controller.call_action(action, request).await
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.controllers.keys().collect();
        names.sort();
        f.debug_struct("ControllerRegistry").field("controllers", &names).finish()
    }
}

//! Builders returned by route and group registration.
//!
//! # Responsibilities
//! - `RouteRegistration`: chained edits to the route just registered
//!   (name, middleware, constraints, defaults, domain)
//! - `GroupRegistrar`: named group attributes followed by either a nested
//!   group or a single route
//!
//! # Design Decisions
//! - Edits go through `RouteCollection::update`, so name and action lookups
//!   stay in sync with the route
//! - A registrar applies its attributes only for the call that consumes it
//! - A registration the router rejected has no index; edits on it are no-ops

use std::sync::Arc;

use axum::http::Method;

use crate::routing::action::RouteAction;
use crate::routing::collection::VERBS;
use crate::routing::group::GroupAttributes;
use crate::routing::middleware::MiddlewareRef;
use crate::routing::{Route, Router};

/// Handle on a freshly registered route.
pub struct RouteRegistration<'r> {
    router: &'r mut Router,
    index: Option<usize>,
}

impl<'r> RouteRegistration<'r> {
    pub(crate) fn new(router: &'r mut Router, index: usize) -> Self {
        Self {
            router,
            index: Some(index),
        }
    }

    pub(crate) fn rejected(router: &'r mut Router) -> Self {
        Self { router, index: None }
    }

    fn update(self, f: impl FnOnce(&mut Route)) -> Self {
        if let Some(index) = self.index {
            self.router.routes_mut().update(index, f);
        }
        self
    }

    /// Append to the route name (group `as` prefixes come first).
    pub fn name(self, name: &str) -> Self {
        self.update(|route| route.append_name(name))
    }

    pub fn middleware<I, R>(self, middleware: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<MiddlewareRef>,
    {
        let middleware: Vec<MiddlewareRef> = middleware.into_iter().map(Into::into).collect();
        self.update(|route| {
            for reference in middleware {
                route.add_middleware(reference);
            }
        })
    }

    pub fn where_(self, parameter: &str, pattern: &str) -> Self {
        self.update(|route| route.set_where(parameter, pattern))
    }

    pub fn where_number(self, parameter: &str) -> Self {
        self.where_(parameter, "[0-9]+")
    }

    pub fn defaults(self, parameter: &str, value: &str) -> Self {
        self.update(|route| route.set_default(parameter, value))
    }

    pub fn domain(self, domain: &str) -> Self {
        self.update(|route| route.set_domain(domain))
    }

    /// Position of the route in the collection, `None` when the router
    /// refused the registration.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn route(&self) -> Option<Arc<Route>> {
        self.index.and_then(|index| self.router.routes().get(index).cloned())
    }
}

/// Group attributes collected through named methods.
///
/// ```rust,ignore
/// router
///     .prefix("admin")
///     .middleware(["auth"])
///     .name("admin.")
///     .group(|router| {
///         router.get("users", "Users@index").name("users.index");
///     });
/// ```
pub struct GroupRegistrar<'r> {
    router: &'r mut Router,
    attributes: GroupAttributes,
}

impl<'r> GroupRegistrar<'r> {
    pub(crate) fn new(router: &'r mut Router, attributes: GroupAttributes) -> Self {
        Self { router, attributes }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.attributes = self.attributes.prefix(prefix);
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.attributes = self.attributes.namespace(namespace);
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.attributes = self.attributes.domain(domain);
        self
    }

    pub fn middleware<I, R>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<MiddlewareRef>,
    {
        self.attributes = self.attributes.middleware(middleware);
        self
    }

    /// Route name prefix (`as`).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.attributes = self.attributes.name(name);
        self
    }

    pub fn where_(mut self, parameter: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.attributes = self.attributes.where_(parameter, pattern);
        self
    }

    pub fn attributes(&self) -> &GroupAttributes {
        &self.attributes
    }

    /// Register the routes `routes` adds with these attributes.
    pub fn group<F, R>(self, routes: F) -> R
    where
        F: FnOnce(&mut Router) -> R,
    {
        self.router.group(self.attributes, routes)
    }

    /// Register a single route with these attributes.
    pub fn match_<I>(self, methods: I, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'r>
    where
        I: IntoIterator<Item = Method>,
    {
        let methods: Vec<Method> = methods.into_iter().collect();
        let action = action.into();
        let index = self
            .router
            .group(self.attributes, |router| router.match_(methods, uri, action).index());
        match index {
            Some(index) => RouteRegistration::new(self.router, index),
            None => RouteRegistration::rejected(self.router),
        }
    }

    pub fn get(self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'r> {
        self.match_([Method::GET], uri, action)
    }

    pub fn post(self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'r> {
        self.match_([Method::POST], uri, action)
    }

    pub fn put(self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'r> {
        self.match_([Method::PUT], uri, action)
    }

    pub fn patch(self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'r> {
        self.match_([Method::PATCH], uri, action)
    }

    pub fn delete(self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'r> {
        self.match_([Method::DELETE], uri, action)
    }

    pub fn options(self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'r> {
        self.match_([Method::OPTIONS], uri, action)
    }

    pub fn any(self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'r> {
        self.match_(VERBS, uri, action)
    }
}

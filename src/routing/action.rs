//! Route actions.
//!
//! # Responsibilities
//! - Represent what a route runs: a handler, a controller reference, a
//!   redirect or a view
//! - Carry the per-route attributes registered alongside the action
//!   (middleware, constraints, name, namespace, prefix, domain)
//! - Merge group attributes into a route's action
//!
//! # Design Decisions
//! - Controller references are `Controller@method` strings resolved against
//!   the `ControllerRegistry` at dispatch time
//! - Namespaces join with `::`; a reference starting with `::` is absolute

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;

use crate::http::{Reply, Request};
use crate::routing::group::GroupAttributes;
use crate::routing::middleware::MiddlewareRef;
use crate::Result;

/// Namespace separator for controller references.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Type-erased async request handler.
pub type HandlerFn = Arc<dyn Fn(Request) -> BoxFuture<'static, Result<Reply>> + Send + Sync>;

/// Wrap an async closure as a [`HandlerFn`].
pub fn handler<F, Fut, R>(f: F) -> HandlerFn
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Into<Reply>,
{
    Arc::new(move |request: Request| -> BoxFuture<'static, Result<Reply>> {
        let fut = f(request);
        async move { Ok(fut.await?.into()) }.boxed()
    })
}

/// What a route runs once matched.
#[derive(Clone)]
pub enum Action {
    Handler(HandlerFn),
    /// `Controller@method`, possibly namespaced (`admin::Users@index`).
    Controller(String),
    Redirect {
        destination: String,
        status: StatusCode,
    },
    View {
        view: String,
        data: Value,
    },
}

impl Action {
    /// Display form used by listings and action lookups.
    pub fn describe(&self) -> String {
        match self {
            Action::Handler(_) => "Closure".to_string(),
            Action::Controller(uses) => uses.clone(),
            Action::Redirect { destination, status } => {
                format!("redirect:{destination} ({})", status.as_u16())
            }
            Action::View { view, .. } => format!("view:{view}"),
        }
    }

    pub fn controller(&self) -> Option<&str> {
        match self {
            Action::Controller(uses) => Some(uses),
            _ => None,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl From<HandlerFn> for Action {
    fn from(handler: HandlerFn) -> Self {
        Action::Handler(handler)
    }
}

impl From<&str> for Action {
    fn from(uses: &str) -> Self {
        Action::Controller(uses.to_string())
    }
}

impl From<String> for Action {
    fn from(uses: String) -> Self {
        Action::Controller(uses)
    }
}

/// An action plus the attributes registered with it.
#[derive(Debug, Clone)]
pub struct RouteAction {
    pub action: Action,
    pub middleware: Vec<MiddlewareRef>,
    pub wheres: BTreeMap<String, String>,
    /// Route name (`as`).
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub domain: Option<String>,
}

impl RouteAction {
    pub fn new(action: impl Into<Action>) -> Self {
        Self {
            action: action.into(),
            middleware: Vec::new(),
            wheres: BTreeMap::new(),
            name: None,
            namespace: None,
            prefix: None,
            domain: None,
        }
    }

    pub fn middleware<I, R>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<MiddlewareRef>,
    {
        self.middleware.extend(middleware.into_iter().map(Into::into));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn where_(mut self, parameter: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.wheres.insert(parameter.into(), pattern.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Prefix the controller reference with `namespace`, unless the
    /// reference is absolute (leading `::`).
    pub(crate) fn apply_namespace(&mut self, namespace: Option<&str>) {
        let Action::Controller(uses) = &mut self.action else {
            return;
        };
        if let Some(absolute) = uses.strip_prefix(NAMESPACE_SEPARATOR) {
            *uses = absolute.to_string();
            return;
        }
        if let Some(namespace) = namespace.filter(|ns| !ns.is_empty()) {
            *uses = format!(
                "{}{NAMESPACE_SEPARATOR}{uses}",
                namespace.trim_matches(|c| c == ':')
            );
        }
    }

    /// Merge the attributes of the enclosing group into this action.
    ///
    /// Scalars set on the action win, except the name, which is appended to
    /// the group's. Middleware and constraints come group first.
    pub(crate) fn merge_group(&mut self, group: &GroupAttributes) {
        if self.domain.is_none() {
            self.domain = group.domain.clone();
        }

        self.name = match (&group.name, self.name.take()) {
            (Some(outer), Some(inner)) => Some(format!("{outer}{inner}")),
            (Some(outer), None) => Some(outer.clone()),
            (None, inner) => inner,
        };

        self.namespace = GroupAttributes::join_namespace(group.namespace.as_deref(), self.namespace.as_deref());

        self.prefix = match self.prefix.take() {
            Some(inner) => Some(GroupAttributes::join_prefix(group.prefix.as_deref(), &inner)),
            None => group.prefix.clone(),
        };

        let mut wheres = group.wheres.clone();
        wheres.append(&mut self.wheres);
        self.wheres = wheres;

        let mut middleware = group.middleware.clone();
        middleware.append(&mut self.middleware);
        self.middleware = middleware;
    }
}

impl From<Action> for RouteAction {
    fn from(action: Action) -> Self {
        RouteAction::new(action)
    }
}

impl From<HandlerFn> for RouteAction {
    fn from(handler: HandlerFn) -> Self {
        RouteAction::new(handler)
    }
}

impl From<&str> for RouteAction {
    fn from(uses: &str) -> Self {
        RouteAction::new(uses)
    }
}

impl From<String> for RouteAction {
    fn from(uses: String) -> Self {
        RouteAction::new(uses)
    }
}

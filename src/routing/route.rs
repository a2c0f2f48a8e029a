//! A single registered route.
//!
//! # Responsibilities
//! - Hold methods, URI template, action, constraints and defaults
//! - Compile lazily on first match and cache the compiled matcher
//! - Test a request against method, host and path
//! - Bind captured values into `Parameters`
//! - Cache the resolved middleware list after the first dispatch
//!
//! # Design Decisions
//! - Every mutation that affects matching drops the compiled matcher
//! - GET routes always answer HEAD as well

use std::collections::BTreeMap;
use std::fmt;

use axum::http::Method;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::Result;
use crate::http::middleware::ResolvedMiddleware;
use crate::http::Request;
use crate::routing::action::{Action, RouteAction};
use crate::routing::compiler::CompiledRoute;
use crate::routing::middleware::{MiddlewareRef, MiddlewareTable};
use crate::routing::Parameters;

#[derive(Clone)]
pub struct Route {
    methods: Vec<Method>,
    uri: String,
    action: RouteAction,
    wheres: BTreeMap<String, String>,
    defaults: BTreeMap<String, String>,
    fallback: bool,
    compiled: OnceCell<CompiledRoute>,
    middleware: OnceCell<Vec<ResolvedMiddleware>>,
}

impl Route {
    pub(crate) fn new(methods: Vec<Method>, uri: impl Into<String>, action: RouteAction) -> Self {
        let mut methods = methods;
        if methods.contains(&Method::GET) && !methods.contains(&Method::HEAD) {
            methods.push(Method::HEAD);
        }

        Self {
            methods,
            uri: uri.into(),
            action,
            wheres: BTreeMap::new(),
            defaults: BTreeMap::new(),
            fallback: false,
            compiled: OnceCell::new(),
            middleware: OnceCell::new(),
        }
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn domain(&self) -> Option<&str> {
        self.action.domain.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.action.name.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.action.prefix.as_deref()
    }

    pub fn action(&self) -> &Action {
        &self.action.action
    }

    pub fn route_action(&self) -> &RouteAction {
        &self.action
    }

    /// Controller reference, for controller routes.
    pub fn controller_action(&self) -> Option<&str> {
        self.action.action.controller()
    }

    /// Middleware references as registered, unresolved.
    pub fn middleware(&self) -> &[MiddlewareRef] {
        &self.action.middleware
    }

    pub fn wheres(&self) -> &BTreeMap<String, String> {
        &self.wheres
    }

    pub fn defaults(&self) -> &BTreeMap<String, String> {
        &self.defaults
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Constrain a parameter with a regex.
    pub fn set_where(&mut self, parameter: impl Into<String>, pattern: impl Into<String>) {
        self.wheres.insert(parameter.into(), pattern.into());
        self.compiled = OnceCell::new();
    }

    /// Append to the route name.
    pub fn append_name(&mut self, name: &str) {
        self.action.name = Some(match self.action.name.take() {
            Some(existing) => format!("{existing}{name}"),
            None => name.to_string(),
        });
    }

    pub fn add_middleware(&mut self, middleware: MiddlewareRef) {
        self.action.middleware.push(middleware);
        self.middleware = OnceCell::new();
    }

    pub fn set_default(&mut self, parameter: impl Into<String>, value: impl Into<String>) {
        self.defaults.insert(parameter.into(), value.into());
    }

    pub fn set_domain(&mut self, domain: impl Into<String>) {
        self.action.domain = Some(domain.into());
        self.compiled = OnceCell::new();
    }

    pub fn mark_fallback(&mut self) {
        self.fallback = true;
    }

    /// The compiled matcher, built on first use.
    pub fn compiled(&self) -> &CompiledRoute {
        self.compiled
            .get_or_init(|| CompiledRoute::compile(&self.uri, self.domain(), &self.wheres))
    }

    /// Parameter names, host parameters first.
    pub fn parameter_names(&self) -> Vec<String> {
        self.compiled().variables().map(str::to_string).collect()
    }

    /// Whether the request's path and host match, and its method too when
    /// `include_method` is set.
    pub fn matches(&self, request: &Request, include_method: bool) -> bool {
        let compiled = self.compiled();
        if !compiled.matches_path(&request.route_path()) {
            return false;
        }
        if include_method && !self.methods.contains(&request.method()) {
            return false;
        }
        compiled.matches_host(&request.host())
    }

    /// Bind captured values for a matching request.
    ///
    /// Missing values fall back to the route defaults; a parameter with
    /// neither is bound as `None`. Defaults for names the template does not
    /// declare are appended.
    pub fn bind(&self, request: &Request) -> Parameters {
        let compiled = self.compiled();
        let mut captures = compiled.captures(&request.host(), &request.route_path());

        let mut parameters = Parameters::new();
        for name in compiled.variables() {
            let value = captures
                .remove(name)
                .flatten()
                .or_else(|| self.defaults.get(name).cloned());
            parameters.set(name, value);
        }
        for (name, value) in &self.defaults {
            if parameters.get(name).is_none() {
                parameters.set(name.clone(), Some(value.clone()));
            }
        }
        parameters
    }

    /// Resolved middleware, computed once per route.
    ///
    /// `controller` is the middleware declared by the route's controller for
    /// this action; it follows the route's own references.
    pub fn gather_middleware(
        &self,
        table: &MiddlewareTable,
        controller: &[MiddlewareRef],
    ) -> Result<Vec<ResolvedMiddleware>> {
        self.middleware
            .get_or_try_init(|| {
                let mut unique: Vec<&MiddlewareRef> = Vec::new();
                for reference in self.action.middleware.iter().chain(controller) {
                    if !unique.contains(&reference) {
                        unique.push(reference);
                    }
                }
                table.gather(unique)
            })
            .cloned()
    }

    /// Resolved middleware, if this route has been dispatched.
    pub fn resolved_middleware(&self) -> Option<&[ResolvedMiddleware]> {
        self.middleware.get().map(Vec::as_slice)
    }

    /// Whether the route name matches any of the patterns (`*` wildcard).
    pub fn named(&self, patterns: &[&str]) -> bool {
        match self.name() {
            Some(name) => patterns.iter().any(|p| wildcard_match(p, name)),
            None => false,
        }
    }
}

/// `*` matches any run of characters, everything else is literal.
fn wildcard_match(pattern: &str, value: &str) -> bool {
    let source = format!("^{}$", regex::escape(pattern).replace(r"\*", ".*"));
    Regex::new(&source).is_ok_and(|re| re.is_match(value))
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("methods", &self.methods)
            .field("uri", &self.uri)
            .field("name", &self.action.name)
            .field("domain", &self.action.domain)
            .field("action", &self.action.action)
            .field("wheres", &self.wheres)
            .field("fallback", &self.fallback)
            .finish()
    }
}

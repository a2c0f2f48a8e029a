//! Indexed route storage and request matching.
//!
//! # Responsibilities
//! - Store routes in registration order
//! - Index routes by method, name and controller action
//! - Match a request to the first accepting route
//! - Report method-not-allowed with the set of methods that would match
//!
//! # Design Decisions
//! - First registered wins; there is no specificity scoring
//! - Fallback routes are tried only after every other candidate
//! - `OPTIONS` on a path served by other verbs answers `200` with `Allow`
//! - Duplicate names follow `NamePolicy` (last wins by default)

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{join_methods, Error, Result};
use crate::http::{Request, Response};
use crate::routing::action::{handler, RouteAction};
use crate::routing::Route;

/// Verbs probed when looking for alternate methods, in reporting order.
pub const VERBS: [Method; 7] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// How duplicate route names are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePolicy {
    /// The most recently registered route owns the name.
    #[default]
    LastWins,
    /// Looking up a duplicated name fails.
    Reject,
}

#[derive(Debug, Clone, Default)]
pub struct RouteCollection {
    routes: Vec<Arc<Route>>,
    by_method: HashMap<Method, Vec<usize>>,
    by_name: HashMap<String, Vec<usize>>,
    by_action: HashMap<String, Vec<usize>>,
    policy: NamePolicy,
}

impl RouteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: NamePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn set_name_policy(&mut self, policy: NamePolicy) {
        self.policy = policy;
    }

    pub fn name_policy(&self) -> NamePolicy {
        self.policy
    }

    /// Add a route; returns its index.
    pub fn add(&mut self, route: Route) -> usize {
        let index = self.routes.len();
        for method in route.methods() {
            self.by_method.entry(method.clone()).or_default().push(index);
        }
        self.routes.push(Arc::new(route));
        self.add_lookups(index);
        index
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Route>> {
        self.routes.get(index)
    }

    /// Mutate a registered route and refresh its name and action lookups.
    ///
    /// Methods cannot change after registration.
    pub fn update<F>(&mut self, index: usize, f: F)
    where
        F: FnOnce(&mut Route),
    {
        if index >= self.routes.len() {
            return;
        }
        self.remove_lookups(index);
        f(Arc::make_mut(&mut self.routes[index]));
        self.add_lookups(index);
    }

    fn add_lookups(&mut self, index: usize) {
        let route = &self.routes[index];
        if let Some(name) = route.name() {
            self.by_name.entry(name.to_string()).or_default().push(index);
        }
        if let Some(action) = route.controller_action() {
            self.by_action.entry(action.to_string()).or_default().push(index);
        }
    }

    fn remove_lookups(&mut self, index: usize) {
        let route = &self.routes[index];
        let name = route.name().map(str::to_string);
        let action = route.controller_action().map(str::to_string);

        if let Some(name) = name {
            remove_index(&mut self.by_name, &name, index);
        }
        if let Some(action) = action {
            remove_index(&mut self.by_action, &action, index);
        }
    }

    /// Find the route for a request.
    pub fn match_request(&self, request: &Request) -> Result<Arc<Route>> {
        let method = request.method();
        if let Some(route) = self.match_against(self.indices(&method), request) {
            return Ok(route);
        }

        let others: Vec<Method> = VERBS
            .iter()
            .filter(|verb| **verb != method)
            .filter(|verb| self.match_against(self.indices(verb), request).is_some())
            .cloned()
            .collect();

        if others.is_empty() {
            return Err(Error::RouteNotFound {
                method,
                path: request.uri().path().to_string(),
            });
        }

        if method == Method::OPTIONS {
            return Ok(Arc::new(options_route(request, &others)));
        }

        Err(Error::MethodNotAllowed {
            method,
            path: request.uri().path().to_string(),
            allowed: others,
        })
    }

    fn indices(&self, method: &Method) -> &[usize] {
        self.by_method.get(method).map(Vec::as_slice).unwrap_or_default()
    }

    fn match_against(&self, indices: &[usize], request: &Request) -> Option<Arc<Route>> {
        let (fallbacks, primary): (Vec<&Arc<Route>>, Vec<&Arc<Route>>) = indices
            .iter()
            .map(|&i| &self.routes[i])
            .partition(|route| route.is_fallback());

        primary
            .into_iter()
            .chain(fallbacks)
            .find(|route| route.matches(request, false))
            .cloned()
    }

    /// Route registered under `name`.
    pub fn get_by_name(&self, name: &str) -> Result<Arc<Route>> {
        let indices = self
            .by_name
            .get(name)
            .filter(|i| !i.is_empty())
            .ok_or_else(|| Error::RouteNameUndefined(name.to_string()))?;

        if self.policy == NamePolicy::Reject && indices.len() > 1 {
            return Err(Error::RouteNameConflict(name.to_string()));
        }
        let last = indices[indices.len() - 1];
        Ok(self.routes[last].clone())
    }

    pub fn has_named_route(&self, name: &str) -> bool {
        self.by_name.get(name).is_some_and(|i| !i.is_empty())
    }

    /// Route whose controller action is `action` (last registered wins).
    pub fn get_by_action(&self, action: &str) -> Option<Arc<Route>> {
        self.by_action
            .get(action)
            .and_then(|i| i.last())
            .map(|&i| self.routes[i].clone())
    }

    /// Names registered by more than one route, sorted.
    pub fn name_conflicts(&self) -> Vec<String> {
        let mut conflicts: Vec<String> = self
            .by_name
            .iter()
            .filter(|(_, indices)| indices.len() > 1)
            .map(|(name, _)| name.clone())
            .collect();
        conflicts.sort();
        conflicts
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn routes_by_method(&self, method: &Method) -> Vec<Arc<Route>> {
        self.indices(method)
            .iter()
            .map(|&i| self.routes[i].clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn remove_index(index: &mut HashMap<String, Vec<usize>>, key: &str, value: usize) {
    if let Some(entries) = index.get_mut(key) {
        entries.retain(|&i| i != value);
        if entries.is_empty() {
            index.remove(key);
        }
    }
}

/// Route answering an `OPTIONS` request with the methods the path allows.
fn options_route(request: &Request, allowed: &[Method]) -> Route {
    let allow = join_methods(allowed);
    let action = handler(move |_request| {
        let allow = allow.clone();
        async move {
            let mut response = Response::new(StatusCode::OK);
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
            Ok(response)
        }
    });
    Route::new(vec![Method::OPTIONS], request.path(), RouteAction::new(action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;

    fn route(methods: &[Method], uri: &str, action: &str) -> Route {
        Route::new(methods.to_vec(), uri, RouteAction::new(action))
    }

    fn request(method: Method, uri: &'static str) -> Request {
        Request::new(method, Uri::from_static(uri))
    }

    #[test]
    fn test_first_registered_wins() {
        let mut routes = RouteCollection::new();
        let mut constrained = route(&[Method::GET], "users/{id}", "Digits@show");
        constrained.set_where("id", "[0-9]+");
        routes.add(constrained);
        routes.add(route(&[Method::GET], "users/{id}", "Any@show"));

        let matched = routes.match_request(&request(Method::GET, "/users/7")).unwrap();
        assert_eq!(matched.controller_action(), Some("Digits@show"));

        let matched = routes.match_request(&request(Method::GET, "/users/abc")).unwrap();
        assert_eq!(matched.controller_action(), Some("Any@show"));
    }

    #[test]
    fn test_head_served_by_get() {
        let mut routes = RouteCollection::new();
        routes.add(route(&[Method::GET], "ping", "Ping@show"));
        assert!(routes.match_request(&request(Method::HEAD, "/ping")).is_ok());
    }

    #[test]
    fn test_method_not_allowed_lists_methods() {
        let mut routes = RouteCollection::new();
        routes.add(route(&[Method::GET], "users", "Users@index"));

        match routes.match_request(&request(Method::POST, "/users")) {
            Err(Error::MethodNotAllowed { allowed, .. }) => {
                assert_eq!(allowed, vec![Method::GET, Method::HEAD]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_not_found() {
        let routes = RouteCollection::new();
        assert!(matches!(
            routes.match_request(&request(Method::GET, "/nothing")),
            Err(Error::RouteNotFound { .. })
        ));
    }

    #[test]
    fn test_options_synthesized() {
        let mut routes = RouteCollection::new();
        routes.add(route(&[Method::GET], "users", "Users@index"));
        routes.add(route(&[Method::POST], "users", "Users@store"));

        let matched = routes.match_request(&request(Method::OPTIONS, "/users")).unwrap();
        assert_eq!(matched.methods(), &[Method::OPTIONS]);
        assert_eq!(matched.uri(), "users");
    }

    #[test]
    fn test_fallback_tried_last() {
        let mut routes = RouteCollection::new();
        let mut fallback = route(&[Method::GET], "{fallbackPlaceholder}", "Fallback@handle");
        fallback.set_where("fallbackPlaceholder", ".*");
        fallback.mark_fallback();
        routes.add(fallback);
        routes.add(route(&[Method::GET], "about", "Pages@about"));

        let matched = routes.match_request(&request(Method::GET, "/about")).unwrap();
        assert_eq!(matched.controller_action(), Some("Pages@about"));

        let matched = routes.match_request(&request(Method::GET, "/missing/deep")).unwrap();
        assert_eq!(matched.controller_action(), Some("Fallback@handle"));
    }

    #[test]
    fn test_name_lookups_follow_updates() {
        let mut routes = RouteCollection::new();
        let index = routes.add(route(&[Method::GET], "users", "Users@index"));
        assert!(matches!(routes.get_by_name("users.index"), Err(Error::RouteNameUndefined(_))));

        routes.update(index, |r| r.append_name("users.index"));
        assert!(routes.has_named_route("users.index"));
        assert_eq!(routes.get_by_name("users.index").unwrap().uri(), "users");
        assert!(routes.get_by_action("Users@index").is_some());
    }

    #[test]
    fn test_duplicate_names_by_policy() {
        let mut routes = RouteCollection::new();
        let first = routes.add(route(&[Method::GET], "a", "A@a"));
        let second = routes.add(route(&[Method::GET], "b", "B@b"));
        routes.update(first, |r| r.append_name("dup"));
        routes.update(second, |r| r.append_name("dup"));

        assert_eq!(routes.get_by_name("dup").unwrap().uri(), "b");
        assert_eq!(routes.name_conflicts(), vec!["dup".to_string()]);

        routes.set_name_policy(NamePolicy::Reject);
        assert!(matches!(routes.get_by_name("dup"), Err(Error::RouteNameConflict(_))));
    }
}

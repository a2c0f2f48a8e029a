//! Route registration and dispatch.
//!
//! # Responsibilities
//! - Register routes through verb helpers, groups, resources and route
//!   files, merging the active group attributes into each route
//! - Own the middleware tables, binding registry and controller registry
//! - Dispatch a request: match, bind parameters, record the route, run the
//!   route middleware and the action, normalize the result
//!
//! # Design Decisions
//! - Registration takes `&mut self` and happens before serving; dispatch
//!   takes `&self`, so a built router is shared as `Arc<Router>` with no
//!   locks on the request path
//! - The group stack only exists during registration; per-request state
//!   (matched route, parameters) lives on the `Request`
//! - The group stack is restored when a group callback returns, fails or
//!   panics
//! - Parameter binding is the `substitute_bindings` middleware, ordered by
//!   middleware priority rather than run as a separate phase

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode};
use serde_json::Value;

use crate::config::KernelConfig;
use crate::error::{Error, Result};
use crate::events::{Event, EventDispatcher};
use crate::http::middleware::{Middleware, RequestIdMiddleware, ResolvedMiddleware, SubstituteBindings};
use crate::http::{to_response, Reply, Request, Response};
use crate::pipeline::{BoxedStage, Pipeline};
use crate::routing::action::{Action, RouteAction};
use crate::routing::binding::{Binder, BindingRegistry, BindingResolver};
use crate::routing::collection::{NamePolicy, RouteCollection, VERBS};
use crate::routing::controller::{Controller, ControllerRegistry};
use crate::routing::group::GroupAttributes;
use crate::routing::loader;
use crate::routing::middleware::{MiddlewareRef, MiddlewareTable};
use crate::routing::registration::{GroupRegistrar, RouteRegistration};
use crate::routing::resource::{self, ResourceOptions, ResourceVerbs, API_RESOURCE_ACTIONS, RESOURCE_ACTIONS};
use crate::routing::Route;

/// Parameter name of the fallback route's catch-all placeholder.
pub const FALLBACK_PLACEHOLDER: &str = "fallbackPlaceholder";

/// Renders view routes.
pub trait ViewRenderer: Send + Sync {
    fn render(&self, view: &str, data: &Value) -> Result<String>;
}

pub struct Router {
    routes: RouteCollection,
    group_stack: Vec<GroupAttributes>,
    patterns: BTreeMap<String, String>,
    middleware: MiddlewareTable,
    bindings: Arc<BindingRegistry>,
    controllers: Arc<ControllerRegistry>,
    views: Option<Arc<dyn ViewRenderer>>,
    events: Arc<EventDispatcher>,
    resource_verbs: ResourceVerbs,
    skip_middleware: bool,
    rejected: Vec<String>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// A router with the built-in middleware registered.
    pub fn new() -> Self {
        Self::with_events(Arc::new(EventDispatcher::new()))
    }

    /// A router publishing to a shared event dispatcher.
    pub fn with_events(events: Arc<EventDispatcher>) -> Self {
        let bindings = Arc::new(BindingRegistry::new());

        let mut middleware = MiddlewareTable::new();
        middleware.register("substitute_bindings", Arc::new(SubstituteBindings::new(bindings.clone())));
        middleware.register("request_id", Arc::new(RequestIdMiddleware));
        middleware.alias("bindings", "substitute_bindings");
        middleware.group("web", ["bindings"]);
        middleware.group("api", ["bindings"]);

        Self {
            routes: RouteCollection::new(),
            group_stack: Vec::new(),
            patterns: BTreeMap::new(),
            middleware,
            bindings,
            controllers: Arc::new(ControllerRegistry::new()),
            views: None,
            events,
            resource_verbs: ResourceVerbs::default(),
            skip_middleware: false,
            rejected: Vec::new(),
        }
    }

    /// Apply routing and middleware configuration, then load the configured
    /// route files in order.
    pub fn configure(&mut self, config: &KernelConfig) -> Result<()> {
        self.set_name_policy(config.routing.duplicate_names);
        self.patterns(config.routing.patterns.clone());

        let middleware = &config.middleware;
        for (alias, identifier) in &middleware.aliases {
            self.alias_middleware(alias.clone(), identifier.clone());
        }
        for (group, members) in &middleware.groups {
            self.middleware_group(group.clone(), members.iter().map(String::as_str));
        }
        if !middleware.priority.is_empty() {
            self.set_middleware_priority(middleware.priority.clone());
        }
        self.disable_middleware(middleware.disabled);

        let namespace = config.routing.controller_namespace.as_deref();
        for path in &config.routing.route_files {
            match namespace {
                Some(ns) => self.group_file(GroupAttributes::new().namespace(ns), path)?,
                None => self.load_route_file(path)?,
            }
        }

        tracing::info!(
            routes = self.routes.len(),
            files = config.routing.route_files.len(),
            "router configured"
        );
        Ok(())
    }

    // Verb helpers

    pub fn get(&mut self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'_> {
        self.add_route(vec![Method::GET], uri, action.into())
    }

    pub fn post(&mut self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'_> {
        self.add_route(vec![Method::POST], uri, action.into())
    }

    pub fn put(&mut self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'_> {
        self.add_route(vec![Method::PUT], uri, action.into())
    }

    pub fn patch(&mut self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'_> {
        self.add_route(vec![Method::PATCH], uri, action.into())
    }

    pub fn delete(&mut self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'_> {
        self.add_route(vec![Method::DELETE], uri, action.into())
    }

    pub fn options(&mut self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'_> {
        self.add_route(vec![Method::OPTIONS], uri, action.into())
    }

    /// Every verb.
    pub fn any(&mut self, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'_> {
        self.add_route(VERBS.to_vec(), uri, action.into())
    }

    pub fn match_<I>(&mut self, methods: I, uri: &str, action: impl Into<RouteAction>) -> RouteRegistration<'_>
    where
        I: IntoIterator<Item = Method>,
    {
        self.add_route(methods.into_iter().collect(), uri, action.into())
    }

    /// Catch-all GET route tried after every other route.
    pub fn fallback(&mut self, action: impl Into<RouteAction>) -> RouteRegistration<'_> {
        let uri = format!("{{{FALLBACK_PLACEHOLDER}}}");
        let index = self.add_route(vec![Method::GET], &uri, action.into()).index();
        let Some(index) = index else {
            return RouteRegistration::rejected(self);
        };
        self.routes.update(index, |route| {
            route.set_where(FALLBACK_PLACEHOLDER, ".*");
            route.mark_fallback();
        });
        RouteRegistration::new(self, index)
    }

    pub fn redirect(&mut self, uri: &str, destination: &str, status: StatusCode) -> RouteRegistration<'_> {
        self.any(
            uri,
            Action::Redirect {
                destination: destination.to_string(),
                status,
            },
        )
    }

    pub fn permanent_redirect(&mut self, uri: &str, destination: &str) -> RouteRegistration<'_> {
        self.redirect(uri, destination, StatusCode::MOVED_PERMANENTLY)
    }

    pub fn view(&mut self, uri: &str, view: &str, data: Value) -> RouteRegistration<'_> {
        self.match_(
            [Method::GET, Method::HEAD],
            uri,
            Action::View {
                view: view.to_string(),
                data,
            },
        )
    }

    // Resources

    /// Register the conventional controller routes for a resource.
    ///
    /// Returns the collection indexes of the registered routes.
    pub fn resource(&mut self, name: &str, controller: &str, options: ResourceOptions) -> Vec<usize> {
        self.register_resource(name, controller, options, &RESOURCE_ACTIONS)
    }

    /// Like `resource`, without the `create` and `edit` form routes.
    pub fn api_resource(&mut self, name: &str, controller: &str, options: ResourceOptions) -> Vec<usize> {
        self.register_resource(name, controller, options, &API_RESOURCE_ACTIONS)
    }

    pub fn resources<'a, I>(&mut self, resources: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, controller) in resources {
            self.resource(name, controller, ResourceOptions::default());
        }
    }

    pub fn api_resources<'a, I>(&mut self, resources: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, controller) in resources {
            self.api_resource(name, controller, ResourceOptions::default());
        }
    }

    /// Replace the URI words used for `create` and `edit`.
    pub fn set_resource_verbs(&mut self, verbs: ResourceVerbs) {
        self.resource_verbs = verbs;
    }

    pub fn resource_verbs(&self) -> &ResourceVerbs {
        &self.resource_verbs
    }

    fn register_resource(
        &mut self,
        name: &str,
        controller: &str,
        options: ResourceOptions,
        actions: &[&'static str],
    ) -> Vec<usize> {
        resource::expand(name, controller, &options, &self.resource_verbs, actions)
            .into_iter()
            .filter_map(|route| {
                let action = RouteAction::new(route.uses).middleware(options.middleware.iter().cloned());
                self.add_route(route.methods, &route.uri, action)
                    .name(&route.name)
                    .index()
            })
            .collect()
    }

    // Groups

    /// Register the routes added by `routes` under `attributes`.
    ///
    /// The group stack is restored afterwards, also when `routes` panics.
    pub fn group<F, R>(&mut self, attributes: GroupAttributes, routes: F) -> R
    where
        F: FnOnce(&mut Router) -> R,
    {
        let depth = self.group_stack.len();
        self.update_group_stack(attributes);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| routes(self)));
        self.group_stack.truncate(depth);

        match outcome {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Load a route file inside a group.
    pub fn group_file(&mut self, attributes: GroupAttributes, path: &Path) -> Result<()> {
        self.group(attributes, |router| router.load_route_file(path))
    }

    pub fn load_route_file(&mut self, path: &Path) -> Result<()> {
        loader::load_routes(self, path)
    }

    fn update_group_stack(&mut self, attributes: GroupAttributes) {
        let attributes = match self.group_stack.last() {
            Some(parent) => parent.merge(&attributes),
            None => attributes,
        };
        self.group_stack.push(attributes);
    }

    pub fn has_group_stack(&self) -> bool {
        !self.group_stack.is_empty()
    }

    pub fn group_stack(&self) -> &[GroupAttributes] {
        &self.group_stack
    }

    /// Prefix of the innermost group.
    pub fn last_group_prefix(&self) -> &str {
        self.group_stack
            .last()
            .and_then(|group| group.prefix.as_deref())
            .unwrap_or_default()
    }

    pub fn attributes(&mut self, attributes: GroupAttributes) -> GroupRegistrar<'_> {
        GroupRegistrar::new(self, attributes)
    }

    pub fn prefix(&mut self, prefix: impl Into<String>) -> GroupRegistrar<'_> {
        GroupRegistrar::new(self, GroupAttributes::new().prefix(prefix))
    }

    pub fn namespace(&mut self, namespace: impl Into<String>) -> GroupRegistrar<'_> {
        GroupRegistrar::new(self, GroupAttributes::new().namespace(namespace))
    }

    pub fn domain(&mut self, domain: impl Into<String>) -> GroupRegistrar<'_> {
        GroupRegistrar::new(self, GroupAttributes::new().domain(domain))
    }

    pub fn middleware<I, R>(&mut self, middleware: I) -> GroupRegistrar<'_>
    where
        I: IntoIterator<Item = R>,
        R: Into<MiddlewareRef>,
    {
        GroupRegistrar::new(self, GroupAttributes::new().middleware(middleware))
    }

    /// Group with a route name prefix (`as`).
    pub fn name(&mut self, name: impl Into<String>) -> GroupRegistrar<'_> {
        GroupRegistrar::new(self, GroupAttributes::new().name(name))
    }

    pub fn where_(&mut self, parameter: impl Into<String>, pattern: impl Into<String>) -> GroupRegistrar<'_> {
        GroupRegistrar::new(self, GroupAttributes::new().where_(parameter, pattern))
    }

    // Route creation

    fn add_route(&mut self, methods: Vec<Method>, uri: &str, mut action: RouteAction) -> RouteRegistration<'_> {
        if methods.is_empty() {
            let uri = self.prefixed(uri);
            tracing::warn!(uri = %uri, "route registered without methods, skipping");
            self.rejected.push(uri);
            return RouteRegistration::rejected(self);
        }

        action.apply_namespace(self.group_stack.last().and_then(|group| group.namespace.as_deref()));

        let uri = self.prefixed(uri);
        if let Some(group) = self.group_stack.last() {
            action.merge_group(group);
        }

        let wheres: Vec<(String, String)> = self
            .patterns
            .iter()
            .chain(action.wheres.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut route = Route::new(methods, uri, action);
        for (parameter, pattern) in wheres {
            route.set_where(parameter, pattern);
        }

        tracing::debug!(
            methods = %crate::error::join_methods(route.methods()),
            uri = %route.uri(),
            action = %route.action().describe(),
            "route registered"
        );

        let index = self.routes.add(route);
        RouteRegistration::new(self, index)
    }

    fn prefixed(&self, uri: &str) -> String {
        let joined = format!(
            "{}/{}",
            self.last_group_prefix().trim_matches('/'),
            uri.trim_matches('/')
        );
        match joined.trim_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        }
    }

    pub fn routes(&self) -> &RouteCollection {
        &self.routes
    }

    pub(crate) fn routes_mut(&mut self) -> &mut RouteCollection {
        &mut self.routes
    }

    pub fn set_name_policy(&mut self, policy: NamePolicy) {
        self.routes.set_name_policy(policy);
    }

    // Patterns and bindings

    /// Constrain a parameter name on every route registered afterwards.
    pub fn pattern(&mut self, key: impl Into<String>, pattern: impl Into<String>) {
        self.patterns.insert(key.into(), pattern.into());
    }

    pub fn patterns<I, K, V>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, pattern) in patterns {
            self.pattern(key, pattern);
        }
    }

    pub fn get_patterns(&self) -> &BTreeMap<String, String> {
        &self.patterns
    }

    /// Explicit binding callback for a parameter.
    pub fn bind<F>(&self, key: impl Into<String>, binder: F)
    where
        F: Fn(&str, &Route) -> Result<crate::routing::parameters::Bound> + Send + Sync + 'static,
    {
        let binder: Binder = Arc::new(binder);
        self.bindings.bind(key, binder);
    }

    /// Implicit binding through a resolver.
    pub fn model(&self, key: impl Into<String>, resolver: Arc<dyn BindingResolver>) {
        self.bindings.model(key, resolver);
    }

    pub fn bindings(&self) -> &Arc<BindingRegistry> {
        &self.bindings
    }

    // Middleware tables

    pub fn alias_middleware(&mut self, name: impl Into<String>, identifier: impl Into<String>) {
        self.middleware.alias(name, identifier);
    }

    pub fn middleware_group<I, R>(&mut self, name: impl Into<String>, members: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<MiddlewareRef>,
    {
        self.middleware.group(name, members);
    }

    pub fn prepend_middleware_to_group(&mut self, group: &str, middleware: impl Into<MiddlewareRef>) {
        self.middleware.prepend_to_group(group, middleware);
    }

    pub fn push_middleware_to_group(&mut self, group: &str, middleware: impl Into<MiddlewareRef>) {
        self.middleware.push_to_group(group, middleware);
    }

    pub fn has_middleware_group(&self, name: &str) -> bool {
        self.middleware.has_group(name)
    }

    pub fn set_middleware_priority<I, S>(&mut self, priority: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware.set_priority(priority);
    }

    /// Register the instance serving a middleware identifier.
    pub fn register_middleware(&mut self, identifier: impl Into<String>, instance: Arc<dyn Middleware>) {
        self.middleware.register(identifier, instance);
    }

    pub fn middleware_table(&self) -> &MiddlewareTable {
        &self.middleware
    }

    /// Skip route middleware on dispatch.
    pub fn disable_middleware(&mut self, disabled: bool) {
        self.skip_middleware = disabled;
    }

    pub fn middleware_disabled(&self) -> bool {
        self.skip_middleware
    }

    // Collaborators

    pub fn register_controller(&mut self, name: impl Into<String>, controller: Arc<dyn Controller>) {
        Arc::make_mut(&mut self.controllers).register(name, controller);
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    pub fn set_view_renderer(&mut self, renderer: Arc<dyn ViewRenderer>) {
        self.views = Some(renderer);
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    /// Listen for matched routes.
    pub fn matched<F>(&self, callback: F)
    where
        F: Fn(&Route, &Request) + Send + Sync + 'static,
    {
        self.events.listen(move |event: &Event<'_>| {
            if let Event::RouteMatched { route, request } = event {
                callback(route, request);
            }
        });
    }

    // Lookups

    /// Whether every name is registered.
    pub fn has(&self, names: &[&str]) -> bool {
        names.iter().all(|name| self.routes.has_named_route(name))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Arc<Route>> {
        self.routes.get_by_name(name)
    }

    /// Check the route table once registration is complete.
    pub fn validate(&self) -> Result<()> {
        if !self.rejected.is_empty() {
            return Err(Error::RouteWithoutMethods(self.rejected.join(", ")));
        }

        let conflicts = self.routes.name_conflicts();
        if !conflicts.is_empty() {
            if self.routes.name_policy() == NamePolicy::Reject {
                return Err(Error::RouteNameConflict(conflicts.join(", ")));
            }
            tracing::warn!(names = ?conflicts, "duplicate route names, last registration wins");
        }

        for route in self.routes.iter() {
            let controller = self.controller_middleware(route);
            let references: Vec<&MiddlewareRef> = route.middleware().iter().chain(&controller).collect();
            for reference in self.middleware.resolve(references) {
                if !self.middleware.is_registered(reference.name()) {
                    tracing::warn!(uri = %route.uri(), middleware = %reference, "route uses unregistered middleware");
                }
            }
        }
        Ok(())
    }

    // Dispatch

    /// Dispatch a request to its route.
    pub async fn dispatch(&self, request: Request) -> Result<Response> {
        self.dispatch_to_route(request).await
    }

    pub async fn dispatch_to_route(&self, mut request: Request) -> Result<Response> {
        let route = self.find_route(&mut request)?;
        self.run_route(request, route).await
    }

    /// Run the named route for a request, bypassing matching.
    pub async fn respond_with_route(&self, name: &str, mut request: Request) -> Result<Response> {
        let route = self.get_by_name(name)?;
        request.set_parameters(route.bind(&request));
        request.set_route(route.clone());
        self.run_route(request, route).await
    }

    fn find_route(&self, request: &mut Request) -> Result<Arc<Route>> {
        let route = self.routes.match_request(request)?;
        request.set_parameters(route.bind(request));
        request.set_route(route.clone());

        tracing::debug!(
            method = %request.method(),
            path = %request.path(),
            route = %route.uri(),
            name = route.name().unwrap_or_default(),
            "route matched"
        );
        Ok(route)
    }

    async fn run_route(&self, request: Request, route: Arc<Route>) -> Result<Response> {
        self.events.dispatch(&Event::RouteMatched {
            route: &route,
            request: &request,
        });

        let original = request.clone();
        let response = self.run_route_within_stack(route, request).await?;
        to_response(&original, Reply::Response(response))
    }

    async fn run_route_within_stack(&self, route: Arc<Route>, request: Request) -> Result<Response> {
        let middleware = if self.skip_middleware {
            Vec::new()
        } else {
            self.gather_route_middleware(&route)?
        };

        let stages: Vec<BoxedStage<Request, Result<Response>>> = middleware
            .into_iter()
            .map(|m| Arc::new(m) as BoxedStage<Request, Result<Response>>)
            .collect();

        let controllers = self.controllers.clone();
        let views = self.views.clone();

        Pipeline::send(request)
            .through(stages)
            .then(move |request: Request| async move {
                let reply = run_action(&route, &controllers, views.as_deref(), request.clone()).await?;
                to_response(&request, reply)
            })
            .await
    }

    /// Resolved, sorted middleware for a route (cached on the route).
    pub fn gather_route_middleware(&self, route: &Route) -> Result<Vec<ResolvedMiddleware>> {
        route.gather_middleware(&self.middleware, &self.controller_middleware(route))
    }

    fn controller_middleware(&self, route: &Route) -> Vec<MiddlewareRef> {
        route
            .controller_action()
            .map(|uses| self.controllers.middleware_for(uses))
            .unwrap_or_default()
    }
}

async fn run_action(
    route: &Route,
    controllers: &ControllerRegistry,
    views: Option<&dyn ViewRenderer>,
    request: Request,
) -> Result<Reply> {
    match route.action() {
        Action::Handler(handler) => handler(request).await,
        Action::Controller(uses) => controllers.dispatch(uses, request).await,
        Action::Redirect { destination, status } => Ok(Response::redirect(destination, *status).into()),
        Action::View { view, data } => {
            let renderer = views.ok_or_else(|| Error::ViewNotConfigured(view.clone()))?;
            let html = renderer.render(view, data)?;
            Ok(Response::ok(html)
                .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=UTF-8"))
                .into())
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.len())
            .field("group_stack", &self.group_stack)
            .field("patterns", &self.patterns)
            .field("middleware", &self.middleware)
            .field("controllers", &self.controllers)
            .field("views", &self.views.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::{middleware_fn, HttpNext};
    use crate::routing::action::handler;
    use crate::routing::controller::ActionController;
    use crate::routing::parameters::Bound;
    use axum::http::Uri;
    use serde_json::json;
    use std::sync::Mutex;

    fn request(method: Method, uri: &'static str) -> Request {
        Request::new(method, Uri::from_static(uri))
    }

    fn echo_route() -> crate::routing::action::HandlerFn {
        handler(|req: Request| async move {
            let route = req.route().map(|r| r.uri().to_string()).unwrap_or_default();
            Ok(json!({ "route": route, "params": req.parameters().to_json() }))
        })
    }

    fn body(response: &Response) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[test]
    fn test_group_prefix_composition() {
        let mut router = Router::new();
        router.group(GroupAttributes::new().prefix("/admin/"), |r| {
            r.group(GroupAttributes::new().prefix("users/"), |r| {
                r.get("/{id}/", "Users@show");
                r.get("", "Users@index");
            });
        });
        router.group(GroupAttributes::new().prefix("admin"), |r| {
            r.prefix("users").get("list", "Users@list");
        });

        let uris: Vec<_> = router.routes().iter().map(|r| r.uri().to_string()).collect();
        assert_eq!(uris, vec!["admin/users/{id}", "admin/users", "admin/users/list"]);

        router.get("", "Home@index");
        assert_eq!(router.routes().routes()[3].uri(), "/");
    }

    #[test]
    fn test_group_stack_restored_after_panic() {
        let mut router = Router::new();
        router.group(GroupAttributes::new().prefix("outer"), |r| {
            let before = r.group_stack().to_vec();
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                r.group(GroupAttributes::new().prefix("inner"), |_| panic!("bad routes"));
            }));
            assert!(result.is_err());
            assert_eq!(r.group_stack(), before.as_slice());
        });
        assert!(!router.has_group_stack());

        router.get("after", "A@b");
        assert_eq!(router.routes().routes()[0].uri(), "after");
    }

    #[test]
    fn test_group_stack_restored_after_error() {
        let mut router = Router::new();
        let result: Result<()> = router.group(GroupAttributes::new().prefix("x"), |_| {
            Err(Error::Bootstrap("failed".into()))
        });
        assert!(result.is_err());
        assert!(router.group_stack().is_empty());
    }

    #[test]
    fn test_group_attributes_flow_into_routes() {
        let mut router = Router::new();
        router.pattern("id", "[0-9]+");
        router
            .namespace("admin")
            .middleware(["web"])
            .name("admin.")
            .domain("admin.test")
            .group(|r| {
                r.get("users/{id}", "Users@show")
                    .name("users.show")
                    .middleware(["auth"]);
                r.get("posts/{slug}", RouteAction::new("::blog::Posts@show").where_("slug", "[a-z-]+"));
            });

        let show = router.get_by_name("admin.users.show").unwrap();
        assert_eq!(show.controller_action(), Some("admin::Users@show"));
        assert_eq!(show.domain(), Some("admin.test"));
        assert_eq!(show.wheres()["id"], "[0-9]+");
        let mw: Vec<_> = show.middleware().iter().map(ToString::to_string).collect();
        assert_eq!(mw, vec!["web", "auth"]);

        let post = &router.routes().routes()[1];
        assert_eq!(post.controller_action(), Some("blog::Posts@show"));
        assert_eq!(post.wheres()["slug"], "[a-z-]+");
    }

    #[tokio::test]
    async fn test_dispatch_returns_json_for_map() {
        let mut router = Router::new();
        router.get(
            "users/{id}/{age?}",
            handler(|req: Request| async move {
                let mut map = serde_json::Map::new();
                map.insert("id".into(), json!(req.parameter("id")));
                map.insert("age".into(), json!(req.parameter("age")));
                Ok(map)
            }),
        );

        let response = router.dispatch(request(Method::GET, "/users/5")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response), json!({"id": "5", "age": null}));

        let response = router.dispatch(request(Method::GET, "/users/5/30")).await.unwrap();
        assert_eq!(body(&response), json!({"id": "5", "age": "30"}));
    }

    #[tokio::test]
    async fn test_dispatch_errors() {
        let mut router = Router::new();
        router.get("users", echo_route());

        assert!(matches!(
            router.dispatch(request(Method::GET, "/nope")).await,
            Err(Error::RouteNotFound { .. })
        ));
        match router.dispatch(request(Method::POST, "/users")).await {
            Err(err) => assert_eq!(err.allowed_methods(), Some(&[Method::GET, Method::HEAD][..])),
            Ok(_) => panic!("POST should not be allowed"),
        }

        let response = router.dispatch(request(Method::OPTIONS, "/users")).await.unwrap();
        assert_eq!(response.header("allow"), Some("GET,HEAD"));
    }

    #[tokio::test]
    async fn test_route_middleware_order_and_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let recorder = |name: &'static str, log: Arc<Mutex<Vec<String>>>| {
            middleware_fn(move |request, next: HttpNext, _| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(name.to_string());
                    next.run(request).await
                }
            })
        };

        let mut router = Router::new();
        router.register_middleware("first", recorder("first", log.clone()));
        router.register_middleware("second", recorder("second", log.clone()));
        router.register_middleware(
            "deny",
            middleware_fn(|_request, _next: HttpNext, _| async {
                Ok(Response::text(StatusCode::FORBIDDEN, "denied"))
            }),
        );
        let called = Arc::new(Mutex::new(false));
        let flag = called.clone();
        router
            .get(
                "open",
                handler(move |_req: Request| {
                    let flag = flag.clone();
                    async move {
                        *flag.lock().unwrap() = true;
                        Ok("ok")
                    }
                }),
            )
            .middleware(["first", "second"]);
        router.get("closed", "Never@called").middleware(["first", "deny", "second"]);

        let response = router.dispatch(request(Method::GET, "/open")).await.unwrap();
        assert_eq!(response.text_body(), "ok");
        assert!(*called.lock().unwrap());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);

        log.lock().unwrap().clear();
        let response = router.dispatch(request(Method::GET, "/closed")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.text_body(), "denied");
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_unregistered_middleware_fails() {
        let mut router = Router::new();
        router.get("x", echo_route()).middleware(["throttle:60,1"]);
        assert!(matches!(
            router.dispatch(request(Method::GET, "/x")).await,
            Err(Error::MiddlewareResolution(ref name)) if name == "throttle:60,1"
        ));
    }

    #[tokio::test]
    async fn test_bindings_run_as_middleware() {
        let mut router = Router::new();
        router.bind("user", |value: &str, _route: &Route| -> Result<Bound> {
            Ok(Arc::new(value.to_uppercase()))
        });
        router
            .get(
                "users/{user}",
                handler(|req: Request| async move {
                    let user = req.parameters().bound::<String>("user").map(|u| u.to_string());
                    Ok(json!({ "user": user }))
                }),
            )
            .middleware(["bindings"]);
        router.get(
            "raw/{user}",
            handler(|req: Request| async move { Ok(json!({ "bound": req.parameters().is_bound("user") })) }),
        );

        let response = router.dispatch(request(Method::GET, "/users/ada")).await.unwrap();
        assert_eq!(body(&response), json!({"user": "ADA"}));

        let response = router.dispatch(request(Method::GET, "/raw/ada")).await.unwrap();
        assert_eq!(body(&response), json!({"bound": false}));
    }

    #[tokio::test]
    async fn test_controllers_and_controller_middleware() {
        let mut router = Router::new();
        router.register_middleware(
            "tag",
            middleware_fn(|request, next: HttpNext, params| async move {
                let mut response = next.run(request).await?;
                response
                    .headers_mut()
                    .insert("x-tag", HeaderValue::from_str(&params.join(",")).unwrap());
                Ok(response)
            }),
        );
        router.register_controller(
            "Users",
            Arc::new(
                ActionController::new()
                    .action("index", handler(|_req: Request| async { Ok("all users") }))
                    .action("store", handler(|_req: Request| async { Ok(StatusCode::CREATED) }))
                    .middleware(crate::routing::controller::ControllerMiddleware::new("tag:store").only(["store"])),
            ),
        );
        router.get("users", "Users@index");
        router.post("users", "Users@store");

        let response = router.dispatch(request(Method::GET, "/users")).await.unwrap();
        assert_eq!(response.text_body(), "all users");
        assert!(response.header("x-tag").is_none());

        let response = router.dispatch(request(Method::POST, "/users")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.header("x-tag"), Some("store"));
    }

    #[tokio::test]
    async fn test_fallback_redirect_and_view() {
        struct Upper;
        impl ViewRenderer for Upper {
            fn render(&self, view: &str, data: &Value) -> Result<String> {
                Ok(format!("<h1>{}</h1>{}", view.to_uppercase(), data["title"].as_str().unwrap_or_default()))
            }
        }

        let mut router = Router::new();
        router.fallback(handler(|_req: Request| async { Ok(StatusCode::NOT_FOUND) }));
        router.redirect("old", "/new", StatusCode::FOUND);
        router.view("welcome", "home", json!({"title": "Hi"}));

        let response = router.dispatch(request(Method::GET, "/old")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header("location"), Some("/new"));

        assert!(matches!(
            router.dispatch(request(Method::GET, "/welcome")).await,
            Err(Error::ViewNotConfigured(ref v)) if v == "home"
        ));
        router.set_view_renderer(Arc::new(Upper));
        let response = router.dispatch(request(Method::GET, "/welcome")).await.unwrap();
        assert_eq!(response.text_body(), "<h1>HOME</h1>Hi");

        let response = router.dispatch(request(Method::GET, "/no/such/page")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_head_request_has_empty_body() {
        let mut router = Router::new();
        router.get("ping", handler(|_req: Request| async { Ok("pong") }));

        let response = router.dispatch(request(Method::HEAD, "/ping")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
        assert_eq!(response.header("content-length"), Some("4"));
    }

    #[tokio::test]
    async fn test_matched_listener_and_respond_with_route() {
        let mut router = Router::new();
        router.get("users/{id}", echo_route()).name("users.show");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        router.matched(move |route, request| {
            sink.lock().unwrap().push(format!("{} {}", route.uri(), request.path()));
        });

        router.dispatch(request(Method::GET, "/users/3")).await.unwrap();
        let response = router
            .respond_with_route("users.show", request(Method::GET, "/users/9"))
            .await
            .unwrap();
        assert_eq!(body(&response)["params"], json!({"id": "9"}));
        assert_eq!(*seen.lock().unwrap(), vec!["users/{id} users/3", "users/{id} users/9"]);
    }

    #[test]
    fn test_resource_registration_and_has() {
        let mut router = Router::new();
        let indexes = router.resource("photos", "Photos", ResourceOptions::new().except(["destroy"]));
        assert_eq!(indexes.len(), 6);
        router.api_resource("tags", "Tags", ResourceOptions::new());

        assert!(router.has(&["photos.index", "photos.edit", "tags.destroy"]));
        assert!(!router.has(&["photos.destroy"]));
        assert!(!router.has(&["tags.create"]));
        assert_eq!(router.routes().get_by_action("Photos@edit").unwrap().uri(), "photos/{photo}/edit");
    }

    #[test]
    fn test_validate_name_policy() {
        let mut router = Router::new();
        router.get("a", "A@a").name("dup");
        router.get("b", "B@b").name("dup");
        assert!(router.validate().is_ok());

        router.set_name_policy(NamePolicy::Reject);
        assert!(matches!(router.validate(), Err(Error::RouteNameConflict(_))));
    }

    #[test]
    fn test_empty_method_list_is_rejected() {
        let mut router = Router::new();
        let registration = router.match_(Vec::<Method>::new(), "ghost", "Ghost@show").name("ghost");
        assert!(registration.index().is_none());
        assert!(registration.route().is_none());

        router
            .prefix("admin")
            .match_(Vec::<Method>::new(), "phantom", "Ghost@show");
        router.get("real", "Real@show");

        assert_eq!(router.routes().len(), 1);
        assert!(router.routes().iter().all(|route| !route.methods().is_empty()));
        assert!(!router.has(&["ghost"]));
        match router.validate() {
            Err(Error::RouteWithoutMethods(uris)) => assert_eq!(uris, "ghost, admin/phantom"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disabled_middleware_skips_route_stack() {
        let mut router = Router::new();
        router.register_middleware(
            "deny",
            middleware_fn(|_request, _next: HttpNext, _| async { Ok(Response::new(StatusCode::FORBIDDEN)) }),
        );
        router.get("x", handler(|_req: Request| async { Ok("through") })).middleware(["deny"]);
        router.disable_middleware(true);

        let response = router.dispatch(request(Method::GET, "/x")).await.unwrap();
        assert_eq!(response.text_body(), "through");
    }
}

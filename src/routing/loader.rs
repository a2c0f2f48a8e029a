//! Route definition files.
//!
//! # Responsibilities
//! - Parse TOML route files (`[[route]]`, `[[resource]]`, nested
//!   `[[group]]` tables)
//! - Register their routes on a router under the current group stack
//!
//! # Design Decisions
//! - Within one table, plain routes register first, then resources, then
//!   groups; this fixes the first-registered-wins order
//! - Every route names exactly one of `action`, `redirect` or `view`
//! - Failures carry the file path and are reported as `Error::RouteFile`
//!
//! ```toml
//! [[route]]
//! methods = ["GET"]
//! uri = "users/{id}"
//! action = "UserController@show"
//! name = "users.show"
//! where = { id = "[0-9]+" }
//!
//! [[group]]
//! prefix = "admin"
//! middleware = ["auth"]
//! as = "admin."
//!
//!   [[group.route]]
//!   uri = "dashboard"
//!   view = "admin.dashboard"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use axum::http::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::routing::action::{Action, RouteAction};
use crate::routing::group::GroupAttributes;
use crate::routing::middleware::MiddlewareRef;
use crate::routing::resource::ResourceOptions;
use crate::routing::Router;

/// Contents of one route file (or one group within it).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RouteFile {
    pub route: Vec<RouteDefinition>,
    pub resource: Vec<ResourceDefinition>,
    pub group: Vec<GroupDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteDefinition {
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,
    pub uri: String,
    pub action: Option<String>,
    pub redirect: Option<String>,
    pub status: Option<u16>,
    pub view: Option<String>,
    pub data: Option<Value>,
    pub name: Option<String>,
    #[serde(default)]
    pub middleware: Vec<MiddlewareRef>,
    #[serde(default, rename = "where")]
    pub wheres: BTreeMap<String, String>,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    pub domain: Option<String>,
    /// Register as the fallback route (`uri` is ignored).
    #[serde(default)]
    pub fallback: bool,
}

fn default_methods() -> Vec<String> {
    vec!["GET".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDefinition {
    pub name: String,
    pub controller: String,
    /// Register only the API actions.
    #[serde(default)]
    pub api: bool,
    #[serde(flatten)]
    pub options: ResourceOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupDefinition {
    #[serde(flatten)]
    pub attributes: GroupAttributes,
    #[serde(flatten)]
    pub routes: RouteFile,
}

impl RouteFile {
    pub fn parse(source: &str, origin: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| route_file_error(origin, e))
    }

    /// Register everything in this file on `router`.
    pub fn register(&self, router: &mut Router, origin: &str) -> Result<()> {
        for definition in &self.route {
            definition.register(router, origin)?;
        }
        for resource in &self.resource {
            if resource.api {
                router.api_resource(&resource.name, &resource.controller, resource.options.clone());
            } else {
                router.resource(&resource.name, &resource.controller, resource.options.clone());
            }
        }
        for group in &self.group {
            router.group(group.attributes.clone(), |router| group.routes.register(router, origin))?;
        }
        Ok(())
    }
}

impl RouteDefinition {
    fn action(&self, origin: &str) -> Result<Action> {
        match (&self.action, &self.redirect, &self.view) {
            (Some(uses), None, None) => Ok(Action::Controller(uses.clone())),
            (None, Some(destination), None) => {
                let status = match self.status {
                    Some(code) => StatusCode::from_u16(code)
                        .map_err(|e| route_file_error(origin, format!("route [{}]: {e}", self.uri)))?,
                    None => StatusCode::MOVED_PERMANENTLY,
                };
                Ok(Action::Redirect {
                    destination: destination.clone(),
                    status,
                })
            }
            (None, None, Some(view)) => Ok(Action::View {
                view: view.clone(),
                data: self.data.clone().unwrap_or(Value::Object(Default::default())),
            }),
            _ => Err(route_file_error(
                origin,
                format!("route [{}] needs exactly one of action, redirect or view", self.uri),
            )),
        }
    }

    fn methods(&self, origin: &str) -> Result<Vec<Method>> {
        if self.methods.is_empty() {
            return Err(route_file_error(origin, format!("route [{}] has no methods", self.uri)));
        }
        self.methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| route_file_error(origin, format!("route [{}]: invalid method {m}", self.uri)))
            })
            .collect()
    }

    fn register(&self, router: &mut Router, origin: &str) -> Result<()> {
        let mut action = RouteAction::new(self.action(origin)?).middleware(self.middleware.iter().cloned());
        for (parameter, pattern) in &self.wheres {
            action = action.where_(parameter, pattern);
        }
        if let Some(domain) = &self.domain {
            action = action.domain(domain);
        }

        let mut registration = if self.fallback {
            router.fallback(action)
        } else {
            let methods = self.methods(origin)?;
            router.match_(methods, &self.uri, action)
        };

        if let Some(name) = &self.name {
            registration = registration.name(name);
        }
        for (parameter, value) in &self.defaults {
            registration = registration.defaults(parameter, value);
        }
        Ok(())
    }
}

/// Read and register a route file.
pub fn load_routes(router: &mut Router, path: &Path) -> Result<()> {
    let origin = path.display().to_string();
    let source = std::fs::read_to_string(path).map_err(|e| route_file_error(&origin, e))?;
    let file = RouteFile::parse(&source, &origin)?;
    file.register(router, &origin)?;
    tracing::info!(path = %origin, routes = router.routes().len(), "route file loaded");
    Ok(())
}

fn route_file_error(origin: &str, message: impl ToString) -> Error {
    Error::RouteFile {
        path: origin.to_string(),
        message: message.to_string(),
    }
}

//! Resource route expansion.
//!
//! # Responsibilities
//! - Expand `resource("photos", "PhotoController")` into the conventional
//!   controller routes
//! - Apply `only` / `except` filters, custom names and parameter names
//! - Nest dotted resources (`photos.comments`)
//!
//! # Design Decisions
//! - Routes are produced in the fixed action order below, independent of the
//!   order of `only`
//! - Parameter names are the singular of the segment, `-` replaced by `_`
//! - `singular` is a suffix heuristic plus a short irregular and uncountable
//!   list, not a full inflector; words it gets wrong (`statuses`, `houses`)
//!   need `ResourceOptions::parameter`

use std::collections::BTreeMap;

use axum::http::Method;
use serde::Deserialize;

use crate::routing::middleware::MiddlewareRef;

/// Actions registered by `resource`.
pub const RESOURCE_ACTIONS: [&str; 7] = ["index", "create", "store", "show", "edit", "update", "destroy"];

/// Actions registered by `api_resource`.
pub const API_RESOURCE_ACTIONS: [&str; 5] = ["index", "store", "show", "update", "destroy"];

/// Options accepted by `Router::resource`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResourceOptions {
    pub only: Vec<String>,
    pub except: Vec<String>,
    /// Route name per action, replacing `<resource>.<action>`.
    pub names: BTreeMap<String, String>,
    /// Parameter name per resource segment, replacing the singular.
    pub parameters: BTreeMap<String, String>,
    pub middleware: Vec<MiddlewareRef>,
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn only<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn except<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(mut self, action: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(action.into(), name.into());
        self
    }

    pub fn parameter(mut self, resource: impl Into<String>, parameter: impl Into<String>) -> Self {
        self.parameters.insert(resource.into(), parameter.into());
        self
    }

    pub fn middleware<I, R>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<MiddlewareRef>,
    {
        self.middleware.extend(middleware.into_iter().map(Into::into));
        self
    }

    fn includes(&self, action: &str) -> bool {
        if !self.only.is_empty() && !self.only.iter().any(|a| a == action) {
            return false;
        }
        !self.except.iter().any(|a| a == action)
    }
}

/// URI words used for the `create` and `edit` actions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResourceVerbs {
    pub create: String,
    pub edit: String,
}

impl Default for ResourceVerbs {
    fn default() -> Self {
        Self {
            create: "create".to_string(),
            edit: "edit".to_string(),
        }
    }
}

/// One expanded resource route, ready to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRoute {
    pub action: &'static str,
    pub methods: Vec<Method>,
    pub uri: String,
    pub uses: String,
    pub name: String,
}

/// Expand a resource into routes for the given action set.
pub fn expand(
    name: &str,
    controller: &str,
    options: &ResourceOptions,
    verbs: &ResourceVerbs,
    actions: &[&'static str],
) -> Vec<ResourceRoute> {
    let (prefix, resource) = match name.trim_matches('/').rsplit_once('/') {
        Some((prefix, resource)) => (prefix, resource),
        None => ("", name.trim_matches('/')),
    };

    let mut segments: Vec<&str> = resource.split('.').collect();
    let last = segments.pop().unwrap_or_default();
    let parameter = |segment: &str| {
        options
            .parameters
            .get(segment)
            .cloned()
            .unwrap_or_else(|| singular(segment).replace('-', "_"))
    };

    let mut parts: Vec<String> = Vec::new();
    if !prefix.is_empty() {
        parts.push(prefix.to_string());
    }
    for segment in &segments {
        parts.push(format!("{segment}/{{{}}}", parameter(segment)));
    }
    parts.push(last.to_string());
    let base = parts.join("/");
    let member = format!("{base}/{{{}}}", parameter(last));

    actions
        .iter()
        .copied()
        .filter(|action| options.includes(action))
        .filter_map(|action| {
            let (methods, uri) = match action {
                "index" => (vec![Method::GET], base.clone()),
                "create" => (vec![Method::GET], format!("{base}/{}", verbs.create)),
                "store" => (vec![Method::POST], base.clone()),
                "show" => (vec![Method::GET], member.clone()),
                "edit" => (vec![Method::GET], format!("{member}/{}", verbs.edit)),
                "update" => (vec![Method::PUT, Method::PATCH], member.clone()),
                "destroy" => (vec![Method::DELETE], member.clone()),
                _ => return None,
            };
            let name = options
                .names
                .get(action)
                .cloned()
                .unwrap_or_else(|| format!("{resource}.{action}"));
            Some(ResourceRoute {
                action,
                methods,
                uri,
                uses: format!("{controller}@{action}"),
                name,
            })
        })
        .collect()
}

/// English singular of a resource segment, for the common plural forms.
///
/// Words outside the suffix rules keep a wrong guess; override them with
/// [`ResourceOptions::parameter`].
pub fn singular(word: &str) -> String {
    const UNCOUNTABLE: [&str; 8] = ["news", "series", "species", "sheep", "fish", "equipment", "information", "media"];
    if UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }

    const IRREGULAR: [(&str, &str); 6] = [
        ("people", "person"),
        ("children", "child"),
        ("men", "man"),
        ("women", "woman"),
        ("mice", "mouse"),
        ("data", "datum"),
    ];
    if let Some((_, single)) = IRREGULAR.iter().find(|(plural, _)| *plural == word) {
        return single.to_string();
    }

    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.ends_with('s') && !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

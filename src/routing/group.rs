//! Route group attributes and their merge rules.
//!
//! # Design Decisions
//! - A nested group is merged with its parent when pushed, so the top of
//!   the group stack always holds the full effective attributes
//! - Child scalars win, except `prefix` (joined with `/`), `namespace`
//!   (joined with `::` unless absolute) and `name` (concatenated)
//! - `middleware` and `where` accumulate parent first

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::routing::action::NAMESPACE_SEPARATOR;
use crate::routing::middleware::MiddlewareRef;

/// Attributes shared by every route registered inside a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GroupAttributes {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub domain: Option<String>,
    pub middleware: Vec<MiddlewareRef>,
    #[serde(rename = "where")]
    pub wheres: BTreeMap<String, String>,
    /// Name prefix (`as`).
    #[serde(rename = "as")]
    pub name: Option<String>,
}

impl GroupAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
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

    pub fn where_(mut self, parameter: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.wheres.insert(parameter.into(), pattern.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Merge `child` into these (parent) attributes.
    pub fn merge(&self, child: &GroupAttributes) -> GroupAttributes {
        let name = match (&self.name, &child.name) {
            (Some(outer), Some(inner)) => Some(format!("{outer}{inner}")),
            (outer, inner) => inner.clone().or_else(|| outer.clone()),
        };

        let prefix = match &child.prefix {
            Some(inner) => Some(Self::join_prefix(self.prefix.as_deref(), inner)),
            None => self.prefix.clone(),
        };

        let mut wheres = self.wheres.clone();
        wheres.extend(child.wheres.clone());

        let mut middleware = self.middleware.clone();
        middleware.extend(child.middleware.iter().cloned());

        GroupAttributes {
            prefix,
            namespace: Self::join_namespace(self.namespace.as_deref(), child.namespace.as_deref()),
            domain: child.domain.clone().or_else(|| self.domain.clone()),
            middleware,
            wheres,
            name,
        }
    }

    /// `outer/inner` with each side trimmed of slashes.
    pub(crate) fn join_prefix(outer: Option<&str>, inner: &str) -> String {
        let outer = outer.unwrap_or_default().trim_matches('/');
        let inner = inner.trim_matches('/');
        format!("{outer}/{inner}")
    }

    /// `outer::inner`, or `inner` alone when it is absolute or there is no
    /// outer namespace.
    pub(crate) fn join_namespace(outer: Option<&str>, inner: Option<&str>) -> Option<String> {
        let trim = |ns: &str| ns.trim_matches(|c| c == ':').to_string();
        match (outer, inner) {
            (Some(outer), Some(inner)) if !inner.starts_with(NAMESPACE_SEPARATOR) => {
                Some(format!("{}{NAMESPACE_SEPARATOR}{}", trim(outer), trim(inner)))
            }
            (_, Some(inner)) => Some(trim(inner)),
            (outer, None) => outer.map(str::to_string),
        }
    }
}

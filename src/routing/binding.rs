//! Route-model binding.
//!
//! # Responsibilities
//! - Store explicit binders (`Router::bind`) and implicit resolvers
//!   (`Router::model`) keyed by parameter name
//! - Substitute bound objects into a request's parameters
//!
//! # Design Decisions
//! - Explicit binders run first; implicit resolvers skip any parameter that
//!   has an explicit binder
//! - Null parameters (absent optionals) are never bound
//! - A resolver that finds nothing fails with `Error::Binding` (404)
//! - Tables are concurrent maps so binders can be added through a shared
//!   router

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::routing::parameters::Bound;
use crate::routing::{Parameters, Route};

/// Explicit binder: raw value (and the matched route) to bound object.
pub type Binder = Arc<dyn Fn(&str, &Route) -> Result<Bound> + Send + Sync>;

/// Resolves a raw parameter value into a domain object.
#[async_trait]
pub trait BindingResolver: Send + Sync {
    /// `Ok(None)` when no object matches the value.
    async fn resolve(&self, key: &str, value: &str) -> Result<Option<Bound>>;
}

#[derive(Default)]
pub struct BindingRegistry {
    explicit: DashMap<String, Binder>,
    implicit: DashMap<String, Arc<dyn BindingResolver>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, key: impl Into<String>, binder: Binder) {
        self.explicit.insert(key.into(), binder);
    }

    pub fn model(&self, key: impl Into<String>, resolver: Arc<dyn BindingResolver>) {
        self.implicit.insert(key.into(), resolver);
    }

    pub fn binder(&self, key: &str) -> Option<Binder> {
        self.explicit.get(key).map(|b| b.value().clone())
    }

    pub fn has_binder(&self, key: &str) -> bool {
        self.explicit.contains_key(key)
    }

    pub fn has_resolver(&self, key: &str) -> bool {
        self.implicit.contains_key(key)
    }

    /// Bind every non-null parameter that has a binder or resolver.
    pub async fn substitute(&self, route: &Route, parameters: &mut Parameters) -> Result<()> {
        let values: Vec<(String, String)> = parameters
            .without_nulls()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        for (key, value) in &values {
            if let Some(binder) = self.binder(key) {
                let bound = binder(value, route)?;
                parameters.bind(key.clone(), bound);
            }
        }

        for (key, value) in &values {
            if self.has_binder(key) {
                continue;
            }
            let Some(resolver) = self.implicit.get(key).map(|r| r.value().clone()) else {
                continue;
            };
            match resolver.resolve(key, value).await? {
                Some(bound) => parameters.bind(key.clone(), bound),
                None => {
                    tracing::debug!(parameter = %key, value = %value, "no model matches route parameter");
                    return Err(Error::Binding {
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let explicit: Vec<String> = self.explicit.iter().map(|e| e.key().clone()).collect();
        let implicit: Vec<String> = self.implicit.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("BindingRegistry")
            .field("explicit", &explicit)
            .field("implicit", &implicit)
            .finish()
    }
}

//! Route parameters bound to one request.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

/// A domain object produced by route-model binding.
pub type Bound = Arc<dyn Any + Send + Sync>;

/// Ordered route parameters.
///
/// Raw values keep their declaration order; a missing optional parameter is
/// stored as `None`. Binding attaches a resolved object next to the raw
/// value without replacing it.
#[derive(Clone, Default)]
pub struct Parameters {
    values: Vec<(String, Option<String>)>,
    bound: HashMap<String, Bound>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs, keeping their order.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        let mut params = Self::new();
        for (name, value) in pairs {
            params.set(name, value);
        }
        params
    }

    /// Raw value of a parameter. `None` if absent or null.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Whether the parameter exists, even with a null value.
    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|(n, _)| n == name)
    }

    /// Set a raw value, replacing any earlier value in place.
    pub fn set(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// Remove a parameter and any object bound to it.
    pub fn forget(&mut self, name: &str) {
        self.values.retain(|(n, _)| n != name);
        self.bound.remove(name);
    }

    /// Parameter names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    /// `(name, value)` pairs in order, nulls included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    /// `(name, value)` pairs in order, nulls skipped.
    pub fn without_nulls(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .filter_map(|(n, v)| v.as_deref().map(|v| (n.as_str(), v)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Attach a resolved object to a parameter.
    pub fn bind(&mut self, name: impl Into<String>, object: Bound) {
        self.bound.insert(name.into(), object);
    }

    /// Resolved object for a parameter, if it was bound to a `T`.
    pub fn bound<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.bound
            .get(name)
            .cloned()
            .and_then(|b| b.downcast::<T>().ok())
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bound.contains_key(name)
    }

    /// Raw values as a JSON object (nulls preserved).
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .map(|(n, v)| {
                let value = v.clone().map(Value::String).unwrap_or(Value::Null);
                (n.clone(), value)
            })
            .collect();
        Value::Object(map)
    }
}

impl fmt::Debug for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameters")
            .field("values", &self.values)
            .field("bound", &self.bound.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct User {
        id: u32,
    }

    #[test]
    fn test_order_and_nulls() {
        let mut params = Parameters::from_pairs([
            ("id", Some("5".to_string())),
            ("age", None),
        ]);
        assert_eq!(params.get("id"), Some("5"));
        assert_eq!(params.get("age"), None);
        assert!(params.contains("age"));
        assert_eq!(params.names().collect::<Vec<_>>(), vec!["id", "age"]);
        assert_eq!(params.without_nulls().count(), 1);

        params.set("id", Some("6".into()));
        assert_eq!(params.names().collect::<Vec<_>>(), vec!["id", "age"]);
        assert_eq!(params.get("id"), Some("6"));

        assert_eq!(params.to_json(), serde_json::json!({"id": "6", "age": null}));
    }

    #[test]
    fn test_bound_objects() {
        let mut params = Parameters::from_pairs([("user", Some("7".to_string()))]);
        params.bind("user", Arc::new(User { id: 7 }));

        assert!(params.is_bound("user"));
        assert_eq!(params.bound::<User>("user"), Some(Arc::new(User { id: 7 })));
        assert!(params.bound::<String>("user").is_none());
        // Raw value survives binding.
        assert_eq!(params.get("user"), Some("7"));

        params.forget("user");
        assert!(!params.contains("user"));
        assert!(!params.is_bound("user"));
    }
}

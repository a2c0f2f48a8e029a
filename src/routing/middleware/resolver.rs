//! Middleware name resolution.
//!
//! # Responsibilities
//! - Expand middleware group names into their (flattened) members
//! - Map aliases to concrete middleware identifiers
//! - Pass unknown names through untouched
//!
//! # Design Decisions
//! - Group lookup uses the full reference, so `web:x` is never a group
//! - Parameters survive aliasing (`auth:api` -> `authenticate:api`)
//! - A group that includes itself is expanded once and the cycle skipped

use std::collections::HashMap;

use super::MiddlewareRef;

/// Resolves references against alias and group tables.
#[derive(Debug, Clone, Copy)]
pub struct MiddlewareNameResolver<'a> {
    aliases: &'a HashMap<String, String>,
    groups: &'a HashMap<String, Vec<MiddlewareRef>>,
}

impl<'a> MiddlewareNameResolver<'a> {
    pub fn new(
        aliases: &'a HashMap<String, String>,
        groups: &'a HashMap<String, Vec<MiddlewareRef>>,
    ) -> Self {
        Self { aliases, groups }
    }

    /// Resolve one reference into zero or more concrete references.
    pub fn resolve(&self, reference: &MiddlewareRef) -> Vec<MiddlewareRef> {
        let mut resolved = Vec::new();
        let mut expanding = Vec::new();
        self.resolve_into(reference, &mut expanding, &mut resolved);
        resolved
    }

    /// Resolve a list of references, flattening groups in place.
    pub fn resolve_all<'r, I>(&self, references: I) -> Vec<MiddlewareRef>
    where
        I: IntoIterator<Item = &'r MiddlewareRef>,
    {
        references
            .into_iter()
            .flat_map(|r| self.resolve(r))
            .collect()
    }

    fn resolve_into(
        &self,
        reference: &MiddlewareRef,
        expanding: &mut Vec<String>,
        out: &mut Vec<MiddlewareRef>,
    ) {
        let key = reference.to_string();

        if let Some(members) = self.groups.get(&key) {
            if expanding.contains(&key) {
                tracing::warn!(group = %key, "middleware group includes itself, skipping");
                return;
            }
            expanding.push(key);
            for member in members {
                self.resolve_into(member, expanding, out);
            }
            expanding.pop();
            return;
        }

        match self.aliases.get(reference.name()) {
            Some(target) => out.push(reference.renamed(target.clone())),
            None => out.push(reference.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> (HashMap<String, String>, HashMap<String, Vec<MiddlewareRef>>) {
        let aliases = HashMap::from([
            ("auth".to_string(), "authenticate".to_string()),
            ("bindings".to_string(), "substitute_bindings".to_string()),
        ]);
        let groups = HashMap::from([
            (
                "web".to_string(),
                vec![MiddlewareRef::from("start_session"), MiddlewareRef::from("bindings")],
            ),
            (
                "admin".to_string(),
                vec![MiddlewareRef::from("web"), MiddlewareRef::from("auth:admin")],
            ),
        ]);
        (aliases, groups)
    }

    fn names(refs: &[MiddlewareRef]) -> Vec<String> {
        refs.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_alias_keeps_parameters() {
        let (aliases, groups) = tables();
        let resolver = MiddlewareNameResolver::new(&aliases, &groups);
        let out = resolver.resolve(&"auth:api".into());
        assert_eq!(names(&out), vec!["authenticate:api"]);
    }

    #[test]
    fn test_unknown_passes_through() {
        let (aliases, groups) = tables();
        let resolver = MiddlewareNameResolver::new(&aliases, &groups);
        let out = resolver.resolve(&"app::middleware::Custom".into());
        assert_eq!(names(&out), vec!["app::middleware::Custom"]);
    }

    #[test]
    fn test_nested_groups_flatten() {
        let (aliases, groups) = tables();
        let resolver = MiddlewareNameResolver::new(&aliases, &groups);
        let out = resolver.resolve(&"admin".into());
        assert_eq!(
            names(&out),
            vec!["start_session", "substitute_bindings", "authenticate:admin"]
        );
    }

    #[test]
    fn test_group_with_parameters_is_not_a_group() {
        let (aliases, groups) = tables();
        let resolver = MiddlewareNameResolver::new(&aliases, &groups);
        let out = resolver.resolve(&"web:x".into());
        assert_eq!(names(&out), vec!["web:x"]);
    }

    #[test]
    fn test_self_referencing_group_terminates() {
        let aliases = HashMap::new();
        let groups = HashMap::from([
            ("a".to_string(), vec![MiddlewareRef::from("b"), MiddlewareRef::from("one")]),
            ("b".to_string(), vec![MiddlewareRef::from("a"), MiddlewareRef::from("two")]),
        ]);
        let resolver = MiddlewareNameResolver::new(&aliases, &groups);
        let out = resolver.resolve(&"a".into());
        assert_eq!(names(&out), vec!["two", "one"]);
    }
}

//! Priority ordering for resolved middleware.
//!
//! # Design Decisions
//! - Whenever a higher-priority middleware follows a lower-priority one, it
//!   is moved in front of the last priority middleware seen; the scan then
//!   restarts
//! - The number of moves is bounded so contradictory priority lists (for
//!   example the same name listed twice) cannot loop; the order reached at
//!   the bound is kept as is
//! - Exact duplicates (same name and parameters) are removed afterwards,
//!   keeping the first occurrence

use super::MiddlewareRef;

/// Sort middleware so that every pair present in `priority` runs in
/// priority order. Middleware not in `priority` keep their relative order.
pub fn sort_middleware(priority: &[String], middleware: Vec<MiddlewareRef>) -> Vec<MiddlewareRef> {
    let mut items = middleware;
    let bound = items.len() * items.len() + 1;

    for _ in 0..bound {
        match first_inversion(priority, &items) {
            Some((from, to)) => {
                let item = items.remove(from);
                items.insert(to, item);
            }
            None => return dedup(items),
        }
    }

    tracing::warn!(
        middleware = ?items.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "middleware priority could not be fully resolved"
    );
    dedup(items)
}

/// `(from, to)`: the middleware at `from` must move to `to`.
fn first_inversion(priority: &[String], items: &[MiddlewareRef]) -> Option<(usize, usize)> {
    let mut last: Option<(usize, usize)> = None;

    for (index, item) in items.iter().enumerate() {
        let Some(rank) = priority.iter().position(|p| p == item.name()) else {
            continue;
        };
        if let Some((last_index, last_rank)) = last {
            if rank < last_rank {
                return Some((index, last_index));
            }
        }
        last = Some((index, rank));
    }

    None
}

fn dedup(items: Vec<MiddlewareRef>) -> Vec<MiddlewareRef> {
    let mut unique: Vec<MiddlewareRef> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priority() -> Vec<String> {
        ["start_session", "authenticate", "substitute_bindings", "authorize"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn refs(names: &[&str]) -> Vec<MiddlewareRef> {
        names.iter().map(|n| MiddlewareRef::parse(n)).collect()
    }

    fn position(items: &[MiddlewareRef], name: &str) -> usize {
        items
            .iter()
            .position(|m| m.name() == name)
            .expect("middleware present")
    }

    #[test]
    fn test_pairwise_priority_holds() {
        let sorted = sort_middleware(
            &priority(),
            refs(&["authorize:edit", "custom", "substitute_bindings", "authenticate", "start_session"]),
        );
        assert!(position(&sorted, "start_session") < position(&sorted, "authenticate"));
        assert!(position(&sorted, "authenticate") < position(&sorted, "substitute_bindings"));
        assert!(position(&sorted, "substitute_bindings") < position(&sorted, "authorize"));
        assert_eq!(sorted.len(), 5);
    }

    #[test]
    fn test_already_ordered_is_untouched() {
        let input = refs(&["a", "start_session", "b", "authenticate", "c"]);
        assert_eq!(sort_middleware(&priority(), input.clone()), input);
    }

    #[test]
    fn test_unlisted_keep_relative_order() {
        let sorted = sort_middleware(&priority(), refs(&["x", "authenticate", "y", "start_session", "z"]));
        let unlisted: Vec<_> = sorted
            .iter()
            .filter(|m| ["x", "y", "z"].contains(&m.name()))
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(unlisted, vec!["x", "y", "z"]);
        assert!(position(&sorted, "start_session") < position(&sorted, "authenticate"));
    }

    #[test]
    fn test_duplicates_removed() {
        let sorted = sort_middleware(&priority(), refs(&["a", "authenticate", "a", "b:1", "b:1", "b:2"]));
        let names: Vec<_> = sorted.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["a", "authenticate", "b:1", "b:2"]);
    }

    #[test]
    fn test_repeated_priority_entries() {
        let repeated: Vec<String> = ["a", "b", "a"].iter().map(|s| s.to_string()).collect();
        let sorted = sort_middleware(&repeated, refs(&["b", "a", "b", "a"]));
        assert_eq!(sorted.len(), 2);
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, body limit > 0, addresses parse)
//! - Check that global patterns compile
//! - Detect middleware groups that contain themselves
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: KernelConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::KernelConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &KernelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::new("limits.max_body_size", "must be greater than zero"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    for (key, pattern) in &config.routing.patterns {
        if let Err(e) = regex::Regex::new(&format!("^(?:{pattern})$")) {
            errors.push(ValidationError::new(format!("routing.patterns.{key}"), e.to_string()));
        }
    }

    let middleware = &config.middleware;
    for (i, name) in middleware.global.iter().enumerate() {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(format!("middleware.global[{i}]"), "empty middleware name"));
        }
    }
    for (alias, target) in &middleware.aliases {
        if target.trim().is_empty() {
            errors.push(ValidationError::new(format!("middleware.aliases.{alias}"), "empty alias target"));
        }
    }
    for (group, members) in &middleware.groups {
        if members.iter().any(|m| m.trim().is_empty()) {
            errors.push(ValidationError::new(format!("middleware.groups.{group}"), "empty middleware name"));
        }
    }
    for group in cyclic_groups(&middleware.groups) {
        errors.push(ValidationError::new(
            format!("middleware.groups.{group}"),
            "group contains itself",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Groups that reach themselves through their members.
fn cyclic_groups(groups: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    fn member_name(member: &str) -> &str {
        member.split(':').next().unwrap_or(member)
    }

    fn reaches(
        groups: &BTreeMap<String, Vec<String>>,
        current: &str,
        target: &str,
        seen: &mut HashSet<String>,
    ) -> bool {
        let Some(members) = groups.get(current) else {
            return false;
        };
        members.iter().map(|m| member_name(m)).any(|member| {
            if member == target {
                return true;
            }
            seen.insert(member.to_string()) && reaches(groups, member, target, seen)
        })
    }

    groups
        .keys()
        .filter(|group| reaches(groups, group, group, &mut HashSet::new()))
        .cloned()
        .collect()
}

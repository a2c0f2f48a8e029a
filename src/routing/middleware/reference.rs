//! Parsed middleware references (`name[:param1,param2]`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A middleware name plus its ordered parameters.
///
/// Parsed once from `name:a,b`; everything before the first `:` is the
/// name, the rest is split on `,`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MiddlewareRef {
    name: String,
    parameters: Vec<String>,
}

impl MiddlewareRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters<I, S>(name: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parse(reference: &str) -> Self {
        match reference.split_once(':') {
            Some((name, params)) => Self {
                name: name.to_string(),
                parameters: params.split(',').map(str::to_string).collect(),
            },
            None => Self::new(reference),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// Same parameters under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: self.parameters.clone(),
        }
    }
}

impl fmt::Display for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parameters.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}:{}", self.name, self.parameters.join(","))
        }
    }
}

impl FromStr for MiddlewareRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for MiddlewareRef {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for MiddlewareRef {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&String> for MiddlewareRef {
    fn from(s: &String) -> Self {
        Self::parse(s)
    }
}

impl From<MiddlewareRef> for String {
    fn from(r: MiddlewareRef) -> Self {
        r.to_string()
    }
}

//! URI template compilation.
//!
//! # Responsibilities
//! - Extract optional placeholders (`{name?}`) from a route URI
//! - Tokenize path and host templates into literal text and variables
//! - Build one anchored regex per template with a named group per variable
//!
//! # Design Decisions
//! - Compilation never errors: malformed templates produce a route that
//!   can never match
//! - Trailing optional variables nest, so `a/{b?}/{c?}` accepts `a`, `a/1`
//!   and `a/1/2` but never `a//2`
//! - Host regexes are case-insensitive, path regexes are not

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

static OPTIONAL_PARAMETER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+?)\?\}").expect("optional parameter regex"));

static VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("variable regex"));

/// Characters that split a template into segments.
const SEPARATORS: &str = "/,;.:-_~+*=@|";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Variable {
        prefix: String,
        name: String,
        pattern: String,
    },
}

/// Regex-backed matcher for one route.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    path_regex: Option<Regex>,
    host_regex: Option<Regex>,
    has_host: bool,
    path_variables: Vec<String>,
    host_variables: Vec<String>,
    optional: HashSet<String>,
}

impl CompiledRoute {
    /// Compile a route URI and optional domain.
    ///
    /// `wheres` maps variable names to constraint patterns; anchors (`^`, `$`)
    /// on a constraint are ignored.
    pub fn compile(uri: &str, domain: Option<&str>, wheres: &BTreeMap<String, String>) -> Self {
        let optional = optional_parameters(uri);
        let path = format!("/{}", OPTIONAL_PARAMETER.replace_all(uri, "{$1}").trim_start_matches('/'));

        let (path_regex, path_variables) = match compile_pattern(&path, false, wheres, &optional) {
            Some((regex, variables)) => (Some(regex), variables),
            None => {
                tracing::warn!(uri = %uri, "route URI does not compile, route will never match");
                (None, Vec::new())
            }
        };

        let domain = domain.filter(|d| !d.is_empty());
        let (host_regex, host_variables) = match domain {
            Some(domain) => match compile_pattern(domain, true, wheres, &HashSet::new()) {
                Some((regex, variables)) => (Some(regex), variables),
                None => {
                    tracing::warn!(domain = %domain, "route domain does not compile, route will never match");
                    (None, Vec::new())
                }
            },
            None => (None, Vec::new()),
        };

        Self {
            path_regex,
            host_regex,
            has_host: domain.is_some(),
            path_variables,
            host_variables,
            optional,
        }
    }

    /// Returns true if the path (leading `/`, decoded) is accepted.
    pub fn matches_path(&self, path: &str) -> bool {
        self.path_regex.as_ref().is_some_and(|r| r.is_match(path))
    }

    /// Returns true if the host is accepted. Routes without a domain accept
    /// every host.
    pub fn matches_host(&self, host: &str) -> bool {
        if !self.has_host {
            return true;
        }
        self.host_regex.as_ref().is_some_and(|r| r.is_match(host))
    }

    /// Whether this route was registered with a domain.
    pub fn has_host(&self) -> bool {
        self.has_host
    }

    /// Whether the named variable was declared with `?`.
    pub fn is_optional(&self, name: &str) -> bool {
        self.optional.contains(name)
    }

    /// Variable names in declaration order, host variables first.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.host_variables
            .iter()
            .chain(self.path_variables.iter())
            .map(String::as_str)
    }

    /// Capture variable values from a host and path.
    ///
    /// Empty captures are reported as `None`. A path capture wins over a host
    /// capture of the same name.
    pub fn captures(&self, host: &str, path: &str) -> BTreeMap<String, Option<String>> {
        let mut values = BTreeMap::new();

        if let Some(caps) = self.host_regex.as_ref().and_then(|r| r.captures(host)) {
            for name in &self.host_variables {
                values.insert(name.clone(), non_empty(caps.name(name).map(|m| m.as_str())));
            }
        }

        if let Some(caps) = self.path_regex.as_ref().and_then(|r| r.captures(path)) {
            for name in &self.path_variables {
                let value = non_empty(caps.name(name).map(|m| m.as_str()));
                if value.is_some() || !values.contains_key(name) {
                    values.insert(name.clone(), value);
                }
            }
        }

        values
    }

    /// The compiled path regex, if the URI was well formed.
    pub fn path_regex(&self) -> Option<&Regex> {
        self.path_regex.as_ref()
    }

    /// The compiled host regex, if the route has a well-formed domain.
    pub fn host_regex(&self) -> Option<&Regex> {
        self.host_regex.as_ref()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

fn optional_parameters(uri: &str) -> HashSet<String> {
    OPTIONAL_PARAMETER
        .captures_iter(uri)
        .map(|c| c[1].to_string())
        .collect()
}

/// Strip a leading `^` and an unescaped trailing `$` from a constraint.
fn sanitize_requirement(pattern: &str) -> &str {
    let pattern = pattern.strip_prefix('^').unwrap_or(pattern);
    match pattern.strip_suffix('$') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => pattern,
    }
}

/// First separator that follows a variable, ignoring adjacent variables.
fn next_separator(following: &str) -> Option<char> {
    let stripped = VARIABLE.replace_all(following, "");
    stripped.chars().next().filter(|c| SEPARATORS.contains(*c))
}

fn tokenize(
    pattern: &str,
    is_host: bool,
    wheres: &BTreeMap<String, String>,
) -> Option<(Vec<Token>, Vec<String>)> {
    let default_separator = if is_host { '.' } else { '/' };
    let mut tokens = Vec::new();
    let mut variables: Vec<String> = Vec::new();
    let mut pos = 0;

    for caps in VARIABLE.captures_iter(pattern) {
        let whole = caps.get(0)?;
        let name = caps[1].to_string();
        let preceding = &pattern[pos..whole.start()];
        pos = whole.end();

        if name.starts_with(|c: char| c.is_ascii_digit()) || variables.contains(&name) {
            return None;
        }

        let separator = preceding
            .chars()
            .last()
            .filter(|c| SEPARATORS.contains(*c));
        let text = match separator {
            Some(sep) => &preceding[..preceding.len() - sep.len_utf8()],
            None => preceding,
        };
        if !text.is_empty() {
            tokens.push(Token::Text(text.to_string()));
        }

        let variable_pattern = match wheres.get(&name) {
            Some(requirement) => sanitize_requirement(requirement).to_string(),
            None => {
                let mut class = regex::escape(&default_separator.to_string());
                if let Some(next) = next_separator(&pattern[pos..]) {
                    if next != default_separator {
                        class.push_str(&regex::escape(&next.to_string()));
                    }
                }
                format!("[^{class}]+")
            }
        };

        tokens.push(Token::Variable {
            prefix: separator.map(String::from).unwrap_or_default(),
            name: name.clone(),
            pattern: variable_pattern,
        });
        variables.push(name);
    }

    if pos < pattern.len() {
        tokens.push(Token::Text(pattern[pos..].to_string()));
    }

    // Unmatched braces left in literal text.
    let unbalanced = tokens.iter().any(|t| match t {
        Token::Text(text) => text.contains('{') || text.contains('}'),
        Token::Variable { .. } => false,
    });
    if unbalanced {
        return None;
    }

    Some((tokens, variables))
}

fn compile_pattern(
    pattern: &str,
    is_host: bool,
    wheres: &BTreeMap<String, String>,
    optional: &HashSet<String>,
) -> Option<(Regex, Vec<String>)> {
    let (tokens, variables) = tokenize(pattern, is_host, wheres)?;

    let mut first_optional = usize::MAX;
    if !is_host {
        for (i, token) in tokens.iter().enumerate().rev() {
            match token {
                Token::Variable { name, .. } if optional.contains(name) => first_optional = i,
                _ => break,
            }
        }
    }

    let body: String = (0..tokens.len())
        .map(|i| token_regex(&tokens, i, first_optional))
        .collect();
    let flags = if is_host { "(?i)" } else { "(?s)" };

    let regex = Regex::new(&format!("{flags}^{body}$")).ok()?;
    Some((regex, variables))
}

fn token_regex(tokens: &[Token], index: usize, first_optional: usize) -> String {
    match &tokens[index] {
        Token::Text(text) => regex::escape(text),
        Token::Variable {
            prefix,
            name,
            pattern,
        } => {
            let prefix = regex::escape(prefix);
            if index == 0 && first_optional == 0 {
                // A lone optional variable keeps its separator mandatory.
                return format!("{prefix}(?P<{name}>{pattern})?");
            }

            let mut regex = format!("{prefix}(?P<{name}>{pattern})");
            if index >= first_optional {
                regex = format!("(?:{regex}");
                if index == tokens.len() - 1 {
                    let closing = tokens.len() - first_optional - usize::from(first_optional == 0);
                    regex.push_str(&")?".repeat(closing));
                }
            }
            regex
        }
    }
}

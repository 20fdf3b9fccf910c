//! Leaf filtering by name substring and path regex.

use regex::Regex;

use crate::secrets::{Result, SecretsError};

/// Immutable filter applied to every discovered secret.
///
/// With neither criterion set every secret matches. With both set a secret
/// matches when either one does.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Lowercased substring matched against the last path segment.
    name_part: Option<String>,
    /// Pattern matched against the full logical path.
    matcher: Option<Regex>,
}

impl Filter {
    /// Filter that accepts everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a filter from raw CLI-style inputs; blank inputs are unset.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::Config`] if `pattern` is not a valid regex
    pub fn from_parts(name_part: Option<&str>, pattern: Option<&str>) -> Result<Self> {
        let matcher = match pattern.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => Some(Regex::new(p).map_err(|e| {
                SecretsError::config_error(format!("invalid --match pattern '{}': {}", p, e))
            })?),
            None => None,
        };
        let filter = Self { name_part: None, matcher };
        Ok(match name_part {
            Some(name) => filter.with_name_part(name),
            None => filter,
        })
    }

    /// Case-insensitive substring required in the secret's name.
    pub fn with_name_part(mut self, name_part: &str) -> Self {
        self.name_part = (!name_part.is_empty()).then(|| name_part.to_lowercase());
        self
    }

    /// Regex required to match the secret's full path.
    pub fn with_matcher(mut self, matcher: Regex) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name_part.is_none() && self.matcher.is_none()
    }

    /// Decides whether the secret named `base_name` at `full_path` is kept.
    pub fn matches(&self, base_name: &str, full_path: &str) -> bool {
        match (&self.name_part, &self.matcher) {
            (None, None) => true,
            (Some(part), None) => name_contains(base_name, part),
            (None, Some(re)) => re.is_match(full_path),
            (Some(part), Some(re)) => name_contains(base_name, part) || re.is_match(full_path),
        }
    }
}

fn name_contains(base_name: &str, lowered_part: &str) -> bool {
    base_name.to_lowercase().contains(lowered_part)
}

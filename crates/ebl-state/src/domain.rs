//! Resource domains and target parsing

use crate::error::StateError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two resource maps a key lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Path-addressed filesystem map
    Filesystem,
    /// Key-addressed database map
    Database,
}

impl Domain {
    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Database => "database",
        }
    }

    /// The opposite domain (sync destination)
    #[inline]
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Filesystem => Self::Database,
            Self::Database => Self::Filesystem,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `target_resource`
///
/// `fs:` / `db:` select the domain explicitly. Without a scheme a leading
/// `/` means filesystem and anything else means database. `*` in the
/// selector makes it a wildcard matching any run of characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    domain: Domain,
    selector: String,
}

impl Target {
    /// Parse a raw target string
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let (domain, selector) = if let Some(rest) = raw.strip_prefix("fs:") {
            (Domain::Filesystem, rest)
        } else if let Some(rest) = raw.strip_prefix("db:") {
            (Domain::Database, rest)
        } else if raw.starts_with('/') {
            (Domain::Filesystem, raw)
        } else {
            (Domain::Database, raw)
        };

        Self {
            domain,
            selector: selector.to_string(),
        }
    }

    /// Build a target in an explicit domain
    #[inline]
    #[must_use]
    pub fn in_domain(domain: Domain, selector: impl Into<String>) -> Self {
        Self {
            domain,
            selector: selector.into(),
        }
    }

    /// Domain the selector addresses
    #[inline]
    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Selector without any scheme prefix
    #[inline]
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Whether the selector contains a wildcard
    #[inline]
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.selector.contains('*')
    }

    /// Selector with a trailing `/` removed, used as a subtree root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &str {
        let trimmed = self.selector.trim_end_matches('/');
        if trimmed.is_empty() {
            &self.selector
        } else {
            trimmed
        }
    }

    /// Compile the wildcard selector into an anchored matcher
    pub(crate) fn matcher(&self) -> Result<Regex, StateError> {
        let body = self
            .selector
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        Regex::new(&format!("^{body}$"))
            .map_err(|e| StateError::invalid_pattern(self.selector.clone(), e))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain, self.selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_slash_is_filesystem() {
        let t = Target::parse("/data/a.json");
        assert_eq!(t.domain(), Domain::Filesystem);
        assert_eq!(t.selector(), "/data/a.json");
        assert!(!t.is_wildcard());
    }

    #[test]
    fn bare_key_is_database() {
        let t = Target::parse("user_record");
        assert_eq!(t.domain(), Domain::Database);
    }

    #[test]
    fn explicit_scheme_wins() {
        let t = Target::parse("db:/odd/key");
        assert_eq!(t.domain(), Domain::Database);
        assert_eq!(t.selector(), "/odd/key");

        let t = Target::parse("fs:relative.txt");
        assert_eq!(t.domain(), Domain::Filesystem);
        assert_eq!(t.selector(), "relative.txt");
    }

    #[test]
    fn wildcard_matcher_is_anchored() {
        let t = Target::parse("/data/*.json");
        let re = t.matcher().unwrap();
        assert!(re.is_match("/data/a.json"));
        assert!(re.is_match("/data/nested/b.json"));
        assert!(!re.is_match("/data/a.json.bak"));
        assert!(!re.is_match("/other/data/a.json"));
    }

    #[test]
    fn matcher_escapes_regex_syntax() {
        let t = Target::parse("/logs/app.(1)*");
        let re = t.matcher().unwrap();
        assert!(re.is_match("/logs/app.(1).gz"));
        assert!(!re.is_match("/logs/appX(1).gz"));
    }

    #[test]
    fn root_strips_trailing_slash() {
        assert_eq!(Target::parse("/logs/").root(), "/logs");
        assert_eq!(Target::parse("/").root(), "/");
    }

    #[test]
    fn domain_other() {
        assert_eq!(Domain::Filesystem.other(), Domain::Database);
        assert_eq!(Domain::Database.other(), Domain::Filesystem);
    }
}

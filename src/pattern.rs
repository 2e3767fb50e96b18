//! Name pattern matching for topics and consumer groups
//!
//! A declared name is resolved against the live names on the cluster in one
//! of three ways: exact equality, literal prefix, or unanchored regular
//! expression search.

use crate::error::{OpsError, Result};
use regex::Regex;
use std::fmt;

/// Names starting with this marker are broker-internal
pub const INTERNAL_PREFIX: &str = "__";

/// Returns true for broker-internal names such as `__consumer_offsets`
pub fn is_internal(name: &str) -> bool {
    name.starts_with(INTERNAL_PREFIX)
}

/// How a declared name selects live names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NamePattern {
    #[default]
    Literal,
    Prefixed,
    Match,
}

impl NamePattern {
    pub const ALL: [NamePattern; 3] = [NamePattern::Literal, NamePattern::Prefixed, NamePattern::Match];

    /// Parse a pattern type, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "literal" => Some(NamePattern::Literal),
            "prefixed" => Some(NamePattern::Prefixed),
            "match" => Some(NamePattern::Match),
            _ => None,
        }
    }

    /// Parse a pattern type, falling back to `Literal` for anything unrecognized
    pub fn normalize(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NamePattern::Literal => "literal",
            NamePattern::Prefixed => "prefixed",
            NamePattern::Match => "match",
        }
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled name pattern
#[derive(Debug, Clone)]
pub struct Matcher {
    name: String,
    kind: NamePattern,
    regex: Option<Regex>,
}

impl Matcher {
    /// Compile a matcher
    ///
    /// A malformed regular expression is reported as a configuration error.
    pub fn new(name: &str, kind: NamePattern) -> Result<Self> {
        let regex = match kind {
            NamePattern::Match => Some(Regex::new(name).map_err(|e| {
                OpsError::Config(format!("Invalid regular expression '{}': {}", name, e))
            })?),
            NamePattern::Literal | NamePattern::Prefixed => None,
        };

        Ok(Self {
            name: name.to_string(),
            kind,
            regex,
        })
    }

    pub fn kind(&self) -> NamePattern {
        self.kind
    }

    /// Test a single live name
    pub fn is_match(&self, candidate: &str) -> bool {
        match (&self.kind, &self.regex) {
            (NamePattern::Literal, _) => candidate == self.name,
            (NamePattern::Prefixed, _) => candidate.starts_with(&self.name),
            (NamePattern::Match, Some(re)) => re.is_match(candidate),
            (NamePattern::Match, None) => false,
        }
    }

    /// Select the matching names, preserving their order
    pub fn select<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter(|n| self.is_match(n))
            .cloned()
            .collect()
    }
}

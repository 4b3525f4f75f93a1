use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::DomainError;

const CACHE_PREFIX: &str = "cache+";

/// Where a rule list lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleLocation {
    Local(PathBuf),
    Remote(String),
}

/// A rule source descriptor. `cache+` sources hold a serialized bloom filter
/// instead of domain lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSource {
    pub location: RuleLocation,
    pub is_cache: bool,
}

impl FromStr for RuleSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (is_cache, rest) = match s.strip_prefix(CACHE_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        if rest.is_empty() {
            return Err(DomainError::RuleSource(format!(
                "empty rule source '{s}'"
            )));
        }

        let lower = rest.to_ascii_lowercase();
        let location = if lower.starts_with("http://") || lower.starts_with("https://") {
            RuleLocation::Remote(rest.to_string())
        } else if lower.contains("://") {
            return Err(DomainError::RuleSource(format!(
                "unsupported rule source scheme in '{s}'"
            )));
        } else {
            RuleLocation::Local(PathBuf::from(rest))
        };

        Ok(Self { location, is_cache })
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_cache {
            f.write_str(CACHE_PREFIX)?;
        }
        match &self.location {
            RuleLocation::Local(path) => write!(f, "{}", path.display()),
            RuleLocation::Remote(url) => f.write_str(url),
        }
    }
}

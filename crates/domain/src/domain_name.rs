use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 253;

/// Lower-cases a name and trims the trailing root dot.
///
/// This is the form used for membership set insertions and lookups.
pub fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Produces the wildcard forms of a name, walking outward from the root-most
/// label: `a.b.c` yields `*.c` then `*.b.c`. The name itself is never a
/// candidate.
pub fn wildcard_candidates(name: &str) -> Vec<String> {
    let name = name.trim_end_matches('.');
    if name.is_empty() {
        return Vec::new();
    }

    let labels: Vec<&str> = name.split('.').collect();
    let mut candidates = Vec::with_capacity(labels.len().saturating_sub(1));
    let mut suffix = String::with_capacity(name.len());

    for label in labels.iter().skip(1).rev() {
        if suffix.is_empty() {
            suffix.push_str(label);
        } else {
            suffix.insert(0, '.');
            suffix.insert_str(0, label);
        }
        candidates.push(format!("*.{suffix}"));
    }

    candidates
}

/// A fully qualified, lower-cased domain name held as labels, root-most last.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainName {
    labels: Vec<Box<str>>,
}

impl DomainName {
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    pub fn parse(name: &str) -> Result<Self, DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidDomainName("empty name".to_string()));
        }
        if trimmed == "." {
            return Ok(Self::root());
        }

        let body = trimmed.strip_suffix('.').unwrap_or(trimmed);
        if body.len() > MAX_NAME_LEN {
            return Err(DomainError::InvalidDomainName(format!(
                "{trimmed}: longer than {MAX_NAME_LEN} characters"
            )));
        }

        let mut labels = Vec::new();
        for label in body.split('.') {
            if label.is_empty() {
                return Err(DomainError::InvalidDomainName(format!(
                    "{trimmed}: empty label"
                )));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(DomainError::InvalidDomainName(format!(
                    "{trimmed}: label longer than {MAX_LABEL_LEN} characters"
                )));
            }
            if label.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(DomainError::InvalidDomainName(format!(
                    "{trimmed}: label contains whitespace"
                )));
            }
            labels.push(label.to_ascii_lowercase().into_boxed_str());
        }

        Ok(Self { labels })
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// True when `self` is `name` or one of its ancestors. The root zone
    /// contains every name.
    pub fn zone_of(&self, name: &DomainName) -> bool {
        if self.labels.len() > name.labels.len() {
            return false;
        }
        let offset = name.labels.len() - self.labels.len();
        self.labels[..] == name.labels[offset..]
    }
}

impl FromStr for DomainName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return f.write_str(".");
        }
        for label in &self.labels {
            write!(f, "{label}.")?;
        }
        Ok(())
    }
}

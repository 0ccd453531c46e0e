//! Tokenized versions and wildcard matching
//!
//! Versions are dot-separated numeric components with an optional `_`
//! qualifier (`7.0.40_0`). A trailing `+` component is a wildcard used in
//! version constraints (`5.2.+`).

use crate::error::ContainerError;
use crate::Result;
use std::cmp::Ordering;

/// Single component of a tokenized version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionComponent {
    /// A concrete numeric component
    Number(u64),
    /// `+`, matching any remainder
    Wildcard,
}

/// An ordered tuple of numeric/wildcard components plus an optional qualifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenizedVersion {
    raw: String,
    components: Vec<VersionComponent>,
    qualifier: Option<String>,
}

impl TokenizedVersion {
    /// Parse a version or version constraint.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = |reason: &str| ContainerError::InvalidVersion {
            version: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("empty version"));
        }

        let (main, qualifier) = match raw.split_once('_') {
            Some((_, "")) => return Err(invalid("empty qualifier")),
            Some((main, qualifier)) => (main, Some(qualifier.to_string())),
            None => (raw, None),
        };

        let mut components = Vec::new();
        let parts: Vec<&str> = main.split('.').collect();
        for (index, part) in parts.iter().enumerate() {
            let component = match *part {
                "+" if index == parts.len() - 1 => VersionComponent::Wildcard,
                "+" => return Err(invalid("wildcard must be the last component")),
                "" => return Err(invalid("empty version component")),
                digits => digits
                    .parse::<u64>()
                    .map(VersionComponent::Number)
                    .map_err(|_| invalid(&format!("non-numeric component '{digits}'")))?,
            };
            components.push(component);
        }

        if qualifier.is_some() && components.contains(&VersionComponent::Wildcard) {
            return Err(invalid("a wildcard version cannot carry a qualifier"));
        }

        Ok(TokenizedVersion {
            raw: raw.to_string(),
            components,
            qualifier,
        })
    }

    /// Version components in order
    pub fn components(&self) -> &[VersionComponent] {
        &self.components
    }

    /// Qualifier following `_`, if any
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Number of concrete numeric components
    pub fn numeric_component_count(&self) -> usize {
        self.components
            .iter()
            .filter(|c| matches!(c, VersionComponent::Number(_)))
            .count()
    }

    /// Whether this version is a constraint rather than a concrete version
    pub fn is_wildcard(&self) -> bool {
        self.components.contains(&VersionComponent::Wildcard)
    }

    /// Whether `candidate` satisfies this version used as a constraint.
    pub fn matches(&self, candidate: &TokenizedVersion) -> bool {
        for (index, component) in self.components.iter().enumerate() {
            match component {
                VersionComponent::Wildcard => return true,
                number => {
                    if candidate.components.get(index) != Some(number) {
                        return false;
                    }
                }
            }
        }
        self.components.len() == candidate.components.len() && self.qualifier == candidate.qualifier
    }
}

impl std::fmt::Display for TokenizedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl std::str::FromStr for TokenizedVersion {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self> {
        TokenizedVersion::parse(s)
    }
}

impl Ord for TokenizedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for index in 0..len {
            let ordering = match (self.components.get(index), other.components.get(index)) {
                (Some(a), Some(b)) => compare_components(a, b),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        self.qualifier.cmp(&other.qualifier)
    }
}

impl PartialOrd for TokenizedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_components(a: &VersionComponent, b: &VersionComponent) -> Ordering {
    match (a, b) {
        (VersionComponent::Number(a), VersionComponent::Number(b)) => a.cmp(b),
        (VersionComponent::Wildcard, VersionComponent::Wildcard) => Ordering::Equal,
        (VersionComponent::Wildcard, _) => Ordering::Greater,
        (_, VersionComponent::Wildcard) => Ordering::Less,
    }
}

/// Validator rejecting versions with more than `max` numeric components.
///
/// `label` names the artifact in the error message (`JOnAS`, `deployme`, ...).
pub fn max_numeric_components(
    label: &str,
    max: usize,
) -> impl Fn(&TokenizedVersion) -> Result<()> + '_ {
    move |version: &TokenizedVersion| {
        if version.numeric_component_count() > max {
            return Err(ContainerError::MalformedVersion {
                label: label.to_string(),
                version: version.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: &str) -> TokenizedVersion {
        TokenizedVersion::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_with_qualifier() {
        let version = v("7.0.40_0");
        assert_eq!(
            version.components(),
            &[
                VersionComponent::Number(7),
                VersionComponent::Number(0),
                VersionComponent::Number(40)
            ]
        );
        assert_eq!(version.qualifier(), Some("0"));
        assert_eq!(version.to_string(), "7.0.40_0");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TokenizedVersion::parse("").is_err());
        assert!(TokenizedVersion::parse("1..2").is_err());
        assert!(TokenizedVersion::parse("1.a.2").is_err());
        assert!(TokenizedVersion::parse("1.+.2").is_err());
        assert!(TokenizedVersion::parse("1.2_").is_err());
    }

    #[test]
    fn test_wildcard_matching() {
        let constraint = v("5.2.+");
        assert!(constraint.matches(&v("5.2.1")));
        assert!(constraint.matches(&v("5.2.4_RC1")));
        assert!(!constraint.matches(&v("5.3.0")));
        assert!(v("+").matches(&v("9.9.9")));
    }

    #[test]
    fn test_exact_matching() {
        assert!(v("5.2.1").matches(&v("5.2.1")));
        assert!(!v("5.2").matches(&v("5.2.1")));
        assert!(!v("5.2.1").matches(&v("5.2.1_1")));
    }

    #[test]
    fn test_ordering() {
        assert!(v("5.2.10") > v("5.2.9"));
        assert!(v("5.2.1") > v("5.2"));
        assert!(v("5.2.1_b") > v("5.2.1_a"));
        assert!(v("5.2.1_a") > v("5.2.1"));
    }

    #[test]
    fn test_max_numeric_components() {
        let validate = max_numeric_components("JOnAS", 3);
        assert!(validate(&v("5.2.1")).is_ok());
        assert!(validate(&v("7.0.40_0")).is_ok());

        let err = validate(&v("7.0.40.0")).unwrap_err();
        assert!(err.to_string().contains("Malformed JOnAS version 7.0.40.0"));
    }
}

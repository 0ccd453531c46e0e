//! Error types for jonas-core

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while detecting, compiling or releasing the container
#[derive(Error, Debug)]
pub enum ContainerError {
    /// Any failure while deciding whether the container applies
    #[error("JOnAS container error: {0}")]
    Applicability(#[source] Box<ContainerError>),

    /// Compile or release was requested for an application the container does not apply to
    #[error("JOnAS container does not apply to {}", app_dir.display())]
    NotApplicable { app_dir: PathBuf },

    /// A resolved version violates the runtime family's component rule
    #[error("Malformed {label} version {version}: too many version components")]
    MalformedVersion { label: String, version: String },

    /// A version string could not be tokenized
    #[error("Invalid version {version}: {reason}")]
    InvalidVersion { version: String, reason: String },

    /// No candidate in the repository index satisfies the constraint
    #[error("No version matching {constraint} in {repository_root}")]
    Resolution {
        constraint: String,
        repository_root: String,
    },

    /// Downloading or locating an artifact failed
    #[error("Failed to acquire {uri}: {reason}")]
    Acquisition { uri: String, reason: String },

    /// Extracting the runtime archive failed
    #[error("Failed to extract {}: {cause}", archive.display())]
    Extraction { archive: PathBuf, cause: String },

    /// Wiring the application into the provisioned tree failed
    #[error("Failed to wire {}: {reason}", path.display())]
    Wire { path: PathBuf, reason: String },

    /// An operation was attempted before the layout reached the state it requires
    #[error("Provisioning state {actual} does not satisfy required state {required}")]
    InvalidState { required: String, actual: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error (repository index and artifact downloads)
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for ContainerError {
    fn from(err: reqwest::Error) -> Self {
        ContainerError::Http(err.to_string())
    }
}

impl From<toml::de::Error> for ContainerError {
    fn from(err: toml::de::Error) -> Self {
        ContainerError::Config(err.to_string())
    }
}

impl ContainerError {
    /// Wrap this error as an applicability failure unless it already is one.
    pub fn into_applicability(self) -> Self {
        match self {
            err @ ContainerError::Applicability(_) => err,
            err => ContainerError::Applicability(Box::new(err)),
        }
    }

    /// Build a wire error for the given path.
    pub(crate) fn wire(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        ContainerError::Wire {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build an extraction error for the given archive.
    pub(crate) fn extraction(archive: impl Into<PathBuf>, cause: impl std::fmt::Display) -> Self {
        ContainerError::Extraction {
            archive: archive.into(),
            cause: cause.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_version_display() {
        let err = ContainerError::MalformedVersion {
            label: "JOnAS".to_string(),
            version: "7.0.40.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed JOnAS version 7.0.40.0: too many version components"
        );
    }

    #[test]
    fn test_applicability_wraps_once() {
        let err = ContainerError::Config("bad".to_string()).into_applicability();
        let err = err.into_applicability();
        match err {
            ContainerError::Applicability(inner) => {
                assert!(matches!(*inner, ContainerError::Config(_)));
            }
            other => panic!("expected applicability error, got {other:?}"),
        }
    }

    #[test]
    fn test_applicability_message_includes_cause() {
        let err = ContainerError::MalformedVersion {
            label: "deployme".to_string(),
            version: "1.2.3.4".to_string(),
        }
        .into_applicability();
        let msg = err.to_string();
        assert!(msg.contains("JOnAS container error"));
        assert!(msg.contains("Malformed deployme version 1.2.3.4"));
    }
}

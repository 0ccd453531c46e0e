//! Error types for the diagnostics sidecar

use thiserror::Error;

/// Errors raised by the sidecar
#[derive(Error, Debug)]
pub enum DiagnosticsError {
    /// Invalid environment configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The gist API answered with a non-success status
    #[error("Gist API returned {status}: {body}")]
    GistApi { status: u16, body: String },

    /// The initial record could not be created, so nothing can be reported
    #[error("Failed to create initial diagnostics gist: {0}")]
    Init(#[source] Box<DiagnosticsError>),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

//! Diagnostics sidecar for running JOnAS instances
//!
//! Periodically samples the process table, picks the runtime user's largest
//! process and pushes a report to a GitHub gist.

pub mod config;
pub mod error;
pub mod executor;
pub mod report;
pub mod reporter;
pub mod sampler;
pub mod selection;

pub use config::DiagnosticsConfig;
pub use error::DiagnosticsError;
pub use executor::{CommandExecutor, ShellExecutor};
pub use report::SampleRecord;
pub use reporter::{GistOptions, GistReference, GistReporter, GithubGistClient};
pub use sampler::DiagnosticsSampler;
pub use selection::{select_focused_process, FocusedProcess};

/// Result type for sidecar operations
pub type Result<T> = std::result::Result<T, DiagnosticsError>;

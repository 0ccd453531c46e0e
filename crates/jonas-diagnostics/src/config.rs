//! Sidecar configuration from environment variables

use crate::error::DiagnosticsError;
use crate::Result;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Enables the sidecar
pub const ENV_ENABLE: &str = "DEBUG_TOGIST";
/// Overrides the sampling command
pub const ENV_COMMAND: &str = "DEBUG_TOGIST_CMD";
/// Overrides the per-process detail command
pub const ENV_PROCESS_COMMAND: &str = "DEBUG_TOGIST_PROCESS_CMD";
/// Access token for the gist API
pub const ENV_TOKEN: &str = "DEBUG_TOGIST_TOKEN";
/// Runtime user whose processes are considered
pub const ENV_USER: &str = "DEBUG_TOGIST_USER";
/// Seconds between samples
pub const ENV_INTERVAL: &str = "DEBUG_TOGIST_INTERVAL_SECS";
/// Gist API base URL
pub const ENV_API: &str = "DEBUG_TOGIST_API";
/// Platform-provided instance description
pub const ENV_VCAP_APPLICATION: &str = "VCAP_APPLICATION";

pub const DEFAULT_COMMAND: &str = "date;ps -AFH --cols=2000";
pub const DEFAULT_PROCESS_COMMAND: &str = "cat /proc/%{largest_process_pid}/status";
pub const DEFAULT_USER: &str = "vcap";
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_FILENAME: &str = "filename";

/// Sidecar configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    /// Listing command sampled each iteration
    pub command: String,
    /// Detail command, `%{largest_process_pid}` is replaced by the focused pid
    pub process_command: String,
    pub access_token: Option<String>,
    pub user: String,
    pub interval: Duration,
    pub api_url: String,
    /// Gist file name
    pub filename: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        DiagnosticsConfig {
            enabled: false,
            command: DEFAULT_COMMAND.to_string(),
            process_command: DEFAULT_PROCESS_COMMAND.to_string(),
            access_token: None,
            user: DEFAULT_USER.to_string(),
            interval: Duration::from_secs(1),
            api_url: DEFAULT_API_URL.to_string(),
            filename: DEFAULT_FILENAME.to_string(),
        }
    }
}

impl DiagnosticsConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = DiagnosticsConfig::default();

        let enabled = get(ENV_ENABLE)
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(false);

        let interval = match get(ENV_INTERVAL) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| {
                    DiagnosticsError::Config(format!(
                        "{ENV_INTERVAL} must be a whole number of seconds, got '{raw}'"
                    ))
                })?,
            None => defaults.interval,
        };

        Ok(DiagnosticsConfig {
            enabled,
            command: get(ENV_COMMAND).unwrap_or(defaults.command),
            process_command: get(ENV_PROCESS_COMMAND).unwrap_or(defaults.process_command),
            access_token: get(ENV_TOKEN),
            user: get(ENV_USER).unwrap_or(defaults.user),
            interval,
            api_url: get(ENV_API)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            filename: instance_filename(get(ENV_VCAP_APPLICATION).as_deref()),
        })
    }
}

/// Build the gist file name from `VCAP_APPLICATION`.
///
/// Falls back to [`DEFAULT_FILENAME`] when the variable is unset or not a JSON object.
pub fn instance_filename(vcap_application: Option<&str>) -> String {
    let Some(raw) = vcap_application else {
        return DEFAULT_FILENAME.to_string();
    };
    let json: Value = match serde_json::from_str(raw) {
        Ok(json @ Value::Object(_)) => json,
        Ok(_) | Err(_) => {
            warn!("{ENV_VCAP_APPLICATION} is not a JSON object, using default file name");
            return DEFAULT_FILENAME.to_string();
        }
    };

    let field = |name: &str| match json.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    format!(
        "diagnostics-Index{}-Id{}-Start{}",
        field("instance_index"),
        field("instance_id"),
        field("start")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<DiagnosticsConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DiagnosticsConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config(&[]).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.command, "date;ps -AFH --cols=2000");
        assert_eq!(config.process_command, "cat /proc/%{largest_process_pid}/status");
        assert_eq!(config.user, "vcap");
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.filename, "filename");
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            (ENV_ENABLE, "true"),
            (ENV_COMMAND, "ps aux"),
            (ENV_TOKEN, "secret"),
            (ENV_INTERVAL, "5"),
            (ENV_API, "https://gist.example.com/api/"),
        ])
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.command, "ps aux");
        assert_eq!(config.access_token.as_deref(), Some("secret"));
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.api_url, "https://gist.example.com/api");
    }

    #[test]
    fn test_disable_values() {
        assert!(!config(&[(ENV_ENABLE, "false")]).unwrap().enabled);
        assert!(!config(&[(ENV_ENABLE, "0")]).unwrap().enabled);
        assert!(config(&[(ENV_ENABLE, "1")]).unwrap().enabled);
    }

    #[test]
    fn test_bad_interval() {
        assert!(matches!(
            config(&[(ENV_INTERVAL, "soon")]),
            Err(DiagnosticsError::Config(_))
        ));
    }

    #[test]
    fn test_instance_filename() {
        let vcap = r#"{"instance_index":2,"instance_id":"abc123","start":"2013-09-12 17:37:24 +0000","name":"app"}"#;
        assert_eq!(
            instance_filename(Some(vcap)),
            "diagnostics-Index2-Idabc123-Start2013-09-12 17:37:24 +0000"
        );
        assert_eq!(instance_filename(Some("not json")), "filename");
        assert_eq!(instance_filename(None), "filename");
    }
}

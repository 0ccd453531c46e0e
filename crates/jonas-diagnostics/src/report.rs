//! Diagnostic report formatting

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Placeholder replaced by the focused process id in the detail command
pub const PID_PLACEHOLDER: &str = "%{largest_process_pid}";

/// Detail gathered for the focused process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDetail {
    /// Detail command with the pid substituted
    pub command: String,
    pub output: String,
}

/// One sampling iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    pub sample: u64,
    pub elapsed: Duration,
    pub command: String,
    pub listing: String,
    /// `None` when no process of `user` was found
    pub detail: Option<ProcessDetail>,
    pub user: String,
}

impl SampleRecord {
    /// Render the record as gist content.
    pub fn render(&self) -> String {
        let mut content = format!(
            "Sample {}, elapsed {} seconds\n{}:\n{}\n\n",
            self.sample,
            self.elapsed.as_secs(),
            self.command,
            self.listing
        );
        match &self.detail {
            Some(detail) => {
                content.push_str(&format!("{}:\n{}\n", detail.command, detail.output));
            }
            None => {
                content.push_str(&format!("no process owned by {} found\n", self.user));
            }
        }
        content
    }
}

/// Substitute `pid` into a detail command template.
pub fn expand_process_command(template: &str, pid: &str) -> String {
    template.replace(PID_PLACEHOLDER, pid)
}

/// Content of the initial record created at startup.
pub fn initial_content(
    started: DateTime<Utc>,
    command: &str,
    process_command: &str,
    static_command: &str,
    static_output: &str,
) -> String {
    format!(
        "Started {}\ntracing with cmd {command} followed by {process_command} \nAlso {static_command} returns:\n{static_output}",
        started.to_rfc3339()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(detail: Option<ProcessDetail>) -> SampleRecord {
        SampleRecord {
            sample: 1,
            elapsed: Duration::from_millis(10_400),
            command: "date;ps -AFH --cols=2000".to_string(),
            listing: "listing\n".to_string(),
            detail,
            user: "vcap".to_string(),
        }
    }

    #[test]
    fn test_render_with_detail() {
        let rendered = record(Some(ProcessDetail {
            command: "cat /proc/37/status".to_string(),
            output: "Name: java\n".to_string(),
        }))
        .render();
        assert_eq!(
            rendered,
            "Sample 1, elapsed 10 seconds\ndate;ps -AFH --cols=2000:\nlisting\n\n\ncat /proc/37/status:\nName: java\n\n"
        );
    }

    #[test]
    fn test_render_without_focused_process() {
        assert_eq!(
            record(None).render(),
            "Sample 1, elapsed 10 seconds\ndate;ps -AFH --cols=2000:\nlisting\n\n\nno process owned by vcap found\n"
        );
    }

    #[test]
    fn test_expand_process_command() {
        assert_eq!(
            expand_process_command("cat /proc/%{largest_process_pid}/status", "37"),
            "cat /proc/37/status"
        );
        assert_eq!(expand_process_command("free", "37"), "free");
    }

    #[test]
    fn test_initial_content() {
        let started = Utc.with_ymd_and_hms(2013, 9, 12, 17, 37, 24).unwrap();
        let content = initial_content(started, "ps", "cat x", "free", "Mem: 1\n");
        assert_eq!(
            content,
            "Started 2013-09-12T17:37:24+00:00\ntracing with cmd ps followed by cat x \nAlso free returns:\nMem: 1\n"
        );
    }
}

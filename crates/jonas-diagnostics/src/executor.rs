//! External command execution

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs a shell command and returns everything it printed
///
/// Failures are part of the returned text so they end up in the report.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> String;
}

/// Executor running commands through `sh -c` with stderr folded into stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str) -> String {
        let output = Command::new("sh")
            .arg("-c")
            .arg(format!("({command}) 2>&1"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) => {
                debug!(command = %command, status = ?output.status.code(), "Command finished");
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                text
            }
            Err(e) => format!("failed to run '{command}': {e}\n"),
        }
    }
}

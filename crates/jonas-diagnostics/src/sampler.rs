//! The sampling loop
//!
//! ```text
//!   INIT ──► SAMPLE ──► REPORT ──► SLEEP ─┐
//!              ▲                          │
//!              └──────────────────────────┘
//! ```
//!
//! Only a failed INIT stops the sidecar. Failures inside an iteration are
//! logged and the loop carries on.

use crate::config::DiagnosticsConfig;
use crate::error::DiagnosticsError;
use crate::executor::CommandExecutor;
use crate::report::{expand_process_command, initial_content, ProcessDetail, SampleRecord};
use crate::reporter::{GistOptions, GistReference, GistReporter};
use crate::selection::select_focused_process;
use crate::Result;
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Environment snapshot taken once at startup
pub const STATIC_COMMAND: &str = "cgget -r cpuset.cpus -r memory.limit_in_bytes; free";

/// Samples process state and posts it to a gist
pub struct DiagnosticsSampler<E, R> {
    config: DiagnosticsConfig,
    executor: E,
    reporter: R,
}

impl<E: CommandExecutor, R: GistReporter> DiagnosticsSampler<E, R> {
    pub fn new(config: DiagnosticsConfig, executor: E, reporter: R) -> Self {
        DiagnosticsSampler {
            config,
            executor,
            reporter,
        }
    }

    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Options sent with every gist call
    pub fn options(&self) -> GistOptions {
        GistOptions {
            access_token: self.config.access_token.clone(),
            public: false,
            filename: self.config.filename.clone(),
            verbose: tracing::enabled!(tracing::Level::DEBUG),
        }
    }

    /// Take the static snapshot and create the remote record.
    pub async fn init(&self) -> Result<GistReference> {
        let static_output = self.executor.execute(STATIC_COMMAND).await;
        let content = initial_content(
            chrono::Utc::now(),
            &self.config.command,
            &self.config.process_command,
            STATIC_COMMAND,
            &static_output,
        );
        self.reporter
            .create(&content, &self.options())
            .await
            .map_err(|e| DiagnosticsError::Init(Box::new(e)))
    }

    /// Run the listing command and, if a focused process exists, its detail command.
    pub async fn sample(&self, sample: u64, elapsed: Duration) -> SampleRecord {
        let listing = self.executor.execute(&self.config.command).await;

        let detail = match select_focused_process(&listing, &self.config.user) {
            Some(focused) => {
                debug!(pid = %focused.pid, rss = focused.rss, "Focused process");
                let command = expand_process_command(&self.config.process_command, &focused.pid);
                let output = self.executor.execute(&command).await;
                Some(ProcessDetail { command, output })
            }
            None => None,
        };

        SampleRecord {
            sample,
            elapsed,
            command: self.config.command.clone(),
            listing,
            detail,
            user: self.config.user.clone(),
        }
    }

    /// Sample once and push the result to `reference`.
    pub async fn sample_and_post(
        &self,
        reference: &GistReference,
        sample: u64,
        elapsed: Duration,
    ) -> Result<SampleRecord> {
        let record = self.sample(sample, elapsed).await;
        self.reporter
            .update(reference, &record.render(), &self.options())
            .await?;
        Ok(record)
    }

    /// Run forever. Returns only if INIT fails.
    pub async fn run(&self) -> Result<Infallible> {
        let reference = self.init().await?;
        info!(
            html_url = %reference.html_url,
            command = %self.config.command,
            "Diagnostics gist created"
        );

        let start = Instant::now();
        let mut sample: u64 = 0;
        loop {
            let elapsed = start.elapsed();
            if let Err(e) = self.sample_and_post(&reference, sample, elapsed).await {
                warn!(sample = sample, error = %e, "Failed to post diagnostics sample");
            }
            tokio::time::sleep(self.config.interval).await;
            sample += 1;
        }
    }
}

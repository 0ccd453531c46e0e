//! `jonas-diagnostics`: samples the instance's processes into a gist
//!
//! Configured through `DEBUG_TOGIST*` environment variables. Exits right
//! away unless `DEBUG_TOGIST` is set.

use anyhow::{Context, Result};
use clap::Parser;
use jonas_diagnostics::{DiagnosticsConfig, DiagnosticsSampler, GithubGistClient, ShellExecutor};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "jonas-diagnostics")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Diagnostics sidecar for JOnAS instances", long_about = None)]
struct Cli {
    /// Enable verbose output, including gist API responses
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    jonas_core::init_tracing(cli.json, level);

    let config = DiagnosticsConfig::from_env().context("Failed to read diagnostics configuration")?;
    if !config.enabled {
        info!("Diagnostics disabled");
        return Ok(());
    }

    let reporter =
        GithubGistClient::new(&config.api_url).context("Failed to create gist client")?;
    let sampler = DiagnosticsSampler::new(config, ShellExecutor, reporter);

    match sampler.run().await {
        Ok(never) => match never {},
        Err(e) => Err(e).context("Diagnostics sidecar stopped"),
    }
}

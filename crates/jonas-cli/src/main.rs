//! `jonas`: JOnAS container for the Java buildpack
//!
//! ## Commands
//!
//! - `detect`: print `jonas-<version>` if the application is a web application
//! - `compile`: provision JOnAS next to the application and wire it in
//! - `release`: print the command that starts the application

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use jonas_core::{
    CachedAcquirer, ContainerConfig, ContainerContext, IndexResolver, JonasContainer,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, Level};

#[derive(Parser)]
#[command(name = "jonas")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "JOnAS container for the Java buildpack", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the container id if the application is a web application
    Detect(ContainerArgs),

    /// Download and expand JOnAS, then wire the application into it
    Compile(ContainerArgs),

    /// Print the command that starts the application
    Release(ContainerArgs),
}

#[derive(Args, Debug)]
struct ContainerArgs {
    /// Application directory
    app_dir: PathBuf,

    /// Container configuration (TOML)
    #[arg(short, long, env = "JONAS_CONFIG")]
    config: Option<PathBuf>,

    /// Directory acting as JAVA_HOME at runtime, relative to the application
    #[arg(long, default_value = ".java")]
    java_home: PathBuf,

    /// Java option to pass to the runtime (repeatable)
    #[arg(long = "java-opt", allow_hyphen_values = true)]
    java_opts: Vec<String>,

    /// Directory of additional libraries to link into the runtime
    #[arg(long)]
    lib_dir: Option<PathBuf>,

    /// Download cache directory
    #[arg(long, env = "JONAS_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Overlay resources copied over the runtime root
    #[arg(long, env = "JONAS_RESOURCES")]
    resources: Option<PathBuf>,
}

impl ContainerArgs {
    fn container(&self) -> Result<JonasContainer> {
        let config = match &self.config {
            Some(path) => ContainerConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ContainerConfig::default(),
        };

        let context = ContainerContext {
            app_dir: self.app_dir.clone(),
            java_home: self.java_home.clone(),
            java_opts: (!self.java_opts.is_empty()).then(|| self.java_opts.clone()),
            lib_directory: self.lib_dir.clone(),
            config,
        };
        debug!(app_dir = %self.app_dir.display(), "Constructing JOnAS container");
        Ok(JonasContainer::new(context, &IndexResolver::new())?)
    }

    fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("jonas-cache"))
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    jonas_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Detect(args) => cmd_detect(&args),
        Commands::Compile(args) => cmd_compile(&args),
        Commands::Release(args) => cmd_release(&args),
    }
}

fn cmd_detect(args: &ContainerArgs) -> Result<ExitCode> {
    match args.container()?.detect() {
        Some(id) => {
            println!("{id}");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            info!(
                app_dir = %args.app_dir.display(),
                "No WEB-INF directory, JOnAS does not apply"
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_compile(args: &ContainerArgs) -> Result<ExitCode> {
    let container = args.container()?;
    let acquirer = CachedAcquirer::new(args.cache_dir());
    let report = container
        .compile(&acquirer, args.resources.as_deref())
        .context("Compile failed")?;

    info!(state = %report.state, links = report.manifest.entries.len(), "Compile finished");
    println!("{}", report.release);
    Ok(ExitCode::SUCCESS)
}

fn cmd_release(args: &ContainerArgs) -> Result<ExitCode> {
    let release = args.container()?.release().context("Release failed")?;
    println!("{release}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_with_java_opts() {
        let cli = Cli::try_parse_from([
            "jonas",
            "--verbose",
            "release",
            "/tmp/app",
            "--java-opt",
            "-Xmx512m",
            "--java-opt",
            "-Dfoo=bar",
            "--java-home",
            "/jdk",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Release(args) => {
                assert_eq!(args.app_dir, PathBuf::from("/tmp/app"));
                assert_eq!(args.java_opts, vec!["-Xmx512m", "-Dfoo=bar"]);
                assert_eq!(args.java_home, PathBuf::from("/jdk"));
            }
            _ => panic!("expected release"),
        }
    }

    #[test]
    fn test_detect_without_web_inf() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().display().to_string();
        let cli = Cli::try_parse_from(["jonas", "detect", app_dir.as_str()]).unwrap();
        let Commands::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        assert!(args.container().unwrap().detect().is_none());
    }

    #[test]
    fn test_release_with_local_repository() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        std::fs::create_dir_all(app.join("WEB-INF")).unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::write(repo.join("index.json"), r#"{"5.2.1": "file:///jonas.tgz"}"#).unwrap();
        let config = dir.path().join("jonas.toml");
        std::fs::write(
            &config,
            format!("[runtime]\nversion = \"5.2.+\"\nrepository_root = \"{}\"\n", repo.display()),
        )
        .unwrap();

        let app_dir = app.display().to_string();
        let config_path = config.display().to_string();
        let cli = Cli::try_parse_from([
            "jonas",
            "release",
            app_dir.as_str(),
            "--config",
            config_path.as_str(),
        ])
        .unwrap();
        let Commands::Release(args) = cli.command else {
            panic!("expected release");
        };

        let container = args.container().unwrap();
        assert_eq!(container.detect().as_deref(), Some("jonas-5.2.1"));
        let release = container.release().unwrap();
        assert!(release.starts_with("JAVA_HOME=.java JAVA_OPTS=\"-Dhttp.port=$PORT\""));
        assert!(release.ends_with("exec jonas start -fg"));
    }
}

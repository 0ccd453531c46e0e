//! Container configuration
//!
//! Loaded from TOML; every field has a JOnAS default so a configuration file
//! only needs to name the repositories to resolve versions from.

use crate::error::ContainerError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// A versioned item to resolve from a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemConfig {
    /// Version constraint, e.g. `5.2.+`
    pub version: String,
    /// Directory or URL holding `index.json`
    pub repository_root: String,
}

impl ItemConfig {
    /// Create an item configuration
    pub fn new(version: &str, repository_root: &str) -> Self {
        ItemConfig {
            version: version.to_string(),
            repository_root: repository_root.to_string(),
        }
    }
}

impl Default for ItemConfig {
    fn default() -> Self {
        ItemConfig {
            version: "5.2.+".to_string(),
            repository_root: String::new(),
        }
    }
}

/// How the application reaches the deployment slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStrategy {
    /// Copy the application into a `.war`-shaped directory at first start
    #[default]
    Copy,
    /// Symlink the deployment slot to the application directory at compile time
    Reference,
}

/// On-disk names, all relative to the application directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Unpacked runtime (`JONAS_ROOT`)
    pub runtime_root: PathBuf,
    /// Mutable per-instance configuration (`JONAS_BASE`)
    pub mutable_root: PathBuf,
    /// Autodeploy directory, relative to the mutable root
    pub deploy_dir: PathBuf,
    /// Application slot inside the deploy directory
    pub app_slot: String,
    /// Library directory, relative to the mutable root
    pub library_slot: PathBuf,
    /// Environment file generated by the deployer, relative to the mutable root
    pub env_file: PathBuf,
    /// System property carrying the HTTP port
    pub http_port_key: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            runtime_root: PathBuf::from(".jonas_root"),
            mutable_root: PathBuf::from(".jonas_base"),
            deploy_dir: PathBuf::from("deploy"),
            app_slot: "app.war".to_string(),
            library_slot: PathBuf::from("lib/ext"),
            env_file: PathBuf::from("setenv"),
            http_port_key: "http.port".to_string(),
        }
    }
}

/// Deployment settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub strategy: DeploymentStrategy,
}

/// One-time domain setup run at first start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Topology template, relative to the runtime root
    pub template: PathBuf,
    /// Rendered topology descriptor, relative to the runtime root
    pub output: PathBuf,
    /// Command rendering the template to stdout
    pub renderer: String,
    /// Deployer jar, relative to the runtime root
    pub deployer_jar: PathBuf,
    pub domain_name: String,
    pub server_name: String,
    /// Foreground start command, run after sourcing the environment file
    pub start_command: String,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        TopologyConfig {
            template: PathBuf::from("deployme/topology.xml.erb"),
            output: PathBuf::from("deployme/topology.xml"),
            renderer: "erb".to_string(),
            deployer_jar: PathBuf::from("deployme/deployme.jar"),
            domain_name: "singleDomain".to_string(),
            server_name: "singleServerName".to_string(),
            start_command: "jonas start -fg".to_string(),
        }
    }
}

/// Installation of the diagnostics sidecar next to the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsInstallConfig {
    pub enabled: bool,
    /// Sidecar executable shipped with the buildpack
    pub executable: Option<PathBuf>,
    /// Install directory, relative to the runtime root
    pub directory: PathBuf,
}

impl Default for DiagnosticsInstallConfig {
    fn default() -> Self {
        DiagnosticsInstallConfig {
            enabled: false,
            executable: None,
            directory: PathBuf::from("diagnostics"),
        }
    }
}

/// Archive members never extracted for JOnAS
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "webapps",
    "deploy/jonasAdmin.xml",
    "deploy/doc.xml",
    "repositories/maven2-internal/org/ow2/jonas/jonas-admin",
    "repositories/maven2-internal/org/ow2/jonas/documentation",
    "conf/server.xml",
    "conf/context.xml",
];

/// Full container configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub runtime: ItemConfig,
    pub support: Option<ItemConfig>,
    pub deployer: Option<ItemConfig>,
    pub layout: LayoutConfig,
    pub deployment: DeploymentConfig,
    pub exclusions: Vec<String>,
    pub topology: TopologyConfig,
    pub diagnostics: DiagnosticsInstallConfig,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        ContainerConfig {
            runtime: ItemConfig::default(),
            support: None,
            deployer: None,
            layout: LayoutConfig::default(),
            deployment: DeploymentConfig::default(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            topology: TopologyConfig::default(),
            diagnostics: DiagnosticsInstallConfig::default(),
        }
    }
}

impl ContainerConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ContainerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ContainerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Check the layout for names that would escape or overlap.
    pub fn validate(&self) -> Result<()> {
        let layout = &self.layout;
        for (name, path) in [
            ("layout.runtime_root", &layout.runtime_root),
            ("layout.mutable_root", &layout.mutable_root),
            ("layout.deploy_dir", &layout.deploy_dir),
            ("layout.library_slot", &layout.library_slot),
            ("layout.env_file", &layout.env_file),
            ("topology.template", &self.topology.template),
            ("topology.output", &self.topology.output),
            ("topology.deployer_jar", &self.topology.deployer_jar),
            ("diagnostics.directory", &self.diagnostics.directory),
        ] {
            if !is_plain_relative(path) {
                return Err(ContainerError::Config(format!(
                    "{name} must be a non-empty relative path without '..', got {}",
                    path.display()
                )));
            }
        }

        if layout.runtime_root.starts_with(&layout.mutable_root)
            || layout.mutable_root.starts_with(&layout.runtime_root)
        {
            return Err(ContainerError::Config(
                "layout.runtime_root and layout.mutable_root must not overlap".to_string(),
            ));
        }

        if layout.app_slot.is_empty() || layout.app_slot.contains('/') {
            return Err(ContainerError::Config(format!(
                "layout.app_slot must be a single path component, got '{}'",
                layout.app_slot
            )));
        }

        if self.runtime.version.trim().is_empty() {
            return Err(ContainerError::Config(
                "runtime.version must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_plain_relative(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

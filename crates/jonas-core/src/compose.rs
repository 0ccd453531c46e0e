//! Release command composition

use crate::config::{ContainerConfig, DeploymentStrategy, LayoutConfig, TopologyConfig};
use crate::resolver::ResolvedArtifacts;
use crate::shell::{double_quote_escape, shell_word, Clause, StartupCommand};
use std::path::{Path, PathBuf};

/// Sentinel touched in the mutable root once domain setup ran (reference strategy)
pub const DOMAIN_CONFIGURED_MARKER: &str = ".domain-configured";

/// Suffix of the directory the application is copied into before it is moved onto the slot
pub const STAGING_SUFFIX: &str = ".tmp";

/// Sidecar launch script, relative to the diagnostics install directory
pub const DIAGNOSTICS_LAUNCHER: &str = "launch.sh";

/// Builds the startup command from resolved artifacts and platform inputs
///
/// All paths in the composed command are relative to the application
/// directory, which is the working directory at launch.
#[derive(Debug, Clone)]
pub struct CommandComposer {
    layout: LayoutConfig,
    topology: TopologyConfig,
    strategy: DeploymentStrategy,
    diagnostics_launcher: Option<PathBuf>,
}

impl CommandComposer {
    pub fn new(config: &ContainerConfig) -> Self {
        let diagnostics_launcher = config.diagnostics.enabled.then(|| {
            config
                .layout
                .runtime_root
                .join(&config.diagnostics.directory)
                .join(DIAGNOSTICS_LAUNCHER)
        });
        CommandComposer {
            layout: config.layout.clone(),
            topology: config.topology.clone(),
            strategy: config.deployment.strategy,
            diagnostics_launcher,
        }
    }

    /// Compose the startup command.
    ///
    /// `java_opts` is never modified; the port option is appended to a copy,
    /// once per call.
    pub fn compose(
        &self,
        artifacts: &ResolvedArtifacts,
        java_home: &Path,
        java_opts: &[String],
        port_variable: &str,
    ) -> StartupCommand {
        let java_opts_value = java_opts
            .iter()
            .map(|opt| double_quote_escape(opt))
            .chain(std::iter::once(self.port_option(port_variable)))
            .collect::<Vec<_>>()
            .join(" ");

        let environment = format!(
            "JAVA_HOME={} JAVA_OPTS=\"{}\"",
            shell_word(&java_home.to_string_lossy()),
            java_opts_value
        );

        let command = match &self.diagnostics_launcher {
            Some(launcher) => StartupCommand::new(Clause::background(StartupCommand::new(
                shell_word(&launcher.to_string_lossy()),
            )))
            .always(environment),
            None => StartupCommand::new(environment),
        };

        let env_file = self.layout.mutable_root.join(&self.layout.env_file);
        command
            .and_then("export JAVA_HOME JAVA_OPTS")
            .and_then(self.domain_setup(artifacts))
            .and_then(format!(". {}", shell_word(&env_file.to_string_lossy())))
            .and_then(format!("exec {}", self.topology.start_command))
    }

    /// `-D<key>=$<var>`
    pub fn port_option(&self, port_variable: &str) -> String {
        format!("-D{}=${}", self.layout.http_port_key, port_variable)
    }

    fn domain_setup(&self, artifacts: &ResolvedArtifacts) -> Clause {
        let runtime_root = &self.layout.runtime_root;
        let mutable_root = &self.layout.mutable_root;
        let path = |p: &Path| shell_word(&p.to_string_lossy());

        let mut setup = StartupCommand::new(format!(
            "JONAS_ROOT={} JONAS_BASE={}",
            path(runtime_root),
            path(mutable_root)
        ))
        .and_then("export JONAS_ROOT JONAS_BASE");

        if artifacts.deployer.is_some() {
            let topology_file = path(&runtime_root.join(&self.topology.output));
            setup = setup
                .and_then(format!(
                    "{} {} > {}",
                    self.topology.renderer,
                    path(&runtime_root.join(&self.topology.template)),
                    topology_file
                ))
                .and_then(format!(
                    "$JAVA_HOME/bin/java -jar {} -topologyFile={} -domainName={} -serverName={}",
                    path(&runtime_root.join(&self.topology.deployer_jar)),
                    topology_file,
                    shell_word(&self.topology.domain_name),
                    shell_word(&self.topology.server_name)
                ));
        }

        let test = match self.strategy {
            DeploymentStrategy::Copy => {
                let deploy_dir = mutable_root.join(&self.layout.deploy_dir);
                let slot = path(&deploy_dir.join(&self.layout.app_slot));
                let staging = path(
                    &deploy_dir.join(format!("{}{STAGING_SUFFIX}", self.layout.app_slot)),
                );
                // The slot only appears once the copy is complete
                setup = setup
                    .and_then(format!("rm -rf {staging}"))
                    .and_then(format!("mkdir -p {staging}"))
                    .and_then(format!("cp -r --dereference * {staging}/"))
                    .and_then(format!("mv {staging} {slot}"));
                format!("test ! -d {slot}")
            }
            DeploymentStrategy::Reference => {
                let marker = path(&mutable_root.join(DOMAIN_CONFIGURED_MARKER));
                setup = setup.and_then(format!("touch {marker}"));
                format!("test ! -e {marker}")
            }
        };

        Clause::once_guard(
            test,
            setup,
            StartupCommand::new(format!(
                "echo \"skipping {} config as already present\"",
                double_quote_escape(mutable_root.to_string_lossy().trim_start_matches('.'))
            )),
        )
    }
}

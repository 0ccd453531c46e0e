//! The JOnAS container lifecycle: detect, compile, release

use crate::acquire::ArtifactAcquirer;
use crate::compose::{CommandComposer, DIAGNOSTICS_LAUNCHER};
use crate::config::{ContainerConfig, ItemConfig};
use crate::error::ContainerError;
use crate::layout::{ProvisioningLayout, ProvisioningState};
use crate::provision::{ArchiveProvisioner, ExclusionSet};
use crate::resolver::{ResolvedArtifacts, RuntimeDescriptor, VersionResolver};
use crate::version::max_numeric_components;
use crate::wire::{LinkManifest, LinkWirer};
use crate::Result;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Directory whose presence makes the container applicable
pub const WEB_INF_DIRECTORY: &str = "WEB-INF";

/// Environment variable the platform puts the HTTP port in
pub const PORT_VARIABLE: &str = "PORT";

/// Name of the installed sidecar executable
pub const DIAGNOSTICS_EXECUTABLE: &str = "jonas-diagnostics";

/// Highest number of numeric version components JOnAS artifacts may carry
const MAX_VERSION_COMPONENTS: usize = 3;

/// Inputs handed to the container by the buildpack
#[derive(Debug, Clone)]
pub struct ContainerContext {
    /// Directory the application was pushed to
    pub app_dir: PathBuf,
    /// Directory acting as `JAVA_HOME`
    pub java_home: PathBuf,
    /// Java options contributed by other components, if any
    pub java_opts: Option<Vec<String>>,
    /// Directory holding additional libraries
    pub lib_directory: Option<PathBuf>,
    pub config: ContainerConfig,
}

/// Result of a compile pass
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub layout: ProvisioningLayout,
    pub manifest: LinkManifest,
    pub state: ProvisioningState,
    /// Command `release` will return
    pub release: String,
}

/// JOnAS container adapter
#[derive(Debug)]
pub struct JonasContainer {
    context: ContainerContext,
    layout: ProvisioningLayout,
    artifacts: Option<ResolvedArtifacts>,
    composer: CommandComposer,
}

impl JonasContainer {
    /// Build the container, resolving versions if the application has a `WEB-INF` directory.
    ///
    /// Any failure is reported as [`ContainerError::Applicability`]. The
    /// resolver is not consulted for applications without `WEB-INF`.
    pub fn new(context: ContainerContext, resolver: &dyn VersionResolver) -> Result<Self> {
        context
            .config
            .validate()
            .map_err(ContainerError::into_applicability)?;

        let artifacts = if context.app_dir.join(WEB_INF_DIRECTORY).exists() {
            let artifacts = resolve_artifacts(&context.config, resolver)
                .map_err(ContainerError::into_applicability)?;
            Some(artifacts)
        } else {
            None
        };

        let layout = ProvisioningLayout::new(&context.app_dir, &context.config.layout);
        let composer = CommandComposer::new(&context.config);
        Ok(JonasContainer {
            context,
            layout,
            artifacts,
            composer,
        })
    }

    /// `jonas-<version>` when the container applies.
    pub fn detect(&self) -> Option<String> {
        self.artifacts
            .as_ref()
            .map(|artifacts| format!("jonas-{}", artifacts.runtime.version))
    }

    pub fn artifacts(&self) -> Option<&ResolvedArtifacts> {
        self.artifacts.as_ref()
    }

    pub fn layout(&self) -> &ProvisioningLayout {
        &self.layout
    }

    /// Provision the runtime, add-ons and sidecar, then wire the application.
    ///
    /// `resources` is the buildpack's overlay directory for the runtime root.
    pub fn compile(
        &self,
        acquirer: &dyn ArtifactAcquirer,
        resources: Option<&Path>,
    ) -> Result<CompileReport> {
        let artifacts = self.require_artifacts()?;
        let config = &self.context.config;
        let layout = &self.layout;

        let exclusions = ExclusionSet::new(config.exclusions.as_slice())?;
        let mut provisioner = ArchiveProvisioner::new(exclusions);
        if let Some(resources) = resources {
            provisioner = provisioner.with_overlay(resources);
        }

        let runtime = &artifacts.runtime;
        let version = runtime.version.to_string();
        let started = Instant::now();
        if provisioner.is_current(layout, &version) {
            provisioner.refresh(layout)?;
        } else {
            info!(version = %version, uri = %runtime.source_uri, "Downloading JOnAS");
            acquirer.get(&runtime.source_uri, &mut |archive| {
                provisioner.provision(archive, &version, layout).map(|_| ())
            })?;
        }
        info!(
            version = %version,
            runtime_root = %layout.runtime_root.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Provisioned JOnAS runtime"
        );

        if let Some(deployer) = &artifacts.deployer {
            let target = layout.runtime_root.join(&config.topology.deployer_jar);
            self.install_artifact(acquirer, "deployme", deployer, &target)?;
        }

        if let Some(support) = &artifacts.support {
            let target = layout
                .runtime_root
                .join("lib/ext")
                .join(format!("jonas-support-{}.jar", support.version));
            self.install_artifact(acquirer, "support", support, &target)?;
        }

        let manifest = LinkWirer::new(config.deployment.strategy)
            .wire(layout, self.context.lib_directory.as_deref())?;

        if config.diagnostics.enabled {
            self.install_diagnostics()?;
        }

        let release = self.release()?;
        info!(release = %release, "Compile completed, release command to be run");

        Ok(CompileReport {
            layout: layout.clone(),
            manifest,
            state: layout.state(),
            release,
        })
    }

    /// The startup command for the application.
    pub fn release(&self) -> Result<String> {
        let artifacts = self.require_artifacts()?;
        let java_opts = self.context.java_opts.as_deref().unwrap_or(&[]);
        let command = self.composer.compose(
            artifacts,
            &self.context.java_home,
            java_opts,
            PORT_VARIABLE,
        );
        Ok(command.render())
    }

    fn require_artifacts(&self) -> Result<&ResolvedArtifacts> {
        self.artifacts
            .as_ref()
            .ok_or_else(|| ContainerError::NotApplicable {
                app_dir: self.context.app_dir.clone(),
            })
    }

    fn install_artifact(
        &self,
        acquirer: &dyn ArtifactAcquirer,
        name: &str,
        descriptor: &RuntimeDescriptor,
        target: &Path,
    ) -> Result<()> {
        let started = Instant::now();
        acquirer.get(&descriptor.source_uri, &mut |file| {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(file, target)?;
            Ok(())
        })?;
        info!(
            artifact = name,
            version = %descriptor.version,
            target = %target.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Installed artifact"
        );
        Ok(())
    }

    fn install_diagnostics(&self) -> Result<()> {
        let settings = &self.context.config.diagnostics;
        let Some(executable) = settings.executable.as_ref().filter(|p| p.is_file()) else {
            warn!(
                executable = ?settings.executable,
                "Diagnostics enabled but no sidecar executable found, skipping install"
            );
            return Ok(());
        };

        let dir = self.layout.runtime_root.join(&settings.directory);
        std::fs::create_dir_all(&dir)?;
        let installed = dir.join(DIAGNOSTICS_EXECUTABLE);
        std::fs::copy(executable, &installed)?;

        let launcher = dir.join(DIAGNOSTICS_LAUNCHER);
        std::fs::write(
            &launcher,
            format!("#!/bin/sh\nexec \"$(dirname \"$0\")/{DIAGNOSTICS_EXECUTABLE}\" \"$@\"\n"),
        )?;
        make_executable(&installed)?;
        make_executable(&launcher)?;

        info!(directory = %dir.display(), "Installed diagnostics sidecar");
        Ok(())
    }
}

fn resolve_artifacts(
    config: &ContainerConfig,
    resolver: &dyn VersionResolver,
) -> Result<ResolvedArtifacts> {
    let runtime = resolve_item(resolver, &config.runtime, "JOnAS")?.ok_or_else(|| {
        ContainerError::Resolution {
            constraint: config.runtime.version.clone(),
            repository_root: config.runtime.repository_root.clone(),
        }
    })?;

    let support = match &config.support {
        Some(item) => resolve_item(resolver, item, "JOnAS support")?,
        None => None,
    };
    let deployer = match &config.deployer {
        Some(item) => resolve_item(resolver, item, "deployme")?,
        None => None,
    };

    Ok(ResolvedArtifacts {
        runtime,
        support,
        deployer,
    })
}

fn resolve_item(
    resolver: &dyn VersionResolver,
    item: &ItemConfig,
    label: &str,
) -> Result<Option<RuntimeDescriptor>> {
    let validate = max_numeric_components(label, MAX_VERSION_COMPONENTS);
    resolver.find(item, Some(&validate))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

//! Wiring the application and its libraries into the provisioned tree
//!
//! The application directory is only ever read: every entry in the returned
//! [`LinkManifest`] points from the provisioned tree back into it.

use crate::config::DeploymentStrategy;
use crate::error::ContainerError;
use crate::fsutil;
use crate::layout::{ProvisioningLayout, ProvisioningState};
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Library archive extension picked up from the extra library directory
pub const LIBRARY_EXTENSION: &str = "jar";

/// How a manifest entry was materialised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Relative symlink to the source
    Symlink,
    /// Dereferencing recursive copy of the source
    Copy,
}

/// One link from the provisioned tree to a source path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    /// Path inside the provisioned tree
    pub target: PathBuf,
    /// Path the target resolves to
    pub source: PathBuf,
    pub kind: LinkKind,
    /// False while the slot waits for the copy made at first start
    pub materialized: bool,
}

/// Record of what [`LinkWirer::wire`] created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkManifest {
    pub entries: Vec<LinkEntry>,
}

impl LinkManifest {
    /// Entry whose target is `target`, if any
    pub fn find(&self, target: &Path) -> Option<&LinkEntry> {
        self.entries.iter().find(|e| e.target == target)
    }

    /// Library symlinks, in creation order
    pub fn libraries(&self) -> impl Iterator<Item = &LinkEntry> {
        self.entries.iter().filter(|e| {
            e.kind == LinkKind::Symlink
                && e.target.extension().is_some_and(|x| x == LIBRARY_EXTENSION)
        })
    }
}

/// Wires an application into a [`ProvisioningLayout`]
#[derive(Debug, Clone, Copy)]
pub struct LinkWirer {
    strategy: DeploymentStrategy,
}

impl LinkWirer {
    /// Create a wirer for `strategy`
    pub fn new(strategy: DeploymentStrategy) -> Self {
        LinkWirer { strategy }
    }

    /// Configured deployment strategy
    pub fn strategy(&self) -> DeploymentStrategy {
        self.strategy
    }

    /// Wire `layout.app_dir` into the deployment slot and link libraries.
    ///
    /// The application directory must be readable, otherwise this is a
    /// [`ContainerError::Wire`]. Requires [`ProvisioningState::Extracted`].
    /// With the reference strategy the deployment slot becomes a symlink to
    /// the application directory; with the copy strategy the slot is filled
    /// by the startup command at first start.
    pub fn wire(
        &self,
        layout: &ProvisioningLayout,
        extra_lib_dir: Option<&Path>,
    ) -> Result<LinkManifest> {
        let app_dir = &layout.app_dir;
        std::fs::read_dir(app_dir).map_err(|e| ContainerError::wire(app_dir, e))?;
        layout.require(ProvisioningState::Extracted)?;

        std::fs::create_dir_all(&layout.deploy_dir)
            .map_err(|e| ContainerError::wire(&layout.deploy_dir, e))?;

        let mut manifest = LinkManifest::default();
        match self.strategy {
            DeploymentStrategy::Reference => {
                let relative = fsutil::relative_path(app_dir, &layout.deploy_dir);
                fsutil::remove_existing(&layout.app_slot)
                    .and_then(|_| fsutil::symlink(&relative, &layout.app_slot))
                    .map_err(|e| ContainerError::wire(&layout.app_slot, e))?;
                debug!(slot = %layout.app_slot.display(), link = %relative.display(), "Linked deployment slot");
                manifest.entries.push(LinkEntry {
                    target: layout.app_slot.clone(),
                    source: app_dir.clone(),
                    kind: LinkKind::Symlink,
                    materialized: true,
                });
            }
            DeploymentStrategy::Copy => {
                let present = std::fs::symlink_metadata(&layout.app_slot).is_ok();
                manifest.entries.push(LinkEntry {
                    target: layout.app_slot.clone(),
                    source: app_dir.clone(),
                    kind: LinkKind::Copy,
                    materialized: present,
                });
            }
        }

        if let Some(lib_dir) = extra_lib_dir {
            self.link_libraries(lib_dir, &layout.library_slot, &mut manifest)?;
        }

        info!(
            strategy = ?self.strategy,
            entries = manifest.entries.len(),
            state = %layout.state(),
            "Wired application"
        );
        Ok(manifest)
    }

    fn link_libraries(
        &self,
        lib_dir: &Path,
        library_slot: &Path,
        manifest: &mut LinkManifest,
    ) -> Result<()> {
        if !lib_dir.exists() {
            debug!(lib_dir = %lib_dir.display(), "No extra library directory");
            return Ok(());
        }

        let mut jars = Vec::new();
        for entry in std::fs::read_dir(lib_dir).map_err(|e| ContainerError::wire(lib_dir, e))? {
            let path = entry.map_err(|e| ContainerError::wire(lib_dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|x| x == LIBRARY_EXTENSION) {
                jars.push(path);
            }
        }
        jars.sort();

        std::fs::create_dir_all(library_slot).map_err(|e| ContainerError::wire(library_slot, e))?;
        for jar in jars {
            let Some(name) = jar.file_name() else {
                continue;
            };
            let target = library_slot.join(name);
            let relative = fsutil::relative_path(&jar, library_slot);
            fsutil::remove_existing(&target)
                .and_then(|_| fsutil::symlink(&relative, &target))
                .map_err(|e| ContainerError::wire(&target, e))?;
            debug!(library = %target.display(), "Linked library");
            manifest.entries.push(LinkEntry {
                target,
                source: jar,
                kind: LinkKind::Symlink,
                materialized: true,
            });
        }
        Ok(())
    }
}

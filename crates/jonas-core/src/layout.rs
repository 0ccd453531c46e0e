//! On-disk provisioning layout and the state it encodes
//!
//! The filesystem is the state store: each state is recognised by the
//! presence of a specific path.
//!
//! ```text
//!   Absent ──provision──► Extracted ──wire──► Wired ──first start──► Deployed
//!                                      └──────(reference strategy)──────┘
//! ```

use crate::config::LayoutConfig;
use crate::error::ContainerError;
use crate::Result;
use std::path::{Path, PathBuf};

/// Marker written into the runtime root once extraction completed
pub const RUNTIME_VERSION_MARKER: &str = ".jonas-runtime-version";

/// Provisioning progress, ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProvisioningState {
    /// No extracted runtime
    Absent,
    /// Runtime extracted, mutable root pristine
    Extracted,
    /// Deploy directory and libraries wired
    Wired,
    /// Deployment artifact present
    Deployed,
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProvisioningState::Absent => "absent",
            ProvisioningState::Extracted => "extracted",
            ProvisioningState::Wired => "wired",
            ProvisioningState::Deployed => "deployed",
        };
        f.write_str(name)
    }
}

/// Absolute paths of the provisioned tree for one application directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningLayout {
    pub app_dir: PathBuf,
    pub runtime_root: PathBuf,
    pub mutable_root: PathBuf,
    pub deploy_dir: PathBuf,
    pub app_slot: PathBuf,
    pub library_slot: PathBuf,
}

impl ProvisioningLayout {
    /// Resolve the configured names against `app_dir`
    pub fn new(app_dir: &Path, config: &LayoutConfig) -> Self {
        let mutable_root = app_dir.join(&config.mutable_root);
        let deploy_dir = mutable_root.join(&config.deploy_dir);
        ProvisioningLayout {
            app_dir: app_dir.to_path_buf(),
            runtime_root: app_dir.join(&config.runtime_root),
            app_slot: deploy_dir.join(&config.app_slot),
            library_slot: mutable_root.join(&config.library_slot),
            deploy_dir,
            mutable_root,
        }
    }

    /// Path of the runtime version marker
    pub fn version_marker(&self) -> PathBuf {
        self.runtime_root.join(RUNTIME_VERSION_MARKER)
    }

    /// Version recorded by the last completed extraction
    pub fn extracted_version(&self) -> Option<String> {
        std::fs::read_to_string(self.version_marker())
            .ok()
            .map(|v| v.trim().to_string())
    }

    /// Observe the current state from the filesystem.
    pub fn state(&self) -> ProvisioningState {
        if !self.version_marker().is_file() {
            ProvisioningState::Absent
        } else if std::fs::symlink_metadata(&self.app_slot).is_ok() {
            ProvisioningState::Deployed
        } else if self.deploy_dir.is_dir() {
            ProvisioningState::Wired
        } else {
            ProvisioningState::Extracted
        }
    }

    /// Fail unless the layout has reached at least `required`.
    pub fn require(&self, required: ProvisioningState) -> Result<ProvisioningState> {
        let actual = self.state();
        if actual < required {
            return Err(ContainerError::InvalidState {
                required: required.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(actual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_paths() {
        let layout = ProvisioningLayout::new(Path::new("/app"), &LayoutConfig::default());
        assert_eq!(layout.runtime_root, PathBuf::from("/app/.jonas_root"));
        assert_eq!(layout.mutable_root, PathBuf::from("/app/.jonas_base"));
        assert_eq!(layout.app_slot, PathBuf::from("/app/.jonas_base/deploy/app.war"));
        assert_eq!(layout.library_slot, PathBuf::from("/app/.jonas_base/lib/ext"));
    }

    #[test]
    fn test_state_progression() {
        let dir = tempdir().unwrap();
        let layout = ProvisioningLayout::new(dir.path(), &LayoutConfig::default());
        assert_eq!(layout.state(), ProvisioningState::Absent);

        std::fs::create_dir_all(&layout.runtime_root).unwrap();
        std::fs::write(layout.version_marker(), "5.2.1").unwrap();
        std::fs::create_dir_all(&layout.mutable_root).unwrap();
        assert_eq!(layout.state(), ProvisioningState::Extracted);
        assert_eq!(layout.extracted_version().as_deref(), Some("5.2.1"));

        std::fs::create_dir_all(&layout.deploy_dir).unwrap();
        assert_eq!(layout.state(), ProvisioningState::Wired);

        std::fs::create_dir_all(&layout.app_slot).unwrap();
        assert_eq!(layout.state(), ProvisioningState::Deployed);
    }

    #[test]
    fn test_require_rejects_earlier_state() {
        let dir = tempdir().unwrap();
        let layout = ProvisioningLayout::new(dir.path(), &LayoutConfig::default());
        let err = layout.require(ProvisioningState::Extracted).unwrap_err();
        assert!(err.to_string().contains("absent"));
    }
}

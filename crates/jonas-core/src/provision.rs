//! Runtime archive provisioning
//!
//! Extracts a gzip'd runtime tarball into the runtime root with its top-level
//! directory stripped, skipping excluded members, then lays the buildpack's
//! overlay resources on top.

use crate::error::ContainerError;
use crate::fsutil;
use crate::layout::{ProvisioningLayout, ProvisioningState};
use crate::Result;
use flate2::read::GzDecoder;
use regex::RegexSet;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tar::{Archive, EntryType};
use tracing::{debug, info};

/// Compiled archive exclusion patterns
///
/// A pattern matches a member when its components equal a contiguous run of
/// the member's path components, anywhere in the path. `*` matches within a
/// single component. Excluding a directory excludes everything under it.
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    patterns: Vec<String>,
    set: RegexSet,
}

impl ExclusionSet {
    /// Compile exclusion patterns
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut sources = Vec::with_capacity(patterns.len());
        let mut kept = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim_matches('/');
            if pattern.is_empty() {
                continue;
            }
            let body = pattern
                .split('/')
                .map(|component| regex::escape(component).replace(r"\*", "[^/]*"))
                .collect::<Vec<_>>()
                .join("/");
            sources.push(format!("(^|/){body}(/|$)"));
            kept.push(pattern.to_string());
        }

        let set = RegexSet::new(&sources)
            .map_err(|e| ContainerError::Config(format!("invalid exclusion pattern: {e}")))?;
        Ok(ExclusionSet {
            patterns: kept,
            set,
        })
    }

    /// An exclusion set matching nothing
    pub fn empty() -> Self {
        ExclusionSet {
            patterns: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    /// Patterns as configured
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a member path (top-level directory already stripped) is excluded.
    pub fn is_excluded(&self, member: &Path) -> bool {
        let normalized = member
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        self.set.is_match(&normalized)
    }
}

/// Counters from one extraction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub extracted: usize,
    pub excluded: usize,
}

/// Extracts runtime archives into a [`ProvisioningLayout`]
#[derive(Debug, Clone)]
pub struct ArchiveProvisioner {
    exclusions: ExclusionSet,
    overlay: Option<PathBuf>,
}

impl ArchiveProvisioner {
    /// Create a provisioner applying `exclusions`
    pub fn new(exclusions: ExclusionSet) -> Self {
        ArchiveProvisioner {
            exclusions,
            overlay: None,
        }
    }

    /// Copy the files under `dir` over the runtime root after extraction
    pub fn with_overlay(mut self, dir: impl Into<PathBuf>) -> Self {
        self.overlay = Some(dir.into());
        self
    }

    /// Whether the runtime root already holds a complete extraction of `version`
    pub fn is_current(&self, layout: &ProvisioningLayout, version: &str) -> bool {
        layout.extracted_version().as_deref() == Some(version)
    }

    /// Provision `layout` from `archive`.
    ///
    /// The runtime root is only rebuilt when it does not already hold
    /// `version`; the mutable root is always recreated and the overlay always
    /// reapplied. Produces [`ProvisioningState::Extracted`].
    pub fn provision(
        &self,
        archive: &Path,
        version: &str,
        layout: &ProvisioningLayout,
    ) -> Result<ProvisioningLayout> {
        if self.is_current(layout, version) {
            debug!(version = %version, "Runtime root already current, skipping extraction");
        } else {
            let started = Instant::now();
            fsutil::recreate_dir(&layout.runtime_root)?;
            let stats = self.extract(archive, &layout.runtime_root)?;
            std::fs::write(layout.version_marker(), version)?;
            info!(
                version = %version,
                extracted = stats.extracted,
                excluded = stats.excluded,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Expanded runtime archive"
            );
        }
        self.refresh(layout)
    }

    /// Reset the mutable root and reapply the overlay on an extracted layout.
    pub fn refresh(&self, layout: &ProvisioningLayout) -> Result<ProvisioningLayout> {
        layout.require(ProvisioningState::Extracted)?;
        fsutil::recreate_dir(&layout.mutable_root)?;

        if let Some(overlay) = &self.overlay {
            if overlay.is_dir() {
                let copied = fsutil::copy_tree(overlay, &layout.runtime_root, true)?;
                debug!(overlay = %overlay.display(), files = copied, "Applied overlay resources");
            } else {
                debug!(overlay = %overlay.display(), "No overlay resources present");
            }
        }

        Ok(layout.clone())
    }

    /// Extract `archive` into `dest`, stripping the top-level directory.
    pub fn extract(&self, archive: &Path, dest: &Path) -> Result<ExtractionStats> {
        let failed = |cause: &dyn std::fmt::Display| ContainerError::extraction(archive, cause);

        let root = dest.canonicalize().map_err(|e| failed(&e))?;
        let file = File::open(archive).map_err(|e| failed(&e))?;
        let mut tarball = Archive::new(GzDecoder::new(file));
        let mut stats = ExtractionStats::default();

        for entry in tarball.entries().map_err(|e| failed(&e))? {
            let mut entry = entry.map_err(|e| failed(&e))?;
            let member = entry.path().map_err(|e| failed(&e))?.into_owned();

            let Some(relative) = strip_top_level(&member).map_err(|e| failed(&e))? else {
                continue;
            };

            if self.exclusions.is_excluded(&relative) {
                debug!(member = %relative.display(), "Excluded archive member");
                stats.excluded += 1;
                continue;
            }

            check_ancestors(&root, dest, &relative).map_err(|e| failed(&e))?;
            let target = dest.join(&relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| failed(&e))?;
            }
            // Never write through a link left by an earlier member
            if std::fs::symlink_metadata(&target).is_ok_and(|m| m.file_type().is_symlink()) {
                fsutil::remove_existing(&target).map_err(|e| failed(&e))?;
            }

            if entry.header().entry_type() == EntryType::Link {
                let link_name = entry
                    .link_name()
                    .map_err(|e| failed(&e))?
                    .ok_or_else(|| failed(&"hard link without a target"))?
                    .into_owned();
                let source = strip_top_level(&link_name)
                    .map_err(|e| failed(&e))?
                    .ok_or_else(|| {
                        failed(&format!("invalid hard link target {}", link_name.display()))
                    })?;
                if self.exclusions.is_excluded(&source) {
                    debug!(
                        member = %relative.display(),
                        target = %source.display(),
                        "Hard link to excluded member skipped"
                    );
                    stats.excluded += 1;
                    continue;
                }
                check_ancestors(&root, dest, &source).map_err(|e| failed(&e))?;
                let source = dest.join(source);
                check_confined(&root, &source).map_err(|e| failed(&e))?;
                fsutil::remove_existing(&target).map_err(|e| failed(&e))?;
                std::fs::hard_link(&source, &target)
                    .or_else(|_| std::fs::copy(&source, &target).map(|_| ()))
                    .map_err(|e| failed(&e))?;
            } else {
                entry.unpack(&target).map_err(|e| failed(&e))?;
            }
            stats.extracted += 1;
        }

        Ok(stats)
    }
}

/// Reject `relative` if one of its parent directories under `dest` is a
/// symlink resolving outside `root`.
fn check_ancestors(root: &Path, dest: &Path, relative: &Path) -> std::result::Result<(), String> {
    let mut current = dest.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        check_confined(root, &current)?;
    }
    Ok(())
}

/// Reject `path` if it is a symlink that does not resolve inside `root`.
fn check_confined(root: &Path, path: &Path) -> std::result::Result<(), String> {
    let is_symlink = std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink());
    if !is_symlink {
        return Ok(());
    }
    let escapes = path
        .canonicalize()
        .map_or(true, |resolved| !resolved.starts_with(root));
    if escapes {
        return Err(format!(
            "member escapes the extraction root through link {}",
            path.display()
        ));
    }
    Ok(())
}

/// Drop the archive's top-level directory from a member path.
///
/// Returns `None` for the top-level directory itself. Members that would
/// escape the extraction root are an error.
fn strip_top_level(member: &Path) -> std::result::Result<Option<PathBuf>, String> {
    let mut parts = Vec::new();
    for component in member.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(format!(
                    "member escapes the extraction root: {}",
                    member.display()
                ));
            }
        }
    }

    if parts.len() < 2 {
        return Ok(None);
    }
    Ok(Some(parts[1..].iter().collect()))
}

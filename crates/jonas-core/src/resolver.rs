//! Version resolution against a repository index
//!
//! A repository is a directory or URL containing `index.json`, a JSON object
//! mapping concrete versions to download URIs.

use crate::config::ItemConfig;
use crate::error::ContainerError;
use crate::version::TokenizedVersion;
use crate::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Index file name inside a repository root
pub const INDEX_FILE: &str = "index.json";

/// A resolved artifact: concrete version plus where to fetch it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDescriptor {
    pub version: TokenizedVersion,
    pub source_uri: String,
}

impl RuntimeDescriptor {
    /// Create a descriptor
    pub fn new(version: TokenizedVersion, source_uri: &str) -> Self {
        RuntimeDescriptor {
            version,
            source_uri: source_uri.to_string(),
        }
    }
}

/// Everything resolved for one application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifacts {
    pub runtime: RuntimeDescriptor,
    pub support: Option<RuntimeDescriptor>,
    pub deployer: Option<RuntimeDescriptor>,
}

/// Validator run against the resolved candidate
pub type Validator<'a> = &'a dyn Fn(&TokenizedVersion) -> Result<()>;

/// Maps a configuration and version constraint to a concrete version and URI
pub trait VersionResolver {
    /// Resolve `item`, running `validator` on the chosen candidate.
    ///
    /// `Ok(None)` means the item does not apply.
    fn find(
        &self,
        item: &ItemConfig,
        validator: Option<Validator<'_>>,
    ) -> Result<Option<RuntimeDescriptor>>;
}

/// Resolver reading `index.json` from a local directory, `file://` or `http(s)://` root
#[derive(Debug, Default)]
pub struct IndexResolver;

impl IndexResolver {
    /// Create a resolver
    pub fn new() -> Self {
        IndexResolver
    }

    fn read_index(&self, repository_root: &str) -> Result<String> {
        let root = repository_root.trim_end_matches('/');
        if root.is_empty() {
            return Err(ContainerError::Config(
                "repository_root must be set".to_string(),
            ));
        }

        if root.starts_with("http://") || root.starts_with("https://") {
            let url = format!("{root}/{INDEX_FILE}");
            debug!(url = %url, "Fetching repository index");
            let client = reqwest::blocking::Client::builder()
                .user_agent(concat!("jonas-core/", env!("CARGO_PKG_VERSION")))
                .build()?;
            let response = client.get(&url).send()?.error_for_status()?;
            return Ok(response.text()?);
        }

        let dir = root.strip_prefix("file://").unwrap_or(root);
        let path = Path::new(dir).join(INDEX_FILE);
        debug!(path = %path.display(), "Reading repository index");
        Ok(std::fs::read_to_string(path)?)
    }
}

impl VersionResolver for IndexResolver {
    fn find(
        &self,
        item: &ItemConfig,
        validator: Option<Validator<'_>>,
    ) -> Result<Option<RuntimeDescriptor>> {
        let index: BTreeMap<String, String> =
            serde_json::from_str(&self.read_index(&item.repository_root)?)?;
        let constraint = TokenizedVersion::parse(&item.version)?;

        let descriptor = select_from_index(&index, &constraint)?.ok_or_else(|| {
            ContainerError::Resolution {
                constraint: item.version.clone(),
                repository_root: item.repository_root.clone(),
            }
        })?;

        if let Some(validate) = validator {
            validate(&descriptor.version)?;
        }

        Ok(Some(descriptor))
    }
}

/// Pick the highest index entry satisfying `constraint`.
///
/// Index keys that are not valid versions are ignored.
pub fn select_from_index(
    index: &BTreeMap<String, String>,
    constraint: &TokenizedVersion,
) -> Result<Option<RuntimeDescriptor>> {
    let best = index
        .iter()
        .filter_map(|(raw, uri)| TokenizedVersion::parse(raw).ok().map(|v| (v, uri)))
        .filter(|(version, _)| !version.is_wildcard() && constraint.matches(version))
        .max_by(|(a, _), (b, _)| a.cmp(b));

    Ok(best.map(|(version, uri)| RuntimeDescriptor::new(version, uri)))
}

//! Artifact acquisition
//!
//! An acquirer hands a fully materialised local file to a callback. The
//! callback is never invoked when acquisition fails.

use crate::error::ContainerError;
use crate::Result;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Yields a local file for a URI for the duration of a callback
pub trait ArtifactAcquirer {
    /// Acquire `uri` and pass the local path to `consume`.
    fn get(&self, uri: &str, consume: &mut dyn FnMut(&Path) -> Result<()>) -> Result<()>;
}

/// Acquirer backed by a content-addressed download cache
///
/// Local paths and `file://` URIs are used in place. Remote artifacts are
/// stored under `sha256(uri)` and downloaded only once.
#[derive(Debug, Clone)]
pub struct CachedAcquirer {
    cache_dir: PathBuf,
}

impl CachedAcquirer {
    /// Create an acquirer caching into `cache_dir`
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        CachedAcquirer {
            cache_dir: cache_dir.into(),
        }
    }

    /// Cache location for a remote URI
    pub fn cache_path(&self, uri: &str) -> PathBuf {
        let key = hex::encode(Sha256::digest(uri.as_bytes()));
        self.cache_dir.join(format!("{key}.cached"))
    }

    fn download(&self, uri: &str, target: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;

        let acquisition = |reason: String| ContainerError::Acquisition {
            uri: uri.to_string(),
            reason,
        };

        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("jonas-core/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let mut response = client
            .get(uri)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| acquisition(e.to_string()))?;

        // Unique temp name so an interrupted download never looks complete
        let temp_path = target.with_extension(format!("partial.{}", std::process::id()));
        let result = (|| -> Result<()> {
            let mut file = File::create(&temp_path)?;
            response
                .copy_to(&mut file)
                .map_err(|e| acquisition(e.to_string()))?;
            file.flush()?;
            std::fs::rename(&temp_path, target)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
        }
        result
    }
}

impl ArtifactAcquirer for CachedAcquirer {
    fn get(&self, uri: &str, consume: &mut dyn FnMut(&Path) -> Result<()>) -> Result<()> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            let cached = self.cache_path(uri);
            if cached.exists() {
                debug!(uri = %uri, path = %cached.display(), "Using cached artifact");
            } else {
                info!(uri = %uri, "Downloading artifact");
                self.download(uri, &cached)?;
            }
            return consume(&cached);
        }

        let local = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
        if !local.is_file() {
            return Err(ContainerError::Acquisition {
                uri: uri.to_string(),
                reason: "no such file".to_string(),
            });
        }
        consume(local)
    }
}

//! Filesystem result store.
//!
//! Layout for fingerprint `abcd1234...`:
//!
//! ```text
//! <root>/abcd/1234/.../<fingerprint>.rs    submitted source
//! <root>/abcd/1234/.../<fingerprint>.json  serialized CacheEntry
//! ```
//!
//! Both files are written to a temporary name and renamed into place, source
//! first. The `.json` file therefore never exists without its source, and a
//! reader never sees a half-written file.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use playpen_core::{
    config::StoreConfig,
    traits::ResultStore,
    types::{CacheEntry, Fingerprint},
    Error, Result,
};

pub struct FileResultStore {
    root: PathBuf,
    segment_width: usize,
}

impl FileResultStore {
    pub fn new(root: impl Into<PathBuf>, segment_width: usize) -> Self {
        Self {
            root: root.into(),
            segment_width,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.root, config.segment_width)
    }

    /// Path of the entry without extension.
    pub fn path_for(&self, id: &Fingerprint) -> PathBuf {
        let mut path = self.root.clone();
        for segment in id.segments(self.segment_width) {
            path.push(segment);
        }
        path.push(id.as_str());
        path
    }

    async fn read_optional(path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, content).await.map_err(|e| {
            Error::storage(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::storage(format!(
                "Failed to move {} into place: {}",
                path.display(),
                e
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ResultStore for FileResultStore {
    async fn load(&self, id: &Fingerprint) -> Result<Option<CacheEntry>> {
        let path = self.path_for(id).with_extension("json");
        let Some(content) = Self::read_optional(&path).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&content) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                // Treat as absent so the request is simply re-executed.
                tracing::warn!(path = %path.display(), error = %e, "Unreadable cache entry");
                Ok(None)
            }
        }
    }

    async fn load_source(&self, id: &Fingerprint) -> Result<Option<String>> {
        Self::read_optional(&self.path_for(id).with_extension("rs")).await
    }

    async fn save(&self, id: &Fingerprint, entry: &CacheEntry) -> Result<()> {
        let base = self.path_for(id);
        if let Some(parent) = base.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        Self::write_atomic(&base.with_extension("rs"), entry.source.as_bytes()).await?;
        let json = serde_json::to_vec(entry)?;
        Self::write_atomic(&base.with_extension("json"), &json).await?;

        tracing::debug!(id = %id, path = %base.display(), "Cache entry saved");
        Ok(())
    }
}

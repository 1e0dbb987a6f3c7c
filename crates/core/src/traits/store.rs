//! Persistent result store trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CacheEntry, Fingerprint};

/// Content-addressed store of completed HTTP requests.
///
/// Entries are permanent. Writers may race; the last one wins. Readers must
/// treat a partially present entry as absent.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Load a complete entry.
    async fn load(&self, id: &Fingerprint) -> Result<Option<CacheEntry>>;

    /// Load only the submitted source.
    async fn load_source(&self, id: &Fingerprint) -> Result<Option<String>>;

    /// Persist an entry under `id`.
    async fn save(&self, id: &Fingerprint, entry: &CacheEntry) -> Result<()>;
}

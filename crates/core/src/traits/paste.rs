//! Paste fallback trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ReleaseChannel;

/// Publishes source that was too large to show inline.
#[async_trait]
pub trait PasteService: Send + Sync {
    /// Upload `source` and return a URL pointing at it.
    async fn publish(&self, source: &str, channel: ReleaseChannel) -> Result<String>;
}

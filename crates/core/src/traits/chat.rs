//! Chat network trait.

use async_trait::async_trait;

use crate::error::Result;

/// Outbound half of a chat connection.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a single-line notice to a channel or nickname.
    async fn notice(&self, target: &str, line: &str) -> Result<()>;
}

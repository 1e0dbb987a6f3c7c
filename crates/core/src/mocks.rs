//! Mock implementations of core traits for testing.
//!
//! The sandbox mock lives next to the real backends in `playpen_sandbox`;
//! everything else that talks to the outside world is mocked here.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::{
    traits::{ChatTransport, PasteService},
    types::ReleaseChannel,
    Error, Result,
};

// =============================================================================
// Mock Paste Service
// =============================================================================

/// Paste service that hands out predictable URLs and records every upload.
pub struct MockPasteService {
    base_url: String,
    fail: bool,
    published: Mutex<Vec<(String, ReleaseChannel)>>,
}

impl MockPasteService {
    /// A paste service returning `{base_url}/{n}` for the n-th upload.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            fail: false,
            published: Mutex::new(Vec::new()),
        }
    }

    /// A paste service whose uploads always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    /// Sources uploaded so far, with their channel.
    pub fn published(&self) -> Vec<(String, ReleaseChannel)> {
        self.published.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl PasteService for MockPasteService {
    async fn publish(&self, source: &str, channel: ReleaseChannel) -> Result<String> {
        let mut published = self.published.lock().unwrap();
        published.push((source.to_string(), channel));
        if self.fail {
            return Err(Error::paste("mock paste service is down"));
        }
        Ok(format!("{}/{}", self.base_url, published.len()))
    }
}

// =============================================================================
// Recording Chat Transport
// =============================================================================

/// Chat transport that keeps every notice in memory.
#[derive(Default)]
pub struct RecordingTransport {
    notices: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(target, line)` pairs in the order they were sent.
    pub fn notices(&self) -> Vec<(String, String)> {
        self.notices.lock().unwrap().clone()
    }

    /// Lines sent to `target`.
    pub fn lines_to(&self, target: &str) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == target)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn notice(&self, target: &str, line: &str) -> Result<()> {
        self.notices
            .lock()
            .unwrap()
            .push((target.to_string(), line.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_paste_numbers_uploads() {
        let paste = MockPasteService::new("https://paste.test");
        let first = paste.publish("a", ReleaseChannel::Stable).await.unwrap();
        let second = paste.publish("b", ReleaseChannel::Nightly).await.unwrap();

        assert_eq!(first, "https://paste.test/1");
        assert_eq!(second, "https://paste.test/2");
        assert_eq!(paste.published()[1], ("b".to_string(), ReleaseChannel::Nightly));
    }

    #[tokio::test]
    async fn test_failing_paste_still_records() {
        let paste = MockPasteService::failing();
        assert!(paste.publish("a", ReleaseChannel::Stable).await.is_err());
        assert_eq!(paste.call_count(), 1);
    }
}

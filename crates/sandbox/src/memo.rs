//! In-process memoization of sandbox runs.

use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use playpen_core::traits::Sandbox;
use playpen_core::types::{ExecutionRequest, ExecutionResult};
use playpen_core::Result;
use playpen_telemetry::{track_cache, CacheLayer};

/// Wraps a backend with a bounded LRU keyed by the full request.
///
/// The lock is never held across the inner call, so a slow miss does not
/// block lookups of other keys. Two identical requests racing on a miss will
/// both execute; the later insert wins. Launch errors are not remembered.
pub struct MemoizedSandbox {
    inner: Arc<dyn Sandbox>,
    cache: Mutex<LruCache<ExecutionRequest, ExecutionResult>>,
}

impl MemoizedSandbox {
    pub fn new(inner: Arc<dyn Sandbox>, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Wrap `inner` unless `capacity` is zero, in which case it is returned
    /// untouched.
    pub fn wrap(inner: Arc<dyn Sandbox>, capacity: usize) -> Arc<dyn Sandbox> {
        match NonZeroUsize::new(capacity) {
            Some(cap) => Arc::new(Self::new(inner, cap)),
            None => inner,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, request: &ExecutionRequest) -> Option<ExecutionResult> {
        // A poisoned lock only means another request panicked mid-insert;
        // the cache is still usable.
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(request).cloned()
    }

    fn remember(&self, request: &ExecutionRequest, result: &ExecutionResult) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(request.clone(), result.clone());
    }
}

#[async_trait]
impl Sandbox for MemoizedSandbox {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        if let Some(result) = self.lookup(request) {
            tracing::trace!(channel = %request.channel(), command = %request.command(), "Memo hit");
            track_cache(CacheLayer::Memo, true);
            return Ok(result);
        }
        track_cache(CacheLayer::Memo, false);

        let result = self.inner.execute(request).await?;
        self.remember(request, &result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockSandbox;
    use playpen_core::types::ReleaseChannel;

    fn request(input: &str) -> ExecutionRequest {
        ExecutionRequest::builder(ReleaseChannel::Stable, "/usr/local/bin/evaluate.sh")
            .input(input)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_identical_request_hits_memo() {
        let mock = Arc::new(MockSandbox::always(b"42".to_vec()));
        let memo = MemoizedSandbox::new(mock.clone(), NonZeroUsize::new(4).unwrap());

        let first = memo.execute(&request("1")).await.unwrap();
        let second = memo.execute(&request("1")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(memo.len(), 1);
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let mock = Arc::new(MockSandbox::always(b"ok".to_vec()));
        let memo = MemoizedSandbox::new(mock.clone(), NonZeroUsize::new(2).unwrap());

        memo.execute(&request("a")).await.unwrap();
        memo.execute(&request("b")).await.unwrap();
        memo.execute(&request("a")).await.unwrap(); // refresh a
        memo.execute(&request("c")).await.unwrap(); // evicts b
        assert_eq!(mock.call_count(), 3);

        memo.execute(&request("a")).await.unwrap();
        assert_eq!(mock.call_count(), 3);
        memo.execute(&request("b")).await.unwrap();
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test]
    async fn test_errors_are_not_memoized() {
        let mock = Arc::new(MockSandbox::failing("down"));
        let memo = MemoizedSandbox::new(mock.clone(), NonZeroUsize::new(4).unwrap());

        assert!(memo.execute(&request("1")).await.is_err());
        assert!(memo.execute(&request("1")).await.is_err());
        assert_eq!(mock.call_count(), 2);
        assert!(memo.is_empty());
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_memo() {
        let mock = Arc::new(MockSandbox::always(b"ok".to_vec()));
        let sandbox = MemoizedSandbox::wrap(mock.clone(), 0);

        sandbox.execute(&request("1")).await.unwrap();
        sandbox.execute(&request("1")).await.unwrap();
        assert_eq!(mock.call_count(), 2);
    }
}

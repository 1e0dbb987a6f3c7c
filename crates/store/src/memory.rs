//! In-memory result store implementation using DashMap.

use async_trait::async_trait;
use dashmap::DashMap;

use playpen_core::{
    traits::ResultStore,
    types::{CacheEntry, Fingerprint},
    Result,
};

/// Result store kept entirely in memory. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    entries: DashMap<Fingerprint, CacheEntry>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn load(&self, id: &Fingerprint) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(id).map(|r| r.clone()))
    }

    async fn load_source(&self, id: &Fingerprint) -> Result<Option<String>> {
        Ok(self.entries.get(id).map(|r| r.source.clone()))
    }

    async fn save(&self, id: &Fingerprint, entry: &CacheEntry) -> Result<()> {
        self.entries.insert(id.clone(), entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_last_writer_wins() {
        let store = InMemoryResultStore::new();
        let id = Fingerprint::of_fields(json!({"code": "1"}).as_object().unwrap(), "/evaluate.json");

        assert!(store.load(&id).await.unwrap().is_none());

        store.save(&id, &CacheEntry::new("1", json!({"result": "a"}))).await.unwrap();
        store.save(&id, &CacheEntry::new("1", json!({"result": "b"}))).await.unwrap();

        let entry = store.load(&id).await.unwrap().unwrap();
        assert_eq!(entry.output, json!({"result": "b"}));
        assert_eq!(store.load_source(&id).await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.len(), 1);
    }
}

//! Two-tier audio cache.
//!
//! The memory tier holds decoded buffers for the process lifetime; the
//! durable tier holds encoded PCM bytes across restarts. There is no
//! eviction: the vocabulary is small and bounded.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::decode::{decode, AudioBuffer};
use super::store::DurableStore;
use crate::error::AudioError;

pub struct AudioCache {
    memory: Mutex<HashMap<String, Arc<AudioBuffer>>>,
    durable: Arc<dyn DurableStore>,
}

impl AudioCache {
    pub fn new(durable: Arc<dyn DurableStore>) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            durable,
        }
    }

    /// Memory tier only, no I/O.
    pub fn get_decoded(&self, key: &str) -> Option<Arc<AudioBuffer>> {
        self.memory.lock().get(key).cloned()
    }

    /// Memory tier first, then the durable tier. Durable hits are decoded
    /// and promoted. Read or decode failures count as a miss.
    pub async fn lookup(&self, key: &str) -> Option<Arc<AudioBuffer>> {
        if let Some(buffer) = self.get_decoded(key) {
            return Some(buffer);
        }

        let bytes = match self.durable.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Durable cache read failed for '{key}': {e}");
                return None;
            }
        };

        match decode(&bytes) {
            Ok(buffer) => {
                debug!("Promoted '{key}' from durable cache ({} bytes)", bytes.len());
                let buffer = Arc::new(buffer);
                self.insert_decoded(key, buffer.clone());
                Some(buffer)
            }
            Err(e) => {
                warn!("Discarding unreadable cache entry '{key}': {e}");
                None
            }
        }
    }

    /// Presence check used to filter pre-fetch batches.
    pub async fn contains(&self, key: &str) -> bool {
        if self.memory.lock().contains_key(key) {
            return true;
        }
        matches!(self.durable.contains(key).await, Ok(true))
    }

    /// Best-effort durable write. Failures are logged, never returned.
    pub async fn store(&self, key: &str, bytes: &[u8]) {
        if let Err(e) = self.durable.put(key, bytes).await {
            let failure = AudioError::CacheWrite {
                key: key.to_string(),
                reason: e.to_string(),
            };
            warn!("{failure}");
        }
    }

    pub fn insert_decoded(&self, key: &str, buffer: Arc<AudioBuffer>) {
        self.memory.lock().insert(key.to_string(), buffer);
    }

    pub fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speaker::store::{FileStore, MemoryStore};
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl DurableStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, AudioError> {
            Err(std::io::Error::other("disk gone").into())
        }

        async fn put(&self, _key: &str, _bytes: &[u8]) -> Result<(), AudioError> {
            Err(std::io::Error::other("disk full").into())
        }
    }

    /// Counts reads; presence checks go through `contains`.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        reads: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl DurableStore for CountingStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AudioError> {
            self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), AudioError> {
            self.inner.put(key, bytes).await
        }

        async fn contains(&self, key: &str) -> Result<bool, AudioError> {
            self.inner.contains(key).await
        }
    }

    fn pcm(n: usize) -> Vec<u8> {
        (0..n).flat_map(|i| (i as i16).to_le_bytes()).collect()
    }

    #[tokio::test]
    async fn test_durable_hit_is_promoted() {
        let store = Arc::new(MemoryStore::new());
        store.put("Mela", &pcm(4)).await.unwrap();
        let cache = AudioCache::new(store);

        assert!(cache.get_decoded("Mela").is_none());
        let buffer = cache.lookup("Mela").await.unwrap();
        assert_eq!(buffer.samples.len(), 4);
        assert!(cache.get_decoded("Mela").is_some());
        assert_eq!(cache.memory_len(), 1);
    }

    #[tokio::test]
    async fn test_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = AudioCache::new(Arc::new(FileStore::new(dir.path())));
            cache.store("Pane|||রুটি", &pcm(10)).await;
        }

        let fresh = AudioCache::new(Arc::new(FileStore::new(dir.path())));
        let buffer = fresh.lookup("Pane|||রুটি").await.unwrap();
        assert_eq!(buffer.samples.len(), 10);
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let cache = AudioCache::new(Arc::new(BrokenStore));
        cache.store("Acqua", &pcm(2)).await;
        assert!(cache.lookup("Acqua").await.is_none());
        assert!(!cache.contains("Acqua").await);
    }

    #[tokio::test]
    async fn test_contains_checks_both_tiers() {
        let store = Arc::new(MemoryStore::new());
        store.put("Luna", &pcm(2)).await.unwrap();
        let cache = AudioCache::new(store);
        cache.insert_decoded("Sole", Arc::new(decode(&pcm(2)).unwrap()));

        assert!(cache.contains("Luna").await);
        assert!(cache.contains("Sole").await);
        assert!(!cache.contains("Stella").await);
    }

    #[tokio::test]
    async fn test_contains_does_not_read_blobs() {
        let store = Arc::new(CountingStore::default());
        store.put("Luna", &pcm(2)).await.unwrap();
        let cache = AudioCache::new(store.clone());

        assert!(cache.contains("Luna").await);
        assert!(!cache.contains("Stella").await);
        assert_eq!(store.reads.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}

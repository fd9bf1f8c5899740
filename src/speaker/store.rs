//! Durable key -> blob stores for synthesized audio.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::AudioError;

/// Persistent byte-blob map keyed by payload strings.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AudioError>;
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), AudioError>;

    /// Presence check. The default reads the entry.
    async fn contains(&self, key: &str) -> Result<bool, AudioError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// One file per key, named by the SHA-256 of the key.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.dir.join(format!("{name}.pcm"))
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AudioError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), AudioError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        // Write to a temp file first so a crash never leaves a truncated entry.
        let tmp = path.with_extension("pcm.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, AudioError> {
        Ok(tokio::fs::try_exists(self.path_for(key)).await?)
    }
}

/// Process-lifetime store, used when persistence is disabled.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AudioError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), AudioError> {
        self.entries.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, AudioError> {
        Ok(self.entries.lock().contains_key(key))
    }
}

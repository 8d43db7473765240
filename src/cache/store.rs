//! Generic, lock-free-read, atomic-write JSON store for catalog indices and
//! per-artist meta pages. Generalizes the teacher's per-manager
//! `persist`/`load` pairs into one reusable type keyed by file name.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::cache::lock::CacheLock;
use crate::error::ShowVaultError;
use crate::Res;

#[derive(Clone)]
pub struct CacheStore {
    dir: PathBuf,
    lock: std::sync::Arc<CacheLock>,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            lock: std::sync::Arc::new(CacheLock::new(&dir)),
            dir,
        }
    }

    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("showvault")
            .join("cache")
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Exposes the on-disk path for a named index, for callers that need to
    /// perform a locked read-modify-write spanning more than one index.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.index_path(name)
    }

    /// Writes to `<path>.tmp` in the same directory, then renames; partial
    /// files are never observable (§4.2).
    pub async fn atomic_write(&self, path: &Path, bytes: &[u8]) -> Res<()> {
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }
        let tmp_path = path.with_extension(match path.extension() {
            Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
            None => "tmp".to_string(),
        });
        async_fs::write(&tmp_path, bytes).await?;
        async_fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    /// Lock-free read. Readers must tolerate a concurrent rename; the
    /// renamed-away inode stays valid until this read completes.
    pub async fn read_index<T: DeserializeOwned>(&self, name: &str) -> Res<Option<T>> {
        let path = self.index_path(name);
        match async_fs::read(&path).await {
            Ok(bytes) => {
                let value: T = serde_json::from_slice(&bytes)
                    .map_err(|e| ShowVaultError::CachePersistence(e.to_string()))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Takes the cache lock, then performs an atomic write under it.
    pub async fn write_index<T: Serialize + Send + Sync>(&self, name: &str, value: &T) -> Res<()> {
        let path = self.index_path(name);
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| ShowVaultError::CachePersistence(e.to_string()))?;
        self.lock.with_lock(|| async { self.atomic_write(&path, &bytes).await }).await
    }

    pub async fn with_lock<F, Fut, T>(&self, f: F) -> Res<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Res<T>>,
    {
        self.lock.with_lock(f).await
    }

    pub fn artist_meta_name(artist_id: u64) -> String {
        format!("artist_meta_{artist_id}")
    }
}

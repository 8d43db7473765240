//! Cross-process advisory lock, abstracted behind a single `with_lock`
//! capability (§9 REDESIGN FLAGS: "abstract behind a single capability
//! interface with `WithLock(fn)` semantics").

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs4::tokio::AsyncFileExt;
use tokio::fs::{File, OpenOptions};
use tokio::time::sleep;

use crate::error::ShowVaultError;
use crate::Res;

const LOCK_FILE_NAME: &str = ".catalog.lock";
const MAX_RETRIES: u32 = 50;
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

pub struct CacheLock {
    path: PathBuf,
}

impl CacheLock {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(LOCK_FILE_NAME),
        }
    }

    /// Acquires a process-wide advisory lock keyed on the fixed lockfile,
    /// retrying up to 50 times at 100ms intervals (~5s total), runs `f`
    /// under the lock, then releases it. Semantics are cross-process: on
    /// POSIX this is `flock`, on other platforms `fs4` uses the native
    /// mandatory-by-handle equivalent.
    pub async fn with_lock<F, Fut, T>(&self, f: F) -> Res<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Res<T>>,
    {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .await?;

        let mut attempts = 0;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(_) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(RETRY_INTERVAL).await;
                }
                Err(_) => {
                    return Err(ShowVaultError::CachePersistence(format!(
                        "LockBusy: could not acquire {} after {} retries",
                        self.path.display(),
                        MAX_RETRIES
                    )));
                }
            }
        }

        let result = f().await;
        let _ = AsyncFileExt::unlock(&file);
        drop(file);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn serializes_concurrent_critical_sections() {
        let dir = std::env::temp_dir().join(format!("showvault-lock-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let lock = Arc::new(CacheLock::new(&dir));
        let counter = Arc::new(Mutex::new(0i32));
        let observed_overlap = Arc::new(Mutex::new(false));

        let mut handles = vec![];
        for _ in 0..10 {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            let observed_overlap = Arc::clone(&observed_overlap);
            handles.push(tokio::spawn(async move {
                lock.with_lock(|| async {
                    let mut guard = counter.lock().await;
                    *guard += 1;
                    if *guard != 1 {
                        *observed_overlap.lock().await = true;
                    }
                    sleep(Duration::from_millis(5)).await;
                    *guard -= 1;
                    Ok(())
                })
                .await
                .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(!*observed_overlap.lock().await);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}

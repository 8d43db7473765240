//! Size pre-calculation (§4.7 step 6, §5 concurrency point 1).
//!
//! Fans HEAD requests out across all tracks bounded by a semaphore of
//! capacity 8, each with a 5s timeout, under an overall deadline of
//! `min(tracks * 5s, 60s)`. Any per-track failure silently contributes zero;
//! a deadline cutoff returns whatever partial sum has accumulated so far.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::remote::RemoteClient;

const MAX_CONCURRENT_HEAD_REQUESTS: usize = 8;
const HEAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Sums `Content-Length` across `urls` under the bounded fan-out described
/// above. Never fails: an unreachable URL or an exhausted deadline both just
/// shrink the final sum.
pub async fn precalculate_total_size(remote: &RemoteClient, urls: &[String]) -> u64 {
    if urls.is_empty() {
        return 0;
    }

    let sem = Arc::new(Semaphore::new(MAX_CONCURRENT_HEAD_REQUESTS));
    let total = Arc::new(AtomicU64::new(0));
    let deadline = Duration::from_secs(60).min(HEAD_TIMEOUT * urls.len() as u32);

    let fanout = async {
        let mut set = JoinSet::new();
        for url in urls {
            let sem = Arc::clone(&sem);
            let total = Arc::clone(&total);
            let remote = remote.clone();
            let url = url.clone();
            set.spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore not closed");
                if let Some(len) = remote.head_content_length(&url, HEAD_TIMEOUT).await {
                    total.fetch_add(len, Ordering::Relaxed);
                }
            });
        }
        while set.join_next().await.is_some() {}
    };

    let _ = timeout(deadline, fanout).await;
    total.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_track_list_sums_to_zero() {
        let remote = RemoteClient::new("https://example.invalid");
        assert_eq!(precalculate_total_size(&remote, &[]).await, 0);
    }

    #[tokio::test]
    async fn unreachable_urls_contribute_zero_without_error() {
        let remote = RemoteClient::new("https://example.invalid");
        let urls = vec!["https://example.invalid/a".to_string()];
        assert_eq!(precalculate_total_size(&remote, &urls).await, 0);
    }
}

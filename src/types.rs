//! Data structures shared across the catalog, download, and runtime layers.
//!
//! Persisted entities derive `Serialize, Deserialize, Debug, Clone`, matching
//! the teacher's plain-struct `Token`/`Artist` style in its own `types.rs`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// The schema tag gating cache reads; bump when the on-disk shape changes.
pub const CACHE_VERSION: &str = "v1";

/// One show in the remote catalog snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub container_id: u64,
    pub artist_id: u64,
    pub artist_name: String,
    pub container_info: String,
    pub performance_date: DateTime<Utc>,
    pub venue: Option<String>,
    pub venue_city: Option<String>,
    pub venue_state: Option<String>,
    /// Opaque; empty or absent both mean "available".
    pub availability_type_str: Option<String>,
    pub products: Vec<String>,
    pub product_format_list: Vec<String>,
}

impl CatalogEntry {
    /// Video is present iff `Products`/`ProductFormatList` carry a
    /// `VIDEO ON DEMAND` or `LIVE HD VIDEO` entry (§3).
    pub fn has_video(&self) -> bool {
        const VIDEO_MARKERS: [&str; 2] = ["VIDEO ON DEMAND", "LIVE HD VIDEO"];
        self.products
            .iter()
            .chain(self.product_format_list.iter())
            .any(|p| VIDEO_MARKERS.iter().any(|m| p.eq_ignore_ascii_case(m)))
    }

    pub fn has_audio(&self) -> bool {
        !self.has_video() || self.products.iter().any(|p| !p.to_uppercase().contains("VIDEO"))
    }

    pub fn is_available(&self) -> bool {
        self.availability_type_str
            .as_deref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    }
}

/// Which media a show matches under a gap-detection filter (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MediaFilter {
    Audio,
    Video,
    Both,
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub last_updated: DateTime<Utc>,
    pub cache_version: String,
    pub total_shows: u64,
    pub total_artists: u64,
    pub api_method: String,
    pub update_duration_ms: u64,
    /// Set only once a full crawl has completed.
    pub full_crawl_at: Option<DateTime<Utc>>,
}

impl CacheMeta {
    pub fn new(api_method: &str, total_shows: u64, total_artists: u64, duration_ms: u64) -> Self {
        Self {
            last_updated: Utc::now(),
            cache_version: CACHE_VERSION.to_string(),
            total_shows,
            total_artists,
            api_method: api_method.to_string(),
            update_duration_ms: duration_ms,
            full_crawl_at: None,
        }
    }

    pub fn is_current_schema(&self) -> bool {
        self.cache_version == CACHE_VERSION
    }
}

/// case-folded artist name -> ArtistID, unique keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistsIndex(pub BTreeMap<String, u64>);

impl ArtistsIndex {
    pub fn insert(&mut self, name: &str, artist_id: u64) {
        self.0.insert(name.to_lowercase(), artist_id);
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.0.get(&name.to_lowercase()).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerIndexEntry {
    pub artist_id: u64,
    pub artist_name: String,
    pub container_info: String,
    pub performance_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainersIndex(pub BTreeMap<u64, ContainerIndexEntry>);

impl ContainersIndex {
    /// Additive merge: existing ContainerIDs are never overwritten. Returns
    /// the count of newly inserted IDs.
    pub fn merge(&mut self, entries: &[CatalogEntry]) -> usize {
        let mut inserted = 0;
        for entry in entries {
            self.0.entry(entry.container_id).or_insert_with(|| {
                inserted += 1;
                ContainerIndexEntry {
                    artist_id: entry.artist_id,
                    artist_name: entry.artist_name.clone(),
                    container_info: entry.container_info.clone(),
                    performance_date: entry.performance_date,
                }
            });
        }
        inserted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistMetaCache {
    pub artist_id: u64,
    pub shows: Vec<CatalogEntry>,
    pub cached_at: DateTime<Utc>,
}

impl ArtistMetaCache {
    /// Default TTL is 24 hours (§3).
    pub fn is_stale(&self, ttl: chrono::Duration) -> bool {
        Utc::now() - self.cached_at > ttl
    }

    pub fn default_ttl() -> chrono::Duration {
        chrono::Duration::hours(24)
    }
}

/// Quality objects are ephemeral per track; Format carries the §4.5 meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quality {
    pub specs: String,
    pub extension: String,
    pub url: String,
    pub format: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
pub struct Track {
    pub track_id: u64,
    pub song_title: String,
    pub track_num: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamParams {
    pub subscription_id: String,
    pub user_id: String,
    pub sub_costplan_id_access_list: String,
    pub start_stamp: i64,
    pub end_stamp: i64,
}

/// Progress lifecycle phase (§9 REDESIGN FLAGS: a tagged variant rather than
/// one flat struct with nullable fields).
#[derive(Debug, Clone, Default)]
pub struct SpeedHistory {
    pub samples: Vec<f64>,
}

impl SpeedHistory {
    const CAPACITY: usize = 20;
    /// Smoothing factor for the exponentially-weighted moving average.
    const ALPHA: f64 = 0.3;

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == Self::CAPACITY {
            self.samples.remove(0);
        }
        self.samples.push(sample);
    }

    pub fn smoothed(&self) -> f64 {
        let mut ema = 0.0;
        for (i, s) in self.samples.iter().enumerate() {
            ema = if i == 0 { *s } else { Self::ALPHA * s + (1.0 - Self::ALPHA) * ema };
        }
        ema
    }
}

#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub track_number: u32,
    pub track_total: u32,
    pub track_name: String,
    pub track_format: u8,
    pub download_percent: f64,
    pub download_speed: f64,
    pub downloaded: u64,
    pub download_total: u64,
    pub download_eta: Option<std::time::Duration>,
    pub speed_history: SpeedHistory,
}

#[derive(Debug, Clone)]
pub struct UploadProgress {
    pub upload_percent: f64,
    pub upload_speed: f64,
    pub uploaded: u64,
    pub upload_total: u64,
    pub upload_eta: Option<std::time::Duration>,
    pub upload_speed_history: SpeedHistory,
}

#[derive(Debug, Clone)]
pub struct CompletionSummary {
    pub total_duration: std::time::Duration,
    pub skipped_tracks: u32,
    pub error_tracks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePriority {
    Status,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub priority: MessagePriority,
    pub text: String,
    pub expires_at: std::time::Instant,
}

/// Show/track-level fields common to every phase, plus the phase-exclusive
/// payload (REDESIGN FLAGS).
#[derive(Debug, Clone)]
pub struct ProgressBoxState {
    pub show_title: String,
    pub show_number: u32,
    pub show_percent: f64,
    pub show_downloaded: u64,
    pub show_total: u64,
    pub accumulated_bytes: u64,
    pub accumulated_tracks: u32,
    pub phase: ProgressPhase,
    pub start_time: std::time::Instant,
    pub completion_time: Option<std::time::Instant>,
    pub is_complete: bool,
    pub skipped_tracks: u32,
    pub error_tracks: u32,
    pub render_interval: std::time::Duration,
    pub last_render_at: Option<std::time::Instant>,
    pub message: Option<StatusMessage>,
}

#[derive(Debug, Clone)]
pub enum ProgressPhase {
    Download(DownloadProgress),
    Upload(UploadProgress),
    Complete(CompletionSummary),
}

impl ProgressBoxState {
    pub fn new(show_title: &str, show_number: u32) -> Self {
        Self {
            show_title: show_title.to_string(),
            show_number,
            show_percent: 0.0,
            show_downloaded: 0,
            show_total: 0,
            accumulated_bytes: 0,
            accumulated_tracks: 0,
            phase: ProgressPhase::Download(DownloadProgress {
                track_number: 0,
                track_total: 0,
                track_name: String::new(),
                track_format: 0,
                download_percent: 0.0,
                download_speed: 0.0,
                downloaded: 0,
                download_total: 0,
                download_eta: None,
                speed_history: SpeedHistory::default(),
            }),
            start_time: std::time::Instant::now(),
            completion_time: None,
            is_complete: false,
            skipped_tracks: 0,
            error_tracks: 0,
            render_interval: std::time::Duration::from_millis(100),
            last_render_at: None,
            message: None,
        }
    }

    /// Zeroes per-album fields while preserving aggregate counters, used when
    /// a shared box is reused across albums in a batch (§4.7 artist workflow).
    pub fn reset_for_next_album(&mut self, show_title: &str, show_number: u32) {
        let accumulated_bytes = self.accumulated_bytes;
        let accumulated_tracks = self.accumulated_tracks;
        *self = Self::new(show_title, show_number);
        self.accumulated_bytes = accumulated_bytes;
        self.accumulated_tracks = accumulated_tracks;
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchProgressState {
    pub total_albums: u32,
    pub current_album: u32,
    pub current_title: String,
    pub complete: u32,
    pub failed: u32,
    pub start_time: Option<std::time::Instant>,
}

/// Built once per artist (§4.10); replaces O(shows) remote probes.
#[derive(Debug, Clone, Default)]
pub struct ArtistPresenceIndex {
    pub local_folders: BTreeSet<String>,
    pub remote_folders: BTreeSet<String>,
    pub remote_list_err: Option<String>,
}

impl ArtistPresenceIndex {
    pub fn contains(&self, folder_name: &str) -> bool {
        self.local_folders.contains(folder_name) || self.remote_folders.contains(folder_name)
    }
}

/// A row rendered by `catalog gaps`/`catalog stats` table output.
#[derive(Debug, Clone, Tabled)]
pub struct GapTableRow {
    #[tabled(rename = "Container ID")]
    pub container_id: u64,
    #[tabled(rename = "Date")]
    pub performance_date: String,
    #[tabled(rename = "Title")]
    pub container_info: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RefreshInterval {
    Daily,
    Weekly,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutoRefreshPolicy {
    pub enabled: bool,
    pub time: String,
    pub timezone: String,
    pub interval: RefreshIntervalSer,
}

/// `serde`-friendly mirror of `RefreshInterval`; kept distinct so the clap
/// `ValueEnum` derive (used on CLI flags) and the config file's serde
/// representation can diverge without either side needing `clap` at parse
/// time for a file that clap never touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshIntervalSer {
    Daily,
    Weekly,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(products: &[&str]) -> CatalogEntry {
        CatalogEntry {
            container_id: 1,
            artist_id: 1,
            artist_name: "Billy Strings".into(),
            container_info: "Red Rocks".into(),
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
    fn detects_video_on_demand() {
        let e = entry(&["VIDEO ON DEMAND"]);
        assert!(e.has_video());
    }

    #[test]
    fn audio_only_has_no_video() {
        let e = entry(&["MP3", "FLAC"]);
        assert!(!e.has_video());
        assert!(e.has_audio());
    }

    #[test]
    fn containers_index_merge_is_additive_and_idempotent() {
        let mut idx = ContainersIndex::default();
        let entries = vec![entry(&["FLAC"])];
        assert_eq!(idx.merge(&entries), 1);
        assert_eq!(idx.merge(&entries), 0);
        assert_eq!(idx.0.len(), 1);
    }

    #[test]
    fn ema_smoothing_tracks_recent_samples() {
        let mut hist = SpeedHistory::default();
        hist.push(10.0);
        hist.push(10.0);
        hist.push(10.0);
        assert!((hist.smoothed() - 10.0).abs() < 1e-9);
    }
}

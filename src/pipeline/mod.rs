//! Download Pipeline (C7).
//!
//! Drives the per-album and per-video workflows: existence check, size
//! pre-calculation, the sequential track loop, and the upload/completion
//! tail. Generalizes the teacher's `cli/releases.rs` per-artist loop and the
//! per-track download/skip-if-exists shape of
//! `examples/other_examples/613aafca_PSandro-tdl__src-download.rs.rs`.

pub mod album;
pub mod artist;
pub mod size;
pub mod video;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use crate::auth::Session;
use crate::config::{Config, DefaultOutputs};
use crate::control::RuntimeControl;
use crate::mirror::MirrorDriver;
use crate::progress_box::ProgressBox;
use crate::remote::RemoteClient;
use crate::types::CatalogEntry;

/// Everything a workflow needs, bundled so `artist`/`album`/`video` don't
/// thread a dozen parameters through every call.
pub struct PipelineContext {
    pub remote: RemoteClient,
    pub http: Client,
    pub session: Session,
    pub config: Config,
    pub control: Arc<RuntimeControl>,
    pub mirror: Option<Arc<MirrorDriver>>,
}

impl PipelineContext {
    pub fn new(
        remote: RemoteClient,
        session: Session,
        config: Config,
        control: Arc<RuntimeControl>,
        mirror: Option<Arc<MirrorDriver>>,
    ) -> Self {
        Self { remote, http: Client::new(), session, config, control, mirror }
    }
}

/// Which media to pull for one show, after intersecting availability with
/// `defaultOutputs` and the two legacy overrides (§4.7 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaSelection {
    pub audio: bool,
    pub video: bool,
}

pub fn select_media(entry: &CatalogEntry, config: &Config) -> MediaSelection {
    let has_audio = entry.has_audio();
    let has_video = entry.has_video();

    let mut audio = has_audio;
    let mut video = has_video;
    match config.default_outputs {
        DefaultOutputs::Audio => video = false,
        DefaultOutputs::Video => audio = false,
        DefaultOutputs::Both => {}
    }

    if config.force_video {
        video = has_video;
    }
    if config.skip_videos {
        video = false;
    }

    MediaSelection { audio, video }
}

/// Outcome of one album/video download, surfaced up to the artist batch
/// loop to drive `BatchProgressState.complete`/`failed` (§4.7 artist
/// workflow).
#[derive(Debug)]
pub enum WorkflowOutcome {
    Completed,
    Skipped,
    Failed(String),
}

/// `hls`/plain-GET chunk sinks are synchronous `FnMut` callbacks (they're
/// invoked from inside a tight byte-stream loop), but `ProgressBox`'s update
/// methods are async. A relay task preserves per-chunk ordering: the sink
/// just sends onto an unbounded channel, one task drains it and awaits
/// `on_download_chunk` in order. Callers must `drop` the returned sender
/// before awaiting the join handle, or the relay task never sees EOF.
pub fn spawn_chunk_relay(progress: Arc<ProgressBox>) -> (UnboundedSender<(u64, u64, Duration)>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        while let Some((delta, total, elapsed)) = rx.recv().await {
            progress.on_download_chunk(delta, total, elapsed).await;
        }
    });
    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefaultOutputs as DO;

    fn entry(products: &[&str]) -> CatalogEntry {
        CatalogEntry {
            container_id: 1,
            artist_id: 1,
            artist_name: "Billy Strings".into(),
            container_info: "Red Rocks".into(),
            performance_date: chrono::Utc::now(),
            venue: None,
            venue_city: None,
            venue_state: None,
            availability_type_str: None,
            products: products.iter().map(|s| s.to_string()).collect(),
            product_format_list: vec![],
        }
    }

    fn config_with(default_outputs: DO, force_video: bool, skip_videos: bool) -> Config {
        Config {
            email: None,
            password: None,
            token: Some("t".into()),
            format: 2,
            video_format: 3,
            default_outputs,
            out_path: "/tmp".into(),
            video_out_path: None,
            use_ffmpeg_env_var: false,
            ffmpeg_name_str: "ffmpeg".into(),
            skip_chapters: false,
            skip_size_pre_calculation: false,
            force_video,
            skip_videos,
            rclone_enabled: false,
            rclone_remote: None,
            rclone_path: None,
            rclone_video_path: None,
            rclone_transfers: 4,
            delete_after_upload: false,
            catalog_auto_refresh: false,
            catalog_refresh_time: "05:00".into(),
            catalog_refresh_timezone: "UTC".into(),
            catalog_refresh_interval: crate::types::RefreshIntervalSer::Daily,
            watched_artists: vec![],
            watch_interval: None,
            gotify_url: None,
            gotify_token: None,
        }
    }

    #[test]
    fn both_outputs_pull_everything_available() {
        let e = entry(&["VIDEO ON DEMAND", "MP3"]);
        let sel = select_media(&e, &config_with(DO::Both, false, false));
        assert!(sel.audio);
        assert!(sel.video);
    }

    #[test]
    fn skip_videos_always_wins() {
        let e = entry(&["VIDEO ON DEMAND"]);
        let sel = select_media(&e, &config_with(DO::Both, true, true));
        assert!(!sel.video);
    }

    #[test]
    fn force_video_pulls_video_even_when_default_is_audio_only() {
        let e = entry(&["VIDEO ON DEMAND", "MP3"]);
        let sel = select_media(&e, &config_with(DO::Audio, true, false));
        assert!(sel.video);
        assert!(!sel.audio);
    }
}

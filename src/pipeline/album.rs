//! Album workflow (§4.7 steps 1-10): existence short-circuit, size
//! pre-calculation, the sequential per-track download loop, the mirror
//! upload tail, and the video workflow handoff.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::ShowVaultError;
use crate::fingerprint;
use crate::hls;
use crate::progress_box::ProgressBox;
use crate::quality;
use crate::remote::TrackEntry;
use crate::types::{ArtistPresenceIndex, CatalogEntry, MessagePriority, Quality};
use crate::Res;

use super::{select_media, size, spawn_chunk_relay, PipelineContext, WorkflowOutcome};

struct TrackPlan {
    track: TrackEntry,
    quality: Quality,
    hls_only: bool,
}

/// Resolves whether `folder_name` is already present for this artist,
/// preferring a pre-built presence index (artist batch workflow) over a
/// direct local+remote probe (standalone single-album download). A failed
/// remote probe is logged and treated as "unknown, proceed" (§4.7 step 4).
async fn album_exists(
    ctx: &PipelineContext,
    entry: &CatalogEntry,
    folder_name: &str,
    presence: Option<&ArtistPresenceIndex>,
) -> bool {
    if let Some(index) = presence {
        return index.contains(folder_name);
    }

    let local_path = Path::new(&ctx.config.out_path).join(&entry.artist_name).join(folder_name);
    if tokio::fs::try_exists(&local_path).await.unwrap_or(false) {
        return true;
    }

    if let Some(mirror) = &ctx.mirror {
        match mirror.exists(&entry.artist_name, folder_name, false).await {
            Ok(exists) => return exists,
            Err(e) => {
                crate::warning!("remote existence probe failed for {folder_name}: {e}");
                return false;
            }
        }
    }
    false
}

/// Runs the full album workflow for one show. `entry` is always a resolved
/// `CatalogEntry` (§4.7 step 1's "supplied" half; the "fetched by
/// ContainerID" half is the caller's responsibility — the catalog engine or
/// artist-meta fetch already produced `entry`).
pub async fn run(
    ctx: &PipelineContext,
    entry: &CatalogEntry,
    progress: Arc<ProgressBox>,
    presence: Option<&ArtistPresenceIndex>,
) -> Res<WorkflowOutcome> {
    ctx.control.wait_if_paused_or_cancelled().await?;

    let selection = select_media(entry, &ctx.config);
    if !selection.audio && !selection.video {
        return Ok(WorkflowOutcome::Skipped);
    }

    let folder_name = fingerprint::album_folder_name(&entry.artist_name, &entry.container_info);
    if album_exists(ctx, entry, &folder_name, presence).await {
        return Ok(WorkflowOutcome::Skipped);
    }

    let artist_dir = Path::new(&ctx.config.out_path).join(&entry.artist_name);
    let album_dir = artist_dir.join(&folder_name);
    tokio::fs::create_dir_all(&album_dir).await?;

    if selection.audio {
        if let Err(e) = run_audio_tracks(ctx, entry, &album_dir, &progress).await {
            if crate::error::is_crawl_cancelled(&e) {
                return Err(e);
            }
            return Ok(WorkflowOutcome::Failed(e.to_string()));
        }

        if let Some(mirror) = &ctx.mirror {
            match mirror.upload(&album_dir, &entry.artist_name, false, Some(progress.as_ref())).await {
                Ok(()) => match mirror.verify(&album_dir, &entry.artist_name, false).await {
                    Ok(true) => {
                        if ctx.config.delete_after_upload {
                            tokio::fs::remove_dir_all(&album_dir).await.ok();
                        }
                    }
                    Ok(false) => crate::warning!("album upload verification failed for {folder_name}"),
                    Err(e) => crate::warning!("album upload verification error for {folder_name}: {e}"),
                },
                Err(e) => crate::warning!("album upload failed for {folder_name}: {e}"),
            }
        }
    }

    if selection.video {
        ctx.control.wait_if_paused_or_cancelled().await?;
        if let Err(e) = super::video::run(ctx, entry, &progress).await {
            if crate::error::is_crawl_cancelled(&e) {
                return Err(e);
            }
            crate::error!("video workflow failed for {}: {e}", entry.container_info);
        }
    }

    progress.complete().await;
    Ok(WorkflowOutcome::Completed)
}

/// Negotiates quality per track, pre-calculates total size, then downloads
/// sequentially (§4.7 steps 6-8).
async fn run_audio_tracks(
    ctx: &PipelineContext,
    entry: &CatalogEntry,
    album_dir: &Path,
    progress: &Arc<ProgressBox>,
) -> Res<()> {
    let tracks = ctx
        .remote
        .fetch_container_tracks(&ctx.session.access_token, entry.container_id)
        .await?;
    let track_total = tracks.len() as u32;

    let mut plans: Vec<Option<TrackPlan>> = Vec::with_capacity(tracks.len());
    let mut last_negotiation_error: Option<String> = None;
    for track in &tracks {
        ctx.control.wait_if_paused_or_cancelled().await?;
        match quality::probe_available_qualities(
            &ctx.remote,
            &ctx.session.access_token,
            entry.container_id,
            track.track_id,
        )
        .await
        {
            Ok(candidates) => {
                let hls_only = quality::is_hls_only(&candidates);
                let requested = if hls_only { 5 } else { ctx.config.format };
                match quality::negotiate_audio(requested, &candidates) {
                    Ok((chosen, warning)) => {
                        if let Some(w) = warning {
                            progress.set_message(MessagePriority::Warning, &w, Duration::from_secs(5)).await;
                        }
                        plans.push(Some(TrackPlan { track: track.clone(), quality: chosen, hls_only }));
                    }
                    Err(e) => {
                        crate::error!("quality negotiation failed for {}: {e}", track.song_title);
                        last_negotiation_error = Some(e.to_string());
                        plans.push(None);
                    }
                }
            }
            Err(e) => {
                crate::error!("stream probe failed for {}: {e}", track.song_title);
                last_negotiation_error = Some(e.to_string());
                plans.push(None);
            }
        }
    }

    if !ctx.config.skip_size_pre_calculation {
        let urls: Vec<String> = plans.iter().flatten().map(|p| p.quality.url.clone()).collect();
        let total = size::precalculate_total_size(&ctx.remote, &urls).await;
        progress.set_show_total(total).await;
    }

    let mut any_success = false;
    let mut last_download_error: Option<String> = None;
    for (i, plan) in plans.into_iter().enumerate() {
        ctx.control.wait_if_paused_or_cancelled().await?;
        let track_number = (i + 1) as u32;

        let Some(plan) = plan else {
            progress.complete_track(false, true).await;
            continue;
        };

        let file_name = format!(
            "{:02} - {}.{}",
            plan.track.track_num,
            fingerprint::sanitize(&plan.track.song_title),
            plan.quality.extension
        );
        let final_path = album_dir.join(&file_name);

        if tokio::fs::try_exists(&final_path).await.unwrap_or(false) {
            progress.complete_track(true, false).await;
            any_success = true;
            continue;
        }

        progress.begin_track(track_number, track_total, &plan.track.song_title, plan.quality.format).await;

        let download_result = if plan.hls_only {
            download_hls_only_audio(ctx, &plan.quality, &final_path, progress).await
        } else {
            download_plain_get(ctx, &plan.quality.url, &final_path, progress).await
        };

        match download_result {
            Ok(()) => {
                progress.complete_track(false, false).await;
                any_success = true;
            }
            Err(e) if crate::error::is_crawl_cancelled(&e) => return Err(e),
            Err(e) => {
                crate::error!("download failed for {}: {e}", plan.track.song_title);
                last_download_error = Some(e.to_string());
                progress.complete_track(false, true).await;
            }
        }
    }

    // A per-track failure alone logs and continues the loop (§4.7 step 7);
    // but a show where every single track failed negotiation or download
    // never produced any output and must surface as an album-level failure
    // so the batch summary counts it, not just its tracks.
    if album_has_failed(track_total, any_success) {
        return Err(ShowVaultError::FormatUnavailable(
            last_download_error
                .or(last_negotiation_error)
                .unwrap_or_else(|| "no track in this show could be downloaded".to_string()),
        ));
    }

    Ok(())
}

/// An album only counts as failed when it had tracks to begin with and none
/// of them produced output; a show with zero tracks (nothing to download)
/// is not a failure, and a show where some but not all tracks failed still
/// completes with its error count surfaced through the progress box.
fn album_has_failed(track_total: u32, any_success: bool) -> bool {
    track_total > 0 && !any_success
}

async fn download_plain_get(
    ctx: &PipelineContext,
    url: &str,
    dest: &Path,
    progress: &Arc<ProgressBox>,
) -> Res<()> {
    let url = Url::parse(url).map_err(|e| ShowVaultError::Other(format!("bad track URL: {e}")))?;
    let mut file = tokio::fs::File::create(dest).await?;

    let (tx, relay) = spawn_chunk_relay(Arc::clone(progress));
    let mut on_chunk = |delta: u64, total: u64, elapsed: Duration| {
        let _ = tx.send((delta, total, elapsed));
    };
    let result = hls::stream_to(&ctx.http, &ctx.control, &url, None, &mut file, 0, &mut on_chunk).await;
    drop(on_chunk);
    drop(tx);
    let _ = relay.await;
    result.map(|_| ())
}

async fn download_hls_only_audio(
    ctx: &PipelineContext,
    quality: &Quality,
    dest: &Path,
    progress: &Arc<ProgressBox>,
) -> Res<()> {
    let manifest_url =
        Url::parse(&quality.url).map_err(|e| ShowVaultError::Other(format!("bad HLS-only URL: {e}")))?;
    let media_url = hls::resolve_audio_media_playlist(&ctx.http, &manifest_url).await?;
    let plan = hls::load_media_playlist(&ctx.http, &media_url).await?;

    let (tx, relay) = spawn_chunk_relay(Arc::clone(progress));
    let mut on_chunk = |delta: u64, total: u64, elapsed: Duration| {
        let _ = tx.send((delta, total, elapsed));
    };
    let ffmpeg_path = ctx.config.resolve_ffmpeg_path();
    let result =
        hls::fetch_audio_hls_only(&ctx.http, &ctx.control, &plan, &ffmpeg_path, dest, &mut on_chunk)
            .await;
    drop(on_chunk);
    drop(tx);
    let _ = relay.await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn presence_index_short_circuits_without_filesystem_probe() {
        let mut local = BTreeSet::new();
        local.insert("Artist - Show".to_string());
        let index = ArtistPresenceIndex { local_folders: local, remote_folders: BTreeSet::new(), remote_list_err: None };
        assert!(index.contains("Artist - Show"));
        assert!(!index.contains("Artist - Other Show"));
    }

    #[test]
    fn album_with_no_tracks_is_not_a_failure() {
        assert!(!album_has_failed(0, false));
    }

    #[test]
    fn album_where_every_track_failed_is_a_failure() {
        assert!(album_has_failed(3, false));
    }

    #[test]
    fn album_with_at_least_one_success_is_not_a_failure() {
        assert!(!album_has_failed(3, true));
    }
}

//! Video workflow (§4.7 "Video workflow"): negotiate a variant, skip if the
//! target MP4 already exists, fetch segments into a `.ts`, extract duration
//! and write a chapters file unless disabled, remux, delete the
//! intermediate `.ts`, and optionally upload.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::ShowVaultError;
use crate::fingerprint;
use crate::hls;
use crate::progress_box::ProgressBox;
use crate::quality::negotiate_video;
use crate::types::CatalogEntry;
use crate::Res;

use super::{spawn_chunk_relay, PipelineContext};

pub async fn run(ctx: &PipelineContext, entry: &CatalogEntry, progress: &Arc<ProgressBox>) -> Res<()> {
    ctx.control.wait_if_paused_or_cancelled().await?;

    let master_url_str = ctx
        .remote
        .fetch_video_master_url(&ctx.session.access_token, entry.container_id)
        .await?;
    let master_url = Url::parse(&master_url_str)
        .map_err(|e| ShowVaultError::Other(format!("bad video master URL: {e}")))?;

    let variants = hls::fetch_master_variants(&ctx.http, &master_url).await?;
    let variant = negotiate_video(ctx.config.video_format, &variants)?;

    let artist_dir = Path::new(ctx.config.video_out_path()).join(&entry.artist_name);
    tokio::fs::create_dir_all(&artist_dir).await?;

    let stem = fingerprint::video_file_stem(&entry.artist_name, &entry.container_info);
    let resolution_label = variant
        .resolution_lines
        .map(|lines| lines.to_string())
        .unwrap_or_else(|| "src".to_string());
    let final_path = artist_dir.join(format!("{stem}_{resolution_label}.mp4"));

    if tokio::fs::try_exists(&final_path).await.unwrap_or(false) {
        progress.complete_track(true, false).await;
        return Ok(());
    }

    let variant_url = Url::parse(&variant.url)
        .map_err(|e| ShowVaultError::Other(format!("bad video variant URL: {e}")))?;
    let media_url = hls::resolve_audio_media_playlist(&ctx.http, &variant_url).await?;
    let plan = hls::load_media_playlist(&ctx.http, &media_url).await?;

    let ts_path = artist_dir.join(format!("{stem}_{resolution_label}.ts"));
    let (tx, relay) = spawn_chunk_relay(Arc::clone(progress));
    let mut on_chunk = |delta: u64, total: u64, elapsed: Duration| {
        let _ = tx.send((delta, total, elapsed));
    };
    let fetch_result = hls::fetch_video_segments(&ctx.http, &ctx.control, &plan, &ts_path, &mut on_chunk).await;
    drop(on_chunk);
    drop(tx);
    let _ = relay.await;
    fetch_result?;

    let ffmpeg_path = ctx.config.resolve_ffmpeg_path();
    let chapters_path = if ctx.config.skip_chapters {
        None
    } else {
        let duration = hls::probe_duration(&ffmpeg_path, &ts_path).await?;
        let raw = vec![hls::chapters::RawChapter {
            title: entry.container_info.clone(),
            start: Duration::ZERO,
        }];
        let chapters = hls::chapters::build_chapter_entries(&raw, duration);
        let rendered = hls::chapters::render_ffmetadata(&chapters);
        let path = artist_dir.join(format!("{stem}.chapters.txt"));
        tokio::fs::write(&path, rendered).await?;
        Some(path)
    };

    let remux_result = hls::remux(&ffmpeg_path, &ts_path, &final_path, chapters_path.as_deref()).await;
    tokio::fs::remove_file(&ts_path).await.ok();
    if let Some(path) = &chapters_path {
        tokio::fs::remove_file(path).await.ok();
    }
    remux_result?;

    if let Some(mirror) = &ctx.mirror {
        if let Err(e) = mirror.upload(&final_path, &entry.artist_name, true, Some(progress.as_ref())).await {
            crate::warning!("video upload failed for {}: {e}", entry.container_info);
        } else {
            match mirror.verify(&final_path, &entry.artist_name, true).await {
                Ok(true) if ctx.config.delete_after_upload => {
                    tokio::fs::remove_file(&final_path).await.ok();
                }
                Ok(false) => crate::warning!("video upload verification failed for {}", entry.container_info),
                Err(e) => crate::warning!("video upload verification error for {}: {e}", entry.container_info),
                _ => {}
            }
        }
    }

    progress.complete_track(false, false).await;
    Ok(())
}

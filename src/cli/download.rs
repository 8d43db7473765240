//! `download` subcommands: single album, single video, or a whole artist
//! (§4.7).

use crate::catalog::CatalogEngine;
use crate::pipeline::{self, PipelineContext, WorkflowOutcome};
use crate::progress_box::ProgressBox;
use crate::Res;

pub async fn download_album(container_id: u64) -> Res<()> {
    let bootstrap = super::context::bootstrap().await?;
    let engine = CatalogEngine::new(bootstrap.store.clone(), bootstrap.remote.clone());

    let entry = find_container(&engine, &bootstrap.session.access_token, container_id).await?;
    let ctx = PipelineContext::new(
        bootstrap.remote,
        bootstrap.session,
        bootstrap.config,
        bootstrap.control,
        bootstrap.mirror,
    );

    let progress = ProgressBox::new(&entry.container_info, 1);
    match pipeline::album::run(&ctx, &entry, progress, None).await? {
        WorkflowOutcome::Completed => crate::success!("downloaded {}", entry.container_info),
        WorkflowOutcome::Skipped => crate::info!("{} already present, skipped", entry.container_info),
        WorkflowOutcome::Failed(e) => crate::error!("{} failed: {e}", entry.container_info),
    }
    Ok(())
}

pub async fn download_video(container_id: u64) -> Res<()> {
    let bootstrap = super::context::bootstrap().await?;
    let engine = CatalogEngine::new(bootstrap.store.clone(), bootstrap.remote.clone());

    let entry = find_container(&engine, &bootstrap.session.access_token, container_id).await?;
    if !entry.has_video() {
        crate::error!("{} has no video product", entry.container_info);
        return Ok(());
    }

    let ctx = PipelineContext::new(
        bootstrap.remote,
        bootstrap.session,
        bootstrap.config,
        bootstrap.control,
        bootstrap.mirror,
    );
    let progress = ProgressBox::new(&entry.container_info, 1);
    pipeline::video::run(&ctx, &entry, &progress).await?;
    crate::success!("downloaded {} (video)", entry.container_info);
    Ok(())
}

pub async fn download_artist(artist_id: u64) -> Res<()> {
    let bootstrap = super::context::bootstrap().await?;
    let engine = CatalogEngine::new(bootstrap.store.clone(), bootstrap.remote.clone());

    let (shows, _stale) = engine
        .get_artist_meta(&bootstrap.session.access_token, artist_id)
        .await?;
    if shows.is_empty() {
        crate::info!("artist {artist_id} has no shows in the catalog");
        return Ok(());
    }
    let artist_name = shows[0].artist_name.clone();

    let ctx = PipelineContext::new(
        bootstrap.remote,
        bootstrap.session,
        bootstrap.config,
        bootstrap.control,
        bootstrap.mirror,
    );

    let batch = pipeline::artist::run(&ctx, &artist_name, &shows).await?;
    crate::success!(
        "{artist_name}: {}/{} albums complete, {} failed",
        batch.complete,
        batch.total_albums,
        batch.failed
    );
    Ok(())
}

/// §4.7 step 1's "fetched by ContainerID" half: a standalone album/video
/// download is never handed a pre-resolved `CatalogEntry`, so it must find
/// one via the cached catalog snapshots (§6 — the remote API's consumed
/// shape has no single-container lookup).
async fn find_container(
    engine: &CatalogEngine,
    _token: &str,
    container_id: u64,
) -> Res<crate::types::CatalogEntry> {
    engine.find_in_cache(container_id).await?.ok_or_else(|| {
        crate::error::ShowVaultError::Other(format!(
            "container {container_id} not found in cache; run `catalog update` or `catalog crawl` first"
        ))
    })
}

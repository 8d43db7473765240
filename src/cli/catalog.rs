//! `catalog` subcommands: `update`, `crawl`, `stats`, `gaps` (§4.3).

use tabled::Table;

use crate::catalog::CatalogEngine;
use crate::presence::ArtistPresenceBuilder;
use crate::types::{GapTableRow, MediaFilter};
use crate::Res;

pub async fn update() -> Res<()> {
    let bootstrap = super::context::bootstrap().await?;
    let engine = CatalogEngine::new(bootstrap.store, bootstrap.remote);
    let inserted = engine.update(&bootstrap.session.access_token).await?;
    crate::success!("catalog updated, {inserted} new shows");
    Ok(())
}

pub async fn crawl() -> Res<()> {
    let bootstrap = super::context::bootstrap().await?;
    let engine = CatalogEngine::new(bootstrap.store, bootstrap.remote);
    let (entries, failures) = engine
        .full_crawl(&bootstrap.session.access_token, bootstrap.control)
        .await?;
    crate::success!("full crawl complete, {} shows indexed", entries.len());
    if !failures.is_empty() {
        crate::warning!("{} artists failed during crawl and were skipped:", failures.len());
        for (artist_id, err) in &failures {
            crate::warning!("  artist {artist_id}: {err}");
        }
    }
    Ok(())
}

pub async fn stats() -> Res<()> {
    let (_, store) = super::context::load_config_and_store().await?;
    let remote = crate::remote::RemoteClient::new(super::context::API_BASE_URL);
    let engine = CatalogEngine::new(store, remote);
    let stats = engine.stats().await?;

    crate::info!("total shows: {}", stats.total_shows);
    crate::info!("total artists: {}", stats.total_artists);
    if let (Some(earliest), Some(latest)) = (stats.earliest, stats.latest) {
        crate::info!("date range: {} - {}", earliest.date_naive(), latest.date_naive());
    }
    for (name, count) in &stats.top_artists {
        crate::info!("  {name}: {count} shows");
    }
    Ok(())
}

/// `gaps <artist_id> [--media] [--ids-only]`: the subset of an artist's
/// catalog shows not yet present locally or on the mirror (§4.3, §4.10,
/// scenario 1 of §8).
pub async fn gaps(artist_id: u64, media: MediaFilter, ids_only: bool) -> Res<()> {
    let (config, store) = super::context::load_config_and_store().await?;
    let remote = crate::remote::RemoteClient::new(super::context::API_BASE_URL);
    let mirror = super::context::build_mirror(&config);
    let engine = CatalogEngine::new(store, remote);
    let presence = ArtistPresenceBuilder::new(mirror, false);

    let gaps = engine.gaps(artist_id, media, &presence, &config.out_path).await?;

    if ids_only {
        for entry in &gaps {
            println!("{}", entry.container_id);
        }
        return Ok(());
    }

    if gaps.is_empty() {
        crate::info!("no gaps for artist {artist_id}");
        return Ok(());
    }

    let rows: Vec<GapTableRow> = gaps
        .iter()
        .map(|e| GapTableRow {
            container_id: e.container_id,
            performance_date: e.performance_date.date_naive().to_string(),
            container_info: e.container_info.clone(),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

//! Artist/batch workflow (§4.7 "Artist workflow"): one shared progress box
//! and batch state reused across every album, reset between albums so
//! aggregate counters survive while per-album fields zero out.

use std::sync::Arc;
use std::time::Instant;

use crate::presence::ArtistPresenceBuilder;
use crate::progress_box::ProgressBox;
use crate::types::{BatchProgressState, CatalogEntry};
use crate::Res;

use super::{album, PipelineContext, WorkflowOutcome};

/// Downloads every show in `shows` for one artist under a single shared
/// progress box, building the presence index once up front (§4.10) instead
/// of probing per-show.
pub async fn run(ctx: &PipelineContext, artist_name: &str, shows: &[CatalogEntry]) -> Res<BatchProgressState> {
    let mut batch = BatchProgressState {
        total_albums: shows.len() as u32,
        current_album: 0,
        current_title: String::new(),
        complete: 0,
        failed: 0,
        start_time: Some(Instant::now()),
    };

    let Some(first) = shows.first() else {
        return Ok(batch);
    };

    let presence_builder = ArtistPresenceBuilder::new(ctx.mirror.clone(), false);
    let presence = presence_builder.build(artist_name, &ctx.config.out_path).await?;

    let progress = ProgressBox::new(&first.container_info, 1);

    for (i, show) in shows.iter().enumerate() {
        ctx.control.wait_if_paused_or_cancelled().await?;

        batch.current_album = (i + 1) as u32;
        batch.current_title = show.container_info.clone();
        progress.reset_for_next_album(&show.container_info, batch.current_album).await;

        match album::run(ctx, show, Arc::clone(&progress), Some(&presence)).await {
            Ok(WorkflowOutcome::Completed) | Ok(WorkflowOutcome::Skipped) => batch.complete += 1,
            Ok(WorkflowOutcome::Failed(e)) => {
                crate::error!("album failed for {}: {e}", show.container_info);
                batch.failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_show_list_yields_zeroed_batch_without_building_presence() {
        let batch = BatchProgressState { total_albums: 0, ..Default::default() };
        assert_eq!(batch.total_albums, 0);
        assert_eq!(batch.complete, 0);
    }
}

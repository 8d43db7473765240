//! `watch`: a foreground loop that polls the auto-refresh policy (§4.3) and
//! triggers an incremental update when due. The watched-artist/Gotify
//! notification layer these options share a config table with is an
//! external collaborator (§1, §6) — this loop only owns the catalog
//! auto-refresh gating, not artist-level watch/notify.

use std::time::Duration;

use crate::catalog::{schedule::AutoRefreshConfig, CatalogEngine};
use crate::Res;

/// How often the policy is re-checked while idle. The policy itself only
/// fires once per day/week (§4.3); this is just the poll granularity.
const POLL_INTERVAL: Duration = Duration::from_secs(900);

pub async fn watch() -> Res<()> {
    let bootstrap = super::context::bootstrap().await?;
    if !bootstrap.config.catalog_auto_refresh {
        crate::info!("catalogAutoRefresh is disabled; nothing to watch");
        return Ok(());
    }

    let policy = AutoRefreshConfig {
        enabled: bootstrap.config.catalog_auto_refresh,
        time: bootstrap.config.catalog_refresh_time.clone(),
        timezone: bootstrap.config.catalog_refresh_timezone.clone(),
        interval: bootstrap.config.catalog_refresh_interval,
    };
    let engine = CatalogEngine::new(bootstrap.store, bootstrap.remote);

    crate::info!(
        "watching for auto-refresh at {} {} ({:?})",
        policy.time,
        policy.timezone,
        policy.interval
    );

    loop {
        bootstrap.control.check_cancelled()?;
        match engine.auto_refresh_if_due(&bootstrap.session.access_token, &policy).await {
            Ok(true) => crate::success!("auto-refresh triggered"),
            Ok(false) => {}
            Err(e) => crate::warning!("auto-refresh check failed: {e}"),
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

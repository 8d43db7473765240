//! `mirror status`: the 5-second bounded reachability probe (§4.4).

use crate::mirror::Reachability;
use crate::Res;

pub async fn status() -> Res<()> {
    let (config, _store) = super::context::load_config_and_store().await?;
    let Some(mirror) = super::context::build_mirror(&config) else {
        crate::info!("mirror disabled");
        return Ok(());
    };

    match mirror.probe_reachability().await {
        Reachability::Online => crate::success!("mirror online"),
        Reachability::OnlinePathMissing => crate::warning!("mirror online, but base path is missing"),
        Reachability::Offline => crate::error!("mirror offline"),
        Reachability::OfflineTimeout => crate::error!("mirror offline (probe timed out)"),
        Reachability::Disabled => crate::info!("mirror disabled"),
    }
    Ok(())
}

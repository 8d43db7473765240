//! Shared bootstrap for CLI handlers: load config, build the remote client,
//! log in, and assemble the optional mirror driver. Every subcommand needs
//! some subset of this; centralizing it avoids five copies of the same
//! `Config::load` -> `Authenticator::login` dance.

use std::sync::Arc;

use crate::auth::{Authenticator, Session};
use crate::cache::store::CacheStore;
use crate::config::Config;
use crate::control::RuntimeControl;
use crate::mirror::{MirrorConfig, MirrorDriver};
use crate::remote::RemoteClient;
use crate::Res;

/// The remote catalog/auth API's base URL. The wire shape behind it is
/// contract-only per spec §1/§6; only the fields `remote.rs` deserializes
/// are load-bearing, so the base URL lives here rather than in `Config`.
pub const API_BASE_URL: &str = "https://api.nugs.net";

pub struct Bootstrap {
    pub config: Config,
    pub remote: RemoteClient,
    pub session: Session,
    pub store: CacheStore,
    pub control: Arc<RuntimeControl>,
    pub mirror: Option<Arc<MirrorDriver>>,
}

/// Loads config and authenticates. Most subcommands need this; a few
/// read-only catalog queries (`stats`, `gaps`) skip the login half via
/// [`load_config_and_store`] instead.
pub async fn bootstrap() -> Res<Bootstrap> {
    let config = crate::config::load().await?;
    let remote = RemoteClient::new(API_BASE_URL);
    let session = Authenticator::new(remote.clone()).login(&config).await?;
    let store = CacheStore::new(CacheStore::default_dir());
    let control = Arc::new(RuntimeControl::new());
    let mirror = build_mirror(&config);
    Ok(Bootstrap { config, remote, session, store, control, mirror })
}

/// Config + cache store only, no network login — used by offline-capable
/// queries that only read the local cache (§4.3 "offline-first" gap/stats
/// path).
pub async fn load_config_and_store() -> Res<(Config, CacheStore)> {
    let config = crate::config::load().await?;
    let store = CacheStore::new(CacheStore::default_dir());
    Ok((config, store))
}

pub fn build_mirror(config: &Config) -> Option<Arc<MirrorDriver>> {
    if !config.rclone_enabled {
        return None;
    }
    let remote = config.rclone_remote.clone()?;
    let audio_base_path = config.rclone_path.clone().unwrap_or_default();
    let mirror_config = MirrorConfig {
        enabled: true,
        remote,
        audio_base_path,
        video_base_path: config.rclone_video_path.clone(),
        transfers: config.rclone_transfers,
    };
    Some(Arc::new(MirrorDriver::new(mirror_config, "rclone")))
}

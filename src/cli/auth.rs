//! `auth` subcommand: resolve a session and report what was found, without
//! persisting anything beyond what `config.json` already holds (§4.11 —
//! refresh is not implemented, so this is a pure diagnostic login).

use crate::Res;

pub async fn login() -> Res<()> {
    let bootstrap = super::context::bootstrap().await?;
    crate::success!("authenticated");
    crate::info!(
        "subscription {} valid {} - {}",
        bootstrap.session.stream_params.subscription_id,
        bootstrap.session.stream_params.start_stamp,
        bootstrap.session.stream_params.end_stamp
    );
    Ok(())
}

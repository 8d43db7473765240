//! Command-line interface layer.
//!
//! Wires the config/session/catalog/pipeline/mirror core up to user-facing
//! subcommands. Argument parsing itself lives in `main.rs` (contract-only
//! per spec §1 — this module is where the parsed options actually do
//! something); each handler here owns one subcommand's worth of work and
//! reports through the crate's `info!`/`warning!`/`error!` macros, the way
//! the teacher's `cli/*.rs` handlers do.

mod auth;
mod catalog;
mod context;
mod download;
mod mirror;
mod watch;

pub use auth::login;
pub use catalog::{crawl, gaps, stats, update};
pub use download::{download_album, download_artist, download_video};
pub use mirror::status;
pub use watch::watch;

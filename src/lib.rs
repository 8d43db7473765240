//! showvault — command-line ingestion client for a subscription live-concert catalog.
//!
//! The crate is organized around the three subsystems that do the real work:
//! a local catalog cache (`cache`, `catalog`), a download pipeline that
//! negotiates quality and pulls tracks/videos (`quality`, `hls`, `pipeline`),
//! and a remote mirror driver that uploads finished artifacts and doubles as
//! an existence oracle (`mirror`, `presence`).
//!
//! # Modules
//!
//! - `error` - the crate-wide error taxonomy
//! - `config` - configuration file discovery, parsing, permission healing
//! - `types` - data structures shared across the catalog/download/runtime layers
//! - `fingerprint` - filesystem-safe naming for artists and shows
//! - `cache` - atomic, lock-guarded storage for catalog indices
//! - `catalog` - the catalog engine: update, crawl, stats, gaps, auto-refresh
//! - `remote` - the thin client for the remote catalog/auth API
//! - `quality` - audio/video format negotiation and fallback chains
//! - `hls` - HLS playlist parsing, segment fetch, AES-CBC decrypt, remux
//! - `mirror` - the rclone subprocess driver and its progress-line parser
//! - `presence` - the per-artist local+remote existence oracle
//! - `progress_box` - the single-writer progress state machine
//! - `control` - cooperative pause/cancel and detach-to-background
//! - `auth` - session token acquisition and legacy-credential decoding
//! - `pipeline` - the album/video/artist download workflows
//! - `cli` - command-line interface implementations
//! - `utils` - small standalone helpers (humanize, byte parsing, ...)

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod fingerprint;
pub mod hls;
pub mod mirror;
pub mod pipeline;
pub mod presence;
pub mod progress_box;
pub mod quality;
pub mod remote;
pub mod types;
pub mod utils;

/// A convenient Result type alias for fallible operations that carry a
/// crate-specific error.
pub type Res<T> = std::result::Result<T, error::ShowVaultError>;

/// Prints an informational message with a blue bullet point.
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark.
///
/// Unlike the teacher's original macro, this never exits the process: only
/// `main.rs` decides whether an error is fatal and what exit code to use.
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a warning message with a yellow exclamation mark.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}

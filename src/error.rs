//! Crate-wide error taxonomy.
//!
//! Every layer returns `Res<T>` (`Result<T, ShowVaultError>`) instead of the
//! per-manager error enums the teacher duplicated across `StateError`,
//! `ReleaseError`, and friends. `CrawlCancelled` is the cooperative-cancel
//! sentinel (§9 of the design notes): it must never be thrown or panicked,
//! only returned and tested for with [`is_crawl_cancelled`].

use std::fmt;

#[derive(Debug)]
pub enum ShowVaultError {
    /// Missing required config fields, bad enum value, unparseable time/timezone.
    ConfigInvalid(String),
    /// Token acquisition or decode failure.
    AuthFailure(String),
    /// HTTP 5xx, connection reset, timeout.
    NetworkTransient(String),
    /// The quality fallback chain was exhausted.
    FormatUnavailable(String),
    /// Lock acquisition failure, rename failure, corrupt JSON.
    CachePersistence(String),
    /// Transcoder or mirror binary not found on PATH.
    ExternalToolMissing(String),
    /// Non-standard non-zero exit from the mirror binary.
    RemoteMirror(String),
    /// Cooperative-cancellation sentinel. Propagates unchanged through every layer.
    CrawlCancelled,
    /// Anything else, carrying a message for display.
    Other(String),
}

impl fmt::Display for ShowVaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShowVaultError::ConfigInvalid(m) => write!(f, "invalid configuration: {m}"),
            ShowVaultError::AuthFailure(m) => write!(f, "authentication failed: {m}"),
            ShowVaultError::NetworkTransient(m) => write!(f, "transient network error: {m}"),
            ShowVaultError::FormatUnavailable(m) => write!(f, "no matching format: {m}"),
            ShowVaultError::CachePersistence(m) => write!(f, "cache error: {m}"),
            ShowVaultError::ExternalToolMissing(m) => write!(f, "external tool missing: {m}"),
            ShowVaultError::RemoteMirror(m) => write!(f, "remote mirror error: {m}"),
            ShowVaultError::CrawlCancelled => write!(f, "cancelled"),
            ShowVaultError::Other(m) => write!(f, "{m}"),
        }
    }
}

impl std::error::Error for ShowVaultError {}

impl From<std::io::Error> for ShowVaultError {
    fn from(e: std::io::Error) -> Self {
        ShowVaultError::CachePersistence(e.to_string())
    }
}

impl From<serde_json::Error> for ShowVaultError {
    fn from(e: serde_json::Error) -> Self {
        ShowVaultError::CachePersistence(e.to_string())
    }
}

impl From<reqwest::Error> for ShowVaultError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error()) {
            ShowVaultError::NetworkTransient(e.to_string())
        } else {
            ShowVaultError::Other(e.to_string())
        }
    }
}

/// Distinguishes the crawl-cancelled sentinel from any other error.
pub fn is_crawl_cancelled(err: &ShowVaultError) -> bool {
    matches!(err, ShowVaultError::CrawlCancelled)
}

/// Maps an error to the process exit code `main.rs` uses (§6).
pub fn exit_code(err: &ShowVaultError) -> i32 {
    match err {
        ShowVaultError::ConfigInvalid(_) => 2,
        ShowVaultError::AuthFailure(_) => 3,
        ShowVaultError::ExternalToolMissing(_) => 4,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawl_cancelled_is_distinguishable() {
        assert!(is_crawl_cancelled(&ShowVaultError::CrawlCancelled));
        assert!(!is_crawl_cancelled(&ShowVaultError::Other("x".into())));
    }

    #[test]
    fn exit_codes_match_taxonomy() {
        assert_eq!(exit_code(&ShowVaultError::ConfigInvalid("x".into())), 2);
        assert_eq!(exit_code(&ShowVaultError::AuthFailure("x".into())), 3);
        assert_eq!(
            exit_code(&ShowVaultError::ExternalToolMissing("x".into())),
            4
        );
        assert_eq!(exit_code(&ShowVaultError::CrawlCancelled), 1);
    }
}

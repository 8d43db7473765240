//! Configuration file discovery, parsing, and permission self-healing.
//!
//! Generalizes the teacher's `config.rs` (a flat set of `expect()`-panicking
//! env-var getters loaded from a `.env` file) into a single structured
//! document discovered from one of a few well-known paths, first found wins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ShowVaultError;
use crate::types::RefreshIntervalSer;
use crate::Res;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub email: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,

    #[serde(default = "default_format")]
    pub format: u8,
    #[serde(default = "default_video_format")]
    pub video_format: u8,
    #[serde(default)]
    pub default_outputs: DefaultOutputs,

    pub out_path: String,
    pub video_out_path: Option<String>,

    #[serde(default)]
    pub use_ffmpeg_env_var: bool,
    #[serde(default = "default_ffmpeg_name")]
    pub ffmpeg_name_str: String,

    #[serde(default)]
    pub skip_chapters: bool,
    #[serde(default)]
    pub skip_size_pre_calculation: bool,
    #[serde(default)]
    pub force_video: bool,
    #[serde(default)]
    pub skip_videos: bool,

    #[serde(default)]
    pub rclone_enabled: bool,
    pub rclone_remote: Option<String>,
    pub rclone_path: Option<String>,
    pub rclone_video_path: Option<String>,
    #[serde(default = "default_rclone_transfers")]
    pub rclone_transfers: u32,
    #[serde(default)]
    pub delete_after_upload: bool,

    #[serde(default)]
    pub catalog_auto_refresh: bool,
    #[serde(default = "default_refresh_time")]
    pub catalog_refresh_time: String,
    #[serde(default = "default_timezone")]
    pub catalog_refresh_timezone: String,
    #[serde(default)]
    pub catalog_refresh_interval: RefreshIntervalSer,

    #[serde(default)]
    pub watched_artists: Vec<u64>,
    pub watch_interval: Option<u64>,
    pub gotify_url: Option<String>,
    pub gotify_token: Option<String>,
}

impl Default for RefreshIntervalSer {
    fn default() -> Self {
        RefreshIntervalSer::Daily
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DefaultOutputs {
    #[default]
    Both,
    Audio,
    Video,
}

fn default_format() -> u8 {
    2
}
fn default_video_format() -> u8 {
    3
}
fn default_ffmpeg_name() -> String {
    "ffmpeg".to_string()
}
fn default_rclone_transfers() -> u32 {
    4
}
fn default_refresh_time() -> String {
    "05:00".to_string()
}
fn default_timezone() -> String {
    "UTC".to_string()
}

impl Config {
    /// Video paths default to the audio base path when unset (§4.4, §6).
    pub fn video_out_path(&self) -> &str {
        self.video_out_path.as_deref().unwrap_or(&self.out_path)
    }

    /// Resolves the transcoder binary path per the "Transcoder discovery
    /// policy" (§6): when `useFfmpegEnvVar` is set, `ffmpegNameStr` names an
    /// environment variable holding the actual path rather than being the
    /// binary name itself; falls back to the literal `ffmpegNameStr` if the
    /// variable isn't set.
    pub fn resolve_ffmpeg_path(&self) -> String {
        if self.use_ffmpeg_env_var {
            if let Ok(path) = std::env::var(&self.ffmpeg_name_str) {
                return path;
            }
        }
        self.ffmpeg_name_str.clone()
    }

    fn validate(&self) -> Res<()> {
        if self.out_path.trim().is_empty() {
            return Err(ShowVaultError::ConfigInvalid("outPath is required".into()));
        }
        if !(1..=5).contains(&self.format) {
            return Err(ShowVaultError::ConfigInvalid(format!(
                "format must be 1..=5, got {}",
                self.format
            )));
        }
        if !(1..=5).contains(&self.video_format) {
            return Err(ShowVaultError::ConfigInvalid(format!(
                "videoFormat must be 1..=5, got {}",
                self.video_format
            )));
        }
        if self.rclone_enabled && self.rclone_remote.is_none() {
            return Err(ShowVaultError::ConfigInvalid(
                "rcloneEnabled requires rcloneRemote".into(),
            ));
        }
        if self.catalog_auto_refresh {
            parse_hh_mm(&self.catalog_refresh_time)?;
            self.catalog_refresh_timezone
                .parse::<chrono_tz::Tz>()
                .map_err(|_| {
                    ShowVaultError::ConfigInvalid(format!(
                        "unknown timezone {}",
                        self.catalog_refresh_timezone
                    ))
                })?;
        }
        Ok(())
    }
}

/// Parses an `HH:MM` string into `(hour, minute)`, used both by validation
/// and by the auto-refresh scheduler (§4.3).
pub fn parse_hh_mm(s: &str) -> Res<(u32, u32)> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| ShowVaultError::ConfigInvalid(format!("bad time {s}, expected HH:MM")))?;
    let h: u32 = h
        .parse()
        .map_err(|_| ShowVaultError::ConfigInvalid(format!("bad hour in {s}")))?;
    let m: u32 = m
        .parse()
        .map_err(|_| ShowVaultError::ConfigInvalid(format!("bad minute in {s}")))?;
    if h > 23 || m > 59 {
        return Err(ShowVaultError::ConfigInvalid(format!("time out of range: {s}")));
    }
    Ok((h, m))
}

/// First-found-wins discovery order: `./config.json`, `~/.nugs/config.json`,
/// `~/.config/nugs/config.json` (§6).
pub fn discover_config_path() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("config.json"),
        dirs::home_dir().map(|h| h.join(".nugs").join("config.json")),
        dirs::config_dir().map(|c| c.join("nugs").join("config.json")),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|p| p.is_file())
}

pub async fn load() -> Res<Config> {
    let path = discover_config_path().ok_or_else(|| {
        ShowVaultError::ConfigInvalid("no config.json found in any known location".into())
    })?;
    load_from_path(&path).await
}

pub async fn load_from_path(path: &Path) -> Res<Config> {
    let raw = async_fs::read_to_string(path).await?;
    let config: Config = serde_json::from_str(&raw)
        .map_err(|e| ShowVaultError::ConfigInvalid(format!("{}: {e}", path.display())))?;
    config.validate()?;
    heal_permissions(path).await;
    Ok(config)
}

/// Heals config file permissions to owner-only on non-Windows (§6). Best
/// effort: a failure here is not fatal to loading the config.
#[cfg(unix)]
async fn heal_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(path) {
        let mut perms = meta.permissions();
        if perms.mode() & 0o777 != 0o600 {
            perms.set_mode(0o600);
            let _ = std::fs::set_permissions(path, perms);
        }
    }
}

#[cfg(not(unix))]
async fn heal_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_hh_mm() {
        assert_eq!(parse_hh_mm("05:00").unwrap(), (5, 0));
        assert_eq!(parse_hh_mm("23:59").unwrap(), (23, 59));
    }

    #[test]
    fn rejects_out_of_range_time() {
        assert!(parse_hh_mm("24:00").is_err());
        assert!(parse_hh_mm("05:60").is_err());
        assert!(parse_hh_mm("bogus").is_err());
    }

    fn minimal_config() -> Config {
        Config {
            email: None,
            password: None,
            token: Some("tok".into()),
            format: 2,
            video_format: 3,
            default_outputs: DefaultOutputs::Both,
            out_path: "/tmp/out".into(),
            video_out_path: None,
            use_ffmpeg_env_var: false,
            ffmpeg_name_str: "ffmpeg".into(),
            skip_chapters: false,
            skip_size_pre_calculation: false,
            force_video: false,
            skip_videos: false,
            rclone_enabled: false,
            rclone_remote: None,
            rclone_path: None,
            rclone_video_path: None,
            rclone_transfers: 4,
            delete_after_upload: false,
            catalog_auto_refresh: false,
            catalog_refresh_time: "05:00".into(),
            catalog_refresh_timezone: "UTC".into(),
            catalog_refresh_interval: RefreshIntervalSer::Daily,
            watched_artists: vec![],
            watch_interval: None,
            gotify_url: None,
            gotify_token: None,
        }
    }

    #[test]
    fn video_out_path_defaults_to_audio_base() {
        let cfg = minimal_config();
        assert_eq!(cfg.video_out_path(), "/tmp/out");
    }

    #[test]
    fn resolve_ffmpeg_path_uses_literal_name_when_env_var_disabled() {
        let cfg = minimal_config();
        assert_eq!(cfg.resolve_ffmpeg_path(), "ffmpeg");
    }

    #[test]
    fn resolve_ffmpeg_path_reads_the_named_env_var_when_enabled() {
        let mut cfg = minimal_config();
        cfg.use_ffmpeg_env_var = true;
        cfg.ffmpeg_name_str = "SHOWVAULT_TEST_FFMPEG_PATH".into();
        unsafe {
            std::env::set_var("SHOWVAULT_TEST_FFMPEG_PATH", "/opt/custom/ffmpeg");
        }
        assert_eq!(cfg.resolve_ffmpeg_path(), "/opt/custom/ffmpeg");
        unsafe {
            std::env::remove_var("SHOWVAULT_TEST_FFMPEG_PATH");
        }
    }

    #[test]
    fn resolve_ffmpeg_path_falls_back_when_env_var_unset() {
        let mut cfg = minimal_config();
        cfg.use_ffmpeg_env_var = true;
        cfg.ffmpeg_name_str = "SHOWVAULT_TEST_FFMPEG_PATH_UNSET".into();
        unsafe {
            std::env::remove_var("SHOWVAULT_TEST_FFMPEG_PATH_UNSET");
        }
        assert_eq!(cfg.resolve_ffmpeg_path(), "SHOWVAULT_TEST_FFMPEG_PATH_UNSET");
    }

    #[test]
    fn validate_rejects_rclone_without_remote() {
        let mut cfg = minimal_config();
        cfg.rclone_enabled = true;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_format_code() {
        let mut cfg = minimal_config();
        cfg.format = 9;
        assert!(cfg.validate().is_err());
    }
}

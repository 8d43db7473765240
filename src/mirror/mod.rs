//! Remote Mirror (C4) — an rclone subprocess driver.
//!
//! Remote operations are delegated to a single external binary invoked as a
//! child process; this module owns upload/verify/existence/list and the
//! reachability probe. Never parses rclone's native protocol, only the
//! documented progress-line shape (§9 design notes).

pub mod progress;

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::ShowVaultError;
use crate::progress_box::ProgressBox;
use crate::Res;

pub use progress::TransferEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Online,
    OnlinePathMissing,
    Offline,
    OfflineTimeout,
    Disabled,
}

#[derive(Clone)]
pub struct MirrorConfig {
    pub enabled: bool,
    pub remote: String,
    pub audio_base_path: String,
    pub video_base_path: Option<String>,
    pub transfers: u32,
}

impl MirrorConfig {
    fn base_path(&self, is_video: bool) -> &str {
        if is_video {
            self.video_base_path.as_deref().unwrap_or(&self.audio_base_path)
        } else {
            &self.audio_base_path
        }
    }
}

pub struct MirrorDriver {
    config: MirrorConfig,
    binary: String,
}

impl MirrorDriver {
    pub fn new(config: MirrorConfig, binary: impl Into<String>) -> Self {
        Self {
            config,
            binary: binary.into(),
        }
    }

    fn remote_dest(&self, artist: &str, local: &Path, is_video: bool) -> String {
        let base = self.config.base_path(is_video);
        let base_name = local
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        format!("{}:{}/{}/{}", self.config.remote, base, artist, base_name)
    }

    /// `copy` for directories, `copyto` for files.
    pub async fn upload(
        &self,
        local: &Path,
        artist: &str,
        is_video: bool,
        progress: Option<&ProgressBox>,
    ) -> Res<()> {
        let dest = self.remote_dest(artist, local, is_video);
        let subcommand = if local.is_dir() { "copy" } else { "copyto" };

        let mut cmd = Command::new(&self.binary);
        cmd.arg(subcommand)
            .arg(local)
            .arg(&dest)
            .arg(format!("--transfers={}", self.config.transfers))
            .arg("--progress")
            .arg("--stats=1s")
            .arg("--stats-one-line")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            ShowVaultError::ExternalToolMissing(format!("{}: {e}", self.binary))
        })?;

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let mut diagnostics = Vec::new();

        let parser = progress::LineParser::new();
        let stdout_task = stream_lines(stdout, parser.clone(), progress, &mut diagnostics);
        let stderr_task = stream_lines(stderr, parser.clone(), progress, &mut diagnostics);
        let (stdout_diag, stderr_diag) = tokio::join!(stdout_task, stderr_task);
        diagnostics.extend(stdout_diag);
        diagnostics.extend(stderr_diag);

        let status = child.wait().await?;
        if !status.success() {
            return Err(ShowVaultError::RemoteMirror(format!(
                "rclone {subcommand} exited with {status}: {}",
                diagnostics.join("\n")
            )));
        }
        Ok(())
    }

    /// `check --one-way` for directories and files.
    pub async fn verify(&self, local: &Path, artist: &str, is_video: bool) -> Res<bool> {
        let dest = self.remote_dest(artist, local, is_video);
        let mut cmd = Command::new(&self.binary);
        if local.is_dir() {
            cmd.arg("check").arg("--one-way").arg(local).arg(&dest);
        } else {
            let base_name = local.file_name().unwrap_or_default().to_string_lossy().to_string();
            let local_dir = local.parent().unwrap_or(local);
            let remote_dir = dest.rsplit_once('/').map(|(d, _)| d).unwrap_or(&dest);
            cmd.arg("check")
                .arg("--one-way")
                .arg("--include")
                .arg(&base_name)
                .arg(local_dir)
                .arg(remote_dir);
        }
        let status = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| ShowVaultError::ExternalToolMissing(format!("{}: {e}", self.binary)))?;
        Ok(status.success())
    }

    /// `lsf <remote>:<basePath>/<path>`. Exit code 3 means "missing", not an
    /// error; other non-zero exits are errors; success (even empty output)
    /// means the path exists.
    pub async fn exists(&self, artist: &str, show_folder: &str, is_video: bool) -> Res<bool> {
        let base = self.config.base_path(is_video);
        let target = format!("{}:{}/{}/{}", self.config.remote, base, artist, show_folder);
        let output = Command::new(&self.binary)
            .arg("lsf")
            .arg(&target)
            .output()
            .await
            .map_err(|e| ShowVaultError::ExternalToolMissing(format!("{}: {e}", self.binary)))?;

        match output.status.code() {
            Some(0) => Ok(true),
            Some(3) => Ok(false),
            _ => Err(ShowVaultError::RemoteMirror(format!(
                "lsf {target} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ))),
        }
    }

    /// `lsf --dirs-only` against the artist's remote folder -> folder names.
    pub async fn list_artist_folders(&self, artist: &str, is_video: bool) -> Res<Vec<String>> {
        let base = self.config.base_path(is_video);
        let target = format!("{}:{}/{}", self.config.remote, base, artist);
        let output = Command::new(&self.binary)
            .arg("lsf")
            .arg("--dirs-only")
            .arg(&target)
            .output()
            .await
            .map_err(|e| ShowVaultError::ExternalToolMissing(format!("{}: {e}", self.binary)))?;

        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(|l| l.trim_end_matches('/').to_string())
                .filter(|l| !l.is_empty())
                .collect()),
            Some(3) => Ok(Vec::new()),
            _ => Err(ShowVaultError::RemoteMirror(format!(
                "lsf --dirs-only {target} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ))),
        }
    }

    /// A 5-second bounded `lsf` to the configured base.
    pub async fn probe_reachability(&self) -> Reachability {
        if !self.config.enabled {
            return Reachability::Disabled;
        }
        let target = format!("{}:{}", self.config.remote, self.config.audio_base_path);
        let run = Command::new(&self.binary).arg("lsf").arg(&target).output();
        match timeout(Duration::from_secs(5), run).await {
            Ok(Ok(output)) => match output.status.code() {
                Some(0) => Reachability::Online,
                Some(3) => Reachability::OnlinePathMissing,
                _ => Reachability::Offline,
            },
            Ok(Err(_)) => Reachability::Offline,
            Err(_) => Reachability::OfflineTimeout,
        }
    }
}

/// Reads raw bytes and splits on `\r` or `\n`, not just `\n`: rclone's
/// `--progress` output rewrites its `Transferred:` line in place with a bare
/// `\r` and no trailing `\n`, so a newline-only line reader would buffer
/// every in-place update until the next real line break (or EOF) and the
/// live progress events would arrive late or not at all.
async fn stream_lines<R: tokio::io::AsyncRead + Unpin>(
    mut reader: R,
    parser: progress::LineParser,
    progress: Option<&ProgressBox>,
    _diagnostics: &mut Vec<String>,
) -> Vec<String> {
    let mut local_diagnostics = Vec::new();
    let mut pending = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        pending.extend_from_slice(&chunk[..n]);

        while let Some(pos) = pending.iter().position(|b| *b == b'\r' || *b == b'\n') {
            let line_bytes: Vec<u8> = pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]);
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            match parser.parse(line) {
                Some(event) => {
                    if let Some(pb) = progress {
                        pb.apply_upload_event(&event).await;
                    }
                }
                None => local_diagnostics.push(line.to_string()),
            }
        }
    }

    if !pending.is_empty() {
        let line = String::from_utf8_lossy(&pending);
        let line = line.trim();
        if !line.is_empty() {
            match parser.parse(line) {
                Some(event) => {
                    if let Some(pb) = progress {
                        pb.apply_upload_event(&event).await;
                    }
                }
                None => local_diagnostics.push(line.to_string()),
            }
        }
    }

    local_diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bare_carriage_return_updates_are_parsed_as_separate_lines() {
        // rclone's --progress output rewrites the transfer line in place
        // with `\r` and no `\n`; a newline-only reader would see this as one
        // unterminated line until the next real break.
        let input = std::io::Cursor::new(
            b"Transferred:   1 MiB / 10 MiB, 10%, 1 MiB/s, ETA 0:00:09\rTransferred:   5 MiB / 10 MiB, 50%, 1 MiB/s, ETA 0:00:05\n".to_vec(),
        );
        let diagnostics = stream_lines(input, progress::LineParser::new(), None, &mut Vec::new()).await;
        assert!(diagnostics.is_empty());
    }

    #[tokio::test]
    async fn non_matching_lines_are_buffered_as_diagnostics() {
        let input = std::io::Cursor::new(b"some unrelated rclone notice\n".to_vec());
        let diagnostics = stream_lines(input, progress::LineParser::new(), None, &mut Vec::new()).await;
        assert_eq!(diagnostics, vec!["some unrelated rclone notice".to_string()]);
    }
}

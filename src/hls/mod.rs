//! HLS Fetcher/Decryptor (C6).
//!
//! Parses master and media playlists, downloads segments, decrypts
//! AES-128-CBC-encrypted audio, and drives the external transcoder for
//! remux and chapter embedding. Network streaming follows the chunked
//! `bytes_stream()` + buffered-writer shape in
//! `examples/other_examples/613aafca_PSandro-tdl__src-download.rs.rs`;
//! playlist parsing follows `m3u8-rs` usage in
//! `examples/other_examples/30edc407_moq-dev-moq__rs-moq-mux-src-import-hls.rs.rs`.

pub mod chapters;
pub mod crypto;

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use m3u8_rs::Playlist;
use reqwest::Client;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use url::Url;

use crate::control::RuntimeControl;
use crate::error::ShowVaultError;
use crate::quality::VideoVariant;
use crate::Res;

/// Resolves a segment/key URI against the playlist's base URL, appending the
/// original query string when the relative URI doesn't carry its own (§4.6
/// step 1: "the original query string appended to each segment").
fn resolve_uri(base: &Url, uri: &str) -> Res<Url> {
    let mut resolved = base
        .join(uri)
        .map_err(|e| ShowVaultError::Other(format!("bad playlist URI {uri}: {e}")))?;
    if resolved.query().is_none() {
        if let Some(q) = base.query() {
            resolved.set_query(Some(q));
        }
    }
    Ok(resolved)
}

/// Fetches and parses a master playlist into quality-negotiable variants.
pub async fn fetch_master_variants(client: &Client, master_url: &Url) -> Res<Vec<VideoVariant>> {
    let body = client
        .get(master_url.clone())
        .send()
        .await?
        .bytes()
        .await?;

    let (_, master) = m3u8_rs::parse_master_playlist(&body)
        .map_err(|e| ShowVaultError::Other(format!("failed to parse master playlist: {e}")))?;

    master
        .variants
        .iter()
        .map(|variant| {
            Ok(VideoVariant {
                url: resolve_uri(master_url, &variant.uri)?.to_string(),
                bandwidth: variant.bandwidth,
                resolution_lines: variant.resolution.map(|r| r.height as u32),
            })
        })
        .collect()
}

/// Resolves an HLS-only audio track's URL to its media playlist: the URL
/// may already be a media playlist, or it may be a master playlist wrapping
/// a single audio rendition that has to be resolved first (§4.5, §4.6).
pub async fn resolve_audio_media_playlist(client: &Client, url: &Url) -> Res<Url> {
    let body = client.get(url.clone()).send().await?.bytes().await?;
    match m3u8_rs::parse_playlist_res(&body) {
        Ok(Playlist::MediaPlaylist(_)) => Ok(url.clone()),
        Ok(Playlist::MasterPlaylist(master)) => {
            let variant = master.variants.first().ok_or_else(|| {
                ShowVaultError::Other("HLS-only master playlist has no variants".into())
            })?;
            resolve_uri(url, &variant.uri)
        }
        Err(e) => Err(ShowVaultError::Other(format!(
            "failed to parse HLS-only manifest: {e}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HlsMode {
    /// Many discrete segments: sequential requests, one per segment.
    Livestream,
    /// A single consolidated segment: one ranged request.
    OnDemand,
}

pub struct MediaPlan {
    pub segment_urls: Vec<Url>,
    pub key_uri: Option<Url>,
    pub iv: Option<[u8; 16]>,
    pub mode: HlsMode,
}

/// Fetches and parses a media playlist: segment URIs (resolved against the
/// base, original query string carried over), the AES key URI and IV when
/// present, and the livestream/on-demand mode (§4.6).
pub async fn load_media_playlist(client: &Client, media_url: &Url) -> Res<MediaPlan> {
    let body = client
        .get(media_url.clone())
        .send()
        .await?
        .bytes()
        .await?;

    let playlist = match m3u8_rs::parse_playlist_res(&body) {
        Ok(Playlist::MediaPlaylist(p)) => p,
        Ok(Playlist::MasterPlaylist(_)) => {
            return Err(ShowVaultError::Other(
                "expected a media playlist, got a master playlist".into(),
            ));
        }
        Err(e) => {
            return Err(ShowVaultError::Other(format!(
                "failed to parse media playlist: {e}"
            )));
        }
    };

    let mut segment_urls = Vec::with_capacity(playlist.segments.len());
    let mut key_uri = None;
    let mut iv = None;
    for segment in &playlist.segments {
        segment_urls.push(resolve_uri(media_url, &segment.uri)?);
        if let Some(key) = &segment.key {
            if key_uri.is_none() {
                if let Some(uri) = &key.uri {
                    key_uri = Some(resolve_uri(media_url, uri)?);
                }
                iv = key
                    .iv
                    .as_deref()
                    .map(crypto::parse_iv_hex)
                    .transpose()?;
            }
        }
    }

    let mode = if segment_urls.len() <= 1 { HlsMode::OnDemand } else { HlsMode::Livestream };
    Ok(MediaPlan { segment_urls, key_uri, iv, mode })
}

/// Per-chunk progress callback: (bytes this chunk, total if known, elapsed
/// since the previous callback). Matches `ProgressBox::on_download_chunk`'s
/// signature so pipeline code can forward it directly.
pub type ChunkSink<'a> = &'a mut dyn FnMut(u64, u64, Duration);

/// Streams a GET response into `dest`, polling the pause/cancel control on
/// every chunk write (§5 suspension points) and invoking `on_chunk` for
/// progress reporting. Also used directly by the pipeline for plain-GET
/// (non-HLS) track downloads, since the chunking/cancellation contract is
/// identical (§4.7 step 7).
pub(crate) async fn stream_to<W: AsyncWrite + Unpin>(
    client: &Client,
    control: &RuntimeControl,
    url: &Url,
    range: Option<&str>,
    dest: &mut W,
    total_hint: u64,
    on_chunk: ChunkSink<'_>,
) -> Res<u64> {
    let mut request = client.get(url.clone());
    if let Some(range) = range {
        request = request.header(reqwest::header::RANGE, range);
    }
    let response = request.send().await?;
    let total = response.content_length().unwrap_or(total_hint).max(total_hint);

    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    let mut last_tick = Instant::now();
    while let Some(chunk) = stream.next().await {
        control.wait_if_paused_or_cancelled().await?;
        let chunk = chunk?;
        dest.write_all(&chunk).await?;
        written += chunk.len() as u64;
        let now = Instant::now();
        on_chunk(chunk.len() as u64, total, now.duration_since(last_tick));
        last_tick = now;
    }
    dest.flush().await?;
    Ok(written)
}

/// Downloads the HLS-only audio track's single consolidated segment,
/// decrypts it, and pipes the decrypted bytes into the transcoder on stdin
/// with `-i pipe: -c:a copy <output>` (§4.6 step 2).
pub async fn fetch_audio_hls_only(
    client: &Client,
    control: &RuntimeControl,
    plan: &MediaPlan,
    ffmpeg_path: &str,
    output_path: &Path,
    on_chunk: ChunkSink<'_>,
) -> Res<()> {
    let segment_url = plan
        .segment_urls
        .first()
        .ok_or_else(|| ShowVaultError::Other("media playlist has no segments".into()))?;

    let mut ciphertext = Vec::new();
    stream_to(client, control, segment_url, None, &mut ciphertext, 0, on_chunk).await?;

    let plaintext = match (&plan.key_uri, plan.iv) {
        (Some(key_uri), Some(iv)) => {
            let key_bytes = client.get(key_uri.clone()).send().await?.bytes().await?;
            let key: [u8; 16] = key_bytes.as_ref().try_into().map_err(|_| {
                ShowVaultError::Other(format!(
                    "AES key must be 16 bytes, got {}",
                    key_bytes.len()
                ))
            })?;
            crypto::decrypt_aes128_cbc(&ciphertext, &key, &iv)?
        }
        _ => ciphertext,
    };

    pipe_to_transcoder(ffmpeg_path, &plaintext, output_path, &["-c:a", "copy"]).await
}

/// Downloads every video segment to a single `.ts` file: sequential
/// requests for the livestream mode, one ranged `bytes=0-` request for the
/// on-demand mode (§4.6 step 3).
pub async fn fetch_video_segments(
    client: &Client,
    control: &RuntimeControl,
    plan: &MediaPlan,
    ts_path: &Path,
    mut on_chunk: ChunkSink<'_>,
) -> Res<()> {
    let mut file = tokio::fs::File::create(ts_path).await?;
    match plan.mode {
        HlsMode::OnDemand => {
            let url = plan
                .segment_urls
                .first()
                .ok_or_else(|| ShowVaultError::Other("media playlist has no segments".into()))?;
            stream_to(client, control, url, Some("bytes=0-"), &mut file, 0, on_chunk).await?;
        }
        HlsMode::Livestream => {
            for url in &plan.segment_urls {
                control.wait_if_paused_or_cancelled().await?;
                stream_to(client, control, url, None, &mut file, 0, &mut on_chunk).await?;
            }
        }
    }
    Ok(())
}

/// Pipes `input` into the transcoder's stdin with `-i pipe:` plus
/// `extra_args`, writing `output_path`.
async fn pipe_to_transcoder(
    ffmpeg_path: &str,
    input: &[u8],
    output_path: &Path,
    extra_args: &[&str],
) -> Res<()> {
    let mut cmd = Command::new(ffmpeg_path);
    cmd.arg("-hide_banner")
        .arg("-y")
        .arg("-i")
        .arg("pipe:")
        .args(extra_args)
        .arg(output_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| ShowVaultError::ExternalToolMissing(format!("{ffmpeg_path}: {e}")))?;

    let mut stdin = child.stdin.take().expect("piped stdin");
    let input = input.to_vec();
    let writer = tokio::spawn(async move {
        let _ = stdin.write_all(&input).await;
        drop(stdin);
    });

    let output = child.wait_with_output().await?;
    let _ = writer.await;
    if !output.status.success() {
        return Err(ShowVaultError::Other(format!(
            "transcoder exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

/// Remuxes a `.ts` file into the final container, optionally attaching a
/// chapters metadata file (§4.6 step 3, §6 subprocess contract).
pub async fn remux(
    ffmpeg_path: &str,
    ts_path: &Path,
    output_path: &Path,
    chapters_path: Option<&Path>,
) -> Res<()> {
    let mut cmd = Command::new(ffmpeg_path);
    cmd.arg("-hide_banner").arg("-y").arg("-i").arg(ts_path);
    if let Some(chapters) = chapters_path {
        cmd.arg("-f").arg("ffmetadata").arg("-i").arg(chapters).arg("-map_metadata").arg("1");
    }
    cmd.arg("-c").arg("copy").arg(output_path);

    let output = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ShowVaultError::ExternalToolMissing(format!("{ffmpeg_path}: {e}")))?;

    if !output.status.success() {
        return Err(ShowVaultError::Other(format!(
            "remux exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

/// Extracts the source duration via an informational invocation that is
/// expected to exit non-zero with "At least one output file must be
/// specified"; any other non-zero exit is a fatal error (§4.6).
pub async fn probe_duration(ffmpeg_path: &str, input_path: &Path) -> Res<Duration> {
    let output = Command::new(ffmpeg_path)
        .arg("-hide_banner")
        .arg("-i")
        .arg(input_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ShowVaultError::ExternalToolMissing(format!("{ffmpeg_path}: {e}")))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() {
        return Err(ShowVaultError::Other(
            "expected the informational ffmpeg probe to fail without an output file".into(),
        ));
    }
    if !stderr.contains("At least one output file must be specified") {
        return Err(ShowVaultError::Other(format!(
            "ffmpeg probe failed unexpectedly: {stderr}"
        )));
    }
    chapters::parse_ffmpeg_duration(&stderr)
        .ok_or_else(|| ShowVaultError::Other("duration not found in ffmpeg output".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_uri_against_base_carrying_over_query() {
        let base = Url::parse("https://cdn.example/hls/master.m3u8?sig=abc").unwrap();
        let resolved = resolve_uri(&base, "segment1.ts").unwrap();
        assert_eq!(resolved.as_str(), "https://cdn.example/hls/segment1.ts?sig=abc");
    }

    #[test]
    fn resolved_uri_keeps_its_own_query_if_present() {
        let base = Url::parse("https://cdn.example/hls/master.m3u8?sig=abc").unwrap();
        let resolved = resolve_uri(&base, "segment1.ts?own=1").unwrap();
        assert_eq!(resolved.query(), Some("own=1"));
    }

    #[test]
    fn classifies_single_segment_playlist_as_on_demand() {
        let plan = MediaPlan {
            segment_urls: vec![Url::parse("https://x/seg.ts").unwrap()],
            key_uri: None,
            iv: None,
            mode: HlsMode::OnDemand,
        };
        assert_eq!(plan.mode, HlsMode::OnDemand);
    }
}

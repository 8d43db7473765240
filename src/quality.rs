//! Quality Negotiator (C5).
//!
//! Chooses the best available audio/video variant for a requested format
//! using the deterministic fallback chains fixed in spec §4.5. Pure,
//! synchronous negotiation lives here; the four-discriminator availability
//! probe that produces the candidate set is async and also lives here since
//! it's purely a negotiation-input concern, not a download concern.

use crate::error::ShowVaultError;
use crate::remote::RemoteClient;
use crate::types::Quality;
use crate::Res;

/// Audio format metadata fixed by §4.5's table.
pub struct AudioFormatMeta {
    pub code: u8,
    pub description: &'static str,
    pub extension: &'static str,
}

pub const AUDIO_FORMATS: [AudioFormatMeta; 5] = [
    AudioFormatMeta { code: 1, description: "ALAC", extension: "m4a" },
    AudioFormatMeta { code: 2, description: "FLAC", extension: "flac" },
    AudioFormatMeta { code: 3, description: "MQA", extension: "flac" },
    AudioFormatMeta { code: 4, description: "best available", extension: "" },
    AudioFormatMeta { code: 5, description: "AAC", extension: "m4a" },
];

fn audio_format_description(code: u8) -> &'static str {
    AUDIO_FORMATS
        .iter()
        .find(|f| f.code == code)
        .map(|f| f.description)
        .unwrap_or("unknown format")
}

/// Directed fallback edges from §4.5: `1->2->5`, `3->2`, `4->3`, `2->5`.
/// Traversal follows edges until a format is present in the candidate set or
/// the chain runs out (bounded: a format graph of 5 nodes can never produce
/// a path longer than 5 hops).
fn next_audio_fallback(code: u8) -> Option<u8> {
    match code {
        1 => Some(2),
        3 => Some(2),
        4 => Some(3),
        2 => Some(5),
        _ => None,
    }
}

/// Negotiates an audio format against a candidate set already fetched from
/// the availability probe. Returns the chosen quality and, when the chosen
/// format differs from what was requested and the request wasn't "best
/// available" (code 4), a one-time warning message (§4.5).
pub fn negotiate_audio(requested: u8, candidates: &[Quality]) -> Res<(Quality, Option<String>)> {
    let mut code = requested;
    let mut hops = 0;
    loop {
        if let Some(quality) = candidates.iter().find(|q| q.format == code) {
            let warning = if code != requested && requested != 4 {
                Some(format!(
                    "Using {} (requested {} unavailable)",
                    audio_format_description(code),
                    audio_format_description(requested)
                ))
            } else {
                None
            };
            return Ok((quality.clone(), warning));
        }
        hops += 1;
        match next_audio_fallback(code) {
            Some(next) if hops <= AUDIO_FORMATS.len() => code = next,
            _ => {
                return Err(ShowVaultError::FormatUnavailable(format!(
                    "no candidate matched format {requested} or its fallback chain"
                )));
            }
        }
    }
}

/// A track is HLS-only (§4.5) iff every candidate URL is an HLS manifest.
pub fn is_hls_only(candidates: &[Quality]) -> bool {
    !candidates.is_empty() && candidates.iter().all(|q| q.url.contains(".m3u8?"))
}

/// Queries the stream-metadata endpoint four times with differing opaque
/// discriminators because the API may return different format subsets per
/// call (§4.5, §9 open question: preserved verbatim, not collapsed into one
/// call). The union of returned qualities is the negotiation set.
///
/// The wire response carries only a URL and an optional opaque format tag;
/// mapping that to one of the five numeric format codes is a heuristic
/// (classify by URL shape) since the exact wire shape is out of scope (§1).
pub async fn probe_available_qualities(
    remote: &RemoteClient,
    token: &str,
    container_id: u64,
    track_id: u64,
) -> Res<Vec<Quality>> {
    const DISCRIMINATORS: [&str; 4] = ["1", "4", "7", "10"];
    let mut seen_urls = std::collections::HashSet::new();
    let mut qualities = Vec::new();

    for discriminator in DISCRIMINATORS {
        let resp = remote
            .fetch_stream_metadata(token, container_id, track_id, discriminator)
            .await?;
        if !seen_urls.insert(resp.url.clone()) {
            continue;
        }
        qualities.push(classify_stream(&resp.url, resp.format.as_deref()));
    }
    Ok(qualities)
}

fn classify_stream(url: &str, format_hint: Option<&str>) -> Quality {
    let format = if url.contains(".m3u8?") {
        5
    } else if let Some(hint) = format_hint.and_then(|h| h.parse::<u8>().ok()) {
        hint
    } else if url.contains(".flac") {
        2
    } else {
        1
    };
    let meta = AUDIO_FORMATS.iter().find(|f| f.code == format);
    Quality {
        specs: format_hint.unwrap_or_default().to_string(),
        extension: meta.map(|m| m.extension.to_string()).unwrap_or_default(),
        url: url.to_string(),
        format,
    }
}

/// Video resolution classes fixed by §4.5: code -> lines of resolution.
pub const VIDEO_RESOLUTIONS: [(u8, u32); 5] = [(1, 480), (2, 720), (3, 1080), (4, 1440), (5, 2160)];

/// Fallback only applies among codes 1..4 (`1440->1080->720->480`); code 5
/// means "highest-bandwidth variant regardless of resolution" and has no
/// fallback of its own.
fn next_video_fallback(code: u8) -> Option<u8> {
    match code {
        4 => Some(3),
        3 => Some(2),
        2 => Some(1),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct VideoVariant {
    pub url: String,
    pub bandwidth: u64,
    pub resolution_lines: Option<u32>,
}

/// Sorts variants by descending bandwidth and picks the first whose
/// resolution suffix matches the requested line count, falling back through
/// the resolution chain; code 5 always takes the highest-bandwidth variant.
pub fn negotiate_video(requested: u8, variants: &[VideoVariant]) -> Res<VideoVariant> {
    let mut sorted: Vec<&VideoVariant> = variants.iter().collect();
    sorted.sort_by(|a, b| b.bandwidth.cmp(&a.bandwidth));

    if requested == 5 {
        return sorted
            .first()
            .map(|v| (*v).clone())
            .ok_or_else(|| ShowVaultError::FormatUnavailable("no video variants in master playlist".into()));
    }

    let mut code = requested;
    let mut hops = 0;
    loop {
        let target_lines = VIDEO_RESOLUTIONS.iter().find(|(c, _)| *c == code).map(|(_, l)| *l);
        if let Some(lines) = target_lines {
            if let Some(v) = sorted.iter().find(|v| v.resolution_lines == Some(lines)) {
                return Ok((*v).clone());
            }
        }
        hops += 1;
        match next_video_fallback(code) {
            Some(next) if hops <= VIDEO_RESOLUTIONS.len() => code = next,
            _ => {
                return Err(ShowVaultError::FormatUnavailable(format!(
                    "no video variant matched format {requested} or its fallback chain"
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(format: u8, url: &str) -> Quality {
        Quality { specs: String::new(), extension: String::new(), url: url.to_string(), format }
    }

    #[test]
    fn negotiates_exact_match_with_no_warning() {
        let candidates = vec![q(2, "a.flac")];
        let (chosen, warning) = negotiate_audio(2, &candidates).unwrap();
        assert_eq!(chosen.format, 2);
        assert!(warning.is_none());
    }

    #[test]
    fn falls_back_from_alac_to_aac_through_flac() {
        // Spec scenario 2: requested ALAC (1), only AAC (5) available.
        let candidates = vec![q(5, "a.m4a")];
        let (chosen, warning) = negotiate_audio(1, &candidates).unwrap();
        assert_eq!(chosen.format, 5);
        assert!(warning.unwrap().contains("AAC"));
    }

    #[test]
    fn falls_back_from_alac_to_flac_directly() {
        let candidates = vec![q(2, "a.flac"), q(5, "a.m4a")];
        let (chosen, _) = negotiate_audio(1, &candidates).unwrap();
        assert_eq!(chosen.format, 2);
    }

    #[test]
    fn best_available_request_never_warns() {
        let candidates = vec![q(3, "a.flac")];
        let (chosen, warning) = negotiate_audio(4, &candidates).unwrap();
        assert_eq!(chosen.format, 3);
        assert!(warning.is_none());
    }

    #[test]
    fn exhausted_chain_is_format_unavailable() {
        let candidates: Vec<Quality> = vec![];
        assert!(negotiate_audio(1, &candidates).is_err());
    }

    #[test]
    fn hls_only_requires_every_url_to_be_a_manifest() {
        assert!(is_hls_only(&[q(5, "https://x/master.m3u8?sig=1")]));
        assert!(!is_hls_only(&[q(2, "https://x/track.flac")]));
    }

    #[test]
    fn video_fallback_walks_resolution_chain() {
        let variants = vec![
            VideoVariant { url: "480.ts".into(), bandwidth: 1_000_000, resolution_lines: Some(480) },
            VideoVariant { url: "720.ts".into(), bandwidth: 3_000_000, resolution_lines: Some(720) },
        ];
        let chosen = negotiate_video(4, &variants).unwrap();
        assert_eq!(chosen.resolution_lines, Some(720));
    }

    #[test]
    fn video_format_five_takes_highest_bandwidth_regardless_of_resolution() {
        let variants = vec![
            VideoVariant { url: "low.ts".into(), bandwidth: 500_000, resolution_lines: Some(2160) },
            VideoVariant { url: "high.ts".into(), bandwidth: 9_000_000, resolution_lines: Some(720) },
        ];
        let chosen = negotiate_video(5, &variants).unwrap();
        assert_eq!(chosen.url, "high.ts");
    }
}

//! Thin client for the remote catalog/auth API (contract-only: §1 excludes
//! the wire shape beyond the fields the core consumes, §6).
//!
//! Retry-on-502 and Retry-After handling follow the teacher's
//! `spotify/artists.rs`/`spotify/releases.rs` pattern of looping around a
//! single GET until a non-transient response or a non-retryable error.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::time::sleep;

use crate::error::ShowVaultError;
use crate::types::CatalogEntry;
use crate::Res;

const MAX_RETRY_AFTER_SECS: u64 = 120;

#[derive(Debug, Deserialize)]
pub struct LatestAdditionsResponse {
    #[serde(rename = "RecentItems")]
    pub recent_items: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistListEntry {
    #[serde(rename = "ArtistID")]
    pub artist_id: u64,
    #[serde(rename = "ArtistName")]
    pub artist_name: String,
    #[serde(rename = "NumShows")]
    pub num_shows: Option<u64>,
    #[serde(rename = "NumAlbums")]
    pub num_albums: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistListResponse {
    #[serde(rename = "Artists")]
    pub artists: Vec<ArtistListEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistShowsResponse {
    #[serde(rename = "Containers")]
    pub containers: Vec<CatalogEntry>,
    #[serde(rename = "HasMore", default)]
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionResponse {
    pub id: String,
    #[serde(rename = "planId")]
    pub plan_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: String,
    #[serde(rename = "endsAt")]
    pub ends_at: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamMetadataResponse {
    pub url: String,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackEntry {
    #[serde(rename = "TrackID")]
    pub track_id: u64,
    #[serde(rename = "SongTitle")]
    pub song_title: String,
    #[serde(rename = "TrackNum")]
    pub track_num: u32,
}

#[derive(Debug, Deserialize)]
struct ContainerTracksResponse {
    #[serde(rename = "Tracks")]
    tracks: Vec<TrackEntry>,
}

#[derive(Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: String,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str, token: &str) -> Res<T> {
        let url = format!("{}{path}", self.base_url);
        loop {
            let response = self
                .client
                .get(&url)
                .bearer_auth(token)
                .send()
                .await?;

            match response.error_for_status_ref() {
                Ok(_) => return Ok(response.json::<T>().await?),
                Err(err) => {
                    let status = err.status();
                    if status == Some(StatusCode::BAD_GATEWAY) {
                        sleep(Duration::from_secs(10)).await;
                        continue;
                    }
                    if status == Some(StatusCode::TOO_MANY_REQUESTS) {
                        let retry_after = response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(0);
                        if retry_after > 0 && retry_after <= MAX_RETRY_AFTER_SECS {
                            sleep(Duration::from_secs(retry_after)).await;
                            continue;
                        }
                        return Err(ShowVaultError::NetworkTransient(format!(
                            "rate limited, retry-after {retry_after}s exceeds bound"
                        )));
                    }
                    return Err(err.into());
                }
            }
        }
    }

    pub async fn fetch_latest_additions(&self, token: &str, limit: u64) -> Res<Vec<CatalogEntry>> {
        let resp: LatestAdditionsResponse = self
            .get_json(&format!("/catalog/latest?limit={limit}"), token)
            .await?;
        Ok(resp.recent_items)
    }

    pub async fn fetch_artist_list(&self, token: &str) -> Res<Vec<ArtistListEntry>> {
        let resp: ArtistListResponse = self.get_json("/catalog/artists", token).await?;
        Ok(resp.artists)
    }

    pub async fn fetch_artist_shows_page(
        &self,
        token: &str,
        artist_id: u64,
        page: u64,
    ) -> Res<ArtistShowsResponse> {
        self.get_json(
            &format!("/catalog/artists/{artist_id}/shows?page={page}"),
            token,
        )
        .await
    }

    pub async fn fetch_stream_metadata(
        &self,
        token: &str,
        container_id: u64,
        track_id: u64,
        discriminator: &str,
    ) -> Res<StreamMetadataResponse> {
        self.get_json(
            &format!(
                "/stream?container={container_id}&track={track_id}&d={discriminator}"
            ),
            token,
        )
        .await
    }

    /// Exchanges email/password for an access token. Unlike the indexed
    /// reads above, a login failure is never transient-retried: any non-2xx
    /// response is an authentication failure (§4.11).
    pub async fn fetch_token(&self, email: &str, password: &str) -> Res<TokenResponse> {
        let url = format!("{}/auth/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ShowVaultError::AuthFailure(format!(
                "login rejected with status {}",
                response.status()
            )));
        }
        Ok(response.json::<TokenResponse>().await?)
    }

    pub async fn fetch_subscription(&self, token: &str) -> Res<SubscriptionResponse> {
        self.get_json("/subscription", token).await
    }

    /// Fetches the track listing for one container (show).
    pub async fn fetch_container_tracks(&self, token: &str, container_id: u64) -> Res<Vec<TrackEntry>> {
        let resp: ContainerTracksResponse = self
            .get_json(&format!("/catalog/containers/{container_id}/tracks"), token)
            .await?;
        Ok(resp.tracks)
    }

    /// Resolves a container's video master playlist URL. Unlike audio,
    /// video is one stream per show rather than per track, so this reuses
    /// the stream-metadata endpoint with a fixed "video" discriminator and
    /// no track id (§4.5, §4.6).
    pub async fn fetch_video_master_url(&self, token: &str, container_id: u64) -> Res<String> {
        let resp = self
            .fetch_stream_metadata(token, container_id, 0, "video")
            .await?;
        Ok(resp.url)
    }

    /// HEAD probe used by the size pre-calculator (§4.7 step 6); any failure
    /// silently contributes zero at the caller.
    pub async fn head_content_length(&self, url: &str, timeout: Duration) -> Option<u64> {
        let resp = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .ok()?;
        resp.content_length()
    }
}

//! Session Authenticator (C11).
//!
//! Acquires a bearer token (by credentials or a pre-issued token with any
//! `Bearer ` prefix trimmed), decodes the legacy credentials embedded in its
//! payload, and derives `StreamParams` from the subscription record. Refresh
//! is not implemented (§4.11) — a 401 anywhere downstream means the caller
//! re-authenticates from scratch, mirroring the teacher's `TokenManager`
//! minus its refresh path.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::config::Config;
use crate::error::ShowVaultError;
use crate::remote::RemoteClient;
use crate::types::StreamParams;
use crate::Res;

pub struct Session {
    pub access_token: String,
    pub legacy_token: String,
    pub legacy_uguid: String,
    pub stream_params: StreamParams,
}

#[derive(Deserialize)]
struct LegacyCredentials {
    #[serde(rename = "legacyToken")]
    legacy_token: String,
    #[serde(rename = "legacyUGUID")]
    legacy_uguid: String,
}

pub struct Authenticator {
    remote: RemoteClient,
}

impl Authenticator {
    pub fn new(remote: RemoteClient) -> Self {
        Self { remote }
    }

    /// Resolves a bearer token: a pre-issued `config.token` wins (with a
    /// `Bearer ` prefix stripped if present) over an email/password
    /// exchange, matching the config precedence in §4.11.
    pub async fn login(&self, config: &Config) -> Res<Session> {
        let access_token = match &config.token {
            Some(token) => token.trim_start_matches("Bearer ").to_string(),
            None => {
                let email = config
                    .email
                    .as_deref()
                    .ok_or_else(|| ShowVaultError::ConfigInvalid("no email or token configured".into()))?;
                let password = config
                    .password
                    .as_deref()
                    .ok_or_else(|| ShowVaultError::ConfigInvalid("no password configured".into()))?;
                self.remote.fetch_token(email, password).await?.access_token
            }
        };

        let legacy = decode_legacy_credentials(&access_token)?;
        let subscription = self.remote.fetch_subscription(&access_token).await?;
        let stream_params = derive_stream_params(&subscription, &legacy);

        Ok(Session {
            access_token,
            legacy_token: legacy.legacy_token,
            legacy_uguid: legacy.legacy_uguid,
            stream_params,
        })
    }
}

/// The access token is a JWT; its payload (middle, base64url-no-pad encoded
/// segment) carries the legacy credentials the stream-metadata endpoint
/// still requires (§4.11). Malformed tokens are an auth failure, not a
/// panic.
fn decode_legacy_credentials(token: &str) -> Res<LegacyCredentials> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ShowVaultError::AuthFailure("token is not a JWT (missing payload segment)".into()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| ShowVaultError::AuthFailure(format!("token payload is not valid base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ShowVaultError::AuthFailure(format!("token payload missing legacy credentials: {e}")))
}

fn derive_stream_params(
    subscription: &crate::remote::SubscriptionResponse,
    legacy: &LegacyCredentials,
) -> StreamParams {
    StreamParams {
        subscription_id: subscription.id.clone(),
        user_id: legacy.legacy_uguid.clone(),
        sub_costplan_id_access_list: subscription.plan_id.clone(),
        start_stamp: parse_unix_seconds(&subscription.started_at),
        end_stamp: parse_unix_seconds(&subscription.ends_at),
    }
}

/// Subscription timestamps are carried as RFC3339 strings on the wire;
/// anything unparseable contributes 0 rather than failing the whole login,
/// since a missing validity window only narrows later stream queries.
fn parse_unix_seconds(value: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_jwt(payload_json: &str) -> String {
        let payload = URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
        format!("header.{payload}.signature")
    }

    #[test]
    fn decodes_legacy_credentials_from_jwt_payload() {
        let token = make_jwt(r#"{"legacyToken":"abc","legacyUGUID":"uid-1"}"#);
        let legacy = decode_legacy_credentials(&token).unwrap();
        assert_eq!(legacy.legacy_token, "abc");
        assert_eq!(legacy.legacy_uguid, "uid-1");
    }

    #[test]
    fn rejects_non_jwt_tokens() {
        assert!(decode_legacy_credentials("not-a-jwt").is_err());
    }

    #[test]
    fn rejects_payload_missing_legacy_fields() {
        let token = make_jwt(r#"{"other":"field"}"#);
        assert!(decode_legacy_credentials(&token).is_err());
    }

    #[test]
    fn unparseable_timestamp_contributes_zero() {
        assert_eq!(parse_unix_seconds("not-a-date"), 0);
    }
}

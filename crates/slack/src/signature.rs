//! Slack request signing (`X-Slack-Signature`, `X-Slack-Request-Timestamp`).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const VERSION: &str = "v0";
/// Requests older or newer than this are treated as replays.
pub const MAX_CLOCK_SKEW_SECS: u64 = 60 * 5;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("request timestamp `{0}` is not a unix timestamp")]
    InvalidTimestamp(String),
    #[error("request timestamp is outside the allowed window")]
    Stale,
    #[error("signature does not match the request body")]
    Mismatch,
}

fn mac(secret: &str, timestamp: &str, body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Some(mac)
}

/// The `v0=<hex>` value Slack would send for this body.
pub fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> String {
    mac(secret, timestamp, body)
        .map(|mac| format!("{VERSION}={}", hex::encode(mac.finalize().into_bytes())))
        .unwrap_or_default()
}

pub fn verify(
    secret: &str,
    timestamp: Option<&str>,
    body: &[u8],
    signature: Option<&str>,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let timestamp = timestamp.ok_or(SignatureError::MissingHeader("X-Slack-Request-Timestamp"))?;
    let signature = signature.ok_or(SignatureError::MissingHeader("X-Slack-Signature"))?;

    let sent_at = timestamp
        .trim()
        .parse::<i64>()
        .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_owned()))?;
    let skew =
        now_unix.checked_sub(sent_at).map(i64::unsigned_abs).ok_or(SignatureError::Stale)?;
    if skew > MAX_CLOCK_SKEW_SECS {
        return Err(SignatureError::Stale);
    }

    let provided = signature
        .strip_prefix("v0=")
        .and_then(|value| hex::decode(value).ok())
        .ok_or(SignatureError::Mismatch)?;
    mac(secret, timestamp, body)
        .ok_or(SignatureError::Mismatch)?
        .verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

//! Request signing for the BPJS gateways.
//!
//! Every outbound call carries a fresh timestamp and
//! `base64(HMAC-SHA256(consumer_id + "&" + timestamp, secret))`. The
//! upstream rejects stale timestamps, so a [`SignedRequest`] must never be
//! reused across calls.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::OffsetDateTime;

use crate::credentials::CredentialSet;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_CONS_ID: &str = "X-cons-id";
pub const HEADER_TIMESTAMP: &str = "X-timestamp";
pub const HEADER_SIGNATURE: &str = "X-signature";
pub const HEADER_USER_KEY: &str = "user_key";

/// Current UTC time as whole seconds since the epoch.
pub fn timestamp() -> String {
    OffsetDateTime::now_utc().unix_timestamp().to_string()
}

/// Computes the `X-signature` value.
pub fn sign(consumer_id: &str, timestamp: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(consumer_id.as_bytes());
    mac.update(b"&");
    mac.update(timestamp.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Timestamp and signature pair for one outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub timestamp: String,
    pub signature: String,
}

impl SignedRequest {
    /// Signs with the current time.
    pub fn now(credentials: &CredentialSet) -> Self {
        Self::at(credentials, timestamp())
    }

    /// Signs with an explicit timestamp.
    pub fn at(credentials: &CredentialSet, timestamp: impl Into<String>) -> Self {
        let timestamp = timestamp.into();
        let signature = sign(&credentials.consumer_id, &timestamp, &credentials.secret_key);
        Self {
            timestamp,
            signature,
        }
    }

    /// Authentication headers sent with every request.
    pub fn headers(&self, credentials: &CredentialSet) -> [(&'static str, String); 5] {
        [
            (HEADER_CONS_ID, credentials.consumer_id.clone()),
            (HEADER_TIMESTAMP, self.timestamp.clone()),
            (HEADER_SIGNATURE, self.signature.clone()),
            (HEADER_USER_KEY, credentials.user_key.clone()),
            ("Accept", "application/json".to_string()),
        ]
    }
}

//! Credential checks for the admin API and signed customer sessions.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Decides whether a presented admin credential is acceptable.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, token: &str) -> bool;
}

/// Accepts exactly one shared token.
pub struct StaticTokenAuthorizer {
    token: String,
}

impl StaticTokenAuthorizer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authorizer for StaticTokenAuthorizer {
    fn authorize(&self, token: &str) -> bool {
        !self.token.is_empty() && constant_time_compare(&self.token, token)
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// Issues and checks customer session tokens of the form
/// `{identifier}.{expiry_unix_seconds}.{hex hmac-sha256}`.
#[derive(Clone)]
pub struct SessionSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl SessionSigner {
    /// A TTL outside chrono's range yields sessions that expire immediately.
    pub fn new(secret: impl AsRef<[u8]>, ttl_hours: i64) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl: Duration::try_hours(ttl_hours).unwrap_or_else(Duration::zero),
        }
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AppError::Internal("invalid session secret".to_string()))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    pub fn issue(&self, identifier: &str, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>), AppError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Internal("session expiry out of range".to_string()))?;
        let payload = format!("{}.{}", identifier, expires_at.timestamp());
        let signature = hex::encode(self.mac(&payload)?.finalize().into_bytes());
        Ok((format!("{}.{}", payload, signature), expires_at))
    }

    /// Returns the identifier the token was issued for.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<String, AppError> {
        let invalid = || AppError::Unauthorized("invalid or expired session".to_string());

        let (payload, signature) = token.rsplit_once('.').ok_or_else(invalid)?;
        let (identifier, expiry) = payload.rsplit_once('.').ok_or_else(invalid)?;
        let signature = hex::decode(signature).map_err(|_| invalid())?;

        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| invalid())?;

        let expires_at = expiry
            .parse::<i64>()
            .ok()
            .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single())
            .ok_or_else(invalid)?;
        if expires_at <= now {
            return Err(invalid());
        }

        Ok(identifier.to_string())
    }
}

//! In-memory ID token cache

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{AuthError, Result};

/// Tokens are refreshed this long before they expire.
pub const CACHE_REFRESH_MARGIN_SECS: i64 = 60;

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

/// Holds at most one ID token together with its expiry.
///
/// Token and expiry live behind a single lock, so a reader never sees one
/// without the other.
pub struct IdTokenCache {
    entry: Mutex<Option<CachedToken>>,
}

impl IdTokenCache {
    pub const fn new() -> Self {
        Self {
            entry: Mutex::new(None),
        }
    }

    /// The cached token, if it is still outside the refresh margin.
    pub fn get(&self) -> Option<String> {
        self.get_at(Utc::now())
    }

    pub fn get_at(&self, now: DateTime<Utc>) -> Option<String> {
        let entry = self.lock();
        let cached = entry.as_ref()?;
        if now < cached.expires_at - Duration::seconds(CACHE_REFRESH_MARGIN_SECS) {
            Some(cached.token.expose_secret().to_string())
        } else {
            None
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.lock().as_ref().map(|cached| cached.expires_at)
    }

    /// Replaces the cached token. A token whose expiry cannot be read
    /// empties the cache and is rejected.
    pub fn store(&self, token: &str) -> Result<DateTime<Utc>> {
        let mut entry = self.lock();
        match decode_expiry(token) {
            Ok(expires_at) => {
                *entry = Some(CachedToken {
                    token: SecretString::from(token.to_string()),
                    expires_at,
                });
                tracing::debug!(%expires_at, "cached new ID token");
                Ok(expires_at)
            }
            Err(e) => {
                *entry = None;
                Err(e)
            }
        }
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<CachedToken>> {
        self.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for IdTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdTokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTokenCache")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at())
            .finish()
    }
}

/// Reads the `exp` claim of a JWT without verifying its signature.
pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::InvalidToken("token is not a JWT".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::InvalidToken(format!("malformed payload: {e}")))?;
    let claims: Value = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidToken(format!("malformed claims: {e}")))?;

    let exp = claims
        .get("exp")
        .and_then(|exp| exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64)))
        .ok_or_else(|| {
            AuthError::InvalidToken("Token does not contain an 'exp' claim.".to_string())
        })?;

    DateTime::from_timestamp(exp, 0)
        .ok_or_else(|| AuthError::InvalidToken(format!("'exp' out of range: {exp}")))
}

#[cfg(test)]
pub(crate) fn test_jwt(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

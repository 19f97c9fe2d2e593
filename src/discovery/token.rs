//! Directory access token and its shared, refreshable slot

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// App access token issued by the directory's token endpoint
///
/// `issued` is stamped locally (Unix seconds) when the token is received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccessToken {
    #[serde(default)]
    pub access_token: String,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
    /// Unix seconds at issuance
    #[serde(default)]
    pub issued: i64,
}

impl AccessToken {
    /// Unix seconds after which the token is no longer valid
    #[inline]
    pub fn expires_at(&self) -> i64 {
        self.issued.saturating_add(self.expires_in)
    }

    /// Expired relative to `now` (Unix seconds)
    #[inline]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.expires_at()
    }

    /// Expired relative to the wall clock
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    /// Expiry as RFC 3339, for logs
    pub fn expiry_display(&self) -> String {
        OffsetDateTime::from_unix_timestamp(self.expires_at())
            .ok()
            .and_then(|t| t.format(&Rfc3339).ok())
            .unwrap_or_else(|| "invalid".to_string())
    }
}

/// Current wall-clock time in Unix seconds
#[inline]
pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Shared slot holding the single current token
///
/// Cloned into the discovery poller; read back at shutdown so the refreshed
/// token can be persisted.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<AccessToken>>,
}

impl TokenStore {
    pub fn new(token: AccessToken) -> Self {
        Self {
            inner: Arc::new(RwLock::new(token)),
        }
    }

    /// Copy of the current token
    pub fn current(&self) -> AccessToken {
        self.inner.read().clone()
    }

    /// Replace the token in place
    pub fn replace(&self, token: AccessToken) {
        *self.inner.write() = token;
    }

    /// Forget the token so the next cycle refreshes it
    pub fn invalidate(&self) {
        *self.inner.write() = AccessToken::default();
    }

    pub fn is_expired(&self) -> bool {
        self.inner.read().is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(issued: i64, expires_in: i64) -> AccessToken {
        AccessToken {
            access_token: "abc".to_string(),
            expires_in,
            token_type: "bearer".to_string(),
            issued,
        }
    }

    #[test]
    fn test_expiry() {
        let t = token(1_000, 3_600);
        assert_eq!(t.expires_at(), 4_600);
        assert!(!t.is_expired_at(4_600));
        assert!(t.is_expired_at(4_601));
    }

    #[test]
    fn test_default_token_is_expired() {
        assert!(AccessToken::default().is_expired());
    }

    #[test]
    fn test_fresh_token_not_expired() {
        assert!(!token(unix_now(), 3_600).is_expired());
    }

    #[test]
    fn test_expiry_display() {
        assert_eq!(token(0, 60).expiry_display(), "1970-01-01T00:01:00Z");
    }

    #[test]
    fn test_store_invalidate() {
        let store = TokenStore::new(token(unix_now(), 3_600));
        let clone = store.clone();
        assert!(!clone.is_expired());

        store.invalidate();

        assert!(clone.is_expired());
        assert_eq!(clone.current(), AccessToken::default());
    }

    #[test]
    fn test_token_deserialize_without_issued() {
        let json = r#"{"access_token":"xyz","expires_in":5000,"token_type":"bearer"}"#;
        let t: AccessToken = serde_json::from_str(json).unwrap();
        assert_eq!(t.access_token, "xyz");
        assert_eq!(t.expires_in, 5000);
        assert_eq!(t.issued, 0);
    }
}

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

/// Assertions are valid for 20 minutes; a cached one is reused until it is
/// 15 minutes old so we never hand APNs a token near expiry.
const ASSERTION_LIFETIME_SECS: i64 = 20 * 60;
const ASSERTION_REUSE_SECS: i64 = 15 * 60;

#[derive(Serialize)]
struct Claims {
    iss: String,
    iat: i64,
    exp: i64,
}

struct CachedAssertion {
    value: String,
    issued_at: i64,
}

/// APNs provider credentials: the ES256 signing key plus team and key ids.
///
/// Loaded once at startup and immutable afterwards; safe to share across any
/// number of concurrent deliveries. Only the small assertion cache sits
/// behind a lock.
pub struct ApnsCredentials {
    team_id: String,
    key_id: String,
    key: EncodingKey,
    cached: Mutex<Option<CachedAssertion>>,
}

impl ApnsCredentials {
    /// Read the `.p8` signing key from disk.
    ///
    /// This is the one startup step that must abort the process on failure:
    /// without key material no push can ever succeed.
    pub fn load(team_id: &str, key_id: &str, key_path: &Path) -> Result<Self> {
        let pem = std::fs::read(key_path).with_context(|| {
            format!("Failed to read APNs signing key {}", key_path.display())
        })?;
        Self::from_pem(team_id, key_id, &pem)
    }

    pub fn from_pem(team_id: &str, key_id: &str, pem: &[u8]) -> Result<Self> {
        let key = EncodingKey::from_ec_pem(pem).context("Invalid APNs signing key")?;
        Ok(Self {
            team_id: team_id.to_string(),
            key_id: key_id.to_string(),
            key,
            cached: Mutex::new(None),
        })
    }

    /// Return a signed provider assertion, minting a fresh one when the
    /// cached token is stale.
    pub fn assertion(&self) -> Result<String> {
        let now = Utc::now().timestamp();

        let mut cached = self.cached.lock().expect("assertion cache poisoned");
        if let Some(ref entry) = *cached {
            if now - entry.issued_at < ASSERTION_REUSE_SECS {
                return Ok(entry.value.clone());
            }
        }

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());
        let claims = Claims {
            iss: self.team_id.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let value = encode(&header, &claims, &self.key).context("Failed to sign assertion")?;

        *cached = Some(CachedAssertion {
            value: value.clone(),
            issued_at: now,
        });
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = include_str!("../../tests/fixtures/AuthKey_TEST123456.p8");

    #[test]
    fn signs_an_es256_assertion() {
        let creds = ApnsCredentials::from_pem("TEAM42", "TEST123456", TEST_KEY.as_bytes())
            .expect("Failed to load test key");
        let token = creds.assertion().expect("Failed to sign");

        // Compact JWS: header.claims.signature
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn reuses_a_fresh_assertion() {
        let creds = ApnsCredentials::from_pem("TEAM42", "TEST123456", TEST_KEY.as_bytes())
            .expect("Failed to load test key");

        let first = creds.assertion().expect("Failed to sign");
        let second = creds.assertion().expect("Failed to sign");
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_garbage_key_material() {
        let result = ApnsCredentials::from_pem("TEAM42", "TEST123456", b"not a pem");
        assert!(result.is_err());
    }

    #[test]
    fn loads_the_key_from_disk() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("AuthKey_TEST123456.p8");
        std::fs::write(&path, TEST_KEY).expect("Failed to write key");

        let creds =
            ApnsCredentials::load("TEAM42", "TEST123456", &path).expect("Failed to load key");
        creds.assertion().expect("Failed to sign");
    }

    #[test]
    fn a_missing_key_file_is_an_error() {
        let result =
            ApnsCredentials::load("TEAM42", "TEST123456", Path::new("/nonexistent/key.p8"));
        assert!(result.is_err());
    }
}

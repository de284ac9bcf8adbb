//! Values exchanged with the remote authentication service

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use sha2::{Digest, Sha256};
use std::fmt;

/// The (numeric id, secret hash) pair that identifies the client application
/// to the remote service.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_id: i32,
    pub api_hash: Secret<String>,
}

impl ApiCredentials {
    pub fn new(api_id: i32, api_hash: impl Into<String>) -> Self {
        Self {
            api_id,
            api_hash: Secret::new(api_hash.into()),
        }
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &self.api_hash)
            .finish()
    }
}

/// Opaque value returned by a code request; it must accompany the matching
/// verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of submitting a one-time code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInOutcome {
    /// The account is signed in; the session can be exported.
    Authorized,
    /// The account has a second-factor password that must be checked next.
    PasswordRequired,
}

/// Long-lived session string that re-establishes an authenticated connection.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Secret<String>);

impl Credential {
    pub fn new(session_string: impl Into<String>) -> Self {
        Self(Secret::new(session_string.into()))
    }

    /// The raw session string. Only the reply delivered to the operator
    /// should ever see this.
    pub fn expose(&self) -> &str {
        self.0.expose()
    }

    /// Stable, non-reversible identifier safe to put in logs: the first
    /// 9 bytes of SHA-256 over the session string, base64url encoded.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.expose().as_bytes());
        URL_SAFE_NO_PAD.encode(&digest[..9])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

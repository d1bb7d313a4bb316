//! Identity-provider capability.
//!
//! The pipeline never inspects tokens itself: signature, issuer, audience and
//! expiry checks belong to the provider, and so does the claims lookup.

use serde::{Deserialize, Serialize};

/// Result of a successful token validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedToken {
    /// `sub` claim as issued.
    pub subject: String,
    /// `exp` claim, Unix seconds.
    pub expiry: u64,
    /// The raw token, kept for the claims lookup.
    #[serde(skip)]
    pub(crate) raw: String,
}

impl ValidatedToken {
    /// A validated token for `subject` expiring at `expiry`.
    #[must_use]
    pub fn new(subject: impl Into<String>, expiry: u64, raw: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            expiry,
            raw: raw.into(),
        }
    }

    /// The bearer token this validation was made for.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Profile claims for a validated subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectClaims {
    /// `sub`
    #[serde(rename = "sub")]
    pub subject: String,
    /// `given_name`
    #[serde(default)]
    pub given_name: String,
    /// `family_name`
    #[serde(default)]
    pub family_name: String,
}

/// Identity-provider failures. Every variant is a token rejection to callers.
#[derive(Debug, thiserror::Error)]
pub enum IdpError {
    /// Signature, issuer, audience or expiry check failed.
    #[error("token rejected: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The JWT header carries no `kid`.
    #[error("JWT missing 'kid' field in header")]
    MissingKeyId,

    /// The `kid` is not in the provider's key set, even after a refresh.
    #[error("unknown key ID: {0}")]
    UnknownKeyId(String),

    /// Discovery, key set or userinfo request failed.
    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with something unusable.
    #[error("identity provider response invalid: {0}")]
    InvalidResponse(String),

    /// The call did not complete within the configured bound.
    #[error("identity provider timed out")]
    Timeout,
}

/// Validates bearer tokens and resolves subject claims.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Check signature, issuer, audience and expiry.
    async fn validate(&self, token: &str) -> Result<ValidatedToken, IdpError>;

    /// Fetch profile claims for a token that passed [`Self::validate`].
    async fn fetch_claims(&self, validated: &ValidatedToken) -> Result<SubjectClaims, IdpError>;
}

//! Credential extraction from request headers.

use aaa_core::CredentialKind;
use axum::http::{HeaderMap, header};

/// Client id header.
pub const CLIENT_ID_HEADER: &str = "x-client-id";
/// Client secret header.
pub const CLIENT_SECRET_HEADER: &str = "x-client-secret";
/// Delegation id header.
pub const DELEGATION_ID_HEADER: &str = "x-delegation-id";
/// Provider id header.
pub const PROVIDER_ID_HEADER: &str = "x-provider-id";

/// What the caller presented.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: Bearer <token>`
    BearerToken(String),
    /// `X-Client-Id` and `X-Client-Secret`
    ClientCredentials {
        /// Raw client id; parsed during lookup.
        client_id: String,
        /// Plaintext secret; only ever handed to the verifier.
        client_secret: String,
    },
    /// Nothing usable.
    None,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BearerToken(_) => f.write_str("BearerToken(<redacted>)"),
            Self::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Self::None => f.write_str("None"),
        }
    }
}

impl Credential {
    /// Classify request headers.
    ///
    /// A well-formed bearer header wins. Otherwise both client headers must
    /// be present. A malformed bearer header counts as absent, so a request
    /// with a broken `Authorization` and valid client headers still
    /// authenticates with the client pair.
    #[must_use]
    pub fn extract(headers: &HeaderMap) -> Self {
        if let Some(token) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer)
        {
            return Self::BearerToken(token.to_string());
        }

        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        match (text(CLIENT_ID_HEADER), text(CLIENT_SECRET_HEADER)) {
            (Some(id), Some(secret)) => Self::ClientCredentials {
                client_id: id.trim().to_string(),
                client_secret: secret.to_string(),
            },
            _ => Self::None,
        }
    }

    /// Scheme used, if any.
    #[must_use]
    pub fn kind(&self) -> Option<CredentialKind> {
        match self {
            Self::BearerToken(_) => Some(CredentialKind::BearerToken),
            Self::ClientCredentials { .. } => Some(CredentialKind::ClientCredentials),
            Self::None => None,
        }
    }
}

/// `Bearer <token>` with exactly one space-separated token.
fn parse_bearer(value: &str) -> Option<&str> {
    let mut parts = value.split(' ');
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || token.is_empty() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}

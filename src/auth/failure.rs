//! Request-boundary failures and their wire envelope.

use aaa_core::{IdentityContext, Role};
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

/// URN namespace of failure `type` values.
pub const URN_PREFIX: &str = "urn:dx:as:";

/// Why a request was not given an identity.
///
/// Reasons carried by variants are for server-side logs; the envelope only
/// ever shows the fixed public detail (and, for delegation, the reason).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    /// No usable credential on an endpoint that needs one.
    #[error("missing credential")]
    MissingCredential,

    /// Bearer token rejected by the identity provider or its claims lookup.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Client id unknown or secret mismatch. The two are indistinguishable.
    #[error("invalid client credentials")]
    InvalidSecret,

    /// Token valid but its subject is not a platform user.
    #[error("unknown principal: {0}")]
    UnknownPrincipal(String),

    /// Caller holds none of the roles an operation accepts.
    #[error("insufficient role")]
    InsufficientRole,

    /// Delegation or provider-scope header rejected.
    #[error("invalid delegation: {0}")]
    InvalidDelegation(String),

    /// Storage or other server-side fault.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Problem-details style body returned for every failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEnvelope {
    /// `urn:dx:as:<Code>`
    #[serde(rename = "type")]
    pub kind: String,
    /// Short human title.
    pub title: String,
    /// Human explanation.
    pub detail: String,
    /// HTTP status, repeated in the body.
    pub status: u16,
}

impl AuthFailure {
    /// HTTP status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredential
            | Self::InvalidToken(_)
            | Self::InvalidSecret
            | Self::UnknownPrincipal(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientRole => StatusCode::FORBIDDEN,
            Self::InvalidDelegation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Failure code, the last segment of the URN.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "MissingAuthenticationToken",
            Self::InvalidToken(_) | Self::UnknownPrincipal(_) => "InvalidAuthenticationToken",
            Self::InvalidSecret | Self::InvalidDelegation(_) => "InvalidInput",
            Self::InsufficientRole => "InvalidRole",
            Self::Internal(_) => "InternalServerError",
        }
    }

    /// Human title.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::MissingCredential => "Missing authentication token",
            Self::InvalidToken(_) => "Invalid authentication token",
            Self::InvalidSecret => "Invalid client ID/secret",
            Self::UnknownPrincipal(_) => "User profile not found",
            Self::InsufficientRole => "Invalid role",
            Self::InvalidDelegation(_) => "Invalid delegation",
            Self::Internal(_) => "Internal server error",
        }
    }

    fn public_detail(&self) -> String {
        match self {
            Self::MissingCredential => {
                "Provide a bearer token or a client ID/secret pair".to_string()
            }
            Self::InvalidToken(_) => "Token is invalid or expired".to_string(),
            Self::InvalidSecret => "Invalid client ID/secret".to_string(),
            Self::UnknownPrincipal(_) => "Token subject is not a registered user".to_string(),
            Self::InsufficientRole => {
                "Caller holds none of the roles this operation accepts".to_string()
            }
            Self::InvalidDelegation(reason) => reason.clone(),
            Self::Internal(_) => "Internal error".to_string(),
        }
    }

    /// Wire body for this failure.
    #[must_use]
    pub fn envelope(&self) -> FailureEnvelope {
        FailureEnvelope {
            kind: format!("{URN_PREFIX}{}", self.code()),
            title: self.title().to_string(),
            detail: self.public_detail(),
            status: self.status().as_u16(),
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            error!(detail = %detail, "Internal error during authentication");
        }
        let status = self.status();
        let body = Json(self.envelope());
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

/// Role checks downstream handlers may run on a resolved identity.
pub trait RequireRole {
    /// `Ok` when the caller holds at least one of `roles`.
    fn require_any(&self, roles: &[Role]) -> Result<(), AuthFailure>;
}

impl RequireRole for IdentityContext {
    fn require_any(&self, roles: &[Role]) -> Result<(), AuthFailure> {
        if self.has_any_role(roles) {
            Ok(())
        } else {
            Err(AuthFailure::InsufficientRole)
        }
    }
}

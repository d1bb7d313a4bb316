//! Audit trail for pipeline outcomes.
//!
//! Every event is emitted via `tracing::info!` with the JSON-serialized event
//! in the `audit` field, queryable by any log aggregator.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `auth.succeeded` | A request was given an identity context |
//! | `auth.failed` | The pipeline stopped on a failure |
//! | `delegation.attached` | A delegation grant was validated for the caller |
//! | `provider_scope.attached` | A provider-scope grant was validated for the caller |
//!
//! Events never carry secrets or raw bearer tokens. A token is identified by
//! the first 16 hex digits of its SHA-256 digest.

use aaa_core::{CredentialKind, DelegationContext, IdentityContext, ProviderScope, Role};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::AuthFailure;

/// Structured audit event.
#[derive(Debug, Default, Serialize)]
pub struct AuditEvent {
    /// Event type string (e.g., `"auth.succeeded"`).
    pub event: &'static str,
    /// Request path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Authenticated user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// Credential scheme presented.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<CredentialKind>,
    /// Bearer token fingerprint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_fingerprint: Option<String>,
    /// Resolved roles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Role>>,
    /// Asserted delegation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_id: Option<Uuid>,
    /// User acted for (delegator or provider).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_behalf_of: Option<Uuid>,
    /// Failure code for `auth.failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    /// Server-side failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    /// Construct an `auth.succeeded` event.
    #[must_use]
    pub fn succeeded(ctx: &IdentityContext, fingerprint: Option<String>, path: &str) -> Self {
        Self {
            event: "auth.succeeded",
            path: Some(path.to_string()),
            user_id: Some(ctx.identity.user_id),
            credential: Some(ctx.credential),
            token_fingerprint: fingerprint,
            roles: Some(ctx.identity.roles.iter().copied().collect()),
            ..Self::default()
        }
    }

    /// Construct an `auth.failed` event.
    #[must_use]
    pub fn failed(
        failure: &AuthFailure,
        credential: Option<CredentialKind>,
        fingerprint: Option<String>,
        path: &str,
    ) -> Self {
        Self {
            event: "auth.failed",
            path: Some(path.to_string()),
            credential,
            token_fingerprint: fingerprint,
            code: Some(failure.code()),
            reason: Some(failure.to_string()),
            ..Self::default()
        }
    }

    /// Construct a `delegation.attached` event.
    #[must_use]
    pub fn delegation_attached(user_id: Uuid, delegation: &DelegationContext) -> Self {
        Self {
            event: "delegation.attached",
            user_id: Some(user_id),
            delegation_id: Some(delegation.delegation_id),
            on_behalf_of: Some(delegation.delegator_user_id),
            roles: Some(vec![delegation.role]),
            ..Self::default()
        }
    }

    /// Construct a `provider_scope.attached` event.
    #[must_use]
    pub fn provider_scope_attached(user_id: Uuid, scope: &ProviderScope) -> Self {
        Self {
            event: "provider_scope.attached",
            user_id: Some(user_id),
            on_behalf_of: Some(scope.provider_id),
            ..Self::default()
        }
    }
}

/// Short stable identifier for a bearer token.
#[must_use]
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Emit an audit event via `tracing::info!`.
///
/// ```text
/// INFO aaa_server::auth::audit audit={"event":"auth.succeeded",...}
/// ```
pub fn emit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) => tracing::info!(audit = %json, "auth audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}

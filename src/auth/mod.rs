//! Request authentication and authorization-resolution pipeline.
//!
//! ```text
//! Credential::extract → {TokenAuthenticator | SecretAuthenticator}
//!                     → RoleResolver
//!                     → [DelegationResolver | ProviderScopeResolver]
//!                     → IdentityContext
//! ```
//!
//! Stages run strictly in order; the first failure stops the run. Bracketed
//! stages only run when their trigger header is present.

use std::time::Duration;

use aaa_core::{CredentialKind, DisplayName};
use uuid::Uuid;

pub mod audit;
pub mod client;
pub mod credential;
pub mod delegation;
pub mod failure;
pub mod idp;
pub mod latch;
pub mod oidc;
pub mod pipeline;
pub mod roles;
pub mod secret;
pub mod token;

pub use client::SecretAuthenticator;
pub use credential::Credential;
pub use delegation::{DelegationResolver, ProviderScopeResolver, StageOutcome};
pub use failure::{AuthFailure, FailureEnvelope, RequireRole};
pub use idp::{IdentityProvider, IdpError, SubjectClaims, ValidatedToken};
pub use latch::FailureLatch;
pub use oidc::OidcProvider;
pub use pipeline::{AuthPipeline, AuthRequest};
pub use roles::RoleResolver;
pub use secret::{SecretError, SecretVerifier};
pub use token::TokenAuthenticator;

use crate::store::StoreError;

/// An authenticated caller before role resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Platform user id.
    pub user_id: Uuid,
    /// Present for bearer callers only.
    pub display_name: Option<DisplayName>,
    /// Scheme the caller authenticated with.
    pub credential: CredentialKind,
}

/// Run a storage call under `timeout`. Errors and timeouts are internal.
pub(crate) async fn bounded_store_call<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, AuthFailure> {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(AuthFailure::Internal(e.to_string())),
        Err(_) => Err(AuthFailure::Internal(StoreError::Timeout.to_string())),
    }
}

//! Pipeline driver.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use aaa_core::{IdentityContext, Role};
use axum::http::HeaderMap;
use tracing::{debug, warn};

use super::audit::{self, AuditEvent};
use super::credential::{DELEGATION_ID_HEADER, PROVIDER_ID_HEADER};
use super::{
    AuthFailure, Credential, DelegationResolver, FailureLatch, IdentityProvider, Principal,
    ProviderScopeResolver, RoleResolver, SecretAuthenticator, SecretVerifier, TokenAuthenticator,
};
use crate::config::AuthConfig;
use crate::store::{ClientStore, DelegationStore, RoleStore};

/// Inputs of one pipeline run.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Request headers.
    pub headers: HeaderMap,
    /// Request path, for the audit trail.
    pub path: String,
    /// Roles the endpoint is interested in.
    pub requested: BTreeSet<Role>,
    /// Whether the endpoint may be called without any credential.
    pub bootstrap: bool,
}

/// The full authentication and authorization-resolution pipeline.
///
/// Cheap to clone: every stage shares its collaborators through `Arc`s.
#[derive(Clone)]
pub struct AuthPipeline {
    tokens: TokenAuthenticator,
    clients: SecretAuthenticator,
    roles: RoleResolver,
    delegations: DelegationResolver,
    providers: ProviderScopeResolver,
}

impl AuthPipeline {
    /// Wire all stages to one store implementing every storage capability.
    #[must_use]
    pub fn new<S>(
        idp: Arc<dyn IdentityProvider>,
        store: Arc<S>,
        verifier: SecretVerifier,
        config: &AuthConfig,
        idp_timeout: Duration,
    ) -> Self
    where
        S: RoleStore + ClientStore + DelegationStore,
    {
        let timeout = config.storage_timeout;
        Self {
            tokens: TokenAuthenticator::new(idp, idp_timeout),
            clients: SecretAuthenticator::new(store.clone(), verifier, timeout),
            roles: RoleResolver::new(store.clone(), config.cos_admin_user_id, timeout),
            delegations: DelegationResolver::new(store.clone(), timeout),
            providers: ProviderScopeResolver::new(store, config.trust_domain.clone(), timeout),
        }
    }

    /// Run on a task of its own and wait for the result.
    ///
    /// If the caller stops waiting (client disconnect), the run still
    /// completes and its result is dropped; no partially built identity is
    /// observable.
    pub async fn run_detached(
        &self,
        request: AuthRequest,
    ) -> Result<Option<IdentityContext>, AuthFailure> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run(&request).await })
            .await
            .unwrap_or_else(|e| Err(AuthFailure::Internal(format!("pipeline task failed: {e}"))))
    }

    /// Run every stage in order.
    ///
    /// `Ok(None)` only for a bootstrap endpoint called without credentials.
    pub async fn run(&self, request: &AuthRequest) -> Result<Option<IdentityContext>, AuthFailure> {
        let latch = FailureLatch::new();
        let credential = Credential::extract(&request.headers);
        let fingerprint = match &credential {
            Credential::BearerToken(token) => Some(audit::fingerprint(token)),
            _ => None,
        };

        let outcome = self.stages(request, &credential, &latch).await;

        match latch.into_failure() {
            Some(failure) => {
                warn!(
                    path = %request.path,
                    code = failure.code(),
                    "Authentication failed"
                );
                audit::emit(&AuditEvent::failed(
                    &failure,
                    credential.kind(),
                    fingerprint,
                    &request.path,
                ));
                Err(failure)
            }
            None => {
                if let Some(ctx) = &outcome {
                    audit::emit(&AuditEvent::succeeded(ctx, fingerprint, &request.path));
                }
                Ok(outcome)
            }
        }
    }

    /// Each stage either yields its value or trips the latch and stops.
    async fn stages(
        &self,
        request: &AuthRequest,
        credential: &Credential,
        latch: &FailureLatch,
    ) -> Option<IdentityContext> {
        macro_rules! stage {
            ($result:expr) => {
                match $result {
                    Ok(value) => value,
                    Err(failure) => {
                        latch.trip(failure);
                        return None;
                    }
                }
            };
        }

        let principal: Principal = match credential {
            Credential::BearerToken(token) => stage!(self.tokens.authenticate(token).await),
            Credential::ClientCredentials {
                client_id,
                client_secret,
            } => stage!(self.clients.authenticate(client_id, client_secret).await),
            Credential::None if request.bootstrap => {
                debug!(path = %request.path, "No credential on bootstrap endpoint");
                return None;
            }
            Credential::None => {
                latch.trip(AuthFailure::MissingCredential);
                return None;
            }
        };

        let identity = stage!(self.roles.resolve(&principal, &request.requested).await);

        let delegation_header = request.headers.get(DELEGATION_ID_HEADER);
        let provider_header = request.headers.get(PROVIDER_ID_HEADER);
        if delegation_header.is_some() && provider_header.is_some() {
            latch.trip(AuthFailure::InvalidDelegation(
                "X-Delegation-Id and X-Provider-Id cannot be combined".to_string(),
            ));
            return None;
        }

        let delegation = stage!(
            self.delegations
                .resolve(&identity, delegation_header)
                .await
                .into_result()
        );
        let provider_scope = if delegation.is_none() {
            stage!(
                self.providers
                    .resolve(&identity, provider_header)
                    .await
                    .into_result()
            )
        } else {
            None
        };

        if let Some(d) = &delegation {
            audit::emit(&AuditEvent::delegation_attached(identity.user_id, d));
        }
        if let Some(p) = &provider_scope {
            audit::emit(&AuditEvent::provider_scope_attached(identity.user_id, p));
        }

        Some(IdentityContext {
            identity,
            credential: principal.credential,
            delegation,
            provider_scope,
        })
    }
}

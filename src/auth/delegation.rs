//! Delegation and provider-scope resolution.
//!
//! Both stages are optional and triggered by a request header. They run
//! after role resolution and never both on one request.

use std::sync::Arc;
use std::time::Duration;

use aaa_core::{DelegationContext, Identity, ProviderScope, Role};
use axum::http::HeaderValue;
use tracing::debug;
use uuid::Uuid;

use super::{AuthFailure, bounded_store_call};
use crate::store::DelegationStore;

/// Result of an optional stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<T> {
    /// Trigger header absent.
    Skipped,
    /// Header validated; attach the value.
    Attached(T),
    /// Header rejected.
    Failed(AuthFailure),
}

impl<T> StageOutcome<T> {
    /// `Skipped` → `Ok(None)`, `Attached(v)` → `Ok(Some(v))`.
    pub fn into_result(self) -> Result<Option<T>, AuthFailure> {
        match self {
            Self::Skipped => Ok(None),
            Self::Attached(v) => Ok(Some(v)),
            Self::Failed(f) => Err(f),
        }
    }
}

fn parse_id(header: &HeaderValue, what: &str) -> Result<Uuid, AuthFailure> {
    let raw = header
        .to_str()
        .map_err(|_| AuthFailure::InvalidDelegation(format!("{what} is not valid text")))?
        .trim();
    if raw.is_empty() {
        return Err(AuthFailure::InvalidDelegation(format!("{what} is blank")));
    }
    Uuid::parse_str(raw)
        .map_err(|_| AuthFailure::InvalidDelegation(format!("{what} is not a UUID")))
}

/// Validates an asserted delegation id against the caller.
#[derive(Clone)]
pub struct DelegationResolver {
    delegations: Arc<dyn DelegationStore>,
    timeout: Duration,
}

impl DelegationResolver {
    /// Bound the grant lookup by `timeout`.
    #[must_use]
    pub fn new(delegations: Arc<dyn DelegationStore>, timeout: Duration) -> Self {
        Self {
            delegations,
            timeout,
        }
    }

    /// Resolve `X-Delegation-Id` for `identity`.
    ///
    /// The caller must hold [`Role::Delegate`] among the resolved roles, and
    /// the grant must have been issued to the caller.
    pub async fn resolve(
        &self,
        identity: &Identity,
        header: Option<&HeaderValue>,
    ) -> StageOutcome<DelegationContext> {
        let Some(header) = header else {
            return StageOutcome::Skipped;
        };
        match self.attach(identity, header).await {
            Ok(ctx) => StageOutcome::Attached(ctx),
            Err(f) => StageOutcome::Failed(f),
        }
    }

    async fn attach(
        &self,
        identity: &Identity,
        header: &HeaderValue,
    ) -> Result<DelegationContext, AuthFailure> {
        if !identity.has_role(Role::Delegate) {
            return Err(AuthFailure::InvalidDelegation(
                "Caller does not hold the DELEGATE role".to_string(),
            ));
        }
        let delegation_id = parse_id(header, "Delegation id")?;

        let grant = bounded_store_call(
            self.timeout,
            self.delegations.get_grant(delegation_id, identity.user_id),
        )
        .await?
        .ok_or_else(|| {
            AuthFailure::InvalidDelegation("No delegation with this id for the caller".to_string())
        })?;

        debug!(
            delegation_id = %delegation_id,
            delegator = %grant.delegator_user_id,
            "Delegation attached"
        );
        Ok(DelegationContext {
            delegation_id,
            delegator_user_id: grant.delegator_user_id,
            role: grant.role,
            resource_server_url: grant.resource_server_url,
        })
    }
}

/// Validates a directly named provider against the caller's grants.
#[derive(Clone)]
pub struct ProviderScopeResolver {
    delegations: Arc<dyn DelegationStore>,
    trust_domain: String,
    timeout: Duration,
}

impl ProviderScopeResolver {
    /// Only PROVIDER grants on the `trust_domain` resource server itself are
    /// accepted; data resource servers beneath it are not.
    #[must_use]
    pub fn new(
        delegations: Arc<dyn DelegationStore>,
        trust_domain: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            delegations,
            trust_domain: trust_domain.into(),
            timeout,
        }
    }

    /// Resolve `X-Provider-Id` for `identity`.
    pub async fn resolve(
        &self,
        identity: &Identity,
        header: Option<&HeaderValue>,
    ) -> StageOutcome<ProviderScope> {
        let Some(header) = header else {
            return StageOutcome::Skipped;
        };
        match self.attach(identity, header).await {
            Ok(scope) => StageOutcome::Attached(scope),
            Err(f) => StageOutcome::Failed(f),
        }
    }

    async fn attach(
        &self,
        identity: &Identity,
        header: &HeaderValue,
    ) -> Result<ProviderScope, AuthFailure> {
        let provider_id = parse_id(header, "Provider id")?;

        bounded_store_call(
            self.timeout,
            self.delegations
                .get_provider_grant(identity.user_id, provider_id, &self.trust_domain),
        )
        .await?
        .ok_or_else(|| {
            AuthFailure::InvalidDelegation("Caller may not act for this provider".to_string())
        })?;

        debug!(provider_id = %provider_id, "Provider scope attached");
        Ok(ProviderScope {
            provider_id,
            trust_domain: self.trust_domain.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use aaa_core::DelegationGrant;
    use pretty_assertions::assert_eq;

    const DELEGATOR: u128 = 0xD0;
    const DELEGATE: u128 = 0xDE;
    const GRANT: u128 = 0x60;

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_delegation(DelegationGrant {
            delegation_id: Uuid::from_u128(GRANT),
            delegator_user_id: Uuid::from_u128(DELEGATOR),
            delegate_user_id: Uuid::from_u128(DELEGATE),
            role: Role::Provider,
            resource_server_url: "rs.example.org".to_string(),
        });
        store
    }

    fn delegate_identity(user: u128) -> Identity {
        let mut identity = Identity::new(Uuid::from_u128(user), None);
        identity.grant(Role::Delegate, Vec::new());
        identity
    }

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    #[tokio::test]
    async fn no_header_is_skipped_without_storage() {
        let store = store();
        let resolver = DelegationResolver::new(store.clone(), Duration::from_secs(1));

        let outcome = resolver.resolve(&delegate_identity(DELEGATE), None).await;

        assert_eq!(outcome, StageOutcome::Skipped);
        assert_eq!(store.calls().total(), 0);
    }

    #[tokio::test]
    async fn matching_grant_attaches_context() {
        // GIVEN: a DELEGATE caller asserting their own grant
        let resolver = DelegationResolver::new(store(), Duration::from_secs(1));
        let h = header(&Uuid::from_u128(GRANT).to_string());

        // WHEN: resolved
        let outcome = resolver.resolve(&delegate_identity(DELEGATE), Some(&h)).await;

        // THEN: delegator, role and resource server are attached
        assert_eq!(
            outcome,
            StageOutcome::Attached(DelegationContext {
                delegation_id: Uuid::from_u128(GRANT),
                delegator_user_id: Uuid::from_u128(DELEGATOR),
                role: Role::Provider,
                resource_server_url: "rs.example.org".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn grant_of_another_delegate_is_rejected() {
        let resolver = DelegationResolver::new(store(), Duration::from_secs(1));
        let h = header(&Uuid::from_u128(GRANT).to_string());

        let outcome = resolver.resolve(&delegate_identity(0xBAD), Some(&h)).await;

        assert!(matches!(outcome, StageOutcome::Failed(AuthFailure::InvalidDelegation(_))));
    }

    #[tokio::test]
    async fn caller_without_delegate_role_is_rejected_before_lookup() {
        let store = store();
        let resolver = DelegationResolver::new(store.clone(), Duration::from_secs(1));
        let h = header(&Uuid::from_u128(GRANT).to_string());

        let outcome = resolver
            .resolve(&Identity::new(Uuid::from_u128(DELEGATE), None), Some(&h))
            .await;

        assert!(matches!(outcome, StageOutcome::Failed(AuthFailure::InvalidDelegation(_))));
        assert_eq!(store.calls().delegations, 0);
    }

    #[tokio::test]
    async fn blank_or_malformed_ids_are_rejected() {
        let resolver = DelegationResolver::new(store(), Duration::from_secs(1));
        for value in ["", "   ", "not-a-uuid"] {
            let h = header(value);
            let outcome = resolver.resolve(&delegate_identity(DELEGATE), Some(&h)).await;
            assert!(
                matches!(outcome, StageOutcome::Failed(AuthFailure::InvalidDelegation(_))),
                "{value:?}"
            );
        }
    }

    #[tokio::test]
    async fn storage_failure_is_internal() {
        let store = store();
        store.set_unavailable(true);
        let resolver = DelegationResolver::new(store, Duration::from_secs(1));
        let h = header(&Uuid::from_u128(GRANT).to_string());

        let outcome = resolver.resolve(&delegate_identity(DELEGATE), Some(&h)).await;

        assert!(matches!(outcome, StageOutcome::Failed(AuthFailure::Internal(_))));
    }

    const AUTH_SERVER: &str = "authvertx.example.org";

    fn provider_store(resource_server: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_delegation(DelegationGrant {
            delegation_id: Uuid::from_u128(GRANT),
            delegator_user_id: Uuid::from_u128(DELEGATOR),
            delegate_user_id: Uuid::from_u128(DELEGATE),
            role: Role::Provider,
            resource_server_url: resource_server.to_string(),
        });
        store
    }

    async fn resolve_provider(store: Arc<MemoryStore>) -> StageOutcome<ProviderScope> {
        let resolver = ProviderScopeResolver::new(store, AUTH_SERVER, Duration::from_secs(1));
        let h = header(&Uuid::from_u128(DELEGATOR).to_string());
        resolver
            .resolve(&Identity::new(Uuid::from_u128(DELEGATE), None), Some(&h))
            .await
    }

    #[tokio::test]
    async fn provider_scope_attaches_for_granted_provider() {
        // GIVEN: a PROVIDER grant on the auth server, stored with a trailing slash
        let store = provider_store("AuthVertx.example.org/");

        // WHEN: the delegate names the provider
        let outcome = resolve_provider(store).await;

        // THEN: scope attached under the configured trust domain
        assert_eq!(
            outcome,
            StageOutcome::Attached(ProviderScope {
                provider_id: Uuid::from_u128(DELEGATOR),
                trust_domain: AUTH_SERVER.to_string(),
            })
        );
    }

    #[tokio::test]
    async fn provider_scope_outside_trust_domain_is_rejected() {
        let outcome = resolve_provider(provider_store("rs.example.org")).await;

        assert!(matches!(outcome, StageOutcome::Failed(AuthFailure::InvalidDelegation(_))));
    }

    #[tokio::test]
    async fn provider_grant_on_resource_server_beneath_trust_domain_is_rejected() {
        // GIVEN: the grant is scoped to a data resource server under the auth server
        let store = provider_store("rs.authvertx.example.org");

        // WHEN: the delegate tries to act for the provider at the auth server
        let outcome = resolve_provider(store).await;

        // THEN: no provider scope
        assert!(matches!(outcome, StageOutcome::Failed(AuthFailure::InvalidDelegation(_))));
    }

    #[test]
    fn outcome_converts_to_result() {
        assert_eq!(StageOutcome::<u8>::Skipped.into_result(), Ok(None));
        assert_eq!(StageOutcome::Attached(1u8).into_result(), Ok(Some(1)));
        assert_eq!(
            StageOutcome::<u8>::Failed(AuthFailure::InsufficientRole).into_result(),
            Err(AuthFailure::InsufficientRole)
        );
    }
}

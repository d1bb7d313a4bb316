//! In-memory stores backed by `DashMap`, for development and tests.
//!
//! Mirrors the Postgres semantics: only approved role rows count, DELEGATE is
//! held by anyone named as delegate on an active grant, revoked grants are
//! invisible. Every trait call is counted so callers can assert how often
//! storage was touched.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use aaa_core::{ClientCredential, DelegationGrant, Role};
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::query::is_trust_domain;
use super::{ClientStore, DelegationStore, GrantedRoles, RoleStore, StoreError};

#[derive(Debug, Clone)]
struct RoleRow {
    role: Role,
    resource_server_url: Option<String>,
    approved: bool,
}

#[derive(Debug, Clone)]
struct DelegationRow {
    grant: DelegationGrant,
    active: bool,
}

/// Snapshot of how many times each capability was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `RoleStore::granted_roles`
    pub roles: usize,
    /// `ClientStore::get_by_id`
    pub clients: usize,
    /// `DelegationStore::get_grant` and `get_provider_grant`
    pub delegations: usize,
}

impl CallCounts {
    /// Sum over every capability.
    #[must_use]
    pub fn total(&self) -> usize {
        self.roles + self.clients + self.delegations
    }
}

/// All three store traits over concurrent maps.
#[derive(Default)]
pub struct MemoryStore {
    roles: DashMap<Uuid, Vec<RoleRow>>,
    clients: DashMap<Uuid, ClientCredential>,
    delegations: DashMap<Uuid, DelegationRow>,
    role_calls: AtomicUsize,
    client_calls: AtomicUsize,
    delegation_calls: AtomicUsize,
    latency_ms: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an approved role grant. `resource_server_url` is ignored for
    /// presence-only roles.
    pub fn grant_role(&self, user_id: Uuid, role: Role, resource_server_url: Option<&str>) {
        self.push_role(user_id, role, resource_server_url, true);
    }

    /// Record a role request still awaiting approval.
    pub fn request_role(&self, user_id: Uuid, role: Role, resource_server_url: Option<&str>) {
        self.push_role(user_id, role, resource_server_url, false);
    }

    fn push_role(&self, user_id: Uuid, role: Role, url: Option<&str>, approved: bool) {
        self.roles.entry(user_id).or_default().push(RoleRow {
            role,
            resource_server_url: url.map(str::to_string),
            approved,
        });
    }

    /// Store a client credential, replacing any with the same client id.
    pub fn insert_client(&self, credential: ClientCredential) {
        self.clients.insert(credential.client_id, credential);
    }

    /// Store an active delegation grant.
    pub fn insert_delegation(&self, grant: DelegationGrant) {
        self.delegations.insert(
            grant.delegation_id,
            DelegationRow {
                grant,
                active: true,
            },
        );
    }

    /// Mark a grant revoked. Returns `false` if it did not exist.
    pub fn revoke_delegation(&self, delegation_id: Uuid) -> bool {
        match self.delegations.get_mut(&delegation_id) {
            Some(mut row) => {
                row.active = false;
                true
            }
            None => false,
        }
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::Relaxed);
    }

    /// Make every subsequent call fail as if the pool were exhausted.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            roles: self.role_calls.load(Ordering::Relaxed),
            clients: self.client_calls.load(Ordering::Relaxed),
            delegations: self.delegation_calls.load(Ordering::Relaxed),
        }
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<(), StoreError> {
        counter.fetch_add(1, Ordering::Relaxed);
        let ms = self.latency_ms.load(Ordering::Relaxed);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn is_delegate(&self, user_id: Uuid) -> bool {
        self.delegations
            .iter()
            .any(|row| row.active && row.grant.delegate_user_id == user_id)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn granted_roles(
        &self,
        user_id: Uuid,
        requested: &BTreeSet<Role>,
    ) -> Result<GrantedRoles, StoreError> {
        self.enter(&self.role_calls).await?;

        let mut granted = GrantedRoles::new();
        if let Some(rows) = self.roles.get(&user_id) {
            for row in rows.iter().filter(|r| r.approved && requested.contains(&r.role)) {
                // DELEGATE and COS_ADMIN are never answered from the grants table
                if matches!(row.role, Role::Delegate | Role::CosAdmin) {
                    continue;
                }
                let scope = granted.entry(row.role).or_default();
                if let (true, Some(url)) =
                    (row.role.is_resource_scoped(), &row.resource_server_url)
                {
                    scope.insert(url.clone());
                }
            }
        }
        if requested.contains(&Role::Delegate) && self.is_delegate(user_id) {
            granted.entry(Role::Delegate).or_default();
        }
        Ok(granted)
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn get_by_id(&self, client_id: Uuid) -> Result<Option<ClientCredential>, StoreError> {
        self.enter(&self.client_calls).await?;
        Ok(self.clients.get(&client_id).map(|c| c.clone()))
    }
}

#[async_trait]
impl DelegationStore for MemoryStore {
    async fn get_grant(
        &self,
        delegation_id: Uuid,
        delegate_user_id: Uuid,
    ) -> Result<Option<DelegationGrant>, StoreError> {
        self.enter(&self.delegation_calls).await?;
        Ok(self
            .delegations
            .get(&delegation_id)
            .filter(|row| row.active && row.grant.delegate_user_id == delegate_user_id)
            .map(|row| row.grant.clone()))
    }

    async fn get_provider_grant(
        &self,
        delegate_user_id: Uuid,
        provider_id: Uuid,
        trust_domain: &str,
    ) -> Result<Option<DelegationGrant>, StoreError> {
        self.enter(&self.delegation_calls).await?;
        let mut matches: Vec<DelegationGrant> = self
            .delegations
            .iter()
            .filter(|row| {
                row.active
                    && row.grant.delegate_user_id == delegate_user_id
                    && row.grant.delegator_user_id == provider_id
                    && row.grant.role == Role::Provider
                    && is_trust_domain(&row.grant.resource_server_url, trust_domain)
            })
            .map(|row| row.grant.clone())
            .collect();
        matches.sort_by_key(|g| g.delegation_id);
        Ok(matches.into_iter().next())
    }
}

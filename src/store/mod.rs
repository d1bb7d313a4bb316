//! Storage capabilities read by the auth pipeline.
//!
//! Three narrow traits, one per record kind. [`PostgresStore`] backs a
//! deployment; [`MemoryStore`] backs development and tests.
//!
//! Every call acquires what it needs for the duration of the call only.
//! Nothing here holds a connection across an identity-provider round trip.

use std::collections::{BTreeMap, BTreeSet};

use aaa_core::{ClientCredential, DelegationGrant, Role};
use uuid::Uuid;

mod memory;
mod postgres;
mod query;

pub use memory::{CallCounts, MemoryStore};
pub use postgres::PostgresStore;
pub use query::{RoleQuery, is_trust_domain, normalise_url};

/// Role name mapped to the resource servers it is granted on.
///
/// Presence-only roles map to an empty set.
pub type GrantedRoles = BTreeMap<Role, BTreeSet<String>>;

/// Storage failures. All of them surface to callers as an internal error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Driver or connection failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row could not be mapped to a domain record.
    #[error("corrupt row: {0}")]
    Decode(String),

    /// The call did not complete within the configured bound.
    #[error("storage call timed out")]
    Timeout,
}

/// Approved role grants per user.
#[async_trait::async_trait]
pub trait RoleStore: Send + Sync + 'static {
    /// Roles out of `requested` that `user_id` holds with approved status,
    /// with the resource servers each scoped role is granted on.
    ///
    /// Must complete in a single round trip regardless of `requested.len()`.
    async fn granted_roles(
        &self,
        user_id: Uuid,
        requested: &BTreeSet<Role>,
    ) -> Result<GrantedRoles, StoreError>;
}

/// Client id / secret hash records.
#[async_trait::async_trait]
pub trait ClientStore: Send + Sync + 'static {
    /// Look up a credential by its public client id.
    async fn get_by_id(&self, client_id: Uuid) -> Result<Option<ClientCredential>, StoreError>;
}

/// Delegation grants.
#[async_trait::async_trait]
pub trait DelegationStore: Send + Sync + 'static {
    /// Active grant `delegation_id` if and only if it was issued to `delegate_user_id`.
    async fn get_grant(
        &self,
        delegation_id: Uuid,
        delegate_user_id: Uuid,
    ) -> Result<Option<DelegationGrant>, StoreError>;

    /// Active PROVIDER grant linking `delegate_user_id` to provider
    /// `provider_id` on the `trust_domain` resource server itself, compared
    /// by [`normalise_url`].
    async fn get_provider_grant(
        &self,
        delegate_user_id: Uuid,
        provider_id: Uuid,
        trust_domain: &str,
    ) -> Result<Option<DelegationGrant>, StoreError>;
}

//! Resolved caller identity handed to downstream business logic.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Role;

/// Given and family name as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayName {
    /// Given name.
    pub first: String,
    /// Family name.
    pub last: String,
}

/// An authenticated user with the roles resolved for the current request.
///
/// Built fresh per request and never persisted. `roles` only ever contains
/// roles the endpoint asked for; `role_scope` only has entries for
/// resource-scoped roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Platform user id.
    pub user_id: Uuid,
    /// Absent for callers that authenticated with client credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<DisplayName>,
    /// Roles held, restricted to the requested set.
    pub roles: BTreeSet<Role>,
    /// Resource server URLs per scoped role.
    pub role_scope: BTreeMap<Role, BTreeSet<String>>,
}

impl Identity {
    /// An identity with no roles.
    #[must_use]
    pub fn new(user_id: Uuid, display_name: Option<DisplayName>) -> Self {
        Self {
            user_id,
            display_name,
            roles: BTreeSet::new(),
            role_scope: BTreeMap::new(),
        }
    }

    /// Record a held role. Scope URLs are kept only for resource-scoped roles.
    pub fn grant<I>(&mut self, role: Role, resource_servers: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.roles.insert(role);
        if role.is_resource_scoped() {
            self.role_scope
                .entry(role)
                .or_default()
                .extend(resource_servers);
        }
    }

    /// Whether the role was resolved for this request.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Resource servers a scoped role applies to.
    #[must_use]
    pub fn scope(&self, role: Role) -> Option<&BTreeSet<String>> {
        self.role_scope.get(&role)
    }
}

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// OIDC bearer token.
    BearerToken,
    /// Client id / client secret pair.
    ClientCredentials,
}

/// Attached when the caller acts under a delegation grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationContext {
    /// Grant the caller asserted.
    pub delegation_id: Uuid,
    /// User the caller acts for.
    pub delegator_user_id: Uuid,
    /// Role of the delegator the caller acts with.
    pub role: Role,
    /// Resource server the delegation is scoped to.
    pub resource_server_url: String,
}

/// Attached when the caller names a provider directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderScope {
    /// Provider the caller acts for.
    pub provider_id: Uuid,
    /// Trust domain the grant was validated against.
    pub trust_domain: String,
}

/// Everything the auth pipeline learned about the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    /// Authenticated user and resolved roles.
    pub identity: Identity,
    /// Credential scheme used.
    pub credential: CredentialKind,
    /// Set when a delegation id was presented and validated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation: Option<DelegationContext>,
    /// Set when a provider id was presented and validated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_scope: Option<ProviderScope>,
}

impl IdentityContext {
    /// Whether the caller holds at least one of `roles`.
    #[must_use]
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.identity.has_role(*r))
    }

    /// User id downstream logic should act for: the delegator or provider when
    /// one is attached, the caller otherwise.
    #[must_use]
    pub fn effective_user_id(&self) -> Uuid {
        if let Some(d) = &self.delegation {
            d.delegator_user_id
        } else if let Some(p) = &self.provider_scope {
            p.provider_id
        } else {
            self.identity.user_id
        }
    }
}

//! Role and resource-server scope resolution.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use aaa_core::{Identity, Role};
use tracing::debug;

use super::{AuthFailure, Principal, bounded_store_call};
use crate::store::RoleStore;

/// Resolves which of the requested roles a principal holds.
#[derive(Clone)]
pub struct RoleResolver {
    roles: Arc<dyn RoleStore>,
    cos_admin: Option<uuid::Uuid>,
    timeout: Duration,
}

impl RoleResolver {
    /// `cos_admin` is the singleton COS administrator, if configured.
    #[must_use]
    pub fn new(
        roles: Arc<dyn RoleStore>,
        cos_admin: Option<uuid::Uuid>,
        timeout: Duration,
    ) -> Self {
        Self {
            roles,
            cos_admin,
            timeout,
        }
    }

    /// Build the identity for `principal` with the roles out of `requested`
    /// it holds.
    ///
    /// No storage access for an empty request or one naming only
    /// [`Role::CosAdmin`]; at most one storage call otherwise. Roles the
    /// principal lacks are simply absent. A storage failure yields no
    /// identity at all.
    pub async fn resolve(
        &self,
        principal: &Principal,
        requested: &BTreeSet<Role>,
    ) -> Result<Identity, AuthFailure> {
        let mut identity = Identity::new(principal.user_id, principal.display_name.clone());

        if requested.contains(&Role::CosAdmin) && self.cos_admin == Some(principal.user_id) {
            identity.grant(Role::CosAdmin, Vec::new());
        }

        if requested.iter().any(|r| *r != Role::CosAdmin) {
            let granted = bounded_store_call(
                self.timeout,
                self.roles.granted_roles(principal.user_id, requested),
            )
            .await?;

            for (role, urls) in granted {
                // the store may not widen the request
                if role == Role::CosAdmin || !requested.contains(&role) {
                    continue;
                }
                identity.grant(role, urls);
            }
        }

        debug!(
            user_id = %principal.user_id,
            roles = ?identity.roles,
            "Roles resolved"
        );
        Ok(identity)
    }
}

//! Typed builder for the grouped role lookup.
//!
//! One statement answers every requested role at once: a fragment over the
//! role grants table for ADMIN/PROVIDER/CONSUMER and, when DELEGATE is
//! requested, an existence fragment over active delegations. The COS
//! administrator role never reaches storage.

use std::collections::BTreeSet;

use aaa_core::Role;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// Grant status a role row must carry to count.
pub const APPROVED: &str = "APPROVED";

/// Status of a delegation that may still be asserted.
pub const ACTIVE: &str = "ACTIVE";

/// Storage lookup for the roles a user holds out of a requested set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleQuery {
    user_id: Uuid,
    granted: Vec<Role>,
    delegate: bool,
}

impl RoleQuery {
    /// Plan a lookup for `requested`, dropping roles storage cannot answer.
    #[must_use]
    pub fn new(user_id: Uuid, requested: &BTreeSet<Role>) -> Self {
        let granted = requested
            .iter()
            .copied()
            .filter(|r| matches!(r, Role::Admin | Role::Provider | Role::Consumer))
            .collect();
        Self {
            user_id,
            granted,
            delegate: requested.contains(&Role::Delegate),
        }
    }

    /// True when no storage access is needed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.granted.is_empty() && !self.delegate
    }

    /// Roles looked up in the grants table.
    #[must_use]
    pub fn granted_roles(&self) -> &[Role] {
        &self.granted
    }

    /// Whether the delegation fragment is included.
    #[must_use]
    pub fn includes_delegate(&self) -> bool {
        self.delegate
    }

    /// Render the statement. Rows are `(role TEXT, url TEXT NULL)`; a scoped
    /// role granted on several resource servers yields one row per server.
    ///
    /// Callers check [`Self::is_empty`] first; an empty plan renders a
    /// statement that returns no rows.
    #[must_use]
    pub fn build(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("");
        let mut first = true;

        if !self.granted.is_empty() {
            let names: Vec<String> = self.granted.iter().map(|r| r.as_str().to_string()).collect();
            qb.push(
                "SELECT r.role AS role, rs.url AS url FROM roles r \
                 LEFT JOIN resource_server rs ON rs.id = r.resource_server_id \
                 WHERE r.user_id = ",
            );
            qb.push_bind(self.user_id);
            qb.push(" AND r.status = ");
            qb.push_bind(APPROVED);
            qb.push(" AND r.role = ANY(");
            qb.push_bind(names);
            qb.push(")");
            first = false;
        }

        if self.delegate {
            if !first {
                qb.push(" UNION ALL ");
            }
            qb.push(
                "SELECT 'DELEGATE' AS role, NULL::text AS url WHERE EXISTS \
                 (SELECT 1 FROM delegations d WHERE d.delegate_user_id = ",
            );
            qb.push_bind(self.user_id);
            qb.push(" AND d.status = ");
            qb.push_bind(ACTIVE);
            qb.push(")");
            first = false;
        }

        if first {
            qb.push("SELECT NULL::text AS role, NULL::text AS url WHERE FALSE");
        }

        qb
    }
}

/// Canonical form of a resource server URL: lowercase, no trailing `/`.
///
/// The Postgres store applies the same rule in SQL
/// (`rtrim(lower(url), '/')`).
#[must_use]
pub fn normalise_url(url: &str) -> String {
    url.trim_end_matches('/').to_lowercase()
}

/// Whether `url` is the trust domain itself. Hosts beneath it do not count.
#[must_use]
pub fn is_trust_domain(url: &str, trust_domain: &str) -> bool {
    normalise_url(url) == normalise_url(trust_domain)
}

//! Postgres-backed stores.

use std::collections::BTreeSet;
use std::time::Duration;

use aaa_core::{ClientCredential, DelegationGrant, Role, SecretAlgorithm};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use super::query::{ACTIVE, RoleQuery, normalise_url};
use super::{ClientStore, DelegationStore, GrantedRoles, RoleStore, StoreError};
use crate::config::DatabaseConfig;

const GRANT_COLUMNS: &str = "SELECT d.id, d.delegator_user_id, d.delegate_user_id, d.role, rs.url \
     FROM delegations d JOIN resource_server rs ON rs.id = d.resource_server_id";

/// All three store traits over one bounded connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Open a pool sized and bounded by `config`.
    ///
    /// The pool connects lazily; a bad URL surfaces here, an unreachable
    /// server on the first storage call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the URL cannot be parsed.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(Duration::from_secs(600)))
            .connect_lazy(&config.resolve_url())?;
        debug!(
            max_connections = config.max_connections,
            "Postgres pool configured"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_role(raw: &str) -> Result<Role, StoreError> {
    raw.parse::<Role>()
        .map_err(|e| StoreError::Decode(e.to_string()))
}

fn grant_from_row(row: &PgRow) -> Result<DelegationGrant, StoreError> {
    let role: String = row.try_get("role")?;
    Ok(DelegationGrant {
        delegation_id: row.try_get("id")?,
        delegator_user_id: row.try_get("delegator_user_id")?,
        delegate_user_id: row.try_get("delegate_user_id")?,
        role: decode_role(&role)?,
        resource_server_url: row.try_get("url")?,
    })
}

#[async_trait]
impl RoleStore for PostgresStore {
    async fn granted_roles(
        &self,
        user_id: Uuid,
        requested: &BTreeSet<Role>,
    ) -> Result<GrantedRoles, StoreError> {
        let plan = RoleQuery::new(user_id, requested);
        if plan.is_empty() {
            return Ok(GrantedRoles::new());
        }

        let mut qb = plan.build();
        let rows = qb.build().fetch_all(&self.pool).await?;

        let mut granted = GrantedRoles::new();
        for row in &rows {
            let role: String = row.try_get("role")?;
            let url: Option<String> = row.try_get("url")?;
            let role = decode_role(&role)?;
            let scope = granted.entry(role).or_default();
            if let (true, Some(url)) = (role.is_resource_scoped(), url) {
                scope.insert(url);
            }
        }
        Ok(granted)
    }
}

#[async_trait]
impl ClientStore for PostgresStore {
    async fn get_by_id(&self, client_id: Uuid) -> Result<Option<ClientCredential>, StoreError> {
        let row = sqlx::query(
            "SELECT client_id, user_id, client_secret, algorithm \
             FROM user_clients WHERE client_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tag: String = row.try_get("algorithm")?;
        let algorithm = SecretAlgorithm::from_tag(&tag)
            .ok_or_else(|| StoreError::Decode(format!("unknown secret algorithm {tag:?}")))?;

        Ok(Some(ClientCredential {
            client_id: row.try_get("client_id")?,
            owner_user_id: row.try_get("user_id")?,
            secret_hash: row.try_get("client_secret")?,
            algorithm,
        }))
    }
}

#[async_trait]
impl DelegationStore for PostgresStore {
    async fn get_grant(
        &self,
        delegation_id: Uuid,
        delegate_user_id: Uuid,
    ) -> Result<Option<DelegationGrant>, StoreError> {
        let sql = format!(
            "{GRANT_COLUMNS} WHERE d.id = $1 AND d.delegate_user_id = $2 AND d.status = $3"
        );
        let row = sqlx::query(&sql)
            .bind(delegation_id)
            .bind(delegate_user_id)
            .bind(ACTIVE)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(grant_from_row).transpose()
    }

    async fn get_provider_grant(
        &self,
        delegate_user_id: Uuid,
        provider_id: Uuid,
        trust_domain: &str,
    ) -> Result<Option<DelegationGrant>, StoreError> {
        let sql = format!(
            "{GRANT_COLUMNS} WHERE d.delegate_user_id = $1 AND d.delegator_user_id = $2 \
             AND d.role = $3 AND d.status = $4 \
             AND rtrim(lower(rs.url), '/') = $5 \
             ORDER BY d.id LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(delegate_user_id)
            .bind(provider_id)
            .bind(Role::Provider.as_str())
            .bind(ACTIVE)
            .bind(normalise_url(trust_domain))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(grant_from_row).transpose()
    }
}

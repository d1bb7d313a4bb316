//! Shared fixtures for integration tests: an in-process identity provider
//! and a seeded in-memory store.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use aaa_core::{ClientCredential, DelegationGrant, Role, SecretAlgorithm};
use aaa_server::auth::{
    AuthPipeline, IdentityProvider, IdpError, SecretVerifier, SubjectClaims, ValidatedToken,
};
use aaa_server::config::{AuthConfig, SecretHashConfig};
use aaa_server::store::MemoryStore;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

pub const ALICE: Uuid = Uuid::from_u128(0xA11CE);
pub const BOB: Uuid = Uuid::from_u128(0xB0B);
pub const DELEGATOR_X: Uuid = Uuid::from_u128(0xD0);
pub const COS_ADMIN: Uuid = Uuid::from_u128(0xC05);
pub const GRANT_ID: Uuid = Uuid::from_u128(0x6A);
pub const PROVIDER_GRANT_ID: Uuid = Uuid::from_u128(0x6B);
pub const TRUST_DOMAIN: &str = "authvertx.example.org";
pub const CLIENT_ID: Uuid = Uuid::from_u128(0xC1);
pub const CLIENT_SECRET: &str = "correct horse battery staple";

pub const ALICE_TOKEN: &str = "alice-token";
pub const BOB_TOKEN: &str = "bob-token";
pub const EXPIRED_TOKEN: &str = "expired-token";

/// Identity provider answering from a fixed token table.
#[derive(Default)]
pub struct StaticIdp {
    tokens: DashMap<String, SubjectClaims>,
}

impl StaticIdp {
    pub fn with_user(self, token: &str, user: Uuid, first: &str, last: &str) -> Self {
        self.tokens.insert(
            token.to_string(),
            SubjectClaims {
                subject: user.to_string(),
                given_name: first.to_string(),
                family_name: last.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdp {
    async fn validate(&self, token: &str) -> Result<ValidatedToken, IdpError> {
        if token == EXPIRED_TOKEN {
            return Err(IdpError::Jwt(
                jsonwebtoken::errors::ErrorKind::ExpiredSignature.into(),
            ));
        }
        let claims = self
            .tokens
            .get(token)
            .ok_or_else(|| IdpError::Jwt(jsonwebtoken::errors::ErrorKind::InvalidToken.into()))?;
        Ok(ValidatedToken::new(claims.subject.clone(), 4_102_444_800, token))
    }

    async fn fetch_claims(&self, validated: &ValidatedToken) -> Result<SubjectClaims, IdpError> {
        self.tokens
            .get(validated.raw())
            .map(|c| c.clone())
            .ok_or_else(|| IdpError::InvalidResponse("no claims".to_string()))
    }
}

pub fn fast_verifier() -> SecretVerifier {
    SecretVerifier::new(&SecretHashConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
        max_concurrent: 4,
    })
    .unwrap()
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        cos_admin_user_id: Some(COS_ADMIN),
        trust_domain: TRUST_DOMAIN.to_string(),
        storage_timeout: Duration::from_secs(2),
        public_paths: vec!["/health".to_string()],
    }
}

/// Store seeded with:
/// - ALICE: CONSUMER on rs.example.org
/// - DELEGATOR_X: PROVIDER on rs.example.org
/// - BOB: delegate of DELEGATOR_X (PROVIDER, rs.example.org) under GRANT_ID
/// - BOB: delegate of DELEGATOR_X (PROVIDER, the trust domain) under PROVIDER_GRANT_ID
/// - CLIENT_ID: owned by ALICE
pub fn seeded_store(verifier: &SecretVerifier) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.grant_role(ALICE, Role::Consumer, Some("rs.example.org"));
    store.grant_role(DELEGATOR_X, Role::Provider, Some("rs.example.org"));
    store.insert_delegation(DelegationGrant {
        delegation_id: GRANT_ID,
        delegator_user_id: DELEGATOR_X,
        delegate_user_id: BOB,
        role: Role::Provider,
        resource_server_url: "rs.example.org".to_string(),
    });
    store.insert_delegation(DelegationGrant {
        delegation_id: PROVIDER_GRANT_ID,
        delegator_user_id: DELEGATOR_X,
        delegate_user_id: BOB,
        role: Role::Provider,
        resource_server_url: TRUST_DOMAIN.to_string(),
    });
    store.insert_client(ClientCredential {
        client_id: CLIENT_ID,
        owner_user_id: ALICE,
        secret_hash: verifier.hash(CLIENT_SECRET).unwrap(),
        algorithm: SecretAlgorithm::Argon2id,
    });
    store
}

pub fn idp() -> Arc<StaticIdp> {
    Arc::new(
        StaticIdp::default()
            .with_user(ALICE_TOKEN, ALICE, "Alice", "Liddell")
            .with_user(BOB_TOKEN, BOB, "Bob", "Builder")
            .with_user("cos-token", COS_ADMIN, "Cos", "Admin")
            .with_user("x-token", DELEGATOR_X, "Xavier", "Provider"),
    )
}

/// Pipeline over the seeded store; the store is returned for call counting.
pub fn pipeline() -> (AuthPipeline, Arc<MemoryStore>) {
    let verifier = fast_verifier();
    let store = seeded_store(&verifier);
    let pipeline = AuthPipeline::new(
        idp(),
        store.clone(),
        verifier,
        &auth_config(),
        Duration::from_secs(2),
    );
    (pipeline, store)
}

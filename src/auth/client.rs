//! Client id / client secret authentication.

use std::sync::Arc;
use std::time::Duration;

use aaa_core::CredentialKind;
use tracing::debug;
use uuid::Uuid;

use super::secret::SecretVerifier;
use super::{AuthFailure, Principal, bounded_store_call};
use crate::store::ClientStore;

/// Looks up a client credential and verifies the submitted secret.
#[derive(Clone)]
pub struct SecretAuthenticator {
    clients: Arc<dyn ClientStore>,
    verifier: SecretVerifier,
    timeout: Duration,
}

impl SecretAuthenticator {
    /// Bound the lookup by `timeout`.
    #[must_use]
    pub fn new(clients: Arc<dyn ClientStore>, verifier: SecretVerifier, timeout: Duration) -> Self {
        Self {
            clients,
            verifier,
            timeout,
        }
    }

    /// Authenticate as the credential's owner.
    ///
    /// An unknown or malformed client id and a wrong secret both yield
    /// [`AuthFailure::InvalidSecret`], after the same amount of hashing work.
    pub async fn authenticate(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Principal, AuthFailure> {
        let record = match Uuid::parse_str(client_id) {
            Ok(id) => bounded_store_call(self.timeout, self.clients.get_by_id(id)).await?,
            Err(_) => None,
        };

        let (stored, owner) = match record {
            Some(cred) => (Some(cred.secret_hash), Some(cred.owner_user_id)),
            None => (None, None),
        };

        let matched = self
            .verifier
            .verify_blocking(client_secret.to_string(), stored)
            .await
            .map_err(|e| AuthFailure::Internal(e.to_string()))?;

        match (matched, owner) {
            (true, Some(user_id)) => {
                debug!(user_id = %user_id, "Client credentials authenticated");
                Ok(Principal {
                    user_id,
                    display_name: None,
                    credential: CredentialKind::ClientCredentials,
                })
            }
            _ => Err(AuthFailure::InvalidSecret),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretHashConfig;
    use crate::store::MemoryStore;
    use aaa_core::{ClientCredential, SecretAlgorithm};

    fn verifier() -> SecretVerifier {
        SecretVerifier::new(&SecretHashConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
            max_concurrent: 4,
        })
        .unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, SecretAuthenticator, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let verifier = verifier();
        let client_id = Uuid::from_u128(0xC1);
        let owner = Uuid::from_u128(0x0A);
        store.insert_client(ClientCredential {
            client_id,
            owner_user_id: owner,
            secret_hash: verifier.hash("correct horse").unwrap(),
            algorithm: SecretAlgorithm::Argon2id,
        });
        let auth = SecretAuthenticator::new(store.clone(), verifier, Duration::from_secs(1));
        (store, auth, client_id, owner)
    }

    #[tokio::test]
    async fn correct_secret_yields_owner() {
        let (_, auth, client_id, owner) = setup();

        let principal = auth
            .authenticate(&client_id.to_string(), "correct horse")
            .await
            .unwrap();

        assert_eq!(principal.user_id, owner);
        assert!(principal.display_name.is_none());
        assert_eq!(principal.credential, CredentialKind::ClientCredentials);
    }

    #[tokio::test]
    async fn wrong_secret_is_invalid_secret() {
        let (_, auth, client_id, _) = setup();

        let err = auth
            .authenticate(&client_id.to_string(), "battery staple")
            .await
            .unwrap_err();

        assert_eq!(err, AuthFailure::InvalidSecret);
    }

    #[tokio::test]
    async fn unknown_client_is_invalid_secret_not_unknown_principal() {
        let (store, auth, _, _) = setup();

        let err = auth
            .authenticate(&Uuid::from_u128(0xFF).to_string(), "correct horse")
            .await
            .unwrap_err();

        assert_eq!(err, AuthFailure::InvalidSecret);
        assert_eq!(store.calls().clients, 1);
    }

    #[tokio::test]
    async fn malformed_client_id_skips_storage() {
        let (store, auth, _, _) = setup();

        let err = auth.authenticate("not-a-uuid", "x").await.unwrap_err();

        assert_eq!(err, AuthFailure::InvalidSecret);
        assert_eq!(store.calls().clients, 0);
    }

    #[tokio::test]
    async fn storage_failure_is_internal() {
        let (store, auth, client_id, _) = setup();
        store.set_unavailable(true);

        let err = auth
            .authenticate(&client_id.to_string(), "correct horse")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthFailure::Internal(_)));
    }
}

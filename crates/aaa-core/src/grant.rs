//! Stored records read by the pipeline: client credentials and delegation grants.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Role;

/// Algorithm tag stored alongside a client secret hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum SecretAlgorithm {
    /// Argon2id, 32-byte output, PHC string encoding.
    Argon2id,
}

impl SecretAlgorithm {
    /// Storage tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Argon2id => "argon2id",
        }
    }

    /// Parse a storage tag. Unknown tags yield `None`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "argon2id" => Some(Self::Argon2id),
            _ => None,
        }
    }
}

/// A client id / secret-hash pair owned by a user.
///
/// Immutable once stored; a reset replaces both id and hash together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredential {
    /// Public client identifier.
    pub client_id: Uuid,
    /// User the credential authenticates as.
    pub owner_user_id: Uuid,
    /// Encoded hash of the client secret.
    pub secret_hash: String,
    /// Algorithm that produced `secret_hash`.
    pub algorithm: SecretAlgorithm,
}

impl std::fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredential")
            .field("client_id", &self.client_id)
            .field("owner_user_id", &self.owner_user_id)
            .field("secret_hash", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// "`delegate_user_id`, asserting `delegation_id`, may act with
/// `delegator_user_id`'s `role` scoped to `resource_server_url`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationGrant {
    /// Identifier the delegate presents.
    pub delegation_id: Uuid,
    /// User on whose behalf the delegate acts.
    pub delegator_user_id: Uuid,
    /// User allowed to assert the grant.
    pub delegate_user_id: Uuid,
    /// Role of the delegator the delegate acts with.
    pub role: Role,
    /// Resource server the grant is scoped to.
    pub resource_server_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_secret_hash() {
        let cred = ClientCredential {
            client_id: Uuid::nil(),
            owner_user_id: Uuid::nil(),
            secret_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            algorithm: SecretAlgorithm::Argon2id,
        };
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains("argon2id$v=19"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn algorithm_tags_round_trip() {
        assert_eq!(
            SecretAlgorithm::from_tag(SecretAlgorithm::Argon2id.as_str()),
            Some(SecretAlgorithm::Argon2id)
        );
        assert_eq!(SecretAlgorithm::from_tag("sha256"), None);
    }
}

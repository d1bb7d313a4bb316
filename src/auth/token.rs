//! Bearer token authentication.

use std::sync::Arc;
use std::time::Duration;

use aaa_core::{CredentialKind, DisplayName};
use tracing::debug;
use uuid::Uuid;

use super::idp::{IdentityProvider, IdpError};
use super::{AuthFailure, Principal};

/// Validates a bearer token and maps its subject to a platform user.
#[derive(Clone)]
pub struct TokenAuthenticator {
    idp: Arc<dyn IdentityProvider>,
    timeout: Duration,
}

impl TokenAuthenticator {
    /// Bound every identity-provider call by `timeout`.
    #[must_use]
    pub fn new(idp: Arc<dyn IdentityProvider>, timeout: Duration) -> Self {
        Self { idp, timeout }
    }

    /// Validate `token`, then fetch its subject claims.
    ///
    /// Validation and claims failures (timeouts included) are both
    /// [`AuthFailure::InvalidToken`]. A subject that is not a platform user id
    /// is [`AuthFailure::UnknownPrincipal`].
    pub async fn authenticate(&self, token: &str) -> Result<Principal, AuthFailure> {
        let validated = self
            .bounded(self.idp.validate(token))
            .await
            .map_err(|e| AuthFailure::InvalidToken(e.to_string()))?;

        let claims = self
            .bounded(self.idp.fetch_claims(&validated))
            .await
            .map_err(|e| AuthFailure::InvalidToken(format!("claims lookup: {e}")))?;

        if claims.subject != validated.subject {
            return Err(AuthFailure::InvalidToken(format!(
                "claims subject {} does not match token subject {}",
                claims.subject, validated.subject
            )));
        }

        let user_id = Uuid::parse_str(&validated.subject)
            .map_err(|_| AuthFailure::UnknownPrincipal(validated.subject.clone()))?;

        debug!(user_id = %user_id, "Bearer token authenticated");
        Ok(Principal {
            user_id,
            display_name: Some(DisplayName {
                first: claims.given_name,
                last: claims.family_name,
            }),
            credential: CredentialKind::BearerToken,
        })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, IdpError>>,
    ) -> Result<T, IdpError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(IdpError::Timeout))
    }
}

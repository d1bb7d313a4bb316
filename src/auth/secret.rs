//! Client secret hashing and timing-safe verification.
//!
//! Issuance and verification share one algorithm: Argon2id with a 32-byte
//! output, stored as a PHC string. Verification recomputes the raw digest with
//! the salt and cost parameters taken from the stored string, then compares
//! the two fixed-size digests in constant time. Neither the position of the
//! first differing byte nor the length of the submitted secret influences the
//! comparison.
//!
//! Verifications share a fixed number of slots, so Argon2 memory use stays
//! bounded no matter how many client-credential requests arrive at once.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngExt;
use subtle::ConstantTimeEq;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::config::SecretHashConfig;

/// Digest length in bytes.
pub const DIGEST_LEN: usize = 32;

const SALT_LEN: usize = 16;

/// Secret that is never issued; verified against on client-id misses.
const DECOY_SECRET: &[u8] = b"decoy-client-secret-never-issued";

/// Hashing failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// Cost parameters rejected by Argon2.
    #[error("invalid Argon2 parameters: {0}")]
    Params(argon2::Error),

    /// PHC encoding or hashing failed.
    #[error("hashing failed: {0}")]
    Hash(argon2::password_hash::Error),

    /// The blocking verification task was cancelled or panicked.
    #[error("verification task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The verification slots were closed.
    #[error("verification slots closed")]
    Closed(#[from] tokio::sync::AcquireError),

    /// Zero verification slots configured.
    #[error("max_concurrent must be at least 1")]
    NoSlots,
}

/// Hashes and verifies client secrets.
///
/// Holds a precomputed decoy hash at the configured cost, so a lookup miss
/// can burn the same amount of work as a real mismatch. Clones share the
/// verification slots.
#[derive(Clone)]
pub struct SecretVerifier {
    params: Params,
    decoy: Arc<str>,
    slots: Arc<Semaphore>,
}

impl std::fmt::Debug for SecretVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretVerifier")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .field("free_slots", &self.slots.available_permits())
            .finish_non_exhaustive()
    }
}

impl SecretVerifier {
    /// Build a verifier issuing hashes with `config` cost parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Params`] if Argon2 rejects the parameters and
    /// [`SecretError::NoSlots`] if `max_concurrent` is zero.
    pub fn new(config: &SecretHashConfig) -> Result<Self, SecretError> {
        if config.max_concurrent == 0 {
            return Err(SecretError::NoSlots);
        }
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            Some(DIGEST_LEN),
        )
        .map_err(SecretError::Params)?;
        let decoy = hash_with(&params, DECOY_SECRET)?;
        Ok(Self {
            params,
            decoy: decoy.into(),
            slots: Arc::new(Semaphore::new(config.max_concurrent)),
        })
    }

    /// Hash a new secret into a PHC string.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Hash`] if hashing fails.
    pub fn hash(&self, secret: &str) -> Result<String, SecretError> {
        hash_with(&self.params, secret.as_bytes())
    }

    /// Whether `submitted` matches `stored`.
    ///
    /// A stored value that is not a 32-byte Argon2id PHC string never matches.
    /// CPU bound; async callers go through [`Self::verify_blocking`].
    #[must_use]
    pub fn verify(&self, submitted: &str, stored: &str) -> bool {
        match recompute(submitted.as_bytes(), stored) {
            Ok((computed, expected)) => computed.ct_eq(&expected).into(),
            Err(reason) => {
                warn!(reason, "Stored client secret hash is unusable");
                false
            }
        }
    }

    /// Run a verification against the decoy hash. Always `false`.
    #[must_use]
    pub fn verify_decoy(&self, submitted: &str) -> bool {
        let _ = self.verify(submitted, &self.decoy);
        false
    }

    /// [`Self::verify`] on the blocking pool. `stored = None` verifies against
    /// the decoy and reports no match.
    ///
    /// Waits for a free verification slot first. The slot stays taken until
    /// the Argon2 work finishes, even if the caller stops waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Task`] if the blocking task fails.
    pub async fn verify_blocking(
        &self,
        submitted: String,
        stored: Option<String>,
    ) -> Result<bool, SecretError> {
        let permit = Arc::clone(&self.slots).acquire_owned().await?;
        let verifier = self.clone();
        let matched = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            match stored {
                Some(stored) => verifier.verify(&submitted, &stored),
                None => verifier.verify_decoy(&submitted),
            }
        })
        .await?;
        Ok(matched)
    }
}

fn hash_with(params: &Params, secret: &[u8]) -> Result<String, SecretError> {
    let salt_bytes: [u8; SALT_LEN] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(SecretError::Hash)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());
    argon2
        .hash_password(secret, &salt)
        .map(|h| h.to_string())
        .map_err(SecretError::Hash)
}

/// Recompute the digest of `submitted` with the parameters in `stored`.
/// Returns `(computed, expected)`.
fn recompute(
    submitted: &[u8],
    stored: &str,
) -> Result<([u8; DIGEST_LEN], [u8; DIGEST_LEN]), &'static str> {
    let parsed = PasswordHash::new(stored).map_err(|_| "not a PHC string")?;
    if parsed.algorithm.as_str() != Algorithm::Argon2id.ident().as_str() {
        return Err("algorithm is not argon2id");
    }

    let expected: [u8; DIGEST_LEN] = parsed
        .hash
        .ok_or("missing digest")?
        .as_bytes()
        .try_into()
        .map_err(|_| "digest is not 32 bytes")?;

    let mut salt_buf = [0u8; 64];
    let salt = parsed
        .salt
        .ok_or("missing salt")?
        .decode_b64(&mut salt_buf)
        .map_err(|_| "salt is not base64")?;

    let version = parsed
        .version
        .map_or(Ok(Version::V0x13), Version::try_from)
        .map_err(|_| "unsupported version")?;
    let params = Params::try_from(&parsed).map_err(|_| "invalid parameters")?;

    let mut computed = [0u8; DIGEST_LEN];
    Argon2::new(Algorithm::Argon2id, version, params)
        .hash_password_into(submitted, salt, &mut computed)
        .map_err(|_| "hashing failed")?;

    Ok((computed, expected))
}

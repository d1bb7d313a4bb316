//! Error types for aaa-server startup and wiring.
//!
//! Request-time failures are [`crate::auth::AuthFailure`]; this type covers
//! everything that can go wrong before the first request is served.

use std::io;

use thiserror::Error;

use crate::auth::idp::IdpError;
use crate::auth::secret::SecretError;
use crate::store::StoreError;

/// Result type alias for aaa-server
pub type Result<T> = std::result::Result<T, Error>;

/// aaa-server errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage backend could not be initialized
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Identity provider discovery failed
    #[error("Identity provider error: {0}")]
    IdentityProvider(#[from] IdpError),

    /// Secret hashing failed
    #[error("Secret hashing error: {0}")]
    Secret(#[from] SecretError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

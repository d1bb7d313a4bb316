//! aaa-server library
//!
//! Multi-tenant authentication and authorization-resolution service.
//!
//! # Features
//!
//! - **Two credential schemes**: OIDC bearer tokens and client id/secret pairs
//! - **Role resolution**: requested roles and resource-server scopes in one storage round trip
//! - **Delegation**: acting on behalf of another user or a named provider
//! - **Uniform failures**: one envelope with a `urn:dx:as:` code per failure
//! - **Audit trail**: structured JSON events for every outcome
//!
//! The [`auth::AuthPipeline`] is the entry point for embedding; the
//! [`gateway`] module mounts it behind axum routes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod store;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string()))?,
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string()))?,
    }

    Ok(())
}

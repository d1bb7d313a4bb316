//! Server wiring and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::router::create_router;
use crate::auth::{AuthPipeline, IdentityProvider, OidcProvider, SecretVerifier};
use crate::config::Config;
use crate::store::PostgresStore;
use crate::{Error, Result};

/// The running service: configuration plus shared collaborators.
pub struct Server {
    config: Config,
    pipeline: AuthPipeline,
}

impl Server {
    /// Connect the storage pool and discover the identity provider.
    ///
    /// Both are initialized once here and shared read-only by every request.
    pub async fn new(config: Config) -> Result<Self> {
        let store = Arc::new(PostgresStore::connect(&config.database)?);
        let idp: Arc<dyn IdentityProvider> = Arc::new(OidcProvider::discover(&config.oidc).await?);
        let verifier = SecretVerifier::new(&config.secrets)?;
        let pipeline = AuthPipeline::new(
            idp,
            store,
            verifier,
            &config.auth,
            config.oidc.request_timeout,
        );
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Serve a prebuilt pipeline.
    #[must_use]
    pub fn with_pipeline(config: Config, pipeline: AuthPipeline) -> Self {
        Self { config, pipeline }
    }

    /// Bind and serve until Ctrl-C or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let app = create_router(self.pipeline, &self.config.auth, &self.config.server);
        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("AAA SERVER v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!(issuer = %self.config.oidc.issuer, "Bearer tokens validated against");
        info!(trust_domain = %self.config.auth.trust_domain, "Provider scope trust domain");
        if self.config.auth.cos_admin_user_id.is_none() {
            warn!("No COS administrator configured - COS_ADMIN is never granted");
        }
        info!(
            "  GET http://{}:{}/auth/v1/identity",
            self.config.server.host, self.config.server.port
        );
        info!("============================================================");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

//! Per-route authentication guard.
//!
//! Each guarded route declares the roles it is interested in and whether it
//! is the credential-bootstrap endpoint. The guard runs the pipeline and
//! either rejects the request with the failure envelope or inserts the
//! resolved [`IdentityContext`] into request extensions.

use std::collections::BTreeSet;
use std::sync::Arc;

use aaa_core::{IdentityContext, Role};
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::auth::{AuthPipeline, AuthRequest};

/// Route-level authentication settings.
#[derive(Clone)]
pub struct AuthGuard {
    pipeline: AuthPipeline,
    requested: Arc<BTreeSet<Role>>,
    bootstrap: bool,
    public_paths: Arc<[String]>,
}

impl AuthGuard {
    /// Guard a route interested in `requested` roles.
    #[must_use]
    pub fn new(pipeline: AuthPipeline, requested: impl IntoIterator<Item = Role>) -> Self {
        Self {
            pipeline,
            requested: Arc::new(requested.into_iter().collect()),
            bootstrap: false,
            public_paths: Arc::from([]),
        }
    }

    /// Let requests without any credential through, unauthenticated.
    ///
    /// Meant for the single credential-bootstrap route of an embedding
    /// application; [`create_router`](super::create_router) mounts none.
    /// Credentials that are presented are still checked.
    #[must_use]
    pub fn bootstrap(mut self) -> Self {
        self.bootstrap = true;
        self
    }

    /// Paths (prefixes) that bypass the guard.
    #[must_use]
    pub fn with_public_paths(mut self, paths: &[String]) -> Self {
        self.public_paths = paths.into();
        self
    }

    fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// Authentication middleware, installed with `from_fn_with_state`.
pub async fn auth_middleware(
    State(guard): State<AuthGuard>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if guard.is_public_path(&path) {
        debug!(path = %path, "Public path, skipping auth");
        return next.run(request).await;
    }

    let auth_request = AuthRequest {
        headers: request.headers().clone(),
        path,
        requested: (*guard.requested).clone(),
        bootstrap: guard.bootstrap,
    };

    match guard.pipeline.run_detached(auth_request).await {
        Ok(Some(ctx)) => {
            request.extensions_mut().insert::<IdentityContext>(ctx);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(failure) => failure.into_response(),
    }
}

//! OpenID Connect identity provider: JWT validation against a cached JWKS
//! and claims lookup via the userinfo endpoint.
//!
//! # Validation flow
//!
//! 1. Decode the JWT header (no verification) to extract `kid` and `alg`.
//! 2. Look the key up in the cached JWKS; refresh once on an unknown `kid`.
//! 3. Verify signature, `iss`, `aud` (when configured) and `exp`/`nbf` with
//!    the configured leeway.
//!
//! The discovery document is fetched once in [`OidcProvider::discover`] and
//! shared read-only afterwards.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use jsonwebtoken::{
    Algorithm, DecodingKey, Header, TokenData, Validation,
    jwk::{AlgorithmParameters, JwkSet},
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::idp::{IdentityProvider, IdpError, SubjectClaims, ValidatedToken};
use crate::config::OidcConfig;

/// The subset of the discovery document the provider needs.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
    /// Issuer the provider signs tokens as.
    pub issuer: String,
    /// JWKS location.
    pub jwks_uri: String,
    /// Profile claims location.
    pub userinfo_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct AccessTokenClaims {
    sub: String,
    exp: u64,
}

struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
}

/// JWKS cache with a fixed TTL, keyed by JWKS URI.
pub struct JwksCache {
    inner: DashMap<String, CachedJwks>,
    ttl: Duration,
}

impl JwksCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            ttl,
        }
    }

    /// Return the cached key set for `jwks_uri`, fetching when stale or when
    /// `force_refresh` is set.
    pub async fn get_or_fetch(
        &self,
        http: &reqwest::Client,
        jwks_uri: &str,
        force_refresh: bool,
    ) -> Result<JwkSet, IdpError> {
        if !force_refresh {
            if let Some(cached) = self.inner.get(jwks_uri) {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(cached.keys.clone());
                }
            }
        }

        debug!(jwks_uri, "Fetching JWKS");
        let keys: JwkSet = http
            .get(jwks_uri)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        self.inner.insert(
            jwks_uri.to_string(),
            CachedJwks {
                keys: keys.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(keys)
    }
}

/// [`IdentityProvider`] backed by an OpenID Connect issuer.
pub struct OidcProvider {
    http: reqwest::Client,
    discovery: DiscoveryDocument,
    audiences: Vec<String>,
    leeway: u64,
    jwks: JwksCache,
}

impl OidcProvider {
    /// Fetch the discovery document and build a provider.
    ///
    /// # Errors
    ///
    /// Returns [`IdpError`] if the document cannot be fetched or names a
    /// different issuer than configured.
    pub async fn discover(config: &OidcConfig) -> Result<Self, IdpError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        if !config.issuer.starts_with("https://") {
            warn!(issuer = %config.issuer, "OIDC issuer is not HTTPS");
        }

        let url = config.discovery_url();
        let discovery: DiscoveryDocument = http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if discovery.issuer.trim_end_matches('/') != config.issuer.trim_end_matches('/') {
            return Err(IdpError::InvalidResponse(format!(
                "discovery issuer {} does not match configured issuer {}",
                discovery.issuer, config.issuer
            )));
        }

        info!(
            issuer = %discovery.issuer,
            jwks_uri = %discovery.jwks_uri,
            "OIDC discovery complete"
        );
        Ok(Self::with_discovery(http, discovery, config))
    }

    /// Build a provider from an already known discovery document.
    #[must_use]
    pub fn with_discovery(
        http: reqwest::Client,
        discovery: DiscoveryDocument,
        config: &OidcConfig,
    ) -> Self {
        Self {
            http,
            discovery,
            audiences: config.audiences.clone(),
            leeway: config.leeway_secs,
            jwks: JwksCache::new(config.jwks_ttl),
        }
    }

    /// Find a decoding key by `kid`, refreshing the JWKS once if not found.
    async fn find_decoding_key(&self, kid: &str) -> Result<DecodingKey, IdpError> {
        let uri = &self.discovery.jwks_uri;
        let jwks = self.jwks.get_or_fetch(&self.http, uri, false).await?;
        if let Some(key) = find_key_in_jwks(&jwks, kid) {
            return Ok(key);
        }

        debug!(kid, "Key not found in cached JWKS, refreshing");
        let jwks = self.jwks.get_or_fetch(&self.http, uri, true).await?;
        find_key_in_jwks(&jwks, kid).ok_or_else(|| IdpError::UnknownKeyId(kid.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    async fn validate(&self, token: &str) -> Result<ValidatedToken, IdpError> {
        let header = jsonwebtoken::decode_header(token)?;
        let kid = header.kid.clone().ok_or(IdpError::MissingKeyId)?;
        let key = self.find_decoding_key(&kid).await?;

        let validation =
            build_validation(&header, &self.discovery.issuer, &self.audiences, self.leeway);
        let data: TokenData<AccessTokenClaims> = jsonwebtoken::decode(token, &key, &validation)?;

        Ok(ValidatedToken::new(data.claims.sub, data.claims.exp, token))
    }

    async fn fetch_claims(&self, validated: &ValidatedToken) -> Result<SubjectClaims, IdpError> {
        let claims: SubjectClaims = self
            .http
            .get(&self.discovery.userinfo_endpoint)
            .bearer_auth(validated.raw())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(claims)
    }
}

/// Find a JWK by `kid` and convert it to a `DecodingKey`.
fn find_key_in_jwks(jwks: &JwkSet, kid: &str) -> Option<DecodingKey> {
    let jwk = jwks
        .keys
        .iter()
        .find(|k| k.common.key_id.as_deref() == Some(kid))?;

    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e).ok(),
        AlgorithmParameters::EllipticCurve(ec) => {
            DecodingKey::from_ec_components(&ec.x, &ec.y).ok()
        }
        AlgorithmParameters::OctetKey(_) | AlgorithmParameters::OctetKeyPair(_) => None,
    }
}

/// Build a [`Validation`] for the header's algorithm. Symmetric algorithms
/// are never accepted from a public key set.
fn build_validation(
    header: &Header,
    issuer: &str,
    audiences: &[String],
    leeway: u64,
) -> Validation {
    let alg = match header.alg {
        alg @ (Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512
        | Algorithm::ES256
        | Algorithm::ES384) => alg,
        other => {
            warn!(alg = ?other, "Unsupported JWT algorithm, defaulting to RS256");
            Algorithm::RS256
        }
    };

    let mut v = Validation::new(alg);
    v.leeway = leeway;
    v.set_issuer(&[issuer]);
    v.set_required_spec_claims(&["exp", "iss", "sub"]);
    if audiences.is_empty() {
        v.validate_aud = false;
    } else {
        v.set_audience(audiences);
    }
    v
}

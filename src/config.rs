//! Configuration management
//!
//! Loaded once at startup and never mutated afterwards: every component
//! receives the section it needs at construction time.

use std::{env, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before resolving `env:` references.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Pipeline configuration
    pub auth: AuthConfig,
    /// Identity provider configuration
    pub oidc: OidcConfig,
    /// Storage configuration
    pub database: DatabaseConfig,
    /// Client secret hashing parameters
    pub secrets: SecretHashConfig,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Environment variables (AAA_ prefix, __ for nesting)
        figment = figment.merge(Env::prefixed("AAA_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();
        config.validate()?;

        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.trust_domain.trim().is_empty() {
            return Err(Error::Config("auth.trust_domain must be set".to_string()));
        }
        if self.oidc.issuer.trim().is_empty() {
            return Err(Error::Config("oidc.issuer must be set".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.secrets.max_concurrent == 0 {
            return Err(Error::Config(
                "secrets.max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = match (path_str.strip_prefix('~'), env::var("HOME")) {
                (Some(rest), Ok(home)) => format!("{home}{rest}"),
                _ => path_str.clone(),
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                    Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Upper bound on handling one request, authentication included
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8443,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// User id holding the singleton COS administrator role. Unset means
    /// nobody holds it.
    pub cos_admin_user_id: Option<Uuid>,
    /// Trust domain provider-scope grants are validated against
    /// (the URL this deployment is known by).
    pub trust_domain: String,
    /// Upper bound on any single storage call made by the pipeline.
    #[serde(with = "humantime_serde")]
    pub storage_timeout: Duration,
    /// Paths that bypass authentication (default: `["/health"]`)
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

fn default_public_paths() -> Vec<String> {
    vec!["/health".to_string()]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cos_admin_user_id: None,
            trust_domain: "authvertx.example.org".to_string(),
            storage_timeout: Duration::from_secs(5),
            public_paths: default_public_paths(),
        }
    }
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcConfig {
    /// Expected `iss` claim and base of the discovery URL.
    pub issuer: String,
    /// Accepted `aud` values. Empty disables the audience check.
    pub audiences: Vec<String>,
    /// Discovery document URL; defaults to `<issuer>/.well-known/openid-configuration`.
    pub discovery_url: Option<String>,
    /// Clock skew tolerated on `exp`/`nbf`, in seconds.
    pub leeway_secs: u64,
    /// TCP connect timeout towards the identity provider.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Whole-request timeout towards the identity provider.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// How long a fetched JWKS is trusted before refetching.
    #[serde(with = "humantime_serde")]
    pub jwks_ttl: Duration,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            issuer: "https://keycloak.example.org/realms/main".to_string(),
            audiences: Vec::new(),
            discovery_url: None,
            leeway_secs: 60,
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
            jwks_ttl: Duration::from_secs(3600),
        }
    }
}

impl OidcConfig {
    /// Discovery URL, derived from the issuer when not configured.
    #[must_use]
    pub fn discovery_url(&self) -> String {
        self.discovery_url.clone().unwrap_or_else(|| {
            format!(
                "{}/.well-known/openid-configuration",
                self.issuer.trim_end_matches('/')
            )
        })
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres URL. Supports `env:VAR_NAME`.
    pub url: String,
    /// Pool size upper bound.
    pub max_connections: u32,
    /// How long a storage call may wait for a pooled connection.
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "env:DATABASE_URL".to_string(),
            max_connections: 16,
            acquire_timeout: Duration::from_secs(3),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the URL (expand `env:` references)
    #[must_use]
    pub fn resolve_url(&self) -> String {
        if let Some(var_name) = self.url.strip_prefix("env:") {
            env::var(var_name).unwrap_or_else(|_| self.url.clone())
        } else {
            self.url.clone()
        }
    }
}

/// Argon2id cost parameters used when hashing new client secrets.
///
/// Verification reads parameters from the stored hash, so raising these only
/// affects secrets issued afterwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretHashConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
    /// Verifications allowed to run at once. Each holds `memory_kib` while
    /// it runs; further callers wait for a slot.
    pub max_concurrent: usize,
}

impl Default for SecretHashConfig {
    fn default() -> Self {
        // OWASP minimum for Argon2id
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
            max_concurrent: 8,
        }
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Parse "30s", "5m", "100ms" or a bare number of seconds.
    pub fn parse(s: &str) -> Result<Duration, std::num::ParseIntError> {
        let s = s.trim();
        // "ms" must be checked before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>().map(Duration::from_millis)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>().map(Duration::from_secs)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>().map(|m| Duration::from_secs(m * 60))
        } else if let Some(hours) = s.strip_suffix('h') {
            hours.parse::<u64>().map(|h| Duration::from_secs(h * 3600))
        } else {
            s.parse::<u64>().map(Duration::from_secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_durations_parse_all_suffixes() {
        assert_eq!(humantime_serde::parse("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(humantime_serde::parse("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(humantime_serde::parse("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(humantime_serde::parse("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(humantime_serde::parse("7").unwrap(), Duration::from_secs(7));
        assert!(humantime_serde::parse("soon").is_err());
    }

    #[test]
    fn test_config_deserialized_from_yaml() {
        let yaml = r#"
auth:
  cos_admin_user_id: "6b2f9c3e-8a43-4f4e-9d0c-2f7d1d2a9e11"
  trust_domain: "cos.example.org"
  storage_timeout: "2s"
oidc:
  issuer: "https://idp.example.org/realms/dx"
  audiences: ["account"]
  leeway_secs: 30
database:
  url: "postgres://aaa@localhost/aaa"
  max_connections: 4
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.auth.trust_domain, "cos.example.org");
        assert_eq!(config.auth.storage_timeout, Duration::from_secs(2));
        assert!(config.auth.cos_admin_user_id.is_some());
        assert_eq!(config.oidc.leeway_secs, 30);
        assert_eq!(config.database.max_connections, 4);
        // untouched sections keep their defaults
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.auth.public_paths, vec!["/health".to_string()]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aaa.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "auth:\n  trust_domain: \"cos.example.org\"").unwrap();
        drop(f);

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.auth.trust_domain, "cos.example.org");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = Config::load(Some(Path::new("/nonexistent/aaa.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_validate_rejects_blank_trust_domain() {
        let mut config = Config::default();
        config.auth.trust_domain = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_verification_slots() {
        let mut config = Config::default();
        assert_eq!(config.secrets.max_concurrent, 8);
        assert!(config.validate().is_ok());

        config.secrets.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discovery_url_derived_from_issuer() {
        let oidc = OidcConfig {
            issuer: "https://idp.example.org/realms/dx/".to_string(),
            ..OidcConfig::default()
        };
        assert_eq!(
            oidc.discovery_url(),
            "https://idp.example.org/realms/dx/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_database_url_env_indirection() {
        let db = DatabaseConfig {
            url: "postgres://literal".to_string(),
            ..DatabaseConfig::default()
        };
        assert_eq!(db.resolve_url(), "postgres://literal");

        let db = DatabaseConfig {
            url: "env:AAA_TEST_SURELY_UNSET_DB_URL".to_string(),
            ..DatabaseConfig::default()
        };
        // unresolvable references fall back to the raw value
        assert_eq!(db.resolve_url(), "env:AAA_TEST_SURELY_UNSET_DB_URL");
    }
}

//! Pipeline configuration
//!
//! [`AuthConfig`] is built either programmatically through
//! [`AuthConfig::builder`] or from the environment with
//! [`AuthConfig::from_env`]. Both paths end in the same validation, so a
//! config that exists is a config the pipeline can run with.
//!
//! # Environment Variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `AUTH_JWT_SECRET` | required | signing secret, raw or `base64:`-prefixed |
//! | `APP_ENV` / `RUST_ENV` | `development` | selects the secret strength policy |
//! | `AUTH_TOKEN_TTL` | `1h` | lifetime of issued tokens |
//! | `AUTH_REFRESH_THRESHOLD` | `15m` | slide the token when less than this is left |
//! | `AUTH_PUBLIC_PATHS` | `/api/auth/**,/docs/**,...` | paths reachable anonymously |
//! | `CORS_ALLOWED_ORIGINS` | empty | comma-separated exact origins |
//! | `CORS_ALLOWED_METHODS` | `GET,POST,PUT,PATCH,DELETE,OPTIONS` | |
//! | `CORS_ALLOWED_HEADERS` | `Authorization,Content-Type,X-CSRF-TOKEN` | |
//! | `CORS_EXPOSED_HEADERS` | empty | added to `Authorization,X-CSRF-TOKEN` |
//! | `CORS_MAX_AGE` | `1h` | preflight cache lifetime |
//! | `CORS_REJECT_DISALLOWED` | `true` | 403 for requests from unlisted origins |
//! | `CSRF_ENABLED` | `true` | |
//! | `CSRF_EXEMPT_PATHS` | `/api/auth/**,/docs/**,...` | |
//! | `CSRF_EXEMPT_BEARER_ONLY` | `true` | skip CSRF for bearer requests without cookies |
//! | `CSRF_COOKIE_NAME` | `XSRF-TOKEN` | |
//! | `CSRF_HEADER_NAME` | `X-CSRF-TOKEN` | |
//! | `CSRF_COOKIE_SECURE` | `true` | |
//! | `CSRF_COOKIE_SAMESITE` | `Lax` | `Strict`, `Lax` or `None` |
//! | `AUDIT_ENABLED` | `true` | security event log per response |
//! | `TRACING_ENABLED` | `true` | HTTP trace layer |

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderName;

use crate::access::{default_public_paths, PathPattern};
use crate::cors::CorsConfig;
use crate::csrf::{CsrfConfig, SameSite};
use crate::parse::{parse_bool, parse_duration, parse_list};
use crate::signing_key::{SecretError, SecretPolicy, SigningKey};

/// Shortest accepted token lifetime; claims carry whole seconds
pub const MIN_TOKEN_TTL: Duration = Duration::from_secs(1);

/// Longest accepted token lifetime
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

/// Configuration errors, raised at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("AUTH_JWT_SECRET is not set")]
    MissingSecret,

    #[error("signing secret rejected: {0}")]
    WeakSecret(#[from] SecretError),

    #[error("wildcard CORS origin is not allowed together with credentials")]
    WildcardOrigin,

    #[error("invalid CORS origin: {0}")]
    InvalidOrigin(String),

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("invalid header name: {0}")]
    InvalidHeader(String),

    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: String, value: String },

    #[error("invalid duration for {0}")]
    InvalidDuration(String),

    #[error("SameSite=None requires a Secure CSRF cookie")]
    InsecureCookie,
}

/// Complete pipeline configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Process-wide token signing key
    pub signing_key: Arc<SigningKey>,
    /// Lifetime of issued tokens
    pub token_ttl: Duration,
    /// Tokens with less than this left are replaced on the response
    pub refresh_threshold: Duration,
    pub cors: CorsConfig,
    /// Paths reachable without an identity
    pub public_paths: Vec<PathPattern>,
    pub csrf: CsrfConfig,
    /// Log a security event for every response
    pub audit_enabled: bool,
    /// Wrap the pipeline in an HTTP trace layer
    pub tracing_enabled: bool,
}

impl AuthConfig {
    /// Create a builder
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Load from environment variables (see module docs).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("APP_ENV")
            .or_else(|| lookup("RUST_ENV"))
            .unwrap_or_else(|| "development".to_string());
        let secret = lookup("AUTH_JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;
        let signing_key =
            SigningKey::from_secret(secret.trim(), &SecretPolicy::for_environment(&environment))?;

        let mut builder = Self::builder().signing_key(signing_key);

        if let Some(ttl) = env_duration(&lookup, "AUTH_TOKEN_TTL")? {
            builder = builder.token_ttl(ttl);
        }
        if let Some(threshold) = env_duration(&lookup, "AUTH_REFRESH_THRESHOLD")? {
            builder = builder.refresh_threshold(threshold);
        }
        if let Some(paths) = lookup("AUTH_PUBLIC_PATHS") {
            builder = builder.public_paths(parse_list(&paths));
        }

        if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
            builder.cors.allowed_origins = parse_list(&origins);
        }
        if let Some(methods) = lookup("CORS_ALLOWED_METHODS") {
            builder.cors.allowed_methods = parse_list(&methods);
        }
        if let Some(headers) = lookup("CORS_ALLOWED_HEADERS") {
            builder.cors.allowed_headers = parse_list(&headers);
        }
        if let Some(headers) = lookup("CORS_EXPOSED_HEADERS") {
            builder.cors.exposed_headers = parse_list(&headers);
        }
        if let Some(max_age) = env_duration(&lookup, "CORS_MAX_AGE")? {
            builder.cors.max_age = max_age;
        }
        if let Some(reject) = env_bool(&lookup, "CORS_REJECT_DISALLOWED")? {
            builder.cors.reject_disallowed = reject;
        }

        if let Some(enabled) = env_bool(&lookup, "CSRF_ENABLED")? {
            builder.csrf.enabled = enabled;
        }
        if let Some(paths) = lookup("CSRF_EXEMPT_PATHS") {
            builder.csrf.exempt_paths = parse_list(&paths)
                .iter()
                .map(|p| PathPattern::parse(p))
                .collect();
        }
        if let Some(exempt) = env_bool(&lookup, "CSRF_EXEMPT_BEARER_ONLY")? {
            builder.csrf.exempt_bearer_only = exempt;
        }
        if let Some(name) = lookup("CSRF_COOKIE_NAME").filter(|n| !n.trim().is_empty()) {
            builder.csrf.cookie_name = name.trim().to_string();
        }
        if let Some(name) = lookup("CSRF_HEADER_NAME") {
            builder.csrf.header_name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|_| ConfigError::InvalidHeader(name.clone()))?;
        }
        if let Some(secure) = env_bool(&lookup, "CSRF_COOKIE_SECURE")? {
            builder.csrf.cookie_secure = secure;
        }
        if let Some(same_site) = lookup("CSRF_COOKIE_SAMESITE") {
            builder.csrf.same_site =
                same_site
                    .parse::<SameSite>()
                    .map_err(|_| ConfigError::InvalidValue {
                        var: "CSRF_COOKIE_SAMESITE".to_string(),
                        value: same_site.clone(),
                    })?;
        }

        if let Some(audit) = env_bool(&lookup, "AUDIT_ENABLED")? {
            builder = builder.audit(audit);
        }
        if let Some(tracing) = env_bool(&lookup, "TRACING_ENABLED")? {
            builder = builder.tracing(tracing);
        }

        builder.build()
    }
}

fn env_duration<F>(lookup: &F, var: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| parse_duration(&value).ok_or_else(|| ConfigError::InvalidDuration(var.to_string())))
        .transpose()
}

fn env_bool<F>(lookup: &F, var: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            parse_bool(&value).ok_or_else(|| ConfigError::InvalidValue {
                var: var.to_string(),
                value,
            })
        })
        .transpose()
}

/// Builder for [`AuthConfig`].
#[derive(Debug)]
pub struct AuthConfigBuilder {
    signing_key: Option<SigningKey>,
    token_ttl: Duration,
    refresh_threshold: Duration,
    /// CORS settings, adjustable in place
    pub cors: CorsConfig,
    public_paths: Vec<PathPattern>,
    /// CSRF settings, adjustable in place
    pub csrf: CsrfConfig,
    audit_enabled: bool,
    tracing_enabled: bool,
}

impl Default for AuthConfigBuilder {
    fn default() -> Self {
        Self {
            signing_key: None,
            token_ttl: Duration::from_secs(3600),
            refresh_threshold: Duration::from_secs(15 * 60),
            cors: CorsConfig::default(),
            public_paths: default_public_paths(),
            csrf: CsrfConfig::default(),
            audit_enabled: true,
            tracing_enabled: true,
        }
    }
}

impl AuthConfigBuilder {
    /// Set the signing key (required).
    pub fn signing_key(mut self, key: SigningKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Set the token lifetime.
    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Set the sliding refresh threshold.
    pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Set CORS allowed origins.
    pub fn cors_origins<I, T>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.cors.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the public path patterns.
    pub fn public_paths<I, T>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.public_paths = patterns
            .into_iter()
            .map(|p| PathPattern::parse(p.as_ref()))
            .collect();
        self
    }

    /// Enable or disable CSRF protection.
    pub fn csrf_enabled(mut self, enabled: bool) -> Self {
        self.csrf.enabled = enabled;
        self
    }

    /// Set whether the CSRF cookie carries `Secure`.
    pub fn csrf_cookie_secure(mut self, secure: bool) -> Self {
        self.csrf.cookie_secure = secure;
        self
    }

    /// Enable or disable the audit middleware.
    pub fn audit(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    /// Enable or disable the HTTP trace layer.
    pub fn tracing(mut self, enabled: bool) -> Self {
        self.tracing_enabled = enabled;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<AuthConfig, ConfigError> {
        let signing_key = self.signing_key.ok_or(ConfigError::MissingSecret)?;

        if self.token_ttl < MIN_TOKEN_TTL || self.token_ttl > MAX_TOKEN_TTL {
            return Err(ConfigError::InvalidDuration("AUTH_TOKEN_TTL".to_string()));
        }
        if self.refresh_threshold > self.token_ttl {
            return Err(ConfigError::InvalidDuration(
                "AUTH_REFRESH_THRESHOLD".to_string(),
            ));
        }

        let mut cors = self.cors;
        if self.csrf.enabled {
            cors.include_header(self.csrf.header_name.as_str());
        }
        cors.validate()?;

        if self.csrf.same_site == SameSite::None && !self.csrf.cookie_secure {
            return Err(ConfigError::InsecureCookie);
        }

        Ok(AuthConfig {
            signing_key: Arc::new(signing_key),
            token_ttl: self.token_ttl,
            refresh_threshold: self.refresh_threshold,
            cors,
            public_paths: self.public_paths,
            csrf: self.csrf,
            audit_enabled: self.audit_enabled,
            tracing_enabled: self.tracing_enabled,
        })
    }
}

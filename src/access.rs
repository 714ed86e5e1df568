//! Path-based access control
//!
//! Paths matching a public pattern are reachable anonymously. Every other
//! path needs a bound identity, otherwise the request is answered with 401
//! before the handler runs.
//!
//! Pattern syntax:
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `/api/auth/login` | exactly that path |
//! | `/api/auth/**` | `/api/auth` and everything below it |
//! | `/**` | every path |

use std::fmt;
use std::str::FromStr;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AuthError;
use crate::identity::CurrentIdentity;
use crate::state::AuthState;

/// Public paths used when none are configured
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &[
    "/api/auth/**",
    "/docs/**",
    "/swagger-ui/**",
    "/v3/api-docs/**",
];

/// An exact path or a `/**` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches one path
    Exact(String),
    /// Matches the base path and everything below it
    Prefix(String),
}

impl PathPattern {
    /// Parse a pattern. A trailing `/**` makes it a prefix pattern.
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        match pattern.strip_suffix("/**") {
            Some(base) => Self::Prefix(base.trim_end_matches('/').to_string()),
            None => Self::Exact(pattern.to_string()),
        }
    }

    /// Whether `path` falls under this pattern.
    ///
    /// Paths with `.` or `..` segments never match.
    pub fn matches(&self, path: &str) -> bool {
        if has_dot_segment(path) {
            return false;
        }
        match self {
            Self::Exact(exact) => path == exact,
            Self::Prefix(base) if base.is_empty() => true,
            Self::Prefix(base) => match path.strip_prefix(base.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }
}

fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment == "." || segment == "..")
}

impl FromStr for PathPattern {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(path) => write!(f, "{path}"),
            Self::Prefix(base) => write!(f, "{base}/**"),
        }
    }
}

/// True if any pattern matches `path`
pub fn matches_any(patterns: &[PathPattern], path: &str) -> bool {
    patterns.iter().any(|pattern| pattern.matches(path))
}

/// Parse the default public path list
pub fn default_public_paths() -> Vec<PathPattern> {
    DEFAULT_PUBLIC_PATHS.iter().map(|p| PathPattern::parse(p)).collect()
}

/// Which paths are public.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    public: Vec<PathPattern>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(default_public_paths())
    }
}

impl AccessPolicy {
    pub fn new(public: Vec<PathPattern>) -> Self {
        Self { public }
    }

    pub fn public_paths(&self) -> &[PathPattern] {
        &self.public
    }

    /// Whether `path` is reachable without an identity
    pub fn is_public(&self, path: &str) -> bool {
        matches_any(&self.public, path)
    }

    /// Decide whether a request for `path` with `identity` may proceed.
    pub fn authorize(&self, path: &str, identity: &CurrentIdentity) -> Result<(), AuthError> {
        if self.is_public(path) || identity.is_authenticated() {
            Ok(())
        } else {
            Err(AuthError::Unauthenticated)
        }
    }
}

/// Middleware enforcing [`AccessPolicy`] on the identity bound by the gate.
pub async fn path_authorization(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let identity = request
        .extensions()
        .get::<CurrentIdentity>()
        .cloned()
        .unwrap_or_default();

    match state.access.authorize(request.uri().path(), &identity) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::debug!(
                path = %request.uri().path(),
                method = %request.method(),
                "Anonymous request to protected path"
            );
            err.into_response()
        }
    }
}

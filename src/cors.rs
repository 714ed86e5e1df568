//! CORS policy
//!
//! Browsers are only allowed to call the API with credentials from origins on
//! an explicit allow-list. Preflight requests are answered by
//! `tower_http::cors::CorsLayer`; a preflight from an unknown origin gets no
//! `Access-Control-Allow-Origin` header and the browser stops there.
//!
//! Non-preflight requests bypass that browser check (a form post needs no
//! preflight), so [`origin_guard`] additionally rejects any request whose
//! `Origin` header names an origin outside the list.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer, ExposeHeaders};

use crate::config::ConfigError;
use crate::error::AuthError;
use crate::state::AuthState;

/// Methods allowed when none are configured
pub const DEFAULT_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

/// Request headers allowed when none are configured
pub const DEFAULT_ALLOWED_HEADERS: &[&str] = &["authorization", "content-type", "x-csrf-token"];

/// Response headers readable by script; always exposed
pub const EXPOSED_HEADERS: &[&str] = &["authorization", "x-csrf-token"];

/// CORS settings
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Exact origins (`scheme://host[:port]`) allowed to send credentialed requests
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    /// Added to [`EXPOSED_HEADERS`]
    pub exposed_headers: Vec<String>,
    /// Preflight cache lifetime
    pub max_age: Duration,
    /// Reject non-preflight requests from origins outside the list
    pub reject_disallowed: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: DEFAULT_METHODS.iter().map(|m| m.to_string()).collect(),
            allowed_headers: DEFAULT_ALLOWED_HEADERS.iter().map(|h| h.to_string()).collect(),
            exposed_headers: Vec::new(),
            max_age: Duration::from_secs(3600),
            reject_disallowed: true,
        }
    }
}

impl CorsConfig {
    /// Whether `origin` is on the allow-list (exact, ASCII case-insensitive)
    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.allowed_origins
            .iter()
            .any(|allowed| allowed.trim_end_matches('/').eq_ignore_ascii_case(origin))
    }

    /// Allow and expose `name` in addition to the configured headers.
    ///
    /// Used for the CSRF header, which script must both send and read.
    pub fn include_header(&mut self, name: &str) {
        let listed = |list: &[String]| list.iter().any(|h| h.trim().eq_ignore_ascii_case(name));

        if !listed(&self.allowed_headers) {
            self.allowed_headers.push(name.to_string());
        }
        let always_exposed = EXPOSED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name));
        if !always_exposed && !listed(&self.exposed_headers) {
            self.exposed_headers.push(name.to_string());
        }
    }

    /// Check the settings without building a layer
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build_layer().map(|_| ())
    }

    /// Build the tower-http layer. Wildcards are refused because credentials
    /// are always allowed.
    pub fn build_layer(&self) -> Result<CorsLayer, ConfigError> {
        let origins = self
            .allowed_origins
            .iter()
            .map(|origin| {
                if origin.contains('*') {
                    return Err(ConfigError::WildcardOrigin);
                }
                HeaderValue::from_str(origin.trim_end_matches('/'))
                    .map_err(|_| ConfigError::InvalidOrigin(origin.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let methods = self
            .allowed_methods
            .iter()
            .map(|method| {
                Method::from_bytes(method.trim().to_uppercase().as_bytes())
                    .map_err(|_| ConfigError::InvalidMethod(method.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let allowed_headers = parse_header_names(&self.allowed_headers)?;

        let mut exposed = parse_header_names(
            &EXPOSED_HEADERS
                .iter()
                .map(|h| h.to_string())
                .collect::<Vec<_>>(),
        )?;
        for name in parse_header_names(&self.exposed_headers)? {
            if !exposed.contains(&name) {
                exposed.push(name);
            }
        }

        Ok(CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(AllowMethods::list(methods))
            .allow_headers(AllowHeaders::list(allowed_headers))
            .expose_headers(ExposeHeaders::list(exposed))
            .allow_credentials(true)
            .max_age(self.max_age))
    }
}

fn parse_header_names(names: &[String]) -> Result<Vec<HeaderName>, ConfigError> {
    names
        .iter()
        .map(|name| {
            if name.contains('*') {
                return Err(ConfigError::InvalidHeader(name.clone()));
            }
            HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|_| ConfigError::InvalidHeader(name.clone()))
        })
        .collect()
}

/// True for a CORS preflight: `OPTIONS` carrying `Access-Control-Request-Method`
pub fn is_preflight(request: &Request) -> bool {
    request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// Reject requests whose `Origin` is not allow-listed.
///
/// Requests without an `Origin` header (same-origin navigations, non-browser
/// clients) pass through.
pub async fn origin_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let cors = &state.config.cors;
    if !cors.reject_disallowed || is_preflight(&request) {
        return next.run(request).await;
    }

    let origin = request
        .headers()
        .get(header::ORIGIN)
        .map(|value| value.to_str().unwrap_or("<non-ascii>").to_string());

    match origin {
        Some(origin) if !cors.is_allowed_origin(&origin) => {
            tracing::warn!(
                origin = %origin,
                method = %request.method(),
                path = %request.uri().path(),
                "Request from disallowed origin"
            );
            AuthError::DisallowedOrigin(origin).into_response()
        }
        _ => next.run(request).await,
    }
}

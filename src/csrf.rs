//! CSRF protection (double-submit cookie)
//!
//! A random token is handed to the browser in a cookie that script can read.
//! State-changing requests must echo it back in a header (or a `_csrf` form
//! field); a page on another origin can make the browser send the cookie but
//! cannot read it, so it cannot produce the matching header.
//!
//! - Seeding: any response to a request without the cookie sets a fresh one
//!   and echoes the token in the `X-CSRF-TOKEN` response header.
//! - Verification: mutating methods on non-exempt paths need
//!   `header == cookie`, compared in constant time.
//! - Exemptions: configured paths, and (optionally) bearer-only requests that
//!   carry `Authorization: Bearer` and no cookies at all.

use std::fmt;
use std::str::FromStr;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::access::{matches_any, PathPattern};
use crate::crypto::{constant_time_str_eq, random_token};
use crate::error::AuthError;
use crate::gate::bearer_token;
use crate::state::AuthState;

/// Cookie carrying the token
pub const DEFAULT_COOKIE_NAME: &str = "XSRF-TOKEN";

/// Request header carrying the echoed token, also used to expose a newly
/// seeded token on the response
pub const DEFAULT_HEADER_NAME: &str = "x-csrf-token";

/// Form field accepted for urlencoded bodies
pub const FORM_FIELD: &str = "_csrf";

/// Random bytes per token
pub const TOKEN_BYTES: usize = 32;

/// Largest form body buffered to look for the token
pub const MAX_FORM_BYTES: usize = 64 * 1024;

/// Paths exempt from verification when none are configured
pub const DEFAULT_EXEMPT_PATHS: &[&str] = &[
    "/api/auth/**",
    "/docs/**",
    "/swagger-ui/**",
    "/v3/api-docs/**",
];

/// `SameSite` attribute of the CSRF cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "Strict"),
            Self::Lax => write!(f, "Lax"),
            Self::None => write!(f, "None"),
        }
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            other => Err(format!("unknown SameSite value '{other}'")),
        }
    }
}

/// CSRF settings
#[derive(Debug, Clone)]
pub struct CsrfConfig {
    /// Master switch; off for deployments that only ever use bearer headers
    pub enabled: bool,
    /// Paths that skip verification (they still get the cookie)
    pub exempt_paths: Vec<PathPattern>,
    /// Skip verification for requests with a bearer token and no cookies
    pub exempt_bearer_only: bool,
    pub cookie_name: String,
    pub header_name: HeaderName,
    pub cookie_secure: bool,
    pub same_site: SameSite,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exempt_paths: DEFAULT_EXEMPT_PATHS
                .iter()
                .map(|p| PathPattern::parse(p))
                .collect(),
            exempt_bearer_only: true,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            header_name: HeaderName::from_static(DEFAULT_HEADER_NAME),
            cookie_secure: true,
            same_site: SameSite::Lax,
        }
    }
}

impl CsrfConfig {
    /// `Set-Cookie` value for a freshly seeded token
    pub fn seed_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; SameSite={}",
            self.cookie_name, token, self.same_site
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Whether a request must present a matching token
    pub fn requires_verification(&self, method: &Method, path: &str, headers: &HeaderMap) -> bool {
        if !self.enabled || !is_mutating(method) || matches_any(&self.exempt_paths, path) {
            return false;
        }
        !(self.exempt_bearer_only && is_bearer_only(headers))
    }
}

/// Everything except GET, HEAD, OPTIONS and TRACE
pub fn is_mutating(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn is_bearer_only(headers: &HeaderMap) -> bool {
    bearer_token(headers).is_some() && !headers.contains_key(header::COOKIE)
}

/// Value of cookie `name` from the request's `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.trim_start()
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
}

/// Pull the submitted token out of the header, or the form body when there
/// is no header. Returns the request with its body intact.
async fn submitted_token(
    config: &CsrfConfig,
    request: Request,
) -> Result<(Request, Option<String>), AuthError> {
    let from_header = request
        .headers()
        .get(&config.header_name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    if from_header.is_some() || !is_form(request.headers()) {
        return Ok((request, from_header));
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|_| AuthError::CsrfMismatch)?;

    let from_form = url::form_urlencoded::parse(&bytes)
        .find(|(key, _)| key == FORM_FIELD)
        .map(|(_, value)| value.into_owned());

    Ok((Request::from_parts(parts, Body::from(bytes)), from_form))
}

fn attach_seed(response: &mut Response, config: &CsrfConfig, token: &str) {
    match (
        HeaderValue::from_str(&config.seed_cookie(token)),
        HeaderValue::from_str(token),
    ) {
        (Ok(cookie), Ok(echo)) => {
            let headers = response.headers_mut();
            headers.append(header::SET_COOKIE, cookie);
            headers.insert(config.header_name.clone(), echo);
        }
        _ => tracing::error!(cookie = %config.cookie_name, "CSRF cookie is not a valid header value"),
    }
}

/// CSRF middleware.
pub async fn csrf_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let config = &state.config.csrf;
    if !config.enabled {
        return next.run(request).await;
    }

    let cookie_token = read_cookie(request.headers(), &config.cookie_name);
    let seed = cookie_token.is_none().then(|| random_token(TOKEN_BYTES));

    let verify = config.requires_verification(
        request.method(),
        request.uri().path(),
        request.headers(),
    );

    let mut response = if verify {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        match submitted_token(config, request).await {
            Ok((request, Some(submitted)))
                if cookie_token
                    .as_deref()
                    .is_some_and(|cookie| constant_time_str_eq(cookie, &submitted)) =>
            {
                next.run(request).await
            }
            Ok((_, submitted)) => {
                tracing::warn!(
                    method = %method,
                    path = %path,
                    cookie_present = cookie_token.is_some(),
                    token_present = submitted.is_some(),
                    "CSRF verification failed"
                );
                AuthError::CsrfMismatch.into_response()
            }
            Err(err) => err.into_response(),
        }
    } else {
        next.run(request).await
    };

    if let Some(token) = seed {
        attach_seed(&mut response, config, &token);
    }
    response
}

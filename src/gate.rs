//! Authentication gate
//!
//! Runs once per request:
//!
//! 1. No `Authorization: Bearer` header: continue anonymously.
//! 2. Verify the token (signature, then expiry). Failure: continue anonymously.
//! 3. Resolve the subject in the directory. Unknown: continue anonymously.
//! 4. Bind the principal to the request.
//! 5. If the token has no more than the refresh threshold left, put a new
//!    token in the `Authorization` header of the response.
//!
//! The gate never rejects a request itself. Whether an anonymous request may
//! reach its handler is decided afterwards by path authorization.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};

use crate::error::AuthError;
use crate::identity::CurrentIdentity;
use crate::observability::SecurityEvent;
use crate::security_event;
use crate::state::AuthState;

/// Authentication scheme prefix
pub const BEARER_PREFIX: &str = "Bearer ";

/// Token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively; an empty token counts as absent.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let scheme = value.get(..BEARER_PREFIX.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    let token = value[BEARER_PREFIX.len()..].trim();
    (!token.is_empty()).then_some(token)
}

/// `Bearer <token>` header value
pub fn bearer_header(token: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(&format!("{BEARER_PREFIX}{token}"))
        .map_err(|e| AuthError::Internal(format!("token is not a valid header value: {e}")))
}

/// Result of running the gate over one request's headers.
#[derive(Debug, Clone, Default)]
pub struct GateOutcome {
    /// Identity to bind (anonymous on any failure)
    pub identity: CurrentIdentity,
    /// Replacement token to send back, when the presented one was close to expiry
    pub refreshed_token: Option<String>,
}

/// Decide the identity for a request and whether its token should slide.
pub async fn evaluate(state: &AuthState, headers: &HeaderMap, now: DateTime<Utc>) -> GateOutcome {
    let Some(token) = bearer_token(headers) else {
        return GateOutcome::default();
    };

    let claims = match state.codec.verify(token, now) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!(error = %err, "Bearer token rejected");
            security_event!(
                SecurityEvent::TokenRejected,
                reason = %err,
                "Bearer token rejected"
            );
            return GateOutcome::default();
        }
    };

    let principal = match state.directory.load_by_login(&claims.sub).await {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            let err = AuthError::UnknownPrincipal(claims.sub.clone());
            tracing::debug!(error = %err, "Token subject not in directory");
            return GateOutcome::default();
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                subject = %claims.sub,
                "Identity directory failed, continuing anonymously"
            );
            return GateOutcome::default();
        }
    };

    let refreshed_token = if claims.remaining_validity(now) <= state.refresh_threshold() {
        match state.codec.refresh(&claims, now) {
            Ok(token) => {
                security_event!(
                    SecurityEvent::TokenRefreshed,
                    user = %claims.sub,
                    "Token refreshed"
                );
                Some(token)
            }
            Err(err) => {
                tracing::warn!(error = %err, user = %claims.sub, "Token refresh failed");
                None
            }
        }
    } else {
        None
    };

    GateOutcome {
        identity: CurrentIdentity::bound(principal),
        refreshed_token,
    }
}

/// Authentication middleware.
///
/// The bound identity is also copied into the response extensions so outer
/// layers (the audit log) can attribute the response.
pub async fn authentication_gate(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let now = state.now();
    let outcome = evaluate(&state, request.headers(), now).await;

    request.extensions_mut().insert(outcome.identity.clone());
    let mut response = next.run(request).await;

    if let Some(token) = outcome.refreshed_token {
        if response.headers().contains_key(header::AUTHORIZATION) {
            tracing::debug!("Handler set Authorization itself, skipping refresh");
        } else {
            match bearer_header(&token) {
                Ok(value) => {
                    response.headers_mut().insert(header::AUTHORIZATION, value);
                }
                Err(err) => tracing::warn!(error = %err, "Refreshed token dropped"),
            }
        }
    }

    response.extensions_mut().insert(outcome.identity);
    response
}

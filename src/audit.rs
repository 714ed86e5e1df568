//! Audit middleware
//!
//! Wraps the whole pipeline and writes one record per request: who (bound
//! login or `-`), from where (client IP), what (method, path), the outcome
//! (status) and how long it took. Rejections produced by the pipeline are
//! additionally logged as named security events:
//!
//! | Response | Event |
//! |----------|-------|
//! | 401 `bad_credentials` | `authentication_failure` |
//! | 401 other | `access_denied` |
//! | 403 `csrf_mismatch` | `csrf_rejected` |
//! | 403 `origin_not_allowed` | `origin_rejected` |
//! | 409 / 422 on `/api/auth/registration` | `registration_rejected` |

use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::crypto::random_token;
use crate::error::ErrorCode;
use crate::identity::CurrentIdentity;
use crate::observability::SecurityEvent;
use crate::routes::REGISTRATION_PATH;
use crate::security_event;

/// Audit middleware, for use with `axum::middleware::from_fn`.
pub async fn audit_middleware(request: Request, next: Next) -> Response {
    let correlation_id = correlation_id(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = extract_client_ip(request.headers());
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let latency_ms = start.elapsed().as_millis();
    let user = response
        .extensions()
        .get::<CurrentIdentity>()
        .and_then(|identity| identity.login().map(str::to_string))
        .unwrap_or_else(|| "-".to_string());
    let code = response.extensions().get::<ErrorCode>().map(|c| c.0);

    if let Some(event) = classify(status, code, &path) {
        security_event!(
            event,
            correlation_id = %correlation_id,
            client_ip = %client_ip,
            method = %method,
            path = %path,
            user = %user,
            status = status.as_u16(),
            "Request rejected"
        );
    }

    if status.is_server_error() {
        tracing::error!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms = %latency_ms,
            "Server error occurred"
        );
    } else {
        tracing::info!(
            correlation_id = %correlation_id,
            client_ip = %client_ip,
            method = %method,
            path = %path,
            user = %user,
            status = status.as_u16(),
            latency_ms = %latency_ms,
            "Request completed"
        );
    }

    response
}

/// Security event for a rejected response to `path`, if it is one.
pub fn classify(status: StatusCode, code: Option<&str>, path: &str) -> Option<SecurityEvent> {
    match (status, code) {
        (StatusCode::UNAUTHORIZED, Some("bad_credentials")) => {
            Some(SecurityEvent::AuthenticationFailure)
        }
        (StatusCode::UNAUTHORIZED, _) => Some(SecurityEvent::AccessDenied),
        (StatusCode::FORBIDDEN, Some("csrf_mismatch")) => Some(SecurityEvent::CsrfRejected),
        (StatusCode::FORBIDDEN, Some("origin_not_allowed")) => Some(SecurityEvent::OriginRejected),
        (StatusCode::FORBIDDEN, _) => Some(SecurityEvent::AccessDenied),
        (StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY, Some(_))
            if path == REGISTRATION_PATH =>
        {
            Some(SecurityEvent::RegistrationRejected)
        }
        _ => None,
    }
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get("x-correlation-id")
        .or_else(|| headers.get("x-request-id"))
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| format!("req-{}", random_token(9)))
}

/// Client IP from proxy headers.
///
/// Checks `X-Forwarded-For` (first hop), then `X-Real-IP`. Returns
/// "unknown" if neither is present.
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(String::from)
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_classify() {
        let path = "/api/decks";
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, Some("bad_credentials"), path),
            Some(SecurityEvent::AuthenticationFailure)
        );
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, Some("unauthorized"), path),
            Some(SecurityEvent::AccessDenied)
        );
        assert_eq!(
            classify(StatusCode::FORBIDDEN, Some("csrf_mismatch"), path),
            Some(SecurityEvent::CsrfRejected)
        );
        assert_eq!(
            classify(StatusCode::FORBIDDEN, Some("origin_not_allowed"), path),
            Some(SecurityEvent::OriginRejected)
        );
        assert_eq!(
            classify(StatusCode::CONFLICT, Some("conflict"), REGISTRATION_PATH),
            Some(SecurityEvent::RegistrationRejected)
        );
        assert_eq!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, Some("validation_error"), REGISTRATION_PATH),
            Some(SecurityEvent::RegistrationRejected)
        );
        assert_eq!(classify(StatusCode::CONFLICT, Some("conflict"), path), None);
        assert_eq!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, Some("validation_error"), path),
            None
        );
        assert_eq!(classify(StatusCode::OK, None, path), None);
        assert_eq!(classify(StatusCode::NOT_FOUND, None, path), None);
    }

    #[test]
    fn test_client_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(extract_client_ip(&headers), "10.0.0.9");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(extract_client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn test_correlation_id_passthrough() {
        let mut headers = HeaderMap::new();
        assert!(correlation_id(&headers).starts_with("req-"));

        headers.insert("x-request-id", HeaderValue::from_static("abc-123"));
        assert_eq!(correlation_id(&headers), "abc-123");
    }
}

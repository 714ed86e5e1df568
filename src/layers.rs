//! Pipeline composition for Axum routers
//!
//! Provides the [`AuthPipeline`] trait that wraps any router with the full
//! authentication pipeline.

use axum::middleware;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::access::path_authorization;
use crate::audit::audit_middleware;
use crate::config::ConfigError;
use crate::cors::origin_guard;
use crate::csrf::csrf_guard;
use crate::gate::authentication_gate;
use crate::state::AuthState;

/// Extension trait for applying the authentication pipeline to a Router.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, routing::get};
/// use flashcard_gate::{auth_routes, AuthPipeline, AuthState};
///
/// let app = Router::new()
///     .route("/api/decks", get(list_decks))
///     .merge(auth_routes())
///     .with_state(state.clone())
///     .with_auth_pipeline(state)?;
/// ```
pub trait AuthPipeline: Sized {
    /// Apply the pipeline.
    ///
    /// Requests pass through, outermost first:
    /// 1. TraceLayer (if enabled)
    /// 2. Audit middleware (if enabled)
    /// 3. CorsLayer (answers preflights)
    /// 4. Origin guard (403 for unlisted origins)
    /// 5. CSRF guard
    /// 6. Authentication gate
    /// 7. Path authorization (401 for anonymous requests to protected paths)
    ///
    /// Fails only if the CORS settings cannot be turned into a layer, which
    /// [`AuthConfig`](crate::AuthConfig) validation already rules out.
    fn with_auth_pipeline(self, state: AuthState) -> Result<Self, ConfigError>;
}

impl<S> AuthPipeline for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth_pipeline(self, state: AuthState) -> Result<Self, ConfigError> {
        let cors_layer = state.config.cors.build_layer()?;
        let audit_enabled = state.config.audit_enabled;
        let tracing_enabled = state.config.tracing_enabled;

        // Layers added last run first.
        let mut router = self
            .layer(middleware::from_fn_with_state(state.clone(), path_authorization))
            .layer(middleware::from_fn_with_state(state.clone(), authentication_gate))
            .layer(middleware::from_fn_with_state(state.clone(), csrf_guard))
            .layer(middleware::from_fn_with_state(state, origin_guard))
            .layer(cors_layer);

        if audit_enabled {
            router = router.layer(middleware::from_fn(audit_middleware));
        }

        if tracing_enabled {
            router = router.layer(TraceLayer::new_for_http());
        }

        Ok(router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::AuthConfig;
    use crate::directory::{InMemoryDirectory, Principal};
    use crate::identity::CurrentIdentity;
    use crate::password::Argon2Comparator;
    use crate::signing_key::SigningKey;
    use axum::body::Body;
    use axum::http::{header, HeaderValue, Request, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tower::ServiceExt;

    const FRONTEND: &str = "http://localhost:3000";

    fn state(clock: Arc<ManualClock>) -> AuthState {
        let config = AuthConfig::builder()
            .signing_key(SigningKey::from_bytes(vec![3u8; 32]).unwrap())
            .cors_origins([FRONTEND])
            .audit(false)
            .tracing(false)
            .build()
            .unwrap();
        let directory = InMemoryDirectory::new();
        directory.insert(Principal {
            id: "1".into(),
            login: "ivan".into(),
            display_name: "Ivan Petrov".into(),
            password_hash: String::new(),
            roles: BTreeSet::from(["USER".to_string()]),
        });
        AuthState::new(
            config,
            Arc::new(directory),
            Arc::new(Argon2Comparator::low_cost().unwrap()),
        )
        .unwrap()
        .with_clock(clock)
    }

    async fn whoami(identity: CurrentIdentity) -> String {
        identity.login().unwrap_or("anonymous").to_string()
    }

    async fn sets_own_header() -> impl IntoResponse {
        ([(header::AUTHORIZATION, "Bearer handler-issued")], "ok")
    }

    fn app(state: AuthState) -> Router {
        Router::new()
            .route("/api/decks", get(whoami).post(whoami))
            .route("/api/decks/rotate", get(sets_own_header))
            .route("/api/auth/ping", post(whoami))
            .with_auth_pipeline(state)
            .unwrap()
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ))
    }

    async fn text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn seeded_cookie(response: &axum::response::Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_preflight_allowed_origin() {
        let response = app(state(clock()))
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/decks")
                    .header(header::ORIGIN, FRONTEND)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,x-csrf-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_success());
        let headers = response.headers();
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), FRONTEND);
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
        assert_eq!(headers.get(header::ACCESS_CONTROL_MAX_AGE).unwrap(), "3600");
    }

    #[tokio::test]
    async fn test_preflight_unknown_origin_gets_no_allow_origin() {
        let response = app(state(clock()))
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/decks")
                    .header(header::ORIGIN, "https://evil.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_disallowed_origin_rejected() {
        let response = app(state(clock()))
            .oneshot(
                Request::builder()
                    .uri("/api/auth/ping")
                    .method("POST")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_allowed_origin_sees_exposed_headers() {
        let state = state(clock());
        let token = state.codec.issue("ivan", state.now()).unwrap();
        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/api/decks")
                    .header(header::ORIGIN, FRONTEND)
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let exposed = response
            .headers()
            .get(header::ACCESS_CONTROL_EXPOSE_HEADERS)
            .unwrap()
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(exposed.contains("authorization"));
        assert!(exposed.contains("x-csrf-token"));
    }

    #[tokio::test]
    async fn test_anonymous_protected_path_is_401() {
        let response = app(state(clock()))
            .oneshot(Request::builder().uri("/api/decks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_public_path_allows_anonymous() {
        let response = app(state(clock()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_csrf_cookie_seeded() {
        let response = app(state(clock()))
            .oneshot(Request::builder().uri("/api/decks").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let cookie = seeded_cookie(&response);
        let token = cookie.strip_prefix("XSRF-TOKEN=").unwrap();
        assert!(!token.is_empty());
        assert_eq!(response.headers().get("x-csrf-token").unwrap(), token);
    }

    #[tokio::test]
    async fn test_csrf_mismatch_rejected() {
        let state = state(clock());
        let token = state.codec.issue("ivan", state.now()).unwrap();
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/decks")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::COOKIE, "XSRF-TOKEN=cookie-value")
                    .header("x-csrf-token", "something-else")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_csrf_missing_token_rejected() {
        let response = app(state(clock()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/decks")
                    .header(header::COOKIE, "XSRF-TOKEN=cookie-value")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_csrf_header_match_passes() {
        let state = state(clock());
        let token = state.codec.issue("ivan", state.now()).unwrap();
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/decks")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::COOKIE, "XSRF-TOKEN=cookie-value")
                    .header("x-csrf-token", "cookie-value")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(text(response).await, "ivan");
    }

    #[tokio::test]
    async fn test_csrf_form_field_passes() {
        let state = state(clock());
        let token = state.codec.issue("ivan", state.now()).unwrap();
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/decks")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::COOKIE, "XSRF-TOKEN=cookie-value")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("title=Verbs&_csrf=cookie-value"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bearer_only_request_skips_csrf() {
        let state = state(clock());
        let token = state.codec.issue("ivan", state.now()).unwrap();
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/decks")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_refresh_header_on_aging_token() {
        let clock = clock();
        let state = state(clock.clone());
        let token = state.codec.issue("ivan", state.now()).unwrap();
        clock.advance(Duration::minutes(50));

        let response = app(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/decks")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let refreshed = response
            .headers()
            .get(header::AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap()
            .strip_prefix("Bearer ")
            .unwrap()
            .to_string();
        assert_ne!(refreshed, token);
        let claims = state.codec.verify(&refreshed, state.now()).unwrap();
        assert_eq!(claims.exp, (state.now() + Duration::hours(1)).timestamp());
    }

    #[tokio::test]
    async fn test_handler_authorization_header_preserved() {
        let clock = clock();
        let state = state(clock.clone());
        let token = state.codec.issue("ivan", state.now()).unwrap();
        clock.advance(Duration::minutes(50));

        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/api/decks/rotate")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::AUTHORIZATION),
            Some(&HeaderValue::from_static("Bearer handler-issued"))
        );
    }

    #[tokio::test]
    async fn test_expired_token_on_protected_path() {
        let clock = clock();
        let state = state(clock.clone());
        let token = state.codec.issue("ivan", state.now()).unwrap();
        clock.advance(Duration::hours(2));

        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/api/decks")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_audit_and_trace_layers_compose() {
        let config = AuthConfig::builder()
            .signing_key(SigningKey::from_bytes(vec![3u8; 32]).unwrap())
            .build()
            .unwrap();
        assert!(config.audit_enabled && config.tracing_enabled);
        let state = AuthState::new(
            config,
            Arc::new(InMemoryDirectory::new()),
            Arc::new(Argon2Comparator::low_cost().unwrap()),
        )
        .unwrap();

        let response = app(state)
            .oneshot(Request::builder().uri("/api/decks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    fn state_with_csrf_header(name: &str) -> AuthState {
        let mut builder = AuthConfig::builder()
            .signing_key(SigningKey::from_bytes(vec![3u8; 32]).unwrap())
            .cors_origins([FRONTEND])
            .audit(false)
            .tracing(false);
        builder.csrf.header_name = header::HeaderName::from_bytes(name.as_bytes()).unwrap();
        AuthState::new(
            builder.build().unwrap(),
            Arc::new(InMemoryDirectory::new()),
            Arc::new(Argon2Comparator::low_cost().unwrap()),
        )
        .unwrap()
    }

    fn header_list(response: &axum::response::Response, name: header::HeaderName) -> String {
        response
            .headers()
            .get(name)
            .unwrap()
            .to_str()
            .unwrap()
            .to_ascii_lowercase()
    }

    #[tokio::test]
    async fn test_exempt_path_still_seeds_cookie() {
        let response = app(state(clock()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("XSRF-TOKEN="));
        assert!(!set_cookie.contains("HttpOnly"));

        let cookie = seeded_cookie(&response);
        let token = cookie.strip_prefix("XSRF-TOKEN=").unwrap();
        assert!(!token.is_empty());
        assert_eq!(response.headers().get("x-csrf-token").unwrap(), token);
    }

    #[tokio::test]
    async fn test_custom_csrf_header_exposed_and_allowed() {
        let app = app(state_with_csrf_header("x-xsrf-token"));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/ping")
                    .header(header::ORIGIN, FRONTEND)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-xsrf-token").is_some());
        assert!(header_list(&response, header::ACCESS_CONTROL_EXPOSE_HEADERS).contains("x-xsrf-token"));

        let preflight = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/decks")
                    .header(header::ORIGIN, FRONTEND)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-xsrf-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(header_list(&preflight, header::ACCESS_CONTROL_ALLOW_HEADERS).contains("x-xsrf-token"));
    }
}

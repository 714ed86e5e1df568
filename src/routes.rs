//! Authentication routes
//!
//! - `POST /api/auth/login`: exchange login/password for a bearer token
//! - `POST /api/auth/registration`: create an account (needs an [`AccountStore`](crate::directory::AccountStore))
//! - `GET /api/users/me`: the principal bound to the request
//!
//! The first two live under the default public prefix `/api/auth/**`; the
//! last one is protected and only reachable with a valid token.

use std::collections::BTreeSet;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::directory::{NewAccount, DEFAULT_ROLE};
use crate::error::AuthError;
use crate::gate::bearer_header;
use crate::identity::Authenticated;
use crate::observability::SecurityEvent;
use crate::password::hash_blocking;
use crate::security_event;
use crate::state::AuthState;

/// Login path
pub const LOGIN_PATH: &str = "/api/auth/login";

/// Registration path
pub const REGISTRATION_PATH: &str = "/api/auth/registration";

/// Current user path
pub const CURRENT_USER_PATH: &str = "/api/users/me";

/// Router with the authentication routes, to be merged into the application
/// router before `with_state`.
pub fn auth_routes() -> Router<AuthState> {
    Router::new()
        .route(LOGIN_PATH, post(login))
        .route(REGISTRATION_PATH, post(register))
        .route(CURRENT_USER_PATH, get(current_user))
}

// =============================================================================
// Login
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
}

/// Authenticate and issue a token.
///
/// The token is returned in the body and in the `Authorization` response
/// header, the same header the gate uses for refreshed tokens.
pub async fn login(
    State(state): State<AuthState>,
    Json(input): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    let principal = state
        .verifier
        .authenticate(&input.login, &input.password)
        .await?;

    let token = state.codec.issue(&principal.login, state.now())?;
    let header_value = bearer_header(&token)?;

    security_event!(
        SecurityEvent::AuthenticationSuccess,
        user = %principal.login,
        "Login succeeded"
    );

    let body = LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.codec.ttl().num_seconds(),
    };

    Ok(([(header::AUTHORIZATION, header_value)], Json(body)).into_response())
}

// =============================================================================
// Registration
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub surname: String,
    pub login: String,
    pub email: String,
    pub password: String,
}

impl RegistrationRequest {
    fn check_fields(&self) -> Result<(), AuthError> {
        if self.login.trim().is_empty() {
            return Err(AuthError::Validation("login is required".to_string()));
        }
        if self.login.chars().any(char::is_whitespace) {
            return Err(AuthError::Validation(
                "login must not contain whitespace".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(AuthError::Validation("name is required".to_string()));
        }
        match self.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(AuthError::Validation("email is not valid".to_string())),
        }
    }

    fn display_name(&self) -> String {
        format!("{} {}", self.name.trim(), self.surname.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub email: String,
}

/// Create an account with the default role.
///
/// 409 when the login is taken, 422 when a field or the password is rejected.
pub async fn register(
    State(state): State<AuthState>,
    Json(input): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>), AuthError> {
    let Some(store) = state.accounts.clone() else {
        return Err(AuthError::Forbidden("registration is disabled".to_string()));
    };

    input.check_fields()?;
    state
        .password_policy
        .validate_with_context(&input.password, Some(&input.login), Some(&input.email))?;

    let password_hash = hash_blocking(state.comparator.clone(), input.password.clone()).await?;
    let principal = store
        .create_account(NewAccount {
            login: input.login.clone(),
            display_name: input.display_name(),
            email: input.email.clone(),
            password_hash,
            roles: BTreeSet::from([DEFAULT_ROLE.to_string()]),
        })
        .await?;

    security_event!(
        SecurityEvent::UserRegistered,
        user = %principal.login,
        user_id = %principal.id,
        "New user registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            id: principal.id,
            login: principal.login,
            display_name: principal.display_name,
            email: input.email,
        }),
    ))
}

// =============================================================================
// Current user
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentUserResponse {
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub roles: BTreeSet<String>,
}

pub async fn current_user(Authenticated(principal): Authenticated) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        id: principal.id.clone(),
        login: principal.login.clone(),
        display_name: principal.display_name.clone(),
        roles: principal.roles.clone(),
    })
}

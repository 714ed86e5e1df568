//! Authentication error handling
//!
//! Every failure the pipeline can surface to a client is an [`AuthError`].
//! Converting one into a response logs it (internal details stay in the log)
//! and returns a JSON body of the form:
//!
//! ```json
//! {"error": "unauthorized", "message": "Authentication required"}
//! ```
//!
//! `InvalidToken` and `UnknownPrincipal` are produced while resolving a bearer
//! token. The authentication gate swallows both and leaves the request
//! anonymous, so a client only ever sees them as `Unauthenticated` when it
//! reaches a protected path.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;

use crate::directory::DirectoryError;
use crate::password::PasswordError;
use crate::token::TokenError;

/// Errors raised by the authentication pipeline and the auth routes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Token failed to parse, had a bad signature, or was expired
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token subject does not resolve in the identity directory
    #[error("unknown principal: {0}")]
    UnknownPrincipal(String),

    /// Login/password pair rejected
    #[error("bad credentials")]
    BadCredentials,

    /// CSRF token missing from the request or not matching the cookie
    #[error("CSRF token missing or mismatched")]
    CsrfMismatch,

    /// Protected path reached without an identity
    #[error("authentication required")]
    Unauthenticated,

    /// Request understood but refused
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Cross-origin request from an origin outside the allow-list
    #[error("origin not allowed: {0}")]
    DisallowedOrigin(String),

    /// Resource state conflict (duplicate login on registration)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request payload rejected by validation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Infrastructure failure; details are logged, never returned
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error categories, one per HTTP status the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 409
    Conflict,
    /// 422
    Validation,
    /// 500
    Internal,
}

impl ErrorKind {
    /// Get the HTTP status code for this error kind
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation_error"),
            Self::Internal => write!(f, "internal_error"),
        }
    }
}

impl AuthError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidToken(_)
            | Self::UnknownPrincipal(_)
            | Self::BadCredentials
            | Self::Unauthenticated => ErrorKind::Unauthorized,
            Self::CsrfMismatch | Self::Forbidden(_) | Self::DisallowedOrigin(_) => {
                ErrorKind::Forbidden
            }
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    /// Machine-readable code used in the `error` field of the response body
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidToken(_) | Self::UnknownPrincipal(_) | Self::Unauthenticated => {
                "unauthorized"
            }
            Self::BadCredentials => "bad_credentials",
            Self::CsrfMismatch => "csrf_mismatch",
            Self::Forbidden(_) => "forbidden",
            Self::DisallowedOrigin(_) => "origin_not_allowed",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message that is safe to return to the client
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidToken(_) | Self::UnknownPrincipal(_) | Self::Unauthenticated => {
                "Authentication required".to_string()
            }
            Self::BadCredentials => "Invalid login or password".to_string(),
            Self::CsrfMismatch => "Invalid CSRF token".to_string(),
            Self::Forbidden(_) => "Access denied".to_string(),
            Self::DisallowedOrigin(_) => "Origin not allowed".to_string(),
            Self::Conflict(msg) | Self::Validation(msg) => msg.clone(),
            Self::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    /// Log the error (called automatically by IntoResponse)
    fn log(&self) {
        match self.kind() {
            ErrorKind::Internal => {
                tracing::error!(
                    error_kind = %self.kind(),
                    details = %self,
                    "Internal error"
                );
            }
            ErrorKind::Unauthorized | ErrorKind::Forbidden => {
                tracing::warn!(
                    error_kind = %self.kind(),
                    code = self.code(),
                    details = %self,
                    "Auth error"
                );
            }
            _ => {
                tracing::debug!(
                    error_kind = %self.kind(),
                    details = %self,
                    "Client error"
                );
            }
        }
    }
}

/// JSON error response format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,
    /// Human-readable message
    pub message: String,
}

impl From<&AuthError> for ErrorResponse {
    fn from(err: &AuthError) -> Self {
        Self {
            error: err.code().to_string(),
            message: err.public_message(),
        }
    }
}

/// Code of the [`AuthError`] that produced a response, stored in the
/// response extensions for outer layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub &'static str);

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        let mut response = (self.status_code(), Json(ErrorResponse::from(&self))).into_response();
        response.extensions_mut().insert(ErrorCode(self.code()));
        response
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(msg) => Self::Internal(format!("token issuance failed: {msg}")),
            other => Self::InvalidToken(other.to_string()),
        }
    }
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::DuplicateLogin(login) => {
                Self::Conflict(format!("Login '{login}' is already taken"))
            }
            DirectoryError::Unavailable(msg) => Self::Internal(format!("directory: {msg}")),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Hashing(msg) => Self::Internal(format!("password hashing: {msg}")),
            rejected => Self::Validation(rejected.to_string()),
        }
    }
}

//! Common imports for applications using the pipeline
//!
//! # Usage
//!
//! ```ignore
//! use flashcard_gate::prelude::*;
//!
//! let app = Router::new()
//!     .route("/api/decks", get(list_decks))
//!     .merge(auth_routes())
//!     .with_state(state.clone())
//!     .with_auth_pipeline(state)?;
//! ```

// =============================================================================
// Configuration and state
// =============================================================================

pub use crate::config::{AuthConfig, AuthConfigBuilder, ConfigError};
pub use crate::cors::CorsConfig;
pub use crate::csrf::{CsrfConfig, SameSite};
pub use crate::layers::AuthPipeline;
pub use crate::signing_key::{SecretPolicy, SigningKey};
pub use crate::state::AuthState;

// =============================================================================
// Identity
// =============================================================================

pub use crate::directory::{
    AccountStore,
    IdentityDirectory,
    InMemoryDirectory,
    Principal,
};
pub use crate::identity::{Authenticated, CurrentIdentity, IdentityAccessor};
pub use crate::password::{Argon2Comparator, PasswordComparator, PasswordPolicy};
pub use crate::routes::auth_routes;

// =============================================================================
// Errors and observability
// =============================================================================

pub use crate::error::{AuthError, ErrorKind};
pub use crate::observability::{ObservabilityConfig, SecurityEvent};
pub use crate::ObservabilityConfigBuilder;

// =============================================================================
// External Re-exports for Convenience
// =============================================================================

pub use axum::{
    Router,
    routing::{get, post, put, delete, patch},
    extract::{State, Path, Query, Json},
    response::IntoResponse,
    http::StatusCode,
};

pub use tracing::{info, warn, error, debug};

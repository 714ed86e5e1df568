//! # flashcard-gate
//!
//! Stateless bearer-token authentication for Axum APIs.
//!
//! Every request runs through the same pipeline:
//!
//! - **CORS**: credentialed cross-origin access for an explicit origin list
//! - **CSRF**: double-submit cookie check on state-changing requests
//! - **Authentication gate**: verifies `Authorization: Bearer <jwt>`, binds the
//!   principal to the request and slides the token when it is close to expiry
//! - **Path authorization**: anonymous requests only reach public paths
//!
//! No session is kept on the server; the signed token is the only state.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use axum::{Router, routing::get};
//! use flashcard_gate::{
//!     auth_routes, Argon2Comparator, AuthConfig, AuthPipeline, AuthState, Authenticated,
//!     InMemoryDirectory,
//! };
//! use flashcard_gate::observability::{init, ObservabilityConfig};
//!
//! async fn decks(Authenticated(user): Authenticated) -> String {
//!     format!("decks of {}", user.login)
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     init(ObservabilityConfig::from_env())?;
//!
//!     let state = AuthState::with_accounts(
//!         AuthConfig::from_env()?,
//!         Arc::new(InMemoryDirectory::new()),
//!         Arc::new(Argon2Comparator::new()?),
//!     )?;
//!
//!     let app = Router::new()
//!         .route("/api/decks", get(decks))
//!         .merge(auth_routes())
//!         .with_state(state.clone())
//!         .with_auth_pipeline(state)?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod audit;
pub mod clock;
pub mod config;
pub mod cors;
pub mod credentials;
mod crypto;
pub mod csrf;
pub mod directory;
pub mod error;
pub mod gate;
pub mod identity;
mod layers;
pub mod observability;
mod parse;
pub mod password;
pub mod prelude;
pub mod routes;
pub mod signing_key;
pub mod state;
pub mod token;

// Re-exports
pub use access::{AccessPolicy, PathPattern};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, AuthConfigBuilder, ConfigError};
pub use cors::CorsConfig;
pub use credentials::CredentialVerifier;
pub use crypto::{constant_time_eq, constant_time_str_eq};
pub use csrf::{CsrfConfig, SameSite};
pub use directory::{AccountStore, IdentityDirectory, InMemoryDirectory, NewAccount, Principal};
pub use error::{AuthError, ErrorResponse};
pub use identity::{Authenticated, CurrentIdentity, IdentityAccessor};
pub use layers::AuthPipeline;
pub use observability::ObservabilityConfigBuilder;
pub use parse::parse_duration;
pub use password::{Argon2Comparator, PasswordComparator, PasswordPolicy};
pub use routes::auth_routes;
pub use signing_key::{SecretPolicy, SigningKey};
pub use state::AuthState;
pub use token::{Claims, TokenCodec, TokenError};

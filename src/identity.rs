//! Request-scoped identity
//!
//! The authentication gate inserts exactly one [`CurrentIdentity`] into the
//! extensions of every request it sees. It lives and dies with that request:
//! nothing is stored per thread or per process, so concurrent requests can
//! never observe each other's identity.
//!
//! Handlers read it through extractors:
//!
//! ```ignore
//! use flashcard_gate::identity::{Authenticated, CurrentIdentity};
//!
//! // Protected route: rejects with 401 when nobody is bound
//! async fn me(Authenticated(principal): Authenticated) -> String {
//!     principal.login.clone()
//! }
//!
//! // Optional identity
//! async fn greeting(identity: CurrentIdentity) -> String {
//!     match identity.principal() {
//!         Some(p) => format!("Hello, {}", p.display_name),
//!         None => "Hello, guest".to_string(),
//!     }
//! }
//! ```

use std::ops::Deref;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;

use crate::directory::Principal;
use crate::error::AuthError;

/// Identity bound to the current request, or anonymous.
#[derive(Debug, Clone, Default)]
pub struct CurrentIdentity(Option<Arc<Principal>>);

impl CurrentIdentity {
    /// No identity bound
    pub fn anonymous() -> Self {
        Self(None)
    }

    /// Bind a principal
    pub fn bound(principal: Principal) -> Self {
        Self(Some(Arc::new(principal)))
    }

    /// The bound principal, if any
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_deref()
    }

    /// Shared handle to the bound principal
    pub fn shared(&self) -> Option<Arc<Principal>> {
        self.0.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    /// Login of the bound principal
    pub fn login(&self) -> Option<&str> {
        self.principal().map(|p| p.login.as_str())
    }
}

/// Read access to the identity of the request being processed.
pub trait IdentityAccessor {
    /// The bound principal, `None` for anonymous requests
    fn current_identity(&self) -> Option<&Principal>;
}

impl IdentityAccessor for CurrentIdentity {
    fn current_identity(&self) -> Option<&Principal> {
        self.principal()
    }
}

impl IdentityAccessor for Parts {
    fn current_identity(&self) -> Option<&Principal> {
        self.extensions
            .get::<CurrentIdentity>()
            .and_then(CurrentIdentity::principal)
    }
}

impl<B> IdentityAccessor for Request<B> {
    fn current_identity(&self) -> Option<&Principal> {
        self.extensions()
            .get::<CurrentIdentity>()
            .and_then(CurrentIdentity::principal)
    }
}

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentIdentity>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Extractor that requires a bound identity.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Arc<Principal>);

impl Deref for Authenticated {
    type Target = Principal;

    fn deref(&self) -> &Principal {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentIdentity>()
            .and_then(CurrentIdentity::shared)
            .map(Authenticated)
            .ok_or(AuthError::Unauthenticated)
    }
}

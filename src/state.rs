//! Shared pipeline state
//!
//! Everything in [`AuthState`] is read-only after construction and shared
//! through `Arc`s, so cloning it into each middleware invocation is cheap and
//! no request can affect another.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::access::AccessPolicy;
use crate::clock::{Clock, SystemClock};
use crate::config::{AuthConfig, ConfigError};
use crate::credentials::CredentialVerifier;
use crate::directory::{AccountStore, IdentityDirectory};
use crate::password::{PasswordComparator, PasswordPolicy};
use crate::token::TokenCodec;

/// State handed to every middleware and auth route.
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AuthConfig>,
    pub codec: Arc<TokenCodec>,
    pub directory: Arc<dyn IdentityDirectory>,
    /// Present when registration is possible
    pub accounts: Option<Arc<dyn AccountStore>>,
    pub comparator: Arc<dyn PasswordComparator>,
    pub verifier: CredentialVerifier,
    pub access: Arc<AccessPolicy>,
    pub clock: Arc<dyn Clock>,
    pub password_policy: Arc<PasswordPolicy>,
    refresh_threshold: TimeDelta,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("codec", &self.codec)
            .field("registration", &self.accounts.is_some())
            .finish_non_exhaustive()
    }
}

impl AuthState {
    /// State for a read-only directory (no registration route).
    pub fn new(
        config: AuthConfig,
        directory: Arc<dyn IdentityDirectory>,
        comparator: Arc<dyn PasswordComparator>,
    ) -> Result<Self, ConfigError> {
        let ttl = TimeDelta::from_std(config.token_ttl)
            .map_err(|_| ConfigError::InvalidDuration("AUTH_TOKEN_TTL".to_string()))?;
        let refresh_threshold = TimeDelta::from_std(config.refresh_threshold)
            .map_err(|_| ConfigError::InvalidDuration("AUTH_REFRESH_THRESHOLD".to_string()))?;

        Ok(Self {
            codec: Arc::new(TokenCodec::new(&config.signing_key, ttl)),
            access: Arc::new(AccessPolicy::new(config.public_paths.clone())),
            verifier: CredentialVerifier::new(directory.clone(), comparator.clone()),
            config: Arc::new(config),
            directory,
            accounts: None,
            comparator,
            clock: Arc::new(SystemClock),
            password_policy: Arc::new(PasswordPolicy::default()),
            refresh_threshold,
        })
    }

    /// State for a store that also accepts registrations.
    pub fn with_accounts<S>(
        config: AuthConfig,
        store: Arc<S>,
        comparator: Arc<dyn PasswordComparator>,
    ) -> Result<Self, ConfigError>
    where
        S: AccountStore + 'static,
    {
        let mut state = Self::new(config, store.clone(), comparator)?;
        state.accounts = Some(store);
        Ok(state)
    }

    /// Replace the clock (tests drive expiry with a manual clock).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the registration password policy.
    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = Arc::new(policy);
        self
    }

    /// Current time from the configured clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Remaining validity at or below which a token is replaced
    pub fn refresh_threshold(&self) -> TimeDelta {
        self.refresh_threshold
    }
}

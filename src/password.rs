//! Password hashing and registration policy
//!
//! The pipeline treats the stored hash as opaque: a [`PasswordComparator`]
//! answers "does this plain password match this stored hash" and produces
//! hashes for new accounts. [`Argon2Comparator`] is the standard
//! implementation (Argon2id, PHC string format, constant-time verify).
//!
//! [`PasswordPolicy`] follows NIST SP 800-63B for new passwords: a length
//! floor and ceiling, no composition rules, and rejection of common,
//! all-numeric or login-derived passwords.
//!
//! ```
//! use flashcard_gate::password::{Argon2Comparator, PasswordComparator, PasswordPolicy};
//!
//! let comparator = Argon2Comparator::low_cost().unwrap();
//! let hash = comparator.hash("correct horse battery").unwrap();
//! assert!(comparator.matches("correct horse battery", &hash));
//! assert!(!comparator.matches("wrong", &hash));
//!
//! let policy = PasswordPolicy::default();
//! assert!(policy.validate("password").is_err());
//! ```

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::crypto::random_token;

/// Compares plain passwords with stored hashes and hashes new ones.
pub trait PasswordComparator: Send + Sync {
    /// True when `plain` matches the stored `hash`. Unparseable hashes never match.
    fn matches(&self, plain: &str, hash: &str) -> bool;

    /// Hash a password for storage.
    fn hash(&self, plain: &str) -> Result<String, PasswordError>;

    /// A valid hash of a random password, costing the same to check as a real
    /// one. Compared against when a login is unknown.
    fn decoy_hash(&self) -> &str;
}

/// Argon2id comparator.
#[derive(Clone)]
pub struct Argon2Comparator {
    argon2: Argon2<'static>,
    decoy: String,
}

impl std::fmt::Debug for Argon2Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Comparator")
            .field("params", self.argon2.params())
            .finish_non_exhaustive()
    }
}

impl Argon2Comparator {
    /// Comparator with the argon2 crate's default (OWASP) parameters
    pub fn new() -> Result<Self, PasswordError> {
        Self::with_params(Params::default())
    }

    /// Comparator with the smallest legal cost (for testing only)
    pub fn low_cost() -> Result<Self, PasswordError> {
        let params = Params::new(Params::MIN_M_COST, 1, 1, None)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        Self::with_params(params)
    }

    /// Comparator with explicit cost parameters
    pub fn with_params(params: Params) -> Result<Self, PasswordError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let decoy = hash_with(&argon2, &random_token(24))?;
        Ok(Self { argon2, decoy })
    }
}

fn hash_with(argon2: &Argon2<'_>, plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

impl PasswordComparator for Argon2Comparator {
    fn matches(&self, plain: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| self.argon2.verify_password(plain.as_bytes(), &parsed).is_ok())
            .unwrap_or(false)
    }

    fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        hash_with(&self.argon2, plain)
    }

    fn decoy_hash(&self) -> &str {
        &self.decoy
    }
}

/// Run [`PasswordComparator::matches`] on the blocking thread pool.
///
/// With `hash == None` the password is checked against the decoy hash and the
/// result is always `false`.
pub async fn matches_blocking(
    comparator: Arc<dyn PasswordComparator>,
    plain: String,
    hash: Option<String>,
) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => comparator.matches(&plain, &hash),
        None => {
            let _ = comparator.matches(&plain, comparator.decoy_hash());
            false
        }
    })
    .await
    .map_err(|e| PasswordError::Hashing(format!("password check aborted: {e}")))
}

/// Run [`PasswordComparator::hash`] on the blocking thread pool.
pub async fn hash_blocking(
    comparator: Arc<dyn PasswordComparator>,
    plain: String,
) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || comparator.hash(&plain))
        .await
        .map_err(|e| PasswordError::Hashing(format!("password hashing aborted: {e}")))?
}

/// Password policy for new accounts
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    /// Minimum password length in characters (NIST minimum: 8)
    pub min_length: usize,

    /// Maximum password length in characters (NIST: at least 64)
    pub max_length: usize,

    /// Check against the built-in common password list
    pub check_common_passwords: bool,

    /// Disallow passwords containing the login
    pub disallow_login_in_password: bool,

    /// Disallow passwords containing the local part of the email
    pub disallow_email_in_password: bool,

    /// Disallow PIN-like passwords
    pub disallow_all_numeric: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            check_common_passwords: true,
            disallow_login_in_password: true,
            disallow_email_in_password: true,
            disallow_all_numeric: true,
        }
    }
}

impl PasswordPolicy {
    /// Create a new builder for custom policy configuration
    pub fn builder() -> PasswordPolicyBuilder {
        PasswordPolicyBuilder::default()
    }

    /// Accept any non-empty password (for testing only)
    pub fn minimal() -> Self {
        Self {
            min_length: 1,
            max_length: 128,
            check_common_passwords: false,
            disallow_login_in_password: false,
            disallow_email_in_password: false,
            disallow_all_numeric: false,
        }
    }

    /// Validate a password against the policy
    pub fn validate(&self, password: &str) -> Result<(), PasswordError> {
        self.validate_with_context(password, None, None)
    }

    /// Validate a password with account context (login, email)
    pub fn validate_with_context(
        &self,
        password: &str,
        login: Option<&str>,
        email: Option<&str>,
    ) -> Result<(), PasswordError> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(PasswordError::TooShort {
                min: self.min_length,
                actual: length,
            });
        }
        if length > self.max_length {
            return Err(PasswordError::TooLong {
                max: self.max_length,
                actual: length,
            });
        }

        if self.disallow_all_numeric && password.chars().all(|c| c.is_ascii_digit()) {
            return Err(PasswordError::AllNumeric);
        }

        let lower = password.to_lowercase();

        if self.disallow_login_in_password {
            if let Some(login) = login.filter(|l| !l.is_empty()) {
                if lower.contains(&login.to_lowercase()) {
                    return Err(PasswordError::ContainsLogin);
                }
            }
        }

        if self.disallow_email_in_password {
            let local = email.and_then(|e| e.split('@').next()).filter(|l| l.len() > 2);
            if let Some(local) = local {
                if lower.contains(&local.to_lowercase()) {
                    return Err(PasswordError::ContainsEmail);
                }
            }
        }

        if self.check_common_passwords && is_common_password(&lower) {
            return Err(PasswordError::TooCommon);
        }

        Ok(())
    }
}

/// Builder for PasswordPolicy
#[derive(Debug, Clone, Default)]
pub struct PasswordPolicyBuilder {
    policy: PasswordPolicy,
}

impl PasswordPolicyBuilder {
    /// Set minimum length
    pub fn min_length(mut self, len: usize) -> Self {
        self.policy.min_length = len;
        self
    }

    /// Set maximum length
    pub fn max_length(mut self, len: usize) -> Self {
        self.policy.max_length = len;
        self
    }

    /// Enable/disable common password checking
    pub fn check_common_passwords(mut self, check: bool) -> Self {
        self.policy.check_common_passwords = check;
        self
    }

    /// Enable/disable the login-in-password check
    pub fn disallow_login_in_password(mut self, disallow: bool) -> Self {
        self.policy.disallow_login_in_password = disallow;
        self
    }

    /// Enable/disable the email-in-password check
    pub fn disallow_email_in_password(mut self, disallow: bool) -> Self {
        self.policy.disallow_email_in_password = disallow;
        self
    }

    /// Enable/disable the all-numeric check
    pub fn disallow_all_numeric(mut self, disallow: bool) -> Self {
        self.policy.disallow_all_numeric = disallow;
        self
    }

    /// Build the policy
    pub fn build(self) -> PasswordPolicy {
        self.policy
    }
}

/// Password errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordError {
    #[error("Password must be at least {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },

    #[error("Password must be at most {max} characters (got {actual})")]
    TooLong { max: usize, actual: usize },

    #[error("Password is too common")]
    TooCommon,

    #[error("Password cannot contain your login")]
    ContainsLogin,

    #[error("Password cannot contain your email")]
    ContainsEmail,

    #[error("Password cannot be all numbers")]
    AllNumeric,

    /// Hashing backend failure
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

// `lower` is already lowercased. A common base followed only by digits
// ("password2024") counts as common.
fn is_common_password(lower: &str) -> bool {
    COMMON_PASSWORDS.iter().any(|common| {
        lower == *common
            || (common.len() >= 4
                && lower
                    .strip_prefix(common)
                    .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit())))
    })
}

static COMMON_PASSWORDS: &[&str] = &[
    "123456", "password", "12345678", "qwerty", "123456789", "12345", "111111",
    "1234567", "dragon", "123123", "baseball", "abc123", "football", "monkey",
    "letmein", "shadow", "master", "qwertyuiop", "superman", "1qaz2wsx",
    "trustno1", "zxcvbnm", "asdfgh", "hunter", "sunshine", "iloveyou",
    "starwars", "computer", "freedom", "princess", "passw0rd", "admin",
    "welcome", "login", "guest", "changeme", "secret", "flashcard",
    "flashcards", "student", "school", "english", "vocabulary", "learning",
];

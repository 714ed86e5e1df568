//! Identity directory
//!
//! The pipeline resolves token subjects and login attempts through an
//! [`IdentityDirectory`]. Applications plug in their user store by
//! implementing it; [`InMemoryDirectory`] is provided for tests, demos and
//! small deployments.
//!
//! Registration additionally needs an [`AccountStore`].

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

/// Role given to self-registered accounts
pub const DEFAULT_ROLE: &str = "USER";

/// Boxed future returned by directory operations.
pub type DirectoryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DirectoryError>> + Send + 'a>>;

/// Directory failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// Backing store could not be reached or answered with an error
    #[error("identity directory unavailable: {0}")]
    Unavailable(String),

    /// Account creation for a login that already exists
    #[error("login already exists: {0}")]
    DuplicateLogin(String),
}

/// An authenticated (or authenticatable) user.
///
/// Snapshot taken when the request is processed; changes in the store are
/// not reflected in an in-flight request.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Opaque identifier assigned by the store
    pub id: String,
    /// Unique login, also the token subject
    pub login: String,
    /// Name shown in UIs
    pub display_name: String,
    /// Stored password hash, opaque to everything except the comparator
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Granted roles
    pub roles: BTreeSet<String>,
}

impl Principal {
    /// Check if the principal has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("login", &self.login)
            .field("display_name", &self.display_name)
            .field("password_hash", &"[REDACTED]")
            .field("roles", &self.roles)
            .finish()
    }
}

/// Data for a new account.
#[derive(Clone)]
pub struct NewAccount {
    pub login: String,
    pub display_name: String,
    pub email: String,
    pub password_hash: String,
    pub roles: BTreeSet<String>,
}

/// Lookup of principals by login.
pub trait IdentityDirectory: Send + Sync {
    /// Load the principal for `login`, `Ok(None)` if there is none.
    fn load_by_login<'a>(&'a self, login: &'a str) -> DirectoryFuture<'a, Option<Principal>>;
}

/// A directory that can also create accounts.
pub trait AccountStore: IdentityDirectory {
    /// Create an account. Fails with [`DirectoryError::DuplicateLogin`] if the
    /// login is taken.
    fn create_account(&self, account: NewAccount) -> DirectoryFuture<'_, Principal>;
}

/// In-memory directory keyed by login.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    principals: RwLock<HashMap<String, Principal>>,
    emails: RwLock<HashMap<String, String>>,
    next_id: AtomicU64,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a principal
    pub fn insert(&self, principal: Principal) {
        self.principals
            .write()
            .insert(principal.login.clone(), principal);
    }

    /// Remove a principal; tokens issued for it stop resolving
    pub fn remove(&self, login: &str) -> Option<Principal> {
        self.emails.write().remove(login);
        self.principals.write().remove(login)
    }

    /// Email recorded at registration, if any
    pub fn email_of(&self, login: &str) -> Option<String> {
        self.emails.read().get(login).cloned()
    }

    pub fn len(&self) -> usize {
        self.principals.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.read().is_empty()
    }

    fn allocate_id(&self) -> String {
        (self.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

impl IdentityDirectory for InMemoryDirectory {
    fn load_by_login<'a>(&'a self, login: &'a str) -> DirectoryFuture<'a, Option<Principal>> {
        let found = self.principals.read().get(login).cloned();
        Box::pin(async move { Ok(found) })
    }
}

impl AccountStore for InMemoryDirectory {
    fn create_account(&self, account: NewAccount) -> DirectoryFuture<'_, Principal> {
        let result = {
            let mut principals = self.principals.write();
            if principals.contains_key(&account.login) {
                Err(DirectoryError::DuplicateLogin(account.login))
            } else {
                let principal = Principal {
                    id: self.allocate_id(),
                    login: account.login.clone(),
                    display_name: account.display_name,
                    password_hash: account.password_hash,
                    roles: account.roles,
                };
                principals.insert(account.login.clone(), principal.clone());
                self.emails.write().insert(account.login, account.email);
                Ok(principal)
            }
        };
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(login: &str) -> NewAccount {
        NewAccount {
            login: login.to_string(),
            display_name: "Ivan Petrov".to_string(),
            email: format!("{login}@mail.example"),
            password_hash: "$argon2id$stub".to_string(),
            roles: BTreeSet::from([DEFAULT_ROLE.to_string()]),
        }
    }

    #[tokio::test]
    async fn test_create_then_load() {
        let directory = InMemoryDirectory::new();
        let created = directory.create_account(account("ivan")).await.unwrap();
        assert_eq!(created.id, "1");

        let loaded = directory.load_by_login("ivan").await.unwrap().unwrap();
        assert_eq!(loaded, created);
        assert!(loaded.has_role(DEFAULT_ROLE));
        assert_eq!(directory.email_of("ivan").as_deref(), Some("ivan@mail.example"));
    }

    #[tokio::test]
    async fn test_duplicate_login_rejected() {
        let directory = InMemoryDirectory::new();
        directory.create_account(account("ivan")).await.unwrap();
        let err = directory.create_account(account("ivan")).await.unwrap_err();
        assert_eq!(err, DirectoryError::DuplicateLogin("ivan".into()));
        assert_eq!(directory.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_login_is_none() {
        let directory = InMemoryDirectory::new();
        assert!(directory.load_by_login("nobody").await.unwrap().is_none());
    }

    #[test]
    fn test_principal_debug_redacts_hash() {
        let principal = Principal {
            id: "7".into(),
            login: "ivan".into(),
            display_name: "Ivan".into(),
            password_hash: "$argon2id$v=19$secret-material".into(),
            roles: BTreeSet::new(),
        };
        let printed = format!("{principal:?}");
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("secret-material"));

        let json = serde_json::to_value(&principal).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}

//! Login/password verification

use std::sync::Arc;

use crate::directory::{IdentityDirectory, Principal};
use crate::error::AuthError;
use crate::password::{matches_blocking, PasswordComparator};

/// Checks a login/password pair against the directory.
///
/// An unknown login and a wrong password both fail with
/// [`AuthError::BadCredentials`]. For an unknown login the password is still
/// compared against the comparator's decoy hash so both paths do the same
/// amount of hashing work.
#[derive(Clone)]
pub struct CredentialVerifier {
    directory: Arc<dyn IdentityDirectory>,
    comparator: Arc<dyn PasswordComparator>,
}

impl CredentialVerifier {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        comparator: Arc<dyn PasswordComparator>,
    ) -> Self {
        Self {
            directory,
            comparator,
        }
    }

    /// Authenticate `login` with `password`.
    ///
    /// The hash comparison runs on the blocking pool. Directory failures
    /// surface as [`AuthError::Internal`].
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<Principal, AuthError> {
        let found = self.directory.load_by_login(login).await?;
        let stored_hash = found.as_ref().map(|p| p.password_hash.clone());

        let matched =
            matches_blocking(self.comparator.clone(), password.to_string(), stored_hash).await?;

        match found {
            Some(principal) if matched => Ok(principal),
            _ => Err(AuthError::BadCredentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirectoryError, DirectoryFuture, InMemoryDirectory};
    use crate::password::Argon2Comparator;
    use std::collections::BTreeSet;

    struct BrokenDirectory;

    impl IdentityDirectory for BrokenDirectory {
        fn load_by_login<'a>(&'a self, _login: &'a str) -> DirectoryFuture<'a, Option<Principal>> {
            Box::pin(async {
                Err::<Option<Principal>, _>(DirectoryError::Unavailable("connection reset".into()))
            })
        }
    }

    fn verifier_with_ivan() -> CredentialVerifier {
        let comparator = Arc::new(Argon2Comparator::low_cost().unwrap());
        let directory = InMemoryDirectory::new();
        directory.insert(Principal {
            id: "1".into(),
            login: "ivan".into(),
            display_name: "Ivan Petrov".into(),
            password_hash: comparator.hash("river-otter-maple").unwrap(),
            roles: BTreeSet::from(["USER".to_string()]),
        });
        CredentialVerifier::new(Arc::new(directory), comparator)
    }

    #[tokio::test]
    async fn test_valid_credentials() {
        let principal = verifier_with_ivan()
            .authenticate("ivan", "river-otter-maple")
            .await
            .unwrap();
        assert_eq!(principal.login, "ivan");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_login_look_the_same() {
        let verifier = verifier_with_ivan();
        let wrong_password = verifier.authenticate("ivan", "nope").await.unwrap_err();
        let unknown_login = verifier.authenticate("olga", "river-otter-maple").await.unwrap_err();

        assert_eq!(wrong_password, AuthError::BadCredentials);
        assert_eq!(wrong_password, unknown_login);
    }

    #[tokio::test]
    async fn test_directory_failure_is_internal() {
        let verifier = CredentialVerifier::new(
            Arc::new(BrokenDirectory),
            Arc::new(Argon2Comparator::low_cost().unwrap()),
        );
        let err = verifier.authenticate("ivan", "x").await.unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }
}

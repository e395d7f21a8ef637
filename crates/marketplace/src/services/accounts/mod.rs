//! Account service.
//!
//! Registration creates the user and their profile together; passwords are
//! stored as Argon2 PHC strings.

mod error;

pub use error::AccountError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use raredoor_core::{Email, PhoneNumber, UserId};

use crate::db::RepositoryError;
use crate::db::profiles::create_profile;
use crate::db::users::{NewUser, UserRepository, create_user};
use crate::models::{Profile, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Input for [`AccountService::register`].
#[derive(Debug, Clone, Default)]
pub struct Registration<'a> {
    pub email: &'a str,
    /// `None` registers an account that cannot log in with a password.
    pub password: Option<&'a str>,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: Option<&'a str>,
    pub is_merchant: bool,
    pub is_staff: bool,
}

/// Account registration and password login.
pub struct AccountService<'a> {
    pool: &'a PgPool,
    users: UserRepository<'a>,
}

impl<'a> AccountService<'a> {
    /// Create a new account service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            users: UserRepository::new(pool),
        }
    }

    /// Register a user and create their profile in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidEmail` or `AccountError::InvalidPhone`
    /// for malformed input, `AccountError::WeakPassword` if the password is
    /// too short, and `AccountError::UserAlreadyExists` if the email is taken.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(
        &self,
        registration: &Registration<'_>,
    ) -> Result<(User, Profile), AccountError> {
        let email = Email::parse(registration.email)?;
        let phone = registration
            .phone
            .filter(|p| !p.trim().is_empty())
            .map(PhoneNumber::parse)
            .transpose()?;
        let password_hash = registration
            .password
            .map(|password| {
                validate_password(password)?;
                hash_password(password)
            })
            .transpose()?;

        let new_user = NewUser {
            first_name: registration.first_name,
            last_name: registration.last_name,
            password_hash: password_hash.as_deref(),
            is_staff: registration.is_staff,
        };

        let mut tx = self.pool.begin().await?;
        let user = create_user(&mut *tx, &email, &new_user)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AccountError::UserAlreadyExists,
                other => AccountError::Repository(other),
            })?;
        let profile =
            create_profile(&mut *tx, user.id, phone.as_ref(), registration.is_merchant).await?;
        tx.commit().await?;

        info!(user_id = %user.id, is_merchant = profile.is_merchant, "Registered account");
        Ok((user, profile))
    }

    /// Log in with email and password and stamp `last_login`.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidCredentials` if the email/password is
    /// wrong or the account is deactivated.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AccountError> {
        let email = Email::parse(email)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.is_active {
            warn!(user_id = %user.id, "Login attempt on inactive account");
            return Err(AccountError::InvalidCredentials);
        }

        self.users.record_login(user.id, now).await?;
        Ok(user)
    }

    /// Replace a user's password.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::WeakPassword` if the password is too short and
    /// `AccountError::UserNotFound` if the user doesn't exist.
    pub async fn set_password(&self, user_id: UserId, password: &str) -> Result<(), AccountError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.users
            .set_password_hash(user_id, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AccountError::UserNotFound,
                other => AccountError::Repository(other),
            })?;

        info!(user_id = %user_id, "Changed password");
        Ok(())
    }
}

fn validate_password(password: &str) -> Result<(), AccountError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AccountError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AccountError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> Result<(), AccountError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AccountError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AccountError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AccountError::WeakPassword(_))
        ));
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("correct horse").unwrap();
        let b = hash_password("correct horse").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AccountError::InvalidCredentials)
        ));
    }
}

//! Authentication service.
//!
//! Password signup and login, plus the emailed password-reset flow.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::PgPool;

use bazaar_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 5;

/// Random bytes in a password reset token.
const RESET_TOKEN_BYTES: usize = 32;

/// How long a reset link stays valid.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new user with email and password. The cart starts empty.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<User, AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.users
            .create_with_password(email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<User, AuthError> {
        let (user, password_hash) = self
            .users
            .get_password_hash(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Whether an account exists for this email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn email_taken(&self, email: &Email) -> Result<bool, AuthError> {
        Ok(self.users.get_by_email(email).await?.is_some())
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Issue a reset token for the account with this email.
    ///
    /// Returns `None` if there is no such account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the token cannot be stored.
    pub async fn start_password_reset(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, AuthError> {
        let Some(user) = self.users.get_by_email(email).await? else {
            return Ok(None);
        };

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        self.users
            .set_reset_token(user.id, &token, expires_at)
            .await?;

        Ok(Some((user, token)))
    }

    /// Resolve an unexpired reset token to its user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` if the token is unknown or expired.
    pub async fn check_reset_token(&self, token: &str) -> Result<User, AuthError> {
        self.users
            .get_by_reset_token(token, Utc::now())
            .await?
            .ok_or(AuthError::InvalidResetToken)
    }

    /// Set a new password using a reset token, consuming the token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the new password is invalid.
    /// Returns `AuthError::InvalidResetToken` if the user/token pair is not valid.
    pub async fn complete_password_reset(
        &self,
        user_id: UserId,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;
        let password_hash = hash_password(new_password)?;

        self.users
            .reset_password(user_id, token, &password_hash, Utc::now())
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::InvalidResetToken,
                other => AuthError::Repository(other),
            })
    }
}

/// Validate password meets requirements: at least five characters, letters
/// and digits only.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` describing the first failed rule.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH
        || !password.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(AuthError::WeakPassword(format!(
            "Please enter a password with only numbers and text and at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Generate a URL-safe reset token from 32 random bytes.
fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password() {
        assert!(validate_password("abc12").is_ok());
        assert!(validate_password("Secret99").is_ok());
        assert!(matches!(
            validate_password("ab1"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            validate_password("has space1"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            validate_password("symbols!!"),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("tester123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("tester123", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong123", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_against_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("tester123", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_reset_tokens_are_url_safe_and_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }
}

//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! bazaar-cli user create -e owner@example.com -p hunter22
//! ```

use thiserror::Error;

use bazaar_core::Email;
use bazaar_storefront::db;
use bazaar_storefront::services::{AuthError, AuthService};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Missing environment variable: STOREFRONT_DATABASE_URL")]
    MissingDatabaseUrl,

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create a new user with an empty cart.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns an error if the email is invalid or taken, or the password is
/// too weak.
pub async fn create(email: &str, password: &str) -> Result<i32, UserError> {
    let email = Email::parse(email).map_err(|_| UserError::InvalidEmail(email.to_owned()))?;
    let database_url = super::database_url().ok_or(UserError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to storefront database...");
    let pool = db::create_pool(&database_url).await?;

    let user = AuthService::new(&pool)
        .register_with_password(&email, password)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "User created");
    Ok(user.id.as_i32())
}

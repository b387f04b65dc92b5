//! User domain types.

use chrono::{DateTime, Utc};

use bazaar_core::{Cart, Email, UserId};

/// A storefront user.
///
/// The password hash and reset token never leave the repository layer.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Normalized email address.
    pub email: Email,
    /// The user's cart, stored on the user record.
    pub cart: Cart,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

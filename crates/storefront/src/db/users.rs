//! User repository for database operations.
//!
//! Users carry their cart as a JSONB document (`{"items": [...]}`), so cart
//! reads and writes go through this repository as well.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use bazaar_core::{Cart, Email, ProductId, UserId};

use super::RepositoryError;
use crate::models::User;

/// Row shape shared by every user query.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    cart: Json<Cart>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            email,
            cart: row.cart.0,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserWithPasswordRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, cart, created_at
            FROM storefront.user
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, cart, created_at
            FROM storefront.user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Create a new user with an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_with_password(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO storefront.user (email, password_hash, cart)
            VALUES ($1, $2, $3)
            RETURNING id, email, cart, created_at
            ",
        )
        .bind(email)
        .bind(password_hash)
        .bind(Json(Cart::new()))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "email"))?;

        User::try_from(row)
    }

    /// Get a user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithPasswordRow>(
            r"
            SELECT id, email, cart, created_at, password_hash
            FROM storefront.user
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some((User::try_from(row.user)?, row.password_hash)))
    }

    /// Replace a user's cart document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user no longer exists.
    pub async fn save_cart(&self, id: UserId, cart: &Cart) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.user
            SET cart = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(Json(cart))
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a product from every cart that references it.
    ///
    /// Returns the number of carts changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn remove_product_from_carts(
        &self,
        product_id: ProductId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.user
            SET cart = jsonb_set(
                    cart,
                    '{items}',
                    COALESCE(
                        (SELECT jsonb_agg(item)
                         FROM jsonb_array_elements(cart->'items') AS item
                         WHERE (item->>'product_id')::int <> $1),
                        '[]'::jsonb
                    )
                ),
                updated_at = NOW()
            WHERE cart->'items' @> jsonb_build_array(jsonb_build_object('product_id', $1::int))
            ",
        )
        .bind(product_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Store a password reset token for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE storefront.user
            SET reset_token = $2, reset_token_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(token)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Find the user holding an unexpired reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, cart, created_at
            FROM storefront.user
            WHERE reset_token = $1 AND reset_token_expires_at > $2
            ",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Set a new password hash and clear any pending reset token, but only if
    /// `token` is still the user's unexpired reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user/token pair is not valid.
    pub async fn reset_password(
        &self,
        id: UserId,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.user
            SET password_hash = $3,
                reset_token = NULL,
                reset_token_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND reset_token = $2 AND reset_token_expires_at > $4
            ",
        )
        .bind(id)
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support::{create_product, create_user, test_pool};

    #[tokio::test]
    #[ignore = "Requires PostgreSQL database"]
    async fn test_remove_product_from_carts() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);
        let owner = create_user(&pool).await;
        let doomed = create_product(&pool, &owner, "4.00").await;
        let kept = create_product(&pool, &owner, "6.00").await;

        let shopper = create_user(&pool).await;
        let mut cart = Cart::new();
        cart.add(doomed.id);
        cart.add(doomed.id);
        cart.add(kept.id);
        repo.save_cart(shopper.id, &cart).await.unwrap();

        let only_doomed = create_user(&pool).await;
        let mut cart = Cart::new();
        cart.add(doomed.id);
        repo.save_cart(only_doomed.id, &cart).await.unwrap();

        let bystander = create_user(&pool).await;
        let mut cart = Cart::new();
        cart.add(kept.id);
        repo.save_cart(bystander.id, &cart).await.unwrap();

        let changed = repo.remove_product_from_carts(doomed.id).await.unwrap();
        assert_eq!(changed, 2);

        let shopper = repo.get_by_id(shopper.id).await.unwrap().unwrap();
        assert!(!shopper.cart.contains(doomed.id));
        assert_eq!(shopper.cart.quantity_of(kept.id), 1);

        let only_doomed = repo.get_by_id(only_doomed.id).await.unwrap().unwrap();
        assert!(only_doomed.cart.is_empty());

        let bystander = repo.get_by_id(bystander.id).await.unwrap().unwrap();
        assert_eq!(bystander.cart.quantity_of(kept.id), 1);

        assert_eq!(repo.remove_product_from_carts(doomed.id).await.unwrap(), 0);
    }
}

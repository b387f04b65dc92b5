//! Order repository.
//!
//! Orders are insert-only. Line items are stored as a JSONB array of
//! `{quantity, product}` snapshots.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use bazaar_core::{Email, OrderId, OrderLine, UserId};

use super::RepositoryError;
use crate::models::Order;

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    user_email: String,
    items: Json<Vec<OrderLine>>,
    checkout_session_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let user_email = Email::parse(&row.user_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email on order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            user_email,
            lines: row.items.0,
            checkout_session_id: row.checkout_session_id,
            created_at: row.created_at,
        })
    }
}

/// Repository for placed orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if an order already exists for the
    /// checkout session.
    pub async fn create(
        &self,
        user_id: UserId,
        user_email: &Email,
        lines: &[OrderLine],
        checkout_session_id: Option<&str>,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO storefront."order" (user_id, user_email, items, checkout_session_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, user_email, items, checkout_session_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(user_email)
        .bind(Json(lines))
        .bind(checkout_session_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "order for checkout session"))?;

        Order::try_from(row)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, user_email, items, checkout_session_id, created_at
            FROM storefront."order"
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Get the order created for a checkout session, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_checkout_session(
        &self,
        checkout_session_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, user_email, items, checkout_session_id, created_at
            FROM storefront."order"
            WHERE checkout_session_id = $1
            "#,
        )
        .bind(checkout_session_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, user_email, items, checkout_session_id, created_at
            FROM storefront."order"
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }
}

//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::{ProductId, UserId};

use super::RepositoryError;
use crate::models::Product;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    title: String,
    description: String,
    price: Decimal,
    image_path: String,
    user_id: UserId,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
            image_path: row.image_path,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

/// Fields written when creating or editing a product.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub title: String,
    pub description: String,
    pub price: Decimal,
}

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Total number of products in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM storefront.product")
            .fetch_one(self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// One page of the catalog, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, title, description, price, image_path, user_id, created_at
            FROM storefront.product
            ORDER BY id ASC
            OFFSET $1 LIMIT $2
            ",
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Products created by one admin user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, title, description, price, image_path, user_id, created_at
            FROM storefront.product
            WHERE user_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(owner)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, title, description, price, image_path, user_id, created_at
            FROM storefront.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Get every product in `ids` that still exists. Order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw_ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, title, description, price, image_path, user_id, created_at
            FROM storefront.product
            WHERE id = ANY($1)
            ",
        )
        .bind(raw_ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Insert a new product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        owner: UserId,
        input: &ProductInput,
        image_path: &str,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO storefront.product (title, description, price, image_path, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, description, price, image_path, user_id, created_at
            ",
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.price)
        .bind(image_path)
        .bind(owner)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "product"))?;

        Ok(row.into())
    }

    /// Update a product's fields, and its image when `image_path` is given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
        image_path: Option<&str>,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE storefront.product
            SET title = $2,
                description = $3,
                price = $4,
                image_path = COALESCE($5, image_path),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, description, price, image_path, user_id, created_at
            ",
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.price)
        .bind(image_path)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a product owned by `owner`, returning the deleted record.
    ///
    /// Returns `None` if no such product exists for that owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_owned(
        &self,
        id: ProductId,
        owner: UserId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            DELETE FROM storefront.product
            WHERE id = $1 AND user_id = $2
            RETURNING id, title, description, price, image_path, user_id, created_at
            ",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }
}

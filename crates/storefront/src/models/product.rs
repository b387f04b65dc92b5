//! Product domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bazaar_core::{ProductId, ProductSnapshot, UserId};

/// A catalog product.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    /// Stored image file name, served under `/images/`.
    pub image_path: String,
    /// The admin user who created the product.
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Public URL of the product image.
    #[must_use]
    pub fn image_url(&self) -> String {
        format!("/images/{}", self.image_path)
    }

    /// Frozen copy of this product for an order.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            price: self.price,
            image_path: self.image_path.clone(),
        }
    }
}

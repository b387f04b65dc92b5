//! Shopping cart embedded on a user record.
//!
//! A cart is an ordered list of product references with quantities. Each
//! product appears at most once; adding it again bumps the quantity.

use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// A single cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A user's cart.
///
/// Serialized as `{"items": [{"product_id": 1, "quantity": 2}]}`, which is
/// the shape stored in the `cart` JSONB column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add one unit of a product.
    ///
    /// Increments the existing line if the product is already in the cart,
    /// otherwise appends a new line with quantity 1.
    pub fn add(&mut self, product_id: ProductId) {
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        {
            item.quantity = item.quantity.saturating_add(1);
        } else {
            self.items.push(CartItem {
                product_id,
                quantity: 1,
            });
        }
    }

    /// Remove a product's line entirely. Returns `true` if a line was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|item| item.product_id == product_id)
    }

    /// Quantity of a product, zero if absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|item| item.product_id == product_id)
            .map_or(0, |item| item.quantity)
    }

    /// Total units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Product ids in cart order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|item| item.product_id).collect()
    }

    /// Drop lines whose product no longer exists or whose quantity is zero.
    ///
    /// Returns `true` if anything was dropped.
    pub fn retain_known(&mut self, known: &[ProductId]) -> bool {
        let before = self.items.len();
        self.items
            .retain(|item| item.quantity > 0 && known.contains(&item.product_id));
        self.items.len() != before
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const A: ProductId = ProductId::new(1);
    const B: ProductId = ProductId::new(2);

    #[test]
    fn test_add_same_product_twice_increments_quantity() {
        let mut cart = Cart::new();
        cart.add(A);
        cart.add(A);

        assert_eq!(
            cart.items(),
            &[CartItem {
                product_id: A,
                quantity: 2
            }]
        );
    }

    #[test]
    fn test_add_keeps_insertion_order() {
        let mut cart = Cart::new();
        cart.add(B);
        cart.add(A);
        cart.add(B);

        assert_eq!(cart.product_ids(), vec![B, A]);
        assert_eq!(cart.quantity_of(B), 2);
        assert_eq!(cart.total_quantity(), 3);
    }

    #[test]
    fn test_remove() {
        let mut cart = Cart::new();
        cart.add(A);
        cart.add(B);

        assert!(cart.remove(A));
        assert!(!cart.contains(A));
        assert!(cart.contains(B));
        assert!(!cart.remove(A));
    }

    #[test]
    fn test_clear_empties_any_cart() {
        let mut cart = Cart::new();
        for _ in 0..5 {
            cart.add(A);
        }
        cart.add(B);

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_quantity(), 0);
    }

    #[test]
    fn test_retain_known_drops_deleted_products() {
        let mut cart = Cart::new();
        cart.add(A);
        cart.add(B);

        assert!(cart.retain_known(&[B]));
        assert_eq!(cart.product_ids(), vec![B]);
        assert!(!cart.retain_known(&[B]));
    }

    #[test]
    fn test_json_shape() {
        let mut cart = Cart::new();
        cart.add(A);

        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"items": [{"product_id": 1, "quantity": 1}]})
        );

        let empty: Cart = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}

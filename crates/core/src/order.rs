//! Order line snapshots and totals.
//!
//! An order stores a frozen copy of each product as it was at checkout. Totals
//! are always computed from those copies, never from the live catalog.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::types::ProductId;

/// Product fields copied into an order at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub image_path: String,
}

/// One line of an order (or of a priced cart).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub quantity: u32,
    pub product: ProductSnapshot,
}

impl OrderLine {
    /// `quantity * unit price`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

/// Sum of all line totals.
#[must_use]
pub fn order_total(lines: &[OrderLine]) -> Decimal {
    lines.iter().map(OrderLine::line_total).sum()
}

/// Join a cart with the products it references.
///
/// Lines keep cart order. Cart entries whose product is missing from
/// `products` (deleted since it was added) are skipped.
#[must_use]
pub fn price_cart(cart: &Cart, products: &[ProductSnapshot]) -> Vec<OrderLine> {
    cart.items()
        .iter()
        .filter_map(|item| {
            products
                .iter()
                .find(|p| p.id == item.product_id)
                .map(|product| OrderLine {
                    quantity: item.quantity,
                    product: product.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot(id: i32, price: &str) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            title: format!("Product {id}"),
            description: "A fine thing".to_owned(),
            price: price.parse().unwrap(),
            image_path: format!("images/{id}.png"),
        }
    }

    #[test]
    fn test_add_twice_then_checkout_totals_double_price() {
        let a = snapshot(1, "12.50");
        let mut cart = Cart::new();
        cart.add(a.id);
        cart.add(a.id);

        let lines = price_cart(&cart, std::slice::from_ref(&a));
        assert_eq!(lines.len(), 1);
        assert_eq!(order_total(&lines), "25.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_total_ignores_later_price_changes() {
        let mut product = snapshot(1, "10.00");
        let mut cart = Cart::new();
        cart.add(product.id);
        cart.add(product.id);
        cart.add(product.id);

        let lines = price_cart(&cart, std::slice::from_ref(&product));
        product.price = "99.99".parse().unwrap();

        assert_eq!(order_total(&lines), "30.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_price_cart_skips_missing_products() {
        let a = snapshot(1, "1.00");
        let mut cart = Cart::new();
        cart.add(ProductId::new(2));
        cart.add(a.id);

        let lines = price_cart(&cart, &[a]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product.id, ProductId::new(1));
    }

    #[test]
    fn test_empty_order_total_is_zero() {
        assert_eq!(order_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_line_json_roundtrip_keeps_price_exact() {
        let line = OrderLine {
            quantity: 2,
            product: snapshot(3, "0.10"),
        };
        let json = serde_json::to_string(&line).unwrap();
        let back: OrderLine = serde_json::from_str(&json).unwrap();
        assert_eq!(back.line_total(), "0.20".parse::<Decimal>().unwrap());
    }
}

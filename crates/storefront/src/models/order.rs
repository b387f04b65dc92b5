//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bazaar_core::{Email, OrderId, OrderLine, UserId, order_total};

/// A placed order.
///
/// Created once from a paid checkout and never modified afterwards.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub user_email: Email,
    pub lines: Vec<OrderLine>,
    /// Payment provider checkout session that paid for this order.
    pub checkout_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Total computed from the frozen line snapshots.
    #[must_use]
    pub fn total(&self) -> Decimal {
        order_total(&self.lines)
    }

    /// Only the purchaser may see an order's invoice.
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bazaar_core::{ProductId, ProductSnapshot};

    fn order() -> Order {
        Order {
            id: OrderId::new(1),
            user_id: UserId::new(7),
            user_email: Email::parse("buyer@example.com").unwrap(),
            lines: vec![OrderLine {
                quantity: 2,
                product: ProductSnapshot {
                    id: ProductId::new(3),
                    title: "Lamp".to_owned(),
                    description: "A bright lamp".to_owned(),
                    price: "19.99".parse().unwrap(),
                    image_path: "lamp.png".to_owned(),
                },
            }],
            checkout_session_id: Some("cs_test_1".to_owned()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_total_from_snapshots() {
        assert_eq!(order().total(), "39.98".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_ownership() {
        let order = order();
        assert!(order.is_owned_by(UserId::new(7)));
        assert!(!order.is_owned_by(UserId::new(8)));
    }
}

//! Stripe request and response types.

use serde::Deserialize;

/// One line of a checkout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    pub description: String,
    /// Unit price in minor currency units.
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Parameters for a new hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Lowercase ISO currency code.
    pub currency: &'static str,
    pub line_items: Vec<CheckoutLineItem>,
    pub customer_email: String,
    /// Our user ID, echoed back on the session.
    pub client_reference_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Encode as Stripe's bracketed form parameters.
    #[must_use]
    pub fn to_form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_owned(), "payment".to_owned()),
            ("payment_method_types[0]".to_owned(), "card".to_owned()),
            ("customer_email".to_owned(), self.customer_email.clone()),
            (
                "client_reference_id".to_owned(),
                self.client_reference_id.clone(),
            ),
            ("success_url".to_owned(), self.success_url.clone()),
            ("cancel_url".to_owned(), self.cancel_url.clone()),
        ];

        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            params.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
            params.push((
                format!("{prefix}[price_data][currency]"),
                self.currency.to_owned(),
            ));
            params.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            params.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ));
            if !item.description.is_empty() {
                params.push((
                    format!("{prefix}[price_data][product_data][description]"),
                    item.description.clone(),
                ));
            }
        }

        params
    }
}

/// Payment state of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    #[serde(other)]
    Unknown,
}

/// The subset of a Stripe checkout session we read.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page. Absent once the session is complete.
    pub url: Option<String>,
    pub payment_status: PaymentStatus,
    pub client_reference_id: Option<String>,
    pub amount_total: Option<i64>,
}

impl CheckoutSession {
    #[must_use]
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status,
            PaymentStatus::Paid | PaymentStatus::NoPaymentRequired
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            currency: "usd",
            line_items: vec![
                CheckoutLineItem {
                    name: "Lamp".to_owned(),
                    description: "A bright lamp".to_owned(),
                    unit_amount: 1999,
                    quantity: 2,
                },
                CheckoutLineItem {
                    name: "Rug".to_owned(),
                    description: String::new(),
                    unit_amount: 5000,
                    quantity: 1,
                },
            ],
            customer_email: "buyer@example.com".to_owned(),
            client_reference_id: "7".to_owned(),
            success_url: "http://localhost:3000/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                .to_owned(),
            cancel_url: "http://localhost:3000/checkout/cancel".to_owned(),
        }
    }

    fn value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_form_params_encode_line_items() {
        let params = request().to_form_params();

        assert_eq!(value(&params, "mode"), Some("payment"));
        assert_eq!(value(&params, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            value(&params, "line_items[0][price_data][unit_amount]"),
            Some("1999")
        );
        assert_eq!(
            value(&params, "line_items[1][price_data][currency]"),
            Some("usd")
        );
        assert_eq!(
            value(&params, "line_items[0][price_data][product_data][name]"),
            Some("Lamp")
        );
        assert_eq!(value(&params, "client_reference_id"), Some("7"));
    }

    #[test]
    fn test_empty_description_is_omitted() {
        let params = request().to_form_params();
        assert!(value(&params, "line_items[1][price_data][product_data][description]").is_none());
        assert!(value(&params, "line_items[0][price_data][product_data][description]").is_some());
    }

    #[test]
    fn test_parse_session() {
        let json = r#"{
            "id": "cs_test_123",
            "object": "checkout.session",
            "url": null,
            "payment_status": "paid",
            "client_reference_id": "7",
            "amount_total": 8998
        }"#;
        let session: CheckoutSession = serde_json::from_str(json).unwrap();
        assert!(session.is_paid());
        assert_eq!(session.client_reference_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_unknown_payment_status_is_not_paid() {
        let json = r#"{"id": "cs_1", "payment_status": "processing"}"#;
        let session: CheckoutSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.payment_status, PaymentStatus::Unknown);
        assert!(!session.is_paid());
    }
}

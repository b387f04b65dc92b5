//! Cart pricing and the checkout-to-order flow.
//!
//! A cart is priced against the live catalog; once the payment provider
//! reports a paid session the priced lines are frozen into an order and the
//! cart is emptied.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use bazaar_core::{Cart, CurrencyCode, OrderLine, Price, UserId, order_total, price_cart};

use crate::config::StorefrontConfig;
use crate::db::{OrderRepository, ProductRepository, RepositoryError, UserRepository};
use crate::models::{Order, User};
use crate::stripe::{
    CheckoutLineItem, CheckoutRequest, CheckoutSession, PaymentError, StripeClient,
};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// The provider has not confirmed payment for this session.
    #[error("checkout session {0} is not paid")]
    NotPaid(String),

    /// The session was opened for a different account, or for none.
    #[error("checkout session {0} belongs to another user")]
    WrongCustomer(String),

    /// The amount paid does not match the cart being ordered.
    #[error("checkout session {session} paid {paid:?}, cart totals {expected}")]
    AmountMismatch {
        session: String,
        expected: i64,
        paid: Option<i64>,
    },
}

/// Result of handling a success redirect.
#[derive(Debug)]
pub enum CheckoutOutcome {
    /// A new order was created and the cart cleared.
    Placed(Order),
    /// An order for this session already exists.
    AlreadyPlaced,
    /// Nothing left in the cart to order.
    EmptyCart,
}

/// Cart pricing and order placement for one request.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    config: &'a StorefrontConfig,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        stripe: &'a StripeClient,
        config: &'a StorefrontConfig,
    ) -> Self {
        Self {
            pool,
            stripe,
            config,
        }
    }

    /// Price a user's cart against the current catalog.
    ///
    /// Entries for products that no longer exist are dropped from the stored
    /// cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if loading products or saving the cart fails.
    pub async fn priced_cart(&self, user: &User) -> Result<Vec<OrderLine>, RepositoryError> {
        let products = ProductRepository::new(self.pool)
            .get_many(&user.cart.product_ids())
            .await?;
        let snapshots: Vec<_> = products.iter().map(|p| p.snapshot()).collect();

        let mut cart: Cart = user.cart.clone();
        let known: Vec<_> = snapshots.iter().map(|s| s.id).collect();
        if cart.retain_known(&known) {
            tracing::info!(user_id = %user.id, "Dropped deleted products from cart");
            UserRepository::new(self.pool).save_cart(user.id, &cart).await?;
        }

        Ok(price_cart(&cart, &snapshots))
    }

    /// Open a hosted checkout session for priced cart lines.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if an amount cannot be converted or the provider
    /// rejects the request.
    #[instrument(skip(self, user, lines), fields(user_id = %user.id))]
    pub async fn start(
        &self,
        user: &User,
        lines: &[OrderLine],
    ) -> Result<CheckoutSession, PaymentError> {
        let request = checkout_request(self.config, user, lines)?;
        let session = self.stripe.create_checkout_session(&request).await?;
        if session.url.is_none() {
            return Err(PaymentError::MissingUrl(session.id));
        }
        Ok(session)
    }

    /// Turn a paid checkout session into an order.
    ///
    /// Safe to call more than once for the same session: only the first call
    /// creates an order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotPaid`, `CheckoutError::WrongCustomer` or
    /// `CheckoutError::AmountMismatch` if the provider's record does not match
    /// the user and cart, or a payment/database error.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn complete(
        &self,
        user: &User,
        session_id: &str,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let orders = OrderRepository::new(self.pool);
        if orders.get_by_checkout_session(session_id).await?.is_some() {
            return Ok(CheckoutOutcome::AlreadyPlaced);
        }

        let session = self.stripe.retrieve_checkout_session(session_id).await?;
        verify_session(&session, user.id)?;

        let lines = self.priced_cart(user).await?;
        if lines.is_empty() {
            return Ok(CheckoutOutcome::EmptyCart);
        }
        verify_amount(&session, &lines, self.config.currency)?;

        let order = match orders
            .create(user.id, &user.email, &lines, Some(&session.id))
            .await
        {
            Ok(order) => order,
            Err(RepositoryError::Conflict(_)) => return Ok(CheckoutOutcome::AlreadyPlaced),
            Err(e) => return Err(e.into()),
        };

        let mut cart = user.cart.clone();
        cart.clear();
        UserRepository::new(self.pool).save_cart(user.id, &cart).await?;

        tracing::info!(order_id = %order.id, total = %order.total(), "Order placed");
        Ok(CheckoutOutcome::Placed(order))
    }
}

/// Check that a session is paid and was opened by `user_id`.
///
/// # Errors
///
/// Returns `CheckoutError::NotPaid` or `CheckoutError::WrongCustomer`.
pub fn verify_session(session: &CheckoutSession, user_id: UserId) -> Result<(), CheckoutError> {
    if !session.is_paid() {
        return Err(CheckoutError::NotPaid(session.id.clone()));
    }
    let reference = user_id.to_string();
    if session.client_reference_id.as_deref() != Some(reference.as_str()) {
        return Err(CheckoutError::WrongCustomer(session.id.clone()));
    }
    Ok(())
}

/// Check that the session's amount equals the total of `lines`.
///
/// The cart can change after the session is opened, so the order is
/// checked against what was actually paid.
///
/// # Errors
///
/// Returns `CheckoutError::AmountMismatch` when the totals differ or the
/// provider reported none.
pub fn verify_amount(
    session: &CheckoutSession,
    lines: &[OrderLine],
    currency: CurrencyCode,
) -> Result<(), CheckoutError> {
    let expected = Price::new(order_total(lines), currency)
        .minor_units()
        .ok_or_else(|| PaymentError::InvalidAmount("order total".to_owned()))?;
    if session.amount_total != Some(expected) {
        return Err(CheckoutError::AmountMismatch {
            session: session.id.clone(),
            expected,
            paid: session.amount_total,
        });
    }
    Ok(())
}

/// Build the provider request for a user's priced cart.
///
/// # Errors
///
/// Returns `PaymentError::InvalidAmount` if a unit price does not fit in
/// minor units.
pub fn checkout_request(
    config: &StorefrontConfig,
    user: &User,
    lines: &[OrderLine],
) -> Result<CheckoutRequest, PaymentError> {
    let line_items = lines
        .iter()
        .map(|line| {
            let unit_amount = Price::new(line.product.price, config.currency)
                .minor_units()
                .ok_or_else(|| PaymentError::InvalidAmount(line.product.title.clone()))?;
            Ok(CheckoutLineItem {
                name: line.product.title.clone(),
                description: line.product.description.clone(),
                unit_amount,
                quantity: line.quantity,
            })
        })
        .collect::<Result<Vec<_>, PaymentError>>()?;

    Ok(CheckoutRequest {
        currency: config.currency.as_str(),
        line_items,
        customer_email: user.email.to_string(),
        client_reference_id: user.id.to_string(),
        success_url: config.url_for("/checkout/success?session_id={CHECKOUT_SESSION_ID}"),
        cancel_url: config.url_for("/checkout/cancel"),
    })
}

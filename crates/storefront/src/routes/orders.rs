//! Order history and invoice downloads.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use tracing::instrument;

use bazaar_core::{CurrencyCode, OrderId};

use super::{PageContext, format_money};
use crate::db::OrderRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::services::invoice::{invoice_file_name, invoice_lines, render_pdf};
use crate::state::AppState;

/// One order line for templates.
#[derive(Clone)]
pub struct OrderLineView {
    pub title: String,
    pub quantity: u32,
    pub price: String,
}

/// Order display data for templates.
#[derive(Clone)]
pub struct OrderView {
    pub id: OrderId,
    pub placed_at: String,
    pub lines: Vec<OrderLineView>,
    pub total: String,
}

impl OrderView {
    #[must_use]
    pub fn new(order: &Order, currency: CurrencyCode) -> Self {
        Self {
            id: order.id,
            placed_at: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
            lines: order
                .lines
                .iter()
                .map(|line| OrderLineView {
                    title: line.product.title.clone(),
                    quantity: line.quantity,
                    price: format_money(line.product.price, currency),
                })
                .collect(),
            total: format_money(order.total(), currency),
        }
    }
}

/// Order history page.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersTemplate {
    pub ctx: PageContext,
    pub orders: Vec<OrderView>,
}

/// List the current user's orders, newest first.
#[instrument(skip(state, ctx, current), fields(user_id = %current.id))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(current): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let orders = OrderRepository::new(state.pool())
        .list_by_user(current.id)
        .await?;

    let currency = state.config().currency;
    Ok(OrdersTemplate {
        ctx,
        orders: orders.iter().map(|o| OrderView::new(o, currency)).collect(),
    })
}

/// Generate an order's PDF invoice, keep a copy on disk and send it.
///
/// Only the purchaser may download it.
#[instrument(skip(state, current), fields(user_id = %current.id))]
pub async fn invoice(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let not_found = || AppError::NotFound(format!("order {id}"));
    let order_id: OrderId = id.parse().map_err(|_| not_found())?;

    let order = OrderRepository::new(state.pool())
        .get(order_id)
        .await?
        .ok_or_else(not_found)?;

    if !order.is_owned_by(current.id) {
        tracing::warn!(order_id = %order.id, "Invoice requested by another user");
        return Err(AppError::Forbidden(format!("order {order_id}")));
    }

    let pdf = render_pdf(&invoice_lines(&order, state.config().currency))?;

    if let Err(e) = state.invoices().write(order.id, &pdf).await {
        tracing::warn!(order_id = %order.id, error = %e, "Failed to store invoice");
    }

    let disposition = format!("attachment; filename=\"{}\"", invoice_file_name(order.id));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    ))
}

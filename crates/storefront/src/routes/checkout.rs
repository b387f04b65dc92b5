//! Checkout route handlers.
//!
//! `GET /checkout` opens a hosted payment session for the current cart. The
//! provider sends the browser back to `/checkout/success` (which places the
//! order) or `/checkout/cancel`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use super::cart::CartView;
use super::{PageContext, load_user};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::services::{CheckoutOutcome, CheckoutService};
use crate::state::AppState;

/// Checkout summary page.
#[derive(Template, WebTemplate)]
#[template(path = "checkout.html")]
pub struct CheckoutTemplate {
    pub ctx: PageContext,
    pub cart: CartView,
    pub payment_url: String,
    pub cancelled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

async fn render_checkout(
    state: &AppState,
    ctx: PageContext,
    current: &crate::models::CurrentUser,
    cancelled: bool,
) -> Result<Response, AppError> {
    let user = load_user(state, current).await?;
    let service = CheckoutService::new(state.pool(), state.stripe(), state.config());

    let lines = service.priced_cart(&user).await?;
    if lines.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let session = service.start(&user, &lines).await?;
    let payment_url = session.url.unwrap_or_default();

    Ok(CheckoutTemplate {
        ctx,
        cart: CartView::new(&lines, state.config().currency),
        payment_url,
        cancelled,
    }
    .into_response())
}

/// Show the order summary with a link to the hosted payment page.
#[instrument(skip(state, ctx, current), fields(user_id = %current.id))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(current): RequireAuth,
) -> Result<Response, AppError> {
    render_checkout(&state, ctx, &current, false).await
}

/// The customer backed out of payment; show the summary again.
#[instrument(skip(state, ctx, current), fields(user_id = %current.id))]
pub async fn cancel(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(current): RequireAuth,
) -> Result<Response, AppError> {
    render_checkout(&state, ctx, &current, true).await
}

/// Payment succeeded: turn the cart into an order.
#[instrument(skip(state, current, query), fields(user_id = %current.id))]
pub async fn success(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Query(query): Query<SuccessQuery>,
) -> Result<Redirect, AppError> {
    let session_id = query
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("missing checkout session".to_string()))?;

    let user = load_user(&state, &current).await?;
    let outcome = CheckoutService::new(state.pool(), state.stripe(), state.config())
        .complete(&user, &session_id)
        .await?;

    Ok(match outcome {
        CheckoutOutcome::Placed(_) | CheckoutOutcome::AlreadyPlaced => Redirect::to("/orders"),
        CheckoutOutcome::EmptyCart => Redirect::to("/cart"),
    })
}

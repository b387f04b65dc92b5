//! Cart route handlers.
//!
//! The cart lives on the user row. Every change rewrites the whole cart
//! document before redirecting back to `/cart`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::{CurrencyCode, OrderLine, ProductId, order_total};

use super::{PageContext, format_money, load_user};
use crate::db::{ProductRepository, UserRepository};
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::{RequireAuth, verify_csrf};
use crate::services::CheckoutService;
use crate::state::AppState;

/// One cart line for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub title: String,
    pub image_url: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total: String,
    pub item_count: u32,
}

impl CartView {
    #[must_use]
    pub fn new(lines: &[OrderLine], currency: CurrencyCode) -> Self {
        Self {
            items: lines
                .iter()
                .map(|line| CartItemView {
                    product_id: line.product.id,
                    title: line.product.title.clone(),
                    image_url: format!("/images/{}", line.product.image_path),
                    quantity: line.quantity,
                    price: format_money(line.product.price, currency),
                    line_price: format_money(line.line_total(), currency),
                })
                .collect(),
            total: format_money(order_total(lines), currency),
            item_count: lines.iter().map(|l| l.quantity).sum(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Form posted by "Add to Cart" and "Delete" buttons.
#[derive(Debug, Deserialize)]
pub struct CartItemForm {
    #[serde(rename = "productId")]
    pub product_id: String,
    #[serde(rename = "_csrf")]
    pub csrf: Option<String>,
}

impl CartItemForm {
    fn product_id(&self) -> Result<ProductId, AppError> {
        self.product_id
            .parse()
            .map_err(|_| AppError::NotFound(format!("product {}", self.product_id)))
    }
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart.html")]
pub struct CartTemplate {
    pub ctx: PageContext,
    pub cart: CartView,
}

/// Display the cart with current product details.
#[instrument(skip(state, ctx, current), fields(user_id = %current.id))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(current): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let user = load_user(&state, &current).await?;
    let lines = CheckoutService::new(state.pool(), state.stripe(), state.config())
        .priced_cart(&user)
        .await?;

    Ok(CartTemplate {
        ctx,
        cart: CartView::new(&lines, state.config().currency),
    })
}

/// Add one unit of a product to the cart.
#[instrument(skip(state, session, current), fields(user_id = %current.id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
    Form(form): Form<CartItemForm>,
) -> Result<Redirect, AppError> {
    verify_csrf(&session, form.csrf.as_deref()).await?;
    let product_id = form.product_id()?;

    if ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("product {product_id}")));
    }

    let mut user = load_user(&state, &current).await?;
    user.cart.add(product_id);
    UserRepository::new(state.pool())
        .save_cart(user.id, &user.cart)
        .await?;

    let id = product_id.to_string();
    add_breadcrumb("cart", "Added product", Some(&[("product_id", id.as_str())]));
    tracing::info!(product_id = %product_id, quantity = user.cart.quantity_of(product_id), "Added to cart");
    Ok(Redirect::to("/cart"))
}

/// Remove a product line from the cart.
#[instrument(skip(state, session, current), fields(user_id = %current.id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
    Form(form): Form<CartItemForm>,
) -> Result<Redirect, AppError> {
    verify_csrf(&session, form.csrf.as_deref()).await?;
    let product_id = form.product_id()?;

    let mut user = load_user(&state, &current).await?;
    if user.cart.remove(product_id) {
        UserRepository::new(state.pool())
            .save_cart(user.id, &user.cart)
            .await?;
    }

    Ok(Redirect::to("/cart"))
}

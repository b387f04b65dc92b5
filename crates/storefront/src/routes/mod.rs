//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Shop
//! GET    /                          - Catalog (paginated)
//! GET    /products                  - Catalog (paginated)
//! GET    /products/{id}             - Product detail
//!
//! # Cart (requires auth)
//! GET    /cart                      - Cart page
//! POST   /cart                      - Add product (productId)
//! POST   /cart-delete-item          - Remove product (productId)
//!
//! # Checkout and orders (requires auth)
//! GET    /checkout                  - Summary with payment link
//! GET    /checkout/success          - Payment provider success redirect
//! GET    /checkout/cancel           - Payment provider cancel redirect
//! GET    /orders                    - Order history
//! GET    /orders/{id}               - Invoice PDF
//!
//! # Admin (requires auth)
//! GET    /admin/add-product         - New product form
//! POST   /admin/add-product         - Create product (multipart)
//! GET    /admin/products            - Current user's products
//! GET    /admin/edit-product/{id}   - Edit form (?edit=true)
//! POST   /admin/edit-product        - Update product (multipart)
//! DELETE /admin/products/{id}       - Delete product (JSON)
//!
//! # Auth
//! GET    /login, POST /login
//! GET    /signup, POST /signup
//! POST   /logout
//! GET    /reset, POST /reset
//! GET    /reset/{token}
//! POST   /set-password
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::Response,
    routing::{delete, get, post},
};
use rust_decimal::Decimal;
use tower_sessions::Session;

use bazaar_core::{CurrencyCode, Price};

use crate::error::{AppError, render_error_page};
use crate::middleware::{auth_rate_limiter, csrf_token};
use crate::models::{CurrentUser, User, session_keys};
use crate::state::AppState;

/// Per-request data every page template needs: who is logged in and the
/// CSRF token for forms.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub current_user: Option<CurrentUser>,
    pub csrf_token: String,
}

impl PageContext {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let current_user = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await?;
        let csrf_token = csrf_token(&session).await?;

        Ok(Self {
            current_user,
            csrf_token,
        })
    }
}

/// Load the full record of the logged-in user.
///
/// A session pointing at a deleted account is treated as logged out.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if the user no longer exists.
pub async fn load_user(state: &AppState, current: &CurrentUser) -> Result<User, AppError> {
    crate::db::UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Format an amount in the storefront currency.
#[must_use]
pub fn format_money(amount: Decimal, currency: CurrencyCode) -> String {
    Price::new(amount, currency).to_string()
}

/// Unknown routes render the 404 page.
pub async fn not_found() -> Response {
    render_error_page(StatusCode::NOT_FOUND)
}

/// Create the auth routes. Form posts are rate limited.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(auth_rate_limiter())),
        )
        .route(
            "/signup",
            get(auth::signup_page).merge(post(auth::signup).layer(auth_rate_limiter())),
        )
        .route("/logout", post(auth::logout))
        .route(
            "/reset",
            get(auth::reset_page).merge(post(auth::reset).layer(auth_rate_limiter())),
        )
        .route("/reset/{token}", get(auth::new_password_page))
        .route("/set-password", post(auth::set_password))
}

/// Create the shop routes: catalog, cart, checkout and orders.
pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::home))
        .route("/products", get(products::index))
        .route("/products/{id}", get(products::show))
        .route("/cart", get(cart::show).post(cart::add))
        .route("/cart-delete-item", post(cart::remove))
        .route("/checkout", get(checkout::show))
        .route("/checkout/success", get(checkout::success))
        .route("/checkout/cancel", get(checkout::cancel))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::invoice))
}

/// Create the admin routes.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/add-product",
            get(admin::add_product_page).post(admin::add_product),
        )
        .route("/products", get(admin::products))
        .route("/products/{id}", delete(admin::delete_product))
        .route("/edit-product/{id}", get(admin::edit_product_page))
        .route("/edit-product", post(admin::edit_product))
        .layer(axum::extract::DefaultBodyLimit::max(admin::MAX_UPLOAD_BYTES))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(shop_routes())
        .merge(auth_routes())
        .nest("/admin", admin_routes())
        .fallback(not_found)
}

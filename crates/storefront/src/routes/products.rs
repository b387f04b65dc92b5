//! Catalog route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::{CurrencyCode, Pagination, ProductId};

use super::{PageContext, format_money};
use crate::db::ProductRepository;
use crate::error::AppError;
use crate::models::Product;
use crate::state::AppState;

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price: String,
    pub image_url: String,
}

impl ProductView {
    #[must_use]
    pub fn new(product: &Product, currency: CurrencyCode) -> Self {
        Self {
            id: product.id,
            title: product.title.clone(),
            description: product.description.clone(),
            price: format_money(product.price, currency),
            image_url: product.image_url(),
        }
    }
}

/// `?page=N`. Anything that is not a positive number means page 1.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1)
    }
}

/// Shop front page.
#[derive(Template, WebTemplate)]
#[template(path = "shop/index.html")]
pub struct ShopIndexTemplate {
    pub ctx: PageContext,
    pub products: Vec<ProductView>,
    pub pagination: Pagination,
}

/// Product listing page.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub ctx: PageContext,
    pub products: Vec<ProductView>,
    pub pagination: Pagination,
}

/// Product detail page.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub ctx: PageContext,
    pub product: ProductView,
}

async fn load_page(
    state: &AppState,
    query: &PageQuery,
) -> Result<(Vec<ProductView>, Pagination), AppError> {
    let repo = ProductRepository::new(state.pool());
    let total = repo.count().await?;
    let pagination = Pagination::new(query.page(), state.config().page_size, total);
    let products = repo
        .list_page(pagination.offset(), pagination.limit())
        .await?;

    let currency = state.config().currency;
    let views = products
        .iter()
        .map(|p| ProductView::new(p, currency))
        .collect();
    Ok((views, pagination))
}

/// Display the shop front page.
#[instrument(skip(state, ctx))]
pub async fn home(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (products, pagination) = load_page(&state, &query).await?;
    Ok(ShopIndexTemplate {
        ctx,
        products,
        pagination,
    })
}

/// Display the product listing page.
#[instrument(skip(state, ctx))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (products, pagination) = load_page(&state, &query).await?;
    Ok(ProductsIndexTemplate {
        ctx,
        products,
        pagination,
    })
}

/// Display a single product.
#[instrument(skip(state, ctx))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let not_found = || AppError::NotFound(format!("product {id}"));
    let product_id: ProductId = id.parse().map_err(|_| not_found())?;

    let product = ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(ProductShowTemplate {
        ctx,
        product: ProductView::new(&product, state.config().currency),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_parsing() {
        let q = |p: Option<&str>| PageQuery {
            page: p.map(str::to_owned),
        };
        assert_eq!(q(None).page(), 1);
        assert_eq!(q(Some("3")).page(), 3);
        assert_eq!(q(Some("0")).page(), 1);
        assert_eq!(q(Some("-2")).page(), 1);
        assert_eq!(q(Some("abc")).page(), 1);
    }
}

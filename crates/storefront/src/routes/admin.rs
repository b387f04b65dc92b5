//! Admin catalog handlers.
//!
//! Every route requires a logged-in user. Products belong to the user who
//! created them and only that user may edit or delete them.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::{ProductId, UserId};

use super::PageContext;
use super::products::ProductView;
use crate::db::products::ProductInput;
use crate::db::{ProductRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::csrf::header_token;
use crate::middleware::{RequireAuth, verify_csrf};
use crate::models::Product;
use crate::services::images::is_accepted_image;
use crate::services::validation::{IMAGE_MISSING, ValidationErrors, validate_product};
use crate::state::AppState;

/// Largest accepted request body on admin routes.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

// =============================================================================
// Multipart Form
// =============================================================================

/// An uploaded file part.
#[derive(Debug)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    /// A non-empty file with an accepted image type.
    fn is_image(&self) -> bool {
        !self.bytes.is_empty() && is_accepted_image(self.content_type.as_deref())
    }
}

/// Fields of the add/edit product form.
#[derive(Debug, Default)]
pub struct ProductForm {
    pub title: String,
    pub price: String,
    pub description: String,
    pub product_id: Option<String>,
    pub csrf: Option<String>,
    pub image: Option<UploadedImage>,
}

impl ProductForm {
    /// Read every part of a multipart product form.
    ///
    /// A file input left empty arrives as a part with no file name and no
    /// bytes; it is treated as no upload.
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let bad_request = |e: axum::extract::multipart::MultipartError| {
            AppError::BadRequest(format!("invalid form data: {e}"))
        };

        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if name == "image" {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await.map_err(bad_request)?;
                if !file_name.is_empty() || !bytes.is_empty() {
                    form.image = Some(UploadedImage {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let value = field.text().await.map_err(bad_request)?;
            match name.as_str() {
                "title" => form.title = value,
                "price" => form.price = value,
                "description" => form.description = value,
                "productId" => form.product_id = Some(value),
                "_csrf" => form.csrf = Some(value),
                _ => {}
            }
        }

        Ok(form)
    }

    /// Validate the image, then the text fields.
    ///
    /// On create an image is required; on edit it is optional but must be an
    /// image when present. A bad image is reported on its own.
    fn validate(&self, image_required: bool) -> Result<ProductInput, ValidationErrors> {
        let image_error = match &self.image {
            None => image_required,
            Some(image) => !image.is_image(),
        };
        if image_error {
            return Err(ValidationErrors::single("image", IMAGE_MISSING));
        }

        validate_product(&self.title, &self.price, &self.description)
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Add/edit product form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/edit_product.html")]
pub struct EditProductTemplate {
    pub ctx: PageContext,
    pub editing: bool,
    pub product_id: Option<ProductId>,
    pub title: String,
    pub price: String,
    pub description: String,
    pub error: Option<String>,
    pub invalid_title: bool,
    pub invalid_price: bool,
    pub invalid_description: bool,
}

impl EditProductTemplate {
    fn blank(ctx: PageContext) -> Self {
        Self {
            ctx,
            editing: false,
            product_id: None,
            title: String::new(),
            price: String::new(),
            description: String::new(),
            error: None,
            invalid_title: false,
            invalid_price: false,
            invalid_description: false,
        }
    }

    fn for_product(ctx: PageContext, product: &Product) -> Self {
        Self {
            editing: true,
            product_id: Some(product.id),
            title: product.title.clone(),
            price: product.price.to_string(),
            description: product.description.clone(),
            ..Self::blank(ctx)
        }
    }

    /// Re-render a rejected submission with status 422.
    fn rejected(
        ctx: PageContext,
        editing: bool,
        product_id: Option<ProductId>,
        form: &ProductForm,
        errors: &ValidationErrors,
    ) -> Response {
        let page = Self {
            ctx,
            editing,
            product_id,
            title: form.title.clone(),
            price: form.price.clone(),
            description: form.description.clone(),
            error: errors.first_message().map(str::to_owned),
            invalid_title: errors.has("title"),
            invalid_price: errors.has("price"),
            invalid_description: errors.has("description"),
        };
        (StatusCode::UNPROCESSABLE_ENTITY, page).into_response()
    }
}

/// The current user's products.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products.html")]
pub struct AdminProductsTemplate {
    pub ctx: PageContext,
    pub products: Vec<ProductView>,
}

// =============================================================================
// Create
// =============================================================================

/// Display the new product form.
pub async fn add_product_page(ctx: PageContext, RequireAuth(_): RequireAuth) -> impl IntoResponse {
    EditProductTemplate::blank(ctx)
}

/// Create a product from a multipart form with a required image.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn add_product(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    RequireAuth(current): RequireAuth,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = ProductForm::from_multipart(multipart).await?;
    verify_csrf(&session, form.csrf.as_deref()).await?;

    let input = match form.validate(true) {
        Ok(input) => input,
        Err(errors) => return Ok(EditProductTemplate::rejected(ctx, false, None, &form, &errors)),
    };
    let Some(image) = form.image.as_ref() else {
        return Err(AppError::BadRequest("missing image".to_string()));
    };

    let image_path = state
        .images()
        .save(&image.file_name, image.content_type.as_deref(), &image.bytes)
        .await?;
    let product = ProductRepository::new(state.pool())
        .create(current.id, &input, &image_path)
        .await?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok(Redirect::to("/admin/products").into_response())
}

// =============================================================================
// List
// =============================================================================

/// List the products created by the current user.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn products(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(current): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let products = ProductRepository::new(state.pool())
        .list_by_owner(current.id)
        .await?;
    let currency = state.config().currency;

    Ok(AdminProductsTemplate {
        ctx,
        products: products
            .iter()
            .map(|p| ProductView::new(p, currency))
            .collect(),
    })
}

// =============================================================================
// Edit
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct EditQuery {
    pub edit: Option<String>,
}

/// Display the edit form. Requires `?edit=true`.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn edit_product_page(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(current): RequireAuth,
    Path(id): Path<String>,
    Query(query): Query<EditQuery>,
) -> Result<Response, AppError> {
    if query.edit.as_deref() != Some("true") {
        return Ok(Redirect::to("/").into_response());
    }
    let Ok(product_id) = id.parse::<ProductId>() else {
        return Ok(Redirect::to("/").into_response());
    };

    match ProductRepository::new(state.pool()).get(product_id).await? {
        Some(product) if product.user_id == current.id => {
            Ok(EditProductTemplate::for_product(ctx, &product).into_response())
        }
        _ => Ok(Redirect::to("/").into_response()),
    }
}

/// Update a product. Replacing the image deletes the old file.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn edit_product(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    RequireAuth(current): RequireAuth,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = ProductForm::from_multipart(multipart).await?;
    verify_csrf(&session, form.csrf.as_deref()).await?;

    let Some(product_id) = form
        .product_id
        .as_deref()
        .and_then(|id| id.parse::<ProductId>().ok())
    else {
        return Ok(Redirect::to("/admin/products").into_response());
    };

    let repo = ProductRepository::new(state.pool());
    let existing = match repo.get(product_id).await? {
        Some(product) if product.user_id == current.id => product,
        _ => {
            tracing::warn!(product_id = %product_id, "Edit rejected for non-owner");
            return Ok(Redirect::to("/admin/products").into_response());
        }
    };

    let input = match form.validate(false) {
        Ok(input) => input,
        Err(errors) => {
            return Ok(EditProductTemplate::rejected(
                ctx,
                true,
                Some(product_id),
                &form,
                &errors,
            ));
        }
    };

    let new_image = match &form.image {
        Some(image) => Some(
            state
                .images()
                .save(&image.file_name, image.content_type.as_deref(), &image.bytes)
                .await?,
        ),
        None => None,
    };

    repo.update(product_id, &input, new_image.as_deref()).await?;

    if new_image.is_some()
        && let Err(e) = state.images().delete(&existing.image_path).await
    {
        tracing::warn!(error = %e, image = %existing.image_path, "Failed to delete replaced image");
    }

    tracing::info!(product_id = %product_id, "Product updated");
    Ok(Redirect::to("/admin/products").into_response())
}

// =============================================================================
// Delete
// =============================================================================

fn json_message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Delete a product, its image and every cart entry referencing it.
///
/// Called from script; the CSRF token travels in the `csrf-token` header.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn delete_product(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    RequireAuth(current): RequireAuth,
    Path(id): Path<String>,
) -> Response {
    if verify_csrf(&session, header_token(&headers)).await.is_err() {
        return json_message(StatusCode::FORBIDDEN, "Invalid CSRF token.");
    }

    let Ok(product_id) = id.parse::<ProductId>() else {
        return json_message(StatusCode::NOT_FOUND, "Product not found.");
    };

    match delete_everywhere(&state, product_id, current.id).await {
        Ok(true) => json_message(StatusCode::OK, "Succeeded!"),
        Ok(false) => json_message(StatusCode::NOT_FOUND, "Product not found."),
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(error = %e, sentry_event_id = %event_id, "Failed to delete product");
            json_message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete product!")
        }
    }
}

/// Record, then image file, then cart entries. Earlier steps are not undone
/// when a later one fails.
async fn delete_everywhere(
    state: &AppState,
    product_id: ProductId,
    owner: UserId,
) -> Result<bool, AppError> {
    let Some(product) = ProductRepository::new(state.pool())
        .delete_owned(product_id, owner)
        .await?
    else {
        return Ok(false);
    };

    state.images().delete(&product.image_path).await?;

    let carts = UserRepository::new(state.pool())
        .remove_product_from_carts(product_id)
        .await?;

    tracing::info!(product_id = %product_id, carts_updated = carts, "Product deleted");
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(title: &str, price: &str, description: &str, image: Option<&str>) -> ProductForm {
        ProductForm {
            title: title.to_owned(),
            price: price.to_owned(),
            description: description.to_owned(),
            image: image.map(|ct| UploadedImage {
                file_name: "lamp.png".to_owned(),
                content_type: Some(ct.to_owned()),
                bytes: vec![1, 2, 3],
            }),
            ..ProductForm::default()
        }
    }

    #[test]
    fn test_create_requires_image() {
        let errors = form("Lamp", "10", "A bright lamp", None)
            .validate(true)
            .unwrap_err();
        assert_eq!(errors.first_message(), Some(IMAGE_MISSING));
    }

    #[test]
    fn test_edit_image_is_optional() {
        assert!(form("Lamp", "10", "A bright lamp", None).validate(false).is_ok());
    }

    #[test]
    fn test_non_image_upload_rejected() {
        let errors = form("Lamp", "10", "A bright lamp", Some("text/plain"))
            .validate(false)
            .unwrap_err();
        assert!(errors.has("image"));
    }

    #[test]
    fn test_empty_image_rejected() {
        let mut empty = form("Lamp", "10", "A bright lamp", Some("image/png"));
        if let Some(image) = empty.image.as_mut() {
            image.bytes.clear();
        }

        let errors = empty.validate(true).unwrap_err();
        assert_eq!(errors.first_message(), Some(IMAGE_MISSING));

        let errors = empty.validate(false).unwrap_err();
        assert!(errors.has("image"));
    }

    #[test]
    fn test_image_error_reported_alone() {
        let errors = form("ab", "10", "A bright lamp", None)
            .validate(true)
            .unwrap_err();
        assert_eq!(errors.first_message(), Some(IMAGE_MISSING));
        assert!(!errors.has("title"));
    }

    #[test]
    fn test_field_errors_flagged() {
        let errors = form("ab", "-1", "A bright lamp", Some("image/jpeg"))
            .validate(true)
            .unwrap_err();
        assert!(errors.has("title"));
        assert!(errors.has("price"));
        assert!(!errors.has("description"));
    }

    #[test]
    fn test_valid_create() {
        let input = form(" Lamp ", "10.5", "A bright lamp", Some("image/png"))
            .validate(true)
            .unwrap_or_else(|e| panic!("unexpected errors: {e:?}"));
        assert_eq!(input.title, "Lamp");
    }
}

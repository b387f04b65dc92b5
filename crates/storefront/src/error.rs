//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server errors are logged and
//! captured to Sentry; every error renders the generic error page without
//! internal detail.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{AuthError, CheckoutError, EmailError, InvoiceError, UploadError};
use crate::stripe::PaymentError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Payment provider call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Checkout could not be completed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Email could not be sent.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Invoice could not be generated.
    #[error("Invoice error: {0}")]
    Invoice(#[from] InvoiceError),

    /// Image could not be stored or removed.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Logged in, but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not logged in. Responds with a redirect to the login page.
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Generic error page.
#[derive(Template)]
#[template(path = "errors/error.html")]
pub struct ErrorTemplate<'a> {
    pub status: u16,
    pub title: &'a str,
    pub message: &'a str,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Auth(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::InvalidResetToken) => StatusCode::NOT_FOUND,
            Self::Auth(
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::UserAlreadyExists,
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Checkout(
                CheckoutError::NotPaid(_)
                | CheckoutError::WrongCustomer(_)
                | CheckoutError::AmountMismatch { .. },
            ) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Unauthorized) {
            return Redirect::to("/login").into_response();
        }

        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        render_error_page(status)
    }
}

/// Render the generic error page for a status code.
#[must_use]
pub fn render_error_page(status: StatusCode) -> Response {
    let (title, message) = match status {
        StatusCode::NOT_FOUND => (
            "Page Not Found!",
            "We could not find what you were looking for.",
        ),
        StatusCode::FORBIDDEN => ("Not Allowed", "You are not allowed to access this resource."),
        StatusCode::UNAUTHORIZED => ("Please Log In", "You need to be logged in to do that."),
        s if s.is_client_error() => ("Bad Request", "The request could not be processed."),
        _ => (
            "An Error Occurred!",
            "We're working on fixing this, sorry for the inconvenience!",
        ),
    };

    let page = ErrorTemplate {
        status: status.as_u16(),
        title,
        message,
    };

    match page.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render error page");
            (status, message).into_response()
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a user action.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 123".to_string());
        assert_eq!(err.to_string(), "Not found: product 123");

        let err = AppError::Forbidden("order 9".to_string());
        assert_eq!(err.to_string(), "Forbidden: order 9");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Payment(PaymentError::MissingUrl("cs_1".to_string()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::AmountMismatch {
                session: "cs_1".to_string(),
                expected: 2500,
                paid: Some(1000),
            })),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_unauthorized_redirects_to_login() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login");
    }

    #[test]
    fn test_error_page_hides_details() {
        let page = ErrorTemplate {
            status: 500,
            title: "An Error Occurred!",
            message: "We're working on fixing this, sorry for the inconvenience!",
        }
        .render()
        .unwrap_or_default();
        assert!(page.contains("An Error Occurred!"));
        assert!(!page.contains("Database error"));
    }
}

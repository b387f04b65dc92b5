//! Per-session CSRF tokens.
//!
//! A random token is stored in the session on first use and rendered into
//! every form as `_csrf`. Script-issued requests send it in the `csrf-token`
//! header instead.

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::session_keys;

/// Header carrying the token for `fetch` requests.
pub const CSRF_HEADER: &str = "csrf-token";

const CSRF_TOKEN_BYTES: usize = 32;

/// The session's CSRF token, created on first use.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn csrf_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(token) = session.get::<String>(session_keys::CSRF_TOKEN).await? {
        return Ok(token);
    }

    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);
    session.insert(session_keys::CSRF_TOKEN, &token).await?;
    Ok(token)
}

/// Check a submitted token against the session's.
///
/// # Errors
///
/// Returns `AppError::Forbidden` if the token is missing or does not match,
/// or `AppError::Session` if the session cannot be read.
pub async fn verify_csrf(session: &Session, submitted: Option<&str>) -> Result<(), AppError> {
    let expected: Option<String> = session.get(session_keys::CSRF_TOKEN).await?;

    match (expected, submitted) {
        (Some(expected), Some(submitted)) if constant_time_eq(&expected, submitted) => Ok(()),
        _ => {
            tracing::warn!("Rejected request with invalid CSRF token");
            Err(AppError::Forbidden("invalid CSRF token".to_string()))
        }
    }
}

/// Token from the `csrf-token` header, if present.
#[must_use]
pub fn header_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

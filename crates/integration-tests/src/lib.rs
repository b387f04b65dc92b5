//! Integration tests for Bazaar.
//!
//! Tests drive a running storefront over HTTP with a cookie-holding client,
//! the way a browser would.
//!
//! # Running Tests
//!
//! ```bash
//! bazaar-cli migrate
//! cargo run -p bazaar-storefront &
//! cargo test -p bazaar-integration-tests -- --ignored
//! ```
//!
//! `STOREFRONT_BASE_URL` overrides the default `http://localhost:3000`.
//! Tests that seed rows directly read `STOREFRONT_DATABASE_URL` (or
//! `DATABASE_URL`) and must point at the storefront's database.

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, redirect};
use sqlx::PgPool;
use uuid::Uuid;

/// Base URL of the storefront under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Connect to the storefront's database for seeding fixtures.
///
/// # Panics
///
/// Panics if no database URL is set or the connection fails.
pub async fn database() -> PgPool {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("STOREFRONT_DATABASE_URL must be set");
    PgPool::connect(&url)
        .await
        .expect("Failed to connect to database")
}

/// Client with a cookie jar that does not follow redirects, so tests can
/// assert on `Location`.
///
/// Each client claims its own forwarded address so the per-IP limit on auth
/// routes does not trip across tests.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn client() -> Client {
    let mut headers = HeaderMap::new();
    let ip = HeaderValue::from_str(&fake_client_ip()).expect("valid header");
    headers.insert("x-forwarded-for", ip);

    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

fn fake_client_ip() -> String {
    let [a, b, c, ..] = *Uuid::new_v4().as_bytes();
    format!("10.{a}.{b}.{c}")
}

/// A unique address so repeated runs do not collide.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@example.com", Uuid::new_v4().simple())
}

/// Pull the CSRF token out of a rendered form.
#[must_use]
pub fn extract_csrf(html: &str) -> Option<String> {
    let marker = r#"name="_csrf" value=""#;
    let start = html.find(marker)? + marker.len();
    let rest = html.get(start..)?;
    let end = rest.find('"')?;
    rest.get(..end).map(str::to_owned)
}

/// GET `path` and return the CSRF token from the page.
///
/// # Panics
///
/// Panics if the request fails or the page has no token.
pub async fn fetch_csrf(client: &Client, path: &str) -> String {
    let html = client
        .get(format!("{}{path}", base_url()))
        .send()
        .await
        .expect("request failed")
        .text()
        .await
        .expect("body");
    extract_csrf(&html).expect("page has no CSRF token")
}

/// Location header of a redirect response.
///
/// # Panics
///
/// Panics if the response is not a redirect.
#[must_use]
pub fn location(response: &reqwest::Response) -> String {
    assert!(
        response.status().is_redirection(),
        "expected redirect, got {}",
        response.status()
    );
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

/// Sign up a fresh user and log in, returning the client and email.
///
/// # Panics
///
/// Panics if signup or login does not redirect as expected.
pub async fn signed_in_client(password: &str) -> (Client, String) {
    let client = client();
    let email = unique_email();
    let base = base_url();

    let csrf = fetch_csrf(&client, "/signup").await;
    let resp = client
        .post(format!("{base}/signup"))
        .form(&[
            ("email", email.as_str()),
            ("password", password),
            ("confirmPassword", password),
            ("_csrf", csrf.as_str()),
        ])
        .send()
        .await
        .expect("signup request");
    assert_eq!(location(&resp), "/login?notice=signed_up");

    let csrf = fetch_csrf(&client, "/login").await;
    let resp = client
        .post(format!("{base}/login"))
        .form(&[
            ("email", email.as_str()),
            ("password", password),
            ("_csrf", csrf.as_str()),
        ])
        .send()
        .await
        .expect("login request");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");

    (client, email)
}

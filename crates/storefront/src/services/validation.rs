//! Form validation for signup, login and product forms.
//!
//! Failures carry per-field messages so a handler can re-render the form with
//! the first message shown and the offending inputs highlighted.

use rust_decimal::Decimal;

use bazaar_core::Email;

use crate::db::products::ProductInput;
use crate::services::auth::{AuthError, validate_password};

pub const EMAIL_INVALID: &str = "Please enter a valid email.";
pub const EMAIL_TAKEN: &str = "E-Mail exists already, please pick a different one.";
pub const PASSWORDS_DIFFER: &str = "Passwords have to match!";
pub const LOGIN_PASSWORD_INVALID: &str = "Password has to be valid.";
pub const TITLE_INVALID: &str = "Title must be at least 3 characters long.";
pub const PRICE_INVALID: &str = "Price must be a non-negative number.";
pub const DESCRIPTION_INVALID: &str = "Description must be between 5 and 400 characters long.";
pub const IMAGE_MISSING: &str = "Attached file is not an image.";

const MIN_TITLE_LENGTH: usize = 3;
const MIN_DESCRIPTION_LENGTH: usize = 5;
const MAX_DESCRIPTION_LENGTH: usize = 400;

/// One failed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All failures for one form submission, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The message shown at the top of the form.
    #[must_use]
    pub fn first_message(&self) -> Option<&str> {
        self.0.first().map(|e| e.message.as_str())
    }

    /// Whether `field` failed, for highlighting inputs.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// Single-error convenience constructor.
    #[must_use]
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }
}

/// Validate a signup submission. Does not check whether the email is taken.
///
/// # Errors
///
/// Returns every failed field.
pub fn validate_signup(
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<Email, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let email = Email::parse(email);
    if email.is_err() {
        errors.push("email", EMAIL_INVALID);
    }

    if let Err(AuthError::WeakPassword(message)) = validate_password(password) {
        errors.push("password", message);
    }

    if password != confirm_password {
        errors.push("confirmPassword", PASSWORDS_DIFFER);
    }

    match email {
        Ok(email) if errors.is_empty() => Ok(email),
        _ => Err(errors),
    }
}

/// Validate a login submission.
///
/// # Errors
///
/// Returns every failed field.
pub fn validate_login(email: &str, password: &str) -> Result<Email, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let email = Email::parse(email);
    if email.is_err() {
        errors.push("email", EMAIL_INVALID);
    }

    if validate_password(password).is_err() {
        errors.push("password", LOGIN_PASSWORD_INVALID);
    }

    match email {
        Ok(email) if errors.is_empty() => Ok(email),
        _ => Err(errors),
    }
}

/// Validate product fields. Text fields are trimmed; the price is rounded to
/// cents.
///
/// # Errors
///
/// Returns every failed field.
pub fn validate_product(
    title: &str,
    price: &str,
    description: &str,
) -> Result<ProductInput, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let title = title.trim();
    if title.chars().count() < MIN_TITLE_LENGTH {
        errors.push("title", TITLE_INVALID);
    }

    let price = parse_price(price);
    if price.is_none() {
        errors.push("price", PRICE_INVALID);
    }

    let description = description.trim();
    let description_len = description.chars().count();
    if !(MIN_DESCRIPTION_LENGTH..=MAX_DESCRIPTION_LENGTH).contains(&description_len) {
        errors.push("description", DESCRIPTION_INVALID);
    }

    match price {
        Some(price) if errors.is_empty() => Ok(ProductInput {
            title: title.to_owned(),
            description: description.to_owned(),
            price,
        }),
        _ => Err(errors),
    }
}

/// Parse a non-negative price that fits `NUMERIC(10, 2)`.
fn parse_price(raw: &str) -> Option<Decimal> {
    let max = Decimal::new(9_999_999_999, 2);
    let price = raw.trim().parse::<Decimal>().ok()?.round_dp(2);
    (price >= Decimal::ZERO && price <= max).then_some(price)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_valid() {
        let email = validate_signup(" New@Example.com ", "abc123", "abc123").unwrap();
        assert_eq!(email.as_str(), "new@example.com");
    }

    #[test]
    fn test_signup_collects_every_failure_in_order() {
        let errors = validate_signup("nope", "a!", "b").unwrap_err();
        assert_eq!(errors.first_message(), Some(EMAIL_INVALID));
        assert!(errors.has("email"));
        assert!(errors.has("password"));
        assert!(errors.has("confirmPassword"));
    }

    #[test]
    fn test_signup_password_mismatch_only() {
        let errors = validate_signup("a@b.co", "abc123", "abc124").unwrap_err();
        assert_eq!(errors.first_message(), Some(PASSWORDS_DIFFER));
        assert!(!errors.has("email"));
    }

    #[test]
    fn test_login_validation() {
        assert!(validate_login("a@b.co", "abc12").is_ok());
        let errors = validate_login("a@b.co", "x").unwrap_err();
        assert_eq!(errors.first_message(), Some(LOGIN_PASSWORD_INVALID));
    }

    #[test]
    fn test_product_trims_and_rounds() {
        let input = validate_product("  Lamp  ", " 12.344 ", "  A bright lamp ").unwrap();
        assert_eq!(input.title, "Lamp");
        assert_eq!(input.description, "A bright lamp");
        assert_eq!(input.price, Decimal::new(1234, 2));
    }

    #[test]
    fn test_product_rejections() {
        let errors = validate_product("ab", "-1", "four").unwrap_err();
        assert!(errors.has("title"));
        assert!(errors.has("price"));
        assert!(errors.has("description"));
        assert_eq!(errors.first_message(), Some(TITLE_INVALID));

        let errors = validate_product("Lamp", "cheap", "A bright lamp").unwrap_err();
        assert_eq!(errors.first_message(), Some(PRICE_INVALID));

        let long = "x".repeat(401);
        assert!(validate_product("Lamp", "1", &long).is_err());
    }

    #[test]
    fn test_zero_price_is_allowed() {
        assert!(validate_product("Freebie", "0", "Costs nothing").is_ok());
    }
}

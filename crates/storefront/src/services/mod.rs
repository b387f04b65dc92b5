//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password signup, login and the reset-by-email flow
//! - `checkout` - Cart pricing, payment sessions and order placement
//! - `email` - Transactional email (signup confirmation, password reset)
//! - `images` - Product image files
//! - `invoice` - PDF invoices for orders
//! - `validation` - Form validation with per-field messages

pub mod auth;
pub mod checkout;
pub mod email;
pub mod images;
pub mod invoice;
pub mod validation;

pub use auth::{AuthError, AuthService};
pub use checkout::{CheckoutError, CheckoutOutcome, CheckoutService};
pub use email::{EmailError, EmailService};
pub use images::{ImageStore, UploadError};
pub use invoice::{InvoiceError, InvoiceStore};

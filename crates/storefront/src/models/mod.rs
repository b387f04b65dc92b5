//! Domain models for the storefront.
//!
//! These are validated domain types, separate from the row types used by
//! the repositories in [`crate::db`].

pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use order::Order;
pub use product::Product;
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;

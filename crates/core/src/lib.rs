//! Bazaar Core - Domain types for the storefront.
//!
//! This crate provides the types shared by every Bazaar component:
//! - `storefront` - Public shop, cart, checkout and admin catalog
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure domain logic - no I/O, no
//! database access, no HTTP clients. Cart mutation and order pricing live
//! here so they can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices and emails
//! - [`cart`] - A user's mutable product selection
//! - [`order`] - Frozen order snapshots and totals
//! - [`pagination`] - Page arithmetic for catalog listings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod order;
pub mod pagination;
pub mod types;

pub use cart::{Cart, CartItem};
pub use order::{OrderLine, ProductSnapshot, order_total, price_cart};
pub use pagination::Pagination;
pub use types::*;

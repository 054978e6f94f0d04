//! Business services for the storefront.
//!
//! This crate provides:
//! - `BasketService`, which reserves stock as items enter a basket
//! - `OrderService`, which turns a basket into an order and handles cancellation
//! - `CatalogService` for categories, products and CSV category import
//! - `UserService` for accounts, password hashing and role checks

pub mod account;
pub mod basket;
pub mod catalog;
pub mod error;
pub mod limits;
pub mod order;

pub use account::{ROLE_ADMIN, ROLE_CUSTOMER, UserService};
pub use basket::BasketService;
pub use catalog::{CatalogService, CategoryRow, ImportSummary, parse_categories};
pub use error::{DomainError, ErrorKind, Result};
pub use order::{
    CancellationPolicy, CheckoutDetails, DEFAULT_CANCELLATION_WINDOW_DAYS, OrderService,
};

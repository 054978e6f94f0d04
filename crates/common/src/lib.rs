//! Shared types for the storefront workspace.

pub mod money;
pub mod page;
pub mod types;

pub use money::Money;
pub use page::{Page, PageRequest};
pub use types::{BasketId, CategoryId, OrderId, ProductId, UserId};

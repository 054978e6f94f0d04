//! Domain error types.

use chrono::{DateTime, Utc};
use common::{CategoryId, OrderId, ProductId};
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

/// Coarse classification of a [`DomainError`], used by callers to pick a
/// response without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    WindowExpired,
    Unauthorized,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::WindowExpired => "window_expired",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Persistence => "persistence",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    /// The user has never created a basket.
    #[error("Basket not found for user '{username}'")]
    BasketNotFound { username: String },

    /// The basket has no line for the product.
    #[error("Item not found in basket: product {product_id}")]
    ItemNotFound { product_id: ProductId },

    /// No order with this id belongs to the caller.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    #[error("Product with SKU '{0}' already exists")]
    DuplicateSku(String),

    #[error("Category '{0}' already exists")]
    DuplicateCategoryName(String),

    #[error("User '{0}' already exists")]
    DuplicateEmail(String),

    /// The product is still referenced by a basket line or an order item.
    #[error("Product {0} is still referenced by baskets or orders")]
    ProductInUse(ProductId),

    /// The order is older than the cancellation window.
    #[error("Order {order_id} placed at {placed_at} can no longer be cancelled")]
    CancellationWindowExpired {
        order_id: OrderId,
        placed_at: DateTime<Utc>,
    },

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// A store call failed for reasons the services cannot act on.
    #[error("Persistence error during {operation}: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::ProductNotFound(_)
            | DomainError::CategoryNotFound(_)
            | DomainError::BasketNotFound { .. }
            | DomainError::ItemNotFound { .. }
            | DomainError::OrderNotFound(_) => ErrorKind::NotFound,
            DomainError::InsufficientStock { .. }
            | DomainError::DuplicateSku(_)
            | DomainError::DuplicateCategoryName(_)
            | DomainError::DuplicateEmail(_)
            | DomainError::ProductInUse(_) => ErrorKind::Conflict,
            DomainError::CancellationWindowExpired { .. } => ErrorKind::WindowExpired,
            DomainError::InvalidCredentials => ErrorKind::Unauthorized,
            DomainError::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    /// Translates a store failure into its business meaning. Anything the
    /// services cannot interpret becomes [`DomainError::Persistence`] tagged
    /// with `operation`.
    pub(crate) fn from_store(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(id) => DomainError::ProductNotFound(id),
            StoreError::UnknownCategory(id) => DomainError::CategoryNotFound(id),
            StoreError::LineNotFound { product_id, .. } => DomainError::ItemNotFound { product_id },
            StoreError::OrderNotFound(id) => DomainError::OrderNotFound(id),
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::DuplicateSku(sku) => DomainError::DuplicateSku(sku),
            StoreError::DuplicateCategoryName(name) => DomainError::DuplicateCategoryName(name),
            StoreError::DuplicateEmail(email) => DomainError::DuplicateEmail(email),
            StoreError::ProductInUse(id) => DomainError::ProductInUse(id),
            StoreError::QuantityOverflow(id) => DomainError::validation(format!(
                "quantity for product {id} would exceed the maximum of {}",
                i32::MAX
            )),
            source => DomainError::Persistence { operation, source },
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_their_business_meaning() {
        let err = DomainError::from_store(
            "reserve_item",
            StoreError::InsufficientStock {
                product_id: ProductId::new(1),
                requested: 3,
                available: 2,
            },
        );
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = DomainError::from_store("get_product", StoreError::Decode("bad".into()));
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.to_string().contains("get_product"));
    }

    #[test]
    fn missing_line_is_not_found() {
        let err = DomainError::from_store(
            "resize_item",
            StoreError::LineNotFound {
                basket_id: common::BasketId::new(),
                product_id: ProductId::new(7),
            },
        );
        assert!(matches!(err, DomainError::ItemNotFound { product_id } if product_id.as_i64() == 7));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn quantity_overflow_is_a_validation_error() {
        let err = DomainError::from_store(
            "update_product",
            StoreError::QuantityOverflow(ProductId::new(3)),
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("2147483647"));
    }
}

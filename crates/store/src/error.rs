use common::{BasketId, CategoryId, OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A product referenced a category that does not exist.
    #[error("Category not found: {0}")]
    UnknownCategory(CategoryId),

    /// The basket does not exist.
    #[error("Basket not found: {0}")]
    BasketNotFound(BasketId),

    /// The basket has no line for the product.
    #[error("No line for product {product_id} in basket {basket_id}")]
    LineNotFound {
        basket_id: BasketId,
        product_id: ProductId,
    },

    /// The order does not exist or belongs to someone else.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Not enough quantity-on-hand to satisfy a reservation.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// A quantity would no longer fit in a 32-bit integer.
    #[error("Quantity for product {0} would exceed the largest storable value")]
    QuantityOverflow(ProductId),

    /// Another product already uses this SKU.
    #[error("Product with SKU '{0}' already exists")]
    DuplicateSku(String),

    /// Another category already uses this name.
    #[error("Category '{0}' already exists")]
    DuplicateCategoryName(String),

    /// Another account already uses this email.
    #[error("User '{0}' already exists")]
    DuplicateEmail(String),

    /// The product is still referenced by a basket line or an order item.
    #[error("Product {0} is referenced by baskets or orders")]
    ProductInUse(ProductId),

    /// A user was created with a role that was never registered.
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

//! Persistence for the storefront.
//!
//! Every operation that touches product stock together with a basket or
//! order row runs as a single atomic unit, so quantity-on-hand plus all
//! outstanding reservations always adds up.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    Basket, BasketItem, Category, NewCategory, NewOrder, NewProduct, NewUser, Order, OrderItem,
    OrderStatus, PaymentDetails, Product, ProductUpdate, ShippingDetails, User,
};
pub use postgres::PostgresStore;
pub use store::{BasketStore, CatalogStore, OrderStore, Store, UserStore};

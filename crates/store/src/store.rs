use async_trait::async_trait;
use common::{BasketId, CategoryId, OrderId, PageRequest, ProductId, UserId};

use crate::{
    Basket, BasketItem, Category, NewCategory, NewOrder, NewProduct, NewUser, Order, Product,
    ProductUpdate, Result, User,
};

/// Categories and products.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Creates a category. Fails with `DuplicateCategoryName` if the name is taken.
    async fn create_category(&self, category: NewCategory) -> Result<Category>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>>;

    async fn get_category_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// Lists categories ordered by id, returning the page and the total count.
    async fn list_categories(
        &self,
        page: PageRequest,
        only_active: bool,
    ) -> Result<(Vec<Category>, u64)>;

    /// Creates a product. Fails with `DuplicateSku` or `UnknownCategory`.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>>;

    /// Lists products ordered by id, returning the page and the total count.
    async fn list_products(&self, page: PageRequest) -> Result<(Vec<Product>, u64)>;

    /// Case-insensitive substring match on product names and SKUs.
    async fn search_products(&self, query: &str) -> Result<Vec<Product>>;

    /// Replaces a product's name, price and quantity-on-hand.
    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product>;

    /// Deletes a product that no basket line or order item references.
    async fn delete_product(&self, id: ProductId) -> Result<()>;
}

/// Baskets and their stock reservations.
///
/// Each mutating call moves units between a product's quantity-on-hand and a
/// basket line in one atomic step.
#[async_trait]
pub trait BasketStore: Send + Sync {
    /// Returns the user's basket, if one was ever created.
    async fn find_basket(&self, username: &str) -> Result<Option<Basket>>;

    /// Returns the user's basket, creating an empty one if needed.
    async fn ensure_basket(&self, username: &str) -> Result<Basket>;

    /// Takes `quantity` units from stock and adds them to the basket line,
    /// creating the line if it does not exist yet.
    async fn reserve_item(
        &self,
        basket_id: BasketId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<BasketItem>;

    /// Sets an existing line to `quantity` units, taking or returning the
    /// difference from stock.
    async fn resize_item(
        &self,
        basket_id: BasketId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<BasketItem>;

    /// Deletes a line and returns its units to stock. Returns the released quantity.
    async fn release_item(&self, basket_id: BasketId, product_id: ProductId) -> Result<i32>;
}

/// Orders placed from baskets.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Converts every line of the basket into an order item and empties the
    /// basket. Reserved stock stays consumed.
    async fn place_order(&self, basket_id: BasketId, order: NewOrder) -> Result<Order>;

    /// Returns an order only if it belongs to `username`.
    async fn find_order(&self, username: &str, id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn list_orders(&self, username: &str) -> Result<Vec<Order>>;

    /// Marks an incomplete order as canceled. When `restock` is set, the
    /// order's units go back to quantity-on-hand in the same step. Cancelling
    /// an already canceled order changes nothing.
    async fn cancel_order(&self, username: &str, id: OrderId, restock: bool) -> Result<Order>;
}

/// Accounts and roles.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Registers a role name. Does nothing if it already exists.
    async fn ensure_role(&self, name: &str) -> Result<()>;

    /// Creates a user. Fails with `DuplicateEmail` or `UnknownRole`.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// Everything the services need from a backend.
pub trait Store: CatalogStore + BasketStore + OrderStore + UserStore + Clone + 'static {}

impl<T> Store for T where T: CatalogStore + BasketStore + OrderStore + UserStore + Clone + 'static {}

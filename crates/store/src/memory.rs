use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BasketId, CategoryId, OrderId, PageRequest, ProductId, UserId};
use tokio::sync::RwLock;

use crate::{
    Basket, BasketItem, Category, NewCategory, NewOrder, NewProduct, NewUser, Order, OrderItem,
    OrderStatus, Product, ProductUpdate, Result, StoreError, User,
    store::{BasketStore, CatalogStore, OrderStore, UserStore},
};

/// In-memory store for tests and local runs.
///
/// All state sits behind one lock and every operation holds it for its whole
/// duration, which gives the same all-or-nothing behaviour as a database
/// transaction.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    categories: BTreeMap<CategoryId, Category>,
    next_category_id: i64,
    products: BTreeMap<ProductId, Product>,
    next_product_id: i64,
    baskets: HashMap<String, StoredBasket>,
    basket_owners: HashMap<BasketId, String>,
    orders: Vec<Order>,
    users: BTreeMap<UserId, User>,
    next_user_id: i64,
    roles: BTreeSet<String>,
}

struct StoredBasket {
    id: BasketId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    lines: BTreeMap<ProductId, StoredLine>,
}

struct StoredLine {
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of quantity-on-hand and every outstanding basket reservation for a
    /// product. Stays constant across basket operations.
    pub async fn accounted_units(&self, product_id: ProductId) -> i64 {
        let state = self.state.read().await;
        let on_hand = state
            .products
            .get(&product_id)
            .map(|p| i64::from(p.quantity))
            .unwrap_or(0);
        on_hand + state.reserved_units(product_id)
    }

    /// Clears all data.
    pub async fn clear(&self) {
        *self.state.write().await = MemoryState::default();
    }
}

impl MemoryState {
    fn basket_view(&self, username: &str, basket: &StoredBasket) -> Basket {
        let items = basket
            .lines
            .iter()
            .filter_map(|(product_id, line)| {
                self.products
                    .get(product_id)
                    .map(|product| line_view(basket.id, product, line))
            })
            .collect();

        Basket {
            id: basket.id,
            username: username.to_string(),
            items,
            created_at: basket.created_at,
            updated_at: basket.updated_at,
        }
    }

    fn reserved_units(&self, product_id: ProductId) -> i64 {
        self.baskets
            .values()
            .filter_map(|b| b.lines.get(&product_id))
            .map(|line| i64::from(line.quantity))
            .sum()
    }

    fn product_referenced(&self, product_id: ProductId) -> bool {
        self.baskets
            .values()
            .any(|b| b.lines.contains_key(&product_id))
            || self
                .orders
                .iter()
                .any(|o| o.items.iter().any(|i| i.product_id == product_id))
    }
}

fn line_view(basket_id: BasketId, product: &Product, line: &StoredLine) -> BasketItem {
    BasketItem {
        basket_id,
        product_id: product.id,
        product_name: product.name.clone(),
        sku: product.sku.clone(),
        unit_price: product.unit_price,
        quantity: line.quantity,
        created_at: line.created_at,
        updated_at: line.updated_at,
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: PageRequest) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let page_items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    (page_items, total)
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn create_category(&self, category: NewCategory) -> Result<Category> {
        let mut state = self.state.write().await;

        if state.categories.values().any(|c| c.name == category.name) {
            return Err(StoreError::DuplicateCategoryName(category.name));
        }

        state.next_category_id += 1;
        let now = Utc::now();
        let created = Category {
            id: CategoryId::new(state.next_category_id),
            name: category.name,
            is_active: category.is_active,
            created_at: now,
            updated_at: now,
        };
        state.categories.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.state.read().await.categories.get(&id).cloned())
    }

    async fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.values().find(|c| c.name == name).cloned())
    }

    async fn list_categories(
        &self,
        page: PageRequest,
        only_active: bool,
    ) -> Result<(Vec<Category>, u64)> {
        let state = self.state.read().await;
        let matching: Vec<Category> = state
            .categories
            .values()
            .filter(|c| !only_active || c.is_active)
            .cloned()
            .collect();
        Ok(paginate(matching, page))
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let mut state = self.state.write().await;

        let category_name = state
            .categories
            .get(&product.category_id)
            .map(|c| c.name.clone())
            .ok_or(StoreError::UnknownCategory(product.category_id))?;

        if state.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::DuplicateSku(product.sku));
        }

        state.next_product_id += 1;
        let now = Utc::now();
        let created = Product {
            id: ProductId::new(state.next_product_id),
            name: product.name,
            sku: product.sku,
            unit_price: product.unit_price,
            quantity: product.quantity,
            category_id: product.category_id,
            category_name,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.values().find(|p| p.sku == sku).cloned())
    }

    async fn list_products(&self, page: PageRequest) -> Result<(Vec<Product>, u64)> {
        let state = self.state.read().await;
        let all: Vec<Product> = state.products.values().cloned().collect();
        Ok(paginate(all, page))
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let needle = query.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle) || p.sku.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let mut state = self.state.write().await;

        if !state.products.contains_key(&id) {
            return Err(StoreError::ProductNotFound(id));
        }
        let reserved = state.reserved_units(id);
        if i64::from(update.quantity) + reserved > i64::from(i32::MAX) {
            return Err(StoreError::QuantityOverflow(id));
        }

        let product = state
            .products
            .get_mut(&id)
            .ok_or(StoreError::ProductNotFound(id))?;
        product.name = update.name;
        product.unit_price = update.unit_price;
        product.quantity = update.quantity;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;

        if !state.products.contains_key(&id) {
            return Err(StoreError::ProductNotFound(id));
        }
        if state.product_referenced(id) {
            return Err(StoreError::ProductInUse(id));
        }

        state.products.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl BasketStore for InMemoryStore {
    async fn find_basket(&self, username: &str) -> Result<Option<Basket>> {
        let state = self.state.read().await;
        Ok(state
            .baskets
            .get(username)
            .map(|basket| state.basket_view(username, basket)))
    }

    async fn ensure_basket(&self, username: &str) -> Result<Basket> {
        let mut state = self.state.write().await;

        if !state.baskets.contains_key(username) {
            let now = Utc::now();
            let basket = StoredBasket {
                id: BasketId::new(),
                created_at: now,
                updated_at: now,
                lines: BTreeMap::new(),
            };
            state.basket_owners.insert(basket.id, username.to_string());
            state.baskets.insert(username.to_string(), basket);
        }

        let basket = state
            .baskets
            .get(username)
            .ok_or_else(|| StoreError::Decode(format!("basket for '{username}' vanished")))?;
        Ok(state.basket_view(username, basket))
    }

    async fn reserve_item(
        &self,
        basket_id: BasketId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<BasketItem> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let owner = state
            .basket_owners
            .get(&basket_id)
            .ok_or(StoreError::BasketNotFound(basket_id))?;
        let basket = state
            .baskets
            .get_mut(owner)
            .ok_or(StoreError::BasketNotFound(basket_id))?;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;

        if product.quantity < quantity {
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.quantity,
            });
        }
        let merged = basket
            .lines
            .get(&product_id)
            .map_or(0, |line| line.quantity)
            .checked_add(quantity)
            .ok_or(StoreError::QuantityOverflow(product_id))?;

        let now = Utc::now();
        product.quantity -= quantity;
        let line = basket.lines.entry(product_id).or_insert(StoredLine {
            quantity: 0,
            created_at: now,
            updated_at: now,
        });
        line.quantity = merged;
        line.updated_at = now;
        basket.updated_at = now;

        Ok(line_view(basket_id, product, line))
    }

    async fn resize_item(
        &self,
        basket_id: BasketId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<BasketItem> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let owner = state
            .basket_owners
            .get(&basket_id)
            .ok_or(StoreError::BasketNotFound(basket_id))?;
        let basket = state
            .baskets
            .get_mut(owner)
            .ok_or(StoreError::BasketNotFound(basket_id))?;
        let line = basket
            .lines
            .get_mut(&product_id)
            .ok_or(StoreError::LineNotFound {
                basket_id,
                product_id,
            })?;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;

        let delta = quantity - line.quantity;
        if delta > product.quantity {
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.quantity.saturating_add(line.quantity),
            });
        }
        let remaining = product
            .quantity
            .checked_sub(delta)
            .ok_or(StoreError::QuantityOverflow(product_id))?;

        let now = Utc::now();
        product.quantity = remaining;
        line.quantity = quantity;
        line.updated_at = now;
        basket.updated_at = now;

        Ok(line_view(basket_id, product, line))
    }

    async fn release_item(&self, basket_id: BasketId, product_id: ProductId) -> Result<i32> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let owner = state
            .basket_owners
            .get(&basket_id)
            .ok_or(StoreError::BasketNotFound(basket_id))?;
        let basket = state
            .baskets
            .get_mut(owner)
            .ok_or(StoreError::BasketNotFound(basket_id))?;
        let released = basket
            .lines
            .get(&product_id)
            .map(|line| line.quantity)
            .ok_or(StoreError::LineNotFound {
                basket_id,
                product_id,
            })?;

        if let Some(product) = state.products.get_mut(&product_id) {
            product.quantity = product
                .quantity
                .checked_add(released)
                .ok_or(StoreError::QuantityOverflow(product_id))?;
        }
        basket.lines.remove(&product_id);
        basket.updated_at = Utc::now();
        Ok(released)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn place_order(&self, basket_id: BasketId, order: NewOrder) -> Result<Order> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let owner = state
            .basket_owners
            .get(&basket_id)
            .ok_or(StoreError::BasketNotFound(basket_id))?;
        let basket = state
            .baskets
            .get_mut(owner)
            .ok_or(StoreError::BasketNotFound(basket_id))?;

        let order_id = OrderId::new();
        let items: Vec<OrderItem> = basket
            .lines
            .iter()
            .filter_map(|(product_id, line)| {
                state.products.get(product_id).map(|product| OrderItem {
                    order_id,
                    product_id: *product_id,
                    product_name: product.name.clone(),
                    unit_price: product.unit_price,
                    quantity: line.quantity,
                })
            })
            .collect();

        let now = Utc::now();
        basket.lines.clear();
        basket.updated_at = now;

        let placed = Order {
            id: order_id,
            username: order.username,
            status: OrderStatus::Incomplete,
            shipping: order.shipping,
            payment: order.payment,
            items,
            created_at: now,
            updated_at: now,
        };
        state.orders.push(placed.clone());
        Ok(placed)
    }

    async fn find_order(&self, username: &str, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .find(|o| o.id == id && o.username == username)
            .cloned())
    }

    async fn list_orders(&self, username: &str) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| o.username == username)
            .cloned()
            .collect())
    }

    async fn cancel_order(&self, username: &str, id: OrderId, restock: bool) -> Result<Order> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id && o.username == username)
            .ok_or(StoreError::OrderNotFound(id))?;

        if order.status == OrderStatus::Incomplete {
            if restock {
                // Work out every new quantity before touching anything.
                let mut restocked = Vec::with_capacity(order.items.len());
                for item in &order.items {
                    if let Some(product) = state.products.get(&item.product_id) {
                        let quantity = product
                            .quantity
                            .checked_add(item.quantity)
                            .ok_or(StoreError::QuantityOverflow(item.product_id))?;
                        restocked.push((item.product_id, quantity));
                    }
                }
                for (product_id, quantity) in restocked {
                    if let Some(product) = state.products.get_mut(&product_id) {
                        product.quantity = quantity;
                    }
                }
            }

            order.status = OrderStatus::Canceled;
            order.updated_at = Utc::now();
        }

        Ok(order.clone())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn ensure_role(&self, name: &str) -> Result<()> {
        self.state.write().await.roles.insert(name.to_string());
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.write().await;

        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        if let Some(unknown) = user.roles.iter().find(|r| !state.roles.contains(*r)) {
            return Err(StoreError::UnknownRole(unknown.clone()));
        }

        state.next_user_id += 1;
        let created = User {
            id: UserId::new(state.next_user_id),
            email: user.email,
            password_hash: user.password_hash,
            roles: user.roles,
            created_at: Utc::now(),
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }
}

#[cfg(test)]
mod tests {
    use common::Money;

    use super::*;
    use crate::{PaymentDetails, ShippingDetails};

    async fn seeded_product(store: &InMemoryStore, quantity: i32) -> Product {
        let category = store
            .create_category(NewCategory::new("Tools", true))
            .await
            .unwrap();
        store
            .create_product(NewProduct {
                name: "Hammer".to_string(),
                sku: "HAM-1".to_string(),
                unit_price: Money::from_cents(1250),
                quantity,
                category_id: category.id,
            })
            .await
            .unwrap()
    }

    fn new_order(username: &str) -> NewOrder {
        NewOrder {
            username: username.to_string(),
            shipping: ShippingDetails {
                name: "Ada".to_string(),
                address: "1 Main St".to_string(),
                phone_number: "555-0100".to_string(),
            },
            payment: PaymentDetails {
                card_number: "4111111111111111".to_string(),
                card_exp: "12/30".to_string(),
                card_cvv: "123".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn reserve_merges_into_existing_line() {
        let store = InMemoryStore::new();
        let product = seeded_product(&store, 10).await;
        let basket = store.ensure_basket("alice").await.unwrap();

        store.reserve_item(basket.id, product.id, 3).await.unwrap();
        let line = store.reserve_item(basket.id, product.id, 2).await.unwrap();

        assert_eq!(line.quantity, 5);
        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 5);
        assert_eq!(store.accounted_units(product.id).await, 10);
    }

    #[tokio::test]
    async fn failed_reserve_changes_nothing() {
        let store = InMemoryStore::new();
        let product = seeded_product(&store, 2).await;
        let basket = store.ensure_basket("alice").await.unwrap();

        let err = store
            .reserve_item(basket.id, product.id, 3)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));
        let basket = store.find_basket("alice").await.unwrap().unwrap();
        assert!(basket.is_empty());
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().quantity,
            2
        );
    }

    #[tokio::test]
    async fn resize_moves_only_the_difference() {
        let store = InMemoryStore::new();
        let product = seeded_product(&store, 10).await;
        let basket = store.ensure_basket("alice").await.unwrap();
        store.reserve_item(basket.id, product.id, 5).await.unwrap();

        store.resize_item(basket.id, product.id, 2).await.unwrap();
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().quantity,
            8
        );

        let err = store
            .resize_item(basket.id, product.id, 11)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 11,
                available: 10,
                ..
            }
        ));

        store.resize_item(basket.id, product.id, 10).await.unwrap();
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().quantity,
            0
        );
        assert_eq!(store.accounted_units(product.id).await, 10);
    }

    #[tokio::test]
    async fn release_returns_units_and_missing_line_is_reported() {
        let store = InMemoryStore::new();
        let product = seeded_product(&store, 4).await;
        let basket = store.ensure_basket("alice").await.unwrap();
        store.reserve_item(basket.id, product.id, 4).await.unwrap();

        assert_eq!(store.release_item(basket.id, product.id).await.unwrap(), 4);
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().quantity,
            4
        );

        let err = store.release_item(basket.id, product.id).await.unwrap_err();
        assert!(matches!(err, StoreError::LineNotFound { .. }));
    }

    #[tokio::test]
    async fn stock_update_leaves_room_for_reserved_units() {
        let store = InMemoryStore::new();
        let product = seeded_product(&store, 10).await;
        let basket = store.ensure_basket("alice").await.unwrap();
        store.reserve_item(basket.id, product.id, 5).await.unwrap();

        let update = |quantity| ProductUpdate {
            name: "Hammer".to_string(),
            unit_price: Money::from_cents(1250),
            quantity,
        };
        let err = store
            .update_product(product.id, update(i32::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::QuantityOverflow(id) if id == product.id));
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().quantity,
            5
        );

        store
            .update_product(product.id, update(i32::MAX - 5))
            .await
            .unwrap();
        assert_eq!(store.release_item(basket.id, product.id).await.unwrap(), 5);
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().quantity,
            i32::MAX
        );
    }

    #[tokio::test]
    async fn overflowing_restock_leaves_order_incomplete() {
        let store = InMemoryStore::new();
        let product = seeded_product(&store, 4).await;
        let basket = store.ensure_basket("alice").await.unwrap();
        store.reserve_item(basket.id, product.id, 4).await.unwrap();
        let order = store
            .place_order(basket.id, new_order("alice"))
            .await
            .unwrap();
        store
            .update_product(
                product.id,
                ProductUpdate {
                    name: "Hammer".to_string(),
                    unit_price: Money::from_cents(1250),
                    quantity: i32::MAX,
                },
            )
            .await
            .unwrap();

        let err = store.cancel_order("alice", order.id, true).await.unwrap_err();
        assert!(matches!(err, StoreError::QuantityOverflow(_)));
        let stored = store.find_order("alice", order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Incomplete);
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().quantity,
            i32::MAX
        );

        let canceled = store.cancel_order("alice", order.id, false).await.unwrap();
        assert!(canceled.is_canceled());
    }

    #[tokio::test]
    async fn place_order_consumes_basket_and_cancel_restocks_once() {
        let store = InMemoryStore::new();
        let product = seeded_product(&store, 6).await;
        let basket = store.ensure_basket("alice").await.unwrap();
        store.reserve_item(basket.id, product.id, 4).await.unwrap();

        let order = store
            .place_order(basket.id, new_order("alice"))
            .await
            .unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 4);
        assert_eq!(order.total_price(), Money::from_cents(5000));
        assert!(
            store
                .find_basket("alice")
                .await
                .unwrap()
                .unwrap()
                .is_empty()
        );

        store.cancel_order("alice", order.id, true).await.unwrap();
        let again = store.cancel_order("alice", order.id, true).await.unwrap();
        assert!(again.is_canceled());
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().quantity,
            6
        );
    }

    #[tokio::test]
    async fn orders_are_scoped_to_their_owner() {
        let store = InMemoryStore::new();
        let basket = store.ensure_basket("alice").await.unwrap();
        let order = store
            .place_order(basket.id, new_order("alice"))
            .await
            .unwrap();

        assert!(store.find_order("bob", order.id).await.unwrap().is_none());
        assert!(matches!(
            store.cancel_order("bob", order.id, false).await,
            Err(StoreError::OrderNotFound(_))
        ));
        assert_eq!(store.list_orders("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn referenced_product_cannot_be_deleted() {
        let store = InMemoryStore::new();
        let product = seeded_product(&store, 3).await;
        let basket = store.ensure_basket("alice").await.unwrap();
        store.reserve_item(basket.id, product.id, 1).await.unwrap();

        assert!(matches!(
            store.delete_product(product.id).await,
            Err(StoreError::ProductInUse(_))
        ));

        store.release_item(basket.id, product.id).await.unwrap();
        store.delete_product(product.id).await.unwrap();
        assert!(store.get_product(product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn user_roles_must_exist() {
        let store = InMemoryStore::new();
        store.ensure_role("customer").await.unwrap();

        let err = store
            .create_user(NewUser {
                email: "a@example.com".to_string(),
                password_hash: "hash".to_string(),
                roles: vec!["admin".to_string()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownRole(role) if role == "admin"));

        let user = store
            .create_user(NewUser {
                email: "a@example.com".to_string(),
                password_hash: "hash".to_string(),
                roles: vec!["customer".to_string()],
            })
            .await
            .unwrap();
        assert!(user.has_role("customer"));
        assert!(matches!(
            store
                .create_user(NewUser {
                    email: "a@example.com".to_string(),
                    password_hash: "hash".to_string(),
                    roles: vec![],
                })
                .await,
            Err(StoreError::DuplicateEmail(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_never_oversell() {
        let store = InMemoryStore::new();
        let product = seeded_product(&store, 7).await;

        let product_id = product.id;
        let attempts = (0..20).map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let basket = store.ensure_basket(&format!("user-{i}")).await?;
                store.reserve_item(basket.id, product_id, 1).await
            })
        });
        let results = futures_util::future::join_all(attempts).await;

        let succeeded = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(succeeded, 7);
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().quantity,
            0
        );
        assert_eq!(store.accounted_units(product.id).await, 7);
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::{BasketId, CategoryId, Money, OrderId, PageRequest, ProductId, UserId};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Basket, BasketItem, Category, NewCategory, NewOrder, NewProduct, NewUser, Order, OrderItem,
    OrderStatus, PaymentDetails, Product, ProductUpdate, Result, ShippingDetails, StoreError, User,
    store::{BasketStore, CatalogStore, OrderStore, UserStore},
};

const CATEGORY_COLUMNS: &str = "id, name, is_active, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.sku, p.unit_price_cents, p.quantity, \
     p.category_id, c.name AS category_name, p.created_at, p.updated_at";

const BASKET_ITEM_COLUMNS: &str = "bi.basket_id, bi.product_id, p.name AS product_name, p.sku, \
     p.unit_price_cents, bi.quantity, bi.created_at, bi.updated_at";

const ORDER_COLUMNS: &str = "id, username, status, name, address, phone_number, card_number, \
     card_exp, card_cvv, created_at, updated_at";

const USER_COLUMNS: &str = "u.id, u.email, u.password_hash, u.created_at, \
     COALESCE(array_agg(ur.role_name::TEXT ORDER BY ur.role_name) \
     FILTER (WHERE ur.role_name IS NOT NULL), '{}'::TEXT[]) AS roles";

/// PostgreSQL-backed store.
///
/// Stock moves use conditional updates (`quantity >= n`) inside a
/// transaction, so concurrent reservations against the same product
/// serialize on its row lock and can never drive it negative.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_category(row: PgRow) -> Result<Category> {
        Ok(Category {
            id: CategoryId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity: row.try_get("quantity")?,
            category_id: CategoryId::new(row.try_get("category_id")?),
            category_name: row.try_get("category_name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_basket_item(row: PgRow) -> Result<BasketItem> {
        Ok(BasketItem {
            basket_id: BasketId::from_uuid(row.try_get::<Uuid, _>("basket_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            product_name: row.try_get("product_name")?,
            sku: row.try_get("sku")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity: row.try_get("quantity")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            product_name: row.try_get("product_name")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity: row.try_get("quantity")?,
        })
    }

    fn row_to_order(row: PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let status: String = row.try_get("status")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            username: row.try_get("username")?,
            status: status.parse::<OrderStatus>().map_err(StoreError::Decode)?,
            shipping: ShippingDetails {
                name: row.try_get("name")?,
                address: row.try_get("address")?,
                phone_number: row.try_get("phone_number")?,
            },
            payment: PaymentDetails {
                card_number: row.try_get("card_number")?,
                card_exp: row.try_get("card_exp")?,
                card_cvv: row.try_get("card_cvv")?,
            },
            items,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        Ok(User {
            id: UserId::new(row.try_get("id")?),
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            roles: row.try_get("roles")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Maps a constraint violation to a domain-level store error, falling back
/// to a plain database error.
fn map_constraint(
    err: sqlx::Error,
    map: impl FnOnce(&str) -> Option<StoreError>,
) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && let Some(constraint) = db_err.constraint()
        && let Some(mapped) = map(constraint)
    {
        return mapped;
    }
    StoreError::Database(err)
}

/// Maps PostgreSQL's `numeric_value_out_of_range` to a quantity overflow on
/// `product_id`.
fn map_overflow(err: sqlx::Error, product_id: ProductId) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.code().as_deref() == Some("22003")
    {
        return StoreError::QuantityOverflow(product_id);
    }
    StoreError::Database(err)
}

fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Locks the basket row. Every basket mutation and checkout calls this
/// first, so they all acquire the basket before any product or line row.
async fn require_basket(conn: &mut PgConnection, basket_id: BasketId) -> Result<()> {
    let found: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM baskets WHERE id = $1 FOR UPDATE")
            .bind(basket_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;

    found
        .map(|_| ())
        .ok_or(StoreError::BasketNotFound(basket_id))
}

async fn touch_basket(conn: &mut PgConnection, basket_id: BasketId) -> Result<()> {
    sqlx::query("UPDATE baskets SET updated_at = NOW() WHERE id = $1")
        .bind(basket_id.as_uuid())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Takes `units` from a product's quantity-on-hand, failing without change
/// if fewer are available.
async fn take_stock(conn: &mut PgConnection, product_id: ProductId, units: i32) -> Result<()> {
    let taken = sqlx::query(
        r#"
        UPDATE products
        SET quantity = quantity - $2, updated_at = NOW()
        WHERE id = $1 AND quantity >= $2
        RETURNING quantity
        "#,
    )
    .bind(product_id.as_i64())
    .bind(units)
    .fetch_optional(&mut *conn)
    .await?;

    if taken.is_some() {
        return Ok(());
    }

    let available: Option<i32> = sqlx::query_scalar("SELECT quantity FROM products WHERE id = $1")
        .bind(product_id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;

    match available {
        None => Err(StoreError::ProductNotFound(product_id)),
        Some(available) => {
            tracing::debug!(%product_id, units, available, "stock conditional update matched no row");
            Err(StoreError::InsufficientStock {
                product_id,
                requested: units,
                available,
            })
        }
    }
}

async fn return_stock(conn: &mut PgConnection, product_id: ProductId, units: i32) -> Result<()> {
    sqlx::query(
        "UPDATE products SET quantity = quantity + $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(product_id.as_i64())
    .bind(units)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_overflow(e, product_id))?;
    Ok(())
}

async fn fetch_line(
    conn: &mut PgConnection,
    basket_id: BasketId,
    product_id: ProductId,
) -> Result<BasketItem> {
    let sql = format!(
        "SELECT {BASKET_ITEM_COLUMNS} FROM basket_items bi \
         JOIN products p ON p.id = bi.product_id \
         WHERE bi.basket_id = $1 AND bi.product_id = $2"
    );
    let row = sqlx::query(&sql)
        .bind(basket_id.as_uuid())
        .bind(product_id.as_i64())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::LineNotFound {
            basket_id,
            product_id,
        })?;

    PostgresStore::row_to_basket_item(row)
}

async fn fetch_basket_items(conn: &mut PgConnection, basket_id: BasketId) -> Result<Vec<BasketItem>> {
    let sql = format!(
        "SELECT {BASKET_ITEM_COLUMNS} FROM basket_items bi \
         JOIN products p ON p.id = bi.product_id \
         WHERE bi.basket_id = $1 ORDER BY bi.product_id"
    );
    let rows = sqlx::query(&sql)
        .bind(basket_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter()
        .map(PostgresStore::row_to_basket_item)
        .collect()
}

async fn load_order(conn: &mut PgConnection, username: &str, id: OrderId) -> Result<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND username = $2");
    let Some(row) = sqlx::query(&sql)
        .bind(id.as_uuid())
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query(
        r#"
        SELECT order_id, product_id, product_name, unit_price_cents, quantity
        FROM order_items
        WHERE order_id = $1
        ORDER BY product_id
        "#,
    )
    .bind(id.as_uuid())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(PostgresStore::row_to_order_item)
    .collect::<Result<Vec<_>>>()?;

    PostgresStore::row_to_order(row, items).map(Some)
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn create_category(&self, category: NewCategory) -> Result<Category> {
        let sql = format!(
            "INSERT INTO categories (name, is_active) VALUES ($1, $2) RETURNING {CATEGORY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&category.name)
            .bind(category.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                map_constraint(e, |c| {
                    (c == "unique_category_name")
                        .then(|| StoreError::DuplicateCategoryName(category.name.clone()))
                })
            })?;

        Self::row_to_category(row)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_category)
            .transpose()
    }

    async fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = $1");
        sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_category)
            .transpose()
    }

    async fn list_categories(
        &self,
        page: PageRequest,
        only_active: bool,
    ) -> Result<(Vec<Category>, u64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE ($1 = FALSE OR is_active)")
                .bind(only_active)
                .fetch_one(&self.pool)
                .await?;

        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE ($1 = FALSE OR is_active) ORDER BY id LIMIT $2 OFFSET $3"
        );
        let categories = sqlx::query(&sql)
            .bind(only_active)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Self::row_to_category)
            .collect::<Result<Vec<_>>>()?;

        Ok((categories, total.max(0) as u64))
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let sql = format!(
            "WITH inserted AS ( \
                INSERT INTO products (name, sku, unit_price_cents, quantity, category_id) \
                VALUES ($1, $2, $3, $4, $5) RETURNING * \
             ) \
             SELECT {PRODUCT_COLUMNS} FROM inserted p JOIN categories c ON c.id = p.category_id"
        );
        let row = sqlx::query(&sql)
            .bind(&product.name)
            .bind(&product.sku)
            .bind(product.unit_price.cents())
            .bind(product.quantity)
            .bind(product.category_id.as_i64())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                map_constraint(e, |c| match c {
                    "unique_product_sku" => Some(StoreError::DuplicateSku(product.sku.clone())),
                    "fk_product_category" => {
                        Some(StoreError::UnknownCategory(product.category_id))
                    }
                    _ => None,
                })
            })?;

        Self::row_to_product(row)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             JOIN categories c ON c.id = p.category_id WHERE p.id = $1"
        );
        sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_product)
            .transpose()
    }

    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             JOIN categories c ON c.id = p.category_id WHERE p.sku = $1"
        );
        sqlx::query(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_product)
            .transpose()
    }

    async fn list_products(&self, page: PageRequest) -> Result<(Vec<Product>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             JOIN categories c ON c.id = p.category_id \
             ORDER BY p.id LIMIT $1 OFFSET $2"
        );
        let products = sqlx::query(&sql)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Self::row_to_product)
            .collect::<Result<Vec<_>>>()?;

        Ok((products, total.max(0) as u64))
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             JOIN categories c ON c.id = p.category_id \
             WHERE p.name ILIKE $1 ESCAPE '\\' OR p.sku ILIKE $1 ESCAPE '\\' \
             ORDER BY p.id"
        );
        sqlx::query(&sql)
            .bind(like_pattern(query))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Self::row_to_product)
            .collect()
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR UPDATE")
                .bind(id.as_i64())
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(StoreError::ProductNotFound(id));
        }

        // Releasing every reservation must still fit in the column.
        let reserved: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM basket_items WHERE product_id = $1",
        )
        .bind(id.as_i64())
        .fetch_one(&mut *tx)
        .await?;
        if i64::from(update.quantity) + reserved > i64::from(i32::MAX) {
            return Err(StoreError::QuantityOverflow(id));
        }

        let sql = format!(
            "WITH updated AS ( \
                UPDATE products \
                SET name = $2, unit_price_cents = $3, quantity = $4, updated_at = NOW() \
                WHERE id = $1 RETURNING * \
             ) \
             SELECT {PRODUCT_COLUMNS} FROM updated p JOIN categories c ON c.id = p.category_id"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .bind(&update.name)
            .bind(update.unit_price.cents())
            .bind(update.quantity)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::ProductNotFound(id))?;

        tx.commit().await?;
        Self::row_to_product(row)
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let deleted: Option<i64> =
            sqlx::query_scalar("DELETE FROM products WHERE id = $1 RETURNING id")
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    map_constraint(e, |c| {
                        matches!(c, "fk_basket_item_product" | "fk_order_item_product")
                            .then_some(StoreError::ProductInUse(id))
                    })
                })?;

        deleted
            .map(|_| ())
            .ok_or(StoreError::ProductNotFound(id))
    }
}

#[async_trait]
impl BasketStore for PostgresStore {
    async fn find_basket(&self, username: &str) -> Result<Option<Basket>> {
        let mut conn = self.pool.acquire().await?;

        let Some(row) =
            sqlx::query("SELECT id, username, created_at, updated_at FROM baskets WHERE username = $1")
                .bind(username)
                .fetch_optional(&mut *conn)
                .await?
        else {
            return Ok(None);
        };

        let id = BasketId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let items = fetch_basket_items(&mut conn, id).await?;

        Ok(Some(Basket {
            id,
            username: row.try_get("username")?,
            items,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn ensure_basket(&self, username: &str) -> Result<Basket> {
        let mut conn = self.pool.acquire().await?;

        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(
            r#"
            INSERT INTO baskets (id, username)
            VALUES ($1, $2)
            ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
            RETURNING id, username, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .fetch_one(&mut *conn)
        .await?;

        let id = BasketId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let items = fetch_basket_items(&mut conn, id).await?;

        Ok(Basket {
            id,
            username: row.try_get("username")?,
            items,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn reserve_item(
        &self,
        basket_id: BasketId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<BasketItem> {
        let mut tx = self.pool.begin().await?;

        require_basket(&mut tx, basket_id).await?;
        take_stock(&mut tx, product_id, quantity).await?;

        sqlx::query(
            r#"
            INSERT INTO basket_items (basket_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (basket_id, product_id)
            DO UPDATE SET quantity = basket_items.quantity + EXCLUDED.quantity, updated_at = NOW()
            "#,
        )
        .bind(basket_id.as_uuid())
        .bind(product_id.as_i64())
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_overflow(e, product_id))?;

        touch_basket(&mut tx, basket_id).await?;
        let item = fetch_line(&mut tx, basket_id, product_id).await?;

        tx.commit().await?;
        Ok(item)
    }

    async fn resize_item(
        &self,
        basket_id: BasketId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<BasketItem> {
        let mut tx = self.pool.begin().await?;

        require_basket(&mut tx, basket_id).await?;

        let current: i32 = sqlx::query_scalar(
            "SELECT quantity FROM basket_items WHERE basket_id = $1 AND product_id = $2 FOR UPDATE",
        )
        .bind(basket_id.as_uuid())
        .bind(product_id.as_i64())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::LineNotFound {
            basket_id,
            product_id,
        })?;

        let delta = quantity - current;
        if delta > 0 {
            take_stock(&mut tx, product_id, delta)
                .await
                .map_err(|e| match e {
                    StoreError::InsufficientStock {
                        product_id,
                        available,
                        ..
                    } => StoreError::InsufficientStock {
                        product_id,
                        requested: quantity,
                        available: available.saturating_add(current),
                    },
                    other => other,
                })?;
        } else if delta < 0 {
            return_stock(&mut tx, product_id, -delta).await?;
        }

        sqlx::query(
            "UPDATE basket_items SET quantity = $3, updated_at = NOW() WHERE basket_id = $1 AND product_id = $2",
        )
        .bind(basket_id.as_uuid())
        .bind(product_id.as_i64())
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        touch_basket(&mut tx, basket_id).await?;
        let item = fetch_line(&mut tx, basket_id, product_id).await?;

        tx.commit().await?;
        Ok(item)
    }

    async fn release_item(&self, basket_id: BasketId, product_id: ProductId) -> Result<i32> {
        let mut tx = self.pool.begin().await?;

        require_basket(&mut tx, basket_id).await?;

        let released: i32 = sqlx::query_scalar(
            "DELETE FROM basket_items WHERE basket_id = $1 AND product_id = $2 RETURNING quantity",
        )
        .bind(basket_id.as_uuid())
        .bind(product_id.as_i64())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::LineNotFound {
            basket_id,
            product_id,
        })?;

        return_stock(&mut tx, product_id, released).await?;
        touch_basket(&mut tx, basket_id).await?;

        tx.commit().await?;
        Ok(released)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn place_order(&self, basket_id: BasketId, order: NewOrder) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        // Concurrent edits of this basket wait until the order is placed.
        require_basket(&mut tx, basket_id).await?;

        let order_id = OrderId::new();
        let items = fetch_basket_items(&mut tx, basket_id)
            .await?
            .into_iter()
            .map(|line| OrderItem {
                order_id,
                product_id: line.product_id,
                product_name: line.product_name,
                unit_price: line.unit_price,
                quantity: line.quantity,
            })
            .collect::<Vec<_>>();

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO orders (id, username, status, name, address, phone_number,
                                card_number, card_exp, card_cvv, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(&order.username)
        .bind(OrderStatus::Incomplete.as_str())
        .bind(&order.shipping.name)
        .bind(&order.shipping.address)
        .bind(&order.shipping.phone_number)
        .bind(&order.payment.card_number)
        .bind(&order.payment.card_exp)
        .bind(&order.payment.card_cvv)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, unit_price_cents, quantity)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(item.product_id.as_i64())
            .bind(&item.product_name)
            .bind(item.unit_price.cents())
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM basket_items WHERE basket_id = $1")
            .bind(basket_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        touch_basket(&mut tx, basket_id).await?;

        tx.commit().await?;

        Ok(Order {
            id: order_id,
            username: order.username,
            status: OrderStatus::Incomplete,
            shipping: order.shipping,
            payment: order.payment,
            items,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_order(&self, username: &str, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut conn, username, id).await
    }

    async fn list_orders(&self, username: &str) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE username = $1 ORDER BY created_at DESC, id"
        );
        let rows = sqlx::query(&sql)
            .bind(username)
            .fetch_all(&self.pool)
            .await?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        let item_rows = sqlx::query(
            r#"
            SELECT order_id, product_id, product_name, unit_price_cents, quantity
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY product_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        for row in item_rows {
            let item = Self::row_to_order_item(row)?;
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        rows.into_iter()
            .zip(ids)
            .map(|(row, id)| {
                let items = items_by_order
                    .remove(&OrderId::from_uuid(id))
                    .unwrap_or_default();
                Self::row_to_order(row, items)
            })
            .collect()
    }

    async fn cancel_order(&self, username: &str, id: OrderId, restock: bool) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let status: String = sqlx::query_scalar(
            "SELECT status FROM orders WHERE id = $1 AND username = $2 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .bind(username)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::OrderNotFound(id))?;

        let status = status.parse::<OrderStatus>().map_err(StoreError::Decode)?;
        if status == OrderStatus::Incomplete {
            sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(OrderStatus::Canceled.as_str())
                .execute(&mut *tx)
                .await?;

            if restock {
                let items: Vec<(i64, i32)> = sqlx::query_as(
                    "SELECT product_id, quantity FROM order_items \
                     WHERE order_id = $1 ORDER BY product_id",
                )
                .bind(id.as_uuid())
                .fetch_all(&mut *tx)
                .await?;

                for (product_id, quantity) in items {
                    return_stock(&mut tx, ProductId::new(product_id), quantity).await?;
                }
            }
        }

        let order = load_order(&mut tx, username, id)
            .await?
            .ok_or(StoreError::OrderNotFound(id))?;

        tx.commit().await?;
        Ok(order)
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn ensure_role(&self, name: &str) -> Result<()> {
        sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id, created_at",
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            map_constraint(e, |c| {
                (c == "unique_user_email").then(|| StoreError::DuplicateEmail(user.email.clone()))
            })
        })?;
        let id: i64 = row.try_get("id")?;

        for role in &user.roles {
            sqlx::query("INSERT INTO user_roles (user_id, role_name) VALUES ($1, $2)")
                .bind(id)
                .bind(role)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    map_constraint(e, |c| {
                        (c == "fk_user_role_name").then(|| StoreError::UnknownRole(role.clone()))
                    })
                })?;
        }

        tx.commit().await?;

        Ok(User {
            id: UserId::new(id),
            email: user.email,
            password_hash: user.password_hash,
            roles: user.roles,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u \
             LEFT JOIN user_roles ur ON ur.user_id = u.id \
             WHERE u.id = $1 GROUP BY u.id"
        );
        sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_user)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u \
             LEFT JOIN user_roles ur ON ur.user_id = u.id \
             WHERE u.email = $1 GROUP BY u.id"
        );
        sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_user)
            .transpose()
    }
}

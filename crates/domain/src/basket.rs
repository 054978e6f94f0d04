//! Basket manager: one basket per user, with every line backed by stock taken
//! from the product at the moment it was reserved.

use common::ProductId;
use store::{Basket, BasketItem, BasketStore};

use crate::error::{DomainError, Result};

/// Service for a user's basket.
///
/// Every operation is keyed by the caller's username; basket ids never cross
/// this boundary. Stock and basket lines change together in one store call.
#[derive(Clone)]
pub struct BasketService<S> {
    store: S,
}

impl<S: BasketStore> BasketService<S> {
    /// Creates a basket service backed by `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the user's basket without creating one.
    #[tracing::instrument(skip(self))]
    pub async fn get_basket(&self, username: &str) -> Result<Basket> {
        self.store
            .find_basket(username)
            .await
            .map_err(|e| DomainError::from_store("find_basket", e))?
            .ok_or_else(|| DomainError::BasketNotFound {
                username: username.to_string(),
            })
    }

    /// Reserves `quantity` units of a product into the user's basket,
    /// creating the basket on first use. Adding a product that is already in
    /// the basket grows its existing line.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        username: &str,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<BasketItem> {
        ensure_positive(quantity)?;

        let basket = self
            .store
            .ensure_basket(username)
            .await
            .map_err(|e| DomainError::from_store("ensure_basket", e))?;

        let item = self
            .store
            .reserve_item(basket.id, product_id, quantity)
            .await
            .map_err(|e| stock_error("reserve_item", e))?;

        metrics::counter!("basket_items_reserved_total").increment(quantity.unsigned_abs().into());
        Ok(item)
    }

    /// Sets a line to `quantity` units. Growing the line takes the difference
    /// from stock, shrinking it gives the difference back.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(
        &self,
        username: &str,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<BasketItem> {
        ensure_positive(quantity)?;
        let basket = self.get_basket(username).await?;

        let previous = basket.item(product_id).map(|item| item.quantity);
        let item = self
            .store
            .resize_item(basket.id, product_id, quantity)
            .await
            .map_err(|e| stock_error("resize_item", e))?;

        if let Some(previous) = previous
            && quantity > previous
        {
            metrics::counter!("basket_items_reserved_total")
                .increment((quantity - previous).unsigned_abs().into());
        }
        Ok(item)
    }

    /// Removes a line and returns all of its units to stock. Returns the
    /// number of units released.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, username: &str, product_id: ProductId) -> Result<i32> {
        let basket = self.get_basket(username).await?;

        self.store
            .release_item(basket.id, product_id)
            .await
            .map_err(|e| DomainError::from_store("release_item", e))
    }
}

fn ensure_positive(quantity: i32) -> Result<()> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!(
            "quantity must be greater than zero, got {quantity}"
        )));
    }
    Ok(())
}

fn stock_error(operation: &'static str, err: store::StoreError) -> DomainError {
    let err = DomainError::from_store(operation, err);
    if let DomainError::InsufficientStock {
        product_id,
        requested,
        available,
    } = &err
    {
        tracing::info!(%product_id, requested, available, "stock conflict");
        metrics::counter!("stock_conflicts_total").increment(1);
    }
    err
}

//! Order manager: turns a basket into an order and governs cancellation.

mod policy;

pub use policy::{CancellationPolicy, DEFAULT_CANCELLATION_WINDOW_DAYS};

use chrono::{DateTime, Utc};
use common::OrderId;
use store::{BasketStore, NewOrder, Order, OrderStore, PaymentDetails, ShippingDetails};

use crate::error::{DomainError, Result};
use crate::limits::{
    MAX_CARD_CVV_LEN, MAX_CARD_EXP_LEN, MAX_CARD_NUMBER_LEN, MAX_NAME_LEN, MAX_PHONE_NUMBER_LEN,
    check_length,
};

/// Shipping and payment fields submitted at checkout. All are required.
#[derive(Clone, PartialEq, Eq)]
pub struct CheckoutDetails {
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub card_number: String,
    pub card_exp: String,
    pub card_cvv: String,
}

impl CheckoutDetails {
    fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("name", &self.name),
            ("address", &self.address),
            ("phone_number", &self.phone_number),
            ("card_number", &self.card_number),
            ("card_exp", &self.card_exp),
            ("card_cvv", &self.card_cvv),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();

        if !missing.is_empty() {
            return Err(DomainError::validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        check_length("name", self.name.trim(), MAX_NAME_LEN)?;
        check_length("phone_number", self.phone_number.trim(), MAX_PHONE_NUMBER_LEN)?;
        check_length("card_number", self.card_number.trim(), MAX_CARD_NUMBER_LEN)?;
        check_length("card_exp", self.card_exp.trim(), MAX_CARD_EXP_LEN)?;

        let cvv = self.card_cvv.trim();
        let cvv_ok = (3..=MAX_CARD_CVV_LEN).contains(&cvv.len())
            && cvv.bytes().all(|b| b.is_ascii_digit());
        if !cvv_ok {
            return Err(DomainError::validation("card_cvv must be 3 or 4 digits"));
        }
        Ok(())
    }

    fn into_new_order(self, username: &str) -> NewOrder {
        NewOrder {
            username: username.to_string(),
            shipping: ShippingDetails {
                name: self.name.trim().to_string(),
                address: self.address.trim().to_string(),
                phone_number: self.phone_number.trim().to_string(),
            },
            payment: PaymentDetails {
                card_number: self.card_number.trim().to_string(),
                card_exp: self.card_exp.trim().to_string(),
                card_cvv: self.card_cvv.trim().to_string(),
            },
        }
    }
}

impl std::fmt::Debug for CheckoutDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutDetails")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("phone_number", &self.phone_number)
            .field("card_number", &"****")
            .field("card_exp", &self.card_exp)
            .field("card_cvv", &"***")
            .finish()
    }
}

/// Service for placing and cancelling orders.
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
    policy: CancellationPolicy,
}

impl<S: OrderStore + BasketStore> OrderService<S> {
    /// Creates an order service whose cancellations follow `policy`.
    pub fn new(store: S, policy: CancellationPolicy) -> Self {
        Self { store, policy }
    }

    /// The cancellation rules this service enforces.
    pub fn policy(&self) -> &CancellationPolicy {
        &self.policy
    }

    /// Lists the user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, username: &str) -> Result<Vec<Order>> {
        self.store
            .list_orders(username)
            .await
            .map_err(|e| DomainError::from_store("list_orders", e))
    }

    /// Returns one of the user's orders. Orders owned by anyone else read as
    /// missing.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, username: &str, order_id: OrderId) -> Result<Order> {
        self.store
            .find_order(username, order_id)
            .await
            .map_err(|e| DomainError::from_store("find_order", e))?
            .ok_or(DomainError::OrderNotFound(order_id))
    }

    /// Places an order from everything in the user's basket and empties the
    /// basket. Stock was already taken when the items were reserved, so it is
    /// not touched here.
    #[tracing::instrument(skip(self, details))]
    pub async fn create_order(&self, username: &str, details: CheckoutDetails) -> Result<Order> {
        details.validate()?;

        let basket = self
            .store
            .find_basket(username)
            .await
            .map_err(|e| DomainError::from_store("find_basket", e))?
            .ok_or_else(|| DomainError::BasketNotFound {
                username: username.to_string(),
            })?;

        let order = self
            .store
            .place_order(basket.id, details.into_new_order(username))
            .await
            .map_err(|e| DomainError::from_store("place_order", e))?;

        tracing::info!(order_id = %order.id, items = order.items.len(), "order placed");
        metrics::counter!("orders_placed_total").increment(1);
        Ok(order)
    }

    /// Cancels an order if it is still inside the cancellation window.
    pub async fn cancel_order(&self, username: &str, order_id: OrderId) -> Result<Order> {
        self.cancel_order_at(username, order_id, Utc::now()).await
    }

    /// Cancels an order as of `now`. Cancelling an order that is already
    /// cancelled succeeds without changing anything.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order_at(
        &self,
        username: &str,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let order = self.get_order(username, order_id).await?;

        if !self.policy.permits(order.created_at, now) {
            return Err(DomainError::CancellationWindowExpired {
                order_id,
                placed_at: order.created_at,
            });
        }

        let cancelled = self
            .store
            .cancel_order(username, order_id, self.policy.restock_on_cancel())
            .await
            .map_err(|e| DomainError::from_store("cancel_order", e))?;

        if !order.is_canceled() {
            metrics::counter!("orders_cancelled_total").increment(1);
        }
        Ok(cancelled)
    }
}

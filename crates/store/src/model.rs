//! Records persisted by the store.

use chrono::{DateTime, Utc};
use common::{BasketId, CategoryId, Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub is_active: bool,
}

impl NewCategory {
    pub fn new(name: impl Into<String>, is_active: bool) -> Self {
        Self {
            name: name.into(),
            is_active,
        }
    }
}

/// A catalog product together with its category's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub unit_price: Money,
    /// Units available for new reservations. Never negative.
    pub quantity: i32,
    pub category_id: CategoryId,
    pub category_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub unit_price: Money,
    pub quantity: i32,
    pub category_id: CategoryId,
}

/// Replacement values for a product's mutable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductUpdate {
    pub name: String,
    pub unit_price: Money,
    pub quantity: i32,
}

/// A user's basket and its reserved lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Basket {
    pub id: BasketId,
    pub username: String,
    pub items: Vec<BasketItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Basket {
    /// Returns the line for a product, if any.
    pub fn item(&self, product_id: ProductId) -> Option<&BasketItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Returns true if the basket has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all line totals at current catalog prices.
    pub fn total_price(&self) -> Money {
        self.items.iter().map(BasketItem::line_total).sum()
    }
}

/// One reserved line in a basket. At most one per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasketItem {
    pub basket_id: BasketId,
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub unit_price: Money,
    /// Reserved units, always greater than zero.
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BasketItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed and still open.
    #[default]
    Incomplete,

    /// Cancelled by its owner (terminal state).
    Canceled,
}

impl OrderStatus {
    /// Returns the status name as stored and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Incomplete => "incomplete",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "incomplete" => Ok(OrderStatus::Incomplete),
            "canceled" => Ok(OrderStatus::Canceled),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingDetails {
    pub name: String,
    pub address: String,
    pub phone_number: String,
}

/// Card details captured with an order. Nothing is charged.
#[derive(Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub card_number: String,
    pub card_exp: String,
    pub card_cvv: String,
}

impl PaymentDetails {
    /// Returns the card number with everything but the last four digits hidden.
    pub fn masked_card_number(&self) -> String {
        let digits: Vec<char> = self.card_number.chars().filter(char::is_ascii_digit).collect();
        let visible: String = digits[digits.len().saturating_sub(4)..].iter().collect();
        format!("**** {visible}")
    }
}

impl std::fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentDetails")
            .field("card_number", &self.masked_card_number())
            .field("card_exp", &self.card_exp)
            .field("card_cvv", &"***")
            .finish()
    }
}

/// A placed order. Shipping and payment fields never change after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub username: String,
    pub status: OrderStatus,
    pub shipping: ShippingDetails,
    pub payment: PaymentDetails,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_canceled(&self) -> bool {
        self.status == OrderStatus::Canceled
    }

    /// Sum of all line totals at the prices captured when the order was placed.
    pub fn total_price(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

/// Snapshot of a basket line taken when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: i32,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Input for placing an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub username: String,
    pub shipping: ShippingDetails,
    pub payment: PaymentDetails,
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Input for registering an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_round_trips_through_text() {
        assert_eq!("incomplete".parse::<OrderStatus>(), Ok(OrderStatus::Incomplete));
        assert_eq!("canceled".parse::<OrderStatus>(), Ok(OrderStatus::Canceled));
        assert!("shipped".parse::<OrderStatus>().is_err());
        assert_eq!(OrderStatus::Canceled.to_string(), "canceled");
    }

    #[test]
    fn masked_card_number_keeps_last_four_digits() {
        let payment = PaymentDetails {
            card_number: "4111 1111 1111 1234".to_string(),
            card_exp: "12/30".to_string(),
            card_cvv: "123".to_string(),
        };
        assert_eq!(payment.masked_card_number(), "**** 1234");

        let debug = format!("{payment:?}");
        assert!(!debug.contains("4111"));
        assert!(debug.contains("card_cvv: \"***\""));
    }

    #[test]
    fn masked_card_number_handles_short_input() {
        let payment = PaymentDetails {
            card_number: "12".to_string(),
            card_exp: String::new(),
            card_cvv: String::new(),
        };
        assert_eq!(payment.masked_card_number(), "**** 12");
    }
}

//! Order placement, listing and cancellation for the calling user.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use domain::CheckoutDetails;
use serde::{Deserialize, Serialize};
use store::{Order, OrderItem, OrderStatus, Store};

use crate::auth::Identity;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub card_exp: String,
    #[serde(default)]
    pub card_cvv: String,
}

impl From<CreateOrderRequest> for CheckoutDetails {
    fn from(req: CreateOrderRequest) -> Self {
        CheckoutDetails {
            name: req.name,
            address: req.address,
            phone_number: req.phone_number,
            card_number: req.card_number,
            card_exp: req.card_exp,
            card_cvv: req.card_cvv,
        }
    }
}

// -- Response types --

/// An order as returned to its owner. The card number is masked and the CVV
/// is never included.
#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub status: OrderStatus,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub card_number: String,
    pub card_exp: String,
    pub items: Vec<OrderItem>,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            status: order.status,
            total_price: order.total_price(),
            card_number: order.payment.masked_card_number(),
            card_exp: order.payment.card_exp,
            name: order.shipping.name,
            address: order.shipping.address,
            phone_number: order.shipping.phone_number,
            items: order.items,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// GET /order: the caller's orders, newest first.
#[tracing::instrument(skip(state, identity), fields(username = %identity.email))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_orders(&identity.email).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// POST /order: checks out the caller's basket.
#[tracing::instrument(skip(state, identity, req), fields(username = %identity.email))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .orders
        .create_order(&identity.email, req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// PATCH /order/{id}/cancel
#[tracing::instrument(skip(state, identity), fields(username = %identity.email))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.cancel_order(&identity.email, id).await?;
    Ok(Json(order.into()))
}

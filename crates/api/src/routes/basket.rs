//! Basket endpoints for the calling user.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use common::{BasketId, Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{Basket, BasketItem, Store};

use crate::auth::Identity;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BasketItemRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct RemoveItemRequest {
    pub product_id: ProductId,
}

#[derive(Serialize)]
pub struct BasketResponse {
    pub id: BasketId,
    pub items: Vec<BasketItem>,
    pub total_price: Money,
}

impl From<Basket> for BasketResponse {
    fn from(basket: Basket) -> Self {
        Self {
            id: basket.id,
            total_price: basket.total_price(),
            items: basket.items,
        }
    }
}

#[derive(Serialize)]
pub struct RemovedResponse {
    pub product_id: ProductId,
    pub released: i32,
}

/// GET /basket
#[tracing::instrument(skip(state, identity), fields(username = %identity.email))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<BasketResponse>, ApiError> {
    let basket = state.baskets.get_basket(&identity.email).await?;
    Ok(Json(basket.into()))
}

/// POST /basket: reserves units and adds them to the basket.
#[tracing::instrument(skip(state, identity), fields(username = %identity.email))]
pub async fn add<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<BasketItemRequest>,
) -> Result<(StatusCode, Json<BasketItem>), ApiError> {
    let item = state
        .baskets
        .add_item(&identity.email, req.product_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /basket: sets a line to a new quantity.
#[tracing::instrument(skip(state, identity), fields(username = %identity.email))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<BasketItemRequest>,
) -> Result<Json<BasketItem>, ApiError> {
    let item = state
        .baskets
        .update_item(&identity.email, req.product_id, req.quantity)
        .await?;
    Ok(Json(item))
}

/// DELETE /basket: drops a line and releases its units.
#[tracing::instrument(skip(state, identity), fields(username = %identity.email))]
pub async fn remove<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<RemoveItemRequest>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let released = state
        .baskets
        .remove_item(&identity.email, req.product_id)
        .await?;
    Ok(Json(RemovedResponse {
        product_id: req.product_id,
        released,
    }))
}

//! Product endpoints. Reads are open to any caller, mutations need the admin
//! role.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use common::{CategoryId, Money, Page, ProductId};
use domain::ROLE_ADMIN;
use serde::Deserialize;
use store::{NewProduct, Product, ProductUpdate, Store};

use crate::auth::{Identity, require_role};
use crate::error::ApiError;
use crate::routes::PageParams;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub sku: String,
    /// Price in cents.
    pub unit_price: Money,
    pub quantity: i32,
    pub category_id: CategoryId,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: String,
    /// Price in cents.
    pub unit_price: Money,
    pub quantity: i32,
}

/// GET /product
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Product>>, ApiError> {
    Ok(Json(state.catalog.list_products(params.request()).await?))
}

/// GET /product/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.catalog.get_product(id).await?))
}

/// GET /product/search/{query}: matches name or SKU, case-insensitively.
#[tracing::instrument(skip(state))]
pub async fn search<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(query): Path<String>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog.search_products(&query).await?))
}

/// POST /product (admin)
#[tracing::instrument(skip(state, identity, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    require_role(&state, &identity, ROLE_ADMIN).await?;

    let product = state
        .catalog
        .create_product(NewProduct {
            name: req.name,
            sku: req.sku,
            unit_price: req.unit_price,
            quantity: req.quantity,
            category_id: req.category_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /product/{id} (admin)
#[tracing::instrument(skip(state, identity, req))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<ProductId>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    require_role(&state, &identity, ROLE_ADMIN).await?;

    let product = state
        .catalog
        .update_product(
            id,
            ProductUpdate {
                name: req.name,
                unit_price: req.unit_price,
                quantity: req.quantity,
            },
        )
        .await?;
    Ok(Json(product))
}

/// DELETE /product/{id} (admin)
#[tracing::instrument(skip(state, identity))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, ApiError> {
    require_role(&state, &identity, ROLE_ADMIN).await?;

    state.catalog.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

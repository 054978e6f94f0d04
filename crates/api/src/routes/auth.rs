//! Login and registration.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use store::Store;

use crate::auth::IssuedToken;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login: exchanges credentials for a bearer token.
#[tracing::instrument(skip(state, req))]
pub async fn login<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<IssuedToken>, ApiError> {
    let user = state.users.authenticate(&req.email, &req.password).await?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(state.tokens.issue(&user)?))
}

/// POST /auth/register: creates a customer account and logs it in.
#[tracing::instrument(skip(state, req))]
pub async fn register<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<IssuedToken>), ApiError> {
    let user = state.users.register(&req.email, &req.password).await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(state.tokens.issue(&user)?)))
}

//! Category endpoints.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use common::{CategoryId, Page};
use domain::{ImportSummary, ROLE_ADMIN};
use serde::Deserialize;
use store::{Category, Store};

use crate::auth::{Identity, require_role};
use crate::error::ApiError;
use crate::routes::PageParams;
use crate::state::AppState;

/// Multipart field that carries the CSV upload.
const UPLOAD_FIELD: &str = "file";

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

/// GET /category: active categories, paginated.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Category>>, ApiError> {
    Ok(Json(state.catalog.list_categories(params.request(), true).await?))
}

/// GET /category/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<CategoryId>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.catalog.get_category(id).await?))
}

/// POST /category (admin)
#[tracing::instrument(skip(state, identity, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    require_role(&state, &identity, ROLE_ADMIN).await?;

    let category = state
        .catalog
        .create_category(&req.name, req.is_active)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// POST /category/bulk (admin): imports categories from a `text/csv` upload.
#[tracing::instrument(skip(state, identity, multipart))]
pub async fn bulk<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> Result<Json<ImportSummary>, ApiError> {
    require_role(&state, &identity, ROLE_ADMIN).await?;

    let mut upload: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("multipart error: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !is_csv(&content_type) {
            return Err(ApiError::BadRequest(format!(
                "expected a text/csv upload, got '{content_type}'"
            )));
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(format!("unable to read upload: {e}")))?;
        upload = Some(text);
        break;
    }

    let csv = upload.ok_or_else(|| {
        ApiError::BadRequest(format!("missing multipart field '{UPLOAD_FIELD}'"))
    })?;
    Ok(Json(state.catalog.import_categories(&csv).await?))
}

fn is_csv(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/csv"))
}

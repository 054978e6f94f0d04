//! HTTP API server for the storefront.
//!
//! Exposes the catalog, basket and order services under `/api/v1` behind
//! bearer-token authentication, with structured logging (tracing) and
//! Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let public = Router::new()
        .route("/auth/login", post(routes::auth::login::<S>))
        .route("/auth/register", post(routes::auth::register::<S>));

    let protected = Router::new()
        .route(
            "/category",
            get(routes::categories::list::<S>).post(routes::categories::create::<S>),
        )
        .route("/category/bulk", post(routes::categories::bulk::<S>))
        .route("/category/{id}", get(routes::categories::get::<S>))
        .route(
            "/product",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route("/product/search/{query}", get(routes::products::search::<S>))
        .route(
            "/product/{id}",
            get(routes::products::get::<S>)
                .put(routes::products::update::<S>)
                .delete(routes::products::delete::<S>),
        )
        .route(
            "/basket",
            get(routes::basket::get::<S>)
                .post(routes::basket::add::<S>)
                .put(routes::basket::update::<S>)
                .delete(routes::basket::remove::<S>),
        )
        .route(
            "/order",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route("/order/{id}/cancel", patch(routes::orders::cancel::<S>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth::<S>,
        ));

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api/v1", public.merge(protected))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

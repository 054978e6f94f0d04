//! Shared application state.

use std::sync::Arc;

use domain::{BasketService, CatalogService, DomainError, OrderService, UserService};
use store::Store;

use crate::auth::TokenIssuer;
use crate::config::Config;

/// Category every fresh installation starts with.
pub const DEFAULT_CATEGORY: &str = "General";

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub catalog: CatalogService<S>,
    pub baskets: BasketService<S>,
    pub orders: OrderService<S>,
    pub users: UserService<S>,
    pub tokens: TokenIssuer,
}

impl<S: Store> AppState<S> {
    /// Wires every service onto one store.
    pub fn new(store: S, config: &Config) -> Arc<Self> {
        Arc::new(Self {
            catalog: CatalogService::new(store.clone()),
            baskets: BasketService::new(store.clone()),
            orders: OrderService::new(store.clone(), config.cancellation_policy()),
            users: UserService::new(store),
            tokens: TokenIssuer::new(&config.jwt_secret, &config.jwt_issuer, config.jwt_ttl_hours),
        })
    }

    /// Creates the built-in roles, the configured administrator and the
    /// default category. Safe to run on every start-up.
    pub async fn seed(&self, config: &Config) -> Result<(), DomainError> {
        self.users.ensure_roles().await?;

        match (&config.admin_email, &config.admin_password) {
            (Some(email), Some(password)) => {
                self.users.ensure_admin(email, password).await?;
            }
            _ => tracing::warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set, no administrator seeded"),
        }

        match self.catalog.create_category(DEFAULT_CATEGORY, true).await {
            Ok(category) => tracing::info!(category_id = %category.id, "default category created"),
            Err(DomainError::DuplicateCategoryName(_)) => {}
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

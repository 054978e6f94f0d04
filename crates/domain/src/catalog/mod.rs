//! Categories and products.

mod import;

pub use import::{CategoryRow, ImportSummary, parse_categories};

use common::{CategoryId, Page, PageRequest, ProductId};
use store::{CatalogStore, Category, NewCategory, NewProduct, Product, ProductUpdate};

use crate::error::{DomainError, Result};
use crate::limits::{MAX_NAME_LEN, MAX_SKU_LEN, check_length};

/// Service for the product catalog.
#[derive(Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S: CatalogStore> CatalogService<S> {
    /// Creates a catalog service backed by `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_categories(
        &self,
        page: PageRequest,
        only_active: bool,
    ) -> Result<Page<Category>> {
        let (items, total) = self
            .store
            .list_categories(page, only_active)
            .await
            .map_err(|e| DomainError::from_store("list_categories", e))?;
        Ok(Page::new(items, page, total))
    }

    /// Returns an active category. Inactive categories read as missing.
    #[tracing::instrument(skip(self))]
    pub async fn get_category(&self, id: CategoryId) -> Result<Category> {
        self.store
            .get_category(id)
            .await
            .map_err(|e| DomainError::from_store("get_category", e))?
            .filter(|category| category.is_active)
            .ok_or(DomainError::CategoryNotFound(id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_category(&self, name: &str, is_active: bool) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("category name is required"));
        }
        check_length("category name", name, MAX_NAME_LEN)?;

        self.store
            .create_category(NewCategory::new(name, is_active))
            .await
            .map_err(|e| DomainError::from_store("create_category", e))
    }

    /// Creates every category listed in `csv` that does not exist yet.
    ///
    /// The whole input is parsed before anything is written, so a malformed
    /// row aborts the import without creating any category.
    #[tracing::instrument(skip(self, csv), fields(bytes = csv.len()))]
    pub async fn import_categories(&self, csv: &str) -> Result<ImportSummary> {
        let rows = parse_categories(csv)?;
        let mut summary = ImportSummary::default();

        for row in rows {
            let existing = self
                .store
                .get_category_by_name(&row.name)
                .await
                .map_err(|e| DomainError::from_store("get_category_by_name", e))?;
            if existing.is_some() {
                summary.existing += 1;
                continue;
            }

            match self
                .store
                .create_category(NewCategory::new(row.name, row.is_active))
                .await
                .map_err(|e| DomainError::from_store("create_category", e))
            {
                Ok(_) => summary.added += 1,
                Err(DomainError::DuplicateCategoryName(_)) => summary.existing += 1,
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            added = summary.added,
            existing = summary.existing,
            "categories imported"
        );
        metrics::counter!("categories_imported_total").increment(summary.added as u64);
        Ok(summary)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self, page: PageRequest) -> Result<Page<Product>> {
        let (items, total) = self
            .store
            .list_products(page)
            .await
            .map_err(|e| DomainError::from_store("list_products", e))?;
        Ok(Page::new(items, page, total))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.store
            .get_product(id)
            .await
            .map_err(|e| DomainError::from_store("get_product", e))?
            .ok_or(DomainError::ProductNotFound(id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        self.store
            .get_product_by_sku(sku)
            .await
            .map_err(|e| DomainError::from_store("get_product_by_sku", e))
    }

    #[tracing::instrument(skip(self))]
    pub async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DomainError::validation("search query is required"));
        }

        self.store
            .search_products(query)
            .await
            .map_err(|e| DomainError::from_store("search_products", e))
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let product = NewProduct {
            name: product.name.trim().to_string(),
            sku: product.sku.trim().to_string(),
            ..product
        };
        if product.name.is_empty() {
            return Err(DomainError::validation("product name is required"));
        }
        if product.sku.is_empty() {
            return Err(DomainError::validation("product sku is required"));
        }
        check_length("product name", &product.name, MAX_NAME_LEN)?;
        check_length("product sku", &product.sku, MAX_SKU_LEN)?;
        validate_price_and_stock(&product.unit_price, product.quantity)?;

        self.store
            .create_product(product)
            .await
            .map_err(|e| DomainError::from_store("create_product", e))
    }

    /// Replaces a product's name, price and quantity-on-hand.
    #[tracing::instrument(skip(self))]
    pub async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let update = ProductUpdate {
            name: update.name.trim().to_string(),
            ..update
        };
        if update.name.is_empty() {
            return Err(DomainError::validation("product name is required"));
        }
        check_length("product name", &update.name, MAX_NAME_LEN)?;
        validate_price_and_stock(&update.unit_price, update.quantity)?;

        self.store
            .update_product(id, update)
            .await
            .map_err(|e| DomainError::from_store("update_product", e))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        self.store
            .delete_product(id)
            .await
            .map_err(|e| DomainError::from_store("delete_product", e))
    }
}

fn validate_price_and_stock(unit_price: &common::Money, quantity: i32) -> Result<()> {
    if unit_price.is_negative() {
        return Err(DomainError::validation("unit price cannot be negative"));
    }
    if quantity < 0 {
        return Err(DomainError::validation("quantity cannot be negative"));
    }
    Ok(())
}

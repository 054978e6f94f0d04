//! HTTP route handlers.

pub mod auth;
pub mod basket;
pub mod categories;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use common::PageRequest;
use serde::Deserialize;

/// Pagination query string: `?page=2&pageSize=20`.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    #[serde(rename = "pageSize", alias = "page_size")]
    pub page_size: Option<u32>,
}

impl PageParams {
    pub fn request(&self) -> PageRequest {
        PageRequest::from_params(self.page, self.page_size)
    }
}

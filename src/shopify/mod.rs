// shopifysync/src/shopify/mod.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;

pub mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod models;
pub mod pagination;

pub use client::ShopifyClient;
pub use models::{CreatedProduct, Page, PageQuery, ProductPayload, RemoteResource, VariantPayload};

/// The slice of the Shopify Admin API the orchestrator talks to.
#[async_trait]
pub trait CommerceApi: Send + Sync {
    /// Fetches one page of products or orders.
    async fn fetch_page(&self, resource: RemoteResource, query: &PageQuery) -> Result<Page>;

    async fn count(
        &self,
        resource: RemoteResource,
        created_at_min: Option<DateTime<Utc>>,
    ) -> Result<u64>;

    async fn create_product(&self, payload: &ProductPayload) -> Result<CreatedProduct>;

    async fn update_product(&self, remote_id: u64, payload: &ProductPayload) -> Result<()>;

    async fn update_variant(&self, remote_id: u64, payload: &VariantPayload) -> Result<()>;

    /// Sets the available quantity of a variant at the store's primary location.
    async fn set_inventory_level(&self, variant_remote_id: u64, available: i64) -> Result<()>;

    async fn shop_name(&self) -> Result<String>;
}

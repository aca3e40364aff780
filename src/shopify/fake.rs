// shopifysync/src/shopify/fake.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::models::{CreatedProduct, CreatedVariant, Page, PageQuery, ProductPayload, RemoteResource, VariantPayload};
use super::CommerceApi;
use crate::errors::{Result, SyncError};

/// Scripted in-process stand-in for the Shopify API. Pages are served in the
/// order they were pushed; every call is recorded for assertions.
pub(crate) struct FakeCommerceApi {
    pages: Mutex<VecDeque<Result<Page>>>,
    counts: Mutex<Vec<(RemoteResource, u64)>>,
    shop: Option<String>,
    failing_titles: Mutex<HashSet<String>>,
    failing_variants: Mutex<HashSet<u64>>,
    next_id: AtomicU64,
    pub queries: Mutex<Vec<(RemoteResource, PageQuery)>>,
    pub created: Mutex<Vec<ProductPayload>>,
    pub updated_products: Mutex<Vec<(u64, ProductPayload)>>,
    pub updated_variants: Mutex<Vec<(u64, VariantPayload)>>,
    pub inventory_levels: Mutex<Vec<(u64, i64)>>,
}

impl Default for FakeCommerceApi {
    fn default() -> Self {
        Self {
            pages: Mutex::new(VecDeque::new()),
            counts: Mutex::new(Vec::new()),
            shop: Some("Test Store".to_string()),
            failing_titles: Mutex::new(HashSet::new()),
            failing_variants: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1000),
            queries: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            updated_products: Mutex::new(Vec::new()),
            updated_variants: Mutex::new(Vec::new()),
            inventory_levels: Mutex::new(Vec::new()),
        }
    }
}

impl FakeCommerceApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fake whose credentials are rejected.
    pub fn unauthorized() -> Self {
        Self {
            shop: None,
            ..Self::default()
        }
    }

    pub fn push_page(&self, records: Vec<Value>, next_cursor: Option<&str>) {
        self.pages.lock().unwrap().push_back(Ok(Page {
            records,
            next_cursor: next_cursor.map(str::to_string),
        }));
    }

    pub fn push_error(&self, error: SyncError) {
        self.pages.lock().unwrap().push_back(Err(error));
    }

    pub fn set_count(&self, resource: RemoteResource, count: u64) {
        self.counts.lock().unwrap().push((resource, count));
    }

    /// Create and update calls for a product with this title fail with HTTP 422.
    pub fn fail_title(&self, title: &str) {
        self.failing_titles.lock().unwrap().insert(title.to_string());
    }

    /// Inventory updates for this variant fail with HTTP 422.
    pub fn fail_variant(&self, remote_id: u64) {
        self.failing_variants.lock().unwrap().insert(remote_id);
    }

    pub fn recorded_queries(&self) -> Vec<(RemoteResource, PageQuery)> {
        self.queries.lock().unwrap().clone()
    }

    fn check_title(&self, title: &str) -> Result<()> {
        if self.failing_titles.lock().unwrap().contains(title) {
            return Err(SyncError::Remote {
                status: 422,
                body: format!("{{\"errors\":{{\"title\":[\"{} rejected\"]}}}}", title),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CommerceApi for FakeCommerceApi {
    async fn fetch_page(&self, resource: RemoteResource, query: &PageQuery) -> Result<Page> {
        self.queries.lock().unwrap().push((resource, query.clone()));
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Page::default()))
    }

    async fn count(
        &self,
        resource: RemoteResource,
        _created_at_min: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        self.counts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(r, _)| *r == resource)
            .map(|(_, count)| *count)
            .ok_or_else(|| SyncError::TransientNetwork("count unavailable".to_string()))
    }

    async fn create_product(&self, payload: &ProductPayload) -> Result<CreatedProduct> {
        self.check_title(&payload.title)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().push(payload.clone());
        Ok(CreatedProduct {
            id,
            variants: (0..payload.variants.len() as u64)
                .map(|i| CreatedVariant {
                    id: id * 100 + i,
                    position: Some(i as u32 + 1),
                })
                .collect(),
        })
    }

    async fn update_product(&self, remote_id: u64, payload: &ProductPayload) -> Result<()> {
        self.check_title(&payload.title)?;
        self.updated_products
            .lock()
            .unwrap()
            .push((remote_id, payload.clone()));
        Ok(())
    }

    async fn update_variant(&self, remote_id: u64, payload: &VariantPayload) -> Result<()> {
        self.updated_variants
            .lock()
            .unwrap()
            .push((remote_id, payload.clone()));
        Ok(())
    }

    async fn set_inventory_level(&self, variant_remote_id: u64, available: i64) -> Result<()> {
        if self.failing_variants.lock().unwrap().contains(&variant_remote_id) {
            return Err(SyncError::Remote {
                status: 422,
                body: "{\"errors\":[\"Inventory item does not have inventory tracking enabled\"]}".to_string(),
            });
        }
        self.inventory_levels
            .lock()
            .unwrap()
            .push((variant_remote_id, available));
        Ok(())
    }

    async fn shop_name(&self) -> Result<String> {
        self.shop
            .clone()
            .ok_or_else(|| SyncError::Authentication("HTTP 401: Invalid API key or access token".to_string()))
    }
}

// shopifysync/src/shopify/client.rs
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, LINK};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

use super::models::{CreatedProduct, Page, PageQuery, ProductPayload, RemoteResource, VariantPayload};
use super::pagination::parse_continuation_token;
use super::CommerceApi;
use crate::config::ShopifyConfig;
use crate::errors::{Result, SyncError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
// Error bodies are kept for the sync log, but not whole HTML error pages.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Serialize, Deserialize)]
struct ProductEnvelope<T> {
    product: T,
}

#[derive(Serialize)]
struct VariantEnvelope<'a> {
    variant: &'a VariantPayload,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Deserialize)]
struct VariantInventoryItem {
    inventory_item_id: u64,
}

#[derive(Deserialize)]
struct VariantResponse {
    variant: VariantInventoryItem,
}

#[derive(Deserialize)]
struct Location {
    id: u64,
}

#[derive(Deserialize)]
struct LocationsResponse {
    locations: Vec<Location>,
}

#[derive(Deserialize)]
struct Shop {
    name: String,
}

#[derive(Deserialize)]
struct ShopResponse {
    shop: Shop,
}

/// reqwest-backed Shopify Admin REST client.
pub struct ShopifyClient {
    client: reqwest::Client,
    base_url: Url,
    location_id: OnceCell<u64>,
}

impl ShopifyClient {
    pub fn new(config: &ShopifyConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&config.access_token).map_err(|_| {
            SyncError::Configuration("Shopify access token contains invalid characters".to_string())
        })?;
        headers.insert(ACCESS_TOKEN_HEADER, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = api_base_url(&config.store_url, &config.api_version)?;

        Ok(Self {
            client,
            base_url,
            location_id: OnceCell::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<Response> {
        debug!(%url, "Shopify request");
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect();
        Err(classify_status(status, body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self.send(self.client.get(url.clone()), &url).await?;
        decode(response, &url).await
    }

    /// First location of the store, looked up once per client.
    async fn primary_location(&self) -> Result<u64> {
        let id = self
            .location_id
            .get_or_try_init(|| async {
                let response: LocationsResponse = self.get_json("locations.json").await?;
                response
                    .locations
                    .first()
                    .map(|location| location.id)
                    .ok_or_else(|| SyncError::InvalidResponse("store has no locations".to_string()))
            })
            .await?;
        Ok(*id)
    }
}

async fn decode<T: DeserializeOwned>(response: Response, url: &Url) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| SyncError::InvalidResponse(format!("{}: {}", url, e)))
}

fn timestamp_param(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Maps a non-success HTTP status onto the error taxonomy.
pub(crate) fn classify_status(status: StatusCode, body: String) -> SyncError {
    match status.as_u16() {
        401 | 403 => SyncError::Authentication(format!("HTTP {}: {}", status.as_u16(), body)),
        429 => SyncError::TransientNetwork(format!("rate limited (HTTP 429): {}", body)),
        code if status.is_server_error() => {
            SyncError::TransientNetwork(format!("HTTP {}: {}", code, body))
        }
        code => SyncError::Remote { status: code, body },
    }
}

#[async_trait]
impl CommerceApi for ShopifyClient {
    async fn fetch_page(&self, resource: RemoteResource, query: &PageQuery) -> Result<Page> {
        let url = self.endpoint(resource.endpoint())?;

        let params: Vec<(&str, String)> = match query {
            PageQuery::Initial {
                limit,
                created_at_min,
                updated_at_min,
            } => {
                let mut params = vec![
                    ("limit", limit.to_string()),
                    ("fields", resource.fields().to_string()),
                    ("order", "updated_at asc".to_string()),
                ];
                if resource == RemoteResource::Orders {
                    params.push(("status", "any".to_string()));
                }
                if let Some(created) = created_at_min {
                    params.push(("created_at_min", timestamp_param(created)));
                }
                if let Some(updated) = updated_at_min {
                    params.push(("updated_at_min", timestamp_param(updated)));
                }
                params
            }
            // Shopify rejects filter parameters alongside page_info.
            PageQuery::Continue { limit, cursor } => vec![
                ("limit", limit.to_string()),
                ("page_info", cursor.clone()),
            ],
        };

        let response = self
            .send(self.client.get(url.clone()).query(&params), &url)
            .await?;

        let next_cursor = parse_continuation_token(
            response.headers().get(LINK).and_then(|value| value.to_str().ok()),
        );

        let mut body: Value = decode(response, &url).await?;
        let records = match body.get_mut(resource.collection_key()).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(SyncError::InvalidResponse(format!(
                    "{}: response has no '{}' array",
                    url,
                    resource.collection_key()
                )));
            }
        };

        debug!(count = records.len(), has_next = next_cursor.is_some(), "Fetched page");
        Ok(Page {
            records,
            next_cursor,
        })
    }

    async fn count(
        &self,
        resource: RemoteResource,
        created_at_min: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        let url = self.endpoint(resource.count_endpoint())?;
        let mut params: Vec<(&str, String)> = Vec::new();
        if resource == RemoteResource::Orders {
            params.push(("status", "any".to_string()));
        }
        if let Some(created) = created_at_min {
            params.push(("created_at_min", timestamp_param(&created)));
        }

        let response = self
            .send(self.client.get(url.clone()).query(&params), &url)
            .await?;
        let count: CountResponse = decode(response, &url).await?;
        Ok(count.count)
    }

    async fn create_product(&self, payload: &ProductPayload) -> Result<CreatedProduct> {
        let url = self.endpoint("products.json")?;
        let request = self
            .client
            .post(url.clone())
            .json(&ProductEnvelope { product: payload });
        let response = self.send(request, &url).await?;
        let created: ProductEnvelope<CreatedProduct> = decode(response, &url).await?;
        Ok(created.product)
    }

    async fn update_product(&self, remote_id: u64, payload: &ProductPayload) -> Result<()> {
        let url = self.endpoint(&format!("products/{}.json", remote_id))?;
        let request = self
            .client
            .put(url.clone())
            .json(&ProductEnvelope { product: payload });
        self.send(request, &url).await?;
        Ok(())
    }

    async fn update_variant(&self, remote_id: u64, payload: &VariantPayload) -> Result<()> {
        let url = self.endpoint(&format!("variants/{}.json", remote_id))?;
        let request = self
            .client
            .put(url.clone())
            .json(&VariantEnvelope { variant: payload });
        self.send(request, &url).await?;
        Ok(())
    }

    async fn set_inventory_level(&self, variant_remote_id: u64, available: i64) -> Result<()> {
        let location_id = self.primary_location().await?;
        let variant: VariantResponse = self
            .get_json(&format!("variants/{}.json", variant_remote_id))
            .await?;

        let url = self.endpoint("inventory_levels/set.json")?;
        let request = self.client.post(url.clone()).json(&json!({
            "location_id": location_id,
            "inventory_item_id": variant.variant.inventory_item_id,
            "available": available,
        }));
        self.send(request, &url).await?;
        Ok(())
    }

    async fn shop_name(&self) -> Result<String> {
        let response: ShopResponse = self.get_json("shop.json").await?;
        Ok(response.shop.name)
    }
}

/// `admin/api/<version>/` under the store URL. A store URL with a path keeps
/// it, so the path gets a trailing slash before joining.
fn api_base_url(store_url: &Url, api_version: &str) -> Result<Url> {
    let mut root = store_url.clone();
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    Ok(root.join(&format!("admin/api/{}/", api_version))?)
}

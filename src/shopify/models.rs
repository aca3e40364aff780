// shopifysync/src/shopify/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Shopify sends `null` for empty collections on some endpoints.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteResource {
    Products,
    Orders,
}

impl RemoteResource {
    pub fn endpoint(&self) -> &'static str {
        match self {
            RemoteResource::Products => "products.json",
            RemoteResource::Orders => "orders.json",
        }
    }

    pub fn count_endpoint(&self) -> &'static str {
        match self {
            RemoteResource::Products => "products/count.json",
            RemoteResource::Orders => "orders/count.json",
        }
    }

    /// Key of the record array in list responses.
    pub fn collection_key(&self) -> &'static str {
        match self {
            RemoteResource::Products => "products",
            RemoteResource::Orders => "orders",
        }
    }

    pub fn fields(&self) -> &'static str {
        match self {
            RemoteResource::Products => {
                "id,title,variants,images,product_type,updated_at,vendor,status,body_html"
            }
            RemoteResource::Orders => {
                "id,name,email,created_at,updated_at,currency,customer,line_items,shipping_address,financial_status"
            }
        }
    }
}

/// A single list request. The continuation token already encodes the filters
/// of the query that produced it, so only `limit` may accompany it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageQuery {
    Initial {
        limit: u32,
        created_at_min: Option<DateTime<Utc>>,
        updated_at_min: Option<DateTime<Utc>>,
    },
    Continue {
        limit: u32,
        cursor: String,
    },
}

/// One page of raw records. Records stay as JSON so that a malformed record
/// fails on its own during mapping instead of failing the whole page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<serde_json::Value>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteProduct {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variants: Vec<RemoteVariant>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<RemoteImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteVariant {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteImage {
    #[serde(default)]
    pub src: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteOrder {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub financial_status: Option<String>,
    #[serde(default)]
    pub customer: Option<RemoteCustomer>,
    #[serde(default)]
    pub shipping_address: Option<RemoteAddress>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub line_items: Vec<RemoteLineItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteCustomer {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteAddress {
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub province_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteLineItem {
    pub id: u64,
    #[serde(default)]
    pub variant_id: Option<u64>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
}

// Outbound payloads

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub title: String,
    pub body_html: String,
    pub vendor: String,
    pub product_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_quantity: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedProduct {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variants: Vec<CreatedVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedVariant {
    pub id: u64,
    #[serde(default)]
    pub position: Option<u32>,
}

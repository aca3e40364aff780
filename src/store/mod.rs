// shopifysync/src/store/mod.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::errors::Result;
use crate::sync::state::{Resource, SyncCursorState};

#[cfg(test)]
pub(crate) mod memory;
pub mod postgres;

pub use postgres::PgStore;

pub const PRODUCT_CODE_PREFIX: &str = "SHOPIFY_";
pub const VARIANT_CODE_PREFIX: &str = "SHOPIFY_VAR_";
pub const UNKNOWN_CODE_PREFIX: &str = "SHOPIFY_UNKNOWN_";
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Local code of a product linked to a remote product. Orders use the same
/// shape for their client reference.
pub fn product_code(remote_id: u64) -> String {
    format!("{}{}", PRODUCT_CODE_PREFIX, remote_id)
}

pub fn variant_code(remote_id: u64) -> String {
    format!("{}{}", VARIANT_CODE_PREFIX, remote_id)
}

pub fn unknown_line_code(line_id: u64) -> String {
    format!("{}{}", UNKNOWN_CODE_PREFIX, line_id)
}

/// Remote product id encoded in a product code. Variant and placeholder
/// codes share the prefix but do not parse.
pub fn parse_product_code(code: &str) -> Option<u64> {
    code.strip_prefix(PRODUCT_CODE_PREFIX)?.parse().ok()
}

pub fn parse_variant_code(code: &str) -> Option<u64> {
    code.strip_prefix(VARIANT_CODE_PREFIX)?.parse().ok()
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Vendor {
    pub id: i64,
    pub name: String,
}

/// Local product template.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ProductRecord {
    pub id: i64,
    pub name: String,
    pub default_code: Option<String>,
    pub category_id: i64,
    pub description: Option<String>,
    pub sale_ok: bool,
    pub purchase_ok: bool,
    pub is_published: bool,
    pub dropship: bool,
    pub image_url: Option<String>,
    pub remote_updated_at: Option<DateTime<Utc>>,
    pub remote_synced_at: Option<DateTime<Utc>>,
    pub modified_at: DateTime<Utc>,
}

impl ProductRecord {
    pub fn remote_id(&self) -> Option<u64> {
        self.default_code.as_deref().and_then(parse_product_code)
    }
}

/// Writable product fields. `modified_at` is supplied by the caller so that
/// inbound writes can stamp the same instant as `remote_synced_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFields {
    pub name: String,
    pub default_code: Option<String>,
    pub category_id: i64,
    pub description: Option<String>,
    pub sale_ok: bool,
    pub purchase_ok: bool,
    pub is_published: bool,
    pub dropship: bool,
    pub image_url: Option<String>,
    pub remote_updated_at: Option<DateTime<Utc>>,
    pub remote_synced_at: Option<DateTime<Utc>>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct VariantRecord {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub default_code: Option<String>,
    pub list_price: Decimal,
    pub standard_price: Decimal,
    pub weight: f64,
    pub barcode: Option<String>,
    pub qty_available: i64,
}

impl VariantRecord {
    pub fn remote_id(&self) -> Option<u64> {
        self.default_code.as_deref().and_then(parse_variant_code)
    }
}

/// Variant upsert input, keyed by `default_code` when present. A `None`
/// quantity keeps the stored on-hand quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantFields {
    pub product_id: i64,
    pub name: String,
    pub default_code: Option<String>,
    pub list_price: Decimal,
    pub standard_price: Decimal,
    pub weight: f64,
    pub barcode: Option<String>,
    pub qty_available: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SupplierLine {
    pub id: i64,
    pub product_id: i64,
    pub vendor_id: i64,
    pub min_qty: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country_code: Option<String>,
    pub state_code: Option<String>,
    pub portal_access: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country_code: Option<String>,
    pub state_code: Option<String>,
    pub portal_access: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Draft,
    Confirmed,
    Cancelled,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Draft => "draft",
            OrderState::Confirmed => "confirmed",
            OrderState::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(OrderState::Draft),
            "confirmed" => Some(OrderState::Confirmed),
            "cancelled" => Some(OrderState::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalesOrder {
    pub id: i64,
    pub client_order_ref: String,
    pub origin: Option<String>,
    pub customer_id: i64,
    pub date_order: Option<DateTime<Utc>>,
    pub currency: String,
    pub state: OrderState,
    pub amount_total: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderLine {
    pub variant_id: i64,
    pub description: String,
    pub quantity: Decimal,
    pub price_unit: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSalesOrder {
    pub client_order_ref: String,
    pub origin: Option<String>,
    pub customer_id: i64,
    pub date_order: Option<DateTime<Utc>>,
    pub currency: String,
    pub state: OrderState,
    pub lines: Vec<NewOrderLine>,
}

impl NewSalesOrder {
    pub fn amount_total(&self) -> Decimal {
        self.lines
            .iter()
            .map(|line| line.quantity * line.price_unit)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Invoice {
    pub id: i64,
    pub order_id: i64,
    pub amount_total: Decimal,
    pub posted: bool,
    pub sent: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub products: u64,
    pub variants: u64,
    pub supplier_lines: u64,
    pub orders: u64,
    pub invoices: u64,
    pub sync_states: u64,
}

/// ERP-side persistence used by the orchestrator.
///
/// Category and vendor creation must be atomic upsert-or-fetch so that
/// concurrent jobs never create two rows for one name.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Stored state for a resource, or a fresh default when none exists yet.
    async fn load_sync_state(&self, resource: Resource) -> Result<SyncCursorState>;
    async fn save_sync_state(&self, state: &SyncCursorState) -> Result<()>;

    async fn get_or_create_category(&self, name: &str) -> Result<Category>;
    async fn category(&self, id: i64) -> Result<Option<Category>>;
    async fn get_or_create_vendor(&self, name: &str) -> Result<Vendor>;
    async fn vendor(&self, id: i64) -> Result<Option<Vendor>>;

    async fn find_product_by_code(&self, code: &str) -> Result<Option<ProductRecord>>;
    /// A product with this exact name and no code, eligible for linking.
    async fn find_unlinked_product_by_name(&self, name: &str) -> Result<Option<ProductRecord>>;
    /// A product with this exact name that is already linked to some remote product.
    async fn find_linked_product_by_name(&self, name: &str) -> Result<Option<ProductRecord>>;
    async fn create_product(&self, fields: &ProductFields) -> Result<ProductRecord>;
    async fn update_product(&self, id: i64, fields: &ProductFields) -> Result<ProductRecord>;
    /// Records a successful push without touching `modified_at`.
    async fn mark_product_synced(&self, id: i64, code: &str, synced_at: DateTime<Utc>) -> Result<()>;
    /// Sellable products that have never been pushed.
    async fn products_to_export(&self, limit: usize) -> Result<Vec<ProductRecord>>;
    /// Sellable linked products with `modified_at` strictly after `since`.
    async fn products_modified_since(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ProductRecord>>;
    /// Sellable products linked to a remote product.
    async fn linked_products(&self) -> Result<Vec<ProductRecord>>;
    async fn count_linked_products(&self) -> Result<u64>;

    async fn supplier_lines(&self, product_id: i64) -> Result<Vec<SupplierLine>>;
    /// Returns false when the (product, vendor) line already existed.
    async fn add_supplier_line(&self, product_id: i64, vendor_id: i64) -> Result<bool>;

    async fn find_variant_by_code(&self, code: &str) -> Result<Option<VariantRecord>>;
    async fn find_variant_by_barcode(&self, barcode: &str) -> Result<Option<VariantRecord>>;
    async fn variants_of(&self, product_id: i64) -> Result<Vec<VariantRecord>>;
    async fn upsert_variant(&self, fields: &VariantFields) -> Result<VariantRecord>;
    async fn set_variant_code(&self, variant_id: i64, code: &str) -> Result<()>;

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>>;
    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer>;

    /// Most recent order with this client reference, whatever its state.
    async fn find_order_by_ref(&self, client_order_ref: &str) -> Result<Option<SalesOrder>>;
    async fn create_order(&self, order: &NewSalesOrder) -> Result<SalesOrder>;
    async fn create_invoice(&self, order: &SalesOrder, sent: bool) -> Result<Invoice>;
    async fn count_synced_orders(&self) -> Result<u64>;

    /// Deletes everything the sync created plus all sync state.
    async fn reset_synced_data(&self) -> Result<ResetReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(product_code(632910392), "SHOPIFY_632910392");
        assert_eq!(variant_code(808950810), "SHOPIFY_VAR_808950810");
        assert_eq!(parse_product_code("SHOPIFY_632910392"), Some(632910392));
        assert_eq!(parse_product_code("SHOPIFY_VAR_808950810"), None);
        assert_eq!(parse_product_code("SHOPIFY_UNKNOWN_5"), None);
        assert_eq!(parse_product_code("LAMP-1"), None);
        assert_eq!(parse_variant_code("SHOPIFY_VAR_808950810"), Some(808950810));
        assert_eq!(unknown_line_code(7), "SHOPIFY_UNKNOWN_7");
    }

    #[test]
    fn test_order_state_names() {
        for state in [OrderState::Draft, OrderState::Confirmed, OrderState::Cancelled] {
            assert_eq!(OrderState::parse(state.as_str()), Some(state));
        }
        assert_eq!(OrderState::parse("sale"), None);
    }
}

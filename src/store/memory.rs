// shopifysync/src/store/memory.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{
    Category, Customer, Invoice, NewCustomer, NewSalesOrder, OrderState, ProductFields,
    ProductRecord, RecordStore, ResetReport, SalesOrder, SupplierLine, VariantFields,
    VariantRecord, Vendor, PRODUCT_CODE_PREFIX,
};
use crate::errors::{Result, SyncError};
use crate::sync::state::{Resource, SyncCursorState};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredOrderLine {
    pub order_id: i64,
    pub variant_id: i64,
    pub description: String,
    pub quantity: Decimal,
    pub price_unit: Decimal,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    states: HashMap<Resource, SyncCursorState>,
    categories: Vec<Category>,
    vendors: Vec<Vendor>,
    products: Vec<ProductRecord>,
    variants: Vec<VariantRecord>,
    supplier_lines: Vec<SupplierLine>,
    customers: Vec<Customer>,
    orders: Vec<SalesOrder>,
    order_lines: Vec<StoredOrderLine>,
    invoices: Vec<Invoice>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

fn is_sync_code(code: &Option<String>) -> bool {
    code.as_deref()
        .is_some_and(|c| c.starts_with(PRODUCT_CODE_PREFIX))
}

/// `RecordStore` kept entirely in memory, for orchestrator tests.
#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.inner.lock().await.categories.clone()
    }

    pub async fn vendors(&self) -> Vec<Vendor> {
        self.inner.lock().await.vendors.clone()
    }

    pub async fn products(&self) -> Vec<ProductRecord> {
        self.inner.lock().await.products.clone()
    }

    pub async fn variants(&self) -> Vec<VariantRecord> {
        self.inner.lock().await.variants.clone()
    }

    pub async fn customers(&self) -> Vec<Customer> {
        self.inner.lock().await.customers.clone()
    }

    pub async fn orders(&self) -> Vec<SalesOrder> {
        self.inner.lock().await.orders.clone()
    }

    pub async fn order_lines(&self) -> Vec<StoredOrderLine> {
        self.inner.lock().await.order_lines.clone()
    }

    pub async fn invoices(&self) -> Vec<Invoice> {
        self.inner.lock().await.invoices.clone()
    }

    pub async fn all_supplier_lines(&self) -> Vec<SupplierLine> {
        self.inner.lock().await.supplier_lines.clone()
    }

    /// Simulates a local edit of a product at the given instant.
    pub async fn touch_product(&self, id: i64, at: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        if let Some(product) = inner.products.iter_mut().find(|p| p.id == id) {
            product.modified_at = at;
        }
    }

    pub async fn cancel_order(&self, id: i64) {
        let mut inner = self.inner.lock().await;
        if let Some(order) = inner.orders.iter_mut().find(|o| o.id == id) {
            order.state = OrderState::Cancelled;
        }
    }
}

fn apply_product_fields(product: &mut ProductRecord, fields: &ProductFields) {
    product.name = fields.name.clone();
    product.default_code = fields.default_code.clone();
    product.category_id = fields.category_id;
    product.description = fields.description.clone();
    product.sale_ok = fields.sale_ok;
    product.purchase_ok = fields.purchase_ok;
    product.is_published = fields.is_published;
    product.dropship = fields.dropship;
    product.image_url = fields.image_url.clone();
    product.remote_updated_at = fields.remote_updated_at;
    product.remote_synced_at = fields.remote_synced_at;
    product.modified_at = fields.modified_at;
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load_sync_state(&self, resource: Resource) -> Result<SyncCursorState> {
        let inner = self.inner.lock().await;
        Ok(inner
            .states
            .get(&resource)
            .cloned()
            .unwrap_or_else(|| SyncCursorState::new(resource)))
    }

    async fn save_sync_state(&self, state: &SyncCursorState) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.states.insert(state.resource, state.clone());
        Ok(())
    }

    async fn get_or_create_category(&self, name: &str) -> Result<Category> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.categories.iter().find(|c| c.name == name) {
            return Ok(existing.clone());
        }
        let category = Category {
            id: inner.next_id(),
            name: name.to_string(),
        };
        inner.categories.push(category.clone());
        Ok(category)
    }

    async fn category(&self, id: i64) -> Result<Option<Category>> {
        let inner = self.inner.lock().await;
        Ok(inner.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn get_or_create_vendor(&self, name: &str) -> Result<Vendor> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.vendors.iter().find(|v| v.name == name) {
            return Ok(existing.clone());
        }
        let vendor = Vendor {
            id: inner.next_id(),
            name: name.to_string(),
        };
        inner.vendors.push(vendor.clone());
        Ok(vendor)
    }

    async fn vendor(&self, id: i64) -> Result<Option<Vendor>> {
        let inner = self.inner.lock().await;
        Ok(inner.vendors.iter().find(|v| v.id == id).cloned())
    }

    async fn find_product_by_code(&self, code: &str) -> Result<Option<ProductRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .products
            .iter()
            .find(|p| p.default_code.as_deref() == Some(code))
            .cloned())
    }

    async fn find_unlinked_product_by_name(&self, name: &str) -> Result<Option<ProductRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .products
            .iter()
            .find(|p| p.name == name && p.default_code.is_none())
            .cloned())
    }

    async fn find_linked_product_by_name(&self, name: &str) -> Result<Option<ProductRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .products
            .iter()
            .find(|p| p.name == name && p.remote_id().is_some())
            .cloned())
    }

    async fn create_product(&self, fields: &ProductFields) -> Result<ProductRecord> {
        let mut inner = self.inner.lock().await;
        if let Some(code) = &fields.default_code {
            if inner.products.iter().any(|p| p.default_code.as_ref() == Some(code)) {
                return Err(SyncError::Storage(format!("duplicate product code {}", code)));
            }
        }
        let mut product = ProductRecord {
            id: inner.next_id(),
            name: String::new(),
            default_code: None,
            category_id: fields.category_id,
            description: None,
            sale_ok: false,
            purchase_ok: false,
            is_published: false,
            dropship: false,
            image_url: None,
            remote_updated_at: None,
            remote_synced_at: None,
            modified_at: fields.modified_at,
        };
        apply_product_fields(&mut product, fields);
        inner.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: i64, fields: &ProductFields) -> Result<ProductRecord> {
        let mut inner = self.inner.lock().await;
        let product = inner
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| SyncError::Storage(format!("product {} not found", id)))?;
        apply_product_fields(product, fields);
        Ok(product.clone())
    }

    async fn mark_product_synced(&self, id: i64, code: &str, synced_at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let product = inner
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| SyncError::Storage(format!("product {} not found", id)))?;
        product.default_code = Some(code.to_string());
        product.remote_synced_at = Some(synced_at);
        product.remote_updated_at = Some(synced_at);
        Ok(())
    }

    async fn products_to_export(&self, limit: usize) -> Result<Vec<ProductRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .products
            .iter()
            .filter(|p| p.sale_ok && !is_sync_code(&p.default_code))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn products_modified_since(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ProductRecord>> {
        let inner = self.inner.lock().await;
        let mut products: Vec<ProductRecord> = inner
            .products
            .iter()
            .filter(|p| p.sale_ok && p.remote_id().is_some())
            .filter(|p| since.is_none_or(|since| p.modified_at > since))
            .cloned()
            .collect();
        products.sort_by_key(|p| (p.modified_at, p.id));
        products.truncate(limit);
        Ok(products)
    }

    async fn linked_products(&self) -> Result<Vec<ProductRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .products
            .iter()
            .filter(|p| p.sale_ok && p.remote_id().is_some())
            .cloned()
            .collect())
    }

    async fn count_linked_products(&self) -> Result<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.products.iter().filter(|p| p.remote_id().is_some()).count() as u64)
    }

    async fn supplier_lines(&self, product_id: i64) -> Result<Vec<SupplierLine>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .supplier_lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn add_supplier_line(&self, product_id: i64, vendor_id: i64) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner
            .supplier_lines
            .iter()
            .any(|l| l.product_id == product_id && l.vendor_id == vendor_id)
        {
            return Ok(false);
        }
        let id = inner.next_id();
        inner.supplier_lines.push(SupplierLine {
            id,
            product_id,
            vendor_id,
            min_qty: Decimal::ONE,
            price: Decimal::ZERO,
        });
        Ok(true)
    }

    async fn find_variant_by_code(&self, code: &str) -> Result<Option<VariantRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .variants
            .iter()
            .find(|v| v.default_code.as_deref() == Some(code))
            .cloned())
    }

    async fn find_variant_by_barcode(&self, barcode: &str) -> Result<Option<VariantRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .variants
            .iter()
            .find(|v| v.barcode.as_deref() == Some(barcode))
            .cloned())
    }

    async fn variants_of(&self, product_id: i64) -> Result<Vec<VariantRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .variants
            .iter()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn upsert_variant(&self, fields: &VariantFields) -> Result<VariantRecord> {
        let mut inner = self.inner.lock().await;
        if let Some(barcode) = &fields.barcode {
            let taken = inner.variants.iter().any(|v| {
                v.barcode.as_ref() == Some(barcode)
                    && (fields.default_code.is_none() || v.default_code != fields.default_code)
            });
            if taken {
                return Err(SyncError::Storage(format!("barcode {} already in use", barcode)));
            }
        }

        let existing = fields.default_code.as_ref().and_then(|code| {
            inner
                .variants
                .iter_mut()
                .find(|v| v.default_code.as_ref() == Some(code))
        });
        if let Some(variant) = existing {
            variant.product_id = fields.product_id;
            variant.name = fields.name.clone();
            variant.list_price = fields.list_price;
            variant.standard_price = fields.standard_price;
            variant.weight = fields.weight;
            variant.barcode = fields.barcode.clone();
            if let Some(qty) = fields.qty_available {
                variant.qty_available = qty;
            }
            return Ok(variant.clone());
        }

        let variant = VariantRecord {
            id: inner.next_id(),
            product_id: fields.product_id,
            name: fields.name.clone(),
            default_code: fields.default_code.clone(),
            list_price: fields.list_price,
            standard_price: fields.standard_price,
            weight: fields.weight,
            barcode: fields.barcode.clone(),
            qty_available: fields.qty_available.unwrap_or(0),
        };
        inner.variants.push(variant.clone());
        Ok(variant)
    }

    async fn set_variant_code(&self, variant_id: i64, code: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let variant = inner
            .variants
            .iter_mut()
            .find(|v| v.id == variant_id)
            .ok_or_else(|| SyncError::Storage(format!("variant {} not found", variant_id)))?;
        variant.default_code = Some(code.to_string());
        Ok(())
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .customers
            .iter()
            .find(|c| c.email.as_deref() == Some(email))
            .cloned())
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer> {
        let mut inner = self.inner.lock().await;
        let created = Customer {
            id: inner.next_id(),
            name: customer.name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            street: customer.street.clone(),
            street2: customer.street2.clone(),
            city: customer.city.clone(),
            zip: customer.zip.clone(),
            country_code: customer.country_code.clone(),
            state_code: customer.state_code.clone(),
            portal_access: customer.portal_access,
        };
        inner.customers.push(created.clone());
        Ok(created)
    }

    async fn find_order_by_ref(&self, client_order_ref: &str) -> Result<Option<SalesOrder>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .iter()
            .rev()
            .find(|o| o.client_order_ref == client_order_ref)
            .cloned())
    }

    async fn create_order(&self, order: &NewSalesOrder) -> Result<SalesOrder> {
        let mut inner = self.inner.lock().await;
        let created = SalesOrder {
            id: inner.next_id(),
            client_order_ref: order.client_order_ref.clone(),
            origin: order.origin.clone(),
            customer_id: order.customer_id,
            date_order: order.date_order,
            currency: order.currency.clone(),
            state: order.state,
            amount_total: order.amount_total(),
        };
        for line in &order.lines {
            inner.order_lines.push(StoredOrderLine {
                order_id: created.id,
                variant_id: line.variant_id,
                description: line.description.clone(),
                quantity: line.quantity,
                price_unit: line.price_unit,
            });
        }
        inner.orders.push(created.clone());
        Ok(created)
    }

    async fn create_invoice(&self, order: &SalesOrder, sent: bool) -> Result<Invoice> {
        let mut inner = self.inner.lock().await;
        let invoice = Invoice {
            id: inner.next_id(),
            order_id: order.id,
            amount_total: order.amount_total,
            posted: true,
            sent,
        };
        inner.invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn count_synced_orders(&self) -> Result<u64> {
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .iter()
            .filter(|o| o.client_order_ref.starts_with(PRODUCT_CODE_PREFIX))
            .count() as u64)
    }

    async fn reset_synced_data(&self) -> Result<ResetReport> {
        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;

        let synced_products: Vec<i64> = inner
            .products
            .iter()
            .filter(|p| is_sync_code(&p.default_code))
            .map(|p| p.id)
            .collect();
        let synced_orders: Vec<i64> = inner
            .orders
            .iter()
            .filter(|o| o.client_order_ref.starts_with(PRODUCT_CODE_PREFIX))
            .map(|o| o.id)
            .collect();

        let mut report = ResetReport::default();

        let before = inner.invoices.len();
        inner.invoices.retain(|i| !synced_orders.contains(&i.order_id));
        report.invoices = (before - inner.invoices.len()) as u64;

        inner.order_lines.retain(|l| !synced_orders.contains(&l.order_id));
        let before = inner.orders.len();
        inner.orders.retain(|o| !synced_orders.contains(&o.id));
        report.orders = (before - inner.orders.len()) as u64;

        let before = inner.supplier_lines.len();
        inner
            .supplier_lines
            .retain(|l| !synced_products.contains(&l.product_id));
        report.supplier_lines = (before - inner.supplier_lines.len()) as u64;

        let before = inner.variants.len();
        inner.variants.retain(|v| {
            !synced_products.contains(&v.product_id) && !is_sync_code(&v.default_code)
        });
        report.variants = (before - inner.variants.len()) as u64;

        let before = inner.products.len();
        inner.products.retain(|p| !synced_products.contains(&p.id));
        report.products = (before - inner.products.len()) as u64;

        report.sync_states = inner.states.len() as u64;
        inner.states.clear();

        Ok(report)
    }
}

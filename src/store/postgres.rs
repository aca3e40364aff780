// shopifysync/src/store/postgres.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    Category, Customer, Invoice, NewCustomer, NewSalesOrder, OrderState, ProductFields,
    ProductRecord, RecordStore, ResetReport, SalesOrder, SupplierLine, VariantFields,
    VariantRecord, Vendor, PRODUCT_CODE_PREFIX,
};
use crate::errors::{Result, SyncError};
use crate::sync::state::{Resource, SyncCursorState, SyncStatus};

const PRODUCT_COLUMNS: &str = "id, name, default_code, category_id, description, sale_ok, purchase_ok, \
     is_published, dropship, image_url, remote_updated_at, remote_synced_at, modified_at";

const VARIANT_COLUMNS: &str =
    "id, product_id, name, default_code, list_price, standard_price, weight, barcode, qty_available";

const CUSTOMER_COLUMNS: &str =
    "id, name, email, phone, street, street2, city, zip, country_code, state_code, portal_access";

const ORDER_COLUMNS: &str =
    "id, client_order_ref, origin, customer_id, date_order, currency, state, amount_total";

// Product codes that carry a remote product id. Variant and placeholder codes
// share the prefix but not the shape.
const LINKED_CODE_PATTERN: &str = "^SHOPIFY_[0-9]+$";

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS sync_state (
        resource TEXT PRIMARY KEY,
        cursor TEXT,
        high_water_mark TIMESTAMPTZ,
        last_success_at TIMESTAMPTZ,
        status TEXT NOT NULL DEFAULT 'idle',
        remote_total BIGINT,
        log TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS product_category (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS vendor (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS product_template (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        default_code TEXT UNIQUE,
        category_id BIGINT NOT NULL REFERENCES product_category(id),
        description TEXT,
        sale_ok BOOLEAN NOT NULL DEFAULT TRUE,
        purchase_ok BOOLEAN NOT NULL DEFAULT FALSE,
        is_published BOOLEAN NOT NULL DEFAULT FALSE,
        dropship BOOLEAN NOT NULL DEFAULT FALSE,
        image_url TEXT,
        remote_updated_at TIMESTAMPTZ,
        remote_synced_at TIMESTAMPTZ,
        modified_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS supplier_info (
        id BIGSERIAL PRIMARY KEY,
        product_id BIGINT NOT NULL REFERENCES product_template(id) ON DELETE CASCADE,
        vendor_id BIGINT NOT NULL REFERENCES vendor(id),
        min_qty NUMERIC NOT NULL DEFAULT 1,
        price NUMERIC NOT NULL DEFAULT 0,
        UNIQUE (product_id, vendor_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS product_variant (
        id BIGSERIAL PRIMARY KEY,
        product_id BIGINT NOT NULL REFERENCES product_template(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        default_code TEXT UNIQUE,
        list_price NUMERIC NOT NULL DEFAULT 0,
        standard_price NUMERIC NOT NULL DEFAULT 0,
        weight DOUBLE PRECISION NOT NULL DEFAULT 0,
        barcode TEXT UNIQUE,
        qty_available BIGINT NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS customer (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        street TEXT,
        street2 TEXT,
        city TEXT,
        zip TEXT,
        country_code TEXT,
        state_code TEXT,
        portal_access BOOLEAN NOT NULL DEFAULT FALSE
    )"#,
    "CREATE INDEX IF NOT EXISTS customer_email_idx ON customer (email)",
    r#"CREATE TABLE IF NOT EXISTS sale_order (
        id BIGSERIAL PRIMARY KEY,
        client_order_ref TEXT NOT NULL,
        origin TEXT,
        customer_id BIGINT NOT NULL REFERENCES customer(id),
        date_order TIMESTAMPTZ,
        currency TEXT NOT NULL,
        state TEXT NOT NULL,
        amount_total NUMERIC NOT NULL DEFAULT 0
    )"#,
    "CREATE INDEX IF NOT EXISTS sale_order_ref_idx ON sale_order (client_order_ref)",
    r#"CREATE TABLE IF NOT EXISTS sale_order_line (
        id BIGSERIAL PRIMARY KEY,
        order_id BIGINT NOT NULL REFERENCES sale_order(id) ON DELETE CASCADE,
        variant_id BIGINT REFERENCES product_variant(id) ON DELETE SET NULL,
        description TEXT NOT NULL,
        quantity NUMERIC NOT NULL,
        price_unit NUMERIC NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS invoice (
        id BIGSERIAL PRIMARY KEY,
        order_id BIGINT NOT NULL REFERENCES sale_order(id) ON DELETE CASCADE,
        amount_total NUMERIC NOT NULL,
        posted BOOLEAN NOT NULL,
        sent BOOLEAN NOT NULL
    )"#,
];

impl<'r> FromRow<'r, PgRow> for SalesOrder {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        let state: String = row.try_get("state")?;
        let state = OrderState::parse(&state)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown order state '{}'", state).into()))?;
        Ok(SalesOrder {
            id: row.try_get("id")?,
            client_order_ref: row.try_get("client_order_ref")?,
            origin: row.try_get("origin")?,
            customer_id: row.try_get("customer_id")?,
            date_order: row.try_get("date_order")?,
            currency: row.try_get("currency")?,
            state,
            amount_total: row.try_get("amount_total")?,
        })
    }
}

fn state_from_row(resource: Resource, row: &PgRow) -> Result<SyncCursorState> {
    let status: String = row.try_get("status")?;
    let remote_total: Option<i64> = row.try_get("remote_total")?;
    let log: String = row.try_get("log")?;
    Ok(SyncCursorState {
        resource,
        cursor: row.try_get("cursor")?,
        high_water_mark: row.try_get("high_water_mark")?,
        last_success_at: row.try_get("last_success_at")?,
        status: SyncStatus::parse(&status).unwrap_or_default(),
        remote_total: remote_total.and_then(|total| u64::try_from(total).ok()),
        log: SyncCursorState::log_from_text(&log),
    })
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn to_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

/// PostgreSQL-backed `RecordStore`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Creates the tables the sync writes to. Safe to run on every start.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!(statements = SCHEMA.len(), "Schema ensured");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn load_sync_state(&self, resource: Resource) -> Result<SyncCursorState> {
        let row = sqlx::query(
            "SELECT cursor, high_water_mark, last_success_at, status, remote_total, log \
             FROM sync_state WHERE resource = $1",
        )
        .bind(resource.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => state_from_row(resource, &row),
            None => Ok(SyncCursorState::new(resource)),
        }
    }

    async fn save_sync_state(&self, state: &SyncCursorState) -> Result<()> {
        let remote_total = state.remote_total.and_then(|total| i64::try_from(total).ok());
        sqlx::query(
            r#"INSERT INTO sync_state (resource, cursor, high_water_mark, last_success_at, status, remote_total, log)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (resource) DO UPDATE SET
                   cursor = EXCLUDED.cursor,
                   high_water_mark = EXCLUDED.high_water_mark,
                   last_success_at = EXCLUDED.last_success_at,
                   status = EXCLUDED.status,
                   remote_total = EXCLUDED.remote_total,
                   log = EXCLUDED.log"#,
        )
        .bind(state.resource.as_str())
        .bind(&state.cursor)
        .bind(state.high_water_mark)
        .bind(state.last_success_at)
        .bind(state.status.as_str())
        .bind(remote_total)
        .bind(state.log_text())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_or_create_category(&self, name: &str) -> Result<Category> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO product_category (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn category(&self, id: i64) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT id, name FROM product_category WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn get_or_create_vendor(&self, name: &str) -> Result<Vendor> {
        let vendor = sqlx::query_as::<_, Vendor>(
            "INSERT INTO vendor (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(vendor)
    }

    async fn vendor(&self, id: i64) -> Result<Option<Vendor>> {
        let vendor = sqlx::query_as::<_, Vendor>("SELECT id, name FROM vendor WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vendor)
    }

    async fn find_product_by_code(&self, code: &str) -> Result<Option<ProductRecord>> {
        let product = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {} FROM product_template WHERE default_code = $1",
            PRODUCT_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn find_unlinked_product_by_name(&self, name: &str) -> Result<Option<ProductRecord>> {
        let product = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {} FROM product_template WHERE name = $1 AND default_code IS NULL ORDER BY id LIMIT 1",
            PRODUCT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn find_linked_product_by_name(&self, name: &str) -> Result<Option<ProductRecord>> {
        let product = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {} FROM product_template WHERE name = $1 AND default_code ~ $2 ORDER BY id LIMIT 1",
            PRODUCT_COLUMNS
        ))
        .bind(name)
        .bind(LINKED_CODE_PATTERN)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn create_product(&self, fields: &ProductFields) -> Result<ProductRecord> {
        let product = sqlx::query_as::<_, ProductRecord>(&format!(
            r#"INSERT INTO product_template
                   (name, default_code, category_id, description, sale_ok, purchase_ok, is_published,
                    dropship, image_url, remote_updated_at, remote_synced_at, modified_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING {}"#,
            PRODUCT_COLUMNS
        ))
        .bind(&fields.name)
        .bind(&fields.default_code)
        .bind(fields.category_id)
        .bind(&fields.description)
        .bind(fields.sale_ok)
        .bind(fields.purchase_ok)
        .bind(fields.is_published)
        .bind(fields.dropship)
        .bind(&fields.image_url)
        .bind(fields.remote_updated_at)
        .bind(fields.remote_synced_at)
        .bind(fields.modified_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    async fn update_product(&self, id: i64, fields: &ProductFields) -> Result<ProductRecord> {
        sqlx::query_as::<_, ProductRecord>(&format!(
            r#"UPDATE product_template SET
                   name = $2, default_code = $3, category_id = $4, description = $5, sale_ok = $6,
                   purchase_ok = $7, is_published = $8, dropship = $9, image_url = $10,
                   remote_updated_at = $11, remote_synced_at = $12, modified_at = $13
               WHERE id = $1
               RETURNING {}"#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.default_code)
        .bind(fields.category_id)
        .bind(&fields.description)
        .bind(fields.sale_ok)
        .bind(fields.purchase_ok)
        .bind(fields.is_published)
        .bind(fields.dropship)
        .bind(&fields.image_url)
        .bind(fields.remote_updated_at)
        .bind(fields.remote_synced_at)
        .bind(fields.modified_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| SyncError::Storage(format!("product {} not found", id)))
    }

    async fn mark_product_synced(&self, id: i64, code: &str, synced_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE product_template \
             SET default_code = $2, remote_synced_at = $3, remote_updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(code)
        .bind(synced_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(SyncError::Storage(format!("product {} not found", id)));
        }
        Ok(())
    }

    async fn products_to_export(&self, limit: usize) -> Result<Vec<ProductRecord>> {
        let products = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {} FROM product_template \
             WHERE sale_ok AND (default_code IS NULL OR NOT starts_with(default_code, $1)) \
             ORDER BY id LIMIT $2",
            PRODUCT_COLUMNS
        ))
        .bind(PRODUCT_CODE_PREFIX)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn products_modified_since(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ProductRecord>> {
        let products = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {} FROM product_template \
             WHERE sale_ok AND default_code ~ $1 \
               AND ($2::timestamptz IS NULL OR modified_at > $2) \
             ORDER BY modified_at, id LIMIT $3",
            PRODUCT_COLUMNS
        ))
        .bind(LINKED_CODE_PATTERN)
        .bind(since)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn linked_products(&self) -> Result<Vec<ProductRecord>> {
        let products = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {} FROM product_template WHERE sale_ok AND default_code ~ $1 ORDER BY id",
            PRODUCT_COLUMNS
        ))
        .bind(LINKED_CODE_PATTERN)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn count_linked_products(&self) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product_template WHERE default_code ~ $1")
                .bind(LINKED_CODE_PATTERN)
                .fetch_one(&self.pool)
                .await?;
        Ok(to_count(count))
    }

    async fn supplier_lines(&self, product_id: i64) -> Result<Vec<SupplierLine>> {
        let lines = sqlx::query_as::<_, SupplierLine>(
            "SELECT id, product_id, vendor_id, min_qty, price FROM supplier_info \
             WHERE product_id = $1 ORDER BY id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    async fn add_supplier_line(&self, product_id: i64, vendor_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO supplier_info (product_id, vendor_id, min_qty, price) VALUES ($1, $2, 1, 0) \
             ON CONFLICT (product_id, vendor_id) DO NOTHING",
        )
        .bind(product_id)
        .bind(vendor_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_variant_by_code(&self, code: &str) -> Result<Option<VariantRecord>> {
        let variant = sqlx::query_as::<_, VariantRecord>(&format!(
            "SELECT {} FROM product_variant WHERE default_code = $1",
            VARIANT_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(variant)
    }

    async fn find_variant_by_barcode(&self, barcode: &str) -> Result<Option<VariantRecord>> {
        let variant = sqlx::query_as::<_, VariantRecord>(&format!(
            "SELECT {} FROM product_variant WHERE barcode = $1",
            VARIANT_COLUMNS
        ))
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;
        Ok(variant)
    }

    async fn variants_of(&self, product_id: i64) -> Result<Vec<VariantRecord>> {
        let variants = sqlx::query_as::<_, VariantRecord>(&format!(
            "SELECT {} FROM product_variant WHERE product_id = $1 ORDER BY id",
            VARIANT_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(variants)
    }

    async fn upsert_variant(&self, fields: &VariantFields) -> Result<VariantRecord> {
        // NULL codes never conflict, so uncoded variants are always inserted.
        let variant = sqlx::query_as::<_, VariantRecord>(&format!(
            r#"INSERT INTO product_variant
                   (product_id, name, default_code, list_price, standard_price, weight, barcode, qty_available)
               VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, 0))
               ON CONFLICT (default_code) DO UPDATE SET
                   product_id = EXCLUDED.product_id,
                   name = EXCLUDED.name,
                   list_price = EXCLUDED.list_price,
                   standard_price = EXCLUDED.standard_price,
                   weight = EXCLUDED.weight,
                   barcode = EXCLUDED.barcode,
                   qty_available = COALESCE($8, product_variant.qty_available)
               RETURNING {}"#,
            VARIANT_COLUMNS
        ))
        .bind(fields.product_id)
        .bind(&fields.name)
        .bind(&fields.default_code)
        .bind(fields.list_price)
        .bind(fields.standard_price)
        .bind(fields.weight)
        .bind(&fields.barcode)
        .bind(fields.qty_available)
        .fetch_one(&self.pool)
        .await?;
        Ok(variant)
    }

    async fn set_variant_code(&self, variant_id: i64, code: &str) -> Result<()> {
        sqlx::query("UPDATE product_variant SET default_code = $2 WHERE id = $1")
            .bind(variant_id)
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customer WHERE email = $1 ORDER BY id LIMIT 1",
            CUSTOMER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(customer)
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer> {
        let created = sqlx::query_as::<_, Customer>(&format!(
            r#"INSERT INTO customer
                   (name, email, phone, street, street2, city, zip, country_code, state_code, portal_access)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING {}"#,
            CUSTOMER_COLUMNS
        ))
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.street)
        .bind(&customer.street2)
        .bind(&customer.city)
        .bind(&customer.zip)
        .bind(&customer.country_code)
        .bind(&customer.state_code)
        .bind(customer.portal_access)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn find_order_by_ref(&self, client_order_ref: &str) -> Result<Option<SalesOrder>> {
        let order = sqlx::query_as::<_, SalesOrder>(&format!(
            "SELECT {} FROM sale_order WHERE client_order_ref = $1 ORDER BY id DESC LIMIT 1",
            ORDER_COLUMNS
        ))
        .bind(client_order_ref)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn create_order(&self, order: &NewSalesOrder) -> Result<SalesOrder> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, SalesOrder>(&format!(
            r#"INSERT INTO sale_order
                   (client_order_ref, origin, customer_id, date_order, currency, state, amount_total)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {}"#,
            ORDER_COLUMNS
        ))
        .bind(&order.client_order_ref)
        .bind(&order.origin)
        .bind(order.customer_id)
        .bind(order.date_order)
        .bind(&order.currency)
        .bind(order.state.as_str())
        .bind(order.amount_total())
        .fetch_one(&mut *tx)
        .await?;

        for line in &order.lines {
            sqlx::query(
                "INSERT INTO sale_order_line (order_id, variant_id, description, quantity, price_unit) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(created.id)
            .bind(line.variant_id)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.price_unit)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn create_invoice(&self, order: &SalesOrder, sent: bool) -> Result<Invoice> {
        let invoice = sqlx::query_as::<_, Invoice>(
            "INSERT INTO invoice (order_id, amount_total, posted, sent) VALUES ($1, $2, TRUE, $3) \
             RETURNING id, order_id, amount_total, posted, sent",
        )
        .bind(order.id)
        .bind(order.amount_total)
        .bind(sent)
        .fetch_one(&self.pool)
        .await?;
        Ok(invoice)
    }

    async fn count_synced_orders(&self) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sale_order WHERE starts_with(client_order_ref, $1)")
                .bind(PRODUCT_CODE_PREFIX)
                .fetch_one(&self.pool)
                .await?;
        Ok(to_count(count))
    }

    async fn reset_synced_data(&self) -> Result<ResetReport> {
        let mut tx = self.pool.begin().await?;
        let mut report = ResetReport::default();

        report.invoices = sqlx::query(
            "DELETE FROM invoice WHERE order_id IN \
             (SELECT id FROM sale_order WHERE starts_with(client_order_ref, $1))",
        )
        .bind(PRODUCT_CODE_PREFIX)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        report.orders = sqlx::query("DELETE FROM sale_order WHERE starts_with(client_order_ref, $1)")
            .bind(PRODUCT_CODE_PREFIX)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        report.supplier_lines = sqlx::query(
            "DELETE FROM supplier_info WHERE product_id IN \
             (SELECT id FROM product_template WHERE starts_with(default_code, $1))",
        )
        .bind(PRODUCT_CODE_PREFIX)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        report.variants = sqlx::query(
            "DELETE FROM product_variant WHERE starts_with(default_code, $1) OR product_id IN \
             (SELECT id FROM product_template WHERE starts_with(default_code, $1))",
        )
        .bind(PRODUCT_CODE_PREFIX)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        report.products = sqlx::query("DELETE FROM product_template WHERE starts_with(default_code, $1)")
            .bind(PRODUCT_CODE_PREFIX)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        report.sync_states = sqlx::query("DELETE FROM sync_state")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        info!(?report, "Synced data reset");
        Ok(report)
    }
}

// shopifysync/src/sync/products.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::state::{Resource, SyncCursorState};
use super::{RunSummary, SyncContext, begin_run, fetch_next_page, finish_inbound_run, record_id, start_of_year};
use crate::errors::{Result, SyncError};
use crate::shopify::RemoteResource;
use crate::shopify::models::{RemoteProduct, RemoteVariant};
use crate::store::{
    DEFAULT_CATEGORY, ProductFields, VariantFields, VariantRecord, product_code, variant_code,
};

// Shopify names the only variant of a simple product like this.
const DEFAULT_VARIANT_TITLE: &str = "Default Title";

enum Saved {
    Created,
    Updated,
    Skipped,
}

/// Pulls one page of products from the store and upserts them locally.
pub async fn sync_products_from_remote(ctx: &SyncContext<'_>) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    run(ctx, run_id)
        .instrument(info_span!("sync_products", %run_id))
        .await
}

async fn run(ctx: &SyncContext<'_>, run_id: Uuid) -> Result<RunSummary> {
    let started_at = Utc::now();
    let mut state = begin_run(ctx, Resource::Products).await?;

    let page = fetch_next_page(
        ctx,
        &mut state,
        RemoteResource::Products,
        start_of_year(started_at),
    )
    .await?;

    let mut summary = RunSummary::new(run_id, Resource::Products);
    summary.fetched = page.records.len();
    summary.has_more = page.next_cursor.is_some();
    state.info(format!("Fetched {} products", summary.fetched));

    let mut seen = HashSet::new();
    let mut newest: Option<DateTime<Utc>> = None;

    for record in page.records {
        let id = record_id(&record);
        let product: RemoteProduct = match serde_json::from_value(record) {
            Ok(product) => product,
            Err(e) => {
                summary.failed += 1;
                let err = SyncError::Mapping(e.to_string());
                state.error(format!("Skipping product {}: {}", id, err));
                continue;
            }
        };

        if !seen.insert(product.id) {
            summary.skipped += 1;
            state.warn(format!(
                "Duplicate product id {} in batch, skipping '{}'",
                product.id, product.title
            ));
            continue;
        }

        match save_product(ctx, &mut state, &product, started_at).await {
            Ok(Saved::Created) => summary.created += 1,
            Ok(Saved::Updated) => summary.updated += 1,
            Ok(Saved::Skipped) => {
                summary.skipped += 1;
                continue;
            }
            Err(e) => {
                summary.failed += 1;
                state.error(format!(
                    "Failed to save product '{}' (Shopify ID {}): {}",
                    product.title, product.id, e
                ));
                continue;
            }
        }

        if let Some(updated_at) = product.updated_at {
            newest = Some(newest.map_or(updated_at, |n| n.max(updated_at)));
        }
    }

    finish_inbound_run(ctx, &mut state, &summary, started_at, newest).await?;
    Ok(summary)
}

async fn save_product(
    ctx: &SyncContext<'_>,
    state: &mut SyncCursorState,
    product: &RemoteProduct,
    now: DateTime<Utc>,
) -> Result<Saved> {
    let code = product_code(product.id);
    let existing = match ctx.store.find_product_by_code(&code).await? {
        Some(found) => Some(found),
        None => match ctx.store.find_unlinked_product_by_name(&product.title).await? {
            Some(unlinked) => {
                state.info(format!(
                    "Linked existing product '{}' to Shopify ID {}",
                    product.title, product.id
                ));
                Some(unlinked)
            }
            None => {
                if let Some(other) = ctx.store.find_linked_product_by_name(&product.title).await? {
                    state.warn(format!(
                        "Product '{}' already exists with different Shopify ID {}, skipping Shopify ID {}",
                        product.title,
                        other.remote_id().unwrap_or_default(),
                        product.id
                    ));
                    return Ok(Saved::Skipped);
                }
                None
            }
        },
    };

    let category_name = product
        .product_type
        .as_deref()
        .filter(|label| !label.is_empty())
        .unwrap_or(DEFAULT_CATEGORY);
    let category = ctx.store.get_or_create_category(category_name).await?;

    let vendor = match product.vendor.as_deref().filter(|name| !name.is_empty()) {
        Some(name) => Some(ctx.store.get_or_create_vendor(name).await?),
        None => None,
    };

    let is_published =
        ctx.settings.auto_publish_website && product.status.as_deref() == Some("active");
    let was_dropship = existing.as_ref().is_some_and(|p| p.dropship);

    let fields = ProductFields {
        name: product.title.clone(),
        default_code: Some(code),
        category_id: category.id,
        description: product
            .body_html
            .clone()
            .or_else(|| existing.as_ref().and_then(|p| p.description.clone())),
        sale_ok: true,
        purchase_ok: vendor.is_some(),
        is_published,
        dropship: was_dropship || vendor.is_some(),
        image_url: product
            .images
            .iter()
            .find_map(|image| image.src.clone())
            .or_else(|| existing.as_ref().and_then(|p| p.image_url.clone())),
        remote_updated_at: product.updated_at,
        remote_synced_at: Some(now),
        modified_at: now,
    };

    let (record, saved) = match &existing {
        Some(found) => (ctx.store.update_product(found.id, &fields).await?, Saved::Updated),
        None => (ctx.store.create_product(&fields).await?, Saved::Created),
    };

    if let Some(vendor) = &vendor {
        if ctx.store.add_supplier_line(record.id, vendor.id).await? {
            state.info(format!("Added vendor {} to product {}", vendor.name, product.title));
        }
        if !was_dropship {
            state.info(format!("Enabled dropshipping for product with vendor: {}", vendor.name));
        }
    }

    for variant in &product.variants {
        save_variant(ctx, state, record.id, &product.title, variant).await?;
    }

    state.info(format!(
        "{} product: {} (Shopify ID: {})",
        if existing.is_some() { "Updated" } else { "Created" },
        product.title,
        product.id
    ));
    Ok(saved)
}

async fn save_variant(
    ctx: &SyncContext<'_>,
    state: &mut SyncCursorState,
    product_id: i64,
    product_title: &str,
    variant: &RemoteVariant,
) -> Result<()> {
    let code = variant_code(variant.id);
    let existing = match ctx.store.find_variant_by_code(&code).await? {
        Some(found) => Some(found),
        None => adopt_uncoded_variant(ctx, state, product_id, &code).await?,
    };

    let barcode = match variant.barcode.as_deref().filter(|b| !b.is_empty()) {
        Some(barcode) => match ctx.store.find_variant_by_barcode(barcode).await? {
            Some(other) if existing.as_ref().map(|e| e.id) != Some(other.id) => {
                state.warn(format!(
                    "Barcode {} already used by variant {}, skipping barcode assignment",
                    barcode, other.name
                ));
                None
            }
            _ => Some(barcode.to_string()),
        },
        None => None,
    };

    let name = match variant.title.as_deref() {
        Some(title) if !title.is_empty() && title != DEFAULT_VARIANT_TITLE => {
            format!("{} ({})", product_title, title)
        }
        _ => product_title.to_string(),
    };

    let price = variant.price.unwrap_or(Decimal::ZERO);
    let fields = VariantFields {
        product_id,
        name,
        default_code: Some(code),
        list_price: price,
        standard_price: variant.compare_at_price.unwrap_or(price),
        weight: variant.weight.unwrap_or(0.0),
        barcode,
        qty_available: variant.inventory_quantity.filter(|qty| *qty > 0),
    };
    ctx.store.upsert_variant(&fields).await?;
    Ok(())
}

/// Gives a variant created locally before the product was linked the remote
/// variant's code, so the upsert updates it instead of adding a second one.
async fn adopt_uncoded_variant(
    ctx: &SyncContext<'_>,
    state: &mut SyncCursorState,
    product_id: i64,
    code: &str,
) -> Result<Option<VariantRecord>> {
    let Some(mut uncoded) = ctx
        .store
        .variants_of(product_id)
        .await?
        .into_iter()
        .find(|v| v.default_code.is_none())
    else {
        return Ok(None);
    };
    ctx.store.set_variant_code(uncoded.id, code).await?;
    state.info(format!("Linked existing variant '{}' as {}", uncoded.name, code));
    uncoded.default_code = Some(code.to_string());
    Ok(Some(uncoded))
}

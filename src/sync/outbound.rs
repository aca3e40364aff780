// shopifysync/src/sync/outbound.rs
use chrono::{DateTime, Utc};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::state::{Resource, SyncCursorState, SyncStatus};
use super::{RunSummary, SyncContext, begin_run, fail_run};
use crate::errors::Result;
use crate::shopify::{ProductPayload, VariantPayload};
use crate::store::{
    PRODUCT_CODE_PREFIX, ProductRecord, VARIANT_CODE_PREFIX, VariantRecord, product_code, variant_code,
};

/// Creates remote products for sellable local products that were never pushed.
pub async fn export_products_to_remote(ctx: &SyncContext<'_>) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    export(ctx, run_id)
        .instrument(info_span!("export_products", %run_id))
        .await
}

/// Pushes local edits of linked products made since the last clean update run.
pub async fn update_products_in_remote(ctx: &SyncContext<'_>) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    update(ctx, run_id)
        .instrument(info_span!("update_products", %run_id))
        .await
}

/// Sets the remote available quantity of every linked variant to its local on-hand quantity.
pub async fn sync_inventory_to_remote(ctx: &SyncContext<'_>) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    inventory(ctx, run_id)
        .instrument(info_span!("sync_inventory", %run_id))
        .await
}

async fn export(ctx: &SyncContext<'_>, run_id: Uuid) -> Result<RunSummary> {
    let started_at = Utc::now();
    let mut state = begin_run(ctx, Resource::ProductExport).await?;
    let mut summary = RunSummary::new(run_id, Resource::ProductExport);

    let products = ctx.store.products_to_export(ctx.settings.export_batch_size).await?;
    summary.fetched = products.len();
    state.info(format!("Found {} products to export", products.len()));

    for product in &products {
        match export_product(ctx, &mut state, product, started_at).await {
            Ok(()) => summary.created += 1,
            Err(e) if e.needs_operator() => {
                return Err(fail_run(ctx, &mut state, "Export aborted", e).await);
            }
            Err(e) => {
                summary.failed += 1;
                state.error(format!("Failed to export product '{}': {}", product.name, e));
            }
        }
    }

    finish_outbound_run(ctx, &mut state, &summary, started_at, "products").await?;
    Ok(summary)
}

async fn export_product(
    ctx: &SyncContext<'_>,
    state: &mut SyncCursorState,
    product: &ProductRecord,
    started_at: DateTime<Utc>,
) -> Result<()> {
    let variants = ctx.store.variants_of(product.id).await?;
    let mut payload = product_payload(ctx, product).await?;
    payload.variants = variants
        .iter()
        .map(|variant| VariantPayload {
            id: None,
            title: Some(variant.name.clone()),
            price: variant.list_price,
            sku: plain_code(&variant.default_code),
            weight: variant.weight,
            barcode: variant.barcode.clone(),
            inventory_quantity: Some(variant.qty_available),
        })
        .collect();

    let created = ctx.api.create_product(&payload).await?;
    let code = product_code(created.id);
    ctx.store.mark_product_synced(product.id, &code, started_at).await?;

    // Shopify returns variants in creation order; position is authoritative when present.
    let mut remote_variants = created.variants;
    remote_variants.sort_by_key(|v| v.position.unwrap_or(u32::MAX));
    for (local, remote) in variants.iter().zip(&remote_variants) {
        ctx.store.set_variant_code(local.id, &variant_code(remote.id)).await?;
    }

    state.info(format!(
        "Exported product '{}' as Shopify ID {} with {} variants",
        product.name,
        created.id,
        variants.len().min(remote_variants.len())
    ));
    Ok(())
}

async fn update(ctx: &SyncContext<'_>, run_id: Uuid) -> Result<RunSummary> {
    let started_at = Utc::now();
    let mut state = begin_run(ctx, Resource::ProductUpdate).await?;
    let mut summary = RunSummary::new(run_id, Resource::ProductUpdate);

    let products = ctx
        .store
        .products_modified_since(state.last_success_at, ctx.settings.update_batch_size)
        .await?;
    summary.fetched = products.len();
    state.info(match state.last_success_at {
        Some(since) => format!("Found {} products modified since {}", products.len(), since),
        None => format!("Found {} linked products", products.len()),
    });

    for product in &products {
        if !needs_update(product) {
            summary.skipped += 1;
            continue;
        }
        let Some(remote_id) = product.remote_id() else {
            summary.skipped += 1;
            continue;
        };

        match update_product(ctx, &mut state, product, remote_id, started_at).await {
            Ok(()) => summary.updated += 1,
            Err(e) if e.needs_operator() => {
                return Err(fail_run(ctx, &mut state, "Update aborted", e).await);
            }
            Err(e) => {
                summary.failed += 1;
                state.error(format!(
                    "Failed to update product '{}' (Shopify ID {}): {}",
                    product.name, remote_id, e
                ));
            }
        }
    }

    let watermark = batch_watermark(&products, ctx.settings.update_batch_size, started_at);
    finish_outbound_run(ctx, &mut state, &summary, watermark, "products").await?;
    Ok(summary)
}

/// Where the next update run should resume. A full batch may have left
/// later edits behind, so the mark stops below the newest `modified_at` in
/// the batch; that tie group is re-read and skipped by `needs_update` next
/// time. A short batch covered everything up to the run start.
fn batch_watermark(
    products: &[ProductRecord],
    batch_size: usize,
    started_at: DateTime<Utc>,
) -> DateTime<Utc> {
    let Some(last) = products.last() else {
        return started_at;
    };
    if products.len() < batch_size {
        return started_at;
    }
    products
        .iter()
        .map(|p| p.modified_at)
        .filter(|modified_at| *modified_at < last.modified_at)
        .max()
        .unwrap_or(last.modified_at)
}

/// Products never pushed always qualify; others only when edited after the last push.
fn needs_update(product: &ProductRecord) -> bool {
    match product.remote_synced_at.or(product.remote_updated_at) {
        Some(synced) => product.modified_at > synced,
        None => true,
    }
}

async fn update_product(
    ctx: &SyncContext<'_>,
    state: &mut SyncCursorState,
    product: &ProductRecord,
    remote_id: u64,
    started_at: DateTime<Utc>,
) -> Result<()> {
    let mut payload = product_payload(ctx, product).await?;
    payload.id = Some(remote_id);
    ctx.api.update_product(remote_id, &payload).await?;

    let variants = ctx.store.variants_of(product.id).await?;
    for variant in &variants {
        let Some(variant_remote_id) = variant.remote_id() else {
            continue;
        };
        ctx.api
            .update_variant(
                variant_remote_id,
                &VariantPayload {
                    id: Some(variant_remote_id),
                    title: None,
                    price: variant.list_price,
                    sku: plain_code(&variant.default_code),
                    weight: variant.weight,
                    barcode: variant.barcode.clone(),
                    inventory_quantity: None,
                },
            )
            .await?;
    }

    ctx.store
        .mark_product_synced(product.id, &product_code(remote_id), started_at)
        .await?;
    state.info(format!("Updated product '{}' (Shopify ID {})", product.name, remote_id));
    Ok(())
}

async fn inventory(ctx: &SyncContext<'_>, run_id: Uuid) -> Result<RunSummary> {
    let started_at = Utc::now();
    let mut state = begin_run(ctx, Resource::Inventory).await?;
    let mut summary = RunSummary::new(run_id, Resource::Inventory);

    let products = ctx.store.linked_products().await?;
    for product in &products {
        let variants = ctx.store.variants_of(product.id).await?;
        for variant in variants {
            let Some(remote_id) = variant.remote_id() else {
                continue;
            };
            summary.fetched += 1;
            match push_quantity(ctx, &variant, remote_id).await {
                Ok(()) => summary.updated += 1,
                Err(e) if e.needs_operator() => {
                    return Err(fail_run(ctx, &mut state, "Inventory sync aborted", e).await);
                }
                Err(e) => {
                    summary.failed += 1;
                    state.error(format!(
                        "Failed to set inventory for variant '{}' (Shopify ID {}): {}",
                        variant.name, remote_id, e
                    ));
                }
            }
        }
    }

    finish_outbound_run(ctx, &mut state, &summary, started_at, "variants").await?;
    Ok(summary)
}

async fn push_quantity(ctx: &SyncContext<'_>, variant: &VariantRecord, remote_id: u64) -> Result<()> {
    ctx.api
        .set_inventory_level(remote_id, variant.qty_available.max(0))
        .await
}

async fn finish_outbound_run(
    ctx: &SyncContext<'_>,
    state: &mut SyncCursorState,
    summary: &RunSummary,
    success_mark: DateTime<Utc>,
    items: &str,
) -> Result<()> {
    if summary.failed == 0 {
        state.last_success_at = Some(success_mark);
    } else {
        state.warn(format!("Some {} failed; they will be retried on the next run", items));
    }
    state.status = SyncStatus::Completed;
    state.info(format!("Finished {}", summary));
    ctx.store.save_sync_state(state).await
}

/// Product-level payload without variants.
async fn product_payload(ctx: &SyncContext<'_>, product: &ProductRecord) -> Result<ProductPayload> {
    let product_type = ctx
        .store
        .category(product.category_id)
        .await?
        .map(|c| c.name)
        .unwrap_or_default();

    let vendor = match ctx.store.supplier_lines(product.id).await?.first() {
        Some(line) => ctx.store.vendor(line.vendor_id).await?.map(|v| v.name),
        None => None,
    };

    Ok(ProductPayload {
        id: None,
        title: product.name.clone(),
        body_html: product.description.clone().unwrap_or_default(),
        vendor: vendor.unwrap_or_default(),
        product_type,
        status: if product.is_published { "active" } else { "draft" }.to_string(),
        variants: Vec::new(),
    })
}

/// A local code worth sending as SKU. Sync-generated codes stay local.
fn plain_code(code: &Option<String>) -> Option<String> {
    code.clone()
        .filter(|c| !c.is_empty())
        .filter(|c| !c.starts_with(PRODUCT_CODE_PREFIX) && !c.starts_with(VARIANT_CODE_PREFIX))
}

// shopifysync/src/sync/orders.rs
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::state::{Resource, SyncCursorState};
use super::{RunSummary, SyncContext, begin_run, fetch_next_page, finish_inbound_run, record_id};
use crate::errors::{Result, SyncError};
use crate::shopify::RemoteResource;
use crate::shopify::models::{RemoteLineItem, RemoteOrder};
use crate::store::{
    Customer, DEFAULT_CATEGORY, NewCustomer, NewOrderLine, NewSalesOrder, OrderState, ProductFields,
    VariantFields, VariantRecord, product_code, unknown_line_code, variant_code,
};

const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_LINE_DESCRIPTION: &str = "Shopify Product";

enum Saved {
    Created,
    Skipped,
}

/// Pulls one page of orders from the store and creates the missing ones locally.
pub async fn sync_orders_from_remote(ctx: &SyncContext<'_>) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    run(ctx, run_id)
        .instrument(info_span!("sync_orders", %run_id))
        .await
}

async fn run(ctx: &SyncContext<'_>, run_id: Uuid) -> Result<RunSummary> {
    let started_at = Utc::now();
    let mut state = begin_run(ctx, Resource::Orders).await?;

    let lookback = Duration::days(ctx.settings.order_lookback_days);
    let page = fetch_next_page(ctx, &mut state, RemoteResource::Orders, Some(started_at - lookback)).await?;

    let mut summary = RunSummary::new(run_id, Resource::Orders);
    summary.fetched = page.records.len();
    summary.has_more = page.next_cursor.is_some();
    state.info(format!("Fetched {} orders", summary.fetched));

    let mut newest: Option<DateTime<Utc>> = None;

    for record in page.records {
        let id = record_id(&record);
        let order: RemoteOrder = match serde_json::from_value(record) {
            Ok(order) => order,
            Err(e) => {
                summary.failed += 1;
                let err = SyncError::Mapping(e.to_string());
                state.error(format!("Skipping order {}: {}", id, err));
                continue;
            }
        };

        match save_order(ctx, &mut state, &order, started_at).await {
            Ok(Saved::Created) => summary.created += 1,
            Ok(Saved::Skipped) => summary.skipped += 1,
            Err(e) => {
                summary.failed += 1;
                state.error(format!("Failed to save order {}: {}", order_label(&order), e));
                continue;
            }
        }

        if let Some(updated_at) = order.updated_at {
            newest = Some(newest.map_or(updated_at, |n| n.max(updated_at)));
        }
    }

    finish_inbound_run(ctx, &mut state, &summary, started_at, newest).await?;
    Ok(summary)
}

fn order_label(order: &RemoteOrder) -> String {
    order
        .name
        .clone()
        .unwrap_or_else(|| format!("#{}", order.id))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|s| !s.trim().is_empty())
}

async fn save_order(
    ctx: &SyncContext<'_>,
    state: &mut SyncCursorState,
    order: &RemoteOrder,
    now: DateTime<Utc>,
) -> Result<Saved> {
    let label = order_label(order);
    let reference = product_code(order.id);
    let remote_cancelled = order.financial_status.as_deref() == Some("cancelled");

    // A cancelled local copy is replaced only when the remote order is live again.
    if let Some(existing) = ctx.store.find_order_by_ref(&reference).await? {
        if existing.state != OrderState::Cancelled || remote_cancelled {
            state.info(format!(
                "Order {} already exists with ID: {}, skipping",
                label, existing.id
            ));
            return Ok(Saved::Skipped);
        }
    }

    let customer = resolve_customer(ctx, order).await?;

    let mut lines = Vec::with_capacity(order.line_items.len());
    for item in &order.line_items {
        lines.push(map_line_item(ctx, state, item, now).await?);
    }

    let order_state = match order.financial_status.as_deref() {
        Some("cancelled") => OrderState::Cancelled,
        Some("paid") => OrderState::Confirmed,
        _ => OrderState::Draft,
    };

    let created = ctx
        .store
        .create_order(&NewSalesOrder {
            client_order_ref: reference,
            origin: order.name.clone(),
            customer_id: customer.id,
            date_order: order.created_at,
            currency: non_empty(&order.currency).unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            state: order_state,
            lines,
        })
        .await?;
    state.info(format!("Created order {} for {}", label, customer.name));

    match order_state {
        OrderState::Cancelled => {
            state.info(format!("Order {} is cancelled, setting to cancel state.", label));
        }
        OrderState::Confirmed => {
            let send = ctx.settings.send_invoice_on_payment;
            ctx.store.create_invoice(&created, send).await?;
            if send {
                state.info(format!("Invoice sent for order: {}", label));
            } else {
                state.info(format!(
                    "Invoice posted but not sent for order: {} due to configuration",
                    label
                ));
            }
        }
        OrderState::Draft => {
            if order.financial_status.as_deref() == Some("partially_paid") {
                state.info(format!(
                    "Order {} is partially paid, invoice will not be created.",
                    label
                ));
            } else {
                state.info(format!("Order {} is not paid, invoice will not be created.", label));
            }
        }
    }

    Ok(Saved::Created)
}

async fn resolve_customer(ctx: &SyncContext<'_>, order: &RemoteOrder) -> Result<Customer> {
    let remote = order.customer.clone().unwrap_or_default();
    let email = non_empty(&remote.email).or_else(|| non_empty(&order.email));

    let Some(email) = email else {
        return ctx
            .store
            .create_customer(&NewCustomer {
                name: order_label(order),
                ..NewCustomer::default()
            })
            .await;
    };

    if let Some(existing) = ctx.store.find_customer_by_email(&email).await? {
        return Ok(existing);
    }

    let full_name = format!(
        "{} {}",
        remote.first_name.unwrap_or_default(),
        remote.last_name.unwrap_or_default()
    )
    .trim()
    .to_string();

    let address = order.shipping_address.clone().unwrap_or_default();
    ctx.store
        .create_customer(&NewCustomer {
            name: if full_name.is_empty() { email.clone() } else { full_name },
            email: Some(email),
            phone: non_empty(&remote.phone),
            street: address.address1,
            street2: address.address2,
            city: address.city,
            zip: address.zip,
            country_code: address.country_code,
            state_code: address.province_code,
            portal_access: ctx.settings.create_user_portal,
        })
        .await
}

async fn map_line_item(
    ctx: &SyncContext<'_>,
    state: &mut SyncCursorState,
    item: &RemoteLineItem,
    now: DateTime<Utc>,
) -> Result<NewOrderLine> {
    let mut variant = match item.variant_id {
        Some(variant_id) => ctx.store.find_variant_by_code(&variant_code(variant_id)).await?,
        None => None,
    };
    if variant.is_none() {
        if let Some(sku) = non_empty(&item.sku) {
            variant = ctx.store.find_variant_by_code(&sku).await?;
        }
    }

    let description = non_empty(&item.title).unwrap_or_else(|| DEFAULT_LINE_DESCRIPTION.to_string());
    let price_unit = item.price.unwrap_or(Decimal::ZERO);

    let variant = match variant {
        Some(found) => found,
        None => placeholder_variant(ctx, state, item, &description, price_unit, now).await?,
    };

    Ok(NewOrderLine {
        variant_id: variant.id,
        description,
        quantity: item.quantity.unwrap_or(Decimal::ONE),
        price_unit,
    })
}

/// Stand-in product for a line item that matches nothing local. Not sellable,
/// so it is never exported.
async fn placeholder_variant(
    ctx: &SyncContext<'_>,
    state: &mut SyncCursorState,
    item: &RemoteLineItem,
    description: &str,
    price: Decimal,
    now: DateTime<Utc>,
) -> Result<VariantRecord> {
    let code = unknown_line_code(item.id);
    if let Some(existing) = ctx.store.find_variant_by_code(&code).await? {
        return Ok(existing);
    }

    let product = match ctx.store.find_product_by_code(&code).await? {
        Some(product) => product,
        None => {
            let category = ctx.store.get_or_create_category(DEFAULT_CATEGORY).await?;
            ctx.store
                .create_product(&ProductFields {
                    name: description.to_string(),
                    default_code: Some(code.clone()),
                    category_id: category.id,
                    description: None,
                    sale_ok: false,
                    purchase_ok: false,
                    is_published: false,
                    dropship: false,
                    image_url: None,
                    remote_updated_at: None,
                    remote_synced_at: None,
                    modified_at: now,
                })
                .await?
        }
    };

    state.warn(format!(
        "No local product for line item '{}', created placeholder {}",
        description, code
    ));
    ctx.store
        .upsert_variant(&VariantFields {
            product_id: product.id,
            name: description.to_string(),
            default_code: Some(code),
            list_price: price,
            standard_price: price,
            weight: 0.0,
            barcode: None,
            qty_available: None,
        })
        .await
}

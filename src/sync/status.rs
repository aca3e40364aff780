// shopifysync/src/sync/status.rs
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use tracing::{info, warn};

use super::state::{Resource, SyncStatus};
use super::{SyncContext, start_of_year};
use crate::errors::Result;
use crate::shopify::{CommerceApi, RemoteResource};

const LOG_TAIL_LINES: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceStatus {
    pub resource: Resource,
    pub status: SyncStatus,
    pub last_success_at: Option<DateTime<Utc>>,
    /// True while a multi-page sweep is in progress.
    pub has_cursor: bool,
    pub log_tail: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub remote_products: Option<u64>,
    pub remote_orders: Option<u64>,
    pub local_products: u64,
    pub local_orders: u64,
    pub resources: Vec<ResourceStatus>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = |n: Option<u64>| n.map_or_else(|| "unknown".to_string(), |n| n.to_string());
        writeln!(
            f,
            "Products: {} synced locally, {} in Shopify",
            self.local_products,
            count(self.remote_products)
        )?;
        writeln!(
            f,
            "Orders:   {} synced locally, {} in Shopify",
            self.local_orders,
            count(self.remote_orders)
        )?;
        for resource in &self.resources {
            let last = resource
                .last_success_at
                .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
            writeln!(
                f,
                "  {:<15} {:<10} last success: {}{}",
                resource.resource.as_str(),
                resource.status.as_str(),
                last,
                if resource.has_cursor { " (sweep in progress)" } else { "" }
            )?;
            for line in &resource.log_tail {
                writeln!(f, "      {}", line)?;
            }
        }
        Ok(())
    }
}

/// Fetches the shop name; authentication problems surface as errors.
pub async fn test_connection(api: &dyn CommerceApi) -> Result<String> {
    let name = api.shop_name().await?;
    info!(shop = %name, "Connection to Shopify succeeded");
    Ok(name)
}

/// Local and remote counts plus the state of every sync resource.
pub async fn status_report(ctx: &SyncContext<'_>) -> Result<StatusReport> {
    let now = Utc::now();
    let lookback = Duration::days(ctx.settings.order_lookback_days);

    let remote_products = remote_total(ctx, Resource::Products, RemoteResource::Products, start_of_year(now)).await?;
    let remote_orders = remote_total(ctx, Resource::Orders, RemoteResource::Orders, Some(now - lookback)).await?;

    let mut resources = Vec::with_capacity(Resource::ALL.len());
    for resource in Resource::ALL {
        let state = ctx.store.load_sync_state(resource).await?;
        let skip = state.log.len().saturating_sub(LOG_TAIL_LINES);
        resources.push(ResourceStatus {
            resource,
            status: state.status,
            last_success_at: state.last_success_at,
            has_cursor: state.cursor.is_some(),
            log_tail: state.log[skip..].to_vec(),
        });
    }

    Ok(StatusReport {
        remote_products,
        remote_orders,
        local_products: ctx.store.count_linked_products().await?,
        local_orders: ctx.store.count_synced_orders().await?,
        resources,
    })
}

/// Remote count, cached on the resource state. A failed count falls back to the cached value.
async fn remote_total(
    ctx: &SyncContext<'_>,
    resource: Resource,
    remote: RemoteResource,
    created_at_min: Option<DateTime<Utc>>,
) -> Result<Option<u64>> {
    let mut state = ctx.store.load_sync_state(resource).await?;
    match ctx.api.count(remote, created_at_min).await {
        Ok(total) => {
            state.remote_total = Some(total);
            ctx.store.save_sync_state(&state).await?;
            Ok(Some(total))
        }
        Err(e) if e.needs_operator() => Err(e),
        Err(e) => {
            warn!(%resource, error = %e, "Remote count failed, using cached total");
            Ok(state.remote_total)
        }
    }
}

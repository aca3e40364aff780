// shopifysync/src/sync/mod.rs
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use tracing::warn;
use uuid::Uuid;

use crate::config::SyncSettings;
use crate::errors::{Result, SyncError};
use crate::shopify::{CommerceApi, Page, PageQuery, RemoteResource};
use crate::store::RecordStore;

pub(crate) mod orders;
pub(crate) mod outbound;
pub(crate) mod products;
pub mod state;
pub(crate) mod status;

pub use orders::sync_orders_from_remote;
pub use outbound::{export_products_to_remote, sync_inventory_to_remote, update_products_in_remote};
pub use products::sync_products_from_remote;
pub use state::{Resource, SyncCursorState, SyncStatus};
pub use status::{status_report, test_connection};

/// Everything a sync run needs, passed explicitly to each job.
pub struct SyncContext<'a> {
    pub api: &'a dyn CommerceApi,
    pub store: &'a dyn RecordStore,
    pub settings: &'a SyncSettings,
}

/// Counters reported by every sync job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub resource: Resource,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// True when the remote reported another page after this one.
    pub has_more: bool,
}

impl RunSummary {
    pub fn new(run_id: Uuid, resource: Resource) -> Self {
        Self {
            run_id,
            resource,
            fetched: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            has_more: false,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} fetched, {} created, {} updated, {} skipped, {} failed",
            self.resource, self.fetched, self.created, self.updated, self.skipped, self.failed
        )
    }
}

/// Loads the state for a resource and marks it running.
pub(crate) async fn begin_run(ctx: &SyncContext<'_>, resource: Resource) -> Result<SyncCursorState> {
    let mut state = ctx.store.load_sync_state(resource).await?;
    state.status = SyncStatus::Running;
    ctx.store.save_sync_state(&state).await?;
    Ok(state)
}

/// Records a run-level failure on the state and hands the error back.
pub(crate) async fn fail_run(
    ctx: &SyncContext<'_>,
    state: &mut SyncCursorState,
    context: &str,
    err: SyncError,
) -> SyncError {
    state.status = SyncStatus::Error;
    state.error(format!("{}: {}", context, err));
    if let Err(save_err) = ctx.store.save_sync_state(state).await {
        warn!(resource = %state.resource, error = %save_err, "Failed to persist sync state after error");
    }
    err
}

/// Fetches the next inbound page and persists its continuation cursor before
/// any record is mapped. A fetch failure leaves the stored cursor as it was.
pub(crate) async fn fetch_next_page(
    ctx: &SyncContext<'_>,
    state: &mut SyncCursorState,
    remote: RemoteResource,
    created_at_min: Option<DateTime<Utc>>,
) -> Result<Page> {
    let limit = ctx.settings.page_size;
    let query = match state.cursor.clone() {
        Some(cursor) => {
            state.info("Continuing from saved cursor");
            PageQuery::Continue { limit, cursor }
        }
        None => {
            state.info(match state.high_water_mark {
                Some(mark) => format!("Starting fresh sweep of records updated since {}", mark),
                None => "Starting fresh sweep".to_string(),
            });
            PageQuery::Initial {
                limit,
                created_at_min,
                updated_at_min: state.high_water_mark,
            }
        }
    };

    let page = match ctx.api.fetch_page(remote, &query).await {
        Ok(page) => page,
        Err(err) => return Err(fail_run(ctx, state, "Fetch failed", err).await),
    };

    state.cursor = page.next_cursor.clone();
    ctx.store.save_sync_state(state).await?;
    Ok(page)
}

/// Closes an inbound run: advances the high-water mark and, when every record
/// mapped cleanly, the last-success timestamp.
pub(crate) async fn finish_inbound_run(
    ctx: &SyncContext<'_>,
    state: &mut SyncCursorState,
    summary: &RunSummary,
    started_at: DateTime<Utc>,
    newest_updated_at: Option<DateTime<Utc>>,
) -> Result<()> {
    if let Some(newest) = newest_updated_at {
        state.high_water_mark = Some(state.high_water_mark.map_or(newest, |mark| mark.max(newest)));
    }
    if summary.failed == 0 {
        state.last_success_at = Some(started_at);
    }
    state.status = SyncStatus::Completed;
    state.info(format!("Finished {}", summary));
    if summary.has_more {
        state.info("More records available; the next run continues from the saved cursor");
    }
    ctx.store.save_sync_state(state).await
}

/// Midnight UTC on January 1st of the year containing `now`.
pub(crate) fn start_of_year(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    use chrono::Datelike;
    NaiveDate::from_ymd_opt(now.year(), 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Best-effort id of a raw record, for log lines about records that failed to map.
pub(crate) fn record_id(record: &serde_json::Value) -> String {
    record
        .get("id")
        .map(|id| id.to_string())
        .unwrap_or_else(|| "<no id>".to_string())
}

// shopifysync/src/scheduler/mod.rs
use futures::future::BoxFuture;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;
use crate::errors::Result;
use crate::sync::{
    Resource, RunSummary, SyncContext, export_products_to_remote, sync_inventory_to_remote,
    sync_orders_from_remote, sync_products_from_remote, update_products_in_remote,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    SyncProducts,
    SyncOrders,
    ExportProducts,
    UpdateProducts,
    SyncInventory,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::SyncProducts,
        JobKind::SyncOrders,
        JobKind::ExportProducts,
        JobKind::UpdateProducts,
        JobKind::SyncInventory,
    ];

    /// Name used in config.json and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::SyncProducts => "sync_products",
            JobKind::SyncOrders => "sync_orders",
            JobKind::ExportProducts => "export_products",
            JobKind::UpdateProducts => "update_products",
            JobKind::SyncInventory => "sync_inventory",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        JobKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn default_interval(&self) -> Duration {
        match self {
            JobKind::SyncOrders => Duration::from_secs(30 * 60),
            _ => Duration::from_secs(60 * 60),
        }
    }

    pub fn resource(&self) -> Resource {
        match self {
            JobKind::SyncProducts => Resource::Products,
            JobKind::SyncOrders => Resource::Orders,
            JobKind::ExportProducts => Resource::ProductExport,
            JobKind::UpdateProducts => Resource::ProductUpdate,
            JobKind::SyncInventory => Resource::Inventory,
        }
    }
}

type JobFn = for<'a> fn(&'a SyncContext<'a>) -> BoxFuture<'a, Result<RunSummary>>;

fn sync_products<'a>(ctx: &'a SyncContext<'a>) -> BoxFuture<'a, Result<RunSummary>> {
    Box::pin(sync_products_from_remote(ctx))
}

fn sync_orders<'a>(ctx: &'a SyncContext<'a>) -> BoxFuture<'a, Result<RunSummary>> {
    Box::pin(sync_orders_from_remote(ctx))
}

fn export_products<'a>(ctx: &'a SyncContext<'a>) -> BoxFuture<'a, Result<RunSummary>> {
    Box::pin(export_products_to_remote(ctx))
}

fn update_products<'a>(ctx: &'a SyncContext<'a>) -> BoxFuture<'a, Result<RunSummary>> {
    Box::pin(update_products_in_remote(ctx))
}

fn sync_inventory<'a>(ctx: &'a SyncContext<'a>) -> BoxFuture<'a, Result<RunSummary>> {
    Box::pin(sync_inventory_to_remote(ctx))
}

// Indexed by `JobKind` discriminant, in `JobKind::ALL` order.
static JOBS: [(JobKind, JobFn); 5] = [
    (JobKind::SyncProducts, sync_products),
    (JobKind::SyncOrders, sync_orders),
    (JobKind::ExportProducts, export_products),
    (JobKind::UpdateProducts, update_products),
    (JobKind::SyncInventory, sync_inventory),
];

/// Runs a single job to completion.
pub async fn run_job<'a>(kind: JobKind, ctx: &'a SyncContext<'a>) -> Result<RunSummary> {
    let (_, job) = JOBS[kind as usize];
    job(ctx).await
}

#[derive(Debug, Clone, Copy)]
struct ScheduledJob {
    kind: JobKind,
    interval: Duration,
    next_due: Instant,
}

/// Enabled jobs, all due immediately.
fn plan(schedule: &ScheduleConfig, now: Instant) -> Vec<ScheduledJob> {
    JobKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let job = schedule.job(kind);
            job.enabled.then_some(ScheduledJob {
                kind,
                interval: job.interval,
                next_due: now,
            })
        })
        .collect()
}

/// Runs every due job one after another. A failed job is logged and comes
/// round again after its interval. Returns how many jobs ran.
async fn run_due_jobs<'a>(ctx: &'a SyncContext<'a>, jobs: &mut [ScheduledJob]) -> usize {
    let mut ran = 0;
    for job in jobs.iter_mut() {
        if job.next_due > Instant::now() {
            continue;
        }
        match run_job(job.kind, ctx).await {
            Ok(summary) => info!(job = job.kind.name(), %summary, "Job finished"),
            Err(e) if e.needs_operator() => error!(
                job = job.kind.name(),
                resource = %job.kind.resource(),
                error = %e,
                "Job failed; check credentials and configuration"
            ),
            Err(e) => warn!(
                job = job.kind.name(),
                resource = %job.kind.resource(),
                error = %e,
                "Job failed; retrying on next tick"
            ),
        }
        job.next_due = Instant::now() + job.interval;
        ran += 1;
    }
    ran
}

/// Periodic runner. Jobs never overlap; the loop ends on Ctrl-C or
/// immediately when no job is enabled.
pub async fn run_schedule<'a>(ctx: &'a SyncContext<'a>, schedule: &ScheduleConfig) -> Result<()> {
    let mut jobs = plan(schedule, Instant::now());
    if jobs.is_empty() {
        warn!("No scheduled jobs are enabled; nothing to do");
        return Ok(());
    }
    info!(
        jobs = %jobs.iter().map(|j| j.kind.name()).collect::<Vec<_>>().join(", "),
        "Scheduler started"
    );

    loop {
        run_due_jobs(ctx, &mut jobs).await;

        let Some(wake_at) = jobs.iter().map(|j| j.next_due).min() else {
            return Ok(());
        };
        tokio::select! {
            _ = sleep_until(wake_at) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, stopping scheduler");
                return Ok(());
            }
        }
    }
}

// shopifysync/src/sync/state.rs
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{error, info, warn};

/// Number of log lines kept on a sync state; older lines are dropped first.
pub const MAX_LOG_LINES: usize = 500;

/// Kinds of sync work that each own an independent cursor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Products,
    Orders,
    ProductExport,
    ProductUpdate,
    Inventory,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Products,
        Resource::Orders,
        Resource::ProductExport,
        Resource::ProductUpdate,
        Resource::Inventory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Products => "products",
            Resource::Orders => "orders",
            Resource::ProductExport => "product_export",
            Resource::ProductUpdate => "product_update",
            Resource::Inventory => "inventory",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncStatus {
    #[default]
    Idle,
    Running,
    Error,
    Completed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Running => "running",
            SyncStatus::Error => "error",
            SyncStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "idle" => Some(SyncStatus::Idle),
            "running" => Some(SyncStatus::Running),
            "error" => Some(SyncStatus::Error),
            "completed" => Some(SyncStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn label(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Persisted progress of one resource's sync.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncCursorState {
    pub resource: Resource,
    /// Continuation token of the next page, `None` when the next run starts fresh.
    pub cursor: Option<String>,
    /// Latest remote `updated_at` among successfully mapped records.
    pub high_water_mark: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    /// Last remote total count seen; shown when a fresh count fails.
    pub remote_total: Option<u64>,
    pub log: Vec<String>,
}

impl SyncCursorState {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            cursor: None,
            high_water_mark: None,
            last_success_at: None,
            status: SyncStatus::Idle,
            remote_total: None,
            log: Vec::new(),
        }
    }

    /// Appends a timestamped line to the persisted log and mirrors it to tracing.
    pub fn log(&mut self, level: LogLevel, message: impl AsRef<str>) {
        let message = message.as_ref();
        match level {
            LogLevel::Info => info!(resource = %self.resource, "{}", message),
            LogLevel::Warning => warn!(resource = %self.resource, "{}", message),
            LogLevel::Error => error!(resource = %self.resource, "{}", message),
        }

        self.log.push(format!(
            "[{}] {}: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            level.label(),
            message
        ));
        if self.log.len() > MAX_LOG_LINES {
            let excess = self.log.len() - MAX_LOG_LINES;
            self.log.drain(..excess);
        }
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }

    pub fn log_text(&self) -> String {
        self.log.join("\n")
    }

    pub fn log_from_text(text: &str) -> Vec<String> {
        text.lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

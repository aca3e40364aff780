// shopifysync/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::errors::SyncError;
use crate::scheduler::JobKind;

pub const DEFAULT_API_VERSION: &str = "2023-10";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_EXPORT_BATCH_SIZE: usize = 10;
pub const DEFAULT_UPDATE_BATCH_SIZE: usize = 20;
pub const DEFAULT_ORDER_LOOKBACK_DAYS: i64 = 30;
// Shopify rejects page sizes above this.
const MAX_PAGE_SIZE: u32 = 250;

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonShopifyConfig {
    pub store_url: Option<String>,
    pub access_token: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonSyncOptions {
    pub page_size: Option<u32>,
    pub export_batch_size: Option<usize>,
    pub update_batch_size: Option<usize>,
    pub order_lookback_days: Option<i64>,
    #[serde(default)]
    pub auto_publish_website: bool,
    #[serde(default)]
    pub send_invoice_on_payment: bool,
    #[serde(default)]
    pub create_user_portal: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonJobSchedule {
    #[serde(default)]
    pub enabled: bool,
    pub interval_minutes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub shopify: Option<JsonShopifyConfig>,
    pub database_url: Option<String>,
    pub sync: Option<JsonSyncOptions>,
    pub schedule: Option<HashMap<String, JsonJobSchedule>>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    pub store_url: Url,
    pub access_token: String,
    pub api_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub page_size: u32,
    pub export_batch_size: usize,
    pub update_batch_size: usize,
    pub order_lookback_days: i64,
    pub auto_publish_website: bool,
    pub send_invoice_on_payment: bool,
    pub create_user_portal: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            page_size: DEFAULT_PAGE_SIZE,
            export_batch_size: DEFAULT_EXPORT_BATCH_SIZE,
            update_batch_size: DEFAULT_UPDATE_BATCH_SIZE,
            order_lookback_days: DEFAULT_ORDER_LOOKBACK_DAYS,
            auto_publish_website: false,
            send_invoice_on_payment: false,
            create_user_portal: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSchedule {
    pub enabled: bool,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub jobs: HashMap<JobKind, JobSchedule>,
}

impl ScheduleConfig {
    /// Schedule for a job; jobs missing from config.json are inactive.
    pub fn job(&self, kind: JobKind) -> JobSchedule {
        self.jobs.get(&kind).copied().unwrap_or(JobSchedule {
            enabled: false,
            interval: kind.default_interval(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: SyncSettings,
    pub schedule: ScheduleConfig,
    pub raw_json_config: RawJsonConfig, // Credentials are validated at the point of use
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let mut raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;

        apply_env_overrides(&mut raw_json_config, |key| std::env::var(key).ok());

        Ok(AppConfig {
            settings: load_sync_settings_from_json(&raw_json_config)?,
            schedule: load_schedule_from_json(&raw_json_config)?,
            raw_json_config,
        })
    }
}

/// Environment values (typically from `.env`) win over config.json so that
/// secrets can stay out of the file.
pub fn apply_env_overrides<F>(raw_config: &mut RawJsonConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let shopify = raw_config.shopify.get_or_insert_with(JsonShopifyConfig::default);
    if let Some(token) = lookup("SHOPIFY_ACCESS_TOKEN").filter(|s| !s.is_empty()) {
        shopify.access_token = Some(token);
    }
    if let Some(store_url) = lookup("SHOPIFY_STORE_URL").filter(|s| !s.is_empty()) {
        shopify.store_url = Some(store_url);
    }
    if let Some(version) = lookup("SHOPIFY_API_VERSION").filter(|s| !s.is_empty()) {
        shopify.api_version = Some(version);
    }
    if let Some(database_url) = lookup("DATABASE_URL").filter(|s| !s.is_empty()) {
        raw_config.database_url = Some(database_url);
    }
}

/// Builds the remote API configuration. Missing credentials are reported as
/// configuration errors before any request is made.
pub fn load_shopify_config_from_json(
    raw_config: &RawJsonConfig,
) -> crate::errors::Result<ShopifyConfig> {
    let shopify = raw_config.shopify.clone().unwrap_or_default();

    let access_token = shopify
        .access_token
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            SyncError::Configuration(
                "Shopify access token is not configured (shopify.access_token or SHOPIFY_ACCESS_TOKEN)".to_string(),
            )
        })?;

    let store_url_str = shopify
        .store_url
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            SyncError::Configuration(
                "Shopify store URL is not configured (shopify.store_url or SHOPIFY_STORE_URL)".to_string(),
            )
        })?;

    let store_url = Url::parse(store_url_str.trim_end_matches('/')).map_err(|e| {
        SyncError::Configuration(format!("Invalid Shopify store URL '{}': {}", store_url_str, e))
    })?;
    if store_url.scheme() != "https" && store_url.scheme() != "http" {
        return Err(SyncError::Configuration(format!(
            "Shopify store URL must use http(s), got '{}'",
            store_url.scheme()
        )));
    }

    let api_version = shopify
        .api_version
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

    Ok(ShopifyConfig {
        store_url,
        access_token,
        api_version,
    })
}

pub fn load_database_url_from_json(raw_config: &RawJsonConfig) -> Result<String> {
    let database_url = raw_config
        .database_url
        .as_ref()
        .context("database_url must be set in config.json (or DATABASE_URL in the environment)")?
        .clone();

    if database_url.trim().is_empty() {
        return Err(anyhow::anyhow!("database_url cannot be empty in config.json."));
    }
    Ok(database_url)
}

pub fn load_sync_settings_from_json(raw_config: &RawJsonConfig) -> Result<SyncSettings> {
    let Some(options) = raw_config.sync.as_ref() else {
        return Ok(SyncSettings::default());
    };

    let page_size = options.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(anyhow::anyhow!(
            "sync.page_size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE,
            page_size
        ));
    }

    let order_lookback_days = options.order_lookback_days.unwrap_or(DEFAULT_ORDER_LOOKBACK_DAYS);
    if order_lookback_days < 0 {
        return Err(anyhow::anyhow!(
            "sync.order_lookback_days cannot be negative, got {}",
            order_lookback_days
        ));
    }

    Ok(SyncSettings {
        page_size,
        export_batch_size: options.export_batch_size.unwrap_or(DEFAULT_EXPORT_BATCH_SIZE),
        update_batch_size: options.update_batch_size.unwrap_or(DEFAULT_UPDATE_BATCH_SIZE),
        order_lookback_days,
        auto_publish_website: options.auto_publish_website,
        send_invoice_on_payment: options.send_invoice_on_payment,
        create_user_portal: options.create_user_portal,
    })
}

/// Parses the schedule section, keyed by job name (e.g. "sync_products").
fn load_schedule_from_json(raw_config: &RawJsonConfig) -> Result<ScheduleConfig> {
    let mut jobs = HashMap::new();

    if let Some(entries) = &raw_config.schedule {
        for (name, entry) in entries {
            let kind = JobKind::from_name(name).with_context(|| {
                format!(
                    "Unknown job '{}' in schedule section. Known jobs: {}",
                    name,
                    JobKind::ALL.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
                )
            })?;
            let interval = match entry.interval_minutes {
                Some(0) => {
                    return Err(anyhow::anyhow!(
                        "schedule.{}.interval_minutes must be greater than zero",
                        name
                    ));
                }
                Some(minutes) => Duration::from_secs(minutes * 60),
                None => kind.default_interval(),
            };
            jobs.insert(
                kind,
                JobSchedule {
                    enabled: entry.enabled,
                    interval,
                },
            );
        }
    }

    Ok(ScheduleConfig { jobs })
}

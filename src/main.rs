//! Shopify <-> ERP synchronisation tool
//!
//! Provides a CLI for one-off sync runs, status reporting and the periodic scheduler

// shopifysync/src/main.rs
mod config;
mod errors;
mod scheduler;
mod shopify;
mod store;
mod sync;

use anyhow::{Context, Result};
use config::{AppConfig, load_database_url_from_json, load_shopify_config_from_json};
use scheduler::JobKind;
use shopify::ShopifyClient;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use store::{PgStore, RecordStore};
use sync::SyncContext;
use tracing_subscriber::EnvFilter;

const CONFIG_PATH_VAR: &str = "SHOPIFY_SYNC_CONFIG";

/// Main entry point for the sync tool
#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    // .env values override config.json, so load it before the config
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = env::var(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let app_config = AppConfig::load_from_json(&config_path)
        .context(format!("Failed to load application configuration from {}", config_path.display()))?;

    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };

    match choice.as_str() {
        "6" | "test-connection" => {
            println!("🔌 Testing connection to Shopify...");
            let client = shopify_client(&app_config)?;
            let shop = sync::test_connection(&client)
                .await
                .context("Connection test failed")?;
            println!("Connected to shop: {}", shop);
        }
        "7" | "status" => {
            let client = shopify_client(&app_config)?;
            let store = open_store(&app_config).await?;
            let ctx = context(&client, &store, &app_config);
            let report = sync::status_report(&ctx)
                .await
                .context("Failed to build status report")?;
            print!("{}", report);
        }
        "8" | "reset" => {
            if !confirm("This deletes every synced product, variant, order and invoice plus all sync state.")? {
                println!("Reset cancelled.");
                return Ok(());
            }
            let store = open_store(&app_config).await?;
            let report = store
                .reset_synced_data()
                .await
                .context("Reset failed")?;
            println!(
                "🧹 Removed {} products, {} variants, {} supplier lines, {} orders, {} invoices, {} sync states.",
                report.products,
                report.variants,
                report.supplier_lines,
                report.orders,
                report.invoices,
                report.sync_states
            );
        }
        "run-once" => {
            let name = args.get(2).map(String::as_str).unwrap_or_default();
            let kind = JobKind::from_name(name).with_context(|| {
                format!("Usage: run-once <job>. Known jobs: {}", job_names())
            })?;
            run_single_job(&app_config, kind).await?;
        }
        "9" | "schedule" => {
            println!("⏱️ Starting scheduler (Ctrl-C to stop)...");
            let client = shopify_client(&app_config)?;
            let store = open_store(&app_config).await?;
            let ctx = context(&client, &store, &app_config);
            scheduler::run_schedule(&ctx, &app_config.schedule)
                .await
                .context("Scheduler failed")?;
        }
        other => match job_for_choice(other) {
            Some(kind) => run_single_job(&app_config, kind).await?,
            None => {
                println!("❌ Invalid choice '{}'. Run without arguments to see the menu.", other);
                anyhow::bail!("Invalid operation choice");
            }
        },
    }
    Ok(())
}

fn job_for_choice(choice: &str) -> Option<JobKind> {
    match choice {
        "1" | "products" => Some(JobKind::SyncProducts),
        "2" | "orders" => Some(JobKind::SyncOrders),
        "3" | "export" => Some(JobKind::ExportProducts),
        "4" | "update" => Some(JobKind::UpdateProducts),
        "5" | "inventory" => Some(JobKind::SyncInventory),
        _ => None,
    }
}

fn job_names() -> String {
    JobKind::ALL
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(", ")
}

async fn run_single_job(app_config: &AppConfig, kind: JobKind) -> Result<()> {
    println!("⚙️ Running {}...", kind.name());
    let client = shopify_client(app_config)?;
    let store = open_store(app_config).await?;
    let ctx = context(&client, &store, app_config);
    let summary = scheduler::run_job(kind, &ctx)
        .await
        .with_context(|| format!("Job {} failed", kind.name()))?;
    println!("{}", summary);
    if summary.has_more {
        println!("More records are waiting; run the job again to continue.");
    }
    Ok(())
}

fn shopify_client(app_config: &AppConfig) -> Result<ShopifyClient> {
    let shopify_config = load_shopify_config_from_json(&app_config.raw_json_config)
        .context("Failed to load Shopify configuration")?;
    Ok(ShopifyClient::new(&shopify_config)?)
}

async fn open_store(app_config: &AppConfig) -> Result<PgStore> {
    let database_url = load_database_url_from_json(&app_config.raw_json_config)?;
    let store = PgStore::connect(&database_url)
        .await
        .context("Failed to connect to the database")?;
    store
        .ensure_schema()
        .await
        .context("Failed to prepare the database schema")?;
    Ok(store)
}

fn context<'a>(client: &'a ShopifyClient, store: &'a PgStore, app_config: &'a AppConfig) -> SyncContext<'a> {
    SyncContext {
        api: client,
        store,
        settings: &app_config.settings,
    }
}

fn confirm(warning: &str) -> Result<bool> {
    use std::io::{Write, stdin, stdout};

    println!("⚠️ {}", warning);
    print!("Type 'yes' to continue: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin().read_line(&mut input).context("Failed to read user input")?;
    Ok(input.trim().eq_ignore_ascii_case("yes"))
}

/// Prompts the user to select an operation
///
/// Returns the user's choice as String
fn prompt_choice() -> Result<String> {
    use std::io::{Write, stdin, stdout};

    println!("Select an operation:");
    println!("1. Import products from Shopify (or type 'products')");
    println!("2. Import orders from Shopify (or type 'orders')");
    println!("3. Export new products to Shopify (or type 'export')");
    println!("4. Push product updates to Shopify (or type 'update')");
    println!("5. Push inventory levels to Shopify (or type 'inventory')");
    println!("6. Test the Shopify connection (or type 'test-connection')");
    println!("7. Show sync status (or type 'status')");
    println!("8. Reset synced data (or type 'reset')");
    println!("9. Run the scheduler (or type 'schedule')");
    print!("Enter your choice: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin().read_line(&mut input).context("Failed to read user input")?;
    Ok(input.trim().to_string())
}

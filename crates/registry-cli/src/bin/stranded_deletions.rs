use anyhow::{Context, Result};
use clap::Parser;

use registry_api::setup::{database::setup_database, services::build_context};
use registry_cli::{init_tracing, reconcile};
use registry_core::Config;
use registry_services::DeletionService;

#[derive(Parser, Debug)]
#[command(name = "stranded_deletions")]
#[command(about = "List approved deletion requests whose work items were never queued")]
struct Args {
    /// Create and queue the missing work items
    #[arg(long)]
    redispatch: bool,

    /// Output format: json or table (default: table)
    #[arg(long, default_value = "table")]
    format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = Config::from_env()?;
    config.validate().context("Configuration validation failed")?;
    let pool = setup_database(&config).await?;
    let ctx = build_context(&config, pool)?;
    let deletion = DeletionService::new(ctx);

    let rows = reconcile(&deletion, args.redispatch).await?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => {
            if rows.is_empty() {
                println!("No stranded deletion requests.");
                return Ok(());
            }
            println!(
                "{:<8} {:<12} {:<26} {:>7} {:>6}  {}",
                "ID", "INSTITUTION", "CONFIRMED AT", "OBJECTS", "FILES", "RESULT"
            );
            for row in &rows {
                let confirmed = row
                    .confirmed_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                let result = match (&row.error, row.work_item_id) {
                    (Some(e), _) => format!("failed: {}", e),
                    (None, Some(id)) => format!("queued (work item {})", id),
                    (None, None) => "stranded".to_string(),
                };
                println!(
                    "{:<8} {:<12} {:<26} {:>7} {:>6}  {}",
                    row.id, row.institution_id, confirmed, row.objects, row.files, result
                );
            }
        }
    }

    let failures = rows.iter().filter(|r| r.error.is_some()).count();
    if failures > 0 {
        anyhow::bail!("{} stranded deletion request(s) could not be redispatched", failures);
    }
    Ok(())
}

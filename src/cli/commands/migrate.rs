use anyhow::Context;
use clap::Subcommand;

use crate::cli::OutputFormat;
use crate::database::DatabaseManager;
use crate::services::location_migration;

#[derive(Subcommand)]
pub enum MigrateCommands {
    #[command(about = "Backfill map locations for places created before the map picker")]
    Locations {
        #[arg(long, help = "Report what would change without writing")]
        dry_run: bool,
    },
}

pub async fn handle(cmd: MigrateCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        MigrateCommands::Locations { dry_run } => {
            let config = crate::config::config();
            let pool = DatabaseManager::connect_lazy(&config.database).context("failed to configure database pool")?;

            let report = location_migration::migrate_locations(&pool, dry_run)
                .await
                .context("place location migration failed")?;
            pool.close().await;

            match output_format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "total": report.total,
                        "candidates": report.candidates,
                        "updated": report.updated,
                        "failed": report.failed,
                        "dryRun": report.dry_run,
                    })
                ),
                OutputFormat::Text => println!("{}", report),
            }
            Ok(())
        }
    }
}

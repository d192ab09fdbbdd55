pub mod commands;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "bridge")]
#[command(about = "Maintenance commands for the CMS admin bridge")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "One-off data migrations")]
    Migrate {
        #[command(subcommand)]
        cmd: commands::migrate::MigrateCommands,
    },

    #[command(about = "Inspect storage URLs and object names")]
    Storage {
        #[command(subcommand)]
        cmd: commands::storage::StorageCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate { cmd } => commands::migrate::handle(cmd, output_format).await,
        Commands::Storage { cmd } => commands::storage::handle(cmd, output_format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_migrate_locations() {
        let cli = Cli::try_parse_from(["bridge", "--json", "migrate", "locations", "--dry-run"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        match cli.command {
            Commands::Migrate { cmd: commands::migrate::MigrateCommands::Locations { dry_run } } => assert!(dry_run),
            _ => panic!("expected migrate locations"),
        }
    }

    #[test]
    fn parses_storage_object_name() {
        let cli = Cli::try_parse_from([
            "bridge", "storage", "object-name", "/srv/app/public/uploads/opportunity/2024/photo.jpg", "Photo_1", ".JPG",
        ])
        .unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Text));
        assert!(matches!(
            cli.command,
            Commands::Storage { cmd: commands::storage::StorageCommands::ObjectName { .. } }
        ));
    }
}

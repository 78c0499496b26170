//! Katana Forge CLI - database migrations and demo data.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! kf-cli migrate
//!
//! # Load demo users, katanas and guest drafts
//! kf-cli seed seeds/demo.yaml
//!
//! # Hand a katana over to another account
//! kf-cli katana transfer <katana-id> --from a@example.com --to b@example.com
//! ```
//!
//! All commands read `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use katana_forge_core::KatanaId;

mod commands;

#[derive(Parser)]
#[command(name = "kf-cli")]
#[command(author, version, about = "Katana Forge CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Upsert demo data described in a YAML file
    Seed {
        /// Path to the YAML seed file
        file: String,
    },
    /// Manage saved katanas
    Katana {
        #[command(subcommand)]
        action: KatanaAction,
    },
}

#[derive(Subcommand)]
enum KatanaAction {
    /// Move a katana to another account
    Transfer {
        /// Katana id
        id: KatanaId,

        /// Email of the current owner
        #[arg(long)]
        from: String,

        /// Email of the new owner
        #[arg(long)]
        to: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { file } => {
            let summary = commands::seed::from_file(&file).await?;
            tracing::info!(
                users = summary.users,
                katanas = summary.katanas,
                drafts = summary.drafts,
                "Seeding complete"
            );
        }
        Commands::Katana {
            action: KatanaAction::Transfer { id, from, to },
        } => commands::katana::transfer(id, &from, &to).await?,
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_katana_transfer() {
        let cli = Cli::try_parse_from([
            "kf-cli",
            "katana",
            "transfer",
            "6f1c2d3e-4a5b-4c6d-8e7f-90a1b2c3d4e5",
            "--from",
            "aiko@example.com",
            "--to",
            "kenji@example.com",
        ])
        .unwrap();
        match cli.command {
            Commands::Katana {
                action: KatanaAction::Transfer { id, from, to },
            } => {
                assert_eq!(id.to_string(), "6f1c2d3e-4a5b-4c6d-8e7f-90a1b2c3d4e5");
                assert_eq!(from, "aiko@example.com");
                assert_eq!(to, "kenji@example.com");
            }
            _ => panic!("expected katana transfer"),
        }
    }

    #[test]
    fn test_transfer_rejects_bad_id() {
        assert!(
            Cli::try_parse_from(["kf-cli", "katana", "transfer", "nope", "--from", "a", "--to", "b"])
                .is_err()
        );
    }
}

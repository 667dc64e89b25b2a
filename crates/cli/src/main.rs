//! Product Merge CLI - Database migrations and shop management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! pm-cli migrate
//!
//! # List installed shops
//! pm-cli shops list
//!
//! # Show one shop's stored profile
//! pm-cli shops show store.myshopify.com
//!
//! # Re-run webhook registration for a shop
//! pm-cli webhooks ensure store.myshopify.com
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `shops` - Inspect or remove installed shops
//! - `webhooks ensure` - Register any missing webhook subscriptions

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pm-cli")]
#[command(author, version, about = "Product Merge CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Inspect installed shops
    Shops {
        #[command(subcommand)]
        action: ShopsAction,
    },
    /// Manage webhook subscriptions
    Webhooks {
        #[command(subcommand)]
        action: WebhooksAction,
    },
}

#[derive(Subcommand)]
enum ShopsAction {
    /// List every installed shop
    List,
    /// Show one shop as JSON
    Show {
        /// Shop domain (e.g. store.myshopify.com)
        shop: String,
    },
    /// Delete a shop's credential, as an uninstall would
    Remove {
        /// Shop domain (e.g. store.myshopify.com)
        shop: String,
    },
}

#[derive(Subcommand)]
enum WebhooksAction {
    /// Create any missing subscriptions for a shop
    Ensure {
        /// Shop domain (e.g. store.myshopify.com)
        shop: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Shops { action } => match action {
            ShopsAction::List => commands::shops::list().await?,
            ShopsAction::Show { shop } => commands::shops::show(&shop).await?,
            ShopsAction::Remove { shop } => commands::shops::remove(&shop).await?,
        },
        Commands::Webhooks { action } => match action {
            WebhooksAction::Ensure { shop } => commands::webhooks::ensure(&shop).await?,
        },
    }
    Ok(())
}

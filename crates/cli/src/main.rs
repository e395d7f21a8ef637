//! Raredoor CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run marketplace migrations
//! rd-cli migrate
//!
//! # Load taxonomy terms
//! rd-cli seed taxonomy data/taxonomy.yaml
//!
//! # Create a merchant account
//! rd-cli user create -e owner@example.com -p 'a long password' --merchant
//!
//! # Take an hour off every product's shelf life
//! rd-cli shelf-life tick --hours 1
//!
//! # Deactivate lapsed offers
//! rd-cli offers expire
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed taxonomy` - Upsert taxonomy terms from YAML
//! - `user create` - Create accounts
//! - `shelf-life tick` - Decay product shelf life
//! - `offers expire` - Expire stale offers

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "rd-cli")]
#[command(author, version, about = "Raredoor marketplace CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed reference data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Product shelf-life maintenance
    ShelfLife {
        #[command(subcommand)]
        action: ShelfLifeAction,
    },
    /// Offer maintenance
    Offers {
        #[command(subcommand)]
        action: OffersAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert taxonomy terms from a YAML file
    Taxonomy {
        /// Path to the YAML file
        file: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user and their profile
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password; omit to create an account without password login
        #[arg(short, long)]
        password: Option<String>,

        /// First name
        #[arg(long, default_value = "")]
        first_name: String,

        /// Last name
        #[arg(long, default_value = "")]
        last_name: String,

        /// Mark the profile as a merchant
        #[arg(long)]
        merchant: bool,
    },
}

#[derive(Subcommand)]
enum ShelfLifeAction {
    /// Take elapsed hours off every published, unsold product
    Tick {
        /// Hours elapsed since the last tick
        #[arg(long, default_value_t = 1)]
        hours: u32,
    },
}

#[derive(Subcommand)]
enum OffersAction {
    /// Deactivate offers past their expiration
    Expire,
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "raredoor_cli=info,raredoor_marketplace=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

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
        Commands::Seed { target } => match target {
            SeedTarget::Taxonomy { file } => commands::seed::taxonomy(&file).await?,
        },
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                password,
                first_name,
                last_name,
                merchant,
            } => {
                commands::users::create(
                    &email,
                    password.as_deref(),
                    &first_name,
                    &last_name,
                    merchant,
                )
                .await?;
            }
        },
        Commands::ShelfLife { action } => match action {
            ShelfLifeAction::Tick { hours } => commands::shelf_life::tick(hours).await?,
        },
        Commands::Offers { action } => match action {
            OffersAction::Expire => commands::offers::expire().await?,
        },
    }
    Ok(())
}

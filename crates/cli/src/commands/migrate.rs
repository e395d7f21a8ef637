//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! rd-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `MARKETPLACE_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! Migrations live in `crates/marketplace/migrations/` and are embedded in
//! the binary.

use raredoor_marketplace::db;

/// Run all pending marketplace migrations.
///
/// # Errors
///
/// Returns an error if configuration is missing, the database is
/// unreachable, or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (_, pool) = super::connect().await?;

    tracing::info!("Running marketplace migrations...");
    db::run_migrations(&pool).await?;

    tracing::info!("Marketplace migrations complete!");
    Ok(())
}

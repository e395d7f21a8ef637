//! Subcommand implementations.

pub mod migrate;
pub mod offers;
pub mod seed;
pub mod shelf_life;
pub mod users;

use raredoor_marketplace::MarketplaceConfig;
use raredoor_marketplace::db;
use sqlx::PgPool;

/// Load configuration from the environment and open a pool.
async fn connect() -> Result<(MarketplaceConfig, PgPool), Box<dyn std::error::Error>> {
    let config = MarketplaceConfig::from_env()?;

    tracing::info!("Connecting to marketplace database...");
    let pool = db::create_pool(&config.database_url, config.max_connections).await?;

    Ok((config, pool))
}

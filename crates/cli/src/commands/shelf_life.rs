//! Shelf-life countdown.
//!
//! Meant to run from a scheduler; `--hours` is the time since the previous
//! run.

use raredoor_marketplace::db::ProductRepository;
use tracing::info;

/// Decay the shelf life of every live product by `hours`.
///
/// # Errors
///
/// Returns an error if configuration is missing or the update fails.
pub async fn tick(hours: u32) -> Result<(), Box<dyn std::error::Error>> {
    if hours == 0 {
        return Err("--hours must be at least 1".into());
    }

    let (config, pool) = super::connect().await?;

    let updated = ProductRepository::new(&pool)
        .decay_shelf_life(hours, config.shelf_life)
        .await?;

    info!(updated, hours, "Shelf life tick complete");
    Ok(())
}

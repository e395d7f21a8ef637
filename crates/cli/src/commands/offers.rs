//! Offer maintenance.

use chrono::Utc;
use raredoor_marketplace::services::OfferService;
use tracing::info;

/// Deactivate every open offer whose expiration has passed.
///
/// # Errors
///
/// Returns an error if configuration is missing or the update fails.
pub async fn expire() -> Result<(), Box<dyn std::error::Error>> {
    let (config, pool) = super::connect().await?;

    let expired = OfferService::new(&pool, config.sales_tax_rate)
        .expire_stale(Utc::now())
        .await?;

    info!(expired, "Offer expiry complete");
    Ok(())
}

//! Offers: placing, capturing, withdrawing and expiring buyer offers.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument};

use raredoor_core::{
    AddressId, OfferError, OfferId, OrderTotals, OrderType, Price, PricedLine, PricingError,
    ProductId, TaxRate, UserId, validate_offer,
};

use crate::db::offers::{OfferInsert, insert, mark_captured};
use crate::db::orders::{OrderHeader, insert_item, insert_order};
use crate::db::products::{SaleableProduct, reserve, saleable_products};
use crate::db::retailers::next_order_number;
use crate::db::{OfferRepository, RepositoryError, offers};
use crate::models::{Offer, Order, OrderItem};

/// Errors from the offer service.
#[derive(Debug, Error)]
pub enum OfferServiceError {
    /// The offer or its product breaks an offer rule.
    #[error(transparent)]
    Offer(#[from] OfferError),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("offer {0} not found")]
    OfferNotFound(OfferId),

    #[error("pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OfferServiceError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// A buyer's proposal.
#[derive(Debug, Clone)]
pub struct NewOffer {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub address_id: AddressId,
    pub offer_price: Price,
    pub expires_at: DateTime<Utc>,
}

/// An offer turned into an order.
#[derive(Debug, Clone)]
pub struct CapturedOffer {
    pub offer_id: OfferId,
    pub order: Order,
    pub item: OrderItem,
}

/// Offer lifecycle.
pub struct OfferService<'a> {
    pool: &'a PgPool,
    offers: OfferRepository<'a>,
    tax_rate: TaxRate,
}

impl<'a> OfferService<'a> {
    /// Create an offer service; offers are taxed at `tax_rate`.
    #[must_use]
    pub const fn new(pool: &'a PgPool, tax_rate: TaxRate) -> Self {
        Self {
            pool,
            offers: OfferRepository::new(pool),
            tax_rate,
        }
    }

    /// Place an offer after checking it against the product.
    ///
    /// # Errors
    ///
    /// Returns `OfferServiceError::ProductNotFound` for an unknown product
    /// and `OfferServiceError::Offer` if an offer rule is broken.
    #[instrument(skip(self, new), fields(product_id = %new.product_id))]
    pub async fn place(&self, new: &NewOffer, now: DateTime<Utc>) -> Result<Offer, OfferServiceError> {
        let mut conn = self.pool.acquire().await?;
        let product = load_product(&mut *conn, new.product_id).await?;

        validate_offer(
            &product.availability(),
            product.minimum_offer_price,
            new.offer_price,
            new.expires_at,
            now,
        )?;
        let totals = offer_totals(new.offer_price, self.tax_rate)?;

        let offer = insert(
            &mut *conn,
            &OfferInsert {
                user_id: new.user_id,
                product_id: new.product_id,
                address_id: new.address_id,
                totals,
                expires_at: new.expires_at,
            },
        )
        .await?;
        Ok(offer)
    }

    /// Accept an open offer: reserve the product and create an `OFFER`
    /// order with a single item priced at the offer.
    ///
    /// # Errors
    ///
    /// Returns `OfferError::NotOpen` if the offer was withdrawn, captured or
    /// has expired, and `OfferError::ProductUnavailable` if the product has
    /// been sold, reserved, unpublished or has run out of shelf life
    /// meanwhile.
    #[instrument(skip(self))]
    pub async fn capture(
        &self,
        offer_id: OfferId,
        now: DateTime<Utc>,
    ) -> Result<CapturedOffer, OfferServiceError> {
        let mut tx = self.pool.begin().await?;

        let offer = offers::get(&mut *tx, offer_id)
            .await?
            .ok_or(OfferServiceError::OfferNotFound(offer_id))?;
        offer.status().ensure_open(now)?;

        let product = load_product(&mut *tx, offer.product_id).await?;
        if !product.availability().is_purchasable() || !reserve(&mut *tx, offer.product_id).await? {
            return Err(OfferError::ProductUnavailable.into());
        }

        let order_number = next_order_number(&mut *tx, product.retailer_id).await?;
        let totals = OrderTotals {
            subtotal: offer.offer_price,
            discount: Price::ZERO,
            taxes: offer.taxes,
            total: offer.total_transaction_price,
        };
        let order = insert_order(
            &mut *tx,
            &OrderHeader {
                order_number: &order_number,
                user_id: offer.user_id,
                retailer_id: product.retailer_id,
                order_type: OrderType::Offer,
                address_id: offer.address_id,
                totals: &totals,
            },
        )
        .await?;
        let item = insert_item(&mut *tx, &order_number, offer.product_id, 1, offer.offer_price).await?;

        if !mark_captured(&mut *tx, offer_id, &order_number).await? {
            return Err(OfferError::NotOpen.into());
        }
        tx.commit().await?;

        info!(offer_id = %offer_id, order_number = %order_number, "Captured offer");
        Ok(CapturedOffer {
            offer_id,
            order,
            item,
        })
    }

    /// Withdraw an open offer.
    ///
    /// # Errors
    ///
    /// Returns `OfferServiceError::OfferNotFound` or `OfferError::NotOpen`.
    pub async fn withdraw(&self, offer_id: OfferId, now: DateTime<Utc>) -> Result<(), OfferServiceError> {
        let offer = self
            .offers
            .get(offer_id)
            .await?
            .ok_or(OfferServiceError::OfferNotFound(offer_id))?;
        offer.status().ensure_open(now)?;

        self.offers.withdraw(offer_id).await?;
        Ok(())
    }

    /// Deactivate every offer past its expiration.
    ///
    /// # Errors
    ///
    /// Returns `OfferServiceError::Repository` if the update fails.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64, OfferServiceError> {
        Ok(self.offers.expire_stale(now).await?)
    }
}

async fn load_product(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<SaleableProduct, OfferServiceError> {
    saleable_products(conn, &[product_id])
        .await?
        .into_iter()
        .next()
        .ok_or(OfferServiceError::ProductNotFound(product_id))
}

/// One unit at the offer price, no discount.
fn offer_totals(offer_price: Price, tax_rate: TaxRate) -> Result<OrderTotals, PricingError> {
    OrderTotals::compute(
        &[PricedLine {
            quantity: 1,
            unit_price: offer_price,
        }],
        Price::ZERO,
        tax_rate,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_offer_totals() {
        let rate = TaxRate::new(Decimal::new(8875, 5)).unwrap();
        let totals = offer_totals(Price::from_cents(40_000).unwrap(), rate).unwrap();
        assert_eq!(totals.subtotal, Price::from_cents(40_000).unwrap());
        assert_eq!(totals.discount, Price::ZERO);
        assert_eq!(totals.taxes, Price::from_cents(3550).unwrap());
        assert_eq!(totals.total, Price::from_cents(43_550).unwrap());
    }

    #[test]
    fn test_offer_totals_untaxed() {
        let totals = offer_totals(Price::from_cents(999).unwrap(), TaxRate::ZERO).unwrap();
        assert_eq!(totals.total, Price::from_cents(999).unwrap());
    }
}

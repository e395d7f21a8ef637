//! Buyer offers on products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shelf_life::Availability;
use crate::types::Price;

/// Why an offer cannot be placed or acted on.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OfferError {
    /// The product is not listed, sold, expired or reserved.
    #[error("product is not available for offers")]
    ProductUnavailable,
    /// Offers must be for a positive amount.
    #[error("offer price must be greater than zero")]
    ZeroPrice,
    /// The offer is below the seller's floor.
    #[error("offer must be at least {minimum}")]
    BelowMinimum {
        /// Lowest acceptable offer.
        minimum: Price,
    },
    /// Expiration must lie in the future.
    #[error("offer expiration must be in the future")]
    ExpirationInPast,
    /// The offer was withdrawn, captured or has expired.
    #[error("offer is no longer open")]
    NotOpen,
}

/// Check a new offer against the product it targets.
///
/// # Errors
///
/// Returns [`OfferError`] if the product cannot take offers, the amount is
/// zero or under `minimum_offer_price`, or the expiration is not after `now`.
pub fn validate_offer(
    availability: &Availability,
    minimum_offer_price: Option<Price>,
    offer_price: Price,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), OfferError> {
    if !availability.is_purchasable() {
        return Err(OfferError::ProductUnavailable);
    }
    if offer_price.is_zero() {
        return Err(OfferError::ZeroPrice);
    }
    if let Some(minimum) = minimum_offer_price
        && offer_price < minimum
    {
        return Err(OfferError::BelowMinimum { minimum });
    }
    if expires_at <= now {
        return Err(OfferError::ExpirationInPast);
    }
    Ok(())
}

/// Lifecycle flags of a stored offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferStatus {
    /// Withdrawn or expired offers are inactive.
    pub is_active: bool,
    /// Captured offers became orders.
    pub is_captured: bool,
    /// When the offer lapses.
    pub expires_at: DateTime<Utc>,
}

impl OfferStatus {
    /// Whether the offer can still be captured or withdrawn.
    #[must_use]
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_captured && now < self.expires_at
    }

    /// Fail unless the offer is open.
    ///
    /// # Errors
    ///
    /// Returns [`OfferError::NotOpen`].
    pub fn ensure_open(&self, now: DateTime<Utc>) -> Result<(), OfferError> {
        if self.is_open(now) {
            Ok(())
        } else {
            Err(OfferError::NotOpen)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 3, 1, 9, 0, 0).unwrap()
    }

    fn listed() -> Availability {
        Availability {
            is_published: true,
            hours_left: Some(24),
            ..Availability::default()
        }
    }

    fn price(cents: i64) -> Price {
        Price::from_cents(cents).unwrap()
    }

    #[test]
    fn test_valid_offer() {
        let later = now() + Duration::days(2);
        assert!(validate_offer(&listed(), Some(price(5000)), price(5000), later, now()).is_ok());
        assert!(validate_offer(&listed(), None, price(1), later, now()).is_ok());
    }

    #[test]
    fn test_offer_rejections() {
        let later = now() + Duration::days(2);
        let reserved = Availability {
            is_reserved: true,
            ..listed()
        };
        assert_eq!(
            validate_offer(&reserved, None, price(100), later, now()),
            Err(OfferError::ProductUnavailable)
        );
        assert_eq!(
            validate_offer(&listed(), None, Price::ZERO, later, now()),
            Err(OfferError::ZeroPrice)
        );
        assert_eq!(
            validate_offer(&listed(), Some(price(5000)), price(4999), later, now()),
            Err(OfferError::BelowMinimum { minimum: price(5000) })
        );
        assert_eq!(
            validate_offer(&listed(), None, price(100), now(), now()),
            Err(OfferError::ExpirationInPast)
        );
    }

    #[test]
    fn test_open_status() {
        let status = OfferStatus {
            is_active: true,
            is_captured: false,
            expires_at: now() + Duration::hours(1),
        };
        assert!(status.is_open(now()));
        assert!(!status.is_open(now() + Duration::hours(1)));
        assert!(!OfferStatus { is_captured: true, ..status }.is_open(now()));
        assert!(!OfferStatus { is_active: false, ..status }.is_open(now()));
        assert_eq!(
            OfferStatus { is_active: false, ..status }.ensure_open(now()),
            Err(OfferError::NotOpen)
        );
    }
}

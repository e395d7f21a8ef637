//! Order and offer totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Price, PriceError, round_cents};

/// Errors computing totals.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Orders need at least one line.
    #[error("an order needs at least one item")]
    NoItems,
    /// Quantities start at 1.
    #[error("item quantity must be at least 1")]
    ZeroQuantity,
    /// Tax rates are fractions between 0 and 1.
    #[error("tax rate must be between 0 and 1, got {0}")]
    InvalidTaxRate(Decimal),
    /// The discount exceeds the subtotal.
    #[error("discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal {
        /// Subtotal.
        subtotal: Price,
        /// Discount.
        discount: Price,
    },
    /// A computed amount does not fit a price column.
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// A sales tax rate as a fraction (`0.0875` = 8.75%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// No tax.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Build a rate.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::InvalidTaxRate`] outside `0..=1`.
    pub fn new(rate: Decimal) -> Result<Self, PricingError> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(PricingError::InvalidTaxRate(rate));
        }
        Ok(Self(rate))
    }

    /// The fraction.
    #[must_use]
    pub const fn rate(&self) -> Decimal {
        self.0
    }

    /// Tax owed on `taxable`, rounded to cents.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Price`] if the tax does not fit a price column.
    pub fn tax_on(&self, taxable: Price) -> Result<Price, PricingError> {
        Ok(Price::new(round_cents(taxable.amount() * self.0))?)
    }
}

impl TryFrom<Decimal> for TaxRate {
    type Error = PricingError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaxRate> for Decimal {
    fn from(rate: TaxRate) -> Self {
        rate.0
    }
}

/// One priced line of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    /// Units bought.
    pub quantity: u32,
    /// Price per unit at the time of purchase.
    pub unit_price: Price,
}

impl PricedLine {
    /// `quantity * unit_price`.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::ZeroQuantity`] or a price overflow.
    pub fn line_total(&self) -> Result<Price, PricingError> {
        if self.quantity == 0 {
            return Err(PricingError::ZeroQuantity);
        }
        Ok(self.unit_price.times(self.quantity)?)
    }
}

/// The money columns of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    /// Sum of all lines before discounts, shipping and taxes.
    pub subtotal: Price,
    /// Promotional discount taken off the subtotal.
    pub discount: Price,
    /// Taxes in dollars.
    pub taxes: Price,
    /// What the buyer pays: subtotal - discount + taxes.
    pub total: Price,
}

impl OrderTotals {
    /// Sum the lines into a subtotal.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::NoItems`] for an empty order, or any line error.
    pub fn subtotal(lines: &[PricedLine]) -> Result<Price, PricingError> {
        if lines.is_empty() {
            return Err(PricingError::NoItems);
        }
        lines.iter().try_fold(Price::ZERO, |acc, line| {
            Ok(acc.checked_add(line.line_total()?)?)
        })
    }

    /// Compute all totals for an order.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError`] for empty orders, zero quantities, a discount
    /// larger than the subtotal, or amounts that overflow a price column.
    pub fn compute(
        lines: &[PricedLine],
        discount: Price,
        tax_rate: TaxRate,
    ) -> Result<Self, PricingError> {
        let subtotal = Self::subtotal(lines)?;
        Self::from_subtotal(subtotal, discount, tax_rate)
    }

    /// Compute totals from an already known subtotal.
    ///
    /// # Errors
    ///
    /// Same as [`OrderTotals::compute`], minus the line checks.
    pub fn from_subtotal(
        subtotal: Price,
        discount: Price,
        tax_rate: TaxRate,
    ) -> Result<Self, PricingError> {
        if discount > subtotal {
            return Err(PricingError::DiscountExceedsSubtotal { subtotal, discount });
        }
        let taxable = subtotal.saturating_sub(discount);
        let taxes = tax_rate.tax_on(taxable)?;
        let total = taxable.checked_add(taxes)?;
        Ok(Self {
            subtotal,
            discount,
            taxes,
            total,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn price(cents: i64) -> Price {
        Price::from_cents(cents).unwrap()
    }

    fn line(quantity: u32, cents: i64) -> PricedLine {
        PricedLine {
            quantity,
            unit_price: price(cents),
        }
    }

    #[test]
    fn test_subtotal() {
        let lines = [line(2, 1999), line(1, 500)];
        assert_eq!(OrderTotals::subtotal(&lines).unwrap(), price(4498));
        assert_eq!(OrderTotals::subtotal(&[]), Err(PricingError::NoItems));
        assert_eq!(
            OrderTotals::subtotal(&[line(0, 100)]),
            Err(PricingError::ZeroQuantity)
        );
    }

    #[test]
    fn test_compute_with_discount_and_tax() {
        let rate = TaxRate::new(Decimal::new(875, 4)).unwrap();
        let totals = OrderTotals::compute(&[line(1, 10000)], price(1000), rate).unwrap();
        assert_eq!(totals.subtotal, price(10000));
        assert_eq!(totals.discount, price(1000));
        // 8.75% of 90.00 = 7.875 -> 7.88
        assert_eq!(totals.taxes, price(788));
        assert_eq!(totals.total, price(9788));
    }

    #[test]
    fn test_discount_cannot_exceed_subtotal() {
        assert!(matches!(
            OrderTotals::from_subtotal(price(500), price(600), TaxRate::ZERO),
            Err(PricingError::DiscountExceedsSubtotal { .. })
        ));
    }

    #[test]
    fn test_tax_rate_bounds() {
        assert!(TaxRate::new(Decimal::new(-1, 2)).is_err());
        assert!(TaxRate::new(Decimal::new(101, 2)).is_err());
        assert_eq!(TaxRate::new(Decimal::ONE).unwrap().rate(), Decimal::ONE);
    }

    #[test]
    fn test_overflow_is_reported() {
        let lines = [line(2, 99_999_999)];
        assert!(matches!(
            OrderTotals::subtotal(&lines),
            Err(PricingError::Price(PriceError::TooLarge { .. }))
        ));
    }
}

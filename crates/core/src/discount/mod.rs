//! Discount rules and their evaluation.
//!
//! A [`DiscountRule`] is the part of a promotion that decides whether it
//! applies to an order and how much it takes off. Storage keeps four
//! flat columns (`fixed_amount_off`, `percent_off`, ...); the rule
//! folds them into enums so that "fixed *or* percent" and "general *or*
//! retailer-specific" cannot be violated once a rule exists.
//!
//! # Evaluation order
//!
//! [`DiscountRule::evaluate`] reports the first failing condition:
//!
//! 1. inactive (the on/off switch overrides everything else)
//! 2. not started yet
//! 3. expired
//! 4. scoped to a different retailer
//! 5. total uses exhausted
//! 6. per-user uses exhausted
//! 7. order below the fixed-amount minimum

mod code;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use code::{DiscountCode, UsageLimit};

use crate::types::{DiscountType, Price, PriceError, RetailerId, round_cents};

/// Errors raised when a discount's stored fields do not form a valid rule.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscountError {
    /// Both `fixed_amount_off` and `percent_off` are set.
    #[error("discount cannot be both a fixed amount and a percentage")]
    BothValuesSet,
    /// Neither `fixed_amount_off` nor `percent_off` is set.
    #[error("discount needs either a fixed amount or a percentage")]
    NoValueSet,
    /// The discount value is zero.
    #[error("discount value must be non-zero")]
    ZeroValue,
    /// Percentage outside (0, 100] or with more than two decimals.
    #[error("percent off must be in (0, 100] with at most 2 decimals: {0}")]
    PercentOutOfRange(Decimal),
    /// Order minimum given for a percentage discount.
    #[error("order minimum only applies to fixed-amount discounts")]
    MinimumWithoutFixedAmount,
    /// Cap given for a fixed-amount discount.
    #[error("percent limit only applies to percentage discounts")]
    LimitWithoutPercent,
    /// Retailer-specific discount without a retailer.
    #[error("retailer-specific discount requires a retailer")]
    MissingRetailer,
    /// General discount tied to a retailer.
    #[error("general discount cannot be tied to a retailer")]
    UnexpectedRetailer,
    /// `start_time` is not before `end_time`.
    #[error("discount start time must be before its end time")]
    InvalidWindow,
    /// Usage limit other than `-1` or a positive number.
    #[error("usage limit must be positive or -1 (unlimited), got {0}")]
    InvalidUsageLimit(i32),
    /// Empty code or code with whitespace.
    #[error("invalid discount code: {0:?}")]
    InvalidCode(String),
    /// Code longer than the column.
    #[error("discount code must be at most {max} characters")]
    CodeTooLong {
        /// Maximum length.
        max: usize,
    },
    /// A money field is not a valid price.
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// Why a valid discount does not apply to a particular order.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Ineligible {
    /// The discount is switched off.
    #[error("this promotion is not active")]
    Inactive,
    /// The discount window has not opened.
    #[error("this promotion starts at {starts_at}")]
    NotStarted {
        /// When it opens.
        starts_at: DateTime<Utc>,
    },
    /// The discount window has closed.
    #[error("this promotion ended at {ended_at}")]
    Expired {
        /// When it closed.
        ended_at: DateTime<Utc>,
    },
    /// The discount belongs to another retailer.
    #[error("this promotion is not valid for this retailer")]
    WrongRetailer,
    /// Every allowed redemption has been used.
    #[error("this promotion has been fully redeemed")]
    TotalUsesExhausted,
    /// This user has used all their redemptions.
    #[error("you have already used this promotion the maximum number of times")]
    UserUsesExhausted,
    /// Order subtotal is below the required minimum.
    #[error("order must be at least {minimum} to use this promotion")]
    BelowMinimumOrder {
        /// Required subtotal.
        minimum: Price,
    },
}

/// Which orders a discount may be used on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountScope {
    /// Any order.
    General,
    /// Only orders of goods sold by this retailer.
    RetailerSpecific(RetailerId),
}

impl DiscountScope {
    /// Combine the stored `discount_type` and `retailer_id` columns.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::MissingRetailer`] or
    /// [`DiscountError::UnexpectedRetailer`] if they disagree.
    pub const fn from_columns(
        discount_type: DiscountType,
        retailer_id: Option<RetailerId>,
    ) -> Result<Self, DiscountError> {
        match (discount_type, retailer_id) {
            (DiscountType::General, None) => Ok(Self::General),
            (DiscountType::General, Some(_)) => Err(DiscountError::UnexpectedRetailer),
            (DiscountType::RetailerSpecific, Some(id)) => Ok(Self::RetailerSpecific(id)),
            (DiscountType::RetailerSpecific, None) => Err(DiscountError::MissingRetailer),
        }
    }

    /// The stored `discount_type`.
    #[must_use]
    pub const fn discount_type(&self) -> DiscountType {
        match self {
            Self::General => DiscountType::General,
            Self::RetailerSpecific(_) => DiscountType::RetailerSpecific,
        }
    }

    /// The stored `retailer_id`.
    #[must_use]
    pub const fn retailer_id(&self) -> Option<RetailerId> {
        match self {
            Self::General => None,
            Self::RetailerSpecific(id) => Some(*id),
        }
    }

    /// Whether an order from `retailer` is in scope.
    #[must_use]
    pub fn covers(&self, retailer: RetailerId) -> bool {
        match self {
            Self::General => true,
            Self::RetailerSpecific(id) => *id == retailer,
        }
    }
}

/// What a discount takes off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscountValue {
    /// A flat dollar amount, optionally requiring a minimum subtotal.
    FixedAmountOff {
        /// Dollars off.
        amount: Price,
        /// Required subtotal; `None` means no minimum.
        minimum_order: Option<Price>,
    },
    /// A percentage of the subtotal, optionally capped in dollars.
    PercentOff {
        /// Percent off, in (0, 100].
        percent: Decimal,
        /// Maximum dollars off.
        limit: Option<Price>,
    },
}

/// The flat storage columns of a [`DiscountValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscountColumns {
    /// `fixed_amount_off`
    pub fixed_amount_off: Option<Decimal>,
    /// `fixed_amount_off_minimum_order`
    pub fixed_amount_off_minimum_order: Option<Decimal>,
    /// `percent_off`
    pub percent_off: Option<Decimal>,
    /// `percent_off_limit`
    pub percent_off_limit: Option<Decimal>,
}

impl DiscountValue {
    /// Build a fixed-amount value.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::ZeroValue`] for a zero amount.
    pub fn fixed(amount: Price, minimum_order: Option<Price>) -> Result<Self, DiscountError> {
        if amount.is_zero() {
            return Err(DiscountError::ZeroValue);
        }
        Ok(Self::FixedAmountOff {
            amount,
            minimum_order: minimum_order.filter(|m| !m.is_zero()),
        })
    }

    /// Build a percentage value.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::PercentOutOfRange`] unless `0 < percent <= 100`
    /// with at most two decimals.
    pub fn percent(percent: Decimal, limit: Option<Price>) -> Result<Self, DiscountError> {
        if percent <= Decimal::ZERO
            || percent > Decimal::ONE_HUNDRED
            || percent.normalize().scale() > 2
        {
            return Err(DiscountError::PercentOutOfRange(percent));
        }
        Ok(Self::PercentOff { percent, limit })
    }

    /// Fold the four nullable storage columns into a value.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError`] unless exactly one kind is set, its amount is
    /// valid, and the companion column matches the kind.
    pub fn from_columns(columns: DiscountColumns) -> Result<Self, DiscountError> {
        let DiscountColumns {
            fixed_amount_off,
            fixed_amount_off_minimum_order,
            percent_off,
            percent_off_limit,
        } = columns;

        match (fixed_amount_off, percent_off) {
            (Some(_), Some(_)) => Err(DiscountError::BothValuesSet),
            (None, None) => Err(DiscountError::NoValueSet),
            (Some(amount), None) => {
                if percent_off_limit.is_some() {
                    return Err(DiscountError::LimitWithoutPercent);
                }
                let minimum = fixed_amount_off_minimum_order.map(Price::new).transpose()?;
                Self::fixed(Price::new(amount)?, minimum)
            }
            (None, Some(percent)) => {
                if fixed_amount_off_minimum_order.is_some() {
                    return Err(DiscountError::MinimumWithoutFixedAmount);
                }
                let limit = percent_off_limit.map(Price::new).transpose()?;
                Self::percent(percent, limit)
            }
        }
    }

    /// Split back into the storage columns.
    #[must_use]
    pub fn to_columns(&self) -> DiscountColumns {
        match *self {
            Self::FixedAmountOff {
                amount,
                minimum_order,
            } => DiscountColumns {
                fixed_amount_off: Some(amount.amount()),
                fixed_amount_off_minimum_order: minimum_order.map(|m| m.amount()),
                ..DiscountColumns::default()
            },
            Self::PercentOff { percent, limit } => DiscountColumns {
                percent_off: Some(percent),
                percent_off_limit: limit.map(|l| l.amount()),
                ..DiscountColumns::default()
            },
        }
    }

    /// Dollars off a given subtotal. Never more than the subtotal.
    #[must_use]
    pub fn amount_off(&self, subtotal: Price) -> Price {
        let raw = match *self {
            Self::FixedAmountOff { amount, .. } => amount,
            Self::PercentOff { percent, limit } => {
                let off = round_cents(subtotal.amount() * percent / Decimal::ONE_HUNDRED);
                let off = Price::new(off).unwrap_or(subtotal);
                limit.map_or(off, |cap| off.min(cap))
            }
        };
        raw.min(subtotal)
    }
}

/// Optional availability window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscountWindow {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl DiscountWindow {
    /// Always open.
    pub const ALWAYS: Self = Self {
        start: None,
        end: None,
    };

    /// Build a window.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::InvalidWindow`] if both ends are set and the
    /// start is not before the end.
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, DiscountError> {
        if let (Some(s), Some(e)) = (start, end)
            && s >= e
        {
            return Err(DiscountError::InvalidWindow);
        }
        Ok(Self { start, end })
    }

    /// When the discount becomes available.
    #[must_use]
    pub const fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// When the discount expires.
    #[must_use]
    pub const fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    fn check(&self, now: DateTime<Utc>) -> Result<(), Ineligible> {
        if let Some(starts_at) = self.start
            && now < starts_at
        {
            return Err(Ineligible::NotStarted { starts_at });
        }
        if let Some(ended_at) = self.end
            && now >= ended_at
        {
            return Err(Ineligible::Expired { ended_at });
        }
        Ok(())
    }
}

/// Everything about an order needed to decide whether a discount applies.
#[derive(Debug, Clone, Copy)]
pub struct RedemptionContext {
    /// Evaluation time.
    pub now: DateTime<Utc>,
    /// Retailer selling the order's goods.
    pub retailer_id: RetailerId,
    /// Order subtotal before discounts, shipping and taxes.
    pub subtotal: Price,
    /// Times this user has already redeemed the discount.
    pub user_redemptions: i64,
    /// Times anyone has redeemed the discount.
    pub total_redemptions: i64,
}

/// The outcome of applying a discount to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountQuote {
    /// Subtotal before the discount.
    pub total_before_discount: Price,
    /// Dollars taken off.
    pub discount_amount: Price,
}

impl DiscountQuote {
    /// Subtotal after the discount.
    #[must_use]
    pub fn total_after_discount(&self) -> Price {
        self.total_before_discount.saturating_sub(self.discount_amount)
    }
}

/// The decision-making part of a discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRule {
    /// Which orders it covers.
    pub scope: DiscountScope,
    /// What it takes off.
    pub value: DiscountValue,
    /// On/off switch; takes precedence over every other condition.
    pub is_active: bool,
    /// When it is available.
    pub window: DiscountWindow,
    /// Redemptions allowed per user.
    pub uses_per_user: UsageLimit,
    /// Redemptions allowed overall.
    pub uses_total: UsageLimit,
}

impl DiscountRule {
    /// Check whether the discount applies, reporting the first reason it
    /// does not.
    ///
    /// # Errors
    ///
    /// Returns the first [`Ineligible`] condition, in the order documented
    /// on this module.
    pub fn evaluate(&self, ctx: &RedemptionContext) -> Result<(), Ineligible> {
        if !self.is_active {
            return Err(Ineligible::Inactive);
        }
        self.window.check(ctx.now)?;
        if !self.scope.covers(ctx.retailer_id) {
            return Err(Ineligible::WrongRetailer);
        }
        if !self.uses_total.allows_another(ctx.total_redemptions) {
            return Err(Ineligible::TotalUsesExhausted);
        }
        if !self.uses_per_user.allows_another(ctx.user_redemptions) {
            return Err(Ineligible::UserUsesExhausted);
        }
        if let DiscountValue::FixedAmountOff {
            minimum_order: Some(minimum),
            ..
        } = self.value
            && ctx.subtotal < minimum
        {
            return Err(Ineligible::BelowMinimumOrder { minimum });
        }
        Ok(())
    }

    /// Whether the discount is switched on and inside its window, ignoring
    /// order-specific conditions.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.window.check(now).is_ok()
    }

    /// Dollars this discount would take off `subtotal`.
    #[must_use]
    pub fn amount_off(&self, subtotal: Price) -> Price {
        self.value.amount_off(subtotal)
    }

    /// Evaluate and, if eligible, price the discount.
    ///
    /// # Errors
    ///
    /// Returns the [`Ineligible`] reason from [`DiscountRule::evaluate`].
    pub fn apply(&self, ctx: &RedemptionContext) -> Result<DiscountQuote, Ineligible> {
        self.evaluate(ctx)?;
        Ok(DiscountQuote {
            total_before_discount: ctx.subtotal,
            discount_amount: self.amount_off(ctx.subtotal),
        })
    }
}

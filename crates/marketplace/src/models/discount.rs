//! Discounts and their redemptions.

use chrono::{DateTime, Utc};

use raredoor_core::{
    DiscountCode, DiscountId, DiscountRule, DiscountScope, DiscountValue, DiscountWindow, OrderNumber,
    Price, RedemptionId, UsageLimit, UserId,
};

use super::account::check_len;

/// A stored promotion.
#[derive(Debug, Clone)]
pub struct Discount {
    pub id: DiscountId,
    pub name: String,
    pub short_terms: String,
    pub terms: String,
    /// `None` when the discount has no code (applied by other means).
    pub code: Option<DiscountCode>,
    /// Everything that decides whether and how much it applies.
    pub rule: DiscountRule,
}

/// Input for creating a [`Discount`].
#[derive(Debug, Clone)]
pub struct NewDiscount {
    pub name: String,
    pub short_terms: String,
    pub terms: String,
    pub code: Option<DiscountCode>,
    pub scope: DiscountScope,
    pub value: DiscountValue,
    pub is_active: bool,
    pub window: DiscountWindow,
    pub uses_per_user: UsageLimit,
    pub uses_total: UsageLimit,
}

impl NewDiscount {
    /// An inactive, unlimited, always-open discount with no code.
    #[must_use]
    pub const fn new(name: String, scope: DiscountScope, value: DiscountValue) -> Self {
        Self {
            name,
            short_terms: String::new(),
            terms: String::new(),
            code: None,
            scope,
            value,
            is_active: false,
            window: DiscountWindow::ALWAYS,
            uses_per_user: UsageLimit::Unlimited,
            uses_total: UsageLimit::Unlimited,
        }
    }

    /// Check the text columns against their widths.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first field that is too long.
    pub fn validate(&self) -> Result<(), String> {
        check_len("name", &self.name, 100, true)?;
        check_len("short_terms", &self.short_terms, 1000, false)?;
        check_len("terms", &self.terms, 10_000, false)
    }

    /// The rule this discount will be stored as.
    #[must_use]
    pub const fn rule(&self) -> DiscountRule {
        DiscountRule {
            scope: self.scope,
            value: self.value,
            is_active: self.is_active,
            window: self.window,
            uses_per_user: self.uses_per_user,
            uses_total: self.uses_total,
        }
    }
}

/// One use of a discount on one order.
#[derive(Debug, Clone)]
pub struct DiscountRedemption {
    pub id: RedemptionId,
    pub user_id: UserId,
    pub discount_id: DiscountId,
    pub order_number: OrderNumber,
    pub timestamp: DateTime<Utc>,
    pub total_before_discount: Option<Price>,
    pub discount_amount: Option<Price>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_discount_defaults() {
        let value = DiscountValue::fixed(Price::from_cents(500).unwrap(), None).unwrap();
        let discount = NewDiscount::new("Welcome".to_owned(), DiscountScope::General, value);
        assert!(discount.validate().is_ok());

        let rule = discount.rule();
        assert!(!rule.is_active);
        assert_eq!(rule.uses_total, UsageLimit::Unlimited);
        assert_eq!(rule.window, DiscountWindow::ALWAYS);
    }

    #[test]
    fn test_name_required() {
        let value = DiscountValue::fixed(Price::from_cents(500).unwrap(), None).unwrap();
        let discount = NewDiscount::new(String::new(), DiscountScope::General, value);
        assert_eq!(discount.validate().unwrap_err(), "name is required");
    }
}

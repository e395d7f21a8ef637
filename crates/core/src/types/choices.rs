//! Choice enumerations stored as text columns.
//!
//! Each enum round-trips through the exact string stored in the database
//! (`as_str` / `FromStr`), and serializes the same way.

use core::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Price;

/// Error returned when a stored choice string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value:?}")]
pub struct ChoiceError {
    /// Which choice set was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! text_choice {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The stored string value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            /// Human-readable label.
            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ChoiceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ChoiceError { kind: $kind, value: s.to_owned() }),
                }
            }
        }
    };
}

text_choice! {
    /// Legal form of a retailer.
    OrgType, "organization type" {
        /// Sole proprietor.
        Individual => "INDIVIDUAL", "Individual";
        /// Incorporated business.
        Corporation => "CORPORATION", "Corporation";
    }
}

text_choice! {
    /// How a discount is scoped.
    DiscountType, "discount type" {
        /// Only valid on goods sold by one retailer.
        RetailerSpecific => "RETAILER_SPECIFIC", "Retailer-specific promo";
        /// Valid marketplace-wide.
        General => "GENERAL", "General discount";
    }
}

text_choice! {
    /// How an order came about.
    OrderType, "order type" {
        /// Bought at the listed price.
        Purchase => "PURCHASE", "Purchase";
        /// Created by capturing an accepted offer.
        Offer => "OFFER", "Offer";
    }
}

/// Flat shipping charge a subcategory may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub enum ShippingCharge {
    /// $5.00
    Small,
    /// $20.00
    Medium,
    /// $50.00
    Large,
}

impl ShippingCharge {
    /// All charges, cheapest first.
    pub const ALL: &'static [Self] = &[Self::Small, Self::Medium, Self::Large];

    /// The dollar amount stored in the column.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        match self {
            Self::Small => Decimal::from_parts(500, 0, 0, false, 2),
            Self::Medium => Decimal::from_parts(2000, 0, 0, false, 2),
            Self::Large => Decimal::from_parts(5000, 0, 0, false, 2),
        }
    }

    /// The amount as a [`Price`].
    #[must_use]
    pub fn price(self) -> Price {
        Price::new(self.amount()).unwrap_or(Price::ZERO)
    }

    /// Match a stored amount to one of the allowed charges.
    ///
    /// # Errors
    ///
    /// Returns [`ChoiceError`] for any other amount.
    pub fn from_amount(amount: Decimal) -> Result<Self, ChoiceError> {
        Self::ALL
            .iter()
            .copied()
            .find(|charge| charge.amount() == amount)
            .ok_or_else(|| ChoiceError {
                kind: "shipping charge",
                value: amount.to_string(),
            })
    }
}

impl TryFrom<Decimal> for ShippingCharge {
    type Error = ChoiceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_amount(value)
    }
}

impl From<ShippingCharge> for Decimal {
    fn from(charge: ShippingCharge) -> Self {
        charge.amount()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_text_roundtrip() {
        for org in OrgType::ALL {
            assert_eq!(org.as_str().parse::<OrgType>().unwrap(), *org);
        }
        for kind in DiscountType::ALL {
            assert_eq!(kind.as_str().parse::<DiscountType>().unwrap(), *kind);
        }
        for kind in OrderType::ALL {
            assert_eq!(kind.to_string().parse::<OrderType>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_stored_strings() {
        assert_eq!(DiscountType::RetailerSpecific.as_str(), "RETAILER_SPECIFIC");
        assert_eq!(DiscountType::General.label(), "General discount");
        assert_eq!(
            serde_json::to_string(&DiscountType::RetailerSpecific).unwrap(),
            "\"RETAILER_SPECIFIC\""
        );
    }

    #[test]
    fn test_unknown_choice() {
        let err = "purchase".parse::<OrderType>().unwrap_err();
        assert_eq!(err.kind, "order type");
        assert_eq!(err.to_string(), "invalid order type: \"purchase\"");
    }

    #[test]
    fn test_shipping_charge() {
        assert_eq!(
            ShippingCharge::from_amount(Decimal::new(20, 0)).unwrap(),
            ShippingCharge::Medium
        );
        assert_eq!(ShippingCharge::Large.price().to_string(), "$50.00");
        assert!(ShippingCharge::from_amount(Decimal::new(10, 0)).is_err());
    }
}

//! Promotion codes and usage limits.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::DiscountError;

/// A promotion code, compared case-insensitively.
///
/// Codes are stored upper-cased so `PROMO2015` and `Promo2015` are the
/// same code, and a unique index on the column rejects case variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiscountCode(String);

impl DiscountCode {
    /// Maximum code length (column width).
    pub const MAX_LENGTH: usize = 100;

    /// Parse a required code.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::InvalidCode`] if the code is empty or contains
    /// whitespace, and [`DiscountError::CodeTooLong`] past the column width.
    pub fn parse(s: &str) -> Result<Self, DiscountError> {
        let s = s.trim();
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(DiscountError::InvalidCode(s.to_owned()));
        }
        if s.chars().count() > Self::MAX_LENGTH {
            return Err(DiscountError::CodeTooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_uppercase()))
    }

    /// Parse an optional code; blank input means "no code".
    ///
    /// # Errors
    ///
    /// Same as [`DiscountCode::parse`] for non-blank input.
    pub fn parse_optional(s: &str) -> Result<Option<Self>, DiscountError> {
        if s.trim().is_empty() {
            Ok(None)
        } else {
            Self::parse(s).map(Some)
        }
    }

    /// The normalized (upper-case) code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiscountCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DiscountCode {
    type Error = DiscountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DiscountCode> for String {
    fn from(code: DiscountCode) -> Self {
        code.0
    }
}

/// How many times a discount may be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum UsageLimit {
    /// No limit (`-1` in storage).
    Unlimited,
    /// At most this many redemptions.
    Limited(u32),
}

impl UsageLimit {
    /// Stored sentinel for [`UsageLimit::Unlimited`].
    pub const UNLIMITED: i32 = -1;

    /// Decode the stored integer.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::InvalidUsageLimit`] for zero or any negative
    /// value other than `-1`.
    pub fn from_stored(value: i32) -> Result<Self, DiscountError> {
        match value {
            Self::UNLIMITED => Ok(Self::Unlimited),
            n if n > 0 => u32::try_from(n)
                .map(Self::Limited)
                .map_err(|_| DiscountError::InvalidUsageLimit(value)),
            _ => Err(DiscountError::InvalidUsageLimit(value)),
        }
    }

    /// Encode for storage.
    #[must_use]
    pub fn to_stored(self) -> i32 {
        match self {
            Self::Unlimited => Self::UNLIMITED,
            Self::Limited(n) => i32::try_from(n).unwrap_or(i32::MAX),
        }
    }

    /// Whether another redemption is allowed after `used` so far.
    #[must_use]
    pub fn allows_another(self, used: i64) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(n) => used < i64::from(n),
        }
    }
}

impl TryFrom<i32> for UsageLimit {
    type Error = DiscountError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_stored(value)
    }
}

impl From<UsageLimit> for i32 {
    fn from(limit: UsageLimit) -> Self {
        limit.to_stored()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_code_is_case_insensitive() {
        let a = DiscountCode::parse("Promo2015").unwrap();
        let b = DiscountCode::parse("PROMO2015").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "PROMO2015");
    }

    #[test]
    fn test_code_validation() {
        assert!(matches!(DiscountCode::parse(""), Err(DiscountError::InvalidCode(_))));
        assert!(matches!(
            DiscountCode::parse("TWO WORDS"),
            Err(DiscountError::InvalidCode(_))
        ));
        assert!(matches!(
            DiscountCode::parse(&"X".repeat(101)),
            Err(DiscountError::CodeTooLong { max: 100 })
        ));
    }

    #[test]
    fn test_optional_code() {
        assert_eq!(DiscountCode::parse_optional("   ").unwrap(), None);
        assert_eq!(
            DiscountCode::parse_optional(" save10 ").unwrap().unwrap().as_str(),
            "SAVE10"
        );
    }

    #[test]
    fn test_usage_limit_storage() {
        assert_eq!(UsageLimit::from_stored(-1).unwrap(), UsageLimit::Unlimited);
        assert_eq!(UsageLimit::from_stored(3).unwrap(), UsageLimit::Limited(3));
        assert!(UsageLimit::from_stored(0).is_err());
        assert!(UsageLimit::from_stored(-2).is_err());
        assert_eq!(UsageLimit::Unlimited.to_stored(), -1);
        assert_eq!(UsageLimit::Limited(5).to_stored(), 5);
    }

    #[test]
    fn test_usage_limit_allows() {
        assert!(UsageLimit::Unlimited.allows_another(1_000_000));
        assert!(UsageLimit::Limited(2).allows_another(1));
        assert!(!UsageLimit::Limited(2).allows_another(2));
    }
}

//! Order numbers.
//!
//! An order number is the primary key of an order and has the shape
//! `<RETAILER PREFIX><NUMERIC PART>`:
//!
//! - the prefix is the selling retailer's [`OrderPrefix`] (1-4 letters);
//! - the numeric part is the retailer's order sequence, zero-padded to at
//!   least [`OrderNumber::MIN_DIGITS`] digits.
//!
//! Prefixes are unique per retailer and sequences never repeat within a
//! retailer, so every number is unique across all orders.
//!
//! ```
//! use raredoor_core::{OrderNumber, OrderPrefix};
//!
//! let prefix = OrderPrefix::parse("rd").unwrap();
//! let number = OrderNumber::new(&prefix, 42).unwrap();
//! assert_eq!(number.as_str(), "RD000042");
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced when building or parsing order numbers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderNumberError {
    /// Prefix must be 1-4 ASCII letters.
    #[error("order prefix must be 1-{max} ASCII letters: {value:?}")]
    InvalidPrefix {
        /// Rejected input.
        value: String,
        /// Maximum prefix length.
        max: usize,
    },
    /// Sequences start at 1.
    #[error("order sequence must be positive, got {0}")]
    InvalidSequence(i64),
    /// The formatted number does not fit the primary-key column.
    #[error("order number exceeds {max} characters")]
    TooLong {
        /// Maximum length.
        max: usize,
    },
    /// The string is not `<letters><digits>`.
    #[error("malformed order number: {0:?}")]
    Malformed(String),
}

/// The letters a retailer's order numbers start with, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderPrefix(String);

impl OrderPrefix {
    /// Maximum prefix length (column width).
    pub const MAX_LENGTH: usize = 4;

    /// Parse a prefix, upper-casing it.
    ///
    /// # Errors
    ///
    /// Returns [`OrderNumberError::InvalidPrefix`] unless the input is 1-4
    /// ASCII letters.
    pub fn parse(s: &str) -> Result<Self, OrderNumberError> {
        let s = s.trim();
        if s.is_empty()
            || s.len() > Self::MAX_LENGTH
            || !s.bytes().all(|b| b.is_ascii_alphabetic())
        {
            return Err(OrderNumberError::InvalidPrefix {
                value: s.to_owned(),
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    /// The prefix as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OrderPrefix {
    type Error = OrderNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderPrefix> for String {
    fn from(prefix: OrderPrefix) -> Self {
        prefix.0
    }
}

/// A formatted, validated order number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Width of the primary-key column.
    pub const MAX_LENGTH: usize = 20;

    /// Minimum width of the numeric part.
    pub const MIN_DIGITS: usize = 6;

    /// Build the order number for a retailer's `sequence`-th order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderNumberError::InvalidSequence`] for non-positive
    /// sequences and [`OrderNumberError::TooLong`] when the result would not
    /// fit in [`OrderNumber::MAX_LENGTH`] characters.
    pub fn new(prefix: &OrderPrefix, sequence: i64) -> Result<Self, OrderNumberError> {
        if sequence < 1 {
            return Err(OrderNumberError::InvalidSequence(sequence));
        }
        let width = Self::MIN_DIGITS;
        let number = format!("{}{sequence:0width$}", prefix.as_str());
        if number.len() > Self::MAX_LENGTH {
            return Err(OrderNumberError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(number))
    }

    /// Parse a stored order number.
    ///
    /// # Errors
    ///
    /// Returns [`OrderNumberError`] if the string is not a valid prefix
    /// followed by at least [`OrderNumber::MIN_DIGITS`] digits.
    pub fn parse(s: &str) -> Result<Self, OrderNumberError> {
        let (prefix, sequence) = Self::split(s)?;
        let number = Self::new(&prefix, sequence)?;
        if number.0 != s {
            // e.g. lowercase prefix or non-canonical padding
            return Err(OrderNumberError::Malformed(s.to_owned()));
        }
        Ok(number)
    }

    fn split(s: &str) -> Result<(OrderPrefix, i64), OrderNumberError> {
        let digits_at = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| OrderNumberError::Malformed(s.to_owned()))?;
        let (letters, digits) = s.split_at(digits_at);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrderNumberError::Malformed(s.to_owned()));
        }
        let prefix = OrderPrefix::parse(letters)?;
        let sequence = digits
            .parse::<i64>()
            .map_err(|_| OrderNumberError::Malformed(s.to_owned()))?;
        Ok((prefix, sequence))
    }

    /// The retailer prefix part.
    #[must_use]
    pub fn prefix(&self) -> &str {
        let end = self.0.find(|c: char| c.is_ascii_digit()).unwrap_or(self.0.len());
        self.0.get(..end).unwrap_or_default()
    }

    /// The numeric sequence part.
    #[must_use]
    pub fn sequence(&self) -> i64 {
        let start = self.prefix().len();
        self.0
            .get(start..)
            .and_then(|digits| digits.parse().ok())
            .unwrap_or_default()
    }

    /// The order number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for OrderNumber {
    type Err = OrderNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn prefix(s: &str) -> OrderPrefix {
        OrderPrefix::parse(s).unwrap()
    }

    #[test]
    fn test_prefix_validation() {
        assert_eq!(prefix("abcd").as_str(), "ABCD");
        assert!(OrderPrefix::parse("").is_err());
        assert!(OrderPrefix::parse("ABCDE").is_err());
        assert!(OrderPrefix::parse("A1").is_err());
    }

    #[test]
    fn test_zero_padding() {
        assert_eq!(OrderNumber::new(&prefix("RD"), 1).unwrap().as_str(), "RD000001");
        assert_eq!(
            OrderNumber::new(&prefix("ABCD"), 999_999).unwrap().as_str(),
            "ABCD999999"
        );
    }

    #[test]
    fn test_grows_past_minimum_width() {
        let number = OrderNumber::new(&prefix("RD"), 1_234_567).unwrap();
        assert_eq!(number.as_str(), "RD1234567");
        assert_eq!(number.sequence(), 1_234_567);
    }

    #[test]
    fn test_rejects_bad_sequence() {
        assert_eq!(
            OrderNumber::new(&prefix("RD"), 0),
            Err(OrderNumberError::InvalidSequence(0))
        );
        assert_eq!(
            OrderNumber::new(&prefix("RD"), -5),
            Err(OrderNumberError::InvalidSequence(-5))
        );
    }

    #[test]
    fn test_too_long() {
        // 4 letters + 17 digits = 21 characters
        assert_eq!(
            OrderNumber::new(&prefix("ABCD"), 10_000_000_000_000_000),
            Err(OrderNumberError::TooLong { max: 20 })
        );
        // 4 letters + 16 digits fits exactly
        assert!(OrderNumber::new(&prefix("ABCD"), 9_999_999_999_999_999).is_ok());
    }

    #[test]
    fn test_parse() {
        let number = OrderNumber::parse("XY000123").unwrap();
        assert_eq!(number.prefix(), "XY");
        assert_eq!(number.sequence(), 123);

        assert!(OrderNumber::parse("xy000123").is_err());
        assert!(OrderNumber::parse("XY123").is_err());
        assert!(OrderNumber::parse("000123").is_err());
        assert!(OrderNumber::parse("XY00012A").is_err());
        assert!(OrderNumber::parse("XY").is_err());
    }
}

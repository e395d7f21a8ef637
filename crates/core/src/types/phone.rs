//! US phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input contains characters other than digits and separators.
    #[error("phone number contains invalid character {0:?}")]
    InvalidCharacter(char),
    /// The input does not have ten digits (after an optional country code).
    #[error("phone number must have 10 digits, got {0}")]
    WrongLength(usize),
}

/// A North American phone number, stored as `XXX-XXX-XXXX`.
///
/// Accepts common spellings: `(415) 555-0100`, `415.555.0100`,
/// `+1 415 555 0100`, `4155550100`.
///
/// ```
/// use raredoor_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("(415) 555-0100").unwrap();
/// assert_eq!(phone.as_str(), "415-555-0100");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parse and normalize a phone number.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneError`] if the input has stray characters or the wrong
    /// number of digits.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let mut digits = String::with_capacity(11);
        for c in s.trim().chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' | '+' => {}
                other => return Err(PhoneError::InvalidCharacter(other)),
            }
        }

        let national = match digits.len() {
            11 if digits.starts_with('1') => digits.get(1..).unwrap_or_default(),
            10 => digits.as_str(),
            n => return Err(PhoneError::WrongLength(n)),
        };

        let (area, rest) = national.split_at(3);
        let (exchange, line) = rest.split_at(3);
        Ok(Self(format!("{area}-{exchange}-{line}")))
    }

    /// Returns the normalized `XXX-XXX-XXXX` form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_spellings() {
        for input in [
            "415-555-0100",
            "(415) 555-0100",
            "415.555.0100",
            "+1 415 555 0100",
            "14155550100",
            "4155550100",
        ] {
            assert_eq!(PhoneNumber::parse(input).unwrap().as_str(), "415-555-0100", "{input}");
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(PhoneNumber::parse("555-0100"), Err(PhoneError::WrongLength(7)));
        assert_eq!(PhoneNumber::parse("24155550100"), Err(PhoneError::WrongLength(11)));
        assert_eq!(
            PhoneNumber::parse("415-555-010x"),
            Err(PhoneError::InvalidCharacter('x'))
        );
        assert_eq!(PhoneNumber::parse(""), Err(PhoneError::WrongLength(0)));
    }
}

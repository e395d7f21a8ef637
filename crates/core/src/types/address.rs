//! Postal address building blocks: state codes, ZIP codes and geocodes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when validating address parts.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AddressError {
    /// Not a USPS state or territory abbreviation.
    #[error("unknown state code {0:?}")]
    UnknownState(String),
    /// ZIP codes are exactly five digits.
    #[error("zip code must be 5 digits: {0:?}")]
    InvalidZip(String),
    /// Latitude outside -90..=90.
    #[error("latitude out of range: {0}")]
    LatitudeOutOfRange(f64),
    /// Longitude outside -180..=180.
    #[error("longitude out of range: {0}")]
    LongitudeOutOfRange(f64),
    /// Only one of latitude/longitude was given.
    #[error("latitude and longitude must be set together")]
    PartialGeocode,
}

/// USPS abbreviations for states, DC and inhabited territories.
const STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY", "AS", "GU", "MP", "PR", "VI",
];

/// A two-letter USPS state code, stored upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StateCode([u8; 2]);

impl StateCode {
    /// Parse a state code, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::UnknownState`] for anything not in the USPS list.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let upper = s.trim().to_ascii_uppercase();
        if !STATE_CODES.contains(&upper.as_str()) {
            return Err(AddressError::UnknownState(s.to_owned()));
        }
        let bytes = upper.as_bytes();
        match bytes {
            [a, b] => Ok(Self([*a, *b])),
            _ => Err(AddressError::UnknownState(s.to_owned())),
        }
    }

    /// The abbreviation as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ASCII letters from STATE_CODES are ever stored.
        core::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for StateCode {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StateCode> for String {
    fn from(code: StateCode) -> Self {
        code.as_str().to_owned()
    }
}

/// A five-digit US ZIP code. Kept as text so leading zeros survive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZipCode(String);

impl ZipCode {
    /// Parse a ZIP code.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::InvalidZip`] unless the input is five ASCII digits.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let s = s.trim();
        if s.len() == 5 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_owned()))
        } else {
            Err(AddressError::InvalidZip(s.to_owned()))
        }
    }

    /// The ZIP code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ZipCode {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ZipCode> for String {
    fn from(zip: ZipCode) -> Self {
        zip.0
    }
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

impl GeoPoint {
    /// Build a point, checking coordinate ranges.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] if either coordinate is out of range or not finite.
    pub fn new(lat: f64, lng: f64) -> Result<Self, AddressError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(AddressError::LatitudeOutOfRange(lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(AddressError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    /// Build an optional point from two nullable columns.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::PartialGeocode`] if exactly one side is set.
    pub fn from_columns(lat: Option<f64>, lng: Option<f64>) -> Result<Option<Self>, AddressError> {
        match (lat, lng) {
            (Some(lat), Some(lng)) => Self::new(lat, lng).map(Some),
            (None, None) => Ok(None),
            _ => Err(AddressError::PartialGeocode),
        }
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn lng(&self) -> f64 {
        self.lng
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_state_code() {
        assert_eq!(StateCode::parse("ny").unwrap().as_str(), "NY");
        assert_eq!(StateCode::parse(" CA ").unwrap().to_string(), "CA");
        assert!(StateCode::parse("ZZ").is_err());
        assert!(StateCode::parse("New York").is_err());
    }

    #[test]
    fn test_zip_code_keeps_leading_zero() {
        assert_eq!(ZipCode::parse("02134").unwrap().as_str(), "02134");
        assert!(ZipCode::parse("2134").is_err());
        assert!(ZipCode::parse("02134-1234").is_err());
        assert!(ZipCode::parse("0213a").is_err());
    }

    #[test]
    fn test_geo_point() {
        let p = GeoPoint::new(40.7128, -74.0060).unwrap();
        assert!((p.lat() - 40.7128).abs() < f64::EPSILON);
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_geo_point_from_columns() {
        assert_eq!(GeoPoint::from_columns(None, None).unwrap(), None);
        assert!(GeoPoint::from_columns(Some(1.0), Some(2.0)).unwrap().is_some());
        assert_eq!(
            GeoPoint::from_columns(Some(1.0), None),
            Err(AddressError::PartialGeocode)
        );
    }
}

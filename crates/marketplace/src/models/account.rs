//! Users, profiles and postal addresses.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use raredoor_core::{
    AddressId, Email, GeoPoint, PhoneNumber, ProfileId, StateCode, UserId, Username, ZipCode,
};

/// A marketplace account. Users log in with their email.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login email, unique regardless of case.
    pub email: Email,
    /// Derived from the email; never shown.
    pub username: Username,
    pub first_name: String,
    pub last_name: String,
    /// Inactive accounts cannot log in.
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// "First Last", or the email when no name is set.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.email.to_string()
        } else {
            full.to_owned()
        }
    }
}

/// Marketplace-specific data attached one-to-one to a [`User`].
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: ProfileId,
    pub user_id: UserId,
    /// `None` when the user has not given a number.
    pub phone: Option<PhoneNumber>,
    /// Merchants may own retailers.
    pub is_merchant: bool,
    /// Positive: credit owed to the user. Negative: the user owes the
    /// marketplace.
    pub account_balance: Decimal,
    pub shipping_address_id: Option<AddressId>,
}

/// A US postal address.
#[derive(Debug, Clone)]
pub struct PostalAddress {
    pub id: AddressId,
    pub street: String,
    pub street2: Option<String>,
    pub city: String,
    pub state: StateCode,
    pub zipcd: ZipCode,
    pub phone: String,
    pub location: Option<GeoPoint>,
    pub neighborhood: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a [`PostalAddress`].
#[derive(Debug, Clone)]
pub struct NewAddress {
    pub street: String,
    pub street2: Option<String>,
    pub city: String,
    pub state: StateCode,
    pub zipcd: ZipCode,
    pub phone: String,
    pub location: Option<GeoPoint>,
    pub neighborhood: String,
}

impl NewAddress {
    /// Check the free-text columns against their widths.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first field that is empty or too long.
    pub fn validate(&self) -> Result<(), String> {
        check_len("street", &self.street, 50, true)?;
        if let Some(street2) = &self.street2 {
            check_len("street2", street2, 50, false)?;
        }
        check_len("city", &self.city, 20, true)?;
        check_len("phone", &self.phone, 120, false)?;
        check_len("neighborhood", &self.neighborhood, 80, false)
    }
}

pub(crate) fn check_len(field: &str, value: &str, max: usize, required: bool) -> Result<(), String> {
    if required && value.trim().is_empty() {
        return Err(format!("{field} is required"));
    }
    let len = value.chars().count();
    if len > max {
        return Err(format!("{field} must be at most {max} characters, got {len}"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> NewAddress {
        NewAddress {
            street: "1 Market St".to_owned(),
            street2: None,
            city: "San Francisco".to_owned(),
            state: StateCode::parse("ca").unwrap(),
            zipcd: ZipCode::parse("94105").unwrap(),
            phone: "415-555-0100".to_owned(),
            location: None,
            neighborhood: String::new(),
        }
    }

    #[test]
    fn test_address_validation() {
        assert!(address().validate().is_ok());

        let long_city = NewAddress {
            city: "Rancho Santa Margarita".to_owned(),
            ..address()
        };
        assert!(long_city.validate().unwrap_err().contains("city"));

        let no_street = NewAddress {
            street: "  ".to_owned(),
            ..address()
        };
        assert_eq!(no_street.validate().unwrap_err(), "street is required");
    }

    #[test]
    fn test_display_name() {
        let email = Email::parse("ana@example.com").unwrap();
        let mut user = User {
            id: UserId::generate(),
            username: Username::from_email(&email),
            email,
            first_name: "Ana".to_owned(),
            last_name: "Lopez".to_owned(),
            is_active: true,
            is_staff: false,
            date_joined: Utc::now(),
            last_login: None,
        };
        assert_eq!(user.display_name(), "Ana Lopez");
        user.first_name.clear();
        user.last_name.clear();
        assert_eq!(user.display_name(), "ana@example.com");
    }
}

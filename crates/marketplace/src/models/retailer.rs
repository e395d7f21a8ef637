//! Retailers, their stores and shippers.

use rust_decimal::Decimal;
use url::Url;

use raredoor_core::{
    AddressId, Email, ImageId, OrderPrefix, OrgType, PhoneNumber, RetailerId, ShipperId, StoreId,
    UserId,
};

use super::account::check_len;

/// A merchant business selling on the marketplace.
#[derive(Debug, Clone)]
pub struct Retailer {
    pub id: RetailerId,
    pub legal_name: String,
    pub short_name: String,
    pub organization_type: OrgType,
    /// Must be a merchant.
    pub owner_id: Option<UserId>,
    pub address_id: Option<AddressId>,
    pub website: Option<Url>,
    pub commission_fee: Decimal,
    pub transaction_fee: Decimal,
    /// Leading letters of this retailer's order numbers.
    pub order_prefix: OrderPrefix,
    /// Number of orders allocated so far.
    pub order_sequence: i64,
}

/// Input for creating a [`Retailer`].
#[derive(Debug, Clone)]
pub struct NewRetailer {
    pub legal_name: String,
    pub short_name: String,
    pub organization_type: OrgType,
    pub owner_id: Option<UserId>,
    pub address_id: Option<AddressId>,
    pub website: Option<Url>,
    pub commission_fee: Decimal,
    pub transaction_fee: Decimal,
    pub order_prefix: OrderPrefix,
}

impl NewRetailer {
    /// Check names, website and fees.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        check_len("legal_name", &self.legal_name, 255, true)?;
        check_len("short_name", &self.short_name, 100, true)?;
        if let Some(website) = &self.website {
            check_len("website", website.as_str(), 200, false)?;
        }
        if self.commission_fee.is_sign_negative() || self.transaction_fee.is_sign_negative() {
            return Err("fees cannot be negative".to_owned());
        }
        Ok(())
    }
}

/// A picture or logo of a retailer.
#[derive(Debug, Clone)]
pub struct RetailerImage {
    pub id: ImageId,
    pub retailer_id: RetailerId,
    pub is_main: bool,
    pub is_logo: bool,
    /// Public id of the image on the image host.
    pub image: String,
}

/// A physical or online outlet of a retailer.
#[derive(Debug, Clone)]
pub struct Store {
    pub id: StoreId,
    pub retailer_id: RetailerId,
    pub store_num: Option<String>,
    pub description: Option<String>,
    pub is_featured: bool,
    pub has_returns: bool,
}

/// Input for creating a [`Store`].
#[derive(Debug, Clone)]
pub struct NewStore {
    pub retailer_id: RetailerId,
    pub store_num: Option<String>,
    pub description: Option<String>,
    pub is_featured: bool,
    pub has_returns: bool,
}

/// A delivery company stores work with.
#[derive(Debug, Clone)]
pub struct Shipper {
    pub id: ShipperId,
    pub name: String,
    pub phone: PhoneNumber,
    pub email: Email,
}

/// Input for creating a [`Shipper`].
#[derive(Debug, Clone)]
pub struct NewShipper {
    pub name: String,
    pub phone: PhoneNumber,
    pub email: Email,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn retailer() -> NewRetailer {
        NewRetailer {
            legal_name: "Acme Furniture LLC".to_owned(),
            short_name: "Acme".to_owned(),
            organization_type: OrgType::Corporation,
            owner_id: None,
            address_id: None,
            website: Some(Url::parse("https://acme.example.com").unwrap()),
            commission_fee: Decimal::new(1500, 2),
            transaction_fee: Decimal::ZERO,
            order_prefix: OrderPrefix::parse("ac").unwrap(),
        }
    }

    #[test]
    fn test_retailer_validation() {
        assert!(retailer().validate().is_ok());
        let negative = NewRetailer {
            transaction_fee: Decimal::new(-1, 2),
            ..retailer()
        };
        assert_eq!(negative.validate().unwrap_err(), "fees cannot be negative");
        let unnamed = NewRetailer {
            short_name: String::new(),
            ..retailer()
        };
        assert!(unnamed.validate().is_err());
    }
}

//! Orders, order items and offers.

use chrono::{DateTime, Utc};

use raredoor_core::{
    AddressId, OfferId, OfferStatus, OrderItemId, OrderNumber, OrderType, Price, ProductId,
    RetailerId, UserId,
};

/// A completed purchase, or a captured offer.
#[derive(Debug, Clone)]
pub struct Order {
    pub order_number: OrderNumber,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: UserId,
    /// The retailer selling every item on the order.
    pub retailer_id: RetailerId,
    pub order_type: OrderType,
    pub address_id: AddressId,
    pub subtotal: Price,
    pub taxes: Price,
    pub total_transaction_price: Price,
}

/// One product line of an [`Order`].
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub order_number: OrderNumber,
    pub quantity: u32,
    pub product_id: ProductId,
    /// Unit price at the time of purchase.
    pub original_price: Price,
}

/// A buyer's price proposal on a product.
#[derive(Debug, Clone)]
pub struct Offer {
    pub id: OfferId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub address_id: AddressId,
    pub offer_price: Price,
    pub taxes: Price,
    pub total_transaction_price: Price,
    pub is_captured: bool,
    pub is_active: bool,
    pub expiration_timestamp: DateTime<Utc>,
    /// Set once the offer is captured.
    pub order_number: Option<OrderNumber>,
}

impl Offer {
    /// Lifecycle flags used by the offer rules.
    #[must_use]
    pub const fn status(&self) -> OfferStatus {
        OfferStatus {
            is_active: self.is_active,
            is_captured: self.is_captured,
            expires_at: self.expiration_timestamp,
        }
    }
}

//! Business logic services for the marketplace.
//!
//! # Services
//!
//! - `accounts` - Registration and password login
//! - `checkout` - Cart pricing, discount redemption and order placement
//! - `offers` - Buyer offers and their capture into orders

pub mod accounts;
pub mod checkout;
pub mod offers;

pub use accounts::{AccountError, AccountService, Registration};
pub use checkout::{CartLine, CheckoutError, CheckoutQuote, CheckoutService, NewOrder, PlacedOrder};
pub use offers::{CapturedOffer, NewOffer, OfferService, OfferServiceError};

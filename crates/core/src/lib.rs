//! Raredoor Core - Shared types and marketplace rules.
//!
//! This crate provides the types and business rules used across all
//! Raredoor components:
//! - `marketplace` - `PostgreSQL` schema, repositories and services
//! - `cli` - Command-line tools for migrations and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access. The optional `postgres` feature adds `sqlx` encoding
//! for the newtypes so repositories can bind and decode them directly.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, addresses and choices
//! - [`discount`] - Discount rules and applicability evaluation
//! - [`order_number`] - `<PREFIX><NUMBER>` order numbers
//! - [`pricing`] - Order and offer totals
//! - [`shelf_life`] - Product shelf-life countdown and visibility
//! - [`offer`] - Offer validation and lifecycle

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod discount;
pub mod offer;
pub mod order_number;
pub mod pricing;
pub mod shelf_life;
pub mod types;

pub use discount::{
    DiscountCode, DiscountColumns, DiscountError, DiscountQuote, DiscountRule, DiscountScope,
    DiscountValue, DiscountWindow, Ineligible, RedemptionContext, UsageLimit,
};
pub use offer::{OfferError, OfferStatus, validate_offer};
pub use order_number::{OrderNumber, OrderNumberError, OrderPrefix};
pub use pricing::{OrderTotals, PricedLine, PricingError, TaxRate};
pub use shelf_life::{Availability, ShelfLife};
pub use types::*;

//! Core value types for Raredoor.
//!
//! Type-safe wrappers for the constrained columns of the marketplace
//! schema. Each wrapper validates on construction, so a value that exists
//! is a value the database will accept.

pub mod address;
pub mod choices;
pub mod email;
pub mod id;
pub mod phone;
pub mod price;
pub mod slug;
pub mod username;

pub use address::{AddressError, GeoPoint, StateCode, ZipCode};
pub use choices::{ChoiceError, DiscountType, OrderType, OrgType, ShippingCharge};
pub use email::{Email, EmailError};
pub use id::*;
pub use phone::{PhoneError, PhoneNumber};
pub use price::{Price, PriceError, round_cents};
pub use slug::{Slug, SlugError};
pub use username::Username;

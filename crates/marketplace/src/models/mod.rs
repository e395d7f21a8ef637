//! Domain types returned by the repositories.
//!
//! These types hold validated values separate from the database row types,
//! which stay private to the `db` modules.

pub mod account;
pub mod discount;
pub mod order;
pub mod product;
pub mod retailer;

pub use account::{NewAddress, PostalAddress, Profile, User};
pub use discount::{Discount, DiscountRedemption, NewDiscount};
pub use order::{Offer, Order, OrderItem};
pub use product::{Dimensions, NewProduct, Product, ProductImage, TaxonomyTerm};
pub use retailer::{NewRetailer, NewShipper, NewStore, Retailer, RetailerImage, Shipper, Store};

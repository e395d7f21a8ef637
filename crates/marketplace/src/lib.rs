//! Raredoor Marketplace - storage and services for the furniture marketplace.
//!
//! # Database: `marketplace` schema
//!
//! Accounts (users, profiles, postal addresses), the commerce structure
//! (retailers, stores, shippers, products and their taxonomy) and the
//! transactions (orders, offers, discounts, redemptions).
//!
//! # Layout
//!
//! - [`config`] - Environment configuration
//! - [`db`] - Connection pool, migrations and one repository per aggregate
//! - [`models`] - Validated domain types returned by the repositories
//! - [`services`] - Account registration, checkout and offers
//!
//! Business rules (discount evaluation, totals, order numbers, shelf life)
//! live in `raredoor-core`; this crate feeds them stored data and persists
//! their results.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod models;
pub mod services;

pub use config::{ConfigError, MarketplaceConfig};
pub use db::RepositoryError;

//! Integration tests for Raredoor.
//!
//! # Running Tests
//!
//! ```bash
//! # Rule tests run without a database
//! cargo test -p raredoor-integration-tests
//!
//! # Database tests need a PostgreSQL instance
//! DATABASE_URL=postgres://localhost/raredoor_test \
//!     cargo test -p raredoor-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `marketplace_rules` - Discount, pricing, order number and shelf-life rules
//! - `marketplace_db` - Schema constraints, repositories and checkout

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use raredoor_core::{
    Email, OrderPrefix, OrgType, Price, ProductId, RetailerId, ShelfLife, StateCode, StoreId,
    UserId, ZipCode,
};
use raredoor_marketplace::db::{
    self, AddressRepository, ProductRepository, RetailerRepository, StoreRepository,
};
use raredoor_marketplace::models::{NewAddress, NewProduct, NewRetailer, NewStore, PostalAddress};
use raredoor_marketplace::services::{AccountService, Registration};
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

/// A migrated database to run tests against.
pub struct TestContext {
    pub pool: PgPool,
}

impl TestContext {
    /// Connect to `DATABASE_URL` and apply migrations.
    pub async fn new() -> Self {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = db::create_pool(&SecretString::from(url), 5)
            .await
            .expect("Failed to connect to test database");
        db::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        Self { pool }
    }

    /// Register a user with a fresh email.
    pub async fn user(&self, is_merchant: bool) -> UserId {
        let email = unique_email();
        let (user, _) = AccountService::new(&self.pool)
            .register(&Registration {
                email: &email,
                password: Some("correct horse battery"),
                is_merchant,
                ..Registration::default()
            })
            .await
            .unwrap();
        user.id
    }

    /// A postal address in Brooklyn.
    pub async fn address(&self) -> PostalAddress {
        AddressRepository::new(&self.pool)
            .create(&NewAddress {
                street: "100 Bedford Ave".to_owned(),
                street2: None,
                city: "Brooklyn".to_owned(),
                state: StateCode::parse("NY").unwrap(),
                zipcd: ZipCode::parse("11211").unwrap(),
                phone: "718-555-0100".to_owned(),
                location: None,
                neighborhood: "Williamsburg".to_owned(),
            })
            .await
            .unwrap()
    }

    /// A retailer with a fresh prefix, owned by a new merchant, with one store.
    pub async fn retailer_with_store(&self) -> (RetailerId, StoreId) {
        let owner = self.user(true).await;
        let retailer = RetailerRepository::new(&self.pool)
            .create(&new_retailer(owner, unique_prefix()))
            .await
            .unwrap();
        let store = StoreRepository::new(&self.pool)
            .create(&NewStore {
                retailer_id: retailer.id,
                store_num: Some("1".to_owned()),
                description: None,
                is_featured: false,
                has_returns: true,
            })
            .await
            .unwrap();
        (retailer.id, store.id)
    }

    /// A published product with `units` units at `cents`.
    pub async fn product(&self, store_id: StoreId, cents: i64, units: u32) -> ProductId {
        let products = ProductRepository::new(&self.pool);
        let new = NewProduct {
            units,
            ..NewProduct::new(
                store_id,
                format!("Teak sideboard {}", Uuid::new_v4().simple()),
                Price::from_cents(cents).unwrap(),
            )
        };
        let product = products.create(&new, ShelfLife::default()).await.unwrap();
        products
            .set_published(product.id, true, chrono::Utc::now())
            .await
            .unwrap();
        product.id
    }
}

/// Retailer input with sensible defaults.
pub fn new_retailer(owner: UserId, prefix: OrderPrefix) -> NewRetailer {
    NewRetailer {
        legal_name: "Second Chance Furniture LLC".to_owned(),
        short_name: "Second Chance".to_owned(),
        organization_type: OrgType::Corporation,
        owner_id: Some(owner),
        address_id: None,
        website: None,
        commission_fee: Decimal::new(15, 2),
        transaction_fee: Decimal::new(3, 2),
        order_prefix: prefix,
    }
}

/// An email no other test uses.
pub fn unique_email() -> String {
    format!("test-{}@example.com", Uuid::new_v4().simple())
}

/// A random four-letter order prefix.
pub fn unique_prefix() -> OrderPrefix {
    let letters: String = Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(OrderPrefix::MAX_LENGTH)
        .map(|b| char::from(b'A' + b % 26))
        .collect();
    OrderPrefix::parse(&letters).unwrap()
}

/// Parse an email known to be valid.
pub fn email(s: &str) -> Email {
    Email::parse(s).unwrap()
}

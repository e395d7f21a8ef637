//! Database tests for the marketplace schema, repositories and services.
//!
//! Every test needs a migrated `PostgreSQL` database at `DATABASE_URL` and
//! creates its own users, retailers and products, so tests can share one
//! database and run in parallel.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use raredoor_core::{
    AddressId, DiscountCode, DiscountScope, DiscountValue, Ineligible, OfferError, OrderType,
    Price, RetailerId, ShelfLife, Slug, TaxRate, UsageLimit,
};
use raredoor_integration_tests::{TestContext, new_retailer, unique_email, unique_prefix};
use raredoor_marketplace::RepositoryError;
use raredoor_marketplace::db::{
    DiscountRepository, OfferRepository, OrderRepository, ProductRepository,
    RedemptionRepository, RetailerRepository, StoreRepository,
};
use raredoor_marketplace::models::{NewDiscount, NewProduct, NewStore};
use raredoor_marketplace::services::{
    AccountError, AccountService, CartLine, CheckoutError, CheckoutService, NewOffer, NewOrder,
    OfferService, OfferServiceError, Registration,
};
use rust_decimal::Decimal;
use uuid::Uuid;

fn price(cents: i64) -> Price {
    Price::from_cents(cents).unwrap()
}

fn unique_code() -> String {
    format!("save{}", Uuid::new_v4().simple())
}

// =============================================================================
// Accounts
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_register_then_authenticate() {
    let ctx = TestContext::new().await;
    let accounts = AccountService::new(&ctx.pool);
    let email = unique_email();

    let (user, profile) = accounts
        .register(&Registration {
            email: &email,
            password: Some("correct horse battery"),
            first_name: "Ada",
            last_name: "Lovelace",
            ..Registration::default()
        })
        .await
        .unwrap();
    assert_eq!(profile.user_id, user.id);
    assert!(!profile.is_merchant);

    let logged_in = accounts
        .authenticate(&email, "correct horse battery", Utc::now())
        .await
        .unwrap();
    assert_eq!(logged_in.id, user.id);

    let wrong = accounts
        .authenticate(&email, "incorrect horse", Utc::now())
        .await;
    assert!(matches!(wrong, Err(AccountError::InvalidCredentials)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_email_is_unique_regardless_of_case() {
    let ctx = TestContext::new().await;
    let accounts = AccountService::new(&ctx.pool);
    let email = unique_email();

    accounts
        .register(&Registration {
            email: &email,
            ..Registration::default()
        })
        .await
        .unwrap();

    let shouted = email.to_uppercase();
    let result = accounts
        .register(&Registration {
            email: &shouted,
            ..Registration::default()
        })
        .await;
    assert!(matches!(result, Err(AccountError::UserAlreadyExists)));
}

// =============================================================================
// Retailers and products
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_order_prefix_is_unique() {
    let ctx = TestContext::new().await;
    let retailers = RetailerRepository::new(&ctx.pool);
    let prefix = unique_prefix();

    let first = new_retailer(ctx.user(true).await, prefix.clone());
    retailers.create(&first).await.unwrap();

    let second = new_retailer(ctx.user(true).await, prefix);
    let result = retailers.create(&second).await;
    assert!(matches!(result, Err(RepositoryError::Conflict(_))));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_retailer_owner_must_be_merchant() {
    let ctx = TestContext::new().await;
    let shopper = ctx.user(false).await;

    let result = RetailerRepository::new(&ctx.pool)
        .create(&new_retailer(shopper, unique_prefix()))
        .await;
    assert!(matches!(result, Err(RepositoryError::Validation(_))));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_store_requires_existing_retailer() {
    let ctx = TestContext::new().await;

    let result = StoreRepository::new(&ctx.pool)
        .create(&NewStore {
            retailer_id: RetailerId::generate(),
            store_num: None,
            description: None,
            is_featured: false,
            has_returns: true,
        })
        .await;
    assert!(matches!(result, Err(RepositoryError::Validation(_))));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_product_slug_is_unique() {
    let ctx = TestContext::new().await;
    let (_, store_id) = ctx.retailer_with_store().await;
    let products = ProductRepository::new(&ctx.pool);
    let slug = Slug::parse(&format!("walnut-credenza-{}", Uuid::new_v4().simple())).unwrap();

    let new = NewProduct {
        slug: Some(slug.clone()),
        ..NewProduct::new(store_id, "Walnut credenza".to_owned(), price(120_000))
    };
    let product = products.create(&new, ShelfLife::default()).await.unwrap();
    assert_eq!(product.slug, slug);
    assert_eq!(product.availability.hours_left, Some(168));
    assert!(!product.availability.is_published);

    let result = products.create(&new, ShelfLife::default()).await;
    assert!(matches!(result, Err(RepositoryError::Conflict(_))));

    let found = products.get_by_slug(&slug).await.unwrap().unwrap();
    assert_eq!(found.id, product.id);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_shelf_life_tick() {
    let ctx = TestContext::new().await;
    let (_, store_id) = ctx.retailer_with_store().await;
    let product_id = ctx.product(store_id, 50_000, 1).await;
    let products = ProductRepository::new(&ctx.pool);

    // Ticks every product in the database, so keep it to one hour.
    let ticked = products
        .decay_shelf_life(1, ShelfLife::default())
        .await
        .unwrap();
    assert!(ticked >= 1);

    let product = products.get(product_id).await.unwrap().unwrap();
    assert_eq!(product.availability.hours_left, Some(167));
    assert!(product.is_recent);
    assert!(product.availability.is_visible());
}

// =============================================================================
// Discounts
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_discount_code_is_unique_and_case_insensitive() {
    let ctx = TestContext::new().await;
    let discounts = DiscountRepository::new(&ctx.pool);
    let code = unique_code();

    let new = NewDiscount {
        code: Some(DiscountCode::parse(&code).unwrap()),
        is_active: true,
        ..NewDiscount::new(
            "Spring sale".to_owned(),
            DiscountScope::General,
            DiscountValue::fixed(price(1000), None).unwrap(),
        )
    };
    let created = discounts.create(&new).await.unwrap();

    let lookup = DiscountCode::parse(&code.to_lowercase()).unwrap();
    let found = discounts.get_by_code(&lookup).await.unwrap().unwrap();
    assert_eq!(found.id, created.id);

    let result = discounts.create(&new).await;
    assert!(matches!(result, Err(RepositoryError::Conflict(_))));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_zero_use_limit_rejected() {
    let ctx = TestContext::new().await;

    let new = NewDiscount {
        uses_total: UsageLimit::Limited(0),
        ..NewDiscount::new(
            "Nobody".to_owned(),
            DiscountScope::General,
            DiscountValue::fixed(price(1000), None).unwrap(),
        )
    };
    let result = DiscountRepository::new(&ctx.pool).create(&new).await;
    assert!(matches!(result, Err(RepositoryError::Validation(_))));
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_numbers_orders_per_retailer() {
    let ctx = TestContext::new().await;
    let (retailer_id, store_id) = ctx.retailer_with_store().await;
    let product_id = ctx.product(store_id, 25_000, 5).await;
    let buyer = ctx.user(false).await;
    let address = ctx.address().await;
    let checkout = CheckoutService::new(&ctx.pool, TaxRate::ZERO);

    let new_order = NewOrder {
        user_id: buyer,
        address_id: address.id,
        items: vec![CartLine {
            product_id,
            quantity: 1,
        }],
        discount_code: None,
    };
    let first = checkout.place_order(&new_order, Utc::now()).await.unwrap();
    let second = checkout.place_order(&new_order, Utc::now()).await.unwrap();

    let prefix = RetailerRepository::new(&ctx.pool)
        .get(retailer_id)
        .await
        .unwrap()
        .unwrap()
        .order_prefix;
    assert_eq!(first.order.order_number.as_str(), format!("{prefix}000001"));
    assert_eq!(second.order.order_number.as_str(), format!("{prefix}000002"));
    assert_eq!(first.order.order_type, OrderType::Purchase);

    let product = ProductRepository::new(&ctx.pool)
        .get(product_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.units, 3);
    assert!(!product.availability.is_sold);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_with_discount_records_redemption() {
    let ctx = TestContext::new().await;
    let (retailer_id, store_id) = ctx.retailer_with_store().await;
    let product_id = ctx.product(store_id, 80_000, 1).await;
    let buyer = ctx.user(false).await;
    let address = ctx.address().await;
    let code = unique_code();

    let discount = DiscountRepository::new(&ctx.pool)
        .create(&NewDiscount {
            code: Some(DiscountCode::parse(&code).unwrap()),
            is_active: true,
            uses_per_user: UsageLimit::Limited(1),
            ..NewDiscount::new(
                "Ten percent".to_owned(),
                DiscountScope::RetailerSpecific(retailer_id),
                DiscountValue::percent(Decimal::TEN, None).unwrap(),
            )
        })
        .await
        .unwrap();

    let rate = TaxRate::new(Decimal::new(8875, 5)).unwrap();
    let checkout = CheckoutService::new(&ctx.pool, rate);
    let placed = checkout
        .place_order(
            &NewOrder {
                user_id: buyer,
                address_id: address.id,
                items: vec![CartLine {
                    product_id,
                    quantity: 1,
                }],
                discount_code: Some(code.to_lowercase()),
            },
            Utc::now(),
        )
        .await
        .unwrap();

    assert_eq!(placed.totals.subtotal, price(80_000));
    assert_eq!(placed.totals.discount, price(8000));
    // 720.00 * 0.08875 = 63.90
    assert_eq!(placed.totals.taxes, price(6390));
    assert_eq!(placed.totals.total, price(78_390));
    assert_eq!(placed.order.total_transaction_price, price(78_390));

    let redemptions = RedemptionRepository::new(&ctx.pool)
        .list_for_order(&placed.order.order_number)
        .await
        .unwrap();
    assert_eq!(redemptions.len(), 1);
    assert_eq!(redemptions[0].discount_id, discount.id);
    assert_eq!(redemptions[0].discount_amount, Some(price(8000)));

    let product = ProductRepository::new(&ctx.pool)
        .get(product_id)
        .await
        .unwrap()
        .unwrap();
    assert!(product.availability.is_sold);

    let items = OrderRepository::new(&ctx.pool)
        .items(&placed.order.order_number)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].original_price, price(80_000));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_discount_use_limit_per_user() {
    let ctx = TestContext::new().await;
    let (_, store_id) = ctx.retailer_with_store().await;
    let product_id = ctx.product(store_id, 10_000, 10).await;
    let buyer = ctx.user(false).await;
    let address = ctx.address().await;
    let code = unique_code();

    DiscountRepository::new(&ctx.pool)
        .create(&NewDiscount {
            code: Some(DiscountCode::parse(&code).unwrap()),
            is_active: true,
            uses_per_user: UsageLimit::Limited(1),
            ..NewDiscount::new(
                "Once each".to_owned(),
                DiscountScope::General,
                DiscountValue::fixed(price(500), None).unwrap(),
            )
        })
        .await
        .unwrap();

    let checkout = CheckoutService::new(&ctx.pool, TaxRate::ZERO);
    let new_order = NewOrder {
        user_id: buyer,
        address_id: address.id,
        items: vec![CartLine {
            product_id,
            quantity: 1,
        }],
        discount_code: Some(code),
    };
    checkout.place_order(&new_order, Utc::now()).await.unwrap();

    let again = checkout.place_order(&new_order, Utc::now()).await;
    assert!(matches!(
        again,
        Err(CheckoutError::Ineligible(Ineligible::UserUsesExhausted))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_total_use_limit_holds_under_concurrent_checkouts() {
    const BUYERS: usize = 8;

    let ctx = TestContext::new().await;
    let (_, store_id) = ctx.retailer_with_store().await;
    let address = ctx.address().await;
    let code = unique_code();

    DiscountRepository::new(&ctx.pool)
        .create(&NewDiscount {
            code: Some(DiscountCode::parse(&code).unwrap()),
            is_active: true,
            uses_total: UsageLimit::Limited(1),
            ..NewDiscount::new(
                "First buyer only".to_owned(),
                DiscountScope::General,
                DiscountValue::fixed(price(500), None).unwrap(),
            )
        })
        .await
        .unwrap();

    let mut orders = Vec::with_capacity(BUYERS);
    for _ in 0..BUYERS {
        orders.push(NewOrder {
            user_id: ctx.user(false).await,
            address_id: address.id,
            items: vec![CartLine {
                product_id: ctx.product(store_id, 10_000, 1).await,
                quantity: 1,
            }],
            discount_code: Some(code.clone()),
        });
    }

    let handles: Vec<_> = orders
        .into_iter()
        .map(|order| {
            let pool = ctx.pool.clone();
            tokio::spawn(async move {
                CheckoutService::new(&pool, TaxRate::ZERO)
                    .place_order(&order, Utc::now())
                    .await
            })
        })
        .collect();

    let mut placed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::Ineligible(Ineligible::TotalUsesExhausted)) => {}
            Err(e) => panic!("unexpected checkout error: {e}"),
        }
    }
    assert_eq!(placed, 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_rejects_mixed_retailers() {
    let ctx = TestContext::new().await;
    let (_, store_a) = ctx.retailer_with_store().await;
    let (_, store_b) = ctx.retailer_with_store().await;
    let chair = ctx.product(store_a, 15_000, 1).await;
    let lamp = ctx.product(store_b, 9_000, 1).await;
    let buyer = ctx.user(false).await;
    let address = ctx.address().await;

    let result = CheckoutService::new(&ctx.pool, TaxRate::ZERO)
        .preview(
            &NewOrder {
                user_id: buyer,
                address_id: address.id,
                items: vec![
                    CartLine {
                        product_id: chair,
                        quantity: 1,
                    },
                    CartLine {
                        product_id: lamp,
                        quantity: 1,
                    },
                ],
                discount_code: None,
            },
            Utc::now(),
        )
        .await;
    assert!(matches!(result, Err(CheckoutError::MixedRetailers)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_rejects_too_many_units() {
    let ctx = TestContext::new().await;
    let (_, store_id) = ctx.retailer_with_store().await;
    let product_id = ctx.product(store_id, 15_000, 2).await;
    let buyer = ctx.user(false).await;
    let address = ctx.address().await;

    let result = CheckoutService::new(&ctx.pool, TaxRate::ZERO)
        .place_order(
            &NewOrder {
                user_id: buyer,
                address_id: address.id,
                items: vec![CartLine {
                    product_id,
                    quantity: 3,
                }],
                discount_code: None,
            },
            Utc::now(),
        )
        .await;
    assert!(matches!(
        result,
        Err(CheckoutError::InsufficientUnits {
            requested: 3,
            available: 2,
            ..
        })
    ));

    let orders = OrderRepository::new(&ctx.pool)
        .list_for_user(buyer)
        .await
        .unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_rejects_unknown_address() {
    let ctx = TestContext::new().await;
    let (_, store_id) = ctx.retailer_with_store().await;
    let product_id = ctx.product(store_id, 15_000, 1).await;
    let buyer = ctx.user(false).await;

    let result = CheckoutService::new(&ctx.pool, TaxRate::ZERO)
        .place_order(
            &NewOrder {
                user_id: buyer,
                address_id: AddressId::generate(),
                items: vec![CartLine {
                    product_id,
                    quantity: 1,
                }],
                discount_code: None,
            },
            Utc::now(),
        )
        .await;
    assert!(matches!(
        result,
        Err(CheckoutError::Repository(RepositoryError::Validation(_)))
    ));

    let orders = OrderRepository::new(&ctx.pool)
        .list_for_user(buyer)
        .await
        .unwrap();
    assert!(orders.is_empty());
    let product = ProductRepository::new(&ctx.pool)
        .get(product_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!product.availability.is_sold);
}

// =============================================================================
// Offers
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_offer_capture_creates_offer_order() {
    let ctx = TestContext::new().await;
    let (_, store_id) = ctx.retailer_with_store().await;
    let product_id = ctx.product(store_id, 60_000, 1).await;
    let buyer = ctx.user(false).await;
    let address = ctx.address().await;
    let offers = OfferService::new(&ctx.pool, TaxRate::ZERO);
    let now = Utc::now();

    let offer = offers
        .place(
            &NewOffer {
                user_id: buyer,
                product_id,
                address_id: address.id,
                offer_price: price(50_000),
                expires_at: now + Duration::days(2),
            },
            now,
        )
        .await
        .unwrap();

    let open = OfferRepository::new(&ctx.pool)
        .list_open_for_product(product_id, now)
        .await
        .unwrap();
    assert_eq!(open.len(), 1);

    let captured = offers.capture(offer.id, now).await.unwrap();
    assert_eq!(captured.order.order_type, OrderType::Offer);
    assert_eq!(captured.order.total_transaction_price, price(50_000));
    assert_eq!(captured.item.quantity, 1);

    let stored = OfferRepository::new(&ctx.pool)
        .get(offer.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_captured);
    assert_eq!(stored.order_number, Some(captured.order.order_number));

    let product = ProductRepository::new(&ctx.pool)
        .get(product_id)
        .await
        .unwrap()
        .unwrap();
    assert!(product.availability.is_reserved);

    let twice = offers.capture(offer.id, now).await;
    assert!(matches!(
        twice,
        Err(OfferServiceError::Offer(OfferError::NotOpen))
    ));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_expired_offer_cannot_be_captured() {
    let ctx = TestContext::new().await;
    let (_, store_id) = ctx.retailer_with_store().await;
    let product_id = ctx.product(store_id, 60_000, 1).await;
    let buyer = ctx.user(false).await;
    let address = ctx.address().await;
    let offers = OfferService::new(&ctx.pool, TaxRate::ZERO);
    let now = Utc::now();

    let offer = offers
        .place(
            &NewOffer {
                user_id: buyer,
                product_id,
                address_id: address.id,
                offer_price: price(45_000),
                expires_at: now + Duration::hours(1),
            },
            now,
        )
        .await
        .unwrap();

    let later = now + Duration::hours(2);
    let result = offers.capture(offer.id, later).await;
    assert!(matches!(
        result,
        Err(OfferServiceError::Offer(OfferError::NotOpen))
    ));

    let expired = offers.expire_stale(later).await.unwrap();
    assert!(expired >= 1);
    let stored = OfferRepository::new(&ctx.pool)
        .get(offer.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.is_active);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_withdrawn_offer_is_closed() {
    let ctx = TestContext::new().await;
    let (_, store_id) = ctx.retailer_with_store().await;
    let product_id = ctx.product(store_id, 60_000, 1).await;
    let buyer = ctx.user(false).await;
    let address = ctx.address().await;
    let offers = OfferService::new(&ctx.pool, TaxRate::ZERO);
    let now = Utc::now();

    let offer = offers
        .place(
            &NewOffer {
                user_id: buyer,
                product_id,
                address_id: address.id,
                offer_price: price(52_000),
                expires_at: now + Duration::days(1),
            },
            now,
        )
        .await
        .unwrap();

    offers.withdraw(offer.id, now).await.unwrap();

    let again = offers.withdraw(offer.id, now).await;
    assert!(matches!(
        again,
        Err(OfferServiceError::Offer(OfferError::NotOpen))
    ));
    let captured = offers.capture(offer.id, now).await;
    assert!(matches!(
        captured,
        Err(OfferServiceError::Offer(OfferError::NotOpen))
    ));

    let product = ProductRepository::new(&ctx.pool)
        .get(product_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!product.availability.is_reserved);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_offer_on_unpublished_product_cannot_be_captured() {
    let ctx = TestContext::new().await;
    let (_, store_id) = ctx.retailer_with_store().await;
    let product_id = ctx.product(store_id, 60_000, 1).await;
    let buyer = ctx.user(false).await;
    let address = ctx.address().await;
    let offers = OfferService::new(&ctx.pool, TaxRate::ZERO);
    let now = Utc::now();

    let offer = offers
        .place(
            &NewOffer {
                user_id: buyer,
                product_id,
                address_id: address.id,
                offer_price: price(55_000),
                expires_at: now + Duration::days(1),
            },
            now,
        )
        .await
        .unwrap();

    let products = ProductRepository::new(&ctx.pool);
    products.set_published(product_id, false, now).await.unwrap();

    let result = offers.capture(offer.id, now).await;
    assert!(matches!(
        result,
        Err(OfferServiceError::Offer(OfferError::ProductUnavailable))
    ));

    let product = products.get(product_id).await.unwrap().unwrap();
    assert!(!product.availability.is_reserved);
    let orders = OrderRepository::new(&ctx.pool)
        .list_for_user(buyer)
        .await
        .unwrap();
    assert!(orders.is_empty());
}

//! Checkout: turn a cart into an order.
//!
//! Everything from loading the products to recording the discount
//! redemption runs in one transaction. The discount row is locked
//! (`FOR UPDATE`) before its redemption counts are read, so concurrent
//! checkouts with the same code are serialised and cannot exceed its
//! usage limits.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument};

use raredoor_core::{
    AddressId, DiscountCode, DiscountError, DiscountId, DiscountQuote, Ineligible, OrderTotals,
    OrderType, Price, PricedLine, PricingError, ProductId, RedemptionContext, RetailerId,
    TaxRate, UserId,
};

use crate::db::RepositoryError;
use crate::db::discounts::{find_by_code, lock_by_code};
use crate::db::orders::{OrderHeader, insert_item, insert_order};
use crate::db::products::{SaleableProduct, saleable_products, take_units};
use crate::db::redemptions;
use crate::db::retailers::next_order_number;
use crate::models::{Order, OrderItem};

/// Errors that can occur while pricing or placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("quantity must be at least 1 for product {0}")]
    ZeroQuantity(ProductId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Unpublished, sold, reserved, or out of shelf life.
    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),

    #[error("only {available} of product {product_id} left, {requested} requested")]
    InsufficientUnits {
        product_id: ProductId,
        requested: u32,
        available: i32,
    },

    /// Items from more than one retailer in one cart.
    #[error("all items of an order must come from one retailer")]
    MixedRetailers,

    #[error("unknown discount code: {0}")]
    UnknownDiscountCode(String),

    #[error("invalid discount code: {0}")]
    InvalidDiscountCode(#[from] DiscountError),

    /// The code exists but does not apply to this order.
    #[error(transparent)]
    Ineligible(#[from] Ineligible),

    #[error("pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// One product in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A cart ready for checkout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub items: Vec<CartLine>,
    /// Matched case-insensitively; blank means none.
    pub discount_code: Option<String>,
}

/// What an order would cost, without placing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutQuote {
    pub retailer_id: RetailerId,
    pub totals: OrderTotals,
    pub discount: Option<DiscountQuote>,
}

/// The result of a successful checkout.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub discount: Option<DiscountQuote>,
}

struct PricedCart {
    retailer_id: RetailerId,
    lines: Vec<(CartLine, Price)>,
    totals: OrderTotals,
    discount: Option<(DiscountId, DiscountQuote)>,
}

/// Order placement.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    tax_rate: TaxRate,
}

impl<'a> CheckoutService<'a> {
    /// Create a checkout service charging `tax_rate` on the discounted subtotal.
    #[must_use]
    pub const fn new(pool: &'a PgPool, tax_rate: TaxRate) -> Self {
        Self { pool, tax_rate }
    }

    /// Price a cart, including any discount, without writing anything.
    ///
    /// # Errors
    ///
    /// Same as [`CheckoutService::place_order`].
    pub async fn preview(
        &self,
        order: &NewOrder,
        now: DateTime<Utc>,
    ) -> Result<CheckoutQuote, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        let priced = self.price_cart(&mut *conn, order, now, false).await?;

        Ok(CheckoutQuote {
            retailer_id: priced.retailer_id,
            totals: priced.totals,
            discount: priced.discount.map(|(_, quote)| quote),
        })
    }

    /// Place an order.
    ///
    /// Allocates the retailer's next order number, snapshots current prices
    /// into the order items, takes the units off the products (the last unit
    /// marks a product sold) and records the discount redemption.
    ///
    /// # Errors
    ///
    /// Returns a `CheckoutError` describing the first problem with the cart
    /// or discount; nothing is written in that case.
    #[instrument(skip(self, order), fields(user_id = %order.user_id))]
    pub async fn place_order(
        &self,
        order: &NewOrder,
        now: DateTime<Utc>,
    ) -> Result<PlacedOrder, CheckoutError> {
        let mut tx = self.pool.begin().await?;

        let priced = self.price_cart(&mut *tx, order, now, true).await?;
        let order_number = next_order_number(&mut *tx, priced.retailer_id).await?;

        let placed = insert_order(
            &mut *tx,
            &OrderHeader {
                order_number: &order_number,
                user_id: order.user_id,
                retailer_id: priced.retailer_id,
                order_type: OrderType::Purchase,
                address_id: order.address_id,
                totals: &priced.totals,
            },
        )
        .await?;

        let mut items = Vec::with_capacity(priced.lines.len());
        for (line, unit_price) in &priced.lines {
            let quantity = i32::try_from(line.quantity)
                .map_err(|_| CheckoutError::ProductUnavailable(line.product_id))?;
            if !take_units(&mut *tx, line.product_id, quantity).await? {
                return Err(CheckoutError::ProductUnavailable(line.product_id));
            }
            items.push(
                insert_item(&mut *tx, &order_number, line.product_id, line.quantity, *unit_price)
                    .await?,
            );
        }

        if let Some((discount_id, quote)) = &priced.discount {
            redemptions::record(&mut *tx, order.user_id, *discount_id, &order_number, quote, now)
                .await?;
            info!(
                order_number = %order_number,
                discount_id = %discount_id,
                amount = %quote.discount_amount,
                "Redeemed discount"
            );
        }

        tx.commit().await?;

        info!(
            order_number = %order_number,
            retailer_id = %priced.retailer_id,
            total = %priced.totals.total,
            "Placed order"
        );

        Ok(PlacedOrder {
            order: placed,
            items,
            totals: priced.totals,
            discount: priced.discount.map(|(_, quote)| quote),
        })
    }

    /// With `lock_discount`, the discount row stays locked until the
    /// caller's transaction ends.
    async fn price_cart(
        &self,
        conn: &mut PgConnection,
        order: &NewOrder,
        now: DateTime<Utc>,
        lock_discount: bool,
    ) -> Result<PricedCart, CheckoutError> {
        let lines = merge_lines(&order.items)?;
        let code = order
            .discount_code
            .as_deref()
            .map(DiscountCode::parse_optional)
            .transpose()?
            .flatten();

        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let products: HashMap<ProductId, SaleableProduct> = saleable_products(&mut *conn, &ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut stocked = Vec::with_capacity(lines.len());
        for line in lines {
            let product = products
                .get(&line.product_id)
                .ok_or(CheckoutError::ProductNotFound(line.product_id))?;
            check_stock(line, product)?;
            stocked.push((line, product));
        }

        let retailer_id = resolve_retailer(stocked.iter().map(|(_, p)| p.retailer_id))?;
        let priced: Vec<PricedLine> = stocked
            .iter()
            .map(|(line, product)| PricedLine {
                quantity: line.quantity,
                unit_price: product.current_price,
            })
            .collect();
        let subtotal = OrderTotals::subtotal(&priced)?;

        let discount = match code {
            Some(code) => {
                let found = if lock_discount {
                    lock_by_code(&mut *conn, &code).await?
                } else {
                    find_by_code(&mut *conn, &code).await?
                };
                let discount =
                    found.ok_or_else(|| CheckoutError::UnknownDiscountCode(code.to_string()))?;
                let (user_redemptions, total_redemptions) =
                    redemptions::counts(&mut *conn, discount.id, order.user_id).await?;
                let quote = discount.rule.apply(&RedemptionContext {
                    now,
                    retailer_id,
                    subtotal,
                    user_redemptions,
                    total_redemptions,
                })?;
                Some((discount.id, quote))
            }
            None => None,
        };

        let discount_amount = discount
            .as_ref()
            .map_or(Price::ZERO, |(_, quote)| quote.discount_amount);
        let totals = OrderTotals::from_subtotal(subtotal, discount_amount, self.tax_rate)?;

        Ok(PricedCart {
            retailer_id,
            lines: stocked
                .into_iter()
                .map(|(line, product)| (line, product.current_price))
                .collect(),
            totals,
            discount,
        })
    }
}

/// Combine repeated products into one line each, keeping cart order.
fn merge_lines(items: &[CartLine]) -> Result<Vec<CartLine>, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let mut merged: Vec<CartLine> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(CheckoutError::ZeroQuantity(item.product_id));
        }
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => merged.push(*item),
        }
    }
    Ok(merged)
}

fn check_stock(line: CartLine, product: &SaleableProduct) -> Result<(), CheckoutError> {
    if !product.availability().is_purchasable() {
        return Err(CheckoutError::ProductUnavailable(line.product_id));
    }
    if i64::from(line.quantity) > i64::from(product.units) {
        return Err(CheckoutError::InsufficientUnits {
            product_id: line.product_id,
            requested: line.quantity,
            available: product.units,
        });
    }
    Ok(())
}

fn resolve_retailer(
    mut retailers: impl Iterator<Item = RetailerId>,
) -> Result<RetailerId, CheckoutError> {
    let first = retailers.next().ok_or(CheckoutError::EmptyCart)?;
    if retailers.any(|r| r != first) {
        return Err(CheckoutError::MixedRetailers);
    }
    Ok(first)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(product_id: ProductId, quantity: u32) -> CartLine {
        CartLine {
            product_id,
            quantity,
        }
    }

    fn saleable(retailer_id: RetailerId, units: i32) -> SaleableProduct {
        SaleableProduct {
            id: ProductId::generate(),
            retailer_id,
            current_price: Price::from_cents(25_000).unwrap(),
            minimum_offer_price: None,
            units,
            is_published: true,
            is_sold: false,
            is_reserved: false,
            hours_left: Some(100),
        }
    }

    #[test]
    fn test_merge_lines() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        let merged = merge_lines(&[line(a, 1), line(b, 2), line(a, 3)]).unwrap();
        assert_eq!(merged, vec![line(a, 4), line(b, 2)]);
    }

    #[test]
    fn test_merge_lines_rejects_bad_carts() {
        assert!(matches!(merge_lines(&[]), Err(CheckoutError::EmptyCart)));

        let a = ProductId::generate();
        assert!(matches!(
            merge_lines(&[line(a, 0)]),
            Err(CheckoutError::ZeroQuantity(id)) if id == a
        ));
    }

    #[test]
    fn test_check_stock() {
        let retailer = RetailerId::generate();
        let product = saleable(retailer, 2);
        assert!(check_stock(line(product.id, 2), &product).is_ok());
        assert!(matches!(
            check_stock(line(product.id, 3), &product),
            Err(CheckoutError::InsufficientUnits {
                requested: 3,
                available: 2,
                ..
            })
        ));

        let sold = SaleableProduct {
            is_sold: true,
            ..saleable(retailer, 1)
        };
        assert!(matches!(
            check_stock(line(sold.id, 1), &sold),
            Err(CheckoutError::ProductUnavailable(_))
        ));

        let expired = SaleableProduct {
            hours_left: Some(0),
            ..saleable(retailer, 1)
        };
        assert!(matches!(
            check_stock(line(expired.id, 1), &expired),
            Err(CheckoutError::ProductUnavailable(_))
        ));

        let reserved = SaleableProduct {
            is_reserved: true,
            ..saleable(retailer, 1)
        };
        assert!(matches!(
            check_stock(line(reserved.id, 1), &reserved),
            Err(CheckoutError::ProductUnavailable(_))
        ));
    }

    #[test]
    fn test_resolve_retailer() {
        let a = RetailerId::generate();
        let b = RetailerId::generate();
        assert_eq!(resolve_retailer([a, a].into_iter()).unwrap(), a);
        assert!(matches!(
            resolve_retailer([a, b, a].into_iter()),
            Err(CheckoutError::MixedRetailers)
        ));
        assert!(matches!(
            resolve_retailer(std::iter::empty()),
            Err(CheckoutError::EmptyCart)
        ));
    }
}

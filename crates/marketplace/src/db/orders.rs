//! Order repository.
//!
//! Orders are only ever created by checkout and offer capture, inside their
//! own transactions, so inserts are crate-internal.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};

use raredoor_core::{
    AddressId, OrderItemId, OrderNumber, OrderTotals, OrderType, Price, ProductId, RetailerId,
    UserId,
};

use super::{RepositoryError, missing_reference};
use crate::models::{Order, OrderItem};

const ORDER_COLUMNS: &str = "order_number, created_at, updated_at, user_id, retailer_id, \
                             order_type, address_id, subtotal, taxes, total_transaction_price";

const ORDER_ITEM_COLUMNS: &str =
    "id, created_at, updated_at, order_number, quantity, product_id, original_price";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    order_number: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user_id: UserId,
    retailer_id: RetailerId,
    order_type: String,
    address_id: AddressId,
    subtotal: Price,
    taxes: Price,
    total_transaction_price: Price,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let order_number = OrderNumber::parse(&row.order_number)
            .map_err(|e| RepositoryError::corrupt("order_number", e))?;
        let order_type: OrderType = row
            .order_type
            .parse()
            .map_err(|e| RepositoryError::corrupt("order_type", e))?;

        Ok(Self {
            order_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
            user_id: row.user_id,
            retailer_id: row.retailer_id,
            order_type,
            address_id: row.address_id,
            subtotal: row.subtotal,
            taxes: row.taxes,
            total_transaction_price: row.total_transaction_price,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    order_number: String,
    quantity: i32,
    product_id: ProductId,
    original_price: Price,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let order_number = OrderNumber::parse(&row.order_number)
            .map_err(|e| RepositoryError::corrupt("order_number", e))?;
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|&q| q > 0)
            .ok_or_else(|| RepositoryError::corrupt("quantity", row.quantity))?;

        Ok(Self {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            order_number,
            quantity,
            product_id: row.product_id,
            original_price: row.original_price,
        })
    }
}

/// Columns of a new order row.
#[derive(Debug, Clone)]
pub(crate) struct OrderHeader<'a> {
    pub order_number: &'a OrderNumber,
    pub user_id: UserId,
    pub retailer_id: RetailerId,
    pub order_type: OrderType,
    pub address_id: AddressId,
    pub totals: &'a OrderTotals,
}

/// Repository for reading orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by its number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, order_number: &OrderNumber) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM marketplace.order WHERE order_number = $1"
        ))
        .bind(order_number.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Items of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_number: &OrderNumber) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM marketplace.order_item WHERE order_number = $1 ORDER BY id"
        ))
        .bind(order_number.as_str())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(OrderItem::try_from).collect()
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM marketplace.order WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// A retailer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_retailer(
        &self,
        retailer_id: RetailerId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM marketplace.order WHERE retailer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(retailer_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }
}

/// Insert the order row. The subtotal stored is before any discount.
#[instrument(skip(conn, header), fields(order_number = %header.order_number))]
pub(crate) async fn insert_order(
    conn: &mut PgConnection,
    header: &OrderHeader<'_>,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        INSERT INTO marketplace.order
            (order_number, user_id, retailer_id, order_type, address_id,
             subtotal, taxes, total_transaction_price)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(header.order_number.as_str())
    .bind(header.user_id)
    .bind(header.retailer_id)
    .bind(header.order_type.as_str())
    .bind(header.address_id)
    .bind(header.totals.subtotal)
    .bind(header.totals.taxes)
    .bind(header.totals.total)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| missing_reference(e, "user, retailer or address"))?;

    debug!("Inserted order");
    Order::try_from(row)
}

/// Insert one line of an order.
pub(crate) async fn insert_item(
    conn: &mut PgConnection,
    order_number: &OrderNumber,
    product_id: ProductId,
    quantity: u32,
    unit_price: Price,
) -> Result<OrderItem, RepositoryError> {
    let quantity = i32::try_from(quantity)
        .map_err(|_| RepositoryError::Validation("quantity out of range".to_owned()))?;

    let row = sqlx::query_as::<_, OrderItemRow>(&format!(
        r"
        INSERT INTO marketplace.order_item (order_number, quantity, product_id, original_price)
        VALUES ($1, $2, $3, $4)
        RETURNING {ORDER_ITEM_COLUMNS}
        "
    ))
    .bind(order_number.as_str())
    .bind(quantity)
    .bind(product_id)
    .bind(unit_price)
    .fetch_one(&mut *conn)
    .await?;

    OrderItem::try_from(row)
}

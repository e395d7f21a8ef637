//! Offer repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use raredoor_core::{AddressId, OfferId, OrderNumber, OrderTotals, Price, ProductId, UserId};

use super::RepositoryError;
use crate::models::Offer;

const OFFER_COLUMNS: &str = "id, created_at, updated_at, user_id, product_id, address_id, \
                             offer_price, taxes, total_transaction_price, is_captured, \
                             is_active, expiration_timestamp, order_number";

#[derive(Debug, sqlx::FromRow)]
struct OfferRow {
    id: OfferId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user_id: UserId,
    product_id: ProductId,
    address_id: AddressId,
    offer_price: Price,
    taxes: Price,
    total_transaction_price: Price,
    is_captured: bool,
    is_active: bool,
    expiration_timestamp: DateTime<Utc>,
    order_number: Option<String>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = RepositoryError;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        let order_number = row
            .order_number
            .as_deref()
            .map(OrderNumber::parse)
            .transpose()
            .map_err(|e| RepositoryError::corrupt("order_number", e))?;
        if row.is_captured && order_number.is_none() {
            return Err(RepositoryError::DataCorruption(format!(
                "captured offer {} has no order",
                row.id
            )));
        }

        Ok(Self {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            user_id: row.user_id,
            product_id: row.product_id,
            address_id: row.address_id,
            offer_price: row.offer_price,
            taxes: row.taxes,
            total_transaction_price: row.total_transaction_price,
            is_captured: row.is_captured,
            is_active: row.is_active,
            expiration_timestamp: row.expiration_timestamp,
            order_number,
        })
    }
}

/// Columns of a new offer row, already validated and priced.
#[derive(Debug, Clone)]
pub(crate) struct OfferInsert {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub address_id: AddressId,
    pub totals: OrderTotals,
    pub expires_at: DateTime<Utc>,
}

/// Repository for offers.
pub struct OfferRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OfferRepository<'a> {
    /// Create a new offer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an offer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OfferId) -> Result<Option<Offer>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    /// Offers on a product that can still be captured at `now`, highest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_open_for_product(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Offer>, RepositoryError> {
        let rows = sqlx::query_as::<_, OfferRow>(&format!(
            r"
            SELECT {OFFER_COLUMNS}
            FROM marketplace.offer
            WHERE product_id = $1 AND is_active AND NOT is_captured
              AND expiration_timestamp > $2
            ORDER BY offer_price DESC, created_at
            "
        ))
        .bind(product_id)
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Offer::try_from).collect()
    }

    /// A buyer's offers, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Offer>, RepositoryError> {
        let rows = sqlx::query_as::<_, OfferRow>(&format!(
            "SELECT {OFFER_COLUMNS} FROM marketplace.offer WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Offer::try_from).collect()
    }

    /// Deactivate an uncaptured offer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such uncaptured offer exists.
    pub async fn withdraw(&self, id: OfferId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.offer
            SET is_active = FALSE, updated_at = now()
            WHERE id = $1 AND NOT is_captured
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        info!(offer_id = %id, "Withdrew offer");
        Ok(())
    }

    /// Deactivate every open offer whose expiration has passed.
    ///
    /// Returns the number of offers expired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self))]
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.offer
            SET is_active = FALSE, updated_at = now()
            WHERE is_active AND NOT is_captured AND expiration_timestamp <= $1
            ",
        )
        .bind(now)
        .execute(self.pool)
        .await?;

        let expired = result.rows_affected();
        info!(expired, "Expired stale offers");
        Ok(expired)
    }
}

/// Get an offer on an existing connection.
pub(crate) async fn get(conn: &mut PgConnection, id: OfferId) -> Result<Option<Offer>, RepositoryError> {
    let row = sqlx::query_as::<_, OfferRow>(&format!(
        "SELECT {OFFER_COLUMNS} FROM marketplace.offer WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Offer::try_from).transpose()
}

/// Insert a new open offer.
pub(crate) async fn insert(conn: &mut PgConnection, new: &OfferInsert) -> Result<Offer, RepositoryError> {
    let row = sqlx::query_as::<_, OfferRow>(&format!(
        r"
        INSERT INTO marketplace.offer
            (user_id, product_id, address_id, offer_price, taxes,
             total_transaction_price, expiration_timestamp)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {OFFER_COLUMNS}
        "
    ))
    .bind(new.user_id)
    .bind(new.product_id)
    .bind(new.address_id)
    .bind(new.totals.subtotal)
    .bind(new.totals.taxes)
    .bind(new.totals.total)
    .bind(new.expires_at)
    .fetch_one(&mut *conn)
    .await?;

    let offer = Offer::try_from(row)?;
    info!(offer_id = %offer.id, product_id = %offer.product_id, "Placed offer");
    Ok(offer)
}

/// Mark an open offer captured and link its order. Returns `false` if the
/// offer was captured or deactivated concurrently.
pub(crate) async fn mark_captured(
    conn: &mut PgConnection,
    id: OfferId,
    order_number: &OrderNumber,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketplace.offer
        SET is_captured = TRUE, is_active = FALSE, order_number = $2, updated_at = now()
        WHERE id = $1 AND is_active AND NOT is_captured
        ",
    )
    .bind(id)
    .bind(order_number.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

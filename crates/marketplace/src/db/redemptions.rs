//! Discount redemption history.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use raredoor_core::{DiscountId, DiscountQuote, OrderNumber, Price, RedemptionId, UserId};

use super::RepositoryError;
use crate::models::DiscountRedemption;

const REDEMPTION_COLUMNS: &str =
    "id, user_id, discount_id, order_number, timestamp, total_before_discount, discount_amount";

#[derive(Debug, sqlx::FromRow)]
struct RedemptionRow {
    id: RedemptionId,
    user_id: UserId,
    discount_id: DiscountId,
    order_number: String,
    timestamp: DateTime<Utc>,
    total_before_discount: Option<Price>,
    discount_amount: Option<Price>,
}

impl TryFrom<RedemptionRow> for DiscountRedemption {
    type Error = RepositoryError;

    fn try_from(row: RedemptionRow) -> Result<Self, Self::Error> {
        let order_number = OrderNumber::parse(&row.order_number)
            .map_err(|e| RepositoryError::corrupt("order_number", e))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            discount_id: row.discount_id,
            order_number,
            timestamp: row.timestamp,
            total_before_discount: row.total_before_discount,
            discount_amount: row.discount_amount,
        })
    }
}

/// Repository for reading redemptions. Redemptions are written by checkout.
pub struct RedemptionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RedemptionRepository<'a> {
    /// Create a new redemption repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Redemptions recorded against an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_order(
        &self,
        order_number: &OrderNumber,
    ) -> Result<Vec<DiscountRedemption>, RepositoryError> {
        let rows = sqlx::query_as::<_, RedemptionRow>(&format!(
            "SELECT {REDEMPTION_COLUMNS} FROM marketplace.discount_redemption WHERE order_number = $1 ORDER BY id"
        ))
        .bind(order_number.as_str())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(DiscountRedemption::try_from).collect()
    }

    /// A user's redemptions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<DiscountRedemption>, RepositoryError> {
        let rows = sqlx::query_as::<_, RedemptionRow>(&format!(
            "SELECT {REDEMPTION_COLUMNS} FROM marketplace.discount_redemption WHERE user_id = $1 ORDER BY timestamp DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(DiscountRedemption::try_from).collect()
    }

    /// How often a discount has been used by `user_id` and overall.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn counts(
        &self,
        discount_id: DiscountId,
        user_id: UserId,
    ) -> Result<(i64, i64), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        counts(&mut conn, discount_id, user_id).await
    }
}

/// Count redemptions of a discount as `(by this user, by everyone)`.
pub(crate) async fn counts(
    conn: &mut PgConnection,
    discount_id: DiscountId,
    user_id: UserId,
) -> Result<(i64, i64), RepositoryError> {
    let (by_user, total) = sqlx::query_as::<_, (i64, i64)>(
        r"
        SELECT COUNT(*) FILTER (WHERE user_id = $2), COUNT(*)
        FROM marketplace.discount_redemption
        WHERE discount_id = $1
        ",
    )
    .bind(discount_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    debug!(discount_id = %discount_id, by_user, total, "Counted redemptions");
    Ok((by_user, total))
}

/// Record that `quote` was applied to an order.
pub(crate) async fn record(
    conn: &mut PgConnection,
    user_id: UserId,
    discount_id: DiscountId,
    order_number: &OrderNumber,
    quote: &DiscountQuote,
    at: DateTime<Utc>,
) -> Result<DiscountRedemption, RepositoryError> {
    let row = sqlx::query_as::<_, RedemptionRow>(&format!(
        r"
        INSERT INTO marketplace.discount_redemption
            (user_id, discount_id, order_number, timestamp, total_before_discount, discount_amount)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {REDEMPTION_COLUMNS}
        "
    ))
    .bind(user_id)
    .bind(discount_id)
    .bind(order_number.as_str())
    .bind(at)
    .bind(quote.total_before_discount)
    .bind(quote.discount_amount)
    .fetch_one(&mut *conn)
    .await?;

    DiscountRedemption::try_from(row)
}

//! Discount repository.
//!
//! The value and scope of a discount are spread over several nullable
//! columns; rows are folded back into a [`DiscountRule`] on read, and a row
//! that no longer forms a valid rule is reported as corrupt.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};

use raredoor_core::{
    DiscountCode, DiscountColumns, DiscountId, DiscountRule, DiscountScope, DiscountType,
    DiscountValue, DiscountWindow, RetailerId, UsageLimit,
};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{Discount, NewDiscount};

const DISCOUNT_COLUMNS: &str = "id, name, short_terms, terms, discount_type, retailer_id, \
    is_active, start_time, end_time, uses_per_user, uses_total, code, fixed_amount_off, \
    fixed_amount_off_minimum_order, percent_off, percent_off_limit";

#[derive(Debug, sqlx::FromRow)]
struct DiscountRow {
    id: DiscountId,
    name: String,
    short_terms: String,
    terms: String,
    discount_type: String,
    retailer_id: Option<RetailerId>,
    is_active: bool,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    uses_per_user: i32,
    uses_total: i32,
    code: String,
    fixed_amount_off: Option<Decimal>,
    fixed_amount_off_minimum_order: Option<Decimal>,
    percent_off: Option<Decimal>,
    percent_off_limit: Option<Decimal>,
}

impl TryFrom<DiscountRow> for Discount {
    type Error = RepositoryError;

    fn try_from(row: DiscountRow) -> Result<Self, Self::Error> {
        let discount_type: DiscountType = row
            .discount_type
            .parse()
            .map_err(|e| RepositoryError::corrupt("discount_type", e))?;
        let scope = DiscountScope::from_columns(discount_type, row.retailer_id)
            .map_err(|e| RepositoryError::corrupt("discount scope", e))?;
        let value = DiscountValue::from_columns(DiscountColumns {
            fixed_amount_off: row.fixed_amount_off,
            fixed_amount_off_minimum_order: row.fixed_amount_off_minimum_order,
            percent_off: row.percent_off,
            percent_off_limit: row.percent_off_limit,
        })
        .map_err(|e| RepositoryError::corrupt("discount value", e))?;
        let window = DiscountWindow::new(row.start_time, row.end_time)
            .map_err(|e| RepositoryError::corrupt("discount window", e))?;
        let uses_per_user = UsageLimit::from_stored(row.uses_per_user)
            .map_err(|e| RepositoryError::corrupt("uses_per_user", e))?;
        let uses_total = UsageLimit::from_stored(row.uses_total)
            .map_err(|e| RepositoryError::corrupt("uses_total", e))?;
        let code = DiscountCode::parse_optional(&row.code)
            .map_err(|e| RepositoryError::corrupt("discount code", e))?;

        Ok(Self {
            id: row.id,
            name: row.name,
            short_terms: row.short_terms,
            terms: row.terms,
            code,
            rule: DiscountRule {
                scope,
                value,
                is_active: row.is_active,
                window,
                uses_per_user,
                uses_total,
            },
        })
    }
}

fn check_limit(field: &str, limit: UsageLimit) -> Result<(), RepositoryError> {
    match limit {
        UsageLimit::Limited(0) => Err(RepositoryError::Validation(format!(
            "{field} must be positive or unlimited"
        ))),
        UsageLimit::Limited(n) if i32::try_from(n).is_err() => Err(RepositoryError::Validation(
            format!("{field} must be at most {}", i32::MAX),
        )),
        _ => Ok(()),
    }
}

/// Repository for discounts.
pub struct DiscountRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DiscountRepository<'a> {
    /// Create a new discount repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a discount by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored rule is invalid.
    pub async fn get(&self, id: DiscountId) -> Result<Option<Discount>, RepositoryError> {
        let row = sqlx::query_as::<_, DiscountRow>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM marketplace.discount WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Discount::try_from).transpose()
    }

    /// Look up a discount by code, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &DiscountCode) -> Result<Option<Discount>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_by_code(&mut conn, code).await
    }

    /// Discounts currently switched on, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Discount>, RepositoryError> {
        let rows = sqlx::query_as::<_, DiscountRow>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM marketplace.discount WHERE is_active ORDER BY id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Discount::try_from).collect()
    }

    /// Create a discount.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for over-long text or a zero
    /// usage limit, and `RepositoryError::Conflict` if the code is taken in
    /// any letter case.
    #[instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create(&self, new: &NewDiscount) -> Result<Discount, RepositoryError> {
        new.validate().map_err(RepositoryError::Validation)?;
        check_limit("uses_per_user", new.uses_per_user)?;
        check_limit("uses_total", new.uses_total)?;

        let columns = new.value.to_columns();

        let row = sqlx::query_as::<_, DiscountRow>(&format!(
            r"
            INSERT INTO marketplace.discount (
                name, short_terms, terms, discount_type, retailer_id, is_active,
                start_time, end_time, uses_per_user, uses_total, code,
                fixed_amount_off, fixed_amount_off_minimum_order, percent_off, percent_off_limit
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {DISCOUNT_COLUMNS}
            "
        ))
        .bind(&new.name)
        .bind(&new.short_terms)
        .bind(&new.terms)
        .bind(new.scope.discount_type().as_str())
        .bind(new.scope.retailer_id())
        .bind(new.is_active)
        .bind(new.window.start())
        .bind(new.window.end())
        .bind(new.uses_per_user.to_stored())
        .bind(new.uses_total.to_stored())
        .bind(new.code.as_ref().map_or("", DiscountCode::as_str))
        .bind(columns.fixed_amount_off)
        .bind(columns.fixed_amount_off_minimum_order)
        .bind(columns.percent_off)
        .bind(columns.percent_off_limit)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "discount code"))?;

        let discount = Discount::try_from(row)?;
        info!(discount_id = %discount.id, "Created discount");
        Ok(discount)
    }

    /// Switch a discount on or off.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the discount doesn't exist.
    pub async fn set_active(&self, id: DiscountId, is_active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE marketplace.discount SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        info!(discount_id = %id, is_active, "Updated discount status");
        Ok(())
    }
}

/// Find a discount by code on an existing connection.
pub(crate) async fn find_by_code(
    conn: &mut PgConnection,
    code: &DiscountCode,
) -> Result<Option<Discount>, RepositoryError> {
    select_by_code(conn, code, "").await
}

/// Find a discount by code and lock its row until the transaction ends.
///
/// Redemptions of one discount are serialised on this lock, so the usage
/// counts read after it stay accurate until the redemption is recorded.
pub(crate) async fn lock_by_code(
    conn: &mut PgConnection,
    code: &DiscountCode,
) -> Result<Option<Discount>, RepositoryError> {
    select_by_code(conn, code, "FOR UPDATE").await
}

async fn select_by_code(
    conn: &mut PgConnection,
    code: &DiscountCode,
    locking: &str,
) -> Result<Option<Discount>, RepositoryError> {
    let row = sqlx::query_as::<_, DiscountRow>(&format!(
        "SELECT {DISCOUNT_COLUMNS} FROM marketplace.discount \
         WHERE upper(code) = $1 AND code <> '' {locking}"
    ))
    .bind(code.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    debug!(code = %code, found = row.is_some(), "Looked up discount code");
    row.map(Discount::try_from).transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row() -> DiscountRow {
        DiscountRow {
            id: DiscountId::new(1),
            name: "Spring".to_owned(),
            short_terms: String::new(),
            terms: String::new(),
            discount_type: "GENERAL".to_owned(),
            retailer_id: None,
            is_active: true,
            start_time: None,
            end_time: None,
            uses_per_user: 1,
            uses_total: -1,
            code: "SPRING".to_owned(),
            fixed_amount_off: None,
            fixed_amount_off_minimum_order: None,
            percent_off: Some(Decimal::new(15, 0)),
            percent_off_limit: None,
        }
    }

    #[test]
    fn test_row_folds_into_rule() {
        let discount = Discount::try_from(row()).unwrap();
        assert_eq!(discount.code.unwrap().as_str(), "SPRING");
        assert_eq!(discount.rule.scope, DiscountScope::General);
        assert_eq!(discount.rule.uses_per_user, UsageLimit::Limited(1));
        assert_eq!(discount.rule.uses_total, UsageLimit::Unlimited);
    }

    #[test]
    fn test_empty_code_means_none() {
        let discount = Discount::try_from(DiscountRow {
            code: String::new(),
            ..row()
        })
        .unwrap();
        assert!(discount.code.is_none());
    }

    #[test]
    fn test_inconsistent_rows_are_corrupt() {
        let both_values = DiscountRow {
            fixed_amount_off: Some(Decimal::new(500, 2)),
            ..row()
        };
        assert!(matches!(
            Discount::try_from(both_values),
            Err(RepositoryError::DataCorruption(_))
        ));

        let scoped_without_retailer = DiscountRow {
            discount_type: "RETAILER_SPECIFIC".to_owned(),
            ..row()
        };
        assert!(matches!(
            Discount::try_from(scoped_without_retailer),
            Err(RepositoryError::DataCorruption(_))
        ));

        let zero_limit = DiscountRow {
            uses_total: 0,
            ..row()
        };
        assert!(matches!(
            Discount::try_from(zero_limit),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_zero_limit_rejected_on_create() {
        assert!(check_limit("uses_total", UsageLimit::Limited(0)).is_err());
        assert!(check_limit("uses_total", UsageLimit::Limited(3)).is_ok());
        assert!(check_limit("uses_total", UsageLimit::Unlimited).is_ok());
    }

    #[test]
    fn test_limit_must_fit_column() {
        let max = u32::try_from(i32::MAX).unwrap();
        assert!(check_limit("uses_per_user", UsageLimit::Limited(max)).is_ok());
        assert!(matches!(
            check_limit("uses_per_user", UsageLimit::Limited(max + 1)),
            Err(RepositoryError::Validation(_))
        ));
    }
}

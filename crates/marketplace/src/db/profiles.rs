//! Profile repository.
//!
//! Every user has exactly one profile carrying marketplace data: phone,
//! merchant flag, account balance and default shipping address.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use raredoor_core::{AddressId, PhoneNumber, ProfileId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Profile;

const PROFILE_COLUMNS: &str = "id, user_id, phone, is_merchant, account_balance, shipping_address_id";

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: ProfileId,
    user_id: UserId,
    phone: String,
    is_merchant: bool,
    account_balance: Decimal,
    shipping_address_id: Option<AddressId>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let phone = if row.phone.is_empty() {
            None
        } else {
            Some(PhoneNumber::parse(&row.phone).map_err(|e| RepositoryError::corrupt("phone", e))?)
        };
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            phone,
            is_merchant: row.is_merchant,
            account_balance: row.account_balance,
            shipping_address_id: row.shipping_address_id,
        })
    }
}

/// Repository for profile database operations.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the profile of a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        profile_for_user(&mut conn, user_id).await
    }

    /// Create the profile of a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has one.
    pub async fn create(
        &self,
        user_id: UserId,
        phone: Option<&PhoneNumber>,
        is_merchant: bool,
    ) -> Result<Profile, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        create_profile(&mut conn, user_id, phone, is_merchant).await
    }

    /// Grant or revoke merchant status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no profile.
    pub async fn set_merchant(&self, user_id: UserId, is_merchant: bool) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE marketplace.profile SET is_merchant = $2 WHERE user_id = $1")
                .bind(user_id)
                .bind(is_merchant)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        info!(user_id = %user_id, is_merchant, "Updated merchant status");
        Ok(())
    }

    /// Set or clear the default shipping address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no profile.
    pub async fn set_shipping_address(
        &self,
        user_id: UserId,
        address_id: Option<AddressId>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE marketplace.profile SET shipping_address_id = $2 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(address_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Add `delta` (which may be negative) to the account balance and return
    /// the new balance.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no profile.
    pub async fn adjust_balance(
        &self,
        user_id: UserId,
        delta: Decimal,
    ) -> Result<Decimal, RepositoryError> {
        let balance: Option<Decimal> = sqlx::query_scalar(
            r"
            UPDATE marketplace.profile
            SET account_balance = account_balance + $2
            WHERE user_id = $1
            RETURNING account_balance
            ",
        )
        .bind(user_id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await?;

        let balance = balance.ok_or(RepositoryError::NotFound)?;
        info!(user_id = %user_id, %delta, %balance, "Adjusted account balance");
        Ok(balance)
    }
}

pub(crate) async fn profile_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Option<Profile>, RepositoryError> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM marketplace.profile WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Profile::try_from).transpose()
}

pub(crate) async fn create_profile(
    conn: &mut PgConnection,
    user_id: UserId,
    phone: Option<&PhoneNumber>,
    is_merchant: bool,
) -> Result<Profile, RepositoryError> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        r"
        INSERT INTO marketplace.profile (user_id, phone, is_merchant)
        VALUES ($1, $2, $3)
        RETURNING {PROFILE_COLUMNS}
        "
    ))
    .bind(user_id)
    .bind(phone.map_or("", PhoneNumber::as_str))
    .bind(is_merchant)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| conflict_on_unique(e, "profile"))?;

    Profile::try_from(row)
}

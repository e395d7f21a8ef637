//! Retailer repository, including the per-retailer order counter.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};
use url::Url;

use raredoor_core::{
    AddressId, ImageId, OrderNumber, OrderPrefix, OrgType, RetailerId, UserId,
};

use super::profiles::profile_for_user;
use super::{RepositoryError, conflict_on_unique};
use crate::models::{NewRetailer, Retailer, RetailerImage};

const RETAILER_COLUMNS: &str = "id, legal_name, short_name, organization_type, owner_id, \
                                address_id, website, commission_fee, transaction_fee, \
                                order_prefix, order_sequence";

#[derive(Debug, sqlx::FromRow)]
struct RetailerRow {
    id: RetailerId,
    legal_name: String,
    short_name: String,
    organization_type: String,
    owner_id: Option<UserId>,
    address_id: Option<AddressId>,
    website: Option<String>,
    commission_fee: Decimal,
    transaction_fee: Decimal,
    order_prefix: String,
    order_sequence: i64,
}

impl TryFrom<RetailerRow> for Retailer {
    type Error = RepositoryError;

    fn try_from(row: RetailerRow) -> Result<Self, Self::Error> {
        let organization_type: OrgType = row
            .organization_type
            .parse()
            .map_err(|e| RepositoryError::corrupt("organization type", e))?;
        let website = row
            .website
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| RepositoryError::corrupt("website", e))?;
        let order_prefix = OrderPrefix::parse(&row.order_prefix)
            .map_err(|e| RepositoryError::corrupt("order prefix", e))?;

        Ok(Self {
            id: row.id,
            legal_name: row.legal_name,
            short_name: row.short_name,
            organization_type,
            owner_id: row.owner_id,
            address_id: row.address_id,
            website,
            commission_fee: row.commission_fee,
            transaction_fee: row.transaction_fee,
            order_prefix,
            order_sequence: row.order_sequence,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RetailerImageRow {
    id: ImageId,
    retailer_id: RetailerId,
    is_main: bool,
    is_logo: bool,
    image: String,
}

impl From<RetailerImageRow> for RetailerImage {
    fn from(row: RetailerImageRow) -> Self {
        Self {
            id: row.id,
            retailer_id: row.retailer_id,
            is_main: row.is_main,
            is_logo: row.is_logo,
            image: row.image,
        }
    }
}

/// Repository for retailers.
pub struct RetailerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RetailerRepository<'a> {
    /// Create a new retailer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a retailer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: RetailerId) -> Result<Option<Retailer>, RepositoryError> {
        let row = sqlx::query_as::<_, RetailerRow>(&format!(
            "SELECT {RETAILER_COLUMNS} FROM marketplace.retailer WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Retailer::try_from).transpose()
    }

    /// Get a retailer by its order prefix.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_prefix(
        &self,
        prefix: &OrderPrefix,
    ) -> Result<Option<Retailer>, RepositoryError> {
        let row = sqlx::query_as::<_, RetailerRow>(&format!(
            "SELECT {RETAILER_COLUMNS} FROM marketplace.retailer WHERE order_prefix = $1"
        ))
        .bind(prefix.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Retailer::try_from).transpose()
    }

    /// Retailers owned by a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_owner(&self, owner_id: UserId) -> Result<Vec<Retailer>, RepositoryError> {
        let rows = sqlx::query_as::<_, RetailerRow>(&format!(
            "SELECT {RETAILER_COLUMNS} FROM marketplace.retailer WHERE owner_id = $1 ORDER BY short_name"
        ))
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Retailer::try_from).collect()
    }

    /// Create a retailer.
    ///
    /// The owner, when given, must have a merchant profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for invalid fields or a
    /// non-merchant owner, and `RepositoryError::Conflict` if the order
    /// prefix is taken.
    #[instrument(skip(self, new), fields(prefix = %new.order_prefix))]
    pub async fn create(&self, new: &NewRetailer) -> Result<Retailer, RepositoryError> {
        new.validate().map_err(RepositoryError::Validation)?;

        let mut tx = self.pool.begin().await?;

        if let Some(owner_id) = new.owner_id {
            let profile = profile_for_user(&mut *tx, owner_id).await?;
            if !profile.is_some_and(|p| p.is_merchant) {
                return Err(RepositoryError::Validation(format!(
                    "retailer owner {owner_id} is not a merchant"
                )));
            }
        }

        let row = sqlx::query_as::<_, RetailerRow>(&format!(
            r"
            INSERT INTO marketplace.retailer
                (id, legal_name, short_name, organization_type, owner_id, address_id,
                 website, commission_fee, transaction_fee, order_prefix)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {RETAILER_COLUMNS}
            "
        ))
        .bind(RetailerId::generate())
        .bind(&new.legal_name)
        .bind(&new.short_name)
        .bind(new.organization_type.as_str())
        .bind(new.owner_id)
        .bind(new.address_id)
        .bind(new.website.as_ref().map(Url::as_str))
        .bind(new.commission_fee)
        .bind(new.transaction_fee)
        .bind(new.order_prefix.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "order prefix"))?;

        tx.commit().await?;

        let retailer = Retailer::try_from(row)?;
        info!(retailer_id = %retailer.id, "Created retailer");
        Ok(retailer)
    }

    /// Attach an image to a retailer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add_image(
        &self,
        retailer_id: RetailerId,
        image: &str,
        is_main: bool,
        is_logo: bool,
    ) -> Result<RetailerImage, RepositoryError> {
        let row = sqlx::query_as::<_, RetailerImageRow>(
            r"
            INSERT INTO marketplace.retailer_image (retailer_id, is_main, is_logo, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id, retailer_id, is_main, is_logo, image
            ",
        )
        .bind(retailer_id)
        .bind(is_main)
        .bind(is_logo)
        .bind(image)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Images of a retailer, main image first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn images(&self, retailer_id: RetailerId) -> Result<Vec<RetailerImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, RetailerImageRow>(
            r"
            SELECT id, retailer_id, is_main, is_logo, image
            FROM marketplace.retailer_image
            WHERE retailer_id = $1
            ORDER BY is_main DESC, id
            ",
        )
        .bind(retailer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Allocate the next order number of a retailer.
///
/// The counter is bumped with a single `UPDATE ... RETURNING`, so two
/// concurrent orders never receive the same number. Call inside the
/// transaction that inserts the order so a rolled-back order also rolls
/// back the counter.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` for an unknown retailer and
/// `RepositoryError::DataCorruption` if the stored prefix is invalid or the
/// number no longer fits the column.
pub(crate) async fn next_order_number(
    conn: &mut PgConnection,
    retailer_id: RetailerId,
) -> Result<OrderNumber, RepositoryError> {
    let row: Option<(String, i64)> = sqlx::query_as(
        r"
        UPDATE marketplace.retailer
        SET order_sequence = order_sequence + 1
        WHERE id = $1
        RETURNING order_prefix, order_sequence
        ",
    )
    .bind(retailer_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (prefix, sequence) = row.ok_or(RepositoryError::NotFound)?;
    let prefix =
        OrderPrefix::parse(&prefix).map_err(|e| RepositoryError::corrupt("order prefix", e))?;
    let number = OrderNumber::new(&prefix, sequence)
        .map_err(|e| RepositoryError::corrupt("order sequence", e))?;

    debug!(retailer_id = %retailer_id, order_number = %number, "Allocated order number");
    Ok(number)
}

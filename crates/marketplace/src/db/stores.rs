//! Store repository and the store/shipper association.

use sqlx::PgPool;
use tracing::info;

use raredoor_core::{RetailerId, ShipperId, StoreId};

use super::{RepositoryError, missing_reference};
use super::shippers::ShipperRow;
use crate::models::{NewStore, Shipper, Store};

const STORE_COLUMNS: &str = "id, retailer_id, store_num, description, is_featured, has_returns";

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    retailer_id: RetailerId,
    store_num: Option<String>,
    description: Option<String>,
    is_featured: bool,
    has_returns: bool,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Self {
            id: row.id,
            retailer_id: row.retailer_id,
            store_num: row.store_num,
            description: row.description,
            is_featured: row.is_featured,
            has_returns: row.has_returns,
        }
    }
}

/// Repository for stores.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a store by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM marketplace.store WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Stores of a retailer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_retailer(
        &self,
        retailer_id: RetailerId,
    ) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM marketplace.store WHERE retailer_id = $1 ORDER BY id"
        ))
        .bind(retailer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` if `store_num` is too long or the
    /// retailer does not exist.
    pub async fn create(&self, new: &NewStore) -> Result<Store, RepositoryError> {
        if new.store_num.as_ref().is_some_and(|n| n.chars().count() > 10) {
            return Err(RepositoryError::Validation(
                "store_num must be at most 10 characters".to_owned(),
            ));
        }

        let row = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            INSERT INTO marketplace.store
                (retailer_id, store_num, description, is_featured, has_returns)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {STORE_COLUMNS}
            "
        ))
        .bind(new.retailer_id)
        .bind(new.store_num.as_deref())
        .bind(new.description.as_deref())
        .bind(new.is_featured)
        .bind(new.has_returns)
        .fetch_one(self.pool)
        .await
        .map_err(|e| missing_reference(e, "retailer"))?;

        let store: Store = row.into();
        info!(store_id = %store.id, retailer_id = %store.retailer_id, "Created store");
        Ok(store)
    }

    /// Link a shipper to a store. Linking twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either side doesn't exist.
    pub async fn add_shipper(&self, store_id: StoreId, shipper_id: ShipperId) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO marketplace.store_shipper (store_id, shipper_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(store_id)
        .bind(shipper_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Unlink a shipper from a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if they were not linked.
    pub async fn remove_shipper(
        &self,
        store_id: StoreId,
        shipper_id: ShipperId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM marketplace.store_shipper WHERE store_id = $1 AND shipper_id = $2",
        )
        .bind(store_id)
        .bind(shipper_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Shippers a store works with.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn shippers(&self, store_id: StoreId) -> Result<Vec<Shipper>, RepositoryError> {
        let rows = sqlx::query_as::<_, ShipperRow>(
            r"
            SELECT s.id, s.name, s.phone, s.email
            FROM marketplace.shipper s
            JOIN marketplace.store_shipper ss ON ss.shipper_id = s.id
            WHERE ss.store_id = $1
            ORDER BY s.name
            ",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Shipper::try_from).collect()
    }
}

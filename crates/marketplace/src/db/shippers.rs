//! Shipper repository.

use sqlx::PgPool;
use tracing::info;

use raredoor_core::{Email, PhoneNumber, ShipperId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{NewShipper, Shipper};

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ShipperRow {
    id: ShipperId,
    name: String,
    phone: String,
    email: String,
}

impl TryFrom<ShipperRow> for Shipper {
    type Error = RepositoryError;

    fn try_from(row: ShipperRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            phone: PhoneNumber::parse(&row.phone).map_err(|e| RepositoryError::corrupt("phone", e))?,
            email: Email::parse(&row.email).map_err(|e| RepositoryError::corrupt("email", e))?,
        })
    }
}

/// Repository for shippers.
pub struct ShipperRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShipperRepository<'a> {
    /// Create a new shipper repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a shipper by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ShipperId) -> Result<Option<Shipper>, RepositoryError> {
        let row = sqlx::query_as::<_, ShipperRow>(
            "SELECT id, name, phone, email FROM marketplace.shipper WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Shipper::try_from).transpose()
    }

    /// All shippers by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Shipper>, RepositoryError> {
        let rows = sqlx::query_as::<_, ShipperRow>(
            "SELECT id, name, phone, email FROM marketplace.shipper ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Shipper::try_from).collect()
    }

    /// Create a shipper.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name or email is taken.
    pub async fn create(&self, new: &NewShipper) -> Result<Shipper, RepositoryError> {
        if new.name.trim().is_empty() || new.name.chars().count() > 100 {
            return Err(RepositoryError::Validation(
                "shipper name must be 1-100 characters".to_owned(),
            ));
        }

        let row = sqlx::query_as::<_, ShipperRow>(
            r"
            INSERT INTO marketplace.shipper (name, phone, email)
            VALUES ($1, $2, $3)
            RETURNING id, name, phone, email
            ",
        )
        .bind(&new.name)
        .bind(new.phone.as_str())
        .bind(new.email.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "shipper"))?;

        let shipper = Shipper::try_from(row)?;
        info!(shipper_id = %shipper.id, name = %shipper.name, "Created shipper");
        Ok(shipper)
    }
}

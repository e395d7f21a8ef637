//! Postal address repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use raredoor_core::{AddressId, GeoPoint, StateCode, ZipCode};

use super::RepositoryError;
use crate::models::{NewAddress, PostalAddress};

const ADDRESS_COLUMNS: &str = "id, street, street2, city, state, zipcd, phone, lat, lng, \
                               neighborhood, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    street: String,
    street2: Option<String>,
    city: String,
    state: String,
    zipcd: String,
    phone: String,
    lat: Option<f64>,
    lng: Option<f64>,
    neighborhood: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AddressRow> for PostalAddress {
    type Error = RepositoryError;

    fn try_from(row: AddressRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            street: row.street,
            street2: row.street2,
            city: row.city,
            state: StateCode::parse(&row.state).map_err(|e| RepositoryError::corrupt("state", e))?,
            zipcd: ZipCode::parse(&row.zipcd).map_err(|e| RepositoryError::corrupt("zip code", e))?,
            phone: row.phone,
            location: GeoPoint::from_columns(row.lat, row.lng)
                .map_err(|e| RepositoryError::corrupt("geocode", e))?,
            neighborhood: row.neighborhood,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for postal addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an address by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AddressId) -> Result<Option<PostalAddress>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM marketplace.postal_address WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(PostalAddress::try_from).transpose()
    }

    /// Store a new address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` if a field is too long.
    pub async fn create(&self, address: &NewAddress) -> Result<PostalAddress, RepositoryError> {
        address.validate().map_err(RepositoryError::Validation)?;

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO marketplace.postal_address
                (id, street, street2, city, state, zipcd, phone, lat, lng, neighborhood)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(AddressId::generate())
        .bind(&address.street)
        .bind(address.street2.as_deref())
        .bind(&address.city)
        .bind(address.state.as_str())
        .bind(address.zipcd.as_str())
        .bind(&address.phone)
        .bind(address.location.map(|p| p.lat()))
        .bind(address.location.map(|p| p.lng()))
        .bind(&address.neighborhood)
        .fetch_one(self.pool)
        .await?;

        let address = PostalAddress::try_from(row)?;
        debug!(address_id = %address.id, "Created postal address");
        Ok(address)
    }

    /// Set or clear the geocode of an address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't exist.
    pub async fn set_location(
        &self,
        id: AddressId,
        location: Option<GeoPoint>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.postal_address
            SET lat = $2, lng = $3, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(location.map(|p| p.lat()))
        .bind(location.map(|p| p.lng()))
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

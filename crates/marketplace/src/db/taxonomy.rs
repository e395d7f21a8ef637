//! Taxonomy tables and product tagging.
//!
//! The eight taxonomy tables share one shape (`id`, unique `name`), so a
//! single repository serves all of them, keyed by [`Taxonomy`]. Table names
//! come from the enum, never from input.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};

use raredoor_core::{ProductId, ShippingCharge, TaxonomyId};

use super::RepositoryError;
use crate::models::TaxonomyTerm;

/// Longest allowed term.
pub const MAX_TERM_LENGTH: usize = 55;

/// One of the product classification tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Taxonomy {
    Segment,
    Style,
    FurnitureType,
    ValueTier,
    Category,
    Subcategory,
    Color,
    Material,
}

impl Taxonomy {
    /// Every taxonomy, in seeding order.
    pub const ALL: [Self; 8] = [
        Self::Segment,
        Self::Style,
        Self::FurnitureType,
        Self::ValueTier,
        Self::Category,
        Self::Subcategory,
        Self::Color,
        Self::Material,
    ];

    /// Table holding the terms.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Segment => "segment",
            Self::Style => "style",
            Self::FurnitureType => "furniture_type",
            Self::ValueTier => "value_tier",
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::Color => "color",
            Self::Material => "material",
        }
    }

    /// Table linking products to terms. Value tiers are not linked to
    /// products.
    #[must_use]
    pub const fn link_table(self) -> Option<&'static str> {
        match self {
            Self::Segment => Some("product_segment"),
            Self::Style => Some("product_style"),
            Self::FurnitureType => Some("product_furniture_type"),
            Self::ValueTier => None,
            Self::Category => Some("product_category"),
            Self::Subcategory => Some("product_subcategory"),
            Self::Color => Some("product_color"),
            Self::Material => Some("product_material"),
        }
    }

    /// Foreign-key column of the link table.
    #[must_use]
    pub const fn link_column(self) -> &'static str {
        match self {
            Self::Segment => "segment_id",
            Self::Style => "style_id",
            Self::FurnitureType => "furniture_type_id",
            Self::ValueTier => "value_tier_id",
            Self::Category => "category_id",
            Self::Subcategory => "subcategory_id",
            Self::Color => "color_id",
            Self::Material => "material_id",
        }
    }

    /// Plural key used in seed files.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Segment => "segments",
            Self::Style => "styles",
            Self::FurnitureType => "furniture_types",
            Self::ValueTier => "value_tiers",
            Self::Category => "categories",
            Self::Subcategory => "subcategories",
            Self::Color => "colors",
            Self::Material => "materials",
        }
    }

    fn linked(self) -> Result<&'static str, RepositoryError> {
        self.link_table().ok_or_else(|| {
            RepositoryError::Validation(format!("{self} terms are not linked to products"))
        })
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for Taxonomy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.table() == s || t.plural() == s)
            .ok_or_else(|| format!("unknown taxonomy: {s:?}"))
    }
}

fn check_term(name: &str) -> Result<&str, RepositoryError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_TERM_LENGTH {
        return Err(RepositoryError::Validation(format!(
            "taxonomy terms must be 1-{MAX_TERM_LENGTH} characters: {name:?}"
        )));
    }
    Ok(name)
}

#[derive(Debug, sqlx::FromRow)]
struct TermRow {
    id: TaxonomyId,
    name: String,
}

impl From<TermRow> for TaxonomyTerm {
    fn from(row: TermRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

/// Repository for the taxonomy tables.
pub struct TaxonomyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TaxonomyRepository<'a> {
    /// Create a new taxonomy repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a term, or return the existing one with that name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for blank or over-long names.
    #[instrument(skip(self))]
    pub async fn upsert(&self, taxonomy: Taxonomy, name: &str) -> Result<TaxonomyTerm, RepositoryError> {
        let name = check_term(name)?;
        let table = taxonomy.table();

        let row = sqlx::query_as::<_, TermRow>(&format!(
            r"
            INSERT INTO marketplace.{table} (name)
            VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name
            "
        ))
        .bind(name)
        .fetch_one(self.pool)
        .await?;

        debug!(id = %row.id, "Upserted taxonomy term");
        Ok(row.into())
    }

    /// Upsert a furniture type with its `is_furniture` flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for blank or over-long names.
    pub async fn upsert_furniture_type(
        &self,
        name: &str,
        is_furniture: bool,
    ) -> Result<TaxonomyTerm, RepositoryError> {
        let name = check_term(name)?;

        let row = sqlx::query_as::<_, TermRow>(
            r"
            INSERT INTO marketplace.furniture_type (name, is_furniture)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET is_furniture = EXCLUDED.is_furniture
            RETURNING id, name
            ",
        )
        .bind(name)
        .bind(is_furniture)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Upsert a subcategory with its trial flag and shipping charge.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for blank or over-long names.
    pub async fn upsert_subcategory(
        &self,
        name: &str,
        trial_product: bool,
        shipping_charge: Option<ShippingCharge>,
    ) -> Result<TaxonomyTerm, RepositoryError> {
        let name = check_term(name)?;

        let row = sqlx::query_as::<_, TermRow>(
            r"
            INSERT INTO marketplace.subcategory (name, trial_product, shipping_charge)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
                SET trial_product = EXCLUDED.trial_product,
                    shipping_charge = EXCLUDED.shipping_charge
            RETURNING id, name
            ",
        )
        .bind(name)
        .bind(trial_product)
        .bind(shipping_charge.map(ShippingCharge::amount))
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// All terms of a taxonomy, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, taxonomy: Taxonomy) -> Result<Vec<TaxonomyTerm>, RepositoryError> {
        let table = taxonomy.table();
        let rows = sqlx::query_as::<_, TermRow>(&format!(
            "SELECT id, name FROM marketplace.{table} ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Find a term by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(
        &self,
        taxonomy: Taxonomy,
        name: &str,
    ) -> Result<Option<TaxonomyTerm>, RepositoryError> {
        let table = taxonomy.table();
        let row = sqlx::query_as::<_, TermRow>(&format!(
            "SELECT id, name FROM marketplace.{table} WHERE name = $1"
        ))
        .bind(name.trim())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Tag a product with a term. Tagging twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for value tiers, which are not
    /// linked to products.
    pub async fn tag_product(
        &self,
        product_id: ProductId,
        taxonomy: Taxonomy,
        term_id: TaxonomyId,
    ) -> Result<(), RepositoryError> {
        let link = taxonomy.linked()?;
        let column = taxonomy.link_column();

        sqlx::query(&format!(
            r"
            INSERT INTO marketplace.{link} (product_id, {column})
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "
        ))
        .bind(product_id)
        .bind(term_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove a tag from a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product was not tagged.
    pub async fn untag_product(
        &self,
        product_id: ProductId,
        taxonomy: Taxonomy,
        term_id: TaxonomyId,
    ) -> Result<(), RepositoryError> {
        let link = taxonomy.linked()?;
        let column = taxonomy.link_column();

        let result = sqlx::query(&format!(
            "DELETE FROM marketplace.{link} WHERE product_id = $1 AND {column} = $2"
        ))
        .bind(product_id)
        .bind(term_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Terms a product is tagged with.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for value tiers.
    pub async fn terms_for_product(
        &self,
        product_id: ProductId,
        taxonomy: Taxonomy,
    ) -> Result<Vec<TaxonomyTerm>, RepositoryError> {
        let link = taxonomy.linked()?;
        let column = taxonomy.link_column();
        let table = taxonomy.table();

        let rows = sqlx::query_as::<_, TermRow>(&format!(
            r"
            SELECT t.id, t.name
            FROM marketplace.{table} t
            JOIN marketplace.{link} l ON l.{column} = t.id
            WHERE l.product_id = $1
            ORDER BY t.name
            "
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Whether any of the product's subcategories offers a trial.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_trial(&self, product_id: ProductId) -> Result<bool, RepositoryError> {
        let has_trial: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS(
                SELECT 1
                FROM marketplace.product_subcategory ps
                JOIN marketplace.subcategory s ON s.id = ps.subcategory_id
                WHERE ps.product_id = $1 AND s.trial_product
            )
            ",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(has_trial)
    }

    /// The highest flat shipping charge among the product's subcategories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if a stored charge is not
    /// one of the allowed amounts.
    pub async fn shipping_charge(
        &self,
        product_id: ProductId,
    ) -> Result<Option<ShippingCharge>, RepositoryError> {
        let amount: Option<Decimal> = sqlx::query_scalar(
            r"
            SELECT MAX(s.shipping_charge)
            FROM marketplace.product_subcategory ps
            JOIN marketplace.subcategory s ON s.id = ps.subcategory_id
            WHERE ps.product_id = $1
            ",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        amount
            .map(ShippingCharge::from_amount)
            .transpose()
            .map_err(|e| RepositoryError::corrupt("shipping charge", e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_from_str() {
        assert_eq!("styles".parse::<Taxonomy>().unwrap(), Taxonomy::Style);
        assert_eq!(
            "furniture_type".parse::<Taxonomy>().unwrap(),
            Taxonomy::FurnitureType
        );
        assert!("finishes".parse::<Taxonomy>().is_err());
    }

    #[test]
    fn test_value_tier_has_no_link_table() {
        assert_eq!(Taxonomy::ValueTier.link_table(), None);
        assert!(matches!(
            Taxonomy::ValueTier.linked(),
            Err(RepositoryError::Validation(_))
        ));
        for taxonomy in Taxonomy::ALL {
            if taxonomy != Taxonomy::ValueTier {
                assert!(taxonomy.link_table().unwrap().ends_with(taxonomy.table()));
            }
        }
    }

    #[test]
    fn test_check_term() {
        assert_eq!(check_term("  walnut ").unwrap(), "walnut");
        assert!(check_term("   ").is_err());
        assert!(check_term(&"x".repeat(MAX_TERM_LENGTH + 1)).is_err());
    }
}

//! Seed the taxonomy tables from a YAML file.
//!
//! ```yaml
//! segments: [Living Room, Bedroom]
//! styles: [Mid-Century, Industrial]
//! furniture_types:
//!   - name: Sofa
//!   - name: Rug
//!     is_furniture: false
//! value_tiers: [Vintage, Designer]
//! categories: [Seating, Lighting]
//! subcategories:
//!   - name: Floor Lamps
//!     shipping_charge: 20
//!   - name: Sample Swatches
//!     trial_product: true
//!     shipping_charge: 5
//! colors: [Walnut, Black]
//! materials: [Teak, Leather]
//! ```
//!
//! Upserts are idempotent: running the same file twice changes nothing.

use std::path::Path;

use raredoor_core::ShippingCharge;
use raredoor_marketplace::db::taxonomy::MAX_TERM_LENGTH;
use raredoor_marketplace::db::{Taxonomy, TaxonomyRepository};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

/// Contents of a taxonomy seed file. Every list is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaxonomySeed {
    pub segments: Vec<String>,
    pub styles: Vec<String>,
    pub furniture_types: Vec<FurnitureTypeSeed>,
    pub value_tiers: Vec<String>,
    pub categories: Vec<String>,
    pub subcategories: Vec<SubcategorySeed>,
    pub colors: Vec<String>,
    pub materials: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FurnitureTypeSeed {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_furniture: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubcategorySeed {
    pub name: String,
    #[serde(default)]
    pub trial_product: bool,
    /// One of 5, 20 or 50.
    pub shipping_charge: Option<Decimal>,
}

const fn default_true() -> bool {
    true
}

impl TaxonomySeed {
    /// The plain-name lists, paired with their taxonomy.
    fn simple_lists(&self) -> [(Taxonomy, &[String]); 6] {
        [
            (Taxonomy::Segment, self.segments.as_slice()),
            (Taxonomy::Style, self.styles.as_slice()),
            (Taxonomy::ValueTier, self.value_tiers.as_slice()),
            (Taxonomy::Category, self.categories.as_slice()),
            (Taxonomy::Color, self.colors.as_slice()),
            (Taxonomy::Material, self.materials.as_slice()),
        ]
    }

    /// Total number of terms in the file.
    fn term_count(&self) -> usize {
        self.simple_lists().iter().map(|(_, names)| names.len()).sum::<usize>()
            + self.furniture_types.len()
            + self.subcategories.len()
    }
}

/// Check every entry; returns one message per problem.
fn validate_seed(seed: &TaxonomySeed) -> Vec<String> {
    let mut errors = Vec::new();

    let mut check_name = |taxonomy: Taxonomy, name: &str| {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            errors.push(format!("{}: blank name", taxonomy.plural()));
        } else if trimmed.chars().count() > MAX_TERM_LENGTH {
            errors.push(format!(
                "{}: {trimmed:?} is longer than {MAX_TERM_LENGTH} characters",
                taxonomy.plural()
            ));
        }
    };

    for (taxonomy, names) in seed.simple_lists() {
        for name in names {
            check_name(taxonomy, name);
        }
    }
    for entry in &seed.furniture_types {
        check_name(Taxonomy::FurnitureType, &entry.name);
    }
    for entry in &seed.subcategories {
        check_name(Taxonomy::Subcategory, &entry.name);
    }

    for entry in &seed.subcategories {
        if let Some(amount) = entry.shipping_charge
            && ShippingCharge::from_amount(amount).is_err()
        {
            errors.push(format!(
                "subcategories: {:?} has shipping charge {amount}; allowed: 5, 20, 50",
                entry.name
            ));
        }
    }

    errors
}

/// Upsert taxonomy terms from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, any entry is
/// invalid, or database operations fail.
pub async fn taxonomy(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading taxonomy from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: TaxonomySeed = serde_yaml::from_str(&content)?;

    info!(terms = seed.term_count(), "Parsed taxonomy file");

    let errors = validate_seed(&seed);
    if !errors.is_empty() {
        error!("Taxonomy validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let (_, pool) = super::connect().await?;
    let repo = TaxonomyRepository::new(&pool);

    for (taxonomy, names) in seed.simple_lists() {
        for name in names {
            repo.upsert(taxonomy, name).await?;
        }
        info!("  {}: {}", taxonomy.plural(), names.len());
    }

    for entry in &seed.furniture_types {
        repo.upsert_furniture_type(&entry.name, entry.is_furniture)
            .await?;
    }
    info!("  furniture_types: {}", seed.furniture_types.len());

    for entry in &seed.subcategories {
        let charge = entry
            .shipping_charge
            .map(ShippingCharge::from_amount)
            .transpose()?;
        repo.upsert_subcategory(&entry.name, entry.trial_product, charge)
            .await?;
    }
    info!("  subcategories: {}", seed.subcategories.len());

    info!("Taxonomy seeding complete!");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
segments: [Living Room, Bedroom]
furniture_types:
  - name: Sofa
  - name: Rug
    is_furniture: false
subcategories:
  - name: Floor Lamps
    shipping_charge: 20
  - name: Sample Swatches
    trial_product: true
colors: [Walnut]
";

    #[test]
    fn test_parse_sample() {
        let seed: TaxonomySeed = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(seed.segments, vec!["Living Room", "Bedroom"]);
        assert!(seed.styles.is_empty());
        assert!(seed.furniture_types[0].is_furniture);
        assert!(!seed.furniture_types[1].is_furniture);
        assert_eq!(
            seed.subcategories[0].shipping_charge,
            Some(Decimal::new(20, 0))
        );
        assert!(seed.subcategories[1].trial_product);
        assert_eq!(seed.term_count(), 7);
        assert!(validate_seed(&seed).is_empty());
    }

    #[test]
    fn test_unknown_list_rejected() {
        let result: Result<TaxonomySeed, _> = serde_yaml::from_str("finishes: [Matte]");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_errors() {
        let seed = TaxonomySeed {
            colors: vec!["  ".to_owned(), "x".repeat(56)],
            subcategories: vec![SubcategorySeed {
                name: "Chairs".to_owned(),
                trial_product: false,
                shipping_charge: Some(Decimal::new(35, 0)),
            }],
            ..TaxonomySeed::default()
        };

        let errors = validate_seed(&seed);
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0], "colors: blank name");
        assert!(errors[1].contains("longer than 55"));
        assert!(errors[2].contains("shipping charge 35"));
    }
}

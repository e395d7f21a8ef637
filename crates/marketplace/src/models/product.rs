//! Products, their images and taxonomy terms.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use raredoor_core::{
    Availability, GeoPoint, ImageId, Price, ProductId, Slug, StoreId, TaxonomyId,
};

use super::account::check_len;

/// Width, depth and height in inches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: Option<Decimal>,
    pub depth: Option<Decimal>,
    pub height: Option<Decimal>,
}

impl Dimensions {
    /// Whether any of the three measurements is set.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        self.width.is_some() || self.depth.is_some() || self.height.is_some()
    }
}

/// A piece of furniture listed by a store.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub manufacturer: Option<String>,
    pub manufacturer_sku: Option<String>,
    pub upc: Option<String>,

    pub short_name: String,
    pub slug: Slug,
    pub original_price: Price,
    pub current_price: Price,
    pub description: Option<String>,
    pub store_id: StoreId,
    pub units: i32,
    pub url: Option<String>,
    /// Offers below this are rejected.
    pub minimum_offer_price: Option<Price>,

    pub shipping_dimensions: Dimensions,
    pub dimensions: Dimensions,
    pub seat_height: Option<Decimal>,
    pub diameter: Option<Decimal>,
    pub bed_size: Option<String>,
    pub weight: Option<Decimal>,
    pub color_description: Option<String>,
    pub material_description: Option<String>,
    /// Whitespace or comma separated words.
    pub tags: Option<String>,
    pub is_custom: bool,
    pub is_floor_model: bool,

    pub added_date: DateTime<Utc>,
    pub pub_date: Option<DateTime<Utc>>,
    /// Published/sold/reserved flags and the shelf-life countdown.
    pub availability: Availability,
    pub is_featured: bool,
    pub is_recent: bool,
    pub is_landing: bool,
    pub location: Option<GeoPoint>,
    pub md5_order: Option<String>,
    pub click_count: i32,
    pub display_score: i32,
    pub the_hunt: bool,
}

impl Product {
    /// The individual tag words.
    #[must_use]
    pub fn tag_words(&self) -> Vec<&str> {
        self.tags.as_deref().map(split_tags).unwrap_or_default()
    }

    /// Percentage taken off the original price, rounded down.
    #[must_use]
    pub fn markdown_percent(&self) -> Decimal {
        markdown_percent(self.original_price, self.current_price)
    }
}

fn split_tags(tags: &str) -> Vec<&str> {
    tags.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect()
}

fn markdown_percent(original: Price, current: Price) -> Decimal {
    if original.is_zero() || current >= original {
        return Decimal::ZERO;
    }
    let original = original.amount();
    ((original - current.amount()) * Decimal::ONE_HUNDRED / original).floor()
}

/// Input for listing a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub store_id: StoreId,
    pub short_name: String,
    /// Derived from `short_name` when not given.
    pub slug: Option<Slug>,
    pub original_price: Price,
    pub current_price: Price,
    pub minimum_offer_price: Option<Price>,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    pub manufacturer_sku: Option<String>,
    pub upc: Option<String>,
    pub units: u32,
    pub url: Option<String>,
    pub shipping_dimensions: Dimensions,
    pub dimensions: Dimensions,
    pub seat_height: Option<Decimal>,
    pub diameter: Option<Decimal>,
    pub bed_size: Option<String>,
    pub weight: Option<Decimal>,
    pub color_description: Option<String>,
    pub material_description: Option<String>,
    pub tags: Option<String>,
    pub is_custom: bool,
    pub is_floor_model: bool,
    pub location: Option<GeoPoint>,
}

impl NewProduct {
    /// A single-unit product with only the required fields set.
    #[must_use]
    pub const fn new(store_id: StoreId, short_name: String, price: Price) -> Self {
        Self {
            store_id,
            short_name,
            slug: None,
            original_price: price,
            current_price: price,
            minimum_offer_price: None,
            description: None,
            manufacturer: None,
            manufacturer_sku: None,
            upc: None,
            units: 1,
            url: None,
            shipping_dimensions: Dimensions {
                width: None,
                depth: None,
                height: None,
            },
            dimensions: Dimensions {
                width: None,
                depth: None,
                height: None,
            },
            seat_height: None,
            diameter: None,
            bed_size: None,
            weight: None,
            color_description: None,
            material_description: None,
            tags: None,
            is_custom: false,
            is_floor_model: false,
            location: None,
        }
    }

    /// Check column widths, measurement ranges, the UPC and the unit count.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        check_len("short_name", &self.short_name, 100, true)?;
        for (field, value, max) in [
            ("manufacturer", &self.manufacturer, 100),
            ("manufacturer_sku", &self.manufacturer_sku, 100),
            ("color_description", &self.color_description, 100),
            ("material_description", &self.material_description, 255),
        ] {
            if let Some(value) = value {
                check_len(field, value, max, false)?;
            }
        }
        if let Some(upc) = &self.upc
            && (upc.len() > 12 || !upc.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(format!("upc must be at most 12 digits: {upc:?}"));
        }
        if let Some(url) = &self.url {
            check_len("url", url, 255, false)?;
        }
        if let Some(bed_size) = &self.bed_size {
            check_len("bed_size", bed_size, 50, false)?;
        }
        if self.units == 0 || i32::try_from(self.units).is_err() {
            return Err(format!("units must be between 1 and {}", i32::MAX));
        }

        for (field, value) in [
            ("shipping_width", self.shipping_dimensions.width),
            ("shipping_depth", self.shipping_dimensions.depth),
            ("shipping_height", self.shipping_dimensions.height),
            ("width", self.dimensions.width),
            ("depth", self.dimensions.depth),
            ("height", self.dimensions.height),
            ("seat_height", self.seat_height),
            ("diameter", self.diameter),
        ] {
            check_measure(field, value, MAX_MEASURE, 2)?;
        }
        check_measure("weight", self.weight, MAX_WEIGHT, 1)
    }
}

/// Largest value of a `NUMERIC(6, 2)` measurement column.
const MAX_MEASURE: Decimal = Decimal::from_parts(999_999, 0, 0, false, 2);

/// Largest value of the `NUMERIC(5, 1)` weight column.
const MAX_WEIGHT: Decimal = Decimal::from_parts(99_999, 0, 0, false, 1);

/// A measurement must be non-negative and fit its column once rounded to
/// the column's scale.
fn check_measure(field: &str, value: Option<Decimal>, max: Decimal, scale: u32) -> Result<(), String> {
    let Some(value) = value else {
        return Ok(());
    };
    let stored = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    if value.is_sign_negative() || stored > max {
        return Err(format!("{field} must be between 0 and {max}, got {value}"));
    }
    Ok(())
}

/// A product photo.
#[derive(Debug, Clone)]
pub struct ProductImage {
    pub id: ImageId,
    pub product_id: ProductId,
    pub is_main: bool,
    /// Public id of the image on the image host.
    pub image: String,
}

/// One row of a taxonomy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyTerm {
    pub id: TaxonomyId,
    pub name: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_product() -> NewProduct {
        NewProduct::new(
            StoreId::new(1),
            "Walnut credenza".to_owned(),
            Price::from_cents(120_000).unwrap(),
        )
    }

    #[test]
    fn test_new_product_validation() {
        assert!(new_product().validate().is_ok());

        let bad_upc = NewProduct {
            upc: Some("12345-67".to_owned()),
            ..new_product()
        };
        assert!(bad_upc.validate().unwrap_err().starts_with("upc"));

        let no_units = NewProduct {
            units: 0,
            ..new_product()
        };
        assert!(no_units.validate().unwrap_err().starts_with("units"));
    }

    #[test]
    fn test_text_widths() {
        let long_maker = NewProduct {
            manufacturer: Some("x".repeat(101)),
            ..new_product()
        };
        assert!(long_maker.validate().unwrap_err().starts_with("manufacturer "));

        let long_sku = NewProduct {
            manufacturer_sku: Some("x".repeat(101)),
            ..new_product()
        };
        assert!(long_sku.validate().unwrap_err().starts_with("manufacturer_sku"));

        let long_color = NewProduct {
            color_description: Some("x".repeat(101)),
            ..new_product()
        };
        assert!(long_color.validate().unwrap_err().starts_with("color_description"));

        let material = NewProduct {
            material_description: Some("x".repeat(255)),
            ..new_product()
        };
        assert!(material.validate().is_ok());
        let long_material = NewProduct {
            material_description: Some("x".repeat(256)),
            ..new_product()
        };
        assert!(long_material.validate().unwrap_err().starts_with("material_description"));
    }

    #[test]
    fn test_measurement_ranges() {
        let fits = NewProduct {
            dimensions: Dimensions {
                width: Some(Decimal::new(999_999, 2)),
                depth: Some(Decimal::new(305, 1)),
                height: None,
            },
            weight: Some(Decimal::new(99_999, 1)),
            ..new_product()
        };
        assert!(fits.validate().is_ok());

        let too_wide = NewProduct {
            shipping_dimensions: Dimensions {
                width: Some(Decimal::new(10_000, 0)),
                ..Dimensions::default()
            },
            ..new_product()
        };
        assert!(too_wide.validate().unwrap_err().starts_with("shipping_width"));

        // 9999.995 rounds up to 10000.00
        let rounds_over = NewProduct {
            diameter: Some(Decimal::new(9_999_995, 3)),
            ..new_product()
        };
        assert!(rounds_over.validate().unwrap_err().starts_with("diameter"));

        let negative = NewProduct {
            seat_height: Some(Decimal::new(-1, 0)),
            ..new_product()
        };
        assert!(negative.validate().unwrap_err().starts_with("seat_height"));

        let heavy = NewProduct {
            weight: Some(Decimal::new(10_000, 0)),
            ..new_product()
        };
        assert!(heavy.validate().unwrap_err().starts_with("weight"));
    }

    #[test]
    fn test_split_tags() {
        assert_eq!(
            split_tags("mid-century, walnut  teak,,danish"),
            vec!["mid-century", "walnut", "teak", "danish"]
        );
        assert!(split_tags(" , ").is_empty());
    }

    #[test]
    fn test_markdown_percent() {
        let p = |c| Price::from_cents(c).unwrap();
        assert_eq!(markdown_percent(p(10000), p(6700)), Decimal::new(33, 0));
        assert_eq!(markdown_percent(p(10000), p(10000)), Decimal::ZERO);
        assert_eq!(markdown_percent(Price::ZERO, p(500)), Decimal::ZERO);
    }

    #[test]
    fn test_dimensions_known() {
        assert!(!Dimensions::default().is_known());
        let d = Dimensions {
            height: Some(Decimal::new(3050, 2)),
            ..Dimensions::default()
        };
        assert!(d.is_known());
    }
}

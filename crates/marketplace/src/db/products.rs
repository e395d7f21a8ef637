//! Product repository.
//!
//! Besides plain CRUD this module owns the two bulk updates that keep the
//! catalog fresh (shelf-life decay) and the row-level helpers checkout and
//! offers use inside their transactions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};

use raredoor_core::{
    Availability, GeoPoint, ImageId, Price, ProductId, RetailerId, ShelfLife, Slug, StoreId,
};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{Dimensions, NewProduct, Product, ProductImage};

const PRODUCT_COLUMNS: &str = "id, created_at, updated_at, manufacturer, manufacturer_sku, upc, \
    short_name, slug, original_price, current_price, description, store_id, units, url, \
    minimum_offer_price, shipping_width, shipping_depth, shipping_height, width, depth, height, \
    seat_height, diameter, bed_size, weight, color_description, material_description, tags, \
    is_custom, is_floor_model, added_date, pub_date, is_sold, is_reserved, is_published, \
    is_featured, is_recent, hours_left, is_landing, lat, lng, md5_order, click_count, \
    display_score, the_hunt";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    manufacturer: Option<String>,
    manufacturer_sku: Option<String>,
    upc: Option<String>,
    short_name: String,
    slug: String,
    original_price: Price,
    current_price: Price,
    description: Option<String>,
    store_id: StoreId,
    units: i32,
    url: Option<String>,
    minimum_offer_price: Option<Price>,
    shipping_width: Option<Decimal>,
    shipping_depth: Option<Decimal>,
    shipping_height: Option<Decimal>,
    width: Option<Decimal>,
    depth: Option<Decimal>,
    height: Option<Decimal>,
    seat_height: Option<Decimal>,
    diameter: Option<Decimal>,
    bed_size: Option<String>,
    weight: Option<Decimal>,
    color_description: Option<String>,
    material_description: Option<String>,
    tags: Option<String>,
    is_custom: bool,
    is_floor_model: bool,
    added_date: DateTime<Utc>,
    pub_date: Option<DateTime<Utc>>,
    is_sold: bool,
    is_reserved: bool,
    is_published: bool,
    is_featured: bool,
    is_recent: bool,
    hours_left: Option<i32>,
    is_landing: bool,
    lat: Option<f64>,
    lng: Option<f64>,
    md5_order: Option<String>,
    click_count: i32,
    display_score: i32,
    the_hunt: bool,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&row.slug).map_err(|e| RepositoryError::corrupt("slug", e))?;
        let location = GeoPoint::from_columns(row.lat, row.lng)
            .map_err(|e| RepositoryError::corrupt("geocode", e))?;

        Ok(Self {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            manufacturer: row.manufacturer,
            manufacturer_sku: row.manufacturer_sku,
            upc: row.upc,
            short_name: row.short_name,
            slug,
            original_price: row.original_price,
            current_price: row.current_price,
            description: row.description,
            store_id: row.store_id,
            units: row.units,
            url: row.url,
            minimum_offer_price: row.minimum_offer_price,
            shipping_dimensions: Dimensions {
                width: row.shipping_width,
                depth: row.shipping_depth,
                height: row.shipping_height,
            },
            dimensions: Dimensions {
                width: row.width,
                depth: row.depth,
                height: row.height,
            },
            seat_height: row.seat_height,
            diameter: row.diameter,
            bed_size: row.bed_size,
            weight: row.weight,
            color_description: row.color_description,
            material_description: row.material_description,
            tags: row.tags,
            is_custom: row.is_custom,
            is_floor_model: row.is_floor_model,
            added_date: row.added_date,
            pub_date: row.pub_date,
            availability: Availability {
                is_published: row.is_published,
                is_sold: row.is_sold,
                is_reserved: row.is_reserved,
                hours_left: row.hours_left,
            },
            is_featured: row.is_featured,
            is_recent: row.is_recent,
            is_landing: row.is_landing,
            location,
            md5_order: row.md5_order,
            click_count: row.click_count,
            display_score: row.display_score,
            the_hunt: row.the_hunt,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductImageRow {
    id: ImageId,
    product_id: ProductId,
    is_main: bool,
    image: String,
}

impl From<ProductImageRow> for ProductImage {
    fn from(row: ProductImageRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            is_main: row.is_main,
            image: row.image,
        }
    }
}

/// What checkout and offers need to know about a product.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SaleableProduct {
    pub id: ProductId,
    pub retailer_id: RetailerId,
    pub current_price: Price,
    pub minimum_offer_price: Option<Price>,
    pub units: i32,
    pub is_published: bool,
    pub is_sold: bool,
    pub is_reserved: bool,
    pub hours_left: Option<i32>,
}

impl SaleableProduct {
    pub(crate) const fn availability(&self) -> Availability {
        Availability {
            is_published: self.is_published,
            is_sold: self.is_sold,
            is_reserved: self.is_reserved,
            hours_left: self.hours_left,
        }
    }
}

/// Repository for products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM marketplace.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &Slug) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM marketplace.product WHERE slug = $1"
        ))
        .bind(slug.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// List a new product, unpublished, with the policy's full shelf life.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for invalid fields and
    /// `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, new), fields(store_id = %new.store_id))]
    pub async fn create(
        &self,
        new: &NewProduct,
        shelf_life: ShelfLife,
    ) -> Result<Product, RepositoryError> {
        new.validate().map_err(RepositoryError::Validation)?;
        let slug = match &new.slug {
            Some(slug) => slug.clone(),
            None => Slug::slugify(&new.short_name)
                .map_err(|e| RepositoryError::Validation(e.to_string()))?,
        };
        let units = i32::try_from(new.units)
            .map_err(|_| RepositoryError::Validation("units out of range".to_owned()))?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO marketplace.product (
                id, manufacturer, manufacturer_sku, upc, short_name, slug,
                original_price, current_price, description, store_id, units, url,
                minimum_offer_price, shipping_width, shipping_depth, shipping_height,
                width, depth, height, seat_height, diameter, bed_size, weight,
                color_description, material_description, tags, is_custom, is_floor_model,
                hours_left, lat, lng
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31
            )
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(ProductId::generate())
        .bind(new.manufacturer.as_deref())
        .bind(new.manufacturer_sku.as_deref())
        .bind(new.upc.as_deref())
        .bind(&new.short_name)
        .bind(slug.as_str())
        .bind(new.original_price)
        .bind(new.current_price)
        .bind(new.description.as_deref())
        .bind(new.store_id)
        .bind(units)
        .bind(new.url.as_deref())
        .bind(new.minimum_offer_price)
        .bind(new.shipping_dimensions.width)
        .bind(new.shipping_dimensions.depth)
        .bind(new.shipping_dimensions.height)
        .bind(new.dimensions.width)
        .bind(new.dimensions.depth)
        .bind(new.dimensions.height)
        .bind(new.seat_height)
        .bind(new.diameter)
        .bind(new.bed_size.as_deref())
        .bind(new.weight)
        .bind(new.color_description.as_deref())
        .bind(new.material_description.as_deref())
        .bind(new.tags.as_deref())
        .bind(new.is_custom)
        .bind(new.is_floor_model)
        .bind(shelf_life.initial_hours_left())
        .bind(new.location.map(|p| p.lat()))
        .bind(new.location.map(|p| p.lng()))
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "slug"))?;

        let product = Product::try_from(row)?;
        info!(product_id = %product.id, slug = %product.slug, "Created product");
        Ok(product)
    }

    /// Publish or unpublish a product. Publishing stamps `pub_date` the
    /// first time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_published(
        &self,
        id: ProductId,
        is_published: bool,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.product
            SET is_published = $2,
                pub_date = CASE WHEN $2 THEN COALESCE(pub_date, $3) ELSE pub_date END,
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(is_published)
        .bind(now)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        info!(product_id = %id, is_published, "Updated product publication");
        Ok(())
    }

    /// Change the selling price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_current_price(&self, id: ProductId, price: Price) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE marketplace.product SET current_price = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(price)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Hold or release a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_reserved(&self, id: ProductId, is_reserved: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE marketplace.product SET is_reserved = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(is_reserved)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Products shoppers can see, best first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_visible(&self, limit: i64, offset: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM marketplace.product
            WHERE is_published AND NOT is_sold AND (hours_left IS NULL OR hours_left > 0)
            ORDER BY display_score DESC, pub_date DESC NULLS LAST, id
            LIMIT $1 OFFSET $2
            "
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// All products of a store, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_store(&self, store_id: StoreId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM marketplace.product WHERE store_id = $1 ORDER BY added_date DESC"
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Count a product page view.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn record_click(&self, id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE marketplace.product SET click_count = click_count + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Take `elapsed_hours` off every live countdown and refresh `is_recent`.
    ///
    /// Only published, unsold products with hours left are touched; the
    /// countdown stops at zero. Mirrors [`ShelfLife::decay`] and
    /// [`ShelfLife::is_recent`] in a single statement.
    ///
    /// Returns the number of products updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self))]
    pub async fn decay_shelf_life(
        &self,
        elapsed_hours: u32,
        policy: ShelfLife,
    ) -> Result<u64, RepositoryError> {
        let elapsed = i32::try_from(elapsed_hours).unwrap_or(i32::MAX);
        let shelf_hours = i64::from(policy.hours());

        let result = sqlx::query(
            r"
            UPDATE marketplace.product
            SET hours_left = GREATEST(hours_left - $1, 0),
                is_recent = GREATEST(hours_left - $1, 0)::BIGINT * 2 >= $2,
                updated_at = now()
            WHERE is_published AND NOT is_sold
              AND hours_left IS NOT NULL AND hours_left > 0
            ",
        )
        .bind(elapsed)
        .bind(shelf_hours)
        .execute(self.pool)
        .await?;

        let updated = result.rows_affected();
        info!(updated, elapsed_hours, "Decayed product shelf life");
        Ok(updated)
    }

    /// Attach an image to a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add_image(
        &self,
        product_id: ProductId,
        image: &str,
        is_main: bool,
    ) -> Result<ProductImage, RepositoryError> {
        let row = sqlx::query_as::<_, ProductImageRow>(
            r"
            INSERT INTO marketplace.product_image (product_id, is_main, image)
            VALUES ($1, $2, $3)
            RETURNING id, product_id, is_main, image
            ",
        )
        .bind(product_id)
        .bind(is_main)
        .bind(image)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Images of a product, main image first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn images(&self, product_id: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductImageRow>(
            r"
            SELECT id, product_id, is_main, image
            FROM marketplace.product_image
            WHERE product_id = $1
            ORDER BY is_main DESC, id
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Load products with the retailer that sells them.
pub(crate) async fn saleable_products(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<SaleableProduct>, RepositoryError> {
    let ids: Vec<uuid::Uuid> = ids.iter().map(ProductId::as_uuid).collect();

    let rows = sqlx::query_as::<_, SaleableProduct>(
        r"
        SELECT p.id, s.retailer_id, p.current_price, p.minimum_offer_price, p.units,
               p.is_published, p.is_sold, p.is_reserved, p.hours_left
        FROM marketplace.product p
        JOIN marketplace.store s ON s.id = p.store_id
        WHERE p.id = ANY($1)
        ",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    debug!(count = rows.len(), "Loaded saleable products");
    Ok(rows)
}

/// Take `quantity` units off a product, marking it sold when the last unit
/// goes. Returns `false` if the product was sold or reserved in the
/// meantime, or has fewer units left.
pub(crate) async fn take_units(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketplace.product
        SET is_sold = (units = $2),
            units = CASE WHEN units = $2 THEN units ELSE units - $2 END,
            updated_at = now()
        WHERE id = $1 AND NOT is_sold AND NOT is_reserved AND units >= $2
        ",
    )
    .bind(id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Hold a product for a captured offer. Returns `false` if it was already
/// sold or reserved.
pub(crate) async fn reserve(conn: &mut PgConnection, id: ProductId) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketplace.product
        SET is_reserved = TRUE, updated_at = now()
        WHERE id = $1 AND NOT is_sold AND NOT is_reserved
        ",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

//! # Product Repository
//!
//! The minimal product master data the engine references, plus the cached
//! `stock` projection.
//!
//! ## Stock Cache
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products.stock  ==  SUM(cost_lots.quantity_remaining)                  │
//! │                                                                         │
//! │  open lot   → stock += qty          (same transaction as the lot)      │
//! │  consume    → stock -= taken        (per lot touched)                  │
//! │  reverse    → stock += restored                                        │
//! │  batch ops  → resync: stock = SUM(...) recomputed from lots            │
//! │                                                                         │
//! │  Readers may use it for fast display; the engine never trusts it for   │
//! │  decisions. FIFO always reads the lots.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use lotkeeper_core::validation::{validate_product_name, validate_sku, validate_uuid};
use lotkeeper_core::{CoreError, Product};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = "id, sku, name, stock, is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Registers a product with zero stock.
    ///
    /// ## Returns
    /// * `Ok(Product)` - with a generated UUID
    /// * `Err(DbError::UniqueViolation)` - SKU already taken
    pub async fn register(&self, sku: &str, name: &str) -> DbResult<Product> {
        validate_sku(sku)?;
        validate_product_name(name)?;

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku: sku.trim().to_string(),
            name: name.trim().to_string(),
            stock: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, sku = %product.sku, "Registering product");

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, stock, is_active, lock_version, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0, 1, 0, ?4, ?5)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &product.sku),
            other => other,
        })?;

        info!(id = %product.id, sku = %product.sku, "Product registered");
        Ok(product)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name, id LIMIT ?1"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Activates or deactivates a product.
    ///
    /// Inactive products keep their lots and history; they are only skipped
    /// when reconciliation seeds lines.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Setting product active flag");

        let result = sqlx::query("UPDATE products SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }

        Ok(())
    }

    /// Recomputes `stock` from the lot sum and returns the new value.
    pub async fn resync(&self, id: &str) -> DbResult<i64> {
        validate_uuid("product_id", id)?;

        let mut tx = self.pool.begin().await?;
        lock_in(&mut *tx, id).await?;
        let stock = resync_in(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(stock)
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Generates a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Transaction Helpers
// =============================================================================
// These run on a connection already inside a transaction.

/// Takes the write lock for `product_id`. Must be the first statement of a
/// mutating transaction.
pub(crate) async fn lock_in(conn: &mut SqliteConnection, product_id: &str) -> DbResult<()> {
    let result = sqlx::query("UPDATE products SET lock_version = lock_version + 1 WHERE id = ?1")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::ProductNotFound(product_id.to_string()).into());
    }

    Ok(())
}

/// Fails with `ProductNotFound` unless `product_id` is registered.
pub(crate) async fn ensure_exists_in(conn: &mut SqliteConnection, product_id: &str) -> DbResult<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    match found {
        Some(_) => Ok(()),
        None => Err(CoreError::ProductNotFound(product_id.to_string()).into()),
    }
}

/// Adds `delta` to the stock cache.
pub(crate) async fn adjust_stock_in(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: i64,
) -> DbResult<()> {
    sqlx::query("UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1")
        .bind(product_id)
        .bind(delta)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Σ(remaining) for a product, optionally for one location only.
pub(crate) async fn lot_sum_in(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: Option<&str>,
) -> DbResult<i64> {
    let sum: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(quantity_remaining), 0)
        FROM cost_lots
        WHERE product_id = ?1 AND (?2 IS NULL OR location_id = ?2)
        "#,
    )
    .bind(product_id)
    .bind(location_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(sum)
}

/// Overwrites the stock cache with the lot sum.
pub(crate) async fn resync_in(conn: &mut SqliteConnection, product_id: &str) -> DbResult<i64> {
    let cached: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(cached) = cached else {
        return Err(CoreError::ProductNotFound(product_id.to_string()).into());
    };

    let actual = lot_sum_in(conn, product_id, None).await?;
    if cached != actual {
        warn!(product_id = %product_id, cached, actual, "Stock cache drifted; resyncing");
    }

    sqlx::query("UPDATE products SET stock = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(product_id)
        .bind(actual)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    debug!(product_id = %product_id, stock = actual, "Stock resynced");
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_register_and_read() {
        let db = setup().await;
        let product = db.products().register("COKE-330", "Coca-Cola 330ml").await.unwrap();

        let by_id = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "COKE-330");
        assert_eq!(by_id.stock, 0);
        assert!(by_id.is_active);

        let by_sku = db.products().get_by_sku("COKE-330").await.unwrap().unwrap();
        assert_eq!(by_sku.id, product.id);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = setup().await;
        db.products().register("COKE-330", "Coca-Cola").await.unwrap();

        let err = db.products().register("COKE-330", "Other").await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_invalid_sku_rejected() {
        let db = setup().await;
        let err = db.products().register("has space", "x").await.unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn test_list_active_skips_inactive() {
        let db = setup().await;
        let a = db.products().register("A-1", "Apple").await.unwrap();
        db.products().register("B-1", "Banana").await.unwrap();
        db.products().set_active(&a.id, false).await.unwrap();

        let active = db.products().list_active(10).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].sku, "B-1");
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resync_repairs_drift() {
        let db = setup().await;
        let p = db.products().register("A-1", "Apple").await.unwrap();

        sqlx::query("UPDATE products SET stock = 42 WHERE id = ?1")
            .bind(&p.id)
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(db.products().resync(&p.id).await.unwrap(), 0);
        let p = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(p.stock, 0);
    }

    #[tokio::test]
    async fn test_resync_unknown_product() {
        let db = setup().await;
        let err = db.products().resync(&generate_product_id()).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::ProductNotFound(_))));
    }
}

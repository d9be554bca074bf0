//! # Product Repository
//!
//! Catalog reads and writes, plus the single guarded stock write.
//!
//! ## Stock Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ Read, compute, write absolute value                                │
//! │     (a second writer in between is silently overwritten)               │
//! │                                                                         │
//! │  ✅ Guarded delta                                                       │
//! │     UPDATE products                                                    │
//! │        SET stock_quantity = stock_quantity + :delta                    │
//! │      WHERE id = :id AND stock_quantity + :delta >= 0                   │
//! │     RETURNING stock_quantity                                           │
//! │                                                                         │
//! │  No row back → the write would have gone negative, nothing changed.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Free functions take `&mut SqliteConnection` so they compose inside a
//! caller-owned transaction; [`ProductRepository`] wraps them for one-shot
//! use on the pool.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use minimart_core::{NewProduct, Product, ProductPatch, RecordStatus};

const PRODUCT_COLUMNS: &str = "id, barcode, name, selling_price_cents, purchase_price_cents, \
     stock_quantity, min_stock_level, discount_bps, status, created_at, updated_at";

// =============================================================================
// Connection-level operations
// =============================================================================

/// Gets a product by id regardless of lifecycle state.
pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(product)
}

/// Gets an active product by barcode. Archived products are not sellable.
pub async fn find_active_by_barcode(
    conn: &mut SqliteConnection,
    barcode: &str,
) -> DbResult<Option<Product>> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = ?1 AND status = 'active'"
    );
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(barcode.trim())
        .fetch_optional(&mut *conn)
        .await?;

    Ok(product)
}

/// Inserts a product and returns the stored row.
///
/// ## Errors
/// `DbError::UniqueViolation` when the barcode is already taken.
pub async fn insert(
    conn: &mut SqliteConnection,
    product: &NewProduct,
    now: DateTime<Utc>,
) -> DbResult<Product> {
    debug!(name = %product.name, barcode = ?product.barcode, "Inserting product");

    let sql = format!(
        r#"
        INSERT INTO products (
            barcode, name, selling_price_cents, purchase_price_cents,
            stock_quantity, min_stock_level, discount_bps, status,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8, ?8)
        RETURNING {PRODUCT_COLUMNS}
        "#
    );

    let inserted = sqlx::query_as::<_, Product>(&sql)
        .bind(product.barcode.as_deref().map(str::trim))
        .bind(product.name.trim())
        .bind(product.selling_price_cents)
        .bind(product.purchase_price_cents)
        .bind(product.initial_stock)
        .bind(product.min_stock_level)
        .bind(product.discount_bps)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: product.barcode.clone().unwrap_or_default(),
            },
            other => other,
        })?;

    Ok(inserted)
}

/// Applies a typed patch. Only the fields present in the patch are written.
pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    patch: &ProductPatch,
    now: DateTime<Utc>,
) -> DbResult<Product> {
    debug!(id, ?patch, "Updating product");

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE products SET updated_at = ");
    qb.push_bind(now);

    if let Some(barcode) = &patch.barcode {
        qb.push(", barcode = ")
            .push_bind(barcode.as_deref().map(|b| b.trim().to_string()));
    }
    if let Some(name) = &patch.name {
        qb.push(", name = ").push_bind(name.trim().to_string());
    }
    if let Some(cents) = patch.selling_price_cents {
        qb.push(", selling_price_cents = ").push_bind(cents);
    }
    if let Some(cents) = patch.purchase_price_cents {
        qb.push(", purchase_price_cents = ").push_bind(cents);
    }
    if let Some(level) = patch.min_stock_level {
        qb.push(", min_stock_level = ").push_bind(level);
    }
    if let Some(bps) = patch.discount_bps {
        qb.push(", discount_bps = ").push_bind(bps);
    }

    qb.push(" WHERE id = ").push_bind(id);
    qb.push(" RETURNING ").push(PRODUCT_COLUMNS);

    qb.build_query_as::<Product>()
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))
}

/// Moves a product between Active and Archived.
pub async fn set_status(
    conn: &mut SqliteConnection,
    id: i64,
    status: RecordStatus,
    now: DateTime<Utc>,
) -> DbResult<()> {
    debug!(id, ?status, "Setting product status");

    let result = sqlx::query("UPDATE products SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", id));
    }

    Ok(())
}

/// Adds `delta` to the on-hand quantity unless the result would be negative.
///
/// ## Returns
/// * `Ok(Some(new_quantity))` - written
/// * `Ok(None)` - product missing, or stock would have gone below zero
pub async fn apply_stock_delta(
    conn: &mut SqliteConnection,
    id: i64,
    delta: i64,
    now: DateTime<Utc>,
) -> DbResult<Option<i64>> {
    debug!(id, delta, "Applying stock delta");

    let new_quantity: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET
            stock_quantity = stock_quantity + ?2,
            updated_at = ?3
        WHERE id = ?1 AND stock_quantity + ?2 >= 0
        RETURNING stock_quantity
        "#,
    )
    .bind(id)
    .bind(delta)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(new_quantity)
}

/// Active products ordered by name.
pub async fn list_active(conn: &mut SqliteConnection, limit: u32) -> DbResult<Vec<Product>> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE status = 'active' ORDER BY name LIMIT ?1"
    );
    let products = sqlx::query_as::<_, Product>(&sql)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

    Ok(products)
}

/// Active products whose name contains `term` or whose barcode starts with
/// it. An exact barcode hit sorts first, the rest by name.
pub async fn search(conn: &mut SqliteConnection, term: &str, limit: u32) -> DbResult<Vec<Product>> {
    let escaped = escape_like(term);
    let sql = format!(
        r#"
        SELECT {PRODUCT_COLUMNS} FROM products
        WHERE status = 'active'
          AND (name LIKE ?1 ESCAPE '\' OR barcode LIKE ?2 ESCAPE '\')
        ORDER BY CASE WHEN barcode = ?3 THEN 0 ELSE 1 END, name
        LIMIT ?4
        "#
    );
    let products = sqlx::query_as::<_, Product>(&sql)
        .bind(format!("%{escaped}%"))
        .bind(format!("{escaped}%"))
        .bind(term)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

    debug!(term, found = products.len(), "Product search");
    Ok(products)
}

/// Active products carrying a line discount, deepest first.
pub async fn list_promoted(conn: &mut SqliteConnection) -> DbResult<Vec<Product>> {
    let sql = format!(
        r#"
        SELECT {PRODUCT_COLUMNS} FROM products
        WHERE status = 'active' AND discount_bps > 0
        ORDER BY discount_bps DESC, name
        "#
    );
    let products = sqlx::query_as::<_, Product>(&sql)
        .fetch_all(&mut *conn)
        .await?;

    Ok(products)
}

/// `%` and `_` in user input match literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Active products at or below their minimum level, emptiest first.
pub async fn list_low_stock(conn: &mut SqliteConnection) -> DbResult<Vec<Product>> {
    let sql = format!(
        r#"
        SELECT {PRODUCT_COLUMNS} FROM products
        WHERE status = 'active' AND stock_quantity <= min_stock_level
        ORDER BY stock_quantity, name
        "#
    );
    let products = sqlx::query_as::<_, Product>(&sql)
        .fetch_all(&mut *conn)
        .await?;

    Ok(products)
}

// =============================================================================
// Pool-level repository
// =============================================================================

/// Repository for one-shot product operations on the pool.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.get_by_barcode("6130000000017").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        find_by_id(&mut conn, id).await
    }

    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        find_active_by_barcode(&mut conn, barcode).await
    }

    pub async fn insert(&self, product: &NewProduct) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, product, Utc::now()).await
    }

    pub async fn update(&self, id: i64, patch: &ProductPatch) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        update(&mut conn, id, patch, Utc::now()).await
    }

    /// Hides a product from new sales; history keeps referencing it.
    pub async fn archive(&self, id: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        set_status(&mut conn, id, RecordStatus::Archived, Utc::now()).await
    }

    pub async fn restore(&self, id: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        set_status(&mut conn, id, RecordStatus::Active, Utc::now()).await
    }

    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        list_active(&mut conn, limit).await
    }

    pub async fn search(&self, term: &str, limit: u32) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        search(&mut conn, term, limit).await
    }

    pub async fn promoted(&self) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        list_promoted(&mut conn).await
    }

    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        list_low_stock(&mut conn).await
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE status = 'active'")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn olive_oil() -> NewProduct {
        NewProduct {
            barcode: Some("6130000000017".to_string()),
            name: "Olive Oil 1L".to_string(),
            selling_price_cents: 15000,
            purchase_price_cents: 10000,
            initial_stock: 5,
            min_stock_level: 2,
            discount_bps: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = repo.insert(&olive_oil()).await.unwrap();
        assert!(product.id > 0);
        assert_eq!(product.stock_quantity, 5);
        assert_eq!(product.status, RecordStatus::Active);

        let by_id = repo.get_by_id(product.id).await.unwrap().unwrap();
        assert_eq!(by_id, product);

        let by_barcode = repo.get_by_barcode("6130000000017").await.unwrap().unwrap();
        assert_eq!(by_barcode.id, product.id);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_barcode_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&olive_oil()).await.unwrap();
        let err = repo.insert(&olive_oil()).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_patch_updates_only_given_fields() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let product = repo.insert(&olive_oil()).await.unwrap();

        let patch = ProductPatch {
            selling_price_cents: Some(16000),
            discount_bps: Some(1000),
            ..Default::default()
        };
        let updated = repo.update(product.id, &patch).await.unwrap();

        assert_eq!(updated.selling_price_cents, 16000);
        assert!(updated.is_on_promotion());
        assert_eq!(updated.name, product.name);
        assert_eq!(updated.stock_quantity, product.stock_quantity);

        let err = repo.update(9999, &patch).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_archived_product_hidden_from_barcode_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let product = repo.insert(&olive_oil()).await.unwrap();

        repo.archive(product.id).await.unwrap();
        assert!(repo.get_by_barcode("6130000000017").await.unwrap().is_none());
        assert!(repo.get_by_id(product.id).await.unwrap().is_some());

        repo.restore(product.id).await.unwrap();
        assert!(repo.get_by_barcode("6130000000017").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stock_delta_never_goes_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().insert(&olive_oil()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let left = apply_stock_delta(&mut conn, product.id, -3, Utc::now()).await.unwrap();
        assert_eq!(left, Some(2));

        let refused = apply_stock_delta(&mut conn, product.id, -3, Utc::now()).await.unwrap();
        assert_eq!(refused, None);

        let current = find_by_id(&mut conn, product.id).await.unwrap().unwrap();
        assert_eq!(current.stock_quantity, 2);
        assert!(current.is_low_stock());

        let low = list_low_stock(&mut conn).await.unwrap();
        assert_eq!(low.len(), 1);
    }

    #[tokio::test]
    async fn test_search_by_name_and_barcode() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let oil = repo.insert(&olive_oil()).await.unwrap();
        let sunflower = repo
            .insert(&NewProduct {
                barcode: Some("6130000000024".to_string()),
                name: "Sunflower Oil 1L".to_string(),
                ..olive_oil()
            })
            .await
            .unwrap();
        repo.insert(&NewProduct {
            barcode: None,
            name: "Sugar 100% Cane".to_string(),
            ..olive_oil()
        })
        .await
        .unwrap();

        let by_name: Vec<i64> = repo.search("oil", 10).await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(by_name, vec![oil.id, sunflower.id]);

        let exact = repo.search("6130000000024", 10).await.unwrap();
        assert_eq!(exact[0].id, sunflower.id);
        assert_eq!(repo.search("613", 10).await.unwrap().len(), 2);
        assert_eq!(repo.search("613", 1).await.unwrap().len(), 1);

        // Wildcards in the term match literally
        assert_eq!(repo.search("100%", 10).await.unwrap().len(), 1);
        assert!(repo.search("_", 10).await.unwrap().is_empty());

        repo.archive(oil.id).await.unwrap();
        assert_eq!(repo.search("oil", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_promoted_deepest_discount_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        repo.insert(&olive_oil()).await.unwrap();
        let tea = repo
            .insert(&NewProduct {
                barcode: None,
                name: "Green Tea 200g".to_string(),
                discount_bps: 1000,
                ..olive_oil()
            })
            .await
            .unwrap();
        let rice = repo
            .insert(&NewProduct {
                barcode: None,
                name: "Rice 1kg".to_string(),
                discount_bps: 2500,
                ..olive_oil()
            })
            .await
            .unwrap();

        let promoted: Vec<i64> = repo.promoted().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(promoted, vec![rice.id, tea.id]);
    }
}

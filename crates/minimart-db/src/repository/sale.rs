//! # Sale Repository
//!
//! Sale headers and their frozen line items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sale Lifecycle                                  │
//! │                                                                         │
//! │  insert_sale + insert_item × n   (inside the checkout transaction)     │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   ┌───────────┐   mark_cancelled    ┌───────────┐                      │
//! │   │ Completed │ ──────────────────► │ Cancelled │  terminal            │
//! │   └───────────┘                     └───────────┘                      │
//! │                                                                         │
//! │  Line items are never updated after insert.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use minimart_core::{PaymentMethod, Sale, SaleItem};

const SALE_COLUMNS: &str = "id, sale_number, customer_id, cashier_id, subtotal_cents, \
     discount_cents, total_cents, payment_method, amount_paid_cents, change_cents, status, \
     register_number, cancellation_reason, created_at, cancelled_at";

const SALE_ITEM_COLUMNS: &str = "id, sale_id, product_id, product_name, barcode, quantity, \
     unit_price_cents, discount_bps, subtotal_cents, purchase_price_cents";

/// Header of a sale about to be written.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub sale_number: String,
    pub customer_id: Option<i64>,
    pub cashier_id: i64,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub amount_paid_cents: i64,
    pub change_cents: i64,
    pub register_number: i64,
    pub created_at: DateTime<Utc>,
}

/// A line snapshot. Name, barcode and prices are copied from the product so
/// later catalog edits do not rewrite history.
#[derive(Debug, Clone)]
pub struct NewSaleItem {
    pub sale_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub barcode: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_bps: u32,
    pub subtotal_cents: i64,
    pub purchase_price_cents: i64,
}

// =============================================================================
// Connection-level operations
// =============================================================================

/// Writes a sale header with status `completed` and returns its id.
pub async fn insert_sale(conn: &mut SqliteConnection, sale: &NewSale) -> DbResult<i64> {
    debug!(sale_number = %sale.sale_number, total = sale.total_cents, "Inserting sale");

    let result = sqlx::query(
        r#"
        INSERT INTO sales (
            sale_number, customer_id, cashier_id, subtotal_cents, discount_cents,
            total_cents, payment_method, amount_paid_cents, change_cents,
            status, register_number, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'completed', ?10, ?11)
        "#,
    )
    .bind(&sale.sale_number)
    .bind(sale.customer_id)
    .bind(sale.cashier_id)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_cents)
    .bind(sale.payment_method)
    .bind(sale.amount_paid_cents)
    .bind(sale.change_cents)
    .bind(sale.register_number)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn insert_item(conn: &mut SqliteConnection, item: &NewSaleItem) -> DbResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO sale_items (
            sale_id, product_id, product_name, barcode, quantity,
            unit_price_cents, discount_bps, subtotal_cents, purchase_price_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(item.sale_id)
    .bind(item.product_id)
    .bind(&item.product_name)
    .bind(&item.barcode)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.discount_bps)
    .bind(item.subtotal_cents)
    .bind(item.purchase_price_cents)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(sale)
}

pub async fn find_by_number(
    conn: &mut SqliteConnection,
    sale_number: &str,
) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE sale_number = ?1");
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(sale_number)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(sale)
}

pub async fn sale_number_exists(conn: &mut SqliteConnection, sale_number: &str) -> DbResult<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sales WHERE sale_number = ?1)")
        .bind(sale_number)
        .fetch_one(&mut *conn)
        .await?;

    Ok(exists)
}

/// Line items in insertion order.
pub async fn items_for_sale(conn: &mut SqliteConnection, sale_id: i64) -> DbResult<Vec<SaleItem>> {
    let sql = format!("SELECT {SALE_ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY id");
    let items = sqlx::query_as::<_, SaleItem>(&sql)
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(items)
}

/// Flips a completed sale to cancelled.
///
/// Returns `false` when the sale was not in `completed` state, so a second
/// cancel is a no-op at the row level as well.
pub async fn mark_cancelled(
    conn: &mut SqliteConnection,
    id: i64,
    reason: &str,
    at: DateTime<Utc>,
) -> DbResult<bool> {
    debug!(id, reason, "Marking sale cancelled");

    let result = sqlx::query(
        r#"
        UPDATE sales
        SET status = 'cancelled', cancellation_reason = ?2, cancelled_at = ?3
        WHERE id = ?1 AND status = 'completed'
        "#,
    )
    .bind(id)
    .bind(reason)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Most recent sales first.
pub async fn list_recent(conn: &mut SqliteConnection, limit: u32) -> DbResult<Vec<Sale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC, id DESC LIMIT ?1");
    let sales = sqlx::query_as::<_, Sale>(&sql)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

    Ok(sales)
}

pub async fn list_for_customer(
    conn: &mut SqliteConnection,
    customer_id: i64,
) -> DbResult<Vec<Sale>> {
    let sql = format!(
        "SELECT {SALE_COLUMNS} FROM sales WHERE customer_id = ?1 ORDER BY created_at DESC, id DESC"
    );
    let sales = sqlx::query_as::<_, Sale>(&sql)
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(sales)
}

// =============================================================================
// Pool-level repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        find_by_id(&mut conn, id).await
    }

    pub async fn get_by_number(&self, sale_number: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        find_by_number(&mut conn, sale_number).await
    }

    pub async fn get_items(&self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        let mut conn = self.pool.acquire().await?;
        items_for_sale(&mut conn, sale_id).await
    }

    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;
        list_recent(&mut conn, limit).await
    }

    pub async fn list_for_customer(&self, customer_id: i64) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;
        list_for_customer(&mut conn, customer_id).await
    }

    /// Total number of sales, any status (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

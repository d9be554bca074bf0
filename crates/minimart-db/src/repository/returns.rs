//! # Return Repository
//!
//! Compensating records against completed sales. A return never edits the
//! sale it refers to; the returnable quantity of a line is its sold quantity
//! minus everything already recorded here.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use minimart_core::{PaymentMethod, Return, ReturnItem};

const RETURN_COLUMNS: &str = "id, return_number, original_sale_id, return_amount_cents, \
     refund_method, processed_by, reason, created_at";

const RETURN_ITEM_COLUMNS: &str =
    "id, return_id, sale_item_id, product_id, quantity_returned, unit_price_cents, subtotal_cents";

#[derive(Debug, Clone)]
pub struct NewReturn {
    pub return_number: String,
    pub original_sale_id: i64,
    pub return_amount_cents: i64,
    pub refund_method: PaymentMethod,
    pub processed_by: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReturnItem {
    pub return_id: i64,
    pub sale_item_id: i64,
    pub product_id: i64,
    pub quantity_returned: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// Units of one sale line already taken back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct ReturnedQuantity {
    pub sale_item_id: i64,
    pub quantity: i64,
}

// =============================================================================
// Connection-level operations
// =============================================================================

pub async fn insert_return(conn: &mut SqliteConnection, ret: &NewReturn) -> DbResult<i64> {
    debug!(
        return_number = %ret.return_number,
        sale_id = ret.original_sale_id,
        amount = ret.return_amount_cents,
        "Inserting return"
    );

    let result = sqlx::query(
        r#"
        INSERT INTO returns (
            return_number, original_sale_id, return_amount_cents,
            refund_method, processed_by, reason, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&ret.return_number)
    .bind(ret.original_sale_id)
    .bind(ret.return_amount_cents)
    .bind(ret.refund_method)
    .bind(ret.processed_by)
    .bind(&ret.reason)
    .bind(ret.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn insert_item(conn: &mut SqliteConnection, item: &NewReturnItem) -> DbResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO return_items (
            return_id, sale_item_id, product_id, quantity_returned,
            unit_price_cents, subtotal_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(item.return_id)
    .bind(item.sale_item_id)
    .bind(item.product_id)
    .bind(item.quantity_returned)
    .bind(item.unit_price_cents)
    .bind(item.subtotal_cents)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Return>> {
    let sql = format!("SELECT {RETURN_COLUMNS} FROM returns WHERE id = ?1");
    let ret = sqlx::query_as::<_, Return>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(ret)
}

pub async fn return_number_exists(
    conn: &mut SqliteConnection,
    return_number: &str,
) -> DbResult<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM returns WHERE return_number = ?1)")
            .bind(return_number)
            .fetch_one(&mut *conn)
            .await?;

    Ok(exists)
}

/// Returns recorded against a sale, oldest first.
pub async fn returns_for_sale(conn: &mut SqliteConnection, sale_id: i64) -> DbResult<Vec<Return>> {
    let sql = format!(
        "SELECT {RETURN_COLUMNS} FROM returns WHERE original_sale_id = ?1 ORDER BY id"
    );
    let returns = sqlx::query_as::<_, Return>(&sql)
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(returns)
}

pub async fn items_for_return(
    conn: &mut SqliteConnection,
    return_id: i64,
) -> DbResult<Vec<ReturnItem>> {
    let sql = format!(
        "SELECT {RETURN_ITEM_COLUMNS} FROM return_items WHERE return_id = ?1 ORDER BY id"
    );
    let items = sqlx::query_as::<_, ReturnItem>(&sql)
        .bind(return_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(items)
}

/// Units already returned per sale line. Lines never returned are absent.
pub async fn returned_quantities(
    conn: &mut SqliteConnection,
    sale_id: i64,
) -> DbResult<Vec<ReturnedQuantity>> {
    let rows = sqlx::query_as::<_, ReturnedQuantity>(
        r#"
        SELECT ri.sale_item_id AS sale_item_id, SUM(ri.quantity_returned) AS quantity
        FROM return_items ri
        JOIN returns r ON r.id = ri.return_id
        WHERE r.original_sale_id = ?1
        GROUP BY ri.sale_item_id
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Sum of every refund issued against a sale.
pub async fn total_returned_cents(conn: &mut SqliteConnection, sale_id: i64) -> DbResult<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(return_amount_cents), 0) FROM returns WHERE original_sale_id = ?1",
    )
    .bind(sale_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(total)
}

// =============================================================================
// Pool-level repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Return>> {
        let mut conn = self.pool.acquire().await?;
        find_by_id(&mut conn, id).await
    }

    pub async fn list_for_sale(&self, sale_id: i64) -> DbResult<Vec<Return>> {
        let mut conn = self.pool.acquire().await?;
        returns_for_sale(&mut conn, sale_id).await
    }

    pub async fn get_items(&self, return_id: i64) -> DbResult<Vec<ReturnItem>> {
        let mut conn = self.pool.acquire().await?;
        items_for_return(&mut conn, return_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

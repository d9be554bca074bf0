//! # Customer Repository
//!
//! Customer records, the running credit balance, and purchase statistics.
//!
//! The balance column is only ever moved by [`apply_credit_delta`], and every
//! caller pairs that call with a ledger row in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use minimart_core::{Customer, CustomerPatch, NewCustomer, RecordStatus};

const CUSTOMER_COLUMNS: &str = "id, full_name, phone, credit_limit_cents, current_credit_cents, \
     total_purchases_cents, purchase_count, last_purchase_date, status, created_at, updated_at";

// =============================================================================
// Connection-level operations
// =============================================================================

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Customer>> {
    let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
    let customer = sqlx::query_as::<_, Customer>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(customer)
}

/// Gets a customer that may take part in new sales.
pub async fn find_active(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Customer>> {
    Ok(find_by_id(conn, id)
        .await?
        .filter(|customer| customer.status.is_active()))
}

pub async fn insert(
    conn: &mut SqliteConnection,
    customer: &NewCustomer,
    now: DateTime<Utc>,
) -> DbResult<Customer> {
    debug!(name = %customer.full_name, "Inserting customer");

    let sql = format!(
        r#"
        INSERT INTO customers (
            full_name, phone, credit_limit_cents, current_credit_cents,
            total_purchases_cents, purchase_count, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, 0, 0, 0, 'active', ?4, ?4)
        RETURNING {CUSTOMER_COLUMNS}
        "#
    );

    let inserted = sqlx::query_as::<_, Customer>(&sql)
        .bind(customer.full_name.trim())
        .bind(customer.phone.as_deref().map(str::trim))
        .bind(customer.credit_limit_cents)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

    Ok(inserted)
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    patch: &CustomerPatch,
    now: DateTime<Utc>,
) -> DbResult<Customer> {
    debug!(id, ?patch, "Updating customer");

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE customers SET updated_at = ");
    qb.push_bind(now);

    if let Some(name) = &patch.full_name {
        qb.push(", full_name = ").push_bind(name.trim().to_string());
    }
    if let Some(phone) = &patch.phone {
        qb.push(", phone = ")
            .push_bind(phone.as_deref().map(|p| p.trim().to_string()));
    }
    if let Some(limit) = patch.credit_limit_cents {
        qb.push(", credit_limit_cents = ").push_bind(limit);
    }

    qb.push(" WHERE id = ").push_bind(id);
    qb.push(" RETURNING ").push(CUSTOMER_COLUMNS);

    qb.build_query_as::<Customer>()
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Customer", id))
}

pub async fn set_status(
    conn: &mut SqliteConnection,
    id: i64,
    status: RecordStatus,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE customers SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Customer", id));
    }

    Ok(())
}

/// Adds a signed amount to the outstanding balance.
///
/// Returns the new balance, or `None` if the customer does not exist.
pub async fn apply_credit_delta(
    conn: &mut SqliteConnection,
    id: i64,
    delta_cents: i64,
    now: DateTime<Utc>,
) -> DbResult<Option<i64>> {
    debug!(id, delta_cents, "Applying credit delta");

    let balance: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE customers
        SET
            current_credit_cents = current_credit_cents + ?2,
            updated_at = ?3
        WHERE id = ?1
        RETURNING current_credit_cents
        "#,
    )
    .bind(id)
    .bind(delta_cents)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(balance)
}

/// Counts a completed sale toward the customer's statistics.
pub async fn record_purchase(
    conn: &mut SqliteConnection,
    id: i64,
    amount_cents: i64,
    at: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE customers
        SET
            total_purchases_cents = total_purchases_cents + ?2,
            purchase_count = purchase_count + 1,
            last_purchase_date = ?3,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(amount_cents)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Customer", id));
    }

    Ok(())
}

/// Takes `amount_cents` and `purchases` back out of the statistics.
///
/// Used by returns (`purchases = 0`) and cancellations (`purchases = 1`).
/// Neither figure drops below zero.
pub async fn reverse_purchase(
    conn: &mut SqliteConnection,
    id: i64,
    amount_cents: i64,
    purchases: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE customers
        SET
            total_purchases_cents = MAX(total_purchases_cents - ?2, 0),
            purchase_count = MAX(purchase_count - ?3, 0),
            updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(amount_cents)
    .bind(purchases)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Customer", id));
    }

    Ok(())
}

/// Active customers owing money, largest balance first.
pub async fn list_debtors(conn: &mut SqliteConnection) -> DbResult<Vec<Customer>> {
    let sql = format!(
        r#"
        SELECT {CUSTOMER_COLUMNS} FROM customers
        WHERE status = 'active' AND current_credit_cents > 0
        ORDER BY current_credit_cents DESC, id
        "#
    );
    let customers = sqlx::query_as::<_, Customer>(&sql)
        .fetch_all(&mut *conn)
        .await?;

    Ok(customers)
}

// =============================================================================
// Pool-level repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        find_by_id(&mut conn, id).await
    }

    pub async fn insert(&self, customer: &NewCustomer) -> DbResult<Customer> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, customer, Utc::now()).await
    }

    pub async fn update(&self, id: i64, patch: &CustomerPatch) -> DbResult<Customer> {
        let mut conn = self.pool.acquire().await?;
        update(&mut conn, id, patch, Utc::now()).await
    }

    pub async fn archive(&self, id: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        set_status(&mut conn, id, RecordStatus::Archived, Utc::now()).await
    }

    pub async fn list_debtors(&self) -> DbResult<Vec<Customer>> {
        let mut conn = self.pool.acquire().await?;
        list_debtors(&mut conn).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn amina() -> NewCustomer {
        NewCustomer {
            full_name: "Amina Benali".to_string(),
            phone: Some("0612345678".to_string()),
            credit_limit_cents: 50000,
        }
    }

    #[tokio::test]
    async fn test_insert_starts_with_zero_balance() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db.customers().insert(&amina()).await.unwrap();

        assert_eq!(customer.current_credit_cents, 0);
        assert_eq!(customer.purchase_count, 0);
        assert!(customer.last_purchase_date.is_none());
        assert_eq!(customer.available_credit().cents(), 50000);
    }

    #[tokio::test]
    async fn test_credit_delta_and_debtors() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db.customers().insert(&amina()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let balance = apply_credit_delta(&mut conn, customer.id, 27000, Utc::now())
            .await
            .unwrap();
        assert_eq!(balance, Some(27000));

        let debtors = list_debtors(&mut conn).await.unwrap();
        assert_eq!(debtors.len(), 1);

        let balance = apply_credit_delta(&mut conn, customer.id, -27000, Utc::now())
            .await
            .unwrap();
        assert_eq!(balance, Some(0));
        assert!(list_debtors(&mut conn).await.unwrap().is_empty());

        let missing = apply_credit_delta(&mut conn, 9999, 100, Utc::now()).await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_purchase_stats_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db.customers().insert(&amina()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();

        record_purchase(&mut conn, customer.id, 27000, now).await.unwrap();
        let after = find_by_id(&mut conn, customer.id).await.unwrap().unwrap();
        assert_eq!(after.total_purchases_cents, 27000);
        assert_eq!(after.purchase_count, 1);
        assert!(after.last_purchase_date.is_some());

        reverse_purchase(&mut conn, customer.id, 30000, 1, now).await.unwrap();
        let reversed = find_by_id(&mut conn, customer.id).await.unwrap().unwrap();
        assert_eq!(reversed.total_purchases_cents, 0);
        assert_eq!(reversed.purchase_count, 0);
    }

    #[tokio::test]
    async fn test_archived_customer_not_active() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();
        let customer = repo.insert(&amina()).await.unwrap();

        let patch = CustomerPatch {
            phone: Some(None),
            ..Default::default()
        };
        let updated = repo.update(customer.id, &patch).await.unwrap();
        assert!(updated.phone.is_none());

        repo.archive(customer.id).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        assert!(find_active(&mut conn, customer.id).await.unwrap().is_none());
        assert!(find_by_id(&mut conn, customer.id).await.unwrap().is_some());
    }
}

//! # Credit Transaction Repository
//!
//! Append-only customer credit ledger. Rows are inserted, never updated or
//! deleted; the sum of a customer's rows should equal their balance.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use minimart_core::{CreditTransaction, CreditTransactionType};

const CREDIT_COLUMNS: &str = "id, customer_id, transaction_type, amount_cents, sale_id, \
     return_id, processed_by, note, created_at";

#[derive(Debug, Clone)]
pub struct NewCreditTransaction {
    pub customer_id: i64,
    pub transaction_type: CreditTransactionType,
    /// Signed; positive increases the debt.
    pub amount_cents: i64,
    pub sale_id: Option<i64>,
    pub return_id: Option<i64>,
    pub processed_by: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(conn: &mut SqliteConnection, entry: &NewCreditTransaction) -> DbResult<i64> {
    debug!(
        customer_id = entry.customer_id,
        kind = ?entry.transaction_type,
        amount = entry.amount_cents,
        "Appending credit transaction"
    );

    let result = sqlx::query(
        r#"
        INSERT INTO customer_credit_transactions (
            customer_id, transaction_type, amount_cents, sale_id,
            return_id, processed_by, note, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(entry.customer_id)
    .bind(entry.transaction_type)
    .bind(entry.amount_cents)
    .bind(entry.sale_id)
    .bind(entry.return_id)
    .bind(entry.processed_by)
    .bind(&entry.note)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// A customer's ledger, oldest first.
pub async fn list_for_customer(
    conn: &mut SqliteConnection,
    customer_id: i64,
) -> DbResult<Vec<CreditTransaction>> {
    let sql = format!(
        "SELECT {CREDIT_COLUMNS} FROM customer_credit_transactions WHERE customer_id = ?1 ORDER BY id"
    );
    let entries = sqlx::query_as::<_, CreditTransaction>(&sql)
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(entries)
}

/// Sum of every ledger row for the customer.
pub async fn ledger_balance(conn: &mut SqliteConnection, customer_id: i64) -> DbResult<i64> {
    let balance: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM customer_credit_transactions WHERE customer_id = ?1",
    )
    .bind(customer_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(balance)
}

#[derive(Debug, Clone)]
pub struct CreditTransactionRepository {
    pool: SqlitePool,
}

impl CreditTransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CreditTransactionRepository { pool }
    }

    pub async fn list_for_customer(&self, customer_id: i64) -> DbResult<Vec<CreditTransaction>> {
        let mut conn = self.pool.acquire().await?;
        list_for_customer(&mut conn, customer_id).await
    }

    pub async fn ledger_balance(&self, customer_id: i64) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        ledger_balance(&mut conn, customer_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use minimart_core::NewCustomer;

    #[tokio::test]
    async fn test_ledger_sum_matches_entries() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db
            .customers()
            .insert(&NewCustomer {
                full_name: "Youssef Alaoui".to_string(),
                phone: None,
                credit_limit_cents: 100000,
            })
            .await
            .unwrap();

        {
            let mut conn = db.pool().acquire().await.unwrap();
            for (kind, amount) in [
                (CreditTransactionType::CreditSale, 27000),
                (CreditTransactionType::Payment, -10000),
                (CreditTransactionType::ReturnCredit, -4500),
            ] {
                insert(
                    &mut conn,
                    &NewCreditTransaction {
                        customer_id: customer.id,
                        transaction_type: kind,
                        amount_cents: amount,
                        sale_id: None,
                        return_id: None,
                        processed_by: 1,
                        note: None,
                        created_at: Utc::now(),
                    },
                )
                .await
                .unwrap();
            }
        }

        let repo = db.credit_transactions();
        assert_eq!(repo.ledger_balance(customer.id).await.unwrap(), 12500);

        let entries = repo.list_for_customer(customer.id).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].transaction_type, CreditTransactionType::CreditSale);
        assert_eq!(entries[1].amount().cents(), -10000);

        assert_eq!(repo.ledger_balance(9999).await.unwrap(), 0);
    }
}

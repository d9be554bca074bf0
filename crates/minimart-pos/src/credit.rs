//! # Customer Credit Ledger
//!
//! Every change to `customers.current_credit_cents` is paired with one
//! append-only row in `customer_credit_transactions`, written on the same
//! connection. The balance and the ledger sum therefore move together or not
//! at all.
//!
//! ```text
//!   credit_sale        +total      complete_sale (credit)
//!   return_credit      -refund     process_return on a credit sale
//!   sale_cancellation  -net        cancel_sale on a credit sale
//!   payment            -amount     pay_credit
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::error::PosResult;
use crate::orchestrator::{commit_or_rollback, PointOfSale};
use minimart_core::{CoreError, CreditTransaction, CreditTransactionType, Customer, Money};
use minimart_db::repository::{credit as credit_repo, customer as customer_repo};
use minimart_db::{DbError, NewCreditTransaction};

/// Receipt for a payment against a customer's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPayment {
    pub transaction_id: i64,
    pub customer_id: i64,
    pub amount: Money,
    pub previous_balance: Money,
    pub new_balance: Money,
}

/// Stored balance compared with the ledger sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditReconciliation {
    pub customer_id: i64,
    pub recorded: Money,
    pub ledger: Money,
    /// `recorded - ledger`.
    pub drift: Money,
}

impl CreditReconciliation {
    pub fn is_balanced(&self) -> bool {
        self.drift.is_zero()
    }
}

/// Moves the balance and appends the matching ledger row.
async fn post(conn: &mut SqliteConnection, entry: NewCreditTransaction) -> PosResult<i64> {
    let balance = customer_repo::apply_credit_delta(
        conn,
        entry.customer_id,
        entry.amount_cents,
        entry.created_at,
    )
    .await?
    .ok_or_else(|| CoreError::not_found("Customer", entry.customer_id))?;

    let id = credit_repo::insert(conn, &entry).await?;
    debug!(
        customer_id = entry.customer_id,
        kind = ?entry.transaction_type,
        amount = entry.amount_cents,
        balance,
        "Credit posted"
    );

    Ok(id)
}

/// Charges a credit sale to the customer. Going over the limit is allowed
/// but logged.
pub(crate) async fn charge_sale(
    conn: &mut SqliteConnection,
    customer: &Customer,
    sale_id: i64,
    total: Money,
    processed_by: i64,
    now: DateTime<Utc>,
) -> PosResult<i64> {
    let projected = customer.current_credit() + total;
    if projected > customer.credit_limit() {
        warn!(
            customer_id = customer.id,
            balance = %projected,
            limit = %customer.credit_limit(),
            "Credit limit exceeded"
        );
    }

    post(
        conn,
        NewCreditTransaction {
            customer_id: customer.id,
            transaction_type: CreditTransactionType::CreditSale,
            amount_cents: total.cents(),
            sale_id: Some(sale_id),
            return_id: None,
            processed_by,
            note: None,
            created_at: now,
        },
    )
    .await
}

pub(crate) async fn refund_return(
    conn: &mut SqliteConnection,
    customer_id: i64,
    sale_id: i64,
    return_id: i64,
    amount: Money,
    processed_by: i64,
    now: DateTime<Utc>,
) -> PosResult<i64> {
    post(
        conn,
        NewCreditTransaction {
            customer_id,
            transaction_type: CreditTransactionType::ReturnCredit,
            amount_cents: -amount.cents(),
            sale_id: Some(sale_id),
            return_id: Some(return_id),
            processed_by,
            note: None,
            created_at: now,
        },
    )
    .await
}

pub(crate) async fn reverse_sale(
    conn: &mut SqliteConnection,
    customer_id: i64,
    sale_id: i64,
    amount: Money,
    processed_by: i64,
    now: DateTime<Utc>,
) -> PosResult<i64> {
    post(
        conn,
        NewCreditTransaction {
            customer_id,
            transaction_type: CreditTransactionType::SaleCancellation,
            amount_cents: -amount.cents(),
            sale_id: Some(sale_id),
            return_id: None,
            processed_by,
            note: None,
            created_at: now,
        },
    )
    .await
}

impl PointOfSale {
    /// Records a payment towards a customer's outstanding balance.
    ///
    /// Archived customers can still pay off what they owe. Overpaying leaves
    /// a negative balance (credit in the customer's favor).
    pub async fn pay_credit(
        &self,
        customer_id: i64,
        amount: Money,
        processed_by: i64,
        note: Option<&str>,
    ) -> PosResult<CreditPayment> {
        if !amount.is_positive() {
            return Err(CoreError::invalid_amount("payment must be greater than zero").into());
        }

        let _gate = self.write_gate.lock().await;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let paid = record_payment(&mut tx, customer_id, amount, processed_by, note, now).await;
        let payment = commit_or_rollback(tx, paid, "pay_credit").await?;

        info!(
            customer_id,
            amount = %payment.amount,
            balance = %payment.new_balance,
            "Credit payment recorded"
        );

        Ok(payment)
    }

    /// Compares the stored balance with the ledger sum. Drift is logged.
    pub async fn reconcile(&self, customer_id: i64) -> PosResult<CreditReconciliation> {
        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        let customer = customer_repo::find_by_id(&mut conn, customer_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Customer", customer_id))?;
        let ledger = Money::from_cents(credit_repo::ledger_balance(&mut conn, customer_id).await?);

        let reconciliation = CreditReconciliation {
            customer_id,
            recorded: customer.current_credit(),
            ledger,
            drift: customer.current_credit() - ledger,
        };
        if !reconciliation.is_balanced() {
            warn!(
                customer_id,
                recorded = %reconciliation.recorded,
                ledger = %reconciliation.ledger,
                "Credit balance does not match ledger"
            );
        }

        Ok(reconciliation)
    }

    /// The customer's ledger, oldest first.
    pub async fn statement(&self, customer_id: i64) -> PosResult<Vec<CreditTransaction>> {
        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        if customer_repo::find_by_id(&mut conn, customer_id).await?.is_none() {
            return Err(CoreError::not_found("Customer", customer_id).into());
        }
        Ok(credit_repo::list_for_customer(&mut conn, customer_id).await?)
    }
}

async fn record_payment(
    conn: &mut SqliteConnection,
    customer_id: i64,
    amount: Money,
    processed_by: i64,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> PosResult<CreditPayment> {
    let customer = customer_repo::find_by_id(conn, customer_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Customer", customer_id))?;

    let transaction_id = post(
        conn,
        NewCreditTransaction {
            customer_id,
            transaction_type: CreditTransactionType::Payment,
            amount_cents: -amount.cents(),
            sale_id: None,
            return_id: None,
            processed_by,
            note: note.map(str::trim).filter(|n| !n.is_empty()).map(String::from),
            created_at: now,
        },
    )
    .await?;

    Ok(CreditPayment {
        transaction_id,
        customer_id,
        amount,
        previous_balance: customer.current_credit(),
        new_balance: customer.current_credit() - amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use minimart_core::NewCustomer;
    use minimart_db::{Database, DbConfig};

    async fn pos_with_customer() -> (PointOfSale, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pos = PointOfSale::new(db, 1);
        let customer = pos
            .add_customer(&NewCustomer {
                full_name: "Youssef Idrissi".to_string(),
                phone: Some("0612345678".to_string()),
                credit_limit_cents: 20000,
            })
            .await
            .unwrap();
        (pos, customer.id)
    }

    #[tokio::test]
    async fn test_payment_appends_ledger_row() {
        let (pos, customer_id) = pos_with_customer().await;
        let payment = pos
            .pay_credit(customer_id, Money::from_cents(5000), 1, Some("  cash at counter "))
            .await
            .unwrap();
        assert_eq!(payment.previous_balance, Money::zero());
        assert_eq!(payment.new_balance.cents(), -5000);

        let statement = pos.statement(customer_id).await.unwrap();
        assert_eq!(statement.len(), 1);
        assert_eq!(statement[0].transaction_type, CreditTransactionType::Payment);
        assert_eq!(statement[0].amount_cents, -5000);
        assert_eq!(statement[0].note.as_deref(), Some("cash at counter"));
        assert!(pos.reconcile(customer_id).await.unwrap().is_balanced());
    }

    #[tokio::test]
    async fn test_payment_validation() {
        let (pos, customer_id) = pos_with_customer().await;

        let err = pos
            .pay_credit(customer_id, Money::zero(), 1, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidAmount);

        let err = pos
            .pay_credit(9999, Money::from_cents(100), 1, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(pos.statement(customer_id).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_archived_customer_can_still_pay() {
        let (pos, customer_id) = pos_with_customer().await;
        pos.archive_customer(customer_id).await.unwrap();

        let payment = pos
            .pay_credit(customer_id, Money::from_cents(100), 1, None)
            .await
            .unwrap();
        assert_eq!(payment.new_balance.cents(), -100);
    }

    #[tokio::test]
    async fn test_reconcile_reports_drift() {
        let (pos, customer_id) = pos_with_customer().await;

        // Balance moved behind the ledger's back.
        {
            let mut conn = pos.database().pool().acquire().await.unwrap();
            customer_repo::apply_credit_delta(&mut conn, customer_id, 700, Utc::now())
                .await
                .unwrap();
        }

        let reconciliation = pos.reconcile(customer_id).await.unwrap();
        assert!(!reconciliation.is_balanced());
        assert_eq!(reconciliation.recorded.cents(), 700);
        assert_eq!(reconciliation.ledger, Money::zero());
        assert_eq!(reconciliation.drift.cents(), 700);

        assert_eq!(pos.reconcile(9999).await.unwrap_err().code(), ErrorCode::NotFound);
    }
}

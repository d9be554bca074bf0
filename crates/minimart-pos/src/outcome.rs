//! # Operation Outcome
//!
//! The flat `{ success, message, id, code }` shape handed to whatever front
//! end drives the register. Every engine result converts into one.
//!
//! ```rust,ignore
//! let outcome = OperationOutcome::from(pos.cancel_sale(sale_id, "void").await);
//! println!("{}", serde_json::to_string(&outcome)?);
//! // {"success":true,"message":"Sale VNT-20240301093000-1 cancelled","id":42,"code":null}
//! ```

use serde::Serialize;
use tracing::error;

use crate::credit::CreditPayment;
use crate::error::{ErrorCode, PosResult};
use crate::inventory::StockChange;
use crate::orchestrator::{CancelledSale, ReturnReceipt, SaleReceipt};
use minimart_core::{Customer, Product};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
    /// Id of the record created or changed.
    pub id: Option<i64>,
    pub code: Option<ErrorCode>,
}

impl OperationOutcome {
    pub fn ok(message: impl Into<String>, id: Option<i64>) -> Self {
        OperationOutcome {
            success: true,
            message: message.into(),
            id,
            code: None,
        }
    }

    pub fn failed(message: impl Into<String>, code: ErrorCode) -> Self {
        OperationOutcome {
            success: false,
            message: message.into(),
            id: None,
            code: Some(code),
        }
    }
}

/// Success message and record id for an engine result.
pub trait Describe {
    fn describe(&self) -> (String, Option<i64>);
}

impl Describe for SaleReceipt {
    fn describe(&self) -> (String, Option<i64>) {
        (
            format!("Sale {} completed, total {}", self.sale_number, self.total),
            Some(self.sale_id),
        )
    }
}

impl Describe for CancelledSale {
    fn describe(&self) -> (String, Option<i64>) {
        (format!("Sale {} cancelled", self.sale_number), Some(self.sale_id))
    }
}

impl Describe for ReturnReceipt {
    fn describe(&self) -> (String, Option<i64>) {
        (
            format!("Return {} recorded, refund {}", self.return_number, self.return_amount),
            Some(self.return_id),
        )
    }
}

impl Describe for StockChange {
    fn describe(&self) -> (String, Option<i64>) {
        (
            format!("Stock updated to {}", self.new_quantity),
            Some(self.product_id),
        )
    }
}

impl Describe for CreditPayment {
    fn describe(&self) -> (String, Option<i64>) {
        (
            format!("Payment of {} recorded, balance {}", self.amount, self.new_balance),
            Some(self.transaction_id),
        )
    }
}

impl Describe for Product {
    fn describe(&self) -> (String, Option<i64>) {
        (format!("Product {} saved", self.name), Some(self.id))
    }
}

impl Describe for Customer {
    fn describe(&self) -> (String, Option<i64>) {
        (format!("Customer {} saved", self.full_name), Some(self.id))
    }
}

impl Describe for () {
    fn describe(&self) -> (String, Option<i64>) {
        ("Done".to_string(), None)
    }
}

impl<T: Describe> From<PosResult<T>> for OperationOutcome {
    fn from(result: PosResult<T>) -> Self {
        match result {
            Ok(value) => {
                let (message, id) = value.describe();
                OperationOutcome::ok(message, id)
            }
            Err(err) => {
                if err.is_persistence() {
                    error!(error = %err, "Operation failed in the ledger store");
                }
                OperationOutcome::failed(err.to_string(), err.code())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PosError;
    use minimart_core::CoreError;
    use minimart_db::DbError;

    #[test]
    fn test_success_outcome() {
        let change = StockChange {
            product_id: 3,
            previous_quantity: 4,
            new_quantity: 10,
            reason: crate::inventory::StockReason::Restock,
            low_stock: None,
        };
        let outcome = OperationOutcome::from(Ok::<_, PosError>(change));
        assert!(outcome.success);
        assert_eq!(outcome.id, Some(3));
        assert_eq!(outcome.code, None);
        assert_eq!(outcome.message, "Stock updated to 10");
    }

    #[test]
    fn test_failure_outcome_carries_code() {
        let outcome = OperationOutcome::from(Err::<(), _>(PosError::from(CoreError::EmptyCart)));
        assert!(!outcome.success);
        assert_eq!(outcome.code, Some(ErrorCode::EmptyCart));
        assert_eq!(outcome.id, None);

        let outcome = OperationOutcome::from(Err::<(), _>(PosError::from(DbError::QueryFailed(
            "database is locked".to_string(),
        ))));
        assert_eq!(outcome.code, Some(ErrorCode::DatabaseError));
        assert_eq!(outcome.message, "Query failed: database is locked");
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(OperationOutcome::failed(
            "Cart is empty",
            ErrorCode::EmptyCart,
        ))
        .unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "EMPTY_CART");
        assert!(json["id"].is_null());
    }
}

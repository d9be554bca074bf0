//! # Inventory Adjuster
//!
//! The only code path that changes `products.stock_quantity`.
//!
//! ## Adjustment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    adjust_stock(conn, id, delta, reason)                │
//! │                                                                         │
//! │  read product ──── missing ─────────────► NotFound                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  current + delta < 0 ───────────────────► InsufficientStock (no write) │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  guarded UPDATE ── no row (lost a race) ─► InsufficientStock           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  new ≤ min_stock_level ─────────────────► LowStockAlert attached       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StockChange { previous, current, alert }                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Functions run on the caller's connection, so inside a sale transaction a
//! failed decrement rolls back everything written before it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::fmt;
use tracing::{debug, warn};

use crate::error::PosResult;
use minimart_core::{CoreError, Product, ValidationError};
use minimart_db::repository::product;

/// Why stock moved. Recorded in logs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    Sale,
    Restock,
    Return,
    Adjustment,
    Cancellation,
}

impl StockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockReason::Sale => "sale",
            StockReason::Restock => "restock",
            StockReason::Return => "return",
            StockReason::Adjustment => "adjustment",
            StockReason::Cancellation => "cancellation",
        }
    }
}

impl fmt::Display for StockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a product ends an adjustment at or below its minimum level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub product_id: i64,
    pub product_name: String,
    pub stock_quantity: i64,
    pub min_stock_level: i64,
}

impl LowStockAlert {
    fn check(product: &Product, stock_quantity: i64) -> Option<Self> {
        (stock_quantity <= product.min_stock_level).then(|| LowStockAlert {
            product_id: product.id,
            product_name: product.name.clone(),
            stock_quantity,
            min_stock_level: product.min_stock_level,
        })
    }
}

/// Result of one adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub product_id: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub reason: StockReason,
    pub low_stock: Option<LowStockAlert>,
}

impl StockChange {
    pub fn delta(&self) -> i64 {
        self.new_quantity - self.previous_quantity
    }
}

/// Applies a signed delta to a product's stock.
///
/// Archived products can still be adjusted; cancelling an old sale must be
/// able to put units back.
pub async fn adjust_stock(
    conn: &mut SqliteConnection,
    product_id: i64,
    delta: i64,
    reason: StockReason,
    now: DateTime<Utc>,
) -> PosResult<StockChange> {
    let product = product::find_by_id(conn, product_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Product", product_id))?;

    let insufficient = || CoreError::InsufficientStock {
        product: product.name.clone(),
        available: product.stock_quantity,
        requested: delta.saturating_neg(),
    };

    let Some(projected) = product.stock_quantity.checked_add(delta) else {
        return Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -product.stock_quantity,
            max: i64::MAX - product.stock_quantity,
        }
        .into());
    };
    if projected < 0 {
        debug!(product_id, delta, available = product.stock_quantity, "Stock adjustment refused");
        return Err(insufficient().into());
    }

    let new_quantity = product::apply_stock_delta(conn, product_id, delta, now)
        .await?
        .ok_or_else(insufficient)?;

    debug!(
        product_id,
        delta,
        reason = %reason,
        previous = product.stock_quantity,
        current = new_quantity,
        "Stock adjusted"
    );

    let low_stock = LowStockAlert::check(&product, new_quantity);
    if let Some(alert) = &low_stock {
        warn!(
            product_id,
            product = %alert.product_name,
            stock = alert.stock_quantity,
            min = alert.min_stock_level,
            "Low stock"
        );
    }

    Ok(StockChange {
        product_id,
        previous_quantity: product.stock_quantity,
        new_quantity,
        reason,
        low_stock,
    })
}

/// Takes `quantity` units out of stock.
pub async fn decrease_stock(
    conn: &mut SqliteConnection,
    product_id: i64,
    quantity: i64,
    reason: StockReason,
    now: DateTime<Utc>,
) -> PosResult<StockChange> {
    ensure_positive(quantity)?;
    adjust_stock(conn, product_id, -quantity, reason, now).await
}

/// Puts `quantity` units back into stock.
pub async fn increase_stock(
    conn: &mut SqliteConnection,
    product_id: i64,
    quantity: i64,
    reason: StockReason,
    now: DateTime<Utc>,
) -> PosResult<StockChange> {
    ensure_positive(quantity)?;
    adjust_stock(conn, product_id, quantity, reason, now).await
}

fn ensure_positive(quantity: i64) -> PosResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }
    Ok(())
}

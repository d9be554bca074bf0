//! # Domain Types
//!
//! Records shared by the ledger store and the sale engine.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │     Return      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  barcode        │   │  sale_number    │   │  return_number  │       │
//! │  │  stock_quantity │   │  status         │   │  return_amount  │       │
//! │  │  discount_bps   │   │  total_cents    │   │  refund_method  │       │
//! │  └─────────────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │                                 │ 1..n                │ 1..n           │
//! │                        ┌────────▼────────┐   ┌────────▼────────┐       │
//! │                        │    SaleItem     │◄──│   ReturnItem    │       │
//! │                        │  (snapshot)     │   │                 │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────────────┐                     │
//! │  │    Customer     │◄──│   CreditTransaction     │  append-only        │
//! │  │ current_credit  │   │  signed amount_cents    │                     │
//! │  └─────────────────┘   └─────────────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Monetary columns are stored as `*_cents: i64`; accessors wrap them in
//! [`Money`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::money::{round_div, DiscountRate, Money};
use crate::validation::{
    validate_barcode, validate_discount_bps, validate_min_stock_level, validate_name,
    validate_price_cents, ValidationResult,
};

// =============================================================================
// Lifecycle
// =============================================================================

/// Lifecycle of catalog and customer records.
///
/// Archived records stay referenced by historical sales but are hidden from
/// lookups that feed new sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Active,
    Archived,
}

impl RecordStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, RecordStatus::Active)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,

    /// Unique when present.
    pub barcode: Option<String>,

    pub name: String,

    pub selling_price_cents: i64,

    /// Cost price, used for profit.
    pub purchase_price_cents: i64,

    /// On-hand quantity. Never negative.
    pub stock_quantity: i64,

    /// Low-stock threshold (inclusive).
    pub min_stock_level: i64,

    /// Promotional discount in basis points.
    pub discount_bps: u32,

    pub status: RecordStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_cents(self.purchase_price_cents)
    }

    #[inline]
    pub fn discount(&self) -> DiscountRate {
        DiscountRate::from_bps(self.discount_bps)
    }

    /// True iff a promotional discount is set.
    pub fn is_on_promotion(&self) -> bool {
        self.discount_bps > 0
    }

    /// True when stock is at or below the configured minimum.
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock_level
    }

    pub fn can_supply(&self, quantity: i64) -> bool {
        self.stock_quantity >= quantity
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    pub barcode: Option<String>,
    pub name: String,
    pub selling_price_cents: i64,
    pub purchase_price_cents: i64,
    pub initial_stock: i64,
    pub min_stock_level: i64,
    pub discount_bps: u32,
}

impl NewProduct {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(barcode) = &self.barcode {
            validate_barcode(barcode)?;
        }
        validate_name("name", &self.name)?;
        validate_price_cents("selling_price", self.selling_price_cents)?;
        validate_price_cents("purchase_price", self.purchase_price_cents)?;
        validate_min_stock_level(self.min_stock_level)?;
        validate_discount_bps(self.discount_bps)?;
        if self.initial_stock < 0 {
            return Err(ValidationError::OutOfRange {
                field: "initial_stock".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
        Ok(())
    }
}

/// The administrative fields of a product that may change after creation.
///
/// Stock is deliberately absent: it only moves through the inventory adjuster.
/// `barcode: Some(None)` clears the barcode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub barcode: Option<Option<String>>,
    pub name: Option<String>,
    pub selling_price_cents: Option<i64>,
    pub purchase_price_cents: Option<i64>,
    pub min_stock_level: Option<i64>,
    pub discount_bps: Option<u32>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.barcode.is_none()
            && self.name.is_none()
            && self.selling_price_cents.is_none()
            && self.purchase_price_cents.is_none()
            && self.min_stock_level.is_none()
            && self.discount_bps.is_none()
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(Some(barcode)) = &self.barcode {
            validate_barcode(barcode)?;
        }
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        if let Some(cents) = self.selling_price_cents {
            validate_price_cents("selling_price", cents)?;
        }
        if let Some(cents) = self.purchase_price_cents {
            validate_price_cents("purchase_price", cents)?;
        }
        if let Some(level) = self.min_stock_level {
            validate_min_stock_level(level)?;
        }
        if let Some(bps) = self.discount_bps {
            validate_discount_bps(bps)?;
        }
        Ok(())
    }
}

// =============================================================================
// Sale Status / Payment Method
// =============================================================================

/// The status of a persisted sale. `Completed → Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    /// Charged to the customer's running balance.
    Credit,
    Mixed,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Mixed => "mixed",
        }
    }

    pub fn is_credit(&self) -> bool {
        matches!(self, PaymentMethod::Credit)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: i64,
    pub sale_number: String,
    pub customer_id: Option<i64>,
    pub cashier_id: i64,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub amount_paid_cents: i64,
    pub change_cents: i64,
    pub status: SaleStatus,
    pub register_number: i64,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn is_completed(&self) -> bool {
        self.status == SaleStatus::Completed
    }

    /// Customer whose balance this sale charged, if any.
    pub fn credit_customer(&self) -> Option<i64> {
        if self.payment_method.is_credit() {
            self.customer_id
        } else {
            None
        }
    }

    /// Amount refunded for `quantity` more units of `item` when
    /// `already_returned` units of it have come back before.
    ///
    /// Priced from the original line (unit price and line discount), then
    /// scaled by `total / subtotal` so that a cart-level discount is shared
    /// across lines. The share is rounded on the cumulative quantity, so a
    /// line returned in several steps refunds exactly what returning it in
    /// one step would.
    pub fn refund_amount(&self, item: &SaleItem, already_returned: i64, quantity: i64) -> Money {
        self.refund_share(item, already_returned + quantity) - self.refund_share(item, already_returned)
    }

    fn refund_share(&self, item: &SaleItem, quantity: i64) -> Money {
        let line_refund = item.unit_price().discounted_line(item.discount(), quantity);
        if self.discount_cents == 0 || self.subtotal_cents == 0 {
            return line_refund;
        }
        let scaled = round_div(
            line_refund.cents() as i128 * self.total_cents as i128,
            self.subtotal_cents as i128,
        );
        Money::from_cents(scaled as i64)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line of a sale, frozen at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: i64,
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

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn discount(&self) -> DiscountRate {
        DiscountRate::from_bps(self.discount_bps)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    /// Unit price after the line discount, rounded to the cent.
    pub fn discounted_unit_price(&self) -> Money {
        self.unit_price().discounted_line(self.discount(), 1)
    }
}

// =============================================================================
// Returns
// =============================================================================

/// A compensating record against a completed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Return {
    pub id: i64,
    pub return_number: String,
    pub original_sale_id: i64,
    pub return_amount_cents: i64,
    /// Same method the sale was paid with.
    pub refund_method: PaymentMethod,
    pub processed_by: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Return {
    #[inline]
    pub fn return_amount(&self) -> Money {
        Money::from_cents(self.return_amount_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReturnItem {
    pub id: i64,
    pub return_id: i64,
    pub sale_item_id: i64,
    pub product_id: i64,
    pub quantity_returned: i64,
    /// Discounted unit price of the original line.
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

// =============================================================================
// Customer
// =============================================================================

/// A customer who may buy on credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: i64,
    pub full_name: String,
    pub phone: Option<String>,
    pub credit_limit_cents: i64,
    /// Outstanding balance owed to the store. Negative means credit in favor.
    pub current_credit_cents: i64,
    pub total_purchases_cents: i64,
    pub purchase_count: i64,
    pub last_purchase_date: Option<DateTime<Utc>>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn current_credit(&self) -> Money {
        Money::from_cents(self.current_credit_cents)
    }

    #[inline]
    pub fn credit_limit(&self) -> Money {
        Money::from_cents(self.credit_limit_cents)
    }

    /// Headroom left under the credit limit (may be negative).
    pub fn available_credit(&self) -> Money {
        self.credit_limit() - self.current_credit()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub full_name: String,
    pub phone: Option<String>,
    pub credit_limit_cents: i64,
}

impl NewCustomer {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name("full_name", &self.full_name)?;
        validate_price_cents("credit_limit", self.credit_limit_cents)
    }
}

/// Mutable customer fields. The credit balance only moves through the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerPatch {
    pub full_name: Option<String>,
    pub phone: Option<Option<String>>,
    pub credit_limit_cents: Option<i64>,
}

impl CustomerPatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.phone.is_none() && self.credit_limit_cents.is_none()
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(name) = &self.full_name {
            validate_name("full_name", name)?;
        }
        if let Some(limit) = self.credit_limit_cents {
            validate_price_cents("credit_limit", limit)?;
        }
        Ok(())
    }
}

// =============================================================================
// Credit Ledger
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CreditTransactionType {
    /// Goods taken on credit (+).
    CreditSale,
    /// Customer paid down the balance (-).
    Payment,
    /// Goods returned from a credit sale (-).
    ReturnCredit,
    /// Credit sale cancelled (-).
    SaleCancellation,
}

/// One append-only ledger entry. `amount_cents` is signed: positive entries
/// increase what the customer owes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CreditTransaction {
    pub id: i64,
    pub customer_id: i64,
    pub transaction_type: CreditTransactionType,
    pub amount_cents: i64,
    pub sale_id: Option<i64>,
    pub return_id: Option<i64>,
    pub processed_by: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

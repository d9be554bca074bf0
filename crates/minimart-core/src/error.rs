//! # Error Types
//!
//! Domain-specific error types for minimart-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  minimart-core (this file)                                             │
//! │  ├── CoreError        - Business rule violations (caller input)        │
//! │  └── ValidationError  - Field-level input failures                     │
//! │                                                                         │
//! │  minimart-db                                                           │
//! │  └── DbError          - Storage failures                               │
//! │                                                                         │
//! │  minimart-pos                                                          │
//! │  └── PosError         - Core | Persistence, mapped to outcomes         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `CoreError` is recoverable: it is raised before, or instead of, any
//! durable mutation.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Checkout attempted with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Not enough units on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (qty: 6)
    ///      │
    ///      ▼
    /// Check stock: available=5
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Olive Oil 1L", available: 5, requested: 6 }
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Tendered amount below the sale total for a non-credit payment.
    #[error("Insufficient payment: total {total}, paid {paid}")]
    InsufficientPayment { total: Money, paid: Money },

    /// Referenced entity does not exist (or is archived).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Sale is no longer in the completed state.
    #[error("Sale {sale_number} is already cancelled")]
    AlreadyCancelled { sale_number: String },

    /// Return request names a product that was not on the original sale.
    #[error("Product {product_id} is not part of sale {sale_id}")]
    ItemNotFound { sale_id: i64, product_id: i64 },

    /// Return quantity is non-positive or exceeds what is still returnable.
    #[error("Invalid return quantity for product {product_id}: requested {requested}, returnable {returnable}")]
    InvalidReturnQuantity {
        product_id: i64,
        requested: i64,
        returnable: i64,
    },

    /// Monetary amount outside the accepted range.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

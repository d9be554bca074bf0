//! # Engine Error Type
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Sale Engine                        │
//! │                                                                         │
//! │  Cart / validation ─── CoreError ──┐                                    │
//! │                                    ├──► PosError ──► OperationOutcome   │
//! │  Ledger store ──────── DbError ────┘        │         { success: false, │
//! │                                             │           message, code } │
//! │  pos.toml ─────────── Config* ──────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `Core` error means the caller asked for something the rules forbid and
//! nothing was written. A `Persistence` error means the store failed and the
//! operation was rolled back.

use serde::Serialize;
use thiserror::Error;

use minimart_core::{CoreError, ValidationError};
use minimart_db::DbError;

/// Errors raised by engine operations.
#[derive(Debug, Error)]
pub enum PosError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The ledger store failed; the operation was rolled back.
    #[error(transparent)]
    Persistence(#[from] DbError),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ValidationError> for PosError {
    fn from(err: ValidationError) -> Self {
        PosError::Core(CoreError::Validation(err))
    }
}

impl From<toml::de::Error> for PosError {
    fn from(err: toml::de::Error) -> Self {
        PosError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for PosError {
    fn from(err: toml::ser::Error) -> Self {
        PosError::ConfigSaveFailed(err.to_string())
    }
}

/// Stable machine-readable codes.
///
/// ## Usage at the caller boundary
/// ```rust,ignore
/// let outcome = OperationOutcome::from(pos.cancel_sale(id, "void").await);
/// match outcome.code {
///     Some(ErrorCode::AlreadyCancelled) => show_notice(&outcome.message),
///     Some(ErrorCode::DatabaseError) => show_error(&outcome.message),
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    EmptyCart,
    InsufficientStock,
    InsufficientPayment,
    AlreadyCancelled,
    /// Return names an unknown line or too many units.
    InvalidReturn,
    InvalidAmount,
    /// Cart line or quantity limit reached.
    CartLimit,
    DatabaseError,
    ConfigError,
}

impl PosError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PosError::Core(err) => match err {
                CoreError::EmptyCart => ErrorCode::EmptyCart,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::InsufficientPayment { .. } => ErrorCode::InsufficientPayment,
                CoreError::NotFound { .. } => ErrorCode::NotFound,
                CoreError::AlreadyCancelled { .. } => ErrorCode::AlreadyCancelled,
                CoreError::ItemNotFound { .. } | CoreError::InvalidReturnQuantity { .. } => {
                    ErrorCode::InvalidReturn
                }
                CoreError::InvalidAmount { .. } => ErrorCode::InvalidAmount,
                CoreError::CartTooLarge { .. } | CoreError::QuantityTooLarge { .. } => {
                    ErrorCode::CartLimit
                }
                CoreError::Validation(_) => ErrorCode::ValidationError,
            },
            PosError::Persistence(DbError::NotFound { .. }) => ErrorCode::NotFound,
            PosError::Persistence(DbError::UniqueViolation { .. }) => ErrorCode::ValidationError,
            PosError::Persistence(_) => ErrorCode::DatabaseError,
            PosError::ConfigLoadFailed(_)
            | PosError::ConfigSaveFailed(_)
            | PosError::InvalidConfig(_) => ErrorCode::ConfigError,
        }
    }

    /// True when the store, not the caller, is at fault.
    pub fn is_persistence(&self) -> bool {
        matches!(self, PosError::Persistence(_))
    }
}

pub type PosResult<T> = Result<T, PosError>;

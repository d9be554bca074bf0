//! # minimart-pos: Sale Engine for Minimart POS
//!
//! Commits sales, cancellations and returns as single transactions so that
//! stock levels and customer credit never disagree with the sale records.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        minimart-pos Architecture                        │
//! │                                                                         │
//! │   RegisterSession (one cashier, one Cart)                               │
//! │          │ checkout                                                     │
//! │          ▼                                                              │
//! │   ┌─────────────────────────────────────────────────────────────────┐  │
//! │   │                       PointOfSale                               │  │
//! │   │  write gate (Mutex) ── one stock/credit writer at a time        │  │
//! │   │                                                                 │  │
//! │   │  complete_sale ─┐                                               │  │
//! │   │  cancel_sale ───┼──► BEGIN ─► inventory ─► credit ─► COMMIT     │  │
//! │   │  process_return ┘               │           │                   │  │
//! │   │  pay_credit ────────────────────┼───────────┘                   │  │
//! │   │                                 ▼                               │  │
//! │   │                     low-stock alerts (broadcast, after commit)  │  │
//! │   └─────────────────────────────────────────────────────────────────┘  │
//! │          │                                                              │
//! │          ▼                                                              │
//! │   minimart-db repositories over one SqliteConnection / Transaction     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`orchestrator`] - Checkout, cancellation, returns, stock queries
//! - [`inventory`] - The only path that changes stock
//! - [`credit`] - Customer balance postings and reconciliation
//! - [`catalog`] - Product and customer administration
//! - [`session`] - Per-cashier cart handling
//! - [`outcome`] - Flat success/failure results for front ends
//! - [`numbering`] - Sale and return numbers
//! - [`config`] - `pos.toml` loading
//! - [`telemetry`] - Log subscriber setup
//!
//! ## Example
//! ```rust,ignore
//! use minimart_pos::{init_tracing, PointOfSale, PosConfig, RegisterSession};
//! use minimart_core::{Money, PaymentMethod};
//!
//! let config = PosConfig::load(None)?;
//! init_tracing(&config.logging.filter);
//!
//! let pos = PointOfSale::open(&config).await?;
//! let mut session = RegisterSession::new(&pos, cashier_id);
//! session.add_by_barcode("6130000000017", 2).await?;
//! let receipt = session
//!     .checkout(PaymentMethod::Cash, Some(Money::from_cents(5000)), None)
//!     .await?;
//! println!("{} change {}", receipt.sale_number, receipt.change);
//! ```

pub mod catalog;
pub mod config;
pub mod credit;
pub mod error;
pub mod inventory;
pub mod numbering;
pub mod orchestrator;
pub mod outcome;
pub mod session;
pub mod telemetry;

pub use config::PosConfig;
pub use credit::{CreditPayment, CreditReconciliation};
pub use error::{ErrorCode, PosError, PosResult};
pub use inventory::{LowStockAlert, StockChange, StockReason};
pub use orchestrator::{
    CancelledSale, CheckoutRequest, PointOfSale, ReturnLine, ReturnReceipt, ReturnedLine,
    SaleDetails, SaleLineView, SalePhase, SaleReceipt,
};
pub use outcome::{Describe, OperationOutcome};
pub use session::RegisterSession;
pub use telemetry::{init_tracing, DEFAULT_LOG_FILTER};

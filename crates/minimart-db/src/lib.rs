//! # minimart-db: Ledger Store
//!
//! SQLite persistence for the Minimart register.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        minimart-db Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                        Database                                  │   │
//! │  │  • SqlitePool (WAL, foreign keys)                                │   │
//! │  │  • Embedded migrations                                           │   │
//! │  │  • begin() → Transaction                                         │   │
//! │  └──────────────────────────┬──────────────────────────────────────┘   │
//! │                             │                                           │
//! │     ┌────────────┬──────────┼───────────┬──────────────┐               │
//! │     ▼            ▼          ▼           ▼              ▼               │
//! │  product     customer     sale       returns        credit             │
//! │                                                                         │
//! │  Every repository exposes free functions over &mut SqliteConnection    │
//! │  so several of them can share one transaction.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use minimart_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("minimart.db")).await?;
//! let product = db.products().get_by_barcode("6130000000017").await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::credit::{CreditTransactionRepository, NewCreditTransaction};
pub use repository::customer::CustomerRepository;
pub use repository::product::ProductRepository;
pub use repository::returns::{NewReturn, NewReturnItem, ReturnRepository, ReturnedQuantity};
pub use repository::sale::{NewSale, NewSaleItem, SaleRepository};

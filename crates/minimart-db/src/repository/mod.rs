//! # Repositories
//!
//! One module per table family.
//!
//! ## Two Entry Points
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Free functions         fn(conn: &mut SqliteConnection, ...)           │
//! │     used inside a caller-owned transaction (checkout, cancel, return)  │
//! │                                                                         │
//! │  XRepository { pool }   acquires a connection per call                 │
//! │     used for standalone lookups and catalog administration             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod credit;
pub mod customer;
pub mod product;
pub mod returns;
pub mod sale;

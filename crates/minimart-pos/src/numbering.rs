//! Human-readable document numbers.
//!
//! ```text
//! VNT-20240301093000-1      sale, register 1
//! VNT-20240301093000-1-2    second sale in the same second
//! RET-20240301101500        return
//! ```
//!
//! Timestamps are UTC from the engine clock. Uniqueness is checked on the
//! caller's transaction, which the write gate keeps single-writer.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::error::PosResult;
use minimart_db::repository::{returns, sale};

const STAMP: &str = "%Y%m%d%H%M%S";

pub fn sale_number_base(now: DateTime<Utc>, register_number: i64) -> String {
    format!("VNT-{}-{}", now.format(STAMP), register_number)
}

pub fn return_number_base(now: DateTime<Utc>) -> String {
    format!("RET-{}", now.format(STAMP))
}

fn with_suffix(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

pub async fn next_sale_number(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
    register_number: i64,
) -> PosResult<String> {
    let base = sale_number_base(now, register_number);
    let mut attempt = 1;
    loop {
        let candidate = with_suffix(&base, attempt);
        if !sale::sale_number_exists(conn, &candidate).await? {
            return Ok(candidate);
        }
        attempt += 1;
    }
}

pub async fn next_return_number(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> PosResult<String> {
    let base = return_number_base(now);
    let mut attempt = 1;
    loop {
        let candidate = with_suffix(&base, attempt);
        if !returns::return_number_exists(conn, &candidate).await? {
            return Ok(candidate);
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_number_formats() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(sale_number_base(now, 1), "VNT-20240301093000-1");
        assert_eq!(return_number_base(now), "RET-20240301093000");
        assert_eq!(with_suffix("RET-20240301093000", 1), "RET-20240301093000");
        assert_eq!(with_suffix("RET-20240301093000", 3), "RET-20240301093000-3");
    }
}

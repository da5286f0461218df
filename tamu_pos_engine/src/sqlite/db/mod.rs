//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod food_items;
pub mod order_lines;
pub mod order_numbers;
pub mod orders;
pub mod payments;
pub mod restaurants;

const SQLITE_DB_URL: &str = "sqlite://data/tamu_pos.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("TPOS_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ TPOS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options =
        SqliteConnectOptions::from_str(url)?.create_if_missing(true).foreign_keys(true).busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// Errors that mean "another writer got there first". The write can be retried from scratch.
///
/// * A unique constraint violation, e.g. two orders allocated the same order number.
/// * SQLite reporting the database as busy or locked.
pub fn is_write_conflict(e: &SqlxError) -> bool {
    match e {
        SqlxError::Database(db_err) => {
            if db_err.is_unique_violation() {
                return true;
            }
            let busy_code = db_err.code().map(|c| matches!(c.as_ref(), "5" | "6" | "261" | "262" | "517"));
            busy_code.unwrap_or(false) || db_err.message().contains("database is locked")
        },
        _ => false,
    }
}

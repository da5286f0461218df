//! SQLite backend for the Tamu POS engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;

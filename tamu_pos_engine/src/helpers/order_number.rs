//! Pure helpers for the `ORD-YYYYMMDD-NNNN` order number scheme. The database side of allocation lives in
//! `sqlite::db::order_numbers`.
use chrono::{DateTime, Utc};
use regex::Regex;

/// How many sequential candidates are tried before falling back to a timestamp suffix.
pub const MAX_ALLOCATION_ATTEMPTS: u64 = 10;

/// `ORD-<YYYYMMDD>` for the (UTC) day of `now`.
pub fn order_number_prefix(now: DateTime<Utc>) -> String {
    format!("ORD-{}", now.format("%Y%m%d"))
}

pub fn format_order_number(prefix: &str, counter: u64) -> String {
    format!("{prefix}-{counter:04}")
}

/// Extracts the counter from an order number, provided it carries the given date prefix.
pub fn parse_order_counter(order_number: &str, prefix: &str) -> Option<u64> {
    let re = Regex::new(r"^(ORD-\d{8})-(\d{4,})$").ok()?;
    let captures = re.captures(order_number)?;
    if captures.get(1)?.as_str() != prefix {
        return None;
    }
    captures.get(2)?.as_str().parse().ok()
}

/// The next counter to try. Never less than `attempt`, so that repeated collisions always make progress even if the
/// "last" number we read is stale.
pub fn candidate_counter(last: Option<u64>, attempt: u64) -> u64 {
    let next = last.map(|n| n.saturating_add(1)).unwrap_or(1);
    next.max(attempt)
}

/// Used once the sequential attempts are exhausted: the last four digits of the epoch milliseconds.
pub fn fallback_order_number(prefix: &str, now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().rem_euclid(10_000);
    format!("{prefix}-{millis:04}")
}

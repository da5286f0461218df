//! Optimistic order number allocation.
//!
//! No locks are taken. The allocator proposes a number that is free *now*; the `UNIQUE (restaurant_id, order_number)`
//! constraint is what actually guarantees uniqueness, and `create_order` retries the whole allocation if its insert
//! loses a race.
use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::RestaurantId,
    helpers::{
        candidate_counter,
        fallback_order_number,
        format_order_number,
        order_number_prefix,
        parse_order_counter,
        MAX_ALLOCATION_ATTEMPTS,
    },
};

/// The greatest order number the restaurant has issued with the given date prefix. Longer numbers sort after shorter
/// ones, so `-10000` beats `-9999`.
pub async fn last_order_number(
    restaurant_id: &RestaurantId,
    prefix: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<String>, sqlx::Error> {
    let number = sqlx::query_scalar(
        r#"
            SELECT order_number FROM orders
            WHERE restaurant_id = $1 AND order_number LIKE $2
            ORDER BY LENGTH(order_number) DESC, order_number DESC
            LIMIT 1
        "#,
    )
    .bind(restaurant_id.as_str())
    .bind(format!("{prefix}-%"))
    .fetch_optional(conn)
    .await?;
    Ok(number)
}

pub async fn order_number_exists(
    restaurant_id: &RestaurantId,
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE restaurant_id = $1 AND order_number = $2")
        .bind(restaurant_id.as_str())
        .bind(order_number)
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

/// Proposes the next free order number for the restaurant on the (UTC) day of `now`.
pub async fn allocate_order_number(
    restaurant_id: &RestaurantId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<String, sqlx::Error> {
    let prefix = order_number_prefix(now);
    for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
        let last = last_order_number(restaurant_id, &prefix, &mut *conn).await?;
        let last_counter = last.as_deref().and_then(|n| parse_order_counter(n, &prefix));
        let candidate = format_order_number(&prefix, candidate_counter(last_counter, attempt));
        if !order_number_exists(restaurant_id, &candidate, &mut *conn).await? {
            trace!("🧾️ Allocated {candidate} for restaurant {restaurant_id} on attempt {attempt}");
            return Ok(candidate);
        }
        debug!("🧾️ Order number {candidate} is taken. Attempt {attempt} of {MAX_ALLOCATION_ATTEMPTS}");
    }
    let fallback = fallback_order_number(&prefix, Utc::now());
    warn!(
        "🧾️ Could not find a sequential order number for restaurant {restaurant_id} after {MAX_ALLOCATION_ATTEMPTS} \
         attempts. Falling back to {fallback}"
    );
    Ok(fallback)
}

use log::*;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, PaymentOutcome, RestaurantId},
    helpers::OrderTotals,
    order_objects::{OrderDetailsUpdate, OrderQueryFilter},
    sqlite::db::order_lines,
    traits::PosEngineError,
};

/// Inserts the order header. This is not atomic. Embed the call in a transaction along with the line inserts, and pass
/// `&mut tx` as the connection argument.
pub async fn insert_order(
    id: &OrderId,
    order_number: &str,
    restaurant_id: &RestaurantId,
    order: &NewOrder,
    totals: OrderTotals,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                id,
                order_number,
                restaurant_id,
                mode,
                customer_name,
                table_number,
                subtotal,
                vat,
                catering_levy,
                total
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(id.as_str())
    .bind(order_number)
    .bind(restaurant_id.as_str())
    .bind(order.mode)
    .bind(&order.customer_name)
    .bind(&order.table_number)
    .bind(totals.subtotal)
    .bind(totals.vat)
    .bind(totals.catering_levy)
    .bind(totals.total)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order(
    restaurant_id: &RestaurantId,
    id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND restaurant_id = $2")
        .bind(id.as_str())
        .bind(restaurant_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_id(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Finds the order that owns the payment attempt with the given checkout reference.
pub async fn fetch_order_by_transaction_id(
    checkout_request_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE id = (SELECT order_id FROM payment_attempts WHERE checkout_request_id = $1)
               OR transaction_id = $1
            LIMIT 1
        "#,
    )
    .bind(checkout_request_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in descending order (newest first)
pub async fn search_orders(
    restaurant_id: &RestaurantId,
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders WHERE restaurant_id = ");
    builder.push_bind(restaurant_id.as_str());
    if !query.statuses.is_empty() {
        builder.push(" AND status IN (");
        let mut in_clause = builder.separated(", ");
        for status in query.statuses {
            in_clause.push_bind(status);
        }
        in_clause.push_unseparated(")");
    }
    if let Some(mode) = query.mode {
        builder.push(" AND mode = ");
        builder.push_bind(mode);
    }
    builder.push(" ORDER BY created_at DESC, LENGTH(order_number) DESC, order_number DESC");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {}", orders.len());
    Ok(orders)
}

/// Fetches the order for editing, taking the database write lock in the process. The first statement in the
/// transaction is a write, so SQLite serialises concurrent editors rather than failing one of them on upgrade.
pub async fn lock_order(
    restaurant_id: &RestaurantId,
    id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND restaurant_id = $2 RETURNING *",
    )
    .bind(id.as_str())
    .bind(restaurant_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Like [`lock_order`], but fails unless the order exists in scope and is still `Open`.
pub async fn lock_editable_order(
    restaurant_id: &RestaurantId,
    id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Order, PosEngineError> {
    let order = lock_order(restaurant_id, id, conn).await?.ok_or_else(|| PosEngineError::OrderNotFound(id.clone()))?;
    if order.status.is_editable() {
        Ok(order)
    } else {
        Err(PosEngineError::OrderFrozen { order_id: order.id, status: order.status })
    }
}

pub async fn update_details(
    restaurant_id: &RestaurantId,
    id: &OrderId,
    update: OrderDetailsUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                customer_name = COALESCE($1, customer_name),
                table_number = COALESCE($2, table_number),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND restaurant_id = $4 AND status IN ('OPEN', 'PENDING_PAYMENT')
            RETURNING *
        "#,
    )
    .bind(update.customer_name)
    .bind(update.table_number)
    .bind(id.as_str())
    .bind(restaurant_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Recomputes the order's money columns from its lines.
pub async fn recalculate_totals(id: &OrderId, conn: &mut SqliteConnection) -> Result<Order, PosEngineError> {
    let subtotal = order_lines::subtotal(id, &mut *conn).await?;
    let totals = OrderTotals::from_subtotal(subtotal)?;
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET subtotal = $1, vat = $2, catering_levy = $3, total = $4, updated_at = CURRENT_TIMESTAMP
            WHERE id = $5
            RETURNING *
        "#,
    )
    .bind(totals.subtotal)
    .bind(totals.vat)
    .bind(totals.catering_levy)
    .bind(totals.total)
    .bind(id.as_str())
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Totals for order {id} recalculated: {totals:?}");
    Ok(order)
}

/// Sets the status to `new_status` if, and only if, the order is currently in one of the statuses the state machine
/// allows the transition from. Returns `None` if nothing was updated.
pub async fn transition_status(
    restaurant_id: &RestaurantId,
    id: &OrderId,
    new_status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let allowed = new_status.allowed_predecessors();
    if allowed.is_empty() {
        return Ok(None);
    }
    let mut builder = QueryBuilder::new("UPDATE orders SET status = ");
    builder.push_bind(new_status);
    builder.push(", updated_at = CURRENT_TIMESTAMP WHERE id = ");
    builder.push_bind(id.as_str());
    builder.push(" AND restaurant_id = ");
    builder.push_bind(restaurant_id.as_str());
    builder.push(" AND status IN (");
    let mut in_clause = builder.separated(", ");
    for status in allowed {
        in_clause.push_bind(*status);
    }
    in_clause.push_unseparated(") RETURNING *");
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}

/// Points the order at a new checkout reference and marks it as waiting for payment.
pub async fn set_pending_payment(
    restaurant_id: &RestaurantId,
    id: &OrderId,
    checkout_request_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = 'PENDING_PAYMENT',
                transaction_id = $1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND restaurant_id = $3 AND status IN ('OPEN', 'PENDING_PAYMENT')
            RETURNING *
        "#,
    )
    .bind(checkout_request_id)
    .bind(id.as_str())
    .bind(restaurant_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// The conditional update at the heart of payment reconciliation. The order only changes if it is not yet terminal,
/// and, for a failure, only if `checkout_request_id` is still the current attempt. A success from any attempt wins and
/// becomes the order's `transaction_id`.
///
/// Returns `None` if nothing was updated.
pub async fn apply_payment_result(
    id: &OrderId,
    checkout_request_id: &str,
    outcome: &PaymentOutcome,
    payment_method: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                payment_method = CASE WHEN $2 THEN $3 ELSE payment_method END,
                transaction_id = CASE WHEN $2 THEN $4 ELSE transaction_id END,
                callback_received = 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $5
              AND status IN ('OPEN', 'PENDING_PAYMENT')
              AND ($2 OR transaction_id = $4)
            RETURNING *
        "#,
    )
    .bind(outcome.target_status())
    .bind(outcome.success)
    .bind(payment_method)
    .bind(checkout_request_id)
    .bind(id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Deletes the order. Lines and payment attempts go with it. Returns false if the order was not found in scope.
pub async fn delete_order(
    restaurant_id: &RestaurantId,
    id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND restaurant_id = $2")
        .bind(id.as_str())
        .bind(restaurant_id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

use sqlx::SqliteConnection;

use crate::db_types::{NewPaymentAttempt, OrderId, PaymentAttempt, RestaurantId};

pub async fn insert_attempt(
    restaurant_id: &RestaurantId,
    order_id: &OrderId,
    attempt: &NewPaymentAttempt,
    conn: &mut SqliteConnection,
) -> Result<PaymentAttempt, sqlx::Error> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO payment_attempts (
                checkout_request_id,
                merchant_request_id,
                order_id,
                restaurant_id,
                phone_number,
                amount
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(&attempt.checkout_request_id)
    .bind(&attempt.merchant_request_id)
    .bind(order_id.as_str())
    .bind(restaurant_id.as_str())
    .bind(&attempt.phone_number)
    .bind(attempt.amount)
    .fetch_one(conn)
    .await?;
    Ok(result)
}

pub async fn fetch_attempt(
    checkout_request_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentAttempt>, sqlx::Error> {
    let result = sqlx::query_as("SELECT * FROM payment_attempts WHERE checkout_request_id = $1")
        .bind(checkout_request_id)
        .fetch_optional(conn)
        .await?;
    Ok(result)
}

pub async fn fetch_attempts_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentAttempt>, sqlx::Error> {
    let result = sqlx::query_as("SELECT * FROM payment_attempts WHERE order_id = $1 ORDER BY created_at, rowid")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(result)
}

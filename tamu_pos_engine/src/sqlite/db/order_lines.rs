use sqlx::SqliteConnection;
use tamu_common::Kes;

use crate::{
    db_types::{FoodItem, NewOrderLine, OrderId, OrderLine},
    helpers::check_quantity,
    traits::PosEngineError,
};

/// A requested line, with the menu name and price captured at the time of ordering.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub food_item_id: String,
    pub item_name: String,
    pub quantity: i64,
    pub notes: Option<String>,
    pub unit_price: Kes,
}

impl PricedLine {
    pub fn new(item: &FoodItem, line: &NewOrderLine) -> Result<Self, PosEngineError> {
        check_quantity(&line.food_item_id, line.quantity)?;
        if !item.available {
            return Err(PosEngineError::FoodItemUnavailable(item.name.clone()));
        }
        Ok(Self {
            food_item_id: item.id.clone(),
            item_name: item.name.clone(),
            quantity: line.quantity,
            notes: line.notes.clone(),
            unit_price: item.price,
        })
    }
}

pub async fn insert_line(
    order_id: &OrderId,
    line: &PricedLine,
    conn: &mut SqliteConnection,
) -> Result<OrderLine, sqlx::Error> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO order_lines (order_id, food_item_id, item_name, quantity, notes, price_at_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(&line.food_item_id)
    .bind(&line.item_name)
    .bind(line.quantity)
    .bind(&line.notes)
    .bind(line.unit_price)
    .fetch_one(conn)
    .await?;
    Ok(result)
}

pub async fn fetch_lines(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderLine>, sqlx::Error> {
    let lines = sqlx::query_as("SELECT * FROM order_lines WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

/// Returns false if the line does not exist on this order.
pub async fn update_quantity(
    order_id: &OrderId,
    line_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE order_lines SET quantity = $1 WHERE id = $2 AND order_id = $3")
        .bind(quantity)
        .bind(line_id)
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns false if the line does not exist on this order.
pub async fn delete_line(order_id: &OrderId, line_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM order_lines WHERE id = $1 AND order_id = $2")
        .bind(line_id)
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn subtotal(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Kes, sqlx::Error> {
    let cents: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(price_at_order * quantity), 0) FROM order_lines WHERE order_id = $1")
            .bind(order_id.as_str())
            .fetch_one(conn)
            .await?;
    Ok(Kes::from_cents(cents))
}

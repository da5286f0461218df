use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{FoodItem, NewFoodItem, RestaurantId};

pub async fn insert_food_item(item: NewFoodItem, conn: &mut SqliteConnection) -> Result<FoodItem, sqlx::Error> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO food_items (id, restaurant_id, name, price, available)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, restaurant_id, name, price, available;
        "#,
    )
    .bind(item.id)
    .bind(item.restaurant_id.as_str())
    .bind(item.name)
    .bind(item.price)
    .bind(item.available)
    .fetch_one(conn)
    .await?;
    Ok(result)
}

pub async fn fetch_food_item(
    restaurant_id: &RestaurantId,
    id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<FoodItem>, sqlx::Error> {
    let result = sqlx::query_as(
        "SELECT id, restaurant_id, name, price, available FROM food_items WHERE id = $1 AND restaurant_id = $2",
    )
    .bind(id)
    .bind(restaurant_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Fetches the menu items with the given ids. Items belonging to other restaurants are silently excluded.
pub async fn fetch_food_items(
    restaurant_id: &RestaurantId,
    ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<FoodItem>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder =
        QueryBuilder::new("SELECT id, restaurant_id, name, price, available FROM food_items WHERE restaurant_id = ");
    builder.push_bind(restaurant_id.as_str());
    builder.push(" AND id IN (");
    let mut in_clause = builder.separated(", ");
    for id in ids {
        in_clause.push_bind(id.as_str());
    }
    in_clause.push_unseparated(")");
    let items = builder.build_query_as::<FoodItem>().fetch_all(conn).await?;
    Ok(items)
}

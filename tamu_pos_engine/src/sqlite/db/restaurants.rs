use sqlx::{FromRow, SqliteConnection};
use tamu_common::Secret;

use crate::db_types::{GatewayCredentials, NewRestaurant, Restaurant, RestaurantId};

#[derive(FromRow)]
struct CredentialsRow {
    mpesa_consumer_key: Option<String>,
    mpesa_consumer_secret: Option<String>,
    mpesa_passkey: Option<String>,
    mpesa_shortcode: Option<String>,
}

impl From<CredentialsRow> for GatewayCredentials {
    fn from(row: CredentialsRow) -> Self {
        Self {
            consumer_key: row.mpesa_consumer_key.unwrap_or_default(),
            consumer_secret: Secret::new(row.mpesa_consumer_secret.unwrap_or_default()),
            passkey: Secret::new(row.mpesa_passkey.unwrap_or_default()),
            shortcode: row.mpesa_shortcode.unwrap_or_default(),
        }
    }
}

pub async fn insert_restaurant(
    restaurant: NewRestaurant,
    conn: &mut SqliteConnection,
) -> Result<Restaurant, sqlx::Error> {
    let credentials = restaurant.credentials.unwrap_or_default();
    let result = sqlx::query_as(
        r#"
            INSERT INTO restaurants (id, name, mpesa_consumer_key, mpesa_consumer_secret, mpesa_passkey, mpesa_shortcode)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, created_at;
        "#,
    )
    .bind(restaurant.id)
    .bind(restaurant.name)
    .bind(credentials.consumer_key)
    .bind(credentials.consumer_secret.reveal())
    .bind(credentials.passkey.reveal())
    .bind(credentials.shortcode)
    .fetch_one(conn)
    .await?;
    Ok(result)
}

pub async fn fetch_restaurant(
    id: &RestaurantId,
    conn: &mut SqliteConnection,
) -> Result<Option<Restaurant>, sqlx::Error> {
    let result = sqlx::query_as("SELECT id, name, created_at FROM restaurants WHERE id = $1")
        .bind(id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(result)
}

pub async fn fetch_credentials(
    id: &RestaurantId,
    conn: &mut SqliteConnection,
) -> Result<Option<GatewayCredentials>, sqlx::Error> {
    let row: Option<CredentialsRow> = sqlx::query_as(
        r#"
            SELECT mpesa_consumer_key, mpesa_consumer_secret, mpesa_passkey, mpesa_shortcode
            FROM restaurants WHERE id = $1
        "#,
    )
    .bind(id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(row.map(GatewayCredentials::from))
}

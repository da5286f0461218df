//! A small, fixed data set that most tests start from.
use tamu_common::Kes;

use crate::{
    db_types::{GatewayCredentials, NewFoodItem, NewRestaurant, RestaurantId},
    SqliteDatabase,
};

pub const RESTAURANT_ID: &str = "rest-1";
pub const OTHER_RESTAURANT_ID: &str = "rest-2";
/// Has no payment credentials configured
pub const UNCONFIGURED_RESTAURANT_ID: &str = "rest-3";

/// Nyama choma, KES 100
pub const NYAMA_CHOMA: &str = "food-nyama";
/// Pilau, KES 200
pub const PILAU: &str = "food-pilau";
/// Chapati, KES 30. Sold out.
pub const CHAPATI: &str = "food-chapati";
/// Belongs to the other restaurant. KES 150
pub const UGALI: &str = "food-ugali";

pub fn test_credentials() -> GatewayCredentials {
    GatewayCredentials::new("test-key", "test-secret", "test-passkey", "174379")
}

pub fn restaurant_id() -> RestaurantId {
    RestaurantId::from(RESTAURANT_ID)
}

pub fn other_restaurant_id() -> RestaurantId {
    RestaurantId::from(OTHER_RESTAURANT_ID)
}

pub async fn seed_restaurants(db: &SqliteDatabase) {
    db.insert_restaurant(NewRestaurant::new(RESTAURANT_ID, "Mama Oliech").with_credentials(test_credentials()))
        .await
        .expect("Error seeding restaurant");
    db.insert_restaurant(NewRestaurant::new(OTHER_RESTAURANT_ID, "Kilimanjaro Grill").with_credentials(
        GatewayCredentials::new("other-key", "other-secret", "other-passkey", "600100"),
    ))
    .await
    .expect("Error seeding restaurant");
    db.insert_restaurant(NewRestaurant::new(UNCONFIGURED_RESTAURANT_ID, "Java House"))
        .await
        .expect("Error seeding restaurant");

    let items = [
        NewFoodItem::new(NYAMA_CHOMA, restaurant_id(), "Nyama choma", Kes::from_shillings(100)),
        NewFoodItem::new(PILAU, restaurant_id(), "Pilau", Kes::from_shillings(200)),
        NewFoodItem::new(CHAPATI, restaurant_id(), "Chapati", Kes::from_shillings(30)).unavailable(),
        NewFoodItem::new(UGALI, other_restaurant_id(), "Ugali", Kes::from_shillings(150)),
    ];
    for item in items {
        db.insert_food_item(item).await.expect("Error seeding food item");
    }
}

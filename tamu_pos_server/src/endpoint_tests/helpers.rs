use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use chrono::{Duration, TimeZone, Utc};
use log::debug;
use tamu_common::Kes;
use tamu_pos_engine::db_types::{
    GatewayCredentials,
    Order,
    OrderId,
    OrderLine,
    OrderMode,
    OrderStatusType,
    PaymentAttempt,
    RestaurantId,
};

use crate::{
    auth::{JwtClaims, TokenIssuer, TokenValidator},
    config::AuthConfig,
    server::{json_config, path_config, query_config},
};

// DO NOT re-use this secret anywhere.
const TEST_JWT_SECRET: &str = "d8f51c22a0a94e7aa7c3b6e4f0e2";

pub const RESTAURANT: &str = "rest-1";

pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new(TEST_JWT_SECRET)
}

pub fn issue_token(claims: JwtClaims) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(&claims).expect("Failed to sign token")
}

pub fn valid_token() -> String {
    issue_token(cashier_claims(Duration::days(1)))
}

pub fn cashier_claims(valid_for: Duration) -> JwtClaims {
    JwtClaims::new("user-1", "cashier@nyama.co.ke", "CASHIER", RestaurantId::from(RESTAURANT), valid_for)
}

/// Runs one request against the `/api` scope, with the routes and data that `configure` registers.
pub async fn send_request<F>(req: TestRequest, token: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let mut req = req;
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    let app = App::new()
        .app_data(web::Data::new(TokenValidator::new(&get_auth_config())))
        .app_data(json_config())
        .app_data(path_config())
        .app_data(query_config())
        .service(web::scope("/api").configure(configure));
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

pub fn get_request(path: &str) -> TestRequest {
    TestRequest::get().uri(path)
}

pub fn timestamp() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 18, 12, 30, 0).unwrap()
}

/// The happy-path order: 2 x nyama choma at 100 and 1 x pilau at 200.
pub fn order(status: OrderStatusType) -> Order {
    Order {
        id: OrderId::from("order-1"),
        order_number: "ORD-20241018-0001".to_string(),
        restaurant_id: RestaurantId::from(RESTAURANT),
        mode: OrderMode::TakeAway,
        status,
        customer_name: Some("Wanjiru".to_string()),
        table_number: None,
        subtotal: Kes::from_shillings(400),
        vat: Kes::from_shillings(64),
        catering_levy: Kes::from_shillings(8),
        total: Kes::from_shillings(472),
        transaction_id: None,
        payment_method: None,
        callback_received: false,
        created_at: timestamp(),
        updated_at: timestamp(),
    }
}

pub fn order_lines() -> Vec<OrderLine> {
    vec![
        OrderLine {
            id: 1,
            order_id: OrderId::from("order-1"),
            food_item_id: "food-nyama".to_string(),
            item_name: "Nyama Choma".to_string(),
            quantity: 2,
            notes: None,
            price_at_order: Kes::from_shillings(100),
            created_at: timestamp(),
        },
        OrderLine {
            id: 2,
            order_id: OrderId::from("order-1"),
            food_item_id: "food-pilau".to_string(),
            item_name: "Pilau".to_string(),
            quantity: 1,
            notes: Some("extra kachumbari".to_string()),
            price_at_order: Kes::from_shillings(200),
            created_at: timestamp(),
        },
    ]
}

pub fn pending(checkout_request_id: &str) -> Order {
    let mut order = order(OrderStatusType::PendingPayment);
    order.transaction_id = Some(checkout_request_id.to_string());
    order
}

pub fn paid(checkout_request_id: &str) -> Order {
    let mut order = pending(checkout_request_id);
    order.status = OrderStatusType::Paid;
    order.payment_method = Some("M-Pesa".to_string());
    order.callback_received = true;
    order
}

pub fn attempt(checkout_request_id: &str) -> PaymentAttempt {
    PaymentAttempt {
        checkout_request_id: checkout_request_id.to_string(),
        merchant_request_id: "mr-1".to_string(),
        order_id: OrderId::from("order-1"),
        restaurant_id: RestaurantId::from(RESTAURANT),
        phone_number: "254712345678".to_string(),
        amount: Kes::from_shillings(472),
        created_at: timestamp(),
    }
}

pub fn credentials() -> GatewayCredentials {
    GatewayCredentials::new("key", "secret", "passkey", "174379")
}

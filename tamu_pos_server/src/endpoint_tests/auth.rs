use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Duration;
use tamu_pos_engine::{db_types::OrderStatusType, events::EventProducers, OrderFlowApi};

use super::{
    helpers::{cashier_claims, get_request, issue_token, order, send_request, valid_token, RESTAURANT},
    mocks::MockPosBackend,
};
use crate::routes::SearchOrdersRoute;

fn configure(cfg: &mut ServiceConfig) {
    let mut backend = MockPosBackend::new();
    backend
        .expect_search_orders()
        .withf(|restaurant_id, _| restaurant_id.as_str() == RESTAURANT)
        .returning(|_, _| Ok(vec![order(OrderStatusType::Open)]));
    let api = OrderFlowApi::new(backend, EventProducers::default());
    cfg.service(SearchOrdersRoute::<MockPosBackend>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn no_token() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(get_request("/api/orders"), "", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. No access token was provided."}"#);
}

#[actix_web::test]
async fn not_a_bearer_token() {
    let _ = env_logger::try_init().ok();
    let req = get_request("/api/orders").insert_header(("Authorization", "Basic a2V5OnNlY3JldA=="));
    let (status, body) = send_request(req, "", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Expected a Bearer token"), "{body}");
}

#[actix_web::test]
async fn tampered_token() {
    let _ = env_logger::try_init().ok();
    let mut token = valid_token();
    token.replace_range(token.len() - 10..token.len() - 5, "AAAAA");
    let (status, body) = send_request(get_request("/api/orders"), &token, configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.starts_with(r#"{"error":"Authentication Error. The access token is invalid."#), "{body}");
}

#[actix_web::test]
async fn expired_token() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(cashier_claims(Duration::hours(-3)));
    let (status, body) = send_request(get_request("/api/orders"), &token, configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. The access token has expired."}"#);
}

#[actix_web::test]
async fn valid_token_is_scoped_to_its_restaurant() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(get_request("/api/orders"), &valid_token(), configure).await;
    assert_eq!(status, StatusCode::OK);
    let orders: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(orders[0]["orderNumber"], "ORD-20241018-0001");
    assert_eq!(orders[0]["restaurantId"], RESTAURANT);
}

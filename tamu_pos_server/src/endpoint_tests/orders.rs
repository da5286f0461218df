use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::{json, Value};
use tamu_common::Kes;
use tamu_pos_engine::{
    db_types::{OrderId, OrderMode, OrderStatusType, StatusUpdate},
    events::EventProducers,
    OrderFlowApi,
    PosEngineError,
};

use super::{
    helpers::{get_request, order, order_lines, paid, send_request, valid_token, RESTAURANT},
    mocks::MockPosBackend,
};
use crate::routes::{
    AddOrderLineRoute,
    CancelOrderRoute,
    CreateOrderRoute,
    DeleteOrderRoute,
    FetchOrderRoute,
    OrderPaymentStatusRoute,
    RemoveOrderLineRoute,
    SearchOrdersRoute,
    UpdateOrderLineRoute,
};

fn register(cfg: &mut ServiceConfig, backend: MockPosBackend) {
    let api = OrderFlowApi::new(backend, EventProducers::default());
    cfg.service(OrderPaymentStatusRoute::<MockPosBackend>::new())
        .service(SearchOrdersRoute::<MockPosBackend>::new())
        .service(CreateOrderRoute::<MockPosBackend>::new())
        .service(FetchOrderRoute::<MockPosBackend>::new())
        .service(DeleteOrderRoute::<MockPosBackend>::new())
        .service(CancelOrderRoute::<MockPosBackend>::new())
        .service(AddOrderLineRoute::<MockPosBackend>::new())
        .service(UpdateOrderLineRoute::<MockPosBackend>::new())
        .service(RemoveOrderLineRoute::<MockPosBackend>::new())
        .app_data(web::Data::new(api));
}

#[actix_web::test]
async fn create_order() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend
            .expect_create_order()
            .withf(|restaurant_id, order| {
                restaurant_id.as_str() == RESTAURANT && order.mode == OrderMode::TakeAway && order.items.len() == 2
            })
            .times(1)
            .returning(|_, _| Ok(order(OrderStatusType::Open)));
        backend.expect_fetch_order().returning(|_, _| Ok(Some(order(OrderStatusType::Open))));
        backend.expect_fetch_order_lines().returning(|_| Ok(order_lines()));
        register(cfg, backend);
    };
    let body = json!({
        "mode": "TAKE_AWAY",
        "customerName": "Wanjiru",
        "items": [
            { "foodItemId": "food-nyama", "quantity": 2 },
            { "foodItemId": "food-pilau", "quantity": 1, "notes": "extra kachumbari" }
        ]
    });
    let req = TestRequest::post().uri("/api/orders").set_json(body);
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["orderNumber"], "ORD-20241018-0001");
    assert_eq!(order["status"], "OPEN");
    assert_eq!(order["subtotal"], 400.0);
    assert_eq!(order["vat"], 64.0);
    assert_eq!(order["cateringLevy"], 8.0);
    assert_eq!(order["total"], 472.0);
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert_eq!(order["items"][1]["notes"], "extra kachumbari");
}

#[actix_web::test]
async fn create_order_validation_error() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_create_order().returning(|_, _| {
            Err(PosEngineError::ValidationError("A TAKE_AWAY order needs at least one item".into()))
        });
        register(cfg, backend);
    };
    let req = TestRequest::post().uri("/api/orders").set_json(json!({ "mode": "TAKE_AWAY" }));
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid request. Invalid request. A TAKE_AWAY order needs at least one item"}"#);
}

#[actix_web::test]
async fn malformed_order_body() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_create_order().times(0);
        register(cfg, backend);
    };
    let req = TestRequest::post().uri("/api/orders").set_json(json!({ "mode": "DRIVE_THRU" }));
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"Could not read request body"#), "{body}");
}

#[actix_web::test]
async fn search_orders_with_filter() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend
            .expect_search_orders()
            .withf(|_, query| {
                query.statuses == vec![OrderStatusType::Open, OrderStatusType::PendingPayment]
                    && query.mode == Some(OrderMode::Table)
            })
            .times(1)
            .returning(|_, _| Ok(vec![]));
        register(cfg, backend);
    };
    let req = get_request("/api/orders?status=OPEN,PENDING_PAYMENT&mode=TABLE");
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn search_orders_bad_status() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_search_orders().times(0);
        register(cfg, backend);
    };
    let (status, body) = send_request(get_request("/api/orders?status=SHIPPED"), &valid_token(), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid request. Conversion error: Invalid order status: SHIPPED"}"#);
}

#[actix_web::test]
async fn fetch_missing_order() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_fetch_order().returning(|_, _| Ok(None));
        register(cfg, backend);
    };
    let (status, body) = send_request(get_request("/api/orders/order-99"), &valid_token(), configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Order order-99 does not exist"}"#);
}

#[actix_web::test]
async fn cancel_a_paid_order() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_update_status().returning(|_, id, to| {
            Err(PosEngineError::InvalidTransition { order_id: id.clone(), from: OrderStatusType::Paid, to })
        });
        register(cfg, backend);
    };
    let req = TestRequest::patch().uri("/api/orders/order-1/cancel");
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body,
        r#"{"error":"The request conflicts with the current state of the order. Order order-1 cannot move from PAID to CANCELLED"}"#
    );
}

#[actix_web::test]
async fn cancel_an_open_order() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend
            .expect_update_status()
            .withf(|_, _, to| *to == OrderStatusType::Cancelled)
            .times(1)
            .returning(|_, _, _| Ok(StatusUpdate::Changed(order(OrderStatusType::Cancelled))));
        register(cfg, backend);
    };
    let req = TestRequest::patch().uri("/api/orders/order-1/cancel");
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::OK);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["status"], "CANCELLED");
}

#[actix_web::test]
async fn frozen_orders_reject_new_lines() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_add_order_line().returning(|_, id, _| {
            Err(PosEngineError::OrderFrozen { order_id: id.clone(), status: OrderStatusType::PendingPayment })
        });
        register(cfg, backend);
    };
    let req = TestRequest::post()
        .uri("/api/orders/order-1/items")
        .set_json(json!({ "foodItemId": "food-pilau", "quantity": 1 }));
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Order order-1 is PENDING_PAYMENT and can no longer be edited"), "{body}");
}

#[actix_web::test]
async fn change_line_quantity() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend
            .expect_update_line_quantity()
            .withf(|_, id, line_id, quantity| id.as_str() == "order-1" && *line_id == 2 && *quantity == 3)
            .times(1)
            .returning(|_, _, _, _| {
                let mut order = order(OrderStatusType::Open);
                order.subtotal = Kes::from_shillings(800);
                order.vat = Kes::from_shillings(128);
                order.catering_levy = Kes::from_shillings(16);
                order.total = Kes::from_shillings(944);
                Ok(order)
            });
        backend.expect_fetch_order_lines().returning(|_| Ok(order_lines()));
        register(cfg, backend);
    };
    let req = TestRequest::patch().uri("/api/orders/order-1/items/2").set_json(json!({ "quantity": 3 }));
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["total"], 944.0);
}

#[actix_web::test]
async fn bad_line_id() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_remove_order_line().times(0);
        register(cfg, backend);
    };
    let req = TestRequest::delete().uri("/api/orders/order-1/items/two");
    let (status, _body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn delete_order() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_delete_order().times(1).returning(|_, _| Ok(()));
        register(cfg, backend);
    };
    let req = TestRequest::delete().uri("/api/orders/order-1");
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Order order-1 deleted"}"#);
}

#[actix_web::test]
async fn public_payment_status() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend
            .expect_fetch_order_by_id()
            .withf(|id| id == &OrderId::from("order-1"))
            .returning(|_| Ok(Some(paid("ws_CO_1"))));
        register(cfg, backend);
    };
    // No token required
    let (status, body) = send_request(get_request("/api/payments/orders/order-1/status"), "", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        r#"{"orderId":"order-1","orderNumber":"ORD-20241018-0001","status":"PAID","transactionId":"ws_CO_1","paymentMethod":"M-Pesa","totalAmount":472.0,"callbackReceived":true}"#
    );
}

//! The full order-to-payment loop over HTTP, against a real database and a fake provider.
use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use serde_json::{json, Value};
use tamu_pos_engine::{
    events::EventProducers,
    test_utils::{
        fake_gateway::FakeGatewayFactory,
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_restaurants, NYAMA_CHOMA, PILAU},
    },
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
};

use super::helpers::valid_token;
use crate::{
    auth::TokenValidator,
    config::ServerOptions,
    routes::{
        CreateOrderRoute,
        FetchOrderRoute,
        OrderPaymentStatusRoute,
        PaymentCallbackRoute,
        PaymentStatusRoute,
        StkPushRoute,
    },
    server::{json_config, path_config, query_config},
};

macro_rules! call {
    ($app:expr, $req:expr) => {{
        let res = test::call_service(&$app, $req.to_request()).await;
        let status = res.status();
        let body = test::read_body(res).await;
        let value: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }};
}

fn authorised(req: TestRequest) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {}", valid_token())))
}

fn callback(checkout_request_id: &str) -> TestRequest {
    let body = json!({
        "Body": { "stkCallback": {
            "MerchantRequestID": "mr-1",
            "CheckoutRequestID": checkout_request_id,
            "ResultCode": 0,
            "ResultDesc": "The service request is processed successfully.",
            "CallbackMetadata": { "Item": [{ "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" }] }
        }}
    });
    TestRequest::post().uri("/api/payments/callback").set_json(body)
}

#[actix_web::test]
async fn order_is_paid_through_the_callback() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    seed_restaurants(&db).await;
    let gateways = FakeGatewayFactory::new();

    let orders_api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let payments_api = PaymentFlowApi::new(db.clone(), gateways.clone(), EventProducers::default());
    let app = App::new()
        .app_data(web::Data::new(orders_api))
        .app_data(web::Data::new(payments_api))
        .app_data(web::Data::new(TokenValidator::new(&super::helpers::get_auth_config())))
        .app_data(web::Data::new(ServerOptions::default()))
        .app_data(json_config())
        .app_data(path_config())
        .app_data(query_config())
        .service(
            web::scope("/api")
                .service(PaymentCallbackRoute::<SqliteDatabase, FakeGatewayFactory>::new())
                .service(StkPushRoute::<SqliteDatabase, FakeGatewayFactory>::new())
                .service(PaymentStatusRoute::<SqliteDatabase, FakeGatewayFactory>::new())
                .service(OrderPaymentStatusRoute::<SqliteDatabase>::new())
                .service(CreateOrderRoute::<SqliteDatabase>::new())
                .service(FetchOrderRoute::<SqliteDatabase>::new()),
        );
    let app = test::init_service(app).await;

    let new_order = json!({
        "mode": "TAKE_AWAY",
        "items": [{ "foodItemId": NYAMA_CHOMA, "quantity": 2 }, { "foodItemId": PILAU, "quantity": 1 }]
    });
    let (status, order) = call!(app, authorised(TestRequest::post().uri("/api/orders").set_json(new_order)));
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "OPEN");
    assert_eq!(order["total"], 472.0);
    let order_id = order["id"].as_str().expect("order id").to_string();
    let order_number = order["orderNumber"].as_str().expect("order number").to_string();
    assert!(order_number.starts_with("ORD-"), "{order_number}");

    let push = json!({ "phoneNumber": "0712345678", "orderId": order_id });
    let (status, receipt) = call!(app, authorised(TestRequest::post().uri("/api/payments/stk-push").set_json(push)));
    assert_eq!(status, StatusCode::OK);
    let checkout = receipt["checkoutRequestId"].as_str().expect("checkout id").to_string();
    assert_eq!(gateways.pushes()[0].phone, "0712345678");

    let status_url = format!("/api/payments/orders/{order_id}/status");
    let (_, public) = call!(app, TestRequest::get().uri(&status_url));
    assert_eq!(public["status"], "PENDING_PAYMENT");
    assert_eq!(public["transactionId"], checkout.as_str());
    assert_eq!(public["callbackReceived"], false);

    let (status, ack) = call!(app, callback(&checkout));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["ResultCode"], 0);

    let (_, public) = call!(app, TestRequest::get().uri(&status_url));
    assert_eq!(public["status"], "PAID");
    assert_eq!(public["paymentMethod"], "M-Pesa");
    assert_eq!(public["callbackReceived"], true);
    assert_eq!(public["totalAmount"], 472.0);

    // M-Pesa redelivers
    let (status, ack) = call!(app, callback(&checkout));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["ResultDesc"], "Success");
    let (_, public) = call!(app, TestRequest::get().uri(&status_url));
    assert_eq!(public["status"], "PAID");

    // A second push for a paid order is refused
    let push = json!({ "phoneNumber": "0712345678", "orderId": order_id });
    let (status, _) = call!(app, authorised(TestRequest::post().uri("/api/payments/stk-push").set_json(push)));
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(gateways.pushes().len(), 1);

    let mut db = db;
    db.close().await;
    let path = url.trim_start_matches("sqlite://");
    std::fs::remove_file(path).ok();
}

use std::net::SocketAddr;

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::{json, Value};
use tamu_common::{Kes, ProviderResult};
use tamu_pos_engine::{
    db_types::{ApplyResultOutcome, GatewayCredentials, OrderStatusType},
    events::EventProducers,
    test_utils::fake_gateway::FakeGatewayFactory,
    GatewayError,
    PaymentFlowApi,
    PosEngineError,
};

use super::{
    helpers::{attempt, credentials, get_request, order, paid, pending, send_request, valid_token},
    mocks::MockPosBackend,
};
use crate::{
    config::ServerOptions,
    routes::{PaymentAttemptsRoute, PaymentCallbackRoute, PaymentStatusRoute, StkPushRoute},
};

const ACK: &str = r#"{"ResultCode":0,"ResultDesc":"Success"}"#;

fn register(cfg: &mut ServiceConfig, backend: MockPosBackend, gateways: FakeGatewayFactory, options: ServerOptions) {
    let api = PaymentFlowApi::new(backend, gateways, EventProducers::default());
    cfg.service(PaymentCallbackRoute::<MockPosBackend, FakeGatewayFactory>::new())
        .service(StkPushRoute::<MockPosBackend, FakeGatewayFactory>::new())
        .service(PaymentStatusRoute::<MockPosBackend, FakeGatewayFactory>::new())
        .service(PaymentAttemptsRoute::<MockPosBackend, FakeGatewayFactory>::new())
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(options));
}

fn stk_push(body: Value) -> TestRequest {
    TestRequest::post().uri("/api/payments/stk-push").set_json(body)
}

fn callback(body: &str) -> TestRequest {
    TestRequest::post()
        .uri("/api/payments/callback")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string())
}

fn success_callback(checkout_request_id: &str) -> String {
    json!({
        "Body": { "stkCallback": {
            "MerchantRequestID": "mr-1",
            "CheckoutRequestID": checkout_request_id,
            "ResultCode": 0,
            "ResultDesc": "The service request is processed successfully.",
            "CallbackMetadata": { "Item": [
                { "Name": "Amount", "Value": 472.0 },
                { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                { "Name": "PhoneNumber", "Value": 254712345678u64 }
            ]}
        }}
    })
    .to_string()
}

//----------------------------------------------   STK push  ----------------------------------------------------
#[actix_web::test]
async fn stk_push_for_an_open_order() {
    let _ = env_logger::try_init().ok();
    let gateways = FakeGatewayFactory::new();
    let provider = gateways.clone();
    let configure = move |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_fetch_order().returning(|_, _| Ok(Some(order(OrderStatusType::Open))));
        backend.expect_fetch_gateway_credentials().returning(|_| Ok(Some(credentials())));
        backend
            .expect_record_payment_attempt()
            .withf(|_, id, attempt| {
                id.as_str() == "order-1"
                    && attempt.checkout_request_id == "ws_CO_1"
                    && attempt.amount == Kes::from_shillings(472)
            })
            .times(1)
            .returning(|_, _, _| Ok(pending("ws_CO_1")));
        register(cfg, backend, gateways, ServerOptions::default());
    };
    let req = stk_push(json!({ "phoneNumber": "0712345678", "orderId": "order-1" }));
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body,
        r#"{"message":"STK Push initiated successfully","checkoutRequestId":"ws_CO_1","merchantRequestId":"mr-1"}"#
    );
    let pushes = provider.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].amount, Kes::from_shillings(472));
    assert_eq!(pushes[0].shortcode, "174379");
    assert_eq!(pushes[0].order_ref, "ORD-20241018-0001");
}

#[actix_web::test]
async fn stk_push_with_explicit_amount() {
    let _ = env_logger::try_init().ok();
    let gateways = FakeGatewayFactory::new();
    let provider = gateways.clone();
    let configure = move |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_fetch_order().returning(|_, _| Ok(Some(order(OrderStatusType::Open))));
        backend.expect_fetch_gateway_credentials().returning(|_| Ok(Some(credentials())));
        backend.expect_record_payment_attempt().returning(|_, _, _| Ok(pending("ws_CO_1")));
        register(cfg, backend, gateways, ServerOptions::default());
    };
    let req = stk_push(json!({ "phoneNumber": "0712345678", "orderId": "order-1", "amount": 1 }));
    let (status, _body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(provider.pushes()[0].amount, Kes::from_shillings(1));
}

#[actix_web::test]
async fn stk_push_needs_a_phone_number() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_fetch_order().times(0);
        register(cfg, backend, FakeGatewayFactory::new(), ServerOptions::default());
    };
    let req = stk_push(json!({ "phoneNumber": "  ", "orderId": "order-1" }));
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid request. A phone number is required"}"#);
}

#[actix_web::test]
async fn stk_push_without_credentials() {
    let _ = env_logger::try_init().ok();
    let gateways = FakeGatewayFactory::new();
    let provider = gateways.clone();
    let configure = move |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_fetch_order().returning(|_, _| Ok(Some(order(OrderStatusType::Open))));
        backend.expect_fetch_gateway_credentials().returning(|_| Ok(Some(GatewayCredentials::default())));
        backend.expect_record_payment_attempt().times(0);
        register(cfg, backend, gateways, ServerOptions::default());
    };
    let req = stk_push(json!({ "phoneNumber": "0712345678", "orderId": "order-1" }));
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("Missing: consumer key, consumer secret, passkey, shortcode"), "{body}");
    assert!(provider.pushes().is_empty());
}

#[actix_web::test]
async fn stk_push_for_a_paid_order() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_fetch_order().returning(|_, _| Ok(Some(paid("ws_CO_7"))));
        backend.expect_fetch_gateway_credentials().times(0);
        register(cfg, backend, FakeGatewayFactory::new(), ServerOptions::default());
    };
    let req = stk_push(json!({ "phoneNumber": "0712345678", "orderId": "order-1" }));
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("cannot move from PAID to PENDING_PAYMENT"), "{body}");
}

#[actix_web::test]
async fn stk_push_rejected_by_provider() {
    let _ = env_logger::try_init().ok();
    let gateways = FakeGatewayFactory::new();
    gateways.fail_next_push(GatewayError::Rejected("Invalid BusinessShortCode".into()));
    let configure = move |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_fetch_order().returning(|_, _| Ok(Some(order(OrderStatusType::Open))));
        backend.expect_fetch_gateway_credentials().returning(|_| Ok(Some(credentials())));
        backend.expect_record_payment_attempt().times(0);
        register(cfg, backend, gateways, ServerOptions::default());
    };
    let req = stk_push(json!({ "phoneNumber": "0712345678", "orderId": "order-1" }));
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("Invalid BusinessShortCode"), "{body}");
}

#[actix_web::test]
async fn stk_push_provider_unreachable() {
    let _ = env_logger::try_init().ok();
    let gateways = FakeGatewayFactory::new();
    gateways.fail_next_push(GatewayError::Transport("operation timed out".into()));
    let configure = move |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_fetch_order().returning(|_, _| Ok(Some(order(OrderStatusType::Open))));
        backend.expect_fetch_gateway_credentials().returning(|_| Ok(Some(credentials())));
        register(cfg, backend, gateways, ServerOptions::default());
    };
    let req = stk_push(json!({ "phoneNumber": "0712345678", "orderId": "order-1" }));
    let (status, _body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
}

//----------------------------------------------   Callback  ----------------------------------------------------
#[actix_web::test]
async fn successful_callback_is_applied() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend
            .expect_apply_payment_result()
            .withf(|checkout, outcome, method| {
                checkout == "ws_CO_1"
                    && outcome.success
                    && outcome.receipt.as_deref() == Some("NLJ7RT61SV")
                    && method == "M-Pesa"
            })
            .times(1)
            .returning(|_, _, _| Ok(ApplyResultOutcome::Applied(paid("ws_CO_1"))));
        register(cfg, backend, FakeGatewayFactory::new(), ServerOptions::default());
    };
    let (status, body) = send_request(callback(&success_callback("ws_CO_1")), "", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACK);
}

#[actix_web::test]
async fn failed_callback_is_applied() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend
            .expect_apply_payment_result()
            .withf(|_, outcome, _| !outcome.success && outcome.result_code == "1032")
            .times(1)
            .returning(|_, _, _| Ok(ApplyResultOutcome::Applied(order(OrderStatusType::Cancelled))));
        register(cfg, backend, FakeGatewayFactory::new(), ServerOptions::default());
    };
    let body = r#"{"Body":{"stkCallback":{"MerchantRequestID":"mr-1","CheckoutRequestID":"ws_CO_1",
        "ResultCode":1032,"ResultDesc":"Request cancelled by user"}}}"#;
    let (status, body) = send_request(callback(body), "", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACK);
}

#[actix_web::test]
async fn text_result_codes_are_applied() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend
            .expect_apply_payment_result()
            .withf(|checkout, outcome, _| checkout == "ws_CO_2" && outcome.success)
            .times(1)
            .returning(|_, _, _| Ok(ApplyResultOutcome::Applied(paid("ws_CO_2"))));
        register(cfg, backend, FakeGatewayFactory::new(), ServerOptions::default());
    };
    let body = r#"{"Body":{"stkCallback":{"MerchantRequestID":"mr-2","CheckoutRequestID":"ws_CO_2",
        "ResultCode":"0","ResultDesc":"The service request is processed successfully."}}}"#;
    let (status, body) = send_request(callback(body), "", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACK);
}

#[actix_web::test]
async fn callbacks_are_always_acknowledged() {
    let _ = env_logger::try_init().ok();
    // Unknown checkout reference
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_apply_payment_result().times(1).returning(|_, _, _| Ok(ApplyResultOutcome::UnknownTransaction));
        register(cfg, backend, FakeGatewayFactory::new(), ServerOptions::default());
    };
    let (status, body) = send_request(callback(&success_callback("ws_CO_404")), "", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACK);

    // Duplicate
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend
            .expect_apply_payment_result()
            .times(1)
            .returning(|_, _, _| Ok(ApplyResultOutcome::AlreadyTerminal(paid("ws_CO_1"))));
        register(cfg, backend, FakeGatewayFactory::new(), ServerOptions::default());
    };
    let (status, body) = send_request(callback(&success_callback("ws_CO_1")), "", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACK);

    // Storage failure
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend
            .expect_apply_payment_result()
            .times(1)
            .returning(|_, _, _| Err(PosEngineError::DatabaseError("database is locked".into())));
        register(cfg, backend, FakeGatewayFactory::new(), ServerOptions::default());
    };
    let (status, body) = send_request(callback(&success_callback("ws_CO_1")), "", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACK);

    // Garbage
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_apply_payment_result().times(0);
        register(cfg, backend, FakeGatewayFactory::new(), ServerOptions::default());
    };
    let (status, body) = send_request(callback(r#"{"Body":{"hello":"world"}}"#), "", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACK);
}

#[actix_web::test]
async fn callback_whitelist() {
    let _ = env_logger::try_init().ok();
    let options = ServerOptions {
        callback_whitelist: Some(vec!["196.201.214.200".parse().unwrap()]),
        ..Default::default()
    };
    let stranger: SocketAddr = "10.0.0.1:5000".parse().unwrap();
    let safaricom: SocketAddr = "196.201.214.200:443".parse().unwrap();

    let opts = options.clone();
    let configure = move |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_apply_payment_result().times(0);
        register(cfg, backend, FakeGatewayFactory::new(), opts);
    };
    let req = callback(&success_callback("ws_CO_1")).peer_addr(stranger);
    let (status, body) = send_request(req, "", configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Authentication Error. Requests from this address are not allowed."}"#);

    let configure = move |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend
            .expect_apply_payment_result()
            .times(1)
            .returning(|_, _, _| Ok(ApplyResultOutcome::Applied(paid("ws_CO_1"))));
        register(cfg, backend, FakeGatewayFactory::new(), options);
    };
    let req = callback(&success_callback("ws_CO_1")).peer_addr(safaricom);
    let (status, body) = send_request(req, "", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACK);
}

//----------------------------------------------   Status  ----------------------------------------------------
#[actix_web::test]
async fn status_query_applies_a_success() {
    let _ = env_logger::try_init().ok();
    let gateways = FakeGatewayFactory::new();
    let description = "The service request is processed successfully.";
    gateways.set_result("ws_CO_1", ProviderResult::Success { description: description.into() });
    let configure = move |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_fetch_payment_attempt().returning(|_| Ok(Some(attempt("ws_CO_1"))));
        backend.expect_fetch_gateway_credentials().returning(|_| Ok(Some(credentials())));
        backend
            .expect_apply_payment_result()
            .withf(|checkout, outcome, _| checkout == "ws_CO_1" && outcome.success)
            .times(1)
            .returning(|_, _, _| Ok(ApplyResultOutcome::Applied(paid("ws_CO_1"))));
        register(cfg, backend, gateways, ServerOptions::default());
    };
    let (status, body) = send_request(get_request("/api/payments/status/ws_CO_1"), &valid_token(), configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["checkoutRequestId"], "ws_CO_1");
    assert_eq!(result["result"]["status"], "SUCCESS");
    assert_eq!(result["orderStatus"], "PAID");
}

#[actix_web::test]
async fn status_query_while_processing() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_fetch_payment_attempt().returning(|_| Ok(Some(attempt("ws_CO_1"))));
        backend.expect_fetch_gateway_credentials().returning(|_| Ok(Some(credentials())));
        backend.expect_apply_payment_result().times(0);
        register(cfg, backend, FakeGatewayFactory::new(), ServerOptions::default());
    };
    let (status, body) = send_request(get_request("/api/payments/status/ws_CO_1"), &valid_token(), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        r#"{"checkoutRequestId":"ws_CO_1","result":{"status":"STILL_PROCESSING","description":"The transaction is being processed"}}"#
    );
}

#[actix_web::test]
async fn status_query_for_another_restaurant() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_fetch_payment_attempt().returning(|_| {
            let mut attempt = attempt("ws_CO_1");
            attempt.restaurant_id = "rest-2".into();
            Ok(Some(attempt))
        });
        backend.expect_fetch_gateway_credentials().times(0);
        register(cfg, backend, FakeGatewayFactory::new(), ServerOptions::default());
    };
    let (status, body) = send_request(get_request("/api/payments/status/ws_CO_1"), &valid_token(), configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. No payment attempt has checkout reference ws_CO_1"}"#);
}

#[actix_web::test]
async fn list_payment_attempts() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockPosBackend::new();
        backend.expect_fetch_order().returning(|_, _| Ok(Some(pending("ws_CO_2"))));
        backend.expect_fetch_payment_attempts().returning(|_| Ok(vec![attempt("ws_CO_1"), attempt("ws_CO_2")]));
        register(cfg, backend, FakeGatewayFactory::new(), ServerOptions::default());
    };
    let req = get_request("/api/payments/orders/order-1/attempts");
    let (status, body) = send_request(req, &valid_token(), configure).await;
    assert_eq!(status, StatusCode::OK);
    let attempts: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(attempts.as_array().unwrap().len(), 2);
    assert_eq!(attempts[1]["checkoutRequestId"], "ws_CO_2");
    assert_eq!(attempts[1]["amount"], 472.0);
}

//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, calls to M-Pesa) should be
//! expressed as futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus
//! don’t block execution.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use daraja_tools::{CallbackAck, StkCallbackEnvelope};
use log::*;
use tamu_pos_engine::{
    db_types::{NewOrder, NewOrderLine, OrderId},
    order_objects::{OrderDetailsUpdate, OrderQueryFilter},
    GatewayFactory,
    OrderFlowApi,
    OrderManagement,
    PaymentFlowApi,
    PaymentManagement,
};

use crate::{
    auth::JwtClaims,
    config::ServerOptions,
    data_objects::{
        callback_outcome,
        JsonResponse,
        LineQuantityUpdate,
        OrderSearchParams,
        PaymentStatusResponse,
        StkPushParams,
        StkPushResponse,
    },
    errors::{AuthError, ServerError},
    helpers::get_remote_ip,
};

/// Everything the payment routes need from storage.
pub trait PosBackend: OrderManagement + PaymentManagement {}

impl<T: OrderManagement + PaymentManagement> PosBackend for T {}

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payment_callback => Post "/payments/callback" impl PosBackend, GatewayFactory);
/// The M-Pesa result webhook.
///
/// M-Pesa retries a callback until it gets a success acknowledgement, so once the caller has passed the (optional)
/// IP whitelist, this handler always answers `200 {"ResultCode":0,"ResultDesc":"Success"}`. Unreadable payloads,
/// unknown checkout references and backend failures are logged instead.
pub async fn payment_callback<B: PosBackend, G: GatewayFactory>(
    req: HttpRequest,
    body: web::Bytes,
    options: web::Data<ServerOptions>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    if !options.accepts_callback_from(peer) {
        warn!("📞️ Rejecting a payment callback from {peer:?}. The address is not on the callback whitelist");
        return Err(AuthError::ForbiddenPeer.into());
    }
    let envelope = match serde_json::from_slice::<StkCallbackEnvelope>(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("📞️ Ignoring an unreadable payment callback. {e}. Body: {}", String::from_utf8_lossy(&body));
            return Ok(callback_ack());
        },
    };
    let callback = envelope.body.stk_callback;
    let outcome = callback_outcome(&callback);
    info!("📞️ Payment callback for checkout {}: {outcome}", callback.checkout_request_id);
    match api.apply_payment_result(&callback.checkout_request_id, outcome).await {
        Ok(result) => debug!("📞️ Callback for checkout {} {result}", callback.checkout_request_id),
        Err(e) => error!("📞️ Could not apply the callback for checkout {}. {e}", callback.checkout_request_id),
    }
    Ok(callback_ack())
}

fn callback_ack() -> HttpResponse {
    HttpResponse::Ok().json(CallbackAck::default())
}

route!(stk_push => Post "/payments/stk-push" impl PosBackend, GatewayFactory);
/// Sends an STK push to the customer's phone for one of the caller's orders.
///
/// `amount` is optional and defaults to the order total.
pub async fn stk_push<B: PosBackend, G: GatewayFactory>(
    claims: JwtClaims,
    body: web::Json<StkPushParams>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    debug!("💻️ POST stk-push for order {} by {}", params.order_id, claims.email);
    if params.phone_number.trim().is_empty() {
        return Err(ServerError::ValidationError("A phone number is required".into()));
    }
    let initiated = api
        .initiate_payment(&claims.restaurant_id, &params.order_id, &params.phone_number, params.amount)
        .await
        .map_err(|e| {
            warn!("💻️ Could not initiate payment for order {}. {e}", params.order_id);
            e
        })?;
    let response = StkPushResponse {
        message: "STK Push initiated successfully".into(),
        checkout_request_id: initiated.checkout_request_id,
        merchant_request_id: initiated.merchant_request_id,
    };
    Ok(HttpResponse::Ok().json(response))
}

route!(payment_status => Get "/payments/status/{checkout_request_id}" impl PosBackend, GatewayFactory);
/// Asks M-Pesa what happened to a checkout request. A success is applied to the order on the spot, which covers
/// callbacks that never arrive.
pub async fn payment_status<B: PosBackend, G: GatewayFactory>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let checkout_request_id = path.into_inner();
    debug!("💻️ GET payment status for checkout {checkout_request_id}");
    let reconciled = api.reconcile(&claims.restaurant_id, &checkout_request_id).await?;
    let order_status = reconciled.applied.as_ref().and_then(|a| a.order()).map(|o| o.status);
    let response = PaymentStatusResponse {
        checkout_request_id: reconciled.checkout_request_id,
        result: reconciled.result,
        order_status,
    };
    Ok(HttpResponse::Ok().json(response))
}

route!(order_payment_status => Get "/payments/orders/{id}/status" impl OrderManagement);
/// The public payment status of an order. No authentication: the payment screen and the customer display poll this.
pub async fn order_payment_status<B: OrderManagement>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET payment status for order {order_id}");
    let status = api
        .fetch_order_status(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(status))
}

route!(payment_attempts => Get "/payments/orders/{id}/attempts" impl PosBackend, GatewayFactory);
pub async fn payment_attempts<B: PosBackend, G: GatewayFactory>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET payment attempts for order {order_id}");
    let attempts = api.payment_attempts(&claims.restaurant_id, &order_id).await?;
    Ok(HttpResponse::Ok().json(attempts))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(search_orders => Get "/orders" impl OrderManagement);
/// `GET /api/orders?status=OPEN,PENDING_PAYMENT&mode=TABLE&limit=20`. Newest first.
pub async fn search_orders<B: OrderManagement>(
    claims: JwtClaims,
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let filter = OrderQueryFilter::try_from(query.into_inner())?;
    debug!("💻️ GET orders for {} ({filter:?})", claims.restaurant_id);
    let orders = api.search_orders(&claims.restaurant_id, filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(create_order => Post "/orders" impl OrderManagement);
pub async fn create_order<B: OrderManagement>(
    claims: JwtClaims,
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST new {} order by {}", body.mode, claims.email);
    let order = api.create_order(&claims.restaurant_id, body.into_inner()).await?;
    let order = api
        .fetch_order(&claims.restaurant_id, &order.id)
        .await?
        .ok_or_else(|| ServerError::BackendError(format!("Order {} vanished after it was created", order.id)))?;
    Ok(HttpResponse::Created().json(order))
}

route!(fetch_order => Get "/orders/{id}" impl OrderManagement);
pub async fn fetch_order<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id}");
    let order = api
        .fetch_order(&claims.restaurant_id, &order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order => Put "/orders/{id}" impl OrderManagement);
/// Changes the customer name or table number.
pub async fn update_order<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<OrderDetailsUpdate>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ PUT order {order_id}");
    let order = api.update_order_details(&claims.restaurant_id, &order_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(delete_order => Delete "/orders/{id}" impl OrderManagement);
pub async fn delete_order<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ DELETE order {order_id} by {}", claims.email);
    api.delete_order(&claims.restaurant_id, &order_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Order {order_id} deleted"))))
}

route!(cancel_order => Patch "/orders/{id}/cancel" impl OrderManagement);
pub async fn cancel_order<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ Cancel order {order_id} requested by {}", claims.email);
    let order = api.cancel_order(&claims.restaurant_id, &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(complete_order => Patch "/orders/{id}/complete" impl OrderManagement);
pub async fn complete_order<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ Complete order {order_id}");
    let order = api.complete_order(&claims.restaurant_id, &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(add_order_line => Post "/orders/{id}/items" impl OrderManagement);
pub async fn add_order_line<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<NewOrderLine>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ Add {} x {} to order {order_id}", body.quantity, body.food_item_id);
    let order = api.add_order_line(&claims.restaurant_id, &order_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_line => Patch "/orders/{id}/items/{line_id}" impl OrderManagement);
pub async fn update_order_line<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<(OrderId, i64)>,
    body: web::Json<LineQuantityUpdate>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (order_id, line_id) = path.into_inner();
    debug!("💻️ Set quantity of line {line_id} in order {order_id} to {}", body.quantity);
    let order = api.update_line_quantity(&claims.restaurant_id, &order_id, line_id, body.quantity).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(remove_order_line => Delete "/orders/{id}/items/{line_id}" impl OrderManagement);
pub async fn remove_order_line<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<(OrderId, i64)>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (order_id, line_id) = path.into_inner();
    debug!("💻️ Remove line {line_id} from order {order_id}");
    let order = api.remove_order_line(&claims.restaurant_id, &order_id, line_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

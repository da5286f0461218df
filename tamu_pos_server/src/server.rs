use std::{path::Path, time::Duration};

use actix_web::{
    dev::Server,
    error::InternalError,
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
    ResponseError,
};
use log::*;
use tamu_pos_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    GatewayFactory,
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
};

use crate::{
    auth::TokenValidator,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::mpesa::MpesaGatewayFactory,
    routes::{
        health,
        AddOrderLineRoute,
        CancelOrderRoute,
        CompleteOrderRoute,
        CreateOrderRoute,
        DeleteOrderRoute,
        FetchOrderRoute,
        OrderPaymentStatusRoute,
        PaymentAttemptsRoute,
        PaymentCallbackRoute,
        PaymentStatusRoute,
        RemoveOrderLineRoute,
        SearchOrdersRoute,
        StkPushRoute,
        UpdateOrderLineRoute,
        UpdateOrderRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    ensure_database_directory(&config.database_url)?;
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
        info!("🗃️ Database migrations are up to date");
    }
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, default_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let gateways = MpesaGatewayFactory::new(config.mpesa.clone());
    let srv = create_server_instance(config, db, gateways, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Logs paid and annulled orders. Receipt printing and kitchen tickets hang off the same hooks.
pub fn default_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_paid(|ev| {
            Box::pin(async move {
                info!("🧾️ Order {} ({}) is paid. Total {}", ev.order.order_number, ev.order.mode, ev.order.total);
            })
        })
        .on_order_annulled(|ev| {
            Box::pin(async move {
                let reason = ev.outcome.map(|o| o.to_string()).unwrap_or_else(|| "cancelled by staff".to_string());
                info!("🧾️ Order {} has been annulled: {reason}", ev.order.order_number);
            })
        });
    hooks
}

pub fn create_server_instance<G>(
    config: ServerConfig,
    db: SqliteDatabase,
    gateways: G,
    producers: EventProducers,
) -> Result<Server, ServerError>
where
    G: GatewayFactory + Clone + Send + 'static,
{
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let payments_api = PaymentFlowApi::new(db.clone(), gateways.clone(), producers.clone());
        let token_validator = TokenValidator::new(&config.auth);
        let options = ServerOptions::from_config(&config);
        let api_scope = web::scope("/api")
            .service(PaymentCallbackRoute::<SqliteDatabase, G>::new())
            .service(StkPushRoute::<SqliteDatabase, G>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, G>::new())
            .service(PaymentAttemptsRoute::<SqliteDatabase, G>::new())
            .service(OrderPaymentStatusRoute::<SqliteDatabase>::new())
            .service(SearchOrdersRoute::<SqliteDatabase>::new())
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(FetchOrderRoute::<SqliteDatabase>::new())
            .service(UpdateOrderRoute::<SqliteDatabase>::new())
            .service(DeleteOrderRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(CompleteOrderRoute::<SqliteDatabase>::new())
            .service(AddOrderLineRoute::<SqliteDatabase>::new())
            .service(UpdateOrderLineRoute::<SqliteDatabase>::new())
            .service(RemoveOrderLineRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("tpos::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(token_validator))
            .app_data(web::Data::new(options))
            .app_data(json_config())
            .app_data(path_config())
            .app_data(query_config())
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Malformed bodies, paths and query strings get the same JSON error body as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        InternalError::from_response(err, ServerError::InvalidRequestBody(message).error_response()).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        InternalError::from_response(err, ServerError::ValidationError(message).error_response()).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        InternalError::from_response(err, ServerError::ValidationError(message).error_response()).into()
    })
}

fn ensure_database_directory(url: &str) -> Result<(), ServerError> {
    let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
    if path.starts_with(':') {
        return Ok(());
    }
    let path = path.split('?').next().unwrap_or_default();
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            info!("🗃️ Creating database directory {}", dir.display());
            std::fs::create_dir_all(dir)?;
            Ok(())
        },
        _ => Ok(()),
    }
}

use std::collections::HashMap;

use cucumber::World;
use log::*;
use tamu_pos_engine::{
    db_types::{ApplyResultOutcome, Order},
    events::EventProducers,
    payment_poller::PollOutcome,
    test_utils::{
        fake_gateway::FakeGatewayFactory,
        prepare_env::{create_database, random_db_path, run_migrations},
        seed::seed_restaurants,
    },
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct PosWorld {
    pub system: Option<PosSystem>,
    /// Orders by the alias the scenario gave them
    pub orders: HashMap<String, Order>,
    /// The latest checkout reference for each order alias
    pub checkouts: HashMap<String, String>,
    pub last_result: Option<ApplyResultOutcome>,
    pub last_poll: Option<PollOutcome>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub struct PosSystem {
    pub db_path: String,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentFlowApi<SqliteDatabase, FakeGatewayFactory>,
    pub gateway: FakeGatewayFactory,
}

impl PosWorld {
    pub fn system(&self) -> &PosSystem {
        self.system.as_ref().expect("System not initialised")
    }

    pub fn order(&self, alias: &str) -> &Order {
        self.orders.get(alias).unwrap_or_else(|| panic!("No order called {alias}"))
    }

    pub fn checkout(&self, alias: &str) -> String {
        self.checkouts.get(alias).cloned().unwrap_or_else(|| panic!("No payment was requested for {alias}"))
    }
}

impl PosSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        create_database(&url).await;
        run_migrations(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        seed_restaurants(&db).await;
        debug!("Created database: {url}");
        let gateway = FakeGatewayFactory::new();
        let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
        let payments = PaymentFlowApi::new(db, gateway.clone(), EventProducers::default());
        Self { db_path: url, orders, payments, gateway }
    }
}

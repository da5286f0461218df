//! `SqliteDatabase` is a concrete implementation of a Tamu POS engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::{collections::HashMap, fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;
use rand::Rng;
use sqlx::{migrate, SqlitePool};

use super::db::{
    db_url,
    food_items,
    is_write_conflict,
    new_pool,
    order_lines::{self, PricedLine},
    order_numbers,
    orders,
    payments,
    restaurants,
};
use crate::{
    db_types::{
        ApplyResultOutcome,
        FoodItem,
        GatewayCredentials,
        NewFoodItem,
        NewOrder,
        NewOrderLine,
        NewPaymentAttempt,
        NewRestaurant,
        Order,
        OrderId,
        OrderLine,
        OrderStatusType,
        PaymentAttempt,
        PaymentOutcome,
        Restaurant,
        RestaurantId,
        StatusUpdate,
    },
    helpers::{check_quantity, OrderTotals},
    order_objects::{OrderDetailsUpdate, OrderQueryFilter},
    traits::{OrderManagement, PaymentManagement, PosEngineError},
};

/// How many times `create_order` will re-allocate and retry after losing an insert race.
const MAX_CREATE_ATTEMPTS: usize = 50;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `TPOS_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) {
        self.pool.close().await;
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), PosEngineError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PosEngineError::DatabaseError(format!("Migrations failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Restaurants are owned by the onboarding flow, not the POS. This is here for provisioning and tests.
    pub async fn insert_restaurant(&self, restaurant: NewRestaurant) -> Result<Restaurant, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let restaurant = restaurants::insert_restaurant(restaurant, &mut conn).await?;
        debug!("🗃️ Restaurant {} ({}) saved", restaurant.id, restaurant.name);
        Ok(restaurant)
    }

    pub async fn fetch_restaurant(&self, id: &RestaurantId) -> Result<Option<Restaurant>, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let restaurant = restaurants::fetch_restaurant(id, &mut conn).await?;
        Ok(restaurant)
    }

    /// Menu management lives elsewhere. This is here for provisioning and tests.
    pub async fn insert_food_item(&self, item: NewFoodItem) -> Result<FoodItem, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let item = food_items::insert_food_item(item, &mut conn).await?;
        Ok(item)
    }

    /// Looks up and snapshots the menu price of every requested line.
    async fn price_lines(
        &self,
        restaurant_id: &RestaurantId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<PricedLine>, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let ids = lines.iter().map(|l| l.food_item_id.clone()).collect::<Vec<String>>();
        let menu = food_items::fetch_food_items(restaurant_id, &ids, &mut conn)
            .await?
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect::<HashMap<String, FoodItem>>();
        lines
            .iter()
            .map(|line| {
                let item = menu
                    .get(&line.food_item_id)
                    .ok_or_else(|| PosEngineError::FoodItemNotFound(line.food_item_id.clone()))?;
                PricedLine::new(item, line)
            })
            .collect()
    }

    /// One allocation + insert round. Any error is returned raw so that the caller can tell write conflicts apart.
    async fn try_insert_order(
        &self,
        restaurant_id: &RestaurantId,
        order: &NewOrder,
        lines: &[PricedLine],
        totals: OrderTotals,
    ) -> Result<Order, sqlx::Error> {
        let order_number = {
            let mut conn = self.pool.acquire().await?;
            order_numbers::allocate_order_number(restaurant_id, Utc::now(), &mut conn).await?
        };
        let mut tx = self.pool.begin().await?;
        let id = OrderId::random();
        let inserted = orders::insert_order(&id, &order_number, restaurant_id, order, totals, &mut tx).await?;
        for line in lines {
            order_lines::insert_line(&inserted.id, line, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Distinguishes "not found in your restaurant" from "not allowed in its current status" after a conditional
    /// update matched nothing.
    async fn explain_failed_transition(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<StatusUpdate, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(restaurant_id, order_id, &mut conn)
            .await?
            .ok_or_else(|| PosEngineError::OrderNotFound(order_id.clone()))?;
        if order.status == new_status && new_status != OrderStatusType::Open {
            trace!("🗃️ Order {order_id} is already {new_status}");
            Ok(StatusUpdate::Unchanged(order))
        } else {
            Err(PosEngineError::InvalidTransition { order_id: order.id, from: order.status, to: new_status })
        }
    }
}

fn validate_new_order(order: &NewOrder) -> Result<(), PosEngineError> {
    if order.mode.requires_items() && order.items.is_empty() {
        return Err(PosEngineError::ValidationError(format!("A {} order must contain at least one item", order.mode)));
    }
    for line in &order.items {
        check_quantity(&line.food_item_id, line.quantity)?;
    }
    Ok(())
}

impl OrderManagement for SqliteDatabase {
    async fn create_order(&self, restaurant_id: &RestaurantId, order: NewOrder) -> Result<Order, PosEngineError> {
        validate_new_order(&order)?;
        if self.fetch_restaurant(restaurant_id).await?.is_none() {
            return Err(PosEngineError::RestaurantNotFound(restaurant_id.clone()));
        }
        let lines = self.price_lines(restaurant_id, &order.items).await?;
        let totals = OrderTotals::from_priced_quantities(lines.iter().map(|l| (l.unit_price, l.quantity)))?;
        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            match self.try_insert_order(restaurant_id, &order, &lines, totals).await {
                Ok(order) => {
                    let (number, total) = (&order.order_number, order.total);
                    debug!("🗃️ Order {number} saved with {} lines. Total {total}", lines.len());
                    return Ok(order);
                },
                Err(e) if is_write_conflict(&e) => {
                    let delay = rand::thread_rng().gen_range(1..=20);
                    debug!("🗃️ Write conflict creating order (attempt {attempt}): {e}. Retrying in {delay}ms");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                },
                Err(e) => return Err(e.into()),
            }
        }
        error!("🗃️ Gave up creating an order for restaurant {restaurant_id} after {MAX_CREATE_ATTEMPTS} conflicts");
        Err(PosEngineError::OrderNumberExhausted(MAX_CREATE_ATTEMPTS))
    }

    async fn fetch_order(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
    ) -> Result<Option<Order>, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(restaurant_id, order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_lines(&self, order_id: &OrderId) -> Result<Vec<OrderLine>, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let lines = order_lines::fetch_lines(order_id, &mut conn).await?;
        Ok(lines)
    }

    async fn fetch_order_by_transaction_id(&self, checkout_request_id: &str) -> Result<Option<Order>, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_transaction_id(checkout_request_id, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(
        &self,
        restaurant_id: &RestaurantId,
        query: OrderQueryFilter,
    ) -> Result<Vec<Order>, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(restaurant_id, query, &mut conn).await?;
        Ok(orders)
    }

    async fn update_order_details(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        update: OrderDetailsUpdate,
    ) -> Result<Order, PosEngineError> {
        if update.is_empty() {
            let order = self.fetch_order(restaurant_id, order_id).await?;
            return order.ok_or_else(|| PosEngineError::OrderNotFound(order_id.clone()));
        }
        let mut conn = self.pool.acquire().await?;
        match orders::update_details(restaurant_id, order_id, update, &mut conn).await? {
            Some(order) => Ok(order),
            None => {
                let order = orders::fetch_order(restaurant_id, order_id, &mut conn)
                    .await?
                    .ok_or_else(|| PosEngineError::OrderNotFound(order_id.clone()))?;
                Err(PosEngineError::OrderFrozen { order_id: order.id, status: order.status })
            },
        }
    }

    async fn add_order_line(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        line: NewOrderLine,
    ) -> Result<Order, PosEngineError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_editable_order(restaurant_id, order_id, &mut tx).await?;
        let item = food_items::fetch_food_item(restaurant_id, &line.food_item_id, &mut tx)
            .await?
            .ok_or_else(|| PosEngineError::FoodItemNotFound(line.food_item_id.clone()))?;
        let priced = PricedLine::new(&item, &line)?;
        order_lines::insert_line(&order.id, &priced, &mut tx).await?;
        let order = orders::recalculate_totals(&order.id, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ {} x {} added to order {}. New total {}",
            priced.quantity, priced.item_name, order.order_number, order.total
        );
        Ok(order)
    }

    async fn update_line_quantity(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        line_id: i64,
        quantity: i64,
    ) -> Result<Order, PosEngineError> {
        check_quantity(&format!("line {line_id}"), quantity)?;
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_editable_order(restaurant_id, order_id, &mut tx).await?;
        if !order_lines::update_quantity(&order.id, line_id, quantity, &mut tx).await? {
            return Err(PosEngineError::OrderLineNotFound(line_id));
        }
        let order = orders::recalculate_totals(&order.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Line {line_id} on order {} set to {quantity}. New total {}", order.order_number, order.total);
        Ok(order)
    }

    async fn remove_order_line(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        line_id: i64,
    ) -> Result<Order, PosEngineError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_editable_order(restaurant_id, order_id, &mut tx).await?;
        if !order_lines::delete_line(&order.id, line_id, &mut tx).await? {
            return Err(PosEngineError::OrderLineNotFound(line_id));
        }
        let order = orders::recalculate_totals(&order.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Line {line_id} removed from order {}. New total {}", order.order_number, order.total);
        Ok(order)
    }

    async fn update_status(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<StatusUpdate, PosEngineError> {
        let updated = {
            let mut conn = self.pool.acquire().await?;
            orders::transition_status(restaurant_id, order_id, new_status, &mut conn).await?
        };
        match updated {
            Some(order) => {
                debug!("🗃️ Order {} is now {new_status}", order.order_number);
                Ok(StatusUpdate::Changed(order))
            },
            None => self.explain_failed_transition(restaurant_id, order_id, new_status).await,
        }
    }

    async fn delete_order(&self, restaurant_id: &RestaurantId, order_id: &OrderId) -> Result<(), PosEngineError> {
        let mut tx = self.pool.begin().await?;
        if !orders::delete_order(restaurant_id, order_id, &mut tx).await? {
            return Err(PosEngineError::OrderNotFound(order_id.clone()));
        }
        tx.commit().await?;
        debug!("🗃️ Order {order_id} deleted");
        Ok(())
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn fetch_gateway_credentials(
        &self,
        restaurant_id: &RestaurantId,
    ) -> Result<Option<GatewayCredentials>, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let credentials = restaurants::fetch_credentials(restaurant_id, &mut conn).await?;
        Ok(credentials)
    }

    async fn record_payment_attempt(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        attempt: NewPaymentAttempt,
    ) -> Result<Order, PosEngineError> {
        let mut tx = self.pool.begin().await?;
        let order =
            match orders::set_pending_payment(restaurant_id, order_id, &attempt.checkout_request_id, &mut tx).await? {
                Some(order) => order,
                None => {
                    tx.rollback().await?;
                    let err = match self.fetch_order(restaurant_id, order_id).await? {
                        Some(order) => PosEngineError::InvalidTransition {
                            order_id: order.id,
                            from: order.status,
                            to: OrderStatusType::PendingPayment,
                        },
                        None => PosEngineError::OrderNotFound(order_id.clone()),
                    };
                    return Err(err);
                },
            };
        payments::insert_attempt(restaurant_id, order_id, &attempt, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Payment attempt {} for {} recorded against order {}",
            attempt.checkout_request_id, attempt.amount, order.order_number
        );
        Ok(order)
    }

    async fn fetch_payment_attempt(&self, checkout_request_id: &str) -> Result<Option<PaymentAttempt>, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let attempt = payments::fetch_attempt(checkout_request_id, &mut conn).await?;
        Ok(attempt)
    }

    async fn fetch_payment_attempts(&self, order_id: &OrderId) -> Result<Vec<PaymentAttempt>, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let attempts = payments::fetch_attempts_for_order(order_id, &mut conn).await?;
        Ok(attempts)
    }

    async fn apply_payment_result(
        &self,
        checkout_request_id: &str,
        outcome: &PaymentOutcome,
        payment_method: &str,
    ) -> Result<ApplyResultOutcome, PosEngineError> {
        let mut conn = self.pool.acquire().await?;
        let Some(attempt) = payments::fetch_attempt(checkout_request_id, &mut conn).await? else {
            return Ok(ApplyResultOutcome::UnknownTransaction);
        };
        let updated =
            orders::apply_payment_result(&attempt.order_id, checkout_request_id, outcome, payment_method, &mut conn)
                .await?;
        if let Some(order) = updated {
            return Ok(ApplyResultOutcome::Applied(order));
        }
        let result = match orders::fetch_order_by_id(&attempt.order_id, &mut conn).await? {
            Some(order) if order.status.is_terminal() => ApplyResultOutcome::AlreadyTerminal(order),
            Some(order) => ApplyResultOutcome::Superseded(order),
            None => ApplyResultOutcome::UnknownTransaction,
        };
        Ok(result)
    }
}

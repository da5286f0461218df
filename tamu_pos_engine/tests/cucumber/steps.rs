use std::{str::FromStr, time::Duration};

use cucumber::{then, when};
use tamu_common::{Kes, ProviderResult};
use tamu_pos_engine::{
    db_types::{ApplyResultOutcome, NewOrder, NewOrderLine, OrderMode, OrderStatusType, PaymentOutcome},
    payment_poller::{LocalStatusSource, PaymentPoller, PollOutcome, PollerConfig},
    test_utils::seed::restaurant_id,
    PAYMENT_METHOD_MPESA,
};
use tokio_util::sync::CancellationToken;

use crate::cucumber::PosWorld;

/// Parses "2 x food-nyama, 1 x food-pilau"
fn parse_items(items: &str) -> Vec<NewOrderLine> {
    items
        .split(',')
        .map(|item| {
            let (qty, food) = item.split_once('x').expect("Items look like '2 x food-id'");
            NewOrderLine::new(food.trim(), qty.trim().parse::<i64>().expect("Invalid quantity"))
        })
        .collect()
}

#[when(expr = "I create a {word} order {string} with items {string}")]
async fn create_order(world: &mut PosWorld, mode: String, alias: String, items: String) {
    let mode = OrderMode::from_str(&mode).expect("Invalid order mode");
    let order = parse_items(&items).into_iter().fold(NewOrder::new(mode), |o, line| o.with_item(line));
    let order = world.system().orders.create_order(&restaurant_id(), order).await.expect("Error creating order");
    world.orders.insert(alias, order);
}

#[when(expr = "I request payment for order {string} from {word}")]
async fn request_payment(world: &mut PosWorld, alias: String, phone: String) {
    let order_id = world.order(&alias).id.clone();
    match world.system().payments.initiate_payment(&restaurant_id(), &order_id, &phone, None).await {
        Ok(initiated) => {
            world.checkouts.insert(alias, initiated.checkout_request_id);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[when(expr = "I cancel order {string}")]
async fn cancel_order(world: &mut PosWorld, alias: String) {
    let order_id = world.order(&alias).id.clone();
    world.system().orders.cancel_order(&restaurant_id(), &order_id).await.expect("Error cancelling order");
}

#[when(expr = "the callback for order {string} reports success with receipt {word}")]
async fn callback_success(world: &mut PosWorld, alias: String, receipt: String) {
    let checkout = world.checkout(&alias);
    let outcome = PaymentOutcome::success("The service request is processed successfully.").with_receipt(receipt);
    apply(world, &checkout, outcome).await;
}

#[when(expr = "the callback for order {string} reports failure {word} {string}")]
async fn callback_failure(world: &mut PosWorld, alias: String, code: String, description: String) {
    let checkout = world.checkout(&alias);
    apply(world, &checkout, PaymentOutcome::failure(code, description)).await;
}

#[when(expr = "a callback for checkout {word} reports success")]
async fn callback_for_unknown(world: &mut PosWorld, checkout: String) {
    apply(world, &checkout, PaymentOutcome::success("ok")).await;
}

async fn apply(world: &mut PosWorld, checkout: &str, outcome: PaymentOutcome) {
    let result = world.system().payments.apply_payment_result(checkout, outcome).await.expect("Error applying result");
    world.last_result = Some(result);
}

#[when(expr = "the provider says the payment for order {string} succeeded")]
async fn provider_success(world: &mut PosWorld, alias: String) {
    let checkout = world.checkout(&alias);
    world.system().gateway.set_result(&checkout, ProviderResult::Success { description: "processed".into() });
}

#[when(expr = "the provider says the payment for order {string} failed with {word} {string}")]
async fn provider_failure(world: &mut PosWorld, alias: String, code: String, description: String) {
    let checkout = world.checkout(&alias);
    world.system().gateway.set_result(&checkout, ProviderResult::TerminalFailure { code, description });
}

#[when(expr = "the till polls order {string} for at most {int}ms")]
async fn poll(world: &mut PosWorld, alias: String, ceiling: u64) {
    let order_id = world.order(&alias).id.clone();
    let checkout = world.checkout(&alias);
    let outcome = {
        let source = LocalStatusSource::new(&world.system().payments, restaurant_id());
        let config = PollerConfig::new(Duration::from_millis(20), Duration::from_millis(ceiling));
        PaymentPoller::new(source, config).poll(&order_id, &checkout, CancellationToken::new()).await
    };
    world.last_poll = Some(outcome);
}

#[then(expr = "order {string} has a subtotal of {int} KES, VAT of {int} KES, catering levy of {int} KES and total of {int} KES")]
async fn check_totals(world: &mut PosWorld, alias: String, subtotal: i64, vat: i64, levy: i64, total: i64) {
    let order = world.order(&alias);
    assert_eq!(order.subtotal, Kes::from_shillings(subtotal), "subtotal");
    assert_eq!(order.vat, Kes::from_shillings(vat), "VAT");
    assert_eq!(order.catering_levy, Kes::from_shillings(levy), "catering levy");
    assert_eq!(order.total, Kes::from_shillings(total), "total");
}

#[then(expr = "order {string} has status {word}")]
async fn check_status(world: &mut PosWorld, alias: String, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Invalid status");
    let order_id = world.order(&alias).id.clone();
    let order = world.system().orders.fetch_order(&restaurant_id(), &order_id).await.unwrap().expect("Order not found");
    assert_eq!(order.order.status, expected);
}

#[then(expr = "order {string} was paid by M-Pesa")]
async fn check_paid_by_mpesa(world: &mut PosWorld, alias: String) {
    let order_id = world.order(&alias).id.clone();
    let status = world.system().orders.fetch_order_status(&order_id).await.unwrap().expect("Order not found");
    assert_eq!(status.payment_method.as_deref(), Some(PAYMENT_METHOD_MPESA));
    assert_eq!(status.transaction_id, Some(world.checkout(&alias)));
    assert!(status.callback_received);
}

#[then(expr = "{int} STK push(es) were sent")]
async fn check_push_count(world: &mut PosWorld, count: usize) {
    assert_eq!(world.system().gateway.pushes().len(), count);
}

#[then("the result was applied")]
async fn check_applied(world: &mut PosWorld) {
    let result = world.last_result.as_ref().expect("No result was applied");
    assert!(result.is_applied(), "{result}");
}

#[then("the result was ignored because the order is already settled")]
async fn check_already_terminal(world: &mut PosWorld) {
    let result = world.last_result.as_ref().expect("No result was applied");
    assert!(matches!(result, ApplyResultOutcome::AlreadyTerminal(_)), "{result}");
}

#[then("the result was ignored because the transaction is unknown")]
async fn check_unknown(world: &mut PosWorld) {
    assert_eq!(world.last_result, Some(ApplyResultOutcome::UnknownTransaction));
}

#[then(expr = "polling ended with {word}")]
async fn check_poll_outcome(world: &mut PosWorld, outcome: String) {
    let actual = world.last_poll.as_ref().expect("The till did not poll");
    let matched = match outcome.as_str() {
        "PAID" => matches!(actual, PollOutcome::Paid),
        "FAILED" => matches!(actual, PollOutcome::Failed { .. }),
        "TIMED_OUT" => matches!(actual, PollOutcome::TimedOut),
        _ => panic!("Unknown poll outcome {outcome}"),
    };
    assert!(matched, "Expected {outcome}, got {actual}");
}

#[then(expr = "the payment request failed with {string}")]
async fn check_request_failed(world: &mut PosWorld, message: String) {
    let err = world.last_error.as_ref().expect("The payment request succeeded");
    assert!(err.contains(&message), "{err}");
}

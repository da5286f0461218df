use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::*;
use tamu_common::Kes;
use tamu_pos_engine::{
    db_types::OrderId,
    payment_poller::{PaymentPoller, PollOutcome, PollerConfig},
};
use tokio_util::sync::CancellationToken;
use url::Url;

mod formatting;
mod pos_server;

use formatting::{format_order_status, format_outcome, format_push};
use pos_server::{HttpStatusSource, PosServerClient};

const CLOCK_TICKS: [&str; 12] = ["🕛 ", "🕐 ", "🕑 ", "🕒 ", "🕓 ", "🕔 ", "🕕 ", "🕖 ", "🕗 ", "🕘 ", "🕙 ", "🕚 "];

#[derive(Parser, Debug)]
#[command(name = "tamu", version, about = "Take M-Pesa payments for Tamu POS orders from the command line")]
pub struct Arguments {
    /// The POS server to talk to
    #[arg(short, long, env = "TAMU_SERVER_URL", default_value = "http://127.0.0.1:8460/")]
    server: Url,
    /// A bearer token issued for your restaurant
    #[arg(short = 't', long = "token", env = "TAMU_ACCESS_TOKEN", hide_env_values = true, default_value = "")]
    token: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[clap(name = "checkout", about = "Send an STK push for an order and wait for the customer to pay")]
    Checkout(CheckoutParams),
    #[clap(name = "status", about = "Print the payment status of an order")]
    Status {
        #[arg(short = 'o', long = "order")]
        order_id: OrderId,
    },
    #[clap(name = "poll", about = "Resume waiting for an STK push that has already been sent")]
    Poll(PollParams),
}

#[derive(Debug, Args)]
pub struct CheckoutParams {
    #[arg(short = 'o', long = "order")]
    order_id: OrderId,
    /// The customer's M-Pesa number, e.g. 0712345678
    #[arg(short = 'p', long = "phone")]
    phone: String,
    /// Amount in shillings. Defaults to the order total.
    #[arg(short = 'a', long = "amount")]
    amount: Option<Kes>,
    #[command(flatten)]
    timing: PollTiming,
}

#[derive(Debug, Args)]
pub struct PollParams {
    #[arg(short = 'o', long = "order")]
    order_id: OrderId,
    /// The checkout reference returned by the STK push
    #[arg(short = 'c', long = "checkout")]
    checkout_request_id: String,
    #[command(flatten)]
    timing: PollTiming,
}

#[derive(Debug, Args)]
pub struct PollTiming {
    /// Seconds between status checks
    #[arg(long = "interval", default_value = "3.5")]
    interval: f64,
    /// Give up after this many seconds
    #[arg(long = "timeout", default_value = "90")]
    timeout: u64,
}

impl PollTiming {
    fn config(&self) -> PollerConfig {
        let interval = Duration::from_secs_f64(self.interval.max(0.5));
        PollerConfig::new(interval, Duration::from_secs(self.timeout))
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    let result = match PosServerClient::new(cli.server, cli.token) {
        Ok(client) => run(client, cli.command).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(client: PosServerClient, command: Command) -> Result<()> {
    match command {
        Command::Checkout(params) => checkout(client, params).await,
        Command::Status { order_id } => {
            let status = client.order_status(&order_id).await?;
            println!("{}", format_order_status(&status));
            Ok(())
        },
        Command::Poll(params) => {
            let outcome = wait_for_payment(client, &params.order_id, &params.checkout_request_id, params.timing).await;
            println!("{}", format_outcome(&outcome));
            Ok(())
        },
    }
}

async fn checkout(client: PosServerClient, params: CheckoutParams) -> Result<()> {
    let push = client.stk_push(&params.order_id, &params.phone, params.amount).await?;
    print!("{}", format_push(&push)?);
    let outcome = wait_for_payment(client, &params.order_id, &push.checkout_request_id, params.timing).await;
    println!("{}", format_outcome(&outcome));
    Ok(())
}

/// Runs the poller until the payment settles. Ctrl-C stops waiting. It never cancels the order.
async fn wait_for_payment(
    client: PosServerClient,
    order_id: &OrderId,
    checkout_request_id: &str,
    timing: PollTiming,
) -> PollOutcome {
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:5} {msg} [{elapsed}]") {
        pb.set_style(style.tick_strings(&CLOCK_TICKS));
    }
    pb.set_message(format!("Waiting for the customer to pay (checkout {checkout_request_id}). Ctrl-C to stop"));
    info!("🔁️ Polling {} for order {order_id}", client.server());
    let poller = PaymentPoller::new(HttpStatusSource::new(client), timing.config());
    let outcome = poller.poll(order_id, checkout_request_id, cancel).await;
    pb.finish_and_clear();
    outcome
}

use std::fmt::Write;

use anyhow::Result;
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};
use tamu_pos_engine::{payment_objects::OrderPaymentStatus, payment_poller::PollOutcome};
use tamu_pos_server::data_objects::StkPushResponse;

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

pub fn format_order_status(status: &OrderPaymentStatus) -> String {
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["Order", "Status", "Total", "Checkout reference", "Method", "Callback"]);
    table.add_row(row![
        status.order_number,
        status.status,
        status.total_amount,
        status.transaction_id.as_deref().unwrap_or("-"),
        status.payment_method.as_deref().unwrap_or("-"),
        if status.callback_received { "yes" } else { "no" }
    ]);
    table.to_string()
}

pub fn format_push(push: &StkPushResponse) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "{}", push.message)?;
    writeln!(f, "Checkout reference: {}", push.checkout_request_id)?;
    writeln!(f, "Merchant reference: {}", push.merchant_request_id)?;
    Ok(f)
}

pub fn format_outcome(outcome: &PollOutcome) -> String {
    let icon = match outcome {
        PollOutcome::Paid => "✅️",
        PollOutcome::Failed { .. } => "❌️",
        PollOutcome::QueryFailed { .. } => "⚠️",
        PollOutcome::TimedOut | PollOutcome::Cancelled => "⏸️",
        PollOutcome::OrderCancelled { refund_due: false } => "🚫️",
        PollOutcome::OrderCancelled { refund_due: true } => "💸️",
    };
    let mut s = format!("{icon} {outcome}");
    if outcome.is_inconclusive() {
        s.push_str("\n   Check again later with `tamu status`.");
    }
    s
}

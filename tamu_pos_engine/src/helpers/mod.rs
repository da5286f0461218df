mod order_number;
mod totals;

pub use order_number::{
    candidate_counter,
    fallback_order_number,
    format_order_number,
    order_number_prefix,
    parse_order_counter,
    MAX_ALLOCATION_ATTEMPTS,
};
pub use totals::{check_quantity, OrderTotals, CATERING_LEVY_PERCENT, MAX_LINE_QUANTITY, VAT_PERCENT};

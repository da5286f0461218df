use serde::{Deserialize, Serialize};
use tamu_common::Kes;

use crate::traits::PosEngineError;

pub const VAT_PERCENT: i64 = 16;
pub const CATERING_LEVY_PERCENT: i64 = 2;
/// The most of one item a single order line can hold
pub const MAX_LINE_QUANTITY: i64 = 1_000;

/// Rejects quantities that are not positive or larger than [`MAX_LINE_QUANTITY`].
pub fn check_quantity(food_item_id: &str, quantity: i64) -> Result<(), PosEngineError> {
    if quantity <= 0 {
        return Err(PosEngineError::ValidationError(format!(
            "Quantity for {food_item_id} must be positive, not {quantity}"
        )));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(PosEngineError::ValidationError(format!(
            "Quantity for {food_item_id} cannot exceed {MAX_LINE_QUANTITY}, not {quantity}"
        )));
    }
    Ok(())
}

/// The money columns of an order. `total == subtotal + vat + catering_levy` holds exactly, since every amount is in
/// whole cents and the percentages are rounded (half up) before they are added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Kes,
    pub vat: Kes,
    pub catering_levy: Kes,
    pub total: Kes,
}

impl OrderTotals {
    pub fn from_subtotal(subtotal: Kes) -> Result<Self, PosEngineError> {
        let vat = subtotal.percent(VAT_PERCENT).ok_or_else(|| too_large(subtotal))?;
        let catering_levy = subtotal.percent(CATERING_LEVY_PERCENT).ok_or_else(|| too_large(subtotal))?;
        let total = subtotal
            .checked_add(vat)
            .and_then(|t| t.checked_add(catering_levy))
            .ok_or_else(|| too_large(subtotal))?;
        Ok(Self { subtotal, vat, catering_levy, total })
    }

    /// Totals for `(unit price, quantity)` pairs
    pub fn from_priced_quantities<I: IntoIterator<Item = (Kes, i64)>>(items: I) -> Result<Self, PosEngineError> {
        let subtotal = items
            .into_iter()
            .try_fold(Kes::default(), |acc, (price, qty)| price.checked_mul(qty).and_then(|v| acc.checked_add(v)))
            .ok_or_else(|| PosEngineError::ValidationError("The order total is too large".into()))?;
        Self::from_subtotal(subtotal)
    }
}

fn too_large(subtotal: Kes) -> PosEngineError {
    PosEngineError::ValidationError(format!("The order total is too large. Subtotal {subtotal}"))
}

//! Stock ledger rules.
//!
//! Every write to a stock item goes through these functions: they derive the
//! profit ratio from the prices and decide which movement row, if any, the
//! write appends to the ledger. Nothing here touches the database.

use crate::entities::stock_movement::MovementKind;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Fractional digits kept on a stored profit ratio
pub const RATIO_SCALE: u32 = 2;

pub const INITIAL_ENTRY_NOTE: &str = "Initial stock entry";
pub const UPDATE_NOTE: &str = "Stock update";

/// A movement the caller must persist next to the stock write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementDraft {
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub previous_remaining: Decimal,
    pub new_remaining: Decimal,
    pub note: &'static str,
}

/// Markup of `sale` over `purchase` in percent, rounded half away from zero
/// to [`RATIO_SCALE`] digits.
///
/// Zero when either price is missing or the purchase price is not positive.
pub fn profit_ratio(purchase: Option<Decimal>, sale: Option<Decimal>) -> Decimal {
    match (purchase, sale) {
        (Some(purchase), Some(sale)) if purchase > Decimal::ZERO => {
            ((sale - purchase) / purchase * dec!(100))
                .round_dp_with_strategy(RATIO_SCALE, RoundingStrategy::MidpointAwayFromZero)
        }
        _ => Decimal::ZERO,
    }
}

/// The single movement recorded when an item enters stock.
pub fn plan_creation(total_weight: Decimal) -> MovementDraft {
    MovementDraft {
        kind: MovementKind::In,
        quantity: total_weight,
        previous_remaining: Decimal::ZERO,
        new_remaining: total_weight,
        note: INITIAL_ENTRY_NOTE,
    }
}

/// The movement for a change of remaining weight, or `None` when the weight
/// did not change.
pub fn plan_update(old_remaining: Decimal, new_remaining: Decimal) -> Option<MovementDraft> {
    if new_remaining == old_remaining {
        return None;
    }

    let kind = if new_remaining > old_remaining {
        MovementKind::In
    } else {
        MovementKind::Out
    };

    Some(MovementDraft {
        kind,
        quantity: (new_remaining - old_remaining).abs(),
        previous_remaining: old_remaining,
        new_remaining,
        note: UPDATE_NOTE,
    })
}

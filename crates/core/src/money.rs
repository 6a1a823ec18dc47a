//! Money helpers built on `rust_decimal`.
//!
//! All monetary math is done in `Decimal`. Comparisons that decide whether an
//! order is settled absorb rounding noise from split payments with a fixed
//! tolerance of one cent.

use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary amount in the order's currency.
pub type Money = Decimal;

/// Rounding tolerance for settlement comparisons (0.01).
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Round to cents, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `|a - b| <= 0.01`
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= MONEY_TOLERANCE
}

/// True when `paid` settles `due` (paid >= due - 0.01).
pub fn covers(paid: Decimal, due: Decimal) -> bool {
    paid >= due - MONEY_TOLERANCE
}

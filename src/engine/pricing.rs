//! Price and size arithmetic for the sideways method.
//!
//! All rounding is directional: prices round toward the side that favors
//! order acceptance (buys down, sells up) and sizes round down so an
//! order can never exceed the available balance.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// The buy/sell limit prices bracketing a reference price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceTargets {
    pub buy: Decimal,
    pub sell: Decimal,
}

/// Compute the limit prices `movement_pct` percent below and above the
/// current price, rounded to the venue's price precision.
///
/// For any positive `movement_pct`, `buy < current < sell` holds: the
/// buy side floors a value strictly below `current`, the sell side
/// ceils a value strictly above it.
pub fn price_targets(current: Decimal, movement_pct: Decimal, price_decimals: u32) -> PriceTargets {
    let fraction = movement_pct / dec!(100);
    let buy = (current * (Decimal::ONE - fraction))
        .round_dp_with_strategy(price_decimals, RoundingStrategy::ToNegativeInfinity);
    let sell = (current * (Decimal::ONE + fraction))
        .round_dp_with_strategy(price_decimals, RoundingStrategy::ToPositiveInfinity);
    PriceTargets { buy, sell }
}

/// Crypto amount purchasable with `usd` at `buy_price`, after holding
/// back `fee_margin_pct` percent for venue fees.
pub fn buy_size(
    usd: Decimal,
    buy_price: Decimal,
    fee_margin_pct: Decimal,
    amount_decimals: u32,
) -> Decimal {
    let spendable = usd * (Decimal::ONE - fee_margin_pct / dec!(100));
    (spendable / buy_price)
        .round_dp_with_strategy(amount_decimals, RoundingStrategy::ToNegativeInfinity)
}

/// Full crypto position trimmed to the venue's amount precision.
pub fn sell_size(crypto: Decimal, amount_decimals: u32) -> Decimal {
    crypto.round_dp_with_strategy(amount_decimals, RoundingStrategy::ToNegativeInfinity)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

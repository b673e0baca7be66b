/*
[INPUT]:  Venue order/market payloads after decoding
[OUTPUT]: Canonical order and market metadata types
[POS]:    Data layer - exchange-independent models
[UPDATE]: When the canonical order shape or precision handling changes
*/

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::enums::{OrderStatus, Rounding, Side};

/// Canonical order snapshot.
///
/// Every order-shaped payload (REST responses, user-data stream updates)
/// normalizes into this shape before the trading core sees it. Symbols are
/// in canonical form (`BTC/USDT` or `BTC/USDT:USDT`), monetary fields are
/// decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub symbol: String,
    pub status: OrderStatus,
    pub side: Side,
    pub amount: Decimal,
    pub filled: Decimal,
    /// Quantity executed by the event that produced this snapshot. Zero for
    /// REST responses, which only report cumulative fills.
    pub last_filled: Decimal,
    pub remaining: Decimal,
    pub client_order_id: String,
    pub average: Decimal,
    pub price: Decimal,
}

/// Precision metadata for one tradable symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub symbol: String,
    pub price_decimals: u32,
    pub amount_decimals: u32,
}

impl Market {
    pub fn price_to_precision(&self, price: Decimal, rounding: Rounding) -> Decimal {
        quantize(price, self.price_decimals, rounding)
    }

    pub fn amount_to_precision(&self, amount: Decimal, rounding: Rounding) -> Decimal {
        quantize(amount, self.amount_decimals, rounding)
    }
}

fn quantize(value: Decimal, decimals: u32, rounding: Rounding) -> Decimal {
    let strategy = match rounding {
        Rounding::Nearest => RoundingStrategy::MidpointAwayFromZero,
        Rounding::Ceil => RoundingStrategy::ToPositiveInfinity,
        Rounding::Floor => RoundingStrategy::ToNegativeInfinity,
    };
    value.round_dp_with_strategy(decimals, strategy).normalize()
}

/// Number of significant decimal places in a filter step such as
/// `"0.00100000"` (⇒ 3). Steps of `"1.00000000"` quantize to integers.
pub fn decimals_from_step(step: Decimal) -> u32 {
    step.normalize().scale()
}

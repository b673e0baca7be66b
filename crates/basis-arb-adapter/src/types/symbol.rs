/*
[INPUT]:  Symbols in spot (`BTC/USDT`), linear (`BTC/USDT:USDT`) or venue-raw (`BTCUSDT`) form
[OUTPUT]: Pure string conversions between the three forms
[POS]:    Data layer - symbol identity
[UPDATE]: When supporting quote assets other than USDT
*/

use super::enums::MarketKind;

pub const LINEAR_SUFFIX: &str = ":USDT";
const QUOTE_ASSET: &str = "USDT";

/// True for linear-form symbols (`BTC/USDT:USDT`).
pub fn is_linear(symbol: &str) -> bool {
    symbol.ends_with(LINEAR_SUFFIX)
}

pub fn spot_to_linear(spot: &str) -> String {
    format!("{spot}{LINEAR_SUFFIX}")
}

pub fn linear_to_spot(symbol: &str) -> String {
    symbol
        .strip_suffix(LINEAR_SUFFIX)
        .unwrap_or(symbol)
        .to_string()
}

/// Venue-raw form used on the wire, identical for both instrument classes.
pub fn to_exchange(symbol: &str) -> String {
    linear_to_spot(symbol).replace('/', "")
}

/// Canonical form for a venue-raw symbol. Unknown quote assets pass through
/// unchanged; the engine only trades USDT-quoted pairs.
pub fn from_exchange(raw: &str, kind: MarketKind) -> String {
    let Some(base) = raw.strip_suffix(QUOTE_ASSET) else {
        return raw.to_string();
    };
    match kind {
        MarketKind::Spot => format!("{base}/{QUOTE_ASSET}"),
        MarketKind::Linear => format!("{base}/{QUOTE_ASSET}{LINEAR_SUFFIX}"),
    }
}

pub fn kind_of(symbol: &str) -> MarketKind {
    if is_linear(symbol) {
        MarketKind::Linear
    } else {
        MarketKind::Spot
    }
}

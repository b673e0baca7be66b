/*
[INPUT]:  Exchange-info payloads from both instrument classes
[OUTPUT]: Loaded market precision metadata and quantization helpers
[POS]:    HTTP layer - public market metadata endpoints
[UPDATE]: When the venue changes its exchange-info schema
*/

use reqwest::Method;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::http::client::BinanceClient;
use crate::http::error::Result;
use crate::types::{Market, MarketKind, Rounding, decimals_from_step, from_exchange};

const SPOT_EXCHANGE_INFO: &str = "/api/v3/exchangeInfo";
const FUTURES_EXCHANGE_INFO: &str = "/fapi/v1/exchangeInfo";
const QUOTE_ASSET: &str = "USDT";
const TRADING: &str = "TRADING";

impl BinanceClient {
    /// Load precision metadata for every tradable USDT-quoted market on
    /// both instrument classes. Must run before any precision call.
    pub async fn load_markets(&self) -> Result<usize> {
        let spot: SpotExchangeInfo = self
            .send(self.request(MarketKind::Spot, Method::GET, SPOT_EXCHANGE_INFO)?)
            .await?;
        let futures: FuturesExchangeInfo = self
            .send(self.request(MarketKind::Linear, Method::GET, FUTURES_EXCHANGE_INFO)?)
            .await?;

        let mut markets = Vec::new();
        for symbol in spot.symbols {
            if symbol.status != TRADING || symbol.quote_asset != QUOTE_ASSET {
                continue;
            }
            markets.push(Market {
                symbol: from_exchange(&symbol.symbol, MarketKind::Spot),
                price_decimals: symbol.price_decimals(),
                amount_decimals: symbol.amount_decimals(),
            });
        }
        for symbol in futures.symbols {
            if symbol.status != TRADING || symbol.quote_asset != QUOTE_ASSET {
                continue;
            }
            markets.push(Market {
                symbol: from_exchange(&symbol.symbol, MarketKind::Linear),
                price_decimals: symbol.price_precision,
                amount_decimals: symbol.quantity_precision,
            });
        }

        let count = markets.len();
        self.insert_markets(markets);
        tracing::info!(markets = count, "loaded market metadata");
        Ok(count)
    }

    pub fn amount_to_precision(
        &self,
        symbol: &str,
        amount: Decimal,
        rounding: Rounding,
    ) -> Result<Decimal> {
        Ok(self.market(symbol)?.amount_to_precision(amount, rounding))
    }

    pub fn price_to_precision(
        &self,
        symbol: &str,
        price: Decimal,
        rounding: Rounding,
    ) -> Result<Decimal> {
        Ok(self.market(symbol)?.price_to_precision(price, rounding))
    }
}

#[derive(Debug, Deserialize)]
struct SpotExchangeInfo {
    symbols: Vec<SpotSymbol>,
}

#[derive(Debug, Deserialize)]
struct SpotSymbol {
    symbol: String,
    status: String,
    #[serde(rename = "quoteAsset")]
    quote_asset: String,
    filters: Vec<SymbolFilter>,
}

impl SpotSymbol {
    fn price_decimals(&self) -> u32 {
        self.filter_step("PRICE_FILTER")
            .map(decimals_from_step)
            .unwrap_or(8)
    }

    fn amount_decimals(&self) -> u32 {
        self.filter_step("LOT_SIZE")
            .map(decimals_from_step)
            .unwrap_or(8)
    }

    fn filter_step(&self, filter_type: &str) -> Option<Decimal> {
        self.filters
            .iter()
            .find(|filter| filter.filter_type == filter_type)
            .and_then(|filter| filter.tick_size.or(filter.step_size))
    }
}

#[derive(Debug, Deserialize)]
struct SymbolFilter {
    #[serde(rename = "filterType")]
    filter_type: String,
    #[serde(rename = "tickSize", default, with = "rust_decimal::serde::str_option")]
    tick_size: Option<Decimal>,
    #[serde(rename = "stepSize", default, with = "rust_decimal::serde::str_option")]
    step_size: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct FuturesExchangeInfo {
    symbols: Vec<FuturesSymbol>,
}

#[derive(Debug, Deserialize)]
struct FuturesSymbol {
    symbol: String,
    status: String,
    #[serde(rename = "quoteAsset")]
    quote_asset: String,
    #[serde(rename = "pricePrecision")]
    price_precision: u32,
    #[serde(rename = "quantityPrecision")]
    quantity_precision: u32,
}

/*
[INPUT]:  Order intents in canonical form
[OUTPUT]: Signed order placement/cancel calls, normalized responses
[POS]:    HTTP layer - trading endpoints
[UPDATE]: When adding order types or changing response normalization
*/

use reqwest::Method;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::http::client::BinanceClient;
use crate::http::error::{BinanceError, Result};
use crate::types::{
    MarketKind, OrderResponse, OrderStatus, OrderType, Side, from_exchange, kind_of, to_exchange,
};

const SPOT_ORDER: &str = "/api/v3/order";
const FUTURES_ORDER: &str = "/fapi/v1/order";

/// Canonical order intent. The symbol form decides the instrument class.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub order_type: OrderType,
    pub side: Side,
    pub amount: Decimal,
    pub price: Option<Decimal>,
    pub reduce_only: bool,
    pub client_order_id: Option<String>,
}

impl BinanceClient {
    /// Place an order and normalize the venue response.
    pub async fn create_order(&self, req: &OrderRequest) -> Result<OrderResponse> {
        let kind = kind_of(&req.symbol);
        let mut params: Vec<(&str, String)> = vec![
            ("symbol", to_exchange(&req.symbol)),
            ("side", req.side.as_venue().to_string()),
            ("type", req.order_type.as_venue().to_string()),
            ("quantity", req.amount.to_string()),
        ];
        if let Some(price) = req.price {
            params.push(("price", price.to_string()));
            params.push(("timeInForce", "GTC".to_string()));
        }
        // Reduce-only exists on the derivatives API only.
        if req.reduce_only && kind == MarketKind::Linear {
            params.push(("reduceOnly", "true".to_string()));
        }
        if let Some(id) = &req.client_order_id {
            params.push(("newClientOrderId", id.clone()));
        }

        let endpoint = order_endpoint(kind);
        match kind {
            MarketKind::Spot => {
                let raw: SpotOrderRaw = self
                    .send(self.signed_request(kind, Method::POST, endpoint, &params)?)
                    .await?;
                raw.normalize()
            }
            MarketKind::Linear => {
                let raw: FuturesOrderRaw = self
                    .send(self.signed_request(kind, Method::POST, endpoint, &params)?)
                    .await?;
                raw.normalize()
            }
        }
    }

    /// Cancel an order by exchange id and normalize the venue response.
    pub async fn cancel_order(&self, order_id: &str, symbol: &str) -> Result<OrderResponse> {
        let kind = kind_of(symbol);
        let params: Vec<(&str, String)> = vec![
            ("symbol", to_exchange(symbol)),
            ("orderId", order_id.to_string()),
        ];

        let endpoint = order_endpoint(kind);
        match kind {
            MarketKind::Spot => {
                let raw: SpotOrderRaw = self
                    .send(self.signed_request(kind, Method::DELETE, endpoint, &params)?)
                    .await?;
                raw.normalize()
            }
            MarketKind::Linear => {
                let raw: FuturesOrderRaw = self
                    .send(self.signed_request(kind, Method::DELETE, endpoint, &params)?)
                    .await?;
                raw.normalize()
            }
        }
    }
}

fn order_endpoint(kind: MarketKind) -> &'static str {
    match kind {
        MarketKind::Spot => SPOT_ORDER,
        MarketKind::Linear => FUTURES_ORDER,
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    OrderStatus::from_venue(raw)
        .ok_or_else(|| BinanceError::InvalidResponse(format!("unknown order status: {raw}")))
}

fn parse_side(raw: &str) -> Result<Side> {
    Side::from_venue(raw)
        .ok_or_else(|| BinanceError::InvalidResponse(format!("unknown order side: {raw}")))
}

#[derive(Debug, Deserialize)]
struct SpotOrderRaw {
    symbol: String,
    #[serde(rename = "orderId")]
    order_id: i64,
    #[serde(rename = "clientOrderId")]
    client_order_id: String,
    status: String,
    side: String,
    #[serde(with = "rust_decimal::serde::str")]
    price: Decimal,
    #[serde(rename = "origQty", with = "rust_decimal::serde::str")]
    orig_qty: Decimal,
    #[serde(rename = "executedQty", with = "rust_decimal::serde::str")]
    executed_qty: Decimal,
    #[serde(
        rename = "cummulativeQuoteQty",
        default,
        with = "rust_decimal::serde::str_option"
    )]
    cumulative_quote_qty: Option<Decimal>,
}

impl SpotOrderRaw {
    fn normalize(self) -> Result<OrderResponse> {
        // The spot API reports no average price; derive it from the quote
        // turnover when anything has executed.
        let average = match self.cumulative_quote_qty {
            Some(quote) if !self.executed_qty.is_zero() => quote / self.executed_qty,
            _ => Decimal::ZERO,
        };
        Ok(OrderResponse {
            id: self.order_id.to_string(),
            symbol: from_exchange(&self.symbol, MarketKind::Spot),
            status: parse_status(&self.status)?,
            side: parse_side(&self.side)?,
            amount: self.orig_qty,
            filled: self.executed_qty,
            last_filled: Decimal::ZERO,
            remaining: self.orig_qty - self.executed_qty,
            client_order_id: self.client_order_id,
            average,
            price: self.price,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FuturesOrderRaw {
    symbol: String,
    #[serde(rename = "orderId")]
    order_id: i64,
    #[serde(rename = "clientOrderId")]
    client_order_id: String,
    status: String,
    side: String,
    #[serde(with = "rust_decimal::serde::str")]
    price: Decimal,
    #[serde(rename = "avgPrice", default, with = "rust_decimal::serde::str_option")]
    avg_price: Option<Decimal>,
    #[serde(rename = "origQty", with = "rust_decimal::serde::str")]
    orig_qty: Decimal,
    #[serde(rename = "executedQty", with = "rust_decimal::serde::str")]
    executed_qty: Decimal,
}

impl FuturesOrderRaw {
    fn normalize(self) -> Result<OrderResponse> {
        Ok(OrderResponse {
            id: self.order_id.to_string(),
            symbol: from_exchange(&self.symbol, MarketKind::Linear),
            status: parse_status(&self.status)?,
            side: parse_side(&self.side)?,
            amount: self.orig_qty,
            filled: self.executed_qty,
            last_filled: Decimal::ZERO,
            remaining: self.orig_qty - self.executed_qty,
            client_order_id: self.client_order_id,
            average: self.avg_price.unwrap_or(Decimal::ZERO),
            price: self.price,
        })
    }
}

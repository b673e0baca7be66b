/*
[INPUT]:  Raw user-data WebSocket frames
[OUTPUT]: Parsed frame structs, discriminated on the `e` event field
[POS]:    WebSocket layer - message parsing and validation
[UPDATE]: When adding new event types or the venue changes field layouts
*/

use rust_decimal::Decimal;
use serde::Deserialize;

/// User-data stream frame. The spot stream delivers order fields at the
/// top level, the futures stream nests them under `o`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "e")]
pub enum UserDataFrame {
    #[serde(rename = "executionReport")]
    SpotOrderUpdate(SpotOrderUpdate),
    #[serde(rename = "outboundAccountPosition")]
    SpotAccountUpdate(SpotAccountUpdate),
    #[serde(rename = "ORDER_TRADE_UPDATE")]
    LinearOrderUpdate(LinearOrderUpdate),
    #[serde(rename = "ACCOUNT_UPDATE")]
    LinearAccountUpdate(LinearAccountUpdate),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotOrderUpdate {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub client_order_id: String,
    #[serde(rename = "S")]
    pub side: String,
    #[serde(rename = "X")]
    pub status: String,
    #[serde(rename = "i")]
    pub order_id: i64,
    #[serde(rename = "q", with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(rename = "z", with = "rust_decimal::serde::str")]
    pub filled: Decimal,
    #[serde(rename = "l", with = "rust_decimal::serde::str")]
    pub last_filled: Decimal,
    #[serde(rename = "p", with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearOrderUpdate {
    #[serde(rename = "o")]
    pub order: LinearOrderData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearOrderData {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub client_order_id: String,
    #[serde(rename = "S")]
    pub side: String,
    #[serde(rename = "X")]
    pub status: String,
    #[serde(rename = "i")]
    pub order_id: i64,
    #[serde(rename = "q", with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(rename = "z", with = "rust_decimal::serde::str")]
    pub filled: Decimal,
    #[serde(rename = "l", with = "rust_decimal::serde::str")]
    pub last_filled: Decimal,
    #[serde(rename = "ap", with = "rust_decimal::serde::str")]
    pub average: Decimal,
    #[serde(rename = "p", with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotAccountUpdate {
    #[serde(rename = "B")]
    pub balances: Vec<SpotBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotBalance {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "f", with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(rename = "l", with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearAccountUpdate {
    #[serde(rename = "a")]
    pub data: LinearAccountData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearAccountData {
    #[serde(rename = "B")]
    pub balances: Vec<LinearBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearBalance {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "wb", with = "rust_decimal::serde::str")]
    pub wallet_balance: Decimal,
}

/*
[INPUT]:  Order intents from the executor and fill reactor
[OUTPUT]: Canonical order responses; failures collapsed to None with a log
[POS]:    Execution layer - exchange boundary
[UPDATE]: When changing order parameters or the exchange seam
*/

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use rust_decimal::Decimal;
use tracing::{error, info};

use basis_arb_adapter::{
    BinanceClient, OrderRequest, OrderResponse, OrderType, Rounding, Side,
};

/// Exchange seam used by the trading core.
///
/// Object-safe so tests can substitute mocks for the HTTP client.
pub trait ExchangeApi: Send + Sync {
    fn create_order(
        &self,
        req: OrderRequest,
    ) -> Pin<Box<dyn Future<Output = basis_arb_adapter::Result<OrderResponse>> + Send + '_>>;

    fn cancel_order(
        &self,
        order_id: String,
        symbol: String,
    ) -> Pin<Box<dyn Future<Output = basis_arb_adapter::Result<OrderResponse>> + Send + '_>>;

    fn amount_to_precision(
        &self,
        symbol: &str,
        amount: Decimal,
        rounding: Rounding,
    ) -> basis_arb_adapter::Result<Decimal>;

    fn price_to_precision(
        &self,
        symbol: &str,
        price: Decimal,
        rounding: Rounding,
    ) -> basis_arb_adapter::Result<Decimal>;
}

impl ExchangeApi for BinanceClient {
    fn create_order(
        &self,
        req: OrderRequest,
    ) -> Pin<Box<dyn Future<Output = basis_arb_adapter::Result<OrderResponse>> + Send + '_>> {
        Box::pin(async move { BinanceClient::create_order(self, &req).await })
    }

    fn cancel_order(
        &self,
        order_id: String,
        symbol: String,
    ) -> Pin<Box<dyn Future<Output = basis_arb_adapter::Result<OrderResponse>> + Send + '_>> {
        Box::pin(async move { BinanceClient::cancel_order(self, &order_id, &symbol).await })
    }

    fn amount_to_precision(
        &self,
        symbol: &str,
        amount: Decimal,
        rounding: Rounding,
    ) -> basis_arb_adapter::Result<Decimal> {
        BinanceClient::amount_to_precision(self, symbol, amount, rounding)
    }

    fn price_to_precision(
        &self,
        symbol: &str,
        price: Decimal,
        rounding: Rounding,
    ) -> basis_arb_adapter::Result<Decimal> {
        BinanceClient::price_to_precision(self, symbol, price, rounding)
    }
}

/// Order placement wrapper. Network and venue failures are recoverable at
/// every call site, so they are logged here and collapsed to `None`.
pub struct OrderRouter {
    api: Arc<dyn ExchangeApi>,
}

impl OrderRouter {
    pub fn new(api: Arc<dyn ExchangeApi>) -> Self {
        Self { api }
    }

    pub async fn place_limit(
        &self,
        symbol: &str,
        side: Side,
        amount: Decimal,
        price: Decimal,
        reduce_only: bool,
        client_order_id: &str,
    ) -> Option<OrderResponse> {
        let req = OrderRequest {
            symbol: symbol.to_string(),
            order_type: OrderType::Limit,
            side,
            amount,
            price: Some(price),
            reduce_only,
            client_order_id: Some(client_order_id.to_string()),
        };
        match self.api.create_order(req).await {
            Ok(order) => {
                info!(
                    %symbol,
                    ?side,
                    %amount,
                    %price,
                    id = %order.id,
                    "placed limit order"
                );
                Some(order)
            }
            Err(err) => {
                error!(%symbol, ?side, %amount, %price, error = %err, "limit order failed");
                None
            }
        }
    }

    pub async fn place_market(
        &self,
        symbol: &str,
        side: Side,
        amount: Decimal,
        reduce_only: bool,
        client_order_id: &str,
    ) -> Option<OrderResponse> {
        let req = OrderRequest {
            symbol: symbol.to_string(),
            order_type: OrderType::Market,
            side,
            amount,
            price: None,
            reduce_only,
            client_order_id: Some(client_order_id.to_string()),
        };
        match self.api.create_order(req).await {
            Ok(order) => {
                info!(
                    %symbol,
                    ?side,
                    %amount,
                    average = %order.average,
                    id = %order.id,
                    "placed market order"
                );
                Some(order)
            }
            Err(err) => {
                error!(%symbol, ?side, %amount, error = %err, "market order failed");
                None
            }
        }
    }

    pub async fn cancel(&self, order_id: &str, symbol: &str) -> Option<OrderResponse> {
        match self
            .api
            .cancel_order(order_id.to_string(), symbol.to_string())
            .await
        {
            Ok(order) => {
                info!(%symbol, id = %order_id, remaining = %order.remaining, "canceled order");
                Some(order)
            }
            Err(err) => {
                error!(%symbol, id = %order_id, error = %err, "cancel failed");
                None
            }
        }
    }

    pub fn amount_to_precision(
        &self,
        symbol: &str,
        amount: Decimal,
        rounding: Rounding,
    ) -> Result<Decimal> {
        self.api
            .amount_to_precision(symbol, amount, rounding)
            .map_err(|err| anyhow!("amount precision for {symbol}: {err}"))
    }

    pub fn price_to_precision(
        &self,
        symbol: &str,
        price: Decimal,
        rounding: Rounding,
    ) -> Result<Decimal> {
        self.api
            .price_to_precision(symbol, price, rounding)
            .map_err(|err| anyhow!("price precision for {symbol}: {err}"))
    }
}

impl std::fmt::Debug for OrderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderRouter").finish_non_exhaustive()
    }
}

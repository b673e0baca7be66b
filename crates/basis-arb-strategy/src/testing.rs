/*
[INPUT]:  Test scenarios needing an exchange without a network
[OUTPUT]: Scripted ExchangeApi mock shared across unit tests
[POS]:    Test support (compiled for tests only)
[UPDATE]: When the ExchangeApi seam changes
*/

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rust_decimal::Decimal;

use basis_arb_adapter::{
    BinanceError, Market, OrderRequest, OrderResponse, OrderStatus, OrderType, Rounding,
};

use crate::order_router::ExchangeApi;

/// Scripted in-memory exchange. Limit orders rest as `New`, market orders
/// fill instantly at the configured average.
pub(crate) struct MockExchange {
    pub orders: Mutex<Vec<OrderRequest>>,
    pub cancels: Mutex<Vec<(String, String)>>,
    next_order_id: AtomicU64,
    pub price_decimals: u32,
    pub amount_decimals: u32,
    pub fail_orders: AtomicBool,
    pub market_average: Mutex<Decimal>,
    pub cancel_remaining: Mutex<Decimal>,
}

impl MockExchange {
    pub fn new(price_decimals: u32, amount_decimals: u32) -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
            cancels: Mutex::new(Vec::new()),
            next_order_id: AtomicU64::new(1),
            price_decimals,
            amount_decimals,
            fail_orders: AtomicBool::new(false),
            market_average: Mutex::new(Decimal::from(100)),
            cancel_remaining: Mutex::new(Decimal::ZERO),
        }
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.lock().unwrap().len()
    }

    pub fn last_order(&self) -> Option<OrderRequest> {
        self.orders.lock().unwrap().last().cloned()
    }

    fn market(&self, symbol: &str) -> Market {
        Market {
            symbol: symbol.to_string(),
            price_decimals: self.price_decimals,
            amount_decimals: self.amount_decimals,
        }
    }
}

impl ExchangeApi for MockExchange {
    fn create_order(
        &self,
        req: OrderRequest,
    ) -> Pin<Box<dyn Future<Output = basis_arb_adapter::Result<OrderResponse>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_orders.load(Ordering::SeqCst) {
                return Err(BinanceError::WebSocket("scripted failure".to_string()));
            }
            let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
            let response = match req.order_type {
                OrderType::Limit => OrderResponse {
                    id: id.to_string(),
                    symbol: req.symbol.clone(),
                    status: OrderStatus::New,
                    side: req.side,
                    amount: req.amount,
                    filled: Decimal::ZERO,
                    last_filled: Decimal::ZERO,
                    remaining: req.amount,
                    client_order_id: req.client_order_id.clone().unwrap_or_default(),
                    average: Decimal::ZERO,
                    price: req.price.unwrap_or_default(),
                },
                OrderType::Market => {
                    let average = *self.market_average.lock().unwrap();
                    OrderResponse {
                        id: id.to_string(),
                        symbol: req.symbol.clone(),
                        status: OrderStatus::Filled,
                        side: req.side,
                        amount: req.amount,
                        filled: req.amount,
                        last_filled: req.amount,
                        remaining: Decimal::ZERO,
                        client_order_id: req.client_order_id.clone().unwrap_or_default(),
                        average,
                        price: Decimal::ZERO,
                    }
                }
            };
            self.orders.lock().unwrap().push(req);
            Ok(response)
        })
    }

    fn cancel_order(
        &self,
        order_id: String,
        symbol: String,
    ) -> Pin<Box<dyn Future<Output = basis_arb_adapter::Result<OrderResponse>> + Send + '_>> {
        Box::pin(async move {
            let remaining = *self.cancel_remaining.lock().unwrap();
            self.cancels
                .lock()
                .unwrap()
                .push((order_id.clone(), symbol.clone()));
            Ok(OrderResponse {
                id: order_id,
                symbol,
                status: OrderStatus::Canceled,
                side: basis_arb_adapter::Side::Sell,
                amount: Decimal::ZERO,
                filled: Decimal::ZERO,
                last_filled: Decimal::ZERO,
                remaining,
                client_order_id: String::new(),
                average: Decimal::ZERO,
                price: Decimal::ZERO,
            })
        })
    }

    fn amount_to_precision(
        &self,
        symbol: &str,
        amount: Decimal,
        rounding: Rounding,
    ) -> basis_arb_adapter::Result<Decimal> {
        Ok(self.market(symbol).amount_to_precision(amount, rounding))
    }

    fn price_to_precision(
        &self,
        symbol: &str,
        price: Decimal,
        rounding: Rounding,
    ) -> basis_arb_adapter::Result<Decimal> {
        Ok(self.market(symbol).price_to_precision(price, rounding))
    }
}

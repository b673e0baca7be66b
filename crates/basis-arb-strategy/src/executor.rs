/*
[INPUT]:  Execute requests from the signal engine, live quotes, order events
[OUTPUT]: A pegged limit order on the linear leg, re-priced as spot moves
[POS]:    Execution layer - peg loop
[UPDATE]: When changing pegging, deadline, or termination semantics
*/

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use rust_decimal::Decimal;
use tokio::sync::{RwLock, broadcast};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use basis_arb_adapter::{OrderResponse, OrderStatus, Rounding, Side, spot_to_linear};

use crate::order_router::OrderRouter;
use crate::quote_store::QuoteStore;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub poll_interval: Duration,
    pub deadline: Duration,
    /// The single client order id minted for this process run.
    pub client_order_id: String,
}

/// One pegged execution: open (sell the linear leg) or close (buy it back
/// reduce-only). Exactly one of `amount`/`notional` drives sizing.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    /// Spot-form symbol.
    pub symbol: String,
    pub amount: Option<Decimal>,
    pub notional: Option<Decimal>,
    pub close: bool,
    pub ratio: Decimal,
}

#[derive(Debug)]
struct LiveOrder {
    id: String,
    price: Decimal,
}

/// Price-pegged limit order loop.
///
/// Places a limit order on the linear leg priced off the reference spot
/// quote and cancels/re-places whenever the quantized target moves, under
/// a hard deadline. Fills are never polled: they arrive through the
/// user-data stream as order events and terminate the run.
pub struct PeggedExecutor {
    config: ExecutorConfig,
    store: Arc<RwLock<QuoteStore>>,
    router: Arc<OrderRouter>,
    order_events: broadcast::Sender<OrderResponse>,
    shutdown: CancellationToken,
}

impl PeggedExecutor {
    pub fn new(
        config: ExecutorConfig,
        store: Arc<RwLock<QuoteStore>>,
        router: Arc<OrderRouter>,
        order_events: broadcast::Sender<OrderResponse>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            store,
            router,
            order_events,
            shutdown,
        }
    }

    /// The order-event feed. Every canonical order event must be forwarded
    /// here so running executions observe their fills.
    pub fn order_event_sender(&self) -> broadcast::Sender<OrderResponse> {
        self.order_events.clone()
    }

    /// Run one pegged execution to completion.
    ///
    /// Returns `true` when the linear order fully filled, `false` on
    /// deadline expiry, outer cancellation, or unrecoverable order
    /// placement/cancel failure. Missing sizing is a hard error.
    pub async fn execute(&self, req: ExecuteRequest) -> Result<bool> {
        let spot_symbol = req.symbol.clone();
        let linear_symbol = spot_to_linear(&spot_symbol);

        let Some((spot0, linear0)) = self.store.read().await.pair(&spot_symbol) else {
            bail!("no quotes for {spot_symbol} pair");
        };

        let amount = match (req.amount, req.notional) {
            (Some(amount), _) => amount,
            (None, Some(notional)) => {
                let reference = if req.close { linear0.bid } else { linear0.ask };
                if reference.is_zero() {
                    bail!("zero linear quote for {linear_symbol}");
                }
                notional / reference
            }
            (None, None) => bail!("either amount or notional must be provided"),
        };
        let amount = self
            .router
            .amount_to_precision(&linear_symbol, amount, Rounding::Floor)?;
        if amount <= Decimal::ZERO {
            bail!("amount for {linear_symbol} quantized to zero");
        }

        // Subscribe before placing so no fill event can slip past.
        let mut events = self.order_events.subscribe();

        let (side, reduce_only) = if req.close {
            (Side::Buy, true)
        } else {
            (Side::Sell, false)
        };
        let mut reference = if req.close { spot0.bid } else { spot0.ask };
        let mut live: Option<LiveOrder> = None;
        let mut remain = Decimal::ZERO;
        let started = tokio::time::Instant::now();

        info!(
            symbol = %spot_symbol,
            close = req.close,
            ratio = %req.ratio,
            %amount,
            "peg run starting"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(symbol = %spot_symbol, "peg run cancelled; best-effort cancel");
                    self.cancel_live(&mut live, &linear_symbol).await;
                    return Ok(false);
                }
                event = events.recv() => match event {
                    Ok(order) => {
                        match self.on_order_event(&order, &linear_symbol, &mut live, &mut remain) {
                            EventOutcome::Filled => return Ok(true),
                            EventOutcome::Continue => {}
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(symbol = %spot_symbol, skipped, "order event feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {}
                },
                _ = ticker.tick() => {
                    if started.elapsed() > self.config.deadline {
                        info!(symbol = %spot_symbol, deadline = ?self.config.deadline, "peg run timed out");
                        self.cancel_live(&mut live, &linear_symbol).await;
                        return Ok(false);
                    }

                    let Some((spot, linear)) = self.store.read().await.pair(&spot_symbol) else {
                        continue;
                    };
                    debug!(
                        symbol = %spot_symbol,
                        spot_bid = %spot.bid,
                        spot_ask = %spot.ask,
                        linear_bid = %linear.bid,
                        linear_ask = %linear.ask,
                        "peg tick"
                    );

                    match &live {
                        None => {
                            let place_amount = if remain > Decimal::ZERO { remain } else { amount };
                            let quote = if req.close { spot.bid } else { spot.ask };
                            let price = self.target_price(&linear_symbol, req.ratio, quote, req.close)?;
                            let Some(order) = self
                                .router
                                .place_limit(
                                    &linear_symbol,
                                    side,
                                    place_amount,
                                    price,
                                    reduce_only,
                                    &self.config.client_order_id,
                                )
                                .await
                            else {
                                return Ok(false);
                            };
                            live = Some(LiveOrder { id: order.id, price });
                        }
                        Some(order) => {
                            let quote = if req.close { spot.bid } else { spot.ask };
                            if quote == reference {
                                continue;
                            }
                            let target = self.target_price(&linear_symbol, req.ratio, quote, req.close)?;
                            if target == order.price {
                                debug!(symbol = %spot_symbol, price = %target, "pegged price unchanged");
                                continue;
                            }
                            let Some(canceled) = self.router.cancel(&order.id, &linear_symbol).await
                            else {
                                return Ok(false);
                            };
                            remain = canceled.remaining;
                            reference = quote;
                            live = None;
                        }
                    }
                }
            }
        }
    }

    fn target_price(
        &self,
        linear_symbol: &str,
        ratio: Decimal,
        quote: Decimal,
        close: bool,
    ) -> Result<Decimal> {
        let raw = (ratio + Decimal::ONE) * quote;
        let rounding = if close { Rounding::Floor } else { Rounding::Ceil };
        self.router.price_to_precision(linear_symbol, raw, rounding)
    }

    fn on_order_event(
        &self,
        order: &OrderResponse,
        linear_symbol: &str,
        live: &mut Option<LiveOrder>,
        remain: &mut Decimal,
    ) -> EventOutcome {
        if order.client_order_id != self.config.client_order_id || order.symbol != linear_symbol {
            return EventOutcome::Continue;
        }
        let Some(current) = live.as_ref() else {
            return EventOutcome::Continue;
        };
        if current.id != order.id {
            return EventOutcome::Continue;
        }

        match order.status {
            OrderStatus::Filled => {
                info!(symbol = %order.symbol, id = %order.id, "pegged order fully filled");
                EventOutcome::Filled
            }
            OrderStatus::Canceled | OrderStatus::Expired => {
                // Not one of ours: our own cancels clear `live` before the
                // venue echoes the event. Adopt the remainder and re-place.
                info!(
                    symbol = %order.symbol,
                    id = %order.id,
                    remaining = %order.remaining,
                    "pegged order canceled externally; re-placing"
                );
                *remain = order.remaining;
                *live = None;
                EventOutcome::Continue
            }
            OrderStatus::PartiallyFilled => {
                debug!(
                    symbol = %order.symbol,
                    id = %order.id,
                    filled = %order.filled,
                    "pegged order partially filled"
                );
                EventOutcome::Continue
            }
            OrderStatus::New => EventOutcome::Continue,
        }
    }

    async fn cancel_live(&self, live: &mut Option<LiveOrder>, linear_symbol: &str) {
        if let Some(order) = live.take() {
            let _ = self.router.cancel(&order.id, linear_symbol).await;
        }
    }
}

impl std::fmt::Debug for PeggedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeggedExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

enum EventOutcome {
    Filled,
    Continue,
}

/*
[INPUT]:  Canonical order, position, and account events
[OUTPUT]: Incremental spot hedges, realized basis, durable positions/balances
[POS]:    Strategy layer - fill reaction
[UPDATE]: When changing hedge sizing or the realized-basis definition
*/

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use basis_arb_adapter::{OrderResponse, Side, is_linear, linear_to_spot};

use crate::context::PersistentContext;
use crate::events::AccountEvent;
use crate::order_router::OrderRouter;

/// Hedges fills of the pegged linear order with spot market orders.
///
/// Keyed by linear order id, `order_ids` remembers the cumulative filled
/// quantity already hedged, so each partial fill hedges only its
/// increment. Events for unknown ids are late replays from the stream and
/// are dropped.
pub struct FillReactor {
    router: Arc<OrderRouter>,
    context: Arc<PersistentContext>,
    client_order_id: String,
    order_ids: Mutex<HashMap<String, Decimal>>,
}

impl FillReactor {
    pub fn new(
        router: Arc<OrderRouter>,
        context: Arc<PersistentContext>,
        client_order_id: String,
    ) -> Self {
        Self {
            router,
            context,
            client_order_id,
            order_ids: Mutex::new(HashMap::new()),
        }
    }

    fn is_ours(&self, order: &OrderResponse) -> bool {
        order.client_order_id == self.client_order_id && is_linear(&order.symbol)
    }

    pub async fn on_new_order(&self, order: OrderResponse) {
        if !self.is_ours(&order) {
            return;
        }
        self.order_ids
            .lock()
            .await
            .insert(order.id.clone(), order.filled);
        debug!(id = %order.id, symbol = %order.symbol, "tracking pegged order");
    }

    pub async fn on_partially_filled(&self, order: OrderResponse) {
        if !self.is_ours(&order) {
            return;
        }
        self.hedge(&order, false).await;
    }

    pub async fn on_filled(&self, order: OrderResponse) {
        if !self.is_ours(&order) {
            return;
        }
        self.hedge(&order, true).await;
    }

    pub async fn on_canceled(&self, order: OrderResponse) {
        if !self.is_ours(&order) {
            return;
        }
        self.order_ids.lock().await.remove(&order.id);
    }

    async fn hedge(&self, order: &OrderResponse, terminal: bool) {
        let mut order_ids = self.order_ids.lock().await;
        let Some(cursor) = order_ids.get(&order.id).copied() else {
            info!(id = %order.id, symbol = %order.symbol, "socket delay: fill for unknown order");
            return;
        };

        let delta = order.filled - cursor;
        if delta > Decimal::ZERO {
            let spot_symbol = linear_to_spot(&order.symbol);
            let side = order.side.opposite();
            match self
                .router
                .place_market(&spot_symbol, side, delta, false, &self.client_order_id)
                .await
            {
                Some(spot_fill) => {
                    if !spot_fill.average.is_zero() {
                        let realized = order.average / spot_fill.average - Decimal::ONE;
                        self.context.set_openpx(&spot_symbol, realized).await;
                        info!(
                            symbol = %spot_symbol,
                            %delta,
                            linear_average = %order.average,
                            spot_average = %spot_fill.average,
                            %realized,
                            "hedged linear fill"
                        );
                    }
                    order_ids.insert(order.id.clone(), order.filled - delta + spot_fill.filled);
                }
                None => {
                    // Advance past the delta anyway so the next event cannot
                    // hedge the same quantity twice.
                    error!(
                        symbol = %spot_symbol,
                        %delta,
                        id = %order.id,
                        "spot hedge failed; position is unhedged"
                    );
                    order_ids.insert(order.id.clone(), order.filled);
                }
            }
        }

        if terminal {
            order_ids.remove(&order.id);
        }
    }

    #[cfg(test)]
    async fn cursor(&self, order_id: &str) -> Option<Decimal> {
        self.order_ids.lock().await.get(order_id).copied()
    }
}

impl std::fmt::Debug for FillReactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FillReactor").finish_non_exhaustive()
    }
}

/// Applies signed fill quantities to the durable position map.
#[derive(Debug)]
pub struct PositionUpdater {
    context: Arc<PersistentContext>,
}

impl PositionUpdater {
    pub fn new(context: Arc<PersistentContext>) -> Self {
        Self { context }
    }

    pub async fn on_position_update(&self, order: OrderResponse) {
        let signed = match order.side {
            Side::Buy => order.last_filled,
            Side::Sell => -order.last_filled,
        };
        if signed.is_zero() {
            return;
        }
        self.context
            .apply_fill(&order.symbol, signed, order.price)
            .await;
    }
}

/// Mirrors venue balance pushes into the durable account sheets.
#[derive(Debug)]
pub struct AccountUpdater {
    context: Arc<PersistentContext>,
}

impl AccountUpdater {
    pub fn new(context: Arc<PersistentContext>) -> Self {
        Self { context }
    }

    pub async fn on_account_update(&self, event: AccountEvent) {
        for balance in event.balances {
            self.context
                .set_balance(event.kind, &balance.asset, balance.value)
                .await;
        }
    }
}

/*
[INPUT]:  User-data frames from the spot and linear WebSocket streams
[OUTPUT]: Canonical order/position/account events on the bus
[POS]:    Data layer - private stream routing
[UPDATE]: When the venue adds events or field mappings change
*/

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use basis_arb_adapter::{
    BinanceClient, MarketKind, OrderResponse, OrderStatus, Side, UserDataFrame, UserDataSocket,
    from_exchange,
    ws::message::{LinearOrderData, SpotOrderUpdate},
};

use crate::context::AccountKind;
use crate::events::{AccountEvent, AssetBalance, Event, EventBus};
use crate::quote_feed::backoff_duration;

/// The venue expires listen keys after 60 minutes idle; refresh at 20.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20 * 60);

/// Routes one venue's user-data stream into canonical bus events.
///
/// Each instrument class runs its own worker: listen key → socket →
/// keepalive every twenty minutes. A failed keepalive rotates the key,
/// which requires reconnecting the socket with the new one, so the worker
/// simply tears the session down and starts over.
pub struct UserDataRouter {
    client: Arc<BinanceClient>,
    bus: Arc<EventBus>,
}

impl UserDataRouter {
    pub fn new(client: Arc<BinanceClient>, bus: Arc<EventBus>) -> Self {
        Self { client, bus }
    }

    pub async fn run(self: Arc<Self>, kind: MarketKind, shutdown: CancellationToken) {
        let mut retry: u32 = 0;
        loop {
            if shutdown.is_cancelled() {
                return;
            }

            match self.session(kind, &shutdown).await {
                SessionEnd::Shutdown => return,
                SessionEnd::Reconnect(reason) => {
                    retry = retry.saturating_add(1);
                    let backoff = backoff_duration(retry);
                    warn!(?kind, retry, ?backoff, %reason, "user-data session ended; reconnecting");
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                SessionEnd::Rotated => {
                    // Fresh key on the next iteration, no backoff needed.
                    retry = 0;
                }
            }
        }
    }

    async fn session(&self, kind: MarketKind, shutdown: &CancellationToken) -> SessionEnd {
        let listen_key = match self.client.create_listen_key(kind).await {
            Ok(key) => key,
            Err(err) => return SessionEnd::Reconnect(format!("listen key: {err}")),
        };
        let mut socket =
            match UserDataSocket::connect(kind, self.client.is_sandbox(), &listen_key).await {
                Ok(socket) => socket,
                Err(err) => return SessionEnd::Reconnect(format!("connect: {err}")),
            };
        info!(?kind, "user-data stream running");

        let mut keepalive =
            tokio::time::interval_at(tokio::time::Instant::now() + KEEPALIVE_INTERVAL, KEEPALIVE_INTERVAL);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return SessionEnd::Shutdown,
                _ = keepalive.tick() => {
                    if let Err(err) = self.client.keepalive_listen_key(kind, &listen_key).await {
                        warn!(?kind, error = %err, "listen-key keepalive failed; rotating key");
                        return SessionEnd::Rotated;
                    }
                }
                frame = socket.next_frame() => match frame {
                    Ok(Some(frame)) => self.route_frame(frame).await,
                    Ok(None) => return SessionEnd::Reconnect("stream closed".to_string()),
                    Err(err) => return SessionEnd::Reconnect(err.to_string()),
                },
            }
        }
    }

    pub(crate) async fn route_frame(&self, frame: UserDataFrame) {
        match frame {
            UserDataFrame::SpotOrderUpdate(update) => {
                if let Some(order) = map_spot_order(update) {
                    self.emit_order_events(order).await;
                }
            }
            UserDataFrame::LinearOrderUpdate(update) => {
                if let Some(order) = map_linear_order(update.order) {
                    self.emit_order_events(order).await;
                }
            }
            UserDataFrame::SpotAccountUpdate(update) => {
                self.bus
                    .emit(Event::AccountUpdate(AccountEvent {
                        kind: AccountKind::Spot,
                        balances: update
                            .balances
                            .into_iter()
                            .map(|balance| AssetBalance {
                                asset: balance.asset,
                                value: balance.free,
                            })
                            .collect(),
                    }))
                    .await;
            }
            UserDataFrame::LinearAccountUpdate(update) => {
                self.bus
                    .emit(Event::AccountUpdate(AccountEvent {
                        kind: AccountKind::Futures,
                        balances: update
                            .data
                            .balances
                            .into_iter()
                            .map(|balance| AssetBalance {
                                asset: balance.asset,
                                value: balance.wallet_balance,
                            })
                            .collect(),
                    }))
                    .await;
            }
            UserDataFrame::Other => {}
        }
    }

    async fn emit_order_events(&self, order: OrderResponse) {
        let fill = matches!(
            order.status,
            OrderStatus::PartiallyFilled | OrderStatus::Filled
        );

        let event = match order.status {
            OrderStatus::New => Event::NewOrder(order.clone()),
            OrderStatus::PartiallyFilled => Event::PartiallyFilledOrder(order.clone()),
            OrderStatus::Filled => Event::FilledOrder(order.clone()),
            // Expired is terminal without a fill; downstream cleanup is the
            // same as for a cancel.
            OrderStatus::Canceled | OrderStatus::Expired => Event::CanceledOrder(order.clone()),
        };
        self.bus.emit(event).await;

        if fill {
            self.bus.emit(Event::PositionUpdate(order)).await;
        }
    }
}

impl std::fmt::Debug for UserDataRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDataRouter").finish_non_exhaustive()
    }
}

enum SessionEnd {
    Shutdown,
    Reconnect(String),
    Rotated,
}

fn map_spot_order(update: SpotOrderUpdate) -> Option<OrderResponse> {
    let status = parse_status(&update.status)?;
    let side = parse_side(&update.side)?;
    Some(OrderResponse {
        id: update.order_id.to_string(),
        symbol: from_exchange(&update.symbol, MarketKind::Spot),
        status,
        side,
        amount: update.amount,
        filled: update.filled,
        last_filled: update.last_filled,
        remaining: update.amount - update.filled,
        client_order_id: update.client_order_id,
        // The spot stream carries no average price field.
        average: update.price,
        price: update.price,
    })
}

fn map_linear_order(order: LinearOrderData) -> Option<OrderResponse> {
    let status = parse_status(&order.status)?;
    let side = parse_side(&order.side)?;
    Some(OrderResponse {
        id: order.order_id.to_string(),
        symbol: from_exchange(&order.symbol, MarketKind::Linear),
        status,
        side,
        amount: order.amount,
        filled: order.filled,
        last_filled: order.last_filled,
        remaining: order.amount - order.filled,
        client_order_id: order.client_order_id,
        average: order.average,
        price: order.price,
    })
}

fn parse_status(raw: &str) -> Option<OrderStatus> {
    let status = OrderStatus::from_venue(raw);
    if status.is_none() {
        warn!(status = raw, "dropping order update with unknown status");
    }
    status
}

fn parse_side(raw: &str) -> Option<Side> {
    let side = Side::from_venue(raw);
    if side.is_none() {
        warn!(side = raw, "dropping order update with unknown side");
    }
    side
}

/*
[INPUT]:  Typed events from the quote pipeline and user-data routers
[OUTPUT]: Sequential dispatch to registered async listeners
[POS]:    Core layer - in-process event bus
[UPDATE]: When adding event variants or changing dispatch guarantees
*/

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use tracing::warn;

use basis_arb_adapter::OrderResponse;

use crate::context::AccountKind;

/// One variant per event; payloads are strongly typed so listeners never
/// re-parse what the producer already knew.
#[derive(Debug, Clone)]
pub enum Event {
    RatioChanged {
        symbol: String,
        open_ratio: Decimal,
        close_ratio: Decimal,
    },
    NewOrder(OrderResponse),
    PartiallyFilledOrder(OrderResponse),
    FilledOrder(OrderResponse),
    CanceledOrder(OrderResponse),
    PositionUpdate(OrderResponse),
    AccountUpdate(AccountEvent),
}

#[derive(Debug, Clone)]
pub struct AccountEvent {
    pub kind: AccountKind,
    pub balances: Vec<AssetBalance>,
}

#[derive(Debug, Clone)]
pub struct AssetBalance {
    pub asset: String,
    pub value: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RatioChanged,
    NewOrder,
    PartiallyFilledOrder,
    FilledOrder,
    CanceledOrder,
    PositionUpdate,
    AccountUpdate,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::RatioChanged { .. } => EventKind::RatioChanged,
            Event::NewOrder(_) => EventKind::NewOrder,
            Event::PartiallyFilledOrder(_) => EventKind::PartiallyFilledOrder,
            Event::FilledOrder(_) => EventKind::FilledOrder,
            Event::CanceledOrder(_) => EventKind::CanceledOrder,
            Event::PositionUpdate(_) => EventKind::PositionUpdate,
            Event::AccountUpdate(_) => EventKind::AccountUpdate,
        }
    }
}

pub type ListenerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type Listener = Arc<dyn Fn(Event) -> ListenerFuture + Send + Sync>;

/// Process-wide listener registry.
///
/// `emit` dispatches to listeners sequentially in registration order and
/// awaits each before calling the next. Listener errors are logged and do
/// not abort the dispatch. The registry lock is released before any
/// listener runs, so listeners may emit further events.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<EventKind, Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(Event) -> ListenerFuture + Send + Sync + 'static,
    {
        let mut guard = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.entry(kind).or_default().push(Arc::new(listener));
    }

    pub async fn emit(&self, event: Event) {
        let listeners = {
            let guard = self
                .listeners
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.get(&event.kind()).cloned().unwrap_or_default()
        };

        for listener in listeners {
            if let Err(err) = listener(event.clone()).await {
                warn!(kind = ?event.kind(), error = %err, "event listener failed");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn ratio_event(symbol: &str) -> Event {
        Event::RatioChanged {
            symbol: symbol.to_string(),
            open_ratio: Decimal::ZERO,
            close_ratio: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn dispatches_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.subscribe(EventKind::RatioChanged, move |_event| {
                let seen = seen.clone();
                Box::pin(async move {
                    seen.lock().unwrap().push(tag);
                    Ok(())
                })
            });
        }

        bus.emit(ratio_event("BTC/USDT")).await;
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn listener_error_does_not_abort_dispatch() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(EventKind::RatioChanged, |_event| {
            Box::pin(async { Err(anyhow::anyhow!("boom")) })
        });
        {
            let seen = seen.clone();
            bus.subscribe(EventKind::RatioChanged, move |_event| {
                let seen = seen.clone();
                Box::pin(async move {
                    seen.lock().unwrap().push("survivor");
                    Ok(())
                })
            });
        }

        bus.emit(ratio_event("BTC/USDT")).await;
        assert_eq!(*seen.lock().unwrap(), vec!["survivor"]);
    }

    #[tokio::test]
    async fn listeners_only_receive_their_kind() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0usize));

        {
            let count = count.clone();
            bus.subscribe(EventKind::AccountUpdate, move |_event| {
                let count = count.clone();
                Box::pin(async move {
                    *count.lock().unwrap() += 1;
                    Ok(())
                })
            });
        }

        bus.emit(ratio_event("BTC/USDT")).await;
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn reentrant_emit_is_allowed() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(Mutex::new(0usize));

        {
            let bus_inner = bus.clone();
            let count = count.clone();
            bus.subscribe(EventKind::RatioChanged, move |event| {
                let bus_inner = bus_inner.clone();
                let count = count.clone();
                Box::pin(async move {
                    *count.lock().unwrap() += 1;
                    if let Event::RatioChanged { symbol, .. } = &event
                        && symbol == "BTC/USDT"
                    {
                        bus_inner
                            .emit(Event::RatioChanged {
                                symbol: "ETH/USDT".to_string(),
                                open_ratio: Decimal::ZERO,
                                close_ratio: Decimal::ZERO,
                            })
                            .await;
                    }
                    Ok(())
                })
            });
        }

        bus.emit(ratio_event("BTC/USDT")).await;
        assert_eq!(*count.lock().unwrap(), 2);
    }
}

//! End-to-end pipeline: quotes → ratio event → signal → pegged order →
//! user-data fills → spot hedge → positions and realized basis.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use rust_decimal::Decimal;
use std::str::FromStr;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;

use basis_arb_adapter::{
    Market, OrderRequest, OrderResponse, OrderStatus, OrderType, Rounding, Side,
};
use basis_arb_strategy::context::PersistentContext;
use basis_arb_strategy::events::{Event, EventBus, EventKind};
use basis_arb_strategy::executor::{ExecutorConfig, PeggedExecutor};
use basis_arb_strategy::fills::{FillReactor, PositionUpdater};
use basis_arb_strategy::order_router::{ExchangeApi, OrderRouter};
use basis_arb_strategy::quote_store::{Quote, QuoteStore};
use basis_arb_strategy::signal::{SignalEngine, SignalParams};

fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).expect("valid decimal")
}

#[derive(Default)]
struct RecordingExchange {
    orders: StdMutex<Vec<OrderRequest>>,
    next_id: AtomicU64,
}

impl RecordingExchange {
    fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }
}

impl ExchangeApi for RecordingExchange {
    fn create_order(
        &self,
        req: OrderRequest,
    ) -> Pin<Box<dyn Future<Output = basis_arb_adapter::Result<OrderResponse>> + Send + '_>> {
        Box::pin(async move {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let filled_market = req.order_type == OrderType::Market;
            let response = OrderResponse {
                id: id.to_string(),
                symbol: req.symbol.clone(),
                status: if filled_market {
                    OrderStatus::Filled
                } else {
                    OrderStatus::New
                },
                side: req.side,
                amount: req.amount,
                filled: if filled_market { req.amount } else { Decimal::ZERO },
                last_filled: if filled_market { req.amount } else { Decimal::ZERO },
                remaining: if filled_market { Decimal::ZERO } else { req.amount },
                client_order_id: req.client_order_id.clone().unwrap_or_default(),
                average: if filled_market { dec("50000") } else { Decimal::ZERO },
                price: req.price.unwrap_or_default(),
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
            Ok(OrderResponse {
                id: order_id,
                symbol,
                status: OrderStatus::Canceled,
                side: Side::Sell,
                amount: Decimal::ZERO,
                filled: Decimal::ZERO,
                last_filled: Decimal::ZERO,
                remaining: Decimal::ZERO,
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
        Ok(market(symbol).amount_to_precision(amount, rounding))
    }

    fn price_to_precision(
        &self,
        symbol: &str,
        price: Decimal,
        rounding: Rounding,
    ) -> basis_arb_adapter::Result<Decimal> {
        Ok(market(symbol).price_to_precision(price, rounding))
    }
}

fn market(symbol: &str) -> Market {
    Market {
        symbol: symbol.to_string(),
        price_decimals: 1,
        amount_decimals: 4,
    }
}

struct Pipeline {
    bus: Arc<EventBus>,
    store: Arc<RwLock<QuoteStore>>,
    context: Arc<PersistentContext>,
    exchange: Arc<RecordingExchange>,
    shutdown: CancellationToken,
}

async fn pipeline(tag: &str) -> Pipeline {
    let dir = std::env::temp_dir().join(format!("basis-arb-pipeline-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let context = Arc::new(PersistentContext::load(&dir).await.unwrap());

    let exchange = Arc::new(RecordingExchange::default());
    let router = Arc::new(OrderRouter::new(exchange.clone()));
    let store = Arc::new(RwLock::new(QuoteStore::new(50)));
    let bus = Arc::new(EventBus::new());
    let shutdown = CancellationToken::new();

    let (order_events, _) = broadcast::channel(64);
    let executor = Arc::new(PeggedExecutor::new(
        ExecutorConfig {
            poll_interval: Duration::from_millis(5),
            deadline: Duration::from_secs(600),
            client_order_id: "ba-pipeline-id".to_string(),
        },
        store.clone(),
        router.clone(),
        order_events,
        shutdown.clone(),
    ));
    let signal = Arc::new(SignalEngine::new(
        SignalParams {
            spread: dec("0.00065"),
            diverge_factor: 2,
            notional: dec("20"),
        },
        context.clone(),
        executor.clone(),
    ));
    let fills = Arc::new(FillReactor::new(
        router.clone(),
        context.clone(),
        "ba-pipeline-id".to_string(),
    ));
    let positions = Arc::new(PositionUpdater::new(context.clone()));

    // Same listener layout as the engine wiring: executor feed first, then
    // the fill reactor, then position updates.
    {
        let signal = signal.clone();
        bus.subscribe(EventKind::RatioChanged, move |event| {
            let signal = signal.clone();
            Box::pin(async move {
                if let Event::RatioChanged {
                    symbol,
                    open_ratio,
                    close_ratio,
                } = event
                {
                    signal.on_ratio_changed(symbol, open_ratio, close_ratio).await;
                }
                Ok(())
            })
        });
    }
    for kind in [
        EventKind::NewOrder,
        EventKind::PartiallyFilledOrder,
        EventKind::FilledOrder,
        EventKind::CanceledOrder,
    ] {
        let sender = executor.order_event_sender();
        bus.subscribe(kind, move |event| {
            let sender = sender.clone();
            Box::pin(async move {
                if let Event::NewOrder(order)
                | Event::PartiallyFilledOrder(order)
                | Event::FilledOrder(order)
                | Event::CanceledOrder(order) = event
                {
                    let _ = sender.send(order);
                }
                Ok(())
            })
        });
    }
    {
        let fills = fills.clone();
        bus.subscribe(EventKind::NewOrder, move |event| {
            let fills = fills.clone();
            Box::pin(async move {
                if let Event::NewOrder(order) = event {
                    fills.on_new_order(order).await;
                }
                Ok(())
            })
        });
    }
    {
        let fills = fills.clone();
        bus.subscribe(EventKind::PartiallyFilledOrder, move |event| {
            let fills = fills.clone();
            Box::pin(async move {
                if let Event::PartiallyFilledOrder(order) = event {
                    fills.on_partially_filled(order).await;
                }
                Ok(())
            })
        });
    }
    {
        let fills = fills.clone();
        bus.subscribe(EventKind::FilledOrder, move |event| {
            let fills = fills.clone();
            Box::pin(async move {
                if let Event::FilledOrder(order) = event {
                    fills.on_filled(order).await;
                }
                Ok(())
            })
        });
    }
    {
        let positions = positions.clone();
        bus.subscribe(EventKind::PositionUpdate, move |event| {
            let positions = positions.clone();
            Box::pin(async move {
                if let Event::PositionUpdate(order) = event {
                    positions.on_position_update(order).await;
                }
                Ok(())
            })
        });
    }

    Pipeline {
        bus,
        store,
        context,
        exchange,
        shutdown,
    }
}

/// Push a quote through the store and emit the ratio event like the feed
/// processor does.
async fn push_quote(pipeline: &Pipeline, symbol: &str, bid: &str, ask: &str) {
    let update = {
        let mut store = pipeline.store.write().await;
        store.apply(
            symbol,
            Quote {
                bid: dec(bid),
                ask: dec(ask),
            },
        )
    };
    if let Some(update) = update {
        pipeline
            .bus
            .emit(Event::RatioChanged {
                symbol: update.symbol,
                open_ratio: update.open_ratio,
                close_ratio: update.close_ratio,
            })
            .await;
    }
}

fn linear_event(id: &str, status: OrderStatus, filled: &str, last: &str, average: &str) -> OrderResponse {
    OrderResponse {
        id: id.to_string(),
        symbol: "BTC/USDT:USDT".to_string(),
        status,
        side: Side::Sell,
        amount: dec("0.0003"),
        filled: dec(filled),
        last_filled: dec(last),
        remaining: dec("0.0003") - dec(filled),
        client_order_id: "ba-pipeline-id".to_string(),
        average: dec(average),
        price: dec("50060.1"),
    }
}

#[tokio::test]
async fn open_flow_places_pegs_hedges_and_records_basis() {
    let pipeline = pipeline("open-flow").await;

    // First leg alone computes no ratio.
    push_quote(&pipeline, "BTC/USDT", "50000", "50010").await;
    assert_eq!(pipeline.exchange.orders().len(), 0);

    // Second leg: open ratio = 50060/50010 − 1 ≈ 0.001 > spread → entry.
    push_quote(&pipeline, "BTC/USDT:USDT", "50050", "50060").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let orders = pipeline.exchange.orders();
    assert_eq!(orders.len(), 1);
    let entry = &orders[0];
    assert_eq!(entry.symbol, "BTC/USDT:USDT");
    assert_eq!(entry.side, Side::Sell);
    assert_eq!(entry.order_type, OrderType::Limit);
    // 20 / 50060 floored to 4 decimals.
    assert_eq!(entry.amount, dec("0.0003"));
    assert!(!entry.reduce_only);

    // Further ratio ticks are absorbed by the single-flight guard.
    push_quote(&pipeline, "BTC/USDT:USDT", "50050", "50060").await;
    push_quote(&pipeline, "BTC/USDT:USDT", "50050", "50060").await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(pipeline.exchange.orders().len(), 1);

    // The venue acknowledges, then fills in two increments.
    pipeline
        .bus
        .emit(Event::NewOrder(linear_event("1", OrderStatus::New, "0", "0", "0")))
        .await;
    pipeline
        .bus
        .emit(Event::PartiallyFilledOrder(linear_event(
            "1",
            OrderStatus::PartiallyFilled,
            "0.0001",
            "0.0001",
            "50060.1",
        )))
        .await;
    pipeline
        .bus
        .emit(Event::PositionUpdate(linear_event(
            "1",
            OrderStatus::PartiallyFilled,
            "0.0001",
            "0.0001",
            "50060.1",
        )))
        .await;

    // The partial fill hedged with a spot market buy for the increment.
    let orders = pipeline.exchange.orders();
    assert_eq!(orders.len(), 2);
    let hedge = &orders[1];
    assert_eq!(hedge.symbol, "BTC/USDT");
    assert_eq!(hedge.side, Side::Buy);
    assert_eq!(hedge.order_type, OrderType::Market);
    assert_eq!(hedge.amount, dec("0.0001"));

    // realized = 50060.1 / 50000 − 1 (mock spot fills average 50000).
    let realized = pipeline.context.openpx("BTC/USDT").await.unwrap();
    assert_eq!(realized, dec("50060.1") / dec("50000") - Decimal::ONE);

    // The linear leg's position tracked the sell.
    let linear_position = pipeline.context.position("BTC/USDT:USDT").await.unwrap();
    assert_eq!(linear_position.amount, dec("-0.0001"));

    // Full fill hedges the remainder and terminates the peg run.
    pipeline
        .bus
        .emit(Event::FilledOrder(linear_event(
            "1",
            OrderStatus::Filled,
            "0.0003",
            "0.0002",
            "50060.1",
        )))
        .await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let orders = pipeline.exchange.orders();
    assert_eq!(orders.len(), 3);
    assert_eq!(orders[2].amount, dec("0.0002"));
    // Cumulative spot hedge equals the linear fill.
    assert_eq!(orders[1].amount + orders[2].amount, dec("0.0003"));

    pipeline.shutdown.cancel();
}

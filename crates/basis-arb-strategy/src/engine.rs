/*
[INPUT]:  Parsed configuration and a process-wide shutdown token
[OUTPUT]: The wired trading engine, running until shutdown
[POS]:    Orchestration layer - component wiring and lifecycle
[UPDATE]: When adding components or changing startup/shutdown order
*/

use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use basis_arb_adapter::{BinanceClient, Credentials, MarketKind, client_order_id};

use crate::config::BotConfig;
use crate::context::PersistentContext;
use crate::events::{Event, EventBus, EventKind};
use crate::executor::{ExecutorConfig, PeggedExecutor};
use crate::fills::{AccountUpdater, FillReactor, PositionUpdater};
use crate::order_router::OrderRouter;
use crate::quote_feed::QuoteFeed;
use crate::quote_store::QuoteStore;
use crate::signal::{SignalEngine, SignalParams};
use crate::user_data::UserDataRouter;

const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

static PANIC_HOOK_ONCE: Once = Once::new();

fn ensure_panic_hook_installed() {
    PANIC_HOOK_ONCE.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!("panic in task: {info}");
            previous(info);
        }));
    });
}

/// Wire every component and run until the shutdown token fires.
///
/// Fatal initialization errors (markets, context, credentials) surface to
/// the caller; after startup the engine only logs and recovers.
pub async fn run(config: BotConfig, shutdown: CancellationToken) -> Result<()> {
    ensure_panic_hook_installed();

    let client = Arc::new(
        BinanceClient::new(
            Credentials {
                api_key: config.exchange.api_key.clone(),
                api_secret: config.exchange.api_secret.clone(),
            },
            config.exchange.sandbox,
        )
        .context("build exchange client")?,
    );
    client.load_markets().await.context("load markets")?;

    let context = Arc::new(
        PersistentContext::load(&config.context_dir)
            .await
            .context("load persistent context")?,
    );

    let bus = Arc::new(EventBus::new());
    let store = Arc::new(RwLock::new(QuoteStore::new(config.trading.median_window)));
    let router = Arc::new(OrderRouter::new(client.clone()));

    let order_id = client_order_id(&config.trading.order_id_prefix);
    info!(client_order_id = %order_id, "engine identity minted");

    let (order_events, _) = broadcast::channel(256);
    let executor = Arc::new(PeggedExecutor::new(
        ExecutorConfig {
            poll_interval: Duration::from_millis(config.trading.poll_interval_ms),
            deadline: Duration::from_secs(config.trading.deadline_secs),
            client_order_id: order_id.clone(),
        },
        store.clone(),
        router.clone(),
        order_events,
        shutdown.clone(),
    ));

    let signal = Arc::new(SignalEngine::new(
        SignalParams {
            spread: config.trading.spread,
            diverge_factor: config.trading.diverge_factor,
            notional: config.trading.notional,
        },
        context.clone(),
        executor.clone(),
    ));
    let fills = Arc::new(FillReactor::new(
        router.clone(),
        context.clone(),
        order_id.clone(),
    ));
    let positions = Arc::new(PositionUpdater::new(context.clone()));
    let accounts = Arc::new(AccountUpdater::new(context.clone()));

    register_listeners(&bus, &signal, &executor, &fills, &positions, &accounts);

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    let feed = QuoteFeed::new(config.quote_bus.clone(), store.clone(), bus.clone());
    tasks.push(tokio::spawn(feed.run(shutdown.clone())));

    let user_data = Arc::new(UserDataRouter::new(client.clone(), bus.clone()));
    for kind in [MarketKind::Spot, MarketKind::Linear] {
        let worker = user_data.clone();
        tasks.push(tokio::spawn(worker.run(kind, shutdown.clone())));
    }

    info!("engine running");
    shutdown.cancelled().await;
    info!("shutdown requested; draining tasks");

    for task in tasks {
        match tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "task ended abnormally"),
            Err(_) => warn!("task did not stop within the shutdown timeout"),
        }
    }
    info!("engine stopped");
    Ok(())
}

fn register_listeners(
    bus: &Arc<EventBus>,
    signal: &Arc<SignalEngine>,
    executor: &Arc<PeggedExecutor>,
    fills: &Arc<FillReactor>,
    positions: &Arc<PositionUpdater>,
    accounts: &Arc<AccountUpdater>,
) {
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

    // Running peg loops observe their fills through the executor's feed,
    // so every canonical order event is forwarded first.
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
        let fills = fills.clone();
        bus.subscribe(EventKind::CanceledOrder, move |event| {
            let fills = fills.clone();
            Box::pin(async move {
                if let Event::CanceledOrder(order) = event {
                    fills.on_canceled(order).await;
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
    {
        let accounts = accounts.clone();
        bus.subscribe(EventKind::AccountUpdate, move |event| {
            let accounts = accounts.clone();
            Box::pin(async move {
                if let Event::AccountUpdate(update) = event {
                    accounts.on_account_update(update).await;
                }
                Ok(())
            })
        });
    }
}

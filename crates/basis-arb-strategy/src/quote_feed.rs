/*
[INPUT]:  msgpack book-ticker messages from the NATS quote bus
[OUTPUT]: QuoteStore updates and ratio_changed events on the bus
[POS]:    Data layer - quote ingestion (no trading logic)
[UPDATE]: When changing subjects, payload schema, or backpressure policy
*/

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::QuoteBusConfig;
use crate::events::{Event, EventBus};
use crate::quote_store::{Quote, QuoteStore};

/// Decoded book-ticker payload: `{s: symbol, b: bid, a: ask}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BookTickerUpdate {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "b")]
    pub bid: Decimal,
    #[serde(rename = "a")]
    pub ask: Decimal,
}

/// Quote-bus consumer.
///
/// A reader task decodes frames into a bounded broadcast queue; the
/// processor drains it serially into the QuoteStore and emits ratio
/// events. When the processor lags, the queue drops the oldest entries —
/// stale quotes are worthless.
pub struct QuoteFeed {
    config: QuoteBusConfig,
    store: Arc<RwLock<QuoteStore>>,
    bus: Arc<EventBus>,
}

impl QuoteFeed {
    pub fn new(config: QuoteBusConfig, store: Arc<RwLock<QuoteStore>>, bus: Arc<EventBus>) -> Self {
        Self { config, store, bus }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut retry: u32 = 0;
        loop {
            if shutdown.is_cancelled() {
                return;
            }

            match self.session(&shutdown).await {
                SessionEnd::Shutdown => return,
                SessionEnd::Disconnected(reason) => {
                    retry = retry.saturating_add(1);
                    let backoff = backoff_duration(retry);
                    warn!(retry, ?backoff, %reason, "quote bus disconnected; reconnecting");
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }

    async fn session(&self, shutdown: &CancellationToken) -> SessionEnd {
        let client = match self.connect().await {
            Ok(client) => client,
            Err(err) => return SessionEnd::Disconnected(err),
        };

        let spot_subject = format!("{}.spot.bookTicker.*", self.config.subject_prefix);
        let linear_subject = format!("{}.linear.bookTicker.*", self.config.subject_prefix);
        let spot_sub = match client.subscribe(spot_subject.clone()).await {
            Ok(sub) => sub,
            Err(err) => return SessionEnd::Disconnected(err.to_string()),
        };
        let linear_sub = match client.subscribe(linear_subject.clone()).await {
            Ok(sub) => sub,
            Err(err) => return SessionEnd::Disconnected(err.to_string()),
        };
        info!(%spot_subject, %linear_subject, "quote bus subscribed");

        let (queue_tx, queue_rx) = broadcast::channel(self.config.queue_capacity.max(1));
        let reader_shutdown = shutdown.child_token();
        let reader = tokio::spawn(read_loop(
            futures_util::stream::select(spot_sub, linear_sub),
            queue_tx,
            reader_shutdown.clone(),
        ));

        let end = self.process_queue(queue_rx, shutdown).await;
        reader_shutdown.cancel();
        let _ = reader.await;
        end
    }

    async fn connect(&self) -> Result<async_nats::Client, String> {
        async_nats::ConnectOptions::new()
            .add_client_certificate(self.config.cert_file.clone(), self.config.key_file.clone())
            .require_tls(true)
            .connect(self.config.url.as_str())
            .await
            .map_err(|err| err.to_string())
    }

    async fn process_queue(
        &self,
        mut queue_rx: broadcast::Receiver<BookTickerUpdate>,
        shutdown: &CancellationToken,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return SessionEnd::Shutdown,
                update = queue_rx.recv() => match update {
                    Ok(update) => self.process_update(update).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "quote queue overflow; dropped oldest updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return SessionEnd::Disconnected("quote stream ended".to_string());
                    }
                },
            }
        }
    }

    async fn process_update(&self, update: BookTickerUpdate) {
        let ratio_update = {
            let mut store = self.store.write().await;
            store.apply(
                &update.symbol,
                Quote {
                    ask: update.ask,
                    bid: update.bid,
                },
            )
        };

        if let Some(update) = ratio_update {
            self.bus
                .emit(Event::RatioChanged {
                    symbol: update.symbol,
                    open_ratio: update.open_ratio,
                    close_ratio: update.close_ratio,
                })
                .await;
        }
    }
}

enum SessionEnd {
    Shutdown,
    Disconnected(String),
}

async fn read_loop<S>(
    mut messages: S,
    queue_tx: broadcast::Sender<BookTickerUpdate>,
    shutdown: CancellationToken,
) where
    S: futures_util::Stream<Item = async_nats::Message> + Unpin,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            message = messages.next() => {
                let Some(message) = message else { return };
                match rmp_serde::from_slice::<BookTickerUpdate>(&message.payload) {
                    Ok(update) => {
                        // Send only fails with no receiver, i.e. during teardown.
                        let _ = queue_tx.send(update);
                    }
                    Err(err) => {
                        debug!(subject = %message.subject, error = %err, "dropping undecodable quote frame");
                    }
                }
            }
        }
    }
}

/// Exponential reconnect backoff, clamped to 30s.
pub(crate) fn backoff_duration(retry: u32) -> Duration {
    let exp = retry.saturating_sub(1).min(63);
    let secs = 1u64 << exp;
    Duration::from_secs(secs.min(30))
}

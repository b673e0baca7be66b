/*
[INPUT]:  ratio_changed events, positions and realized-basis context
[OUTPUT]: At most one in-flight pegged execution per symbol
[POS]:    Strategy layer - entry/exit decisions
[UPDATE]: When changing thresholds, sizing, or the divergence policy
*/

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::{Decimal, MathematicalOps};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::context::PersistentContext;
use crate::executor::{ExecuteRequest, PeggedExecutor};

#[derive(Debug, Clone)]
pub struct SignalParams {
    /// Entry threshold on the open ratio; also the base unit of the
    /// divergence-widened close threshold.
    pub spread: Decimal,
    /// Close threshold widens by `factor^level_time`.
    pub diverge_factor: u32,
    /// Quote notional used to size entries.
    pub notional: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Open,
    Close,
}

/// Per-symbol entry/exit engine.
///
/// Ratio events fire on every quote tick, so decisions are guarded by a
/// single-flight task map: while a symbol has a live execution, further
/// events for it are dropped. Distinct symbols proceed independently.
pub struct SignalEngine {
    params: SignalParams,
    context: Arc<PersistentContext>,
    executor: Arc<PeggedExecutor>,
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl SignalEngine {
    pub fn new(
        params: SignalParams,
        context: Arc<PersistentContext>,
        executor: Arc<PeggedExecutor>,
    ) -> Self {
        Self {
            params,
            context,
            executor,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub async fn on_ratio_changed(
        self: &Arc<Self>,
        symbol: String,
        open_ratio: Decimal,
        close_ratio: Decimal,
    ) {
        let Some((decision, amount)) = self.decide(&symbol, open_ratio, close_ratio).await else {
            return;
        };

        let mut pending = self.pending.lock().await;
        if let Some(handle) = pending.get(&symbol)
            && !handle.is_finished()
        {
            debug!(%symbol, ?decision, "execution in flight; dropping signal");
            return;
        }

        let engine = self.clone();
        let ratio = match decision {
            Decision::Open => open_ratio,
            Decision::Close => close_ratio,
        };
        let task_symbol = symbol.clone();
        let handle = tokio::spawn(async move {
            engine
                .run_decision(task_symbol.clone(), decision, amount, ratio)
                .await;
            engine.pending.lock().await.remove(&task_symbol);
        });
        pending.insert(symbol, handle);
    }

    async fn decide(
        &self,
        symbol: &str,
        open_ratio: Decimal,
        close_ratio: Decimal,
    ) -> Option<(Decision, Option<Decimal>)> {
        match self.context.position(symbol).await {
            Some(position) => {
                let openpx = self.context.openpx(symbol).await.unwrap_or(Decimal::ZERO);
                let level = self.context.level_time(symbol).await;
                let threshold = openpx
                    - self.params.spread
                        * Decimal::from(self.params.diverge_factor).powi(i64::from(level));
                (close_ratio < threshold).then_some((Decision::Close, Some(position.amount)))
            }
            None => (open_ratio > self.params.spread).then_some((Decision::Open, None)),
        }
    }

    async fn run_decision(
        &self,
        symbol: String,
        decision: Decision,
        amount: Option<Decimal>,
        ratio: Decimal,
    ) {
        let request = match decision {
            Decision::Close => {
                info!(%symbol, %ratio, "closing basis position");
                ExecuteRequest {
                    symbol: symbol.clone(),
                    amount,
                    notional: None,
                    close: true,
                    ratio,
                }
            }
            Decision::Open => {
                info!(%symbol, %ratio, "opening basis position");
                ExecuteRequest {
                    symbol: symbol.clone(),
                    amount: None,
                    notional: Some(self.params.notional),
                    close: false,
                    ratio,
                }
            }
        };

        match self.executor.execute(request).await {
            Ok(filled) => {
                if decision == Decision::Close {
                    if filled {
                        // Divergence resolved; the counter starts over.
                        self.context.reset_level_time(&symbol).await;
                    } else {
                        // The peg window elapsed without closing: widen the
                        // next close threshold.
                        self.context.bump_level_time(&symbol).await;
                    }
                }
                info!(%symbol, ?decision, filled, "execution finished");
            }
            Err(err) => {
                error!(%symbol, ?decision, error = %err, "execution failed");
            }
        }
    }

    #[cfg(test)]
    async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl std::fmt::Debug for SignalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

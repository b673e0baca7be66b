/*
[INPUT]:  Decoded book-ticker updates for spot and linear instruments
[OUTPUT]: Per-symbol quote map and median-smoothed open/close basis ratios
[POS]:    Data layer - market state (no trading logic)
[UPDATE]: When changing ratio definitions or the smoothing window
*/

use std::collections::{BTreeSet, HashMap, VecDeque};

use rust_decimal::Decimal;

use basis_arb_adapter::{linear_to_spot, spot_to_linear};

pub const DEFAULT_MEDIAN_WINDOW: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub ask: Decimal,
    pub bid: Decimal,
}

/// Ratio pair recomputed after a quote update touched a hedged pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatioUpdate {
    pub symbol: String,
    pub open_ratio: Decimal,
    pub close_ratio: Decimal,
}

/// Median over the *distinct* values among the last `window` pushes.
///
/// A FIFO queue tracks arrival order; the sorted set collapses duplicates.
/// A value leaves the set only when its last queued occurrence expires.
#[derive(Debug)]
pub struct RollingMedian {
    window: usize,
    queue: VecDeque<Decimal>,
    values: BTreeSet<Decimal>,
}

impl RollingMedian {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            queue: VecDeque::with_capacity(window),
            values: BTreeSet::new(),
        }
    }

    pub fn push(&mut self, value: Decimal) -> Decimal {
        if self.queue.len() == self.window
            && let Some(oldest) = self.queue.pop_front()
            && !self.queue.contains(&oldest)
        {
            self.values.remove(&oldest);
        }

        self.queue.push_back(value);
        self.values.insert(value);
        self.median()
    }

    fn median(&self) -> Decimal {
        let sorted: Vec<&Decimal> = self.values.iter().collect();
        let len = sorted.len();
        if len % 2 == 0 {
            (*sorted[len / 2 - 1] + *sorted[len / 2]) / Decimal::TWO
        } else {
            *sorted[len / 2]
        }
    }
}

/// Symbol-keyed quote store with derived basis ratios.
///
/// Entries are created on the first quote, overwritten on every update and
/// never deleted. Ratios exist only once both legs of a pair have quoted.
#[derive(Debug)]
pub struct QuoteStore {
    window: usize,
    quotes: HashMap<String, Quote>,
    open_medians: HashMap<String, RollingMedian>,
    close_medians: HashMap<String, RollingMedian>,
    open_ratios: HashMap<String, Decimal>,
    close_ratios: HashMap<String, Decimal>,
}

impl QuoteStore {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            quotes: HashMap::new(),
            open_medians: HashMap::new(),
            close_medians: HashMap::new(),
            open_ratios: HashMap::new(),
            close_ratios: HashMap::new(),
        }
    }

    /// Store a quote and recompute the pair's ratios when both legs exist.
    ///
    /// The store is written before ratios derive from it, so a returned
    /// update always reflects a consistent snapshot of the two legs.
    pub fn apply(&mut self, symbol: &str, quote: Quote) -> Option<RatioUpdate> {
        self.quotes.insert(symbol.to_string(), quote);

        let spot_symbol = linear_to_spot(symbol);
        let linear_symbol = spot_to_linear(&spot_symbol);
        let spot = self.quotes.get(&spot_symbol)?;
        let linear = self.quotes.get(&linear_symbol)?;
        if spot.ask.is_zero() || spot.bid.is_zero() {
            return None;
        }

        let raw_open = linear.ask / spot.ask - Decimal::ONE;
        let raw_close = linear.bid / spot.bid - Decimal::ONE;

        let window = self.window;
        let open_ratio = self
            .open_medians
            .entry(spot_symbol.clone())
            .or_insert_with(|| RollingMedian::new(window))
            .push(raw_open);
        let close_ratio = self
            .close_medians
            .entry(spot_symbol.clone())
            .or_insert_with(|| RollingMedian::new(window))
            .push(raw_close);

        self.open_ratios.insert(spot_symbol.clone(), open_ratio);
        self.close_ratios.insert(spot_symbol.clone(), close_ratio);

        Some(RatioUpdate {
            symbol: spot_symbol,
            open_ratio,
            close_ratio,
        })
    }

    pub fn quote(&self, symbol: &str) -> Option<Quote> {
        self.quotes.get(symbol).copied()
    }

    /// Both legs of a hedged pair, spot first.
    pub fn pair(&self, spot_symbol: &str) -> Option<(Quote, Quote)> {
        let spot = self.quotes.get(spot_symbol)?;
        let linear = self.quotes.get(&spot_to_linear(spot_symbol))?;
        Some((*spot, *linear))
    }

    pub fn open_ratio(&self, spot_symbol: &str) -> Option<Decimal> {
        self.open_ratios.get(spot_symbol).copied()
    }

    pub fn close_ratio(&self, spot_symbol: &str) -> Option<Decimal> {
        self.close_ratios.get(spot_symbol).copied()
    }
}

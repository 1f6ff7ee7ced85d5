//! Incremental technical indicators and the per-run indicator cache.
//!
//! Every indicator is a recurrence folded over the candle series one index
//! at a time. State is keyed by [`IndicatorKey`]; a repeated call with the
//! same key only folds the candles that arrived since the previous call.
//!
//! - `IncrementalIndicator`: one recurrence (accumulators + step function)
//! - `IndicatorState`: a recurrence, its output lines and the last folded index
//! - `IndicatorCache`: key -> state map owned by one backtest run

pub mod adx;
pub mod atr;
pub mod bands;
pub mod bill_williams;
pub mod ichimoku;
pub mod macd;
pub mod moving_average;
pub mod on_array;
pub mod oscillators;
pub mod power;
pub mod rsi;
pub mod sar;
pub mod stddev;
pub mod stochastic;
pub mod volume;

use std::collections::HashMap;
use std::fmt;

use crate::domain::ohlcv::Candle;

pub use moving_average::MaMethod;

/// A recurrence over candles. `step` is called once per index, in
/// ascending order, and must push one value onto every output line. The
/// newest index may be stepped again after the state is restored from a
/// snapshot taken before it.
pub trait IncrementalIndicator: SnapshotIndicator {
    /// Number of output lines.
    fn outputs(&self) -> usize;

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]);
}

/// Boxed copy of a recurrence, implemented for every `Clone` recurrence.
pub trait SnapshotIndicator {
    fn snapshot(&self) -> Box<dyn IncrementalIndicator>;
}

impl<T: IncrementalIndicator + Clone + 'static> SnapshotIndicator for T {
    fn snapshot(&self) -> Box<dyn IncrementalIndicator> {
        Box::new(self.clone())
    }
}

/// Cached state of one indicator configuration.
///
/// The newest folded index is provisional: its candle may still be forming
/// (a coarser bar built from finer data), so the next `extend` rolls it
/// back and folds it again from the candle it is given then.
pub struct IndicatorState {
    last: Option<usize>,
    lines: Vec<Vec<f64>>,
    recurrence: Box<dyn IncrementalIndicator>,
    /// Recurrence as it was before the provisional index was stepped.
    before_last: Option<Box<dyn IncrementalIndicator>>,
}

impl fmt::Debug for IndicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndicatorState")
            .field("last", &self.last)
            .field("lines", &self.lines.len())
            .finish()
    }
}

impl IndicatorState {
    pub fn new(recurrence: impl IncrementalIndicator + 'static) -> Self {
        let lines = vec![Vec::new(); recurrence.outputs()];
        IndicatorState {
            last: None,
            lines,
            recurrence: Box::new(recurrence),
            before_last: None,
        }
    }

    /// Highest candle index folded in so far.
    pub fn last(&self) -> Option<usize> {
        self.last
    }

    /// Fold candles up to and including `upto`. Settled indices are never
    /// recomputed; the provisional newest one is refolded once `upto`
    /// reaches it again.
    pub fn extend(&mut self, candles: &[Candle], upto: usize) {
        if candles.is_empty() {
            return;
        }
        let upto = upto.min(candles.len() - 1);
        if self.last.is_some_and(|l| upto < l) {
            return;
        }
        if let (Some(last), Some(before)) = (self.last, self.before_last.take()) {
            self.recurrence = before;
            for line in &mut self.lines {
                line.truncate(last);
            }
            self.last = last.checked_sub(1);
        }
        let start = self.last.map_or(0, |l| l + 1);
        for i in start..=upto {
            if i == upto {
                self.before_last = Some(self.recurrence.snapshot());
            }
            self.recurrence.step(candles, i, &mut self.lines);
            self.last = Some(i);
        }
    }

    /// Output `line` at chronological `index`. Negative or not yet computed
    /// indices read as 0.
    pub fn value(&self, line: usize, index: i64) -> f64 {
        if index < 0 {
            return 0.0;
        }
        self.lines
            .get(line)
            .and_then(|l| l.get(index as usize))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn line(&self, line: usize) -> &[f64] {
        self.lines.get(line).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Identity of one indicator configuration. `params` is a stable textual
/// rendering of the numeric parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndicatorKey {
    pub kind: String,
    pub symbol: String,
    pub timeframe: i64,
    pub params: String,
}

impl IndicatorKey {
    pub fn new(kind: &str, symbol: &str, timeframe: i64, params: &[f64]) -> Self {
        let params = params
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        IndicatorKey {
            kind: kind.to_string(),
            symbol: symbol.to_string(),
            timeframe,
            params,
        }
    }
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) {}@{}",
            self.kind, self.params, self.symbol, self.timeframe
        )
    }
}

#[derive(Debug, Default)]
pub struct IndicatorCache {
    entries: HashMap<IndicatorKey, IndicatorState>,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for `key`, created with `init` on first use.
    pub fn get_or_create(
        &mut self,
        key: IndicatorKey,
        init: impl FnOnce() -> IndicatorState,
    ) -> &mut IndicatorState {
        self.entries.entry(key).or_insert_with(init)
    }

    /// Read-only lookup; never creates an entry.
    pub fn peek(&self, key: &IndicatorKey) -> Option<&IndicatorState> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Highest high and lowest low over `candles[start..=end]`.
pub(crate) fn high_low(candles: &[Candle], start: usize, end: usize) -> (f64, f64) {
    candles[start..=end]
        .iter()
        .fold((f64::NEG_INFINITY, f64::INFINITY), |(h, l), c| {
            (h.max(c.high), l.min(c.low))
        })
}

//! Price store: ticks and candles per symbol and timeframe.
//!
//! Timeframes are in seconds. A timeframe with no stored candles is built on
//! first use, by resampling a finer stored timeframe or by aggregating the
//! symbol's ticks, and cached. Reads at a point in time clip the newest
//! bar to the finer data seen by then.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::domain::ohlcv::{Candle, Tick};

#[derive(Debug, Clone, Default)]
pub struct MarketData {
    ticks: HashMap<String, Vec<Tick>>,
    candles: HashMap<String, HashMap<i64, Vec<Candle>>>,
    selected: BTreeSet<String>,
    /// Last clipped read per symbol and timeframe: settled bars followed by
    /// one forming bar.
    forming: HashMap<(String, i64), Vec<Candle>>,
    /// Series built from ticks rather than supplied.
    from_ticks: HashSet<(String, i64)>,
}

/// How much of a bar has been seen at a point in time.
enum Seen {
    Whole,
    Partial(Candle),
    Nothing,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tick stream of `symbol`. Ticks are kept sorted by time.
    pub fn set_ticks(&mut self, symbol: &str, mut ticks: Vec<Tick>) {
        ticks.sort_by_key(|t| t.time);
        self.ticks.insert(symbol.to_string(), ticks);
        self.selected.insert(symbol.to_string());
    }

    pub fn set_candles(&mut self, symbol: &str, timeframe: i64, candles: Vec<Candle>) {
        let key = (symbol.to_string(), timeframe);
        self.forming.remove(&key);
        self.from_ticks.remove(&key);
        self.candles
            .entry(symbol.to_string())
            .or_default()
            .insert(timeframe, candles);
        self.selected.insert(symbol.to_string());
    }

    /// Known symbols in name order.
    pub fn symbols(&self, selected_only: bool) -> Vec<String> {
        if selected_only {
            return self.selected.iter().cloned().collect();
        }
        let all: BTreeSet<&String> = self.ticks.keys().chain(self.candles.keys()).collect();
        all.into_iter().cloned().collect()
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.ticks.contains_key(symbol) || self.candles.contains_key(symbol)
    }

    /// Add or remove a symbol from the selection. Unknown symbols fail.
    pub fn select(&mut self, symbol: &str, enable: bool) -> bool {
        if !self.has_symbol(symbol) {
            return false;
        }
        if enable {
            self.selected.insert(symbol.to_string());
        } else {
            self.selected.remove(symbol);
        }
        true
    }

    /// Latest tick at or before `time`.
    pub fn tick_at(&self, symbol: &str, time: i64) -> Option<Tick> {
        let ticks = self.ticks.get(symbol)?;
        let after = ticks.partition_point(|t| t.time <= time);
        after.checked_sub(1).map(|i| ticks[i])
    }

    /// Every candle of `symbol` at `timeframe`, building the series if it
    /// is not stored yet. Unknown symbols yield an empty slice.
    pub fn candles(&mut self, symbol: &str, timeframe: i64) -> &[Candle] {
        let stored = self
            .candles
            .get(symbol)
            .is_some_and(|by_tf| by_tf.contains_key(&timeframe));
        if !stored {
            if !self.has_symbol(symbol) {
                return &[];
            }
            let built = self.build(symbol, timeframe);
            if self.from_ticks_only(symbol, timeframe) {
                self.from_ticks.insert((symbol.to_string(), timeframe));
            }
            self.candles
                .entry(symbol.to_string())
                .or_default()
                .insert(timeframe, built);
        }
        self.candles
            .get(symbol)
            .and_then(|by_tf| by_tf.get(&timeframe))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Candles of `symbol` at `timeframe` whose open time is at or before
    /// `time`. When finer candles or ticks exist, the newest bar only
    /// aggregates the parts of it at or before `time`.
    pub fn candles_until(&mut self, symbol: &str, timeframe: i64, time: i64) -> &[Candle] {
        self.candles(symbol, timeframe);
        let Some(all) = self.candles.get(symbol).and_then(|by_tf| by_tf.get(&timeframe)) else {
            return &[];
        };
        let visible = all.partition_point(|c| c.time <= time);
        let Some(newest) = visible.checked_sub(1) else {
            return &[];
        };
        let seen = self.seen(symbol, timeframe, &all[newest], time);
        match seen {
            Seen::Whole => &all[..visible],
            Seen::Nothing => &all[..newest],
            Seen::Partial(bar) => {
                let clipped = self
                    .forming
                    .entry((symbol.to_string(), timeframe))
                    .or_default();
                clipped.pop();
                clipped.truncate(newest);
                let settled = clipped.len();
                clipped.extend_from_slice(&all[settled..newest]);
                clipped.push(bar);
                clipped.as_slice()
            }
        }
    }

    /// Part of `bar` made of finer candles (or ticks) at or before `time`.
    fn seen(&self, symbol: &str, timeframe: i64, bar: &Candle, time: i64) -> Seen {
        let end = bar.time + timeframe;
        if time >= end - 1 {
            return Seen::Whole;
        }
        if let Some(source) = self.finer(symbol, timeframe, |tf| tf < timeframe) {
            let (start, seen, stop) = bounds(source, |c| c.time, bar.time, time, end);
            return clip(start, seen, stop, || resample(&source[start..seen], timeframe));
        }
        let ticks = self
            .ticks
            .get(symbol)
            .filter(|_| self.from_ticks.contains(&(symbol.to_string(), timeframe)));
        match ticks {
            Some(ticks) => {
                let (start, seen, stop) = bounds(ticks, |t| t.time, bar.time, time, end);
                clip(start, seen, stop, || aggregate_ticks(&ticks[start..seen], timeframe))
            }
            None => Seen::Whole,
        }
    }

    /// Stored non-empty series dividing `timeframe` whose period passes
    /// `keep`, the finest one first.
    fn finer(&self, symbol: &str, timeframe: i64, keep: impl Fn(i64) -> bool) -> Option<&Vec<Candle>> {
        self.candles.get(symbol).and_then(|by_tf| {
            by_tf
                .iter()
                .filter(|(tf, c)| **tf > 0 && timeframe % **tf == 0 && keep(**tf) && !c.is_empty())
                .min_by_key(|(tf, _)| **tf)
                .map(|(_, c)| c)
        })
    }

    fn from_ticks_only(&self, symbol: &str, timeframe: i64) -> bool {
        self.finer(symbol, timeframe, |_| true).is_none() && self.ticks.contains_key(symbol)
    }

    fn build(&self, symbol: &str, timeframe: i64) -> Vec<Candle> {
        if timeframe <= 0 {
            return Vec::new();
        }
        let finer = self.candles.get(symbol).and_then(|by_tf| {
            by_tf
                .iter()
                .filter(|(tf, c)| **tf > 0 && timeframe % **tf == 0 && !c.is_empty())
                .max_by_key(|(tf, _)| **tf)
                .map(|(_, c)| c)
        });
        if let Some(base) = finer {
            return resample(base, timeframe);
        }
        self.ticks
            .get(symbol)
            .map(|ticks| aggregate_ticks(ticks, timeframe))
            .unwrap_or_default()
    }
}

/// Indices of the first item in `[open, end)`, the first after `time` and
/// the first at or after `end`.
fn bounds<T>(items: &[T], at: impl Fn(&T) -> i64, open: i64, time: i64, end: i64) -> (usize, usize, usize) {
    let start = items.partition_point(|i| at(i) < open);
    let stop = items.partition_point(|i| at(i) < end);
    let seen = items.partition_point(|i| at(i) <= time).clamp(start, stop);
    (start, seen, stop)
}

fn clip(start: usize, seen: usize, stop: usize, fold: impl FnOnce() -> Vec<Candle>) -> Seen {
    if seen == stop {
        Seen::Whole
    } else if seen == start {
        Seen::Nothing
    } else {
        fold().pop().map_or(Seen::Nothing, Seen::Partial)
    }
}

fn bucket(time: i64, timeframe: i64) -> i64 {
    time.div_euclid(timeframe) * timeframe
}

/// Fold ticks into candles of `timeframe` seconds using the mid price.
/// Ticks must be sorted by time.
pub fn aggregate_ticks(ticks: &[Tick], timeframe: i64) -> Vec<Candle> {
    let mut out: Vec<Candle> = Vec::new();
    if timeframe <= 0 {
        return out;
    }
    for tick in ticks {
        let price = tick.mid();
        let start = bucket(tick.time, timeframe);
        match out.last_mut() {
            Some(c) if c.time == start => {
                c.high = c.high.max(price);
                c.low = c.low.min(price);
                c.close = price;
                c.volume = Some(c.volume_or_zero() + 1.0);
            }
            _ => out.push(Candle::new(start, price, price, price, price).with_volume(1.0)),
        }
    }
    out
}

/// Merge sorted candles into coarser buckets of `timeframe` seconds.
pub fn resample(candles: &[Candle], timeframe: i64) -> Vec<Candle> {
    let mut out: Vec<Candle> = Vec::new();
    if timeframe <= 0 {
        return out;
    }
    for candle in candles {
        let start = bucket(candle.time, timeframe);
        match out.last_mut() {
            Some(c) if c.time == start => {
                c.high = c.high.max(candle.high);
                c.low = c.low.min(candle.low);
                c.close = candle.close;
                c.volume = match (c.volume, candle.volume) {
                    (None, None) => None,
                    (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
                };
            }
            _ => out.push(Candle {
                time: start,
                ..candle.clone()
            }),
        }
    }
    out
}

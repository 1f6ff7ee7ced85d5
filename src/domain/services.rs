//! Terminal services handed to builtins: market, broker, account and
//! terminal state, the indicator cache, the current quote and bar, and the
//! custom-indicator registry.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::domain::account::{Account, AccountMetrics};
use crate::domain::backtest::BacktestRunner;
use crate::domain::broker::{Broker, Order};
use crate::domain::builtins::BuiltinRegistry;
use crate::domain::indicator::{IndicatorCache, IndicatorKey};
use crate::domain::market::MarketData;
use crate::domain::ohlcv::Candle;
use crate::domain::runtime::constants::EMPTY_VALUE;
use crate::domain::runtime::value::{ArrayRef, SeriesKind, Value};
use crate::domain::terminal::Terminal;

/// Output buffers and drawing properties registered by a custom indicator.
#[derive(Debug, Default)]
pub struct IndicatorBuffers {
    buffers: Vec<Option<ArrayRef>>,
    empty_values: HashMap<usize, f64>,
    pub labels: HashMap<usize, String>,
    pub shifts: HashMap<usize, i64>,
    pub draw_begin: HashMap<usize, i64>,
    pub styles: HashMap<usize, (i64, i64, i64)>,
    pub arrows: HashMap<usize, i64>,
    pub levels: HashMap<usize, f64>,
    pub short_name: String,
    pub digits: Option<i64>,
    /// Bars fully processed by the previous `OnCalculate`/`start` call.
    pub counted: i64,
}

impl IndicatorBuffers {
    /// Reserve `count` buffer slots (`IndicatorBuffers`).
    pub fn reserve(&mut self, count: usize) {
        if self.buffers.len() < count {
            self.buffers.resize(count, None);
        }
    }

    /// Bind `array` to slot `index`. Bound arrays are series-indexed.
    pub fn bind(&mut self, index: usize, array: ArrayRef) -> bool {
        self.reserve(index + 1);
        array.borrow_mut().as_series = true;
        self.buffers[index] = Some(array);
        true
    }

    pub fn get(&self, index: usize) -> Option<ArrayRef> {
        self.buffers.get(index).cloned().flatten()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn set_empty_value(&mut self, index: usize, value: f64) {
        self.empty_values.insert(index, value);
    }

    pub fn empty_value(&self, index: usize) -> f64 {
        self.empty_values.get(&index).copied().unwrap_or(EMPTY_VALUE)
    }

    /// Grow every bound buffer to `bars` elements. New (newest) slots hold
    /// the buffer's empty value.
    pub fn grow(&mut self, bars: usize) {
        for (index, buffer) in self.buffers.iter().enumerate() {
            let Some(buffer) = buffer else { continue };
            let fill = Value::Double(self.empty_value(index));
            let mut array = buffer.borrow_mut();
            if array.items.len() < bars {
                array.items.resize(bars, fill);
            }
        }
    }

    /// Buffer `mode` read `shift` bars back from the newest element.
    pub fn value(&self, mode: usize, shift: i64) -> f64 {
        let Some(buffer) = self.get(mode) else {
            return 0.0;
        };
        let array = buffer.borrow();
        let len = array.items.len() as i64;
        let index = len - 1 - shift;
        if index < 0 || index >= len {
            return 0.0;
        }
        array.items[index as usize].to_f64()
    }
}

/// Sources and nested runners of custom indicators.
#[derive(Debug, Default)]
pub struct CustomIndicators {
    pub sources: Rc<HashMap<String, String>>,
    /// Names currently being computed at any nesting level.
    pub in_progress: Rc<RefCell<HashSet<String>>>,
    pub builtins: Option<Rc<BuiltinRegistry>>,
    pub runners: HashMap<IndicatorKey, BacktestRunner>,
}

#[derive(Debug)]
pub struct Services {
    pub market: MarketData,
    pub broker: Broker,
    pub account: Account,
    pub terminal: Terminal,
    pub indicators: IndicatorCache,
    pub buffers: IndicatorBuffers,
    pub custom: CustomIndicators,
    pub symbol: String,
    /// Chart timeframe in seconds.
    pub timeframe: i64,
    /// Open time of the current bar.
    pub time: i64,
    pub bid: f64,
    pub ask: f64,
    pub digits: i64,
    pub point: f64,
    pub selected_order: Option<usize>,
    pub last_error: i64,
    pub stop_requested: bool,
    pub random_state: u32,
    /// Wall-clock start used by `GetTickCount`.
    pub started: std::time::Instant,
}

impl Default for Services {
    fn default() -> Self {
        Services {
            market: MarketData::new(),
            broker: Broker::new(),
            account: Account::default(),
            terminal: Terminal::new(),
            indicators: IndicatorCache::new(),
            buffers: IndicatorBuffers::default(),
            custom: CustomIndicators::default(),
            symbol: "TEST".to_string(),
            timeframe: 0,
            time: 0,
            bid: 0.0,
            ask: 0.0,
            digits: 5,
            point: 1e-5,
            selected_order: None,
            last_error: 0,
            stop_requested: false,
            random_state: 1,
            started: std::time::Instant::now(),
        }
    }
}

impl Services {
    /// `NULL`, `""` and `"0"` name the chart symbol.
    pub fn resolve_symbol(&self, symbol: &Value) -> String {
        match symbol.unref() {
            Value::Str(s) if !s.is_empty() && s != "0" => s,
            _ => self.symbol.clone(),
        }
    }

    /// Timeframe argument (`PERIOD_*`, minutes) to seconds; 0 is the chart
    /// timeframe.
    pub fn resolve_timeframe(&self, minutes: i64) -> i64 {
        if minutes <= 0 {
            self.timeframe
        } else {
            minutes * 60
        }
    }

    /// Chart period in minutes, as `Period()` reports it.
    pub fn period_minutes(&self) -> i64 {
        self.timeframe / 60
    }

    /// Candles of `symbol`/`timeframe` visible at the current bar.
    pub fn visible_candles(&mut self, symbol: &str, timeframe: i64) -> &[Candle] {
        self.market.candles_until(symbol, timeframe, self.time)
    }

    /// Chart candle `shift` bars back from the current one.
    pub fn chart_candle(&mut self, shift: i64) -> Option<Candle> {
        let symbol = self.symbol.clone();
        let timeframe = self.timeframe;
        let candles = self.visible_candles(&symbol, timeframe);
        let index = candles.len() as i64 - 1 - shift;
        if shift < 0 || index < 0 {
            return None;
        }
        candles.get(index as usize).cloned()
    }

    /// Element of a predefined series (`Close[shift]` etc). Out of range
    /// reads as 0.
    pub fn series_value(&mut self, kind: SeriesKind, shift: i64) -> Value {
        let candle = self.chart_candle(shift);
        match kind {
            SeriesKind::Time => Value::Int(candle.map_or(0, |c| c.time)),
            SeriesKind::Volume => Value::Int(candle.map_or(0, |c| c.volume_or_zero() as i64)),
            _ => Value::Double(candle.map_or(0.0, |c| series_price(&c, kind))),
        }
    }

    /// Whole visible chart series, oldest first.
    pub fn series_values(&mut self, kind: SeriesKind) -> Vec<f64> {
        let symbol = self.symbol.clone();
        let timeframe = self.timeframe;
        self.visible_candles(&symbol, timeframe)
            .iter()
            .map(|c| series_price(c, kind))
            .collect()
    }

    pub fn selected(&self) -> Option<&Order> {
        self.selected_order.and_then(|t| self.broker.order(t))
    }

    pub fn metrics(&self) -> AccountMetrics {
        self.account.metrics(&self.broker, self.bid, self.ask)
    }

    pub fn builtins(&self) -> Rc<BuiltinRegistry> {
        self.custom
            .builtins
            .clone()
            .unwrap_or_else(|| Rc::new(BuiltinRegistry::standard()))
    }
}

pub fn series_price(candle: &Candle, kind: SeriesKind) -> f64 {
    match kind {
        SeriesKind::Open => candle.open,
        SeriesKind::High => candle.high,
        SeriesKind::Low => candle.low,
        SeriesKind::Close => candle.close,
        SeriesKind::Time => candle.time as f64,
        SeriesKind::Volume => candle.volume_or_zero(),
    }
}

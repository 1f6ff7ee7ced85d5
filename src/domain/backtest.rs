//! Backtest runner: owns one compiled program and its terminal services,
//! and drives the program's event handlers bar by bar.
//!
//! Lifecycle: `OnInit` once on the first step, one primary handler per bar
//! (`OnCalculate`, `OnTick` or the configured entry point), then `OnDeinit`
//! once after the last bar. Scripts run their entry point a single time.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info_span, warn};

use crate::domain::account::{Account, AccountMetrics};
use crate::domain::broker::Order;
use crate::domain::builtins::BuiltinRegistry;
use crate::domain::error::MqlError;
use crate::domain::market::MarketData;
use crate::domain::ohlcv::{Candle, Tick};
use crate::domain::runtime::interpreter::Interpreter;
use crate::domain::runtime::program::RuntimeState;
use crate::domain::runtime::value::{MqlArray, PrimitiveType, SeriesKind, Value, new_cell};
use crate::domain::services::{CustomIndicators, Services};

/// Construction options. Unset fields take the terminal defaults.
#[derive(Debug, Clone)]
pub struct BacktestOptions {
    /// Handler called per bar instead of `OnCalculate`/`OnTick`, or once
    /// instead of `OnStart` for scripts.
    pub entry_point: Option<String>,
    pub initial_balance: f64,
    pub initial_margin: f64,
    pub account_currency: String,
    /// Tick streams per symbol. Chart bars without a tick quote at the close.
    pub ticks: HashMap<String, Vec<Tick>>,
    pub symbol: String,
    /// Values for `input`/`extern` globals, by name.
    pub input_values: HashMap<String, Value>,
    /// Chart timeframe in seconds; derived from the first two candles when unset.
    pub timeframe: Option<i64>,
    /// Custom indicator sources available to `iCustom`, by name.
    pub indicator_source: HashMap<String, String>,
    /// Name of the program itself; `iCustom` of this name is a cycle.
    pub program_name: Option<String>,
}

impl Default for BacktestOptions {
    fn default() -> Self {
        BacktestOptions {
            entry_point: None,
            initial_balance: 10_000.0,
            initial_margin: 0.0,
            account_currency: "USD".to_string(),
            ticks: HashMap::new(),
            symbol: "TEST".to_string(),
            input_values: HashMap::new(),
            timeframe: None,
            indicator_source: HashMap::new(),
            program_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramType {
    Expert,
    Indicator,
    Script,
}

impl ProgramType {
    /// Indicator if `OnCalculate` exists, else expert if `OnTick` exists,
    /// else script.
    pub fn detect(runtime: &RuntimeState) -> Self {
        if runtime.has_function("OnCalculate") {
            ProgramType::Indicator
        } else if runtime.has_function("OnTick") {
            ProgramType::Expert
        } else {
            ProgramType::Script
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramType::Expert => "expert",
            ProgramType::Indicator => "indicator",
            ProgramType::Script => "script",
        }
    }
}

/// Final state of a run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    /// User globals by name.
    pub globals: BTreeMap<String, serde_json::Value>,
    pub metrics: AccountMetrics,
    pub orders: Vec<Order>,
}

#[derive(Debug)]
pub struct BacktestRunner {
    runtime: RuntimeState,
    builtins: Rc<BuiltinRegistry>,
    services: Services,
    candles: Vec<Candle>,
    index: usize,
    program_type: ProgramType,
    entry_point: Option<String>,
    initialized: bool,
    deinitialized: bool,
    /// Return value of the previous `OnCalculate`.
    prev_calculated: i64,
    /// Caller's clock for a nested run; bars are only seen up to it.
    clock: Option<i64>,
    /// Clock the newest processed bar was seen at.
    stepped_at: Option<i64>,
}

impl BacktestRunner {
    /// Compile `source` and prepare a run over `candles` with the standard
    /// builtin table.
    pub fn new(source: &str, candles: Vec<Candle>, options: BacktestOptions) -> Result<Self, MqlError> {
        Self::with_builtins(source, candles, options, BuiltinRegistry::standard())
    }

    /// Like [`BacktestRunner::new`] with a caller-supplied builtin table.
    pub fn with_builtins(
        source: &str,
        candles: Vec<Candle>,
        options: BacktestOptions,
        builtins: BuiltinRegistry,
    ) -> Result<Self, MqlError> {
        let runtime = RuntimeState::compile(source)?;
        let timeframe = options.timeframe.unwrap_or_else(|| data_period(&candles));

        let mut market = MarketData::new();
        for (symbol, ticks) in &options.ticks {
            market.set_ticks(symbol, ticks.clone());
        }
        market.set_candles(&options.symbol, timeframe, candles.clone());

        let builtins = Rc::new(builtins);
        let custom = CustomIndicators {
            sources: Rc::new(options.indicator_source),
            in_progress: Rc::new(RefCell::new(options.program_name.into_iter().collect())),
            builtins: Some(Rc::clone(&builtins)),
            runners: HashMap::new(),
        };
        let services = Services {
            market,
            account: Account::new(
                options.initial_balance,
                options.initial_margin,
                &options.account_currency,
            ),
            custom,
            symbol: options.symbol,
            timeframe,
            ..Services::default()
        };
        Self::assemble(runtime, builtins, services, candles, options.entry_point, &options.input_values)
    }

    /// Runner for the custom indicator `source` on `symbol`/`timeframe` of
    /// `parent`'s market. `params` bind to the `input` globals in
    /// declaration order. The in-progress set and sources are shared with
    /// the parent; everything else is private to the new runner.
    pub(crate) fn nested(
        source: &str,
        parent: &Services,
        symbol: &str,
        timeframe: i64,
        params: &[Value],
    ) -> Result<Self, MqlError> {
        let runtime = RuntimeState::compile(source)?;
        let inputs: HashMap<String, Value> = runtime
            .input_names()
            .into_iter()
            .zip(params.iter().map(Value::unref))
            .collect();

        let mut market = parent.market.clone();
        let candles = market.candles(symbol, timeframe).to_vec();
        let builtins = parent.builtins();
        let custom = CustomIndicators {
            sources: Rc::clone(&parent.custom.sources),
            in_progress: Rc::clone(&parent.custom.in_progress),
            builtins: Some(Rc::clone(&builtins)),
            runners: HashMap::new(),
        };
        let services = Services {
            market,
            custom,
            symbol: symbol.to_string(),
            timeframe,
            digits: parent.digits,
            point: parent.point,
            ..Services::default()
        };
        Self::assemble(runtime, builtins, services, candles, None, &inputs)
    }

    fn assemble(
        runtime: RuntimeState,
        builtins: Rc<BuiltinRegistry>,
        mut services: Services,
        candles: Vec<Candle>,
        entry_point: Option<String>,
        inputs: &HashMap<String, Value>,
    ) -> Result<Self, MqlError> {
        let mut runtime = runtime;
        if let Some(first) = candles.first() {
            services.time = first.time;
        }
        Interpreter::new(&mut runtime, &builtins, &mut services).initialize_globals(inputs)?;
        let program_type = ProgramType::detect(&runtime);
        debug!(
            program = program_type.as_str(),
            symbol = %services.symbol,
            timeframe = services.timeframe,
            bars = candles.len(),
            "program loaded"
        );
        let mut runner = BacktestRunner {
            runtime,
            builtins,
            services,
            candles,
            index: 0,
            program_type,
            entry_point,
            initialized: false,
            deinitialized: false,
            prev_calculated: 0,
            clock: None,
            stepped_at: None,
        };
        runner.quote_current_bar();
        runner.sync_predefined();
        Ok(runner)
    }

    pub fn program_type(&self) -> ProgramType {
        self.program_type
    }

    /// Index of the next bar to process.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.candles.len() && (self.initialized || self.candles.is_empty())
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.runtime
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    /// Current value of a program global.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.runtime.global(name).map(|cell| cell.borrow().clone())
    }

    /// Process one bar.
    pub fn step(&mut self) -> Result<(), MqlError> {
        self.init();

        if self.program_type == ProgramType::Script {
            let entry = self.entry_point.clone().unwrap_or_else(|| "OnStart".to_string());
            self.sync_predefined();
            self.call(&entry, vec![])?;
            self.index = self.candles.len();
            self.deinit();
            return Ok(());
        }
        if self.index >= self.candles.len() {
            return Ok(());
        }

        let now = self.bar_clock(self.index);
        self.services.time = now;
        self.stepped_at = Some(now);
        let candle = self.current_candle();
        self.quote_current_bar();
        let realized = self.services.broker.update(&candle);
        if realized != 0.0 {
            self.services.account.apply_profit(realized);
        }
        let bars = self.index + 1;
        self.services.buffers.grow(bars);
        self.sync_predefined();

        if self.runtime.has_function("OnTimer") {
            while self.services.terminal.should_trigger_timer(candle.time) {
                self.call("OnTimer", vec![])?;
            }
        }

        self.run_primary(bars)?;
        self.dispatch_trade_events()?;
        self.dispatch_chart_events()?;

        self.index += 1;
        if self.index >= self.candles.len() && self.clock.is_none() {
            self.deinit();
        }
        Ok(())
    }

    /// Step to the end of the data, or until the program asks to stop.
    pub fn run(&mut self) -> Result<(), MqlError> {
        let _span = info_span!("backtest", symbol = %self.services.symbol).entered();
        self.init();
        while self.index < self.candles.len() || self.program_type == ProgramType::Script {
            self.step()?;
            if self.program_type == ProgramType::Script {
                break;
            }
            if self.services.stop_requested {
                debug!(bar = self.index, "stop requested");
                break;
            }
        }
        self.deinit();
        Ok(())
    }

    /// Step until bar `index` has been processed.
    pub fn advance_to(&mut self, index: usize) -> Result<(), MqlError> {
        while self.index <= index && self.index < self.candles.len() {
            self.step()?;
        }
        Ok(())
    }

    /// Nested-run stepping: process bars up to `index` as seen at `now`.
    /// The newest processed bar runs again when it was seen at an earlier
    /// clock, so a forming bar is recomputed as it fills in.
    pub(crate) fn advance_until(&mut self, index: usize, now: i64) -> Result<(), MqlError> {
        self.clock = Some(now);
        if let Some(newest) = self.index.checked_sub(1).filter(|n| *n < self.candles.len()) {
            let stale = self.stepped_at.is_some_and(|at| at < self.bar_clock(newest));
            if newest <= index && stale {
                self.index = newest;
            }
        }
        self.advance_to(index)
    }

    /// Clock for bar `index`: its open time, or in a nested run the
    /// caller's clock capped to the bar's last second.
    fn bar_clock(&self, index: usize) -> i64 {
        let open = self.candles.get(index).map_or(0, |c| c.time);
        match self.clock {
            Some(now) if self.services.timeframe > 0 => {
                (open + self.services.timeframe - 1).min(now).max(open)
            }
            _ => open,
        }
    }

    /// Bar `index` as visible at the current clock.
    fn current_candle(&mut self) -> Candle {
        let stored = self.candles[self.index].clone();
        self.services
            .chart_candle(0)
            .filter(|c| c.time == stored.time)
            .unwrap_or(stored)
    }

    /// Indicator buffer `mode`, `shift` bars back from the newest bar.
    pub fn buffer_value(&self, mode: usize, shift: i64) -> f64 {
        self.services.buffers.value(mode, shift)
    }

    pub fn metrics(&self) -> AccountMetrics {
        self.services.metrics()
    }

    pub fn report(&self) -> BacktestReport {
        let globals = self
            .runtime
            .global_decls
            .iter()
            .filter_map(|decl| {
                self.runtime
                    .global(&decl.name)
                    .map(|cell| (decl.name.clone(), json_value(&cell.borrow())))
            })
            .collect();
        BacktestReport {
            globals,
            metrics: self.metrics(),
            orders: self.services.broker.all_orders().to_vec(),
        }
    }

    fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.sync_predefined();
        debug!("OnInit");
        if let Err(err) = self.call("OnInit", vec![]) {
            warn!(error = %err, "OnInit failed");
        }
    }

    fn deinit(&mut self) {
        if self.deinitialized || !self.initialized {
            return;
        }
        self.deinitialized = true;
        debug!(bars = self.index, "OnDeinit");
        if let Err(err) = self.call("OnDeinit", vec![Value::Int(0)]) {
            warn!(error = %err, "OnDeinit failed");
        }
    }

    fn run_primary(&mut self, bars: usize) -> Result<(), MqlError> {
        if let Some(entry) = self.entry_point.clone() {
            self.call(&entry, vec![])?;
            return Ok(());
        }
        if self.program_type != ProgramType::Indicator {
            self.call("OnTick", vec![])?;
            self.services.buffers.counted = bars as i64;
            return Ok(());
        }
        let args = self.calculate_args(bars);
        let returned = self.call("OnCalculate", args)?;
        self.prev_calculated = returned.map_or(bars as i64, |v| v.to_i64());
        self.services.buffers.counted = self.prev_calculated;
        Ok(())
    }

    /// Arguments for `OnCalculate`, in the short price form or the full
    /// OHLC form depending on the declared parameter count.
    fn calculate_args(&self, bars: usize) -> Vec<Value> {
        let arity = self
            .runtime
            .functions
            .get("OnCalculate")
            .and_then(|o| o.first())
            .map_or(4, |o| o.params.len());
        let rates_total = Value::Int(bars as i64);
        let prev = Value::Int(self.prev_calculated);
        if arity < 10 {
            return vec![rates_total, prev, Value::Int(0), Value::Series(SeriesKind::Close)];
        }
        let mut spread = MqlArray::new(vec![Value::Int(0); bars], Some(PrimitiveType::Int));
        spread.as_series = true;
        vec![
            rates_total,
            prev,
            Value::Series(SeriesKind::Time),
            Value::Series(SeriesKind::Open),
            Value::Series(SeriesKind::High),
            Value::Series(SeriesKind::Low),
            Value::Series(SeriesKind::Close),
            Value::Series(SeriesKind::Volume),
            Value::Series(SeriesKind::Volume),
            Value::from_array(spread),
        ]
    }

    fn dispatch_trade_events(&mut self) -> Result<(), MqlError> {
        let tickets = self.services.broker.take_events();
        if !self.runtime.has_function("OnTrade") {
            return Ok(());
        }
        for ticket in tickets {
            let previous = self.services.selected_order.replace(ticket);
            let result = self.call("OnTrade", vec![]);
            self.services.selected_order = previous;
            result?;
        }
        Ok(())
    }

    fn dispatch_chart_events(&mut self) -> Result<(), MqlError> {
        let events = self.services.terminal.take_chart_events();
        if !self.runtime.has_function("OnChartEvent") {
            return Ok(());
        }
        for event in events {
            let args = vec![
                Value::Int(event.id),
                Value::Int(event.lparam),
                Value::Double(event.dparam),
                Value::Str(event.sparam),
            ];
            self.call("OnChartEvent", args)?;
        }
        Ok(())
    }

    /// Call a handler if the program defines it. Scalars are passed as
    /// lvalues so `const T &` parameters bind; trailing arguments the
    /// handler does not declare are dropped.
    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Option<Value>, MqlError> {
        let mut args: Vec<Value> = args
            .into_iter()
            .map(|v| match v {
                Value::Array(_) | Value::Object(_) | Value::Series(_) => v,
                other => Value::Ref(new_cell(other)),
            })
            .collect();
        if let Some(overloads) = self.runtime.functions.get(name) {
            if !overloads.iter().any(|o| o.accepts(args.len())) {
                let declared = overloads.iter().map(|o| o.params.len()).max().unwrap_or(0);
                args.truncate(declared);
            }
        }
        let builtins = Rc::clone(&self.builtins);
        let result =
            Interpreter::new(&mut self.runtime, &builtins, &mut self.services).call_handler(name, args);
        self.runtime
            .set_global("_LastError", Value::Int(self.services.last_error));
        result
    }

    /// Bid/ask at the clock: the latest tick, or the visible close of the
    /// current bar on both sides.
    fn quote_current_bar(&mut self) {
        let Some(candle) = self.services.chart_candle(0) else {
            return;
        };
        let (bid, ask) = self
            .services
            .market
            .tick_at(&self.services.symbol, self.services.time)
            .map_or((candle.close, candle.close), |t| (t.bid, t.ask));
        self.services.bid = bid;
        self.services.ask = ask;
    }

    fn sync_predefined(&mut self) {
        let s = &self.services;
        let bars = (self.index + 1).min(self.candles.len()) as i64;
        let values = [
            ("Bid", Value::Double(s.bid)),
            ("Ask", Value::Double(s.ask)),
            ("Bars", Value::Int(bars)),
            ("Digits", Value::Int(s.digits)),
            ("_Digits", Value::Int(s.digits)),
            ("Point", Value::Double(s.point)),
            ("_Point", Value::Double(s.point)),
            ("_Symbol", Value::Str(s.symbol.clone())),
            ("_Period", Value::Int(s.period_minutes())),
            ("_LastError", Value::Int(s.last_error)),
            ("_StopFlag", Value::Bool(s.stop_requested)),
        ];
        for (name, value) in values {
            self.runtime.set_global(name, value);
        }
    }
}

/// Spacing of the first two candles, 0 with fewer than two.
fn data_period(candles: &[Candle]) -> i64 {
    match candles {
        [first, second, ..] => second.time - first.time,
        _ => 0,
    }
}

/// JSON rendering of a runtime value for reports.
pub fn json_value(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Void | Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Double(d) => serde_json::Number::from_f64(*d).map_or(Json::Null, Json::Number),
        Value::Str(s) => Json::String(s.clone()),
        Value::Array(array) => {
            let array = array.borrow();
            Json::Array(array.items.iter().map(json_value).collect())
        }
        Value::Object(object) => {
            let object = object.borrow();
            let fields: serde_json::Map<String, Json> = object
                .fields
                .iter()
                .map(|(name, cell)| (name.clone(), json_value(&cell.borrow())))
                .collect::<BTreeMap<_, _>>()
                .into_iter()
                .collect();
            serde_json::json!({ "class": object.class, "fields": fields })
        }
        Value::Series(kind) => Json::String(kind.name().to_string()),
        Value::Ref(cell) => json_value(&cell.borrow()),
    }
}

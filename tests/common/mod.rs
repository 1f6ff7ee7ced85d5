#![allow(dead_code)]

use std::collections::HashMap;

use mqlsim::domain::backtest::{BacktestOptions, BacktestRunner};
use mqlsim::domain::builtins::BuiltinRegistry;
use mqlsim::domain::error::MqlError;
pub use mqlsim::domain::ohlcv::Candle;
use mqlsim::domain::runtime::interpreter::Interpreter;
use mqlsim::domain::runtime::program::RuntimeState;
use mqlsim::domain::runtime::value::Value;
use mqlsim::domain::services::Services;

/// Flat one-minute candles closing at each of `closes`.
pub fn minute_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Candle::new(i as i64 * 60, c, c, c, c))
        .collect()
}

/// Candles with a gentle wave, `step` seconds apart.
pub fn wave_candles(n: usize, step: i64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 1.1 + (x * 0.3).sin() * 0.01;
            let open = close - 0.002 * (x * 0.7).cos();
            Candle::new(i as i64 * step, open, open.max(close) + 0.001, open.min(close) - 0.001, close)
                .with_volume(1000.0 + x)
        })
        .collect()
}

pub fn runner(source: &str, candles: Vec<Candle>) -> BacktestRunner {
    BacktestRunner::new(source, candles, BacktestOptions::default()).unwrap()
}

pub fn runner_with(source: &str, candles: Vec<Candle>, options: BacktestOptions) -> BacktestRunner {
    BacktestRunner::new(source, candles, options).unwrap()
}

pub fn options_with_indicators(sources: &[(&str, &str)]) -> BacktestOptions {
    BacktestOptions {
        indicator_source: sources
            .iter()
            .map(|(name, src)| (name.to_string(), src.to_string()))
            .collect::<HashMap<_, _>>(),
        ..BacktestOptions::default()
    }
}

/// Compile `source` and call `name` once against fresh services.
pub fn call_once(source: &str, name: &str, args: Vec<Value>) -> Result<Value, MqlError> {
    let mut runtime = RuntimeState::compile(source)?;
    call_in(&mut runtime, name, args)
}

/// Call `name` against an existing runtime, keeping its globals and statics.
pub fn call_in(runtime: &mut RuntimeState, name: &str, args: Vec<Value>) -> Result<Value, MqlError> {
    let builtins = BuiltinRegistry::standard();
    let mut services = Services::default();
    let mut interp = Interpreter::new(runtime, &builtins, &mut services);
    interp.initialize_globals(&HashMap::new())?;
    interp.call_function(name, args)
}

pub fn global_f64(runner: &BacktestRunner, name: &str) -> f64 {
    runner.global(name).map(|v| v.to_f64()).unwrap_or(f64::NAN)
}

//! Property tests: indicator state folded bar by bar matches one pass.

use mqlsim::domain::indicator::adx::Adx;
use mqlsim::domain::indicator::atr::Atr;
use mqlsim::domain::indicator::bands::Bands;
use mqlsim::domain::indicator::bill_williams::Ao;
use mqlsim::domain::indicator::macd::Macd;
use mqlsim::domain::indicator::moving_average::MovingAverage;
use mqlsim::domain::indicator::oscillators::{Cci, Momentum};
use mqlsim::domain::indicator::rsi::Rsi;
use mqlsim::domain::indicator::sar::Sar;
use mqlsim::domain::indicator::stochastic::Stochastic;
use mqlsim::domain::indicator::volume::Obv;
use mqlsim::domain::indicator::{IndicatorState, MaMethod};
use mqlsim::domain::ohlcv::Candle;
use proptest::prelude::*;

fn candle_series() -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec((1.0f64..2.0, -0.05f64..0.05, 0.0f64..0.02, 0.0f64..0.02, 1.0f64..500.0), 1..60)
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (open, change, up, down, volume))| {
                    let close = open + change;
                    let high = open.max(close) + up;
                    let low = open.min(close) - down;
                    Candle::new(i as i64 * 60, open, high, low, close).with_volume(volume)
                })
                .collect()
        })
}

fn same(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan()))
}

fn check(make: impl Fn() -> IndicatorState, candles: &[Candle], lines: usize) -> Result<(), TestCaseError> {
    let last = candles.len() - 1;
    let mut whole = make();
    whole.extend(candles, last);
    let mut stepped = make();
    for i in 0..candles.len() {
        stepped.extend(&candles[..=i], i);
    }
    prop_assert_eq!(whole.last(), Some(last));
    for line in 0..lines {
        prop_assert!(
            same(whole.line(line), stepped.line(line)),
            "line {} differs: {:?} vs {:?}",
            line,
            whole.line(line),
            stepped.line(line)
        );
    }
    Ok(())
}

proptest! {
    #[test]
    fn moving_averages(candles in candle_series(), period in 1usize..12, method in 0i64..4, applied in 0i64..7) {
        check(|| IndicatorState::new(MovingAverage::new(period, MaMethod::from_code(method), applied)), &candles, 1)?;
    }

    #[test]
    fn oscillators(candles in candle_series(), period in 1usize..15) {
        check(|| IndicatorState::new(Rsi::new(period, 0)), &candles, 1)?;
        check(|| IndicatorState::new(Cci::new(period, 5)), &candles, 1)?;
        check(|| IndicatorState::new(Momentum::new(period, 0)), &candles, 1)?;
        check(|| IndicatorState::new(Stochastic::new(period, 3, 3, 0)), &candles, 2)?;
    }

    #[test]
    fn trend_and_volatility(candles in candle_series(), period in 2usize..15) {
        check(|| IndicatorState::new(Atr::new(period)), &candles, 1)?;
        check(|| IndicatorState::new(Adx::new(period)), &candles, 3)?;
        check(|| IndicatorState::new(Bands::new(period, 2.0, 0)), &candles, 3)?;
        check(|| IndicatorState::new(Macd::new(period, period * 2, 9, 0)), &candles, 3)?;
        check(|| IndicatorState::new(Sar::new(0.02, 0.2)), &candles, 1)?;
    }

    #[test]
    fn volume_and_bill_williams(candles in candle_series()) {
        check(|| IndicatorState::new(Obv::new(0)), &candles, 1)?;
        check(|| IndicatorState::new(Ao::default()), &candles, 1)?;
    }
}

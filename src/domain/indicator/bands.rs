//! Bollinger Bands and Envelopes.
//!
//! Bands:
//! - Main: SMA over n periods
//! - Upper: Main + (deviation × StdDev)
//! - Lower: Main - (deviation × StdDev)
//!
//! StdDev is the population standard deviation over the same window.
//! Envelopes scale a moving average by (1 ± deviation/100).
//!
//! Lines: 0 main, 1 upper, 2 lower. Warmup values are 0.

use crate::domain::indicator::moving_average::{MaAccumulator, MaMethod};
use crate::domain::indicator::stddev::StdDev;
use crate::domain::indicator::IncrementalIndicator;
use crate::domain::ohlcv::Candle;

#[derive(Clone)]
pub struct Bands {
    deviation: f64,
    ma: MaAccumulator,
    stddev: StdDev,
    applied: i64,
    period: usize,
}

impl Bands {
    pub fn new(period: usize, deviation: f64, applied: i64) -> Self {
        Bands {
            deviation,
            ma: MaAccumulator::new(period, MaMethod::Sma),
            stddev: StdDev::new(period, applied),
            applied,
            period: period.max(1),
        }
    }
}

impl IncrementalIndicator for Bands {
    fn outputs(&self) -> usize {
        3
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let price = candles[index].price(self.applied);
        let main = self.ma.push(price);
        let sd = self.stddev.push(price);
        if index + 1 < self.period {
            out.iter_mut().for_each(|line| line.push(0.0));
            return;
        }
        let width = self.deviation * sd;
        out[0].push(main);
        out[1].push(main + width);
        out[2].push(main - width);
    }
}

#[derive(Clone)]
pub struct Envelopes {
    deviation: f64,
    applied: i64,
    ma: MaAccumulator,
}

impl Envelopes {
    pub fn new(period: usize, method: MaMethod, applied: i64, deviation: f64) -> Self {
        Envelopes {
            deviation,
            applied,
            ma: MaAccumulator::new(period, method),
        }
    }
}

impl IncrementalIndicator for Envelopes {
    fn outputs(&self) -> usize {
        3
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let ma = self.ma.push(candles[index].price(self.applied));
        let ratio = self.deviation / 100.0;
        out[0].push(ma);
        out[1].push(ma * (1.0 + ratio));
        out[2].push(ma * (1.0 - ratio));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{test_support, IndicatorState};

    fn closes(prices: &[f64]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Candle::new(i as i64, p, p, p, p))
            .collect()
    }

    #[test]
    fn bands_known_values() {
        let data = closes(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let mut state = IndicatorState::new(Bands::new(8, 2.0, 0));
        state.extend(&data, 7);
        assert!((state.value(0, 7) - 5.0).abs() < 1e-12);
        assert!((state.value(1, 7) - 9.0).abs() < 1e-9);
        assert!((state.value(2, 7) - 1.0).abs() < 1e-9);
        assert!((state.value(1, 6) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn flat_prices_collapse_bands() {
        let data = closes(&[3.0; 5]);
        let mut state = IndicatorState::new(Bands::new(3, 2.0, 0));
        state.extend(&data, 4);
        assert!((state.value(1, 4) - state.value(2, 4)).abs() < f64::EPSILON);
    }

    #[test]
    fn envelopes_scale_the_average() {
        let data = closes(&[10.0, 20.0]);
        let mut state = IndicatorState::new(Envelopes::new(2, MaMethod::Sma, 0, 10.0));
        state.extend(&data, 1);
        assert!((state.value(0, 1) - 15.0).abs() < f64::EPSILON);
        assert!((state.value(1, 1) - 16.5).abs() < 1e-12);
        assert!((state.value(2, 1) - 13.5).abs() < 1e-12);
    }

    #[test]
    fn incremental_equivalence() {
        test_support::assert_incremental(|| IndicatorState::new(Bands::new(20, 2.0, 0)), 50);
        test_support::assert_incremental(
            || IndicatorState::new(Envelopes::new(10, MaMethod::Ema, 0, 0.5)),
            50,
        );
    }
}

//! Moving averages: SMA, EMA, SMMA and LWMA selected by method code.
//!
//! EMA and SMMA are seeded with the SMA of the first `period` prices;
//! k = 2/(n+1). Warmup values are 0.

use std::collections::VecDeque;

use crate::domain::indicator::IncrementalIndicator;
use crate::domain::ohlcv::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaMethod {
    Sma,
    Ema,
    Smma,
    Lwma,
}

impl MaMethod {
    /// `MODE_SMA`..`MODE_LWMA`; unknown codes fall back to SMA.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => MaMethod::Ema,
            2 => MaMethod::Smma,
            3 => MaMethod::Lwma,
            _ => MaMethod::Sma,
        }
    }
}

/// Running moving average fed one price at a time.
#[derive(Debug, Clone)]
pub struct MaAccumulator {
    period: usize,
    method: MaMethod,
    window: VecDeque<f64>,
    sum: f64,
    seen: usize,
    value: f64,
}

impl MaAccumulator {
    pub fn new(period: usize, method: MaMethod) -> Self {
        let period = period.max(1);
        MaAccumulator {
            period,
            method,
            window: VecDeque::with_capacity(period + 1),
            sum: 0.0,
            seen: 0,
            value: 0.0,
        }
    }

    /// Fold one price and return the average, or 0 during warmup.
    pub fn push(&mut self, price: f64) -> f64 {
        self.seen += 1;
        self.window.push_back(price);
        self.sum += price;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        if self.seen < self.period {
            return 0.0;
        }
        let n = self.period as f64;
        self.value = match self.method {
            MaMethod::Sma => self.sum / n,
            MaMethod::Ema if self.seen > self.period => {
                let k = 2.0 / (n + 1.0);
                price * k + self.value * (1.0 - k)
            }
            MaMethod::Smma if self.seen > self.period => (self.value * (n - 1.0) + price) / n,
            MaMethod::Ema | MaMethod::Smma => self.sum / n,
            MaMethod::Lwma => {
                let weighted: f64 = self
                    .window
                    .iter()
                    .enumerate()
                    .map(|(i, p)| p * (i + 1) as f64)
                    .sum();
                weighted / (n * (n + 1.0) / 2.0)
            }
        };
        self.value
    }
}

/// `iMA`: one line, the average of the applied price.
#[derive(Clone)]
pub struct MovingAverage {
    applied: i64,
    acc: MaAccumulator,
}

impl MovingAverage {
    pub fn new(period: usize, method: MaMethod, applied: i64) -> Self {
        MovingAverage {
            applied,
            acc: MaAccumulator::new(period, method),
        }
    }
}

impl IncrementalIndicator for MovingAverage {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let price = candles[index].price(self.applied);
        out[0].push(self.acc.push(price));
    }
}

/// Moving average of `prices` ending at `index`, or 0 if the window does
/// not fit.
pub fn moving_average_at(prices: &[f64], period: usize, method: MaMethod, index: usize) -> f64 {
    if index >= prices.len() {
        return 0.0;
    }
    let mut acc = MaAccumulator::new(period, method);
    let mut value = 0.0;
    for price in &prices[..=index] {
        value = acc.push(*price);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{test_support, IndicatorState};

    fn run(prices: &[f64], period: usize, method: MaMethod) -> Vec<f64> {
        let mut acc = MaAccumulator::new(period, method);
        prices.iter().map(|p| acc.push(*p)).collect()
    }

    #[test]
    fn sma_warmup_then_rolling_mean() {
        let v = run(&[10.0, 20.0, 30.0, 40.0], 3, MaMethod::Sma);
        assert!((v[0] - 0.0).abs() < f64::EPSILON);
        assert!((v[1] - 0.0).abs() < f64::EPSILON);
        assert!((v[2] - 20.0).abs() < f64::EPSILON);
        assert!((v[3] - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_seed_is_sma() {
        let v = run(&[10.0, 20.0, 30.0, 40.0, 50.0], 3, MaMethod::Ema);
        let k = 2.0 / 4.0;
        let sma = 20.0;
        assert!((v[2] - sma).abs() < f64::EPSILON);
        let ema3 = 40.0 * k + sma * (1.0 - k);
        assert!((v[3] - ema3).abs() < f64::EPSILON);
        assert!((v[4] - (50.0 * k + ema3 * (1.0 - k))).abs() < f64::EPSILON);
    }

    #[test]
    fn smma_smooths_from_seed() {
        let v = run(&[10.0, 20.0, 30.0, 60.0], 3, MaMethod::Smma);
        assert!((v[2] - 20.0).abs() < f64::EPSILON);
        assert!((v[3] - (20.0 * 2.0 + 60.0) / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn lwma_weights_newest_most() {
        let v = run(&[10.0, 20.0, 30.0], 3, MaMethod::Lwma);
        let expected = (10.0 + 40.0 + 90.0) / 6.0;
        assert!((v[2] - expected).abs() < 1e-12);
    }

    #[test]
    fn method_codes() {
        assert_eq!(MaMethod::from_code(0), MaMethod::Sma);
        assert_eq!(MaMethod::from_code(3), MaMethod::Lwma);
        assert_eq!(MaMethod::from_code(42), MaMethod::Sma);
    }

    #[test]
    fn period_zero_acts_as_one() {
        let v = run(&[5.0, 7.0], 0, MaMethod::Sma);
        assert!((v[1] - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn on_array_matches_accumulator() {
        let prices = [1.0, 2.0, 4.0, 8.0, 16.0];
        let v = run(&prices, 2, MaMethod::Ema);
        assert!((moving_average_at(&prices, 2, MaMethod::Ema, 4) - v[4]).abs() < f64::EPSILON);
        assert!((moving_average_at(&prices, 2, MaMethod::Ema, 9) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn incremental_equivalence_all_methods() {
        for code in 0..4 {
            test_support::assert_incremental(
                || IndicatorState::new(MovingAverage::new(5, MaMethod::from_code(code), 6)),
                40,
            );
        }
    }
}

//! Population standard deviation over a rolling window, from a running sum
//! and a running sum of squares.
//!
//! Warmup: the first (n-1) bars are 0.

use std::collections::VecDeque;

use crate::domain::indicator::IncrementalIndicator;
use crate::domain::ohlcv::Candle;

#[derive(Clone)]
pub struct StdDev {
    period: usize,
    applied: i64,
    window: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
}

impl StdDev {
    pub fn new(period: usize, applied: i64) -> Self {
        StdDev {
            period: period.max(1),
            applied,
            window: VecDeque::new(),
            sum: 0.0,
            sum_sq: 0.0,
        }
    }
}

impl StdDev {
    /// Fold one price; 0 until the window is full.
    pub fn push(&mut self, price: f64) -> f64 {
        self.window.push_back(price);
        self.sum += price;
        self.sum_sq += price * price;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
                self.sum_sq -= old * old;
            }
        }
        if self.window.len() < self.period {
            return 0.0;
        }
        population_stddev(self.sum, self.sum_sq, self.period)
    }
}

impl IncrementalIndicator for StdDev {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let price = candles[index].price(self.applied);
        out[0].push(self.push(price));
    }
}

pub fn population_stddev(sum: f64, sum_sq: f64, n: usize) -> f64 {
    let n = n as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0).sqrt()
}

/// Standard deviation of `values[index+1-period..=index]`, or 0 when the
/// window does not fit.
pub fn stddev_at(values: &[f64], period: usize, index: usize) -> f64 {
    let period = period.max(1);
    if index >= values.len() || index + 1 < period {
        return 0.0;
    }
    let window = &values[index + 1 - period..=index];
    let sum: f64 = window.iter().sum();
    let sum_sq: f64 = window.iter().map(|v| v * v).sum();
    population_stddev(sum, sum_sq, period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{test_support, IndicatorState};

    #[test]
    fn known_values() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((stddev_at(&values, 8, 7) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn constant_window_is_zero() {
        assert!((stddev_at(&[3.0, 3.0, 3.0], 3, 2) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn window_must_fit() {
        assert!((stddev_at(&[1.0, 2.0], 3, 1) - 0.0).abs() < f64::EPSILON);
        assert!((stddev_at(&[1.0, 2.0], 2, 5) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn incremental_matches_window_formula() {
        let data = test_support::candles(30);
        let closes: Vec<f64> = data.iter().map(|c| c.close).collect();
        let mut state = IndicatorState::new(StdDev::new(5, 0));
        state.extend(&data, 29);
        for i in 4..30 {
            assert!((state.value(0, i as i64) - stddev_at(&closes, 5, i)).abs() < 1e-6);
        }
    }

    #[test]
    fn incremental_equivalence() {
        test_support::assert_incremental(|| IndicatorState::new(StdDev::new(20, 0)), 50);
    }
}

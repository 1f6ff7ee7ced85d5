//! RSI over a rolling window of price changes.
//!
//! avgGain and avgLoss are plain means of the last `period` gains/losses.
//! RSI = 100 when avgLoss == 0, 0 when avgGain == 0, else 100 - 100/(1+rs).
//! Warmup: the first `period` bars are 0.

use std::collections::VecDeque;

use crate::domain::indicator::IncrementalIndicator;
use crate::domain::ohlcv::Candle;

#[derive(Clone)]
pub struct Rsi {
    period: usize,
    applied: i64,
    changes: VecDeque<(f64, f64)>,
}

impl Rsi {
    pub fn new(period: usize, applied: i64) -> Self {
        Rsi {
            period: period.max(1),
            applied,
            changes: VecDeque::new(),
        }
    }
}

/// RSI from average gain and loss.
pub fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

impl IncrementalIndicator for Rsi {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        if index == 0 {
            out[0].push(0.0);
            return;
        }
        let diff = candles[index].price(self.applied) - candles[index - 1].price(self.applied);
        self.changes.push_back((diff.max(0.0), (-diff).max(0.0)));
        if self.changes.len() > self.period {
            self.changes.pop_front();
        }
        if index < self.period {
            out[0].push(0.0);
            return;
        }
        let (gains, losses) = self
            .changes
            .iter()
            .fold((0.0, 0.0), |(g, l), (cg, cl)| (g + cg, l + cl));
        let n = self.period as f64;
        out[0].push(rsi_value(gains / n, losses / n));
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

    fn rsi(prices: &[f64], period: usize) -> IndicatorState {
        let data = closes(prices);
        let mut state = IndicatorState::new(Rsi::new(period, 0));
        state.extend(&data, data.len() - 1);
        state
    }

    #[test]
    fn warmup_is_zero() {
        let state = rsi(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!((state.value(0, 2) - 0.0).abs() < f64::EPSILON);
        assert!(state.value(0, 3) > 0.0);
    }

    #[test]
    fn only_gains_is_100() {
        let state = rsi(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!((state.value(0, 3) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn only_losses_is_zero() {
        let state = rsi(&[4.0, 3.0, 2.0, 1.0], 3);
        assert!((state.value(0, 3) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mixed_window() {
        // changes +2, -1, +2 -> avg gain 4/3, avg loss 1/3, rs 4
        let state = rsi(&[10.0, 12.0, 11.0, 13.0], 3);
        assert!((state.value(0, 3) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn window_drops_old_changes() {
        // first change -5 leaves the 2-bar window at index 3
        let state = rsi(&[10.0, 5.0, 6.0, 7.0], 2);
        assert!((state.value(0, 3) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn incremental_equivalence() {
        test_support::assert_incremental(|| IndicatorState::new(Rsi::new(14, 0)), 50);
    }
}

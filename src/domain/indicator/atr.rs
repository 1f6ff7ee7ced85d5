//! Average True Range.
//!
//! value[0] = 0. For i <= period the running mean of the true range, after
//! that Wilder smoothing: atr = (atr*(n-1) + tr)/n.

use crate::domain::indicator::IncrementalIndicator;
use crate::domain::ohlcv::Candle;

#[derive(Clone)]
pub struct Atr {
    period: usize,
    atr: f64,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Atr {
            period: period.max(1),
            atr: 0.0,
        }
    }
}

impl IncrementalIndicator for Atr {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        if index == 0 {
            out[0].push(0.0);
            return;
        }
        let tr = candles[index].true_range(candles[index - 1].close);
        self.atr = if index <= self.period {
            (self.atr * (index - 1) as f64 + tr) / index as f64
        } else {
            let n = self.period as f64;
            (self.atr * (n - 1.0) + tr) / n
        };
        out[0].push(self.atr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{test_support, IndicatorState};

    fn bar(i: i64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(i, close, high, low, close)
    }

    #[test]
    fn running_mean_then_wilder() {
        let data = vec![
            bar(0, 11.0, 9.0, 10.0),
            bar(1, 12.0, 10.0, 11.0),
            bar(2, 13.0, 9.0, 12.0),
            bar(3, 14.0, 12.0, 13.0),
        ];
        let mut state = IndicatorState::new(Atr::new(2));
        state.extend(&data, 3);
        assert!((state.value(0, 0) - 0.0).abs() < f64::EPSILON);
        assert!((state.value(0, 1) - 2.0).abs() < f64::EPSILON);
        assert!((state.value(0, 2) - 3.0).abs() < f64::EPSILON);
        assert!((state.value(0, 3) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn gap_uses_previous_close() {
        let data = vec![bar(0, 10.0, 10.0, 10.0), bar(1, 16.0, 15.0, 15.5)];
        let mut state = IndicatorState::new(Atr::new(5));
        state.extend(&data, 1);
        assert!((state.value(0, 1) - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn incremental_equivalence() {
        test_support::assert_incremental(|| IndicatorState::new(Atr::new(14)), 50);
    }
}

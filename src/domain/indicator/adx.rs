//! Average Directional Index with Wilder's DM/TR sums.
//!
//! The first `period` bars accumulate plain sums; from then on each sum is
//! smoothed as sum - sum/n + x and ADX as (adx*(n-1) + dx)/n.
//! Lines: 0 ADX, 1 +DI, 2 -DI.

use crate::domain::indicator::IncrementalIndicator;
use crate::domain::ohlcv::Candle;

#[derive(Clone)]
pub struct Adx {
    period: usize,
    tr: f64,
    plus_dm: f64,
    minus_dm: f64,
    adx: f64,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Adx {
            period: period.max(1),
            tr: 0.0,
            plus_dm: 0.0,
            minus_dm: 0.0,
            adx: 0.0,
        }
    }

    fn directional(&self) -> (f64, f64, f64) {
        if self.tr == 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let plus = self.plus_dm / self.tr * 100.0;
        let minus = self.minus_dm / self.tr * 100.0;
        let dx = if plus + minus == 0.0 {
            0.0
        } else {
            (plus - minus).abs() / (plus + minus) * 100.0
        };
        (plus, minus, dx)
    }
}

impl IncrementalIndicator for Adx {
    fn outputs(&self) -> usize {
        3
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        if index == 0 {
            out.iter_mut().for_each(|line| line.push(0.0));
            return;
        }
        let cur = &candles[index];
        let prev = &candles[index - 1];
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = cur.true_range(prev.close);
        let n = self.period as f64;

        if index < self.period {
            self.tr += tr;
            self.plus_dm += plus_dm;
            self.minus_dm += minus_dm;
            out.iter_mut().for_each(|line| line.push(0.0));
            return;
        }
        if index == self.period {
            self.tr += tr;
            self.plus_dm += plus_dm;
            self.minus_dm += minus_dm;
            let (plus, minus, dx) = self.directional();
            self.adx = dx;
            out[0].push(self.adx);
            out[1].push(plus);
            out[2].push(minus);
            return;
        }
        self.tr = self.tr - self.tr / n + tr;
        self.plus_dm = self.plus_dm - self.plus_dm / n + plus_dm;
        self.minus_dm = self.minus_dm - self.minus_dm / n + minus_dm;
        let (plus, minus, dx) = self.directional();
        self.adx = (self.adx * (n - 1.0) + dx) / n;
        out[0].push(self.adx);
        out[1].push(plus);
        out[2].push(minus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{test_support, IndicatorState};

    fn bar(i: i64, high: f64, low: f64) -> Candle {
        Candle::new(i, low, high, low, (high + low) / 2.0)
    }

    #[test]
    fn steady_uptrend_is_all_plus_di() {
        let data: Vec<Candle> = (0..10)
            .map(|i| bar(i, 10.0 + i as f64, 9.0 + i as f64))
            .collect();
        let mut state = IndicatorState::new(Adx::new(3));
        state.extend(&data, 9);
        assert!((state.value(0, 2) - 0.0).abs() < f64::EPSILON);
        assert!(state.value(1, 3) > 0.0);
        assert!((state.value(2, 3) - 0.0).abs() < f64::EPSILON);
        assert!((state.value(0, 9) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn flat_market_reads_zero() {
        let data: Vec<Candle> = (0..6).map(|i| bar(i, 5.0, 5.0)).collect();
        let mut state = IndicatorState::new(Adx::new(2));
        state.extend(&data, 5);
        assert!(state.line(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn incremental_equivalence() {
        test_support::assert_incremental(|| IndicatorState::new(Adx::new(14)), 60);
    }
}

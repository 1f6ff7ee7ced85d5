//! Ichimoku Kinko Hyo.
//!
//! Lines are stored undisplaced: 0 tenkan, 1 kijun, 2 span A, 3 span B,
//! 4 chikou (close). [`ichimoku_value`] applies the `kijun` displacement
//! when reading a `MODE_*` line.

use crate::domain::indicator::{high_low, IncrementalIndicator, IndicatorState};
use crate::domain::ohlcv::Candle;

#[derive(Clone)]
pub struct Ichimoku {
    tenkan: usize,
    kijun: usize,
    senkou_b: usize,
}

impl Ichimoku {
    pub fn new(tenkan: usize, kijun: usize, senkou_b: usize) -> Self {
        Ichimoku {
            tenkan: tenkan.max(1),
            kijun: kijun.max(1),
            senkou_b: senkou_b.max(1),
        }
    }
}

fn midpoint(candles: &[Candle], index: usize, window: usize) -> f64 {
    if index + 1 < window {
        return 0.0;
    }
    let (high, low) = high_low(candles, index + 1 - window, index);
    (high + low) / 2.0
}

impl IncrementalIndicator for Ichimoku {
    fn outputs(&self) -> usize {
        5
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let tenkan = midpoint(candles, index, self.tenkan);
        let kijun = midpoint(candles, index, self.kijun);
        let span_a = if tenkan != 0.0 && kijun != 0.0 {
            (tenkan + kijun) / 2.0
        } else {
            0.0
        };
        out[0].push(tenkan);
        out[1].push(kijun);
        out[2].push(span_a);
        out[3].push(midpoint(candles, index, self.senkou_b));
        out[4].push(candles[index].close);
    }
}

/// Read `MODE_TENKANSEN` (1) .. `MODE_CHIKOUSPAN` (5) at chronological
/// `index`. The spans are projected `kijun` bars ahead and the chikou line
/// `kijun` bars back, so chikou is 0 for the newest `kijun` bars.
pub fn ichimoku_value(state: &IndicatorState, mode: i64, index: i64, kijun: i64) -> f64 {
    let Some(last) = state.last() else {
        return 0.0;
    };
    match mode {
        1 => state.value(0, index),
        2 => state.value(1, index),
        3 => state.value(2, index - kijun),
        4 => state.value(3, index - kijun),
        5 if index + kijun <= last as i64 => state.value(4, index + kijun),
        _ => 0.0,
    }
}

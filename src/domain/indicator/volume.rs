//! Volume-based indicators: OBV, Accumulation/Distribution, Force Index and
//! the Market Facilitation Index.

use crate::domain::indicator::moving_average::{MaAccumulator, MaMethod};
use crate::domain::indicator::IncrementalIndicator;
use crate::domain::ohlcv::Candle;

/// On-Balance Volume.
///
/// OBV[0] = 0
/// If p[i] > p[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If p[i] < p[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// Otherwise OBV[i] = OBV[i-1]
#[derive(Clone)]
pub struct Obv {
    applied: i64,
    obv: f64,
}

impl Obv {
    pub fn new(applied: i64) -> Self {
        Obv { applied, obv: 0.0 }
    }
}

impl IncrementalIndicator for Obv {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        if index > 0 {
            let price = candles[index].price(self.applied);
            let prev = candles[index - 1].price(self.applied);
            let volume = candles[index].volume_or_zero();
            if price > prev {
                self.obv += volume;
            } else if price < prev {
                self.obv -= volume;
            }
        }
        out[0].push(self.obv);
    }
}

/// Accumulation/Distribution: running sum of close-location value × volume.
#[derive(Clone, Default)]
pub struct AccumulationDistribution {
    ad: f64,
}

impl IncrementalIndicator for AccumulationDistribution {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let c = &candles[index];
        let range = c.high - c.low;
        if range != 0.0 {
            self.ad += ((c.close - c.low) - (c.high - c.close)) / range * c.volume_or_zero();
        }
        out[0].push(self.ad);
    }
}

/// Force Index: moving average of (p - prevP) × volume.
#[derive(Clone)]
pub struct Force {
    applied: i64,
    ma: MaAccumulator,
}

impl Force {
    pub fn new(period: usize, method: MaMethod, applied: i64) -> Self {
        Force {
            applied,
            ma: MaAccumulator::new(period, method),
        }
    }
}

impl IncrementalIndicator for Force {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let price = candles[index].price(self.applied);
        let raw = if index > 0 {
            (price - candles[index - 1].price(self.applied)) * candles[index].volume_or_zero()
        } else {
            0.0
        };
        out[0].push(self.ma.push(raw));
    }
}

/// Market Facilitation Index: (high - low) / volume.
#[derive(Clone)]
pub struct BwMfi;

impl IncrementalIndicator for BwMfi {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let c = &candles[index];
        let volume = c.volume_or_zero();
        out[0].push(if volume == 0.0 {
            0.0
        } else {
            (c.high - c.low) / volume
        });
    }
}

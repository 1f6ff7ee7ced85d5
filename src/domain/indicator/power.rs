//! Bulls Power (high - EMA) and Bears Power (low - EMA). The EMA is seeded
//! with the first price.

use crate::domain::indicator::IncrementalIndicator;
use crate::domain::ohlcv::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bulls,
    Bears,
}

#[derive(Clone)]
pub struct Power {
    side: Side,
    applied: i64,
    alpha: f64,
    ema: f64,
}

impl Power {
    pub fn new(side: Side, period: usize, applied: i64) -> Self {
        Power {
            side,
            applied,
            alpha: 2.0 / (period as f64 + 1.0),
            ema: 0.0,
        }
    }
}

impl IncrementalIndicator for Power {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let c = &candles[index];
        let price = c.price(self.applied);
        self.ema = if index == 0 {
            price
        } else {
            self.ema + self.alpha * (price - self.ema)
        };
        out[0].push(match self.side {
            Side::Bulls => c.high - self.ema,
            Side::Bears => c.low - self.ema,
        });
    }
}

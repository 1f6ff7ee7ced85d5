//! Parabolic SAR.
//!
//! The trend is seeded from the first two candles. The acceleration factor
//! starts at `step`, grows by `step` on each new extreme up to `max`, and
//! resets when price penetrates the SAR and the trend flips. The SAR never
//! moves inside the range of the two previous bars.

use crate::domain::indicator::IncrementalIndicator;
use crate::domain::ohlcv::Candle;

#[derive(Clone)]
pub struct Sar {
    step: f64,
    max: f64,
    trend_up: bool,
    ep: f64,
    af: f64,
    sar: f64,
}

impl Sar {
    pub fn new(step: f64, max: f64) -> Self {
        Sar {
            step,
            max,
            trend_up: true,
            ep: 0.0,
            af: step,
            sar: 0.0,
        }
    }
}

impl IncrementalIndicator for Sar {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        if index == 0 {
            out[0].push(0.0);
            return;
        }
        let cur = &candles[index];
        let prev = &candles[index - 1];
        if index == 1 {
            self.trend_up = cur.close >= prev.close;
            self.ep = if self.trend_up {
                prev.high.max(cur.high)
            } else {
                prev.low.min(cur.low)
            };
            self.sar = if self.trend_up { prev.low } else { prev.high };
            out[0].push(self.sar);
            return;
        }
        let mut sar = if self.trend_up {
            self.sar + self.af * (self.ep - self.sar)
        } else {
            self.sar - self.af * (self.sar - self.ep)
        };
        let prev2 = &candles[index - 2];
        if self.trend_up {
            sar = sar.min(prev.low).min(prev2.low);
            if cur.low < sar {
                self.trend_up = false;
                sar = self.ep;
                self.ep = cur.low;
                self.af = self.step;
            } else if cur.high > self.ep {
                self.ep = cur.high;
                self.af = (self.af + self.step).min(self.max);
            }
        } else {
            sar = sar.max(prev.high).max(prev2.high);
            if cur.high > sar {
                self.trend_up = true;
                sar = self.ep;
                self.ep = cur.high;
                self.af = self.step;
            } else if cur.low < self.ep {
                self.ep = cur.low;
                self.af = (self.af + self.step).min(self.max);
            }
        }
        self.sar = sar;
        out[0].push(sar);
    }
}

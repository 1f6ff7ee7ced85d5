//! Stochastic oscillator.
//!
//! raw %K = (close - lowest) / (highest - lowest) × 100 over `k` bars,
//! using close/close instead of high/low when `price_field` is 1.
//! %K is the mean of raw %K over `slowing` bars, %D the mean of %K over
//! `d` bars. A partial window at the start averages what exists.
//! Lines: 0 main (%K), 1 signal (%D).

use crate::domain::indicator::IncrementalIndicator;
use crate::domain::ohlcv::Candle;

#[derive(Clone)]
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
    slowing: usize,
    close_close: bool,
    raw: Vec<f64>,
}

impl Stochastic {
    pub fn new(k_period: usize, d_period: usize, slowing: usize, price_field: i64) -> Self {
        Stochastic {
            k_period: k_period.max(1),
            d_period: d_period.max(1),
            slowing: slowing.max(1),
            close_close: price_field == 1,
            raw: Vec::new(),
        }
    }
}

fn trailing_mean(values: &[f64], window: usize) -> f64 {
    let start = values.len().saturating_sub(window);
    let tail = &values[start..];
    if tail.is_empty() {
        return 0.0;
    }
    tail.iter().sum::<f64>() / tail.len() as f64
}

impl IncrementalIndicator for Stochastic {
    fn outputs(&self) -> usize {
        2
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let start = (index + 1).saturating_sub(self.k_period);
        let (highest, lowest) = candles[start..=index].iter().fold(
            (f64::NEG_INFINITY, f64::INFINITY),
            |(h, l), c| {
                let (ch, cl) = if self.close_close {
                    (c.close, c.close)
                } else {
                    (c.high, c.low)
                };
                (h.max(ch), l.min(cl))
            },
        );
        let close = candles[index].close;
        let raw = if highest == lowest {
            0.0
        } else {
            (close - lowest) / (highest - lowest) * 100.0
        };
        self.raw.push(raw);
        let k = trailing_mean(&self.raw, self.slowing);
        out[0].push(k);
        let d = trailing_mean(&out[0], self.d_period);
        out[1].push(d);
    }
}

//! MACD: EMA(fast) - EMA(slow), a signal EMA of that line and the
//! histogram between them.
//!
//! Both price EMAs are seeded with the first price, the signal EMA with 0.
//! Lines: 0 main, 1 signal, 2 histogram (`iOsMA`).

use crate::domain::indicator::IncrementalIndicator;
use crate::domain::ohlcv::Candle;

#[derive(Clone)]
pub struct Macd {
    applied: i64,
    k_fast: f64,
    k_slow: f64,
    k_signal: f64,
    ema_fast: f64,
    ema_slow: f64,
    signal: f64,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, applied: i64) -> Self {
        Macd {
            applied,
            k_fast: 2.0 / (fast as f64 + 1.0),
            k_slow: 2.0 / (slow as f64 + 1.0),
            k_signal: 2.0 / (signal as f64 + 1.0),
            ema_fast: 0.0,
            ema_slow: 0.0,
            signal: 0.0,
        }
    }
}

impl IncrementalIndicator for Macd {
    fn outputs(&self) -> usize {
        3
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let price = candles[index].price(self.applied);
        if index == 0 {
            self.ema_fast = price;
            self.ema_slow = price;
            self.signal = 0.0;
            out.iter_mut().for_each(|line| line.push(0.0));
            return;
        }
        self.ema_fast = self.k_fast * price + (1.0 - self.k_fast) * self.ema_fast;
        self.ema_slow = self.k_slow * price + (1.0 - self.k_slow) * self.ema_slow;
        let macd = self.ema_fast - self.ema_slow;
        self.signal = self.k_signal * macd + (1.0 - self.k_signal) * self.signal;
        out[0].push(macd);
        out[1].push(self.signal);
        out[2].push(macd - self.signal);
    }
}

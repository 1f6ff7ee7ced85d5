//! Window oscillators: CCI, Momentum, Williams %R, DeMarker, RVI and MFI.

use std::collections::VecDeque;

use crate::domain::indicator::{high_low, IncrementalIndicator};
use crate::domain::ohlcv::Candle;

/// Push onto a bounded window, returning the evicted value.
fn roll(window: &mut VecDeque<f64>, value: f64, cap: usize) -> Option<f64> {
    window.push_back(value);
    if window.len() > cap {
        window.pop_front()
    } else {
        None
    }
}

/// CCI = (p - mean) / (0.015 × mean deviation) over `period` prices.
#[derive(Clone)]
pub struct Cci {
    period: usize,
    applied: i64,
    window: VecDeque<f64>,
    sum: f64,
}

impl Cci {
    pub fn new(period: usize, applied: i64) -> Self {
        Cci {
            period: period.max(1),
            applied,
            window: VecDeque::new(),
            sum: 0.0,
        }
    }
}

/// CCI of the last value in `window`.
pub fn cci_of(window: &[f64]) -> f64 {
    let Some(last) = window.last() else {
        return 0.0;
    };
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let md = window.iter().map(|p| (p - mean).abs()).sum::<f64>() / n;
    if md == 0.0 {
        0.0
    } else {
        (last - mean) / (0.015 * md)
    }
}

impl IncrementalIndicator for Cci {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let price = candles[index].price(self.applied);
        self.sum += price;
        if let Some(old) = roll(&mut self.window, price, self.period) {
            self.sum -= old;
        }
        if self.window.len() < self.period {
            out[0].push(0.0);
            return;
        }
        let mean = self.sum / self.period as f64;
        let md = self.window.iter().map(|p| (p - mean).abs()).sum::<f64>() / self.period as f64;
        out[0].push(if md == 0.0 {
            0.0
        } else {
            (price - mean) / (0.015 * md)
        });
    }
}

/// Momentum as a difference: p - p[period].
#[derive(Clone)]
pub struct Momentum {
    period: usize,
    applied: i64,
}

impl Momentum {
    pub fn new(period: usize, applied: i64) -> Self {
        Momentum { period, applied }
    }
}

impl IncrementalIndicator for Momentum {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let value = if index >= self.period {
            candles[index].price(self.applied) - candles[index - self.period].price(self.applied)
        } else {
            0.0
        };
        out[0].push(value);
    }
}

/// Williams %R = -100 × (highest - close) / (highest - lowest).
#[derive(Clone)]
pub struct Wpr {
    period: usize,
}

impl Wpr {
    pub fn new(period: usize) -> Self {
        Wpr {
            period: period.max(1),
        }
    }
}

impl IncrementalIndicator for Wpr {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        if index + 1 < self.period {
            out[0].push(0.0);
            return;
        }
        let (highest, lowest) = high_low(candles, index + 1 - self.period, index);
        let close = candles[index].close;
        out[0].push(if highest == lowest {
            0.0
        } else {
            (highest - close) / (highest - lowest) * -100.0
        });
    }
}

/// DeMarker = sumMax / (sumMax + sumMin) × 100 over rolling DeMax/DeMin.
#[derive(Clone)]
pub struct DeMarker {
    period: usize,
    maxes: VecDeque<f64>,
    mins: VecDeque<f64>,
    sum_max: f64,
    sum_min: f64,
}

impl DeMarker {
    pub fn new(period: usize) -> Self {
        DeMarker {
            period: period.max(1),
            maxes: VecDeque::new(),
            mins: VecDeque::new(),
            sum_max: 0.0,
            sum_min: 0.0,
        }
    }
}

impl IncrementalIndicator for DeMarker {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let (de_max, de_min) = if index > 0 {
            let (cur, prev) = (&candles[index], &candles[index - 1]);
            ((cur.high - prev.high).max(0.0), (prev.low - cur.low).max(0.0))
        } else {
            (0.0, 0.0)
        };
        self.sum_max += de_max;
        self.sum_min += de_min;
        if let Some(old) = roll(&mut self.maxes, de_max, self.period) {
            self.sum_max -= old;
        }
        if let Some(old) = roll(&mut self.mins, de_min, self.period) {
            self.sum_min -= old;
        }
        let denom = self.sum_max + self.sum_min;
        out[0].push(if denom == 0.0 {
            0.0
        } else {
            self.sum_max / denom * 100.0
        });
    }
}

/// Relative Vigor Index. Numerator and denominator use the 1-2-2-1
/// weighting of the last four bars; the signal line applies the same
/// weighting to the RVI line. Lines: 0 main, 1 signal.
#[derive(Clone)]
pub struct Rvi {
    period: usize,
    nums: VecDeque<f64>,
    dens: VecDeque<f64>,
    num_sum: f64,
    den_sum: f64,
    ready: usize,
}

impl Rvi {
    pub fn new(period: usize) -> Self {
        Rvi {
            period: period.max(1),
            nums: VecDeque::new(),
            dens: VecDeque::new(),
            num_sum: 0.0,
            den_sum: 0.0,
            ready: 0,
        }
    }
}

fn weighted4(values: [f64; 4]) -> f64 {
    (values[0] + 2.0 * values[1] + 2.0 * values[2] + values[3]) / 6.0
}

impl IncrementalIndicator for Rvi {
    fn outputs(&self) -> usize {
        2
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        if index < 3 {
            out.iter_mut().for_each(|line| line.push(0.0));
            return;
        }
        let bars = [
            &candles[index],
            &candles[index - 1],
            &candles[index - 2],
            &candles[index - 3],
        ];
        let num = weighted4(bars.map(|c| c.close - c.open));
        let den = weighted4(bars.map(|c| c.high - c.low));
        self.num_sum += num;
        self.den_sum += den;
        if let Some(old) = roll(&mut self.nums, num, self.period) {
            self.num_sum -= old;
        }
        if let Some(old) = roll(&mut self.dens, den, self.period) {
            self.den_sum -= old;
        }
        if self.nums.len() < self.period {
            out.iter_mut().for_each(|line| line.push(0.0));
            return;
        }
        let rvi = if self.den_sum == 0.0 {
            0.0
        } else {
            self.num_sum / self.den_sum
        };
        out[0].push(rvi);
        self.ready += 1;
        let signal = if self.ready >= 4 {
            let r = &out[0];
            let n = r.len();
            weighted4([r[n - 1], r[n - 2], r[n - 3], r[n - 4]])
        } else {
            0.0
        };
        out[1].push(signal);
    }
}

/// Money Flow Index over rolling positive and negative typical-price flow.
#[derive(Clone)]
pub struct Mfi {
    period: usize,
    pos: VecDeque<f64>,
    neg: VecDeque<f64>,
    sum_pos: f64,
    sum_neg: f64,
}

impl Mfi {
    pub fn new(period: usize) -> Self {
        Mfi {
            period: period.max(1),
            pos: VecDeque::new(),
            neg: VecDeque::new(),
            sum_pos: 0.0,
            sum_neg: 0.0,
        }
    }
}

impl IncrementalIndicator for Mfi {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let cur = &candles[index];
        let tp = cur.typical_price();
        let (pos, neg) = if index > 0 {
            let prev_tp = candles[index - 1].typical_price();
            let flow = tp * cur.volume_or_zero();
            (
                if tp > prev_tp { flow } else { 0.0 },
                if tp < prev_tp { flow } else { 0.0 },
            )
        } else {
            (0.0, 0.0)
        };
        self.sum_pos += pos;
        self.sum_neg += neg;
        if let Some(old) = roll(&mut self.pos, pos, self.period) {
            self.sum_pos -= old;
        }
        if let Some(old) = roll(&mut self.neg, neg, self.period) {
            self.sum_neg -= old;
        }
        if index < self.period {
            out[0].push(0.0);
            return;
        }
        out[0].push(if self.sum_neg == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + self.sum_pos / self.sum_neg)
        });
    }
}

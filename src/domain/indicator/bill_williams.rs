//! Bill Williams indicators: Awesome Oscillator, Accelerator Oscillator,
//! Alligator (and Gator, read from the Alligator lines) and Fractals.

use crate::domain::indicator::moving_average::{MaAccumulator, MaMethod};
use crate::domain::indicator::{IncrementalIndicator, IndicatorState};
use crate::domain::ohlcv::Candle;

/// AO = SMA5(median) - SMA34(median).
#[derive(Clone)]
pub struct Ao {
    fast: MaAccumulator,
    slow: MaAccumulator,
}

impl Default for Ao {
    fn default() -> Self {
        Ao {
            fast: MaAccumulator::new(5, MaMethod::Sma),
            slow: MaAccumulator::new(34, MaMethod::Sma),
        }
    }
}

impl Ao {
    fn push(&mut self, candle: &Candle) -> f64 {
        let median = candle.median_price();
        self.fast.push(median) - self.slow.push(median)
    }
}

impl IncrementalIndicator for Ao {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        out[0].push(self.push(&candles[index]));
    }
}

/// AC = AO - SMA5(AO).
#[derive(Clone)]
pub struct Ac {
    ao: Ao,
    ma: MaAccumulator,
}

impl Default for Ac {
    fn default() -> Self {
        Ac {
            ao: Ao::default(),
            ma: MaAccumulator::new(5, MaMethod::Sma),
        }
    }
}

impl IncrementalIndicator for Ac {
    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let ao = self.ao.push(&candles[index]);
        let ma = self.ma.push(ao);
        out[0].push(ao - ma);
    }
}

/// Periods and displacements of the three Alligator lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlligatorParams {
    pub jaw_period: usize,
    pub jaw_shift: i64,
    pub teeth_period: usize,
    pub teeth_shift: i64,
    pub lips_period: usize,
    pub lips_shift: i64,
}

/// Alligator lines, stored undisplaced: 0 jaw, 1 teeth, 2 lips.
#[derive(Clone)]
pub struct Alligator {
    applied: i64,
    jaw: MaAccumulator,
    teeth: MaAccumulator,
    lips: MaAccumulator,
}

impl Alligator {
    pub fn new(params: &AlligatorParams, method: MaMethod, applied: i64) -> Self {
        Alligator {
            applied,
            jaw: MaAccumulator::new(params.jaw_period, method),
            teeth: MaAccumulator::new(params.teeth_period, method),
            lips: MaAccumulator::new(params.lips_period, method),
        }
    }
}

impl IncrementalIndicator for Alligator {
    fn outputs(&self) -> usize {
        3
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        let price = candles[index].price(self.applied);
        out[0].push(self.jaw.push(price));
        out[1].push(self.teeth.push(price));
        out[2].push(self.lips.push(price));
    }
}

/// `MODE_GATORJAW` (1), `MODE_GATORTEETH` (2) or `MODE_GATORLIPS` (3) at
/// chronological `index`, each line displaced by its own shift.
pub fn alligator_value(
    state: &IndicatorState,
    params: &AlligatorParams,
    mode: i64,
    index: i64,
) -> f64 {
    match mode {
        1 => state.value(0, index - params.jaw_shift),
        2 => state.value(1, index - params.teeth_shift),
        3 => state.value(2, index - params.lips_shift),
        _ => 0.0,
    }
}

/// Gator: mode 1 |jaw - teeth|, mode 2 -|teeth - lips|.
pub fn gator_value(state: &IndicatorState, params: &AlligatorParams, mode: i64, index: i64) -> f64 {
    let jaw = alligator_value(state, params, 1, index);
    let teeth = alligator_value(state, params, 2, index);
    let lips = alligator_value(state, params, 3, index);
    match mode {
        1 => (jaw - teeth).abs(),
        2 => -(teeth - lips).abs(),
        _ => 0.0,
    }
}

/// Five-bar fractals. Lines: 0 up, 1 down. A fractal at bar i needs bars
/// i+1 and i+2, so the two newest bars are never confirmed.
#[derive(Clone, Default)]
pub struct Fractals;

impl IncrementalIndicator for Fractals {
    fn outputs(&self) -> usize {
        2
    }

    fn step(&mut self, candles: &[Candle], index: usize, out: &mut [Vec<f64>]) {
        out[0].push(0.0);
        out[1].push(0.0);
        if index < 4 {
            return;
        }
        let center = index - 2;
        let c = &candles[center];
        let neighbours = [index - 4, index - 3, index - 1, index];
        if neighbours.iter().all(|&j| c.high > candles[j].high) {
            out[0][center] = c.high;
        }
        if neighbours.iter().all(|&j| c.low < candles[j].low) {
            out[1][center] = c.low;
        }
    }
}

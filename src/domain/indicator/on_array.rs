//! `*OnArray` indicator variants. These compute directly over a caller
//! supplied series (oldest value first) and are never cached.
//!
//! `total` limits the series to its first `total` values (0 = all); the
//! value is read at `total - 1 - shift`.

use crate::domain::indicator::moving_average::{moving_average_at, MaMethod};
use crate::domain::indicator::oscillators::cci_of;
use crate::domain::indicator::rsi::rsi_value;
use crate::domain::indicator::stddev::stddev_at;

/// Index read for `shift`, or `None` when it falls outside the series.
fn target(values: &[f64], total: i64, shift: i64) -> Option<usize> {
    let total = if total <= 0 || total as usize > values.len() {
        values.len()
    } else {
        total as usize
    };
    let idx = total as i64 - 1 - shift;
    (idx >= 0).then_some(idx as usize)
}

pub fn ma_on_array(
    values: &[f64],
    total: i64,
    period: usize,
    ma_shift: i64,
    method: MaMethod,
    shift: i64,
) -> f64 {
    target(values, total, shift + ma_shift)
        .map(|i| moving_average_at(values, period, method, i))
        .unwrap_or(0.0)
}

pub fn stddev_on_array(values: &[f64], total: i64, period: usize, ma_shift: i64, shift: i64) -> f64 {
    target(values, total, shift + ma_shift)
        .map(|i| stddev_at(values, period, i))
        .unwrap_or(0.0)
}

/// Bands over an array. Modes: 0 main, 1 upper, 2 lower.
pub fn bands_on_array(
    values: &[f64],
    total: i64,
    period: usize,
    deviation: f64,
    bands_shift: i64,
    mode: i64,
    shift: i64,
) -> f64 {
    let Some(i) = target(values, total, shift + bands_shift) else {
        return 0.0;
    };
    if i + 1 < period.max(1) {
        return 0.0;
    }
    let main = moving_average_at(values, period, MaMethod::Sma, i);
    let width = deviation * stddev_at(values, period, i);
    match mode {
        1 => main + width,
        2 => main - width,
        _ => main,
    }
}

/// Envelopes over an array. Modes: 0 main, 1 upper, 2 lower.
#[allow(clippy::too_many_arguments)]
pub fn envelopes_on_array(
    values: &[f64],
    total: i64,
    period: usize,
    method: MaMethod,
    ma_shift: i64,
    deviation: f64,
    mode: i64,
    shift: i64,
) -> f64 {
    let ma = ma_on_array(values, total, period, ma_shift, method, shift);
    match mode {
        1 => ma * (1.0 + deviation / 100.0),
        2 => ma * (1.0 - deviation / 100.0),
        _ => ma,
    }
}

pub fn momentum_on_array(values: &[f64], total: i64, period: usize, shift: i64) -> f64 {
    match target(values, total, shift) {
        Some(i) if i >= period => values[i] - values[i - period],
        _ => 0.0,
    }
}

pub fn cci_on_array(values: &[f64], total: i64, period: usize, shift: i64) -> f64 {
    let period = period.max(1);
    match target(values, total, shift) {
        Some(i) if i + 1 >= period => cci_of(&values[i + 1 - period..=i]),
        _ => 0.0,
    }
}

pub fn rsi_on_array(values: &[f64], total: i64, period: usize, shift: i64) -> f64 {
    let period = period.max(1);
    let Some(i) = target(values, total, shift) else {
        return 0.0;
    };
    if i < period {
        return 0.0;
    }
    let (gains, losses) = (i + 1 - period..=i).fold((0.0, 0.0), |(g, l), j| {
        let diff = values[j] - values[j - 1];
        (g + diff.max(0.0), l + (-diff).max(0.0))
    });
    let n = period as f64;
    rsi_value(gains / n, losses / n)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERIES: [f64; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

    #[test]
    fn ma_reads_from_the_end() {
        assert!((ma_on_array(&SERIES, 0, 3, 0, MaMethod::Sma, 0) - 5.0).abs() < f64::EPSILON);
        assert!((ma_on_array(&SERIES, 0, 3, 0, MaMethod::Sma, 1) - 4.0).abs() < f64::EPSILON);
        assert!((ma_on_array(&SERIES, 0, 3, 1, MaMethod::Sma, 1) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn total_truncates_the_series() {
        assert!((ma_on_array(&SERIES, 4, 2, 0, MaMethod::Sma, 0) - 3.5).abs() < f64::EPSILON);
        assert!((ma_on_array(&SERIES, 99, 2, 0, MaMethod::Sma, 0) - 5.5).abs() < f64::EPSILON);
    }

    #[test]
    fn shift_past_start_is_zero() {
        assert!((ma_on_array(&SERIES, 0, 2, 0, MaMethod::Sma, 6) - 0.0).abs() < f64::EPSILON);
        assert!((momentum_on_array(&SERIES, 0, 10, 0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn momentum_and_rsi() {
        assert!((momentum_on_array(&SERIES, 0, 2, 0) - 2.0).abs() < f64::EPSILON);
        assert!((rsi_on_array(&SERIES, 0, 3, 0) - 100.0).abs() < f64::EPSILON);
        let falling = [5.0, 4.0, 3.0, 2.0];
        assert!((rsi_on_array(&falling, 0, 2, 0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bands_and_envelopes_modes() {
        let flat = [2.0; 5];
        assert!((bands_on_array(&flat, 0, 3, 2.0, 0, 1, 0) - 2.0).abs() < f64::EPSILON);
        assert!((envelopes_on_array(&flat, 0, 3, MaMethod::Sma, 0, 50.0, 1, 0) - 3.0).abs() < f64::EPSILON);
        assert!((envelopes_on_array(&flat, 0, 3, MaMethod::Sma, 0, 50.0, 2, 0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cci_and_stddev() {
        assert!((cci_on_array(&[2.0, 2.0, 2.0], 0, 3, 0) - 0.0).abs() < f64::EPSILON);
        assert!(cci_on_array(&SERIES, 0, 3, 0) > 0.0);
        assert!((stddev_on_array(&[1.0, 3.0], 0, 2, 0, 0) - 1.0).abs() < f64::EPSILON);
    }
}

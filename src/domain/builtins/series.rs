//! Timeseries access by symbol and timeframe. Shifts count back from the
//! newest bar visible at the current time.

use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{arg, array_arg, bool_arg, i64_arg, ok_i64};
use crate::domain::error::MqlError;
use crate::domain::ohlcv::Candle;
use crate::domain::runtime::value::{SeriesKind, Value};
use crate::domain::services::{Services, series_price};

type R = Result<Value, MqlError>;

const SERIES_BARS_COUNT: i64 = 0;
const SERIES_FIRSTDATE: i64 = 1;
const SERIES_LASTBAR_DATE: i64 = 5;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("iOpen", |s, a| price_at(s, a, SeriesKind::Open));
    r.register("iHigh", |s, a| price_at(s, a, SeriesKind::High));
    r.register("iLow", |s, a| price_at(s, a, SeriesKind::Low));
    r.register("iClose", |s, a| price_at(s, a, SeriesKind::Close));
    r.register("iTime", |s, a| price_at(s, a, SeriesKind::Time));
    r.register("iVolume", |s, a| price_at(s, a, SeriesKind::Volume));
    r.register("iBars", |s, a| {
        let n = with_bars(s, a, |bars| bars.len());
        ok_i64(n as i64)
    });
    r.register("iBarShift", bar_shift);
    r.register("iHighest", |s, a| extreme(s, a, true));
    r.register("iLowest", |s, a| extreme(s, a, false));
    r.register("CopyOpen", |s, a| copy_series(s, a, SeriesKind::Open));
    r.register("CopyHigh", |s, a| copy_series(s, a, SeriesKind::High));
    r.register("CopyLow", |s, a| copy_series(s, a, SeriesKind::Low));
    r.register("CopyClose", |s, a| copy_series(s, a, SeriesKind::Close));
    r.register("CopyTime", |s, a| copy_series(s, a, SeriesKind::Time));
    r.register("CopyTickVolume", |s, a| copy_series(s, a, SeriesKind::Volume));
    r.register("SeriesInfoInteger", series_info_integer);
}

/// Run `f` over the visible bars named by the `(symbol, timeframe)` leading
/// arguments.
fn with_bars<T>(services: &mut Services, args: &[Value], f: impl FnOnce(&[Candle]) -> T) -> T {
    let symbol = services.resolve_symbol(&arg(args, 0));
    let timeframe = services.resolve_timeframe(i64_arg(args, 1, 0));
    f(services.visible_candles(&symbol, timeframe))
}

fn at_shift(bars: &[Candle], shift: i64) -> Option<&Candle> {
    let index = bars.len() as i64 - 1 - shift;
    if shift < 0 || index < 0 {
        return None;
    }
    bars.get(index as usize)
}

fn typed(kind: SeriesKind, value: f64) -> Value {
    match kind {
        SeriesKind::Time | SeriesKind::Volume => Value::Int(value as i64),
        _ => Value::Double(value),
    }
}

/// `iClose(symbol, timeframe, shift)` and friends; out of range reads 0.
fn price_at(services: &mut Services, args: &[Value], kind: SeriesKind) -> R {
    let shift = i64_arg(args, 2, 0);
    let value = with_bars(services, args, |bars| {
        at_shift(bars, shift).map_or(0.0, |c| series_price(c, kind))
    });
    Ok(typed(kind, value))
}

/// `iBarShift(symbol, timeframe, time, exact = false)`: shift of the bar
/// containing `time`. With `exact`, a time that is not a bar open is -1.
fn bar_shift(services: &mut Services, args: &[Value]) -> R {
    let time = i64_arg(args, 2, 0);
    let exact = bool_arg(args, 3, false);
    let shift = with_bars(services, args, |bars| {
        let after = bars.partition_point(|c| c.time <= time);
        let Some(index) = after.checked_sub(1) else {
            return -1;
        };
        if exact && bars[index].time != time {
            return -1;
        }
        (bars.len() - 1 - index) as i64
    });
    ok_i64(shift)
}

fn mode_kind(mode: i64) -> SeriesKind {
    match mode {
        0 => SeriesKind::Open,
        1 => SeriesKind::Low,
        2 => SeriesKind::High,
        4 => SeriesKind::Volume,
        5 => SeriesKind::Time,
        _ => SeriesKind::Close,
    }
}

/// `iHighest/iLowest(symbol, timeframe, type, count = WHOLE_ARRAY, start = 0)`:
/// shift of the extreme bar, -1 when the range is empty.
fn extreme(services: &mut Services, args: &[Value], highest: bool) -> R {
    let kind = mode_kind(i64_arg(args, 2, 2));
    let count = i64_arg(args, 3, 0);
    let start = i64_arg(args, 4, 0).max(0);
    let shift = with_bars(services, args, |bars| {
        let available = bars.len() as i64 - start;
        let count = if count <= 0 { available } else { count.min(available) };
        let mut best: Option<(i64, f64)> = None;
        for shift in start..start + count.max(0) {
            let Some(c) = at_shift(bars, shift) else { break };
            let v = series_price(c, kind);
            let better = match best {
                None => true,
                Some((_, b)) if highest => v > b,
                Some((_, b)) => v < b,
            };
            if better {
                best = Some((shift, v));
            }
        }
        best.map_or(-1, |(s, _)| s)
    });
    ok_i64(shift)
}

/// `CopyClose(symbol, timeframe, start_pos, count, array[])`: copy `count`
/// bars ending `start_pos` bars back, oldest first in storage. Returns the
/// number copied, -1 when nothing is available.
fn copy_series(services: &mut Services, args: &[Value], kind: SeriesKind) -> R {
    let start = i64_arg(args, 2, 0).max(0);
    let count = i64_arg(args, 3, 0).max(0);
    let values = with_bars(services, args, |bars| {
        let end = bars.len() as i64 - start;
        let begin = (end - count).max(0);
        if end <= 0 {
            return Vec::new();
        }
        bars[begin as usize..end as usize]
            .iter()
            .map(|c| typed(kind, series_price(c, kind)))
            .collect::<Vec<_>>()
    });
    if values.is_empty() {
        return ok_i64(-1);
    }
    let copied = values.len() as i64;
    if let Some(target) = array_arg(args, 4) {
        target.borrow_mut().items = values;
    }
    ok_i64(copied)
}

fn series_info_integer(services: &mut Services, args: &[Value]) -> R {
    let property = i64_arg(args, 2, -1);
    let value = with_bars(services, args, |bars| match property {
        SERIES_BARS_COUNT => bars.len() as i64,
        SERIES_FIRSTDATE => bars.first().map_or(0, |c| c.time),
        SERIES_LASTBAR_DATE => bars.last().map_or(0, |c| c.time),
        _ => 0,
    });
    ok_i64(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtins::test_support::call;

    // Closes 1.0, 3.0, 2.0, 5.0, 4.0 on one-minute bars; the current bar is 3.
    fn services() -> Services {
        let mut sv = Services::default();
        sv.timeframe = 60;
        let closes = [1.0, 3.0, 2.0, 5.0, 4.0];
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, c)| Candle::new(i as i64 * 60, *c, c + 0.5, c - 0.5, *c).with_volume(10.0))
            .collect();
        sv.market.set_candles("TEST", 60, candles);
        sv.time = 180;
        sv
    }

    fn chart(args: &[Value]) -> Vec<Value> {
        let mut v = vec![Value::Null, Value::Int(0)];
        v.extend_from_slice(args);
        v
    }

    mod access {
        use super::*;

        #[test]
        fn shifts_count_from_current_bar() {
            let mut sv = services();
            assert_eq!(call(&mut sv, "iClose", chart(&[Value::Int(0)])), Value::Double(5.0));
            assert_eq!(call(&mut sv, "iClose", chart(&[Value::Int(3)])), Value::Double(1.0));
            assert_eq!(call(&mut sv, "iClose", chart(&[Value::Int(4)])), Value::Double(0.0));
            assert_eq!(call(&mut sv, "iTime", chart(&[Value::Int(1)])), Value::Int(120));
            assert_eq!(call(&mut sv, "iVolume", chart(&[Value::Int(0)])), Value::Int(10));
            assert_eq!(call(&mut sv, "iBars", chart(&[])), Value::Int(4));
        }

        #[test]
        fn higher_timeframe_is_resampled() {
            let mut sv = services();
            // M2 bars: [0,60] and [120,180].
            let args = vec![Value::Null, Value::Int(2), Value::Int(0)];
            assert_eq!(call(&mut sv, "iClose", args), Value::Double(5.0));
            let args = vec![Value::Null, Value::Int(2), Value::Int(1)];
            assert_eq!(call(&mut sv, "iHigh", args), Value::Double(3.5));
        }

        #[test]
        fn bar_shift_by_time() {
            let mut sv = services();
            assert_eq!(call(&mut sv, "iBarShift", chart(&[Value::Int(130)])), Value::Int(1));
            assert_eq!(
                call(&mut sv, "iBarShift", chart(&[Value::Int(130), Value::Bool(true)])),
                Value::Int(-1)
            );
            assert_eq!(call(&mut sv, "iBarShift", chart(&[Value::Int(0)])), Value::Int(3));
            assert_eq!(call(&mut sv, "iBarShift", chart(&[Value::Int(-5)])), Value::Int(-1));
        }
    }

    mod ranges {
        use super::*;

        #[test]
        fn highest_and_lowest() {
            let mut sv = services();
            // MODE_CLOSE = 3
            assert_eq!(call(&mut sv, "iHighest", chart(&[Value::Int(3)])), Value::Int(0));
            assert_eq!(call(&mut sv, "iLowest", chart(&[Value::Int(3)])), Value::Int(3));
            assert_eq!(
                call(&mut sv, "iHighest", chart(&[Value::Int(3), Value::Int(2), Value::Int(1)])),
                Value::Int(2)
            );
            assert_eq!(
                call(&mut sv, "iLowest", chart(&[Value::Int(3), Value::Int(5), Value::Int(9)])),
                Value::Int(-1)
            );
        }

        #[test]
        fn copy_fills_oldest_first() {
            let mut sv = services();
            let out = Value::array(vec![]);
            let n = call(
                &mut sv,
                "CopyClose",
                chart(&[Value::Int(1), Value::Int(2), out.clone()]),
            );
            assert_eq!(n, Value::Int(2));
            assert_eq!(out.as_array().unwrap().borrow().logical_f64(), vec![3.0, 2.0]);
        }

        #[test]
        fn series_info() {
            let mut sv = services();
            assert_eq!(
                call(&mut sv, "SeriesInfoInteger", chart(&[Value::Int(SERIES_BARS_COUNT)])),
                Value::Int(4)
            );
            assert_eq!(
                call(&mut sv, "SeriesInfoInteger", chart(&[Value::Int(SERIES_LASTBAR_DATE)])),
                Value::Int(180)
            );
        }
    }
}

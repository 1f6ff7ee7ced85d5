//! Technical indicator builtins. Each call resolves its candle series,
//! folds any new bars into the cached state for its parameter key and
//! reads one value `shift` bars back from the current bar.

use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{arg, f64_arg, i64_arg, ok_f64, series_arg, usize_arg};
use crate::domain::error::MqlError;
use crate::domain::indicator::adx::Adx;
use crate::domain::indicator::atr::Atr;
use crate::domain::indicator::bands::{Bands, Envelopes};
use crate::domain::indicator::bill_williams::{
    Ac, Alligator, AlligatorParams, Ao, Fractals, alligator_value, gator_value,
};
use crate::domain::indicator::ichimoku::{Ichimoku, ichimoku_value};
use crate::domain::indicator::macd::Macd;
use crate::domain::indicator::moving_average::MovingAverage;
use crate::domain::indicator::on_array;
use crate::domain::indicator::oscillators::{Cci, DeMarker, Mfi, Momentum, Rvi, Wpr};
use crate::domain::indicator::power::{Power, Side};
use crate::domain::indicator::rsi::Rsi;
use crate::domain::indicator::sar::Sar;
use crate::domain::indicator::stddev::StdDev;
use crate::domain::indicator::stochastic::Stochastic;
use crate::domain::indicator::volume::{AccumulationDistribution, BwMfi, Force, Obv};
use crate::domain::indicator::{IndicatorKey, IndicatorState, MaMethod};
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("iMA", i_ma);
    r.register("iMACD", i_macd);
    r.register("iOsMA", i_osma);
    r.register("iRSI", i_rsi);
    r.register("iATR", i_atr);
    r.register("iStdDev", i_stddev);
    r.register("iBands", i_bands);
    r.register("iEnvelopes", i_envelopes);
    r.register("iStochastic", i_stochastic);
    r.register("iIchimoku", i_ichimoku);
    r.register("iADX", i_adx);
    r.register("iSAR", i_sar);
    r.register("iCCI", i_cci);
    r.register("iMomentum", i_momentum);
    r.register("iWPR", i_wpr);
    r.register("iDeMarker", i_demarker);
    r.register("iForce", i_force);
    r.register("iOBV", i_obv);
    r.register("iAD", |s, a| {
        let query = Query::new("iAD", vec![], i64_arg(a, 2, 0));
        ok_f64(evaluate(s, a, query, || IndicatorState::new(AccumulationDistribution::default()), line(0)))
    });
    r.register("iAO", |s, a| {
        let query = Query::new("iAO", vec![], i64_arg(a, 2, 0));
        ok_f64(evaluate(s, a, query, || IndicatorState::new(Ao::default()), line(0)))
    });
    r.register("iAC", |s, a| {
        let query = Query::new("iAC", vec![], i64_arg(a, 2, 0));
        ok_f64(evaluate(s, a, query, || IndicatorState::new(Ac::default()), line(0)))
    });
    r.register("iBWMFI", |s, a| {
        let query = Query::new("iBWMFI", vec![], i64_arg(a, 2, 0));
        ok_f64(evaluate(s, a, query, || IndicatorState::new(BwMfi), line(0)))
    });
    r.register("iBullsPower", |s, a| i_power(s, a, Side::Bulls));
    r.register("iBearsPower", |s, a| i_power(s, a, Side::Bears));
    r.register("iMFI", i_mfi);
    r.register("iRVI", i_rvi);
    r.register("iFractals", i_fractals);
    r.register("iAlligator", |s, a| i_alligator(s, a, false));
    r.register("iGator", |s, a| i_alligator(s, a, true));

    r.register("iMAOnArray", |s, a| {
        let Some(values) = series_arg(s, a, 0) else { return ok_f64(0.0) };
        ok_f64(on_array::ma_on_array(
            &values,
            i64_arg(a, 1, 0),
            period(a, 2),
            i64_arg(a, 3, 0),
            MaMethod::from_code(i64_arg(a, 4, 0)),
            i64_arg(a, 5, 0),
        ))
    });
    r.register("iStdDevOnArray", |s, a| {
        let Some(values) = series_arg(s, a, 0) else { return ok_f64(0.0) };
        ok_f64(on_array::stddev_on_array(
            &values,
            i64_arg(a, 1, 0),
            period(a, 2),
            i64_arg(a, 3, 0),
            i64_arg(a, 5, 0),
        ))
    });
    r.register("iBandsOnArray", |s, a| {
        let Some(values) = series_arg(s, a, 0) else { return ok_f64(0.0) };
        ok_f64(on_array::bands_on_array(
            &values,
            i64_arg(a, 1, 0),
            period(a, 2),
            f64_arg(a, 3, 2.0),
            i64_arg(a, 4, 0),
            i64_arg(a, 5, 0),
            i64_arg(a, 6, 0),
        ))
    });
    r.register("iEnvelopesOnArray", |s, a| {
        let Some(values) = series_arg(s, a, 0) else { return ok_f64(0.0) };
        ok_f64(on_array::envelopes_on_array(
            &values,
            i64_arg(a, 1, 0),
            period(a, 2),
            MaMethod::from_code(i64_arg(a, 4, 0)),
            i64_arg(a, 3, 0),
            f64_arg(a, 5, 0.0),
            i64_arg(a, 6, 0),
            i64_arg(a, 7, 0),
        ))
    });
    r.register("iMomentumOnArray", |s, a| {
        let Some(values) = series_arg(s, a, 0) else { return ok_f64(0.0) };
        ok_f64(on_array::momentum_on_array(&values, i64_arg(a, 1, 0), period(a, 2), i64_arg(a, 3, 0)))
    });
    r.register("iCCIOnArray", |s, a| {
        let Some(values) = series_arg(s, a, 0) else { return ok_f64(0.0) };
        ok_f64(on_array::cci_on_array(&values, i64_arg(a, 1, 0), period(a, 2), i64_arg(a, 3, 0)))
    });
    r.register("iRSIOnArray", |s, a| {
        let Some(values) = series_arg(s, a, 0) else { return ok_f64(0.0) };
        ok_f64(on_array::rsi_on_array(&values, i64_arg(a, 1, 0), period(a, 2), i64_arg(a, 3, 0)))
    });
}

/// Cache identity and read position of one indicator call. Parameters
/// exclude mode and shift so every line and bar shares one state.
struct Query {
    kind: &'static str,
    params: Vec<f64>,
    shift: i64,
}

impl Query {
    fn new(kind: &'static str, params: Vec<f64>, shift: i64) -> Self {
        Query { kind, params, shift }
    }
}

/// Period argument; 0 and negatives become 1.
fn period(args: &[Value], index: usize) -> usize {
    usize_arg(args, index, 1).max(1)
}

fn line(index: usize) -> impl FnOnce(&IndicatorState, i64) -> f64 {
    move |state, at| state.value(index, at)
}

/// Mode argument as a line index, out-of-range modes read line `fallback`.
fn mode_line(mode: i64, lines: usize, fallback: usize) -> usize {
    usize::try_from(mode).ok().filter(|m| *m < lines).unwrap_or(fallback)
}

/// Fold the visible candles of the `(symbol, timeframe)` leading arguments
/// into the cached state for `query` and read it with `read` at the
/// chronological index `current - shift`.
fn evaluate(
    services: &mut Services,
    args: &[Value],
    query: Query,
    make: impl FnOnce() -> IndicatorState,
    read: impl FnOnce(&IndicatorState, i64) -> f64,
) -> f64 {
    let symbol = services.resolve_symbol(&arg(args, 0));
    let timeframe = services.resolve_timeframe(i64_arg(args, 1, 0));
    let candles = services.market.candles_until(&symbol, timeframe, services.time);
    let Some(current) = candles.len().checked_sub(1) else {
        return 0.0;
    };
    let key = IndicatorKey::new(query.kind, &symbol, timeframe, &query.params);
    let state = services.indicators.get_or_create(key, make);
    state.extend(candles, current);
    read(state, current as i64 - query.shift)
}

/// `iMA(symbol, tf, period, ma_shift, method, applied, shift)`.
fn i_ma(s: &mut Services, a: &[Value]) -> R {
    let (p, method, applied) = (period(a, 2), i64_arg(a, 4, 0), i64_arg(a, 5, 0));
    let query = Query::new("iMA", vec![p as f64, method as f64, applied as f64], i64_arg(a, 6, 0) + i64_arg(a, 3, 0));
    let make = move || IndicatorState::new(MovingAverage::new(p, MaMethod::from_code(method), applied));
    ok_f64(evaluate(s, a, query, make, line(0)))
}

fn macd_query(a: &[Value], shift: i64) -> (Query, impl FnOnce() -> IndicatorState) {
    let (fast, slow, signal, applied) = (period(a, 2), period(a, 3), period(a, 4), i64_arg(a, 5, 0));
    let query = Query::new("iMACD", vec![fast as f64, slow as f64, signal as f64, applied as f64], shift);
    (query, move || IndicatorState::new(Macd::new(fast, slow, signal, applied)))
}

/// `iMACD(symbol, tf, fast, slow, signal, applied, mode, shift)`.
fn i_macd(s: &mut Services, a: &[Value]) -> R {
    let (query, make) = macd_query(a, i64_arg(a, 7, 0));
    let mode = mode_line(i64_arg(a, 6, 0), 3, 0);
    ok_f64(evaluate(s, a, query, make, line(mode)))
}

/// `iOsMA(symbol, tf, fast, slow, signal, applied, shift)`: the MACD
/// histogram, sharing the MACD state.
fn i_osma(s: &mut Services, a: &[Value]) -> R {
    let (query, make) = macd_query(a, i64_arg(a, 6, 0));
    ok_f64(evaluate(s, a, query, make, line(2)))
}

/// `iRSI(symbol, tf, period, applied, shift)`.
fn i_rsi(s: &mut Services, a: &[Value]) -> R {
    let (p, applied) = (period(a, 2), i64_arg(a, 3, 0));
    let query = Query::new("iRSI", vec![p as f64, applied as f64], i64_arg(a, 4, 0));
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(Rsi::new(p, applied)), line(0)))
}

/// `iATR(symbol, tf, period, shift)`.
fn i_atr(s: &mut Services, a: &[Value]) -> R {
    let p = period(a, 2);
    let query = Query::new("iATR", vec![p as f64], i64_arg(a, 3, 0));
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(Atr::new(p)), line(0)))
}

/// `iStdDev(symbol, tf, period, ma_shift, method, applied, shift)`. The
/// deviation is always taken around the simple mean.
fn i_stddev(s: &mut Services, a: &[Value]) -> R {
    let (p, applied) = (period(a, 2), i64_arg(a, 5, 0));
    let query = Query::new("iStdDev", vec![p as f64, applied as f64], i64_arg(a, 6, 0) + i64_arg(a, 3, 0));
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(StdDev::new(p, applied)), line(0)))
}

/// `iBands(symbol, tf, period, deviation, bands_shift, applied, mode, shift)`.
fn i_bands(s: &mut Services, a: &[Value]) -> R {
    let (p, deviation, applied) = (period(a, 2), f64_arg(a, 3, 2.0), i64_arg(a, 5, 0));
    let query = Query::new("iBands", vec![p as f64, deviation, applied as f64], i64_arg(a, 7, 0) + i64_arg(a, 4, 0));
    let mode = mode_line(i64_arg(a, 6, 0), 3, 0);
    let make = move || IndicatorState::new(Bands::new(p, deviation, applied));
    ok_f64(evaluate(s, a, query, make, line(mode)))
}

/// `iEnvelopes(symbol, tf, period, ma_shift, method, applied, deviation, mode, shift)`.
fn i_envelopes(s: &mut Services, a: &[Value]) -> R {
    let (p, method, applied, deviation) = (period(a, 2), i64_arg(a, 4, 0), i64_arg(a, 5, 0), f64_arg(a, 6, 0.0));
    let query = Query::new(
        "iEnvelopes",
        vec![p as f64, method as f64, applied as f64, deviation],
        i64_arg(a, 8, 0) + i64_arg(a, 3, 0),
    );
    let mode = mode_line(i64_arg(a, 7, 0), 3, 0);
    let make = move || IndicatorState::new(Envelopes::new(p, MaMethod::from_code(method), applied, deviation));
    ok_f64(evaluate(s, a, query, make, line(mode)))
}

/// `iStochastic(symbol, tf, k, d, slowing, method, price_field, mode, shift)`.
fn i_stochastic(s: &mut Services, a: &[Value]) -> R {
    let (k, d, slowing, price_field) = (period(a, 2), period(a, 3), period(a, 4), i64_arg(a, 6, 0));
    let query = Query::new(
        "iStochastic",
        vec![k as f64, d as f64, slowing as f64, i64_arg(a, 5, 0) as f64, price_field as f64],
        i64_arg(a, 8, 0),
    );
    let mode = mode_line(i64_arg(a, 7, 0), 2, 0);
    let make = move || IndicatorState::new(Stochastic::new(k, d, slowing, price_field));
    ok_f64(evaluate(s, a, query, make, line(mode)))
}

/// `iIchimoku(symbol, tf, tenkan, kijun, senkou_b, mode, shift)`.
fn i_ichimoku(s: &mut Services, a: &[Value]) -> R {
    let (tenkan, kijun, senkou_b) = (period(a, 2), period(a, 3), period(a, 4));
    let query = Query::new("iIchimoku", vec![tenkan as f64, kijun as f64, senkou_b as f64], i64_arg(a, 6, 0));
    let mode = i64_arg(a, 5, 1);
    let make = move || IndicatorState::new(Ichimoku::new(tenkan, kijun, senkou_b));
    let read = move |state: &IndicatorState, at| ichimoku_value(state, mode, at, kijun as i64);
    ok_f64(evaluate(s, a, query, make, read))
}

/// `iADX(symbol, tf, period, applied, mode, shift)`. ADX is built from
/// highs and lows, so `applied` is ignored.
fn i_adx(s: &mut Services, a: &[Value]) -> R {
    let p = period(a, 2);
    let query = Query::new("iADX", vec![p as f64], i64_arg(a, 5, 0));
    let mode = mode_line(i64_arg(a, 4, 0), 3, 0);
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(Adx::new(p)), line(mode)))
}

/// `iSAR(symbol, tf, step, maximum, shift)`.
fn i_sar(s: &mut Services, a: &[Value]) -> R {
    let (step, max) = (f64_arg(a, 2, 0.02), f64_arg(a, 3, 0.2));
    let query = Query::new("iSAR", vec![step, max], i64_arg(a, 4, 0));
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(Sar::new(step, max)), line(0)))
}

/// `iCCI(symbol, tf, period, applied, shift)`.
fn i_cci(s: &mut Services, a: &[Value]) -> R {
    let (p, applied) = (period(a, 2), i64_arg(a, 3, 0));
    let query = Query::new("iCCI", vec![p as f64, applied as f64], i64_arg(a, 4, 0));
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(Cci::new(p, applied)), line(0)))
}

/// `iMomentum(symbol, tf, period, applied, shift)`.
fn i_momentum(s: &mut Services, a: &[Value]) -> R {
    let (p, applied) = (period(a, 2), i64_arg(a, 3, 0));
    let query = Query::new("iMomentum", vec![p as f64, applied as f64], i64_arg(a, 4, 0));
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(Momentum::new(p, applied)), line(0)))
}

/// `iWPR(symbol, tf, period, shift)`.
fn i_wpr(s: &mut Services, a: &[Value]) -> R {
    let p = period(a, 2);
    let query = Query::new("iWPR", vec![p as f64], i64_arg(a, 3, 0));
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(Wpr::new(p)), line(0)))
}

/// `iDeMarker(symbol, tf, period, shift)`.
fn i_demarker(s: &mut Services, a: &[Value]) -> R {
    let p = period(a, 2);
    let query = Query::new("iDeMarker", vec![p as f64], i64_arg(a, 3, 0));
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(DeMarker::new(p)), line(0)))
}

/// `iForce(symbol, tf, period, method, applied, shift)`.
fn i_force(s: &mut Services, a: &[Value]) -> R {
    let (p, method, applied) = (period(a, 2), i64_arg(a, 3, 0), i64_arg(a, 4, 0));
    let query = Query::new("iForce", vec![p as f64, method as f64, applied as f64], i64_arg(a, 5, 0));
    let make = move || IndicatorState::new(Force::new(p, MaMethod::from_code(method), applied));
    ok_f64(evaluate(s, a, query, make, line(0)))
}

/// `iOBV(symbol, tf, applied, shift)`.
fn i_obv(s: &mut Services, a: &[Value]) -> R {
    let applied = i64_arg(a, 2, 0);
    let query = Query::new("iOBV", vec![applied as f64], i64_arg(a, 3, 0));
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(Obv::new(applied)), line(0)))
}

/// `iBullsPower/iBearsPower(symbol, tf, period, applied, shift)`.
fn i_power(s: &mut Services, a: &[Value], side: Side) -> R {
    let (p, applied) = (period(a, 2), i64_arg(a, 3, 0));
    let kind = match side {
        Side::Bulls => "iBullsPower",
        Side::Bears => "iBearsPower",
    };
    let query = Query::new(kind, vec![p as f64, applied as f64], i64_arg(a, 4, 0));
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(Power::new(side, p, applied)), line(0)))
}

/// `iMFI(symbol, tf, period, shift)`.
fn i_mfi(s: &mut Services, a: &[Value]) -> R {
    let p = period(a, 2);
    let query = Query::new("iMFI", vec![p as f64], i64_arg(a, 3, 0));
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(Mfi::new(p)), line(0)))
}

/// `iRVI(symbol, tf, period, mode, shift)`.
fn i_rvi(s: &mut Services, a: &[Value]) -> R {
    let p = period(a, 2);
    let query = Query::new("iRVI", vec![p as f64], i64_arg(a, 4, 0));
    let mode = mode_line(i64_arg(a, 3, 0), 2, 0);
    ok_f64(evaluate(s, a, query, move || IndicatorState::new(Rvi::new(p)), line(mode)))
}

/// `iFractals(symbol, tf, mode, shift)`: `MODE_UPPER` (1) or `MODE_LOWER` (2).
fn i_fractals(s: &mut Services, a: &[Value]) -> R {
    let query = Query::new("iFractals", vec![], i64_arg(a, 3, 0));
    let mode = i64_arg(a, 2, 1);
    let read = move |state: &IndicatorState, at| match mode {
        1 => state.value(0, at),
        2 => state.value(1, at),
        _ => 0.0,
    };
    ok_f64(evaluate(s, a, query, || IndicatorState::new(Fractals), read))
}

/// `iAlligator/iGator(symbol, tf, jaw, jaw_shift, teeth, teeth_shift, lips,
/// lips_shift, method, applied, mode, shift)`. Both read one Alligator state;
/// the displacements are applied on read.
fn i_alligator(s: &mut Services, a: &[Value], gator: bool) -> R {
    let params = AlligatorParams {
        jaw_period: period(a, 2),
        jaw_shift: i64_arg(a, 3, 0),
        teeth_period: period(a, 4),
        teeth_shift: i64_arg(a, 5, 0),
        lips_period: period(a, 6),
        lips_shift: i64_arg(a, 7, 0),
    };
    let (method, applied) = (i64_arg(a, 8, 2), i64_arg(a, 9, 0));
    let query = Query::new(
        "iAlligator",
        vec![
            params.jaw_period as f64,
            params.teeth_period as f64,
            params.lips_period as f64,
            method as f64,
            applied as f64,
        ],
        i64_arg(a, 11, 0),
    );
    let mode = i64_arg(a, 10, 1);
    let make = move || IndicatorState::new(Alligator::new(&params, MaMethod::from_code(method), applied));
    let read = move |state: &IndicatorState, at| {
        if gator {
            gator_value(state, &params, mode, at)
        } else {
            alligator_value(state, &params, mode, at)
        }
    };
    ok_f64(evaluate(s, a, query, make, read))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtins::test_support::call;
    use crate::domain::indicator::test_support::candles;
    use crate::domain::runtime::value::SeriesKind;

    const BARS: usize = 60;

    fn services(visible: usize) -> Services {
        let mut sv = Services::default();
        sv.timeframe = 60;
        sv.market.set_candles("TEST", 60, candles(BARS));
        sv.time = (visible as i64 - 1) * 60;
        sv
    }

    fn chart(rest: &[Value]) -> Vec<Value> {
        let mut v = vec![Value::Null, Value::Int(0)];
        v.extend_from_slice(rest);
        v
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        chart(&values.iter().map(|v| Value::Int(*v)).collect::<Vec<_>>())
    }

    mod caching {
        use super::*;

        #[test]
        fn coarser_timeframe_sees_only_the_forming_part() {
            use crate::domain::ohlcv::Candle;

            let mut sv = Services::default();
            sv.timeframe = 60;
            let bars = (0..5)
                .map(|i| {
                    let p = 1.0 + i as f64;
                    Candle::new(i * 60, p, p, p, p)
                })
                .collect();
            sv.market.set_candles("TEST", 60, bars);
            let m3_close = vec![Value::Null, Value::Int(3), Value::Int(1), Value::Int(0), Value::Int(0), Value::Int(0), Value::Int(0)];

            sv.time = 60;
            assert_eq!(call(&mut sv, "iMA", m3_close.clone()), Value::Double(2.0));
            sv.time = 120;
            assert_eq!(call(&mut sv, "iMA", m3_close.clone()), Value::Double(3.0));
            sv.time = 180;
            assert_eq!(call(&mut sv, "iMA", m3_close.clone()), Value::Double(4.0));
            let mut previous = m3_close;
            previous[6] = Value::Int(1);
            assert_eq!(call(&mut sv, "iMA", previous), Value::Double(3.0));
            assert_eq!(call(&mut sv, "iClose", vec![Value::Null, Value::Int(3), Value::Int(1)]), Value::Double(3.0));
        }

        #[test]
        fn parameters_select_the_cache_entry() {
            let mut sv = services(BARS);
            let sma3 = call(&mut sv, "iMA", ints(&[3, 0, 0, 0, 0])).to_f64();
            let sma5 = call(&mut sv, "iMA", ints(&[5, 0, 0, 0, 0])).to_f64();
            assert_eq!(sv.indicators.len(), 2);
            assert!((sma3 - sma5).abs() > 1e-9);
            call(&mut sv, "iMA", ints(&[3, 0, 0, 0, 4]));
            assert_eq!(sv.indicators.len(), 2);
        }

        #[test]
        fn histogram_shares_macd_state() {
            let mut sv = services(BARS);
            let main = call(&mut sv, "iMACD", ints(&[12, 26, 9, 0, 0, 0])).to_f64();
            let signal = call(&mut sv, "iMACD", ints(&[12, 26, 9, 0, 1, 0])).to_f64();
            let hist = call(&mut sv, "iOsMA", ints(&[12, 26, 9, 0, 0])).to_f64();
            assert_eq!(sv.indicators.len(), 1);
            assert!((hist - (main - signal)).abs() < 1e-9);
        }

        #[test]
        fn later_bars_extend_the_same_state() {
            let mut stepped = services(10);
            for visible in 10..=BARS {
                stepped.time = (visible as i64 - 1) * 60;
                call(&mut stepped, "iRSI", ints(&[14, 0, 0]));
            }
            let stepped_value = call(&mut stepped, "iRSI", ints(&[14, 0, 3])).to_f64();
            let mut fresh = services(BARS);
            let fresh_value = call(&mut fresh, "iRSI", ints(&[14, 0, 3])).to_f64();
            assert!((stepped_value - fresh_value).abs() < f64::EPSILON);
        }
    }

    mod reading {
        use super::*;

        #[test]
        fn sma_matches_manual_mean() {
            let mut sv = services(BARS);
            let data = candles(BARS);
            let expected = data[BARS - 3..].iter().map(|c| c.close).sum::<f64>() / 3.0;
            let got = call(&mut sv, "iMA", ints(&[3, 0, 0, 0, 0])).to_f64();
            assert!((got - expected).abs() < 1e-9);
            let shifted = call(&mut sv, "iMA", ints(&[3, 1, 0, 0, 0])).to_f64();
            let one_back = call(&mut sv, "iMA", ints(&[3, 0, 0, 0, 1])).to_f64();
            assert!((shifted - one_back).abs() < f64::EPSILON);
        }

        #[test]
        fn bands_bracket_the_mean() {
            let mut sv = services(BARS);
            let main = call(&mut sv, "iBands", ints(&[20, 2, 0, 0, 0, 0])).to_f64();
            let upper = call(&mut sv, "iBands", ints(&[20, 2, 0, 0, 1, 0])).to_f64();
            let lower = call(&mut sv, "iBands", ints(&[20, 2, 0, 0, 2, 0])).to_f64();
            assert!(upper > main && main > lower);
        }

        #[test]
        fn future_and_missing_bars_read_zero() {
            let mut sv = services(5);
            assert_eq!(call(&mut sv, "iATR", ints(&[3, 10])), Value::Double(0.0));
            let other = vec![Value::Str("NONE".into()), Value::Int(0), Value::Int(3), Value::Int(0)];
            assert_eq!(call(&mut sv, "iATR", other), Value::Double(0.0));
            assert_eq!(sv.indicators.len(), 1);
        }

        #[test]
        fn gator_reads_alligator_lines() {
            let mut sv = services(BARS);
            let args = |mode: i64| ints(&[13, 8, 8, 5, 5, 3, 2, 0, mode, 0]);
            let jaw = call(&mut sv, "iAlligator", args(1)).to_f64();
            let teeth = call(&mut sv, "iAlligator", args(2)).to_f64();
            let upper = call(&mut sv, "iGator", args(1)).to_f64();
            assert_eq!(sv.indicators.len(), 1);
            assert!((upper - (jaw - teeth).abs()).abs() < 1e-12);
        }
    }

    mod arrays {
        use super::*;

        #[test]
        fn ma_on_array_reads_newest_last() {
            let mut sv = services(BARS);
            let values = Value::array((1..=5).map(|i| Value::Double(i as f64)).collect());
            let ma = call(
                &mut sv,
                "iMAOnArray",
                vec![values, Value::Int(0), Value::Int(2), Value::Int(0), Value::Int(0), Value::Int(0)],
            );
            assert_eq!(ma, Value::Double(4.5));
        }

        #[test]
        fn momentum_on_predefined_series() {
            let mut sv = services(BARS);
            let closes = sv.series_values(SeriesKind::Close);
            let got = call(
                &mut sv,
                "iMomentumOnArray",
                vec![Value::Series(SeriesKind::Close), Value::Int(0), Value::Int(4), Value::Int(0)],
            )
            .to_f64();
            let n = closes.len();
            assert!((got - (closes[n - 1] - closes[n - 5])).abs() < 1e-12);
        }

        #[test]
        fn non_array_reads_zero() {
            let mut sv = services(BARS);
            let got = call(&mut sv, "iRSIOnArray", vec![Value::Int(3), Value::Int(0), Value::Int(2), Value::Int(0)]);
            assert_eq!(got, Value::Double(0.0));
        }
    }
}

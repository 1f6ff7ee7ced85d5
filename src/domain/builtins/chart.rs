//! Chart and window queries. There is one chart with one window; its
//! properties are stored in the terminal and geometry reads as a fixed
//! view over the visible bars.

use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{arg, i64_arg, ok_bool, ok_f64, ok_i64, ok_str, str_arg, write_ref};
use crate::domain::error::MqlError;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

const CHART_COMMENT: i64 = 20;
const CHART_VISIBLE_BARS: i64 = 100;
const CHART_WINDOWS_TOTAL: i64 = 101;
const CHART_FIRST_VISIBLE_BAR: i64 = 104;
const CHART_WIDTH_IN_BARS: i64 = 105;
const CHART_WIDTH_IN_PIXELS: i64 = 106;
const CHART_HEIGHT_IN_PIXELS: i64 = 107;
const CHART_PRICE_MAX: i64 = 108;
const CHART_PRICE_MIN: i64 = 109;

const WIDTH_IN_BARS: i64 = 100;
const WIDTH_IN_PIXELS: i64 = 800;
const HEIGHT_IN_PIXELS: i64 = 600;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("ChartID", |_, _| ok_i64(0));
    r.register("ChartRedraw", |_, _| ok_bool(true));
    r.register("WindowRedraw", |_, _| ok_bool(true));
    r.register("ChartSymbol", |s, _| ok_str(s.symbol.clone()));
    r.register("ChartPeriod", |s, _| ok_i64(s.period_minutes()));
    r.register("ChartGetInteger", chart_get_integer);
    r.register("ChartGetDouble", chart_get_double);
    r.register("ChartGetString", chart_get_string);
    r.register("ChartSetInteger", |s, a| {
        let (property, value) = set_args(a);
        s.terminal.set_chart_integer(property, value.to_i64());
        ok_bool(true)
    });
    r.register("ChartSetDouble", |s, a| {
        let (property, value) = set_args(a);
        s.terminal.set_chart_double(property, value.to_f64());
        ok_bool(true)
    });
    r.register("ChartSetString", |s, a| {
        let property = i64_arg(a, 1, -1);
        let value = str_arg(a, 2);
        if property == CHART_COMMENT {
            s.terminal.set_comment(value.clone());
        }
        s.terminal.set_chart_string(property, value);
        ok_bool(true)
    });
    r.register("WindowsTotal", |_, _| ok_i64(1));
    r.register("WindowFind", |s, a| {
        let name = str_arg(a, 0);
        ok_i64(if !name.is_empty() && name == s.buffers.short_name { 0 } else { -1 })
    });
    r.register("WindowIsVisible", |_, _| ok_bool(true));
    r.register("WindowHandle", |_, _| ok_i64(0));
    r.register("WindowBarsPerChart", |s, _| ok_i64(integer_property(s, CHART_WIDTH_IN_BARS)));
    r.register("WindowFirstVisibleBar", |s, _| ok_i64(integer_property(s, CHART_FIRST_VISIBLE_BAR)));
    r.register("WindowPriceMax", |s, _| ok_f64(double_property(s, CHART_PRICE_MAX)));
    r.register("WindowPriceMin", |s, _| ok_f64(double_property(s, CHART_PRICE_MIN)));
}

/// Property and value of `ChartSet*(chart_id, prop, [sub_window,] value)`.
fn set_args(args: &[Value]) -> (i64, Value) {
    let value = if args.len() >= 4 { arg(args, 3) } else { arg(args, 2) };
    (i64_arg(args, 1, -1), value)
}

fn visible_bars(services: &mut Services) -> i64 {
    let (symbol, timeframe) = (services.symbol.clone(), services.timeframe);
    (services.visible_candles(&symbol, timeframe).len() as i64).min(WIDTH_IN_BARS)
}

fn integer_property(services: &mut Services, property: i64) -> i64 {
    if let Some(value) = services.terminal.chart_integer(property) {
        return value;
    }
    match property {
        CHART_WIDTH_IN_BARS => WIDTH_IN_BARS,
        CHART_VISIBLE_BARS => visible_bars(services),
        CHART_FIRST_VISIBLE_BAR => (visible_bars(services) - 1).max(0),
        CHART_WINDOWS_TOTAL => 1,
        CHART_WIDTH_IN_PIXELS => WIDTH_IN_PIXELS,
        CHART_HEIGHT_IN_PIXELS => HEIGHT_IN_PIXELS,
        _ => 0,
    }
}

/// Stored value, else the price range of the bars in view.
fn double_property(services: &mut Services, property: i64) -> f64 {
    if let Some(value) = services.terminal.chart_double(property) {
        return value;
    }
    let in_view = visible_bars(services) as usize;
    let (symbol, timeframe) = (services.symbol.clone(), services.timeframe);
    let candles = services.visible_candles(&symbol, timeframe);
    let shown = &candles[candles.len() - in_view..];
    match property {
        CHART_PRICE_MAX => shown.iter().map(|c| c.high).fold(0.0, f64::max),
        CHART_PRICE_MIN if !shown.is_empty() => shown.iter().map(|c| c.low).fold(f64::INFINITY, f64::min),
        _ => 0.0,
    }
}

/// `ChartGetInteger(chart_id, prop, sub_window = 0)`, or with a fourth
/// by-reference argument receiving the value and a `bool` result.
fn chart_get_integer(services: &mut Services, args: &[Value]) -> R {
    let value = integer_property(services, i64_arg(args, 1, -1));
    if args.len() >= 4 {
        write_ref(args, 3, Value::Int(value));
        return ok_bool(true);
    }
    ok_i64(value)
}

fn chart_get_double(services: &mut Services, args: &[Value]) -> R {
    let value = double_property(services, i64_arg(args, 1, -1));
    if args.len() >= 4 {
        write_ref(args, 3, Value::Double(value));
        return ok_bool(true);
    }
    ok_f64(value)
}

/// `ChartGetString(chart_id, prop)` or `ChartGetString(chart_id, prop,
/// &value)`.
fn chart_get_string(services: &mut Services, args: &[Value]) -> R {
    let property = i64_arg(args, 1, -1);
    let value = match services.terminal.chart_string(property) {
        Some(text) => text.to_string(),
        None if property == CHART_COMMENT => services.terminal.comment().to_string(),
        None => String::new(),
    };
    if args.len() >= 3 {
        write_ref(args, 2, Value::Str(value));
        return ok_bool(true);
    }
    ok_str(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtins::test_support::{call, s};
    use crate::domain::ohlcv::Candle;
    use crate::domain::runtime::value::new_cell;

    fn charted(bars: i64) -> Services {
        let mut sv = Services::default();
        sv.timeframe = 60;
        let candles = (0..bars)
            .map(|i| {
                let p = 1.0 + i as f64;
                Candle::new(i * 60, p, p + 0.5, p - 0.5, p)
            })
            .collect();
        sv.market.set_candles("TEST", 60, candles);
        sv.time = (bars - 1) * 60;
        sv
    }

    #[test]
    fn geometry_defaults_follow_visible_bars() {
        let mut sv = charted(5);
        let id = || Value::Int(0);
        assert_eq!(call(&mut sv, "ChartID", vec![]), Value::Int(0));
        assert_eq!(call(&mut sv, "ChartGetInteger", vec![id(), Value::Int(CHART_VISIBLE_BARS)]), Value::Int(5));
        assert_eq!(call(&mut sv, "WindowFirstVisibleBar", vec![]), Value::Int(4));
        assert_eq!(call(&mut sv, "WindowBarsPerChart", vec![]), Value::Int(100));
        assert_eq!(call(&mut sv, "WindowPriceMax", vec![]), Value::Double(5.5));
        assert_eq!(call(&mut sv, "WindowPriceMin", vec![]), Value::Double(0.5));

        sv.time = 60;
        assert_eq!(call(&mut sv, "ChartGetDouble", vec![id(), Value::Int(CHART_PRICE_MAX)]), Value::Double(2.5));
    }

    #[test]
    fn set_values_override_defaults() {
        let mut sv = charted(3);
        let id = || Value::Int(0);
        call(&mut sv, "ChartSetInteger", vec![id(), Value::Int(CHART_FIRST_VISIBLE_BAR), Value::Int(40)]);
        call(&mut sv, "ChartSetDouble", vec![id(), Value::Int(CHART_PRICE_MAX), Value::Double(9.0)]);
        assert_eq!(call(&mut sv, "WindowFirstVisibleBar", vec![]), Value::Int(40));
        assert_eq!(call(&mut sv, "WindowPriceMax", vec![]), Value::Double(9.0));

        let out = new_cell(Value::Int(0));
        let by_ref = vec![id(), Value::Int(CHART_FIRST_VISIBLE_BAR), Value::Int(0), Value::Ref(out.clone())];
        assert_eq!(call(&mut sv, "ChartGetInteger", by_ref), Value::Bool(true));
        assert_eq!(*out.borrow(), Value::Int(40));
    }

    #[test]
    fn comment_property_is_the_terminal_comment() {
        let mut sv = Services::default();
        call(&mut sv, "ChartSetString", vec![Value::Int(0), Value::Int(CHART_COMMENT), s("hello")]);
        assert_eq!(sv.terminal.comment(), "hello");
        assert_eq!(call(&mut sv, "ChartGetString", vec![Value::Int(0), Value::Int(CHART_COMMENT)]), s("hello"));
    }

    #[test]
    fn window_find_matches_short_name() {
        let mut sv = Services::default();
        sv.buffers.short_name = "Bands(20)".into();
        assert_eq!(call(&mut sv, "WindowFind", vec![s("Bands(20)")]), Value::Int(0));
        assert_eq!(call(&mut sv, "WindowFind", vec![s("Other")]), Value::Int(-1));
        assert_eq!(call(&mut sv, "WindowsTotal", vec![]), Value::Int(1));
    }
}

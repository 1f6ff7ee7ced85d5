//! Custom indicator support: output buffer registration and drawing
//! properties for the running program, and `iCustom` evaluation of other
//! indicator programs.

use tracing::debug;

use crate::domain::backtest::BacktestRunner;
use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{arg, array_arg, f64_arg, i64_arg, ok_bool, ok_i64, str_arg, usize_arg};
use crate::domain::error::MqlError;
use crate::domain::indicator::IndicatorKey;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

const INDICATOR_DIGITS: i64 = 0;
const INDICATOR_SHORTNAME: i64 = 0;
const INDICATOR_LEVELVALUE: i64 = 1;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("IndicatorBuffers", |s, a| {
        s.buffers.reserve(usize_arg(a, 0, 0));
        ok_bool(true)
    });
    r.register("SetIndexBuffer", set_index_buffer);
    r.register("SetIndexLabel", |s, a| {
        s.buffers.labels.insert(usize_arg(a, 0, 0), str_arg(a, 1));
        Ok(Value::Void)
    });
    r.register("SetIndexShift", |s, a| {
        s.buffers.shifts.insert(usize_arg(a, 0, 0), i64_arg(a, 1, 0));
        Ok(Value::Void)
    });
    r.register("SetIndexDrawBegin", |s, a| {
        s.buffers.draw_begin.insert(usize_arg(a, 0, 0), i64_arg(a, 1, 0));
        Ok(Value::Void)
    });
    r.register("SetIndexStyle", |s, a| {
        let style = (i64_arg(a, 1, 0), i64_arg(a, 2, -1), i64_arg(a, 3, -1));
        s.buffers.styles.insert(usize_arg(a, 0, 0), style);
        Ok(Value::Void)
    });
    r.register("SetIndexArrow", |s, a| {
        s.buffers.arrows.insert(usize_arg(a, 0, 0), i64_arg(a, 1, 0));
        Ok(Value::Void)
    });
    r.register("SetIndexEmptyValue", |s, a| {
        s.buffers.set_empty_value(usize_arg(a, 0, 0), f64_arg(a, 1, 0.0));
        Ok(Value::Void)
    });
    r.register("IndicatorShortName", |s, a| {
        s.buffers.short_name = str_arg(a, 0);
        Ok(Value::Void)
    });
    r.register("IndicatorDigits", |s, a| {
        s.buffers.digits = Some(i64_arg(a, 0, 0));
        Ok(Value::Void)
    });
    r.register("IndicatorCounted", |s, _| ok_i64(s.buffers.counted));
    r.register("IndicatorSetDouble", indicator_set_double);
    r.register("IndicatorSetInteger", |s, a| {
        let done = i64_arg(a, 0, -1) == INDICATOR_DIGITS;
        if done {
            s.buffers.digits = Some(i64_arg(a, a.len().saturating_sub(1), 0));
        }
        ok_bool(done)
    });
    r.register("IndicatorSetString", |s, a| {
        let done = i64_arg(a, 0, -1) == INDICATOR_SHORTNAME;
        if done {
            s.buffers.short_name = str_arg(a, a.len().saturating_sub(1));
        }
        ok_bool(done)
    });
    r.register("SetLevelValue", |s, a| {
        s.buffers.levels.insert(usize_arg(a, 0, 0), f64_arg(a, 1, 0.0));
        Ok(Value::Void)
    });
    r.register("SetLevelStyle", |_, _| Ok(Value::Void));
    r.register("HideTestIndicators", |_, _| Ok(Value::Void));
    r.register("iCustom", i_custom);
}

/// `SetIndexBuffer(index, buffer[])`. The array becomes series-indexed and
/// grows by one element per bar.
fn set_index_buffer(services: &mut Services, args: &[Value]) -> R {
    let Some(array) = array_arg(args, 1) else {
        return ok_bool(false);
    };
    ok_bool(services.buffers.bind(usize_arg(args, 0, 0), array))
}

/// `IndicatorSetDouble(INDICATOR_LEVELVALUE, level, value)`.
fn indicator_set_double(services: &mut Services, args: &[Value]) -> R {
    if i64_arg(args, 0, -1) != INDICATOR_LEVELVALUE {
        return ok_bool(false);
    }
    let (level, value) = match args.len() {
        0..=2 => (0, f64_arg(args, 1, 0.0)),
        _ => (usize_arg(args, 1, 0), f64_arg(args, 2, 0.0)),
    };
    services.buffers.levels.insert(level, value);
    ok_bool(true)
}

/// `iCustom(symbol, timeframe, name, inputs..., mode, shift)`.
///
/// Each `(name, inputs)` pair gets its own nested runner, stepped through
/// the caller's visible bars. Names without a registered source read 0.
/// Re-entering an indicator that is still being computed fails.
fn i_custom(services: &mut Services, args: &[Value]) -> R {
    let symbol = services.resolve_symbol(&arg(args, 0));
    let timeframe = services.resolve_timeframe(i64_arg(args, 1, 0));
    let name = str_arg(args, 2);
    let Some(source) = services.custom.sources.get(&name).cloned() else {
        return Ok(Value::Double(0.0));
    };
    let (params, mode, shift) = match args.len() {
        n if n >= 5 => (&args[3..n - 2], i64_arg(args, n - 2, 0), i64_arg(args, n - 1, 0)),
        n => (args.get(3..n).unwrap_or(&[]), 0, 0),
    };
    let visible = services
        .market
        .candles_until(&symbol, timeframe, services.time)
        .len();
    let Some(current) = visible.checked_sub(1) else {
        return Ok(Value::Double(0.0));
    };
    if services.custom.in_progress.borrow().contains(&name) {
        return Err(MqlError::CyclicIndicator { name });
    }

    let key = IndicatorKey {
        kind: format!("iCustom:{}", name),
        symbol: symbol.clone(),
        timeframe,
        params: params
            .iter()
            .map(|p| p.unref().to_string())
            .collect::<Vec<_>>()
            .join(","),
    };
    if !services.custom.runners.contains_key(&key) {
        let runner = BacktestRunner::nested(&source, services, &symbol, timeframe, params)?;
        debug!(indicator = %key, "custom indicator loaded");
        services.custom.runners.insert(key.clone(), runner);
    }

    services.custom.in_progress.borrow_mut().insert(name.clone());
    let advanced = match services.custom.runners.get_mut(&key) {
        Some(runner) => runner.advance_until(current, services.time),
        None => Ok(()),
    };
    services.custom.in_progress.borrow_mut().remove(&name);
    advanced?;

    let value = services
        .custom
        .runners
        .get(&key)
        .zip(usize::try_from(mode).ok())
        .map_or(0.0, |(runner, mode)| runner.buffer_value(mode, shift));
    Ok(Value::Double(value))
}

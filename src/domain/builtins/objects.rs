//! Chart objects (`Object*`). Objects live in the terminal; nothing is
//! drawn.
//!
//! Most functions exist in a name-first form (`ObjectDelete(name)`) and a
//! chart-id-first form (`ObjectDelete(chart_id, name)`). A leading string
//! argument selects the first; otherwise the chart id is dropped.

use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{
    arg, f64_arg, i64_arg, ok_bool, ok_f64, ok_i64, ok_str, str_arg,
};
use crate::domain::error::MqlError;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;
use crate::domain::terminal::{ANY, ChartObject};

type R = Result<Value, MqlError>;

const ERR_OBJECT_ALREADY_EXISTS: i64 = 4200;
const ERR_OBJECT_DOES_NOT_EXIST: i64 = 4202;

const OBJPROP_TIME: i64 = 0;
const OBJPROP_PRICE: i64 = 1;
const OBJPROP_PRICE3: i64 = 5;
const OBJPROP_COLOR: i64 = 6;
const OBJPROP_FONTSIZE: i64 = 100;
const OBJPROP_TEXT: i64 = 999;
const OBJPROP_FONT: i64 = 1001;
const OBJPROP_TYPE: i64 = 1018;
const OBJPROP_NAME: i64 = 1037;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("ObjectCreate", object_create);
    r.register("ObjectDelete", |s, a| {
        let a = named(a);
        ok_bool(s.terminal.delete_object(&str_arg(a, 0)))
    });
    r.register("ObjectFind", |s, a| {
        let a = named(a);
        ok_i64(s.terminal.object(&str_arg(a, 0)).map_or(-1, |o| o.window))
    });
    r.register("ObjectType", |s, a| {
        ok_i64(s.terminal.object(&str_arg(a, 0)).map_or(-1, |o| o.kind))
    });
    r.register("ObjectDescription", |s, a| {
        ok_str(s.terminal.object(&str_arg(a, 0)).map_or("", |o| o.text.as_str()))
    });
    r.register("ObjectsTotal", objects_total);
    r.register("ObjectName", object_name);
    r.register("ObjectsDeleteAll", objects_delete_all);
    r.register("ObjectMove", object_move);
    r.register("ObjectGet", object_get);
    r.register("ObjectSet", object_set);
    r.register("ObjectSetText", object_set_text);
    r.register("ObjectGetInteger", object_get_integer);
    r.register("ObjectGetDouble", object_get_double);
    r.register("ObjectGetString", object_get_string);
    r.register("ObjectSetInteger", object_set_integer);
    r.register("ObjectSetDouble", object_set_double);
    r.register("ObjectSetString", object_set_string);
    r.register("ObjectGetValueByTime", |s, a| {
        let a = named(a);
        let time = i64_arg(a, 1, 0);
        ok_f64(with_object(s, a, |o| o.value_at(time)).unwrap_or(0.0))
    });
    r.register("ObjectGetTimeByValue", |s, a| {
        let a = named(a);
        let price = f64_arg(a, 1, 0.0);
        ok_i64(with_object(s, a, |o| o.time_at(price)).unwrap_or(0))
    });
    r.register("ObjectGetValueByShift", object_value_by_shift);
}

/// Arguments with a leading chart id removed.
fn named(args: &[Value]) -> &[Value] {
    match args.first().map(Value::unref) {
        Some(Value::Str(_)) | None => args,
        Some(_) => &args[1..],
    }
}

/// Apply `read` to the object named by `args[0]`. Missing objects set
/// `ERR_OBJECT_DOES_NOT_EXIST`.
fn with_object<T>(
    services: &mut Services,
    args: &[Value],
    read: impl FnOnce(&ChartObject) -> T,
) -> Option<T> {
    let found = services.terminal.object(&str_arg(args, 0)).map(read);
    if found.is_none() {
        services.last_error = ERR_OBJECT_DOES_NOT_EXIST;
    }
    found
}

fn with_object_mut(
    services: &mut Services,
    args: &[Value],
    write: impl FnOnce(&mut ChartObject) -> bool,
) -> R {
    match services.terminal.object_mut(&str_arg(args, 0)) {
        Some(object) => ok_bool(write(object)),
        None => {
            services.last_error = ERR_OBJECT_DOES_NOT_EXIST;
            ok_bool(false)
        }
    }
}

/// `ObjectCreate([chart_id,] name, type, window, time1, price1, ...)`.
fn object_create(services: &mut Services, args: &[Value]) -> R {
    let a = named(args);
    let mut object = ChartObject::new(&str_arg(a, 0), i64_arg(a, 1, 0), i64_arg(a, 2, 0));
    for (point, slot) in object.points.iter_mut().enumerate() {
        let at = 3 + point * 2;
        *slot = (i64_arg(a, at, 0), f64_arg(a, at + 1, 0.0));
    }
    if !services.terminal.create_object(object) {
        services.last_error = ERR_OBJECT_ALREADY_EXISTS;
        return ok_bool(false);
    }
    ok_bool(true)
}

/// `ObjectsTotal(type = -1)` or `ObjectsTotal(chart_id, window, type)`.
fn objects_total(services: &mut Services, args: &[Value]) -> R {
    let (window, kind) = match args.len() {
        0 => (ANY, ANY),
        1 => (ANY, i64_arg(args, 0, ANY)),
        _ => (i64_arg(args, 1, ANY), i64_arg(args, 2, ANY)),
    };
    ok_i64(services.terminal.objects_total(window, kind) as i64)
}

/// `ObjectName(index)` or `ObjectName(chart_id, index, window, type)`.
fn object_name(services: &mut Services, args: &[Value]) -> R {
    let (index, window, kind) = match args.len() {
        0 | 1 => (i64_arg(args, 0, -1), ANY, ANY),
        _ => (i64_arg(args, 1, -1), i64_arg(args, 2, ANY), i64_arg(args, 3, ANY)),
    };
    let name = usize::try_from(index)
        .ok()
        .and_then(|i| services.terminal.object_name(i, window, kind))
        .unwrap_or("");
    ok_str(name)
}

/// `ObjectsDeleteAll(window, type)`, `ObjectsDeleteAll(chart_id, window,
/// type)` or `ObjectsDeleteAll(chart_id, prefix, window, type)`.
fn objects_delete_all(services: &mut Services, args: &[Value]) -> R {
    let prefixed = matches!(arg(args, 1), Value::Str(_));
    let (prefix, window, kind) = match args.len() {
        _ if prefixed => (str_arg(args, 1), i64_arg(args, 2, ANY), i64_arg(args, 3, ANY)),
        0..=2 => (String::new(), i64_arg(args, 0, ANY), i64_arg(args, 1, ANY)),
        _ => (String::new(), i64_arg(args, 1, ANY), i64_arg(args, 2, ANY)),
    };
    ok_i64(services.terminal.delete_objects(&prefix, window, kind) as i64)
}

/// `ObjectMove([chart_id,] name, point, time, price)`.
fn object_move(services: &mut Services, args: &[Value]) -> R {
    let a = named(args);
    let (point, time, price) = (i64_arg(a, 1, -1), i64_arg(a, 2, 0), f64_arg(a, 3, 0.0));
    with_object_mut(services, a, |o| match usize::try_from(point).ok().and_then(|p| o.points.get_mut(p)) {
        Some(slot) => {
            *slot = (time, price);
            true
        }
        None => false,
    })
}

/// Anchor index and whether `property` is its time, for the
/// `OBJPROP_TIME1`..`OBJPROP_PRICE3` range.
fn anchor(property: i64) -> Option<(usize, bool)> {
    (OBJPROP_TIME..=OBJPROP_PRICE3)
        .contains(&property)
        .then(|| ((property / 2) as usize, property % 2 == 0))
}

/// `ObjectGet(name, property)`: any numeric property as a double.
fn object_get(services: &mut Services, args: &[Value]) -> R {
    let property = i64_arg(args, 1, -1);
    let value = with_object(services, args, |o| match anchor(property) {
        Some((point, true)) => o.points[point].0 as f64,
        Some((point, false)) => o.points[point].1,
        None => o
            .doubles
            .get(&property)
            .copied()
            .or_else(|| o.integers.get(&property).map(|v| *v as f64))
            .unwrap_or(0.0),
    });
    ok_f64(value.unwrap_or(0.0))
}

/// `ObjectSet(name, property, value)`.
fn object_set(services: &mut Services, args: &[Value]) -> R {
    let (property, value) = (i64_arg(args, 1, -1), f64_arg(args, 2, 0.0));
    with_object_mut(services, args, |o| {
        match anchor(property) {
            Some((point, true)) => o.points[point].0 = value as i64,
            Some((point, false)) => o.points[point].1 = value,
            None if property < 0 => return false,
            None => {
                o.integers.insert(property, value as i64);
                o.doubles.insert(property, value);
            }
        }
        true
    })
}

/// `ObjectSetText(name, text, font_size, font, color)`.
fn object_set_text(services: &mut Services, args: &[Value]) -> R {
    let text = str_arg(args, 1);
    let size = i64_arg(args, 2, 0);
    let font = str_arg(args, 3);
    let color = i64_arg(args, 4, -1);
    with_object_mut(services, args, |o| {
        o.text = text;
        if size > 0 {
            o.integers.insert(OBJPROP_FONTSIZE, size);
        }
        if !font.is_empty() {
            o.strings.insert(OBJPROP_FONT, font);
        }
        if color >= 0 {
            o.integers.insert(OBJPROP_COLOR, color);
        }
        true
    })
}

/// Property id, modifier and value of `ObjectSet*(chart_id, name, prop,
/// [modifier,] value)` after the chart id is dropped.
fn set_args(args: &[Value]) -> (i64, usize, Value) {
    let a = named(args);
    let property = i64_arg(a, 1, -1);
    if a.len() >= 4 {
        (property, usize::try_from(i64_arg(a, 2, 0)).unwrap_or(0), arg(a, 3))
    } else {
        (property, 0, arg(a, 2))
    }
}

/// `ObjectGetInteger(chart_id, name, prop, modifier = 0)`.
fn object_get_integer(services: &mut Services, args: &[Value]) -> R {
    let a = named(args);
    let (property, modifier) = (i64_arg(a, 1, -1), usize::try_from(i64_arg(a, 2, 0)).unwrap_or(0));
    let value = with_object(services, a, |o| match property {
        OBJPROP_TIME => o.points.get(modifier).map_or(0, |p| p.0),
        OBJPROP_TYPE => o.kind,
        _ => o.integers.get(&property).copied().unwrap_or(0),
    });
    ok_i64(value.unwrap_or(0))
}

/// `ObjectGetDouble(chart_id, name, prop, modifier = 0)`.
fn object_get_double(services: &mut Services, args: &[Value]) -> R {
    let a = named(args);
    let (property, modifier) = (i64_arg(a, 1, -1), usize::try_from(i64_arg(a, 2, 0)).unwrap_or(0));
    let value = with_object(services, a, |o| match property {
        OBJPROP_PRICE => o.points.get(modifier).map_or(0.0, |p| p.1),
        _ => o.doubles.get(&property).copied().unwrap_or(0.0),
    });
    ok_f64(value.unwrap_or(0.0))
}

/// `ObjectGetString(chart_id, name, prop, modifier = 0)`.
fn object_get_string(services: &mut Services, args: &[Value]) -> R {
    let a = named(args);
    let property = i64_arg(a, 1, -1);
    let value = with_object(services, a, |o| match property {
        OBJPROP_TEXT => o.text.clone(),
        OBJPROP_NAME => o.name.clone(),
        _ => o.strings.get(&property).cloned().unwrap_or_default(),
    });
    ok_str(value.unwrap_or_default())
}

fn object_set_integer(services: &mut Services, args: &[Value]) -> R {
    let (property, modifier, value) = set_args(args);
    let value = value.to_i64();
    with_object_mut(services, named(args), |o| {
        match property {
            OBJPROP_TIME => match o.points.get_mut(modifier) {
                Some(point) => point.0 = value,
                None => return false,
            },
            OBJPROP_TYPE => o.kind = value,
            p if p < 0 => return false,
            p => {
                o.integers.insert(p, value);
            }
        }
        true
    })
}

fn object_set_double(services: &mut Services, args: &[Value]) -> R {
    let (property, modifier, value) = set_args(args);
    let value = value.to_f64();
    with_object_mut(services, named(args), |o| {
        match property {
            OBJPROP_PRICE => match o.points.get_mut(modifier) {
                Some(point) => point.1 = value,
                None => return false,
            },
            p if p < 0 => return false,
            p => {
                o.doubles.insert(p, value);
            }
        }
        true
    })
}

fn object_set_string(services: &mut Services, args: &[Value]) -> R {
    let (property, _, value) = set_args(args);
    let value = value.unref().to_string();
    with_object_mut(services, named(args), |o| {
        match property {
            OBJPROP_TEXT => o.text = value,
            OBJPROP_NAME => o.name = value,
            p if p < 0 => return false,
            p => {
                o.strings.insert(p, value);
            }
        }
        true
    })
}

/// `ObjectGetValueByShift(name, shift)`: the line value at the open time
/// of the chart bar `shift` back.
fn object_value_by_shift(services: &mut Services, args: &[Value]) -> R {
    let Some(bar) = services.chart_candle(i64_arg(args, 1, 0)) else {
        return ok_f64(0.0);
    };
    ok_f64(with_object(services, args, |o| o.value_at(bar.time)).unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtins::test_support::{call, s};

    fn label(sv: &mut Services, name: &str) {
        let created = call(sv, "ObjectCreate", vec![s(name), Value::Int(23), Value::Int(0), Value::Int(0), Value::Double(0.0)]);
        assert_eq!(created, Value::Bool(true));
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn create_find_and_delete_in_both_forms() {
            let mut sv = Services::default();
            label(&mut sv, "info");
            let chart_form = vec![Value::Int(0), s("arrow"), Value::Int(22), Value::Int(1), Value::Int(60), Value::Double(1.25)];
            assert_eq!(call(&mut sv, "ObjectCreate", chart_form), Value::Bool(true));

            assert_eq!(call(&mut sv, "ObjectFind", vec![s("info")]), Value::Int(0));
            assert_eq!(call(&mut sv, "ObjectFind", vec![Value::Int(0), s("arrow")]), Value::Int(1));
            assert_eq!(call(&mut sv, "ObjectFind", vec![s("none")]), Value::Int(-1));
            assert_eq!(call(&mut sv, "ObjectType", vec![s("arrow")]), Value::Int(22));
            assert_eq!(call(&mut sv, "ObjectsTotal", vec![]), Value::Int(2));
            assert_eq!(call(&mut sv, "ObjectsTotal", vec![Value::Int(22)]), Value::Int(1));
            assert_eq!(call(&mut sv, "ObjectsTotal", vec![Value::Int(0), Value::Int(1), Value::Int(-1)]), Value::Int(1));
            assert_eq!(call(&mut sv, "ObjectName", vec![Value::Int(1)]), s("arrow"));
            assert_eq!(call(&mut sv, "ObjectName", vec![Value::Int(0), Value::Int(0), Value::Int(1), Value::Int(-1)]), s("arrow"));

            assert_eq!(call(&mut sv, "ObjectDelete", vec![Value::Int(0), s("arrow")]), Value::Bool(true));
            assert_eq!(call(&mut sv, "ObjectDelete", vec![s("arrow")]), Value::Bool(false));
        }

        #[test]
        fn duplicate_name_sets_last_error() {
            let mut sv = Services::default();
            label(&mut sv, "x");
            let again = call(&mut sv, "ObjectCreate", vec![s("x"), Value::Int(1), Value::Int(0)]);
            assert_eq!(again, Value::Bool(false));
            assert_eq!(sv.last_error, ERR_OBJECT_ALREADY_EXISTS);
        }

        #[test]
        fn delete_all_with_prefix_and_filters() {
            let mut sv = Services::default();
            label(&mut sv, "buy_1");
            label(&mut sv, "buy_2");
            label(&mut sv, "note");
            let by_prefix = vec![Value::Int(0), s("buy_"), Value::Int(-1), Value::Int(-1)];
            assert_eq!(call(&mut sv, "ObjectsDeleteAll", by_prefix), Value::Int(2));
            assert_eq!(call(&mut sv, "ObjectsDeleteAll", vec![Value::Int(0), Value::Int(21)]), Value::Int(0));
            assert_eq!(call(&mut sv, "ObjectsDeleteAll", vec![]), Value::Int(1));
        }
    }

    mod properties {
        use super::*;

        #[test]
        fn legacy_get_set_and_text() {
            let mut sv = Services::default();
            label(&mut sv, "l");
            assert_eq!(call(&mut sv, "ObjectSet", vec![s("l"), Value::Int(102), Value::Int(15)]), Value::Bool(true));
            assert_eq!(call(&mut sv, "ObjectSet", vec![s("l"), Value::Int(OBJPROP_PRICE), Value::Double(1.5)]), Value::Bool(true));
            assert_eq!(call(&mut sv, "ObjectGet", vec![s("l"), Value::Int(102)]), Value::Double(15.0));
            assert_eq!(call(&mut sv, "ObjectGet", vec![s("l"), Value::Int(OBJPROP_PRICE)]), Value::Double(1.5));
            let text = vec![s("l"), s("Spread 2"), Value::Int(9), s("Arial"), Value::Int(255)];
            assert_eq!(call(&mut sv, "ObjectSetText", text), Value::Bool(true));
            assert_eq!(call(&mut sv, "ObjectDescription", vec![s("l")]), s("Spread 2"));
            assert_eq!(call(&mut sv, "ObjectGet", vec![s("l"), Value::Int(OBJPROP_COLOR)]), Value::Double(255.0));
            assert_eq!(call(&mut sv, "ObjectSet", vec![s("gone"), Value::Int(1), Value::Int(1)]), Value::Bool(false));
            assert_eq!(sv.last_error, ERR_OBJECT_DOES_NOT_EXIST);
        }

        #[test]
        fn typed_accessors_with_modifiers() {
            let mut sv = Services::default();
            label(&mut sv, "t");
            let id = || Value::Int(0);
            call(&mut sv, "ObjectSetInteger", vec![id(), s("t"), Value::Int(OBJPROP_TIME), Value::Int(1), Value::Int(600)]);
            call(&mut sv, "ObjectSetDouble", vec![id(), s("t"), Value::Int(OBJPROP_PRICE), Value::Int(1), Value::Double(2.5)]);
            call(&mut sv, "ObjectSetInteger", vec![id(), s("t"), Value::Int(7), Value::Int(2)]);
            call(&mut sv, "ObjectSetString", vec![id(), s("t"), Value::Int(OBJPROP_TEXT), s("hello")]);
            assert_eq!(call(&mut sv, "ObjectGetInteger", vec![id(), s("t"), Value::Int(OBJPROP_TIME), Value::Int(1)]), Value::Int(600));
            assert_eq!(call(&mut sv, "ObjectGetDouble", vec![id(), s("t"), Value::Int(OBJPROP_PRICE), Value::Int(1)]), Value::Double(2.5));
            assert_eq!(call(&mut sv, "ObjectGetInteger", vec![id(), s("t"), Value::Int(7)]), Value::Int(2));
            assert_eq!(call(&mut sv, "ObjectGetInteger", vec![id(), s("t"), Value::Int(OBJPROP_TYPE)]), Value::Int(23));
            assert_eq!(call(&mut sv, "ObjectGetString", vec![id(), s("t"), Value::Int(OBJPROP_TEXT)]), s("hello"));
            assert_eq!(call(&mut sv, "ObjectGetString", vec![id(), s("t"), Value::Int(OBJPROP_NAME)]), s("t"));
        }

        #[test]
        fn line_values_by_time_and_shift() {
            use crate::domain::ohlcv::Candle;

            let mut sv = Services::default();
            sv.timeframe = 60;
            let bars = (0..3).map(|i| Candle::new(i * 60, 1.0, 1.0, 1.0, 1.0)).collect();
            sv.market.set_candles("TEST", 60, bars);
            sv.time = 120;
            let trend = vec![s("tl"), Value::Int(2), Value::Int(0), Value::Int(0), Value::Double(1.0), Value::Int(120), Value::Double(2.0)];
            call(&mut sv, "ObjectCreate", trend);
            assert_eq!(call(&mut sv, "ObjectGetValueByTime", vec![Value::Int(0), s("tl"), Value::Int(60)]), Value::Double(1.5));
            assert_eq!(call(&mut sv, "ObjectGetTimeByValue", vec![Value::Int(0), s("tl"), Value::Double(2.0)]), Value::Int(120));
            assert_eq!(call(&mut sv, "ObjectGetValueByShift", vec![s("tl"), Value::Int(0)]), Value::Double(2.0));
            assert_eq!(call(&mut sv, "ObjectGetValueByShift", vec![s("tl"), Value::Int(2)]), Value::Double(1.0));
            assert_eq!(call(&mut sv, "ObjectMove", vec![s("tl"), Value::Int(1), Value::Int(120), Value::Double(3.0)]), Value::Bool(true));
            assert_eq!(call(&mut sv, "ObjectGetValueByShift", vec![s("tl"), Value::Int(1)]), Value::Double(2.0));
            assert_eq!(call(&mut sv, "ObjectMove", vec![s("tl"), Value::Int(3), Value::Int(0), Value::Double(0.0)]), Value::Bool(false));
        }
    }
}

//! Dynamic array functions. Indices are logical: series arrays count from
//! the newest element.

use std::cmp::Ordering;

use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{arg, array_arg, bool_arg, i64_arg, ok_bool, ok_i64};
use crate::domain::error::MqlError;
use crate::domain::runtime::value::{ArrayRef, MAX_ARRAY_LEN, Value};
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("ArraySize", array_size);
    r.register("ArrayRange", array_size);
    r.register("ArrayResize", array_resize);
    r.register("ArrayInitialize", array_initialize);
    r.register("ArrayFill", array_fill);
    r.register("ArrayCopy", array_copy);
    r.register("ArraySetAsSeries", array_set_as_series);
    r.register("ArrayGetAsSeries", array_get_as_series);
    r.register("ArrayIsSeries", array_is_series);
    r.register("ArrayMaximum", |s, a| extremum(s, a, Ordering::Greater));
    r.register("ArrayMinimum", |s, a| extremum(s, a, Ordering::Less));
    r.register("ArraySort", array_sort);
    r.register("ArrayFree", array_free);
}

fn require_array(args: &[Value], name: &str) -> Result<ArrayRef, MqlError> {
    array_arg(args, 0).ok_or_else(|| MqlError::ArgumentType {
        function: name.to_string(),
        parameter: "array".to_string(),
        expected: "array".to_string(),
        found: arg(args, 0).kind_name().to_string(),
    })
}

/// Elements in logical order; predefined series included.
fn logical_values(services: &mut Services, value: &Value) -> Option<Vec<f64>> {
    match value.unref() {
        Value::Array(array) => Some(array.borrow().logical_f64()),
        Value::Series(kind) => {
            let mut values = services.series_values(kind);
            values.reverse();
            Some(values)
        }
        _ => None,
    }
}

fn array_size(services: &mut Services, args: &[Value]) -> R {
    match arg(args, 0) {
        Value::Array(array) => ok_i64(array.borrow().len() as i64),
        Value::Series(kind) => ok_i64(services.series_values(kind).len() as i64),
        Value::Str(s) => ok_i64(s.chars().count() as i64),
        _ => ok_i64(0),
    }
}

/// `ArrayResize(array, size)`: returns the new size, -1 on failure.
fn array_resize(_: &mut Services, args: &[Value]) -> R {
    let Some(array) = array_arg(args, 0) else {
        return ok_i64(-1);
    };
    let size = i64_arg(args, 1, 0);
    if size < 0 || size as u64 > MAX_ARRAY_LEN as u64 {
        return ok_i64(-1);
    }
    let mut array = array.borrow_mut();
    if array.as_series {
        // Series keep their newest element at logical 0: grow at the old end.
        let fill = array.fill_value();
        let len = array.items.len();
        let size = size as usize;
        if size > len {
            let mut grown = vec![fill; size - len];
            grown.append(&mut array.items);
            array.items = grown;
        } else {
            array.items.drain(..len - size);
        }
    } else {
        array.resize(size as usize);
    }
    ok_i64(size)
}

fn array_initialize(_: &mut Services, args: &[Value]) -> R {
    let array = require_array(args, "ArrayInitialize")?;
    let value = arg(args, 1);
    let mut array = array.borrow_mut();
    let slot = array.fill_value();
    let fill = slot.coerce_like(value);
    for item in array.items.iter_mut() {
        *item = fill.clone();
    }
    ok_i64(array.items.len() as i64)
}

/// `ArrayFill(array, start, count, value)`.
fn array_fill(_: &mut Services, args: &[Value]) -> R {
    let array = require_array(args, "ArrayFill")?;
    let start = i64_arg(args, 1, 0).max(0);
    let count = i64_arg(args, 2, 0).max(0);
    let value = arg(args, 3);
    let mut array = array.borrow_mut();
    let fill = array.fill_value().coerce_like(value);
    for i in start..start + count {
        array.set(i, fill.clone());
    }
    Ok(Value::Void)
}

/// `ArrayCopy(dst, src, dst_start = 0, src_start = 0, count = WHOLE_ARRAY)`.
/// Returns the number of copied elements.
fn array_copy(services: &mut Services, args: &[Value]) -> R {
    let dst = require_array(args, "ArrayCopy")?;
    let src: Vec<Value> = match arg(args, 1) {
        Value::Array(array) => {
            let src = array.borrow();
            (0..src.len() as i64)
                .filter_map(|i| src.get(i).cloned())
                .collect()
        }
        other => logical_values(services, &other)
            .unwrap_or_default()
            .into_iter()
            .map(Value::Double)
            .collect(),
    };
    let dst_start = i64_arg(args, 2, 0).max(0);
    let src_start = i64_arg(args, 3, 0).max(0) as usize;
    let available = src.len().saturating_sub(src_start);
    let count = match i64_arg(args, 4, 0) {
        c if c <= 0 => available,
        c => (c as usize).min(available),
    };
    let mut dst = dst.borrow_mut();
    if dst.as_series && dst.len() < dst_start as usize + count {
        let needed = dst_start as usize + count - dst.len();
        let fill = dst.fill_value();
        let mut grown = vec![fill; needed];
        grown.append(&mut dst.items);
        dst.items = grown;
    }
    for (offset, value) in src.into_iter().skip(src_start).take(count).enumerate() {
        let slot = dst.fill_value();
        dst.set(dst_start + offset as i64, slot.coerce_like(value));
    }
    ok_i64(count as i64)
}

fn array_set_as_series(_: &mut Services, args: &[Value]) -> R {
    let Some(array) = array_arg(args, 0) else {
        return ok_bool(false);
    };
    array.borrow_mut().as_series = bool_arg(args, 1, true);
    ok_bool(true)
}

fn array_get_as_series(_: &mut Services, args: &[Value]) -> R {
    match arg(args, 0) {
        Value::Array(array) => ok_bool(array.borrow().as_series),
        Value::Series(_) => ok_bool(true),
        _ => ok_bool(false),
    }
}

/// Only the predefined timeseries count as series here.
fn array_is_series(_: &mut Services, args: &[Value]) -> R {
    ok_bool(matches!(arg(args, 0), Value::Series(_)))
}

/// `ArrayMaximum/ArrayMinimum(array, count = WHOLE_ARRAY, start = 0)`:
/// logical index of the first extreme element, -1 when empty.
fn extremum(services: &mut Services, args: &[Value], wanted: Ordering) -> R {
    let Some(values) = args.first().and_then(|v| logical_values(services, v)) else {
        return ok_i64(-1);
    };
    let start = i64_arg(args, 2, 0).max(0) as usize;
    let count = match i64_arg(args, 1, 0) {
        c if c <= 0 => values.len(),
        c => c as usize,
    };
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.iter().enumerate().skip(start).take(count) {
        match best {
            Some((_, b)) if v.partial_cmp(&b) != Some(wanted) => {}
            _ => best = Some((i, *v)),
        }
    }
    ok_i64(best.map_or(-1, |(i, _)| i as i64))
}

/// Ascending sort in logical order.
fn array_sort(_: &mut Services, args: &[Value]) -> R {
    let array = require_array(args, "ArraySort")?;
    let mut array = array.borrow_mut();
    let series = array.as_series;
    array.items.sort_by(|a, b| {
        let order = match (a, b) {
            (Value::Str(x), Value::Str(y)) => x.cmp(y),
            _ => a.to_f64().total_cmp(&b.to_f64()),
        };
        if series { order.reverse() } else { order }
    });
    ok_bool(true)
}

fn array_free(_: &mut Services, args: &[Value]) -> R {
    if let Some(array) = array_arg(args, 0) {
        array.borrow_mut().items.clear();
    }
    Ok(Value::Void)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtins::test_support::call;
    use crate::domain::ohlcv::Candle;
    use crate::domain::runtime::value::{MqlArray, PrimitiveType, SeriesKind};

    fn doubles(values: &[f64]) -> Value {
        Value::from_array(MqlArray::new(
            values.iter().map(|v| Value::Double(*v)).collect(),
            Some(PrimitiveType::Double),
        ))
    }

    fn items(value: &Value) -> Vec<f64> {
        value.as_array().unwrap().borrow().logical_f64()
    }

    mod sizing {
        use super::*;

        #[test]
        fn resize_and_size() {
            let mut s = Services::default();
            let a = doubles(&[1.0]);
            assert_eq!(call(&mut s, "ArrayResize", vec![a.clone(), Value::Int(3)]), Value::Int(3));
            assert_eq!(call(&mut s, "ArraySize", vec![a.clone()]), Value::Int(3));
            assert_eq!(items(&a), vec![1.0, 0.0, 0.0]);
            assert_eq!(call(&mut s, "ArrayResize", vec![Value::Int(1), Value::Int(3)]), Value::Int(-1));
        }

        #[test]
        fn series_resize_keeps_newest_first() {
            let mut s = Services::default();
            let a = doubles(&[1.0, 2.0]);
            call(&mut s, "ArraySetAsSeries", vec![a.clone(), Value::Bool(true)]);
            call(&mut s, "ArrayResize", vec![a.clone(), Value::Int(3)]);
            assert_eq!(items(&a), vec![2.0, 1.0, 0.0]);
            call(&mut s, "ArrayResize", vec![a.clone(), Value::Int(1)]);
            assert_eq!(items(&a), vec![2.0]);
        }

        #[test]
        fn size_of_predefined_series() {
            let mut s = Services::default();
            s.timeframe = 60;
            s.market.set_candles(
                "TEST",
                60,
                (0..5).map(|i| Candle::new(i * 60, 1.0, 1.0, 1.0, 1.0)).collect(),
            );
            s.time = 120;
            assert_eq!(call(&mut s, "ArraySize", vec![Value::Series(SeriesKind::Close)]), Value::Int(3));
            assert_eq!(call(&mut s, "ArrayIsSeries", vec![Value::Series(SeriesKind::Close)]), Value::Bool(true));
        }
    }

    mod filling {
        use super::*;

        #[test]
        fn initialize_and_fill() {
            let mut s = Services::default();
            let a = doubles(&[1.0, 2.0, 3.0, 4.0]);
            assert_eq!(call(&mut s, "ArrayInitialize", vec![a.clone(), Value::Int(5)]), Value::Int(4));
            assert_eq!(items(&a), vec![5.0; 4]);
            call(&mut s, "ArrayFill", vec![a.clone(), Value::Int(1), Value::Int(2), Value::Double(0.5)]);
            assert_eq!(items(&a), vec![5.0, 0.5, 0.5, 5.0]);
        }

        #[test]
        fn copy_with_offsets() {
            let mut s = Services::default();
            let dst = doubles(&[]);
            let src = doubles(&[1.0, 2.0, 3.0, 4.0]);
            let n = call(
                &mut s,
                "ArrayCopy",
                vec![dst.clone(), src, Value::Int(1), Value::Int(2)],
            );
            assert_eq!(n, Value::Int(2));
            assert_eq!(items(&dst), vec![0.0, 3.0, 4.0]);
        }

        #[test]
        fn initialize_requires_array() {
            let mut s = Services::default();
            let f = BuiltinRegistry::standard().get("ArrayInitialize").unwrap();
            let err = f(&mut s, &[Value::Int(1), Value::Int(0)]).unwrap_err();
            assert!(matches!(err, MqlError::ArgumentType { .. }));
        }
    }

    mod searching {
        use super::*;

        #[test]
        fn maximum_and_minimum() {
            let mut s = Services::default();
            let a = doubles(&[3.0, 9.0, 1.0, 9.0]);
            assert_eq!(call(&mut s, "ArrayMaximum", vec![a.clone()]), Value::Int(1));
            assert_eq!(call(&mut s, "ArrayMinimum", vec![a.clone()]), Value::Int(2));
            assert_eq!(
                call(&mut s, "ArrayMaximum", vec![a.clone(), Value::Int(1), Value::Int(2)]),
                Value::Int(2)
            );
            assert_eq!(call(&mut s, "ArrayMaximum", vec![doubles(&[])]), Value::Int(-1));
        }

        #[test]
        fn sort_ascending_logical() {
            let mut s = Services::default();
            let a = doubles(&[3.0, 1.0, 2.0]);
            call(&mut s, "ArraySort", vec![a.clone()]);
            assert_eq!(items(&a), vec![1.0, 2.0, 3.0]);
            call(&mut s, "ArraySetAsSeries", vec![a.clone(), Value::Bool(true)]);
            call(&mut s, "ArraySort", vec![a.clone()]);
            assert_eq!(items(&a), vec![1.0, 2.0, 3.0]);
            call(&mut s, "ArrayFree", vec![a.clone()]);
            assert_eq!(call(&mut s, "ArraySize", vec![a]), Value::Int(0));
        }
    }
}

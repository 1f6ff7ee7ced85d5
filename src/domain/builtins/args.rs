//! Argument access for builtins. Missing arguments read as the supplied
//! default; by-reference wrappers are followed.

use crate::domain::runtime::value::{ArrayRef, Value};
use crate::domain::services::Services;

pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).map(Value::unref).unwrap_or_default()
}

pub fn f64_arg(args: &[Value], index: usize, default: f64) -> f64 {
    args.get(index).map_or(default, Value::to_f64)
}

pub fn i64_arg(args: &[Value], index: usize, default: i64) -> i64 {
    args.get(index).map_or(default, Value::to_i64)
}

pub fn usize_arg(args: &[Value], index: usize, default: usize) -> usize {
    args.get(index)
        .map_or(default as i64, Value::to_i64)
        .max(0) as usize
}

pub fn bool_arg(args: &[Value], index: usize, default: bool) -> bool {
    args.get(index).map_or(default, Value::truthy)
}

pub fn str_arg(args: &[Value], index: usize) -> String {
    match arg(args, index) {
        Value::Void | Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn array_arg(args: &[Value], index: usize) -> Option<ArrayRef> {
    args.get(index).and_then(Value::as_array)
}

/// Numeric contents of an array or predefined series argument, oldest
/// first.
pub fn series_arg(services: &mut Services, args: &[Value], index: usize) -> Option<Vec<f64>> {
    match arg(args, index) {
        Value::Array(array) => Some(array.borrow().items.iter().map(Value::to_f64).collect()),
        Value::Series(kind) => Some(services.series_values(kind)),
        _ => None,
    }
}

/// Store into a by-reference argument, keeping the slot's kind.
pub fn write_ref(args: &[Value], index: usize, value: Value) {
    if let Some(Value::Ref(cell)) = args.get(index) {
        let current = cell.borrow().clone();
        *cell.borrow_mut() = current.coerce_like(value);
    }
}

pub fn ok_f64(value: f64) -> Result<Value, crate::domain::error::MqlError> {
    Ok(Value::Double(value))
}

pub fn ok_i64(value: i64) -> Result<Value, crate::domain::error::MqlError> {
    Ok(Value::Int(value))
}

pub fn ok_bool(value: bool) -> Result<Value, crate::domain::error::MqlError> {
    Ok(Value::Bool(value))
}

pub fn ok_str(value: impl Into<String>) -> Result<Value, crate::domain::error::MqlError> {
    Ok(Value::Str(value.into()))
}

//! Environment-provided functions callable from programs.
//!
//! The registry is a plain name -> function table built by the host and
//! handed to the interpreter, which only consults it when no user-defined
//! overload exists. Hosts can swap groups of entries with
//! [`BuiltinRegistry::register_env_builtins`]; the last write per name wins.

mod account;
pub(crate) mod args;
mod array;
mod chart;
mod common;
mod convert;
mod customind;
mod datetime;
mod events;
mod files;
mod globals;
mod indicators;
mod market_info;
mod math;
mod objects;
mod series;
mod string;
mod trading;

use std::collections::HashMap;

use crate::domain::error::MqlError;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;

pub use string::format_printf;

/// A builtin receives the run's services and the evaluated arguments.
/// Arguments naming a variable arrive as [`Value::Ref`].
pub type BuiltinFn = fn(&mut Services, &[Value]) -> Result<Value, MqlError>;

#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    table: HashMap<String, BuiltinFn>,
}

impl BuiltinRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every builtin group this crate ships.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        math::register(&mut registry);
        string::register(&mut registry);
        convert::register(&mut registry);
        array::register(&mut registry);
        datetime::register(&mut registry);
        common::register(&mut registry);
        globals::register(&mut registry);
        files::register(&mut registry);
        events::register(&mut registry);
        account::register(&mut registry);
        market_info::register(&mut registry);
        series::register(&mut registry);
        trading::register(&mut registry);
        indicators::register(&mut registry);
        customind::register(&mut registry);
        objects::register(&mut registry);
        chart::register(&mut registry);
        registry
    }

    pub fn register(&mut self, name: &str, f: BuiltinFn) {
        self.table.insert(name.to_string(), f);
    }

    /// Merge a table of entries, overwriting existing names.
    pub fn register_env_builtins<'n>(
        &mut self,
        entries: impl IntoIterator<Item = (&'n str, BuiltinFn)>,
    ) {
        for (name, f) in entries {
            self.register(name, f);
        }
    }

    pub fn get(&self, name: &str) -> Option<BuiltinFn> {
        self.table.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Call a standard builtin by name.
    pub fn call(services: &mut Services, name: &str, args: Vec<Value>) -> Value {
        let f = BuiltinRegistry::standard()
            .get(name)
            .unwrap_or_else(|| panic!("no builtin {}", name));
        f(services, &args).unwrap()
    }

    pub fn s(text: &str) -> Value {
        Value::Str(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forty_two(_: &mut Services, _: &[Value]) -> Result<Value, MqlError> {
        Ok(Value::Int(42))
    }

    fn seven(_: &mut Services, _: &[Value]) -> Result<Value, MqlError> {
        Ok(Value::Int(7))
    }

    #[test]
    fn standard_registry_covers_groups() {
        let registry = BuiltinRegistry::standard();
        for name in [
            "MathAbs",
            "StringLen",
            "DoubleToString",
            "ArraySize",
            "TimeCurrent",
            "Print",
            "GlobalVariableSet",
            "FileOpen",
            "EventSetTimer",
            "AccountBalance",
            "MarketInfo",
            "iClose",
            "OrderSend",
            "iMA",
            "iCustom",
            "SetIndexBuffer",
            "ObjectCreate",
            "ChartGetInteger",
        ] {
            assert!(registry.contains(name), "{}", name);
        }
    }

    #[test]
    fn env_builtins_overwrite_last_write_wins() {
        let mut registry = BuiltinRegistry::standard();
        let before = registry.len();
        registry.register_env_builtins([("OrderSend", forty_two as BuiltinFn)]);
        registry.register_env_builtins([("OrderSend", seven as BuiltinFn), ("Custom", seven)]);
        assert_eq!(registry.len(), before + 1);
        let f = registry.get("OrderSend").unwrap();
        assert_eq!(f(&mut Services::default(), &[]).unwrap(), Value::Int(7));
    }

    #[test]
    fn empty_registry() {
        let registry = BuiltinRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("MathAbs").is_none());
    }
}

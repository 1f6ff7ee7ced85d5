//! Layered name resolution for one executing call.
//!
//! Lookup order: locals, parameters, `this` fields, program globals, enum
//! constants, predefined terminal constants.

use std::collections::HashMap;

use crate::domain::runtime::constants;
use crate::domain::runtime::program::RuntimeState;
use crate::domain::runtime::value::{new_cell, Cell, ObjectRef, Value};

/// Variables of one call. Nested blocks share the frame.
#[derive(Debug, Default)]
pub struct Frame {
    pub locals: HashMap<String, Cell>,
    pub params: HashMap<String, Cell>,
    pub this: Option<ObjectRef>,
    /// Class whose method body is executing.
    pub class: Option<String>,
    /// Static-local storage key of the executing callable.
    pub static_key: Option<String>,
    /// Declared class of class-typed locals and parameters.
    pub declared_classes: HashMap<String, String>,
}

/// What a name resolved to.
#[derive(Debug, Clone)]
pub enum Binding {
    Cell(Cell),
    Constant(Value),
}

impl Binding {
    pub fn value(&self) -> Value {
        match self {
            Binding::Cell(cell) => cell.borrow().clone(),
            Binding::Constant(v) => v.clone(),
        }
    }
}

impl Frame {
    /// Frame for evaluating global initializers and defaults.
    pub fn global() -> Self {
        Frame::default()
    }

    pub fn for_call(static_key: String) -> Self {
        Frame {
            static_key: Some(static_key),
            ..Default::default()
        }
    }

    pub fn for_method(static_key: String, this: ObjectRef, class: String) -> Self {
        Frame {
            static_key: Some(static_key),
            this: Some(this),
            class: Some(class),
            ..Default::default()
        }
    }

    /// Declare (or redeclare) a local with an initial value.
    pub fn declare(&mut self, name: &str, value: Value) -> Cell {
        let cell = new_cell(value);
        self.locals.insert(name.to_string(), cell.clone());
        cell
    }

    /// Bind a local name to an existing cell (static locals).
    pub fn bind_local(&mut self, name: &str, cell: Cell) {
        self.locals.insert(name.to_string(), cell);
    }

    pub fn bind_param(&mut self, name: &str, cell: Cell) {
        self.params.insert(name.to_string(), cell);
    }

    fn lookup_own(&self, name: &str) -> Option<Cell> {
        if let Some(cell) = self.locals.get(name) {
            return Some(cell.clone());
        }
        if let Some(cell) = self.params.get(name) {
            return Some(cell.clone());
        }
        self.this.as_ref().and_then(|obj| obj.borrow().field(name))
    }

    /// Resolve a name through every layer.
    pub fn resolve(&self, runtime: &RuntimeState, name: &str) -> Option<Binding> {
        if let Some(cell) = self.lookup_own(name) {
            return Some(Binding::Cell(cell));
        }
        if let Some(cell) = runtime.global(name) {
            return Some(Binding::Cell(cell));
        }
        if let Some(v) = runtime.enum_constants.get(name) {
            return Some(Binding::Constant(Value::Int(*v)));
        }
        constants::lookup(name).map(Binding::Constant)
    }

    /// Declared class of a variable visible from this frame.
    pub fn declared_class(&self, runtime: &RuntimeState, name: &str) -> Option<String> {
        if let Some(class) = self.declared_classes.get(name) {
            return Some(class.clone());
        }
        if self.locals.contains_key(name) || self.params.contains_key(name) {
            return None;
        }
        if let Some(class) = &self.class {
            if let Some(ty) = runtime.field_type(class, name) {
                return runtime.is_class(&ty.name).then_some(ty.name);
            }
        }
        runtime
            .global_types
            .get(name)
            .filter(|ty| runtime.is_class(&ty.name))
            .map(|ty| ty.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::domain::runtime::value::Object;

    fn state() -> RuntimeState {
        RuntimeState::compile("enum Color { RED, GREEN }; int g = 1;").unwrap()
    }

    #[test]
    fn locals_shadow_params_and_globals() {
        let mut runtime = state();
        runtime.set_global("g", Value::Int(1));
        let mut frame = Frame::for_call("f".into());
        frame.bind_param("g", new_cell(Value::Int(2)));
        assert_eq!(frame.resolve(&runtime, "g").unwrap().value(), Value::Int(2));
        frame.declare("g", Value::Int(3));
        assert_eq!(frame.resolve(&runtime, "g").unwrap().value(), Value::Int(3));
    }

    #[test]
    fn this_fields_come_before_globals() {
        let mut runtime = state();
        runtime.set_global("x", Value::Int(1));
        let mut fields = HashMap::new();
        fields.insert("x".to_string(), new_cell(Value::Int(9)));
        let obj = Rc::new(RefCell::new(Object {
            class: "A".into(),
            fields,
        }));
        let frame = Frame::for_method("A::m".into(), obj, "A".into());
        assert_eq!(frame.resolve(&runtime, "x").unwrap().value(), Value::Int(9));
    }

    #[test]
    fn enum_then_predefined_constants() {
        let runtime = state();
        let frame = Frame::global();
        assert_eq!(frame.resolve(&runtime, "GREEN").unwrap().value(), Value::Int(1));
        assert_eq!(frame.resolve(&runtime, "OP_SELL").unwrap().value(), Value::Int(1));
        assert!(frame.resolve(&runtime, "nothing_here").is_none());
    }
}

//! Call dispatch: overload selection, parameter binding, method resolution
//! and object construction.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::domain::builtins::BuiltinRegistry;
use crate::domain::error::{ArityProblem, MqlError};
use crate::domain::lang::ast::{Expr, Param, Stmt, Storage, TypeRef, VarDecl};
use crate::domain::runtime::env::Frame;
use crate::domain::runtime::exec::Flow;
use crate::domain::runtime::program::{select_overload, FunctionOverload, RuntimeState};
use crate::domain::runtime::value::{
    new_cell, ArrayRef, MAX_ARRAY_LEN, MqlArray, Object, ObjectRef, PrimitiveType, Value,
};
use crate::domain::services::Services;

const MAX_CALL_DEPTH: usize = 512;

/// Executes program code against one runtime state, builtin table and
/// set of terminal services.
pub struct Interpreter<'a> {
    pub runtime: &'a mut RuntimeState,
    pub builtins: &'a BuiltinRegistry,
    pub services: &'a mut Services,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        runtime: &'a mut RuntimeState,
        builtins: &'a BuiltinRegistry,
        services: &'a mut Services,
    ) -> Self {
        Interpreter {
            runtime,
            builtins,
            services,
            depth: 0,
        }
    }

    /// Call a free function by name: user overloads first, then builtins.
    pub fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, MqlError> {
        if let Some(overloads) = self.runtime.functions.get(name).filter(|o| !o.is_empty()) {
            let overload = select_overload(name, overloads, args.len())?.clone();
            return self.invoke(&overload, args, None);
        }
        if let Some(builtin) = self.builtins.get(name) {
            return builtin(self.services, &args);
        }
        Err(MqlError::UnknownFunction {
            name: name.to_string(),
        })
    }

    /// Call a user handler if the program defines it.
    pub fn call_handler(
        &mut self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, MqlError> {
        if !self.runtime.has_function(name) {
            return Ok(None);
        }
        trace!(handler = name, "invoking handler");
        self.call_function(name, args).map(Some)
    }

    /// Call a method on `obj`. Resolution starts at `static_class` (or the
    /// runtime class when unknown) and switches to the runtime class when
    /// the method is virtual anywhere in that chain.
    pub fn call_method(
        &mut self,
        obj: &ObjectRef,
        static_class: Option<&str>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, MqlError> {
        let runtime_class = obj.borrow().class.clone();
        let start = static_class.unwrap_or(&runtime_class).to_string();
        let search = if self.runtime.is_virtual(&start, name) {
            runtime_class
        } else {
            start
        };
        let (owner, overloads) =
            self.runtime
                .find_method(&search, name)
                .ok_or_else(|| MqlError::UnknownFunction {
                    name: format!("{}::{}", search, name),
                })?;
        let label = format!("{}::{}", owner, name);
        let overload = select_overload(&label, &overloads, args.len())?.clone();
        if overload.is_static {
            return self.invoke(&overload, args, None);
        }
        self.invoke(&overload, args, Some(obj.clone()))
    }

    /// `Class::name(args)`: base constructor, non-virtual base method or
    /// static method call.
    pub fn call_scoped(
        &mut self,
        class: &str,
        name: &str,
        args: Vec<Value>,
        frame: &Frame,
    ) -> Result<Value, MqlError> {
        if !self.runtime.is_class(class) {
            return self.call_function(name, args);
        }
        if let Some(this) = &frame.this {
            let this_class = this.borrow().class.clone();
            if self.runtime.is_subclass(&this_class, class) {
                if name == class {
                    self.construct(this, class, args)?;
                    return Ok(Value::Void);
                }
                let (owner, overloads) = self.runtime.find_method(class, name).ok_or_else(|| {
                    MqlError::UnknownFunction {
                        name: format!("{}::{}", class, name),
                    }
                })?;
                let label = format!("{}::{}", owner, name);
                let overload = select_overload(&label, &overloads, args.len())?.clone();
                let this = (!overload.is_static).then(|| this.clone());
                return self.invoke(&overload, args, this);
            }
        }
        let (owner, overloads) =
            self.runtime
                .find_method(class, name)
                .ok_or_else(|| MqlError::UnknownFunction {
                    name: format!("{}::{}", class, name),
                })?;
        let label = format!("{}::{}", owner, name);
        let overload = select_overload(&label, &overloads, args.len())?.clone();
        if !overload.is_static {
            return Err(MqlError::runtime(format!(
                "'{}' is not static and no object is available",
                label
            )));
        }
        self.invoke(&overload, args, None)
    }

    /// Run a callable's body with bound parameters.
    pub(crate) fn invoke(
        &mut self,
        overload: &Rc<FunctionOverload>,
        args: Vec<Value>,
        this: Option<ObjectRef>,
    ) -> Result<Value, MqlError> {
        let label = overload.static_key();
        let body = overload.body.clone().ok_or_else(|| {
            MqlError::runtime(if overload.is_pure {
                format!("pure virtual method '{}' called", label)
            } else {
                format!("function '{}' has no implementation", label)
            })
        })?;
        if self.depth >= MAX_CALL_DEPTH {
            return Err(MqlError::runtime(format!(
                "call stack exhausted in '{}'",
                label
            )));
        }

        let mut frame = match (this, &overload.owner) {
            (Some(obj), Some(owner)) => Frame::for_method(label.clone(), obj, owner.clone()),
            (_, owner) => {
                let mut frame = Frame::for_call(label.clone());
                frame.class = owner.clone();
                frame
            }
        };
        self.bind_params(overload, args, &mut frame)?;

        self.depth += 1;
        let result = self.execute(&body, &mut frame);
        self.depth -= 1;

        let value = match result? {
            Flow::Return(v) => v,
            _ => Value::Void,
        };
        Ok(match PrimitiveType::from_name(&overload.return_type.name) {
            Some(p) if !overload.return_type.pointer => p.cast_permissive(&value),
            _ if overload.return_type.name == "void" => Value::Void,
            _ => value.unref(),
        })
    }

    fn bind_params(
        &mut self,
        overload: &FunctionOverload,
        args: Vec<Value>,
        frame: &mut Frame,
    ) -> Result<(), MqlError> {
        let label = overload.static_key();
        let supplied = args.len();
        let mut args = args.into_iter();
        for param in &overload.params {
            let arg = match args.next() {
                Some(arg) => arg,
                None => match &param.default {
                    Some(expr) => self.eval(expr, &mut Frame::global())?,
                    None => {
                        return Err(MqlError::ArgumentCount {
                            function: label,
                            supplied,
                            problem: ArityProblem::Missing {
                                parameter: param.name.clone(),
                            },
                        });
                    }
                },
            };
            let cell = if param.by_ref {
                match arg {
                    Value::Ref(cell) => cell,
                    v @ (Value::Array(_) | Value::Object(_) | Value::Series(_)) => new_cell(v),
                    _ => {
                        return Err(MqlError::ByRefRequired {
                            function: label,
                            parameter: param.name.clone(),
                        });
                    }
                }
            } else {
                new_cell(self.coerce_param(&label, param, arg.unref())?)
            };
            if self.runtime.is_class(&param.ty.name) {
                frame
                    .declared_classes
                    .insert(param.name.clone(), param.ty.name.clone());
            }
            frame.bind_param(&param.name, cell);
        }
        Ok(())
    }

    fn coerce_param(&self, function: &str, param: &Param, value: Value) -> Result<Value, MqlError> {
        let mismatch = |expected: &str, found: &Value| MqlError::ArgumentType {
            function: function.to_string(),
            parameter: param.name.clone(),
            expected: expected.to_string(),
            found: found.kind_name().to_string(),
        };
        if !param.dimensions.is_empty() {
            return match value {
                Value::Array(_) | Value::Series(_) => Ok(value),
                other => Err(mismatch("array", &other)),
            };
        }
        if param.ty.pointer {
            return Ok(value);
        }
        let primitive = PrimitiveType::from_name(&param.ty.name).or_else(|| {
            self.runtime
                .is_enum(&param.ty.name)
                .then_some(PrimitiveType::Int)
        });
        match primitive {
            Some(p) => p.cast(&value).ok_or_else(|| mismatch(&param.ty.name, &value)),
            None => Ok(value),
        }
    }

    /// Convert a value for storage in a variable declared as `ty`.
    pub(crate) fn coerce_decl(&self, ty: &TypeRef, value: Value) -> Value {
        if ty.pointer {
            return value.unref();
        }
        match PrimitiveType::from_name(&ty.name) {
            Some(p) => p.cast_permissive(&value),
            None if self.runtime.is_enum(&ty.name) => PrimitiveType::Int.cast_permissive(&value),
            None => value.unref(),
        }
    }

    /// Default value of an uninitialized variable of type `ty`.
    fn default_for(&mut self, ty: &TypeRef) -> Result<Value, MqlError> {
        if let Some(p) = PrimitiveType::from_name(&ty.name) {
            return Ok(p.default_value());
        }
        if self.runtime.is_enum(&ty.name) {
            return Ok(Value::Int(0));
        }
        if self.runtime.is_class(&ty.name) && !ty.pointer {
            return Ok(Value::Object(self.instantiate(&ty.name, Vec::new())?));
        }
        Ok(Value::Null)
    }

    /// Initial value of a declared variable: arrays, initializers,
    /// constructor arguments or the type default.
    pub(crate) fn initial_value(
        &mut self,
        decl: &VarDecl,
        frame: &mut Frame,
    ) -> Result<Value, MqlError> {
        if !decl.dimensions.is_empty() {
            return self.build_array(decl, frame);
        }
        if let Some(init) = &decl.init {
            let value = self.eval(init, frame)?;
            return Ok(self.coerce_decl(&decl.ty, value));
        }
        if let Some(args) = &decl.ctor_args {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(self.eval(arg, frame)?.unref());
            }
            return Ok(Value::Object(self.instantiate(&decl.ty.name, values)?));
        }
        self.default_for(&decl.ty)
    }

    fn build_array(&mut self, decl: &VarDecl, frame: &mut Frame) -> Result<Value, MqlError> {
        let mut sizes = Vec::with_capacity(decl.dimensions.len());
        for dim in &decl.dimensions {
            sizes.push(match dim {
                Some(expr) => self.eval(expr, frame)?.to_i64().max(0) as usize,
                None => 0,
            });
        }
        let element = PrimitiveType::from_name(&decl.ty.name).or_else(|| {
            self.runtime
                .is_enum(&decl.ty.name)
                .then_some(PrimitiveType::Int)
        });
        let array = self.make_array(&sizes, element, &decl.ty)?;
        if let Some(init) = &decl.init {
            let items = self.eval(init, frame)?;
            if let (Some(target), Some(source)) = (array.as_array(), items.as_array()) {
                fill_array(&target, &source.borrow(), element);
            }
        }
        Ok(array)
    }

    fn make_array(
        &mut self,
        sizes: &[usize],
        element: Option<PrimitiveType>,
        ty: &TypeRef,
    ) -> Result<Value, MqlError> {
        let Some((&len, rest)) = sizes.split_first() else {
            return Ok(Value::Void);
        };
        let total = sizes.iter().try_fold(1usize, |acc, n| acc.checked_mul(*n));
        if total.is_none_or(|n| n > MAX_ARRAY_LEN) {
            return Err(MqlError::runtime(format!(
                "array of {:?} elements exceeds the limit of {}",
                sizes, MAX_ARRAY_LEN
            )));
        }
        if !rest.is_empty() {
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(self.make_array(rest, element, ty)?);
            }
            return Ok(Value::from_array(MqlArray::new(items, None)));
        }
        if element.is_none() && self.runtime.is_class(&ty.name) && !ty.pointer {
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(Value::Object(self.instantiate(&ty.name, Vec::new())?));
            }
            return Ok(Value::from_array(MqlArray::new(items, None)));
        }
        if element.is_none() {
            return Ok(Value::from_array(MqlArray::new(
                vec![Value::Null; len],
                None,
            )));
        }
        Ok(Value::from_array(MqlArray::filled(len, element)))
    }

    /// Evaluate user globals in declaration order. `input`/`extern`
    /// globals take a supplied value when one is present.
    pub fn initialize_globals(&mut self, inputs: &HashMap<String, Value>) -> Result<(), MqlError> {
        let decls = self.runtime.global_decls.clone();
        let mut frame = Frame::global();
        for decl in &decls {
            let supplied = match decl.storage {
                Some(Storage::Input) | Some(Storage::Extern) => inputs.get(&decl.name),
                _ => None,
            };
            let value = match supplied {
                Some(v) => self.coerce_decl(&decl.ty, v.clone()),
                None => self.initial_value(decl, &mut frame)?,
            };
            self.runtime.set_global(&decl.name, value);
        }
        Ok(())
    }

    /// Create an object of `class`: fields root to leaf, then constructors.
    pub fn instantiate(&mut self, class: &str, args: Vec<Value>) -> Result<ObjectRef, MqlError> {
        let info = self
            .runtime
            .classes
            .get(class)
            .ok_or_else(|| MqlError::runtime(format!("unknown class '{}'", class)))?;
        if info.is_abstract {
            return Err(MqlError::runtime(format!(
                "cannot instantiate abstract class '{}'",
                class
            )));
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(MqlError::runtime(format!(
                "object nesting too deep in '{}'",
                class
            )));
        }
        let obj = Rc::new(RefCell::new(Object {
            class: class.to_string(),
            fields: HashMap::new(),
        }));

        self.depth += 1;
        let fields = self.init_fields(&obj, class);
        self.depth -= 1;
        fields?;

        self.construct(&obj, class, args)?;
        Ok(obj)
    }

    fn init_fields(&mut self, obj: &ObjectRef, class: &str) -> Result<(), MqlError> {
        let chain = self.runtime.base_chain(class);
        for owner in chain.iter().rev() {
            let fields = match self.runtime.classes.get(owner) {
                Some(info) => info.fields.clone(),
                None => continue,
            };
            let mut frame = Frame::for_method(format!("{}::", owner), obj.clone(), owner.clone());
            for field in &fields {
                let cell = if field.storage == Some(Storage::Static) {
                    let key = format!("{}::", owner);
                    match self.runtime.static_cell(&key, &field.name) {
                        Some(cell) => cell,
                        None => {
                            let cell = new_cell(self.initial_value(field, &mut frame)?);
                            self.runtime.insert_static(&key, &field.name, cell.clone());
                            cell
                        }
                    }
                } else {
                    new_cell(self.initial_value(field, &mut frame)?)
                };
                obj.borrow_mut().fields.insert(field.name.clone(), cell);
            }
        }
        Ok(())
    }

    /// Run the constructor of `class` on `obj`, constructing the base first
    /// unless the constructor calls a base constructor itself.
    fn construct(&mut self, obj: &ObjectRef, class: &str, args: Vec<Value>) -> Result<(), MqlError> {
        let Some(info) = self.runtime.classes.get(class) else {
            return Err(MqlError::runtime(format!("unknown class '{}'", class)));
        };
        let base = info.base.clone();
        let ctors = info.methods.get(class).cloned().unwrap_or_default();
        if ctors.is_empty() {
            if !args.is_empty() {
                return Err(MqlError::ArgumentCount {
                    function: class.to_string(),
                    supplied: args.len(),
                    problem: ArityProblem::TooMany { max: 0 },
                });
            }
            if let Some(base) = base {
                self.construct(obj, &base, Vec::new())?;
            }
            return Ok(());
        }
        let ctor = select_overload(class, &ctors, args.len())?.clone();
        if let Some(base) = base {
            if !calls_base_constructor(&ctor, &base) {
                self.construct(obj, &base, Vec::new())?;
            }
        }
        self.invoke(&ctor, args, Some(obj.clone()))?;
        Ok(())
    }

    /// Run destructors leaf to root.
    pub fn destroy(&mut self, obj: &ObjectRef) -> Result<(), MqlError> {
        let class = obj.borrow().class.clone();
        for owner in self.runtime.base_chain(&class) {
            let dtor_name = format!("~{}", owner);
            let dtor = self
                .runtime
                .classes
                .get(&owner)
                .and_then(|c| c.methods.get(&dtor_name))
                .and_then(|list| list.first().cloned());
            if let Some(dtor) = dtor {
                self.invoke(&dtor, Vec::new(), Some(obj.clone()))?;
            }
        }
        Ok(())
    }
}

fn calls_base_constructor(ctor: &FunctionOverload, base: &str) -> bool {
    ctor.body.as_ref().is_some_and(|body| {
        body.iter().any(|stmt| {
            matches!(
                stmt,
                Stmt::Expr(Expr::ScopedCall { class, name, .. }) if class == base && name == base
            )
        })
    })
}

fn fill_array(target: &ArrayRef, source: &MqlArray, element: Option<PrimitiveType>) {
    let mut target = target.borrow_mut();
    for (i, item) in source.items.iter().enumerate() {
        let value = match (item.as_array(), target.items.get(i).and_then(Value::as_array)) {
            (Some(inner_src), Some(inner_dst)) => {
                fill_array(&inner_dst, &inner_src.borrow(), element);
                continue;
            }
            _ => match element {
                Some(p) => p.cast_permissive(item),
                None => item.clone(),
            },
        };
        target.set(i as i64, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str, f: &str, args: Vec<Value>) -> Result<Value, MqlError> {
        let mut runtime = RuntimeState::compile(src)?;
        let builtins = BuiltinRegistry::standard();
        let mut services = Services::default();
        let mut interp = Interpreter::new(&mut runtime, &builtins, &mut services);
        interp.initialize_globals(&HashMap::new())?;
        interp.call_function(f, args)
    }

    mod dispatch {
        use super::*;

        const OVERLOADS: &str = "int f() { return 0; } int f(int a, int b = 1) { return a + b; }";

        #[test]
        fn overloads_by_arity() {
            assert_eq!(run(OVERLOADS, "f", vec![]).unwrap(), Value::Int(0));
            assert_eq!(run(OVERLOADS, "f", vec![Value::Int(4)]).unwrap(), Value::Int(5));
            let err = run(OVERLOADS, "f", vec![Value::Int(1), Value::Int(2), Value::Int(3)])
                .unwrap_err();
            assert!(matches!(err, MqlError::ArgumentCount { .. }));
        }

        #[test]
        fn unknown_function() {
            let err = run("int f() { return g(); }", "f", vec![]).unwrap_err();
            assert!(matches!(err, MqlError::UnknownFunction { name } if name == "g"));
        }

        #[test]
        fn builtin_fallback() {
            assert_eq!(
                run("double f() { return MathAbs(-2.5); }", "f", vec![]).unwrap(),
                Value::Double(2.5)
            );
        }

        #[test]
        fn by_ref_requires_lvalue() {
            let src = "void inc(int &x) { x++; } int f() { inc(3); return 0; }";
            let err = run(src, "f", vec![]).unwrap_err();
            assert!(matches!(err, MqlError::ByRefRequired { parameter, .. } if parameter == "x"));
        }

        #[test]
        fn by_ref_writes_back() {
            let src = "void inc(int &x) { x++; } int f() { int a = 1; inc(a); inc(a); return a; }";
            assert_eq!(run(src, "f", vec![]).unwrap(), Value::Int(3));
        }

        #[test]
        fn by_ref_array_element_writes_back() {
            let src = "void set(double &x) { x = 7; } double f() { double a[3]; set(a[1]); return a[1]; }";
            assert_eq!(run(src, "f", vec![]).unwrap(), Value::Double(7.0));
        }

        #[test]
        fn argument_type_for_objects() {
            let src = "class A {}; int g(int x) { return x; } int f() { A *p = new A(); return g(p); }";
            let err = run(src, "f", vec![]).unwrap_err();
            assert!(matches!(err, MqlError::ArgumentType { .. }));
        }

        #[test]
        fn string_arguments_cast_permissively() {
            let src = "int g(int x) { return x * 2; } int f() { return g(\"21\"); }";
            assert_eq!(run(src, "f", vec![]).unwrap(), Value::Int(42));
        }
    }

    mod statics {
        use super::*;

        #[test]
        fn static_local_persists_across_calls() {
            let src = "int counter() { static int c = 0; c++; return c; }";
            let mut runtime = RuntimeState::compile(src).unwrap();
            let builtins = BuiltinRegistry::standard();
            let mut services = Services::default();
            let mut interp = Interpreter::new(&mut runtime, &builtins, &mut services);
            let values: Vec<i64> = (0..3)
                .map(|_| interp.call_function("counter", vec![]).unwrap().to_i64())
                .collect();
            assert_eq!(values, vec![1, 2, 3]);
        }

        #[test]
        fn fresh_state_resets_statics() {
            let src = "int counter() { static int c = 0; c++; return c; }";
            assert_eq!(run(src, "counter", vec![]).unwrap(), Value::Int(1));
            assert_eq!(run(src, "counter", vec![]).unwrap(), Value::Int(1));
        }

        #[test]
        fn static_survives_recursion() {
            let src = r#"
                int depth(int n) { static int calls = 0; calls++; if (n > 0) depth(n - 1); return calls; }
                int f() { depth(3); return depth(0); }
            "#;
            assert_eq!(run(src, "f", vec![]).unwrap(), Value::Int(5));
        }
    }

    mod objects {
        use super::*;

        const SHAPES: &str = r#"
            class Base {
              public:
                int id;
                Base() { id = 1; }
                virtual int Kind() { return 1; }
                int Plain() { return 1; }
            };
            class Derived : public Base {
              public:
                Derived() { id = id + 10; }
                int Kind() { return 2; }
                int Plain() { return 2; }
            };
        "#;

        #[test]
        fn virtual_call_uses_runtime_class() {
            let src = format!(
                "{} int f() {{ Base *b = new Derived(); return b.Kind(); }}",
                SHAPES
            );
            assert_eq!(run(&src, "f", vec![]).unwrap(), Value::Int(2));
        }

        #[test]
        fn non_virtual_call_uses_static_class() {
            let src = format!(
                "{} int f() {{ Base *b = new Derived(); return b.Plain(); }}",
                SHAPES
            );
            assert_eq!(run(&src, "f", vec![]).unwrap(), Value::Int(1));
        }

        #[test]
        fn constructors_run_base_first() {
            let src = format!(
                "{} int f() {{ Derived d; return d.id; }}",
                SHAPES
            );
            assert_eq!(run(&src, "f", vec![]).unwrap(), Value::Int(11));
        }

        #[test]
        fn initializer_list_calls_base_constructor() {
            let src = r#"
                class A { public: int v; A(int x) { v = x; } };
                class B : public A { public: int w; B(int x) : A(x * 2), w(x) {} };
                int f() { B b(5); return b.v + b.w; }
            "#;
            assert_eq!(run(src, "f", vec![]).unwrap(), Value::Int(15));
        }

        #[test]
        fn abstract_class_cannot_be_created() {
            let src = "class S { public: virtual int Area() = 0; }; int f() { S *s = new S(); return 0; }";
            let err = run(src, "f", vec![]).unwrap_err();
            assert!(matches!(err, MqlError::Runtime { .. }));
        }

        #[test]
        fn null_method_call_is_runtime_error() {
            let src = format!("{} int f() {{ Base *b = NULL; return b.Kind(); }}", SHAPES);
            let err = run(&src, "f", vec![]).unwrap_err();
            assert!(matches!(err, MqlError::Runtime { .. }));
        }

        #[test]
        fn destructor_runs_on_delete() {
            let src = r#"
                int freed = 0;
                class R { public: ~R() { freed++; } };
                int f() { R *r = new R(); delete r; return freed; }
            "#;
            assert_eq!(run(src, "f", vec![]).unwrap(), Value::Int(1));
        }

        #[test]
        fn scoped_call_is_non_virtual() {
            let src = r#"
                class A { public: virtual int V() { return 1; } };
                class B : public A { public: int V() { return A::V() + 10; } };
                int f() { A *a = new B(); return a.V(); }
            "#;
            assert_eq!(run(src, "f", vec![]).unwrap(), Value::Int(11));
        }
    }

    mod globals {
        use super::*;

        #[test]
        fn inputs_override_initializers() {
            let src = "input int Period = 14; int f() { return Period; }";
            let mut runtime = RuntimeState::compile(src).unwrap();
            let builtins = BuiltinRegistry::standard();
            let mut services = Services::default();
            let mut interp = Interpreter::new(&mut runtime, &builtins, &mut services);
            let mut inputs = HashMap::new();
            inputs.insert("Period".to_string(), Value::Str("20".into()));
            interp.initialize_globals(&inputs).unwrap();
            assert_eq!(interp.call_function("f", vec![]).unwrap(), Value::Int(20));
        }

        #[test]
        fn initializers_run_in_order() {
            let src = "int a = 2; int b = a * 3; double c = b; int f() { return b; }";
            assert_eq!(run(src, "f", vec![]).unwrap(), Value::Int(6));
        }
    }
}

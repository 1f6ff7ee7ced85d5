//! Expression evaluation.

use crate::domain::error::MqlError;
use crate::domain::lang::ast::{BinaryOp, Expr, UnaryOp};
use crate::domain::runtime::env::{Binding, Frame};
use crate::domain::runtime::interpreter::Interpreter;
use crate::domain::runtime::value::{new_cell, ArrayRef, Cell, PrimitiveType, Value};

/// An assignable location.
#[derive(Debug, Clone)]
pub enum Place {
    Cell(Cell),
    Element(ArrayRef, i64),
}

impl Place {
    pub fn get(&self) -> Value {
        match self {
            Place::Cell(cell) => cell.borrow().clone(),
            Place::Element(array, index) => {
                let array = array.borrow();
                array
                    .get(*index)
                    .cloned()
                    .unwrap_or_else(|| array.fill_value())
            }
        }
    }

    /// Store `value`, keeping the slot's declared kind. Returns the stored value.
    pub fn set(&self, value: Value) -> Result<Value, MqlError> {
        match self {
            Place::Cell(cell) => {
                let stored = cell.borrow().coerce_like(value);
                *cell.borrow_mut() = stored.clone();
                Ok(stored)
            }
            Place::Element(array, index) => {
                let mut array = array.borrow_mut();
                let stored = match (array.element, array.get(*index)) {
                    (Some(p), _) => p.cast_permissive(&value),
                    (None, Some(old)) => old.coerce_like(value),
                    (None, None) => value.unref(),
                };
                if !array.set(*index, stored.clone()) {
                    return Err(MqlError::runtime(format!(
                        "array index {} out of range (size {})",
                        index,
                        array.len()
                    )));
                }
                Ok(stored)
            }
        }
    }
}

/// Element of an array passed by reference; copied back after the call.
type WriteBack = (ArrayRef, i64, Cell);

impl Interpreter<'_> {
    pub fn eval(&mut self, expr: &Expr, frame: &mut Frame) -> Result<Value, MqlError> {
        Ok(match expr {
            Expr::Int(v) => Value::Int(*v),
            Expr::Double(v) => Value::Double(*v),
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Null => Value::Null,
            Expr::Ident(name) => self.resolve(name, frame)?.value(),
            Expr::This => frame
                .this
                .clone()
                .map(Value::Object)
                .ok_or_else(|| MqlError::runtime("'this' used outside a method"))?,
            Expr::Unary { op, expr } => {
                let value = self.eval(expr, frame)?;
                unary(*op, &value)
            }
            Expr::IncDec {
                target,
                delta,
                prefix,
            } => {
                let place = self.place(target, frame)?;
                let old = place.get();
                let new = match &old {
                    Value::Double(d) => Value::Double(d + *delta as f64),
                    other => Value::Int(other.to_i64().wrapping_add(*delta)),
                };
                let new = place.set(new)?;
                if *prefix { new } else { old }
            }
            Expr::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => Value::Bool(self.eval(lhs, frame)?.truthy() && self.eval(rhs, frame)?.truthy()),
            Expr::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => Value::Bool(self.eval(lhs, frame)?.truthy() || self.eval(rhs, frame)?.truthy()),
            Expr::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs, frame)?;
                let r = self.eval(rhs, frame)?;
                binary(*op, &l, &r)
            }
            Expr::Assign { op, target, value } => {
                let value = self.eval(value, frame)?.unref();
                let place = self.place(target, frame)?;
                let new = match op {
                    Some(op) => binary(*op, &place.get(), &value),
                    None => value,
                };
                place.set(new)?
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, frame)?.truthy() {
                    self.eval(then, frame)?
                } else {
                    self.eval(otherwise, frame)?
                }
            }
            Expr::Call { name, args } => self.eval_call(name, args, frame)?,
            Expr::ScopedCall { class, name, args } => {
                let (values, write_backs) = self.eval_args(args, frame)?;
                let result = self.call_scoped(class, name, values, frame);
                write_back(write_backs);
                result?
            }
            Expr::MethodCall {
                object,
                method,
                args,
            } => {
                let static_class = self.static_class_of(object, frame);
                let target = self.eval(object, frame)?.unref();
                let obj = match target {
                    Value::Object(obj) => obj,
                    Value::Null => {
                        return Err(MqlError::runtime(format!(
                            "method '{}' called on NULL pointer",
                            method
                        )));
                    }
                    other => {
                        return Err(MqlError::runtime(format!(
                            "cannot call method '{}' on {}",
                            method,
                            other.kind_name()
                        )));
                    }
                };
                let (values, write_backs) = self.eval_args(args, frame)?;
                let result = self.call_method(&obj, static_class.as_deref(), method, values);
                write_back(write_backs);
                result?
            }
            Expr::Index { target, index } => {
                let target = self.eval(target, frame)?.unref();
                let index = self.eval(index, frame)?.to_i64();
                self.index_value(target, index)?
            }
            Expr::Member { object, field } => self.member_cell(object, field, frame)?.borrow().clone(),
            Expr::New { class, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, frame)?.unref());
                }
                Value::Object(self.instantiate(class, values)?)
            }
            Expr::Delete(target) => {
                if let Some(obj) = self.eval(target, frame)?.as_object() {
                    self.destroy(&obj)?;
                }
                Value::Void
            }
            Expr::Cast { ty, expr } => {
                let value = self.eval(expr, frame)?;
                match PrimitiveType::from_name(ty) {
                    Some(p) => p.cast_permissive(&value),
                    None => value.unref(),
                }
            }
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, frame)?.unref());
                }
                Value::array(values)
            }
        })
    }

    fn resolve(&self, name: &str, frame: &Frame) -> Result<Binding, MqlError> {
        frame
            .resolve(&*self.runtime, name)
            .ok_or_else(|| MqlError::runtime(format!("undeclared identifier '{}'", name)))
    }

    fn member_cell(
        &mut self,
        object: &Expr,
        field: &str,
        frame: &mut Frame,
    ) -> Result<Cell, MqlError> {
        match self.eval(object, frame)?.unref() {
            Value::Object(obj) => {
                let found = obj.borrow().field(field);
                found.ok_or_else(|| {
                    MqlError::runtime(format!(
                        "'{}' has no member '{}'",
                        obj.borrow().class,
                        field
                    ))
                })
            }
            Value::Null => Err(MqlError::runtime(format!(
                "member '{}' accessed through NULL pointer",
                field
            ))),
            other => Err(MqlError::runtime(format!(
                "{} has no member '{}'",
                other.kind_name(),
                field
            ))),
        }
    }

    fn index_value(&mut self, target: Value, index: i64) -> Result<Value, MqlError> {
        match target {
            Value::Array(array) => {
                let array = array.borrow();
                Ok(array
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| array.fill_value()))
            }
            Value::Series(kind) => Ok(self.services.series_value(kind, index)),
            other => Err(MqlError::runtime(format!(
                "cannot index a value of kind {}",
                other.kind_name()
            ))),
        }
    }

    /// Resolve an assignable expression.
    pub(crate) fn place(&mut self, expr: &Expr, frame: &mut Frame) -> Result<Place, MqlError> {
        match expr {
            Expr::Ident(name) => match self.resolve(name, frame)? {
                Binding::Cell(cell) => Ok(Place::Cell(cell)),
                Binding::Constant(_) => Err(MqlError::runtime(format!(
                    "cannot assign to constant '{}'",
                    name
                ))),
            },
            Expr::Member { object, field } => {
                Ok(Place::Cell(self.member_cell(object, field, frame)?))
            }
            Expr::Index { target, index } => {
                let target = self.eval(target, frame)?.unref();
                let index = self.eval(index, frame)?.to_i64();
                match target {
                    Value::Array(array) => Ok(Place::Element(array, index)),
                    Value::Series(kind) => Err(MqlError::runtime(format!(
                        "series '{}' is read-only",
                        kind.name()
                    ))),
                    other => Err(MqlError::runtime(format!(
                        "cannot index a value of kind {}",
                        other.kind_name()
                    ))),
                }
            }
            _ => Err(MqlError::runtime("invalid assignment target")),
        }
    }

    /// Evaluate call arguments. Variables and members are passed as
    /// references so by-reference parameters can write through them.
    fn eval_args(
        &mut self,
        args: &[Expr],
        frame: &mut Frame,
    ) -> Result<(Vec<Value>, Vec<WriteBack>), MqlError> {
        let mut values = Vec::with_capacity(args.len());
        let mut write_backs = Vec::new();
        for arg in args {
            let value = match arg {
                Expr::Ident(name) => match self.resolve(name, frame)? {
                    Binding::Cell(cell) => Value::Ref(cell),
                    Binding::Constant(v) => v,
                },
                Expr::Member { object, field } => {
                    Value::Ref(self.member_cell(object, field, frame)?)
                }
                Expr::Index { target, index } => {
                    let target = self.eval(target, frame)?.unref();
                    let index = self.eval(index, frame)?.to_i64();
                    let element = match &target {
                        Value::Array(array) => array
                            .borrow()
                            .get(index)
                            .cloned()
                            .map(|v| (array.clone(), v)),
                        _ => None,
                    };
                    match element {
                        Some((array, current)) => {
                            let cell = new_cell(current);
                            write_backs.push((array, index, cell.clone()));
                            Value::Ref(cell)
                        }
                        None => self.index_value(target, index)?,
                    }
                }
                other => self.eval(other, frame)?,
            };
            values.push(value);
        }
        Ok((values, write_backs))
    }

    fn eval_call(&mut self, name: &str, args: &[Expr], frame: &mut Frame) -> Result<Value, MqlError> {
        // unqualified calls inside a method resolve against the class first
        if let Some(class) = frame.class.clone() {
            if self.runtime.find_method(&class, name).is_some() {
                let (values, write_backs) = self.eval_args(args, frame)?;
                let result = match frame.this.clone() {
                    Some(this) => self.call_method(&this, Some(&class), name, values),
                    None => self.call_scoped(&class, name, values, frame),
                };
                write_back(write_backs);
                return result;
            }
        }
        let (values, write_backs) = self.eval_args(args, frame)?;
        let result = self.call_function(name, values);
        write_back(write_backs);
        result
    }

    /// Declared class of an object expression, when statically known.
    fn static_class_of(&self, expr: &Expr, frame: &Frame) -> Option<String> {
        match expr {
            Expr::This => frame.class.clone(),
            Expr::Ident(name) => frame.declared_class(&*self.runtime, name),
            Expr::Member { object, field } => {
                let class = self.static_class_of(object, frame)?;
                let ty = self.runtime.field_type(&class, field)?;
                self.runtime.is_class(&ty.name).then_some(ty.name)
            }
            _ => None,
        }
    }
}

fn write_back(write_backs: Vec<WriteBack>) {
    for (array, index, cell) in write_backs {
        let value = cell.borrow().clone();
        array.borrow_mut().set(index, value);
    }
}

fn unary(op: UnaryOp, value: &Value) -> Value {
    let value = value.unref();
    match op {
        UnaryOp::Neg => match value {
            Value::Double(d) => Value::Double(-d),
            other => Value::Int(other.to_i64().wrapping_neg()),
        },
        UnaryOp::Plus => match value {
            Value::Double(d) => Value::Double(d),
            other => Value::Int(other.to_i64()),
        },
        UnaryOp::Not => Value::Bool(!value.truthy()),
        UnaryOp::BitNot => Value::Int(!value.to_i64()),
    }
}

/// Apply a binary operator. Strings concatenate with `+`; any double
/// operand makes the arithmetic floating; integer division by zero is 0.
pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    let l = lhs.unref();
    let r = rhs.unref();
    match op {
        BinaryOp::And => return Value::Bool(l.truthy() && r.truthy()),
        BinaryOp::Or => return Value::Bool(l.truthy() || r.truthy()),
        BinaryOp::Eq => return Value::Bool(l == r),
        BinaryOp::Ne => return Value::Bool(l != r),
        _ => {}
    }
    if let (Value::Str(a), Value::Str(b)) = (&l, &r) {
        match op {
            BinaryOp::Add => return Value::Str(format!("{}{}", a, b)),
            BinaryOp::Lt => return Value::Bool(a < b),
            BinaryOp::Gt => return Value::Bool(a > b),
            BinaryOp::Le => return Value::Bool(a <= b),
            BinaryOp::Ge => return Value::Bool(a >= b),
            _ => {}
        }
    }
    if op == BinaryOp::Add && (l.is_string() || r.is_string()) {
        return Value::Str(format!("{}{}", l, r));
    }
    match op {
        BinaryOp::BitAnd => return Value::Int(l.to_i64() & r.to_i64()),
        BinaryOp::BitOr => return Value::Int(l.to_i64() | r.to_i64()),
        BinaryOp::BitXor => return Value::Int(l.to_i64() ^ r.to_i64()),
        BinaryOp::Shl => return Value::Int(l.to_i64().wrapping_shl(r.to_i64() as u32)),
        BinaryOp::Shr => return Value::Int(l.to_i64().wrapping_shr(r.to_i64() as u32)),
        _ => {}
    }
    if l.is_double() || r.is_double() {
        let (a, b) = (l.to_f64(), r.to_f64());
        return match op {
            BinaryOp::Add => Value::Double(a + b),
            BinaryOp::Sub => Value::Double(a - b),
            BinaryOp::Mul => Value::Double(a * b),
            BinaryOp::Div => Value::Double(a / b),
            BinaryOp::Rem => Value::Double(a % b),
            BinaryOp::Lt => Value::Bool(a < b),
            BinaryOp::Gt => Value::Bool(a > b),
            BinaryOp::Le => Value::Bool(a <= b),
            BinaryOp::Ge => Value::Bool(a >= b),
            _ => Value::Void,
        };
    }
    let (a, b) = (l.to_i64(), r.to_i64());
    match op {
        BinaryOp::Add => Value::Int(a.wrapping_add(b)),
        BinaryOp::Sub => Value::Int(a.wrapping_sub(b)),
        BinaryOp::Mul => Value::Int(a.wrapping_mul(b)),
        BinaryOp::Div => Value::Int(a.checked_div(b).unwrap_or(0)),
        BinaryOp::Rem => Value::Int(a.checked_rem(b).unwrap_or(0)),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::Le => Value::Bool(a <= b),
        BinaryOp::Ge => Value::Bool(a >= b),
        _ => Value::Void,
    }
}

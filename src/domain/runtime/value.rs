//! Runtime values, arrays, objects and primitive casts.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::domain::lang::lexer::parse_datetime_literal;

/// A mutable storage slot shared between a frame and by-reference parameters.
pub type Cell = Rc<RefCell<Value>>;
pub type ArrayRef = Rc<RefCell<MqlArray>>;
pub type ObjectRef = Rc<RefCell<Object>>;

/// Predefined price/time series exposed as arrays (`Close[0]` etc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    Open,
    High,
    Low,
    Close,
    Time,
    Volume,
}

impl SeriesKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Open" => SeriesKind::Open,
            "High" => SeriesKind::High,
            "Low" => SeriesKind::Low,
            "Close" => SeriesKind::Close,
            "Time" => SeriesKind::Time,
            "Volume" => SeriesKind::Volume,
            _ => return None,
        })
    }

    pub const ALL: [SeriesKind; 6] = [
        SeriesKind::Open,
        SeriesKind::High,
        SeriesKind::Low,
        SeriesKind::Close,
        SeriesKind::Time,
        SeriesKind::Volume,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SeriesKind::Open => "Open",
            SeriesKind::High => "High",
            SeriesKind::Low => "Low",
            SeriesKind::Close => "Close",
            SeriesKind::Time => "Time",
            SeriesKind::Volume => "Volume",
        }
    }
}

/// Largest element count an array may reach, by declaration, resize or
/// assignment past its end.
pub const MAX_ARRAY_LEN: usize = 1 << 21;

/// A dynamic array. Storage is always chronological; `as_series` reverses
/// the logical index so that element 0 is the newest.
#[derive(Debug, Clone, Default)]
pub struct MqlArray {
    pub items: Vec<Value>,
    pub as_series: bool,
    /// Element type, used to fill new slots on resize.
    pub element: Option<PrimitiveType>,
}

impl MqlArray {
    pub fn new(items: Vec<Value>, element: Option<PrimitiveType>) -> Self {
        MqlArray {
            items,
            as_series: false,
            element,
        }
    }

    pub fn filled(len: usize, element: Option<PrimitiveType>) -> Self {
        let fill = element.map(|p| p.default_value()).unwrap_or(Value::Int(0));
        MqlArray::new(vec![fill; len], element)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn physical(&self, index: i64) -> Option<usize> {
        if index < 0 {
            return None;
        }
        let index = index as usize;
        if index >= self.items.len() {
            return None;
        }
        Some(if self.as_series {
            self.items.len() - 1 - index
        } else {
            index
        })
    }

    /// Element at a logical index, or `None` when out of range.
    pub fn get(&self, index: i64) -> Option<&Value> {
        self.physical(index).map(|i| &self.items[i])
    }

    /// Store at a logical index. Non-series arrays grow to fit, up to
    /// [`MAX_ARRAY_LEN`] elements.
    pub fn set(&mut self, index: i64, value: Value) -> bool {
        if let Some(i) = self.physical(index) {
            self.items[i] = value;
            return true;
        }
        let Some(index) = usize::try_from(index).ok().filter(|i| *i < MAX_ARRAY_LEN) else {
            return false;
        };
        if self.as_series {
            return false;
        }
        let fill = self.fill_value();
        self.items.resize(index + 1, fill);
        self.items[index] = value;
        true
    }

    pub fn fill_value(&self) -> Value {
        self.element
            .map(|p| p.default_value())
            .unwrap_or(Value::Int(0))
    }

    pub fn resize(&mut self, len: usize) {
        let fill = self.fill_value();
        self.items.resize(len, fill);
    }

    /// Values in logical order as f64.
    pub fn logical_f64(&self) -> Vec<f64> {
        let mut out: Vec<f64> = self.items.iter().map(Value::to_f64).collect();
        if self.as_series {
            out.reverse();
        }
        out
    }
}

/// An instance of a user class. `class` is the runtime class tag.
#[derive(Debug, Clone)]
pub struct Object {
    pub class: String,
    pub fields: HashMap<String, Cell>,
}

impl Object {
    pub fn field(&self, name: &str) -> Option<Cell> {
        self.fields.get(name).cloned()
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Void,
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Array(ArrayRef),
    Object(ObjectRef),
    Series(SeriesKind),
    /// A by-reference argument pointing at the caller's cell.
    Ref(Cell),
}

pub fn new_cell(value: Value) -> Cell {
    Rc::new(RefCell::new(value))
}

impl Value {
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(MqlArray::new(items, None))))
    }

    pub fn from_array(array: MqlArray) -> Value {
        Value::Array(Rc::new(RefCell::new(array)))
    }

    /// Follow a by-reference wrapper to the current value.
    pub fn unref(&self) -> Value {
        match self {
            Value::Ref(cell) => cell.borrow().unref(),
            other => other.clone(),
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(i) => *i as f64,
            Value::Double(d) => *d,
            Value::Str(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            Value::Ref(cell) => cell.borrow().to_f64(),
            _ => 0.0,
        }
    }

    pub fn to_i64(&self) -> i64 {
        match self {
            Value::Bool(b) => *b as i64,
            Value::Int(i) => *i,
            Value::Double(d) => truncate(*d),
            Value::Str(s) => parse_int_prefix(s),
            Value::Ref(cell) => cell.borrow().to_i64(),
            _ => 0,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Void | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Double(d) => *d != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Series(_) => true,
            Value::Ref(cell) => cell.borrow().truthy(),
        }
    }

    pub fn is_double(&self) -> bool {
        match self {
            Value::Double(_) => true,
            Value::Ref(cell) => cell.borrow().is_double(),
            _ => false,
        }
    }

    pub fn is_string(&self) -> bool {
        match self {
            Value::Str(_) => true,
            Value::Ref(cell) => cell.borrow().is_string(),
            _ => false,
        }
    }

    pub fn as_array(&self) -> Option<ArrayRef> {
        match self {
            Value::Array(a) => Some(a.clone()),
            Value::Ref(cell) => cell.borrow().as_array(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Value::Object(o) => Some(o.clone()),
            Value::Ref(cell) => cell.borrow().as_object(),
            _ => None,
        }
    }

    /// Convert `new` to the primitive kind currently held by `self`, so a
    /// slot keeps the type it was declared with.
    pub fn coerce_like(&self, new: Value) -> Value {
        let new = new.unref();
        match (self, &new) {
            (Value::Int(_), Value::Double(_) | Value::Bool(_) | Value::Str(_)) => {
                PrimitiveType::Long.cast_permissive(&new)
            }
            (Value::Double(_), Value::Int(_) | Value::Bool(_) | Value::Str(_)) => {
                PrimitiveType::Double.cast_permissive(&new)
            }
            (Value::Bool(_), Value::Int(_) | Value::Double(_)) => Value::Bool(new.truthy()),
            (Value::Str(_), Value::Int(_) | Value::Double(_) | Value::Bool(_)) => {
                Value::Str(new.to_string())
            }
            _ => new,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Null => "NULL",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Series(_) => "series",
            Value::Ref(_) => "reference",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self.unref(), other.unref()) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(&a, &b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(&a, &b),
            (Value::Object(_), _) | (_, Value::Object(_)) => false,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Series(a), Value::Series(b)) => a == b,
            (Value::Double(_), _) | (_, Value::Double(_)) => self.to_f64() == other.to_f64(),
            (a, b) => a.to_i64() == b.to_i64(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => Ok(()),
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", format_double(*d)),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(a) => write!(f, "array[{}]", a.borrow().len()),
            Value::Object(o) => write!(f, "{}", o.borrow().class),
            Value::Series(k) => write!(f, "{}[]", k.name()),
            Value::Ref(cell) => write!(f, "{}", cell.borrow()),
        }
    }
}

/// Default string form of a double: integral values keep one decimal.
pub fn format_double(d: f64) -> String {
    if d.is_finite() && d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{:.1}", d)
    } else {
        format!("{}", d)
    }
}

fn truncate(d: f64) -> i64 {
    if d.is_nan() {
        0
    } else {
        d.trunc() as i64
    }
}

fn parse_int_prefix(s: &str) -> i64 {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return i;
    }
    s.parse::<f64>().map(truncate).unwrap_or(0)
}

/// Primitive types of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Bool,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    Color,
    Datetime,
    String,
}

impl PrimitiveType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => PrimitiveType::Bool,
            "char" => PrimitiveType::Char,
            "uchar" => PrimitiveType::UChar,
            "short" => PrimitiveType::Short,
            "ushort" => PrimitiveType::UShort,
            "int" => PrimitiveType::Int,
            "uint" => PrimitiveType::UInt,
            "long" => PrimitiveType::Long,
            "ulong" => PrimitiveType::ULong,
            "float" => PrimitiveType::Float,
            "double" => PrimitiveType::Double,
            "color" => PrimitiveType::Color,
            "datetime" => PrimitiveType::Datetime,
            "string" => PrimitiveType::String,
            _ => return None,
        })
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, PrimitiveType::Float | PrimitiveType::Double)
    }

    pub fn default_value(&self) -> Value {
        match self {
            PrimitiveType::Bool => Value::Bool(false),
            PrimitiveType::Float | PrimitiveType::Double => Value::Double(0.0),
            PrimitiveType::String => Value::Str(String::new()),
            _ => Value::Int(0),
        }
    }

    /// Convert `value` to this type. Returns `None` when the value's kind
    /// cannot represent a primitive at all (objects, arrays, void, NULL).
    /// Unparsable strings cast to numbers keep the raw string.
    pub fn cast(&self, value: &Value) -> Option<Value> {
        let value = value.unref();
        match value {
            Value::Void
            | Value::Null
            | Value::Array(_)
            | Value::Object(_)
            | Value::Series(_)
            | Value::Ref(_) => return None,
            _ => {}
        }
        if *self == PrimitiveType::String {
            return Some(Value::Str(value.to_string()));
        }
        if let Value::Str(s) = &value {
            if *self == PrimitiveType::Datetime {
                if let Some(t) = parse_datetime_literal(s) {
                    return Some(Value::Int(t));
                }
            }
            if s.trim().parse::<f64>().is_err() {
                return Some(value.clone());
            }
        }
        Some(match self {
            PrimitiveType::Bool => Value::Bool(value.truthy() && value.to_f64() != 0.0),
            PrimitiveType::Float => Value::Double(value.to_f64() as f32 as f64),
            PrimitiveType::Double => Value::Double(value.to_f64()),
            PrimitiveType::Char => Value::Int(value.to_i64() as i8 as i64),
            PrimitiveType::UChar => Value::Int(value.to_i64() as u8 as i64),
            PrimitiveType::Short => Value::Int(value.to_i64() as i16 as i64),
            PrimitiveType::UShort => Value::Int(value.to_i64() as u16 as i64),
            PrimitiveType::Int | PrimitiveType::Color => Value::Int(value.to_i64() as i32 as i64),
            PrimitiveType::UInt => Value::Int(value.to_i64() as u32 as i64),
            PrimitiveType::Long | PrimitiveType::ULong | PrimitiveType::Datetime => {
                Value::Int(value.to_i64())
            }
            PrimitiveType::String => Value::Str(value.to_string()),
        })
    }

    /// Cast that keeps the raw value when the conversion is not possible.
    pub fn cast_permissive(&self, value: &Value) -> Value {
        self.cast(value).unwrap_or_else(|| value.unref())
    }
}

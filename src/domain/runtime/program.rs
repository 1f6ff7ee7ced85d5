//! Runtime program model: functions, classes, globals, enums and static locals.
//!
//! Built once from the parsed declarations. Global initializers are not run
//! here; the interpreter evaluates them in declaration order on startup.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::domain::error::{ArityProblem, MqlError};
use crate::domain::lang::ast::{
    BinaryOp, ClassDecl, Declaration, Expr, FunctionDecl, MethodDecl, Param, Stmt, Storage,
    TypeRef, UnaryOp, VarDecl, Visibility,
};
use crate::domain::lang::parser::{parse_program, ParsedProgram};
use crate::domain::runtime::constants;
use crate::domain::runtime::value::{new_cell, Cell, SeriesKind, Value};

/// One callable: a free function overload or a class method.
#[derive(Debug, Clone)]
pub struct FunctionOverload {
    pub name: String,
    /// Owning class for methods.
    pub owner: Option<String>,
    pub return_type: TypeRef,
    pub params: Vec<Param>,
    /// Every local declared anywhere in the body.
    pub locals: Vec<VarDecl>,
    pub body: Option<Rc<Vec<Stmt>>>,
    pub visibility: Visibility,
    pub is_virtual: bool,
    pub is_static: bool,
    pub is_pure: bool,
}

impl FunctionOverload {
    fn new(
        name: String,
        owner: Option<String>,
        return_type: TypeRef,
        params: Vec<Param>,
        body: Option<Vec<Stmt>>,
    ) -> Self {
        let mut locals = Vec::new();
        if let Some(stmts) = &body {
            for stmt in stmts {
                stmt.for_each_decl(&mut |d| locals.push(d.clone()));
            }
        }
        FunctionOverload {
            name,
            owner,
            return_type,
            params,
            locals,
            body: body.map(Rc::new),
            visibility: Visibility::Public,
            is_virtual: false,
            is_static: false,
            is_pure: false,
        }
    }

    fn from_method(owner: &str, m: &MethodDecl) -> Self {
        let mut f = FunctionOverload::new(
            m.name.clone(),
            Some(owner.to_string()),
            m.return_type.clone(),
            m.params.clone(),
            m.body.clone(),
        );
        f.visibility = m.visibility;
        f.is_virtual = m.is_virtual;
        f.is_static = m.is_static;
        f.is_pure = m.is_pure;
        f
    }

    /// Parameters without a default value.
    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }

    pub fn accepts(&self, supplied: usize) -> bool {
        self.required_count() <= supplied && supplied <= self.params.len()
    }

    /// Key for static-local storage: `name` or `Class::name`.
    pub fn static_key(&self) -> String {
        match &self.owner {
            Some(class) => format!("{}::{}", class, self.name),
            None => self.name.clone(),
        }
    }

    fn signature(&self) -> Vec<(String, bool, bool, usize)> {
        self.params
            .iter()
            .map(|p| (p.ty.name.clone(), p.ty.pointer, p.by_ref, p.dimensions.len()))
            .collect()
    }

    /// Names of `static` locals.
    pub fn static_locals(&self) -> impl Iterator<Item = &VarDecl> {
        self.locals
            .iter()
            .filter(|l| l.storage == Some(Storage::Static))
    }
}

/// Pick the first overload accepting `supplied` arguments.
pub fn select_overload<'o>(
    name: &str,
    overloads: &'o [Rc<FunctionOverload>],
    supplied: usize,
) -> Result<&'o Rc<FunctionOverload>, MqlError> {
    if let Some(found) = overloads.iter().find(|o| o.accepts(supplied)) {
        return Ok(found);
    }
    let max = overloads.iter().map(|o| o.params.len()).max().unwrap_or(0);
    let problem = if supplied > max {
        ArityProblem::TooMany { max }
    } else {
        let parameter = overloads
            .iter()
            .find(|o| o.params.len() > supplied)
            .map(|o| o.params[supplied].name.clone())
            .unwrap_or_default();
        ArityProblem::Missing { parameter }
    };
    Err(MqlError::ArgumentCount {
        function: name.to_string(),
        supplied,
        problem,
    })
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub base: Option<String>,
    pub is_struct: bool,
    pub fields: Vec<VarDecl>,
    pub methods: HashMap<String, Vec<Rc<FunctionOverload>>>,
    pub is_abstract: bool,
}

impl ClassInfo {
    fn from_decl(decl: &ClassDecl) -> Self {
        let mut methods: HashMap<String, Vec<Rc<FunctionOverload>>> = HashMap::new();
        for m in &decl.methods {
            methods
                .entry(m.name.clone())
                .or_default()
                .push(Rc::new(FunctionOverload::from_method(&decl.name, m)));
        }
        ClassInfo {
            name: decl.name.clone(),
            base: decl.base.clone(),
            is_struct: decl.is_struct,
            fields: decl.fields.clone(),
            methods,
            is_abstract: decl.is_abstract(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&VarDecl> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// State of one compiled program.
#[derive(Debug, Default)]
pub struct RuntimeState {
    pub functions: HashMap<String, Vec<Rc<FunctionOverload>>>,
    pub classes: HashMap<String, ClassInfo>,
    pub globals: HashMap<String, Cell>,
    /// Declared type of each user global.
    pub global_types: HashMap<String, TypeRef>,
    pub enums: HashMap<String, HashMap<String, i64>>,
    /// Every enum member, flattened.
    pub enum_constants: HashMap<String, i64>,
    /// Static locals keyed by `function` or `Class::method`.
    pub statics: HashMap<String, HashMap<String, Cell>>,
    pub properties: Vec<(String, String)>,
    /// User globals in declaration order, initialized by the interpreter.
    pub global_decls: Vec<VarDecl>,
}

const LEGACY_ALIASES: &[(&str, &str)] = &[
    ("init", "OnInit"),
    ("start", "OnTick"),
    ("deinit", "OnDeinit"),
];

impl RuntimeState {
    /// Parse and load a program.
    pub fn compile(source: &str) -> Result<Self, MqlError> {
        Self::load(parse_program(source)?)
    }

    pub fn load(program: ParsedProgram) -> Result<Self, MqlError> {
        let mut state = RuntimeState {
            properties: program.properties,
            ..Default::default()
        };
        state.install_predefined();

        for decl in &program.declarations {
            if let Declaration::Enum(e) = decl {
                let mut members = HashMap::new();
                let mut next = 0i64;
                for member in &e.members {
                    if let Some(expr) = &member.value {
                        next = const_eval(expr, &state.enum_constants).ok_or_else(|| {
                            MqlError::Compile {
                                reason: format!(
                                    "enum member '{}' needs a constant value",
                                    member.name
                                ),
                            }
                        })?;
                    }
                    members.insert(member.name.clone(), next);
                    state.enum_constants.insert(member.name.clone(), next);
                    next += 1;
                }
                state.enums.insert(e.name.clone(), members);
            }
        }

        for decl in &program.declarations {
            if let Declaration::Class(c) = decl {
                if state.classes.contains_key(&c.name) {
                    return Err(MqlError::Compile {
                        reason: format!("class '{}' is defined twice", c.name),
                    });
                }
                state.classes.insert(c.name.clone(), ClassInfo::from_decl(c));
            }
        }

        for decl in program.declarations {
            match decl {
                Declaration::Function(f) if f.class.is_some() => state.add_out_of_line(f)?,
                Declaration::Function(f) => state.add_function(f)?,
                Declaration::Variable(v) => {
                    if v.storage == Some(Storage::Extern) && state.global_types.contains_key(&v.name)
                    {
                        continue;
                    }
                    state.global_types.insert(v.name.clone(), v.ty.clone());
                    state.global_decls.push(v);
                }
                Declaration::Enum(_) | Declaration::Class(_) => {}
            }
        }

        state.validate_classes()?;
        for class in state.classes.values_mut() {
            class.is_abstract = class
                .methods
                .values()
                .flatten()
                .any(|m| m.is_pure && m.body.is_none());
        }

        for (legacy, modern) in LEGACY_ALIASES {
            if !state.functions.contains_key(*modern) {
                if let Some(overloads) = state.functions.get(*legacy).cloned() {
                    state.functions.insert(modern.to_string(), overloads);
                }
            }
        }
        Ok(state)
    }

    fn install_predefined(&mut self) {
        let predefined = [
            ("Bid", Value::Double(0.0)),
            ("Ask", Value::Double(0.0)),
            ("Bars", Value::Int(0)),
            ("Digits", Value::Int(5)),
            ("Point", Value::Double(1e-5)),
            ("_Digits", Value::Int(5)),
            ("_Point", Value::Double(1e-5)),
            ("_Symbol", Value::Str(String::new())),
            ("_Period", Value::Int(0)),
            ("_LastError", Value::Int(0)),
            ("_StopFlag", Value::Bool(false)),
            ("_RandomSeed", Value::Int(0)),
            ("_UninitReason", Value::Int(0)),
        ];
        for (name, value) in predefined {
            self.globals.insert(name.to_string(), new_cell(value));
        }
        for kind in SeriesKind::ALL {
            self.globals
                .insert(kind.name().to_string(), new_cell(Value::Series(kind)));
        }
    }

    fn add_function(&mut self, f: FunctionDecl) -> Result<(), MqlError> {
        let overload = FunctionOverload::new(f.name.clone(), None, f.return_type, f.params, f.body);
        let list = self.functions.entry(f.name.clone()).or_default();
        merge_overload(list, overload, &f.name)
    }

    fn add_out_of_line(&mut self, f: FunctionDecl) -> Result<(), MqlError> {
        let class_name = f.class.clone().unwrap_or_default();
        let class = self
            .classes
            .get_mut(&class_name)
            .ok_or_else(|| MqlError::Compile {
                reason: format!("definition of '{}::{}' for unknown class", class_name, f.name),
            })?;
        let overload = FunctionOverload::new(
            f.name.clone(),
            Some(class_name.clone()),
            f.return_type,
            f.params,
            f.body,
        );
        let list = class.methods.entry(f.name.clone()).or_default();
        let label = format!("{}::{}", class_name, f.name);
        if let Some(existing) = list
            .iter_mut()
            .find(|m| m.body.is_none() && m.signature() == overload.signature())
        {
            let slot = Rc::make_mut(existing);
            slot.body = overload.body;
            slot.locals = overload.locals;
            slot.params = overload.params;
            slot.is_pure = false;
            return Ok(());
        }
        merge_overload(list, overload, &label)
    }

    fn validate_classes(&self) -> Result<(), MqlError> {
        for class in self.classes.values() {
            let mut seen = HashSet::new();
            let mut current = Some(class);
            while let Some(c) = current {
                if !seen.insert(c.name.as_str()) {
                    return Err(MqlError::Compile {
                        reason: format!("class '{}' inherits from itself", class.name),
                    });
                }
                current = match &c.base {
                    Some(base) => Some(self.classes.get(base).ok_or_else(|| MqlError::Compile {
                        reason: format!("base class '{}' not found for '{}'", base, c.name),
                    })?),
                    None => None,
                };
            }
        }
        Ok(())
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.get(name).is_some_and(|o| !o.is_empty())
    }

    /// Class names from `class` up to the root.
    pub fn base_chain(&self, class: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(class.to_string());
        while let Some(name) = current {
            current = self.classes.get(&name).and_then(|c| c.base.clone());
            chain.push(name);
        }
        chain
    }

    /// First class walking up from `start` that defines `method`.
    pub fn find_method(
        &self,
        start: &str,
        method: &str,
    ) -> Option<(String, Vec<Rc<FunctionOverload>>)> {
        self.base_chain(start).into_iter().find_map(|class| {
            self.classes
                .get(&class)
                .and_then(|c| c.methods.get(method))
                .map(|m| (class.clone(), m.clone()))
        })
    }

    /// True when `method` is declared virtual anywhere in the chain of `start`.
    pub fn is_virtual(&self, start: &str, method: &str) -> bool {
        self.base_chain(start).iter().any(|class| {
            self.classes
                .get(class)
                .and_then(|c| c.methods.get(method))
                .is_some_and(|ms| ms.iter().any(|m| m.is_virtual))
        })
    }

    pub fn is_subclass(&self, class: &str, ancestor: &str) -> bool {
        self.base_chain(class).iter().any(|c| c == ancestor)
    }

    /// Declared type of a field, searched through the base chain.
    pub fn field_type(&self, class: &str, field: &str) -> Option<TypeRef> {
        self.base_chain(class).iter().find_map(|c| {
            self.classes
                .get(c)
                .and_then(|info| info.field(field))
                .map(|f| f.ty.clone())
        })
    }

    pub fn global(&self, name: &str) -> Option<Cell> {
        self.globals.get(name).cloned()
    }

    /// Overwrite a global's value, creating the slot if needed.
    pub fn set_global(&mut self, name: &str, value: Value) {
        match self.globals.get(name) {
            Some(cell) => *cell.borrow_mut() = value,
            None => {
                self.globals.insert(name.to_string(), new_cell(value));
            }
        }
    }

    /// `input`/`extern` globals in declaration order.
    pub fn input_names(&self) -> Vec<String> {
        self.global_decls
            .iter()
            .filter(|d| matches!(d.storage, Some(Storage::Input) | Some(Storage::Extern)))
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    pub fn static_cell(&self, key: &str, name: &str) -> Option<Cell> {
        self.statics.get(key).and_then(|m| m.get(name)).cloned()
    }

    pub fn insert_static(&mut self, key: &str, name: &str, cell: Cell) {
        self.statics
            .entry(key.to_string())
            .or_default()
            .insert(name.to_string(), cell);
    }
}

fn merge_overload(
    list: &mut Vec<Rc<FunctionOverload>>,
    overload: FunctionOverload,
    label: &str,
) -> Result<(), MqlError> {
    let signature = overload.signature();
    if let Some(existing) = list.iter_mut().find(|o| o.signature() == signature) {
        match (existing.body.is_some(), overload.body.is_some()) {
            (true, true) => {
                return Err(MqlError::Compile {
                    reason: format!("'{}' is already defined with the same parameters", label),
                });
            }
            (false, true) => *existing = Rc::new(overload),
            _ => {}
        }
        return Ok(());
    }
    list.push(Rc::new(overload));
    Ok(())
}

/// Fold an integer constant expression (enum values).
pub fn const_eval(expr: &Expr, known: &HashMap<String, i64>) -> Option<i64> {
    Some(match expr {
        Expr::Int(v) => *v,
        Expr::Bool(b) => *b as i64,
        Expr::Ident(name) => match known.get(name) {
            Some(v) => *v,
            None => match constants::lookup(name) {
                Some(Value::Int(v)) => v,
                _ => return None,
            },
        },
        Expr::Unary { op, expr } => {
            let v = const_eval(expr, known)?;
            match op {
                UnaryOp::Neg => v.wrapping_neg(),
                UnaryOp::Plus => v,
                UnaryOp::Not => (v == 0) as i64,
                UnaryOp::BitNot => !v,
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let a = const_eval(lhs, known)?;
            let b = const_eval(rhs, known)?;
            match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div => a.checked_div(b).unwrap_or(0),
                BinaryOp::Rem => a.checked_rem(b).unwrap_or(0),
                BinaryOp::Shl => a.wrapping_shl(b as u32),
                BinaryOp::Shr => a.wrapping_shr(b as u32),
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitOr => a | b,
                BinaryOp::BitXor => a ^ b,
                _ => return None,
            }
        }
        _ => return None,
    })
}

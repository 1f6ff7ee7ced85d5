//! Syntax tree for programs: declarations, statements and expressions.
//!
//! Bodies are stored as statement trees built once by the parser; the
//! interpreter walks them directly on every call.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Static,
    Input,
    Extern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// A declared type: a primitive or class name plus pointer-ness.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub name: String,
    pub pointer: bool,
}

impl TypeRef {
    pub fn named(name: &str) -> Self {
        TypeRef {
            name: name.to_string(),
            pointer: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeRef,
    pub name: String,
    pub by_ref: bool,
    /// One entry per `[]`; `Some(n)` for a fixed extent.
    pub dimensions: Vec<Option<usize>>,
    pub default: Option<Expr>,
}

/// A variable declaration: global, local or class field.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub storage: Option<Storage>,
    pub ty: TypeRef,
    pub name: String,
    pub dimensions: Vec<Option<Expr>>,
    pub init: Option<Expr>,
    /// Constructor arguments for `CFoo obj(1, 2);`.
    pub ctor_args: Option<Vec<Expr>>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub return_type: TypeRef,
    pub name: String,
    /// Owning class for out-of-line definitions (`void CFoo::Bar() {...}`).
    pub class: Option<String>,
    pub params: Vec<Param>,
    pub body: Option<Vec<Stmt>>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub return_type: TypeRef,
    pub params: Vec<Param>,
    pub visibility: Visibility,
    pub is_virtual: bool,
    pub is_static: bool,
    pub is_pure: bool,
    pub body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub base: Option<String>,
    pub is_struct: bool,
    pub fields: Vec<VarDecl>,
    pub methods: Vec<MethodDecl>,
    pub position: usize,
}

impl ClassDecl {
    /// A class with at least one pure virtual method cannot be instantiated.
    pub fn is_abstract(&self) -> bool {
        self.methods.iter().any(|m| m.is_pure)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Enum(EnumDecl),
    Class(ClassDecl),
    Function(FunctionDecl),
    Variable(VarDecl),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Double(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    This,
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    /// `++x`, `x--` and friends; `delta` is +1 or -1.
    IncDec {
        target: Box<Expr>,
        delta: i64,
        prefix: bool,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `target = value`, or `target op= value` when `op` is set.
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// `Class::name(args)`: a non-virtual call resolved from `class`.
    ScopedCall {
        class: String,
        name: String,
        args: Vec<Expr>,
    },
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        field: String,
    },
    New {
        class: String,
        args: Vec<Expr>,
    },
    Delete(Box<Expr>),
    Cast {
        ty: String,
        expr: Box<Expr>,
    },
    /// Brace initializer `{a, b, c}`.
    List(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for `default:`.
    pub label: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Empty,
    Block(Vec<Stmt>),
    Decl(Vec<VarDecl>),
    Expr(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Vec<Expr>,
        body: Box<Stmt>,
    },
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
}

impl Stmt {
    /// Visit every variable declaration in this statement, including nested ones.
    pub fn for_each_decl<'a>(&'a self, f: &mut dyn FnMut(&'a VarDecl)) {
        match self {
            Stmt::Decl(decls) => decls.iter().for_each(|d| f(d)),
            Stmt::Block(stmts) => stmts.iter().for_each(|s| s.for_each_decl(f)),
            Stmt::If {
                then, otherwise, ..
            } => {
                then.for_each_decl(f);
                if let Some(o) = otherwise {
                    o.for_each_decl(f);
                }
            }
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => body.for_each_decl(f),
            Stmt::For { init, body, .. } => {
                if let Some(i) = init {
                    i.for_each_decl(f);
                }
                body.for_each_decl(f);
            }
            Stmt::Switch { cases, .. } => cases
                .iter()
                .flat_map(|c| c.body.iter())
                .for_each(|s| s.for_each_decl(f)),
            Stmt::Empty | Stmt::Expr(_) | Stmt::Return(_) | Stmt::Break | Stmt::Continue => {}
        }
    }
}

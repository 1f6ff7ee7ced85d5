//! Recursive descent parser for program source.
//!
//! Converts the token stream into declarations whose bodies are pre-parsed
//! statement trees. Errors carry the byte offset of the offending token.

use std::collections::HashSet;

use crate::domain::error::ParseError;
use crate::domain::lang::ast::{
    BinaryOp, ClassDecl, Declaration, EnumDecl, EnumMember, Expr, FunctionDecl, MethodDecl,
    Param, Stmt, Storage, SwitchCase, TypeRef, UnaryOp, VarDecl, Visibility,
};
use crate::domain::lang::lexer::{lex, Token, TokenKind};

/// Primitive type names of the language.
pub const PRIMITIVE_TYPES: &[&str] = &[
    "void", "bool", "char", "uchar", "short", "ushort", "int", "uint", "long", "ulong", "float",
    "double", "color", "datetime", "string",
];

const RESERVED: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "default", "break", "continue",
    "return", "new", "delete", "this", "true", "false", "static", "const", "input", "extern",
    "class", "struct", "enum", "virtual", "public", "private", "protected", "sinput",
];

/// A parsed source file.
#[derive(Debug, Clone, Default)]
pub struct ParsedProgram {
    pub declarations: Vec<Declaration>,
    pub properties: Vec<(String, String)>,
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: usize,
    type_names: HashSet<String>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], end: usize) -> Self {
        let mut type_names = HashSet::new();
        for pair in tokens.windows(2) {
            if let (TokenKind::Ident(kw), TokenKind::Ident(name)) = (&pair[0].kind, &pair[1].kind)
            {
                if kw == "class" || kw == "struct" || kw == "enum" {
                    type_names.insert(name.clone());
                }
            }
        }
        Self {
            tokens,
            pos: 0,
            end,
            type_names,
        }
    }

    fn peek(&self) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, n: usize) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.position).unwrap_or(self.end)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Option<&'a TokenKind> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(&tok.kind)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.position(),
        }
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(TokenKind::Ident(s)) => s.clone(),
            Some(TokenKind::Symbol(s)) => s.to_string(),
            Some(TokenKind::Int(v)) => v.to_string(),
            Some(TokenKind::Double(v)) => v.to_string(),
            Some(TokenKind::Str(s)) => format!("\"{}\"", s),
            None => "end of input".to_string(),
        }
    }

    fn peek_symbol(&self, sym: &str) -> bool {
        matches!(self.peek(), Some(TokenKind::Symbol(s)) if *s == sym)
    }

    fn peek_symbol_at(&self, n: usize, sym: &str) -> bool {
        matches!(self.peek_at(n), Some(TokenKind::Symbol(s)) if *s == sym)
    }

    fn consume_symbol(&mut self, sym: &str) -> bool {
        if self.peek_symbol(sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, sym: &str) -> Result<(), ParseError> {
        if self.consume_symbol(sym) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{}', found '{}'",
                sym,
                self.describe_current()
            )))
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(TokenKind::Ident(s)) if s == keyword)
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{}', found '{}'",
                keyword,
                self.describe_current()
            )))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(TokenKind::Ident(name)) if !RESERVED.contains(&name.as_str()) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(self.error(format!(
                "expected identifier, found '{}'",
                self.describe_current()
            ))),
        }
    }

    fn is_type_name(&self, name: &str) -> bool {
        PRIMITIVE_TYPES.contains(&name) || self.type_names.contains(name)
    }

    // ----- declarations -----

    fn parse_program(&mut self) -> Result<Vec<Declaration>, ParseError> {
        let mut decls = Vec::new();
        while !self.at_end() {
            if self.consume_symbol(";") {
                continue;
            }
            if self.peek_keyword("enum") {
                decls.push(Declaration::Enum(self.parse_enum()?));
            } else if self.peek_keyword("class") || self.peek_keyword("struct") {
                if let Some(class) = self.parse_class()? {
                    decls.push(Declaration::Class(class));
                }
            } else if self.peek_keyword("template") {
                return Err(self.error("templates are not supported"));
            } else {
                decls.extend(self.parse_global()?);
            }
        }
        Ok(decls)
    }

    fn parse_enum(&mut self) -> Result<EnumDecl, ParseError> {
        self.expect_keyword("enum")?;
        let name = self.expect_ident()?;
        self.expect_symbol("{")?;
        let mut members = Vec::new();
        while !self.consume_symbol("}") {
            let member = self.expect_ident()?;
            let value = if self.consume_symbol("=") {
                Some(self.parse_ternary()?)
            } else {
                None
            };
            members.push(EnumMember {
                name: member,
                value,
            });
            if !self.consume_symbol(",") {
                self.expect_symbol("}")?;
                break;
            }
        }
        self.consume_symbol(";");
        Ok(EnumDecl { name, members })
    }

    fn parse_class(&mut self) -> Result<Option<ClassDecl>, ParseError> {
        let position = self.position();
        let is_struct = self.consume_keyword("struct");
        if !is_struct {
            self.expect_keyword("class")?;
        }
        let name = self.expect_ident()?;
        if self.consume_symbol(";") {
            // forward declaration
            return Ok(None);
        }
        let base = if self.consume_symbol(":") {
            let _ = self.consume_keyword("public")
                || self.consume_keyword("protected")
                || self.consume_keyword("private");
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect_symbol("{")?;

        let mut class = ClassDecl {
            name: name.clone(),
            base,
            is_struct,
            fields: Vec::new(),
            methods: Vec::new(),
            position,
        };
        let mut visibility = if is_struct {
            Visibility::Public
        } else {
            Visibility::Private
        };

        while !self.consume_symbol("}") {
            if self.at_end() {
                return Err(self.error(format!("unterminated class '{}'", name)));
            }
            if self.consume_symbol(";") {
                continue;
            }
            if let Some(v) = self.parse_visibility_label()? {
                visibility = v;
                continue;
            }
            self.parse_member(&mut class, visibility)?;
        }
        self.consume_symbol(";");
        Ok(Some(class))
    }

    fn parse_visibility_label(&mut self) -> Result<Option<Visibility>, ParseError> {
        let vis = match self.peek() {
            Some(TokenKind::Ident(s)) if s == "public" => Visibility::Public,
            Some(TokenKind::Ident(s)) if s == "protected" => Visibility::Protected,
            Some(TokenKind::Ident(s)) if s == "private" => Visibility::Private,
            _ => return Ok(None),
        };
        self.pos += 1;
        self.expect_symbol(":")?;
        Ok(Some(vis))
    }

    fn parse_member(
        &mut self,
        class: &mut ClassDecl,
        visibility: Visibility,
    ) -> Result<(), ParseError> {
        let mut is_virtual = false;
        let mut is_static = false;
        loop {
            if self.consume_keyword("virtual") {
                is_virtual = true;
            } else if self.consume_keyword("static") {
                is_static = true;
            } else if !self.consume_keyword("const") {
                break;
            }
        }

        // constructor / destructor
        let is_dtor = self.peek_symbol("~");
        let ctor_name_at = if is_dtor { 1 } else { 0 };
        if matches!(self.peek_at(ctor_name_at), Some(TokenKind::Ident(n)) if *n == class.name)
            && self.peek_symbol_at(ctor_name_at + 1, "(")
        {
            self.consume_symbol("~");
            self.pos += 1;
            let name = if is_dtor {
                format!("~{}", class.name)
            } else {
                class.name.clone()
            };
            let params = self.parse_params()?;
            let inits = if self.consume_symbol(":") {
                self.parse_initializer_list(class.base.as_deref())?
            } else {
                Vec::new()
            };
            let body = self.parse_optional_body()?.map(|mut body| {
                let mut all = inits;
                all.append(&mut body);
                all
            });
            class.methods.push(MethodDecl {
                name,
                return_type: TypeRef::named("void"),
                params,
                visibility,
                is_virtual,
                is_static: false,
                is_pure: false,
                body,
            });
            return Ok(());
        }

        let position = self.position();
        let ty = self.parse_type()?;
        let pointer_name = self.consume_symbol("*") || self.consume_symbol("&");
        let name = self.expect_ident()?;
        if self.peek_symbol("(") {
            let params = self.parse_params()?;
            self.consume_keyword("const");
            self.consume_keyword("override");
            self.consume_keyword("final");
            let mut is_pure = false;
            let body = if self.consume_symbol("=") {
                match self.advance() {
                    Some(TokenKind::Int(0)) => {}
                    _ => return Err(self.error("expected '0' after '=' in pure method")),
                }
                self.expect_symbol(";")?;
                is_pure = true;
                None
            } else {
                self.parse_optional_body()?
            };
            class.methods.push(MethodDecl {
                name,
                return_type: ty,
                params,
                visibility,
                is_virtual: is_virtual || is_pure,
                is_static,
                is_pure,
                body,
            });
            return Ok(());
        }

        let ty = TypeRef {
            pointer: ty.pointer || pointer_name,
            ..ty
        };
        let storage = is_static.then_some(Storage::Static);
        let fields = self.parse_declarators(storage, ty, name, position)?;
        self.expect_symbol(";")?;
        class.fields.extend(fields);
        Ok(())
    }

    /// `: field(expr), Base(args)` turned into leading constructor statements.
    fn parse_initializer_list(&mut self, base: Option<&str>) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let args = self.parse_args()?;
            if Some(name.as_str()) == base {
                stmts.push(Stmt::Expr(Expr::ScopedCall {
                    class: name.clone(),
                    name,
                    args,
                }));
            } else {
                let value = args
                    .into_iter()
                    .next()
                    .ok_or_else(|| self.error(format!("missing initializer for '{}'", name)))?;
                stmts.push(Stmt::Expr(Expr::Assign {
                    op: None,
                    target: Box::new(Expr::Member {
                        object: Box::new(Expr::This),
                        field: name,
                    }),
                    value: Box::new(value),
                }));
            }
            if !self.consume_symbol(",") {
                break;
            }
        }
        Ok(stmts)
    }

    fn parse_global(&mut self) -> Result<Vec<Declaration>, ParseError> {
        let position = self.position();
        let storage = if self.consume_keyword("static") {
            Some(Storage::Static)
        } else if self.consume_keyword("input") || self.consume_keyword("sinput") {
            Some(Storage::Input)
        } else if self.consume_keyword("extern") {
            Some(Storage::Extern)
        } else {
            None
        };
        let ty = self.parse_type()?;

        // out-of-line constructor: `CFoo::CFoo(...)`
        if self.consume_symbol("::") {
            let dtor = self.consume_symbol("~");
            let name = self.expect_ident()?;
            let name = if dtor { format!("~{}", name) } else { name };
            return Ok(vec![Declaration::Function(self.parse_function_rest(
                TypeRef::named("void"),
                name,
                Some(ty.name),
                position,
            )?)]);
        }

        let pointer_name = self.consume_symbol("*") || self.consume_symbol("&");
        let mut name = self.expect_ident()?;
        let mut class = None;
        if self.consume_symbol("::") {
            class = Some(name);
            let dtor = self.consume_symbol("~");
            let method = self.expect_ident()?;
            name = if dtor { format!("~{}", method) } else { method };
        }

        if self.peek_symbol("(") {
            return Ok(vec![Declaration::Function(
                self.parse_function_rest(ty, name, class, position)?,
            )]);
        }

        let ty = TypeRef {
            pointer: ty.pointer || pointer_name,
            ..ty
        };
        let vars = self.parse_declarators(storage, ty, name, position)?;
        self.expect_symbol(";")?;
        Ok(vars.into_iter().map(Declaration::Variable).collect())
    }

    fn parse_function_rest(
        &mut self,
        return_type: TypeRef,
        name: String,
        class: Option<String>,
        position: usize,
    ) -> Result<FunctionDecl, ParseError> {
        let params = self.parse_params()?;
        self.consume_keyword("const");
        let inits = if class.is_some() && self.consume_symbol(":") {
            self.parse_initializer_list(None)?
        } else {
            Vec::new()
        };
        let body = self.parse_optional_body()?.map(|mut body| {
            let mut all = inits;
            all.append(&mut body);
            all
        });
        Ok(FunctionDecl {
            return_type,
            name,
            class,
            params,
            body,
            position,
        })
    }

    fn parse_type(&mut self) -> Result<TypeRef, ParseError> {
        self.consume_keyword("const");
        self.consume_keyword("unsigned");
        let name = match self.peek() {
            Some(TokenKind::Ident(name)) if !RESERVED.contains(&name.as_str()) => name.clone(),
            _ => {
                return Err(self.error(format!(
                    "expected type name, found '{}'",
                    self.describe_current()
                )));
            }
        };
        self.pos += 1;
        let pointer = self.consume_symbol("*");
        Ok(TypeRef { name, pointer })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect_symbol("(")?;
        let mut params = Vec::new();
        if self.peek_keyword("void") && self.peek_symbol_at(1, ")") {
            self.pos += 1;
        }
        if self.consume_symbol(")") {
            return Ok(params);
        }
        loop {
            let ty = self.parse_type()?;
            let by_ref = self.consume_symbol("&");
            let pointer = self.consume_symbol("*");
            let name = self.expect_ident()?;
            let mut dimensions = Vec::new();
            while self.consume_symbol("[") {
                let extent = match self.peek() {
                    Some(TokenKind::Int(n)) => {
                        let n = *n as usize;
                        self.pos += 1;
                        Some(n)
                    }
                    _ => None,
                };
                self.expect_symbol("]")?;
                dimensions.push(extent);
            }
            let default = if self.consume_symbol("=") {
                Some(self.parse_ternary()?)
            } else {
                None
            };
            params.push(Param {
                ty: TypeRef {
                    pointer: ty.pointer || pointer,
                    ..ty
                },
                name,
                by_ref,
                dimensions,
                default,
            });
            if !self.consume_symbol(",") {
                break;
            }
        }
        self.expect_symbol(")")?;
        Ok(params)
    }

    fn parse_optional_body(&mut self) -> Result<Option<Vec<Stmt>>, ParseError> {
        if self.consume_symbol(";") {
            return Ok(None);
        }
        self.expect_symbol("{")?;
        let mut body = Vec::new();
        while !self.consume_symbol("}") {
            if self.at_end() {
                return Err(self.error("expected '}', found end of input"));
            }
            body.push(self.parse_statement()?);
        }
        Ok(Some(body))
    }

    /// Declarators after the type: `a = 1, b[10], *c`.
    fn parse_declarators(
        &mut self,
        storage: Option<Storage>,
        ty: TypeRef,
        first_name: String,
        position: usize,
    ) -> Result<Vec<VarDecl>, ParseError> {
        let mut decls = Vec::new();
        let mut name = first_name;
        let mut pointer = ty.pointer;
        loop {
            let mut dimensions = Vec::new();
            while self.consume_symbol("[") {
                if self.consume_symbol("]") {
                    dimensions.push(None);
                } else {
                    dimensions.push(Some(self.parse_expression()?));
                    self.expect_symbol("]")?;
                }
            }
            let mut init = None;
            let mut ctor_args = None;
            if self.consume_symbol("=") {
                init = Some(if self.peek_symbol("{") {
                    self.parse_brace_list()?
                } else {
                    self.parse_assignment()?
                });
            } else if self.peek_symbol("(") {
                ctor_args = Some(self.parse_args()?);
            }
            decls.push(VarDecl {
                storage,
                ty: TypeRef {
                    name: ty.name.clone(),
                    pointer,
                },
                name,
                dimensions,
                init,
                ctor_args,
                position,
            });
            if !self.consume_symbol(",") {
                break;
            }
            pointer = self.consume_symbol("*");
            self.consume_symbol("&");
            name = self.expect_ident()?;
        }
        Ok(decls)
    }

    fn parse_brace_list(&mut self) -> Result<Expr, ParseError> {
        self.expect_symbol("{")?;
        let mut items = Vec::new();
        while !self.consume_symbol("}") {
            items.push(if self.peek_symbol("{") {
                self.parse_brace_list()?
            } else {
                self.parse_assignment()?
            });
            if !self.consume_symbol(",") {
                self.expect_symbol("}")?;
                break;
            }
        }
        Ok(Expr::List(items))
    }

    // ----- statements -----

    fn is_declaration_start(&self) -> bool {
        match self.peek() {
            Some(TokenKind::Ident(word)) => {
                if word == "static" || word == "const" {
                    return true;
                }
                if RESERVED.contains(&word.as_str()) {
                    return false;
                }
                if PRIMITIVE_TYPES.contains(&word.as_str()) {
                    // `double(x)` is a cast expression
                    return !self.peek_symbol_at(1, "(");
                }
                match self.peek_at(1) {
                    Some(TokenKind::Ident(next)) => !RESERVED.contains(&next.as_str()),
                    Some(TokenKind::Symbol("*")) | Some(TokenKind::Symbol("&")) => {
                        self.type_names.contains(word)
                            && matches!(self.peek_at(2), Some(TokenKind::Ident(_)))
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn parse_local_declaration(&mut self) -> Result<Vec<VarDecl>, ParseError> {
        let position = self.position();
        let mut storage = None;
        loop {
            if self.consume_keyword("static") {
                storage = Some(Storage::Static);
            } else if !self.consume_keyword("const") {
                break;
            }
        }
        let ty = self.parse_type()?;
        let pointer = self.consume_symbol("*") || self.consume_symbol("&");
        let name = self.expect_ident()?;
        self.parse_declarators(
            storage,
            TypeRef {
                pointer: ty.pointer || pointer,
                ..ty
            },
            name,
            position,
        )
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect_symbol("{")?;
        let mut stmts = Vec::new();
        while !self.consume_symbol("}") {
            if self.at_end() {
                return Err(self.error("expected '}', found end of input"));
            }
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        self.expect_symbol("(")?;
        let cond = self.parse_expression()?;
        self.expect_symbol(")")?;
        Ok(cond)
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        if self.peek_symbol("{") {
            return Ok(Stmt::Block(self.parse_block()?));
        }
        if self.consume_symbol(";") {
            return Ok(Stmt::Empty);
        }
        if self.consume_keyword("if") {
            let cond = self.parse_condition()?;
            let then = Box::new(self.parse_statement()?);
            let otherwise = if self.consume_keyword("else") {
                Some(Box::new(self.parse_statement()?))
            } else {
                None
            };
            return Ok(Stmt::If {
                cond,
                then,
                otherwise,
            });
        }
        if self.consume_keyword("while") {
            let cond = self.parse_condition()?;
            let body = Box::new(self.parse_statement()?);
            return Ok(Stmt::While { cond, body });
        }
        if self.consume_keyword("do") {
            let body = Box::new(self.parse_statement()?);
            self.expect_keyword("while")?;
            let cond = self.parse_condition()?;
            self.expect_symbol(";")?;
            return Ok(Stmt::DoWhile { body, cond });
        }
        if self.consume_keyword("for") {
            return self.parse_for();
        }
        if self.consume_keyword("switch") {
            return self.parse_switch();
        }
        if self.consume_keyword("return") {
            if self.consume_symbol(";") {
                return Ok(Stmt::Return(None));
            }
            let value = self.parse_expression()?;
            self.expect_symbol(";")?;
            return Ok(Stmt::Return(Some(value)));
        }
        if self.consume_keyword("break") {
            self.expect_symbol(";")?;
            return Ok(Stmt::Break);
        }
        if self.consume_keyword("continue") {
            self.expect_symbol(";")?;
            return Ok(Stmt::Continue);
        }
        if self.is_declaration_start() {
            let decls = self.parse_local_declaration()?;
            self.expect_symbol(";")?;
            return Ok(Stmt::Decl(decls));
        }
        let expr = self.parse_expression()?;
        self.expect_symbol(";")?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.expect_symbol("(")?;
        let init = if self.consume_symbol(";") {
            None
        } else if self.is_declaration_start() {
            let decls = self.parse_local_declaration()?;
            self.expect_symbol(";")?;
            Some(Box::new(Stmt::Decl(decls)))
        } else {
            let mut exprs = vec![Stmt::Expr(self.parse_assignment()?)];
            while self.consume_symbol(",") {
                exprs.push(Stmt::Expr(self.parse_assignment()?));
            }
            self.expect_symbol(";")?;
            Some(Box::new(Stmt::Block(exprs)))
        };
        let cond = if self.peek_symbol(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_symbol(";")?;
        let mut post = Vec::new();
        if !self.peek_symbol(")") {
            post.push(self.parse_assignment()?);
            while self.consume_symbol(",") {
                post.push(self.parse_assignment()?);
            }
        }
        self.expect_symbol(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            cond,
            post,
            body,
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt, ParseError> {
        let subject = self.parse_condition()?;
        self.expect_symbol("{")?;
        let mut cases: Vec<SwitchCase> = Vec::new();
        while !self.consume_symbol("}") {
            if self.consume_keyword("case") {
                let label = self.parse_ternary()?;
                self.expect_symbol(":")?;
                cases.push(SwitchCase {
                    label: Some(label),
                    body: Vec::new(),
                });
            } else if self.consume_keyword("default") {
                self.expect_symbol(":")?;
                cases.push(SwitchCase {
                    label: None,
                    body: Vec::new(),
                });
            } else {
                let stmt = self.parse_statement()?;
                match cases.last_mut() {
                    Some(case) => case.body.push(stmt),
                    None => return Err(self.error("statement before first case label")),
                }
            }
        }
        Ok(Stmt::Switch { subject, cases })
    }

    // ----- expressions -----

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let target = self.parse_ternary()?;
        let op = match self.peek() {
            Some(TokenKind::Symbol("=")) => None,
            Some(TokenKind::Symbol(s)) => match compound_op(s) {
                Some(op) => Some(op),
                None => return Ok(target),
            },
            _ => return Ok(target),
        };
        if !matches!(
            target,
            Expr::Ident(_) | Expr::Index { .. } | Expr::Member { .. }
        ) {
            return Err(self.error("invalid assignment target"));
        }
        self.pos += 1;
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_binary(0)?;
        if self.consume_symbol("?") {
            let then = self.parse_assignment()?;
            self.expect_symbol(":")?;
            let otherwise = self.parse_assignment()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(cond)
    }

    fn parse_binary(&mut self, min_level: usize) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some(TokenKind::Symbol(sym)) = self.peek() else {
                break;
            };
            let Some((op, level)) = binary_op(sym) else {
                break;
            };
            if level < min_level {
                break;
            }
            self.pos += 1;
            let rhs = self.parse_binary(level + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if let Some(TokenKind::Symbol(sym)) = self.peek() {
            let op = match *sym {
                "-" => Some(UnaryOp::Neg),
                "+" => Some(UnaryOp::Plus),
                "!" => Some(UnaryOp::Not),
                "~" => Some(UnaryOp::BitNot),
                _ => None,
            };
            if let Some(op) = op {
                self.pos += 1;
                let expr = self.parse_unary()?;
                return Ok(Expr::Unary {
                    op,
                    expr: Box::new(expr),
                });
            }
            if *sym == "++" || *sym == "--" {
                let delta = if *sym == "++" { 1 } else { -1 };
                self.pos += 1;
                let target = self.parse_unary()?;
                return Ok(Expr::IncDec {
                    target: Box::new(target),
                    delta,
                    prefix: true,
                });
            }
            // address-of and dereference are transparent for reference values
            if *sym == "&" || *sym == "*" {
                self.pos += 1;
                return self.parse_unary();
            }
            if *sym == "(" && self.is_cast() {
                self.pos += 1;
                let ty = self.parse_type()?;
                self.expect_symbol(")")?;
                let expr = self.parse_unary()?;
                if PRIMITIVE_TYPES.contains(&ty.name.as_str()) {
                    return Ok(Expr::Cast {
                        ty: ty.name,
                        expr: Box::new(expr),
                    });
                }
                return Ok(expr);
            }
        }
        if self.consume_keyword("new") {
            let class = self.expect_ident()?;
            let args = if self.peek_symbol("(") {
                self.parse_args()?
            } else {
                Vec::new()
            };
            return Ok(Expr::New { class, args });
        }
        if self.consume_keyword("delete") {
            let expr = self.parse_unary()?;
            return Ok(Expr::Delete(Box::new(expr)));
        }
        self.parse_postfix()
    }

    fn is_cast(&self) -> bool {
        match self.peek_at(1) {
            Some(TokenKind::Ident(name)) => {
                let name = if name == "const" {
                    match self.peek_at(2) {
                        Some(TokenKind::Ident(n)) => n,
                        _ => return false,
                    }
                } else {
                    name
                };
                let offset = if self.peek_keyword_at(1, "const") { 3 } else { 2 };
                self.is_type_name(name)
                    && (self.peek_symbol_at(offset, ")")
                        || (self.peek_symbol_at(offset, "*")
                            && self.peek_symbol_at(offset + 1, ")")))
            }
            _ => false,
        }
    }

    fn peek_keyword_at(&self, n: usize, keyword: &str) -> bool {
        matches!(self.peek_at(n), Some(TokenKind::Ident(s)) if s == keyword)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect_symbol("(")?;
        let mut args = Vec::new();
        if self.consume_symbol(")") {
            return Ok(args);
        }
        loop {
            args.push(self.parse_assignment()?);
            if !self.consume_symbol(",") {
                break;
            }
        }
        self.expect_symbol(")")?;
        Ok(args)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.consume_symbol("[") {
                let index = self.parse_expression()?;
                self.expect_symbol("]")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.consume_symbol(".") || self.consume_symbol("->") {
                let name = self.expect_ident()?;
                if self.peek_symbol("(") {
                    let args = self.parse_args()?;
                    expr = Expr::MethodCall {
                        object: Box::new(expr),
                        method: name,
                        args,
                    };
                } else {
                    expr = Expr::Member {
                        object: Box::new(expr),
                        field: name,
                    };
                }
            } else if self.peek_symbol("++") || self.peek_symbol("--") {
                let delta = if self.consume_symbol("++") {
                    1
                } else {
                    self.pos += 1;
                    -1
                };
                expr = Expr::IncDec {
                    target: Box::new(expr),
                    delta,
                    prefix: false,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();
        let tok = self.advance().ok_or_else(|| ParseError {
            message: "expected expression, found end of input".into(),
            position,
        })?;
        match tok {
            TokenKind::Int(v) => Ok(Expr::Int(*v)),
            TokenKind::Double(v) => Ok(Expr::Double(*v)),
            TokenKind::Str(s) => {
                let mut s = s.clone();
                // adjacent literals concatenate
                while let Some(TokenKind::Str(next)) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Str(s))
            }
            TokenKind::Symbol("(") => {
                let expr = self.parse_expression()?;
                self.expect_symbol(")")?;
                Ok(expr)
            }
            TokenKind::Symbol("::") => {
                let name = self.expect_ident()?;
                let args = self.parse_args()?;
                Ok(Expr::Call { name, args })
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "NULL" => Ok(Expr::Null),
                "this" => Ok(Expr::This),
                _ if PRIMITIVE_TYPES.contains(&word.as_str()) && self.peek_symbol("(") => {
                    self.pos += 1;
                    let expr = self.parse_expression()?;
                    self.expect_symbol(")")?;
                    Ok(Expr::Cast {
                        ty: word.clone(),
                        expr: Box::new(expr),
                    })
                }
                _ if RESERVED.contains(&word.as_str()) => Err(ParseError {
                    message: format!("unexpected keyword '{}'", word),
                    position,
                }),
                _ => {
                    if self.consume_symbol("::") {
                        let name = self.expect_ident()?;
                        if self.peek_symbol("(") {
                            let args = self.parse_args()?;
                            return Ok(Expr::ScopedCall {
                                class: word.clone(),
                                name,
                                args,
                            });
                        }
                        return Ok(Expr::Ident(name));
                    }
                    if self.peek_symbol("(") {
                        let args = self.parse_args()?;
                        return Ok(Expr::Call {
                            name: word.clone(),
                            args,
                        });
                    }
                    Ok(Expr::Ident(word.clone()))
                }
            },
            TokenKind::Symbol(s) => Err(ParseError {
                message: format!("expected expression, found '{}'", s),
                position,
            }),
        }
    }
}

fn compound_op(sym: &str) -> Option<BinaryOp> {
    Some(match sym {
        "+=" => BinaryOp::Add,
        "-=" => BinaryOp::Sub,
        "*=" => BinaryOp::Mul,
        "/=" => BinaryOp::Div,
        "%=" => BinaryOp::Rem,
        "&=" => BinaryOp::BitAnd,
        "|=" => BinaryOp::BitOr,
        "^=" => BinaryOp::BitXor,
        "<<=" => BinaryOp::Shl,
        ">>=" => BinaryOp::Shr,
        _ => return None,
    })
}

/// Binary operator and its precedence level (higher binds tighter).
fn binary_op(sym: &str) -> Option<(BinaryOp, usize)> {
    Some(match sym {
        "||" => (BinaryOp::Or, 0),
        "&&" => (BinaryOp::And, 1),
        "|" => (BinaryOp::BitOr, 2),
        "^" => (BinaryOp::BitXor, 3),
        "&" => (BinaryOp::BitAnd, 4),
        "==" => (BinaryOp::Eq, 5),
        "!=" => (BinaryOp::Ne, 5),
        "<" => (BinaryOp::Lt, 6),
        ">" => (BinaryOp::Gt, 6),
        "<=" => (BinaryOp::Le, 6),
        ">=" => (BinaryOp::Ge, 6),
        "<<" => (BinaryOp::Shl, 7),
        ">>" => (BinaryOp::Shr, 7),
        "+" => (BinaryOp::Add, 8),
        "-" => (BinaryOp::Sub, 8),
        "*" => (BinaryOp::Mul, 9),
        "/" => (BinaryOp::Div, 9),
        "%" => (BinaryOp::Rem, 9),
        _ => return None,
    })
}

/// Parse a complete source file into declarations.
pub fn parse_program(source: &str) -> Result<ParsedProgram, ParseError> {
    let lexed = lex(source)?;
    let mut parser = Parser::new(&lexed.tokens, source.len());
    let declarations = parser.parse_program()?;
    Ok(ParsedProgram {
        declarations,
        properties: lexed.properties,
    })
}

/// Parse a standalone expression.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let lexed = lex(source)?;
    let mut parser = Parser::new(&lexed.tokens, source.len());
    let expr = parser.parse_expression()?;
    if !parser.at_end() {
        return Err(parser.error(format!(
            "unexpected '{}' after expression",
            parser.describe_current()
        )));
    }
    Ok(expr)
}

/// Parse a sequence of statements (a body without the surrounding braces).
pub fn parse_statements(source: &str) -> Result<Vec<Stmt>, ParseError> {
    let lexed = lex(source)?;
    let mut parser = Parser::new(&lexed.tokens, source.len());
    let mut stmts = Vec::new();
    while !parser.at_end() {
        stmts.push(parser.parse_statement()?);
    }
    Ok(stmts)
}

//! Statement execution over pre-parsed statement trees.

use crate::domain::error::MqlError;
use crate::domain::lang::ast::{Stmt, Storage, VarDecl};
use crate::domain::runtime::env::Frame;
use crate::domain::runtime::interpreter::Interpreter;
use crate::domain::runtime::value::{new_cell, Value};

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

impl Interpreter<'_> {
    /// Execute statements in order, stopping at the first non-normal flow.
    pub fn execute(&mut self, body: &[Stmt], frame: &mut Frame) -> Result<Flow, MqlError> {
        for stmt in body {
            match self.exec_stmt(stmt, frame)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, frame: &mut Frame) -> Result<Flow, MqlError> {
        match stmt {
            Stmt::Empty => Ok(Flow::Normal),
            Stmt::Block(stmts) => self.execute(stmts, frame),
            Stmt::Decl(decls) => {
                for decl in decls {
                    self.declare_local(decl, frame)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval(expr, frame)?;
                Ok(Flow::Normal)
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, frame)?.truthy() {
                    self.exec_stmt(then, frame)
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise, frame)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(cond, frame)?.truthy() {
                    match self.exec_stmt(body, frame)? {
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, cond } => {
                loop {
                    match self.exec_stmt(body, frame)? {
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(cond, frame)?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                if let Some(init) = init {
                    self.exec_stmt(init, frame)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !self.eval(cond, frame)?.truthy() {
                            break;
                        }
                    }
                    match self.exec_stmt(body, frame)? {
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                        Flow::Normal | Flow::Continue => {}
                    }
                    for expr in post {
                        self.eval(expr, frame)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Switch { subject, cases } => {
                let value = self.eval(subject, frame)?.unref();
                let mut start = None;
                for (i, case) in cases.iter().enumerate() {
                    if let Some(label) = &case.label {
                        if self.eval(label, frame)? == value {
                            start = Some(i);
                            break;
                        }
                    }
                }
                let start = start.or_else(|| cases.iter().position(|c| c.label.is_none()));
                if let Some(start) = start {
                    // fall through every case after the match
                    for case in &cases[start..] {
                        match self.execute(&case.body, frame)? {
                            Flow::Normal => {}
                            Flow::Break => return Ok(Flow::Normal),
                            other => return Ok(other),
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval(e, frame)?.unref(),
                    None => Value::Void,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
        }
    }

    /// Declare a local. Static locals are seeded once per callable and
    /// then rebound to the same cell on every later execution.
    fn declare_local(&mut self, decl: &VarDecl, frame: &mut Frame) -> Result<(), MqlError> {
        if self.runtime.is_class(&decl.ty.name) {
            frame
                .declared_classes
                .insert(decl.name.clone(), decl.ty.name.clone());
        }
        if decl.storage == Some(Storage::Static) {
            let key = frame.static_key.clone().unwrap_or_default();
            let cell = match self.runtime.static_cell(&key, &decl.name) {
                Some(cell) => cell,
                None => {
                    let cell = new_cell(self.initial_value(decl, frame)?);
                    self.runtime.insert_static(&key, &decl.name, cell.clone());
                    cell
                }
            };
            frame.bind_local(&decl.name, cell);
            return Ok(());
        }
        let value = self.initial_value(decl, frame)?;
        frame.declare(&decl.name, value);
        Ok(())
    }
}

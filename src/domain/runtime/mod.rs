//! Program model, name resolution, dispatch and the tree-walking
//! statement and expression interpreter.

pub mod constants;
pub mod env;
pub mod eval;
pub mod exec;
pub mod interpreter;
pub mod program;
pub mod value;

//! Source front end: tokenizer, syntax tree and recursive-descent parser.

pub mod ast;
pub mod lexer;
pub mod parser;

//! Cinder frontend: the untyped syntax tree handed over by the parser.
//!
//! The lexer and parser live outside this repository; they produce
//! [`ast::SourceFile`] values. [`AstBuilder`] constructs the same trees
//! programmatically for embedders and tests.

pub mod ast;
mod builder;

pub use ast::*;
pub use builder::AstBuilder;
pub use cinder_identity::{FileId, Interner, NodeId, PrimitiveType, Span, Symbol};

// errors.rs
//! Errors that abort a compilation. Problems in the program being compiled
//! are diagnostics, not errors.

use cinder_codegen::CodegenError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Codegen(#[from] CodegenError),
}

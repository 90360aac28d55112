//! Cinder compiler core: scope tree and name resolution, type checking with
//! generic specialization, and Cranelift code generation with ARC.
//!
//! The driver takes syntax trees from an external parser, runs semantic
//! analysis and, when no error was reported, lowers the checked program to a
//! native object file or to JIT-compiled code.

pub mod driver;
pub mod errors;
pub mod logging;

pub use driver::{CompileOutput, CompilerOptions, JitOutput, compile_jit, compile_module};
pub use errors::CompileError;
pub use logging::init_tracing;

pub use cinder_codegen as codegen;
pub use cinder_frontend as frontend;
pub use cinder_identity as identity;
pub use cinder_runtime as runtime;
pub use cinder_sema as sema;

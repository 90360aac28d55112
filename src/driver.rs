// driver.rs
//! Compilation pipeline: analysis, then code generation when analysis
//! reported no errors.

use cinder_codegen::{CodegenOptions, JitContext, generate_object};
use cinder_frontend::{Interner, SourceFile};
use cinder_sema::{Diagnostic, ProjectInput, analyze, has_errors};

use crate::errors::CompileError;

/// Options for one compilation.
#[derive(Clone, Debug, Default)]
pub struct CompilerOptions {
    pub codegen: CodegenOptions,
    /// Stop after analysis
    pub check_only: bool,
}

impl CompilerOptions {
    pub fn debug() -> Self {
        Self {
            codegen: CodegenOptions::debug(),
            check_only: false,
        }
    }

    pub fn release() -> Self {
        Self {
            codegen: CodegenOptions::release(),
            check_only: false,
        }
    }

    pub fn check_only() -> Self {
        Self {
            check_only: true,
            ..Self::debug()
        }
    }
}

/// Result of [`compile_module`].
#[derive(Debug, Default)]
pub struct CompileOutput {
    /// Native object file, absent when analysis reported an error or only
    /// checking was requested
    pub object: Option<Vec<u8>>,
    /// Errors, warnings and hints in report order
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }
}

/// Result of [`compile_jit`].
pub struct JitOutput {
    /// Compiled, callable code; absent when analysis reported an error
    pub jit: Option<JitContext>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Analyze `files` and emit a native object file for them.
///
/// Semantic problems never produce an `Err`: they are returned as
/// diagnostics and suppress code generation. `Err` means code generation
/// itself failed.
#[tracing::instrument(skip_all, fields(project = %project.name))]
pub fn compile_module(
    project: &ProjectInput,
    files: Vec<SourceFile>,
    interner: &mut Interner,
    options: &CompilerOptions,
) -> Result<CompileOutput, CompileError> {
    let analysis = analyze(project, files, interner);
    let diagnostics = analysis.diagnostics();
    if has_errors(&diagnostics) || options.check_only {
        tracing::debug!(diagnostics = diagnostics.len(), "skipping code generation");
        return Ok(CompileOutput {
            object: None,
            diagnostics,
        });
    }

    let object = generate_object(&analysis.program, &options.codegen)?;
    tracing::debug!(bytes = object.len(), "object emitted");
    Ok(CompileOutput {
        object: Some(object),
        diagnostics,
    })
}

/// Analyze `files` and JIT-compile them into the current process.
#[tracing::instrument(skip_all, fields(project = %project.name))]
pub fn compile_jit(
    project: &ProjectInput,
    files: Vec<SourceFile>,
    interner: &mut Interner,
    options: &CompilerOptions,
) -> Result<JitOutput, CompileError> {
    let analysis = analyze(project, files, interner);
    let diagnostics = analysis.diagnostics();
    if has_errors(&diagnostics) || options.check_only {
        return Ok(JitOutput { jit: None, diagnostics });
    }

    let mut jit = JitContext::with_options(options.codegen.clone())?;
    jit.compile(&analysis.program)?;
    Ok(JitOutput {
        jit: Some(jit),
        diagnostics,
    })
}

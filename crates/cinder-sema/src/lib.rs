//! Cinder semantic analysis: scope tree, name resolution, type checking and
//! generic specialization.

pub mod checked;
pub mod checker;
pub mod diagnostics;
pub mod errors;
pub mod project;
pub mod resolver;
pub mod scope_tree;
pub mod specialization;
pub mod types;

pub use checked::{
    AssignTarget, CheckedBlock, CheckedClass, CheckedExpr, CheckedExprKind, CheckedField, CheckedFunction,
    CheckedLocal, CheckedParam, CheckedProgram, CheckedStmt, Dispatch, FieldInit, MethodEntry,
};
pub use checker::{CheckOutput, Checker, MAX_INSTANTIATION_DEPTH};
pub use diagnostics::{Diagnostic, Severity, TypeError, TypeWarning, has_errors};
pub use errors::{SemanticError, SemanticWarning};
pub use project::{Dependency, ProjectInput};
pub use resolver::{ResolvedNames, Resolver, TypeRef};
pub use scope_tree::{FunctionKind, ScopeTree, StructureKind};
pub use specialization::{ClassKey, FunctionKey, SpecializationCache};
pub use types::Type;

use cinder_frontend::SourceFile;
use cinder_identity::Interner;

/// Everything semantic analysis produces for one compilation.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub tree: ScopeTree,
    pub program: CheckedProgram,
    pub errors: Vec<TypeError>,
    pub warnings: Vec<TypeWarning>,
}

impl Analysis {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Errors then warnings, flattened for reporting.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors
            .iter()
            .map(Diagnostic::from)
            .chain(self.warnings.iter().map(Diagnostic::from))
            .collect()
    }
}

/// Build the scope tree, resolve names and check every declaration.
#[tracing::instrument(skip_all, fields(project = %project.name, files = files.len()))]
pub fn analyze(project: &ProjectInput, files: Vec<SourceFile>, interner: &mut Interner) -> Analysis {
    let mut tree = ScopeTree::new(project, interner);
    tree.seed_dependencies(project, interner);

    let mut errors = Vec::new();
    for file in files {
        tree.register_file(file, &mut errors, interner);
    }

    let (resolved, resolve_errors) = Resolver::resolve(&tree, interner);
    errors.extend(resolve_errors);

    let mut checker = Checker::new(&mut tree, &resolved, interner);
    checker.check_all();
    let output = checker.finish();
    errors.extend(output.errors);

    tracing::debug!(
        errors = errors.len(),
        warnings = output.warnings.len(),
        "analysis finished"
    );
    Analysis {
        tree,
        program: output.program,
        errors,
        warnings: output.warnings,
    }
}

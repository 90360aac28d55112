//! Error and warning reporting helpers for the checker.

use cinder_identity::{Span, Symbol};

use super::Checker;
use crate::diagnostics::{TypeError, TypeWarning};
use crate::errors::{SemanticError, SemanticWarning};
use crate::types::Type;

impl Checker<'_> {
    /// Helper to add a type error
    pub(super) fn add_error(&mut self, error: SemanticError, span: Span) {
        self.errors.push(TypeError::new(error, span));
    }

    /// Helper to add a type warning
    pub(super) fn add_warning(&mut self, warning: SemanticWarning, span: Span) {
        self.warnings.push(TypeWarning::new(warning, span));
    }

    pub(super) fn display(&self, ty: Type) -> String {
        self.program.display_type(ty, &*self.tree, self.interner)
    }

    pub(super) fn name(&self, sym: Symbol) -> String {
        self.interner.resolve(sym).to_string()
    }

    /// Type mismatch between two known types. Unknown on either side was
    /// already reported and stays silent.
    pub(super) fn type_mismatch(&mut self, expected: Type, found: Type, span: Span) {
        if expected.is_unknown() || found.is_unknown() {
            return;
        }
        let expected = self.display(expected);
        self.type_error(&expected, found, span);
    }

    /// Type mismatch against a description such as "bool" or "a class".
    pub(super) fn type_error(&mut self, expected: &str, found: Type, span: Span) {
        if found.is_unknown() {
            return;
        }
        let found = self.display(found);
        self.add_error(
            SemanticError::UnexpectedType {
                expected: expected.to_string(),
                found,
                span: span.into(),
            },
            span,
        );
    }

    pub(super) fn symbol_missing(&mut self, name: String, span: Span) {
        self.add_error(
            SemanticError::SymbolDoesNotExist {
                name,
                span: span.into(),
            },
            span,
        );
    }

    pub(super) fn wrong_arity(&mut self, expected: usize, found: usize, span: Span) {
        self.add_error(
            SemanticError::WrongNumberOfArguments {
                expected,
                found,
                span: span.into(),
            },
            span,
        );
    }

    pub(super) fn internal_error(&mut self, message: impl Into<String>, span: Span) {
        let message = message.into();
        tracing::error!(%message, "internal checker error");
        self.add_error(
            SemanticError::Internal {
                message,
                span: span.into(),
            },
            span,
        );
    }
}

// diagnostics.rs
//
// Flat diagnostics handed to the driver.

use cinder_identity::Span;
use miette::Diagnostic as _;

use crate::errors::{SemanticError, SemanticWarning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Hint,
    Warning,
    Error,
}

/// One reported problem, detached from the error enums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Stable code such as `E2003`
    pub code: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// A type error wrapping a miette-enabled SemanticError
#[derive(Debug, Clone)]
pub struct TypeError {
    pub error: SemanticError,
    pub span: Span,
}

impl TypeError {
    /// Create a new type error
    pub fn new(error: SemanticError, span: Span) -> Self {
        Self { error, span }
    }
}

/// A type warning wrapping a miette-enabled SemanticWarning
#[derive(Debug, Clone)]
pub struct TypeWarning {
    pub warning: SemanticWarning,
    pub span: Span,
}

impl TypeWarning {
    /// Create a new type warning
    pub fn new(warning: SemanticWarning, span: Span) -> Self {
        Self { warning, span }
    }
}

impl From<&TypeError> for Diagnostic {
    fn from(error: &TypeError) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: error.error.to_string(),
            code: error
                .error
                .code()
                .map(|code| code.to_string())
                .unwrap_or_default(),
            span: error.span,
        }
    }
}

impl From<&TypeWarning> for Diagnostic {
    fn from(warning: &TypeWarning) -> Self {
        Diagnostic {
            severity: warning.warning.severity(),
            message: warning.warning.to_string(),
            code: warning
                .warning
                .code()
                .map(|code| code.to_string())
                .unwrap_or_default(),
            span: warning.span,
        }
    }
}

/// True if any diagnostic blocks code generation.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_diagnostic_carries_code_and_message() {
        let span = Span::default();
        let error = TypeError::new(
            SemanticError::WrongNumberOfArguments {
                expected: 1,
                found: 2,
                span: span.into(),
            },
            span,
        );
        let diagnostic = Diagnostic::from(&error);
        assert_eq!(diagnostic.code, "E2005");
        assert_eq!(diagnostic.message, "expected 1 arguments, found 2");
        assert!(diagnostic.is_error());
        assert!(has_errors(&[diagnostic]));
    }

    #[test]
    fn shadowing_is_a_hint() {
        let span = Span::default();
        let warning = TypeWarning::new(
            SemanticWarning::ShadowedBinding {
                name: "x".into(),
                span: span.into(),
            },
            span,
        );
        let diagnostic = Diagnostic::from(&warning);
        assert_eq!(diagnostic.severity, Severity::Hint);
        assert_eq!(diagnostic.code, "W3002");
        assert!(!has_errors(&[diagnostic]));
    }
}

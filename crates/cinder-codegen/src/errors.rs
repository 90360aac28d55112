// errors.rs
//! Code generation errors.
//!
//! Codegen only runs on programs that passed semantic analysis, so every
//! error here is an internal compiler error: a placeholder, unknown type or
//! missing body that should never have reached lowering.
//!
//! Error code ranges:
//! - E2xxx: Semantic errors
//! - E3xxx: Codegen errors (this module)

use std::fmt;

use cinder_identity::Span;
use miette::{Diagnostic, LabeledSpan};
use thiserror::Error;

/// The kind of code generation error.
#[derive(Debug, Clone)]
pub enum CodegenErrorKind {
    /// Construct the backend cannot lower
    UnsupportedFeature {
        feature: &'static str,
        context: Option<String>,
    },

    /// Type that has no machine representation (unknown, void as a value)
    TypeMismatch {
        context: &'static str,
        found: String,
    },

    /// Function, class or runtime symbol not found
    NotFound { kind: &'static str, name: String },

    /// Internal invariant violation (compiler bug)
    InternalError {
        message: &'static str,
        context: Option<String>,
    },
}

/// Code generation error with optional source span for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct CodegenError {
    pub kind: CodegenErrorKind,
    /// Source location where the error occurred, if available.
    pub span: Option<Span>,
}

pub type CodegenResult<T> = Result<T, CodegenError>;

impl CodegenError {
    pub fn unsupported(feature: &'static str) -> Self {
        CodegenErrorKind::UnsupportedFeature {
            feature,
            context: None,
        }
        .into()
    }

    pub fn unsupported_with_context(feature: &'static str, context: impl Into<String>) -> Self {
        CodegenErrorKind::UnsupportedFeature {
            feature,
            context: Some(context.into()),
        }
        .into()
    }

    pub fn type_mismatch(context: &'static str, found: impl Into<String>) -> Self {
        CodegenErrorKind::TypeMismatch {
            context,
            found: found.into(),
        }
        .into()
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        CodegenErrorKind::NotFound {
            kind,
            name: name.into(),
        }
        .into()
    }

    pub fn internal(message: &'static str) -> Self {
        CodegenErrorKind::InternalError {
            message,
            context: None,
        }
        .into()
    }

    pub fn internal_with_context(message: &'static str, context: impl Into<String>) -> Self {
        CodegenErrorKind::InternalError {
            message,
            context: Some(context.into()),
        }
        .into()
    }

    /// Wrap a Cranelift module or ISA error
    pub fn cranelift(e: impl fmt::Display) -> Self {
        CodegenErrorKind::InternalError {
            message: "cranelift error",
            context: Some(e.to_string()),
        }
        .into()
    }

    /// Attach a source span to this error for diagnostics.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

impl From<CodegenErrorKind> for CodegenError {
    fn from(kind: CodegenErrorKind) -> Self {
        CodegenError { kind, span: None }
    }
}

impl Diagnostic for CodegenError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code: &'static str = match &self.kind {
            CodegenErrorKind::UnsupportedFeature { .. } => "E3001",
            CodegenErrorKind::TypeMismatch { .. } => "E3003",
            CodegenErrorKind::NotFound { .. } => "E3004",
            CodegenErrorKind::InternalError { .. } => "E3005",
        };
        Some(Box::new(code))
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        let label = match &self.kind {
            CodegenErrorKind::UnsupportedFeature { feature, .. } => format!("{feature} is not supported"),
            CodegenErrorKind::TypeMismatch { found, .. } => format!("found {found}"),
            CodegenErrorKind::NotFound { kind, .. } => format!("{kind} not found"),
            CodegenErrorKind::InternalError { .. } => "internal error here".to_string(),
        };
        Some(Box::new(std::iter::once(LabeledSpan::new(
            Some(label),
            span.start,
            span.len(),
        ))))
    }
}

impl fmt::Display for CodegenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenErrorKind::UnsupportedFeature { feature, context } => {
                write!(f, "unsupported: {feature}")?;
                if let Some(ctx) = context {
                    write!(f, " ({ctx})")?;
                }
                Ok(())
            }
            CodegenErrorKind::TypeMismatch { context, found } => {
                write!(f, "{context}: no machine type for {found}")
            }
            CodegenErrorKind::NotFound { kind, name } => write!(f, "{kind} not found: {name}"),
            CodegenErrorKind::InternalError { message, context } => {
                write!(f, "internal error: {message}")?;
                if let Some(ctx) = context {
                    write!(f, " ({ctx})")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_kind() {
        let err = CodegenError::internal("placeholder class reached codegen");
        assert_eq!(err.code().map(|c| c.to_string()).as_deref(), Some("E3005"));
        let err = CodegenError::not_found("function", "main");
        assert_eq!(err.to_string(), "function not found: main");
    }

    #[test]
    fn span_becomes_label() {
        let span = Span::new(cinder_identity::FileId::new(0), 4, 9, 1, 5);
        let err = CodegenError::unsupported("f64 remainder").with_span(span);
        let labels: Vec<_> = err.labels().map(|l| l.collect()).unwrap_or_default();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].offset(), 4);
        assert_eq!(labels[0].len(), 5);
    }
}

// errors.rs
//! Semantic analysis errors (E2xxx) and warnings (W3xxx).

#![allow(unused_assignments)] // False positives from thiserror derive

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::diagnostics::Severity;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum SemanticError {
    #[error("cannot find '{name}' in this scope")]
    #[diagnostic(code(E2001))]
    SymbolDoesNotExist {
        name: String,
        #[label("not found")]
        span: SourceSpan,
    },

    #[error("'{name}' is already declared in this scope")]
    #[diagnostic(code(E2002))]
    SymbolAlreadyExists {
        name: String,
        #[label("redeclared here")]
        span: SourceSpan,
    },

    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(E2003))]
    UnexpectedType {
        expected: String,
        found: String,
        #[label("type mismatch")]
        span: SourceSpan,
    },

    #[error("cannot infer type of '{name}'")]
    #[diagnostic(code(E2004), help("add an explicit type annotation"))]
    UnableToInferType {
        name: String,
        #[label("type annotations needed")]
        span: SourceSpan,
    },

    #[error("expected {expected} arguments, found {found}")]
    #[diagnostic(code(E2005))]
    WrongNumberOfArguments {
        expected: usize,
        found: usize,
        #[label("wrong number of arguments")]
        span: SourceSpan,
    },

    #[error("expected {expected} type arguments, found {found}")]
    #[diagnostic(code(E2006))]
    WrongNumberOfTypeArguments {
        expected: usize,
        found: usize,
        #[label("wrong number of type arguments")]
        span: SourceSpan,
    },

    #[error("cannot inherit from {name}: {reason}")]
    #[diagnostic(code(E2007))]
    UnableToInherit {
        name: String,
        reason: String,
        #[label("invalid ancestor")]
        span: SourceSpan,
    },

    #[error("method '{name}' overrides a non-virtual method")]
    #[diagnostic(
        code(E2008),
        help("mark the base method 'virtual' or rename this method")
    )]
    CannotOverrideNonVirtual {
        name: String,
        #[label("base method is not virtual")]
        span: SourceSpan,
    },

    #[error("method '{name}' overrides a virtual method without 'override'")]
    #[diagnostic(code(E2009), help("add the 'override' keyword"))]
    ExpectedOverride {
        name: String,
        #[label("missing 'override'")]
        span: SourceSpan,
    },

    #[error("method '{name}' is marked 'override' but no base method exists")]
    #[diagnostic(code(E2010))]
    NoMethodToOverride {
        name: String,
        #[label("nothing to override")]
        span: SourceSpan,
    },

    #[error("'virtual' is only allowed on class methods")]
    #[diagnostic(code(E2011))]
    MisplacedVirtual {
        #[label("not a class method")]
        span: SourceSpan,
    },

    #[error("'override' is only allowed on class methods")]
    #[diagnostic(code(E2012))]
    MisplacedOverride {
        #[label("not a class method")]
        span: SourceSpan,
    },

    #[error("'self' is only available inside methods")]
    #[diagnostic(code(E2013))]
    MisplacedSelf {
        #[label("no receiver here")]
        span: SourceSpan,
    },

    #[error("'{path}' is not a namespace")]
    #[diagnostic(code(E2014))]
    InvalidModulePath {
        path: String,
        #[label("unknown namespace")]
        span: SourceSpan,
    },

    #[error("class '{class}' does not implement '{method}' required by '{protocol}'")]
    #[diagnostic(code(E2015))]
    ProtocolNotSatisfied {
        class: String,
        protocol: String,
        method: String,
        #[label("missing protocol method")]
        span: SourceSpan,
    },

    #[error("instantiating '{name}' exceeds the depth limit of {limit}")]
    #[diagnostic(code(E2016), help("a generic type expands into itself without bound"))]
    InstantiationTooDeep {
        name: String,
        limit: u32,
        #[label("infinitely expanding instantiation")]
        span: SourceSpan,
    },

    #[error("invalid assignment target")]
    #[diagnostic(code(E2017))]
    NotAssignable {
        #[label("cannot assign to this expression")]
        span: SourceSpan,
    },

    #[error("internal compiler error: {message}")]
    #[diagnostic(code(E2999))]
    Internal {
        message: String,
        #[label("here")]
        span: SourceSpan,
    },
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum SemanticWarning {
    #[error("unreachable code")]
    #[diagnostic(code(W3001))]
    UnreachableCode {
        #[label("this statement is never executed")]
        span: SourceSpan,
    },

    #[error("'{name}' shadows an outer binding")]
    #[diagnostic(code(W3002))]
    ShadowedBinding {
        name: String,
        #[label("shadows an earlier declaration")]
        span: SourceSpan,
    },
}

impl SemanticWarning {
    pub fn severity(&self) -> Severity {
        match self {
            SemanticWarning::UnreachableCode { .. } => Severity::Warning,
            SemanticWarning::ShadowedBinding { .. } => Severity::Hint,
        }
    }
}

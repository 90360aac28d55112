// lib.rs
//
// Foundational identities shared by every phase of the compiler:
// source spans, interned symbols and arena indices.

mod entities;
mod intern;
mod primitive_type;
mod span;
mod symbol;

pub use entities::{
    ClassInstId, FuncInstId, FunctionSymbolId, LocalId, NamespaceId, NodeId, ScopeId, StructureId,
};
pub use intern::Interner;
pub use primitive_type::PrimitiveType;
pub use span::{FileId, Span};
pub use symbol::Symbol;

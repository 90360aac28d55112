// types.rs
//
// Semantic types. Type parameters never appear here: every checked body is
// built for one concrete substitution.

use cinder_identity::{ClassInstId, PrimitiveType, StructureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveType),
    /// A checked class instantiation
    Class(ClassInstId),
    Protocol(StructureId),
    Enum(StructureId),
    /// Error sentinel; compatible with everything
    Unknown,
}

impl Type {
    pub const VOID: Type = Type::Primitive(PrimitiveType::Void);
    pub const BOOL: Type = Type::Primitive(PrimitiveType::Bool);
    pub const I32: Type = Type::Primitive(PrimitiveType::I32);
    pub const I64: Type = Type::Primitive(PrimitiveType::I64);
    pub const F64: Type = Type::Primitive(PrimitiveType::F64);
    pub const STRING: Type = Type::Primitive(PrimitiveType::String);

    pub fn is_unknown(self) -> bool {
        self == Type::Unknown
    }

    pub fn is_void(self) -> bool {
        self == Type::VOID
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Primitive(p) if p.is_numeric())
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Type::Primitive(p) if p.is_integer())
    }

    /// Heap values managed by retain/release.
    pub fn is_reference(self) -> bool {
        match self {
            Type::Primitive(p) => p.is_reference(),
            Type::Class(_) | Type::Protocol(_) => true,
            Type::Enum(_) | Type::Unknown => false,
        }
    }

    pub fn as_class(self) -> Option<ClassInstId> {
        match self {
            Type::Class(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_kinds() {
        assert!(Type::STRING.is_reference());
        assert!(Type::Class(ClassInstId::new(0)).is_reference());
        assert!(Type::Protocol(StructureId::new(1)).is_reference());
        assert!(!Type::Enum(StructureId::new(2)).is_reference());
        assert!(!Type::I64.is_reference());
        assert!(!Type::Unknown.is_reference());
    }

    #[test]
    fn numeric_kinds() {
        assert!(Type::I32.is_integer());
        assert!(Type::F64.is_numeric());
        assert!(!Type::F64.is_integer());
        assert!(!Type::BOOL.is_numeric());
    }
}

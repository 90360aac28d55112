// primitive_type.rs
//
// Primitive type enumeration shared across all compiler crates.

/// Enumeration of primitive types in the Cinder type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    I32,
    I64,
    F64,
    Bool,
    String,
    Void,
}

impl PrimitiveType {
    /// Get the keyword string for this primitive type.
    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveType::I32 => "i32",
            PrimitiveType::I64 => "i64",
            PrimitiveType::F64 => "f64",
            PrimitiveType::Bool => "bool",
            PrimitiveType::String => "string",
            PrimitiveType::Void => "void",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "i32" => PrimitiveType::I32,
            "i64" => PrimitiveType::I64,
            "f64" => PrimitiveType::F64,
            "bool" => PrimitiveType::Bool,
            "string" => PrimitiveType::String,
            "void" => PrimitiveType::Void,
            _ => return None,
        })
    }

    pub fn is_integer(self) -> bool {
        matches!(self, PrimitiveType::I32 | PrimitiveType::I64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self == PrimitiveType::F64
    }

    /// Heap-allocated, reference-counted primitives.
    pub fn is_reference(self) -> bool {
        self == PrimitiveType::String
    }
}

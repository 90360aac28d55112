// types.rs
//
// Mapping from semantic types to Cranelift machine types.

use cinder_identity::PrimitiveType;
use cinder_sema::{CheckedFunction, Type};
use cranelift::prelude::{AbiParam, Signature, Type as ClifType, types};
use smallvec::SmallVec;

use crate::errors::{CodegenError, CodegenResult};

/// Machine type of a value, or `None` for `void`.
pub(crate) fn cranelift_type(ty: Type, ptr: ClifType) -> CodegenResult<Option<ClifType>> {
    let clif = match ty {
        Type::Primitive(PrimitiveType::Void) => return Ok(None),
        Type::Primitive(PrimitiveType::Bool) => types::I8,
        Type::Primitive(PrimitiveType::I32) => types::I32,
        Type::Primitive(PrimitiveType::I64) => types::I64,
        Type::Primitive(PrimitiveType::F64) => types::F64,
        Type::Primitive(PrimitiveType::String) | Type::Class(_) | Type::Protocol(_) => ptr,
        // Enums are their discriminant
        Type::Enum(_) => types::I32,
        Type::Unknown => return Err(CodegenError::type_mismatch("lowering", "unknown type")),
    };
    Ok(Some(clif))
}

/// Machine type of a value that must exist (not `void`).
pub(crate) fn value_type(ty: Type, ptr: ClifType) -> CodegenResult<ClifType> {
    cranelift_type(ty, ptr)?.ok_or_else(|| CodegenError::type_mismatch("value", "void"))
}

/// Size and alignment in bytes of a field or stack slot of type `ty`.
pub(crate) fn size_of(ty: ClifType) -> u32 {
    ty.bytes()
}

/// ABI parameter list of a function instance: receiver first, then the
/// declared parameters.
pub(crate) fn param_types(function: &CheckedFunction, ptr: ClifType) -> CodegenResult<SmallVec<[ClifType; 4]>> {
    let mut params = SmallVec::new();
    if let Some(receiver) = function.receiver {
        params.push(value_type(receiver, ptr)?);
    }
    for param in &function.params {
        params.push(value_type(param.ty, ptr)?);
    }
    Ok(params)
}

/// Fill `sig` with the ABI signature of `function`.
pub(crate) fn function_signature(function: &CheckedFunction, ptr: ClifType, sig: &mut Signature) -> CodegenResult<()> {
    for param in param_types(function, ptr)? {
        sig.params.push(AbiParam::new(param));
    }
    if let Some(ret) = cranelift_type(function.return_type, ptr)? {
        sig.returns.push(AbiParam::new(ret));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_identity::{ClassInstId, StructureId};

    #[test]
    fn primitive_mapping() {
        let ptr = types::I64;
        assert_eq!(cranelift_type(Type::VOID, ptr).ok(), Some(None));
        assert_eq!(cranelift_type(Type::BOOL, ptr).ok(), Some(Some(types::I8)));
        assert_eq!(cranelift_type(Type::I32, ptr).ok(), Some(Some(types::I32)));
        assert_eq!(cranelift_type(Type::F64, ptr).ok(), Some(Some(types::F64)));
        assert_eq!(cranelift_type(Type::STRING, ptr).ok(), Some(Some(ptr)));
    }

    #[test]
    fn references_are_pointers() {
        let ptr = types::I32;
        assert_eq!(value_type(Type::Class(ClassInstId::new(3)), ptr).ok(), Some(ptr));
        assert_eq!(value_type(Type::Protocol(StructureId::new(1)), ptr).ok(), Some(ptr));
        assert_eq!(value_type(Type::Enum(StructureId::new(1)), ptr).ok(), Some(types::I32));
    }

    #[test]
    fn unknown_and_void_values_are_errors() {
        assert!(cranelift_type(Type::Unknown, types::I64).is_err());
        assert!(value_type(Type::VOID, types::I64).is_err());
    }
}

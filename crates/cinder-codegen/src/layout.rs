// layout.rs
//
// Object layout of checked classes. Fields follow the runtime object header
// in declaration order, ancestors' fields first, each at its natural
// alignment. A subclass therefore shares its ancestor's layout as a prefix.

use cinder_runtime::OBJECT_HEADER_SIZE;
use cinder_sema::{CheckedClass, CheckedProgram};
use cranelift::prelude::Type as ClifType;

use crate::errors::{CodegenError, CodegenResult};
use crate::types::{size_of, value_type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    /// Byte offset from the start of the object
    pub offset: i32,
    pub ty: ClifType,
    /// Retained on store, released by the class's drop function
    pub is_reference: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    /// Allocation size including the object header
    pub size: u32,
    /// Indexed by the checked field index
    pub fields: Vec<FieldLayout>,
}

impl StructLayout {
    pub fn compute(class: &CheckedClass, ptr: ClifType) -> CodegenResult<Self> {
        if class.in_progress {
            return Err(CodegenError::internal_with_context(
                "placeholder class reached codegen",
                class.display_name.clone(),
            ));
        }
        let mut cursor = OBJECT_HEADER_SIZE;
        let mut fields = Vec::with_capacity(class.fields.len());
        for field in &class.fields {
            let ty = value_type(field.ty, ptr).map_err(|e| e.with_span(field.span))?;
            let size = size_of(ty);
            cursor = align_up(cursor, size);
            fields.push(FieldLayout {
                offset: cursor as i32,
                ty,
                is_reference: field.ty.is_reference(),
            });
            cursor += size;
        }
        Ok(Self {
            size: align_up(cursor, 8),
            fields,
        })
    }

    pub fn field(&self, index: usize) -> CodegenResult<FieldLayout> {
        self.fields
            .get(index)
            .copied()
            .ok_or_else(|| CodegenError::internal_with_context("field index out of range", index.to_string()))
    }

    /// Offsets of the fields the drop function releases.
    pub fn reference_offsets(&self) -> impl Iterator<Item = i32> + '_ {
        self.fields.iter().filter(|f| f.is_reference).map(|f| f.offset)
    }
}

fn align_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Layouts of every class instance, indexed by `ClassInstId`.
pub fn compute_layouts(program: &CheckedProgram, ptr: ClifType) -> CodegenResult<Vec<StructLayout>> {
    program
        .classes
        .iter()
        .map(|class| StructLayout::compute(class, ptr))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(32, 8), 32);
        assert_eq!(align_up(33, 4), 36);
        assert_eq!(align_up(37, 1), 37);
        assert_eq!(align_up(41, 8), 48);
    }
}

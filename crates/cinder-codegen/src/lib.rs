//! Cinder code generation: Cranelift lowering of checked programs, for the
//! JIT and for native object files.

mod calls;
pub mod compiler;
mod context;
pub mod errors;
mod expr;
pub mod jit;
pub mod layout;
pub mod object;
pub mod options;
mod rc_scope;
pub mod runtime_registry;
mod stmt;
mod types;
mod vtable;

pub use compiler::{CodeGenerator, GeneratedModule};
pub use errors::{CodegenError, CodegenErrorKind, CodegenResult};
pub use jit::JitContext;
pub use layout::{FieldLayout, StructLayout, compute_layouts};
pub use object::{ObjectEmitter, generate_object};
pub use options::CodegenOptions;
pub use runtime_registry::RuntimeKey;

/// User trap codes raised by generated code.
pub mod trap_codes {
    use cranelift::prelude::TrapCode;

    /// Control reached the end of a path every branch of which returned
    pub const UNREACHABLE: TrapCode = TrapCode::unwrap_user(1);
}

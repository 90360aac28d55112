// object.rs
//
// Ahead-of-time backend: the same lowering as the JIT, written to a native
// relocatable object file. Runtime functions stay undefined imports for the
// linker to resolve against the runtime library.

use cinder_sema::CheckedProgram;
use cranelift_module::default_libcall_names;
use cranelift_object::{ObjectBuilder, ObjectModule};

use crate::compiler::CodeGenerator;
use crate::errors::{CodegenError, CodegenResult};
use crate::options::{CodegenOptions, native_isa};

pub struct ObjectEmitter {
    module: ObjectModule,
    options: CodegenOptions,
    ir: Vec<(String, String)>,
}

impl ObjectEmitter {
    pub fn new(options: CodegenOptions) -> CodegenResult<Self> {
        let isa = native_isa(&options, true)?;
        let builder = ObjectBuilder::new(isa, options.object_name.clone(), default_libcall_names())
            .map_err(CodegenError::cranelift)?;
        Ok(Self {
            module: ObjectModule::new(builder),
            options,
            ir: Vec::new(),
        })
    }

    pub fn compile(&mut self, program: &CheckedProgram) -> CodegenResult<()> {
        let generated = CodeGenerator::new(&mut self.module, program, &self.options).generate()?;
        self.ir.extend(generated.ir);
        Ok(())
    }

    pub fn ir(&self) -> &[(String, String)] {
        &self.ir
    }

    /// Object file bytes in the host's native format.
    pub fn finish(self) -> CodegenResult<Vec<u8>> {
        self.module.finish().emit().map_err(CodegenError::cranelift)
    }
}

/// Compile `program` into the bytes of a native object file.
#[tracing::instrument(skip_all, fields(object = %options.object_name))]
pub fn generate_object(program: &CheckedProgram, options: &CodegenOptions) -> CodegenResult<Vec<u8>> {
    let mut emitter = ObjectEmitter::new(options.clone())?;
    emitter.compile(program)?;
    emitter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_frontend::{AstBuilder, Decl};
    use cinder_sema::{ProjectInput, analyze};

    #[test]
    fn empty_program_still_produces_an_object() {
        let bytes = generate_object(&CheckedProgram::default(), &CodegenOptions::debug()).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn exported_function_names_appear_in_the_object() {
        let b = AstBuilder::new();
        let answer = b.func("answer", vec![], Some(b.i64_ty()), b.block(vec![], Some(b.int(42))));
        let file = b.file("", vec![], vec![Decl::Function(answer)]);
        let mut interner = b.into_interner();
        let analysis = analyze(&ProjectInput::new("app"), vec![file], &mut interner);
        assert!(analysis.errors.is_empty());

        let bytes = generate_object(&analysis.program, &CodegenOptions::release()).unwrap();
        assert!(bytes.windows(b"answer".len()).any(|w| w == b"answer"));
    }
}

// compiler.rs
//
// Module-level driver: declares everything a checked program needs in a
// Cranelift module and defines every function body. Generic over the module
// so the JIT and the object backend share it.

use cinder_sema::CheckedProgram;
use cranelift::prelude::*;
use cranelift_codegen::ir::UserFuncName;
use cranelift_module::{DataId, FuncId, Linkage, Module};
use rustc_hash::FxHashMap;

use crate::context::{CodegenState, FunctionLowering};
use crate::errors::{CodegenError, CodegenResult};
use crate::layout::compute_layouts;
use crate::options::CodegenOptions;
use crate::runtime_registry::{AbiTy, RuntimeKey, signature_for};
use crate::types::function_signature;
use crate::vtable::{define_drop_fns, define_vtables};

/// What a generator leaves behind once every function is defined.
#[derive(Debug, Default)]
pub struct GeneratedModule {
    /// Link name to function id, for every function of the program
    pub functions: FxHashMap<String, FuncId>,
    /// `(link name, IR text)` when IR capture is enabled
    pub ir: Vec<(String, String)>,
}

pub struct CodeGenerator<'a, M: Module> {
    module: &'a mut M,
    program: &'a CheckedProgram,
    options: &'a CodegenOptions,
    ctx: codegen::Context,
    builder_ctx: FunctionBuilderContext,
    strings: FxHashMap<String, DataId>,
}

impl<'a, M: Module> CodeGenerator<'a, M> {
    pub fn new(module: &'a mut M, program: &'a CheckedProgram, options: &'a CodegenOptions) -> Self {
        let ctx = module.make_context();
        Self {
            module,
            program,
            options,
            ctx,
            builder_ctx: FunctionBuilderContext::new(),
            strings: FxHashMap::default(),
        }
    }

    #[tracing::instrument(skip_all)]
    pub fn generate(mut self) -> CodegenResult<GeneratedModule> {
        tracing::debug!(
            classes = self.program.classes.len(),
            functions = self.program.functions.len(),
            "generating module"
        );
        let ptr = self.module.target_config().pointer_type();
        let layouts = compute_layouts(self.program, ptr)?;
        let runtime = self.import_runtime(ptr)?;
        let functions = self.declare_functions(ptr)?;

        let release = runtime
            .get(&RuntimeKey::Release)
            .copied()
            .ok_or_else(|| CodegenError::not_found("runtime function", RuntimeKey::Release.name()))?;
        let drop_fns = define_drop_fns(
            self.module,
            &mut self.ctx,
            &mut self.builder_ctx,
            self.program,
            &layouts,
            release,
        )?;
        let vtables = define_vtables(self.module, self.program, &functions)?;

        let state = CodegenState {
            program: self.program,
            ptr,
            layouts,
            functions,
            vtables,
            drop_fns,
            runtime,
        };

        let mut ir = Vec::new();
        for (index, function) in self.program.functions.iter().enumerate() {
            let func_id = state.functions[index];

            self.ctx.func.signature = self.module.make_signature();
            function_signature(function, ptr, &mut self.ctx.func.signature)
                .map_err(|e| e.with_span(function.span))?;
            self.ctx.func.name = UserFuncName::user(0, func_id.as_u32());

            let builder = FunctionBuilder::new(&mut self.ctx.func, &mut self.builder_ctx);
            FunctionLowering::new(builder, self.module, &state, &mut self.strings, function)
                .lower_function()
                .map_err(|e| match e.span {
                    Some(_) => e,
                    None => e.with_span(function.span),
                })?;

            if self.options.capture_ir {
                ir.push((function.link_name.clone(), self.ctx.func.display().to_string()));
            }
            self.module
                .define_function(func_id, &mut self.ctx)
                .map_err(|e| {
                    CodegenError::internal_with_context("failed to define function", format!("{}: {e:?}", function.link_name))
                        .with_span(function.span)
                })?;
            self.module.clear_context(&mut self.ctx);
            tracing::debug!(function = %function.link_name, "defined");
        }

        let functions = self
            .program
            .functions
            .iter()
            .zip(&state.functions)
            .map(|(f, &id)| (f.link_name.clone(), id))
            .collect();
        Ok(GeneratedModule { functions, ir })
    }

    fn import_runtime(&mut self, ptr: types::Type) -> CodegenResult<FxHashMap<RuntimeKey, FuncId>> {
        let mut runtime = FxHashMap::default();
        for &key in RuntimeKey::ALL {
            let spec = signature_for(key);
            let mut sig = self.module.make_signature();
            for &param in spec.params {
                sig.params.push(AbiParam::new(abi_type(param, ptr)));
            }
            if let Some(ret) = spec.ret {
                sig.returns.push(AbiParam::new(abi_type(ret, ptr)));
            }
            let func_id = self
                .module
                .declare_function(key.name(), Linkage::Import, &sig)
                .map_err(CodegenError::cranelift)?;
            runtime.insert(key, func_id);
        }
        Ok(runtime)
    }

    /// Declare every function up front so bodies and vtables can refer to
    /// any of them. Indexed by `FuncInstId`.
    fn declare_functions(&mut self, ptr: types::Type) -> CodegenResult<Vec<FuncId>> {
        let mut ids = Vec::with_capacity(self.program.functions.len());
        for function in &self.program.functions {
            let mut sig = self.module.make_signature();
            function_signature(function, ptr, &mut sig).map_err(|e| e.with_span(function.span))?;
            let linkage = if function.exported {
                Linkage::Export
            } else {
                Linkage::Local
            };
            let func_id = self
                .module
                .declare_function(&function.link_name, linkage, &sig)
                .map_err(|e| CodegenError::cranelift(e).with_span(function.span))?;
            ids.push(func_id);
        }
        Ok(ids)
    }
}

fn abi_type(ty: AbiTy, ptr: types::Type) -> types::Type {
    match ty {
        AbiTy::Ptr => ptr,
        AbiTy::I8 => types::I8,
        AbiTy::I32 => types::I32,
        AbiTy::I64 => types::I64,
    }
}

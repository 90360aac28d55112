// jit.rs

use cinder_sema::CheckedProgram;
use cranelift::prelude::*;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Module};
use rustc_hash::FxHashMap;

use crate::compiler::CodeGenerator;
use crate::errors::{CodegenError, CodegenResult};
use crate::options::{CodegenOptions, native_isa};
use crate::runtime_registry::all_linkable_symbols;

/// JIT compiler context. Runtime functions are resolved to the addresses of
/// the `cinder-runtime` crate linked into this process.
pub struct JitContext {
    module: JITModule,
    options: CodegenOptions,
    /// Link name to function id, for every compiled function
    func_ids: FxHashMap<String, FuncId>,
    /// Captured IR, when enabled in the options
    ir: Vec<(String, String)>,
}

impl JitContext {
    /// Create a new JitContext with default (debug) options
    pub fn new() -> CodegenResult<Self> {
        Self::with_options(CodegenOptions::default())
    }

    pub fn with_options(options: CodegenOptions) -> CodegenResult<Self> {
        let isa = native_isa(&options, false)?;
        let mut builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        for symbol in all_linkable_symbols() {
            builder.symbol(symbol.c_name, symbol.ptr);
        }
        Ok(Self {
            module: JITModule::new(builder),
            options,
            func_ids: FxHashMap::default(),
            ir: Vec::new(),
        })
    }

    /// Get the pointer type for the target
    pub fn pointer_type(&self) -> Type {
        self.module.target_config().pointer_type()
    }

    /// Compile every function of `program` and make it callable. A context
    /// holds one program: data symbols are named per program.
    pub fn compile(&mut self, program: &CheckedProgram) -> CodegenResult<()> {
        let generated = CodeGenerator::new(&mut self.module, program, &self.options).generate()?;
        self.func_ids.extend(generated.functions);
        self.ir.extend(generated.ir);
        self.module
            .finalize_definitions()
            .map_err(|e| CodegenError::internal_with_context("finalization error", format!("{e:?}")))
    }

    /// Get a function pointer by link name (after compilation)
    pub fn get_function_ptr(&self, name: &str) -> Option<*const u8> {
        self.func_ids
            .get(name)
            .map(|&func_id| self.module.get_finalized_function(func_id))
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.func_ids.contains_key(name)
    }

    /// `(link name, IR text)` of every compiled function, in definition order.
    pub fn ir(&self) -> &[(String, String)] {
        &self.ir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_frontend::{AstBuilder, BinaryOp, Decl};
    use cinder_sema::{ProjectInput, analyze};

    fn compile(b: AstBuilder, decls: Vec<Decl>, options: CodegenOptions) -> JitContext {
        let file = b.file("", vec![], decls);
        let mut interner = b.into_interner();
        let analysis = analyze(&ProjectInput::new("app"), vec![file], &mut interner);
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
        let mut jit = JitContext::with_options(options).unwrap();
        jit.compile(&analysis.program).unwrap();
        jit
    }

    #[test]
    fn create_jit_context() {
        let jit = JitContext::new().unwrap();
        assert!(jit.pointer_type() == types::I64 || jit.pointer_type() == types::I32);
    }

    #[test]
    fn compile_and_call_free_function() {
        let b = AstBuilder::new();
        let add = b.func(
            "add",
            vec![b.param("a", b.i64_ty()), b.param("b", b.i64_ty())],
            Some(b.i64_ty()),
            b.block(vec![], Some(b.binary(BinaryOp::Add, b.ident("a"), b.ident("b")))),
        );
        let jit = compile(b, vec![Decl::Function(add)], CodegenOptions::debug());

        let fn_ptr = jit.get_function_ptr("add").unwrap();
        let add: extern "C" fn(i64, i64) -> i64 = unsafe { std::mem::transmute(fn_ptr) };
        assert_eq!(add(40, 2), 42);
    }

    #[test]
    fn loops_and_branches() {
        // fn sum(n: i64) -> i64 { let total = 0; let i = 0; while i < n { i = i + 1; total = total + i; } total }
        let b = AstBuilder::new();
        let sum = b.func(
            "sum",
            vec![b.param("n", b.i64_ty())],
            Some(b.i64_ty()),
            b.block(
                vec![
                    b.let_stmt("total", Some(b.i64_ty()), Some(b.int(0))),
                    b.let_stmt("i", Some(b.i64_ty()), Some(b.int(0))),
                    b.while_loop(
                        b.binary(BinaryOp::Lt, b.ident("i"), b.ident("n")),
                        b.block(
                            vec![
                                b.assign(b.ident("i"), b.binary(BinaryOp::Add, b.ident("i"), b.int(1))),
                                b.assign(b.ident("total"), b.binary(BinaryOp::Add, b.ident("total"), b.ident("i"))),
                            ],
                            None,
                        ),
                    ),
                ],
                Some(b.ident("total")),
            ),
        );
        // fn pick(flag: bool) -> i64 { if flag { 1 } else { return 2; } }
        let pick = b.func(
            "pick",
            vec![b.param("flag", b.bool_ty())],
            Some(b.i64_ty()),
            b.block(
                vec![],
                Some(b.if_expr(
                    b.ident("flag"),
                    b.block(vec![], Some(b.int(1))),
                    Some(b.block(vec![b.ret(Some(b.int(2)))], None)),
                )),
            ),
        );
        let jit = compile(b, vec![Decl::Function(sum), Decl::Function(pick)], CodegenOptions::release());

        let sum: extern "C" fn(i64) -> i64 = unsafe { std::mem::transmute(jit.get_function_ptr("sum").unwrap()) };
        assert_eq!(sum(10), 55);
        assert_eq!(sum(0), 0);

        let pick: extern "C" fn(i8) -> i64 = unsafe { std::mem::transmute(jit.get_function_ptr("pick").unwrap()) };
        assert_eq!(pick(1), 1);
        assert_eq!(pick(0), 2);
    }

    #[test]
    fn ir_capture() {
        let b = AstBuilder::new();
        let answer = b.func("answer", vec![], Some(b.i64_ty()), b.block(vec![], Some(b.int(42))));
        let jit = compile(b, vec![Decl::Function(answer)], CodegenOptions::debug().with_ir_capture());

        assert!(jit.has_function("answer"));
        let (name, ir) = &jit.ir()[0];
        assert_eq!(name, "answer");
        assert!(ir.contains("iconst.i64 42"), "{ir}");
    }
}

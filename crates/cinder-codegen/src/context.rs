// context.rs
//
// Per-function lowering context. Methods are split across files:
// - expr.rs: lower_expr(), binary and unary operators
// - stmt.rs: lower_stmt(), blocks, loops and returns
// - calls.rs: calls, virtual dispatch and object allocation

use cinder_identity::{ClassInstId, FuncInstId, LocalId};
use cinder_sema::{CheckedFunction, CheckedProgram, Type};
use cranelift::prelude::*;
use cranelift_codegen::ir::StackSlot;
use cranelift_module::{DataDescription, DataId, FuncId, Linkage, Module};
use rustc_hash::FxHashMap;

use crate::errors::{CodegenError, CodegenResult};
use crate::layout::StructLayout;
use crate::rc_scope::{Pending, RcScopeStack};
use crate::runtime_registry::RuntimeKey;
use crate::trap_codes;
use crate::types::value_type;

/// Module-level state shared by every function lowering.
pub(crate) struct CodegenState<'a> {
    pub program: &'a CheckedProgram,
    pub ptr: types::Type,
    /// Indexed by `ClassInstId`
    pub layouts: Vec<StructLayout>,
    /// Indexed by `FuncInstId`
    pub functions: Vec<FuncId>,
    pub vtables: FxHashMap<ClassInstId, DataId>,
    pub drop_fns: FxHashMap<ClassInstId, FuncId>,
    pub runtime: FxHashMap<RuntimeKey, FuncId>,
}

impl CodegenState<'_> {
    pub fn layout(&self, class: ClassInstId) -> CodegenResult<&StructLayout> {
        self.layouts
            .get(class.as_usize())
            .ok_or_else(|| CodegenError::not_found("class layout", class.index().to_string()))
    }

    pub fn func_id(&self, function: FuncInstId) -> CodegenResult<FuncId> {
        self.functions
            .get(function.as_usize())
            .copied()
            .ok_or_else(|| CodegenError::not_found("function", function.index().to_string()))
    }

    pub fn runtime_id(&self, key: RuntimeKey) -> CodegenResult<FuncId> {
        self.runtime
            .get(&key)
            .copied()
            .ok_or_else(|| CodegenError::not_found("runtime function", key.name()))
    }
}

/// Lowering state for one function body.
pub(crate) struct FunctionLowering<'a, M: Module> {
    pub builder: FunctionBuilder<'a>,
    pub module: &'a mut M,
    pub state: &'a CodegenState<'a>,
    /// String literal data, shared across functions
    pub strings: &'a mut FxHashMap<String, DataId>,
    pub function: &'a CheckedFunction,
    /// One explicit stack slot per local, parameters included
    pub locals: Vec<StackSlot>,
    pub receiver: Option<Value>,
    pub rc: RcScopeStack,
    /// The current block is unreachable: a `return` was emitted on this path
    pub terminated: bool,
}

impl<'a, M: Module> FunctionLowering<'a, M> {
    pub fn new(
        builder: FunctionBuilder<'a>,
        module: &'a mut M,
        state: &'a CodegenState<'a>,
        strings: &'a mut FxHashMap<String, DataId>,
        function: &'a CheckedFunction,
    ) -> Self {
        Self {
            builder,
            module,
            state,
            strings,
            function,
            locals: Vec::with_capacity(function.locals.len()),
            receiver: None,
            rc: RcScopeStack::new(),
            terminated: false,
        }
    }

    #[inline]
    pub fn ptr(&self) -> types::Type {
        self.state.ptr
    }

    pub fn program(&self) -> &'a CheckedProgram {
        self.state.program
    }

    // ========== Locals ==========

    /// Allocate a stack slot for a value of machine type `ty`
    pub fn alloc_slot(&mut self, ty: types::Type) -> StackSlot {
        let size = ty.bytes();
        self.builder.create_sized_stack_slot(StackSlotData::new(
            StackSlotKind::ExplicitSlot,
            size,
            size.trailing_zeros() as u8,
        ))
    }

    pub fn local_slot(&self, local: LocalId) -> CodegenResult<StackSlot> {
        self.locals
            .get(local.as_usize())
            .copied()
            .ok_or_else(|| CodegenError::internal_with_context("local without stack slot", local.index().to_string()))
    }

    pub fn local_type(&self, local: LocalId) -> CodegenResult<Type> {
        self.function
            .locals
            .get(local.as_usize())
            .map(|l| l.ty)
            .ok_or_else(|| CodegenError::internal_with_context("unknown local", local.index().to_string()))
    }

    /// Zero of the machine type of `ty`; stands in for values on dead paths.
    pub fn zero(&mut self, ty: Type) -> CodegenResult<Value> {
        let clif = value_type(ty, self.ptr())?;
        Ok(if clif == types::F64 {
            self.builder.ins().f64const(0.0)
        } else {
            self.builder.ins().iconst(clif, 0)
        })
    }

    pub fn null(&mut self) -> Value {
        let ptr = self.ptr();
        self.builder.ins().iconst(ptr, 0)
    }

    // ========== Runtime calls ==========

    pub fn call_runtime(&mut self, key: RuntimeKey, args: &[Value]) -> CodegenResult<Option<Value>> {
        let func_id = self.state.runtime_id(key)?;
        let func_ref = self.module.declare_func_in_func(func_id, self.builder.func);
        let call = self.builder.ins().call(func_ref, args);
        Ok(self.builder.inst_results(call).first().copied())
    }

    pub fn call_runtime_value(&mut self, key: RuntimeKey, args: &[Value]) -> CodegenResult<Value> {
        self.call_runtime(key, args)?
            .ok_or_else(|| CodegenError::internal_with_context("runtime call returned no value", key.name()))
    }

    #[inline]
    pub fn emit_retain(&mut self, value: Value) -> CodegenResult<()> {
        self.call_runtime(RuntimeKey::Retain, &[value]).map(|_| ())
    }

    #[inline]
    pub fn emit_release(&mut self, value: Value) -> CodegenResult<()> {
        self.call_runtime(RuntimeKey::Release, &[value]).map(|_| ())
    }

    // ========== RC scopes ==========

    pub fn push_rc_scope(&mut self) {
        self.rc.push_scope();
    }

    /// Pop the innermost scope and release what it owns. Nothing is emitted
    /// on a dead path: the `return` already released every scope.
    pub fn pop_rc_scope_with_cleanup(&mut self) -> CodegenResult<()> {
        let scope = self.rc.pop_scope()?;
        if self.terminated {
            return Ok(());
        }
        for pending in scope.pending.iter().rev() {
            self.release_pending(*pending)?;
        }
        Ok(())
    }

    /// Release every active scope, innermost first. Used by `return`.
    pub fn emit_rc_cleanup_all_scopes(&mut self) -> CodegenResult<()> {
        for pending in self.rc.all_pending_innermost_first() {
            self.release_pending(pending)?;
        }
        Ok(())
    }

    fn release_pending(&mut self, pending: Pending) -> CodegenResult<()> {
        let value = match pending {
            Pending::Value(value) => value,
            Pending::Slot(slot) => {
                let ptr = self.ptr();
                self.builder.ins().stack_load(ptr, slot, 0)
            }
        };
        self.emit_release(value)
    }

    /// Take ownership of a fresh allocation (count 0): retain it and release
    /// it when the current scope ends.
    pub fn own_allocation(&mut self, value: Value) -> CodegenResult<()> {
        self.emit_retain(value)?;
        self.rc.register(Pending::Value(value))
    }

    /// Take ownership of a call result, which the callee already retained.
    pub fn own_call_result(&mut self, value: Value) -> CodegenResult<()> {
        self.rc.register(Pending::Value(value))
    }

    // ========== Data ==========

    /// Address of a read-only copy of `s`, shared by identical literals.
    pub fn string_data(&mut self, s: &str) -> CodegenResult<Value> {
        let data_id = match self.strings.get(s) {
            Some(&id) => id,
            None => {
                let name = format!("str${}", self.strings.len());
                let id = self
                    .module
                    .declare_data(&name, Linkage::Local, false, false)
                    .map_err(CodegenError::cranelift)?;
                let mut desc = DataDescription::new();
                desc.define(s.as_bytes().to_vec().into_boxed_slice());
                self.module.define_data(id, &desc).map_err(CodegenError::cranelift)?;
                self.strings.insert(s.to_string(), id);
                id
            }
        };
        let gv = self.module.declare_data_in_func(data_id, self.builder.func);
        let ptr = self.ptr();
        Ok(self.builder.ins().symbol_value(ptr, gv))
    }

    // ========== Control flow ==========

    /// Close the current block if it is unreachable.
    pub fn close_dead_block(&mut self) {
        if self.terminated {
            self.builder.ins().trap(trap_codes::UNREACHABLE);
        }
    }

    /// Start an unreachable block after a terminator so that code following
    /// a `return` still has somewhere to go.
    pub fn switch_to_dead_block(&mut self) {
        let dead = self.builder.create_block();
        self.builder.switch_to_block(dead);
        self.terminated = true;
    }
}

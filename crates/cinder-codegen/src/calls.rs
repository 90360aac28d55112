// calls.rs
//
// Function calls, virtual dispatch and object allocation.

use cinder_identity::{ClassInstId, FuncInstId};
use cinder_runtime::VTABLE_OFFSET;
use cinder_sema::{CheckedExpr, Dispatch};
use cranelift::prelude::*;
use cranelift_module::Module;
use smallvec::SmallVec;

use crate::context::FunctionLowering;
use crate::errors::{CodegenError, CodegenResult};
use crate::runtime_registry::RuntimeKey;
use crate::types::function_signature;

type ArgVec = SmallVec<[Value; 8]>;

impl<M: Module> FunctionLowering<'_, M> {
    /// Arguments are borrowed by the callee. A reference result comes back
    /// retained and is owned by the current scope.
    pub fn lower_call(
        &mut self,
        function: FuncInstId,
        receiver: Option<&CheckedExpr>,
        args: &[CheckedExpr],
        dispatch: Dispatch,
    ) -> CodegenResult<Option<Value>> {
        let mut values = ArgVec::new();
        if let Some(receiver) = receiver {
            values.push(self.lower_value(receiver)?);
        }
        for arg in args {
            values.push(self.lower_value(arg)?);
        }

        let call = match dispatch {
            Dispatch::Static => {
                let func_id = self.state.func_id(function)?;
                let func_ref = self.module.declare_func_in_func(func_id, self.builder.func);
                self.builder.ins().call(func_ref, &values)
            }
            Dispatch::Virtual { slot } => {
                let receiver = values
                    .first()
                    .copied()
                    .ok_or_else(|| CodegenError::internal("virtual call without receiver"))?;
                let target = self.load_vtable_entry(receiver, slot)?;
                let mut sig = self.module.make_signature();
                function_signature(self.program().function(function), self.ptr(), &mut sig)?;
                let sig_ref = self.builder.import_signature(sig);
                self.builder.ins().call_indirect(sig_ref, target, &values)
            }
        };

        let result = self.builder.inst_results(call).first().copied();
        if let Some(value) = result
            && self.program().function(function).return_type.is_reference()
        {
            self.own_call_result(value)?;
        }
        Ok(result)
    }

    /// Address of vtable slot `slot` of the object `receiver`.
    fn load_vtable_entry(&mut self, receiver: Value, slot: u32) -> CodegenResult<Value> {
        let ptr = self.ptr();
        let vtable = self
            .builder
            .ins()
            .load(ptr, MemFlags::trusted(), receiver, VTABLE_OFFSET);
        let offset = (slot * ptr.bytes()) as i32;
        Ok(self.builder.ins().load(ptr, MemFlags::trusted().with_readonly(), vtable, offset))
    }

    /// `new C(args)`: allocate, take ownership, then run the initializer on
    /// the new object.
    pub fn lower_new(
        &mut self,
        class: ClassInstId,
        init: Option<FuncInstId>,
        args: &[CheckedExpr],
    ) -> CodegenResult<Value> {
        let ptr = self.ptr();
        let size = self.state.layout(class)?.size;
        let size = self.builder.ins().iconst(types::I32, i64::from(size));

        let vtable = match self.state.vtables.get(&class) {
            Some(&data_id) => {
                let gv = self.module.declare_data_in_func(data_id, self.builder.func);
                self.builder.ins().symbol_value(ptr, gv)
            }
            None => self.null(),
        };
        let drop_fn = match self.state.drop_fns.get(&class) {
            Some(&func_id) => {
                let func_ref = self.module.declare_func_in_func(func_id, self.builder.func);
                self.builder.ins().func_addr(ptr, func_ref)
            }
            None => self.null(),
        };

        let object = self.call_runtime_value(RuntimeKey::ObjectNew, &[size, vtable, drop_fn])?;
        self.own_allocation(object)?;

        if let Some(init) = init {
            let mut values = ArgVec::new();
            values.push(object);
            for arg in args {
                values.push(self.lower_value(arg)?);
            }
            let func_id = self.state.func_id(init)?;
            let func_ref = self.module.declare_func_in_func(func_id, self.builder.func);
            self.builder.ins().call(func_ref, &values);
        }
        Ok(object)
    }
}

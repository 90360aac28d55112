// vtable.rs
//
// Per-class data emitted alongside the functions:
// - the vtable: one function pointer per virtual slot, in slot order
// - the drop function: releases the object's reference fields when the
//   runtime frees it

use cinder_identity::ClassInstId;
use cinder_sema::CheckedProgram;
use cranelift::prelude::*;
use cranelift_module::{DataDescription, DataId, FuncId, Linkage, Module};
use rustc_hash::FxHashMap;

use crate::errors::{CodegenError, CodegenResult};
use crate::layout::StructLayout;

/// Emit the vtable of every class with at least one virtual slot.
pub(crate) fn define_vtables<M: Module>(
    module: &mut M,
    program: &CheckedProgram,
    functions: &[FuncId],
) -> CodegenResult<FxHashMap<ClassInstId, DataId>> {
    let word_bytes = module.target_config().pointer_bytes() as usize;
    let mut vtables = FxHashMap::default();

    for (index, class) in program.classes.iter().enumerate() {
        if class.vtable.is_empty() {
            continue;
        }
        let name = format!("{}$vtable${index}", class.display_name);
        let data_id = module
            .declare_data(&name, Linkage::Local, false, false)
            .map_err(CodegenError::cranelift)?;

        let mut data = DataDescription::new();
        data.define_zeroinit(word_bytes * class.vtable.len());
        data.set_align(word_bytes as u64);
        for (slot, &target) in class.vtable.iter().enumerate() {
            let func_id = functions
                .get(target.as_usize())
                .copied()
                .ok_or_else(|| CodegenError::not_found("vtable target", target.index().to_string()))?;
            let func_ref = module.declare_func_in_data(func_id, &mut data);
            data.write_function_addr((slot * word_bytes) as u32, func_ref);
            tracing::trace!(class = %class.display_name, slot, target = target.index(), "vtable slot");
        }
        module.define_data(data_id, &data).map_err(CodegenError::cranelift)?;
        vtables.insert(ClassInstId::new(index as u32), data_id);
    }
    Ok(vtables)
}

/// Emit a drop function for every class that holds references.
pub(crate) fn define_drop_fns<M: Module>(
    module: &mut M,
    ctx: &mut codegen::Context,
    builder_ctx: &mut FunctionBuilderContext,
    program: &CheckedProgram,
    layouts: &[StructLayout],
    release: FuncId,
) -> CodegenResult<FxHashMap<ClassInstId, FuncId>> {
    let ptr = module.target_config().pointer_type();
    let mut drop_fns = FxHashMap::default();

    for (index, (class, layout)) in program.classes.iter().zip(layouts).enumerate() {
        let offsets: Vec<i32> = layout.reference_offsets().collect();
        if offsets.is_empty() {
            continue;
        }

        let mut sig = module.make_signature();
        sig.params.push(AbiParam::new(ptr));
        let name = format!("{}$drop${index}", class.display_name);
        let func_id = module
            .declare_function(&name, Linkage::Local, &sig)
            .map_err(CodegenError::cranelift)?;

        ctx.func.signature = sig;
        {
            let mut builder = FunctionBuilder::new(&mut ctx.func, builder_ctx);
            let entry = builder.create_block();
            builder.append_block_params_for_function_params(entry);
            builder.switch_to_block(entry);
            let object = builder.block_params(entry)[0];
            let release_ref = module.declare_func_in_func(release, builder.func);
            for offset in offsets {
                let field = builder.ins().load(ptr, MemFlags::trusted(), object, offset);
                builder.ins().call(release_ref, &[field]);
            }
            builder.ins().return_(&[]);
            builder.seal_all_blocks();
            builder.finalize();
        }
        module
            .define_function(func_id, ctx)
            .map_err(CodegenError::cranelift)?;
        module.clear_context(ctx);

        drop_fns.insert(ClassInstId::new(index as u32), func_id);
    }
    Ok(drop_fns)
}

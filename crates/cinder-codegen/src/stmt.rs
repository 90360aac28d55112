// stmt.rs
//
// Statement and block lowering, plus the function body entry point.

use cinder_identity::{ClassInstId, LocalId};
use cinder_sema::{AssignTarget, CheckedBlock, CheckedExpr, CheckedExprKind, CheckedStmt, FunctionKind, Type};
use cranelift::prelude::*;
use cranelift_module::Module;
use rustc_hash::FxHashSet;

use crate::context::FunctionLowering;
use crate::errors::{CodegenError, CodegenResult};
use crate::rc_scope::Pending;
use crate::types::value_type;

impl<M: Module> FunctionLowering<'_, M> {
    /// Lower the whole function and finalize the builder.
    pub fn lower_function(mut self) -> CodegenResult<()> {
        let function = self.function;
        let body = function
            .body
            .as_ref()
            .ok_or_else(|| CodegenError::internal_with_context("function without body", function.link_name.clone()))?;

        let entry = self.builder.create_block();
        self.builder.append_block_params_for_function_params(entry);
        self.builder.switch_to_block(entry);
        let mut params = self.builder.block_params(entry).to_vec().into_iter();
        if function.receiver.is_some() {
            self.receiver = params.next();
        }

        for local in &function.locals {
            let ty = value_type(local.ty, self.ptr())?;
            let slot = self.alloc_slot(ty);
            if local.ty.is_reference() {
                let null = self.null();
                self.builder.ins().stack_store(null, slot, 0);
            }
            self.locals.push(slot);
        }

        // The function scope doubles as the body block's scope.
        self.push_rc_scope();

        // Parameters are borrowed from the caller. One the body reassigns is
        // retained so the assignment can release it like any other local.
        let assigned = assigned_locals(body);
        for (param, value) in function.params.iter().zip(params) {
            let slot = self.local_slot(param.local)?;
            self.builder.ins().stack_store(value, slot, 0);
            if param.ty.is_reference() && assigned.contains(&param.local) {
                self.emit_retain(value)?;
                self.rc.register(Pending::Slot(slot))?;
            }
        }

        if function.kind == FunctionKind::Init {
            self.lower_field_inits()?;
        }

        let tail = self.lower_block_stmts(body)?;
        if !self.terminated {
            let value = if function.return_type.is_void() { None } else { tail };
            self.emit_return(value, function.return_type)?;
        }
        self.close_dead_block();
        debug_assert_eq!(self.rc.depth(), 1, "unbalanced RC scopes");

        self.builder.seal_all_blocks();
        self.builder.finalize();
        Ok(())
    }

    /// Field default values, stored before the init body runs.
    fn lower_field_inits(&mut self) -> CodegenResult<()> {
        let function = self.function;
        let (Some(object), Some(class)) = (self.receiver, function.owner) else {
            return Err(CodegenError::internal_with_context("init without receiver", function.link_name.clone()));
        };
        for init in &function.field_inits {
            let value = self.lower_value(&init.value)?;
            self.store_field(object, class, init.index, value)?;
        }
        Ok(())
    }

    // ========== Blocks ==========

    /// Statements and tail of a block, in the current RC scope.
    fn lower_block_stmts(&mut self, block: &CheckedBlock) -> CodegenResult<Option<Value>> {
        for stmt in &block.stmts {
            if self.terminated {
                break;
            }
            self.lower_stmt(stmt)?;
        }
        match &block.tail {
            Some(tail) if !self.terminated => self.lower_expr(tail),
            _ => Ok(None),
        }
    }

    /// Lower a block in its own RC scope. A reference-typed result is
    /// retained before the scope is released and comes back owned by the
    /// caller, which must register or release it.
    pub fn lower_block_scoped(&mut self, block: &CheckedBlock) -> CodegenResult<Option<Value>> {
        self.push_rc_scope();
        let value = self.lower_block_stmts(block)?;
        let keep = value.filter(|_| block.ty.is_reference() && !self.terminated);
        if let Some(value) = keep {
            self.emit_retain(value)?;
        }
        self.pop_rc_scope_with_cleanup()?;
        Ok(value)
    }

    /// Block in expression position: its result is owned by the enclosing scope.
    pub fn lower_block_expr(&mut self, block: &CheckedBlock) -> CodegenResult<Option<Value>> {
        let value = self.lower_block_scoped(block)?;
        if let Some(value) = value
            && block.ty.is_reference()
            && !self.terminated
        {
            self.own_call_result(value)?;
        }
        Ok(value)
    }

    // ========== Statements ==========

    fn lower_stmt(&mut self, stmt: &CheckedStmt) -> CodegenResult<()> {
        match stmt {
            CheckedStmt::Let { local, init, .. } => self.lower_let(*local, init.as_ref()),
            CheckedStmt::Assign { target, value, .. } => self.lower_assign(target, value),
            CheckedStmt::Expr(expr) => self.lower_expr(expr).map(|_| ()),
            CheckedStmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => Some(self.lower_value(expr)?),
                    None => None,
                };
                self.emit_return(value, self.function.return_type)
            }
            CheckedStmt::While { condition, body, .. } => self.lower_while(condition, body),
        }
    }

    fn lower_let(&mut self, local: LocalId, init: Option<&CheckedExpr>) -> CodegenResult<()> {
        let slot = self.local_slot(local)?;
        let is_reference = self.local_type(local)?.is_reference();
        let value = match init {
            Some(expr) => self.lower_value(expr)?,
            // A slot reused by a loop may hold a value released last iteration
            None if is_reference => self.null(),
            None => return Ok(()),
        };
        if is_reference {
            self.emit_retain(value)?;
        }
        self.builder.ins().stack_store(value, slot, 0);
        if is_reference {
            self.rc.register(Pending::Slot(slot))?;
        }
        Ok(())
    }

    fn lower_assign(&mut self, target: &AssignTarget, value: &CheckedExpr) -> CodegenResult<()> {
        match target {
            AssignTarget::Local(local) => {
                let slot = self.local_slot(*local)?;
                let ty = self.local_type(*local)?;
                let new = self.lower_value(value)?;
                if ty.is_reference() {
                    self.emit_retain(new)?;
                    let ptr = self.ptr();
                    let old = self.builder.ins().stack_load(ptr, slot, 0);
                    self.emit_release(old)?;
                }
                self.builder.ins().stack_store(new, slot, 0);
                Ok(())
            }
            AssignTarget::Field { object, class, index } => {
                let object = self.lower_value(object)?;
                let new = self.lower_value(value)?;
                self.store_field(object, *class, *index, new)
            }
        }
    }

    /// Store into a field. References are retained first, then the
    /// previous value is released.
    pub fn store_field(&mut self, object: Value, class: ClassInstId, index: usize, value: Value) -> CodegenResult<()> {
        let field = self.state.layout(class)?.field(index)?;
        if field.is_reference {
            self.emit_retain(value)?;
            let old = self.builder.ins().load(field.ty, MemFlags::trusted(), object, field.offset);
            self.emit_release(old)?;
        }
        self.builder.ins().store(MemFlags::trusted(), value, object, field.offset);
        Ok(())
    }

    /// Return `value`, releasing every active scope first. A returned
    /// reference is retained so the caller receives it owned.
    fn emit_return(&mut self, value: Option<Value>, ty: Type) -> CodegenResult<()> {
        if let Some(value) = value
            && ty.is_reference()
        {
            self.emit_retain(value)?;
        }
        self.emit_rc_cleanup_all_scopes()?;
        match value {
            Some(value) => self.builder.ins().return_(&[value]),
            None => self.builder.ins().return_(&[]),
        };
        self.switch_to_dead_block();
        Ok(())
    }

    fn lower_while(&mut self, condition: &CheckedExpr, body: &CheckedBlock) -> CodegenResult<()> {
        let header = self.builder.create_block();
        let body_block = self.builder.create_block();
        let exit = self.builder.create_block();

        self.builder.ins().jump(header, &[]);
        self.builder.switch_to_block(header);
        let cond = self.lower_condition(condition)?;
        self.builder.ins().brif(cond, body_block, &[], exit, &[]);

        self.builder.switch_to_block(body_block);
        let was_terminated = self.terminated;
        let value = self.lower_block_scoped(body)?;
        if self.terminated {
            self.close_dead_block();
        } else {
            if let Some(value) = value
                && body.ty.is_reference()
            {
                self.emit_release(value)?;
            }
            self.builder.ins().jump(header, &[]);
        }
        // The condition can always exit the loop
        self.terminated = was_terminated;

        self.builder.switch_to_block(exit);
        Ok(())
    }
}

/// Locals the function assigns after their declaration.
fn assigned_locals(body: &CheckedBlock) -> FxHashSet<LocalId> {
    let mut assigned = FxHashSet::default();
    collect_block(body, &mut assigned);
    assigned
}

fn collect_block(block: &CheckedBlock, out: &mut FxHashSet<LocalId>) {
    for stmt in &block.stmts {
        match stmt {
            CheckedStmt::Let { init, .. } => {
                if let Some(init) = init {
                    collect_expr(init, out);
                }
            }
            CheckedStmt::Assign { target, value, .. } => {
                match target {
                    AssignTarget::Local(local) => {
                        out.insert(*local);
                    }
                    AssignTarget::Field { object, .. } => collect_expr(object, out),
                }
                collect_expr(value, out);
            }
            CheckedStmt::Expr(expr) => collect_expr(expr, out),
            CheckedStmt::Return { value, .. } => {
                if let Some(value) = value {
                    collect_expr(value, out);
                }
            }
            CheckedStmt::While { condition, body, .. } => {
                collect_expr(condition, out);
                collect_block(body, out);
            }
        }
    }
    if let Some(tail) = &block.tail {
        collect_expr(tail, out);
    }
}

fn collect_expr(expr: &CheckedExpr, out: &mut FxHashSet<LocalId>) {
    match &expr.kind {
        CheckedExprKind::Field { object, .. } => collect_expr(object, out),
        CheckedExprKind::Binary { left, right, .. } => {
            collect_expr(left, out);
            collect_expr(right, out);
        }
        CheckedExprKind::Unary { operand, .. } => collect_expr(operand, out),
        CheckedExprKind::Call { receiver, args, .. } => {
            if let Some(receiver) = receiver {
                collect_expr(receiver, out);
            }
            args.iter().for_each(|arg| collect_expr(arg, out));
        }
        CheckedExprKind::New { args, .. } => args.iter().for_each(|arg| collect_expr(arg, out)),
        CheckedExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            collect_expr(condition, out);
            collect_block(then_branch, out);
            if let Some(else_branch) = else_branch {
                collect_block(else_branch, out);
            }
        }
        CheckedExprKind::Block(block) => collect_block(block, out),
        _ => {}
    }
}

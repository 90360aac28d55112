// expr.rs
//
// Expression lowering. Every expression yields `Some(value)` or `None` for
// `void`. Reference-typed temporaries the function owns are registered in
// the innermost RC scope as they are produced.

use cinder_frontend::{BinaryOp, UnaryOp};
use cinder_sema::{CheckedBlock, CheckedExpr, CheckedExprKind, Type};
use cranelift::prelude::*;
use cranelift_codegen::ir::StackSlot;
use cranelift_module::Module;

use crate::context::FunctionLowering;
use crate::errors::{CodegenError, CodegenResult};
use crate::runtime_registry::RuntimeKey;
use crate::types::{cranelift_type, value_type};

impl<M: Module> FunctionLowering<'_, M> {
    pub fn lower_expr(&mut self, expr: &CheckedExpr) -> CodegenResult<Option<Value>> {
        let value = match &expr.kind {
            CheckedExprKind::IntLiteral(n) => {
                let ty = value_type(expr.ty, self.ptr())?;
                if ty == types::F64 {
                    self.builder.ins().f64const(*n as f64)
                } else {
                    self.builder.ins().iconst(ty, *n)
                }
            }
            CheckedExprKind::FloatLiteral(f) => self.builder.ins().f64const(*f),
            CheckedExprKind::BoolLiteral(b) => self.builder.ins().iconst(types::I8, i64::from(*b)),
            CheckedExprKind::StringLiteral(s) => self.lower_string_literal(s)?,
            CheckedExprKind::Local(local) => {
                let slot = self.local_slot(*local)?;
                let ty = value_type(self.local_type(*local)?, self.ptr())?;
                self.builder.ins().stack_load(ty, slot, 0)
            }
            CheckedExprKind::SelfRef => self
                .receiver
                .ok_or_else(|| CodegenError::internal_with_context("self outside a method", self.function.link_name.clone()))?,
            CheckedExprKind::Field { object, class, index } => {
                let object = self.lower_value(object)?;
                let field = self.state.layout(*class)?.field(*index)?;
                self.builder.ins().load(field.ty, MemFlags::trusted(), object, field.offset)
            }
            CheckedExprKind::Binary { op, left, right } => self.lower_binary(*op, left, right)?,
            CheckedExprKind::Unary { op, operand } => self.lower_unary(*op, operand)?,
            CheckedExprKind::Call {
                function,
                receiver,
                args,
                dispatch,
            } => return self.lower_call(*function, receiver.as_deref(), args, *dispatch),
            CheckedExprKind::New { class, init, args } => self.lower_new(*class, *init, args)?,
            CheckedExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => return self.lower_if(expr.ty, condition, then_branch, else_branch.as_ref()),
            CheckedExprKind::Block(block) => return self.lower_block_expr(block),
            CheckedExprKind::EnumVariant { discriminant, .. } => {
                self.builder.ins().iconst(types::I32, i64::from(*discriminant))
            }
            CheckedExprKind::Error => {
                return Err(CodegenError::internal("error expression reached codegen").with_span(expr.span));
            }
        };
        Ok(Some(value))
    }

    /// Lower an expression that must produce a value. On a dead path a zero
    /// of the right type stands in.
    pub fn lower_value(&mut self, expr: &CheckedExpr) -> CodegenResult<Value> {
        match self.lower_expr(expr)? {
            Some(value) => Ok(value),
            None if self.terminated => self.zero(expr.ty),
            None => Err(CodegenError::type_mismatch("value", "void").with_span(expr.span)),
        }
    }

    fn lower_string_literal(&mut self, s: &str) -> CodegenResult<Value> {
        let data = self.string_data(s)?;
        let ptr = self.ptr();
        let len = self.builder.ins().iconst(ptr, s.len() as i64);
        let string = self.call_runtime_value(RuntimeKey::StringNew, &[data, len])?;
        self.own_allocation(string)?;
        Ok(string)
    }

    // ========== Operators ==========

    fn lower_binary(&mut self, op: BinaryOp, left: &CheckedExpr, right: &CheckedExpr) -> CodegenResult<Value> {
        match op {
            BinaryOp::And | BinaryOp::Or => return self.lower_short_circuit(op, left, right),
            _ => {}
        }

        let operand_ty = left.ty;
        let lhs = self.lower_value(left)?;
        let rhs = self.lower_value(right)?;

        if operand_ty == Type::STRING {
            return match op {
                BinaryOp::Add => {
                    let joined = self.call_runtime_value(RuntimeKey::StringConcat, &[lhs, rhs])?;
                    self.own_allocation(joined)?;
                    Ok(joined)
                }
                BinaryOp::Eq => self.call_runtime_value(RuntimeKey::StringEq, &[lhs, rhs]),
                BinaryOp::Ne => {
                    let eq = self.call_runtime_value(RuntimeKey::StringEq, &[lhs, rhs])?;
                    Ok(self.builder.ins().icmp_imm(IntCC::Equal, eq, 0))
                }
                _ => Err(CodegenError::unsupported_with_context("string operator", op.as_str())),
            };
        }

        let is_float = value_type(operand_ty, self.ptr())? == types::F64;
        if is_float && op == BinaryOp::Rem {
            // a - trunc(a / b) * b
            let quotient = self.builder.ins().fdiv(lhs, rhs);
            let truncated = self.builder.ins().trunc(quotient);
            let product = self.builder.ins().fmul(truncated, rhs);
            return Ok(self.builder.ins().fsub(lhs, product));
        }

        let ins = self.builder.ins();
        let value = if is_float {
            match op {
                BinaryOp::Add => ins.fadd(lhs, rhs),
                BinaryOp::Sub => ins.fsub(lhs, rhs),
                BinaryOp::Mul => ins.fmul(lhs, rhs),
                BinaryOp::Div => ins.fdiv(lhs, rhs),
                BinaryOp::Rem => unreachable!("float remainder handled above"),
                BinaryOp::Eq => ins.fcmp(FloatCC::Equal, lhs, rhs),
                BinaryOp::Ne => ins.fcmp(FloatCC::NotEqual, lhs, rhs),
                BinaryOp::Lt => ins.fcmp(FloatCC::LessThan, lhs, rhs),
                BinaryOp::Le => ins.fcmp(FloatCC::LessThanOrEqual, lhs, rhs),
                BinaryOp::Gt => ins.fcmp(FloatCC::GreaterThan, lhs, rhs),
                BinaryOp::Ge => ins.fcmp(FloatCC::GreaterThanOrEqual, lhs, rhs),
                BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit operators handled above"),
            }
        } else {
            match op {
                BinaryOp::Add => ins.iadd(lhs, rhs),
                BinaryOp::Sub => ins.isub(lhs, rhs),
                BinaryOp::Mul => ins.imul(lhs, rhs),
                BinaryOp::Div => ins.sdiv(lhs, rhs),
                BinaryOp::Rem => ins.srem(lhs, rhs),
                // Pointer identity for class and protocol references
                BinaryOp::Eq => ins.icmp(IntCC::Equal, lhs, rhs),
                BinaryOp::Ne => ins.icmp(IntCC::NotEqual, lhs, rhs),
                BinaryOp::Lt => ins.icmp(IntCC::SignedLessThan, lhs, rhs),
                BinaryOp::Le => ins.icmp(IntCC::SignedLessThanOrEqual, lhs, rhs),
                BinaryOp::Gt => ins.icmp(IntCC::SignedGreaterThan, lhs, rhs),
                BinaryOp::Ge => ins.icmp(IntCC::SignedGreaterThanOrEqual, lhs, rhs),
                BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit operators handled above"),
            }
        };
        Ok(value)
    }

    /// `&&` and `||`: the right operand is evaluated only when needed, in its
    /// own RC scope since it may not run.
    fn lower_short_circuit(&mut self, op: BinaryOp, left: &CheckedExpr, right: &CheckedExpr) -> CodegenResult<Value> {
        let lhs = self.lower_value(left)?;

        let rhs_block = self.builder.create_block();
        let merge_block = self.builder.create_block();
        self.builder.append_block_param(merge_block, types::I8);

        if op == BinaryOp::And {
            self.builder.ins().brif(lhs, rhs_block, &[], merge_block, &[lhs.into()]);
        } else {
            self.builder.ins().brif(lhs, merge_block, &[lhs.into()], rhs_block, &[]);
        }

        self.builder.switch_to_block(rhs_block);
        let was_terminated = self.terminated;
        self.push_rc_scope();
        let rhs = self.lower_value(right)?;
        self.pop_rc_scope_with_cleanup()?;
        self.builder.ins().jump(merge_block, &[rhs.into()]);
        self.terminated = was_terminated;

        self.builder.switch_to_block(merge_block);
        Ok(self.builder.block_params(merge_block)[0])
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &CheckedExpr) -> CodegenResult<Value> {
        let value = self.lower_value(operand)?;
        let is_float = value_type(operand.ty, self.ptr())? == types::F64;
        Ok(match op {
            UnaryOp::Neg if is_float => self.builder.ins().fneg(value),
            UnaryOp::Neg => self.builder.ins().ineg(value),
            UnaryOp::Not => self.builder.ins().icmp_imm(IntCC::Equal, value, 0),
        })
    }

    // ========== Conditionals ==========

    /// Lower a condition in its own RC scope; the result is a plain `i8`.
    pub fn lower_condition(&mut self, condition: &CheckedExpr) -> CodegenResult<Value> {
        self.push_rc_scope();
        let value = self.lower_value(condition)?;
        self.pop_rc_scope_with_cleanup()?;
        Ok(value)
    }

    /// `if` as an expression. Each branch stores its result into a shared
    /// stack slot; the merge block loads it and takes ownership.
    fn lower_if(
        &mut self,
        ty: Type,
        condition: &CheckedExpr,
        then_branch: &CheckedBlock,
        else_branch: Option<&CheckedBlock>,
    ) -> CodegenResult<Option<Value>> {
        let cond = self.lower_condition(condition)?;

        let then_block = self.builder.create_block();
        let else_block = self.builder.create_block();
        let merge_block = self.builder.create_block();
        self.builder.ins().brif(cond, then_block, &[], else_block, &[]);

        let result_ty = match else_branch {
            Some(_) => cranelift_type(ty, self.ptr())?,
            None => None,
        };
        let result_slot = result_ty.map(|t| self.alloc_slot(t));

        let was_terminated = self.terminated;

        self.builder.switch_to_block(then_block);
        let then_diverges = self.lower_branch(then_branch, result_slot, merge_block)?;
        self.terminated = was_terminated;

        self.builder.switch_to_block(else_block);
        let else_diverges = match else_branch {
            Some(block) => self.lower_branch(block, result_slot, merge_block)?,
            None => {
                self.builder.ins().jump(merge_block, &[]);
                false
            }
        };

        self.builder.switch_to_block(merge_block);
        self.terminated = was_terminated || (then_diverges && else_diverges);

        let (Some(slot), Some(clif)) = (result_slot, result_ty) else {
            return Ok(None);
        };
        let value = self.builder.ins().stack_load(clif, slot, 0);
        if ty.is_reference() && !self.terminated {
            self.own_call_result(value)?;
        }
        Ok(Some(value))
    }

    /// Lower one arm of an `if`. Returns whether the arm diverged.
    fn lower_branch(
        &mut self,
        block: &CheckedBlock,
        result_slot: Option<StackSlot>,
        merge_block: Block,
    ) -> CodegenResult<bool> {
        let value = self.lower_block_scoped(block)?;
        if self.terminated {
            self.close_dead_block();
            return Ok(true);
        }
        match (value, result_slot) {
            (Some(value), Some(slot)) => {
                self.builder.ins().stack_store(value, slot, 0);
            }
            // Statement position: drop the retained tail right away
            (Some(value), None) if block.ty.is_reference() => self.emit_release(value)?,
            _ => {}
        }
        self.builder.ins().jump(merge_block, &[]);
        Ok(false)
    }
}

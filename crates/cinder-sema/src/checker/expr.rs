// checker/expr.rs

use cinder_frontend::ast::{BinaryOp, Block, EnumVariantExpr, Expr, ExprKind, FieldAccessExpr, IfExpr, NewExpr, UnaryOp};
use cinder_identity::{NodeId, Span, Symbol};

use super::Checker;
use super::scope::FunctionContext;
use crate::checked::{CheckedBlock, CheckedExpr, CheckedExprKind, CheckedStmt};
use crate::errors::{SemanticError, SemanticWarning};
use crate::scope_tree::StructureDecl;
use crate::types::Type;

pub(super) fn error_expr(span: Span) -> CheckedExpr {
    CheckedExpr {
        ty: Type::Unknown,
        kind: CheckedExprKind::Error,
        span,
    }
}

/// True if evaluating the expression always leaves the function.
pub(super) fn expr_diverges(expr: &CheckedExpr) -> bool {
    match &expr.kind {
        CheckedExprKind::Block(block) => block.diverges,
        CheckedExprKind::If {
            then_branch,
            else_branch: Some(else_branch),
            ..
        } => then_branch.diverges && else_branch.diverges,
        _ => false,
    }
}

impl Checker<'_> {
    /// Check an expression. `expected` only steers literal typing; callers
    /// check assignability themselves.
    pub(super) fn check_expr(&mut self, ctx: &mut FunctionContext, expr: &Expr, expected: Option<Type>) -> CheckedExpr {
        let span = expr.span;
        let (ty, kind) = match &expr.kind {
            ExprKind::IntLiteral(value) => {
                let ty = expected.filter(|t| t.is_numeric()).unwrap_or(Type::I64);
                (ty, CheckedExprKind::IntLiteral(*value))
            }
            ExprKind::FloatLiteral(value) => (Type::F64, CheckedExprKind::FloatLiteral(*value)),
            ExprKind::BoolLiteral(value) => (Type::BOOL, CheckedExprKind::BoolLiteral(*value)),
            ExprKind::StringLiteral(value) => (Type::STRING, CheckedExprKind::StringLiteral(value.clone())),
            ExprKind::Identifier(name) => return self.check_identifier(ctx, expr.id, *name, span),
            ExprKind::SelfRef => match self.self_type(ctx, expr.id) {
                Some(ty) => (ty, CheckedExprKind::SelfRef),
                None => {
                    self.add_error(SemanticError::MisplacedSelf { span: span.into() }, span);
                    return error_expr(span);
                }
            },
            ExprKind::Binary(binary) => return self.check_binary(ctx, binary.op, &binary.left, &binary.right, span),
            ExprKind::Unary(unary) => return self.check_unary(ctx, unary.op, &unary.operand, span),
            ExprKind::Call(call) => return self.check_call(ctx, expr, call),
            ExprKind::MethodCall(call) => return self.check_method_call(ctx, expr, call),
            ExprKind::FieldAccess(access) => return self.check_field_access(ctx, access, span),
            ExprKind::New(new_expr) => return self.check_new(ctx, new_expr, span),
            ExprKind::If(if_expr) => return self.check_if(ctx, if_expr, expected, span),
            ExprKind::Block(block) => {
                let block = self.check_block(ctx, block, expected);
                (block.ty, CheckedExprKind::Block(block))
            }
            ExprKind::EnumVariant(variant) => return self.check_enum_variant(ctx, variant, span),
        };
        CheckedExpr { ty, kind, span }
    }

    /// Receiver type if `node` sits where `self` is meaningful.
    pub(super) fn self_type(&self, ctx: &FunctionContext, node: NodeId) -> Option<Type> {
        ctx.self_type.filter(|_| self.resolved.has_receiver(node))
    }

    pub(super) fn self_expr(&self, ctx: &FunctionContext, node: NodeId, span: Span) -> Option<CheckedExpr> {
        self.self_type(ctx, node).map(|ty| CheckedExpr {
            ty,
            kind: CheckedExprKind::SelfRef,
            span,
        })
    }

    /// Locals first, then fields of the implicit receiver.
    fn check_identifier(&mut self, ctx: &mut FunctionContext, node: NodeId, name: Symbol, span: Span) -> CheckedExpr {
        if let Some(local) = ctx.lookup(name) {
            return CheckedExpr {
                ty: ctx.local_type(local),
                kind: CheckedExprKind::Local(local),
                span,
            };
        }
        if let Some(class) = ctx.class
            && let Some(field) = self.program.find_field(class, name).cloned()
            && let Some(object) = self.self_expr(ctx, node, span)
        {
            return CheckedExpr {
                ty: field.ty,
                kind: CheckedExprKind::Field {
                    object: Box::new(object),
                    class,
                    index: field.index,
                },
                span,
            };
        }
        self.symbol_missing(self.name(name), span);
        error_expr(span)
    }

    fn check_binary(&mut self, ctx: &mut FunctionContext, op: BinaryOp, left: &Expr, right: &Expr, span: Span) -> CheckedExpr {
        // An integer literal on the left takes the type of the right operand.
        let (left, right) = if matches!(left.kind, ExprKind::IntLiteral(_)) {
            let right = self.check_expr(ctx, right, None);
            let left = self.check_expr(ctx, left, Some(right.ty));
            (left, right)
        } else {
            let left = self.check_expr(ctx, left, None);
            let right = self.check_expr(ctx, right, Some(left.ty));
            (left, right)
        };
        let (lt, rt) = (left.ty, right.ty);
        let unknown = lt.is_unknown() || rt.is_unknown();

        let ty = if op.is_arithmetic() {
            let string_concat = op == BinaryOp::Add && lt == Type::STRING && rt == Type::STRING;
            if !unknown && !string_concat && !(lt.is_numeric() && lt == rt) {
                self.binary_mismatch(op, lt, rt, span);
            }
            if unknown { Type::Unknown } else { lt }
        } else if op.is_ordering() {
            if !unknown && !(lt.is_numeric() && lt == rt) {
                self.binary_mismatch(op, lt, rt, span);
            }
            Type::BOOL
        } else if op.is_equality() {
            let comparable = lt == rt || self.is_assignable(lt, rt) || self.is_assignable(rt, lt);
            if !unknown && (!comparable || lt.is_void()) {
                self.binary_mismatch(op, lt, rt, span);
            }
            Type::BOOL
        } else {
            if !unknown && !(lt == Type::BOOL && rt == Type::BOOL) {
                self.binary_mismatch(op, lt, rt, span);
            }
            Type::BOOL
        };

        CheckedExpr {
            ty,
            kind: CheckedExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        }
    }

    fn binary_mismatch(&mut self, op: BinaryOp, left: Type, right: Type, span: Span) {
        let expected = format!("operands valid for '{}'", op.as_str());
        let found = format!("{} and {}", self.display(left), self.display(right));
        self.add_error(
            SemanticError::UnexpectedType {
                expected,
                found,
                span: span.into(),
            },
            span,
        );
    }

    fn check_unary(&mut self, ctx: &mut FunctionContext, op: UnaryOp, operand: &Expr, span: Span) -> CheckedExpr {
        let operand = self.check_expr(ctx, operand, None);
        let ty = match op {
            UnaryOp::Neg => {
                if !operand.ty.is_numeric() {
                    self.type_error("a numeric type", operand.ty, operand.span);
                }
                operand.ty
            }
            UnaryOp::Not => {
                self.expect_assignable(operand.ty, Type::BOOL, operand.span);
                Type::BOOL
            }
        };
        CheckedExpr {
            ty,
            kind: CheckedExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        }
    }

    fn check_field_access(&mut self, ctx: &mut FunctionContext, access: &FieldAccessExpr, span: Span) -> CheckedExpr {
        let object = self.check_expr(ctx, &access.object, None);
        let class = match object.ty {
            Type::Class(class) => class,
            Type::Unknown => return error_expr(span),
            other => {
                self.type_error("a class instance", other, object.span);
                return error_expr(span);
            }
        };
        let Some(field) = self.program.find_field(class, access.field).cloned() else {
            self.symbol_missing(self.name(access.field), span);
            return error_expr(span);
        };
        CheckedExpr {
            ty: field.ty,
            kind: CheckedExprKind::Field {
                object: Box::new(object),
                class,
                index: field.index,
            },
            span,
        }
    }

    fn check_new(&mut self, ctx: &mut FunctionContext, new_expr: &NewExpr, span: Span) -> CheckedExpr {
        let subst = ctx.subst.clone();
        let class = match self.resolve_type(&new_expr.ty, &subst) {
            Type::Class(class) => class,
            other => {
                self.type_error("a class", other, new_expr.ty.span);
                self.check_args_unchecked(ctx, &new_expr.args);
                return error_expr(span);
            }
        };
        let init = self.program.class(class).init;
        let params: Vec<Type> = init
            .map(|f| self.program.function(f).params.iter().map(|p| p.ty).collect())
            .unwrap_or_default();
        let args = self.check_call_args(ctx, &new_expr.args, &params, span);
        CheckedExpr {
            ty: Type::Class(class),
            kind: CheckedExprKind::New { class, init, args },
            span,
        }
    }

    fn check_if(&mut self, ctx: &mut FunctionContext, if_expr: &IfExpr, expected: Option<Type>, span: Span) -> CheckedExpr {
        let condition = self.check_expr(ctx, &if_expr.condition, Some(Type::BOOL));
        self.expect_assignable(condition.ty, Type::BOOL, condition.span);
        let then_branch = self.check_block(ctx, &if_expr.then_branch, expected);
        let else_branch = if_expr
            .else_branch
            .as_ref()
            .map(|block| self.check_block(ctx, block, expected.or(Some(then_branch.ty))));

        let ty = match &else_branch {
            None => Type::VOID,
            Some(else_branch) if then_branch.diverges => else_branch.ty,
            Some(else_branch) if else_branch.diverges => then_branch.ty,
            Some(else_branch) => {
                let (then_ty, else_ty) = (then_branch.ty, else_branch.ty);
                if self.is_assignable(else_ty, then_ty) {
                    then_ty
                } else if self.is_assignable(then_ty, else_ty) {
                    else_ty
                } else {
                    self.type_mismatch(then_ty, else_ty, else_branch.span);
                    then_ty
                }
            }
        };
        CheckedExpr {
            ty,
            kind: CheckedExprKind::If {
                condition: Box::new(condition),
                then_branch,
                else_branch,
            },
            span,
        }
    }

    fn check_enum_variant(&mut self, ctx: &mut FunctionContext, variant: &EnumVariantExpr, span: Span) -> CheckedExpr {
        let subst = ctx.subst.clone();
        let enum_id = match self.resolve_type(&variant.ty, &subst) {
            Type::Enum(enum_id) => enum_id,
            other => {
                self.type_error("an enum", other, variant.ty.span);
                return error_expr(span);
            }
        };
        let StructureDecl::Enum(decl) = &self.tree.structure(enum_id).decl else {
            return error_expr(span);
        };
        let Some(discriminant) = decl.variants.iter().position(|&v| v == variant.variant) else {
            let name = format!("{}.{}", self.tree.structure_path(enum_id, self.interner), self.name(variant.variant));
            self.symbol_missing(name, span);
            return error_expr(span);
        };
        CheckedExpr {
            ty: Type::Enum(enum_id),
            kind: CheckedExprKind::EnumVariant {
                enum_id,
                discriminant: discriminant as u32,
            },
            span,
        }
    }

    /// Check a block in its own lexical scope. The tail expression, if any,
    /// is the block's value.
    pub(super) fn check_block(&mut self, ctx: &mut FunctionContext, block: &Block, expected: Option<Type>) -> CheckedBlock {
        ctx.push_scope();
        let mut stmts = Vec::with_capacity(block.stmts.len());
        let mut diverges = false;
        let mut reported = false;
        for stmt in &block.stmts {
            if diverges && !reported {
                self.add_warning(SemanticWarning::UnreachableCode { span: stmt.span().into() }, stmt.span());
                reported = true;
            }
            let checked = self.check_stmt(ctx, stmt);
            diverges |= match &checked {
                CheckedStmt::Return { .. } => true,
                CheckedStmt::Expr(expr) => expr_diverges(expr),
                _ => false,
            };
            stmts.push(checked);
        }
        let tail = block.tail.as_ref().map(|tail| {
            if diverges && !reported {
                self.add_warning(SemanticWarning::UnreachableCode { span: tail.span.into() }, tail.span);
            }
            Box::new(self.check_expr(ctx, tail, expected))
        });
        if let Some(tail) = &tail {
            diverges |= expr_diverges(tail);
        }
        ctx.pop_scope();

        CheckedBlock {
            ty: tail.as_ref().map_or(Type::VOID, |t| t.ty),
            stmts,
            tail,
            diverges,
            span: block.span,
        }
    }
}

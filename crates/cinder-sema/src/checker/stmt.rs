// checker/stmt.rs

use cinder_frontend::ast::{AssignStmt, ExprKind, LetStmt, Stmt};

use super::Checker;
use super::scope::{Declared, FunctionContext};
use crate::checked::{AssignTarget, CheckedExprKind, CheckedStmt};
use crate::errors::{SemanticError, SemanticWarning};
use crate::types::Type;

impl Checker<'_> {
    pub(super) fn check_stmt(&mut self, ctx: &mut FunctionContext, stmt: &Stmt) -> CheckedStmt {
        match stmt {
            Stmt::Let(let_stmt) => self.check_let(ctx, let_stmt),
            Stmt::Assign(assign) => self.check_assign(ctx, assign),
            Stmt::Expr(expr_stmt) => CheckedStmt::Expr(self.check_expr(ctx, &expr_stmt.expr, None)),
            Stmt::Return(ret) => {
                let return_type = ctx.return_type;
                let value = ret.value.as_ref().map(|value| {
                    let expected = (!return_type.is_void()).then_some(return_type);
                    let checked = self.check_expr(ctx, value, expected);
                    if return_type.is_void() {
                        self.type_mismatch(Type::VOID, checked.ty, checked.span);
                    } else {
                        self.expect_assignable(checked.ty, return_type, checked.span);
                    }
                    checked
                });
                if value.is_none() && !return_type.is_void() {
                    self.type_mismatch(return_type, Type::VOID, ret.span);
                }
                CheckedStmt::Return { value, span: ret.span }
            }
            Stmt::While(while_stmt) => {
                let condition = self.check_expr(ctx, &while_stmt.condition, Some(Type::BOOL));
                self.expect_assignable(condition.ty, Type::BOOL, condition.span);
                let body = self.check_block(ctx, &while_stmt.body, None);
                CheckedStmt::While {
                    condition,
                    body,
                    span: while_stmt.span,
                }
            }
        }
    }

    /// The initializer is checked before the name is bound, so
    /// `let x = x + 1` reads the outer `x`.
    fn check_let(&mut self, ctx: &mut FunctionContext, let_stmt: &LetStmt) -> CheckedStmt {
        let subst = ctx.subst.clone();
        let declared = let_stmt.ty.as_ref().map(|ty| self.resolve_type(ty, &subst));
        let init = let_stmt
            .init
            .as_ref()
            .map(|init| self.check_expr(ctx, init, declared));

        let ty = match (declared, &init) {
            (Some(declared), Some(init)) => {
                self.expect_assignable(init.ty, declared, init.span);
                declared
            }
            (Some(declared), None) => declared,
            (None, Some(init)) if init.ty.is_void() => {
                self.type_error("a value", init.ty, init.span);
                Type::Unknown
            }
            (None, Some(init)) => init.ty,
            (None, None) => {
                self.add_error(
                    SemanticError::UnableToInferType {
                        name: self.name(let_stmt.name),
                        span: let_stmt.span.into(),
                    },
                    let_stmt.span,
                );
                Type::Unknown
            }
        };

        let local = match ctx.declare(let_stmt.name, ty, let_stmt.span) {
            Declared::Fresh(local) => local,
            declared @ Declared::Shadowing(_) => {
                self.add_warning(
                    SemanticWarning::ShadowedBinding {
                        name: self.name(let_stmt.name),
                        span: let_stmt.span.into(),
                    },
                    let_stmt.span,
                );
                declared.local()
            }
            declared @ Declared::Duplicate(_) => {
                self.add_error(
                    SemanticError::SymbolAlreadyExists {
                        name: self.name(let_stmt.name),
                        span: let_stmt.span.into(),
                    },
                    let_stmt.span,
                );
                declared.local()
            }
        };
        CheckedStmt::Let {
            local,
            init,
            span: let_stmt.span,
        }
    }

    fn check_assign(&mut self, ctx: &mut FunctionContext, assign: &AssignStmt) -> CheckedStmt {
        let target_expr = &assign.target;
        let assignable = matches!(target_expr.kind, ExprKind::Identifier(_) | ExprKind::FieldAccess(_));
        let target = self.check_expr(ctx, target_expr, None);
        let value = self.check_expr(ctx, &assign.value, Some(target.ty));

        let target_ty = target.ty;
        let target = match target.kind {
            CheckedExprKind::Local(local) if assignable => Some(AssignTarget::Local(local)),
            CheckedExprKind::Field { object, class, index } if assignable => Some(AssignTarget::Field {
                object: *object,
                class,
                index,
            }),
            CheckedExprKind::Error => None,
            _ => {
                self.add_error(
                    SemanticError::NotAssignable {
                        span: target_expr.span.into(),
                    },
                    target_expr.span,
                );
                None
            }
        };
        self.expect_assignable(value.ty, target_ty, value.span);

        match target {
            Some(target) => CheckedStmt::Assign {
                target,
                value,
                span: assign.span,
            },
            // Keep the value's side effects.
            None => CheckedStmt::Expr(value),
        }
    }
}

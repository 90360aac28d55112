// checker/calls.rs
//
// Free function, method and extension calls: callee lookup, type-argument
// selection, argument checking and dispatch selection.

use cinder_frontend::ast::{CallExpr, Expr, FuncDecl, MethodCallExpr, TypeExpr};
use cinder_identity::{ClassInstId, FuncInstId, FunctionSymbolId, Span, Symbol};

use super::Checker;
use super::expr::error_expr;
use super::scope::FunctionContext;
use crate::checked::{CheckedExpr, CheckedExprKind, Dispatch, MethodEntry};
use crate::errors::SemanticError;
use crate::types::Type;

/// Type arguments chosen for a generic callee, or the reason none were.
enum TypeArgs {
    Ready(Vec<Type>),
    /// Inferred from arguments that are already checked
    Inferred(Vec<Type>, Vec<CheckedExpr>),
    Failed,
}

impl Checker<'_> {
    pub(super) fn check_call(&mut self, ctx: &mut FunctionContext, expr: &Expr, call: &CallExpr) -> CheckedExpr {
        let span = expr.span;
        let Some((&name, prefix)) = call.callee.split_last() else {
            return error_expr(span);
        };

        if prefix.is_empty()
            && let Some(class) = ctx.class
            && let Some((owner, entry)) = self.program.find_method(class, name)
        {
            let Some(receiver) = self.self_expr(ctx, expr.id, span) else {
                self.add_error(SemanticError::MisplacedSelf { span: span.into() }, span);
                self.check_args_unchecked(ctx, &call.args);
                return error_expr(span);
            };
            return self.finish_method_call(ctx, span, receiver, owner, entry, &call.type_args, &call.args);
        }

        let Some(symbol) = self.lookup_function(ctx, prefix, name) else {
            self.symbol_missing(self.interner.join(&call.callee), span);
            self.check_args_unchecked(ctx, &call.args);
            return error_expr(span);
        };

        let decl = self.tree.function(symbol).decl.clone();
        let (type_args, prechecked) = match self.select_type_args(ctx, &decl, &call.type_args, &call.args, span) {
            TypeArgs::Ready(args) => (args, None),
            TypeArgs::Inferred(args, checked) => (args, Some(checked)),
            TypeArgs::Failed => return error_expr(span),
        };
        let Some(function) = self.check_function_inner(symbol, &type_args, None, span) else {
            return error_expr(span);
        };
        let args = self.finish_args(ctx, function, &call.args, prechecked, span);
        CheckedExpr {
            ty: self.program.function(function).return_type,
            kind: CheckedExprKind::Call {
                function,
                receiver: None,
                args,
                dispatch: Dispatch::Static,
            },
            span,
        }
    }

    /// Unqualified names search the namespace chain, then imports.
    /// Qualified names start at the project root.
    fn lookup_function(&self, ctx: &FunctionContext, prefix: &[Symbol], name: Symbol) -> Option<FunctionSymbolId> {
        if !prefix.is_empty() {
            let ns = self.tree.lookup_namespace(prefix)?;
            return self.tree.function_in(ns, name);
        }
        self.tree
            .namespace_chain(ctx.namespace)
            .find_map(|ns| self.tree.function_in(ns, name))
            .or_else(|| {
                self.resolved
                    .imports(ctx.file)
                    .iter()
                    .find_map(|&ns| self.tree.function_in(ns, name))
            })
    }

    pub(super) fn check_method_call(
        &mut self,
        ctx: &mut FunctionContext,
        expr: &Expr,
        call: &MethodCallExpr,
    ) -> CheckedExpr {
        let span = expr.span;
        let receiver = self.check_expr(ctx, &call.receiver, None);
        match receiver.ty {
            Type::Unknown => {
                self.check_args_unchecked(ctx, &call.args);
                return error_expr(span);
            }
            Type::Protocol(_) => {
                self.type_error("a class or extension receiver", receiver.ty, receiver.span);
                self.check_args_unchecked(ctx, &call.args);
                return error_expr(span);
            }
            Type::Class(class) => {
                if let Some((owner, entry)) = self.program.find_method(class, call.method) {
                    return self.finish_method_call(ctx, span, receiver, owner, entry, &call.type_args, &call.args);
                }
            }
            Type::Primitive(_) | Type::Enum(_) => {}
        }
        self.check_extension_call(ctx, span, receiver, call)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_method_call(
        &mut self,
        ctx: &mut FunctionContext,
        span: Span,
        receiver: CheckedExpr,
        owner: ClassInstId,
        entry: MethodEntry,
        type_args: &[TypeExpr],
        args: &[Expr],
    ) -> CheckedExpr {
        let (function, prechecked) = match entry {
            MethodEntry::Instance(function) => {
                if !type_args.is_empty() {
                    self.add_error(
                        SemanticError::WrongNumberOfTypeArguments {
                            expected: 0,
                            found: type_args.len(),
                            span: span.into(),
                        },
                        span,
                    );
                }
                (function, None)
            }
            MethodEntry::Generic(symbol) => {
                let decl = self.tree.function(symbol).decl.clone();
                let (chosen, prechecked) = match self.select_type_args(ctx, &decl, type_args, args, span) {
                    TypeArgs::Ready(chosen) => (chosen, None),
                    TypeArgs::Inferred(chosen, checked) => (chosen, Some(checked)),
                    TypeArgs::Failed => return error_expr(span),
                };
                let Some(function) = self.check_function_inner(symbol, &chosen, Some(Type::Class(owner)), span) else {
                    return error_expr(span);
                };
                (function, prechecked)
            }
        };

        let args = self.finish_args(ctx, function, args, prechecked, span);
        let Some(slot) = self.program.function(function).vtable_slot else {
            return self.static_call(function, receiver, args, span);
        };
        // The runtime class of a fresh object is its static class.
        let fresh = match &receiver.kind {
            CheckedExprKind::New { class, .. } => Some(*class),
            _ => None,
        };
        if let Some(exact) = fresh.and_then(|class| self.program.class(class).vtable.get(slot as usize).copied()) {
            return self.static_call(exact, receiver, args, span);
        }
        CheckedExpr {
            ty: self.program.function(function).return_type,
            kind: CheckedExprKind::Call {
                function,
                receiver: Some(Box::new(receiver)),
                args,
                dispatch: Dispatch::Virtual { slot },
            },
            span,
        }
    }

    fn static_call(&self, function: FuncInstId, receiver: CheckedExpr, args: Vec<CheckedExpr>, span: Span) -> CheckedExpr {
        CheckedExpr {
            ty: self.program.function(function).return_type,
            kind: CheckedExprKind::Call {
                function,
                receiver: Some(Box::new(receiver)),
                args,
                dispatch: Dispatch::Static,
            },
            span,
        }
    }

    /// Extension functions visible from the call site whose receiver type
    /// accepts the receiver value.
    fn check_extension_call(
        &mut self,
        ctx: &mut FunctionContext,
        span: Span,
        receiver: CheckedExpr,
        call: &MethodCallExpr,
    ) -> CheckedExpr {
        let mut candidates: Vec<FunctionSymbolId> = Vec::new();
        let namespaces: Vec<_> = self
            .tree
            .namespace_chain(ctx.namespace)
            .chain(self.resolved.imports(ctx.file).iter().copied())
            .collect();
        for ns in namespaces {
            candidates.extend(self.tree.extensions_in(ns, call.method));
        }

        for symbol in candidates {
            let decl = self.tree.function(symbol).decl.clone();
            let Some(receiver_te) = &decl.receiver else {
                continue;
            };
            let (type_args, receiver_ty) = if decl.type_params.is_empty() {
                let ty = self.resolve_type(receiver_te, &Default::default());
                (Vec::new(), ty)
            } else {
                let inferred = self.infer_type_args(&decl.type_params, &[(receiver_te, receiver.ty)]);
                let Some(type_args) = inferred.into_iter().collect::<Option<Vec<_>>>() else {
                    continue;
                };
                let mut subst = Default::default();
                super::type_resolution::bind(&decl.type_params, &type_args, &mut subst);
                let ty = self.resolve_type(receiver_te, &subst);
                (type_args, ty)
            };
            if receiver_ty.is_unknown() || !self.is_assignable(receiver.ty, receiver_ty) {
                continue;
            }
            if !call.type_args.is_empty() {
                self.add_error(
                    SemanticError::WrongNumberOfTypeArguments {
                        expected: 0,
                        found: call.type_args.len(),
                        span: span.into(),
                    },
                    span,
                );
            }
            let Some(function) = self.check_function_inner(symbol, &type_args, Some(receiver_ty), span) else {
                return error_expr(span);
            };
            let args = self.finish_args(ctx, function, &call.args, None, span);
            return self.static_call(function, receiver, args, span);
        }

        let name = format!("{}.{}", self.display(receiver.ty), self.name(call.method));
        self.symbol_missing(name, span);
        self.check_args_unchecked(ctx, &call.args);
        error_expr(span)
    }

    /// Explicit type arguments must match the declared count; otherwise
    /// every type parameter has to be inferable from the arguments.
    fn select_type_args(
        &mut self,
        ctx: &mut FunctionContext,
        decl: &FuncDecl,
        explicit: &[TypeExpr],
        args: &[Expr],
        span: Span,
    ) -> TypeArgs {
        let subst = ctx.subst.clone();
        if !explicit.is_empty() || decl.type_params.is_empty() {
            if explicit.len() != decl.type_params.len() {
                self.add_error(
                    SemanticError::WrongNumberOfTypeArguments {
                        expected: decl.type_params.len(),
                        found: explicit.len(),
                        span: span.into(),
                    },
                    span,
                );
                self.check_args_unchecked(ctx, args);
                return TypeArgs::Failed;
            }
            let chosen: Vec<Type> = explicit.iter().map(|te| self.resolve_type(te, &subst)).collect();
            if chosen.iter().any(|t| t.is_unknown()) {
                self.check_args_unchecked(ctx, args);
                return TypeArgs::Failed;
            }
            return TypeArgs::Ready(chosen);
        }

        let checked = self.check_args_unchecked(ctx, args);
        let pairs: Vec<(&TypeExpr, Type)> = decl
            .params
            .iter()
            .zip(&checked)
            .map(|(param, arg)| (&param.ty, arg.ty))
            .collect();
        let inferred = self.infer_type_args(&decl.type_params, &pairs);
        let mut chosen = Vec::with_capacity(inferred.len());
        for (param, ty) in decl.type_params.iter().zip(inferred) {
            match ty {
                Some(ty) => chosen.push(ty),
                None => {
                    self.add_error(
                        SemanticError::UnableToInferType {
                            name: self.name(param.name),
                            span: span.into(),
                        },
                        span,
                    );
                    return TypeArgs::Failed;
                }
            }
        }
        TypeArgs::Inferred(chosen, checked)
    }

    /// Check arguments against the callee's parameters, reusing arguments
    /// that were already checked for inference.
    fn finish_args(
        &mut self,
        ctx: &mut FunctionContext,
        function: FuncInstId,
        args: &[Expr],
        prechecked: Option<Vec<CheckedExpr>>,
        span: Span,
    ) -> Vec<CheckedExpr> {
        let params: Vec<Type> = self.program.function(function).params.iter().map(|p| p.ty).collect();
        match prechecked {
            None => self.check_call_args(ctx, args, &params, span),
            Some(checked) => {
                if checked.len() != params.len() {
                    self.wrong_arity(params.len(), checked.len(), span);
                    return checked;
                }
                for (arg, &param) in checked.iter().zip(&params) {
                    self.expect_assignable(arg.ty, param, arg.span);
                }
                checked
            }
        }
    }

    pub(super) fn check_call_args(
        &mut self,
        ctx: &mut FunctionContext,
        args: &[Expr],
        params: &[Type],
        span: Span,
    ) -> Vec<CheckedExpr> {
        if args.len() != params.len() {
            self.wrong_arity(params.len(), args.len(), span);
            return self.check_args_unchecked(ctx, args);
        }
        args.iter()
            .zip(params)
            .map(|(arg, &param)| {
                let checked = self.check_expr(ctx, arg, Some(param));
                self.expect_assignable(checked.ty, param, checked.span);
                checked
            })
            .collect()
    }

    /// Check arguments for their own diagnostics when the callee is unknown.
    pub(super) fn check_args_unchecked(&mut self, ctx: &mut FunctionContext, args: &[Expr]) -> Vec<CheckedExpr> {
        args.iter().map(|arg| self.check_expr(ctx, arg, None)).collect()
    }
}

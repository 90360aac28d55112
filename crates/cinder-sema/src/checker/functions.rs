// checker/functions.rs
//
// Function instantiation and body checking.

use cinder_identity::{ClassInstId, FuncInstId, FunctionSymbolId, Span};

use super::scope::FunctionContext;
use super::type_resolution::bind;
use super::{Checker, FunctionEnv, MAX_INSTANTIATION_DEPTH, Substitution};
use crate::checked::{CheckedBlock, CheckedFunction, CheckedLocal, CheckedParam, FieldInit};
use crate::errors::SemanticError;
use crate::scope_tree::{FunctionKind, FunctionOwner, StructureDecl};
use crate::specialization::FunctionKey;
use crate::types::Type;

impl Checker<'_> {
    pub(super) fn check_function_inner(
        &mut self,
        symbol: FunctionSymbolId,
        type_args: &[Type],
        receiver: Option<Type>,
        span: Span,
    ) -> Option<FuncInstId> {
        let key = FunctionKey {
            symbol,
            type_args: type_args.to_vec(),
            receiver,
        };
        if let Some(entry) = self.program.cache.functions.lookup(&key) {
            return Some(entry.id());
        }

        let function = self.tree.function(symbol).clone();
        if function.kind == FunctionKind::Requirement {
            return None;
        }
        if type_args.len() != function.decl.type_params.len() {
            self.add_error(
                SemanticError::WrongNumberOfTypeArguments {
                    expected: function.decl.type_params.len(),
                    found: type_args.len(),
                    span: span.into(),
                },
                span,
            );
            return None;
        }

        let owner = match (function.owner, receiver) {
            (FunctionOwner::Namespace(_), _) => None,
            (FunctionOwner::Structure(_), Some(Type::Class(class))) => Some(class),
            (FunctionOwner::Structure(structure), _) => {
                // Members of non-generic classes can be requested directly.
                if self.tree.structure(structure).type_param_count() != 0 {
                    return None;
                }
                let class = self.check_class_inner(structure, &[], span)?;
                let receiver = Some(Type::Class(class));
                return self.check_function_inner(symbol, type_args, receiver, span);
            }
        };

        if !type_args.is_empty() && self.depth >= MAX_INSTANTIATION_DEPTH {
            self.add_error(
                SemanticError::InstantiationTooDeep {
                    name: self.name(function.name),
                    limit: MAX_INSTANTIATION_DEPTH,
                    span: span.into(),
                },
                span,
            );
            return None;
        }
        Some(self.instantiate_function(symbol, type_args, receiver, owner))
    }

    /// Create the instance and its signature; the body is queued.
    pub(super) fn instantiate_function(
        &mut self,
        symbol: FunctionSymbolId,
        type_args: &[Type],
        receiver: Option<Type>,
        owner: Option<ClassInstId>,
    ) -> FuncInstId {
        let function = self.tree.function(symbol).clone();
        let decl = function.decl.clone();
        let id = FuncInstId::new(self.program.functions.len() as u32);
        let key = FunctionKey {
            symbol,
            type_args: type_args.to_vec(),
            receiver,
        };
        self.program.cache.functions.begin(key.clone(), id);

        let mut subst: Substitution = owner
            .and_then(|class| self.class_envs.get(&class).cloned())
            .unwrap_or_default();
        bind(&decl.type_params, type_args, &mut subst);

        let namespace = match function.owner {
            FunctionOwner::Namespace(ns) => ns,
            FunctionOwner::Structure(structure) => self.tree.structure(structure).namespace,
        };
        let depth = if type_args.is_empty() {
            self.depth
        } else {
            self.depth + 1
        };

        // Placeholder so recursive signatures see the instance.
        self.program.functions.push(CheckedFunction {
            symbol: Some(symbol),
            name: function.name,
            link_name: String::new(),
            kind: function.kind,
            type_args: type_args.to_vec(),
            receiver,
            params: Vec::new(),
            locals: Vec::new(),
            field_inits: Vec::new(),
            body: None,
            return_type: Type::Unknown,
            is_virtual: false,
            is_override: false,
            owner,
            vtable_slot: None,
            overrides: Default::default(),
            exported: false,
            span: decl.span,
        });

        let self_type = match function.kind {
            FunctionKind::Method | FunctionKind::Init => owner.map(Type::Class),
            FunctionKind::Extension => receiver,
            FunctionKind::Free | FunctionKind::Requirement => None,
        };

        let mut params = Vec::with_capacity(decl.params.len());
        let mut locals = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            let ty = self.resolve_type(&param.ty, &subst);
            params.push(CheckedParam {
                name: param.name,
                ty,
                local: cinder_identity::LocalId::new(locals.len() as u32),
            });
            locals.push(CheckedLocal {
                name: param.name,
                ty,
                span: param.span,
            });
        }
        let return_type = match (&decl.return_type, function.kind) {
            (_, FunctionKind::Init) | (None, _) => Type::VOID,
            (Some(ret), _) => self.resolve_type(ret, &subst),
        };

        let exported = function.kind == FunctionKind::Free && type_args.is_empty();
        let link_name = self.link_name(symbol, id, type_args, owner, exported);
        tracing::trace!(function = %link_name, "instantiated function");

        let instance = &mut self.program.functions[id.as_usize()];
        instance.params = params;
        instance.locals = locals;
        instance.return_type = return_type;
        instance.link_name = link_name;
        instance.exported = exported;

        self.function_envs.insert(
            id,
            FunctionEnv {
                subst,
                namespace,
                file: function.file,
                class: owner,
                self_type,
                depth,
            },
        );
        self.program.cache.functions.finish(key, id);
        if decl.body.is_some() {
            self.pending_bodies.push_back(id);
        }
        id
    }

    /// Exported functions keep their qualified source name; everything else
    /// gets the instance index appended.
    fn link_name(
        &self,
        symbol: FunctionSymbolId,
        id: FuncInstId,
        type_args: &[Type],
        owner: Option<ClassInstId>,
        exported: bool,
    ) -> String {
        let function = self.tree.function(symbol);
        let name = self.name(function.name);
        let qualified = match (owner, function.owner) {
            (Some(class), _) => format!("{}.{name}", self.program.class(class).display_name),
            (None, FunctionOwner::Namespace(ns)) => {
                let prefix = self.tree.namespace_path(ns, self.interner);
                if prefix.is_empty() {
                    name
                } else {
                    format!("{prefix}.{name}")
                }
            }
            (None, FunctionOwner::Structure(structure)) => {
                format!("{}.{name}", self.tree.structure_path(structure, self.interner))
            }
        };
        if exported {
            return qualified;
        }
        if type_args.is_empty() {
            format!("{qualified}${}", id.index())
        } else {
            let args: Vec<String> = type_args.iter().map(|&t| self.display(t)).collect();
            format!("{qualified}<{}>${}", args.join(", "), id.index())
        }
    }

    /// Check a queued body under the substitution of its instance.
    pub(super) fn check_body(&mut self, id: FuncInstId) {
        let Some(env) = self.function_envs.get(&id).cloned() else {
            return;
        };
        let function = self.program.function(id);
        let (symbol, kind, owner, return_type, span) = (
            function.symbol,
            function.kind,
            function.owner,
            function.return_type,
            function.span,
        );
        let params = function.locals.clone();
        tracing::trace!(function = %function.link_name, "checking body");
        let decl = symbol.map(|s| self.tree.function(s).decl.clone());
        let outer_depth = self.depth;
        self.depth = env.depth;

        let mut ctx = FunctionContext::new(id, env, return_type, params);
        let field_inits = match (kind, owner) {
            (FunctionKind::Init, Some(class)) => self.check_field_defaults(&mut ctx, class),
            _ => Vec::new(),
        };

        let body = match decl.as_ref().and_then(|d| d.body.as_ref()) {
            Some(block) => {
                let expected = (!return_type.is_void()).then_some(return_type);
                let checked = self.check_block(&mut ctx, block, expected);
                self.check_function_result(&checked, return_type);
                Some(checked)
            }
            None => self.program.function(id).body.clone().or(Some(CheckedBlock {
                stmts: Vec::new(),
                tail: None,
                ty: Type::VOID,
                diverges: false,
                span,
            })),
        };

        self.depth = outer_depth;
        let instance = &mut self.program.functions[id.as_usize()];
        instance.body = body;
        instance.locals = ctx.locals;
        instance.field_inits = field_inits;
    }

    /// A non-void function must produce a value on every path.
    fn check_function_result(&mut self, body: &CheckedBlock, return_type: Type) {
        if return_type.is_void() || return_type.is_unknown() || body.diverges {
            return;
        }
        match &body.tail {
            Some(tail) => {
                self.expect_assignable(tail.ty, return_type, tail.span);
            }
            None => self.type_mismatch(return_type, Type::VOID, body.span),
        }
    }

    /// Defaults of every field, inherited ones included, evaluated under the
    /// substitution of the class that declares them. Diagnostics for
    /// inherited defaults were already reported with the ancestor.
    fn check_field_defaults(&mut self, ctx: &mut FunctionContext, class: ClassInstId) -> Vec<FieldInit> {
        let fields = self.program.class(class).fields.clone();
        let mut inits = Vec::new();
        for field in fields {
            let declaring = self.program.class(field.declared_in).structure;
            let StructureDecl::Class(decl) = &self.tree.structure(declaring).decl else {
                continue;
            };
            let Some(default) = decl
                .fields
                .iter()
                .find(|f| f.name == field.name)
                .and_then(|f| f.default_value.clone())
            else {
                continue;
            };

            let inherited = field.declared_in != class;
            let marks = (self.errors.len(), self.warnings.len());
            let subst = self.class_envs.get(&field.declared_in).cloned().unwrap_or_default();
            let saved = std::mem::replace(&mut ctx.subst, subst);
            ctx.push_scope();
            let value = self.check_expr(ctx, &default, Some(field.ty));
            ctx.pop_scope();
            ctx.subst = saved;
            self.expect_assignable(value.ty, field.ty, value.span);
            if inherited {
                self.errors.truncate(marks.0);
                self.warnings.truncate(marks.1);
            }
            inits.push(FieldInit {
                index: field.index,
                value,
            });
        }
        inits
    }
}

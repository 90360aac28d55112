// checker/type_resolution.rs
//
// TypeExpr -> Type under a substitution, assignability and type-argument
// inference.

use cinder_frontend::ast::{TypeExpr, TypeExprKind, TypeParam};
use cinder_identity::Symbol;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::Checker;
use crate::errors::SemanticError;
use crate::resolver::TypeRef;
use crate::scope_tree::StructureKind;
use crate::types::Type;

/// Type parameter bindings for one instantiation.
pub(crate) type Substitution = FxHashMap<Symbol, Type>;

/// Bind `params` to `args` positionally; missing arguments become Unknown.
pub(crate) fn bind(params: &[TypeParam], args: &[Type], subst: &mut Substitution) {
    for (i, param) in params.iter().enumerate() {
        subst.insert(param.name, args.get(i).copied().unwrap_or(Type::Unknown));
    }
}

impl Checker<'_> {
    /// Resolve a type expression. Named classes are instantiated on demand,
    /// which may hand back an in-progress placeholder.
    pub(super) fn resolve_type(&mut self, te: &TypeExpr, subst: &Substitution) -> Type {
        let type_args = match &te.kind {
            TypeExprKind::Primitive(p) => return Type::Primitive(*p),
            TypeExprKind::Named { type_args, .. } => type_args,
        };
        match self.resolved.type_ref(te.id) {
            TypeRef::Unknown => Type::Unknown,
            TypeRef::TypeParam(name) => {
                if !type_args.is_empty() {
                    self.add_error(
                        SemanticError::WrongNumberOfTypeArguments {
                            expected: 0,
                            found: type_args.len(),
                            span: te.span.into(),
                        },
                        te.span,
                    );
                }
                subst.get(&name).copied().unwrap_or(Type::Unknown)
            }
            TypeRef::Structure(sid) => {
                let args: SmallVec<[Type; 4]> = type_args
                    .iter()
                    .map(|arg| self.resolve_type(arg, subst))
                    .collect();
                let structure = self.tree.structure(sid);
                let (kind, expected) = (structure.kind(), structure.type_param_count());
                if args.len() != expected {
                    self.add_error(
                        SemanticError::WrongNumberOfTypeArguments {
                            expected,
                            found: args.len(),
                            span: te.span.into(),
                        },
                        te.span,
                    );
                    return Type::Unknown;
                }
                if args.iter().any(|a| a.is_unknown()) {
                    return Type::Unknown;
                }
                match kind {
                    StructureKind::Class => self
                        .check_class_inner(sid, &args, te.span)
                        .map_or(Type::Unknown, Type::Class),
                    StructureKind::Protocol => Type::Protocol(sid),
                    StructureKind::Enum => Type::Enum(sid),
                }
            }
        }
    }

    /// Can a value of type `from` be stored where `to` is expected?
    pub(super) fn is_assignable(&self, from: Type, to: Type) -> bool {
        if from == to || from.is_unknown() || to.is_unknown() {
            return true;
        }
        match (from, to) {
            (Type::Class(class), Type::Class(target)) => self.program.is_subclass(class, target),
            (Type::Class(class), Type::Protocol(protocol)) => {
                let implementors = &self.tree.structure(protocol).implementors;
                self.program
                    .chain(class)
                    .any(|c| implementors.contains(&self.program.class(c).structure))
            }
            _ => false,
        }
    }

    /// Report and return false unless `found` is assignable to `expected`.
    pub(super) fn expect_assignable(&mut self, found: Type, expected: Type, span: cinder_identity::Span) -> bool {
        if self.is_assignable(found, expected) {
            return true;
        }
        self.type_mismatch(expected, found, span);
        false
    }

    /// Infer type arguments by matching declared parameter types against
    /// argument types. Unbound parameters stay None.
    pub(super) fn infer_type_args(
        &self,
        params: &[TypeParam],
        pairs: &[(&TypeExpr, Type)],
    ) -> Vec<Option<Type>> {
        let names: SmallVec<[Symbol; 4]> = params.iter().map(|p| p.name).collect();
        let mut bindings = Substitution::default();
        for &(te, actual) in pairs {
            self.unify(te, actual, &names, &mut bindings);
        }
        params.iter().map(|p| bindings.get(&p.name).copied()).collect()
    }

    fn unify(&self, te: &TypeExpr, actual: Type, params: &[Symbol], bindings: &mut Substitution) {
        if actual.is_unknown() {
            return;
        }
        let TypeExprKind::Named { type_args, .. } = &te.kind else {
            return;
        };
        match self.resolved.type_ref(te.id) {
            TypeRef::TypeParam(name) if params.contains(&name) => {
                bindings.entry(name).or_insert(actual);
            }
            TypeRef::Structure(sid) if !type_args.is_empty() => {
                let Type::Class(class) = actual else {
                    return;
                };
                // The argument may be a subclass of the parameter's class.
                let Some(matching) = self
                    .program
                    .chain(class)
                    .find(|&c| self.program.class(c).structure == sid)
                else {
                    return;
                };
                let actual_args = self.program.class(matching).type_args.clone();
                for (arg_te, arg) in type_args.iter().zip(actual_args) {
                    self.unify(arg_te, arg, params, bindings);
                }
            }
            _ => {}
        }
    }
}

// checker/scope.rs
//
// Per-body checking context, passed explicitly through expression and
// statement checking.

use cinder_identity::{ClassInstId, FileId, FuncInstId, LocalId, NamespaceId, Span, Symbol};
use rustc_hash::FxHashMap;

use super::{FunctionEnv, Substitution};
use crate::checked::CheckedLocal;
use crate::types::Type;

/// Outcome of declaring a local binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Declared {
    Fresh(LocalId),
    /// Hides a binding of an enclosing block
    Shadowing(LocalId),
    /// Same name already bound in this block; the new binding wins
    Duplicate(LocalId),
}

impl Declared {
    pub fn local(self) -> LocalId {
        match self {
            Declared::Fresh(id) | Declared::Shadowing(id) | Declared::Duplicate(id) => id,
        }
    }
}

pub(super) struct FunctionContext {
    pub function: FuncInstId,
    pub subst: Substitution,
    pub namespace: NamespaceId,
    pub file: FileId,
    pub class: Option<ClassInstId>,
    pub self_type: Option<Type>,
    pub return_type: Type,
    pub locals: Vec<CheckedLocal>,
    scopes: Vec<FxHashMap<Symbol, LocalId>>,
}

impl FunctionContext {
    pub fn new(function: FuncInstId, env: FunctionEnv, return_type: Type, params: Vec<CheckedLocal>) -> Self {
        let mut params_scope = FxHashMap::default();
        for (i, param) in params.iter().enumerate() {
            params_scope.insert(param.name, LocalId::new(i as u32));
        }
        Self {
            function,
            subst: env.subst,
            namespace: env.namespace,
            file: env.file,
            class: env.class,
            self_type: env.self_type,
            return_type,
            locals: params,
            scopes: vec![params_scope],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Innermost binding of `name`.
    pub fn lookup(&self, name: Symbol) -> Option<LocalId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name).copied())
    }

    pub fn local_type(&self, id: LocalId) -> Type {
        self.locals[id.as_usize()].ty
    }

    pub fn declare(&mut self, name: Symbol, ty: Type, span: Span) -> Declared {
        let id = LocalId::new(self.locals.len() as u32);
        self.locals.push(CheckedLocal { name, ty, span });

        let Some((innermost, outer)) = self.scopes.split_last_mut() else {
            return Declared::Fresh(id);
        };
        let shadows = outer.iter().any(|scope| scope.contains_key(&name));
        match innermost.insert(name, id) {
            Some(_) => Declared::Duplicate(id),
            None if shadows => Declared::Shadowing(id),
            None => Declared::Fresh(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> FunctionContext {
        let env = FunctionEnv {
            subst: Substitution::default(),
            namespace: NamespaceId::new(0),
            file: FileId::new(0),
            class: None,
            self_type: None,
            depth: 0,
        };
        let param = CheckedLocal {
            name: Symbol::new_for_test(1),
            ty: Type::I64,
            span: Span::default(),
        };
        FunctionContext::new(FuncInstId::new(0), env, Type::VOID, vec![param])
    }

    #[test]
    fn params_are_the_first_locals() {
        let ctx = context();
        assert_eq!(ctx.lookup(Symbol::new_for_test(1)), Some(LocalId::new(0)));
        assert_eq!(ctx.local_type(LocalId::new(0)), Type::I64);
    }

    #[test]
    fn declare_classifies_bindings() {
        let mut ctx = context();
        let x = Symbol::new_for_test(2);
        ctx.push_scope();
        assert_eq!(ctx.declare(x, Type::I64, Span::default()), Declared::Fresh(LocalId::new(1)));
        assert_eq!(ctx.declare(x, Type::F64, Span::default()), Declared::Duplicate(LocalId::new(2)));
        ctx.push_scope();
        let shadowed = ctx.declare(x, Type::BOOL, Span::default());
        assert_eq!(shadowed, Declared::Shadowing(LocalId::new(3)));
        assert_eq!(ctx.local_type(ctx.lookup(x).unwrap()), Type::BOOL);
        ctx.pop_scope();
        assert_eq!(ctx.lookup(x), Some(LocalId::new(2)));
        let param = ctx.declare(Symbol::new_for_test(1), Type::I32, Span::default());
        assert_eq!(param, Declared::Shadowing(LocalId::new(4)));
    }
}

// checker/mod.rs
//
// Lazy, cache-driven type checker. Classes and functions are checked on
// first use; every (symbol, type arguments) tuple produces one instance.
// Function bodies are queued and drained once the outermost request
// returns, so signatures are always complete before any body is looked at.

mod calls;
mod classes;
mod errors;
mod expr;
mod functions;
mod scope;
mod stmt;
mod type_resolution;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use cinder_identity::{ClassInstId, FileId, FuncInstId, FunctionSymbolId, Interner, NamespaceId, StructureId};
use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::checked::CheckedProgram;
use crate::diagnostics::{TypeError, TypeWarning};
use crate::errors::SemanticError;
use crate::resolver::ResolvedNames;
use crate::scope_tree::{FunctionKind, FunctionOwner, ScopeTree, StructureKind};
use crate::types::Type;

use classes::PendingClass;
pub(crate) use type_resolution::Substitution;

/// Nested generic instantiations allowed before reporting an infinitely
/// expanding type.
pub const MAX_INSTANTIATION_DEPTH: u32 = 64;

/// Where a function instance's body is checked from.
#[derive(Debug, Clone)]
pub(crate) struct FunctionEnv {
    pub subst: Substitution,
    pub namespace: NamespaceId,
    pub file: FileId,
    /// Class instance whose members are implicitly in scope
    pub class: Option<ClassInstId>,
    pub self_type: Option<Type>,
    /// Instantiation depth of the request that created the function
    pub depth: u32,
}

/// Result of checking a whole program.
#[derive(Debug, Clone)]
pub struct CheckOutput {
    pub program: CheckedProgram,
    pub errors: Vec<TypeError>,
    pub warnings: Vec<TypeWarning>,
}

pub struct Checker<'a> {
    tree: &'a mut ScopeTree,
    resolved: &'a ResolvedNames,
    interner: &'a Interner,
    program: CheckedProgram,
    errors: Vec<TypeError>,
    warnings: Vec<TypeWarning>,
    class_envs: FxHashMap<ClassInstId, Substitution>,
    function_envs: FxHashMap<FuncInstId, FunctionEnv>,
    pending_bodies: VecDeque<FuncInstId>,
    /// Classes whose ancestor is being resolved, innermost last
    resolving_ancestors: Vec<ClassInstId>,
    /// Classes waiting for an in-progress ancestor, keyed by that ancestor
    waiting_on: FxHashMap<ClassInstId, Vec<PendingClass>>,
    /// Generic instantiation depth of the current context
    depth: u32,
    /// Public requests currently on the stack
    nesting: u32,
    draining: bool,
}

impl<'a> Checker<'a> {
    pub fn new(tree: &'a mut ScopeTree, resolved: &'a ResolvedNames, interner: &'a Interner) -> Self {
        Self {
            tree,
            resolved,
            interner,
            program: CheckedProgram::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            class_envs: FxHashMap::default(),
            function_envs: FxHashMap::default(),
            pending_bodies: VecDeque::new(),
            resolving_ancestors: Vec::new(),
            waiting_on: FxHashMap::default(),
            depth: 0,
            nesting: 0,
            draining: false,
        }
    }

    /// Check a class instantiation, returning the cached instance if it
    /// already exists.
    pub fn check_class(&mut self, structure: StructureId, type_args: &[Type]) -> Option<ClassInstId> {
        let span = self.tree.structure(structure).span();
        self.enter();
        let class = self.check_class_inner(structure, type_args, span);
        self.leave();
        class
    }

    /// Check a function instantiation. Methods need their class instance as
    /// `receiver`; extensions need the receiver type.
    pub fn check_function(
        &mut self,
        symbol: FunctionSymbolId,
        type_args: &[Type],
        receiver: Option<Type>,
    ) -> Option<FuncInstId> {
        let span = self.tree.function(symbol).decl.span;
        self.enter();
        let function = self.check_function_inner(symbol, type_args, receiver, span);
        self.leave();
        function
    }

    /// Check every non-generic declaration. Generic declarations are only
    /// checked through their instantiations.
    #[tracing::instrument(skip_all)]
    pub fn check_all(&mut self) {
        self.enter();
        self.check_modifiers();

        for structure in self.tree.structure_ids() {
            let symbol = self.tree.structure(structure);
            let (kind, generic, span) = (symbol.kind(), symbol.type_param_count() > 0, symbol.span());
            match kind {
                StructureKind::Class if !generic => {
                    self.check_class_inner(structure, &[], span);
                }
                StructureKind::Protocol => self.check_protocol(structure),
                _ => {}
            }
        }

        for symbol in self.tree.function_ids() {
            let function = self.tree.function(symbol).clone();
            if !function.decl.type_params.is_empty() {
                continue;
            }
            let span = function.decl.span;
            match function.kind {
                FunctionKind::Free => {
                    self.check_function_inner(symbol, &[], None, span);
                }
                FunctionKind::Extension => {
                    let Some(receiver) = &function.decl.receiver else {
                        continue;
                    };
                    let receiver = self.resolve_type(receiver, &Substitution::default());
                    if !receiver.is_unknown() {
                        self.check_function_inner(symbol, &[], Some(receiver), span);
                    }
                }
                FunctionKind::Method | FunctionKind::Init | FunctionKind::Requirement => {}
            }
        }
        self.leave();

        tracing::debug!(
            classes = self.program.classes.len(),
            functions = self.program.functions.len(),
            cache_hits = self.program.cache.classes.hits() + self.program.cache.functions.hits(),
            errors = self.errors.len(),
            "check finished"
        );
    }

    pub fn program(&self) -> &CheckedProgram {
        &self.program
    }

    pub fn errors(&self) -> &[TypeError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[TypeWarning] {
        &self.warnings
    }

    /// Hand over the checked program and its diagnostics.
    pub fn finish(mut self) -> CheckOutput {
        dedup_by_span(&mut self.errors, |e| (e.span, e.error.to_string()));
        dedup_by_span(&mut self.warnings, |w| (w.span, w.warning.to_string()));
        CheckOutput {
            program: self.program,
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    fn enter(&mut self) {
        self.nesting += 1;
    }

    fn leave(&mut self) {
        self.nesting -= 1;
        if self.nesting == 0 && !self.draining {
            self.complete_orphans();
            self.drain_bodies();
        }
    }

    /// Check queued bodies. Bodies may instantiate further generics whose
    /// bodies join the same queue.
    fn drain_bodies(&mut self) {
        self.draining = true;
        while let Some(function) = self.pending_bodies.pop_front() {
            self.check_body(function);
        }
        self.draining = false;
    }

    /// `virtual` and `override` are only meaningful on non-generic class
    /// methods. Reported once per declaration, not per instance.
    fn check_modifiers(&mut self) {
        for symbol in self.tree.function_ids() {
            let function = self.tree.function(symbol).clone();
            let modifiers = function.decl.modifiers;
            let span = function.decl.span;
            let allowed = function.kind == FunctionKind::Method
                && function.decl.type_params.is_empty()
                && matches!(function.owner, FunctionOwner::Structure(_));
            if allowed {
                continue;
            }
            if modifiers.is_virtual {
                self.add_error(SemanticError::MisplacedVirtual { span: span.into() }, span);
            }
            if modifiers.is_override {
                self.add_error(SemanticError::MisplacedOverride { span: span.into() }, span);
            }
        }
    }
}

/// Identical diagnostics arise when a generic body is checked once per
/// instantiation; keep the first of each.
fn dedup_by_span<T, K: Eq + Hash>(items: &mut Vec<T>, key: impl Fn(&T) -> K) {
    let mut seen: FxHashSet<K> = FxHashSet::default();
    items.retain(|item| seen.insert(key(item)));
}

// rc_scope.rs
//
// RC scope tracking for reference-counted values.
//
// Every block pushes a scope. Values the function owns a reference to are
// registered in the innermost scope and released when it is left, either by
// falling off the end of the block or by a `return`, which releases every
// active scope.

use cranelift::prelude::Value;
use cranelift_codegen::ir::StackSlot;

use crate::errors::{CodegenError, CodegenResult};

/// An owned reference waiting for its release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    /// Temporary: an allocation, call result or block result
    Value(Value),
    /// Local variable; whatever it holds at scope exit is released
    Slot(StackSlot),
}

#[derive(Debug, Default)]
pub(crate) struct RcScope {
    pub pending: Vec<Pending>,
}

/// Stack of RC scopes. The outermost scope is index 0.
#[derive(Debug, Default)]
pub(crate) struct RcScopeStack {
    scopes: Vec<RcScope>,
}

impl RcScopeStack {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(RcScope::default());
    }

    /// Pop the current scope, returning its pending references for cleanup.
    pub fn pop_scope(&mut self) -> CodegenResult<RcScope> {
        self.scopes
            .pop()
            .ok_or_else(|| CodegenError::internal("RC scope stack underflow"))
    }

    /// Register an owned reference in the innermost scope.
    pub fn register(&mut self, pending: Pending) -> CodegenResult<()> {
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| CodegenError::internal("register called with no active RC scope"))?;
        scope.pending.push(pending);
        Ok(())
    }

    /// Pending references of all active scopes, innermost first, each scope
    /// in reverse registration order. Used by `return`.
    pub fn all_pending_innermost_first(&self) -> Vec<Pending> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|s| s.pending.iter().rev().copied())
            .collect()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_codegen::entity::EntityRef;

    #[test]
    fn register_requires_a_scope() {
        let mut stack = RcScopeStack::new();
        assert!(stack.register(Pending::Value(Value::new(0))).is_err());
        assert!(stack.pop_scope().is_err());
    }

    #[test]
    fn return_sees_innermost_first() {
        let mut stack = RcScopeStack::new();
        stack.push_scope();
        stack.register(Pending::Slot(StackSlot::new(0))).unwrap();
        stack.register(Pending::Value(Value::new(1))).unwrap();
        stack.push_scope();
        stack.register(Pending::Value(Value::new(2))).unwrap();
        assert_eq!(stack.depth(), 2);

        assert_eq!(
            stack.all_pending_innermost_first(),
            vec![
                Pending::Value(Value::new(2)),
                Pending::Value(Value::new(1)),
                Pending::Slot(StackSlot::new(0)),
            ]
        );

        let inner = stack.pop_scope().unwrap();
        assert_eq!(inner.pending, vec![Pending::Value(Value::new(2))]);
        assert_eq!(stack.depth(), 1);
    }
}

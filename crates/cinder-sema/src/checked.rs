// checked.rs
//
// The checked program: concrete class and function instances with typed
// bodies. Immutable once the checker hands it over.

use cinder_frontend::ast::{BinaryOp, UnaryOp};
use cinder_identity::{ClassInstId, FuncInstId, FunctionSymbolId, Interner, LocalId, Span, StructureId, Symbol};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::scope_tree::{FunctionKind, ScopeTree};
use crate::specialization::SpecializationCache;
use crate::types::Type;

#[derive(Debug, Clone)]
pub struct CheckedField {
    pub name: Symbol,
    pub ty: Type,
    /// Position in the flattened field list; inherited fields come first
    pub index: usize,
    /// Class instance that declares the field
    pub declared_in: ClassInstId,
    pub span: Span,
}

/// A method as seen from its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodEntry {
    Instance(FuncInstId),
    /// Generic method, instantiated per call
    Generic(FunctionSymbolId),
}

#[derive(Debug, Clone)]
pub struct CheckedClass {
    /// Unique within the inheritance chain only; root is 0
    pub id: u32,
    pub root: ClassInstId,
    /// Running id counter, meaningful on the root
    pub next_id: u32,
    pub structure: StructureId,
    pub name: Symbol,
    /// Display form including type arguments, e.g. `Box<i32>`
    pub display_name: String,
    pub type_args: Vec<Type>,
    pub ancestor: Option<ClassInstId>,
    pub fields: Vec<CheckedField>,
    /// Methods declared by this class (not inherited)
    pub methods: FxHashMap<Symbol, MethodEntry>,
    /// Virtual methods introduced by this class, in slot order
    pub virtual_methods: Vec<FuncInstId>,
    /// Slot-owning base method per vtable slot, inherited slots first
    pub slot_owners: Vec<FuncInstId>,
    /// Implementation per slot for this exact class
    pub vtable: Vec<FuncInstId>,
    pub init: Option<FuncInstId>,
    pub protocols: Vec<StructureId>,
    /// Still being built; handed out as a placeholder on re-entry
    pub in_progress: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CheckedParam {
    pub name: Symbol,
    pub ty: Type,
    pub local: LocalId,
}

#[derive(Debug, Clone)]
pub struct CheckedLocal {
    pub name: Symbol,
    pub ty: Type,
    pub span: Span,
}

/// Field default evaluated by an initializer before its body.
#[derive(Debug, Clone)]
pub struct FieldInit {
    pub index: usize,
    pub value: CheckedExpr,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("override registered on a non-virtual function")]
pub struct NotVirtual;

#[derive(Debug, Clone)]
pub struct CheckedFunction {
    /// None for synthesized initializers
    pub symbol: Option<FunctionSymbolId>,
    pub name: Symbol,
    /// Symbol name in the emitted object
    pub link_name: String,
    pub kind: FunctionKind,
    pub type_args: Vec<Type>,
    pub receiver: Option<Type>,
    pub params: Vec<CheckedParam>,
    /// All locals including parameters, indexed by LocalId
    pub locals: Vec<CheckedLocal>,
    pub field_inits: Vec<FieldInit>,
    pub body: Option<CheckedBlock>,
    pub return_type: Type,
    pub is_virtual: bool,
    pub is_override: bool,
    pub owner: Option<ClassInstId>,
    pub vtable_slot: Option<u32>,
    /// Overriding class id (chain-local) to the implementing function
    pub overrides: FxHashMap<u32, FuncInstId>,
    /// Free non-generic function callable from outside
    pub exported: bool,
    pub span: Span,
}

impl CheckedFunction {
    /// Record that class `class_id` implements this virtual method with `func`.
    pub fn register_override(&mut self, class_id: u32, func: FuncInstId) -> Result<(), NotVirtual> {
        if !self.is_virtual {
            return Err(NotVirtual);
        }
        self.overrides.insert(class_id, func);
        Ok(())
    }

    pub fn is_dispatched(&self) -> bool {
        self.vtable_slot.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Static,
    Virtual { slot: u32 },
}

#[derive(Debug, Clone)]
pub struct CheckedExpr {
    pub ty: Type,
    pub kind: CheckedExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum CheckedExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(String),
    Local(LocalId),
    SelfRef,
    Field {
        object: Box<CheckedExpr>,
        class: ClassInstId,
        index: usize,
    },
    Binary {
        op: BinaryOp,
        left: Box<CheckedExpr>,
        right: Box<CheckedExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<CheckedExpr>,
    },
    /// Free function, method or extension call; the receiver is argument 0
    Call {
        function: FuncInstId,
        receiver: Option<Box<CheckedExpr>>,
        args: Vec<CheckedExpr>,
        dispatch: Dispatch,
    },
    New {
        class: ClassInstId,
        init: Option<FuncInstId>,
        args: Vec<CheckedExpr>,
    },
    If {
        condition: Box<CheckedExpr>,
        then_branch: CheckedBlock,
        else_branch: Option<CheckedBlock>,
    },
    Block(CheckedBlock),
    EnumVariant {
        enum_id: StructureId,
        discriminant: u32,
    },
    /// Placeholder for an expression that failed to check
    Error,
}

#[derive(Debug, Clone)]
pub struct CheckedBlock {
    pub stmts: Vec<CheckedStmt>,
    pub tail: Option<Box<CheckedExpr>>,
    pub ty: Type,
    /// Every path through the block ends in `return`
    pub diverges: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Local(LocalId),
    Field {
        object: CheckedExpr,
        class: ClassInstId,
        index: usize,
    },
}

#[derive(Debug, Clone)]
pub enum CheckedStmt {
    Let {
        local: LocalId,
        init: Option<CheckedExpr>,
        span: Span,
    },
    Assign {
        target: AssignTarget,
        value: CheckedExpr,
        span: Span,
    },
    Expr(CheckedExpr),
    Return {
        value: Option<CheckedExpr>,
        span: Span,
    },
    While {
        condition: CheckedExpr,
        body: CheckedBlock,
        span: Span,
    },
}

/// Output of semantic analysis consumed by code generation.
#[derive(Debug, Clone, Default)]
pub struct CheckedProgram {
    pub classes: Vec<CheckedClass>,
    pub functions: Vec<CheckedFunction>,
    pub cache: SpecializationCache,
}

impl CheckedProgram {
    pub fn class(&self, id: ClassInstId) -> &CheckedClass {
        &self.classes[id.as_usize()]
    }

    pub fn function(&self, id: FuncInstId) -> &CheckedFunction {
        &self.functions[id.as_usize()]
    }

    /// Look up an exported function by its link name.
    pub fn function_named(&self, link_name: &str) -> Option<FuncInstId> {
        self.functions
            .iter()
            .position(|f| f.link_name == link_name)
            .map(|index| FuncInstId::new(index as u32))
    }

    /// `class` followed by its ancestors.
    pub fn chain(&self, class: ClassInstId) -> impl Iterator<Item = ClassInstId> + '_ {
        std::iter::successors(Some(class), |&c| self.class(c).ancestor)
    }

    pub fn is_subclass(&self, class: ClassInstId, ancestor: ClassInstId) -> bool {
        self.chain(class).any(|c| c == ancestor)
    }

    /// Nearest declaration of method `name` in the class chain.
    pub fn find_method(&self, class: ClassInstId, name: Symbol) -> Option<(ClassInstId, MethodEntry)> {
        self.chain(class)
            .find_map(|c| self.class(c).methods.get(&name).map(|&entry| (c, entry)))
    }

    pub fn find_field(&self, class: ClassInstId, name: Symbol) -> Option<&CheckedField> {
        self.class(class).fields.iter().find(|f| f.name == name)
    }

    /// Implementation of the slot-owning method `base` for `class`: the
    /// nearest class in the chain registered in `base`'s override registry.
    pub fn resolve_override(&self, base: FuncInstId, class: ClassInstId) -> FuncInstId {
        let registry = &self.function(base).overrides;
        self.chain(class)
            .find_map(|c| registry.get(&self.class(c).id).copied())
            .unwrap_or(base)
    }

    pub fn display_type(&self, ty: Type, tree: &ScopeTree, interner: &Interner) -> String {
        match ty {
            Type::Primitive(p) => p.as_str().to_string(),
            Type::Class(id) => self.class(id).display_name.clone(),
            Type::Protocol(id) | Type::Enum(id) => tree.structure_path(id, interner),
            Type::Unknown => "<unknown>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(is_virtual: bool) -> CheckedFunction {
        CheckedFunction {
            symbol: None,
            name: Symbol::new_for_test(0),
            link_name: "f".into(),
            kind: FunctionKind::Method,
            type_args: Vec::new(),
            receiver: None,
            params: Vec::new(),
            locals: Vec::new(),
            field_inits: Vec::new(),
            body: None,
            return_type: Type::VOID,
            is_virtual,
            is_override: false,
            owner: None,
            vtable_slot: is_virtual.then_some(0),
            overrides: FxHashMap::default(),
            exported: false,
            span: Span::default(),
        }
    }

    #[test]
    fn register_override_requires_virtual() {
        let mut plain = function(false);
        assert_eq!(plain.register_override(1, FuncInstId::new(4)), Err(NotVirtual));
        assert!(plain.overrides.is_empty());

        let mut base = function(true);
        assert_eq!(base.register_override(1, FuncInstId::new(4)), Ok(()));
        assert_eq!(base.overrides.get(&1), Some(&FuncInstId::new(4)));
    }
}

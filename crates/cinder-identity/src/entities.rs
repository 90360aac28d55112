//! First-class identity types for compiler entities.
//!
//! Every arena in the scope tree, the resolver and the checked program is
//! indexed by one of these, so ids of different kinds cannot be mixed up.

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis struct $name(u32);

        impl $name {
            pub fn new(index: u32) -> Self {
                Self(index)
            }

            pub fn index(self) -> u32 {
                self.0
            }

            pub fn as_usize(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_entity_id! {
    /// Unique identifier for syntax tree nodes (declarations, statements, expressions, types)
    pub struct NodeId;
}

define_entity_id! {
    /// A namespace in the module tree
    pub struct NamespaceId;
}

define_entity_id! {
    /// A class, protocol or enum declaration
    pub struct StructureId;
}

define_entity_id! {
    /// A function, method or extension function declaration
    pub struct FunctionSymbolId;
}

define_entity_id! {
    /// A lexical scope built by the resolver
    pub struct ScopeId;
}

define_entity_id! {
    /// A checked (possibly monomorphized) class instantiation
    pub struct ClassInstId;
}

define_entity_id! {
    /// A checked (possibly monomorphized) function instantiation
    pub struct FuncInstId;
}

define_entity_id! {
    /// A local variable slot inside one checked function
    pub struct LocalId;
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

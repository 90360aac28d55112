// scope_tree.rs
//
// The namespace tree: every declaration reachable by name, with no semantic
// knowledge. Built once per compilation before resolution starts.

use std::rc::Rc;

use cinder_frontend::ast::{ClassDecl, Decl, EnumDecl, FuncDecl, ProtocolDecl, SourceFile};
use cinder_identity::{FileId, FunctionSymbolId, Interner, NamespaceId, Span, StructureId, Symbol};
use rustc_hash::FxHashMap;

use crate::diagnostics::TypeError;
use crate::errors::SemanticError;
use crate::project::ProjectInput;

/// A node in the module tree.
#[derive(Debug, Clone)]
pub struct Namespace {
    pub name: Symbol,
    /// Name of the project that owns this namespace
    pub project: Rc<str>,
    pub parent: Option<NamespaceId>,
    pub children: FxHashMap<Symbol, NamespaceId>,
    pub files: Vec<FileId>,
    pub structures: FxHashMap<Symbol, StructureId>,
    pub functions: FxHashMap<Symbol, FunctionSymbolId>,
    /// Extension functions, matched by receiver type at call sites
    pub extensions: Vec<FunctionSymbolId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureKind {
    Class,
    Protocol,
    Enum,
}

#[derive(Debug, Clone)]
pub enum StructureDecl {
    Class(Rc<ClassDecl>),
    Protocol(Rc<ProtocolDecl>),
    Enum(Rc<EnumDecl>),
}

/// Declaration-level handle for a class, protocol or enum.
#[derive(Debug, Clone)]
pub struct StructureSymbol {
    pub name: Symbol,
    pub namespace: NamespaceId,
    pub file: FileId,
    pub decl: StructureDecl,
    pub methods: FxHashMap<Symbol, FunctionSymbolId>,
    pub init: Option<FunctionSymbolId>,
    /// Classes known to conform to this protocol
    pub implementors: Vec<StructureId>,
}

impl StructureSymbol {
    pub fn kind(&self) -> StructureKind {
        match self.decl {
            StructureDecl::Class(_) => StructureKind::Class,
            StructureDecl::Protocol(_) => StructureKind::Protocol,
            StructureDecl::Enum(_) => StructureKind::Enum,
        }
    }

    pub fn span(&self) -> Span {
        match &self.decl {
            StructureDecl::Class(c) => c.span,
            StructureDecl::Protocol(p) => p.span,
            StructureDecl::Enum(e) => e.span,
        }
    }

    pub fn type_param_count(&self) -> usize {
        match &self.decl {
            StructureDecl::Class(c) => c.type_params.len(),
            StructureDecl::Protocol(p) => p.type_params.len(),
            StructureDecl::Enum(_) => 0,
        }
    }

    pub fn as_class(&self) -> Option<&Rc<ClassDecl>> {
        match &self.decl {
            StructureDecl::Class(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionOwner {
    Namespace(NamespaceId),
    Structure(StructureId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Free,
    Method,
    Init,
    Extension,
    /// Protocol method requirement, never checked as a body
    Requirement,
}

#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    pub name: Symbol,
    pub owner: FunctionOwner,
    pub kind: FunctionKind,
    pub file: FileId,
    pub decl: Rc<FuncDecl>,
}

/// A registered source file and the namespace its declarations live in.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub source: Rc<SourceFile>,
    pub namespace: NamespaceId,
}

#[derive(Debug, Clone)]
pub struct ScopeTree {
    namespaces: Vec<Namespace>,
    structures: Vec<StructureSymbol>,
    functions: Vec<FunctionSymbol>,
    files: Vec<FileEntry>,
    root: NamespaceId,
}

impl ScopeTree {
    /// Create a tree holding only the root namespace of `project`.
    pub fn new(project: &ProjectInput, interner: &mut Interner) -> Self {
        let root = Namespace {
            name: interner.intern(&project.name),
            project: project.name.as_str().into(),
            parent: None,
            children: FxHashMap::default(),
            files: Vec::new(),
            structures: FxHashMap::default(),
            functions: FxHashMap::default(),
            extensions: Vec::new(),
        };
        Self {
            namespaces: vec![root],
            structures: Vec::new(),
            functions: Vec::new(),
            files: Vec::new(),
            root: NamespaceId::new(0),
        }
    }

    pub fn root(&self) -> NamespaceId {
        self.root
    }

    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.as_usize()]
    }

    pub fn structure(&self, id: StructureId) -> &StructureSymbol {
        &self.structures[id.as_usize()]
    }

    pub fn structure_mut(&mut self, id: StructureId) -> &mut StructureSymbol {
        &mut self.structures[id.as_usize()]
    }

    pub fn function(&self, id: FunctionSymbolId) -> &FunctionSymbol {
        &self.functions[id.as_usize()]
    }

    pub fn structure_ids(&self) -> impl Iterator<Item = StructureId> + use<> {
        (0..self.structures.len() as u32).map(StructureId::new)
    }

    pub fn function_ids(&self) -> impl Iterator<Item = FunctionSymbolId> + use<> {
        (0..self.functions.len() as u32).map(FunctionSymbolId::new)
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn file(&self, file: FileId) -> Option<&FileEntry> {
        self.files.iter().find(|entry| entry.source.file == file)
    }

    /// Get or create the child namespace `name` of `parent`.
    /// Names are unique within a parent, so an existing child is returned.
    pub fn add_scope(&mut self, parent: NamespaceId, name: Symbol, project: &str) -> NamespaceId {
        if let Some(&existing) = self.namespace(parent).children.get(&name) {
            return existing;
        }
        let id = NamespaceId::new(self.namespaces.len() as u32);
        self.namespaces.push(Namespace {
            name,
            project: project.into(),
            parent: Some(parent),
            children: FxHashMap::default(),
            files: Vec::new(),
            structures: FxHashMap::default(),
            functions: FxHashMap::default(),
            extensions: Vec::new(),
        });
        self.namespaces[parent.as_usize()].children.insert(name, id);
        tracing::trace!(namespace = id.index(), parent = parent.index(), "add_scope");
        id
    }

    /// Each dependency becomes a root child namespace owned by that dependency.
    pub fn seed_dependencies(&mut self, project: &ProjectInput, interner: &mut Interner) {
        for dependency in &project.dependencies {
            let name = interner.intern(&dependency.name);
            self.add_scope(self.root, name, &dependency.name);
            tracing::debug!(
                dependency = %dependency.name,
                root = %dependency.source_root.display(),
                "seeded dependency namespace"
            );
        }
    }

    /// Declare a structure in `namespace`. Returns None if the name is taken.
    pub fn add_structure(
        &mut self,
        namespace: NamespaceId,
        file: FileId,
        decl: StructureDecl,
        name: Symbol,
    ) -> Option<StructureId> {
        if self.name_taken(namespace, name) {
            return None;
        }
        let id = StructureId::new(self.structures.len() as u32);
        self.structures.push(StructureSymbol {
            name,
            namespace,
            file,
            decl,
            methods: FxHashMap::default(),
            init: None,
            implementors: Vec::new(),
        });
        self.namespaces[namespace.as_usize()]
            .structures
            .insert(name, id);
        Some(id)
    }

    /// Register a function. Free functions must have a unique name in their
    /// namespace and methods a unique name in their structure; extensions
    /// are only listed. Returns None on a name clash.
    pub fn add_function(
        &mut self,
        owner: FunctionOwner,
        kind: FunctionKind,
        file: FileId,
        decl: Rc<FuncDecl>,
    ) -> Option<FunctionSymbolId> {
        let name = decl.name;
        let id = FunctionSymbolId::new(self.functions.len() as u32);
        match (owner, kind) {
            (FunctionOwner::Namespace(ns), FunctionKind::Extension) => {
                self.namespaces[ns.as_usize()].extensions.push(id);
            }
            (FunctionOwner::Namespace(ns), _) => {
                if self.name_taken(ns, name) {
                    return None;
                }
                self.namespaces[ns.as_usize()].functions.insert(name, id);
            }
            (FunctionOwner::Structure(sid), FunctionKind::Init) => {
                self.structures[sid.as_usize()].init = Some(id);
            }
            (FunctionOwner::Structure(sid), _) => {
                let structure = &mut self.structures[sid.as_usize()];
                if structure.methods.contains_key(&name) {
                    return None;
                }
                structure.methods.insert(name, id);
            }
        }
        self.functions.push(FunctionSymbol {
            name,
            owner,
            kind,
            file,
            decl,
        });
        Some(id)
    }

    fn name_taken(&self, namespace: NamespaceId, name: Symbol) -> bool {
        let ns = self.namespace(namespace);
        ns.structures.contains_key(&name) || ns.functions.contains_key(&name)
    }

    /// Create the file's namespace path and declare its symbols.
    pub fn register_file(
        &mut self,
        source: SourceFile,
        errors: &mut Vec<TypeError>,
        interner: &Interner,
    ) -> NamespaceId {
        let mut namespace = self.root;
        for &segment in &source.namespace {
            let project = self.namespace(namespace).project.clone();
            namespace = self.add_scope(namespace, segment, &project);
        }
        let file = source.file;
        self.namespaces[namespace.as_usize()].files.push(file);

        let source = Rc::new(source);
        for decl in &source.declarations {
            self.declare(namespace, file, decl, errors, interner);
        }
        tracing::debug!(
            file = file.index(),
            namespace = %interner.join(&source.namespace),
            declarations = source.declarations.len(),
            "registered file"
        );
        self.files.push(FileEntry { source, namespace });
        namespace
    }

    fn declare(
        &mut self,
        namespace: NamespaceId,
        file: FileId,
        decl: &Decl,
        errors: &mut Vec<TypeError>,
        interner: &Interner,
    ) {
        let already_exists = |name: Symbol, span: Span| {
            TypeError::new(
                SemanticError::SymbolAlreadyExists {
                    name: interner.resolve(name).to_string(),
                    span: span.into(),
                },
                span,
            )
        };

        match decl {
            Decl::Function(func) => {
                let kind = if func.receiver.is_some() {
                    FunctionKind::Extension
                } else {
                    FunctionKind::Free
                };
                let owner = FunctionOwner::Namespace(namespace);
                if self
                    .add_function(owner, kind, file, Rc::new(func.clone()))
                    .is_none()
                {
                    errors.push(already_exists(func.name, func.span));
                }
            }
            Decl::Class(class) => {
                let structure = StructureDecl::Class(Rc::new(class.clone()));
                let Some(sid) = self.add_structure(namespace, file, structure, class.name) else {
                    errors.push(already_exists(class.name, class.span));
                    return;
                };
                let owner = FunctionOwner::Structure(sid);
                if let Some(init) = &class.init {
                    self.add_function(owner, FunctionKind::Init, file, Rc::new(init.clone()));
                }
                for method in &class.methods {
                    if self
                        .add_function(owner, FunctionKind::Method, file, Rc::new(method.clone()))
                        .is_none()
                    {
                        errors.push(already_exists(method.name, method.span));
                    }
                }
            }
            Decl::Protocol(protocol) => {
                let structure = StructureDecl::Protocol(Rc::new(protocol.clone()));
                let Some(sid) = self.add_structure(namespace, file, structure, protocol.name)
                else {
                    errors.push(already_exists(protocol.name, protocol.span));
                    return;
                };
                let owner = FunctionOwner::Structure(sid);
                for method in &protocol.methods {
                    if self
                        .add_function(
                            owner,
                            FunctionKind::Requirement,
                            file,
                            Rc::new(method.clone()),
                        )
                        .is_none()
                    {
                        errors.push(already_exists(method.name, method.span));
                    }
                }
            }
            Decl::Enum(enum_decl) => {
                let mut seen = Vec::with_capacity(enum_decl.variants.len());
                for &variant in &enum_decl.variants {
                    if seen.contains(&variant) {
                        errors.push(already_exists(variant, enum_decl.span));
                    }
                    seen.push(variant);
                }
                let structure = StructureDecl::Enum(Rc::new(enum_decl.clone()));
                if self
                    .add_structure(namespace, file, structure, enum_decl.name)
                    .is_none()
                {
                    errors.push(already_exists(enum_decl.name, enum_decl.span));
                }
            }
        }
    }

    /// Walk `path` from the project root.
    pub fn lookup_namespace(&self, path: &[Symbol]) -> Option<NamespaceId> {
        self.lookup_namespace_from(self.root, path)
    }

    pub fn lookup_namespace_from(&self, start: NamespaceId, path: &[Symbol]) -> Option<NamespaceId> {
        path.iter().try_fold(start, |ns, segment| {
            self.namespace(ns).children.get(segment).copied()
        })
    }

    /// The namespace and its ancestors, innermost first.
    pub fn namespace_chain(&self, start: NamespaceId) -> impl Iterator<Item = NamespaceId> + '_ {
        std::iter::successors(Some(start), |&ns| self.namespace(ns).parent)
    }

    pub fn structure_in(&self, namespace: NamespaceId, name: Symbol) -> Option<StructureId> {
        self.namespace(namespace).structures.get(&name).copied()
    }

    pub fn function_in(&self, namespace: NamespaceId, name: Symbol) -> Option<FunctionSymbolId> {
        self.namespace(namespace).functions.get(&name).copied()
    }

    /// Extension functions named `name` declared directly in `namespace`.
    pub fn extensions_in(
        &self,
        namespace: NamespaceId,
        name: Symbol,
    ) -> impl Iterator<Item = FunctionSymbolId> + '_ {
        self.namespace(namespace)
            .extensions
            .iter()
            .copied()
            .filter(move |&id| self.function(id).name == name)
    }

    /// Dotted path of a namespace, empty for the root.
    pub fn namespace_path(&self, namespace: NamespaceId, interner: &Interner) -> String {
        let mut segments: Vec<Symbol> = self
            .namespace_chain(namespace)
            .filter(|&ns| ns != self.root)
            .map(|ns| self.namespace(ns).name)
            .collect();
        segments.reverse();
        interner.join(&segments)
    }

    /// Qualified name of a structure, e.g. `zoo.Duck`.
    pub fn structure_path(&self, id: StructureId, interner: &Interner) -> String {
        let structure = self.structure(id);
        let prefix = self.namespace_path(structure.namespace, interner);
        let name = interner.resolve(structure.name);
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_frontend::AstBuilder;

    #[test]
    fn dependency_namespace_is_owned_by_dependency() {
        let b = AstBuilder::new();
        let mut interner = b.into_interner();
        let project = ProjectInput::new("app").with_dependency("zoo", "/deps/zoo");
        let mut tree = ScopeTree::new(&project, &mut interner);
        tree.seed_dependencies(&project, &mut interner);

        let zoo = interner.lookup("zoo").unwrap();
        let ns = tree.lookup_namespace(&[zoo]).unwrap();
        assert_eq!(&*tree.namespace(ns).project, "zoo");
        assert_eq!(&*tree.namespace(tree.root()).project, "app");
    }

    #[test]
    fn add_scope_is_idempotent_per_name() {
        let b = AstBuilder::new();
        let birds = b.sym("birds");
        let mut interner = b.into_interner();
        let mut tree = ScopeTree::new(&ProjectInput::new("app"), &mut interner);
        let first = tree.add_scope(tree.root(), birds, "app");
        let second = tree.add_scope(tree.root(), birds, "app");
        assert_eq!(first, second);
        assert_eq!(tree.namespace(tree.root()).children.len(), 1);
    }

    #[test]
    fn duplicate_declarations_are_reported() {
        let b = AstBuilder::new();
        let file = b.file(
            "zoo.birds",
            vec![],
            vec![
                Decl::Class(b.class("Duck")),
                Decl::Function(b.func("Duck", vec![], None, b.block(vec![], None))),
            ],
        );
        let mut interner = b.into_interner();
        let project = ProjectInput::new("app").with_dependency("zoo", "/deps/zoo");
        let mut errors = Vec::new();
        let mut tree = ScopeTree::new(&project, &mut interner);
        tree.seed_dependencies(&project, &mut interner);
        tree.register_file(file, &mut errors, &interner);

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0].error,
            SemanticError::SymbolAlreadyExists { .. }
        ));

        let path = [interner.lookup("zoo").unwrap(), interner.lookup("birds").unwrap()];
        let ns = tree.lookup_namespace(&path).unwrap();
        // Files under a dependency prefix belong to that dependency.
        assert_eq!(&*tree.namespace(ns).project, "zoo");
        let duck = tree.structure_in(ns, interner.lookup("Duck").unwrap()).unwrap();
        assert_eq!(tree.structure_path(duck, &interner), "zoo.birds.Duck");
    }
}

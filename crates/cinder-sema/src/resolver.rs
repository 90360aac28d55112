// resolver.rs
//
// One pass over every registered file: parent links for all nodes, lexical
// scopes for namespaces, structures, functions and blocks, and the target of
// every named type reference. Never fails; unresolved names become
// `TypeRef::Unknown` with a diagnostic.

use cinder_frontend::ast::*;
use cinder_identity::{FileId, NamespaceId, NodeId, ScopeId, StructureId, Symbol};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::diagnostics::TypeError;
use crate::errors::SemanticError;
use crate::scope_tree::ScopeTree;

/// What a named type expression denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    Structure(StructureId),
    TypeParam(Symbol),
    /// Unresolved; suppresses follow-up diagnostics
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Class,
    Protocol,
    Enum,
    Function,
    Field,
    Param,
    Block,
    Stmt,
    Expr,
    Type,
    Use,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Namespace(NamespaceId),
    Structure,
    Function,
    Local,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Type parameters bound by this scope (structure and function scopes)
    pub type_params: Vec<Symbol>,
    pub file: FileId,
}

/// Everything the resolver attaches to the syntax tree.
#[derive(Debug, Clone, Default)]
pub struct ResolvedNames {
    type_refs: FxHashMap<NodeId, TypeRef>,
    parents: FxHashMap<NodeId, NodeId>,
    kinds: FxHashMap<NodeId, NodeKind>,
    scopes: Vec<Scope>,
    node_scopes: FxHashMap<NodeId, ScopeId>,
    /// Methods, initializers and extension functions (have a `self`)
    member_functions: FxHashSet<NodeId>,
    imports: FxHashMap<FileId, Vec<NamespaceId>>,
}

impl ResolvedNames {
    pub fn type_ref(&self, node: NodeId) -> TypeRef {
        self.type_refs
            .get(&node)
            .copied()
            .unwrap_or(TypeRef::Unknown)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(&node).copied()
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.kinds.get(&node).copied()
    }

    /// Nearest function declaration containing `node`.
    pub fn enclosing_function(&self, node: NodeId) -> Option<NodeId> {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if self.kind(id) == Some(NodeKind::Function) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    /// True if `node` sits inside a method, initializer or extension function.
    pub fn has_receiver(&self, node: NodeId) -> bool {
        self.enclosing_function(node)
            .is_some_and(|func| self.member_functions.contains(&func))
    }

    /// Scope opened by a class, protocol, function or block node.
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.node_scopes.get(&node).copied()
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.as_usize()]
    }

    /// Namespaces made visible in `file` by `use` declarations.
    pub fn imports(&self, file: FileId) -> &[NamespaceId] {
        self.imports.get(&file).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub struct Resolver<'a> {
    tree: &'a ScopeTree,
    interner: &'a cinder_identity::Interner,
    names: ResolvedNames,
    errors: Vec<TypeError>,
    file: FileId,
    namespace: NamespaceId,
}

impl<'a> Resolver<'a> {
    /// Resolve every file registered in `tree`.
    #[tracing::instrument(skip_all, fields(files = tree.files().len()))]
    pub fn resolve(
        tree: &'a ScopeTree,
        interner: &'a cinder_identity::Interner,
    ) -> (ResolvedNames, Vec<TypeError>) {
        let mut resolver = Resolver {
            tree,
            interner,
            names: ResolvedNames::default(),
            errors: Vec::new(),
            file: FileId::default(),
            namespace: tree.root(),
        };
        for entry in tree.files() {
            resolver.file = entry.source.file;
            resolver.namespace = entry.namespace;
            resolver.resolve_file(&entry.source);
        }
        tracing::debug!(
            type_refs = resolver.names.type_refs.len(),
            scopes = resolver.names.scopes.len(),
            errors = resolver.errors.len(),
            "resolution finished"
        );
        (resolver.names, resolver.errors)
    }

    fn add_error(&mut self, error: SemanticError, span: cinder_identity::Span) {
        self.errors.push(TypeError::new(error, span));
    }

    fn link(&mut self, node: NodeId, kind: NodeKind, parent: Option<NodeId>) {
        self.names.kinds.insert(node, kind);
        if let Some(parent) = parent {
            self.names.parents.insert(node, parent);
        }
    }

    fn open_scope(
        &mut self,
        kind: ScopeKind,
        parent: Option<ScopeId>,
        type_params: Vec<Symbol>,
        owner: Option<NodeId>,
    ) -> ScopeId {
        let id = ScopeId::new(self.names.scopes.len() as u32);
        self.names.scopes.push(Scope {
            kind,
            parent,
            type_params,
            file: self.file,
        });
        if let Some(owner) = owner {
            self.names.node_scopes.insert(owner, id);
        }
        id
    }

    fn resolve_file(&mut self, file: &SourceFile) {
        let mut imports = Vec::new();
        for use_decl in &file.uses {
            self.link(use_decl.id, NodeKind::Use, None);
            match self.tree.lookup_namespace(&use_decl.path) {
                Some(ns) => imports.push(ns),
                None => self.add_error(
                    SemanticError::InvalidModulePath {
                        path: self.interner.join(&use_decl.path),
                        span: use_decl.span.into(),
                    },
                    use_decl.span,
                ),
            }
        }
        self.names.imports.insert(file.file, imports);

        let file_scope = self.open_scope(ScopeKind::Namespace(self.namespace), None, Vec::new(), None);
        for decl in &file.declarations {
            match decl {
                Decl::Class(class) => self.resolve_class(class, file_scope),
                Decl::Protocol(protocol) => self.resolve_protocol(protocol, file_scope),
                Decl::Enum(enum_decl) => self.link(enum_decl.id, NodeKind::Enum, None),
                Decl::Function(func) => self.resolve_function(func, file_scope, None, false),
            }
        }
    }

    fn resolve_class(&mut self, class: &ClassDecl, parent_scope: ScopeId) {
        self.link(class.id, NodeKind::Class, None);
        let type_params = class.type_params.iter().map(|p| p.name).collect();
        let scope = self.open_scope(
            ScopeKind::Structure,
            Some(parent_scope),
            type_params,
            Some(class.id),
        );

        if let Some(ancestor) = &class.ancestor {
            self.resolve_type(ancestor, scope, class.id);
        }
        for protocol in &class.protocols {
            self.resolve_type(protocol, scope, class.id);
        }
        for field in &class.fields {
            self.link(field.id, NodeKind::Field, Some(class.id));
            self.resolve_type(&field.ty, scope, field.id);
            if let Some(default) = &field.default_value {
                self.resolve_expr(default, scope, field.id);
            }
        }
        if let Some(init) = &class.init {
            self.resolve_function(init, scope, Some(class.id), true);
        }
        for method in &class.methods {
            self.resolve_function(method, scope, Some(class.id), true);
        }
    }

    fn resolve_protocol(&mut self, protocol: &ProtocolDecl, parent_scope: ScopeId) {
        self.link(protocol.id, NodeKind::Protocol, None);
        let type_params = protocol.type_params.iter().map(|p| p.name).collect();
        let scope = self.open_scope(
            ScopeKind::Structure,
            Some(parent_scope),
            type_params,
            Some(protocol.id),
        );
        for method in &protocol.methods {
            self.resolve_function(method, scope, Some(protocol.id), true);
        }
    }

    fn resolve_function(
        &mut self,
        func: &FuncDecl,
        parent_scope: ScopeId,
        owner: Option<NodeId>,
        is_member: bool,
    ) {
        self.link(func.id, NodeKind::Function, owner);
        if is_member || func.receiver.is_some() {
            self.names.member_functions.insert(func.id);
        }
        let type_params = func.type_params.iter().map(|p| p.name).collect();
        let scope = self.open_scope(
            ScopeKind::Function,
            Some(parent_scope),
            type_params,
            Some(func.id),
        );

        if let Some(receiver) = &func.receiver {
            self.resolve_type(receiver, scope, func.id);
        }
        for param in &func.params {
            self.link(param.id, NodeKind::Param, Some(func.id));
            self.resolve_type(&param.ty, scope, param.id);
        }
        if let Some(ret) = &func.return_type {
            self.resolve_type(ret, scope, func.id);
        }
        if let Some(body) = &func.body {
            self.resolve_block(body, scope, func.id);
        }
    }

    fn resolve_block(&mut self, block: &Block, parent_scope: ScopeId, parent: NodeId) {
        self.link(block.id, NodeKind::Block, Some(parent));
        let scope = self.open_scope(ScopeKind::Local, Some(parent_scope), Vec::new(), Some(block.id));
        for stmt in &block.stmts {
            self.resolve_stmt(stmt, scope, block.id);
        }
        if let Some(tail) = &block.tail {
            self.resolve_expr(tail, scope, block.id);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt, scope: ScopeId, parent: NodeId) {
        self.link(stmt.id(), NodeKind::Stmt, Some(parent));
        match stmt {
            Stmt::Let(let_stmt) => {
                if let Some(ty) = &let_stmt.ty {
                    self.resolve_type(ty, scope, let_stmt.id);
                }
                if let Some(init) = &let_stmt.init {
                    self.resolve_expr(init, scope, let_stmt.id);
                }
            }
            Stmt::Assign(assign) => {
                self.resolve_expr(&assign.target, scope, assign.id);
                self.resolve_expr(&assign.value, scope, assign.id);
            }
            Stmt::Expr(expr_stmt) => self.resolve_expr(&expr_stmt.expr, scope, expr_stmt.id),
            Stmt::Return(ret) => {
                if let Some(value) = &ret.value {
                    self.resolve_expr(value, scope, ret.id);
                }
            }
            Stmt::While(while_stmt) => {
                self.resolve_expr(&while_stmt.condition, scope, while_stmt.id);
                self.resolve_block(&while_stmt.body, scope, while_stmt.id);
            }
        }
    }

    fn resolve_expr(&mut self, expr: &Expr, scope: ScopeId, parent: NodeId) {
        self.link(expr.id, NodeKind::Expr, Some(parent));
        match &expr.kind {
            ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::Identifier(_)
            | ExprKind::SelfRef => {}
            ExprKind::Binary(binary) => {
                self.resolve_expr(&binary.left, scope, expr.id);
                self.resolve_expr(&binary.right, scope, expr.id);
            }
            ExprKind::Unary(unary) => self.resolve_expr(&unary.operand, scope, expr.id),
            ExprKind::Call(call) => {
                for ty in &call.type_args {
                    self.resolve_type(ty, scope, expr.id);
                }
                for arg in &call.args {
                    self.resolve_expr(arg, scope, expr.id);
                }
            }
            ExprKind::MethodCall(call) => {
                self.resolve_expr(&call.receiver, scope, expr.id);
                for ty in &call.type_args {
                    self.resolve_type(ty, scope, expr.id);
                }
                for arg in &call.args {
                    self.resolve_expr(arg, scope, expr.id);
                }
            }
            ExprKind::FieldAccess(access) => self.resolve_expr(&access.object, scope, expr.id),
            ExprKind::New(new_expr) => {
                self.resolve_type(&new_expr.ty, scope, expr.id);
                for arg in &new_expr.args {
                    self.resolve_expr(arg, scope, expr.id);
                }
            }
            ExprKind::If(if_expr) => {
                self.resolve_expr(&if_expr.condition, scope, expr.id);
                self.resolve_block(&if_expr.then_branch, scope, expr.id);
                if let Some(else_branch) = &if_expr.else_branch {
                    self.resolve_block(else_branch, scope, expr.id);
                }
            }
            ExprKind::Block(block) => self.resolve_block(block, scope, expr.id),
            ExprKind::EnumVariant(variant) => self.resolve_type(&variant.ty, scope, expr.id),
        }
    }

    fn resolve_type(&mut self, ty: &TypeExpr, scope: ScopeId, parent: NodeId) {
        self.link(ty.id, NodeKind::Type, Some(parent));
        let TypeExprKind::Named { path, type_args } = &ty.kind else {
            return;
        };
        for arg in type_args {
            self.resolve_type(arg, scope, ty.id);
        }
        let target = self.lookup_type(path, scope);
        if target == TypeRef::Unknown {
            self.add_error(
                SemanticError::SymbolDoesNotExist {
                    name: self.interner.join(path),
                    span: ty.span.into(),
                },
                ty.span,
            );
        }
        self.names.type_refs.insert(ty.id, target);
    }

    /// Local chain and type parameters, then the namespace chain, then
    /// imports. Qualified paths start at the project root.
    fn lookup_type(&self, path: &[Symbol], scope: ScopeId) -> TypeRef {
        let Some((&name, prefix)) = path.split_last() else {
            return TypeRef::Unknown;
        };
        if !prefix.is_empty() {
            return self
                .tree
                .lookup_namespace(prefix)
                .and_then(|ns| self.tree.structure_in(ns, name))
                .map_or(TypeRef::Unknown, TypeRef::Structure);
        }

        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.names.scope(id);
            if scope.type_params.contains(&name) {
                return TypeRef::TypeParam(name);
            }
            current = scope.parent;
        }

        for ns in self.tree.namespace_chain(self.namespace) {
            if let Some(sid) = self.tree.structure_in(ns, name) {
                return TypeRef::Structure(sid);
            }
        }
        for &ns in self.names.imports(self.file) {
            if let Some(sid) = self.tree.structure_in(ns, name) {
                return TypeRef::Structure(sid);
            }
        }
        TypeRef::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectInput;
    use cinder_frontend::AstBuilder;
    use cinder_identity::Interner;

    fn resolve_files(
        b: AstBuilder,
        files: Vec<SourceFile>,
    ) -> (ScopeTree, ResolvedNames, Vec<TypeError>, Interner) {
        let mut interner = b.into_interner();
        let project = ProjectInput::new("app");
        let mut tree = ScopeTree::new(&project, &mut interner);
        let mut errors = Vec::new();
        for file in files {
            tree.register_file(file, &mut errors, &interner);
        }
        let (names, resolve_errors) = Resolver::resolve(&tree, &interner);
        errors.extend(resolve_errors);
        (tree, names, errors, interner)
    }

    #[test]
    fn type_params_shadow_structures() {
        let b = AstBuilder::new();
        let field_ty = b.named("T");
        let field_ty_id = field_ty.id;
        let class = b
            .class("Box")
            .with_type_params(vec![b.type_param("T")])
            .with_field(b.field_decl("value", field_ty, None));
        let file = b.file("", vec![], vec![Decl::Class(b.class("T")), Decl::Class(class)]);
        let t = b.sym("T");
        let (_, names, errors, _) = resolve_files(b, vec![file]);
        assert!(errors.is_empty());
        assert_eq!(names.type_ref(field_ty_id), TypeRef::TypeParam(t));
    }

    #[test]
    fn imports_make_structures_visible() {
        let b = AstBuilder::new();
        b.set_file(FileId::new(0));
        let zoo = b.file("zoo", vec![], vec![Decl::Class(b.class("Animal"))]);
        b.set_file(FileId::new(1));
        let param_ty = b.named("Animal");
        let param_ty_id = param_ty.id;
        let qualified = b.named("zoo.Animal");
        let qualified_id = qualified.id;
        let func = b.func(
            "feed",
            vec![b.param("a", param_ty), b.param("b", qualified)],
            None,
            b.block(vec![], None),
        );
        let app = b.file("", vec![b.use_decl("zoo")], vec![Decl::Function(func)]);
        let (tree, names, errors, interner) = resolve_files(b, vec![zoo, app]);
        assert!(errors.is_empty(), "{errors:?}");

        let zoo_ns = tree.lookup_namespace(&[interner.lookup("zoo").unwrap()]).unwrap();
        let animal = tree
            .structure_in(zoo_ns, interner.lookup("Animal").unwrap())
            .unwrap();
        assert_eq!(names.type_ref(param_ty_id), TypeRef::Structure(animal));
        assert_eq!(names.type_ref(qualified_id), TypeRef::Structure(animal));
        assert_eq!(names.imports(FileId::new(1)), &[zoo_ns]);
    }

    #[test]
    fn unknown_names_and_paths_are_reported() {
        let b = AstBuilder::new();
        let missing = b.named("Missing");
        let missing_id = missing.id;
        let func = b.func("f", vec![b.param("m", missing)], None, b.block(vec![], None));
        let file = b.file("", vec![b.use_decl("nowhere")], vec![Decl::Function(func)]);
        let (_, names, errors, _) = resolve_files(b, vec![file]);

        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors[0].error,
            SemanticError::InvalidModulePath { .. }
        ));
        assert!(matches!(
            errors[1].error,
            SemanticError::SymbolDoesNotExist { .. }
        ));
        assert_eq!(names.type_ref(missing_id), TypeRef::Unknown);
    }

    #[test]
    fn parent_links_reach_enclosing_function() {
        let b = AstBuilder::new();
        let inner = b.int(1);
        let inner_id = inner.id;
        let method = b.func(
            "get",
            vec![],
            Some(b.i64_ty()),
            b.block(vec![], Some(b.block_expr(b.block(vec![], Some(inner))))),
        );
        let method_id = method.id;
        let default = b.self_ref();
        let default_id = default.id;
        let class = b
            .class("C")
            .with_field(b.field_decl("x", b.i64_ty(), Some(default)))
            .with_method(method);
        let file = b.file("", vec![], vec![Decl::Class(class)]);
        let (_, names, _, _) = resolve_files(b, vec![file]);

        assert_eq!(names.enclosing_function(inner_id), Some(method_id));
        assert!(names.has_receiver(inner_id));
        assert_eq!(names.enclosing_function(default_id), None);
        assert!(!names.has_receiver(default_id));
        assert_eq!(names.kind(inner_id), Some(NodeKind::Expr));
    }
}

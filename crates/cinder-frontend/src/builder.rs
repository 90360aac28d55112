// builder.rs
//
// Programmatic construction of syntax trees. Every node gets a fresh NodeId
// and a distinct synthetic span so diagnostics stay distinguishable.

use std::cell::{Cell, RefCell};

use cinder_identity::{FileId, Interner, NodeId, PrimitiveType, Span, Symbol};

use crate::ast::*;

/// Builds untyped syntax trees the way a parser would.
///
/// All methods take `&self` so nested calls such as
/// `b.call("f", vec![b.int(1)])` compose without borrow juggling.
pub struct AstBuilder {
    interner: RefCell<Interner>,
    next_node: Cell<u32>,
    next_offset: Cell<usize>,
    file: Cell<FileId>,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::with_interner(Interner::new())
    }

    pub fn with_interner(interner: Interner) -> Self {
        Self {
            interner: RefCell::new(interner),
            next_node: Cell::new(0),
            next_offset: Cell::new(0),
            file: Cell::new(FileId::new(0)),
        }
    }

    /// Subsequent nodes are attributed to `file`.
    pub fn set_file(&self, file: FileId) {
        self.file.set(file);
    }

    pub fn into_interner(self) -> Interner {
        self.interner.into_inner()
    }

    pub fn sym(&self, name: &str) -> Symbol {
        self.interner.borrow_mut().intern(name)
    }

    fn path(&self, segments: &[&str]) -> Vec<Symbol> {
        segments.iter().map(|s| self.sym(s)).collect()
    }

    pub fn node_id(&self) -> NodeId {
        let id = self.next_node.get();
        self.next_node.set(id + 1);
        NodeId::new(id)
    }

    /// A fresh single-line span; one synthetic line per node.
    pub fn span(&self) -> Span {
        let start = self.next_offset.get();
        self.next_offset.set(start + 4);
        let line = (start / 4) as u32 + 1;
        Span::new(self.file.get(), start, start + 3, line, 1)
    }

    // ---- types ----

    pub fn prim(&self, prim: PrimitiveType) -> TypeExpr {
        TypeExpr {
            id: self.node_id(),
            kind: TypeExprKind::Primitive(prim),
            span: self.span(),
        }
    }

    pub fn i32_ty(&self) -> TypeExpr {
        self.prim(PrimitiveType::I32)
    }

    pub fn i64_ty(&self) -> TypeExpr {
        self.prim(PrimitiveType::I64)
    }

    pub fn f64_ty(&self) -> TypeExpr {
        self.prim(PrimitiveType::F64)
    }

    pub fn bool_ty(&self) -> TypeExpr {
        self.prim(PrimitiveType::Bool)
    }

    pub fn string_ty(&self) -> TypeExpr {
        self.prim(PrimitiveType::String)
    }

    /// Named type; dotted names (`zoo.Animal`) become qualified paths.
    pub fn named(&self, name: &str) -> TypeExpr {
        self.generic(name, Vec::new())
    }

    pub fn generic(&self, name: &str, type_args: Vec<TypeExpr>) -> TypeExpr {
        let segments: Vec<&str> = name.split('.').collect();
        TypeExpr {
            id: self.node_id(),
            kind: TypeExprKind::Named {
                path: self.path(&segments),
                type_args,
            },
            span: self.span(),
        }
    }

    pub fn type_param(&self, name: &str) -> TypeParam {
        TypeParam {
            name: self.sym(name),
            span: self.span(),
        }
    }

    // ---- expressions ----

    fn expr(&self, kind: ExprKind) -> Expr {
        Expr {
            id: self.node_id(),
            kind,
            span: self.span(),
        }
    }

    pub fn int(&self, value: i64) -> Expr {
        self.expr(ExprKind::IntLiteral(value))
    }

    pub fn float(&self, value: f64) -> Expr {
        self.expr(ExprKind::FloatLiteral(value))
    }

    pub fn bool_lit(&self, value: bool) -> Expr {
        self.expr(ExprKind::BoolLiteral(value))
    }

    pub fn string(&self, value: &str) -> Expr {
        self.expr(ExprKind::StringLiteral(value.to_string()))
    }

    pub fn ident(&self, name: &str) -> Expr {
        self.expr(ExprKind::Identifier(self.sym(name)))
    }

    pub fn self_ref(&self) -> Expr {
        self.expr(ExprKind::SelfRef)
    }

    pub fn binary(&self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        self.expr(ExprKind::Binary(Box::new(BinaryExpr { op, left, right })))
    }

    pub fn unary(&self, op: UnaryOp, operand: Expr) -> Expr {
        self.expr(ExprKind::Unary(Box::new(UnaryExpr { op, operand })))
    }

    /// Call by (possibly dotted) name.
    pub fn call(&self, callee: &str, args: Vec<Expr>) -> Expr {
        self.call_generic(callee, Vec::new(), args)
    }

    pub fn call_generic(&self, callee: &str, type_args: Vec<TypeExpr>, args: Vec<Expr>) -> Expr {
        let segments: Vec<&str> = callee.split('.').collect();
        self.expr(ExprKind::Call(Box::new(CallExpr {
            callee: self.path(&segments),
            type_args,
            args,
        })))
    }

    pub fn method_call(&self, receiver: Expr, method: &str, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::MethodCall(Box::new(MethodCallExpr {
            receiver,
            method: self.sym(method),
            type_args: Vec::new(),
            args,
        })))
    }

    pub fn field(&self, object: Expr, field: &str) -> Expr {
        self.expr(ExprKind::FieldAccess(Box::new(FieldAccessExpr {
            object,
            field: self.sym(field),
        })))
    }

    pub fn new_object(&self, ty: TypeExpr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::New(Box::new(NewExpr { ty, args })))
    }

    pub fn if_expr(&self, condition: Expr, then_branch: Block, else_branch: Option<Block>) -> Expr {
        self.expr(ExprKind::If(Box::new(IfExpr {
            condition,
            then_branch,
            else_branch,
        })))
    }

    pub fn block_expr(&self, block: Block) -> Expr {
        self.expr(ExprKind::Block(block))
    }

    pub fn enum_variant(&self, ty: TypeExpr, variant: &str) -> Expr {
        self.expr(ExprKind::EnumVariant(Box::new(EnumVariantExpr {
            ty,
            variant: self.sym(variant),
        })))
    }

    // ---- statements ----

    pub fn block(&self, stmts: Vec<Stmt>, tail: Option<Expr>) -> Block {
        Block {
            id: self.node_id(),
            stmts,
            tail: tail.map(Box::new),
            span: self.span(),
        }
    }

    pub fn let_stmt(&self, name: &str, ty: Option<TypeExpr>, init: Option<Expr>) -> Stmt {
        Stmt::Let(LetStmt {
            id: self.node_id(),
            name: self.sym(name),
            ty,
            init,
            span: self.span(),
        })
    }

    pub fn assign(&self, target: Expr, value: Expr) -> Stmt {
        Stmt::Assign(AssignStmt {
            id: self.node_id(),
            target,
            value,
            span: self.span(),
        })
    }

    pub fn expr_stmt(&self, expr: Expr) -> Stmt {
        Stmt::Expr(ExprStmt {
            id: self.node_id(),
            expr,
            span: self.span(),
        })
    }

    pub fn ret(&self, value: Option<Expr>) -> Stmt {
        Stmt::Return(ReturnStmt {
            id: self.node_id(),
            value,
            span: self.span(),
        })
    }

    pub fn while_loop(&self, condition: Expr, body: Block) -> Stmt {
        Stmt::While(WhileStmt {
            id: self.node_id(),
            condition,
            body,
            span: self.span(),
        })
    }

    // ---- declarations ----

    pub fn param(&self, name: &str, ty: TypeExpr) -> Param {
        Param {
            id: self.node_id(),
            name: self.sym(name),
            ty,
            span: self.span(),
        }
    }

    pub fn func(
        &self,
        name: &str,
        params: Vec<Param>,
        return_type: Option<TypeExpr>,
        body: Block,
    ) -> FuncDecl {
        FuncDecl {
            id: self.node_id(),
            name: self.sym(name),
            type_params: Vec::new(),
            receiver: None,
            params,
            return_type,
            body: Some(body),
            modifiers: FuncModifiers::default(),
            span: self.span(),
        }
    }

    /// Bodiless signature, used for protocol requirements.
    pub fn signature(
        &self,
        name: &str,
        params: Vec<Param>,
        return_type: Option<TypeExpr>,
    ) -> FuncDecl {
        FuncDecl {
            body: None,
            ..self.func(name, params, return_type, self.block(Vec::new(), None))
        }
    }

    pub fn field_decl(&self, name: &str, ty: TypeExpr, default_value: Option<Expr>) -> FieldDecl {
        FieldDecl {
            id: self.node_id(),
            name: self.sym(name),
            ty,
            default_value,
            span: self.span(),
        }
    }

    pub fn class(&self, name: &str) -> ClassDecl {
        ClassDecl {
            id: self.node_id(),
            name: self.sym(name),
            type_params: Vec::new(),
            ancestor: None,
            protocols: Vec::new(),
            fields: Vec::new(),
            init: None,
            methods: Vec::new(),
            span: self.span(),
        }
    }

    pub fn protocol(&self, name: &str, methods: Vec<FuncDecl>) -> ProtocolDecl {
        ProtocolDecl {
            id: self.node_id(),
            name: self.sym(name),
            type_params: Vec::new(),
            methods,
            span: self.span(),
        }
    }

    pub fn enum_decl(&self, name: &str, variants: &[&str]) -> EnumDecl {
        EnumDecl {
            id: self.node_id(),
            name: self.sym(name),
            variants: self.path(variants),
            span: self.span(),
        }
    }

    pub fn use_decl(&self, path: &str) -> UseDecl {
        let segments: Vec<&str> = path.split('.').collect();
        UseDecl {
            id: self.node_id(),
            path: self.path(&segments),
            span: self.span(),
        }
    }

    /// A source file in namespace `namespace` (dotted, empty for the root).
    pub fn file(&self, namespace: &str, uses: Vec<UseDecl>, declarations: Vec<Decl>) -> SourceFile {
        let namespace = if namespace.is_empty() {
            Vec::new()
        } else {
            let segments: Vec<&str> = namespace.split('.').collect();
            self.path(&segments)
        };
        SourceFile {
            file: self.file.get(),
            path: format!("file{}.cn", self.file.get().index()),
            namespace,
            uses,
            declarations,
            span: self.span(),
        }
    }
}

impl FuncDecl {
    pub fn with_virtual(mut self) -> Self {
        self.modifiers.is_virtual = true;
        self
    }

    pub fn with_override(mut self) -> Self {
        self.modifiers.is_override = true;
        self
    }

    pub fn with_type_params(mut self, type_params: Vec<TypeParam>) -> Self {
        self.type_params = type_params;
        self
    }

    /// Turns the function into an extension function on `receiver`.
    pub fn with_receiver(mut self, receiver: TypeExpr) -> Self {
        self.receiver = Some(receiver);
        self
    }
}

impl ClassDecl {
    pub fn with_type_params(mut self, type_params: Vec<TypeParam>) -> Self {
        self.type_params = type_params;
        self
    }

    pub fn extends(mut self, ancestor: TypeExpr) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    pub fn implements(mut self, protocol: TypeExpr) -> Self {
        self.protocols.push(protocol);
        self
    }

    pub fn with_field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_init(mut self, init: FuncDecl) -> Self {
        self.init = Some(init);
        self
    }

    pub fn with_method(mut self, method: FuncDecl) -> Self {
        self.methods.push(method);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_and_spans_are_distinct() {
        let b = AstBuilder::new();
        let x = b.int(1);
        let y = b.int(2);
        assert_ne!(x.id, y.id);
        assert_ne!(x.span, y.span);
        assert!(y.span.start > x.span.start);
    }

    #[test]
    fn dotted_names_become_paths() {
        let b = AstBuilder::new();
        let ty = b.named("zoo.Animal");
        let TypeExprKind::Named { path, .. } = &ty.kind else {
            panic!("expected named type");
        };
        assert_eq!(path.len(), 2);
        let interner = b.into_interner();
        assert_eq!(interner.join(path), "zoo.Animal");
    }

    #[test]
    fn nested_construction_composes() {
        let b = AstBuilder::new();
        let class = b
            .class("Counter")
            .with_field(b.field_decl("count", b.i64_ty(), Some(b.int(0))))
            .with_method(
                b.func(
                    "get",
                    vec![],
                    Some(b.i64_ty()),
                    b.block(vec![], Some(b.field(b.self_ref(), "count"))),
                )
                .with_virtual(),
            );
        assert_eq!(class.fields.len(), 1);
        assert!(class.methods[0].modifiers.is_virtual);
        assert!(class.methods[0].body.as_ref().is_some_and(|b| b.tail.is_some()));
    }
}

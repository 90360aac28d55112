// ast.rs

use cinder_identity::{FileId, NodeId, PrimitiveType, Span, Symbol};

/// One parsed source file. Its declarations live in `namespace`.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub file: FileId,
    pub path: String,
    /// Namespace path declared by the file (empty = project root)
    pub namespace: Vec<Symbol>,
    pub uses: Vec<UseDecl>,
    pub declarations: Vec<Decl>,
    pub span: Span,
}

/// `use a.b.c`: makes the declarations of namespace `a.b.c` visible
#[derive(Debug, Clone)]
pub struct UseDecl {
    pub id: NodeId,
    pub path: Vec<Symbol>,
    pub span: Span,
}

/// Top-level declarations
#[derive(Debug, Clone)]
pub enum Decl {
    Class(ClassDecl),
    Protocol(ProtocolDecl),
    Enum(EnumDecl),
    Function(FuncDecl),
}

impl Decl {
    pub fn id(&self) -> NodeId {
        match self {
            Decl::Class(c) => c.id,
            Decl::Protocol(p) => p.id,
            Decl::Enum(e) => e.id,
            Decl::Function(f) => f.id,
        }
    }

    pub fn name(&self) -> Symbol {
        match self {
            Decl::Class(c) => c.name,
            Decl::Protocol(p) => p.name,
            Decl::Enum(e) => e.name,
            Decl::Function(f) => f.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Decl::Class(c) => c.span,
            Decl::Protocol(p) => p.span,
            Decl::Enum(e) => e.span,
            Decl::Function(f) => f.span,
        }
    }
}

/// Type parameter declaration: `T`
#[derive(Debug, Clone)]
pub struct TypeParam {
    pub name: Symbol,
    pub span: Span,
}

/// Class declaration
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub id: NodeId,
    pub name: Symbol,
    pub type_params: Vec<TypeParam>,
    /// Single inheritance: `class Duck : Animal`
    pub ancestor: Option<TypeExpr>,
    /// Protocols this class conforms to
    pub protocols: Vec<TypeExpr>,
    pub fields: Vec<FieldDecl>,
    /// Initializer run by `new`
    pub init: Option<FuncDecl>,
    pub methods: Vec<FuncDecl>,
    pub span: Span,
}

/// Field definition in a class
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub id: NodeId,
    pub name: Symbol,
    pub ty: TypeExpr,
    pub default_value: Option<Expr>,
    pub span: Span,
}

/// Protocol declaration: a set of required method signatures
#[derive(Debug, Clone)]
pub struct ProtocolDecl {
    pub id: NodeId,
    pub name: Symbol,
    pub type_params: Vec<TypeParam>,
    /// Method requirements; bodies are ignored
    pub methods: Vec<FuncDecl>,
    pub span: Span,
}

/// C-like enum declaration
#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub id: NodeId,
    pub name: Symbol,
    pub variants: Vec<Symbol>,
    pub span: Span,
}

/// `virtual` / `override` keywords on a function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FuncModifiers {
    pub is_virtual: bool,
    pub is_override: bool,
}

/// Function, method, initializer or extension function declaration
#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub id: NodeId,
    pub name: Symbol,
    pub type_params: Vec<TypeParam>,
    /// Extension receiver: `func i64.double()`
    pub receiver: Option<TypeExpr>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    /// None for protocol requirements
    pub body: Option<Block>,
    pub modifiers: FuncModifiers,
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub id: NodeId,
    pub name: Symbol,
    pub ty: TypeExpr,
    pub span: Span,
}

/// A type reference in source
#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub id: NodeId,
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    Primitive(PrimitiveType),
    /// `Animal`, `zoo.Animal`, `Box<i32>`
    Named {
        path: Vec<Symbol>,
        type_args: Vec<TypeExpr>,
    },
}

/// `{ stmts; tail }`: the tail expression is the block's value
#[derive(Debug, Clone)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    pub tail: Option<Box<Expr>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Let(LetStmt),
    Assign(AssignStmt),
    Expr(ExprStmt),
    Return(ReturnStmt),
    While(WhileStmt),
}

impl Stmt {
    pub fn id(&self) -> NodeId {
        match self {
            Stmt::Let(s) => s.id,
            Stmt::Assign(s) => s.id,
            Stmt::Expr(s) => s.id,
            Stmt::Return(s) => s.id,
            Stmt::While(s) => s.id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Stmt::Let(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::Expr(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::While(s) => s.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LetStmt {
    pub id: NodeId,
    pub name: Symbol,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
    pub span: Span,
}

/// `target = value` where target is an identifier or a field access
#[derive(Debug, Clone)]
pub struct AssignStmt {
    pub id: NodeId,
    pub target: Expr,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub id: NodeId,
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub id: NodeId,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub id: NodeId,
    pub condition: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(String),
    Identifier(Symbol),
    SelfRef,
    Binary(Box<BinaryExpr>),
    Unary(Box<UnaryExpr>),
    Call(Box<CallExpr>),
    MethodCall(Box<MethodCallExpr>),
    FieldAccess(Box<FieldAccessExpr>),
    New(Box<NewExpr>),
    If(Box<IfExpr>),
    Block(Block),
    EnumVariant(Box<EnumVariantExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
}

#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Expr,
}

/// Call of a free function or, inside a class, an implicit `self` method.
/// `callee` may be qualified: `zoo.feed(x)`.
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub callee: Vec<Symbol>,
    pub type_args: Vec<TypeExpr>,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct MethodCallExpr {
    pub receiver: Expr,
    pub method: Symbol,
    pub type_args: Vec<TypeExpr>,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct FieldAccessExpr {
    pub object: Expr,
    pub field: Symbol,
}

/// `new Box<i32>(args)`
#[derive(Debug, Clone)]
pub struct NewExpr {
    pub ty: TypeExpr,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct IfExpr {
    pub condition: Expr,
    pub then_branch: Block,
    pub else_branch: Option<Block>,
}

/// `Color.Red`
#[derive(Debug, Clone)]
pub struct EnumVariantExpr {
    pub ty: TypeExpr,
    pub variant: Symbol,
}

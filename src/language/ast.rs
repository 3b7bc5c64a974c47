use crate::language::{span::Span, types::TypeAnnotation};
use std::rc::Rc;

/// One parsed source file.
#[derive(Clone, Debug)]
pub struct Module {
    pub path: String,
    pub statements: Vec<Statement>,
    pub span: Span,
}

impl Module {
    /// Trailing top-level expression, which turns the module into an assembly.
    pub fn assembly_expr(&self) -> Option<&Expr> {
        match self.statements.last() {
            Some(Statement::Expr(stmt)) => Some(&stmt.expr),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Statement {
    Import(ImportStmt),
    Let(LetStmt),
    Expr(ExprStmt),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Import(stmt) => stmt.span,
            Statement::Let(stmt) => stmt.span,
            Statement::Expr(stmt) => stmt.span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImportStmt {
    pub exported: bool,
    pub items: ImportItems,
    pub path: String,
    pub path_span: Span,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum ImportItems {
    /// `import "path" [as alias]`
    Module { alias: Option<Identifier> },
    /// `import a [as x], self [as m], * from "path"`
    List(Vec<ImportItem>),
}

#[derive(Clone, Debug)]
pub enum ImportItem {
    Name {
        name: Identifier,
        alias: Option<Identifier>,
    },
    SelfModule {
        span: Span,
        alias: Option<Identifier>,
    },
    Glob(Span),
}

#[derive(Clone, Debug)]
pub struct LetStmt {
    pub exported: bool,
    pub name: Identifier,
    pub value: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Identifier(Identifier),
    Path(PathExpr),
    Literal(Literal),
    Array(Vec<Expr>, Span),
    Range(RangeExpr),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    Call(CallExpr),
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Function(Rc<FunctionExpr>),
    Block(Box<Block>),
    If(Box<IfExpr>),
    Pipeline(Pipeline),
    For(Box<ForExpr>),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Identifier(ident) => ident.span,
            Expr::Path(path) => path.span,
            Expr::Literal(lit) => lit.span(),
            Expr::Array(_, span) => *span,
            Expr::Range(range) => range.span,
            Expr::Binary { span, .. } => *span,
            Expr::Unary { span, .. } => *span,
            Expr::Call(call) => call.span,
            Expr::Index { span, .. } => *span,
            Expr::Function(func) => func.span,
            Expr::Block(block) => block.span,
            Expr::If(expr) => expr.span,
            Expr::Pipeline(pipeline) => pipeline.span,
            Expr::For(expr) => expr.span,
        }
    }

    /// Describes the expression when it can never be a pipeline stage that
    /// takes a receiver.
    pub fn receiver_rejection(&self) -> Option<&'static str> {
        match self {
            Expr::Literal(_) => Some("a literal"),
            Expr::Array(..) => Some("an array"),
            Expr::Range(_) => Some("a range"),
            Expr::Binary { .. } => Some("a binary expression"),
            Expr::Unary { .. } => Some("a unary expression"),
            Expr::Index { .. } => Some("an index expression"),
            Expr::Function(_) => Some("a function literal"),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

/// `a::b::c`
#[derive(Clone, Debug)]
pub struct PathExpr {
    pub segments: Vec<Identifier>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(f64, Span),
    String(String, Span),
    Bool(bool, Span),
}

impl Literal {
    pub fn span(&self) -> Span {
        match self {
            Literal::Number(_, span) | Literal::String(_, span) | Literal::Bool(_, span) => *span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RangeExpr {
    pub start: Box<Expr>,
    pub end: Box<Expr>,
    pub inclusive: bool,
    pub span: Span,
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Debug)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub args: Vec<Argument>,
    pub span: Span,
}

impl CallExpr {
    pub fn positional_count(&self) -> usize {
        self.args.iter().filter(|arg| arg.name.is_none()).count()
    }
}

#[derive(Clone, Debug)]
pub struct Argument {
    /// Set for keyword arguments: `scale = 2`.
    pub name: Option<Identifier>,
    pub value: Expr,
}

#[derive(Clone, Debug)]
pub struct FunctionExpr {
    pub params: Vec<Param>,
    pub returns: Option<TypeAnnotation>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: Identifier,
    pub ty: Option<TypeAnnotation>,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct IfExpr {
    pub condition: Expr,
    pub then_branch: Block,
    pub else_branch: Option<ElseBranch>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum ElseBranch {
    Block(Block),
    If(Box<IfExpr>),
}

/// `s0 |> s1 |> s2`, or a single tagged stage `f() as t`.
#[derive(Clone, Debug)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Stage {
    pub kind: StageKind,
    pub tag: Option<Identifier>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum StageKind {
    Expr(Expr),
    /// Bare infix stage such as `|> * 2`; the receiver is the left operand.
    Operator {
        op: BinaryOp,
        operand: Expr,
    },
}

/// `for <sequence> as <binding> |> <body>`
#[derive(Clone, Debug)]
pub struct ForExpr {
    pub sequence: Expr,
    pub binding: Identifier,
    pub body: Pipeline,
    pub span: Span,
}

//! Syntax tree of the script language
//!
//! Function definitions are shared through `Arc` so closures created at render time can hold
//! on to their body without copying it, and so a compiled template stays `Send + Sync`.

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    /// Template literal: `quasis` has one more entry than `exprs`.
    Template {
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    Bool(bool),
    Null,
    Undefined,
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Ident(String),
    /// A bare name inside a `with` block: read from the object bound to `object` when it has
    /// the field, otherwise resolved through `fallback`.
    Scoped {
        object: String,
        name: String,
        fallback: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Arrow(Arc<FunctionDef>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

impl Expr {
    /// Whether the expression may appear on the left of an assignment.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expr::Ident(_) | Expr::Scoped { .. } | Expr::Member { .. } | Expr::Index { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LooseEq,
    LooseNotEq,
    StrictEq,
    StrictNotEq,
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// The arithmetic behind a compound assignment.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Declare {
        kind: DeclKind,
        name: String,
        init: Option<Expr>,
    },
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
    },
    Expr(Expr),
    If {
        test: Expr,
        consequent: Vec<Stmt>,
        alternate: Option<Vec<Stmt>>,
    },
    ForOf {
        kind: DeclKind,
        binding: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    ForIn {
        kind: DeclKind,
        binding: String,
        object: Expr,
        body: Vec<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Function(Arc<FunctionDef>),
    With {
        object: Expr,
        body: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    Expr(Expr),
}

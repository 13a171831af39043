//! Abstract syntax tree for predicate expressions.

use crate::span::{Span, Spanned};

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Binary operators, from lowest to highest precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::Or | BinaryOp::And)
    }
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Spanned<Literal>),
    /// A bare name: the parameter, or an implicit member of it.
    Ident(Spanned<String>),
    /// `target.member`
    Member {
        target: Box<Expr>,
        member: Spanned<String>,
    },
    /// `target.method(args)`
    Call {
        target: Box<Expr>,
        method: Spanned<String>,
        args: Vec<Expr>,
        span: Span,
    },
    /// `!operand`
    Not { operand: Box<Expr>, span: Span },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(lit) => lit.span,
            Expr::Ident(name) => name.span,
            Expr::Member { target, member } => target.span().merge(member.span),
            Expr::Call { span, .. } | Expr::Not { span, .. } => *span,
            Expr::Binary { left, right, .. } => left.span().merge(right.span()),
        }
    }
}

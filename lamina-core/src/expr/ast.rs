//! Expression AST
//!
//! These nodes are embedded in compiled artifacts, so every type here
//! derives serde traits. The tagged default representation keeps the
//! artifact JSON unambiguous.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// An expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal value (`1`, `'x'`, `true`, `null`)
    Literal(Value),
    /// Variable reference
    Var(String),
    /// Member access `object.field`
    Member { object: Box<Expr>, field: String },
    /// Index access `object[index]`
    Index { object: Box<Expr>, index: Box<Expr> },
    /// Array literal `[a, b]`
    Array(Vec<Expr>),
    /// Map literal `{key: expr}`; keys keep source order
    Map(Vec<(String, Expr)>),
    /// Unary operation
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Ternary `cond ? then : otherwise`
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Pipe application `input | filter(args)`
    Pipe {
        input: Box<Expr>,
        filter: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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

/// Parsed `@foreach` head: `subject as value` or `subject as key => value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeachHead {
    pub subject: Expr,
    pub key_var: Option<String>,
    pub value_var: String,
}

/// Parsed `@for` head: `var in start..end` (half-open integer range).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForHead {
    pub var: String,
    pub start: Expr,
    pub end: Expr,
}

impl Expr {
    /// Convenience constructor for string literals.
    pub fn str(s: impl Into<String>) -> Self {
        Expr::Literal(Value::Str(s.into()))
    }

    /// Convenience constructor for integer literals.
    pub fn int(i: i64) -> Self {
        Expr::Literal(Value::Int(i))
    }

    /// The literal string payload, if this is a string literal.
    pub fn as_literal_str(&self) -> Option<&str> {
        match self {
            Expr::Literal(Value::Str(s)) => Some(s),
            _ => None,
        }
    }
}

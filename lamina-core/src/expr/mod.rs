//! Expression mini-language
//!
//! Directive arguments and echo bodies are expressions over [`Value`]:
//! literals, arrays, maps, member/index access, arithmetic, comparisons,
//! logic, ternaries, and (when enabled) pipe-applied filters. The parser
//! produces a serializable AST that is embedded in compiled artifacts and
//! evaluated by the runtime executor.
//!
//! [`Value`]: crate::value::Value

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{BinaryOp, Expr, ForHead, ForeachHead, UnaryOp};
pub use error::{ExprError, ExprErrorKind, ExprResult};
pub use parser::ExprParser;
pub use token::{Token, TokenKind};

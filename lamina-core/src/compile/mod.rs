//! Directive compiler
//!
//! Consumes the scanner's segment stream and produces a serializable
//! [`Program`](crate::program::Program). A compile failure aborts the whole
//! template; nothing partial is ever cached.

pub mod compiler;
pub mod error;

pub use compiler::Compiler;
pub use error::{CompileError, CompileErrorKind, CompileResult};

//! Template execution: evaluation, scoping, and the op-tree walker.

pub mod error;
pub mod eval;
pub mod executor;
pub mod scope;

pub use error::{RenderError, RenderErrorKind, RenderResult};
pub use eval::{eval, values_equal};
pub use executor::{escape_html, EngineContext, EscapeFn, Executor};
pub use scope::ScopeStack;

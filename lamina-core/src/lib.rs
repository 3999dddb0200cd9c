//! Lamina Core - Template engine core (pure logic, filesystem via VFS)
//!
//! Contains the directive scanner, compiler, artifact cache, resolver,
//! and runtime executor. All filesystem access goes through the
//! `lamina-vfs` abstraction; configuration is passed explicitly via
//! parameters, not via global state.

pub mod auth;
pub mod cache;
pub mod compile;
pub mod expr;
pub mod program;
pub mod registry;
pub mod resolve;
pub mod runtime;
pub mod scan;
pub mod value;

// Re-export common types
pub use auth::Principal;
pub use cache::{ArtifactCache, CacheStatus};
pub use compile::{CompileError, Compiler};
pub use program::{Op, Program};
pub use registry::{DirectiveHandler, DirectiveRegistry, FilterRegistry};
pub use resolve::{ResolveError, TemplateResolver};
pub use runtime::{EngineContext, Executor, RenderError};
pub use value::Value;

// Re-export config types from lamina-config
pub use lamina_config::{CommentMode, CompileMode, EngineConfig, LimitConfig, Phase};

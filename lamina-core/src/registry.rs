//! Directive and filter registries
//!
//! Name to handler maps with last-writer-wins registration. Re-registering
//! an existing name overwrites silently; that is the extension mechanism
//! for layering custom directives onto a shared engine.

use std::collections::HashMap;
use std::fmt;

use crate::value::Value;

/// Failure raised by a custom directive or filter handler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct DirectiveError {
    pub message: String,
}

impl DirectiveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Compile-time handler: raw argument text in, template fragment out.
/// The fragment is scanned and compiled in place of the directive.
pub type CompileTimeFn = dyn Fn(&str) -> Result<String, DirectiveError> + Send + Sync;

/// Run-time handler: evaluated argument values in, emitted value out.
pub type RunTimeFn = dyn Fn(&[Value]) -> Result<Value, DirectiveError> + Send + Sync;

/// A registered directive handler.
pub enum DirectiveHandler {
    /// Expanded during compilation.
    CompileTime(Box<CompileTimeFn>),
    /// Compiled to a call op, invoked during execution. Required when the
    /// directive depends on state only known at render time.
    RunTime(Box<RunTimeFn>),
}

impl fmt::Debug for DirectiveHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveHandler::CompileTime(_) => f.write_str("DirectiveHandler::CompileTime"),
            DirectiveHandler::RunTime(_) => f.write_str("DirectiveHandler::RunTime"),
        }
    }
}

/// Registry of user directives.
///
/// Built-in directive names (`if`, `foreach`, `auth`, ...) are matched by
/// the compiler before this registry is consulted and cannot be shadowed.
#[derive(Default)]
pub struct DirectiveRegistry {
    handlers: HashMap<String, DirectiveHandler>,
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("count", &self.handlers.len())
            .finish()
    }
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler; an existing name is overwritten silently.
    pub fn register(&mut self, name: impl Into<String>, handler: DirectiveHandler) {
        self.handlers.insert(name.into(), handler);
    }

    /// Register a compile-time directive.
    pub fn register_compile_time<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&str) -> Result<String, DirectiveError> + Send + Sync + 'static,
    {
        self.register(name, DirectiveHandler::CompileTime(Box::new(handler)));
    }

    /// Register a run-time directive.
    pub fn register_run_time<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) -> Result<Value, DirectiveError> + Send + Sync + 'static,
    {
        self.register(name, DirectiveHandler::RunTime(Box::new(handler)));
    }

    pub fn lookup(&self, name: &str) -> Option<&DirectiveHandler> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Filter function backing the pipe syntax.
pub type FilterFn = dyn Fn(&Value, &[Value]) -> Result<Value, DirectiveError> + Send + Sync;

/// Registry of value filters, consulted by `expr | filter(args)`.
pub struct FilterRegistry {
    filters: HashMap<String, Box<FilterFn>>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("count", &self.filters.len())
            .finish()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FilterRegistry {
    /// An empty registry, no built-ins.
    pub fn new() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// A registry preloaded with `upper`, `lower`, `trim`, `length`,
    /// and `default`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("upper", |value, _| {
            Ok(Value::Str(value.render_string().to_uppercase()))
        });
        registry.register("lower", |value, _| {
            Ok(Value::Str(value.render_string().to_lowercase()))
        });
        registry.register("trim", |value, _| {
            Ok(Value::Str(value.render_string().trim().to_string()))
        });
        registry.register("length", |value, _| {
            let len = match value {
                Value::Null => 0,
                Value::Str(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => other.render_string().chars().count(),
            };
            Ok(Value::Int(len as i64))
        });
        registry.register("default", |value, args| {
            let fallback = args.first().cloned().unwrap_or(Value::Null);
            let empty = matches!(value, Value::Null) || matches!(value, Value::Str(s) if s.is_empty());
            Ok(if empty { fallback } else { value.clone() })
        });
        registry
    }

    /// Register a filter; an existing name is overwritten silently.
    pub fn register<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, DirectiveError> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Box::new(filter));
    }

    pub fn lookup(&self, name: &str) -> Option<&FilterFn> {
        self.filters.get(name).map(|b| b.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

//! Lamina Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Lamina crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Cache validation policy for compiled artifacts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileMode {
    /// Recompile when the template source is newer than its artifact
    Auto,
    /// Recompile on every render
    Debug,
    /// Trust an existing artifact unconditionally, skipping the freshness check
    Fast,
    /// Same staleness check as `Auto`; kept as a distinct mode name
    Slow,
}

impl CompileMode {
    /// Get the string name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            CompileMode::Auto => "auto",
            CompileMode::Debug => "debug",
            CompileMode::Fast => "fast",
            CompileMode::Slow => "slow",
        }
    }

    /// Whether this mode compares source and artifact timestamps
    pub fn checks_freshness(&self) -> bool {
        matches!(self, CompileMode::Auto | CompileMode::Slow)
    }

    /// Whether this mode recompiles unconditionally
    pub fn always_recompiles(&self) -> bool {
        matches!(self, CompileMode::Debug)
    }
}

/// How template comments (`{{-- --}}`) are treated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentMode {
    /// Comments vanish from the output
    Strip,
    /// Comments are emitted as HTML comments
    Emit,
}

/// Configuration for execution limits
#[derive(Debug, Clone)]
pub struct LimitConfig {
    /// Maximum nesting depth for `@include`
    pub max_include_depth: usize,
    /// Maximum iteration count for any single loop
    pub max_loop_iterations: usize,
    /// Maximum recursion depth for compile-time directive expansion
    pub max_expansion_depth: usize,
}

/// Engine configuration: lookup roots, cache location, modes, extensions
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Ordered template search roots; first match wins
    pub template_roots: Vec<PathBuf>,
    /// Directory receiving compiled artifacts
    pub cache_root: PathBuf,
    /// Cache validation policy
    pub mode: CompileMode,
    /// Comment handling
    pub comment_mode: CommentMode,
    /// Source file extension, appended to resolved view paths
    pub template_ext: String,
    /// Compiled artifact extension
    pub compiled_ext: String,
    /// Whether the pipe syntax (`expr | filter`) is accepted
    pub allow_pipes: bool,
    /// Execution limits
    pub limits: LimitConfig,
}

impl EngineConfig {
    /// Create a configuration with explicit roots and cache directory,
    /// defaults everywhere else.
    pub fn new<I, P>(template_roots: I, cache_root: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            template_roots: template_roots.into_iter().map(Into::into).collect(),
            cache_root: cache_root.into(),
            ..Self::default()
        }
    }
}

/// Engine phase enum for phase-specific log filtering
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Scan,
    Compile,
    Cache,
    Render,
}

impl Phase {
    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Scan => "scan",
            Phase::Compile => "compile",
            Phase::Cache => "cache",
            Phase::Render => "render",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> String {
        format!("lamina::{}", self.as_str())
    }
}

impl Default for CompileMode {
    fn default() -> Self {
        CompileMode::Auto
    }
}

impl Default for CommentMode {
    fn default() -> Self {
        CommentMode::Strip
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_include_depth: 64,
            max_loop_iterations: 100_000,
            max_expansion_depth: 16,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            template_roots: vec![PathBuf::from("templates")],
            cache_root: PathBuf::from("compiled"),
            mode: CompileMode::default(),
            comment_mode: CommentMode::default(),
            template_ext: String::from(".lam.html"),
            compiled_ext: String::from(".lamc"),
            allow_pipes: false,
            limits: LimitConfig::default(),
        }
    }
}

//! CLI configuration
//!
//! The optional `lamina.json` project manifest and the log filtering
//! configuration derived from it. Command line flags override manifest
//! values where both name the same setting.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lamina_api::Value;
use lamina_config::{CommentMode, CompileMode, EngineConfig, Phase};
use tracing::Level;

/// `lamina.json` structure
#[derive(Debug, Deserialize)]
pub struct ProjectManifest {
    /// Template search roots, first match wins
    pub roots: Option<Vec<PathBuf>>,
    /// Directory receiving compiled artifacts
    pub cache: Option<PathBuf>,
    /// Cache validation policy: "auto", "debug", "fast", "slow"
    pub mode: Option<CompileMode>,
    /// Comment handling: "strip" or "emit"
    pub comments: Option<CommentMode>,
    /// Template source extension, including the leading dot
    pub template_ext: Option<String>,
    /// Compiled artifact extension, including the leading dot
    pub compiled_ext: Option<String>,
    /// Whether pipe expressions (`value | filter`) are accepted
    pub pipes: Option<bool>,
    /// Execution limits
    pub limits: Option<ManifestLimits>,
    /// Include aliases, alias view name to replacement view name
    pub includes: Option<BTreeMap<String, String>>,
    /// Globals shared with every render
    pub globals: Option<BTreeMap<String, Value>>,
    /// Log levels: "global" plus per-phase overrides
    pub log: Option<ManifestLog>,
}

/// Execution limit overrides
#[derive(Debug, Deserialize)]
pub struct ManifestLimits {
    /// Maximum `@include` nesting depth
    pub include_depth: Option<usize>,
    /// Maximum iteration count for any single loop
    pub loop_iterations: Option<usize>,
    /// Maximum compile-time directive expansion depth
    pub expansion_depth: Option<usize>,
}

/// Log level names: "silent", "error", "warn", "info", "debug", "trace"
#[derive(Debug, Deserialize)]
pub struct ManifestLog {
    pub global: Option<String>,
    pub scan: Option<String>,
    pub compile: Option<String>,
    pub cache: Option<String>,
    pub render: Option<String>,
}

impl ProjectManifest {
    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("cannot parse '{}': {}", path.display(), e))
    }

    /// Build the engine configuration, defaults filling every absent field.
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(roots) = &self.roots {
            config.template_roots = roots.clone();
        }
        if let Some(cache) = &self.cache {
            config.cache_root = cache.clone();
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(comments) = self.comments {
            config.comment_mode = comments;
        }
        if let Some(ext) = &self.template_ext {
            config.template_ext = ext.clone();
        }
        if let Some(ext) = &self.compiled_ext {
            config.compiled_ext = ext.clone();
        }
        if let Some(pipes) = self.pipes {
            config.allow_pipes = pipes;
        }
        if let Some(limits) = &self.limits {
            if let Some(depth) = limits.include_depth {
                config.limits.max_include_depth = depth;
            }
            if let Some(iterations) = limits.loop_iterations {
                config.limits.max_loop_iterations = iterations;
            }
            if let Some(depth) = limits.expansion_depth {
                config.limits.max_expansion_depth = depth;
            }
        }
        config
    }

    /// Build the log configuration from the manifest's `log` section.
    ///
    /// Unknown level names fall back to the default for that slot.
    pub fn log_config(&self) -> LogConfig {
        let log = match &self.log {
            Some(log) => log,
            None => return LogConfig::default(),
        };
        let parse = |name: &Option<String>| name.as_deref().and_then(parse_log_level);
        LogConfig {
            global: parse(&log.global).unwrap_or(LogConfig::default().global),
            scan: parse(&log.scan),
            compile: parse(&log.compile),
            cache: parse(&log.cache),
            render: parse(&log.render),
        }
    }
}

/// CLI log configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    pub scan: Option<Level>,
    pub compile: Option<Level>,
    pub cache: Option<Level>,
    pub render: Option<Level>,
}

impl Default for LogConfig {
    fn default() -> Self {
        // Quiet by default; rendered output owns stdout
        Self {
            global: Level::WARN,
            scan: None,
            compile: None,
            cache: None,
            render: None,
        }
    }
}

impl LogConfig {
    /// Get the log level for a phase target
    pub fn level_for(&self, phase: Phase) -> Level {
        let specific = match phase {
            Phase::Scan => self.scan,
            Phase::Compile => self.compile,
            Phase::Cache => self.cache,
            Phase::Render => self.render,
        };
        specific.unwrap_or(self.global)
    }
}

/// Parse a log level name
pub fn parse_log_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "silent" => Some(Level::ERROR), // silent = only errors
        "error" => Some(Level::ERROR),
        "warn" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

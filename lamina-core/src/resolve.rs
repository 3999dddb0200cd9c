//! Template resolver
//!
//! Maps dotted view names to source files across ordered search roots,
//! first match wins. Include aliases rewrite `@include` targets only;
//! top-level render calls never see them.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::trace;

use lamina_vfs::VirtualFileSystem;

/// Resolver failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// No search root contains the template.
    TemplateNotFound { name: String, tried: Vec<String> },
    /// Name is empty or contains path separators or dot-segments.
    InvalidName { name: String },
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::TemplateNotFound { name, tried } => {
                write!(f, "Template '{}' not found (tried: {})", name, tried.join(", "))
            }
            ResolveError::InvalidName { name } => {
                write!(f, "Invalid template name '{name}'")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Resolve result type.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Maps view names to template paths.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    roots: Vec<PathBuf>,
    extension: String,
    aliases: HashMap<String, String>,
}

impl TemplateResolver {
    /// # Arguments
    /// * `roots` - Ordered template search roots; earlier roots win
    /// * `extension` - Source file extension, including the leading dot
    pub fn new<I, P>(roots: I, extension: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            extension: extension.into(),
            aliases: HashMap::new(),
        }
    }

    /// Register an include alias; an existing alias is overwritten.
    pub fn add_include(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }

    /// Rewrite a name through the alias table, if registered.
    pub fn apply_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(|s| s.as_str()).unwrap_or(name)
    }

    /// Resolve a view name to a source path.
    ///
    /// # Returns
    /// The first matching path in root order.
    pub fn resolve(&self, vfs: &dyn VirtualFileSystem, name: &str) -> ResolveResult<PathBuf> {
        let relative = self.relative_path(name)?;
        let mut tried = Vec::with_capacity(self.roots.len());
        for root in &self.roots {
            let candidate = root.join(&relative);
            if vfs.is_file(&candidate) {
                trace!(
                    target: "lamina::render",
                    view = name,
                    path = %candidate.display(),
                    "resolved template"
                );
                return Ok(candidate);
            }
            tried.push(candidate.display().to_string());
        }
        Err(ResolveError::TemplateNotFound {
            name: name.to_string(),
            tried,
        })
    }

    /// Resolve an `@include` target: alias table first, then `resolve`.
    pub fn resolve_include(
        &self,
        vfs: &dyn VirtualFileSystem,
        name: &str,
    ) -> ResolveResult<PathBuf> {
        self.resolve(vfs, self.apply_alias(name))
    }

    /// Dotted name to a relative path with the source extension.
    fn relative_path(&self, name: &str) -> ResolveResult<PathBuf> {
        if name.is_empty() {
            return Err(ResolveError::InvalidName {
                name: name.to_string(),
            });
        }
        let mut path = PathBuf::new();
        for segment in name.split('.') {
            let bad = segment.is_empty()
                || segment == ".."
                || segment.contains('/')
                || segment.contains('\\');
            if bad {
                return Err(ResolveError::InvalidName {
                    name: name.to_string(),
                });
            }
            path.push(segment);
        }
        let mut path = path.into_os_string();
        path.push(&self.extension);
        Ok(PathBuf::from(path))
    }
}

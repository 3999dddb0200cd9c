//! Lamina API - engine facade
//!
//! Provides the embedding surface for the template engine:
//! - `Engine`: configuration, registries, shared globals, and the
//!   render/compile entry points
//! - Unified error handling (`LaminaError`) with structured reports
//!   (`ErrorReport`)
//!
//! For CLI convenience this crate also provides a process-wide engine
//! slot in [`global`]. Library users should construct an [`Engine`] and
//! pass it around explicitly.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::{debug, info};

use lamina_core::cache::ArtifactCache;
use lamina_core::registry::{DirectiveError, DirectiveRegistry, FilterRegistry};
use lamina_core::resolve::TemplateResolver;
use lamina_core::runtime::{escape_html, EngineContext, EscapeFn, Executor, RenderError};
use lamina_vfs::{NativeFileSystem, VirtualFileSystem};

pub mod error;
pub mod global;
pub mod types;

pub use error::{ErrorReport, LaminaError};
pub use types::CompileOutput;

// Re-export config types
pub use lamina_config;
pub use lamina_config::{CommentMode, CompileMode, EngineConfig, LimitConfig, Phase};

// Re-export core types embedders interact with
pub use lamina_core::auth::resolve_principal;
pub use lamina_core::{CacheStatus, Compiler, Principal, Program, Value};

/// A configured template engine.
///
/// Owns the filesystem handle, the directive and filter registries, the
/// artifact cache, shared globals, and the principal used by auth
/// directives. All render entry points take `&self`; registration
/// methods take `&mut self`, so shared engines are immutable by
/// construction.
pub struct Engine {
    config: EngineConfig,
    vfs: Box<dyn VirtualFileSystem>,
    resolver: TemplateResolver,
    cache: ArtifactCache,
    registry: DirectiveRegistry,
    filters: FilterRegistry,
    globals: BTreeMap<String, Value>,
    principal: Option<Principal>,
    escape: Box<EscapeFn>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("globals", &self.globals.len())
            .field("principal", &self.principal)
            .finish()
    }
}

impl Engine {
    /// Engine over the native filesystem.
    pub fn new(config: EngineConfig) -> Result<Self, LaminaError> {
        Self::with_vfs(config, NativeFileSystem::new())
    }

    /// Engine over an explicit filesystem.
    ///
    /// Creates the cache directory; this is the only directory the
    /// engine ever creates, and it happens here rather than on the
    /// render path.
    pub fn with_vfs(
        config: EngineConfig,
        vfs: impl VirtualFileSystem + 'static,
    ) -> Result<Self, LaminaError> {
        let vfs: Box<dyn VirtualFileSystem> = Box::new(vfs);
        let resolver =
            TemplateResolver::new(config.template_roots.clone(), config.template_ext.clone());
        let cache = ArtifactCache::new(&config);
        cache.prepare(vfs.as_ref())?;
        info!(
            target: "lamina::cache",
            root = %config.cache_root.display(),
            mode = config.mode.as_str(),
            "engine ready"
        );
        Ok(Self {
            config,
            vfs,
            resolver,
            cache,
            registry: DirectiveRegistry::new(),
            filters: FilterRegistry::with_builtins(),
            globals: BTreeMap::new(),
            principal: None,
            escape: Box::new(escape_html),
        })
    }

    /// Engine whose principal comes from a host callback.
    ///
    /// The callback runs exactly once, at construction.
    pub fn with_principal_resolver<F>(
        config: EngineConfig,
        resolver: F,
    ) -> Result<Self, LaminaError>
    where
        F: FnOnce() -> Option<Principal>,
    {
        let mut engine = Self::new(config)?;
        engine.principal = resolver();
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn vfs(&self) -> &dyn VirtualFileSystem {
        self.vfs.as_ref()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Make a value visible to every template under `name`.
    ///
    /// Per-render data with the same name shadows it.
    pub fn share(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.globals.insert(name.into(), value.into());
    }

    /// Register a compile-time directive: raw argument text in, template
    /// fragment out.
    pub fn directive<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&str) -> Result<String, DirectiveError> + Send + Sync + 'static,
    {
        self.registry.register_compile_time(name, handler);
    }

    /// Register a run-time directive: evaluated arguments in, value out,
    /// emitted raw at render time.
    pub fn directive_rt<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) -> Result<Value, DirectiveError> + Send + Sync + 'static,
    {
        self.registry.register_run_time(name, handler);
    }

    /// Register a value filter for pipe expressions.
    pub fn filter<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, DirectiveError> + Send + Sync + 'static,
    {
        self.filters.register(name, filter);
    }

    /// Alias a view name for `@include`.
    pub fn add_include(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.resolver.add_include(alias, target);
    }

    /// Set or clear the principal consulted by auth directives.
    pub fn set_principal(&mut self, principal: Option<Principal>) {
        self.principal = principal;
    }

    /// Switch the cache validation policy.
    ///
    /// Artifact names embed the mode, so artifacts compiled under another
    /// policy are never served by mistake.
    pub fn set_mode(&mut self, mode: CompileMode) {
        self.config.mode = mode;
        self.cache = ArtifactCache::new(&self.config);
    }

    /// Switch how template comments are treated.
    ///
    /// Affects future compilations only; an artifact compiled under the
    /// previous setting stays valid until its source changes.
    pub fn set_comment_mode(&mut self, mode: CommentMode) {
        self.config.comment_mode = mode;
    }

    /// Replace the escape function applied to `{{ }}` output.
    pub fn set_escape<F>(&mut self, escape: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.escape = Box::new(escape);
    }

    /// Resolve a view name to the template file that would serve it.
    pub fn resolve(&self, view: &str) -> Result<PathBuf, LaminaError> {
        Ok(self.resolver.resolve(self.vfs.as_ref(), view)?)
    }

    /// Compile (or fetch) a view without rendering it.
    ///
    /// Useful for cache warming and `--check` style validation.
    pub fn compile(&self, view: &str) -> Result<CompileOutput, LaminaError> {
        let compiler = Compiler::new(&self.registry, &self.resolver, &self.config);
        let path = self.resolver.resolve(self.vfs.as_ref(), view)?;
        let (program, cache) = self
            .cache
            .fetch(self.vfs.as_ref(), &compiler, view, &path)?;
        Ok(CompileOutput { program, cache })
    }

    /// Render a view to a string.
    pub fn render(&self, view: &str, data: Value) -> Result<String, LaminaError> {
        let mut out = Vec::new();
        self.render_to(view, data, &mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Render a view to stdout.
    pub fn render_print(&self, view: &str, data: Value) -> Result<(), LaminaError> {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        self.render_to(view, data, &mut handle)?;
        handle.flush().map_err(RenderError::from)?;
        Ok(())
    }

    /// Render a view into any writer.
    ///
    /// `data` must be a map or null; its entries become the template's
    /// root variables alongside the shared globals.
    pub fn render_to(
        &self,
        view: &str,
        data: Value,
        out: &mut dyn Write,
    ) -> Result<(), LaminaError> {
        let data = data_map(data)?;
        debug!(target: "lamina::render", view, "render requested");

        let compiler = Compiler::new(&self.registry, &self.resolver, &self.config);
        let path = self.resolver.resolve(self.vfs.as_ref(), view)?;
        let (program, _) = self
            .cache
            .fetch(self.vfs.as_ref(), &compiler, view, &path)?;

        let ctx = EngineContext {
            vfs: self.vfs.as_ref(),
            compiler: &compiler,
            cache: &self.cache,
            resolver: &self.resolver,
            registry: &self.registry,
            filters: &self.filters,
            config: &self.config,
            globals: &self.globals,
            principal: self.principal.as_ref(),
            escape: self.escape.as_ref(),
        };
        Executor::new(&ctx).render(&program, data, out)?;
        Ok(())
    }
}

fn data_map(data: Value) -> Result<BTreeMap<String, Value>, LaminaError> {
    match data {
        Value::Map(map) => Ok(map),
        Value::Null => Ok(BTreeMap::new()),
        other => Err(LaminaError::Data {
            type_name: other.type_name().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_vfs::MemoryFileSystem;
    use std::path::Path;

    fn seeded_vfs(templates: &[(&str, &str)]) -> MemoryFileSystem {
        let vfs = MemoryFileSystem::new();
        for (view, source) in templates {
            let path = format!("/views/{}.lam.html", view.replace('.', "/"));
            vfs.write_file(Path::new(&path), source.as_bytes()).unwrap();
        }
        vfs
    }

    fn engine_with(templates: &[(&str, &str)]) -> Engine {
        Engine::with_vfs(EngineConfig::new(["/views"], "/cache"), seeded_vfs(templates)).unwrap()
    }

    fn json(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_render_returns_string() {
        let engine = engine_with(&[("greet", "hello {{ name }}")]);
        let out = engine.render("greet", json(r#"{"name": "lam"}"#)).unwrap();
        assert_eq!(out, "hello lam");
    }

    #[test]
    fn test_render_accepts_null_data() {
        let engine = engine_with(&[("page", "[{{ anything }}]")]);
        assert_eq!(engine.render("page", Value::Null).unwrap(), "[]");
    }

    #[test]
    fn test_render_rejects_scalar_data() {
        let engine = engine_with(&[("page", "x")]);
        let err = engine.render("page", Value::Int(3)).unwrap_err();
        assert!(matches!(err, LaminaError::Data { .. }));
    }

    #[test]
    fn test_render_to_writes_sink() {
        let engine = engine_with(&[("page", "n={{ n }}")]);
        let mut sink = Vec::new();
        engine
            .render_to("page", json(r#"{"n": 7}"#), &mut sink)
            .unwrap();
        assert_eq!(sink, b"n=7");
    }

    #[test]
    fn test_resolve_returns_template_path() {
        let engine = engine_with(&[("shop.cart", "x")]);
        let path = engine.resolve("shop.cart").unwrap();
        assert_eq!(path, Path::new("/views/shop/cart.lam.html"));
    }

    #[test]
    fn test_compile_reports_cache_status() {
        let engine = engine_with(&[("page", "static")]);
        let first = engine.compile("page").unwrap();
        assert_eq!(first.cache, CacheStatus::Compiled);
        assert_eq!(first.program.name, "page");

        let second = engine.compile("page").unwrap();
        assert_eq!(second.cache, CacheStatus::Hit);
        assert_eq!(second.program, first.program);
    }

    #[test]
    fn test_shared_globals_reach_templates() {
        let mut engine = engine_with(&[("page", "{{ app }} v{{ version }}")]);
        engine.share("app", "lamina");
        engine.share("version", 3);
        assert_eq!(engine.render("page", Value::Null).unwrap(), "lamina v3");
    }

    #[test]
    fn test_compile_time_directive_expands() {
        let mut engine = engine_with(&[("page", "@chip(kind)")]);
        engine.directive("chip", |args| {
            Ok(format!("<span class=\"chip\">{{{{ {args} }}}}</span>"))
        });
        let out = engine.render("page", json(r#"{"kind": "new"}"#)).unwrap();
        assert_eq!(out, "<span class=\"chip\">new</span>");
    }

    #[test]
    fn test_run_time_directive_renders() {
        let mut engine = engine_with(&[("page", "@stamp('r1')")]);
        engine.directive_rt("stamp", |args| {
            let tag = args.first().map(|v| v.render_string()).unwrap_or_default();
            Ok(Value::Str(format!("<!--{tag}-->")))
        });
        assert_eq!(engine.render("page", Value::Null).unwrap(), "<!--r1-->");
    }

    #[test]
    fn test_custom_filter() {
        let mut config = EngineConfig::new(["/views"], "/cache");
        config.allow_pipes = true;
        let mut engine =
            Engine::with_vfs(config, seeded_vfs(&[("page", "{{ word | shout }}")])).unwrap();
        engine.filter("shout", |value, _| {
            Ok(Value::Str(format!("{}!", value.render_string())))
        });
        let out = engine.render("page", json(r#"{"word": "go"}"#)).unwrap();
        assert_eq!(out, "go!");
    }

    #[test]
    fn test_include_alias() {
        let mut engine = engine_with(&[
            ("page", "@include('partials.footer')"),
            ("shared.footer", "<footer>f</footer>"),
        ]);
        engine.add_include("partials.footer", "shared.footer");
        assert_eq!(
            engine.render("page", Value::Null).unwrap(),
            "<footer>f</footer>"
        );
    }

    #[test]
    fn test_set_principal_drives_auth() {
        let mut engine = engine_with(&[("page", "@auth('editor')E@else -@endauth")]);
        assert_eq!(engine.render("page", Value::Null).unwrap(), "-");

        engine.set_principal(Some(Principal::new("eli", "editor", Vec::<String>::new())));
        assert_eq!(engine.render("page", Value::Null).unwrap(), "E");
    }

    #[test]
    fn test_set_mode_switches_cache_policy() {
        let mut engine = engine_with(&[("page", "static")]);
        assert_eq!(engine.compile("page").unwrap().cache, CacheStatus::Compiled);
        assert_eq!(engine.compile("page").unwrap().cache, CacheStatus::Hit);

        engine.set_mode(CompileMode::Debug);
        assert_eq!(engine.compile("page").unwrap().cache, CacheStatus::Compiled);
        assert_eq!(engine.compile("page").unwrap().cache, CacheStatus::Compiled);
    }

    #[test]
    fn test_set_comment_mode_changes_future_compiles() {
        let mut engine = engine_with(&[("page", "a{{-- note --}}b")]);
        assert_eq!(engine.render("page", Value::Null).unwrap(), "ab");

        engine.set_comment_mode(CommentMode::Emit);
        // debug mode forces the recompile; auto would serve the artifact
        // compiled under the previous setting
        engine.set_mode(CompileMode::Debug);
        assert_eq!(
            engine.render("page", Value::Null).unwrap(),
            "a<!-- note -->b"
        );
    }

    #[test]
    fn test_set_escape_replaces_default() {
        let mut engine = engine_with(&[("page", "{{ v }}")]);
        engine.set_escape(|s| s.to_uppercase());
        let out = engine.render("page", json(r#"{"v": "<b>quiet</b>"}"#)).unwrap();
        assert_eq!(out, "<B>QUIET</B>");
    }

    #[test]
    fn test_with_principal_resolver_runs_once() {
        let calls = std::cell::Cell::new(0);
        let cache_root = std::env::temp_dir().join("lamina-api-principal-test");
        let config = EngineConfig::new(["/views"], cache_root);
        let engine = Engine::with_principal_resolver(config, || {
            calls.set(calls.get() + 1);
            resolve_principal("ana", "admin", ["publish"])
        })
        .unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(engine.principal().map(|p| p.role.as_str()), Some("admin"));
    }

    #[test]
    fn test_engine_renders_from_multiple_threads() {
        // compiles only because Engine is Send + Sync
        let engine = std::sync::Arc::new(engine_with(&[("page", "n={{ n }}")]));
        let mut handles = Vec::new();
        for i in 0..4 {
            let engine = engine.clone();
            handles.push(std::thread::spawn(move || {
                let out = engine
                    .render("page", json(&format!(r#"{{"n": {i}}}"#)))
                    .unwrap();
                assert_eq!(out, format!("n={i}"));
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_missing_view_reports_template_not_found() {
        let engine = engine_with(&[]);
        let err = engine.render("ghost", Value::Null).unwrap_err();
        let report = err.to_report().for_template("ghost");
        assert_eq!(report.phase, "render");
        assert_eq!(report.error_kind, "TemplateNotFound");
        assert_eq!(report.template.as_deref(), Some("ghost"));
    }

    #[test]
    fn test_compile_error_report_has_position() {
        let engine = engine_with(&[("bad", "@if(x)never closed")]);
        let err = engine.render("bad", Value::Null).unwrap_err();
        let report = err.to_report();
        assert_eq!(report.phase, "compile");
        assert_eq!(report.error_kind, "UnclosedBlock");
        assert_eq!(report.line, Some(1));
    }
}

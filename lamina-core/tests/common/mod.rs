//! Shared wiring for end-to-end template tests.
//!
//! Builds a complete engine over an in-memory filesystem so tests can
//! exercise the resolve, cache, compile, and render path exactly the
//! way an embedding application would.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use lamina_core::auth::Principal;
use lamina_core::cache::CacheStatus;
use lamina_core::runtime::{escape_html, RenderResult};
use lamina_core::{
    ArtifactCache, Compiler, DirectiveRegistry, EngineConfig, EngineContext, Executor,
    FilterRegistry, TemplateResolver, Value,
};
use lamina_vfs::{MemoryFileSystem, VirtualFileSystem};

/// One engine instance over an in-memory filesystem.
pub struct TestEngine {
    pub vfs: MemoryFileSystem,
    pub config: EngineConfig,
    pub registry: DirectiveRegistry,
    pub filters: FilterRegistry,
    pub resolver: TemplateResolver,
    pub cache: ArtifactCache,
    pub globals: BTreeMap<String, Value>,
    pub principal: Option<Principal>,
}

impl TestEngine {
    pub fn new(templates: &[(&str, &str)]) -> Self {
        Self::with_config(templates, EngineConfig::new(["/views"], "/cache"))
    }

    pub fn with_config(templates: &[(&str, &str)], config: EngineConfig) -> Self {
        let vfs = MemoryFileSystem::new();
        let resolver =
            TemplateResolver::new(config.template_roots.clone(), config.template_ext.clone());
        let cache = ArtifactCache::new(&config);
        let engine = Self {
            vfs,
            config,
            registry: DirectiveRegistry::new(),
            filters: FilterRegistry::with_builtins(),
            resolver,
            cache,
            globals: BTreeMap::new(),
            principal: None,
        };
        engine.cache.prepare(&engine.vfs).unwrap();
        for (view, source) in templates {
            engine.put(view, source);
        }
        engine
    }

    /// Write or overwrite a template source.
    pub fn put(&self, view: &str, source: &str) {
        self.vfs
            .write_file(&self.view_path(view), source.as_bytes())
            .unwrap();
    }

    pub fn view_path(&self, view: &str) -> PathBuf {
        PathBuf::from(format!(
            "/views/{}{}",
            view.replace('.', "/"),
            self.config.template_ext
        ))
    }

    /// Render a view, also reporting whether a cached artifact was reused.
    pub fn render_with_status(
        &self,
        view: &str,
        data: BTreeMap<String, Value>,
    ) -> RenderResult<(String, CacheStatus)> {
        let compiler = Compiler::new(&self.registry, &self.resolver, &self.config);
        let ctx = EngineContext {
            vfs: &self.vfs,
            compiler: &compiler,
            cache: &self.cache,
            resolver: &self.resolver,
            registry: &self.registry,
            filters: &self.filters,
            config: &self.config,
            globals: &self.globals,
            principal: self.principal.as_ref(),
            escape: &escape_html,
        };
        let path = self.resolver.resolve(&self.vfs, view)?;
        let (program, status) = self.cache.fetch(&self.vfs, &compiler, view, &path)?;
        let output = Executor::new(&ctx).render_to_string(&program, data)?;
        Ok((output, status))
    }

    pub fn render(&self, view: &str, data: BTreeMap<String, Value>) -> RenderResult<String> {
        Ok(self.render_with_status(view, data)?.0)
    }
}

/// Build a data map from name/value pairs.
pub fn data(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}

/// Parse a JSON literal into a template value.
pub fn json(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

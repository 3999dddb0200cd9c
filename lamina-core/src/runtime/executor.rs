//! Program execution
//!
//! A tree-walking executor over compiled ops. Control flow inside loops is
//! signalled with [`Flow`] values rather than exceptions: `@break` and
//! `@continue` bubble up through nested blocks until a loop (or, for
//! break, a switch) absorbs them. Includes run with a fresh scope seeded
//! from the globals and the passed data only.

use std::collections::BTreeMap;
use std::io::Write;

use tracing::{debug, trace};

use lamina_config::EngineConfig;
use lamina_vfs::VirtualFileSystem;

use super::error::{RenderError, RenderErrorKind, RenderResult};
use super::eval::{eval, values_equal};
use super::scope::ScopeStack;
use crate::auth::{check_authenticated, check_can, check_guest, AuthCheck, Principal};
use crate::cache::ArtifactCache;
use crate::compile::Compiler;
use crate::expr::ast::{Expr, ForHead, ForeachHead};
use crate::program::{AuthArm, CaseArm, IfArm, Op, Program};
use crate::registry::{DirectiveHandler, DirectiveRegistry, FilterRegistry};
use crate::resolve::TemplateResolver;
use crate::scan::SourcePos;
use crate::value::Value;

/// Escape hook applied to `{{ }}` output.
pub type EscapeFn = dyn Fn(&str) -> String + Send + Sync;

/// HTML escaping, the default for escaped echoes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Everything an execution needs, borrowed from the engine for the
/// duration of one render.
pub struct EngineContext<'e> {
    pub vfs: &'e dyn VirtualFileSystem,
    pub compiler: &'e Compiler<'e>,
    pub cache: &'e ArtifactCache,
    pub resolver: &'e TemplateResolver,
    pub registry: &'e DirectiveRegistry,
    pub filters: &'e FilterRegistry,
    pub config: &'e EngineConfig,
    pub globals: &'e BTreeMap<String, Value>,
    pub principal: Option<&'e Principal>,
    pub escape: &'e EscapeFn,
}

/// Control-flow signal returned by op execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// Executes programs against an [`EngineContext`].
pub struct Executor<'e> {
    ctx: &'e EngineContext<'e>,
    /// View names currently being rendered, for recursion detection
    include_stack: Vec<String>,
}

impl<'e> Executor<'e> {
    pub fn new(ctx: &'e EngineContext<'e>) -> Self {
        Self {
            ctx,
            include_stack: Vec::new(),
        }
    }

    /// Execute a program, writing rendered output to `out`.
    pub fn render(
        &mut self,
        program: &Program,
        data: BTreeMap<String, Value>,
        out: &mut dyn Write,
    ) -> RenderResult<()> {
        debug!(target: "lamina::render", view = %program.name, "executing template");
        self.include_stack.clear();
        self.include_stack.push(program.name.clone());
        let mut scope = ScopeStack::new(self.ctx.globals, data);
        self.exec_ops(&program.ops, &mut scope, out)?;
        Ok(())
    }

    /// Execute a program into a string.
    pub fn render_to_string(
        &mut self,
        program: &Program,
        data: BTreeMap<String, Value>,
    ) -> RenderResult<String> {
        let mut buffer = Vec::new();
        self.render(program, data, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn exec_ops(
        &mut self,
        ops: &[Op],
        scope: &mut ScopeStack<'_>,
        out: &mut dyn Write,
    ) -> RenderResult<Flow> {
        for op in ops {
            match self.exec_op(op, scope, out)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_op(
        &mut self,
        op: &Op,
        scope: &mut ScopeStack<'_>,
        out: &mut dyn Write,
    ) -> RenderResult<Flow> {
        match op {
            Op::Text(text) => {
                out.write_all(text.as_bytes())?;
                Ok(Flow::Normal)
            }
            Op::EchoEscaped { expr, pos } => {
                let value = self.eval_at(expr, scope, *pos)?;
                let text = (self.ctx.escape)(&value.render_string());
                out.write_all(text.as_bytes())?;
                Ok(Flow::Normal)
            }
            Op::EchoRaw { expr, pos } => {
                let value = self.eval_at(expr, scope, *pos)?;
                out.write_all(value.render_string().as_bytes())?;
                Ok(Flow::Normal)
            }
            Op::If { arms, fallback } => self.exec_if(arms, fallback.as_deref(), scope, out),
            Op::Switch {
                subject,
                cases,
                default,
            } => self.exec_switch(subject, cases, default.as_deref(), scope, out),
            Op::Foreach { head, body } => self.exec_foreach(head, body, scope, out),
            Op::For { head, body } => self.exec_for(head, body, scope, out),
            Op::While { cond, body } => self.exec_while(cond, body, scope, out),
            Op::Break => Ok(Flow::Break),
            Op::Continue => Ok(Flow::Continue),
            Op::Include { target, data, pos } => {
                self.exec_include(target, data.as_ref(), *pos, scope, out)
            }
            Op::Auth { arms, fallback } => self.exec_auth(arms, fallback.as_deref(), scope, out),
            Op::CallDirective { name, args, pos } => {
                self.exec_call(name, args, *pos, scope, out)
            }
        }
    }

    fn eval_at(
        &self,
        expr: &Expr,
        scope: &ScopeStack<'_>,
        pos: SourcePos,
    ) -> RenderResult<Value> {
        eval(expr, scope, self.ctx.filters).map_err(|err| err.locate(pos))
    }

    fn exec_if(
        &mut self,
        arms: &[IfArm],
        fallback: Option<&[Op]>,
        scope: &mut ScopeStack<'_>,
        out: &mut dyn Write,
    ) -> RenderResult<Flow> {
        for arm in arms {
            if eval(&arm.cond, scope, self.ctx.filters)?.is_truthy() {
                return self.exec_ops(&arm.body, scope, out);
            }
        }
        match fallback {
            Some(ops) => self.exec_ops(ops, scope, out),
            None => Ok(Flow::Normal),
        }
    }

    fn exec_switch(
        &mut self,
        subject: &Expr,
        cases: &[CaseArm],
        default: Option<&[Op]>,
        scope: &mut ScopeStack<'_>,
        out: &mut dyn Write,
    ) -> RenderResult<Flow> {
        let subject = eval(subject, scope, self.ctx.filters)?;
        for case in cases {
            let value = eval(&case.value, scope, self.ctx.filters)?;
            if values_equal(&subject, &value) {
                return absorb_break(self.exec_ops(&case.body, scope, out)?);
            }
        }
        match default {
            Some(ops) => absorb_break(self.exec_ops(ops, scope, out)?),
            None => Ok(Flow::Normal),
        }
    }

    fn exec_foreach(
        &mut self,
        head: &ForeachHead,
        body: &[Op],
        scope: &mut ScopeStack<'_>,
        out: &mut dyn Write,
    ) -> RenderResult<Flow> {
        let subject = eval(&head.subject, scope, self.ctx.filters)?;
        let entries: Vec<(Value, Value)> = match subject {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Value::Int(i as i64), v))
                .collect(),
            Value::Map(map) => map.into_iter().map(|(k, v)| (Value::Str(k), v)).collect(),
            Value::Null => {
                trace!(target: "lamina::render", "foreach over null, zero iterations");
                Vec::new()
            }
            other => {
                return Err(RenderError::somewhere(RenderErrorKind::NotIterable {
                    type_name: other.type_name().to_string(),
                }))
            }
        };

        scope.push_frame();
        let result = self.run_foreach(head, body, entries, scope, out);
        scope.pop_frame();
        result
    }

    fn run_foreach(
        &mut self,
        head: &ForeachHead,
        body: &[Op],
        entries: Vec<(Value, Value)>,
        scope: &mut ScopeStack<'_>,
        out: &mut dyn Write,
    ) -> RenderResult<Flow> {
        let count = entries.len();
        let limit = self.ctx.config.limits.max_loop_iterations;
        for (index, (key, value)) in entries.into_iter().enumerate() {
            if index >= limit {
                return Err(RenderError::somewhere(RenderErrorKind::LoopLimitExceeded {
                    limit,
                }));
            }
            if let Some(key_var) = &head.key_var {
                scope.set(key_var.clone(), key);
            }
            scope.set(head.value_var.clone(), value);
            scope.set("loop", loop_meta(index, count));
            match self.exec_ops(body, scope, out)? {
                Flow::Break => break,
                Flow::Continue | Flow::Normal => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for(
        &mut self,
        head: &ForHead,
        body: &[Op],
        scope: &mut ScopeStack<'_>,
        out: &mut dyn Write,
    ) -> RenderResult<Flow> {
        let start = self.int_bound(&head.start, scope)?;
        let end = self.int_bound(&head.end, scope)?;

        scope.push_frame();
        let result = self.run_for(head, body, start, end, scope, out);
        scope.pop_frame();
        result
    }

    fn run_for(
        &mut self,
        head: &ForHead,
        body: &[Op],
        start: i64,
        end: i64,
        scope: &mut ScopeStack<'_>,
        out: &mut dyn Write,
    ) -> RenderResult<Flow> {
        let limit = self.ctx.config.limits.max_loop_iterations;
        let mut iterations = 0usize;
        let mut i = start;
        // half-open range: end itself is never visited
        while i < end {
            if iterations >= limit {
                return Err(RenderError::somewhere(RenderErrorKind::LoopLimitExceeded {
                    limit,
                }));
            }
            iterations += 1;
            scope.set(head.var.clone(), Value::Int(i));
            match self.exec_ops(body, scope, out)? {
                Flow::Break => break,
                Flow::Continue | Flow::Normal => {}
            }
            i += 1;
        }
        Ok(Flow::Normal)
    }

    fn int_bound(&self, expr: &Expr, scope: &ScopeStack<'_>) -> RenderResult<i64> {
        match eval(expr, scope, self.ctx.filters)? {
            Value::Int(i) => Ok(i),
            other => Err(RenderError::somewhere(RenderErrorKind::RangeBoundNotInt {
                type_name: other.type_name().to_string(),
            })),
        }
    }

    fn exec_while(
        &mut self,
        cond: &Expr,
        body: &[Op],
        scope: &mut ScopeStack<'_>,
        out: &mut dyn Write,
    ) -> RenderResult<Flow> {
        let limit = self.ctx.config.limits.max_loop_iterations;
        let mut iterations = 0usize;
        while eval(cond, scope, self.ctx.filters)?.is_truthy() {
            if iterations >= limit {
                return Err(RenderError::somewhere(RenderErrorKind::LoopLimitExceeded {
                    limit,
                }));
            }
            iterations += 1;
            match self.exec_ops(body, scope, out)? {
                Flow::Break => break,
                Flow::Continue | Flow::Normal => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_include(
        &mut self,
        target: &Expr,
        data: Option<&Expr>,
        pos: SourcePos,
        scope: &mut ScopeStack<'_>,
        out: &mut dyn Write,
    ) -> RenderResult<Flow> {
        let limit = self.ctx.config.limits.max_include_depth;
        if self.include_stack.len() >= limit {
            return Err(RenderError::here(
                RenderErrorKind::IncludeDepthExceeded { limit },
                pos,
            ));
        }

        let name = match self.eval_at(target, scope, pos)? {
            Value::Str(name) => name,
            other => {
                return Err(RenderError::here(
                    RenderErrorKind::IncludeTargetNotString {
                        type_name: other.type_name().to_string(),
                    },
                    pos,
                ))
            }
        };
        // dynamic targets pass the alias table here; literal targets were
        // already substituted at compile time
        let name = self.ctx.resolver.apply_alias(&name).to_string();

        if self.include_stack.iter().any(|entry| *entry == name) {
            let mut chain = self.include_stack.clone();
            chain.push(name);
            return Err(RenderError::here(
                RenderErrorKind::RecursiveInclude { chain },
                pos,
            ));
        }

        let sub_data = match data {
            Some(expr) => match self.eval_at(expr, scope, pos)? {
                Value::Map(map) => map,
                other => {
                    return Err(RenderError::here(
                        RenderErrorKind::IncludeDataNotMap {
                            type_name: other.type_name().to_string(),
                        },
                        pos,
                    ))
                }
            },
            None => BTreeMap::new(),
        };

        let path = self
            .ctx
            .resolver
            .resolve(self.ctx.vfs, &name)
            .map_err(|err| RenderError::from(err).locate(pos))?;
        let (program, _) = self
            .ctx
            .cache
            .fetch(self.ctx.vfs, self.ctx.compiler, &name, &path)
            .map_err(|err| RenderError::from(err).locate(pos))?;

        trace!(target: "lamina::render", view = %name, "rendering include");
        let mut sub_scope = ScopeStack::new(self.ctx.globals, sub_data);
        self.include_stack.push(name);
        let result = self.exec_ops(&program.ops, &mut sub_scope, out);
        self.include_stack.pop();
        result?;
        Ok(Flow::Normal)
    }

    fn exec_auth(
        &mut self,
        arms: &[AuthArm],
        fallback: Option<&[Op]>,
        scope: &mut ScopeStack<'_>,
        out: &mut dyn Write,
    ) -> RenderResult<Flow> {
        for arm in arms {
            if self.auth_matches(&arm.check, scope)? {
                return self.exec_ops(&arm.body, scope, out);
            }
        }
        match fallback {
            Some(ops) => self.exec_ops(ops, scope, out),
            None => Ok(Flow::Normal),
        }
    }

    fn auth_matches(&self, check: &AuthCheck, scope: &ScopeStack<'_>) -> RenderResult<bool> {
        Ok(match check {
            AuthCheck::Authenticated { role } => {
                let role = self.eval_role(role.as_ref(), scope)?;
                check_authenticated(self.ctx.principal, role.as_deref())
            }
            AuthCheck::Guest { role } => {
                let role = self.eval_role(role.as_ref(), scope)?;
                check_guest(self.ctx.principal, role.as_deref())
            }
            AuthCheck::Can { permission } => {
                let permission = eval(permission, scope, self.ctx.filters)?.render_string();
                check_can(self.ctx.principal, &permission)
            }
        })
    }

    fn eval_role(
        &self,
        role: Option<&Expr>,
        scope: &ScopeStack<'_>,
    ) -> RenderResult<Option<String>> {
        match role {
            Some(expr) => Ok(Some(eval(expr, scope, self.ctx.filters)?.render_string())),
            None => Ok(None),
        }
    }

    fn exec_call(
        &mut self,
        name: &str,
        args: &[Expr],
        pos: SourcePos,
        scope: &mut ScopeStack<'_>,
        out: &mut dyn Write,
    ) -> RenderResult<Flow> {
        let handler = match self.ctx.registry.lookup(name) {
            Some(DirectiveHandler::RunTime(handler)) => handler,
            Some(DirectiveHandler::CompileTime(_)) => {
                return Err(RenderError::here(
                    RenderErrorKind::NotRunTimeDirective {
                        name: name.to_string(),
                    },
                    pos,
                ))
            }
            None => {
                return Err(RenderError::here(
                    RenderErrorKind::UnknownDirective {
                        name: name.to_string(),
                    },
                    pos,
                ))
            }
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_at(arg, scope, pos)?);
        }
        let result = handler(&values).map_err(|err| {
            RenderError::here(
                RenderErrorKind::DirectiveFailed {
                    name: name.to_string(),
                    message: err.message,
                },
                pos,
            )
        })?;
        // directive output is emitted raw; handlers produce markup
        out.write_all(result.render_string().as_bytes())?;
        Ok(Flow::Normal)
    }
}

/// A break that reaches a switch stops at the switch; continue keeps
/// travelling to the enclosing loop.
fn absorb_break(flow: Flow) -> RenderResult<Flow> {
    Ok(match flow {
        Flow::Break => Flow::Normal,
        other => other,
    })
}

/// The `loop` variable visible inside `@foreach` bodies.
fn loop_meta(index: usize, count: usize) -> Value {
    let mut map = BTreeMap::new();
    map.insert("index".to_string(), Value::Int(index as i64));
    map.insert("iteration".to_string(), Value::Int(index as i64 + 1));
    map.insert("first".to_string(), Value::Bool(index == 0));
    map.insert("last".to_string(), Value::Bool(index + 1 == count));
    map.insert("count".to_string(), Value::Int(count as i64));
    Value::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DirectiveError;
    use lamina_vfs::MemoryFileSystem;

    /// Owns everything an `EngineContext` borrows.
    struct Harness {
        vfs: MemoryFileSystem,
        registry: DirectiveRegistry,
        filters: FilterRegistry,
        resolver: TemplateResolver,
        cache: ArtifactCache,
        config: EngineConfig,
        globals: BTreeMap<String, Value>,
        principal: Option<Principal>,
    }

    impl Harness {
        fn new(templates: &[(&str, &str)]) -> Self {
            let config = EngineConfig::new(["/views"], "/cache");
            Self::with_config(templates, config)
        }

        fn with_config(templates: &[(&str, &str)], config: EngineConfig) -> Self {
            let vfs = MemoryFileSystem::new();
            for (view, source) in templates {
                let path = format!("/views/{}{}", view.replace('.', "/"), config.template_ext);
                vfs.write_file(std::path::Path::new(&path), source.as_bytes())
                    .unwrap();
            }
            let resolver =
                TemplateResolver::new(config.template_roots.clone(), config.template_ext.clone());
            let cache = ArtifactCache::new(&config);
            cache.prepare(&vfs).unwrap();
            Self {
                vfs,
                registry: DirectiveRegistry::new(),
                filters: FilterRegistry::with_builtins(),
                resolver,
                cache,
                config,
                globals: BTreeMap::new(),
                principal: None,
            }
        }

        fn render(&self, view: &str, data: BTreeMap<String, Value>) -> RenderResult<String> {
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
            let (program, _) = self.cache.fetch(&self.vfs, &compiler, view, &path)?;
            Executor::new(&ctx).render_to_string(&program, data)
        }
    }

    fn data(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect()
    }

    fn vjson(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_escaped_vs_raw_echo() {
        let h = Harness::new(&[("page", "{{ markup }}|{!! markup !!}")]);
        let out = h
            .render("page", data(&[("markup", Value::from("<b>hi</b>"))]))
            .unwrap();
        assert_eq!(out, "&lt;b&gt;hi&lt;/b&gt;|<b>hi</b>");
    }

    #[test]
    fn test_escape_covers_quotes() {
        let h = Harness::new(&[("page", "{{ v }}")]);
        let out = h
            .render("page", data(&[("v", Value::from(r#"a"b'c&d"#))]))
            .unwrap();
        assert_eq!(out, "a&quot;b&#39;c&amp;d");
    }

    #[test]
    fn test_undefined_variable_renders_empty() {
        let h = Harness::new(&[("page", "[{{ nothing }}]")]);
        assert_eq!(h.render("page", data(&[])).unwrap(), "[]");
    }

    #[test]
    fn test_if_branches() {
        let h = Harness::new(&[("page", "@if(n > 1)many@elseif(n == 1)one@else none@endif")]);
        assert_eq!(h.render("page", data(&[("n", Value::Int(5))])).unwrap(), "many");
        assert_eq!(h.render("page", data(&[("n", Value::Int(1))])).unwrap(), "one");
        assert_eq!(h.render("page", data(&[("n", Value::Int(0))])).unwrap(), " none");
    }

    #[test]
    fn test_unless_renders_on_false() {
        let h = Harness::new(&[("page", "@unless(ready)waiting@endunless")]);
        assert_eq!(h.render("page", data(&[])).unwrap(), "waiting");
        assert_eq!(
            h.render("page", data(&[("ready", Value::Bool(true))])).unwrap(),
            ""
        );
    }

    #[test]
    fn test_foreach_with_loop_meta() {
        let h = Harness::new(&[(
            "page",
            "@foreach(items as item){{ loop.iteration }}/{{ loop.count }}:{{ item }}{{ loop.last ? '' : ' ' }}@endforeach",
        )]);
        let out = h
            .render("page", data(&[("items", vjson(r#"["a", "b", "c"]"#))]))
            .unwrap();
        assert_eq!(out, "1/3:a 2/3:b 3/3:c");
    }

    #[test]
    fn test_foreach_map_yields_keys_in_order() {
        let h = Harness::new(&[("page", "@foreach(m as k => v){{ k }}={{ v }};@endforeach")]);
        let out = h
            .render("page", data(&[("m", vjson(r#"{"b": 2, "a": 1}"#))]))
            .unwrap();
        // map iteration is key-ordered
        assert_eq!(out, "a=1;b=2;");
    }

    #[test]
    fn test_foreach_array_key_is_index() {
        let h = Harness::new(&[("page", "@foreach(xs as i => x){{ i }}:{{ x }};@endforeach")]);
        let out = h
            .render("page", data(&[("xs", vjson(r#"["p", "q"]"#))]))
            .unwrap();
        assert_eq!(out, "0:p;1:q;");
    }

    #[test]
    fn test_foreach_null_is_empty() {
        let h = Harness::new(&[("page", "[@foreach(xs as x)x@endforeach]")]);
        assert_eq!(h.render("page", data(&[])).unwrap(), "[]");
    }

    #[test]
    fn test_foreach_scalar_is_not_iterable() {
        let h = Harness::new(&[("page", "@foreach(n as x)x@endforeach")]);
        let err = h.render("page", data(&[("n", Value::Int(3))])).unwrap_err();
        assert!(matches!(err.kind, RenderErrorKind::NotIterable { .. }));
    }

    #[test]
    fn test_loop_var_scoped_to_loop() {
        let h = Harness::new(&[("page", "@foreach(xs as x)@endforeach[{{ x }}]")]);
        let out = h
            .render("page", data(&[("xs", vjson("[1]"))]))
            .unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_for_half_open_range() {
        let h = Harness::new(&[("page", "@for(i in 0..4){{ i }}@endfor")]);
        assert_eq!(h.render("page", data(&[])).unwrap(), "0123");
    }

    #[test]
    fn test_for_empty_range() {
        let h = Harness::new(&[("page", "[@for(i in 3..3)x@endfor]")]);
        assert_eq!(h.render("page", data(&[])).unwrap(), "[]");
    }

    #[test]
    fn test_for_range_bounds_must_be_ints() {
        let h = Harness::new(&[("page", "@for(i in a..b)x@endfor")]);
        let err = h
            .render("page", data(&[("a", Value::from("x")), ("b", Value::Int(2))]))
            .unwrap_err();
        assert!(matches!(err.kind, RenderErrorKind::RangeBoundNotInt { .. }));
    }

    #[test]
    fn test_while_counts_down() {
        let h = Harness::new(&[(
            "page",
            "@for(i in 0..3)@while(false)never@endwhile{{ i }}@endfor",
        )]);
        assert_eq!(h.render("page", data(&[])).unwrap(), "012");
    }

    #[test]
    fn test_while_hits_iteration_limit() {
        let mut config = EngineConfig::new(["/views"], "/cache");
        config.limits.max_loop_iterations = 10;
        let h = Harness::with_config(&[("page", "@while(true)x@endwhile")], config);
        let err = h.render("page", data(&[])).unwrap_err();
        match err.kind {
            RenderErrorKind::LoopLimitExceeded { limit } => assert_eq!(limit, 10),
            other => panic!("expected loop limit, got {other:?}"),
        }
    }

    #[test]
    fn test_break_and_continue() {
        let h = Harness::new(&[(
            "page",
            "@foreach(xs as x)@if(x == 2)@continue@endif@if(x == 4)@break@endif{{ x }}@endforeach",
        )]);
        let out = h
            .render("page", data(&[("xs", vjson("[1, 2, 3, 4, 5]"))]))
            .unwrap();
        assert_eq!(out, "13");
    }

    #[test]
    fn test_switch_matches_case() {
        let h = Harness::new(&[(
            "page",
            "@switch(kind)@case('admin')A@break@case('editor')E@break@default U@endswitch",
        )]);
        assert_eq!(
            h.render("page", data(&[("kind", Value::from("editor"))])).unwrap(),
            "E"
        );
        assert_eq!(
            h.render("page", data(&[("kind", Value::from("other"))])).unwrap(),
            " U"
        );
    }

    #[test]
    fn test_switch_numeric_coercion() {
        let h = Harness::new(&[("page", "@switch(n)@case(1)one@endswitch")]);
        assert_eq!(
            h.render("page", data(&[("n", Value::Float(1.0))])).unwrap(),
            "one"
        );
    }

    #[test]
    fn test_continue_passes_through_switch_to_loop() {
        let h = Harness::new(&[(
            "page",
            "@foreach(xs as x)@switch(x)@case(2)@continue@endswitch{{ x }}@endforeach",
        )]);
        let out = h
            .render("page", data(&[("xs", vjson("[1, 2, 3]"))]))
            .unwrap();
        assert_eq!(out, "13");
    }

    #[test]
    fn test_nested_break_absorbed_by_switch() {
        // break inside an if inside a case stops the case, not the loop
        let h = Harness::new(&[(
            "page",
            "@foreach(xs as x)@switch(x)@case(2)@if(true)@break@endif dead@endswitch{{ x }}@endforeach",
        )]);
        let out = h
            .render("page", data(&[("xs", vjson("[1, 2, 3]"))]))
            .unwrap();
        assert_eq!(out, "123");
    }

    #[test]
    fn test_include_passes_data_and_globals_only() {
        let mut h = Harness::new(&[
            ("page", "@foreach(xs as x)@include('part', {n: x})@endforeach"),
            ("part", "<{{ n }}:{{ site }}:{{ xs }}>"),
        ]);
        h.globals.insert("site".to_string(), Value::from("lam"));
        let out = h
            .render("page", data(&[("xs", vjson("[1, 2]"))]))
            .unwrap();
        // xs is a local of the outer template, invisible inside the include
        assert_eq!(out, "<1:lam:><2:lam:>");
    }

    #[test]
    fn test_include_dynamic_target() {
        let h = Harness::new(&[
            ("page", "@include(which)"),
            ("parts.a", "AA"),
        ]);
        let out = h
            .render("page", data(&[("which", Value::from("parts.a"))]))
            .unwrap();
        assert_eq!(out, "AA");
    }

    #[test]
    fn test_include_alias_applies_to_dynamic_target() {
        let mut h = Harness::new(&[("page", "@include(which)"), ("parts.real", "R")]);
        h.resolver.add_include("shortcut", "parts.real");
        let out = h
            .render("page", data(&[("which", Value::from("shortcut"))]))
            .unwrap();
        assert_eq!(out, "R");
    }

    #[test]
    fn test_recursive_include_detected() {
        let h = Harness::new(&[("a", "@include('b')"), ("b", "@include('a')")]);
        let err = h.render("a", data(&[])).unwrap_err();
        match err.kind {
            RenderErrorKind::RecursiveInclude { chain } => {
                assert_eq!(chain, vec!["a", "b", "a"]);
            }
            other => panic!("expected recursive include, got {other:?}"),
        }
    }

    #[test]
    fn test_self_include_detected() {
        let h = Harness::new(&[("a", "@include('a')")]);
        let err = h.render("a", data(&[])).unwrap_err();
        assert!(matches!(err.kind, RenderErrorKind::RecursiveInclude { .. }));
    }

    #[test]
    fn test_include_missing_view() {
        let h = Harness::new(&[("page", "@include('ghost')")]);
        let err = h.render("page", data(&[])).unwrap_err();
        assert!(matches!(err.kind, RenderErrorKind::Resolve(_)));
        // located at the include directive
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_include_target_must_be_string() {
        let h = Harness::new(&[("page", "@include(n)")]);
        let err = h.render("page", data(&[("n", Value::Int(4))])).unwrap_err();
        assert!(matches!(
            err.kind,
            RenderErrorKind::IncludeTargetNotString { .. }
        ));
    }

    #[test]
    fn test_auth_role_matrix() {
        let source = "@auth('administrator')X@elseauth('editor')Y@else N@endauth";
        let mut h = Harness::new(&[("page", source)]);

        h.principal = Some(Principal::new("alice", "administrator", ["edit-posts"]));
        assert_eq!(h.render("page", data(&[])).unwrap(), "X");

        h.principal = Some(Principal::new("bob", "editor", Vec::<String>::new()));
        assert_eq!(h.render("page", data(&[])).unwrap(), "Y");

        h.principal = None;
        assert_eq!(h.render("page", data(&[])).unwrap(), " N");
    }

    #[test]
    fn test_guest_block() {
        let mut h = Harness::new(&[("page", "@guest sign in@else hello@endguest")]);
        assert_eq!(h.render("page", data(&[])).unwrap(), " sign in");

        h.principal = Some(Principal::new("alice", "admin", Vec::<String>::new()));
        assert_eq!(h.render("page", data(&[])).unwrap(), " hello");
    }

    #[test]
    fn test_can_checks_permission() {
        let source = "@can('edit-posts')edit@elsecan('view-posts')view@else none@endcan";
        let mut h = Harness::new(&[("page", source)]);

        h.principal = Some(Principal::new("alice", "admin", ["edit-posts"]));
        assert_eq!(h.render("page", data(&[])).unwrap(), "edit");

        h.principal = Some(Principal::new("bob", "user", ["view-posts"]));
        assert_eq!(h.render("page", data(&[])).unwrap(), "view");

        h.principal = Some(Principal::new("eve", "user", Vec::<String>::new()));
        assert_eq!(h.render("page", data(&[])).unwrap(), " none");
    }

    #[test]
    fn test_run_time_directive_renders_raw() {
        let mut h = Harness::new(&[("page", "@stamp('v1')")]);
        h.registry.register_run_time("stamp", |args| {
            let tag = args.first().map(|v| v.render_string()).unwrap_or_default();
            Ok(Value::Str(format!("<meta name=\"{tag}\">")))
        });
        assert_eq!(h.render("page", data(&[])).unwrap(), "<meta name=\"v1\">");
    }

    #[test]
    fn test_run_time_directive_failure_is_located() {
        let mut h = Harness::new(&[("page", "line\n@boom(1)")]);
        h.registry
            .register_run_time("boom", |_| Err(DirectiveError::new("no")));
        let err = h.render("page", data(&[])).unwrap_err();
        match &err.kind {
            RenderErrorKind::DirectiveFailed { name, message } => {
                assert_eq!(name, "boom");
                assert_eq!(message, "no");
            }
            other => panic!("expected directive failure, got {other:?}"),
        }
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_missing_handler_for_cached_call_op() {
        // registry had the directive when the artifact was built, loses it after
        let mut h = Harness::new(&[("page", "@nonce(1)")]);
        h.registry
            .register_run_time("nonce", |_| Ok(Value::from("t")));
        assert_eq!(h.render("page", data(&[])).unwrap(), "t");

        h.registry = DirectiveRegistry::new();
        let err = h.render("page", data(&[])).unwrap_err();
        assert!(matches!(err.kind, RenderErrorKind::UnknownDirective { .. }));
    }

    #[test]
    fn test_division_by_zero_located_at_echo() {
        let h = Harness::new(&[("page", "ok\nok {{ 1 / n }}")]);
        let err = h.render("page", data(&[("n", Value::Int(0))])).unwrap_err();
        assert!(matches!(err.kind, RenderErrorKind::DivisionByZero));
        assert_eq!(err.line(), Some(2));
        assert_eq!(err.column(), Some(4));
    }

    #[test]
    fn test_pipes_render_when_enabled() {
        let mut config = EngineConfig::new(["/views"], "/cache");
        config.allow_pipes = true;
        let h = Harness::with_config(
            &[("page", "{{ name | upper }} {{ missing | default('guest') }}")],
            config,
        );
        let out = h
            .render("page", data(&[("name", Value::from("kai"))]))
            .unwrap();
        assert_eq!(out, "KAI guest");
    }

    #[test]
    fn test_render_writes_to_sink() {
        let h = Harness::new(&[("page", "x={{ n }}")]);
        let compiler = Compiler::new(&h.registry, &h.resolver, &h.config);
        let ctx = EngineContext {
            vfs: &h.vfs,
            compiler: &compiler,
            cache: &h.cache,
            resolver: &h.resolver,
            registry: &h.registry,
            filters: &h.filters,
            config: &h.config,
            globals: &h.globals,
            principal: None,
            escape: &escape_html,
        };
        let path = h.resolver.resolve(&h.vfs, "page").unwrap();
        let (program, _) = h.cache.fetch(&h.vfs, &compiler, "page", &path).unwrap();

        let mut sink = Vec::new();
        Executor::new(&ctx)
            .render(&program, data(&[("n", Value::Int(9))]), &mut sink)
            .unwrap();
        assert_eq!(sink, b"x=9");
    }
}

//! Directive compiler
//!
//! Assembles scanned segments into a `Program`. Block directives are
//! tracked on a frame stack; arms (`@elseif`, `@case`, `@elseauth`, ...)
//! mutate the innermost frame, terminators pop it. Compilation is a pure
//! function of the template text, the registry, the alias table, and the
//! configuration, so identical inputs always produce identical artifacts.

use tracing::{debug, trace};

use lamina_config::EngineConfig;

use super::error::{CompileError, CompileErrorKind, CompileResult};
use crate::auth::AuthCheck;
use crate::expr::ast::{Expr, UnaryOp};
use crate::expr::parser::ExprParser;
use crate::program::{AuthArm, CaseArm, IfArm, Op, Program};
use crate::registry::{DirectiveHandler, DirectiveRegistry};
use crate::resolve::TemplateResolver;
use crate::scan::{scan, Segment, SourcePos};

/// Compiles template text into programs.
pub struct Compiler<'a> {
    registry: &'a DirectiveRegistry,
    resolver: &'a TemplateResolver,
    config: &'a EngineConfig,
}

impl<'a> Compiler<'a> {
    pub fn new(
        registry: &'a DirectiveRegistry,
        resolver: &'a TemplateResolver,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            registry,
            resolver,
            config,
        }
    }

    /// Compile a template into a `Program` named after its view.
    pub fn compile(&self, name: &str, source: &str) -> CompileResult<Program> {
        let segments = scan(source)?;
        let mut assembler = Assembler::new(self);
        for segment in segments {
            assembler.apply(segment, 0)?;
        }
        let ops = assembler.finish()?;
        debug!(
            target: "lamina::compile",
            view = name,
            ops = ops.len(),
            "compiled template"
        );
        Ok(Program::new(name, ops))
    }
}

/// One open block directive.
struct Frame {
    kind: FrameKind,
    /// Ops collected for the section currently being filled
    ops: Vec<Op>,
    /// Where the block opened
    pos: SourcePos,
}

enum IfPending {
    Arm(Expr),
    Else,
}

enum AuthPending {
    Arm(AuthCheck),
    Else,
}

#[derive(Clone, Copy, PartialEq)]
enum AuthFamily {
    Auth,
    Guest,
    Can,
}

enum SwitchSection {
    /// Between `@switch` and the first `@case`/`@default`
    Prelude,
    Case(Expr),
    Default,
}

enum FrameKind {
    If {
        done: Vec<IfArm>,
        pending: IfPending,
    },
    Unless {
        cond: Expr,
        /// Body before `@else`, captured once the else section starts
        primary: Option<Vec<Op>>,
    },
    Switch {
        subject: Expr,
        cases: Vec<CaseArm>,
        default: Option<Vec<Op>>,
        section: SwitchSection,
        /// Current case saw `@break`; only whitespace may follow it
        terminated: bool,
    },
    Foreach {
        head: crate::expr::ast::ForeachHead,
    },
    For {
        head: crate::expr::ast::ForHead,
    },
    While {
        cond: Expr,
    },
    AuthBlock {
        family: AuthFamily,
        done: Vec<AuthArm>,
        pending: AuthPending,
    },
}

impl Frame {
    fn open_name(&self) -> &'static str {
        match &self.kind {
            FrameKind::If { .. } => "if",
            FrameKind::Unless { .. } => "unless",
            FrameKind::Switch { .. } => "switch",
            FrameKind::Foreach { .. } => "foreach",
            FrameKind::For { .. } => "for",
            FrameKind::While { .. } => "while",
            FrameKind::AuthBlock { family, .. } => match family {
                AuthFamily::Auth => "auth",
                AuthFamily::Guest => "guest",
                AuthFamily::Can => "can",
            },
        }
    }

    fn terminator(&self) -> &'static str {
        match &self.kind {
            FrameKind::If { .. } => "endif",
            FrameKind::Unless { .. } => "endunless",
            FrameKind::Switch { .. } => "endswitch",
            FrameKind::Foreach { .. } => "endforeach",
            FrameKind::For { .. } => "endfor",
            FrameKind::While { .. } => "endwhile",
            FrameKind::AuthBlock { family, .. } => match family {
                AuthFamily::Auth => "endauth",
                AuthFamily::Guest => "endguest",
                AuthFamily::Can => "endcan",
            },
        }
    }

    fn is_loop(&self) -> bool {
        matches!(
            self.kind,
            FrameKind::Foreach { .. } | FrameKind::For { .. } | FrameKind::While { .. }
        )
    }

    /// Build the finished op from a popped frame.
    fn into_op(self) -> Op {
        let ops = self.ops;
        match self.kind {
            FrameKind::If { mut done, pending } => match pending {
                IfPending::Arm(cond) => {
                    done.push(IfArm { cond, body: ops });
                    Op::If {
                        arms: done,
                        fallback: None,
                    }
                }
                IfPending::Else => Op::If {
                    arms: done,
                    fallback: Some(ops),
                },
            },
            FrameKind::Unless { cond, primary } => {
                let negated = Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(cond),
                };
                match primary {
                    None => Op::If {
                        arms: vec![IfArm {
                            cond: negated,
                            body: ops,
                        }],
                        fallback: None,
                    },
                    Some(primary) => Op::If {
                        arms: vec![IfArm {
                            cond: negated,
                            body: primary,
                        }],
                        fallback: Some(ops),
                    },
                }
            }
            FrameKind::Switch {
                subject,
                mut cases,
                mut default,
                section,
                ..
            } => {
                match section {
                    SwitchSection::Prelude => {}
                    SwitchSection::Case(value) => cases.push(CaseArm { value, body: ops }),
                    SwitchSection::Default => default = Some(ops),
                }
                Op::Switch {
                    subject,
                    cases,
                    default,
                }
            }
            FrameKind::Foreach { head } => Op::Foreach { head, body: ops },
            FrameKind::For { head } => Op::For { head, body: ops },
            FrameKind::While { cond } => Op::While { cond, body: ops },
            FrameKind::AuthBlock {
                mut done, pending, ..
            } => match pending {
                AuthPending::Arm(check) => {
                    done.push(AuthArm { check, body: ops });
                    Op::Auth {
                        arms: done,
                        fallback: None,
                    }
                }
                AuthPending::Else => Op::Auth {
                    arms: done,
                    fallback: Some(ops),
                },
            },
        }
    }
}

/// Frame-stack assembly of segments into ops.
struct Assembler<'c, 'a> {
    compiler: &'c Compiler<'a>,
    root: Vec<Op>,
    stack: Vec<Frame>,
}

impl<'c, 'a> Assembler<'c, 'a> {
    fn new(compiler: &'c Compiler<'a>) -> Self {
        Self {
            compiler,
            root: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn finish(self) -> CompileResult<Vec<Op>> {
        if let Some(frame) = self.stack.last() {
            return Err(CompileError::here(
                CompileErrorKind::UnclosedBlock {
                    directive: frame.open_name().to_string(),
                    expected: frame.terminator().to_string(),
                },
                frame.pos,
            ));
        }
        Ok(self.root)
    }

    fn apply(&mut self, segment: Segment, depth: usize) -> CompileResult<()> {
        match segment {
            Segment::Text(text) => self.push_text(&text),
            Segment::RawEscape(text) => self.push_text(&text),
            Segment::Comment { body, pos } => self.push_comment(&body, pos),
            Segment::EchoEscaped { expr, pos } => {
                if self.gate_output(false, Some(pos))? {
                    let expr = self.parse_expr("echo", &expr, pos)?;
                    self.current_ops().push(Op::EchoEscaped { expr, pos });
                }
                Ok(())
            }
            Segment::EchoRaw { expr, pos } => {
                if self.gate_output(false, Some(pos))? {
                    let expr = self.parse_expr("raw echo", &expr, pos)?;
                    self.current_ops().push(Op::EchoRaw { expr, pos });
                }
                Ok(())
            }
            Segment::Directive { name, args, pos } => {
                self.directive(&name, args.as_deref(), pos, depth)
            }
        }
    }

    // --- output plumbing ---

    fn current_ops(&mut self) -> &mut Vec<Op> {
        match self.stack.last_mut() {
            Some(frame) => &mut frame.ops,
            None => &mut self.root,
        }
    }

    /// Check whether output may be emitted at the current block position.
    ///
    /// Returns `Ok(false)` to drop whitespace silently inside switch gaps
    /// (before the first case, or after a case's `@break`).
    fn gate_output(&self, whitespace_only: bool, pos: Option<SourcePos>) -> CompileResult<bool> {
        if let Some(frame) = self.stack.last() {
            if let FrameKind::Switch {
                section,
                terminated,
                ..
            } = &frame.kind
            {
                let prelude = matches!(section, SwitchSection::Prelude);
                if prelude || *terminated {
                    if whitespace_only {
                        return Ok(false);
                    }
                    let reason = if prelude {
                        "expected '@case' or '@default' after '@switch'".to_string()
                    } else {
                        "content after '@break' in a switch case".to_string()
                    };
                    return Err(CompileError::here(
                        CompileErrorKind::UnexpectedContent { reason },
                        pos.unwrap_or(frame.pos),
                    ));
                }
            }
        }
        Ok(true)
    }

    fn push_text(&mut self, text: &str) -> CompileResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        if self.gate_output(text.trim().is_empty(), None)? {
            let ops = self.current_ops();
            if let Some(Op::Text(last)) = ops.last_mut() {
                last.push_str(text);
            } else {
                ops.push(Op::Text(text.to_string()));
            }
        }
        Ok(())
    }

    fn push_comment(&mut self, body: &str, pos: SourcePos) -> CompileResult<()> {
        // comments vanish inside switch gaps regardless of mode
        if !self.gate_output(true, Some(pos))? {
            return Ok(());
        }
        match self.compiler.config.comment_mode {
            lamina_config::CommentMode::Strip => Ok(()),
            lamina_config::CommentMode::Emit => self.push_text(&format!("<!--{body}-->")),
        }
    }

    fn push_op(&mut self, op: Op, pos: SourcePos) -> CompileResult<()> {
        if self.gate_output(false, Some(pos))? {
            self.current_ops().push(op);
        }
        Ok(())
    }

    // --- expression parsing ---

    fn parse_expr(&self, context: &str, text: &str, pos: SourcePos) -> CompileResult<Expr> {
        ExprParser::parse_expression(text, self.compiler.config.allow_pipes)
            .map_err(|e| CompileError::expr(context, e, pos))
    }

    fn parse_required(
        &self,
        name: &str,
        args: Option<&str>,
        pos: SourcePos,
    ) -> CompileResult<Expr> {
        match args {
            Some(text) if !text.trim().is_empty() => {
                self.parse_expr(&format!("@{name}"), text, pos)
            }
            _ => Err(CompileError::here(
                CompileErrorKind::MissingArgs {
                    directive: name.to_string(),
                },
                pos,
            )),
        }
    }

    fn parse_optional(
        &self,
        name: &str,
        args: Option<&str>,
        pos: SourcePos,
    ) -> CompileResult<Option<Expr>> {
        match args {
            Some(text) if !text.trim().is_empty() => {
                Ok(Some(self.parse_expr(&format!("@{name}"), text, pos)?))
            }
            _ => Ok(None),
        }
    }

    // --- directive dispatch ---

    fn directive(
        &mut self,
        name: &str,
        args: Option<&str>,
        pos: SourcePos,
        depth: usize,
    ) -> CompileResult<()> {
        match name {
            "if" => {
                let cond = self.parse_required("if", args, pos)?;
                self.open(
                    FrameKind::If {
                        done: Vec::new(),
                        pending: IfPending::Arm(cond),
                    },
                    pos,
                )
            }
            "elseif" => self.arm_elseif(args, pos),
            "else" => self.arm_else(pos),
            "endif" => self.close_block("endif", pos),

            "unless" => {
                let cond = self.parse_required("unless", args, pos)?;
                self.open(FrameKind::Unless { cond, primary: None }, pos)
            }
            "endunless" => self.close_block("endunless", pos),

            "switch" => {
                let subject = self.parse_required("switch", args, pos)?;
                self.open(
                    FrameKind::Switch {
                        subject,
                        cases: Vec::new(),
                        default: None,
                        section: SwitchSection::Prelude,
                        terminated: false,
                    },
                    pos,
                )
            }
            "case" => self.arm_case(args, pos),
            "default" => self.arm_default(pos),
            "endswitch" => self.close_block("endswitch", pos),

            "foreach" => {
                let text = require_args(name, args, pos)?;
                let head = ExprParser::parse_foreach_head(text, self.compiler.config.allow_pipes)
                    .map_err(|e| CompileError::expr("@foreach", e, pos))?;
                self.open(FrameKind::Foreach { head }, pos)
            }
            "endforeach" => self.close_block("endforeach", pos),

            "for" => {
                let text = require_args(name, args, pos)?;
                let head = ExprParser::parse_for_head(text, self.compiler.config.allow_pipes)
                    .map_err(|e| CompileError::expr("@for", e, pos))?;
                self.open(FrameKind::For { head }, pos)
            }
            "endfor" => self.close_block("endfor", pos),

            "while" => {
                let cond = self.parse_required("while", args, pos)?;
                self.open(FrameKind::While { cond }, pos)
            }
            "endwhile" => self.close_block("endwhile", pos),

            "break" => self.loop_break(pos),
            "continue" => self.loop_continue(pos),

            "include" => {
                let text = require_args(name, args, pos)?;
                let (target, data) =
                    ExprParser::parse_include_args(text, self.compiler.config.allow_pipes)
                        .map_err(|e| CompileError::expr("@include", e, pos))?;
                // literal targets are alias-substituted now; dynamic ones
                // consult the same table at render time
                let target = match target.as_literal_str() {
                    Some(literal) => Expr::str(self.compiler.resolver.apply_alias(literal)),
                    None => target,
                };
                self.push_op(Op::Include { target, data, pos }, pos)
            }

            "auth" => {
                let role = self.parse_optional("auth", args, pos)?;
                self.open_auth(AuthFamily::Auth, AuthCheck::Authenticated { role }, pos)
            }
            "guest" => {
                let role = self.parse_optional("guest", args, pos)?;
                self.open_auth(AuthFamily::Guest, AuthCheck::Guest { role }, pos)
            }
            "can" => {
                let permission = self.parse_required("can", args, pos)?;
                self.open_auth(AuthFamily::Can, AuthCheck::Can { permission }, pos)
            }
            "elseauth" => {
                let role = self.parse_optional("elseauth", args, pos)?;
                self.arm_auth(
                    "elseauth",
                    AuthFamily::Auth,
                    AuthCheck::Authenticated { role },
                    pos,
                )
            }
            "elseguest" => {
                let role = self.parse_optional("elseguest", args, pos)?;
                self.arm_auth("elseguest", AuthFamily::Guest, AuthCheck::Guest { role }, pos)
            }
            "elsecan" => {
                let permission = self.parse_required("elsecan", args, pos)?;
                self.arm_auth("elsecan", AuthFamily::Can, AuthCheck::Can { permission }, pos)
            }
            "endauth" => self.close_block("endauth", pos),
            "endguest" => self.close_block("endguest", pos),
            "endcan" => self.close_block("endcan", pos),

            _ => self.custom_or_unknown(name, args, pos, depth),
        }
    }

    fn open(&mut self, kind: FrameKind, pos: SourcePos) -> CompileResult<()> {
        if self.gate_output(false, Some(pos))? {
            self.stack.push(Frame {
                kind,
                ops: Vec::new(),
                pos,
            });
        }
        Ok(())
    }

    fn open_auth(&mut self, family: AuthFamily, check: AuthCheck, pos: SourcePos) -> CompileResult<()> {
        self.open(
            FrameKind::AuthBlock {
                family,
                done: Vec::new(),
                pending: AuthPending::Arm(check),
            },
            pos,
        )
    }

    fn arm_elseif(&mut self, args: Option<&str>, pos: SourcePos) -> CompileResult<()> {
        let cond = self.parse_required("elseif", args, pos)?;
        let frame = match self.stack.last_mut() {
            Some(frame) => frame,
            None => return Err(unexpected("elseif", pos)),
        };
        match &mut frame.kind {
            FrameKind::If { done, pending } => match pending {
                IfPending::Else => Err(CompileError::here(
                    CompileErrorKind::MisplacedArm {
                        directive: "elseif".to_string(),
                        reason: "'@elseif' cannot follow '@else'".to_string(),
                    },
                    pos,
                )),
                IfPending::Arm(_) => {
                    let body = std::mem::take(&mut frame.ops);
                    if let IfPending::Arm(prev) =
                        std::mem::replace(pending, IfPending::Arm(cond))
                    {
                        done.push(IfArm { cond: prev, body });
                    }
                    Ok(())
                }
            },
            _ => Err(unexpected("elseif", pos)),
        }
    }

    fn arm_else(&mut self, pos: SourcePos) -> CompileResult<()> {
        let frame = match self.stack.last_mut() {
            Some(frame) => frame,
            None => return Err(unexpected("else", pos)),
        };
        match &mut frame.kind {
            FrameKind::If { done, pending } => match pending {
                IfPending::Else => Err(duplicate_else(pos)),
                IfPending::Arm(_) => {
                    let body = std::mem::take(&mut frame.ops);
                    if let IfPending::Arm(prev) = std::mem::replace(pending, IfPending::Else) {
                        done.push(IfArm { cond: prev, body });
                    }
                    Ok(())
                }
            },
            FrameKind::Unless { primary, .. } => {
                if primary.is_some() {
                    return Err(duplicate_else(pos));
                }
                *primary = Some(std::mem::take(&mut frame.ops));
                Ok(())
            }
            FrameKind::AuthBlock { done, pending, .. } => match pending {
                AuthPending::Else => Err(duplicate_else(pos)),
                AuthPending::Arm(_) => {
                    let body = std::mem::take(&mut frame.ops);
                    if let AuthPending::Arm(prev) =
                        std::mem::replace(pending, AuthPending::Else)
                    {
                        done.push(AuthArm { check: prev, body });
                    }
                    Ok(())
                }
            },
            _ => Err(unexpected("else", pos)),
        }
    }

    fn arm_case(&mut self, args: Option<&str>, pos: SourcePos) -> CompileResult<()> {
        let value = self.parse_required("case", args, pos)?;
        let frame = match self.stack.last_mut() {
            Some(frame) => frame,
            None => return Err(unexpected("case", pos)),
        };
        match &mut frame.kind {
            FrameKind::Switch {
                cases,
                default,
                section,
                terminated,
                ..
            } => {
                let body = std::mem::take(&mut frame.ops);
                match std::mem::replace(section, SwitchSection::Case(value)) {
                    SwitchSection::Prelude => {}
                    SwitchSection::Case(prev) => cases.push(CaseArm { value: prev, body }),
                    SwitchSection::Default => *default = Some(body),
                }
                *terminated = false;
                Ok(())
            }
            _ => Err(unexpected("case", pos)),
        }
    }

    fn arm_default(&mut self, pos: SourcePos) -> CompileResult<()> {
        let frame = match self.stack.last_mut() {
            Some(frame) => frame,
            None => return Err(unexpected("default", pos)),
        };
        match &mut frame.kind {
            FrameKind::Switch {
                cases,
                default,
                section,
                terminated,
                ..
            } => {
                if default.is_some() || matches!(section, SwitchSection::Default) {
                    return Err(CompileError::here(
                        CompileErrorKind::MisplacedArm {
                            directive: "default".to_string(),
                            reason: "a switch may have only one '@default'".to_string(),
                        },
                        pos,
                    ));
                }
                let body = std::mem::take(&mut frame.ops);
                match std::mem::replace(section, SwitchSection::Default) {
                    SwitchSection::Prelude => {}
                    SwitchSection::Case(prev) => cases.push(CaseArm { value: prev, body }),
                    SwitchSection::Default => {}
                }
                *terminated = false;
                Ok(())
            }
            _ => Err(unexpected("default", pos)),
        }
    }

    fn arm_auth(
        &mut self,
        directive: &str,
        family: AuthFamily,
        check: AuthCheck,
        pos: SourcePos,
    ) -> CompileResult<()> {
        let frame = match self.stack.last_mut() {
            Some(frame) => frame,
            None => return Err(unexpected(directive, pos)),
        };
        match &mut frame.kind {
            FrameKind::AuthBlock {
                family: open_family,
                done,
                pending,
            } => {
                if *open_family != family {
                    return Err(CompileError::here(
                        CompileErrorKind::MisplacedArm {
                            directive: directive.to_string(),
                            reason: format!(
                                "'@{directive}' cannot appear inside an '@{}' block",
                                match open_family {
                                    AuthFamily::Auth => "auth",
                                    AuthFamily::Guest => "guest",
                                    AuthFamily::Can => "can",
                                }
                            ),
                        },
                        pos,
                    ));
                }
                match pending {
                    AuthPending::Else => Err(CompileError::here(
                        CompileErrorKind::MisplacedArm {
                            directive: directive.to_string(),
                            reason: format!("'@{directive}' cannot follow '@else'"),
                        },
                        pos,
                    )),
                    AuthPending::Arm(_) => {
                        let body = std::mem::take(&mut frame.ops);
                        if let AuthPending::Arm(prev) =
                            std::mem::replace(pending, AuthPending::Arm(check))
                        {
                            done.push(AuthArm { check: prev, body });
                        }
                        Ok(())
                    }
                }
            }
            _ => Err(unexpected(directive, pos)),
        }
    }

    fn loop_break(&mut self, pos: SourcePos) -> CompileResult<()> {
        if let Some(frame) = self.stack.last_mut() {
            if let FrameKind::Switch {
                section,
                terminated,
                ..
            } = &mut frame.kind
            {
                return match section {
                    SwitchSection::Prelude => Err(CompileError::here(
                        CompileErrorKind::MisplacedArm {
                            directive: "break".to_string(),
                            reason: "'@break' before any '@case'".to_string(),
                        },
                        pos,
                    )),
                    _ if *terminated => Err(CompileError::here(
                        CompileErrorKind::UnexpectedContent {
                            reason: "content after '@break' in a switch case".to_string(),
                        },
                        pos,
                    )),
                    _ => {
                        *terminated = true;
                        Ok(())
                    }
                };
            }
        }
        let breakable = self
            .stack
            .iter()
            .any(|f| f.is_loop() || matches!(f.kind, FrameKind::Switch { .. }));
        if breakable {
            self.push_op(Op::Break, pos)
        } else {
            Err(unexpected("break", pos))
        }
    }

    fn loop_continue(&mut self, pos: SourcePos) -> CompileResult<()> {
        if self.stack.iter().any(Frame::is_loop) {
            self.push_op(Op::Continue, pos)
        } else {
            Err(unexpected("continue", pos))
        }
    }

    fn close_block(&mut self, found: &'static str, pos: SourcePos) -> CompileResult<()> {
        let frame = match self.stack.pop() {
            Some(frame) => frame,
            None => return Err(unexpected(found, pos)),
        };
        if frame.terminator() != found {
            return Err(CompileError::here(
                CompileErrorKind::MismatchedTerminator {
                    found: found.to_string(),
                    expected: frame.terminator().to_string(),
                },
                pos,
            ));
        }
        let op = frame.into_op();
        self.current_ops().push(op);
        Ok(())
    }

    /// Registered custom directive, or literal passthrough.
    fn custom_or_unknown(
        &mut self,
        name: &str,
        args: Option<&str>,
        pos: SourcePos,
        depth: usize,
    ) -> CompileResult<()> {
        match self.compiler.registry.lookup(name) {
            Some(DirectiveHandler::CompileTime(handler)) => {
                let limit = self.compiler.config.limits.max_expansion_depth;
                if depth >= limit {
                    return Err(CompileError::here(
                        CompileErrorKind::ExpansionDepthExceeded {
                            directive: name.to_string(),
                            limit,
                        },
                        pos,
                    ));
                }
                let fragment = handler(args.unwrap_or("")).map_err(|e| {
                    CompileError::here(
                        CompileErrorKind::DirectiveHandler {
                            directive: name.to_string(),
                            message: e.message,
                        },
                        pos,
                    )
                })?;
                trace!(
                    target: "lamina::compile",
                    directive = name,
                    depth,
                    "expanding compile-time directive"
                );
                let segments = scan(&fragment).map_err(|e| fragment_error(name, e.into(), pos))?;
                for segment in segments {
                    self.apply(segment, depth + 1)
                        .map_err(|e| fragment_error(name, e, pos))?;
                }
                Ok(())
            }
            Some(DirectiveHandler::RunTime(_)) => {
                let parsed =
                    ExprParser::parse_call_args(args.unwrap_or(""), self.compiler.config.allow_pipes)
                        .map_err(|e| CompileError::expr(format!("@{name}"), e, pos))?;
                self.push_op(
                    Op::CallDirective {
                        name: name.to_string(),
                        args: parsed,
                        pos,
                    },
                    pos,
                )
            }
            None => {
                // unknown directives pass through exactly as written
                let literal = match args {
                    Some(a) => format!("@{name}({a})"),
                    None => format!("@{name}"),
                };
                self.push_text(&literal)
            }
        }
    }
}

fn require_args<'s>(name: &str, args: Option<&'s str>, pos: SourcePos) -> CompileResult<&'s str> {
    match args {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(CompileError::here(
            CompileErrorKind::MissingArgs {
                directive: name.to_string(),
            },
            pos,
        )),
    }
}

fn unexpected(directive: &str, pos: SourcePos) -> CompileError {
    CompileError::here(
        CompileErrorKind::UnexpectedDirective {
            directive: directive.to_string(),
        },
        pos,
    )
}

fn duplicate_else(pos: SourcePos) -> CompileError {
    CompileError::here(
        CompileErrorKind::MisplacedArm {
            directive: "else".to_string(),
            reason: "duplicate '@else' in the same block".to_string(),
        },
        pos,
    )
}

/// Errors raised while compiling an expanded fragment are reported at the
/// directive that produced the fragment.
fn fragment_error(directive: &str, inner: CompileError, pos: SourcePos) -> CompileError {
    CompileError::here(
        CompileErrorKind::DirectiveHandler {
            directive: directive.to_string(),
            message: inner.to_string(),
        },
        pos,
    )
}

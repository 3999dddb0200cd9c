//! API error types
//!
//! Unifies the core error taxonomy behind one `LaminaError` and offers a
//! structured `ErrorReport` for CLI display and machine consumption.

use thiserror::Error;

use lamina_config::Phase;
use lamina_core::cache::FetchError;
use lamina_core::compile::{CompileError, CompileErrorKind};
use lamina_core::resolve::ResolveError;
use lamina_core::runtime::{RenderError, RenderErrorKind};
use lamina_core::scan::ScanErrorKind;
use lamina_vfs::VfsError;

/// Any failure an engine call can produce.
#[derive(Error, Debug, Clone)]
pub enum LaminaError {
    /// Template name did not resolve to a source file
    #[error("{0}")]
    Resolve(#[from] ResolveError),

    /// Template source failed to compile
    #[error("{0}")]
    Compile(#[from] CompileError),

    /// Execution failed
    #[error("{0}")]
    Render(#[from] RenderError),

    /// Filesystem operation failed outside the render path
    #[error("{0}")]
    Vfs(#[from] VfsError),

    /// Render data was not a map
    #[error("Template data must be a map, got {type_name}")]
    Data { type_name: String },
}

impl From<FetchError> for LaminaError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Vfs(e) => LaminaError::Vfs(e),
            FetchError::Compile(e) => LaminaError::Compile(e),
        }
    }
}

fn compile_phase(err: &CompileError) -> Phase {
    match err.kind {
        CompileErrorKind::Scan(_) => Phase::Scan,
        _ => Phase::Compile,
    }
}

fn compile_kind_label(err: &CompileError) -> &'static str {
    match &err.kind {
        CompileErrorKind::Scan(kind) => match kind {
            ScanErrorKind::UnterminatedEcho => "UnterminatedEcho",
            ScanErrorKind::UnterminatedRawEcho => "UnterminatedRawEcho",
            ScanErrorKind::UnterminatedComment => "UnterminatedComment",
            ScanErrorKind::UnbalancedDirectiveArgs { .. } => "UnbalancedDirectiveArgs",
            ScanErrorKind::UnterminatedArgumentString { .. } => "UnterminatedArgumentString",
        },
        CompileErrorKind::Expr { .. } => "ExprSyntax",
        CompileErrorKind::MissingArgs { .. } => "MissingArgs",
        CompileErrorKind::UnclosedBlock { .. } => "UnclosedBlock",
        CompileErrorKind::UnexpectedDirective { .. } => "UnexpectedDirective",
        CompileErrorKind::MismatchedTerminator { .. } => "MismatchedTerminator",
        CompileErrorKind::MisplacedArm { .. } => "MisplacedArm",
        CompileErrorKind::UnexpectedContent { .. } => "UnexpectedContent",
        CompileErrorKind::DirectiveHandler { .. } => "DirectiveHandler",
        CompileErrorKind::ExpansionDepthExceeded { .. } => "ExpansionDepthExceeded",
    }
}

fn vfs_kind_label(err: &VfsError) -> &'static str {
    match err {
        VfsError::NotFound { .. } => "NotFound",
        VfsError::PermissionDenied { .. } => "PermissionDenied",
        VfsError::AlreadyExists { .. } => "AlreadyExists",
        VfsError::Unsupported { .. } => "Unsupported",
        VfsError::Io { .. } => "Io",
        VfsError::Custom { .. } => "Custom",
    }
}

fn render_kind_label(err: &RenderError) -> &'static str {
    match &err.kind {
        RenderErrorKind::DivisionByZero => "DivisionByZero",
        RenderErrorKind::NotIterable { .. } => "NotIterable",
        RenderErrorKind::RangeBoundNotInt { .. } => "RangeBoundNotInt",
        RenderErrorKind::IncludeTargetNotString { .. } => "IncludeTargetNotString",
        RenderErrorKind::IncludeDataNotMap { .. } => "IncludeDataNotMap",
        RenderErrorKind::UnknownFilter { .. } => "UnknownFilter",
        RenderErrorKind::FilterFailed { .. } => "FilterFailed",
        RenderErrorKind::UnknownDirective { .. } => "UnknownDirective",
        RenderErrorKind::NotRunTimeDirective { .. } => "NotRunTimeDirective",
        RenderErrorKind::DirectiveFailed { .. } => "DirectiveFailed",
        RenderErrorKind::RecursiveInclude { .. } => "RecursiveInclude",
        RenderErrorKind::IncludeDepthExceeded { .. } => "IncludeDepthExceeded",
        RenderErrorKind::LoopLimitExceeded { .. } => "LoopLimitExceeded",
        RenderErrorKind::Resolve(_) => "TemplateNotFound",
        RenderErrorKind::Compile(inner) => compile_kind_label(inner),
        RenderErrorKind::Vfs(inner) => vfs_kind_label(inner),
        RenderErrorKind::Output { .. } => "OutputFailed",
    }
}

impl LaminaError {
    /// Line number of the failure, when one is known.
    pub fn line(&self) -> Option<usize> {
        match self {
            LaminaError::Compile(e) => e.line(),
            LaminaError::Render(e) => e.line(),
            _ => None,
        }
    }

    /// Column number of the failure, when one is known.
    pub fn column(&self) -> Option<usize> {
        match self {
            LaminaError::Compile(e) => e.column(),
            LaminaError::Render(e) => e.column(),
            _ => None,
        }
    }

    /// Engine phase the failure belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            LaminaError::Resolve(_) => Phase::Render,
            LaminaError::Compile(e) => compile_phase(e),
            LaminaError::Render(e) => match &e.kind {
                RenderErrorKind::Compile(inner) => compile_phase(inner),
                RenderErrorKind::Vfs(_) => Phase::Cache,
                _ => Phase::Render,
            },
            LaminaError::Vfs(_) => Phase::Cache,
            LaminaError::Data { .. } => Phase::Render,
        }
    }

    fn kind_label(&self) -> &'static str {
        match self {
            LaminaError::Resolve(_) => "TemplateNotFound",
            LaminaError::Compile(e) => compile_kind_label(e),
            LaminaError::Render(e) => render_kind_label(e),
            LaminaError::Vfs(e) => vfs_kind_label(e),
            LaminaError::Data { .. } => "InvalidData",
        }
    }

    /// Message without the `[line:col]` prefix that Display adds.
    fn bare_message(&self) -> String {
        match self {
            LaminaError::Compile(e) => e.kind.message(),
            LaminaError::Render(e) => e.kind.message(),
            other => other.to_string(),
        }
    }

    /// Convert to a structured error report.
    ///
    /// CLI callers print the report directly; web callers serialize it
    /// with `to_json`.
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            phase: self.phase().as_str(),
            line: self.line(),
            column: self.column(),
            error_kind: self.kind_label().to_string(),
            message: self.bare_message(),
            template: None,
        }
    }
}

/// Structured error report for CLIs, web handlers, and editors.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    /// Failing phase: scan, compile, cache, render
    pub phase: &'static str,
    /// 1-based line, when known
    pub line: Option<usize>,
    /// 1-based column, when known
    pub column: Option<usize>,
    /// Stable kind name for programmatic handling
    pub error_kind: String,
    /// Human-readable message
    pub message: String,
    /// View the failure was observed in, when known
    pub template: Option<String>,
}

impl ErrorReport {
    /// Attach the view name the failure surfaced in.
    pub fn for_template(mut self, name: impl Into<String>) -> Self {
        self.template = Some(name.into());
        self
    }

    /// JSON rendering without a serde dependency.
    pub fn to_json(&self) -> String {
        let line = self
            .line
            .map(|l| l.to_string())
            .unwrap_or_else(|| "null".to_string());
        let column = self
            .column
            .map(|c| c.to_string())
            .unwrap_or_else(|| "null".to_string());
        let template = self
            .template
            .as_ref()
            .map(|t| format!("\"{}\"", escape_json(t)))
            .unwrap_or_else(|| "null".to_string());

        format!(
            r#"{{"phase":"{}","template":{},"line":{},"column":{},"error_kind":"{}","message":"{}"}}"#,
            self.phase,
            template,
            line,
            column,
            escape_json(&self.error_kind),
            escape_json(&self.message)
        )
    }

    /// One-line form for terse terminal output.
    pub fn to_short(&self) -> String {
        format!("{}: {}", self.phase, self.message)
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => {
                write!(
                    f,
                    "[{}:{}] {} error: {}",
                    line, column, self.phase, self.message
                )?;
            }
            _ => write!(f, "[{}] {} error: {}", self.phase, self.phase, self.message)?,
        }
        if let Some(template) = &self.template {
            write!(f, " (in '{template}')")?;
        }
        Ok(())
    }
}

fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_core::compile::CompileError;
    use lamina_core::runtime::RenderError;
    use lamina_core::scan::SourcePos;

    fn pos(line: usize, column: usize) -> SourcePos {
        SourcePos {
            line,
            column,
            offset: 0,
        }
    }

    #[test]
    fn test_compile_error_accessors() {
        let err = LaminaError::Compile(CompileError::here(
            CompileErrorKind::UnclosedBlock {
                directive: "if".to_string(),
                expected: "endif".to_string(),
            },
            pos(4, 2),
        ));
        assert_eq!(err.line(), Some(4));
        assert_eq!(err.column(), Some(2));
        assert_eq!(err.phase(), Phase::Compile);
    }

    #[test]
    fn test_scan_error_maps_to_scan_phase() {
        let err = LaminaError::Compile(CompileError::here(
            CompileErrorKind::Scan(ScanErrorKind::UnterminatedEcho),
            pos(1, 9),
        ));
        assert_eq!(err.phase(), Phase::Scan);
        assert_eq!(err.to_report().error_kind, "UnterminatedEcho");
    }

    #[test]
    fn test_render_error_phase_and_kind() {
        let err = LaminaError::Render(RenderError::here(
            RenderErrorKind::DivisionByZero,
            pos(2, 5),
        ));
        assert_eq!(err.phase(), Phase::Render);
        let report = err.to_report();
        assert_eq!(report.error_kind, "DivisionByZero");
        assert_eq!(report.line, Some(2));
        assert_eq!(report.column, Some(5));
    }

    #[test]
    fn test_nested_compile_error_keeps_compile_phase() {
        let inner = CompileError::here(
            CompileErrorKind::MissingArgs {
                directive: "if".to_string(),
            },
            pos(3, 1),
        );
        let err = LaminaError::Render(inner.into());
        assert_eq!(err.phase(), Phase::Compile);
        assert_eq!(err.to_report().error_kind, "MissingArgs");
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_resolve_error_has_no_position() {
        let err = LaminaError::Resolve(ResolveError::TemplateNotFound {
            name: "ghost".to_string(),
            tried: vec!["/views/ghost.lam.html".to_string()],
        });
        assert_eq!(err.line(), None);
        assert_eq!(err.column(), None);
        assert_eq!(err.to_report().error_kind, "TemplateNotFound");
    }

    #[test]
    fn test_report_display_with_location() {
        let report = ErrorReport {
            phase: "compile",
            line: Some(10),
            column: Some(5),
            error_kind: "UnclosedBlock".to_string(),
            message: "'@if' opened here was never closed".to_string(),
            template: None,
        };
        let text = report.to_string();
        assert!(text.contains("[10:5]"));
        assert!(text.contains("compile error"));
    }

    #[test]
    fn test_report_display_without_location_names_phase() {
        let report = ErrorReport {
            phase: "cache",
            line: None,
            column: None,
            error_kind: "Io".to_string(),
            message: "disk full".to_string(),
            template: None,
        };
        assert!(report.to_string().starts_with("[cache] cache error:"));
    }

    #[test]
    fn test_report_display_names_template() {
        let report = ErrorReport {
            phase: "render",
            line: Some(1),
            column: Some(1),
            error_kind: "DivisionByZero".to_string(),
            message: "Division by zero".to_string(),
            template: None,
        }
        .for_template("shop.cart");
        assert!(report.to_string().ends_with("(in 'shop.cart')"));
    }

    #[test]
    fn test_report_to_json() {
        let report = ErrorReport {
            phase: "render",
            line: Some(7),
            column: Some(3),
            error_kind: "UnknownFilter".to_string(),
            message: "Unknown filter 'shout'".to_string(),
            template: Some("home.index".to_string()),
        };
        let json = report.to_json();
        assert!(json.contains("\"phase\":\"render\""));
        assert!(json.contains("\"template\":\"home.index\""));
        assert!(json.contains("\"line\":7"));
        assert!(json.contains("\"column\":3"));
        assert!(json.contains("\"error_kind\":\"UnknownFilter\""));
    }

    #[test]
    fn test_report_to_json_null_fields() {
        let report = ErrorReport {
            phase: "cache",
            line: None,
            column: None,
            error_kind: "Io".to_string(),
            message: "boom".to_string(),
            template: None,
        };
        let json = report.to_json();
        assert!(json.contains("\"line\":null"));
        assert!(json.contains("\"column\":null"));
        assert!(json.contains("\"template\":null"));
    }

    #[test]
    fn test_json_escaping() {
        assert_eq!(escape_json("plain"), "plain");
        assert_eq!(escape_json("a\"b"), "a\\\"b");
        assert_eq!(escape_json("a\\b"), "a\\\\b");
        assert_eq!(escape_json("a\nb"), "a\\nb");
        assert_eq!(escape_json("a\tb"), "a\\tb");

        let report = ErrorReport {
            phase: "compile",
            line: Some(1),
            column: Some(1),
            error_kind: "K".to_string(),
            message: "expected '\"'\nnear here".to_string(),
            template: None,
        };
        let json = report.to_json();
        assert!(json.contains("\\\""));
        assert!(json.contains("\\n"));
    }

    #[test]
    fn test_data_error() {
        let err = LaminaError::Data {
            type_name: "int".to_string(),
        };
        assert_eq!(err.phase(), Phase::Render);
        let report = err.to_report();
        assert_eq!(report.error_kind, "InvalidData");
        assert!(report.message.contains("must be a map"));
    }

    #[test]
    fn test_to_short() {
        let report = ErrorReport {
            phase: "render",
            line: Some(5),
            column: Some(2),
            error_kind: "LoopLimitExceeded".to_string(),
            message: "Loop exceeded 100000 iterations".to_string(),
            template: None,
        };
        assert_eq!(report.to_short(), "render: Loop exceeded 100000 iterations");
    }
}

use crate::expr::error::{ExprError, ExprErrorKind};
use crate::scan::{ErrorLocation, ScanError, ScanErrorKind, SourcePos};

/// Compilation failure with position information.
///
/// Covers scanner failures, expression syntax errors inside directive
/// arguments, and block structure mistakes. A compile error aborts the
/// whole render; nothing partial is ever cached.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    /// What went wrong
    pub kind: CompileErrorKind,
    /// Where it happened
    pub location: ErrorLocation,
}

/// Compile error categories.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileErrorKind {
    /// Scanner failure
    Scan(ScanErrorKind),
    /// Expression syntax error inside a directive or echo
    Expr {
        context: String,
        kind: ExprErrorKind,
        offset: usize,
    },
    /// Directive requires arguments
    MissingArgs { directive: String },
    /// Block directive never closed
    UnclosedBlock { directive: String, expected: String },
    /// Arm or terminator with no matching open block
    UnexpectedDirective { directive: String },
    /// Terminator closes a different block than the innermost open one
    MismatchedTerminator { found: String, expected: String },
    /// Arm directive used where the current block cannot accept it
    MisplacedArm { directive: String, reason: String },
    /// Content where the block structure forbids it
    UnexpectedContent { reason: String },
    /// Custom compile-time handler failed or produced a bad fragment
    DirectiveHandler { directive: String, message: String },
    /// Nested compile-time expansions exceeded the configured limit
    ExpansionDepthExceeded { directive: String, limit: usize },
}

impl CompileError {
    /// Error at an explicit line/column.
    pub fn at(kind: CompileErrorKind, line: usize, column: usize) -> Self {
        Self {
            kind,
            location: ErrorLocation::At(SourcePos {
                line,
                column,
                offset: 0,
            }),
        }
    }

    /// Error at a tracked source position.
    pub fn here(kind: CompileErrorKind, pos: SourcePos) -> Self {
        Self {
            kind,
            location: ErrorLocation::At(pos),
        }
    }

    /// Error at end of input.
    pub fn at_eof(kind: CompileErrorKind) -> Self {
        Self {
            kind,
            location: ErrorLocation::Eof,
        }
    }

    /// Expression error inside a directive, located at the directive.
    pub fn expr(context: impl Into<String>, err: ExprError, pos: SourcePos) -> Self {
        Self {
            kind: CompileErrorKind::Expr {
                context: context.into(),
                kind: err.kind,
                offset: err.offset,
            },
            location: ErrorLocation::At(pos),
        }
    }

    /// Line number, if the location carries one.
    pub fn line(&self) -> Option<usize> {
        match &self.location {
            ErrorLocation::At(pos) => Some(pos.line),
            ErrorLocation::Eof | ErrorLocation::Unknown => None,
        }
    }

    /// Column number, if the location carries one.
    pub fn column(&self) -> Option<usize> {
        match &self.location {
            ErrorLocation::At(pos) => Some(pos.column),
            ErrorLocation::Eof | ErrorLocation::Unknown => None,
        }
    }
}

impl From<ScanError> for CompileError {
    fn from(err: ScanError) -> Self {
        Self {
            kind: CompileErrorKind::Scan(err.kind),
            location: err.location,
        }
    }
}

impl CompileErrorKind {
    pub fn message(&self) -> String {
        match self {
            CompileErrorKind::Scan(kind) => kind.message(),
            CompileErrorKind::Expr {
                context,
                kind,
                offset,
            } => {
                format!(
                    "Invalid expression in {context}: {} (argument offset {offset})",
                    kind.message()
                )
            }
            CompileErrorKind::MissingArgs { directive } => {
                format!("'@{directive}' requires arguments")
            }
            CompileErrorKind::UnclosedBlock {
                directive,
                expected,
            } => {
                format!("'@{directive}' is never closed, expected '@{expected}'")
            }
            CompileErrorKind::UnexpectedDirective { directive } => {
                format!("'@{directive}' has no matching open block")
            }
            CompileErrorKind::MismatchedTerminator { found, expected } => {
                format!("Found '@{found}' but the innermost block expects '@{expected}'")
            }
            CompileErrorKind::MisplacedArm { directive, reason } => {
                format!("'@{directive}' is misplaced: {reason}")
            }
            CompileErrorKind::UnexpectedContent { reason } => {
                format!("Unexpected content: {reason}")
            }
            CompileErrorKind::DirectiveHandler { directive, message } => {
                format!("Directive '@{directive}' failed: {message}")
            }
            CompileErrorKind::ExpansionDepthExceeded { directive, limit } => {
                format!("Expanding '@{directive}' exceeded the expansion depth limit ({limit})")
            }
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let location_prefix = match &self.location {
            ErrorLocation::At(pos) => format!("{}:{}", pos.line, pos.column),
            ErrorLocation::Eof => "EOF".to_string(),
            ErrorLocation::Unknown => "?:?".to_string(),
        };
        write!(f, "[{location_prefix}] {}", self.kind.message())
    }
}

impl std::error::Error for CompileError {}

/// Compile result type.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_at_location() {
        let err = CompileError::at(
            CompileErrorKind::MissingArgs {
                directive: "if".to_string(),
            },
            3,
            9,
        );
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.column(), Some(9));
    }

    #[test]
    fn test_error_from_scan_error() {
        let scan_err = ScanError::at(ScanErrorKind::UnterminatedEcho, 2, 4);
        let err: CompileError = scan_err.into();
        assert_eq!(err.line(), Some(2));
        assert_eq!(err.column(), Some(4));
        assert!(matches!(err.kind, CompileErrorKind::Scan(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CompileError::at(
            CompileErrorKind::UnclosedBlock {
                directive: "if".to_string(),
                expected: "endif".to_string(),
            },
            1,
            1,
        );
        let text = format!("{err}");
        assert!(text.contains("1:1"));
        assert!(text.contains("'@if'"));
        assert!(text.contains("'@endif'"));
    }

    #[test]
    fn test_expr_error_carries_context() {
        let expr_err = ExprError::new(ExprErrorKind::UnexpectedEnd, 5);
        let err = CompileError::expr(
            "@if",
            expr_err,
            SourcePos {
                line: 7,
                column: 2,
                offset: 0,
            },
        );
        assert_eq!(err.line(), Some(7));
        let text = format!("{err}");
        assert!(text.contains("@if"));
        assert!(text.contains("offset 5"));
    }

    #[test]
    fn test_error_at_eof_display() {
        let err = CompileError::at_eof(CompileErrorKind::UnexpectedDirective {
            directive: "endif".to_string(),
        });
        assert_eq!(err.line(), None);
        assert!(format!("{err}").contains("EOF"));
    }

    #[test]
    fn test_error_clone_equality() {
        let err1 = CompileError::at(
            CompileErrorKind::UnexpectedDirective {
                directive: "else".to_string(),
            },
            1,
            1,
        );
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
